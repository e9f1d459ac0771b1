use serde::{Deserialize, Serialize};

use crate::api::types::InstanceId;
use crate::assets::import::ImportedModel;
use crate::bridge::protocol::PaletteLayout;
use crate::components::animation::AnimationComponent;
use crate::components::entity::SkinnedEntity;
use crate::core::error::FbxError;
use crate::core::scene::Scene;
use crate::core::time::FixedTimestep;
use crate::renderer::palette::JointPalette;
use crate::systems::animation::tick_animations;
use crate::systems::skeleton::bake_skeletons;

/// Runtime configuration, usually read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fixed timestep in seconds (default: 1/60).
    pub fixed_dt: f32,
    /// Most fixed steps run in one frame (default: 10).
    pub max_steps_per_frame: u32,
    /// Largest skeleton an instance may have (default: 256).
    pub max_joints: usize,
    /// Instances in the palette buffer (default: 64).
    pub max_instances: usize,
    /// Joint matrices across all instances per frame (default: 4096).
    pub max_palette_joints: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_steps_per_frame: 10,
            max_joints: 256,
            max_instances: 64,
            max_palette_joints: 4096,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Drives skinned instances: animate, bake, then pack the palette.
pub struct SkinningRuntime {
    config: RuntimeConfig,
    pub scene: Scene,
    timestep: FixedTimestep,
    palette: JointPalette,
    next_id: u32,
}

impl SkinningRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        let timestep = FixedTimestep::new(config.fixed_dt, config.max_steps_per_frame);
        let palette = JointPalette::new(PaletteLayout::from_config(&config));
        Self {
            config,
            scene: Scene::new(),
            timestep,
            palette,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Generate the next unique instance ID.
    pub fn next_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place an instance of an imported model. Every take is available to
    /// it and the first one plays.
    pub fn spawn(&mut self, model: &ImportedModel) -> Result<InstanceId, FbxError> {
        if model.skeleton.len() > self.config.max_joints {
            return Err(FbxError::TooManyJoints(model.skeleton.len()));
        }
        let id = self.next_id();
        let mut instance = SkinnedEntity::new(id, model.skeleton.clone());
        if let Some((first, rest)) = model.clips.split_first() {
            let mut animation = AnimationComponent::single(first.clone());
            for clip in rest {
                animation.add(clip.clone());
            }
            instance = instance.with_animation(animation);
        }
        self.scene.spawn(instance);
        log::debug!("spawned instance {} with {} joints", id.0, model.skeleton.len());
        Ok(id)
    }

    pub fn despawn(&mut self, id: InstanceId) -> Option<SkinnedEntity> {
        self.scene.despawn(id)
    }

    /// One fixed step. Returns how many skeletons were baked.
    pub fn step(&mut self) -> usize {
        tick_animations(&mut self.scene, self.timestep.dt());
        bake_skeletons(&mut self.scene)
    }

    /// Advance by a variable frame time, then rebuild the palette.
    /// Returns the number of fixed steps run.
    pub fn frame(&mut self, frame_dt: f32) -> u32 {
        let steps = self.timestep.accumulate(frame_dt);
        for _ in 0..steps {
            self.step();
        }
        // Newly spawned instances bake even on frames with no step.
        bake_skeletons(&mut self.scene);
        self.write_palette();
        steps
    }

    fn write_palette(&mut self) {
        self.palette.clear();
        for entity in self.scene.iter().filter(|e| e.active) {
            self.palette.push(entity.id, entity.skeleton.final_matrices());
        }
        self.palette.finish();
    }

    pub fn palette(&self) -> &JointPalette {
        &self.palette
    }
}

impl Default for SkinningRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
