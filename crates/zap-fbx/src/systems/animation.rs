//! Animation system: advances play heads and samples clips into bone
//! transforms.

use crate::core::scene::Scene;

/// Tick every instance's animation and write the sampled pose into its
/// skeleton, marking it dirty.
///
/// Call once per fixed step, before `bake_skeletons`.
pub fn tick_animations(scene: &mut Scene, dt: f32) {
    for entity in scene.iter_mut() {
        if !entity.active {
            continue;
        }
        let Some(ref mut anim) = entity.animation else {
            continue;
        };
        anim.tick(dt);
        if !anim.needs_sample {
            continue;
        }
        let Some(clip) = anim.current_clip() else {
            continue;
        };

        let skeleton = entity.skeleton.skeleton().clone();
        clip.sample_into(&skeleton, anim.time, entity.skeleton.bone_transforms_mut());
        anim.needs_sample = false;
    }
}
