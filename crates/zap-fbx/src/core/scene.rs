use crate::api::types::InstanceId;
use crate::components::entity::SkinnedEntity;

/// Flat storage of skinned instances.
/// Sized for tens to hundreds of characters, not crowds.
pub struct Scene {
    instances: Vec<SkinnedEntity>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            instances: Vec::with_capacity(64),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instances: Vec::with_capacity(capacity),
        }
    }

    pub fn spawn(&mut self, instance: SkinnedEntity) {
        self.instances.push(instance);
    }

    /// Remove an instance by ID. Returns it if found.
    pub fn despawn(&mut self, id: InstanceId) -> Option<SkinnedEntity> {
        let idx = self.instances.iter().position(|e| e.id == id)?;
        Some(self.instances.swap_remove(idx))
    }

    pub fn get(&self, id: InstanceId) -> Option<&SkinnedEntity> {
        self.instances.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut SkinnedEntity> {
        self.instances.iter_mut().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkinnedEntity> {
        self.instances.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SkinnedEntity> {
        self.instances.iter_mut()
    }

    /// Find the first instance with the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Option<&SkinnedEntity> {
        self.instances.iter().find(|e| e.tag == tag)
    }

    pub fn find_by_tag_mut(&mut self, tag: &str) -> Option<&mut SkinnedEntity> {
        self.instances.iter_mut().find(|e| e.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Total joints across active instances, the size of this frame's palette.
    pub fn active_joint_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|e| e.active)
            .map(|e| e.skeleton.joint_count())
            .sum()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
