//! Skeleton baking pass over a scene.

use crate::core::scene::Scene;

/// Bake every active, dirty skeleton. Returns how many bakes ran.
///
/// Instances own disjoint buffers, so the order does not matter.
pub fn bake_skeletons(scene: &mut Scene) -> usize {
    scene
        .iter_mut()
        .filter(|e| e.active)
        .map(|e| e.skeleton.bake())
        .filter(|&baked| baked)
        .count()
}
