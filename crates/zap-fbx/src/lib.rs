pub mod api;
pub mod core;
pub mod assets;
pub mod components;
pub mod systems;
pub mod renderer;
pub mod bridge;

// Re-export key types at crate root for convenience
pub use api::runtime::{RuntimeConfig, SkinningRuntime};
pub use api::types::{InstanceId, ObjectId};
pub use assets::clip::{sample_bone_transform, sample_curve, AnimationClip};
pub use assets::fbx::{parse_fbx_binary, BinaryNode, FbxScene};
pub use assets::import::{import_fbx, ImportedModel, MeshData};
pub use assets::options::{CompressionPolicy, ImportOptions};
pub use assets::skeleton::{Joint, Skeleton};
pub use assets::skinning::SkinningData;
pub use bridge::protocol::PaletteLayout;
pub use components::animation::AnimationComponent;
pub use components::entity::SkinnedEntity;
pub use components::skeleton::{BoneTransform, SkeletonComponent};
pub use crate::core::error::FbxError;
pub use crate::core::scene::Scene;
pub use crate::core::time::FixedTimestep;
pub use renderer::palette::{JointPalette, SkinVertex};
pub use systems::animation::tick_animations;
pub use systems::skeleton::bake_skeletons;
