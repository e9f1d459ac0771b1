pub mod runtime;
pub mod types;

pub use runtime::{RuntimeConfig, SkinningRuntime};
pub use types::{InstanceId, ObjectId};
