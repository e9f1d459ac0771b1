pub mod animation;
pub mod skeleton;
