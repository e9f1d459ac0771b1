pub mod palette;

pub use palette::{JointPalette, PaletteEntry, SkinVertex};
