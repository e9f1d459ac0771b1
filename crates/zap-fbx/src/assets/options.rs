use serde::{Deserialize, Serialize};

/// How the reader treats a compressed array that fails to inflate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionPolicy {
    /// Keep going: the array becomes `Property::UndecodedArray` and a warning
    /// is logged. The affected mesh or channel degrades to empty.
    #[default]
    Lenient,
    /// Reject the whole file.
    Strict,
}

/// Import settings for one FBX asset.
/// Usually loaded from a JSON sidecar next to the asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Compressed array failure handling.
    #[serde(default)]
    pub compression: CompressionPolicy,
    /// Whether to build an animation clip from the file's curves.
    #[serde(default = "default_true")]
    pub import_animation: bool,
    /// Clip name used when the file has no `AnimationStack`.
    #[serde(default = "default_clip_name")]
    pub default_clip_name: String,
}

fn default_true() -> bool {
    true
}

fn default_clip_name() -> String {
    "Take 001".to_string()
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            compression: CompressionPolicy::default(),
            import_animation: true,
            default_clip_name: default_clip_name(),
        }
    }
}

impl ImportOptions {
    /// Parse options from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Strict variant of the defaults: any corrupt array rejects the asset.
    pub fn strict() -> Self {
        Self {
            compression: CompressionPolicy::Strict,
            ..Self::default()
        }
    }
}
