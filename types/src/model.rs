//! Model metadata and capability queries.
//!
//! The UI owns model metadata; these types only answer "can this model take
//! or produce X". Nothing in the streaming core consults them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
    File,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub input_modalities: Vec<Modality>,
    #[serde(default)]
    pub output_modalities: Vec<Modality>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub architecture: Architecture,
}

impl ModelInfo {
    #[must_use]
    pub fn supports_input(&self, modality: Modality) -> bool {
        self.architecture.input_modalities.contains(&modality)
    }

    #[must_use]
    pub fn supports_output(&self, modality: Modality) -> bool {
        self.architecture.output_modalities.contains(&modality)
    }
}
