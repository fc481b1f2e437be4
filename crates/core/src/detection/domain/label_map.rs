use std::path::{Path, PathBuf};

use crate::inference::domain::inference_error::ModelLoadError;
use crate::shared::constants::BACKGROUND_LABEL;

/// Class names indexed by the detector's label id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// Reconciles a label list with the network's class count.
    ///
    /// A list one short of `num_classes` is missing the implicit background
    /// class, which gets a placeholder at index 0. Any other mismatch leaves
    /// the map empty.
    pub fn from_labels(mut labels: Vec<String>, num_classes: usize) -> Self {
        if labels.len() != num_classes {
            if labels.len() + 1 == num_classes {
                labels.insert(0, BACKGROUND_LABEL.to_string());
            } else {
                labels.clear();
            }
        }
        Self { labels }
    }

    /// Loads `<model>.labels` next to the model file.
    ///
    /// Tokens are whitespace-separated. A missing sidecar is not an error and
    /// yields an empty list before reconciliation.
    pub fn load_for_model(
        model_path: &Path,
        num_classes: usize,
        network: &str,
    ) -> Result<Self, ModelLoadError> {
        let path = sidecar_path(model_path);
        let labels = match std::fs::read_to_string(&path) {
            Ok(text) => text.split_whitespace().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(ModelLoadError::Labels {
                    network: network.to_string(),
                    path,
                    source,
                })
            }
        };
        Ok(Self::from_labels(labels, num_classes))
    }

    pub fn get(&self, label: i32) -> Option<&str> {
        usize::try_from(label)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    /// Name for display, falling back to `label #<id>`.
    pub fn display_name(&self, label: i32) -> String {
        match self.get(label) {
            Some(name) => name.to_string(),
            None => format!("label #{label}"),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// `<dir>/<stem>.labels` for a model at `<dir>/<stem>.<ext>`.
pub fn sidecar_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("labels")
}
