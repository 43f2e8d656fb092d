use serde::{Deserialize, Serialize};
use crate::common::BvrBox;

/// One detected object instance. The pixel mask lives alongside in the
/// per-frame mask array, at the same index as the instance.
#[derive(Default, Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct BvrInstance {
    pub class_id: isize,
    pub bbox: BvrBox,
    pub label: Option<String>,
    pub confidence: f32,
}

impl BvrInstance {
    pub fn with_bbox(mut self, bbox: BvrBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Sets the confidence score of the instance.
    pub fn with_confidence(mut self, conf: f32) -> Self {
        self.confidence = conf;
        self
    }

    /// Sets the class ID of the instance.
    pub fn with_class_id(mut self, class_id: isize) -> Self {
        self.class_id = class_id;
        self
    }

    /// Sets the optional name of the instance.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or("Unknown".to_string())
    }
}
