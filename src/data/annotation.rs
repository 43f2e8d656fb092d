use serde::{Deserialize, Serialize, Serializer};
use crate::common::BvrBox;

/// One LabelMe-style annotation file. Only `imagePath` and `shapes` are required;
/// everything else LabelMe writes (`version`, `flags`, `imageData`, ...) is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelmeFile {
    pub image_path: String,
    pub shapes: Vec<LabelmeShape>,
    #[serde(default)]
    pub image_height: Option<u32>,
    #[serde(default)]
    pub image_width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelmeShape {
    #[serde(default)]
    pub label: String,
    pub points: Vec<[f32; 2]>,
    #[serde(default)]
    pub shape_type: Option<String>,
}

/// How absolute box coordinates are laid out. Serialized as the framework's integer code.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BoxMode {
    #[default] XyxyAbs,
    XywhAbs,
}

impl BoxMode {
    pub fn code(&self) -> u8 {
        match self {
            BoxMode::XyxyAbs => 0,
            BoxMode::XywhAbs => 1,
        }
    }
}

impl Serialize for BoxMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A single object inside a [`DatasetRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectAnnotation {
    #[serde(serialize_with = "serialize_xyxy")]
    pub bbox: BvrBox,
    pub bbox_mode: BoxMode,
    /// Polygons as flattened `[x0, y0, x1, y1, ...]` lists.
    pub segmentation: Vec<Vec<f32>>,
    pub category_id: usize,
    pub iscrowd: u8,
}

/// All annotations of one image, built from one annotation file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRecord {
    pub file_name: String,
    pub image_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub annotations: Vec<ObjectAnnotation>,
}

fn serialize_xyxy<S: Serializer>(bbox: &BvrBox, serializer: S) -> Result<S::Ok, S::Error> {
    bbox.xyxy().serialize(serializer)
}
