use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use crate::common::BvrBox;
use crate::data::annotation::{BoxMode, DatasetRecord, LabelmeFile, LabelmeShape, ObjectAnnotation};

/// How a shape's `label` becomes a `category_id`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMapping {
    /// Every object is category 0, whatever its label says.
    #[default] SingleClass,
    /// Index of the label in the class list; unknown labels are an error.
    ByLabel,
}

/// Reads every `*.json` annotation file in `directory` into one [`DatasetRecord`] each,
/// with every object assigned category 0.
///
/// A directory without annotation files gives an empty list.
pub fn load_dataset_dicts<P: AsRef<Path>>(directory: P, classes: &[String]) -> Result<Vec<DatasetRecord>> {
    load_dataset_dicts_with(directory, classes, CategoryMapping::SingleClass)
}

pub fn load_dataset_dicts_with<P: AsRef<Path>>(directory: P, classes: &[String],
                                               mapping: CategoryMapping) -> Result<Vec<DatasetRecord>> {
    let directory = directory.as_ref();
    let json_files = list_json_files(directory)?;

    let mut dataset_dicts = Vec::with_capacity(json_files.len());
    for json_file in json_files {
        let record = load_record(directory, &json_file, classes, mapping)
            .with_context(|| format!("Failed to load annotations from {}", json_file.display()))?;
        dataset_dicts.push(record);
    }

    log::debug!("Loaded {} records from {}", dataset_dicts.len(), directory.display());
    Ok(dataset_dicts)
}

fn list_json_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(directory)
        .with_context(|| format!("Failed to read dataset directory {}", directory.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_json = path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_record(directory: &Path, json_file: &Path, classes: &[String],
               mapping: CategoryMapping) -> Result<DatasetRecord> {
    let text = std::fs::read_to_string(json_file)?;
    let img_anns: LabelmeFile = serde_json::from_str(&text)?;

    let annotations = img_anns.shapes
        .iter()
        .enumerate()
        .map(|(i, shape)| to_object(shape, classes, mapping)
            .with_context(|| format!("Invalid shape #{}", i)))
        .collect::<Result<Vec<_>>>()?;

    let image_id = json_file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(DatasetRecord {
        file_name: directory.join(&img_anns.image_path).to_string_lossy().into_owned(),
        image_id,
        height: img_anns.image_height,
        width: img_anns.image_width,
        annotations,
    })
}

fn to_object(shape: &LabelmeShape, classes: &[String], mapping: CategoryMapping) -> Result<ObjectAnnotation> {
    let points: Vec<(f32, f32)> = shape.points.iter().map(|p| (p[0], p[1])).collect();
    let bbox = BvrBox::from_points(&points).ok_or_else(|| anyhow!("Shape has no points"))?;
    let poly: Vec<f32> = points.iter().flat_map(|&(x, y)| [x, y]).collect();

    let category_id = match mapping {
        CategoryMapping::SingleClass => 0,
        CategoryMapping::ByLabel => match classes.iter().position(|c| *c == shape.label) {
            Some(id) => id,
            None => bail!("Label '{}' is not one of {:?}", shape.label, classes),
        },
    };

    Ok(ObjectAnnotation {
        bbox,
        bbox_mode: BoxMode::XyxyAbs,
        segmentation: vec![poly],
        category_id,
        iscrowd: 0,
    })
}
