use std::collections::HashMap;
use std::sync::Arc;
use anyhow::{bail, Result};
use image::Rgb;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use crate::data::annotation::DatasetRecord;

type DatasetLoader = Arc<dyn Fn() -> Result<Vec<DatasetRecord>> + Send + Sync>;

static DATASETS: Lazy<RwLock<HashMap<String, DatasetLoader>>> = Lazy::new(|| RwLock::new(HashMap::new()));
static METADATA: Lazy<RwLock<HashMap<String, Metadata>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Process-wide map from dataset name to a function producing its records.
///
/// Loaders run on every [`DatasetCatalog::get`], so registration itself never touches the disk.
pub struct DatasetCatalog;

impl DatasetCatalog {
    pub fn register<F>(name: &str, loader: F) -> Result<()>
    where
        F: Fn() -> Result<Vec<DatasetRecord>> + Send + Sync + 'static,
    {
        let mut datasets = DATASETS.write();
        if datasets.contains_key(name) {
            bail!("Dataset '{}' is already registered!", name);
        }
        datasets.insert(name.to_string(), Arc::new(loader));
        log::info!("Registered dataset '{}'", name);
        Ok(())
    }

    pub fn get(name: &str) -> Result<Vec<DatasetRecord>> {
        // The lock is released before loading so loaders may use the catalog themselves.
        let loader = DATASETS.read().get(name).cloned();
        let Some(loader) = loader else {
            bail!(
                "Dataset '{}' is not registered! Available datasets are: {}",
                name,
                Self::list().join(", ")
            );
        };
        loader()
    }

    pub fn list() -> Vec<String> {
        let mut names: Vec<String> = DATASETS.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(name: &str) -> bool {
        DATASETS.read().contains_key(name)
    }

    pub fn remove(name: &str) -> bool {
        DATASETS.write().remove(name).is_some()
    }

    pub fn clear() {
        DATASETS.write().clear();
    }
}

/// Per-dataset information that is not part of the records, e.g. class names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub name: String,
    pub thing_classes: Vec<String>,
    pub thing_colors: Option<Vec<Rgb<u8>>>,
}

impl Metadata {
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.thing_classes.get(class_id).map(String::as_str)
    }
}

/// Process-wide map from dataset name to [`Metadata`].
pub struct MetadataCatalog;

impl MetadataCatalog {
    /// Returns the metadata of `name`, creating an empty entry the first time a name is seen.
    pub fn get(name: &str) -> Metadata {
        if let Some(metadata) = METADATA.read().get(name) {
            return metadata.clone();
        }
        METADATA.write()
            .entry(name.to_string())
            .or_insert_with(|| Metadata { name: name.to_string(), ..Default::default() })
            .clone()
    }

    pub fn set_thing_classes(name: &str, classes: &[String]) {
        Self::update(name, |metadata| metadata.thing_classes = classes.to_vec());
    }

    pub fn set_thing_colors(name: &str, colors: &[Rgb<u8>]) {
        Self::update(name, |metadata| metadata.thing_colors = Some(colors.to_vec()));
    }

    pub fn remove(name: &str) -> bool {
        METADATA.write().remove(name).is_some()
    }

    fn update<F: FnOnce(&mut Metadata)>(name: &str, f: F) {
        let mut metadata = METADATA.write();
        let entry = metadata
            .entry(name.to_string())
            .or_insert_with(|| Metadata { name: name.to_string(), ..Default::default() });
        f(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Names are unique per test since the catalogs are shared by the whole test binary.

    #[test]
    fn register_and_get() {
        DatasetCatalog::register("catalog_test_get", || Ok(vec![])).unwrap();
        assert!(DatasetCatalog::contains("catalog_test_get"));
        assert!(DatasetCatalog::get("catalog_test_get").unwrap().is_empty());
        assert!(DatasetCatalog::remove("catalog_test_get"));
        assert!(!DatasetCatalog::contains("catalog_test_get"));
    }

    #[test]
    fn duplicate_registration_fails() {
        DatasetCatalog::register("catalog_test_dup", || Ok(vec![])).unwrap();
        assert!(DatasetCatalog::register("catalog_test_dup", || Ok(vec![])).is_err());
        DatasetCatalog::remove("catalog_test_dup");
    }

    #[test]
    fn unknown_dataset_fails() {
        let err = DatasetCatalog::get("catalog_test_missing").unwrap_err();
        assert!(err.to_string().contains("catalog_test_missing"));
    }

    #[test]
    fn metadata_created_on_first_get() {
        let metadata = MetadataCatalog::get("catalog_test_meta");
        assert_eq!(metadata.name, "catalog_test_meta");
        assert!(metadata.thing_classes.is_empty());

        MetadataCatalog::set_thing_classes("catalog_test_meta", &["stop_sign".to_string()]);
        assert_eq!(MetadataCatalog::get("catalog_test_meta").class_name(0), Some("stop_sign"));
        assert_eq!(MetadataCatalog::get("catalog_test_meta").class_name(1), None);
        MetadataCatalog::remove("catalog_test_meta");
    }

    #[test]
    fn thing_colors_are_kept_with_classes() {
        MetadataCatalog::set_thing_classes("catalog_test_colors", &["stop_sign".to_string()]);
        MetadataCatalog::set_thing_colors("catalog_test_colors", &[Rgb([200, 0, 0])]);

        let metadata = MetadataCatalog::get("catalog_test_colors");
        assert_eq!(metadata.thing_colors, Some(vec![Rgb([200, 0, 0])]));
        assert_eq!(metadata.class_name(0), Some("stop_sign"));
        MetadataCatalog::remove("catalog_test_colors");
    }
}
