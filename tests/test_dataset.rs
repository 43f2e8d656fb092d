use std::path::{Path, PathBuf};
use bvr_segment::data::{load_dataset_dicts, load_dataset_dicts_with, BoxMode, CategoryMapping, DatasetCatalog, MetadataCatalog};

fn data_dir(sub: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(sub)
}

fn classes() -> Vec<String> {
    vec!["stop_sign".to_string()]
}

#[test]
fn one_record_per_json_file() {
    let records = load_dataset_dicts(data_dir("train"), &classes()).unwrap();

    // notes.txt is skipped
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].image_id, "stop1");
    assert_eq!(records[1].image_id, "stop2");
    assert_eq!(records[0].file_name, data_dir("train").join("stop1.jpg").to_string_lossy());
    assert_eq!(records[0].height, Some(48));
    assert_eq!(records[0].width, Some(64));
    assert_eq!(records[1].height, None);
}

#[test]
fn square_polygon_gives_expected_bbox() {
    let records = load_dataset_dicts(data_dir("train"), &classes()).unwrap();
    let obj = &records[0].annotations[0];

    assert_eq!(obj.bbox.xyxy(), [10., 10., 20., 20.]);
    assert_eq!(obj.bbox_mode, BoxMode::XyxyAbs);
    assert_eq!(obj.segmentation, vec![vec![10., 10., 10., 20., 20., 20., 20., 10.]]);
    assert_eq!(obj.category_id, 0);
    assert_eq!(obj.iscrowd, 0);
}

#[test]
fn bbox_is_min_max_of_points() {
    let records = load_dataset_dicts(data_dir("train"), &classes()).unwrap();
    let annotations = &records[1].annotations;

    assert_eq!(annotations.len(), 2);
    assert_eq!(annotations[0].bbox.xyxy(), [28.0, 4.0, 41.25, 22.75]);
    assert_eq!(annotations[1].bbox.xyxy(), [0., 30., 12., 44.]);
    assert_eq!(annotations[1].segmentation[0].len(), 10);
}

#[test]
fn directory_without_json_is_empty() {
    let records = load_dataset_dicts(data_dir("empty"), &classes()).unwrap();
    assert!(records.is_empty());
}

#[test]
fn malformed_json_fails() {
    let err = load_dataset_dicts(data_dir("broken"), &classes()).unwrap_err();
    assert!(format!("{:#}", err).contains("bad.json"));
}

#[test]
fn missing_shapes_key_fails() {
    assert!(load_dataset_dicts(data_dir("missing_shapes"), &classes()).is_err());
}

#[test]
fn missing_directory_fails() {
    assert!(load_dataset_dicts(data_dir("does_not_exist"), &classes()).is_err());
}

#[test]
fn labels_are_ignored_unless_mapped() {
    let classes = vec!["stop_sign".to_string(), "yield".to_string()];

    let records = load_dataset_dicts(data_dir("multi_class"), &classes).unwrap();
    let ids: Vec<usize> = records[0].annotations.iter().map(|a| a.category_id).collect();
    assert_eq!(ids, vec![0, 0]);

    let records = load_dataset_dicts_with(data_dir("multi_class"), &classes, CategoryMapping::ByLabel).unwrap();
    let ids: Vec<usize> = records[0].annotations.iter().map(|a| a.category_id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn registered_splits_load_lazily() {
    let names = bvr_segment::register_datasets(data_dir(""), &classes()).unwrap();
    assert_eq!(names, vec!["category_train", "category_test"]);

    assert_eq!(DatasetCatalog::get("category_train").unwrap().len(), 2);
    assert_eq!(DatasetCatalog::get("category_test").unwrap().len(), 1);
    assert_eq!(MetadataCatalog::get("category_train").thing_classes, classes());

    // Same names cannot be registered twice
    assert!(bvr_segment::register_datasets(data_dir(""), &classes()).is_err());
}
