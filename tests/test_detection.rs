extern crate bvr_segment;

use std::path::Path;
use std::time::Instant;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use bvr_segment::common::{InferenceDevice, ModelConfig, ZooModel};

/// Needs an exported model and an ONNX Runtime build on disk.
#[cfg(test)]
#[ignore]
#[tokio::test]
async fn detection() {
    /////////////////////
    // Testing variables
    let loop_count: u32 = 5;
    let onnx_path = "../models/mask_rcnn/model_final.onnx".to_string();
    let lib_path = "../onnxruntime/linux_x64_gpu/libonnxruntime.so.1.20.1".to_string();
    let data_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data");
    let image_path = "../test_images/stop_sign.jpg";
    /////////////////////

    let classes = vec!["stop_sign".to_string()];
    bvr_segment::register_datasets(&data_path, &classes).unwrap();

    let train_cfg = bvr_segment::build_train_config(ZooModel::MaskRcnnR50Fpn3x, classes.len()).unwrap();
    let cfg = bvr_segment::build_inference_config(&train_cfg, "./output/").unwrap();

    let model_details = ModelConfig::new(onnx_path, lib_path, InferenceDevice::CUDA(0));

    let mut detector = match bvr_segment::init_detector(&cfg, &model_details) {
        Ok(detector) => detector,
        _ => panic!("Failed to initialize Mask R-CNN model")
    };

    let frame = image::open(Path::new(env!("CARGO_MANIFEST_DIR")).join(image_path)).unwrap().to_rgb8();
    let now = Instant::now();
    let mut elapsed = now.elapsed();

    for count in 0..loop_count {
        let result = bvr_segment::detect_signs(&mut detector, &frame).unwrap();

        assert_eq!(result.mask_array.dim(), (frame.height() as usize, frame.width() as usize, result.num_instances()));
        assert_eq!(result.scores.len(), result.num_instances());
        assert!(result.scores.iter().all(|s| *s >= 90 && *s <= 100));

        if count == 0 && result.num_instances() > 0 {
            let mut img = result.overlay.clone();
            for i in detector.last_instances() {
                let (x, y, w, h) = i.bbox.as_xy_wh_i32();
                let rect = Rect::at(x, y).of_size(w.max(1) as u32, h.max(1) as u32);
                draw_hollow_rect_mut(&mut img, rect, Rgb([255, 0, 0]));
            }
            img.save("tests/test_output.jpg").unwrap();
        }

        println!("Scores: {:?}", result.scores);
        println!("TIME | Total={:.2?} | {}th detection={:.2?}", now.elapsed(), count, now.elapsed() - elapsed);
        println!("Detected {} signs\n", result.num_instances());
        elapsed = now.elapsed();
    }
}
