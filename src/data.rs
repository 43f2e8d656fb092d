mod annotation;
mod catalog;
mod dataset_loader;
mod time_calc;

pub use annotation::*;
pub use catalog::*;
pub use dataset_loader::*;
pub use time_calc::TimeCalc;

pub use crate::detection_runners::ort_detector::input_wrapper::X;
pub use crate::detection_runners::ort_detector::y::Y;
