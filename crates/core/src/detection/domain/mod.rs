pub mod detection;
pub mod detection_parser;
pub mod face_detector;
pub mod label_map;
pub mod output_layout;
