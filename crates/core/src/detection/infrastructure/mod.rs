pub mod detector_factory;
pub mod disabled_face_detector;
pub mod ssd_face_detector;
