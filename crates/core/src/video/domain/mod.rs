pub mod frame_source;
pub mod overlay;
pub mod overlay_sink;
pub mod video_error;
