pub mod ffmpeg_frame_source;
pub mod json_lines_sink;
pub mod overlay_drawing;
pub mod png_sequence_sink;
