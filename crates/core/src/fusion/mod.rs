pub mod frame_outcome;
pub mod fusion_config;
pub mod fusion_controller;
