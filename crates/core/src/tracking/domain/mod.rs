pub mod feature_selector;
pub mod flow_estimator;
pub mod frame_ring_buffer;
pub mod optical_flow_tracker;
