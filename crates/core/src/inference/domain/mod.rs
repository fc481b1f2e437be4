pub mod inference_backend;
pub mod inference_error;
pub mod inference_session;
