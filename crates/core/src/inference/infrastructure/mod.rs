pub mod execution_provider;
pub mod ort_backend;
