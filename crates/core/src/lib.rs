pub mod detection;
pub mod fusion;
pub mod inference;
pub mod pipeline;
pub mod shared;
pub mod tracking;
pub mod video;
