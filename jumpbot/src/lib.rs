pub mod checkpoint;
pub mod config;
pub mod environment;
pub mod learn;
pub mod log;
pub mod ml_model;
pub mod preprocess;
