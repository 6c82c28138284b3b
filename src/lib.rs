pub mod agent;
pub mod config;
pub mod export;
pub mod rotator;
pub mod source;
pub mod stats;
