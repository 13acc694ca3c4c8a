// Domain module - Error taxonomy and configuration types
pub mod config;
pub mod error;
