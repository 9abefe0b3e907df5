//! # Core Module
//!
//! Shared configuration for the visibility core. Subsystems take their
//! settings as explicit structs from here rather than reading globals.

pub mod config;

// Re-export commonly used config types
pub use config::{
    CullingConfig,
    Config,
    ConfigError,
    MAX_FRAMES_IN_FLIGHT,
};
