//! # Component Container
//!
//! Builds the three components and their adapters from a [`StackConfig`]
//! and holds them for the lifetime of the runtime.

pub mod config;
pub mod stack;

pub use config::{ConfigError, StackConfig};
pub use stack::{CardEmulationStack, ResolutionEngine, RoutingSynthesizer};
