//! Core functionality module
//!
//! This module contains the machinery every run goes through: configuration,
//! error types, the worker pool and the pipeline coordinator.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `pool` - Fixed-size worker pool with a bounded job queue
//! - `pipeline` - Two-phase hash-then-materialize coordinator

pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
