//! Shared utilities for the equity research desk
//!
//! This crate provides common functionality used across the workspace:
//! tracing subscriber setup and typed lookups of environment configuration.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_list, env_parse, env_var};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
