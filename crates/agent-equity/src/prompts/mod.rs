//! Role prompts and context templates
//!
//! - `system`: the fixed instruction for each role
//! - `context`: templates that shape collected data into the user message

pub mod context;
pub mod system;

pub use context::render;
