// ABOUTME: Library root for dockhand - build strategies, the deployment pipeline, and its control surface.
// ABOUTME: The CLI binary is in main.rs.

pub mod build;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod runtime;
pub mod types;
pub mod webhook;
