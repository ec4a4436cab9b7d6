// ABOUTME: Root library module for the quickchat binary
// ABOUTME: Exposes application wiring and logging, and re-exports core config and paths

pub mod app;
pub mod logging;

// Re-export platform-agnostic modules from quickchat-core
pub use quickchat_core::config;
pub use quickchat_core::paths;

pub use app::App;
