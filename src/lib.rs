// Infrastructure layer (shared components)
pub mod infrastructure;

pub use infrastructure::postgres;

// Supporting modules
pub mod config;
pub mod error;
pub mod telemetry;

// Application layer
pub mod verify;
