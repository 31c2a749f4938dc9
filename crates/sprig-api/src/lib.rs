// sprig-api: Async Rust client for the plant sensor telemetry service

pub mod client;
pub mod error;
pub mod models;
pub mod samples;
pub mod transport;

pub use client::TelemetryClient;
pub use error::Error;
pub use models::SampleRecord;
pub use transport::TransportConfig;
