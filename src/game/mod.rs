pub mod constants;
pub mod location;
pub mod scoring;
pub mod standings;

/// Opaque per-join player identifier
pub type PlayerId = uuid::Uuid;
