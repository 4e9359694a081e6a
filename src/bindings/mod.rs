//! SCPI command bindings: wiring the registry to the status and pin models.

pub mod gpio;
pub mod ieee488;
pub mod system;
