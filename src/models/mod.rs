//! Data layer for the fleet manager core.

pub mod registry;

pub use registry::{Registry, RegistryDeployment, RegistryStatus};
