//! # Registry Provisioning State Machine
//!
//! States, events, and transition rules for the registry provisioning
//! lifecycle: `PROVISIONING` → `SCHEDULED` → `TENANT_PROVISIONED` →
//! `AVAILABLE`, with `FAILED` reachable from every live state through
//! compensation.

pub mod events;
pub mod states;
pub mod transitions;

pub use events::RegistryEvent;
pub use states::RegistryState;
pub use transitions::{apply, StateTransitionError};
