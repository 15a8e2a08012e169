use tracing::debug;

use super::events::RegistryEvent;
use super::states::RegistryState;

/// Rejected registry state transition
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid transition from {from} on {event}")]
pub struct StateTransitionError {
    pub from: RegistryState,
    pub event: &'static str,
}

/// Apply an event to a registry state, returning the new state.
///
/// Transitions outside the provisioning graph are rejected; callers decide
/// whether that is a retryable condition or a worker bug.
pub fn apply(
    current: RegistryState,
    event: &RegistryEvent,
) -> Result<RegistryState, StateTransitionError> {
    let target = event.target_state();
    if !current.can_transition_to(target) {
        return Err(StateTransitionError {
            from: current,
            event: event.event_type(),
        });
    }
    debug!(
        from = %current,
        to = %target,
        event = event.event_type(),
        "registry state transition"
    );
    Ok(target)
}
