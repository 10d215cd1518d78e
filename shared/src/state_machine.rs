//! Request State Machine
//!
//! Tracks one configuration request from arrival to its terminal state.

/// Lifecycle states of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Message accepted from the bus
    Received,
    /// Looking up the target device
    Resolving,
    /// Translating the payload into operations
    Building,
    /// Pipeline running against the device
    Executing,
    /// Pipeline finished successfully
    Completed,
    /// Request rejected or pipeline aborted
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed)
    }
}

/// Events that drive a request forward
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    /// Topic and payload parsed
    Accepted,
    /// Device found and checked
    DeviceResolved,
    /// Operation list built
    PipelineBuilt { operations: usize },
    /// Every operation succeeded
    PipelineSucceeded,
    /// Any rejection or abort
    Failed { reason: String },
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(RequestState),
    /// Transition was invalid from current state
    Invalid { from: RequestState, event: RequestEvent },
}

/// State machine for a single request
#[derive(Debug)]
pub struct RequestLifecycle {
    current_state: RequestState,
    failure: Option<String>,
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLifecycle {
    /// Create a new lifecycle in Received state
    pub fn new() -> Self {
        Self {
            current_state: RequestState::Received,
            failure: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> RequestState {
        self.current_state
    }

    /// Reason recorded by the failing transition
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: RequestEvent) -> TransitionResult {
        match self.get_next_state(&event) {
            Some(state) => {
                if let RequestEvent::Failed { reason } = event {
                    self.failure = Some(reason);
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    fn get_next_state(&self, event: &RequestEvent) -> Option<RequestState> {
        use RequestState::*;

        match (self.current_state, event) {
            (Received, RequestEvent::Accepted) => Some(Resolving),
            (Resolving, RequestEvent::DeviceResolved) => Some(Building),
            (Building, RequestEvent::PipelineBuilt { .. }) => Some(Executing),
            (Executing, RequestEvent::PipelineSucceeded) => Some(Completed),

            // Any non-terminal state can fail
            (state, RequestEvent::Failed { .. }) if !state.is_terminal() => Some(Failed),

            _ => None,
        }
    }
}
