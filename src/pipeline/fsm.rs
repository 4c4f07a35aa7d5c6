use crate::{Error, Result};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Failure classes a receipt request can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    UpstreamFailure,
    ProcessingFailure,
    StorageFailure,
    Internal,
}

impl From<&Error> for FailureKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::InvalidInput(_) => Self::InvalidInput,
            Error::Upstream(_) | Error::OpenAi(_) | Error::Network(_) => Self::UpstreamFailure,
            Error::Processing(_) | Error::Csv(_) => Self::ProcessingFailure,
            Error::Storage(_) | Error::Database(_) => Self::StorageFailure,
            _ => Self::Internal,
        }
    }
}

// Receipt states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptState {
    Received,
    Validated,
    Encoded,
    Extracted,
    Parsed,
    Persisted,
    Responded,
    Failed(FailureKind),
}

// Receipt events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptEvent {
    ImageAccepted,
    ImageEncoded,
    OutputReceived,
    TableParsed,
    RowsPersisted,
    ResponseSent,
    Failed(FailureKind),
}

impl fmt::Display for ReceiptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Tracks one request through
/// `Received → Validated → Encoded → Extracted → Parsed → Persisted → Responded`,
/// with a `Failed` exit from any non-terminal state.
pub struct ReceiptStateMachine {
    receipt_id: Uuid,
    state: ReceiptState,
}

impl ReceiptStateMachine {
    pub fn new(receipt_id: Uuid) -> Self {
        Self {
            receipt_id,
            state: ReceiptState::Received,
        }
    }

    pub fn receipt_id(&self) -> Uuid {
        self.receipt_id
    }

    pub fn current_state(&self) -> ReceiptState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ReceiptState::Responded | ReceiptState::Failed(_)
        )
    }

    pub fn transition(&mut self, event: ReceiptEvent) -> Result<ReceiptState> {
        let old_state = self.state;

        let new_state = match (old_state, event) {
            (ReceiptState::Received, ReceiptEvent::ImageAccepted) => ReceiptState::Validated,
            (ReceiptState::Validated, ReceiptEvent::ImageEncoded) => ReceiptState::Encoded,
            (ReceiptState::Encoded, ReceiptEvent::OutputReceived) => ReceiptState::Extracted,
            (ReceiptState::Extracted, ReceiptEvent::TableParsed) => ReceiptState::Parsed,
            (ReceiptState::Parsed, ReceiptEvent::RowsPersisted) => ReceiptState::Persisted,
            (ReceiptState::Persisted, ReceiptEvent::ResponseSent) => ReceiptState::Responded,
            (state, ReceiptEvent::Failed(kind))
                if !matches!(state, ReceiptState::Responded | ReceiptState::Failed(_)) =>
            {
                ReceiptState::Failed(kind)
            }
            _ => {
                warn!(
                    receipt_id = %self.receipt_id,
                    "Invalid receipt transition from {:?} with event {:?}", old_state, event
                );
                return Err(Error::internal(format!(
                    "Invalid transition from {old_state:?} with event {event:?}"
                )));
            }
        };

        match new_state {
            ReceiptState::Failed(_) => {
                warn!(receipt_id = %self.receipt_id, "Receipt state: {} -> {}", old_state, new_state)
            }
            ReceiptState::Responded => {
                info!(receipt_id = %self.receipt_id, "Receipt state: {} -> {}", old_state, new_state)
            }
            _ => {
                debug!(receipt_id = %self.receipt_id, "Receipt state: {} -> {}", old_state, new_state)
            }
        }

        self.state = new_state;
        Ok(new_state)
    }

    /// Records `error` as the terminal state and hands it back.
    pub fn fail(&mut self, error: Error) -> Error {
        if let Err(transition_error) = self.transition(ReceiptEvent::Failed((&error).into())) {
            debug!("Ignoring failure transition: {}", transition_error);
        }
        error
    }
}
