pub mod fsm;
mod processor;

pub use fsm::{FailureKind, ReceiptEvent, ReceiptState, ReceiptStateMachine};
pub use processor::{IMAGE_MEDIA_PREFIX, ProcessedReceipt, ReceiptProcessor};
