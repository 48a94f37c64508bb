//! Trade Worker: pops admitted requests and drives each trade end-to-end.
//!
//! ```text
//!   NavigatingMenu ─► SelectingItem ─► AwaitingRoomCode ─► WaitingForCounterparty
//!         │               │  ▲ cancel?        │                 │  cancel? / comm error?
//!         ▼               ▼                   ▼                 ▼
//!   UnexpectedState   Cancelled         UnexpectedState   Completed | TimedOut | Cancelled
//!                                                          | CommunicationError | UnexpectedState
//! ```

pub mod screens;
mod trade;

pub use trade::TradeWorker;

use crate::queue::Finish;

pub const MSG_NO_TRADE_SCREEN: &str = "Unable to open trade screen.";
pub const MSG_CANCELLED: &str = "Trade cancelled by user.";
pub const MSG_NO_ROOM_CODE: &str = "Unable to retrieve room code.";
pub const MSG_COMMUNICATION_ERROR: &str = "There was a communication error. Retrying.";
pub const MSG_SUCCESS: &str = "Trade successful.";
pub const MSG_NO_MAIN_MENU: &str = "I think the trade was successful, but something broke.";
pub const MSG_UNEXPECTED_STATE: &str = "Trade failed due to an unexpected state.";
pub const MSG_TIMED_OUT: &str = "Trade cancelled due to timeout.";
pub const MSG_RETRIES_EXHAUSTED: &str = "Trade failed after repeated communication errors.";
pub const MSG_NO_ROUTE: &str = "That item cannot be reached from the trade list.";

/// How one trade attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOutcome {
    Completed,
    Cancelled,
    TimedOut,
    /// Transient game-side fault; the same request is attempted again.
    CommunicationError,
    /// A wait did not see the expected screen.
    UnexpectedState { message: &'static str },
}

impl TradeOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            TradeOutcome::Completed => MSG_SUCCESS,
            TradeOutcome::Cancelled => MSG_CANCELLED,
            TradeOutcome::TimedOut => MSG_TIMED_OUT,
            TradeOutcome::CommunicationError => MSG_COMMUNICATION_ERROR,
            TradeOutcome::UnexpectedState { message } => message,
        }
    }

    /// Terminal status reported to the Manager.
    pub fn finish(&self) -> Finish {
        match self {
            TradeOutcome::Completed => Finish::Completed,
            TradeOutcome::Cancelled => Finish::Cancelled,
            TradeOutcome::TimedOut => Finish::TimedOut,
            TradeOutcome::CommunicationError | TradeOutcome::UnexpectedState { .. } => {
                Finish::Failed
            }
        }
    }
}
