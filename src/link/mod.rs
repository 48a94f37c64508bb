//! Controller link: automation client and device endpoint.
//!
//! ```text
//!   ScriptRunner ──► LinkClient ──tcp──► host::serve ──► Arbiter ──► ReportSink
//!                                                          ▲          (/dev/hidg0)
//!                                       live gamepad ──────┘
//! ```
//!
//! The endpoint owns the arbitration mode. While a human holds the
//! controller every automated write is answered `USER_OVERRIDE`; the client
//! blocks until the endpoint sends `HOST_ENABLED` and then resends the same
//! request.

mod client;
pub mod host;
mod protocol;

pub use client::{ControllerSink, LinkClient};
pub use protocol::{
    repeat_count, Buttons, ControllerCommand, DPad, Opcode, Report, Request, Response, Stick,
    NEUTRAL_REPORT, REPORT_LEN, REPORT_PERIOD,
};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("link closed by peer")]
    Closed,
    #[error("unexpected response 0x{got:02x} while waiting for {expected}")]
    UnexpectedResponse { expected: &'static str, got: u8 },
    #[error("unknown request opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("device endpoint reported an error")]
    Device,
    #[error("device endpoint stopped")]
    Stopped,
}
