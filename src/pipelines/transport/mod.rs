// SPDX-License-Identifier: GPL-3.0-only

//! Point-to-point result transport over TCP
//!
//! ```text
//! TransportChannel ──(one connection per message)──► ResultListener
//! ```

pub mod channel;
pub mod framing;
pub mod listener;
pub mod payload;

pub use channel::{SendStatus, TransportChannel};
pub use framing::Framing;
pub use listener::{LastReceived, ReceivedResult, ResultListener};
pub use payload::TransportPayload;
