//! OCPP 1.6-J protocol layer
//!
//! - `types`: OCPP message payloads and the `OcppRequest` trait
//! - `messages`: JSON framing (CALL, CALLRESULT, CALLERROR)
//! - `client`: request/response correlation and inbound dispatch
//! - `connection`: WebSocket transport to the central system

pub mod types;
pub mod messages;
pub mod client;
pub mod connection;

pub use types::*;
pub use messages::*;
pub use client::{OcppClient, Router, DEFAULT_REQUEST_TIMEOUT};
pub use connection::{build_ocpp_url, Connection, OCPP_SUBPROTOCOL};
