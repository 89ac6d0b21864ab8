//! Charge point core
//!
//! - `session`: shared session state and intent planning
//! - `commands`: inbound command handlers
//! - `meter`: synthetic sample generation
//! - `transaction`: StartTransaction / StopTransaction lifecycle
//! - `heartbeat`: liveness loop
//! - `coordinator`: boot handshake and supervisory loop

pub mod session;
pub mod commands;
pub mod meter;
pub mod transaction;
pub mod heartbeat;
pub mod coordinator;

use thiserror::Error;

use crate::ocpp::{OcppError, RegistrationStatus};

pub use coordinator::ChargePoint;
pub use session::{Session, SessionHandle, TransactionPhase};

/// Connector 0 stands for the charge point as a whole
pub const OVERALL_CONNECTOR: u32 = 0;

/// The single charging outlet
pub const CHARGING_CONNECTOR: u32 = 1;

/// Fatal session outcomes
#[derive(Debug, Error)]
pub enum ChargePointError {
    #[error("Boot notification not accepted: {status:?}")]
    BootRejected { status: RegistrationStatus },

    #[error(transparent)]
    Protocol(#[from] OcppError),

    #[error("Session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
