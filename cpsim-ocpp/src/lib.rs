//! # Charge Point Simulator
//!
//! Simulates one OCPP 1.6 charge point talking to a central system, to
//! exercise the central system's handling of boot, heartbeats, status
//! changes, remote-started transactions and periodic metering without
//! real hardware.
//!
//! ## Architecture
//!
//! ```text
//! Central System
//!       │ WebSocket JSON-RPC (ocpp1.6)
//!       ▼
//! ┌─────────────────────────────────┐
//! │    ocpp                         │
//! │  Connection ◄► OcppClient/Router│
//! └─────────────┬───────────────────┘
//!               │ call() / on()
//!               ▼
//! ┌─────────────────────────────────┐
//! │    charge_point                 │
//! │  Coordinator │ Commands │ Meter │
//! │  Transaction │ Heartbeat        │
//! │        SessionHandle            │
//! └─────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use cpsim_ocpp::SimulatorConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SimulatorConfig::new(
//!         "cp_test",
//!         "ws://localhost:8180/steve/websocket/CentralSystemService",
//!     );
//!
//!     cpsim_ocpp::simulator::run(config, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Session
//!
//! 1. BootNotification; anything but `Accepted` ends the session
//! 2. StatusNotification `Available` for connectors 0 and 1
//! 3. Heartbeat every interval from the boot response
//! 4. RemoteStartTransaction → `Charging` + StartTransaction → MeterValues every 60s
//! 5. RemoteStopTransaction → metering stops → `Available` + StopTransaction

pub mod ocpp;
pub mod charge_point;
pub mod config;
pub mod simulator;

pub use config::{ChargePointIdentity, ConnectionConfig, MeterProfile, SimulatorConfig, Timing};
pub use charge_point::{ChargePoint, ChargePointError, SessionHandle, TransactionPhase};

// Re-export key types
pub use ocpp::{
    Action, Call, CallResult, ChargePointStatus, OcppClient, OcppError, OcppMessage, Router,
};
