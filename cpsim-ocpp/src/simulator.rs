//! Top-level runner
//!
//! Wires one connection, one client and one charge point together:
//!
//! ```text
//! Central system
//!       │ WebSocket (ocpp1.6)
//!       ▼
//! ┌──────────────┐  outgoing  ┌─────────────┐
//! │  Connection  │◄───────────│  OcppClient │◄── call() from charge point loops
//! │  (run)       │───────────►│  (serve)    │──► Router ─► command handlers
//! └──────────────┘  incoming  └─────────────┘
//! ```
//!
//! Any transport failure ends the session; there is no reconnect.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::charge_point::{ChargePoint, ChargePointError};
use crate::config::SimulatorConfig;
use crate::ocpp::{Connection, OcppClient};

/// Capacity of the frame channels between connection and client
const CHANNEL_CAPACITY: usize = 64;

/// Connect and run one charge point until cancelled or failed
pub async fn run(config: SimulatorConfig, cancel: CancellationToken) -> Result<(), ChargePointError> {
    info!(
        "Starting charge point {} against {}",
        config.charge_point_id(),
        config.connection.csms_url
    );

    let connection = Connection::open(&config.connection).await?;

    let (outgoing_tx, outgoing_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (incoming_tx, incoming_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let client = OcppClient::new(outgoing_tx, config.connection.request_timeout);
    let charge_point = ChargePoint::new(config, client, cancel.clone());

    tokio::select! {
        result = connection.run(outgoing_rx, incoming_tx, cancel.clone()) => {
            result?;
            Ok(())
        }
        result = charge_point.serve(incoming_rx) => result,
    }
}
