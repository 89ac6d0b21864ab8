//! Heartbeat loop

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ocpp::{HeartbeatRequest, OcppClient, OcppError};

/// Send a Heartbeat every `interval` until cancelled
///
/// The first heartbeat goes out immediately. A failed heartbeat ends the
/// loop with the error.
pub async fn run(
    client: OcppClient,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<(), OcppError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }

        let response = client.call(HeartbeatRequest {}).await?;
        debug!("Heartbeat acknowledged, central system time {:?}", response.current_time);
    }
}
