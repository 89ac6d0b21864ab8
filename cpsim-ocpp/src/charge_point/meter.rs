//! Metering generator
//!
//! Emits one synthetic sample set per interval while a transaction meters:
//! voltage, current, active power and the cumulative energy register for
//! the single-phase outlet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::SessionHandle;
use super::CHARGING_CONNECTOR;
use crate::config::MeterProfile;
use crate::ocpp::*;

/// Context attached to every sampled value
const SAMPLE_CONTEXT: ReadingContext = ReadingContext::TransactionBegin;

/// Build the sample set for one meter tick
pub fn sample(profile: &MeterProfile, energy_wh: u64, timestamp: DateTime<Utc>) -> MeterValue {
    let reading = |value: String, measurand, unit, phase| SampledValue {
        value,
        context: Some(SAMPLE_CONTEXT),
        measurand: Some(measurand),
        phase,
        location: Some(Location::Outlet),
        unit: Some(unit),
    };

    MeterValue {
        timestamp,
        sampled_value: vec![
            reading(
                format!("{:.1}", profile.voltage_v),
                Measurand::Voltage,
                UnitOfMeasure::V,
                Some(Phase::L1),
            ),
            reading(
                format!("{:.2}", profile.current_a),
                Measurand::CurrentImport,
                UnitOfMeasure::A,
                Some(Phase::L1),
            ),
            reading(
                format!("{:.0}", profile.power_w),
                Measurand::PowerActiveImport,
                UnitOfMeasure::W,
                None,
            ),
            reading(
                energy_wh.to_string(),
                Measurand::EnergyActiveImportRegister,
                UnitOfMeasure::Wh,
                None,
            ),
        ],
    }
}

/// Sample loop for one transaction
pub struct MeterGenerator {
    client: OcppClient,
    session: Arc<SessionHandle>,
    profile: MeterProfile,
    interval: Duration,
    cancel: CancellationToken,
}

impl MeterGenerator {
    pub fn new(
        client: OcppClient,
        session: Arc<SessionHandle>,
        profile: MeterProfile,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            session,
            profile,
            interval,
            cancel,
        }
    }

    /// Send samples until metering stops, returning the number sent
    ///
    /// The wait between samples ends early when `meter_running` turns false,
    /// so a stop never lets another sample through.
    pub async fn run(&self, transaction_id: i32) -> Result<u32, OcppError> {
        let mut running = self.session.watch_meter();
        let mut sent = 0;

        info!("Metering started for transaction {}", transaction_id);

        loop {
            let Some(energy_wh) = self
                .session
                .next_reading(transaction_id, self.profile.energy_step_wh)
            else {
                break;
            };

            let request = MeterValuesRequest {
                connector_id: CHARGING_CONNECTOR,
                transaction_id: Some(transaction_id),
                meter_value: vec![sample(&self.profile, energy_wh, Utc::now())],
            };
            self.client.call(request).await?;
            sent += 1;
            debug!("Meter sample {} Wh sent for transaction {}", energy_wh, transaction_id);

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = async { let _ = running.wait_for(|running| !*running).await; } => break,
                _ = self.cancel.cancelled() => break,
            }
        }

        info!(
            "Metering stopped for transaction {} after {} samples",
            transaction_id, sent
        );
        Ok(sent)
    }
}
