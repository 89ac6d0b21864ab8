//! Transaction controller
//!
//! Drives StartTransaction / StopTransaction for the charging connector and
//! owns the metering run in between.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::meter::MeterGenerator;
use super::session::{SessionHandle, StartPlan, StopPlan};
use super::CHARGING_CONNECTOR;
use crate::ocpp::*;

pub struct TransactionController {
    client: OcppClient,
    session: Arc<SessionHandle>,
    meter: MeterGenerator,
}

impl TransactionController {
    pub fn new(client: OcppClient, session: Arc<SessionHandle>, meter: MeterGenerator) -> Self {
        Self {
            client,
            session,
            meter,
        }
    }

    /// Start a transaction and meter it until stopped
    ///
    /// Returns only after the sample loop exits, so the caller's task spans
    /// the whole charging session.
    pub async fn start(&self, plan: StartPlan) -> Result<(), OcppError> {
        let request = StartTransactionRequest {
            connector_id: CHARGING_CONNECTOR,
            id_tag: plan.id_tag.clone(),
            meter_start: plan.meter_start,
            timestamp: Utc::now(),
            reservation_id: None,
        };

        let response = self.client.call(request).await?;
        let transaction_id = response.transaction_id;

        if response.id_tag_info.status != AuthorizationStatus::Accepted {
            warn!(
                "Id tag {} not accepted ({:?}) for transaction {}, continuing",
                plan.id_tag, response.id_tag_info.status, transaction_id
            );
        }

        info!(
            "Transaction {} started for {} at {} Wh",
            transaction_id, plan.id_tag, plan.meter_start
        );

        if self.session.transaction_started(transaction_id) {
            self.meter.run(transaction_id).await?;
        }

        Ok(())
    }

    /// Stop the transaction described by `plan`
    pub async fn stop(&self, plan: StopPlan) -> Result<(), OcppError> {
        let request = StopTransactionRequest {
            transaction_id: plan.transaction_id,
            id_tag: plan.id_tag,
            meter_stop: plan.meter_stop,
            timestamp: Utc::now(),
            reason: Some(StopReason::Remote),
        };

        self.client.call(request).await?;
        self.session.transaction_stopped();

        info!(
            "Transaction {} stopped at {} Wh",
            plan.transaction_id, plan.meter_stop
        );
        Ok(())
    }
}
