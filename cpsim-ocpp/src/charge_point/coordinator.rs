//! Session coordinator
//!
//! Runs the boot handshake, then three concurrent activities sharing one
//! session: the initial status announcements, the heartbeat loop and the
//! supervisory loop that turns command intent into transactions.
//!
//! ```text
//!   BootNotification ──► Accepted ──┬─► StatusNotification 0/1 Available
//!                                   ├─► Heartbeat every interval
//!                                   └─► supervise (1s tick)
//!                                          │ plan_tick()
//!                                          ├─► start: Charging + StartTransaction ─► meter loop
//!                                          └─► stop:  Available + StopTransaction
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::meter::MeterGenerator;
use super::session::{SessionHandle, TickPlan};
use super::transaction::TransactionController;
use super::{commands, heartbeat, ChargePointError, CHARGING_CONNECTOR, OVERALL_CONNECTOR};
use crate::config::SimulatorConfig;
use crate::ocpp::*;

type TransactionTasks = JoinSet<Result<(), OcppError>>;

/// A single simulated charge point
#[derive(Clone)]
pub struct ChargePoint {
    config: Arc<SimulatorConfig>,
    client: OcppClient,
    session: Arc<SessionHandle>,
    transactions: Arc<TransactionController>,
    cancel: CancellationToken,
}

impl ChargePoint {
    /// Create a charge point issuing calls through `client`
    pub fn new(config: SimulatorConfig, client: OcppClient, cancel: CancellationToken) -> Self {
        let session = Arc::new(SessionHandle::new());

        let meter = MeterGenerator::new(
            client.clone(),
            session.clone(),
            config.meter.clone(),
            config.timing.meter_interval,
            cancel.clone(),
        );
        let transactions = TransactionController::new(client.clone(), session.clone(), meter);

        Self {
            config: Arc::new(config),
            client,
            session,
            transactions: Arc::new(transactions),
            cancel,
        }
    }

    /// Get a reference to the session
    pub fn session(&self) -> Arc<SessionHandle> {
        self.session.clone()
    }

    /// Command handlers for inbound central system requests
    pub fn router(&self) -> Router {
        commands::router(self.session.clone())
    }

    /// Serve inbound requests and run the session until it ends
    ///
    /// Returns `Ok(())` only when cancelled; otherwise the first fatal error.
    pub async fn serve(
        &self,
        incoming_rx: mpsc::Receiver<OcppMessage>,
    ) -> Result<(), ChargePointError> {
        tokio::select! {
            result = self.client.serve(incoming_rx, self.router()) => {
                result?;
                Ok(())
            }
            result = self.run() => result,
        }
    }

    /// Boot, then run the concurrent activities until cancelled or failed
    pub async fn run(&self) -> Result<(), ChargePointError> {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                info!("{}: session cancelled", self.config.charge_point_id());
                Ok(())
            }
            result = self.handshake_and_run() => result,
        }
    }

    async fn handshake_and_run(&self) -> Result<(), ChargePointError> {
        let heartbeat_interval = self.boot().await?;

        let heartbeats = async {
            match heartbeat_interval {
                Some(interval) => {
                    heartbeat::run(self.client.clone(), interval, self.cancel.clone()).await?;
                }
                None => debug!("Heartbeat loop not started"),
            }
            Ok::<_, ChargePointError>(())
        };

        tokio::try_join!(self.announce_initial(), heartbeats, self.supervise())?;
        Ok(())
    }

    /// Send BootNotification; only an accepted registration continues
    ///
    /// Returns the heartbeat interval, or `None` when the response carries
    /// no usable interval.
    pub async fn boot(&self) -> Result<Option<Duration>, ChargePointError> {
        let id = self.config.charge_point_id();
        let response = self.client.call(self.config.identity.boot_request()).await?;

        if response.status != RegistrationStatus::Accepted {
            error!("{}: boot notification {:?} by central system", id, response.status);
            return Err(ChargePointError::BootRejected {
                status: response.status,
            });
        }

        info!("{}: connected to central system", id);

        match response.interval.and_then(|s| u32::try_from(s).ok()).filter(|s| *s > 0) {
            Some(seconds) => {
                self.session.set_heartbeat_interval(seconds);
                info!("{}: heartbeat interval set to {}s", id, seconds);
                Ok(Some(Duration::from_secs(seconds.into())))
            }
            None => {
                warn!(
                    "{}: no usable heartbeat interval in boot response ({:?}), heartbeats disabled",
                    id, response.interval
                );
                Ok(None)
            }
        }
    }

    async fn announce(&self, connector_id: u32, status: ChargePointStatus) -> Result<(), OcppError> {
        self.session.set_connector_status(connector_id, status);
        self.client
            .call(StatusNotificationRequest::new(connector_id, status))
            .await?;
        debug!("Connector {} announced {:?}", connector_id, status);
        Ok(())
    }

    async fn announce_initial(&self) -> Result<(), ChargePointError> {
        tokio::try_join!(
            self.announce(OVERALL_CONNECTOR, ChargePointStatus::Available),
            self.announce(CHARGING_CONNECTOR, ChargePointStatus::Available),
        )?;
        Ok(())
    }

    /// Poll intent flags every tick and dispatch transaction work
    async fn supervise(&self) -> Result<(), ChargePointError> {
        let mut ticker = tokio::time::interval(self.config.timing.supervisor_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = TransactionTasks::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tasks.shutdown().await;
                    return Ok(());
                }
                Some(joined) = tasks.join_next() => {
                    joined??;
                }
                _ = ticker.tick() => {
                    let plan = self.session.plan_tick();
                    self.dispatch(plan, &mut tasks);
                }
            }
        }
    }

    fn dispatch(&self, plan: TickPlan, tasks: &mut TransactionTasks) {
        if let Some(start) = plan.start {
            debug!("Dispatching start for {}", start.id_tag);
            let cp = self.clone();
            tasks.spawn(async move {
                tokio::try_join!(
                    cp.announce(CHARGING_CONNECTOR, ChargePointStatus::Charging),
                    cp.transactions.start(start),
                )?;
                Ok(())
            });
        }

        if let Some(stop) = plan.stop {
            debug!("Dispatching stop for transaction {}", stop.transaction_id);
            let cp = self.clone();
            tasks.spawn(async move {
                tokio::try_join!(
                    cp.announce(CHARGING_CONNECTOR, ChargePointStatus::Available),
                    cp.transactions.stop(stop),
                )?;
                Ok(())
            });
        }
    }
}
