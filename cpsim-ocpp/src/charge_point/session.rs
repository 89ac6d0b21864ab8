//! Charge point session state
//!
//! The one stateful entity of a running charge point:
//! - connector statuses and the heartbeat interval from boot
//! - intent flags set by inbound commands
//! - the active transaction and the cumulative energy register
//!
//! Inbound commands write intent, the supervisory loop turns intent into
//! action. Every check-and-clear of an intent flag happens under a single
//! lock acquisition.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ocpp::ChargePointStatus;

/// Logical state of the supervisory loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// No transaction
    Idle,
    /// StartTransaction sent, awaiting transaction id
    Starting,
    /// Transaction id known, metering may be running
    Charging,
    /// StopTransaction sent
    Stopping,
}

/// Session fields
#[derive(Debug, Clone)]
pub struct Session {
    pub connector_states: BTreeMap<u32, ChargePointStatus>,
    pub heartbeat_interval: Option<u32>,
    pub pending_start: bool,
    pub pending_stop: bool,
    pub id_tag: Option<String>,
    pub transaction_id: Option<i32>,
    pub energy_wh: u64,
    pub phase: TransactionPhase,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            connector_states: BTreeMap::new(),
            heartbeat_interval: None,
            pending_start: false,
            pending_stop: false,
            id_tag: None,
            transaction_id: None,
            energy_wh: 0,
            phase: TransactionPhase::Idle,
        }
    }
}

/// Work for a StartTransaction dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPlan {
    pub id_tag: String,
    pub meter_start: u64,
}

/// Work for a StopTransaction dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPlan {
    pub transaction_id: i32,
    pub id_tag: Option<String>,
    pub meter_stop: u64,
}

/// What one supervisory tick has to dispatch
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickPlan {
    pub start: Option<StartPlan>,
    pub stop: Option<StopPlan>,
}

impl TickPlan {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.stop.is_none()
    }
}

/// Shared handle to the session
pub struct SessionHandle {
    state: Mutex<Session>,
    meter_running: watch::Sender<bool>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (meter_running, _) = watch::channel(false);
        Self {
            state: Mutex::new(Session::default()),
            meter_running,
        }
    }

    /// Copy of the current session fields
    pub fn snapshot(&self) -> Session {
        self.state.lock().clone()
    }

    /// Whether metered samples should keep being produced
    pub fn meter_running(&self) -> bool {
        *self.meter_running.borrow()
    }

    /// Receiver observing `meter_running` changes
    pub fn watch_meter(&self) -> watch::Receiver<bool> {
        self.meter_running.subscribe()
    }

    /// Record the heartbeat interval from boot; later calls are ignored
    pub fn set_heartbeat_interval(&self, seconds: u32) {
        let mut state = self.state.lock();
        match state.heartbeat_interval {
            None => state.heartbeat_interval = Some(seconds),
            Some(current) => warn!(
                "Heartbeat interval already set to {}s, ignoring {}s",
                current, seconds
            ),
        }
    }

    pub fn set_connector_status(&self, connector_id: u32, status: ChargePointStatus) {
        self.state.lock().connector_states.insert(connector_id, status);
    }

    pub fn connector_status(&self, connector_id: u32) -> Option<ChargePointStatus> {
        self.state.lock().connector_states.get(&connector_id).copied()
    }

    /// Remote start intent
    pub fn request_start(&self, id_tag: String) {
        let mut state = self.state.lock();
        state.id_tag = Some(id_tag);
        state.pending_start = true;
    }

    /// Remote stop intent; metering stops right away
    pub fn request_stop(&self) {
        let mut state = self.state.lock();
        self.meter_running.send_replace(false);
        state.pending_stop = true;
    }

    /// Take the intent flags for one supervisory tick
    ///
    /// Start is considered before stop. A start is only dispatched from
    /// `Idle` and otherwise stays pending. A stop is dispatched from
    /// `Charging`, waits while `Starting`, and is dropped when there is no
    /// transaction to stop.
    pub fn plan_tick(&self) -> TickPlan {
        let mut state = self.state.lock();
        let mut plan = TickPlan::default();

        if state.pending_start {
            match (state.phase, state.id_tag.clone()) {
                (TransactionPhase::Idle, Some(id_tag)) => {
                    state.pending_start = false;
                    state.phase = TransactionPhase::Starting;
                    plan.start = Some(StartPlan {
                        id_tag,
                        meter_start: state.energy_wh,
                    });
                }
                (TransactionPhase::Idle, None) => {
                    state.pending_start = false;
                    warn!("Start requested without an id tag, ignoring");
                }
                (phase, _) => {
                    debug!("Start deferred while transaction is {:?}", phase);
                }
            }
        }

        if state.pending_stop {
            match (state.phase, state.transaction_id) {
                (TransactionPhase::Charging, Some(transaction_id)) => {
                    state.pending_stop = false;
                    state.phase = TransactionPhase::Stopping;
                    plan.stop = Some(StopPlan {
                        transaction_id,
                        id_tag: state.id_tag.clone(),
                        meter_stop: state.energy_wh,
                    });
                }
                (TransactionPhase::Starting, _) => {
                    debug!("Stop deferred until transaction id is assigned");
                }
                (phase, _) => {
                    state.pending_stop = false;
                    warn!("Stop requested with no active transaction ({:?}), ignoring", phase);
                }
            }
        }

        plan
    }

    /// StartTransaction accepted by the central system
    ///
    /// Returns whether metering should begin; it does not if a stop was
    /// requested while the start was in flight.
    pub fn transaction_started(&self, transaction_id: i32) -> bool {
        let mut state = self.state.lock();
        state.transaction_id = Some(transaction_id);
        state.phase = TransactionPhase::Charging;

        if state.pending_stop {
            info!("Transaction {} started with a stop already pending", transaction_id);
            false
        } else {
            self.meter_running.send_replace(true);
            true
        }
    }

    /// StopTransaction acknowledged by the central system
    pub fn transaction_stopped(&self) {
        let mut state = self.state.lock();
        state.phase = TransactionPhase::Idle;
        self.meter_running.send_replace(false);
    }

    /// Register value for the next sample of `transaction_id`
    ///
    /// Returns `None` once metering has stopped or the transaction changed.
    /// The register advances by `step_wh` after the value is read.
    pub fn next_reading(&self, transaction_id: i32, step_wh: u64) -> Option<u64> {
        let mut state = self.state.lock();
        if !self.meter_running() || state.transaction_id != Some(transaction_id) {
            return None;
        }

        let reading = state.energy_wh;
        state.energy_wh += step_wh;
        Some(reading)
    }

    pub fn energy_wh(&self) -> u64 {
        self.state.lock().energy_wh
    }

    pub fn phase(&self) -> TransactionPhase {
        self.state.lock().phase
    }
}
