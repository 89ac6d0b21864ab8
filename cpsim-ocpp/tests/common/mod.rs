//! In-memory central system for driving a charge point in tests
//!
//! Plays the connection's role: it reads the client's outgoing frames,
//! records every CALL, answers with canned responses, and injects inbound
//! commands.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use cpsim_ocpp::ocpp::{CallResult, OcppMessage};
use cpsim_ocpp::{Action, Call, ChargePoint, ChargePointError, OcppClient, SessionHandle, SimulatorConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// First transaction id handed out by the mock
pub const FIRST_TRANSACTION_ID: i32 = 55;

/// A CALL received from the charge point
#[derive(Debug, Clone)]
pub struct Recorded {
    pub at: Instant,
    pub action: Action,
    pub payload: Value,
}

pub fn boot_accepted(interval: i32) -> Value {
    json!({
        "status": "Accepted",
        "currentTime": "2026-01-20T12:00:00.000Z",
        "interval": interval,
    })
}

pub fn boot_with_status(status: &str) -> Value {
    json!({
        "status": status,
        "currentTime": "2026-01-20T12:00:00.000Z",
        "interval": 30,
    })
}

pub fn boot_without_interval() -> Value {
    json!({
        "status": "Accepted",
        "currentTime": "2026-01-20T12:00:00.000Z",
    })
}

/// Charge point running against the mock central system
pub struct Harness {
    pub session: Arc<SessionHandle>,
    pub cancel: CancellationToken,
    pub handle: JoinHandle<Result<(), ChargePointError>>,
    calls: Arc<Mutex<Vec<Recorded>>>,
    replies: Arc<Mutex<HashMap<String, oneshot::Sender<OcppMessage>>>>,
    incoming_tx: Mutex<Option<mpsc::Sender<OcppMessage>>>,
    link: CancellationToken,
}

impl Harness {
    /// Spawn a charge point with default config whose boot gets `boot`
    pub fn start(boot: Value) -> Self {
        Self::start_with(SimulatorConfig::default(), boot)
    }

    /// Spawn a charge point with `config` whose boot gets `boot`
    pub fn start_with(config: SimulatorConfig, boot: Value) -> Self {
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<OcppMessage>(64);
        let (incoming_tx, incoming_rx) = mpsc::channel::<OcppMessage>(64);

        let cancel = CancellationToken::new();
        let link = CancellationToken::new();
        let client = OcppClient::new(outgoing_tx, config.connection.request_timeout);
        let charge_point = ChargePoint::new(config, client, cancel.clone());
        let session = charge_point.session();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let replies: Arc<Mutex<HashMap<String, oneshot::Sender<OcppMessage>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        {
            let calls = calls.clone();
            let replies = replies.clone();
            let incoming_tx = incoming_tx.clone();
            let link = link.clone();
            let mut next_transaction_id = FIRST_TRANSACTION_ID;

            tokio::spawn(async move {
                loop {
                    let message = tokio::select! {
                        _ = link.cancelled() => break,
                        message = outgoing_rx.recv() => match message {
                            Some(message) => message,
                            None => break,
                        },
                    };

                    match message {
                        OcppMessage::Call(call) => {
                            calls.lock().push(Recorded {
                                at: Instant::now(),
                                action: call.action,
                                payload: call.payload.clone(),
                            });

                            let payload = match call.action {
                                Action::BootNotification => boot.clone(),
                                Action::Heartbeat => json!({"currentTime": "2026-01-20T12:00:00.000Z"}),
                                Action::StartTransaction => {
                                    let id = next_transaction_id;
                                    next_transaction_id += 1;
                                    json!({"transactionId": id, "idTagInfo": {"status": "Accepted"}})
                                }
                                Action::StopTransaction => json!({"idTagInfo": {"status": "Accepted"}}),
                                _ => json!({}),
                            };

                            let reply = CallResult::new(call.message_id, payload).unwrap();
                            if incoming_tx.send(OcppMessage::CallResult(reply)).await.is_err() {
                                break;
                            }
                        }
                        reply => {
                            let waiter = replies.lock().remove(reply.message_id());
                            if let Some(waiter) = waiter {
                                let _ = waiter.send(reply);
                            }
                        }
                    }
                }
            });
        }

        let handle = tokio::spawn(async move { charge_point.serve(incoming_rx).await });

        Self {
            session,
            cancel,
            handle,
            calls,
            replies,
            incoming_tx: Mutex::new(Some(incoming_tx)),
            link,
        }
    }

    /// Drop the link as a lost WebSocket would: both channel ends close
    pub fn disconnect(&self) {
        self.incoming_tx.lock().take();
        self.link.cancel();
    }

    /// Send a central system command and wait for the charge point's reply
    pub async fn command(&self, action: Action, payload: Value) -> OcppMessage {
        let call = Call::new(action, payload).unwrap();
        let (tx, rx) = oneshot::channel();
        self.replies.lock().insert(call.message_id.clone(), tx);

        let incoming_tx = self.incoming_tx.lock().clone().unwrap();
        incoming_tx.send(OcppMessage::Call(call)).await.unwrap();
        rx.await.unwrap()
    }

    /// Status field of a CALLRESULT reply
    pub async fn command_status(&self, action: Action, payload: Value) -> String {
        match self.command(action, payload).await {
            OcppMessage::CallResult(result) => result.payload["status"].as_str().unwrap().to_string(),
            other => panic!("Expected CallResult, got {:?}", other),
        }
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, action: Action) -> Vec<Recorded> {
        self.calls().into_iter().filter(|c| c.action == action).collect()
    }

    pub fn calls_since(&self, since: Instant) -> Vec<Recorded> {
        self.calls().into_iter().filter(|c| c.at >= since).collect()
    }

    /// Meter register values reported in MeterValues calls
    pub fn reported_energy(&self) -> Vec<String> {
        self.calls_of(Action::MeterValues)
            .iter()
            .map(|c| {
                let samples = c.payload["meterValue"][0]["sampledValue"].as_array().unwrap();
                samples
                    .iter()
                    .find(|s| s["measurand"] == "Energy.Active.Import.Register")
                    .and_then(|s| s["value"].as_str())
                    .unwrap()
                    .to_string()
            })
            .collect()
    }
}
