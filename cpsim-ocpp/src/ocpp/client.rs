//! OCPP RPC client
//!
//! Request/response plumbing between the charge point and the central system:
//! - `OcppClient::call` sends a typed CALL and awaits the correlated response
//! - `Router` maps inbound CALL actions to typed handlers
//! - `OcppClient::serve` drains inbound frames in arrival order
//!
//! The client never touches the socket. It exchanges `OcppMessage`s with
//! the connection over channels, so the connection stays the single writer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::*;
use super::types::OcppRequest;

/// Default time to wait for a CALLRESULT
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending request awaiting response
struct PendingRequest {
    action: Action,
    response_tx: oneshot::Sender<Result<CallResult, OcppError>>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingRequest>>>;

/// Handle for issuing CALLs to the central system
#[derive(Clone)]
pub struct OcppClient {
    pending: PendingMap,
    outgoing_tx: mpsc::Sender<OcppMessage>,
    request_timeout: Duration,
}

impl OcppClient {
    /// Create a client that queues frames on `outgoing_tx`
    pub fn new(outgoing_tx: mpsc::Sender<OcppMessage>, request_timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            outgoing_tx,
            request_timeout,
        }
    }

    /// Send a request and wait for its response
    pub async fn call<R: OcppRequest>(&self, request: R) -> Result<R::Response, OcppError> {
        let call = Call::from_request(&request)?;
        let message_id = call.message_id.clone();
        let (response_tx, response_rx) = oneshot::channel();

        self.pending.lock().insert(
            message_id.clone(),
            PendingRequest {
                action: R::ACTION,
                response_tx,
            },
        );

        if self.outgoing_tx.send(OcppMessage::Call(call)).await.is_err() {
            self.pending.lock().remove(&message_id);
            return Err(OcppError::ConnectionClosed);
        }

        let result = match tokio::time::timeout(self.request_timeout, response_rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(OcppError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&message_id);
                return Err(OcppError::Timeout(R::ACTION));
            }
        };

        result.parse_payload(R::ACTION)
    }

    /// Number of CALLs still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Consume inbound frames until the connection closes
    ///
    /// Responses resolve pending calls. Inbound CALLs go through `router`
    /// and their reply is queued before the next frame is read.
    pub async fn serve(
        &self,
        mut incoming_rx: mpsc::Receiver<OcppMessage>,
        router: Router,
    ) -> Result<(), OcppError> {
        while let Some(message) = incoming_rx.recv().await {
            match message {
                OcppMessage::Call(call) => {
                    let reply = router.dispatch(&call);
                    self.outgoing_tx
                        .send(reply)
                        .await
                        .map_err(|_| OcppError::ConnectionClosed)?;
                }
                OcppMessage::CallResult(result) => {
                    let message_id = result.message_id.clone();
                    self.resolve(&message_id, Ok(result));
                }
                OcppMessage::CallError(error) => {
                    let message_id = error.message_id.clone();
                    self.resolve(
                        &message_id,
                        Err(OcppError::RemoteError {
                            code: error.error_code,
                            description: error.error_description,
                            details: error.error_details,
                        }),
                    );
                }
            }
        }

        Err(OcppError::ConnectionClosed)
    }

    fn resolve(&self, message_id: &str, result: Result<CallResult, OcppError>) {
        let pending = self.pending.lock().remove(message_id);
        match pending {
            Some(req) => {
                debug!("{} response received ({})", req.action, message_id);
                let _ = req.response_tx.send(result);
            }
            None => warn!("Response for unknown request {}", message_id),
        }
    }
}

type BoxedHandler = Box<dyn Fn(&Call) -> Result<Value, OcppError> + Send + Sync>;

/// Inbound CALL dispatch table
#[derive(Default)]
pub struct Router {
    handlers: HashMap<Action, BoxedHandler>,
}

impl Router {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for inbound `R` requests
    pub fn on<R, F>(mut self, handler: F) -> Self
    where
        R: OcppRequest,
        F: Fn(R) -> R::Response + Send + Sync + 'static,
    {
        self.handlers.insert(
            R::ACTION,
            Box::new(move |call: &Call| {
                let request: R = call.parse_payload()?;
                Ok(serde_json::to_value(handler(request))?)
            }),
        );
        self
    }

    /// Whether a handler is registered for `action`
    pub fn handles(&self, action: Action) -> bool {
        self.handlers.contains_key(&action)
    }

    /// Run the handler for `call` and build the reply frame
    pub fn dispatch(&self, call: &Call) -> OcppMessage {
        let outcome = match self.handlers.get(&call.action) {
            Some(handler) => handler(call),
            None => Err(OcppError::NotImplemented(call.action)),
        };

        match outcome {
            Ok(payload) => OcppMessage::CallResult(CallResult {
                message_id: call.message_id.clone(),
                payload,
            }),
            Err(e) => {
                info!("Rejecting {} ({}): {}", call.action, call.message_id, e);
                OcppMessage::CallError(CallError::from_error(call.message_id.clone(), &e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::types::*;

    fn accept_config(router: Router) -> Router {
        router.on::<ChangeConfigurationRequest, _>(|_| ChangeConfigurationResponse {
            status: ConfigurationStatus::Accepted,
        })
    }

    #[test]
    fn test_router_dispatch() {
        let router = accept_config(Router::new());
        assert!(router.handles(Action::ChangeConfiguration));

        let call = Call::new(
            Action::ChangeConfiguration,
            serde_json::json!({"key": "HeartbeatInterval", "value": "60"}),
        )
        .unwrap();

        match router.dispatch(&call) {
            OcppMessage::CallResult(result) => {
                assert_eq!(result.message_id, call.message_id);
                assert_eq!(result.payload["status"], "Accepted");
            }
            other => panic!("Expected CallResult, got {:?}", other),
        }
    }

    #[test]
    fn test_router_unregistered_action() {
        let router = accept_config(Router::new());
        let call = Call::new(Action::Reset, serde_json::json!({"type": "Soft"})).unwrap();

        match router.dispatch(&call) {
            OcppMessage::CallError(error) => {
                assert_eq!(error.error_code, ErrorCode::NotImplemented);
            }
            other => panic!("Expected CallError, got {:?}", other),
        }
    }

    #[test]
    fn test_router_malformed_payload() {
        let router = accept_config(Router::new());
        let call = Call::new(Action::ChangeConfiguration, serde_json::json!({"key": 5})).unwrap();

        match router.dispatch(&call) {
            OcppMessage::CallError(error) => {
                assert_eq!(error.error_code, ErrorCode::FormatViolation);
            }
            other => panic!("Expected CallError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_correlates_response() {
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel(8);
        let (incoming_tx, incoming_rx) = mpsc::channel(8);
        let client = OcppClient::new(outgoing_tx, DEFAULT_REQUEST_TIMEOUT);

        let server = client.clone();
        tokio::spawn(async move { server.serve(incoming_rx, Router::new()).await });

        tokio::spawn(async move {
            if let Some(OcppMessage::Call(call)) = outgoing_rx.recv().await {
                assert_eq!(call.action, Action::Heartbeat);
                let reply = CallResult::new(
                    call.message_id,
                    serde_json::json!({"currentTime": "2026-01-20T12:00:00Z"}),
                )
                .unwrap();
                incoming_tx.send(OcppMessage::CallResult(reply)).await.unwrap();
            }
            // Keep the inbound side open until the test ends
            std::future::pending::<()>().await;
        });

        let response = client.call(HeartbeatRequest {}).await.unwrap();
        assert!(response.current_time.is_some());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_call_error_surfaces_remote_error() {
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel(8);
        let (incoming_tx, incoming_rx) = mpsc::channel(8);
        let client = OcppClient::new(outgoing_tx, DEFAULT_REQUEST_TIMEOUT);

        let server = client.clone();
        tokio::spawn(async move { server.serve(incoming_rx, Router::new()).await });

        tokio::spawn(async move {
            if let Some(OcppMessage::Call(call)) = outgoing_rx.recv().await {
                let error = CallError::new(call.message_id, ErrorCode::InternalError, "boom");
                incoming_tx.send(OcppMessage::CallError(error)).await.unwrap();
            }
            std::future::pending::<()>().await;
        });

        let result = client.call(HeartbeatRequest {}).await;
        assert!(matches!(
            result,
            Err(OcppError::RemoteError { code: ErrorCode::InternalError, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out() {
        let (outgoing_tx, _outgoing_rx) = mpsc::channel(8);
        let client = OcppClient::new(outgoing_tx, Duration::from_secs(30));

        let result = client.call(HeartbeatRequest {}).await;
        assert!(matches!(result, Err(OcppError::Timeout(Action::Heartbeat))));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_call_on_closed_channel() {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(8);
        drop(outgoing_rx);
        let client = OcppClient::new(outgoing_tx, DEFAULT_REQUEST_TIMEOUT);

        let result = client.call(HeartbeatRequest {}).await;
        assert!(matches!(result, Err(OcppError::ConnectionClosed)));
    }
}
