//! Inbound command handlers
//!
//! Central system requests only record intent on the session and answer
//! right away. Starting and stopping transactions is left to the
//! supervisory loop. No handler validates its input.

use std::sync::Arc;

use tracing::info;

use super::session::SessionHandle;
use crate::ocpp::*;

/// Router with the charge point's command handlers registered
pub fn router(session: Arc<SessionHandle>) -> Router {
    let start_session = session.clone();
    let stop_session = session;

    Router::new()
        .on::<ChangeConfigurationRequest, _>(change_configuration)
        .on::<RemoteStartTransactionRequest, _>(move |req| remote_start(&start_session, req))
        .on::<RemoteStopTransactionRequest, _>(move |req| remote_stop(&stop_session, req))
}

/// Stub: accepted without touching any configuration store
fn change_configuration(req: ChangeConfigurationRequest) -> ChangeConfigurationResponse {
    info!("ChangeConfiguration {} = {}", req.key, req.value);
    ChangeConfigurationResponse {
        status: ConfigurationStatus::Accepted,
    }
}

fn remote_start(
    session: &SessionHandle,
    req: RemoteStartTransactionRequest,
) -> RemoteStartTransactionResponse {
    info!(
        "RemoteStartTransaction for {} on connector {:?}",
        req.id_tag, req.connector_id
    );
    session.request_start(req.id_tag);

    RemoteStartTransactionResponse {
        status: RemoteStartStopStatus::Accepted,
    }
}

fn remote_stop(
    session: &SessionHandle,
    req: RemoteStopTransactionRequest,
) -> RemoteStopTransactionResponse {
    info!("RemoteStopTransaction for transaction {}", req.transaction_id);
    session.request_stop();

    RemoteStopTransactionResponse {
        status: RemoteStartStopStatus::Accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatch(router: &Router, action: Action, payload: serde_json::Value) -> OcppMessage {
        router.dispatch(&Call::new(action, payload).unwrap())
    }

    fn status(reply: OcppMessage) -> String {
        match reply {
            OcppMessage::CallResult(result) => result.payload["status"].as_str().unwrap().to_string(),
            other => panic!("Expected CallResult, got {:?}", other),
        }
    }

    #[test]
    fn test_change_configuration_always_accepted() {
        let session = Arc::new(SessionHandle::new());
        let router = router(session.clone());

        let reply = dispatch(
            &router,
            Action::ChangeConfiguration,
            json!({"key": "MeterValueSampleInterval", "value": "30"}),
        );
        assert_eq!(status(reply), "Accepted");
        assert!(session.plan_tick().is_empty());
    }

    #[test]
    fn test_remote_start_records_intent() {
        let session = Arc::new(SessionHandle::new());
        let router = router(session.clone());

        let reply = dispatch(
            &router,
            Action::RemoteStartTransaction,
            json!({"idTag": "TAG1", "connectorId": 1}),
        );
        assert_eq!(status(reply), "Accepted");

        let snapshot = session.snapshot();
        assert!(snapshot.pending_start);
        assert_eq!(snapshot.id_tag.as_deref(), Some("TAG1"));
        assert!(!session.meter_running());
    }

    #[test]
    fn test_remote_stop_halts_meter_immediately() {
        let session = Arc::new(SessionHandle::new());
        session.request_start("TAG1".to_string());
        session.plan_tick();
        session.transaction_started(55);
        assert!(session.meter_running());

        let router = router(session.clone());
        let reply = dispatch(&router, Action::RemoteStopTransaction, json!({"transactionId": 55}));
        assert_eq!(status(reply), "Accepted");

        assert!(!session.meter_running());
        assert!(session.snapshot().pending_stop);
    }

    #[test]
    fn test_malformed_remote_start() {
        let session = Arc::new(SessionHandle::new());
        let router = router(session.clone());

        match dispatch(&router, Action::RemoteStartTransaction, json!({"connectorId": 1})) {
            OcppMessage::CallError(error) => assert_eq!(error.error_code, ErrorCode::FormatViolation),
            other => panic!("Expected CallError, got {:?}", other),
        }
        assert!(!session.snapshot().pending_start);
    }
}
