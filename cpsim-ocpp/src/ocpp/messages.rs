//! OCPP-J message framing
//!
//! OCPP 1.6-J carries RPC frames as JSON arrays over WebSocket:
//! - CALL: [2, messageId, action, payload]
//! - CALLRESULT: [3, messageId, payload]
//! - CALLERROR: [4, messageId, errorCode, errorDescription, errorDetails]

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::types::OcppRequest;

/// Leading element of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

impl TryFrom<i64> for MessageType {
    type Error = OcppError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            2 => Ok(MessageType::Call),
            3 => Ok(MessageType::CallResult),
            4 => Ok(MessageType::CallError),
            other => Err(OcppError::UnknownMessageType(other)),
        }
    }
}

/// CALLERROR codes defined by OCPP-J 1.6 (spelling as in the standard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    SecurityError,
    FormationViolation,
    FormatViolation,
    PropertyConstraintViolation,
    OccurenceConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

/// OCPP 1.6 action names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    // Initiated by the charge point
    Authorize,
    BootNotification,
    DataTransfer,
    Heartbeat,
    MeterValues,
    StartTransaction,
    StatusNotification,
    StopTransaction,

    // Initiated by the central system
    ChangeAvailability,
    ChangeConfiguration,
    ClearCache,
    GetConfiguration,
    RemoteStartTransaction,
    RemoteStopTransaction,
    Reset,
    TriggerMessage,
    UnlockConnector,
}

impl Action {
    pub const ALL: [Action; 17] = [
        Action::Authorize,
        Action::BootNotification,
        Action::DataTransfer,
        Action::Heartbeat,
        Action::MeterValues,
        Action::StartTransaction,
        Action::StatusNotification,
        Action::StopTransaction,
        Action::ChangeAvailability,
        Action::ChangeConfiguration,
        Action::ClearCache,
        Action::GetConfiguration,
        Action::RemoteStartTransaction,
        Action::RemoteStopTransaction,
        Action::Reset,
        Action::TriggerMessage,
        Action::UnlockConnector,
    ];

    /// Name used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Authorize => "Authorize",
            Action::BootNotification => "BootNotification",
            Action::DataTransfer => "DataTransfer",
            Action::Heartbeat => "Heartbeat",
            Action::MeterValues => "MeterValues",
            Action::StartTransaction => "StartTransaction",
            Action::StatusNotification => "StatusNotification",
            Action::StopTransaction => "StopTransaction",
            Action::ChangeAvailability => "ChangeAvailability",
            Action::ChangeConfiguration => "ChangeConfiguration",
            Action::ClearCache => "ClearCache",
            Action::GetConfiguration => "GetConfiguration",
            Action::RemoteStartTransaction => "RemoteStartTransaction",
            Action::RemoteStopTransaction => "RemoteStopTransaction",
            Action::Reset => "Reset",
            Action::TriggerMessage => "TriggerMessage",
            Action::UnlockConnector => "UnlockConnector",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = OcppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| OcppError::UnknownAction {
                message_id: String::new(),
                action: s.to_string(),
            })
    }
}

/// Protocol layer errors
#[derive(Debug, Error)]
pub enum OcppError {
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid message format")]
    InvalidFormat,

    #[error("Unknown action: {action}")]
    UnknownAction { message_id: String, action: String },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(i64),

    #[error("Malformed {action} payload: {reason}")]
    Format { action: Action, reason: String },

    #[error("No handler for {0}")]
    NotImplemented(Action),

    #[error("OCPP error from central system: {code:?} - {description}")]
    RemoteError {
        code: ErrorCode,
        description: String,
        details: Value,
    },

    #[error("Timeout waiting for {0} response")]
    Timeout(Action),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcppError {
    /// CALLERROR code reported back to the peer for a failed inbound CALL
    pub fn error_code(&self) -> ErrorCode {
        match self {
            OcppError::UnknownAction { .. } | OcppError::NotImplemented(_) => {
                ErrorCode::NotImplemented
            }
            OcppError::Format { .. } | OcppError::JsonError(_) | OcppError::InvalidFormat => {
                ErrorCode::FormatViolation
            }
            _ => ErrorCode::InternalError,
        }
    }
}

/// Request frame
#[derive(Debug, Clone)]
pub struct Call {
    pub message_id: String,
    pub action: Action,
    pub payload: Value,
}

impl Call {
    /// CALL with a fresh UUID v4 message id
    pub fn new(action: Action, payload: impl Serialize) -> Result<Self, OcppError> {
        Ok(Self {
            message_id: Uuid::new_v4().to_string(),
            action,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn from_request<R: OcppRequest>(request: &R) -> Result<Self, OcppError> {
        Self::new(R::ACTION, request)
    }

    /// Decode the payload as a typed request
    pub fn parse_payload<R: OcppRequest>(&self) -> Result<R, OcppError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| OcppError::Format {
            action: self.action,
            reason: e.to_string(),
        })
    }
}

/// Successful response frame
#[derive(Debug, Clone)]
pub struct CallResult {
    pub message_id: String,
    pub payload: Value,
}

impl CallResult {
    pub fn new(message_id: String, payload: impl Serialize) -> Result<Self, OcppError> {
        Ok(Self {
            message_id,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Parse the payload as the response to `action`
    pub fn parse_payload<T: DeserializeOwned>(&self, action: Action) -> Result<T, OcppError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| OcppError::Format {
            action,
            reason: e.to_string(),
        })
    }
}

/// Error response frame
#[derive(Debug, Clone)]
pub struct CallError {
    pub message_id: String,
    pub error_code: ErrorCode,
    pub error_description: String,
    pub error_details: Value,
}

impl CallError {
    pub fn new(
        message_id: String,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            error_code,
            error_description: error_description.into(),
            error_details: Value::Object(serde_json::Map::new()),
        }
    }

    /// CALLERROR answering a failed inbound CALL
    pub fn from_error(message_id: String, error: &OcppError) -> Self {
        Self::new(message_id, error.error_code(), error.to_string())
    }
}

/// Any OCPP-J frame
#[derive(Debug, Clone)]
pub enum OcppMessage {
    Call(Call),
    CallResult(CallResult),
    CallError(CallError),
}

impl OcppMessage {
    /// Parse a frame received from the peer
    ///
    /// A CALL naming an action this crate does not know yields
    /// `UnknownAction` carrying the message id, so the caller can still
    /// answer it.
    pub fn parse(bytes: &[u8]) -> Result<Self, OcppError> {
        let frame: Vec<Value> = serde_json::from_slice(bytes)?;

        let (type_id, message_id, rest) = match frame.as_slice() {
            [Value::Number(type_id), Value::String(message_id), rest @ ..] => {
                let type_id = type_id.as_i64().ok_or(OcppError::InvalidFormat)?;
                (type_id, message_id.clone(), rest)
            }
            _ => return Err(OcppError::InvalidFormat),
        };

        match (MessageType::try_from(type_id)?, rest) {
            (MessageType::Call, [Value::String(action), payload]) => {
                let action = action.parse().map_err(|_| OcppError::UnknownAction {
                    message_id: message_id.clone(),
                    action: action.clone(),
                })?;
                Ok(OcppMessage::Call(Call {
                    message_id,
                    action,
                    payload: payload.clone(),
                }))
            }
            (MessageType::CallResult, [payload]) => Ok(OcppMessage::CallResult(CallResult {
                message_id,
                payload: payload.clone(),
            })),
            (MessageType::CallError, [Value::String(code), description, details]) => {
                let error_code = serde_json::from_value(Value::String(code.clone()))
                    .unwrap_or(ErrorCode::GenericError);
                Ok(OcppMessage::CallError(CallError {
                    message_id,
                    error_code,
                    error_description: description.as_str().unwrap_or_default().to_string(),
                    error_details: details.clone(),
                }))
            }
            _ => Err(OcppError::InvalidFormat),
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            OcppMessage::Call(c) => &c.message_id,
            OcppMessage::CallResult(r) => &r.message_id,
            OcppMessage::CallError(e) => &e.message_id,
        }
    }

    /// Encode as a WebSocket text frame
    pub fn to_text(&self) -> Result<String, OcppError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for OcppMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OcppMessage::Call(c) => {
                (MessageType::Call as u8, &c.message_id, c.action, &c.payload).serialize(serializer)
            }
            OcppMessage::CallResult(r) => {
                (MessageType::CallResult as u8, &r.message_id, &r.payload).serialize(serializer)
            }
            OcppMessage::CallError(e) => (
                MessageType::CallError as u8,
                &e.message_id,
                e.error_code,
                &e.error_description,
                &e.error_details,
            )
                .serialize(serializer),
        }
    }
}
