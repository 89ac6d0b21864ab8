//! WebSocket connection to the central system
//!
//! Opens `{csms_url}/{charge_point_id}` with the `ocpp1.6` subprotocol and
//! pumps frames between the socket and the client's channels. This task is
//! the only writer on the socket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{
        client::IntoClientRequest,
        http::{header, HeaderValue},
        protocol::WebSocketConfig,
        Message,
    },
    Connector, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::messages::*;
use crate::config::ConnectionConfig;

/// OCPP 1.6 WebSocket subprotocol
pub const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

/// An open, message-framed connection to the central system
pub struct Connection {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection {
    /// Connect to the central system
    pub async fn open(config: &ConnectionConfig) -> Result<Self, OcppError> {
        let url = build_ocpp_url(&config.csms_url, &config.charge_point_id);

        let mut request = url.as_str().into_client_request()?;
        request.headers_mut().insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static(OCPP_SUBPROTOCOL),
        );

        let ws_config = WebSocketConfig {
            max_message_size: Some(64 * 1024),
            max_frame_size: Some(16 * 1024),
            ..Default::default()
        };

        let connector = tls_connector(config)?;

        let (stream, response) = connect_async_tls_with_config(request, Some(ws_config), false, connector)
            .await
            .map_err(|e| {
                error!("WebSocket connection to {} failed: {}", url, e);
                e
            })?;

        let accepted_protocol = response
            .headers()
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok());

        if accepted_protocol != Some(OCPP_SUBPROTOCOL) {
            warn!(
                "Central system did not accept {} subprotocol, got: {:?}",
                OCPP_SUBPROTOCOL, accepted_protocol
            );
        }

        info!("WebSocket connected to {}", url);

        Ok(Self { url, stream })
    }

    /// Pump frames until the connection drops or `cancel` fires
    ///
    /// Outbound frames come from `outgoing_rx`; parsed inbound frames go to
    /// `incoming_tx`. A CALL with an unknown action is answered with
    /// `NotImplemented` here, since no handler can ever see it.
    pub async fn run(
        self,
        mut outgoing_rx: mpsc::Receiver<OcppMessage>,
        incoming_tx: mpsc::Sender<OcppMessage>,
        cancel: CancellationToken,
    ) -> Result<(), OcppError> {
        let (mut ws_tx, mut ws_rx) = self.stream.split();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Closing connection to {}", self.url);
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(());
                }

                outgoing = outgoing_rx.recv() => {
                    let Some(message) = outgoing else {
                        return Ok(());
                    };
                    let text = message.to_text()?;
                    debug!("Sending: {}", text);
                    ws_tx.send(Message::Text(text.into())).await?;
                }

                incoming = ws_rx.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            debug!("Received: {}", text);

                            match OcppMessage::parse(text.as_bytes()) {
                                Ok(message) => {
                                    if incoming_tx.send(message).await.is_err() {
                                        return Ok(());
                                    }
                                }
                                Err(OcppError::UnknownAction { message_id, action }) => {
                                    warn!("Unknown action {} ({})", action, message_id);
                                    let e = OcppError::UnknownAction {
                                        message_id: message_id.clone(),
                                        action,
                                    };
                                    let reply = CallError::from_error(message_id, &e);
                                    let text = OcppMessage::CallError(reply).to_text()?;
                                    ws_tx.send(Message::Text(text.into())).await?;
                                }
                                Err(e) => {
                                    warn!("Failed to parse OCPP message: {}", e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("WebSocket closed by central system: {:?}", frame);
                            return Err(OcppError::ConnectionClosed);
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // Pong is queued by tungstenite
                            debug!("Received ping");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            return Err(e.into());
                        }
                        None => {
                            info!("WebSocket stream ended");
                            return Err(OcppError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }
}

/// TLS connector trusting the configured root certificate, if any
///
/// Without a certificate the default native-tls trust store is used for
/// `wss` URLs.
fn tls_connector(config: &ConnectionConfig) -> Result<Option<Connector>, OcppError> {
    let Some(path) = &config.ca_cert else {
        return Ok(None);
    };

    let pem = std::fs::read(path)?;
    let certificate = native_tls::Certificate::from_pem(&pem)?;
    let tls = native_tls::TlsConnector::builder()
        .add_root_certificate(certificate)
        .build()?;

    info!("Trusting root certificate {}", path.display());
    Ok(Some(Connector::NativeTls(tls)))
}

/// Build the full OCPP WebSocket URL
pub fn build_ocpp_url(base_url: &str, charge_point_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), charge_point_id)
}
