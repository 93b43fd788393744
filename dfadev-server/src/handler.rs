//! Command handlers.

use crate::actor::DeviceHandle;
use crate::error::{DeviceError, ServerError};
use crate::lifecycle;
use crate::session::{Session, SessionState};
use dfadev_protocol::message::*;
use dfadev_protocol::{ioctl, DEVICE_SIZE, PROTOCOL_VERSION};
use dfadev_store::FieldStore;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Server identity reported by HELLO and INFO.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "dfadev".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Command handler.
pub struct CommandHandler {
    device: DeviceHandle,
    store: Option<Arc<dyn FieldStore>>,
    info: ServerInfo,
    /// Set once PREPARE_UPDATE has published the handoff snapshot.
    update_prepared: AtomicBool,
}

impl CommandHandler {
    pub fn new(device: DeviceHandle) -> Self {
        Self {
            device,
            store: None,
            info: ServerInfo::default(),
            update_prepared: AtomicBool::new(false),
        }
    }

    /// Sets the store PREPARE_UPDATE publishes to.
    pub fn with_store(mut self, store: Arc<dyn FieldStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_info(mut self, info: ServerInfo) -> Self {
        self.info = info;
        self
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Returns whether the handoff snapshot has been published. Once it has,
    /// device operations are refused so the snapshot stays current.
    pub fn update_prepared(&self) -> bool {
        self.update_prepared.load(Ordering::SeqCst)
    }

    /// Handles a request and returns a response.
    pub async fn handle(&self, session: &mut Session, request: &Request) -> Response {
        session.record_request();

        let result = match request.op {
            Operation::Hello => self.handle_hello(session, &request.params),
            Operation::Ping => self.handle_ping(),
            Operation::Bye => self.handle_bye(session),
            Operation::Info => self.handle_info().await,
            Operation::Read => self.handle_read(&request.params).await,
            Operation::Write => self.handle_write(&request.params).await,
            Operation::Ioctl => self.handle_ioctl(&request.params).await,
            Operation::PrepareUpdate => self.handle_prepare_update().await,
        };

        match result {
            Ok(value) => Response::ok(&request.id, value),
            Err(e) => {
                tracing::debug!("{} failed: {}", request.op.as_str(), e);
                Response::error(&request.id, Self::response_error(&e))
            }
        }
    }

    fn response_error(err: &ServerError) -> ResponseError {
        let error = ResponseError::new(err.error_code(), err.to_string());
        match err {
            ServerError::Device(DeviceError::UnsupportedOperation { request }) => {
                error.with_detail("request", *request)
            }
            ServerError::Device(DeviceError::TransferFailure { needed, got }) => error
                .with_detail("needed", *needed)
                .with_detail("got", *got),
            _ => error,
        }
    }

    fn handle_hello(&self, session: &mut Session, params: &Value) -> Result<Value, ServerError> {
        let hello: HelloParams = parse_params(params)?;

        if hello.protocol_version != PROTOCOL_VERSION {
            return Err(ServerError::UnsupportedProtocol(hello.protocol_version));
        }

        session.complete_handshake(hello.protocol_version, hello.client_name);
        tracing::debug!(
            "[{}] Handshake complete (client={:?})",
            session.remote_addr,
            session.client_name()
        );

        let result = HelloResult {
            protocol_version: PROTOCOL_VERSION,
            server_name: self.info.name.clone(),
            server_version: self.info.version.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_ping(&self) -> Result<Value, ServerError> {
        Ok(json!({"pong": true}))
    }

    fn handle_bye(&self, session: &mut Session) -> Result<Value, ServerError> {
        session.set_state(SessionState::Closing);
        Ok(json!({"goodbye": true}))
    }

    async fn handle_info(&self) -> Result<Value, ServerError> {
        let status = self.device.status().await?;
        let result = InfoResult {
            server_name: self.info.name.clone(),
            server_version: self.info.version.clone(),
            protocol_version: PROTOCOL_VERSION,
            device_size: DEVICE_SIZE,
            max_write_bytes: status.max_write_bytes,
            current_state: status.current_state,
            accepting: status.accepting,
            accepting_states: status.accepting_states,
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_read(&self, params: &Value) -> Result<Value, ServerError> {
        let p: ReadParams = parse_params(params)?;
        let data = self.device.read(p.position, p.size).await?;
        Ok(serde_json::to_value(ReadResult { data })?)
    }

    async fn handle_write(&self, params: &Value) -> Result<Value, ServerError> {
        let p: WriteParams = parse_params(params)?;
        let written = self.device.write(p.data).await?;
        Ok(serde_json::to_value(WriteResult { written })?)
    }

    async fn handle_ioctl(&self, params: &Value) -> Result<Value, ServerError> {
        let p: IoctlParams = parse_params(params)?;
        self.device.ioctl(p.request, p.arg).await?;
        tracing::debug!(
            "Control {} applied",
            ioctl::name(p.request).unwrap_or("UNKNOWN")
        );
        Ok(serde_json::to_value(IoctlResult { request: p.request })?)
    }

    async fn handle_prepare_update(&self) -> Result<Value, ServerError> {
        let store = self.store.as_ref().ok_or_else(|| {
            ServerError::InvalidRequest("no snapshot store configured".to_string())
        })?;

        if self
            .update_prepared
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ServerError::ShuttingDown);
        }

        let saved = match self.device.freeze().await {
            Ok(snapshot) => lifecycle::save(&snapshot, store.as_ref()).map(|()| snapshot),
            Err(e) => Err(e),
        };

        match saved {
            Ok(snapshot) => {
                let current_state = snapshot.image().map(|i| i.current_state()).unwrap_or(0);
                tracing::info!("Published handoff snapshot at state {}", current_state);
                Ok(serde_json::to_value(PrepareUpdateResult {
                    saved: true,
                    current_state,
                })?)
            }
            Err(e) => {
                tracing::error!("Failed to publish handoff snapshot: {}", e);
                if let Err(thaw) = self.device.thaw().await {
                    tracing::warn!("Failed to resume device after handoff error: {}", thaw);
                }
                self.update_prepared.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, ServerError> {
    serde_json::from_value(params.clone()).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}
