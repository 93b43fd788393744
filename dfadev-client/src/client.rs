//! High-level client API.

use crate::connection::{into_result, Connection, ConnectionConfig};
use crate::error::ClientError;
use dfadev_protocol::ioctl::{DFAIOCACCEPT, DFAIOCADD, DFAIOCREJECT, DFAIOCRESET};
use dfadev_protocol::message::*;
use dfadev_protocol::DEVICE_SIZE;
use serde_json::{json, Value};
use std::sync::Arc;

/// Largest slice [`Client::feed`] sends in one WRITE. Bytes travel as a JSON
/// array of up to four characters each, which keeps a frame well below 1 MiB.
pub const MAX_FEED_CHUNK: usize = 64 * 1024;

/// High-level client for dfadev.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection (for background read loop).
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    async fn request(&self, op: Operation, params: Value) -> Result<Value, ClientError> {
        let response = self.conn.request(op, params).await?;
        into_result(response)
    }

    // =========================================================================
    // System operations
    // =========================================================================

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        self.request(Operation::Ping, json!({})).await?;
        Ok(())
    }

    /// Gets server and device info.
    pub async fn info(&self) -> Result<InfoResult, ClientError> {
        let result = self.request(Operation::Info, json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Asks the server to publish its state for a successor and stop.
    pub async fn prepare_update(&self) -> Result<PrepareUpdateResult, ClientError> {
        let result = self.request(Operation::PrepareUpdate, json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    // =========================================================================
    // Device operations
    // =========================================================================

    /// Reads up to `size` bytes of the device at `position`. An empty result
    /// means end of device.
    pub async fn read(&self, position: u64, size: usize) -> Result<Vec<u8>, ClientError> {
        let params = serde_json::to_value(ReadParams { position, size })?;
        let result: ReadResult =
            serde_json::from_value(self.request(Operation::Read, params).await?)?;
        Ok(result.data)
    }

    /// Writes once and returns how many bytes the device consumed.
    pub async fn write(&self, data: &[u8]) -> Result<usize, ClientError> {
        let params = serde_json::to_value(WriteParams {
            data: data.to_vec(),
        })?;
        let result: WriteResult =
            serde_json::from_value(self.request(Operation::Write, params).await?)?;
        Ok(result.written)
    }

    /// Writes until all of `data` has been consumed.
    ///
    /// Each WRITE carries at most the server's write cap, and never more than
    /// [`MAX_FEED_CHUNK`] bytes, so request frames stay under the payload limit.
    pub async fn feed(&self, data: &[u8]) -> Result<usize, ClientError> {
        if data.is_empty() {
            return Ok(0);
        }
        let chunk_size = self.info().await?.max_write_bytes.clamp(1, MAX_FEED_CHUNK);

        let mut offset = 0;
        while offset < data.len() {
            let end = data.len().min(offset + chunk_size);
            let written = self.write(&data[offset..end]).await?;
            if written == 0 {
                break;
            }
            offset += written;
        }
        Ok(offset)
    }

    /// Returns whether the current state is accepting.
    pub async fn query(&self) -> Result<bool, ClientError> {
        let data = self.read(0, DEVICE_SIZE as usize).await?;
        Ok(data.first() == Some(&dfadev_protocol::ANSWER_ACCEPT))
    }

    /// Issues a raw control request.
    pub async fn ioctl(&self, request: u32, arg: &[u8]) -> Result<(), ClientError> {
        let params = serde_json::to_value(IoctlParams {
            request,
            arg: arg.to_vec(),
        })?;
        self.request(Operation::Ioctl, params).await?;
        Ok(())
    }

    /// Returns to the start state.
    pub async fn reset(&self) -> Result<(), ClientError> {
        self.ioctl(DFAIOCRESET, &[]).await
    }

    /// Sets the transition taken from `from` on `symbol`.
    pub async fn add_transition(&self, from: u8, symbol: u8, to: u8) -> Result<(), ClientError> {
        self.ioctl(DFAIOCADD, &[from, symbol, to]).await
    }

    pub async fn accept(&self, state: u8) -> Result<(), ClientError> {
        self.ioctl(DFAIOCACCEPT, &[state]).await
    }

    pub async fn reject(&self, state: u8) -> Result<(), ClientError> {
        self.ioctl(DFAIOCREJECT, &[state]).await
    }
}
