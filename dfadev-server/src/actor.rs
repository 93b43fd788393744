//! Device actor.
//!
//! One task owns the [`Device`]; every connection reaches it through a
//! cloneable [`DeviceHandle`]. Commands are processed one at a time in
//! arrival order, each to completion.
//!
//! [`DeviceHandle::freeze`] exports the automaton and refuses every later
//! read, write and control command in the same step, so nothing is
//! acknowledged after the exported snapshot was taken.

use crate::device::{Device, DeviceStatus};
use crate::error::ServerError;
use dfadev_core::Snapshot;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A command for the device actor.
#[derive(Debug)]
pub enum Command {
    Read {
        position: u64,
        size: usize,
        reply: oneshot::Sender<Result<Vec<u8>, ServerError>>,
    },
    Write {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<usize, ServerError>>,
    },
    Ioctl {
        request: u32,
        arg: Vec<u8>,
        reply: oneshot::Sender<Result<(), ServerError>>,
    },
    Status {
        reply: oneshot::Sender<DeviceStatus>,
    },
    Export {
        reply: oneshot::Sender<Snapshot>,
    },
    /// Exports and stops accepting device operations.
    Freeze {
        reply: oneshot::Sender<Snapshot>,
    },
    /// Accepts device operations again after a failed handoff.
    Thaw {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the device actor.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    tx: mpsc::Sender<Command>,
}

impl DeviceHandle {
    pub async fn read(&self, position: u64, size: usize) -> Result<Vec<u8>, ServerError> {
        self.call(|reply| Command::Read {
            position,
            size,
            reply,
        })
        .await?
    }

    pub async fn write(&self, data: Vec<u8>) -> Result<usize, ServerError> {
        self.call(|reply| Command::Write { data, reply }).await?
    }

    pub async fn ioctl(&self, request: u32, arg: Vec<u8>) -> Result<(), ServerError> {
        self.call(|reply| Command::Ioctl {
            request,
            arg,
            reply,
        })
        .await?
    }

    pub async fn status(&self) -> Result<DeviceStatus, ServerError> {
        self.call(|reply| Command::Status { reply }).await
    }

    /// Copies the automaton out of the actor.
    pub async fn export(&self) -> Result<Snapshot, ServerError> {
        self.call(|reply| Command::Export { reply }).await
    }

    /// Copies the automaton out and refuses device operations from then on.
    pub async fn freeze(&self) -> Result<Snapshot, ServerError> {
        self.call(|reply| Command::Freeze { reply }).await
    }

    /// Undoes [`DeviceHandle::freeze`].
    pub async fn thaw(&self) -> Result<(), ServerError> {
        self.call(|reply| Command::Thaw { reply }).await
    }

    /// Returns whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| ServerError::ShuttingDown)?;
        reply_rx.await.map_err(|_| ServerError::ShuttingDown)
    }
}

/// Spawns the actor task. It stops once every handle has been dropped and
/// returns the device it owned.
pub fn spawn_device_actor(device: Device, queue_depth: usize) -> (DeviceHandle, JoinHandle<Device>) {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let task = tokio::spawn(run(device, rx));
    (DeviceHandle { tx }, task)
}

async fn run(mut device: Device, mut rx: mpsc::Receiver<Command>) -> Device {
    tracing::debug!("Device actor started");
    let mut frozen = false;

    while let Some(command) = rx.recv().await {
        // A dropped reply receiver only means the caller went away
        match command {
            Command::Read {
                position,
                size,
                reply,
            } => {
                let _ = reply.send(unless_frozen(frozen, || Ok(device.read(position, size))));
            }
            Command::Write { data, reply } => {
                let _ = reply.send(unless_frozen(frozen, || Ok(device.write(&data))));
            }
            Command::Ioctl {
                request,
                arg,
                reply,
            } => {
                let result = unless_frozen(frozen, || Ok(device.ioctl(request, &arg)?));
                let _ = reply.send(result);
            }
            Command::Status { reply } => {
                let _ = reply.send(device.status());
            }
            Command::Export { reply } => {
                let _ = reply.send(device.export());
            }
            Command::Freeze { reply } => {
                frozen = true;
                tracing::debug!("Device frozen");
                let _ = reply.send(device.export());
            }
            Command::Thaw { reply } => {
                frozen = false;
                tracing::debug!("Device thawed");
                let _ = reply.send(());
            }
        }
    }

    tracing::debug!("Device actor stopped");
    device
}

fn unless_frozen<T>(
    frozen: bool,
    op: impl FnOnce() -> Result<T, ServerError>,
) -> Result<T, ServerError> {
    if frozen {
        Err(ServerError::ShuttingDown)
    } else {
        op()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use dfadev_core::Automaton;
    use dfadev_protocol::ioctl::{DFAIOCACCEPT, DFAIOCADD, DFAIOCRESET};
    use tokio_test::assert_ok;

    fn spawn() -> (DeviceHandle, JoinHandle<Device>) {
        spawn_device_actor(Device::new(Automaton::new(), 4096), 16)
    }

    #[tokio::test]
    async fn test_commands_in_order() {
        let (handle, _task) = spawn();

        assert_ok!(handle.ioctl(DFAIOCADD, vec![0, b'1', 1]).await);
        assert_ok!(handle.ioctl(DFAIOCACCEPT, vec![1]).await);
        assert_eq!(handle.read(0, 4).await.unwrap(), b"NNNN");

        assert_eq!(handle.write(b"1".to_vec()).await.unwrap(), 1);
        assert_eq!(handle.read(0, 4).await.unwrap(), b"YYYY");

        assert_ok!(handle.ioctl(DFAIOCRESET, vec![]).await);
        assert_eq!(handle.status().await.unwrap().current_state, 0);
    }

    #[tokio::test]
    async fn test_device_error_passthrough() {
        let (handle, _task) = spawn();
        let err = handle.ioctl(0x1234, vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Device(DeviceError::UnsupportedOperation { request: 0x1234 })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_writers_serialize() {
        let mut automaton = Automaton::new();
        // Counter: every 'x' advances one state, wrapping at 256
        for s in 0..=255u8 {
            automaton.set_transition(s, b'x', s.wrapping_add(1));
        }
        let (handle, _task) = spawn_device_actor(Device::new(automaton, 4096), 4);

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..10 {
                    handle.write(b"x".to_vec()).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(handle.status().await.unwrap().current_state, 100);
    }

    #[tokio::test]
    async fn test_freeze_refuses_device_operations() {
        let (handle, _task) = spawn();
        handle.ioctl(DFAIOCADD, vec![0, 9, 3]).await.unwrap();
        handle.write(vec![9]).await.unwrap();

        let snapshot = handle.freeze().await.unwrap();
        assert_eq!(snapshot, handle.export().await.unwrap());
        assert_eq!(snapshot.image().unwrap().current_state(), 3);

        assert!(matches!(
            handle.write(vec![9]).await,
            Err(ServerError::ShuttingDown)
        ));
        assert!(matches!(
            handle.read(0, 4).await,
            Err(ServerError::ShuttingDown)
        ));
        assert!(matches!(
            handle.ioctl(DFAIOCRESET, vec![]).await,
            Err(ServerError::ShuttingDown)
        ));
        // Status stays available for INFO
        assert_eq!(handle.status().await.unwrap().current_state, 3);

        handle.thaw().await.unwrap();
        assert_ok!(handle.ioctl(DFAIOCRESET, vec![]).await);
        assert_eq!(handle.status().await.unwrap().current_state, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_freeze_snapshot_holds_every_acknowledged_write() {
        let mut automaton = Automaton::new();
        for s in 0..=255u8 {
            automaton.set_transition(s, b'x', s.wrapping_add(1));
        }
        let (handle, _task) = spawn_device_actor(Device::new(automaton, 4096), 64);

        let mut writers = Vec::new();
        for _ in 0..4 {
            let handle = handle.clone();
            writers.push(tokio::spawn(async move {
                let mut acknowledged = 0usize;
                for _ in 0..60 {
                    match handle.write(b"x".to_vec()).await {
                        Ok(n) => acknowledged += n,
                        Err(_) => break,
                    }
                    tokio::task::yield_now().await;
                }
                acknowledged
            }));
        }

        tokio::task::yield_now().await;
        let snapshot = handle.freeze().await.unwrap();

        let mut acknowledged = 0;
        for writer in writers {
            acknowledged += writer.await.unwrap();
        }
        assert_eq!(
            snapshot.image().unwrap().current_state() as usize,
            acknowledged
        );
    }

    #[tokio::test]
    async fn test_actor_returns_device_when_handles_drop() {
        let (handle, task) = spawn();
        handle.ioctl(DFAIOCACCEPT, vec![0]).await.unwrap();
        drop(handle);

        let device = task.await.unwrap();
        assert!(device.status().accepting);
    }

    #[tokio::test]
    async fn test_stopped_actor() {
        let (handle, task) = spawn();
        task.abort();
        let _ = task.await;

        assert!(handle.is_closed());
        assert!(matches!(
            handle.status().await,
            Err(ServerError::ShuttingDown)
        ));
    }
}
