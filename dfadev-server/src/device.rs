//! Character-device adapter over the automaton.
//!
//! The device is 4 bytes long. Reading it yields `YYYY` when the current
//! state accepts and `NNNN` otherwise. Writing feeds bytes to the automaton
//! as input symbols. Control codes edit the table.

use crate::error::DeviceError;
use dfadev_core::{Automaton, Snapshot};
use dfadev_protocol::ioctl::{DFAIOCACCEPT, DFAIOCADD, DFAIOCREJECT, DFAIOCRESET};
use dfadev_protocol::{ANSWER_ACCEPT, ANSWER_REJECT, DEVICE_SIZE};

/// Point-in-time view of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub current_state: u8,
    pub accepting: bool,
    pub accepting_states: usize,
    pub max_write_bytes: usize,
}

/// The acceptance device.
#[derive(Debug)]
pub struct Device {
    automaton: Automaton,
    max_write_bytes: usize,
}

impl Device {
    pub fn new(automaton: Automaton, max_write_bytes: usize) -> Self {
        Self {
            automaton,
            max_write_bytes: max_write_bytes.max(1),
        }
    }

    /// Returns the bytes of the device at `position`, at most `size` of them.
    ///
    /// An empty result means `position` is at or past the end.
    pub fn read(&self, position: u64, size: usize) -> Vec<u8> {
        if position >= DEVICE_SIZE {
            return Vec::new();
        }

        let remaining = (DEVICE_SIZE - position) as usize;
        let answer = if self.automaton.is_accepting() {
            ANSWER_ACCEPT
        } else {
            ANSWER_REJECT
        };
        vec![answer; size.min(remaining)]
    }

    /// Consumes up to `max_write_bytes` of `data` and returns how many were
    /// consumed.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.max_write_bytes);
        let consumed = self.automaton.consume(&data[..len]);
        tracing::debug!(
            "Consumed {} of {} bytes, now in state {}",
            consumed,
            data.len(),
            self.automaton.current_state()
        );
        consumed
    }

    /// Executes a control request.
    pub fn ioctl(&mut self, request: u32, arg: &[u8]) -> Result<(), DeviceError> {
        match request {
            DFAIOCRESET => {
                self.automaton.reset();
            }
            DFAIOCADD => {
                let [from, symbol, to] = copy_arg::<3>(arg)?;
                self.automaton.set_transition(from, symbol, to);
                tracing::debug!("Set transition {} --{:#04x}--> {}", from, symbol, to);
            }
            DFAIOCACCEPT => {
                let [state] = copy_arg::<1>(arg)?;
                self.automaton.mark_accepting(state);
            }
            DFAIOCREJECT => {
                let [state] = copy_arg::<1>(arg)?;
                self.automaton.mark_rejecting(state);
            }
            _ => {
                tracing::warn!("Unsupported control code {:#06x}", request);
                return Err(DeviceError::UnsupportedOperation { request });
            }
        }
        Ok(())
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            current_state: self.automaton.current_state(),
            accepting: self.automaton.is_accepting(),
            accepting_states: self.automaton.accepting_count(),
            max_write_bytes: self.max_write_bytes,
        }
    }

    pub fn export(&self) -> Snapshot {
        self.automaton.export()
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }
}

/// Copies the leading `N` bytes of a control argument.
fn copy_arg<const N: usize>(arg: &[u8]) -> Result<[u8; N], DeviceError> {
    arg.get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(DeviceError::TransferFailure {
            needed: N,
            got: arg.len(),
        })
}
