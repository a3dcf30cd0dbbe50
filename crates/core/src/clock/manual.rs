use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{Sequencer, TransportState};
use crate::{PerformanceError, Result};

/// Sequencer whose position only moves when told to. Clones share state, so a
/// host (or a test) can keep a handle after giving one to the performance.
#[derive(Debug, Clone, Default)]
pub struct ManualSequencer {
    inner: Arc<ManualInner>,
}

#[derive(Debug, Default)]
struct ManualInner {
    transport: TransportState,
    open: AtomicBool,
    /// Devices accepted by `open`; empty accepts any name.
    devices: Vec<String>,
}

impl ManualSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: &[&str]) -> Self {
        Self {
            inner: Arc::new(ManualInner {
                devices: devices.iter().map(|device| device.to_string()).collect(),
                ..Default::default()
            }),
        }
    }

    /// Moves the reported position forward, as a device would while playing.
    pub fn advance(&self, delta: Duration) {
        if self.inner.transport.is_running() {
            self.inner.transport.advance(delta);
        }
    }

    /// Overrides the reported position regardless of running state.
    pub fn jump_to(&self, position: Duration) {
        self.inner.transport.set_position(position);
    }
}

impl Sequencer for ManualSequencer {
    fn open(&mut self, device: &str) -> Result<()> {
        let known = self.inner.devices.is_empty() || self.inner.devices.iter().any(|d| d == device);
        if !known {
            return Err(PerformanceError::device_unavailable(device));
        }
        self.inner.open.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&mut self) {
        self.inner.transport.set_running(false);
        self.inner.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    fn start(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(PerformanceError::SequencerClosed);
        }
        self.inner.transport.set_running(true);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.inner.transport.set_running(false);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.inner.transport.is_running()
    }

    fn position(&self) -> Duration {
        self.inner.transport.position()
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if !self.is_open() {
            return Err(PerformanceError::SequencerClosed);
        }
        self.inner.transport.set_position(position);
        Ok(())
    }
}
