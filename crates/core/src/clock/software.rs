use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{Sequencer, TransportState};
use crate::{PerformanceError, Result};

const WORKER_PERIOD: Duration = Duration::from_millis(1);

/// Reference sequencer device that keeps time on a worker thread.
///
/// While running, the worker wakes every millisecond and publishes the
/// elapsed wall-clock time into a shared [`TransportState`]. The render loop
/// only ever reads that state.
#[derive(Debug)]
pub struct SoftwareSequencer {
    devices: Vec<String>,
    device: Option<String>,
    length: Option<Duration>,
    transport: Arc<TransportState>,
    worker: Option<JoinHandle<()>>,
}

impl SoftwareSequencer {
    /// Creates a sequencer that can open any of `devices`.
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            devices: devices.into_iter().map(Into::into).collect(),
            device: None,
            length: None,
            transport: Arc::new(TransportState::default()),
            worker: None,
        }
    }

    /// Stops playback on its own once `length` is reached.
    pub fn with_length(mut self, length: Duration) -> Self {
        self.length = Some(length);
        self
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("sequencer worker panicked");
            }
        }
    }
}

impl Sequencer for SoftwareSequencer {
    fn open(&mut self, device: &str) -> Result<()> {
        if !self.devices.iter().any(|known| known == device) {
            return Err(PerformanceError::device_unavailable(device));
        }
        self.device = Some(device.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.transport.set_running(false);
        self.join_worker();
        self.device = None;
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn start(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(PerformanceError::SequencerClosed);
        }
        if self.transport.is_running() {
            return Ok(());
        }
        // A worker that ran off the end of the sequence may still need joining.
        self.join_worker();

        self.transport.set_running(true);
        let transport = Arc::clone(&self.transport);
        let length = self.length;
        let worker = thread::Builder::new()
            .name("sequencer".to_string())
            .spawn(move || run_worker(&transport, length));

        match worker {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.transport.set_running(false);
                Err(err.into())
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.transport.set_running(false);
        self.join_worker();
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    fn position(&self) -> Duration {
        self.transport.position()
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if !self.is_open() {
            return Err(PerformanceError::SequencerClosed);
        }
        self.transport.set_position(position);
        Ok(())
    }
}

impl Drop for SoftwareSequencer {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(transport: &TransportState, length: Option<Duration>) {
    let mut last = Instant::now();
    while transport.is_running() {
        thread::sleep(WORKER_PERIOD);
        let now = Instant::now();
        transport.advance(now - last);
        last = now;

        if let Some(length) = length {
            if transport.position() >= length {
                transport.set_position(length);
                transport.set_running(false);
            }
        }
    }
}
