// Signal sinks - deliver gate transitions to the outside world

use crate::models::signal::{SignalMessages, SignalResult, Transition};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

#[async_trait]
pub trait SignalSink: Send {
    async fn deliver(&mut self, transition: &Transition) -> SignalResult<()>;

    fn describe(&self) -> String;
}

// ==============================================================================
// Serial Sink
// ==============================================================================

/// Writes one line per transition to the microcontroller
pub struct SerialSink<W: Write + Send> {
    writer: W,
    messages: SignalMessages,
    name: String,
}

impl<W: Write + Send> SerialSink<W> {
    pub fn new(writer: W, messages: SignalMessages, name: impl Into<String>) -> Self {
        Self {
            writer,
            messages,
            name: name.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl SerialSink<Box<dyn SerialPort>> {
    /// Open a serial device, e.g. "COM5" or "/dev/ttyACM0"
    pub fn open(port_name: &str, baud_rate: u32, messages: SignalMessages) -> SignalResult<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(SERIAL_TIMEOUT)
            .open()?;

        info!("Serial connection opened on {} at {} baud", port_name, baud_rate);
        Ok(Self::new(port, messages, port_name))
    }

    /// Independent handle on the same device, for reading
    pub fn try_clone_port(&self) -> SignalResult<Box<dyn SerialPort>> {
        Ok(self.writer.try_clone()?)
    }
}

#[async_trait]
impl<W: Write + Send> SignalSink for SerialSink<W> {
    async fn deliver(&mut self, transition: &Transition) -> SignalResult<()> {
        let message = self.messages.for_signal(transition.to);
        let writer = &mut self.writer;
        blocking_io(|| {
            writer.write_all(message.as_bytes())?;
            writer.flush()
        })?;
        debug!("Wrote {:?} to {}", message, self.name);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial:{}", self.name)
    }
}

/// Run blocking device I/O without stalling other tasks on this worker.
/// A current-thread runtime cannot hand its worker off, so there it runs inline.
fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

// ==============================================================================
// Log Sink
// ==============================================================================

/// Used when no serial port is configured
#[derive(Default)]
pub struct LogSink {
    delivered: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[async_trait]
impl SignalSink for LogSink {
    async fn deliver(&mut self, transition: &Transition) -> SignalResult<()> {
        self.delivered += 1;
        info!("Signal is now {}", transition.to);
        Ok(())
    }

    fn describe(&self) -> String {
        "log".to_string()
    }
}

// ==============================================================================
// Dispatcher
// ==============================================================================

/// Deliver queued transitions in order until the channel closes.
/// Resolves to the number of transitions delivered successfully.
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<Transition>,
    mut sink: Box<dyn SignalSink>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut delivered = 0u64;

        while let Some(transition) = rx.recv().await {
            match sink.deliver(&transition).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Failed to deliver {} to {}: {}",
                    transition.to,
                    sink.describe(),
                    e
                ),
            }
        }

        debug!("Signal dispatcher for {} stopped", sink.describe());
        delivered
    })
}

// ==============================================================================
// Serial Reader
// ==============================================================================

/// Splits a byte stream into trimmed, non-empty lines
#[derive(Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}

/// Background task logging whatever the microcontroller prints
pub struct SerialReader {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl SerialReader {
    /// Stop reading and return the number of lines received
    pub async fn shutdown(self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.await.unwrap_or(0)
    }
}

pub fn spawn_serial_reader<R: Read + Send + 'static>(reader: R) -> SerialReader {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let handle = tokio::task::spawn_blocking(move || read_lines(reader, &stop_flag));

    SerialReader { stop, handle }
}

fn read_lines<R: Read>(mut reader: R, stop: &AtomicBool) -> u64 {
    let mut buffer = LineBuffer::default();
    let mut chunk = [0u8; 256];
    let mut received = 0u64;

    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    info!("Device: {}", line);
                    received += 1;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {
                continue
            }
            Err(e) => {
                warn!("Serial read failed: {}", e);
                break;
            }
        }
    }

    received
}
