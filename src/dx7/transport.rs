//! Delivery of System Exclusive messages to a synth.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use log::debug;

use crate::Error;

/// Anything that can deliver a complete MIDI message.
pub trait Transport {
    fn send(&mut self, data: &[u8]) -> Result<(), Error>;
}

/// An output port that must be bound to a device before sending.
///
/// On Linux a raw MIDI device node such as `/dev/snd/midiC1D0`
/// can be opened with [`DevicePort::open`]. The port does no locking;
/// senders sharing one must take turns.
#[derive(Debug)]
pub struct DevicePort<W: Write> {
    writer: Option<W>,
}

impl<W: Write> DevicePort<W> {
    /// Makes a port that is not yet bound to anything.
    pub fn new() -> Self {
        DevicePort { writer: None }
    }

    pub fn bind(&mut self, writer: W) {
        self.writer = Some(writer);
    }

    /// Unbinds the port, handing back the writer.
    pub fn release(&mut self) -> Result<Option<W>, Error> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(self.writer.take())
    }

    pub fn is_bound(&self) -> bool {
        self.writer.is_some()
    }
}

impl<W: Write> Default for DevicePort<W> {
    fn default() -> Self {
        DevicePort::new()
    }
}

impl DevicePort<File> {
    /// Opens a device node (or any file) for writing and binds the port to it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = OpenOptions::new().write(true).open(path.as_ref())
            .map_err(|e| Error::Transport(format!("cannot open {}: {}", path.as_ref().display(), e)))?;
        debug!("opened MIDI output {}", path.as_ref().display());
        Ok(DevicePort { writer: Some(file) })
    }
}

impl<W: Write> Transport for DevicePort<W> {
    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let writer = self.writer.as_mut()
            .ok_or_else(|| Error::Transport("port is not bound to a device".to_string()))?;
        writer.write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::Transport(e.to_string()))?;
        debug!("sent {} bytes", data.len());
        Ok(())
    }
}

/// Transport that keeps every message it is given.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    messages: Vec<Vec<u8>>,
}

impl MessageLog {
    pub fn new() -> Self {
        MessageLog { messages: Vec::new() }
    }

    pub fn messages(&self) -> &[Vec<u8>] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Transport for MessageLog {
    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.messages.push(data.to_vec());
        Ok(())
    }
}
