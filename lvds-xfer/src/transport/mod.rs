//! USB FIFO transport layer.
//!
//! This module defines the capability surface the rest of the program
//! uses to talk to the USB bridge: opening a channel, the ordered
//! configuration calls, and raw writes. The production implementation
//! over libusb lives in [`ftdi`]; tests substitute mocks.

use std::fmt;

use crate::error::Result;

pub mod ftdi;

/// FT2232H channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    A,
    B,
}

impl Interface {
    /// USB interface number claimed for this channel.
    pub fn number(self) -> u8 {
        match self {
            Interface::A => 0,
            Interface::B => 1,
        }
    }

    /// wIndex addressing this channel in vendor requests.
    pub fn index(self) -> u16 {
        match self {
            Interface::A => 1,
            Interface::B => 2,
        }
    }

    /// Bulk OUT endpoint carrying host-to-device data.
    pub fn write_endpoint(self) -> u8 {
        match self {
            Interface::A => 0x02,
            Interface::B => 0x04,
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interface::A => write!(f, "A"),
            Interface::B => write!(f, "B"),
        }
    }
}

/// Hardware flow control modes the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    Disabled,
    /// RTS/CTS handshake, required for sustained FIFO streaming.
    RtsCtsHs,
}

/// An open FTDI channel.
///
/// Dropping a handle releases the claimed interface and closes the
/// underlying endpoint; every handle is released exactly once, on
/// success and failure paths alike.
pub trait UsbFifo {
    /// Put the channel into synchronous parallel-FIFO mode.
    fn set_sync_fifo(&mut self) -> Result<()>;

    /// Put the channel into asynchronous bitbang mode.
    fn set_bitbang(&mut self) -> Result<()>;

    /// Set how promptly buffered device-to-host data is flushed.
    fn set_latency_timer(&mut self, ms: u8) -> Result<()>;

    /// Set the host-side split size for bulk writes.
    fn set_write_chunk_size(&mut self, bytes: usize) -> Result<()>;

    /// Select the handshake used to pace host-to-device data.
    fn set_flow_control(&mut self, mode: FlowControl) -> Result<()>;

    /// Write `data` to the channel, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;
}

/// Factory for [`UsbFifo`] channels.
pub trait FifoBridge {
    type Fifo: UsbFifo;

    /// Open one channel of the bridge identified by `vid`:`pid`.
    fn open(&mut self, vid: u16, pid: u16, iface: Interface) -> Result<Self::Fifo>;
}
