//! Common error types for lvds-xfer.
//!
//! This module provides a centralized Error enum using thiserror,
//! covering source-file access, channel bring-up, and the streaming
//! write path.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::Interface;

/// One step of the ordered channel configuration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigStep {
    /// Synchronous-FIFO bitmode on the data channel
    SyncFifo,
    /// Asynchronous bitbang bitmode on the control channel
    Bitbang,
    /// Latency timer
    LatencyTimer,
    /// Host-side bulk write split size
    WriteChunkSize,
    /// Hardware flow control
    FlowControl,
}

/// Main error type for lvds-xfer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The USB context could not be allocated
    #[error("USB context allocation failed: {0}")]
    Allocation(rusb::Error),

    /// Opening an FTDI channel failed
    #[error("can't open FTDI channel {iface}: {message}")]
    DeviceOpen { iface: Interface, message: String },

    /// One of the ordered configuration steps failed
    #[error("{step} configuration failed on channel {iface}: {message}")]
    DeviceConfig {
        step: ConfigStep,
        iface: Interface,
        message: String,
    },

    /// The source file could not be opened
    #[error("unable to read {file} (cwd {dir}): {source}", file = .path.display(), dir = .cwd.display())]
    SourceOpen {
        path: PathBuf,
        cwd: PathBuf,
        source: std::io::Error,
    },

    /// A device write failed; tolerated during streaming
    #[error("device write failed: {0}")]
    Write(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
