//! Stream a file to an FT2232H bridge in synchronous parallel-FIFO mode.
//!
//! The receiving hardware consumes data in fixed 8272-byte frames, so
//! the transfer finishes with a pad write sized off the byte total.
//! Bring-up of the two FTDI channels lives in [`link`], the streaming
//! loop in [`transfer`], and the USB capability boundary in
//! [`transport`].

pub mod cli;
pub mod error;
pub mod link;
pub mod tracing;
pub mod transfer;
pub mod transport;
