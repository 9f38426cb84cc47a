//! FT2232H channel access over libusb.
//!
//! Issues the same vendor requests libftdi performs for reset, bitmode,
//! latency, and flow-control configuration, and splits bulk writes into
//! host-side chunks the way libftdi's write path does. Only the
//! host-to-device direction is implemented; this program never reads
//! from the bridge.

use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType, UsbContext};

use super::{FifoBridge, FlowControl, Interface, UsbFifo};
use crate::error::{ConfigStep, Error, Result};
use crate::tracing::prelude::*;

/// Timeout for all USB transactions.
const TIMEOUT: Duration = Duration::from_secs(5);

// Vendor requests from the FTDI application notes, as used by libftdi.
const SIO_RESET_REQUEST: u8 = 0x00;
const SIO_SET_FLOW_CTRL_REQUEST: u8 = 0x02;
const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 0x09;
const SIO_SET_BITMODE_REQUEST: u8 = 0x0b;

const SIO_RESET_SIO: u16 = 0;
const SIO_RTS_CTS_HS: u16 = 0x1 << 8;

const BITMODE_BITBANG: u8 = 0x01;
const BITMODE_SYNCFF: u8 = 0x40;

/// All eight FIFO lines driven by the bridge.
const BITMASK_ALL: u8 = 0xff;

/// Default host-side split for bulk writes, until the caller sets one.
const DEFAULT_WRITE_CHUNK: usize = 4096;

/// Opens [`FtdiChannel`]s on a shared libusb context.
pub struct FtdiBridge {
    context: Context,
}

impl FtdiBridge {
    pub fn new() -> Result<Self> {
        let context = Context::new().map_err(Error::Allocation)?;
        Ok(Self { context })
    }
}

impl FifoBridge for FtdiBridge {
    type Fifo = FtdiChannel;

    fn open(&mut self, vid: u16, pid: u16, iface: Interface) -> Result<FtdiChannel> {
        let open_error = |message: String| Error::DeviceOpen { iface, message };

        let mut handle = self
            .context
            .open_device_with_vid_pid(vid, pid)
            .ok_or_else(|| open_error(format!("no device {vid:04x}:{pid:04x}")))?;

        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => return Err(open_error(format!("kernel driver detach: {e}"))),
        }

        handle
            .claim_interface(iface.number())
            .map_err(|e| open_error(format!("claim interface: {e}")))?;

        // Claimed from here on; the Drop impl releases it if reset fails.
        let channel = FtdiChannel {
            handle,
            iface,
            write_chunk: DEFAULT_WRITE_CHUNK,
        };
        channel
            .vendor_request(SIO_RESET_REQUEST, SIO_RESET_SIO, iface.index())
            .map_err(|e| open_error(format!("reset: {e}")))?;

        debug!(channel = %iface, "FTDI channel opened.");
        Ok(channel)
    }
}

/// One claimed channel of the FT2232H.
pub struct FtdiChannel {
    handle: DeviceHandle<Context>,
    iface: Interface,
    write_chunk: usize,
}

impl FtdiChannel {
    fn vendor_request(
        &self,
        request: u8,
        value: u16,
        index: u16,
    ) -> std::result::Result<(), rusb::Error> {
        let request_type =
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);
        self.handle
            .write_control(request_type, request, value, index, &[], TIMEOUT)?;
        Ok(())
    }

    fn config_step(&self, step: ConfigStep, request: u8, value: u16, index: u16) -> Result<()> {
        self.vendor_request(request, value, index)
            .map_err(|e| Error::DeviceConfig {
                step,
                iface: self.iface,
                message: e.to_string(),
            })
    }
}

impl UsbFifo for FtdiChannel {
    fn set_sync_fifo(&mut self) -> Result<()> {
        self.config_step(
            ConfigStep::SyncFifo,
            SIO_SET_BITMODE_REQUEST,
            bitmode_value(BITMODE_SYNCFF),
            self.iface.index(),
        )
    }

    fn set_bitbang(&mut self) -> Result<()> {
        self.config_step(
            ConfigStep::Bitbang,
            SIO_SET_BITMODE_REQUEST,
            bitmode_value(BITMODE_BITBANG),
            self.iface.index(),
        )
    }

    fn set_latency_timer(&mut self, ms: u8) -> Result<()> {
        self.config_step(
            ConfigStep::LatencyTimer,
            SIO_SET_LATENCY_TIMER_REQUEST,
            u16::from(ms),
            self.iface.index(),
        )
    }

    fn set_write_chunk_size(&mut self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Err(Error::DeviceConfig {
                step: ConfigStep::WriteChunkSize,
                iface: self.iface,
                message: "chunk size must be nonzero".to_string(),
            });
        }
        self.write_chunk = bytes;
        Ok(())
    }

    fn set_flow_control(&mut self, mode: FlowControl) -> Result<()> {
        // The channel rides in the low byte of wIndex, the mode in the high.
        self.config_step(
            ConfigStep::FlowControl,
            SIO_SET_FLOW_CTRL_REQUEST,
            0,
            flow_index(mode, self.iface),
        )
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        for piece in data.chunks(self.write_chunk) {
            written += self
                .handle
                .write_bulk(self.iface.write_endpoint(), piece, TIMEOUT)
                .map_err(|e| Error::Write(format!("after {written} bytes: {e}")))?;
        }
        Ok(written)
    }
}

impl Drop for FtdiChannel {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.iface.number()) {
            debug!(channel = %self.iface, error = %e, "Interface release failed on close.");
        }
    }
}

fn bitmode_value(mode: u8) -> u16 {
    u16::from(mode) << 8 | u16::from(BITMASK_ALL)
}

fn flow_index(mode: FlowControl, iface: Interface) -> u16 {
    let mode = match mode {
        FlowControl::Disabled => 0,
        FlowControl::RtsCtsHs => SIO_RTS_CTS_HS,
    };
    mode | iface.index()
}
