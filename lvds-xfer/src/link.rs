//! Bring-up of the FT2232H link.
//!
//! Channel A carries the data stream and must configure completely or
//! the whole transfer is off. Channel B only pushes one packet-size
//! byte downstream and is strictly optional: any failure on it leaves
//! the link running on the data channel alone.

use crate::error::Result;
use crate::tracing::prelude::*;
use crate::transfer::CHUNK_SIZE;
use crate::transport::{FifoBridge, FlowControl, Interface, UsbFifo};

pub const VENDOR_ID: u16 = 0x0403;
pub const PRODUCT_ID: u16 = 0x6010;

/// 1 ms loses blocks on the receiver side.
pub const LATENCY_TIMER_MS: u8 = 2;

/// Both channels of the bridge, configured and ready to stream.
#[derive(Debug)]
pub struct Link<D> {
    pub data: D,
    pub control: Option<D>,
}

/// Open and configure the link.
///
/// The data channel is configured in fixed order: synchronous FIFO
/// mode, latency timer, write chunk size, flow control. An error at any
/// step drops the handles acquired so far, releasing them in reverse
/// acquisition order, and nothing half-configured survives. The control
/// channel is then attempted and `packet_size` pushed through it.
pub fn bring_up<B: FifoBridge>(bridge: &mut B, packet_size: u8) -> Result<Link<B::Fifo>> {
    let mut data = bridge.open(VENDOR_ID, PRODUCT_ID, Interface::A)?;
    data.set_sync_fifo()?;
    data.set_latency_timer(LATENCY_TIMER_MS)?;
    data.set_write_chunk_size(CHUNK_SIZE)?;
    data.set_flow_control(FlowControl::RtsCtsHs)?;

    let control = match open_control(bridge, packet_size) {
        Ok(control) => Some(control),
        Err(e) => {
            warn!(error = %e, "Control channel unavailable, continuing without it.");
            None
        }
    };

    info!(control = control.is_some(), "Link up.");
    Ok(Link { data, control })
}

/// Open channel B in bitbang mode and push the packet-size byte.
///
/// A failed push is logged but keeps the opened channel; only open and
/// bitmode failures count as not having a control channel.
fn open_control<B: FifoBridge>(bridge: &mut B, packet_size: u8) -> Result<B::Fifo> {
    let mut control = bridge.open(VENDOR_ID, PRODUCT_ID, Interface::B)?;
    control.set_bitbang()?;

    if let Err(e) = control.write(&[packet_size]) {
        warn!(error = %e, packet_size, "Packet size push to control channel failed.");
    } else {
        debug!(packet_size, "Packet size pushed to control channel.");
    }

    Ok(control)
}
