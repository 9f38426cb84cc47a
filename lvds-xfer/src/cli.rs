//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// Stream a file over an FT2232H synchronous-FIFO link.
#[derive(Debug, Parser)]
#[command(name = "lvds-xfer", version, about)]
pub struct Args {
    /// File whose contents are streamed over the data channel
    pub file: PathBuf,

    /// Packet size pushed to the control channel, as a hex byte (e.g. 1f)
    #[arg(value_parser = parse_hex_byte)]
    pub packet_size: u8,
}

fn parse_hex_byte(raw: &str) -> Result<u8, String> {
    let digits = raw.trim_start_matches("0x");
    u8::from_str_radix(digits, 16).map_err(|e| format!("not a hex byte: {e}"))
}
