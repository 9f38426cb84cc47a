use anyhow::Result;
use clap::Parser;

use lvds_xfer::cli::Args;
use lvds_xfer::link;
use lvds_xfer::tracing::{self, prelude::*};
use lvds_xfer::transfer::{self, TransferEngine};
use lvds_xfer::transport::ftdi::FtdiBridge;

fn main() -> Result<()> {
    tracing::init();
    let args = Args::parse();

    // The source must be readable before any USB state is touched.
    let mut source = transfer::open_source(&args.file)?;

    let mut bridge = FtdiBridge::new()?;
    let mut link = link::bring_up(&mut bridge, args.packet_size)?;

    let mut engine = TransferEngine::new();
    let report = engine.run(&mut source, &mut link.data)?;
    info!(
        bytes = report.bytes_written,
        padding = report.padding_bytes,
        "Transfer complete."
    );

    println!(
        "written bytes: {} + padding {}",
        report.bytes_written, report.padding_bytes
    );
    Ok(())
}
