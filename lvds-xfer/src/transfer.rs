//! Streaming transfer engine.
//!
//! Reads the source in fixed-size chunks, pushes each chunk to the data
//! channel, and finishes with a pad write that keeps the receiver's
//! frame alignment. Everything here is blocking and single-threaded;
//! the bridge is a FIFO and reordered writes would corrupt the
//! downstream frame stream.

use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::transport::UsbFifo;

/// Host-side write granularity for each streaming I/O call.
pub const CHUNK_SIZE: usize = 8_000_000;

/// Block granularity the downstream receiver expects.
pub const FRAME_SIZE: u64 = 8272;

const PAD_FILL: u8 = 0;

/// Running totals for one transfer.
#[derive(Debug, Default)]
struct TransferState {
    /// Bytes handed to the device so far; only ever grows.
    bytes_written: u64,
    /// Set once, on the first short read, and never cleared.
    exhausted: bool,
}

/// What a finished transfer looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub bytes_written: u64,
    pub padding_bytes: u64,
}

/// Owns the reusable chunk buffer and runs the streaming loop.
pub struct TransferEngine {
    buffer: Vec<u8>,
}

impl TransferEngine {
    pub fn new() -> Self {
        Self {
            buffer: vec![0; CHUNK_SIZE],
        }
    }

    /// Stream `source` to `fifo` and pad the tail.
    ///
    /// Device write failures are logged and tolerated; the stream keeps
    /// going and the byte total counts what was read from the source.
    pub fn run<R: Read, D: UsbFifo>(
        &mut self,
        source: &mut R,
        fifo: &mut D,
    ) -> Result<TransferReport> {
        let mut state = TransferState::default();

        while !state.exhausted {
            let filled = read_full(source, &mut self.buffer);
            if filled < self.buffer.len() {
                state.exhausted = true;
            }
            state.bytes_written += filled as u64;

            if filled > 0 {
                match fifo.write(&self.buffer[..filled]) {
                    Ok(written) => {
                        trace!(written, total = state.bytes_written, "Chunk written.")
                    }
                    Err(e) => warn!(error = %e, "Device write failed, stream continues."),
                }
            }
        }

        // The pad length is the remainder of the total against the frame
        // size, not the distance to the next boundary.
        let padding = state.bytes_written % FRAME_SIZE;
        if padding > 0 {
            let pad = vec![PAD_FILL; FRAME_SIZE as usize];
            if let Err(e) = fifo.write(&pad[..padding as usize]) {
                warn!(error = %e, "Padding write failed.");
            }
        }

        debug!(bytes = state.bytes_written, padding, "Transfer finished.");
        Ok(TransferReport {
            bytes_written: state.bytes_written,
            padding_bytes: padding,
        })
    }
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the source file. Checked before any device state is touched;
/// the failure message names the working directory so a bad relative
/// path is visible.
pub fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::SourceOpen {
        path: path.to_path_buf(),
        cwd: env::current_dir().unwrap_or_else(|_| PathBuf::from("?")),
        source,
    })
}

// Fill `buf` from `source`, looping over short reads. Returns the
// number of bytes placed in `buf`; a read error ends the stream the
// same way end-of-file does.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "Source read failed, treating as end of stream.");
                break;
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FlowControl;
    use std::io::Cursor;
    use test_case::test_case;

    #[derive(Default)]
    struct RecordingFifo {
        writes: Vec<Vec<u8>>,
        fail_writes: bool,
    }

    impl UsbFifo for RecordingFifo {
        fn set_sync_fifo(&mut self) -> Result<()> {
            Ok(())
        }

        fn set_bitbang(&mut self) -> Result<()> {
            Ok(())
        }

        fn set_latency_timer(&mut self, _ms: u8) -> Result<()> {
            Ok(())
        }

        fn set_write_chunk_size(&mut self, _bytes: usize) -> Result<()> {
            Ok(())
        }

        fn set_flow_control(&mut self, _mode: FlowControl) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<usize> {
            if self.fail_writes {
                return Err(Error::Write("injected".to_string()));
            }
            self.writes.push(data.to_vec());
            Ok(data.len())
        }
    }

    fn transfer(data: Vec<u8>) -> (RecordingFifo, TransferReport) {
        let mut fifo = RecordingFifo::default();
        let mut engine = TransferEngine::new();
        let report = engine.run(&mut Cursor::new(data), &mut fifo).unwrap();
        (fifo, report)
    }

    #[test_case(0, 0 ; "empty source")]
    #[test_case(1, 1 ; "single byte")]
    #[test_case(FRAME_SIZE as usize * 2, 1 ; "exact frame multiple")]
    #[test_case(CHUNK_SIZE, 1 ; "exact chunk")]
    #[test_case(CHUNK_SIZE + 1, 2 ; "chunk plus one byte")]
    #[test_case(2 * CHUNK_SIZE + 5, 3 ; "two chunks plus tail")]
    fn data_writes_cover_the_source(size: usize, data_writes: usize) {
        let (fifo, report) = transfer(vec![0xa5; size]);

        assert_eq!(report.bytes_written, size as u64);
        assert_eq!(report.padding_bytes, size as u64 % FRAME_SIZE);

        let pad_writes = usize::from(report.padding_bytes > 0);
        assert_eq!(fifo.writes.len(), data_writes + pad_writes);

        let streamed: usize = fifo.writes[..data_writes].iter().map(Vec::len).sum();
        assert_eq!(streamed, size);
        assert!(fifo.writes[..data_writes]
            .iter()
            .all(|w| w.iter().all(|b| *b == 0xa5)));

        if pad_writes == 1 {
            let pad = fifo.writes.last().unwrap();
            assert_eq!(pad.len() as u64, report.padding_bytes);
            assert!(pad.iter().all(|b| *b == PAD_FILL));
        }
    }

    #[test]
    fn frame_aligned_source_pads_nothing() {
        let (fifo, report) = transfer(vec![3; FRAME_SIZE as usize * 2]);
        assert_eq!(report.padding_bytes, 0);
        assert_eq!(fifo.writes.len(), 1);
    }

    #[test]
    fn write_failures_do_not_stop_the_stream() {
        let mut fifo = RecordingFifo {
            fail_writes: true,
            ..Default::default()
        };
        let mut engine = TransferEngine::new();
        let report = engine
            .run(&mut Cursor::new(vec![1; 5000]), &mut fifo)
            .unwrap();

        assert_eq!(report.bytes_written, 5000);
        assert_eq!(report.padding_bytes, 5000 % FRAME_SIZE);
        assert!(fifo.writes.is_empty());
    }

    #[test]
    fn read_error_ends_the_stream_like_eof() {
        struct BrokenSource {
            yielded: bool,
        }

        impl Read for BrokenSource {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.yielded {
                    return Err(io::Error::other("cable yanked"));
                }
                self.yielded = true;
                buf[..100].fill(7);
                Ok(100)
            }
        }

        let mut fifo = RecordingFifo::default();
        let mut engine = TransferEngine::new();
        let report = engine
            .run(&mut BrokenSource { yielded: false }, &mut fifo)
            .unwrap();

        assert_eq!(report.bytes_written, 100);
        assert_eq!(report.padding_bytes, 100);
        assert_eq!(fifo.writes.len(), 2);
        assert_eq!(fifo.writes[0].len(), 100);
    }

    #[test]
    fn short_reads_accumulate_into_full_chunks() {
        // Serves at most 10 bytes per read call.
        struct DribbleSource {
            remaining: usize,
        }

        impl Read for DribbleSource {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                let n = self.remaining.min(10).min(buf.len());
                buf[..n].fill(9);
                self.remaining -= n;
                Ok(n)
            }
        }

        let mut source = DribbleSource { remaining: 25 };
        let mut buf = [0u8; 16];
        assert_eq!(read_full(&mut source, &mut buf), 16);
        assert_eq!(read_full(&mut source, &mut buf), 9);
        assert_eq!(read_full(&mut source, &mut buf), 0);
    }

    #[test]
    fn open_source_reports_the_working_directory() {
        let err = open_source(Path::new("no-such-file.bin")).unwrap_err();
        match &err {
            Error::SourceOpen { path, cwd, .. } => {
                assert_eq!(path, Path::new("no-such-file.bin"));
                assert_ne!(cwd, &PathBuf::new());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("cwd"));
    }

    #[test]
    fn open_source_yields_a_readable_file() {
        let path = env::temp_dir().join(format!("lvds-xfer-test-{}", std::process::id()));
        std::fs::write(&path, b"abc").unwrap();

        let mut contents = Vec::new();
        open_source(&path).unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"abc");

        std::fs::remove_file(&path).unwrap();
    }
}
