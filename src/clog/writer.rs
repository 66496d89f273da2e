//! CLOG-2 writer
//!
//! Buffers records into fixed-size blocks. A block is closed with ENDBLOCK
//! when the next record would not leave room for the terminator, and the
//! last block is closed with ENDLOG. Blocks are zero padded to `block_size`.

use crate::clog::error::{ClogError, ClogResult};
use crate::clog::preamble::Preamble;
use crate::clog::record::{Payload, Record, HEADER_SIZE};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

pub struct ClogWriter<W: Write> {
    out: W,
    preamble: Preamble,
    block: Vec<u8>,
    last_time: f64,
    blocks_written: u64,
}

impl ClogWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, preamble: Preamble) -> ClogResult<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), preamble)
    }
}

impl<W: Write> ClogWriter<W> {
    /// Write the preamble and start the first block
    pub fn new(mut out: W, preamble: Preamble) -> ClogResult<Self> {
        let capacity = match usize::try_from(preamble.block_size) {
            Ok(size) if size > HEADER_SIZE => size,
            _ => {
                return Err(ClogError::InvalidPreamble(format!(
                    "block size {} cannot hold a terminator",
                    preamble.block_size
                )))
            }
        };
        out.write_all(&preamble.to_bytes())?;

        Ok(Self {
            out,
            preamble,
            block: Vec::with_capacity(capacity),
            last_time: 0.0,
            blocks_written: 0,
        })
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    fn block_size(&self) -> usize {
        self.preamble.block_size as usize
    }

    /// Append a record, starting a new block when the current one is full
    pub fn write(&mut self, record: &Record) -> ClogResult<()> {
        let len = record.encoded_len();
        if len + HEADER_SIZE > self.block_size() {
            return Err(ClogError::RecordTooLarge {
                size: len,
                block_size: self.block_size(),
            });
        }
        if self.block.len() + len + HEADER_SIZE > self.block_size() {
            self.close_block(Payload::EndBlock)?;
        }

        record.encode(self.preamble.byte_order, &mut self.block);
        self.last_time = record.header.time;
        Ok(())
    }

    fn close_block(&mut self, terminator: Payload) -> ClogResult<()> {
        let end = Record::new(self.last_time, 0, 0, terminator);
        end.encode(self.preamble.byte_order, &mut self.block);
        let block_size = self.block_size();
        self.block.resize(block_size, 0);

        self.out.write_all(&self.block)?;
        self.block.clear();
        self.blocks_written += 1;
        Ok(())
    }

    /// Close the last block with ENDLOG and hand back the sink
    pub fn finish(mut self) -> ClogResult<W> {
        self.close_block(Payload::EndLog)?;
        self.out.flush()?;
        debug!("Wrote CLOG log with {} blocks", self.blocks_written);
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clog::preamble::PREAMBLE_SIZE;
    use crate::clog::record::{SrcLoc, CARGO_SIZE};

    #[test]
    fn test_blocks_are_padded() {
        let mut writer = ClogWriter::new(Vec::new(), Preamble::new(1).block_size(128)).unwrap();
        for i in 0..10 {
            writer
                .write(&Record::new(i as f64, 0, 0, Payload::BareEvt { etype: 1 }))
                .unwrap();
        }
        let bytes = writer.finish().unwrap();

        assert_eq!((bytes.len() - PREAMBLE_SIZE) % 128, 0);
        // 3 records of 32 bytes + terminator fit in 128 bytes
        assert_eq!((bytes.len() - PREAMBLE_SIZE) / 128, 4);
    }

    #[test]
    fn test_record_too_large() {
        let mut writer = ClogWriter::new(Vec::new(), Preamble::new(1).block_size(128)).unwrap();
        let srcloc = Record::new(
            0.0,
            0,
            0,
            Payload::SrcLoc(SrcLoc {
                srcloc: 1,
                lineno: 1,
                filename: "main.c".into(),
            }),
        );
        assert!(matches!(
            writer.write(&srcloc),
            Err(ClogError::RecordTooLarge { size: 288, .. })
        ));

        let cargo = Record::new(0.0, 0, 0, Payload::CargoEvt { etype: 3, bytes: [0; CARGO_SIZE] });
        assert!(writer.write(&cargo).is_ok());
    }

    #[test]
    fn test_tiny_block_rejected() {
        assert!(ClogWriter::new(Vec::new(), Preamble::new(1).block_size(16)).is_err());
    }

    #[test]
    fn test_negative_block_size_rejected() {
        for size in [0, -1, i32::MIN] {
            assert!(matches!(
                ClogWriter::new(Vec::new(), Preamble::new(1).block_size(size)),
                Err(ClogError::InvalidPreamble(_))
            ));
        }
    }
}
