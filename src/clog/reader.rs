//! Streaming CLOG-2 reader
//!
//! Reads one block at a time and yields the records inside it. Block
//! terminators are consumed internally. The first decode failure is logged,
//! returned once, and ends the stream.

use crate::clog::codec::ByteOrder;
use crate::clog::error::{ClogError, ClogResult};
use crate::clog::preamble::{Preamble, PREAMBLE_SIZE};
use crate::clog::record::{Payload, ReadMode, Record};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use tracing::{debug, error, warn};

pub struct ClogReader<R: Read> {
    input: R,
    preamble: Preamble,
    mode: ReadMode,
    block: Vec<u8>,
    pos: usize,
    block_index: u64,
    block_loaded: bool,
    records_read: u64,
    done: bool,
}

impl ClogReader<BufReader<File>> {
    /// Open a CLOG-2 file and decode its preamble
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> ClogResult<Self> {
        let file = File::open(path.as_ref())?;
        debug!("Opened CLOG file {}", path.as_ref().display());
        Self::from_reader(BufReader::new(file), mode)
    }
}

impl<R: Read> ClogReader<R> {
    pub fn from_reader(mut input: R, mode: ReadMode) -> ClogResult<Self> {
        let mut buf = vec![0u8; PREAMBLE_SIZE];
        input.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                ClogError::InvalidPreamble("file shorter than the preamble".into())
            }
            _ => ClogError::Io(e),
        })?;
        let preamble = Preamble::from_bytes(&buf)?;
        let block_size = preamble.block_size as usize;

        Ok(Self {
            input,
            preamble,
            mode,
            block: vec![0u8; block_size],
            pos: 0,
            block_index: 0,
            block_loaded: false,
            records_read: 0,
            done: false,
        })
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.preamble.byte_order
    }

    /// Records yielded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Load the next block; false at a clean end of file
    fn load_block(&mut self) -> ClogResult<bool> {
        let mut filled = 0;
        while filled < self.block.len() {
            match self.input.read(&mut self.block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(false);
        }
        // Short final block: zero the tail so a missing terminator shows up as a decode error
        self.block[filled..].fill(0);
        if self.block_loaded {
            self.block_index += 1;
        }
        self.block_loaded = true;
        self.pos = 0;
        Ok(true)
    }

    fn fail(&mut self, err: ClogError) -> Option<ClogResult<Record>> {
        error!("CLOG stream abandoned: {}", err);
        self.done = true;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for ClogReader<R> {
    type Item = ClogResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if !self.block_loaded || self.pos >= self.block.len() {
                match self.load_block() {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(
                            "CLOG file ended without ENDLOG after {} records",
                            self.records_read
                        );
                        self.done = true;
                        return None;
                    }
                    Err(e) => return self.fail(e),
                }
            }

            let offset = self.pos;
            let decoded = Record::decode(
                &self.block[offset..],
                self.preamble.byte_order,
                self.mode,
            );
            let (record, used) = match decoded {
                Ok(ok) => ok,
                Err(e) => return self.fail(e.at(self.block_index, offset)),
            };
            self.pos += used;

            match record.payload {
                Payload::EndBlock => {
                    // Force the next iteration to load a fresh block
                    self.pos = self.block.len();
                }
                Payload::EndLog => {
                    debug!(
                        "Reached ENDLOG after {} blocks, {} records",
                        self.block_index + 1,
                        self.records_read
                    );
                    self.done = true;
                    return None;
                }
                _ => {
                    self.records_read += 1;
                    return Some(Ok(record));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clog::record::{MsgEvt, StateDef, SEND_ETYPE};
    use crate::clog::writer::ClogWriter;
    use std::io::Cursor;

    fn sample_log(block_size: i32, events: usize) -> Vec<u8> {
        let preamble = Preamble::new(2).block_size(block_size);
        let mut writer = ClogWriter::new(Vec::new(), preamble).unwrap();
        writer
            .write(&Record::new(
                0.0,
                0,
                0,
                Payload::StateDef(StateDef {
                    stateid: 1,
                    start_etype: 10,
                    final_etype: 11,
                    color: "blue".into(),
                    name: "compute".into(),
                    format: String::new(),
                }),
            ))
            .unwrap();
        for i in 0..events {
            let etype = if i % 2 == 0 { 10 } else { 11 };
            writer
                .write(&Record::new(i as f64, 0, 0, Payload::BareEvt { etype }))
                .unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_reads_across_blocks() {
        // 256-byte blocks hold a handful of 32-byte records each
        let bytes = sample_log(256, 40);
        let reader = ClogReader::from_reader(Cursor::new(bytes), ReadMode::Full).unwrap();

        let records: Vec<Record> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 41);
        assert!(matches!(records[0].payload, Payload::StateDef(_)));
        assert_eq!(records[40].header.time, 39.0);
    }

    #[test]
    fn test_corrupt_record_fuses_stream() {
        let mut bytes = sample_log(256, 4);
        // Overwrite the rectype of the second record (after the 144-byte STATEDEF)
        let at = PREAMBLE_SIZE + 144 + 20;
        bytes[at..at + 4].copy_from_slice(&99i32.to_le_bytes());

        let mut reader = ClogReader::from_reader(Cursor::new(bytes), ReadMode::Full).unwrap();
        assert!(reader.next().unwrap().is_ok());

        match reader.next() {
            Some(Err(ClogError::Malformed { block, offset, .. })) => {
                assert_eq!(block, 0);
                assert_eq!(offset, 144);
            }
            other => panic!("expected malformed record, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_missing_endlog_ends_quietly() {
        let bytes = sample_log(256, 2);
        let truncated = bytes[..PREAMBLE_SIZE].to_vec();
        let reader = ClogReader::from_reader(Cursor::new(truncated), ReadMode::Full).unwrap();
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn test_short_file_is_invalid() {
        let err = ClogReader::from_reader(Cursor::new(vec![0u8; 10]), ReadMode::Full).err();
        assert!(matches!(err, Some(ClogError::InvalidPreamble(_))));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring.clog2");

        let preamble = Preamble::new(2).block_size(512);
        let mut writer = ClogWriter::create(&path, preamble).unwrap();
        writer
            .write(&Record::new(
                1.0,
                0,
                0,
                Payload::MsgEvt(MsgEvt {
                    etype: SEND_ETYPE,
                    icomm: 0,
                    rank: 1,
                    tag: 5,
                    size: 64,
                }),
            ))
            .unwrap();
        writer.finish().unwrap();

        let reader = ClogReader::open(&path, ReadMode::Matching).unwrap();
        assert_eq!(reader.preamble().world_size, 2);
        let records: Vec<_> = reader.collect::<ClogResult<_>>().unwrap();
        assert_eq!(records.len(), 1);
    }
}
