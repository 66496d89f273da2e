//! Variable-length blocks
//!
//! Every object after the header (tree node, category list, line-id maps, tree
//! directory) is stored as one block:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┐
//! │ payload (bincode, maybe LZ4) │ crc32 (u32)  │
//! └──────────────────────────────┴──────────────┘
//! ```
//!
//! A `FileBlockPtr` covers payload and checksum.

use crate::slog::error::{SlogError, SlogResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom, Write};

pub(crate) const CHECKSUM_SIZE: usize = 4;

/// Location of a block inside the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileBlockPtr {
    pub offset: i64,
    pub size: i32,
}

impl FileBlockPtr {
    /// Pointer to nothing
    pub const NULL: FileBlockPtr = FileBlockPtr {
        offset: -1,
        size: 0,
    };

    pub fn new(offset: i64, size: i32) -> Self {
        Self { offset, size }
    }

    pub fn is_null(&self) -> bool {
        self.offset < 0 || self.size <= 0
    }
}

impl Default for FileBlockPtr {
    fn default() -> Self {
        FileBlockPtr::NULL
    }
}

impl std::fmt::Display for FileBlockPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}+{}", self.offset, self.size)
    }
}

/// Block payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    #[default]
    Lz4 = 1,
}

impl TryFrom<u8> for CompressionType {
    type Error = SlogError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lz4),
            _ => Err(SlogError::InvalidHeader(format!(
                "Unknown compression type: {}",
                value
            ))),
        }
    }
}

/// Serialized size of a value before compression
pub fn encoded_size<T: Serialize + ?Sized>(value: &T) -> SlogResult<u64> {
    Ok(bincode::serialized_size(value)?)
}

/// Encode a value as a complete block (payload + checksum)
pub fn encode_block<T: Serialize + ?Sized>(
    value: &T,
    compression: CompressionType,
) -> SlogResult<Vec<u8>> {
    let serialized = bincode::serialize(value)?;
    let mut block = match compression {
        CompressionType::None => serialized,
        CompressionType::Lz4 => lz4_flex::compress_prepend_size(&serialized),
    };
    let checksum = crc32fast::hash(&block);
    block.extend_from_slice(&checksum.to_le_bytes());
    Ok(block)
}

/// Verify and decode a complete block
pub fn decode_block<T: DeserializeOwned>(
    block: &[u8],
    compression: CompressionType,
) -> SlogResult<T> {
    if block.len() < CHECKSUM_SIZE {
        return Err(SlogError::Corruption(format!(
            "block of {} bytes has no checksum",
            block.len()
        )));
    }
    let (payload, trailer) = block.split_at(block.len() - CHECKSUM_SIZE);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(SlogError::Corruption(format!(
            "Block checksum mismatch: stored={}, computed={}",
            stored, computed
        )));
    }

    let value = match compression {
        CompressionType::None => bincode::deserialize(payload)?,
        CompressionType::Lz4 => {
            let raw = lz4_flex::decompress_size_prepended(payload).map_err(|e| {
                SlogError::Compression(format!("LZ4 decompression failed: {}", e))
            })?;
            bincode::deserialize(&raw)?
        }
    };
    Ok(value)
}

/// Read and decode the block at `ptr`
pub fn read_block<R, T>(input: &mut R, ptr: FileBlockPtr, compression: CompressionType) -> SlogResult<T>
where
    R: Read + Seek,
    T: DeserializeOwned,
{
    if ptr.is_null() {
        return Err(SlogError::Corruption(format!("dereferenced null pointer {}", ptr)));
    }
    input.seek(SeekFrom::Start(ptr.offset as u64))?;
    let mut buf = vec![0u8; ptr.size as usize];
    input.read_exact(&mut buf)?;
    decode_block(&buf, compression)
}

/// Appends blocks and hands back their exact pointers
pub struct BlockWriter<W: Write> {
    out: W,
    pos: u64,
    compression: CompressionType,
    blocks_written: u64,
}

impl<W: Write> BlockWriter<W> {
    /// `start` is the file offset the sink is currently positioned at
    pub fn new(out: W, start: u64, compression: CompressionType) -> Self {
        Self {
            out,
            pos: start,
            compression,
            blocks_written: 0,
        }
    }

    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> SlogResult<FileBlockPtr> {
        let block = encode_block(value, self.compression)?;
        let size = i32::try_from(block.len()).map_err(|_| {
            SlogError::Config(format!("block of {} bytes exceeds the i32 size field", block.len()))
        })?;

        self.out.write_all(&block)?;
        let ptr = FileBlockPtr::new(self.pos as i64, size);
        self.pos += block.len() as u64;
        self.blocks_written += 1;
        Ok(ptr)
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pointers_locate_blocks() {
        for compression in [CompressionType::None, CompressionType::Lz4] {
            let mut writer = BlockWriter::new(Vec::new(), 0, compression);
            let a = writer.write(&vec![1u32, 2, 3]).unwrap();
            let b = writer.write(&"second block".to_string()).unwrap();
            assert_eq!(b.offset, a.size as i64);
            assert_eq!(writer.position(), (a.size + b.size) as u64);

            let mut file = Cursor::new(writer.into_inner());
            let first: Vec<u32> = read_block(&mut file, a, compression).unwrap();
            let second: String = read_block(&mut file, b, compression).unwrap();
            assert_eq!(first, vec![1, 2, 3]);
            assert_eq!(second, "second block");
        }
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut block = encode_block(&vec![7u8; 64], CompressionType::None).unwrap();
        block[10] ^= 0xff;
        let result: SlogResult<Vec<u8>> = decode_block(&block, CompressionType::None);
        assert!(matches!(result, Err(SlogError::Corruption(_))));
    }

    #[test]
    fn test_null_pointer() {
        assert!(FileBlockPtr::NULL.is_null());
        assert!(FileBlockPtr::default().is_null());
        let mut file = Cursor::new(Vec::new());
        let result: SlogResult<u32> = read_block(&mut file, FileBlockPtr::NULL, CompressionType::None);
        assert!(result.is_err());
    }

    #[test]
    fn test_encoded_size() {
        assert_eq!(encoded_size(&0u64).unwrap(), 8);
        assert_eq!(encoded_size(&vec![0u32; 4]).unwrap(), 8 + 16);
    }
}
