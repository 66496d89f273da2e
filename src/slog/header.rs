//! SLOG-2 file header
//!
//! Layout (256 bytes, little endian):
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   0 magic          [u8; 4] = "SLG2"     │
//! │   4 version        [u8; 16] NUL padded  │
//! │  20 compression    u8                   │
//! │  21 reserved       [u8; 3]              │
//! │  24 leaf_byte_cap  u32                  │
//! │  28 fanout         u32                  │
//! │  32 max_depth      i32                  │
//! │  36 node_count     u32                  │
//! │  40 drawable_count u64                  │
//! │  48 earliest       f64                  │
//! │  56 latest         f64                  │
//! │  64 categories     FileBlockPtr (i64+i32)│
//! │  76 line_id_maps   FileBlockPtr         │
//! │  88 tree_dir       FileBlockPtr         │
//! │ 100 tree_root      FileBlockPtr         │
//! │ 112 reserved                            │
//! │ 252 checksum       u32 (crc32 of 0..252)│
//! └─────────────────────────────────────────┘
//! ```

use crate::model::TimeBoundingBox;
use crate::slog::block::{CompressionType, FileBlockPtr};
use crate::slog::error::{SlogError, SlogResult};
use crate::slog::treenode::MAX_FANOUT;
use crate::version::VersionCheck;

/// Header size in bytes
pub const HEADER_SIZE: usize = 256;

const MAGIC: [u8; 4] = *b"SLG2";
const VERSION_LEN: usize = 16;
const CHECKSUM_AT: usize = HEADER_SIZE - 4;

/// Version this build writes
pub const SLOG_VERSION: &str = "SLOG 2.0.6";

/// Older versions this build still reads
pub const SLOG_COMPATIBLE_VERSIONS: &[&str] = &["SLOG 2.0.5"];

#[derive(Debug, Clone, PartialEq)]
pub struct Slog2Header {
    pub version: String,
    pub compression: CompressionType,
    pub leaf_byte_cap: u32,
    pub fanout: u32,
    /// Depth of the root node
    pub max_depth: i32,
    pub node_count: u32,
    pub drawable_count: u64,
    /// Box covering every stored drawable
    pub total_bbox: TimeBoundingBox,
    pub categories: FileBlockPtr,
    pub line_id_maps: FileBlockPtr,
    pub tree_dir: FileBlockPtr,
    pub tree_root: FileBlockPtr,
}

impl Slog2Header {
    /// Provisional header with null pointers
    pub fn new(compression: CompressionType, leaf_byte_cap: u32, fanout: u32) -> Self {
        Self {
            version: SLOG_VERSION.to_string(),
            compression,
            leaf_byte_cap,
            fanout,
            max_depth: 0,
            node_count: 0,
            drawable_count: 0,
            total_bbox: TimeBoundingBox::point(0.0),
            categories: FileBlockPtr::NULL,
            line_id_maps: FileBlockPtr::NULL,
            tree_dir: FileBlockPtr::NULL,
            tree_root: FileBlockPtr::NULL,
        }
    }

    pub fn version_check(&self) -> VersionCheck {
        VersionCheck::evaluate(&self.version, SLOG_VERSION, SLOG_COMPATIBLE_VERSIONS)
    }

    /// Whether every pointer has been backpatched
    pub fn is_complete(&self) -> bool {
        !self.categories.is_null() && !self.tree_dir.is_null() && !self.tree_root.is_null()
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&MAGIC);
        let version = self.version.as_bytes();
        let n = version.len().min(VERSION_LEN - 1);
        buf[4..4 + n].copy_from_slice(&version[..n]);
        buf[20] = self.compression as u8;
        buf[24..28].copy_from_slice(&self.leaf_byte_cap.to_le_bytes());
        buf[28..32].copy_from_slice(&self.fanout.to_le_bytes());
        buf[32..36].copy_from_slice(&self.max_depth.to_le_bytes());
        buf[36..40].copy_from_slice(&self.node_count.to_le_bytes());
        buf[40..48].copy_from_slice(&self.drawable_count.to_le_bytes());
        buf[48..56].copy_from_slice(&self.total_bbox.earliest.to_le_bytes());
        buf[56..64].copy_from_slice(&self.total_bbox.latest.to_le_bytes());

        for (at, ptr) in [
            (64, self.categories),
            (76, self.line_id_maps),
            (88, self.tree_dir),
            (100, self.tree_root),
        ] {
            put_ptr(&mut buf[at..at + 12], ptr);
        }

        let checksum = crc32fast::hash(&buf[0..CHECKSUM_AT]);
        buf[CHECKSUM_AT..].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Parse and check a header
    ///
    /// An unknown version is rejected unless `allow_incompatible` is set.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE], allow_incompatible: bool) -> SlogResult<Self> {
        if buf[0..4] != MAGIC {
            return Err(SlogError::InvalidHeader(format!(
                "Invalid magic: {:?}",
                &buf[0..4]
            )));
        }

        let stored = u32_at(buf, CHECKSUM_AT);
        let computed = crc32fast::hash(&buf[0..CHECKSUM_AT]);
        if stored != computed {
            return Err(SlogError::Corruption(format!(
                "Header checksum mismatch: stored={}, computed={}",
                stored, computed
            )));
        }

        let raw = &buf[4..4 + VERSION_LEN];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(VERSION_LEN);
        let version = String::from_utf8_lossy(&raw[..end]).into_owned();

        let header = Self {
            version,
            compression: CompressionType::try_from(buf[20])?,
            leaf_byte_cap: u32_at(buf, 24),
            fanout: u32_at(buf, 28),
            max_depth: u32_at(buf, 32) as i32,
            node_count: u32_at(buf, 36),
            drawable_count: u64_at(buf, 40),
            total_bbox: TimeBoundingBox::from_times(
                f64::from_bits(u64_at(buf, 48)),
                f64::from_bits(u64_at(buf, 56)),
            ),
            categories: ptr_at(buf, 64),
            line_id_maps: ptr_at(buf, 76),
            tree_dir: ptr_at(buf, 88),
            tree_root: ptr_at(buf, 100),
        };

        if !header.version_check().is_readable() && !allow_incompatible {
            return Err(SlogError::IncompatibleVersion(header.version));
        }
        if !(2..=MAX_FANOUT).contains(&header.fanout) {
            return Err(SlogError::InvalidHeader(format!(
                "fanout {} out of range",
                header.fanout
            )));
        }
        Ok(header)
    }
}

fn put_ptr(dst: &mut [u8], ptr: FileBlockPtr) {
    dst[0..8].copy_from_slice(&ptr.offset.to_le_bytes());
    dst[8..12].copy_from_slice(&ptr.size.to_le_bytes());
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(b)
}

fn ptr_at(buf: &[u8], at: usize) -> FileBlockPtr {
    FileBlockPtr::new(u64_at(buf, at) as i64, u32_at(buf, at + 8) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Slog2Header {
        let mut header = Slog2Header::new(CompressionType::Lz4, 65536, 2);
        header.max_depth = 3;
        header.node_count = 15;
        header.drawable_count = 1234;
        header.total_bbox = TimeBoundingBox::new(0.5, 12.0);
        header.categories = FileBlockPtr::new(9000, 120);
        header.tree_dir = FileBlockPtr::new(9120, 300);
        header.tree_root = FileBlockPtr::new(8000, 1000);
        header
    }

    #[test]
    fn test_header_layout() {
        let header = sample();
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], b"SLG2");
        assert_eq!(&bytes[4..14], b"SLOG 2.0.6");
        assert_eq!(bytes[20], 1);

        let restored = Slog2Header::from_bytes(&bytes, false).unwrap();
        assert_eq!(restored, header);
        assert!(restored.is_complete());
        assert!(restored.line_id_maps.is_null());
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = sample().to_bytes();
        bytes[30] ^= 0x01;
        assert!(matches!(
            Slog2Header::from_bytes(&bytes, false),
            Err(SlogError::Corruption(_))
        ));
    }

    #[test]
    fn test_version_gate() {
        let mut header = sample();
        header.version = "SLOG 2.0.5".into();
        assert!(Slog2Header::from_bytes(&header.to_bytes(), false).is_ok());

        header.version = "SLOG 1.0.0".into();
        let bytes = header.to_bytes();
        assert!(matches!(
            Slog2Header::from_bytes(&bytes, false),
            Err(SlogError::IncompatibleVersion(_))
        ));
        assert!(Slog2Header::from_bytes(&bytes, true).is_ok());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            Slog2Header::from_bytes(&bytes, false),
            Err(SlogError::InvalidHeader(_))
        ));
    }
}
