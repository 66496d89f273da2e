//! CLOG-2 preamble: the fixed-size header at the start of every event log
//!
//! Layout (1024 bytes, integers in the byte order named by byte 12):
//! ```text
//! 0    version      [u8; 12]  "CLOG-02.44", NUL padded
//! 12   big_endian   u8        0 = little, 1 = big
//! 13   reserved     [u8; 3]
//! 16   block_size               i32
//! 20   num_buffered_blocks      i32
//! 24   world_size               i32
//! 28   known_eventid_start      i32
//! 32   user_eventid_start       i32
//! 36   user_solo_eventid_start  i32
//! 40   known_stateid_count      i32
//! 44   user_stateid_count       i32
//! 48   user_solo_eventid_count  i32
//! 52   reserved                 i32
//! 56   commtable_offset         i64
//! 64   reserved                 [u8; 960]
//! ```

use crate::clog::codec::{fixed_str, put_fixed_str, ByteOrder};
use crate::clog::error::{ClogError, ClogResult};
use crate::version::VersionCheck;
use nom::bytes::complete::take;
use nom::number::complete::le_u8;
use nom::IResult;

/// Preamble size in bytes
pub const PREAMBLE_SIZE: usize = 1024;

const VERSION_LEN: usize = 12;

/// Version this build writes
pub const CLOG_VERSION: &str = "CLOG-02.44";

/// Older versions with the same record layout
pub const CLOG_COMPATIBLE_VERSIONS: &[&str] = &["CLOG-02.42", "CLOG-02.43"];

/// Default block size for newly written logs
pub const DEFAULT_BLOCK_SIZE: i32 = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Preamble {
    pub version: String,
    pub byte_order: ByteOrder,
    pub block_size: i32,
    pub num_buffered_blocks: i32,
    /// Number of processes in the world communicator
    pub world_size: i32,
    pub known_eventid_start: i32,
    pub user_eventid_start: i32,
    pub user_solo_eventid_start: i32,
    pub known_stateid_count: i32,
    pub user_stateid_count: i32,
    pub user_solo_eventid_count: i32,
    pub commtable_offset: i64,
}

impl Preamble {
    pub fn new(world_size: i32) -> Self {
        Self {
            version: CLOG_VERSION.to_string(),
            byte_order: ByteOrder::LITTLE,
            block_size: DEFAULT_BLOCK_SIZE,
            num_buffered_blocks: 128,
            world_size,
            known_eventid_start: 0,
            user_eventid_start: 600,
            user_solo_eventid_start: 5000,
            known_stateid_count: 0,
            user_stateid_count: 0,
            user_solo_eventid_count: 0,
            commtable_offset: 0,
        }
    }

    /// Builder: set block size
    pub fn block_size(mut self, block_size: i32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Builder: set byte order
    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn version_check(&self) -> VersionCheck {
        VersionCheck::evaluate(&self.version, CLOG_VERSION, CLOG_COMPATIBLE_VERSIONS)
    }

    /// Line id of a (communicator, rank) pair
    pub fn line_id(&self, icomm: i32, rank: i32) -> i64 {
        icomm as i64 * self.world_size.max(1) as i64 + rank as i64
    }

    /// Serialize to the fixed 1024-byte layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let order = self.byte_order;
        let mut buf = Vec::with_capacity(PREAMBLE_SIZE);

        put_fixed_str(&mut buf, &self.version, VERSION_LEN);
        buf.push(order.big_endian as u8);
        buf.extend_from_slice(&[0u8; 3]);
        for v in [
            self.block_size,
            self.num_buffered_blocks,
            self.world_size,
            self.known_eventid_start,
            self.user_eventid_start,
            self.user_solo_eventid_start,
            self.known_stateid_count,
            self.user_stateid_count,
            self.user_solo_eventid_count,
            0,
        ] {
            order.put_i32(&mut buf, v);
        }
        order.put_i64(&mut buf, self.commtable_offset);
        buf.resize(PREAMBLE_SIZE, 0);

        buf
    }

    /// Parse the fixed layout
    pub fn from_bytes(buf: &[u8]) -> ClogResult<Self> {
        if buf.len() < PREAMBLE_SIZE {
            return Err(ClogError::InvalidPreamble(format!(
                "expected {} bytes, got {}",
                PREAMBLE_SIZE,
                buf.len()
            )));
        }

        let (_, preamble) = parse_preamble(buf)
            .map_err(|e| ClogError::InvalidPreamble(format!("{:?}", e)))?;

        if !preamble.version.starts_with("CLOG") {
            return Err(ClogError::InvalidPreamble(format!(
                "not a CLOG file (version tag {:?})",
                preamble.version
            )));
        }
        if preamble.block_size <= 0 {
            return Err(ClogError::InvalidPreamble(format!(
                "invalid block size {}",
                preamble.block_size
            )));
        }

        Ok(preamble)
    }
}

fn parse_preamble(input: &[u8]) -> IResult<&[u8], Preamble> {
    let (input, version) = fixed_str(input, VERSION_LEN)?;
    let (input, endian_flag) = le_u8(input)?;
    let (input, _) = take(3usize)(input)?;
    let order = ByteOrder {
        big_endian: endian_flag != 0,
    };

    let (input, block_size) = order.i32(input)?;
    let (input, num_buffered_blocks) = order.i32(input)?;
    let (input, world_size) = order.i32(input)?;
    let (input, known_eventid_start) = order.i32(input)?;
    let (input, user_eventid_start) = order.i32(input)?;
    let (input, user_solo_eventid_start) = order.i32(input)?;
    let (input, known_stateid_count) = order.i32(input)?;
    let (input, user_stateid_count) = order.i32(input)?;
    let (input, user_solo_eventid_count) = order.i32(input)?;
    let (input, _) = order.i32(input)?;
    let (input, commtable_offset) = order.i64(input)?;

    Ok((
        input,
        Preamble {
            version,
            byte_order: order,
            block_size,
            num_buffered_blocks,
            world_size,
            known_eventid_start,
            user_eventid_start,
            user_solo_eventid_start,
            known_stateid_count,
            user_stateid_count,
            user_solo_eventid_count,
            commtable_offset,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_layout() {
        let preamble = Preamble::new(4).block_size(4096);
        let bytes = preamble.to_bytes();

        assert_eq!(bytes.len(), PREAMBLE_SIZE);
        assert_eq!(&bytes[0..10], b"CLOG-02.44");
        assert_eq!(bytes[12], 0);
        assert_eq!(i32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]), 4096);
        assert_eq!(i32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]), 4);
    }

    #[test]
    fn test_big_endian_preamble() {
        let preamble = Preamble::new(8).byte_order(ByteOrder::BIG);
        let bytes = preamble.to_bytes();
        assert_eq!(bytes[12], 1);

        let restored = Preamble::from_bytes(&bytes).unwrap();
        assert_eq!(restored.world_size, 8);
        assert!(restored.byte_order.big_endian);
    }

    #[test]
    fn test_version_check() {
        let mut preamble = Preamble::new(1);
        assert_eq!(preamble.version_check(), VersionCheck::Exact);

        preamble.version = "CLOG-02.42".into();
        assert!(preamble.version_check().is_readable());

        preamble.version = "CLOG-03.00".into();
        assert_eq!(
            preamble.version_check(),
            VersionCheck::Incompatible("CLOG-03.00".into())
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Preamble::from_bytes(&[0u8; 16]).is_err());
        assert!(Preamble::from_bytes(&vec![b'x'; PREAMBLE_SIZE]).is_err());
    }

    #[test]
    fn test_line_id() {
        let preamble = Preamble::new(4);
        assert_eq!(preamble.line_id(0, 3), 3);
        assert_eq!(preamble.line_id(2, 1), 9);
    }
}
