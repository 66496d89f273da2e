//! CLOG-2 binary event log codec
//!
//! - **preamble**: fixed 1024-byte file header with byte order and block size
//! - **record**: record header + per-type fixed payloads
//! - **codec**: endian-aware nom primitives
//! - **reader**: block-at-a-time record iterator
//! - **writer**: block-buffered record writer
//!
//! ```text
//! ┌──────────┬─────────────────────────┬─────────────────────────┬───
//! │ Preamble │ Block 0                 │ Block 1                 │ ...
//! │ 1024 B   │ rec rec rec ... ENDBLOCK│ rec rec ... ENDLOG  pad │
//! └──────────┴─────────────────────────┴─────────────────────────┴───
//! ```

pub mod codec;
pub mod error;
pub mod preamble;
pub mod reader;
pub mod record;
pub mod writer;

pub use codec::ByteOrder;
pub use error::{ClogError, ClogResult};
pub use preamble::{Preamble, CLOG_COMPATIBLE_VERSIONS, CLOG_VERSION, PREAMBLE_SIZE};
pub use reader::ClogReader;
pub use record::{
    CollEvt, CommEvt, ConstDef, EventDef, MsgEvt, Payload, ReadMode, RecType, Record,
    RecordHeader, SrcLoc, StateDef, CARGO_SIZE, RECV_ETYPE, SEND_ETYPE,
};
pub use writer::ClogWriter;
