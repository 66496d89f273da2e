//! CLOG-2 records
//!
//! Every record is a 24-byte header followed by a payload whose size is fixed
//! by the record type:
//!
//! ```text
//! header     time f64 | icomm i32 | rank i32 | thread i32 | rectype i32
//! STATEDEF   stateid, start etype, final etype, pad, color[24], name[40], format[40]
//! EVENTDEF   etype, pad, color[24], name[40], format[40]
//! CONSTDEF   etype, value, name[40]
//! BAREEVT    etype, pad
//! CARGOEVT   etype, pad, bytes[32]
//! MSGEVT     etype, icomm, partner rank, tag, size, pad
//! COLLEVT    etype, root, size, pad
//! COMMEVT    etype, parent comm, new comm, pad
//! SRCLOC     srcloc id, line number, filename[256]
//! TIMESHIFT  shift f64
//! ```

use crate::clog::codec::{fixed_bytes, fixed_str, put_fixed_str, ByteOrder};
use crate::clog::error::{ClogError, ClogResult};
use nom::bytes::complete::take;
use nom::IResult;

/// Header size in bytes
pub const HEADER_SIZE: usize = 24;

/// Cargo payload size in bytes
pub const CARGO_SIZE: usize = 32;

const COLOR_LEN: usize = 24;
const NAME_LEN: usize = 40;
const FORMAT_LEN: usize = 40;
const FILENAME_LEN: usize = 256;

/// Built-in event type of a point-to-point send
pub const SEND_ETYPE: i32 = -101;
/// Built-in event type of a point-to-point receive
pub const RECV_ETYPE: i32 = -102;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecType {
    EndLog = 0,
    EndBlock = 1,
    StateDef = 2,
    EventDef = 3,
    ConstDef = 4,
    BareEvt = 5,
    CargoEvt = 6,
    MsgEvt = 7,
    CollEvt = 8,
    CommEvt = 9,
    SrcLoc = 10,
    TimeShift = 11,
}

impl TryFrom<i32> for RecType {
    type Error = ClogError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => RecType::EndLog,
            1 => RecType::EndBlock,
            2 => RecType::StateDef,
            3 => RecType::EventDef,
            4 => RecType::ConstDef,
            5 => RecType::BareEvt,
            6 => RecType::CargoEvt,
            7 => RecType::MsgEvt,
            8 => RecType::CollEvt,
            9 => RecType::CommEvt,
            10 => RecType::SrcLoc,
            11 => RecType::TimeShift,
            other => return Err(ClogError::UnknownRecordType(other)),
        })
    }
}

impl RecType {
    /// Payload size following the header
    pub fn payload_size(&self) -> usize {
        match self {
            RecType::EndLog | RecType::EndBlock => 0,
            RecType::StateDef => 16 + COLOR_LEN + NAME_LEN + FORMAT_LEN,
            RecType::EventDef => 8 + COLOR_LEN + NAME_LEN + FORMAT_LEN,
            RecType::ConstDef => 8 + NAME_LEN,
            RecType::BareEvt => 8,
            RecType::CargoEvt => 8 + CARGO_SIZE,
            RecType::MsgEvt => 24,
            RecType::CollEvt | RecType::CommEvt => 16,
            RecType::SrcLoc => 8 + FILENAME_LEN,
            RecType::TimeShift => 8,
        }
    }

    /// Records the matcher never looks at
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            RecType::ConstDef
                | RecType::CollEvt
                | RecType::CommEvt
                | RecType::SrcLoc
                | RecType::TimeShift
        )
    }
}

/// How much of each record to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Decode every payload
    #[default]
    Full,
    /// Skip payloads of records irrelevant to event matching
    Matching,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordHeader {
    pub time: f64,
    pub icomm: i32,
    pub rank: i32,
    pub thread: i32,
    pub rectype: RecType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateDef {
    pub stateid: i32,
    pub start_etype: i32,
    pub final_etype: i32,
    pub color: String,
    pub name: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDef {
    pub etype: i32,
    pub color: String,
    pub name: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDef {
    pub etype: i32,
    pub value: i32,
    pub name: String,
}

/// Point-to-point message endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MsgEvt {
    pub etype: i32,
    /// Communicator the partner rank belongs to
    pub icomm: i32,
    /// Rank on the other side of the message
    pub rank: i32,
    pub tag: i32,
    pub size: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollEvt {
    pub etype: i32,
    pub root: i32,
    pub size: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommEvt {
    pub etype: i32,
    pub parent: i32,
    pub newcomm: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SrcLoc {
    pub srcloc: i32,
    pub lineno: i32,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    EndLog,
    EndBlock,
    StateDef(StateDef),
    EventDef(EventDef),
    ConstDef(ConstDef),
    BareEvt { etype: i32 },
    CargoEvt { etype: i32, bytes: [u8; CARGO_SIZE] },
    MsgEvt(MsgEvt),
    CollEvt(CollEvt),
    CommEvt(CommEvt),
    SrcLoc(SrcLoc),
    TimeShift { shift: f64 },
    /// Payload of the given type stepped over in `ReadMode::Matching`
    Skipped(RecType),
}

impl Payload {
    /// Record type this payload is written as
    pub fn rectype(&self) -> RecType {
        match self {
            Payload::EndLog => RecType::EndLog,
            Payload::EndBlock => RecType::EndBlock,
            Payload::StateDef(_) => RecType::StateDef,
            Payload::EventDef(_) => RecType::EventDef,
            Payload::ConstDef(_) => RecType::ConstDef,
            Payload::BareEvt { .. } => RecType::BareEvt,
            Payload::CargoEvt { .. } => RecType::CargoEvt,
            Payload::MsgEvt(_) => RecType::MsgEvt,
            Payload::CollEvt(_) => RecType::CollEvt,
            Payload::CommEvt(_) => RecType::CommEvt,
            Payload::SrcLoc(_) => RecType::SrcLoc,
            Payload::TimeShift { .. } => RecType::TimeShift,
            Payload::Skipped(rectype) => *rectype,
        }
    }

    /// Event type code of event-carrying payloads
    pub fn etype(&self) -> Option<i32> {
        match self {
            Payload::BareEvt { etype } | Payload::CargoEvt { etype, .. } => Some(*etype),
            Payload::MsgEvt(m) => Some(m.etype),
            Payload::CollEvt(c) => Some(c.etype),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: RecordHeader,
    pub payload: Payload,
}

impl Record {
    /// Build a record; the header's rectype follows the payload
    pub fn new(time: f64, icomm: i32, rank: i32, payload: Payload) -> Self {
        let rectype = payload.rectype();
        Self {
            header: RecordHeader {
                time,
                icomm,
                rank,
                thread: 0,
                rectype,
            },
            payload,
        }
    }

    /// Encoded size including the header
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.header.rectype.payload_size()
    }

    /// Decode one record from the front of `buf`, returning it and the bytes consumed
    pub fn decode(buf: &[u8], order: ByteOrder, mode: ReadMode) -> ClogResult<(Record, usize)> {
        let (rest, (time, icomm, rank, thread, code)) =
            parse_header(buf, order).map_err(|_| truncated("header", buf.len()))?;
        let rectype = RecType::try_from(code)?;

        let size = rectype.payload_size();
        if rest.len() < size {
            return Err(truncated("payload", rest.len()));
        }

        let payload = if mode == ReadMode::Matching && rectype.is_skippable() {
            let (_, _) = skip(rest, size).map_err(|_| truncated("payload", rest.len()))?;
            Payload::Skipped(rectype)
        } else {
            let (_, payload) =
                parse_payload(rest, order, rectype).map_err(|_| truncated("payload", rest.len()))?;
            payload
        };

        let record = Record {
            header: RecordHeader {
                time,
                icomm,
                rank,
                thread,
                rectype,
            },
            payload,
        };
        Ok((record, HEADER_SIZE + size))
    }

    /// Append the fixed layout of this record
    ///
    /// A skipped payload is written as zeros of its type's size.
    pub fn encode(&self, order: ByteOrder, out: &mut Vec<u8>) {
        let h = &self.header;
        order.put_f64(out, h.time);
        order.put_i32(out, h.icomm);
        order.put_i32(out, h.rank);
        order.put_i32(out, h.thread);
        order.put_i32(out, h.rectype as i32);

        match &self.payload {
            Payload::EndLog | Payload::EndBlock => {}
            Payload::StateDef(d) => {
                for v in [d.stateid, d.start_etype, d.final_etype, 0] {
                    order.put_i32(out, v);
                }
                put_fixed_str(out, &d.color, COLOR_LEN);
                put_fixed_str(out, &d.name, NAME_LEN);
                put_fixed_str(out, &d.format, FORMAT_LEN);
            }
            Payload::EventDef(d) => {
                order.put_i32(out, d.etype);
                order.put_i32(out, 0);
                put_fixed_str(out, &d.color, COLOR_LEN);
                put_fixed_str(out, &d.name, NAME_LEN);
                put_fixed_str(out, &d.format, FORMAT_LEN);
            }
            Payload::ConstDef(d) => {
                order.put_i32(out, d.etype);
                order.put_i32(out, d.value);
                put_fixed_str(out, &d.name, NAME_LEN);
            }
            Payload::BareEvt { etype } => {
                order.put_i32(out, *etype);
                order.put_i32(out, 0);
            }
            Payload::CargoEvt { etype, bytes } => {
                order.put_i32(out, *etype);
                order.put_i32(out, 0);
                out.extend_from_slice(bytes);
            }
            Payload::MsgEvt(m) => {
                for v in [m.etype, m.icomm, m.rank, m.tag, m.size, 0] {
                    order.put_i32(out, v);
                }
            }
            Payload::CollEvt(c) => {
                for v in [c.etype, c.root, c.size, 0] {
                    order.put_i32(out, v);
                }
            }
            Payload::CommEvt(c) => {
                for v in [c.etype, c.parent, c.newcomm, 0] {
                    order.put_i32(out, v);
                }
            }
            Payload::SrcLoc(s) => {
                order.put_i32(out, s.srcloc);
                order.put_i32(out, s.lineno);
                put_fixed_str(out, &s.filename, FILENAME_LEN);
            }
            Payload::TimeShift { shift } => order.put_f64(out, *shift),
            Payload::Skipped(_) => {
                out.resize(out.len() + h.rectype.payload_size(), 0);
            }
        }
    }
}

fn truncated(what: &str, available: usize) -> ClogError {
    ClogError::Malformed {
        block: 0,
        offset: 0,
        reason: format!("truncated {} ({} bytes left)", what, available),
    }
}

fn parse_header(input: &[u8], order: ByteOrder) -> IResult<&[u8], (f64, i32, i32, i32, i32)> {
    let (input, time) = order.f64(input)?;
    let (input, icomm) = order.i32(input)?;
    let (input, rank) = order.i32(input)?;
    let (input, thread) = order.i32(input)?;
    let (input, code) = order.i32(input)?;
    Ok((input, (time, icomm, rank, thread, code)))
}

fn skip(input: &[u8], size: usize) -> IResult<&[u8], &[u8]> {
    take(size)(input)
}

fn parse_names(input: &[u8]) -> IResult<&[u8], (String, String, String)> {
    let (input, color) = fixed_str(input, COLOR_LEN)?;
    let (input, name) = fixed_str(input, NAME_LEN)?;
    let (input, format) = fixed_str(input, FORMAT_LEN)?;
    Ok((input, (color, name, format)))
}

fn parse_payload(input: &[u8], order: ByteOrder, rectype: RecType) -> IResult<&[u8], Payload> {
    match rectype {
        RecType::EndLog => Ok((input, Payload::EndLog)),
        RecType::EndBlock => Ok((input, Payload::EndBlock)),
        RecType::StateDef => {
            let (input, stateid) = order.i32(input)?;
            let (input, start_etype) = order.i32(input)?;
            let (input, final_etype) = order.i32(input)?;
            let (input, _) = order.i32(input)?;
            let (input, (color, name, format)) = parse_names(input)?;
            Ok((
                input,
                Payload::StateDef(StateDef {
                    stateid,
                    start_etype,
                    final_etype,
                    color,
                    name,
                    format,
                }),
            ))
        }
        RecType::EventDef => {
            let (input, etype) = order.i32(input)?;
            let (input, _) = order.i32(input)?;
            let (input, (color, name, format)) = parse_names(input)?;
            Ok((
                input,
                Payload::EventDef(EventDef {
                    etype,
                    color,
                    name,
                    format,
                }),
            ))
        }
        RecType::ConstDef => {
            let (input, etype) = order.i32(input)?;
            let (input, value) = order.i32(input)?;
            let (input, name) = fixed_str(input, NAME_LEN)?;
            Ok((input, Payload::ConstDef(ConstDef { etype, value, name })))
        }
        RecType::BareEvt => {
            let (input, etype) = order.i32(input)?;
            let (input, _) = order.i32(input)?;
            Ok((input, Payload::BareEvt { etype }))
        }
        RecType::CargoEvt => {
            let (input, etype) = order.i32(input)?;
            let (input, _) = order.i32(input)?;
            let (input, bytes) = fixed_bytes::<CARGO_SIZE>(input)?;
            Ok((input, Payload::CargoEvt { etype, bytes }))
        }
        RecType::MsgEvt => {
            let (input, etype) = order.i32(input)?;
            let (input, icomm) = order.i32(input)?;
            let (input, rank) = order.i32(input)?;
            let (input, tag) = order.i32(input)?;
            let (input, size) = order.i32(input)?;
            let (input, _) = order.i32(input)?;
            Ok((
                input,
                Payload::MsgEvt(MsgEvt {
                    etype,
                    icomm,
                    rank,
                    tag,
                    size,
                }),
            ))
        }
        RecType::CollEvt => {
            let (input, etype) = order.i32(input)?;
            let (input, root) = order.i32(input)?;
            let (input, size) = order.i32(input)?;
            let (input, _) = order.i32(input)?;
            Ok((input, Payload::CollEvt(CollEvt { etype, root, size })))
        }
        RecType::CommEvt => {
            let (input, etype) = order.i32(input)?;
            let (input, parent) = order.i32(input)?;
            let (input, newcomm) = order.i32(input)?;
            let (input, _) = order.i32(input)?;
            Ok((
                input,
                Payload::CommEvt(CommEvt {
                    etype,
                    parent,
                    newcomm,
                }),
            ))
        }
        RecType::SrcLoc => {
            let (input, srcloc) = order.i32(input)?;
            let (input, lineno) = order.i32(input)?;
            let (input, filename) = fixed_str(input, FILENAME_LEN)?;
            Ok((
                input,
                Payload::SrcLoc(SrcLoc {
                    srcloc,
                    lineno,
                    filename,
                }),
            ))
        }
        RecType::TimeShift => {
            let (input, shift) = order.f64(input)?;
            Ok((input, Payload::TimeShift { shift }))
        }
    }
}
