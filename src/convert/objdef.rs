//! Object definitions: categories built from STATEDEF / EVENTDEF records
//!
//! Every event type code seen in the log is bound to a category and a role.
//! State definitions bind a start and a final code; event definitions bind
//! one solo code. The message arrow is always present at index 0, bound to
//! the built-in send and receive codes.

use crate::clog::{ByteOrder, EventDef, StateDef, CARGO_SIZE, RECV_ETYPE, SEND_ETYPE};
use crate::convert::error::{ConvertError, ConvertResult};
use crate::model::{
    category_map, Category, CategoryMap, InfoDescriptor, InfoSlot, InfoType, InfoValue, Rgba,
    Topology,
};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use tracing::debug;

/// Index of the built-in message arrow category
pub const MESSAGE_CATEGORY: i32 = 0;

static FORMAT_SPEC: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Part an event type code plays in its category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Start,
    Final,
    Solo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtypeBinding {
    pub category_index: i32,
    pub role: Role,
}

/// Decoder for the 32 cargo bytes of a user event
///
/// Specifiers and their cargo layout:
/// `%d` `%x` i32, `%ld` `%lx` i64, `%f` `%e` `%E` f64, `%s` u16 length then bytes.
/// Integers use the log's byte order. The label is the text before the
/// specifier with trailing `=` or `:` removed.
#[derive(Debug, Clone, PartialEq)]
pub struct CargoFormat {
    fields: Vec<CargoField>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CargoField {
    I32,
    I64,
    F64,
    Str,
}

impl CargoField {
    fn info_type(&self) -> InfoType {
        match self {
            CargoField::I32 => InfoType::I32,
            CargoField::I64 => InfoType::I64,
            CargoField::F64 => InfoType::F64,
            CargoField::Str => InfoType::Str,
        }
    }
}

impl CargoFormat {
    /// Parse a format string into an info schema
    pub fn parse(format: &str) -> ConvertResult<(Self, Vec<InfoDescriptor>)> {
        let re = FORMAT_SPEC
            .get_or_init(|| Regex::new(r"(?P<label>[^%]*)%(?P<spec>l[dx]|[dxfeEs])"))
            .as_ref()
            .map_err(|e| ConvertError::InvalidOptions(format!("format regex: {}", e)))?;

        let mut fields = Vec::new();
        let mut schema = Vec::new();
        for (n, caps) in re.captures_iter(format).enumerate() {
            let field = match &caps["spec"] {
                "d" | "x" => CargoField::I32,
                "ld" | "lx" => CargoField::I64,
                "s" => CargoField::Str,
                _ => CargoField::F64,
            };
            let label = caps["label"]
                .trim()
                .trim_end_matches(['=', ':'])
                .trim();
            let name = if label.is_empty() {
                format!("arg{}", n)
            } else {
                label.to_string()
            };
            schema.push(InfoDescriptor::new(name, field.info_type()));
            fields.push(field);
        }

        Ok((Self { fields }, schema))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Typed slots with no values, for events that carried no cargo
    pub fn empty_slots(&self) -> Vec<InfoSlot> {
        self.fields
            .iter()
            .map(|f| InfoSlot::declared(f.info_type()))
            .collect()
    }

    /// Decode cargo into one slot per field; fields past the cargo end stay empty
    pub fn decode(&self, cargo: &[u8; CARGO_SIZE], order: ByteOrder) -> Vec<InfoSlot> {
        let mut slots = Vec::with_capacity(self.fields.len());
        let mut rest: &[u8] = cargo;
        let mut exhausted = false;

        for field in &self.fields {
            let mut slot = InfoSlot::declared(field.info_type());
            if !exhausted {
                match decode_field(*field, rest, order) {
                    Some((value, remaining)) => {
                        let set = slot.set(value);
                        debug_assert!(set.is_ok(), "cargo field decoded as {:?}: {:?}", field, set);
                        rest = remaining;
                    }
                    None => exhausted = true,
                }
            }
            slots.push(slot);
        }
        slots
    }
}

fn decode_field(field: CargoField, input: &[u8], order: ByteOrder) -> Option<(InfoValue, &[u8])> {
    match field {
        CargoField::I32 => order
            .i32(input)
            .ok()
            .map(|(rest, v)| (InfoValue::I32(v), rest)),
        CargoField::I64 => order
            .i64(input)
            .ok()
            .map(|(rest, v)| (InfoValue::I64(v), rest)),
        CargoField::F64 => order
            .f64(input)
            .ok()
            .map(|(rest, v)| (InfoValue::F64(v), rest)),
        CargoField::Str => {
            if input.len() < 2 {
                return None;
            }
            let raw = [input[0], input[1]];
            let len = if order.big_endian {
                u16::from_be_bytes(raw)
            } else {
                u16::from_le_bytes(raw)
            } as usize;
            let body = input.get(2..2 + len)?;
            let text = String::from_utf8_lossy(body).into_owned();
            Some((InfoValue::Str(text), &input[2 + len..]))
        }
    }
}

/// Categories and event-type bindings accumulated from definition records
#[derive(Debug, Clone)]
pub struct ObjDefs {
    categories: BTreeMap<i32, Category>,
    bindings: HashMap<i32, EtypeBinding>,
    formats: HashMap<i32, CargoFormat>,
    next_index: i32,
}

impl Default for ObjDefs {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjDefs {
    pub fn new() -> Self {
        let message = Category::new(MESSAGE_CATEGORY, "message", Topology::Arrow)
            .color(Rgba::WHITE)
            .info(InfoDescriptor::new("msg_tag", InfoType::I32))
            .info(InfoDescriptor::new("msg_size", InfoType::I32));

        let mut defs = Self {
            categories: BTreeMap::new(),
            bindings: HashMap::new(),
            formats: HashMap::new(),
            next_index: MESSAGE_CATEGORY + 1,
        };
        defs.categories.insert(MESSAGE_CATEGORY, message);
        defs.bind(SEND_ETYPE, MESSAGE_CATEGORY, Role::Start);
        defs.bind(RECV_ETYPE, MESSAGE_CATEGORY, Role::Final);
        defs
    }

    fn bind(&mut self, etype: i32, category_index: i32, role: Role) {
        self.bindings.insert(
            etype,
            EtypeBinding {
                category_index,
                role,
            },
        );
    }

    fn allocate(
        &mut self,
        name: &str,
        color: &str,
        format: &str,
        topology: Topology,
    ) -> ConvertResult<i32> {
        let index = self.next_index;
        self.next_index += 1;

        let (cargo, schema) = CargoFormat::parse(format)?;
        let category = Category::new(index, name, topology)
            .color(Rgba::parse(color).unwrap_or_default())
            .info_schema(schema);
        self.categories.insert(index, category);
        if !cargo.is_empty() {
            self.formats.insert(index, cargo);
        }
        Ok(index)
    }

    /// Register a state; a repeated definition returns the existing index
    pub fn define_state(&mut self, def: &StateDef) -> ConvertResult<i32> {
        if let Some(existing) = self.bindings.get(&def.start_etype) {
            debug!("State {} already defined as category {}", def.name, existing.category_index);
            return Ok(existing.category_index);
        }
        let index = self.allocate(&def.name, &def.color, &def.format, Topology::State)?;
        self.bind(def.start_etype, index, Role::Start);
        self.bind(def.final_etype, index, Role::Final);
        debug!(
            "State {:?} -> category {} (etypes {}/{})",
            def.name, index, def.start_etype, def.final_etype
        );
        Ok(index)
    }

    /// Register a solo event; a repeated definition returns the existing index
    pub fn define_event(&mut self, def: &EventDef) -> ConvertResult<i32> {
        if let Some(existing) = self.bindings.get(&def.etype) {
            return Ok(existing.category_index);
        }
        let index = self.allocate(&def.name, &def.color, &def.format, Topology::Event)?;
        self.bind(def.etype, index, Role::Solo);
        debug!("Event {:?} -> category {} (etype {})", def.name, index, def.etype);
        Ok(index)
    }

    pub fn binding(&self, etype: i32) -> Option<EtypeBinding> {
        self.bindings.get(&etype).copied()
    }

    pub fn category(&self, index: i32) -> Option<&Category> {
        self.categories.get(&index)
    }

    pub fn format(&self, index: i32) -> Option<&CargoFormat> {
        self.formats.get(&index)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category_map(&self) -> CategoryMap {
        category_map(self.categories.values().cloned())
    }
}
