//! Categories: the type descriptors shared by many drawables

use crate::model::info::{InfoDescriptor, InfoSlot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Geometric shape of a category's drawables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Single instant on one line
    Event,
    /// Interval on one line
    State,
    /// Interval between two lines (message)
    Arrow,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Event => write!(f, "event"),
            Topology::State => write!(f, "state"),
            Topology::Arrow => write!(f, "arrow"),
        }
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const GRAY: Rgba = Rgba::opaque(190, 190, 190);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a log color string: `#rrggbb`, `"r g b"` / `"r:g:b"`, or a color name
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 {
                return None;
            }
            let v = u32::from_str_radix(hex, 16).ok()?;
            return Some(Self::opaque((v >> 16) as u8, (v >> 8) as u8, v as u8));
        }

        let parts: Vec<&str> = s
            .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() == 3 {
            if let (Ok(r), Ok(g), Ok(b)) = (parts[0].parse(), parts[1].parse(), parts[2].parse()) {
                return Some(Self::opaque(r, g, b));
            }
        }

        let name: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let rgb = match name.as_str() {
            "black" => (0, 0, 0),
            "white" => (255, 255, 255),
            "red" => (255, 0, 0),
            "green" => (0, 255, 0),
            "blue" => (0, 0, 255),
            "yellow" => (255, 255, 0),
            "cyan" => (0, 255, 255),
            "magenta" => (255, 0, 255),
            "orange" => (255, 165, 0),
            "purple" => (160, 32, 240),
            "pink" => (255, 192, 203),
            "brown" => (165, 42, 42),
            "maroon" => (176, 48, 96),
            "navy" | "navyblue" => (0, 0, 128),
            "gray" | "grey" => (190, 190, 190),
            "gold" => (255, 215, 0),
            "forestgreen" => (34, 139, 34),
            "skyblue" => (135, 206, 235),
            "steelblue" => (70, 130, 180),
            "orchid" => (218, 112, 214),
            "khaki" => (240, 230, 140),
            "coral" => (255, 127, 80),
            "tomato" => (255, 99, 71),
            "violet" => (238, 130, 238),
            _ => return None,
        };
        Some(Self::opaque(rgb.0, rgb.1, rgb.2))
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::GRAY
    }
}

/// Type descriptor for a class of drawables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identity, stored in every persisted drawable
    pub index: i32,
    pub name: String,
    pub color: Rgba,
    pub topology: Topology,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub searchable: bool,
    /// Ordered info field schema
    #[serde(default)]
    pub info_schema: Vec<InfoDescriptor>,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Category {
    pub fn new(index: i32, name: impl Into<String>, topology: Topology) -> Self {
        Self {
            index,
            name: name.into(),
            color: Rgba::default(),
            topology,
            visible: true,
            searchable: true,
            info_schema: Vec::new(),
            url: None,
        }
    }

    /// Builder: set color
    pub fn color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    /// Builder: append an info field
    pub fn info(mut self, descriptor: InfoDescriptor) -> Self {
        self.info_schema.push(descriptor);
        self
    }

    /// Builder: replace the whole info schema
    pub fn info_schema(mut self, schema: Vec<InfoDescriptor>) -> Self {
        self.info_schema = schema;
        self
    }

    /// Empty info slots matching this category's schema
    pub fn new_info_slots(&self) -> Vec<InfoSlot> {
        crate::model::info::slots_for(&self.info_schema)
    }
}

/// Live categories keyed by index
pub type CategoryMap = BTreeMap<i32, Arc<Category>>;

/// Build a map from owned categories
pub fn category_map<I>(categories: I) -> CategoryMap
where
    I: IntoIterator<Item = Category>,
{
    categories
        .into_iter()
        .map(|c| (c.index, Arc::new(c)))
        .collect()
}
