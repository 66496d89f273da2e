//! Drawables: matched states, message arrows and events
//!
//! A drawable refers to its category by index while it is streamed and stored.
//! `resolve_category` attaches the live `Category`; `release_category` drops
//! the link again before serialization so only the index reaches disk.

use crate::model::category::{Category, CategoryMap, Topology};
use crate::model::error::{ModelError, ModelResult};
use crate::model::info::{InfoSlot, InfoValue};
use crate::model::timebox::{TimeBounded, TimeBoundingBox};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One endpoint of a drawable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Logical row (process/thread) the endpoint belongs to
    pub line_id: i64,
    pub time: f64,
}

impl Vertex {
    pub fn new(line_id: i64, time: f64) -> Self {
        Self { line_id, time }
    }
}

/// A single observed interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    category_index: i32,
    #[serde(skip)]
    category: Option<Arc<Category>>,
    start: Vertex,
    finish: Vertex,
    bbox: TimeBoundingBox,
    #[serde(default)]
    infos: Vec<InfoSlot>,
}

impl Primitive {
    /// Create a primitive; the box always spans both vertex times
    pub fn new(category_index: i32, start: Vertex, finish: Vertex) -> Self {
        Self {
            category_index,
            category: None,
            start,
            finish,
            bbox: TimeBoundingBox::from_times(start.time, finish.time),
            infos: Vec::new(),
        }
    }

    /// Point primitive for an EVENT category
    pub fn event(category_index: i32, line_id: i64, time: f64) -> Self {
        let v = Vertex::new(line_id, time);
        Self::new(category_index, v, v)
    }

    /// Builder: attach info slots
    pub fn with_infos(mut self, infos: Vec<InfoSlot>) -> Self {
        self.infos = infos;
        self
    }

    pub fn category_index(&self) -> i32 {
        self.category_index
    }

    pub fn category(&self) -> Option<&Arc<Category>> {
        self.category.as_ref()
    }

    pub fn start_vertex(&self) -> &Vertex {
        &self.start
    }

    pub fn final_vertex(&self) -> &Vertex {
        &self.finish
    }

    pub fn infos(&self) -> &[InfoSlot] {
        &self.infos
    }

    /// Assign info slot `index`, rejecting a value of the wrong type
    pub fn set_info(&mut self, index: usize, value: InfoValue) -> ModelResult<()> {
        let len = self.infos.len();
        let slot = self
            .infos
            .get_mut(index)
            .ok_or(ModelError::InfoIndexOutOfRange { index, len })?;
        slot.set(value)
    }

    /// Whether both vertices sit on the same line
    pub fn is_single_line(&self) -> bool {
        self.start.line_id == self.finish.line_id
    }

    pub fn resolve_category(&mut self, categories: &CategoryMap) -> ModelResult<()> {
        let category = categories
            .get(&self.category_index)
            .ok_or(ModelError::UnknownCategory(self.category_index))?;
        self.category = Some(Arc::clone(category));
        Ok(())
    }

    pub fn release_category(&mut self) {
        self.category = None;
    }
}

impl PartialEq for Primitive {
    // The resolved category link is a cache, not part of the value
    fn eq(&self, other: &Self) -> bool {
        self.category_index == other.category_index
            && self.start == other.start
            && self.finish == other.finish
            && self.bbox == other.bbox
            && self.infos == other.infos
    }
}

impl TimeBounded for Primitive {
    fn bbox(&self) -> &TimeBoundingBox {
        &self.bbox
    }
}

/// Connected run of same-category primitives drawn as one object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composite {
    category_index: i32,
    #[serde(skip)]
    category: Option<Arc<Category>>,
    bbox: TimeBoundingBox,
    primitives: Vec<Primitive>,
}

impl Composite {
    /// Build from primitives sharing one category
    pub fn new(primitives: Vec<Primitive>) -> ModelResult<Self> {
        let first = primitives
            .first()
            .ok_or_else(|| ModelError::InvalidComposite("no primitives".into()))?;
        let category_index = first.category_index;
        if let Some(odd) = primitives
            .iter()
            .find(|p| p.category_index != category_index)
        {
            return Err(ModelError::InvalidComposite(format!(
                "mixed categories {} and {}",
                category_index, odd.category_index
            )));
        }

        let mut bbox = TimeBoundingBox::empty();
        for p in &primitives {
            bbox.union(&p.bbox);
        }

        Ok(Self {
            category_index,
            category: None,
            bbox,
            primitives,
        })
    }

    /// Group adjacent same-category, same-line primitives into composites
    ///
    /// Primitives are connected when the next one starts no later than the
    /// current run ends. Runs of one stay plain primitives; arrows never merge.
    pub fn coalesce(primitives: Vec<Primitive>) -> Vec<Drawable> {
        let mut runs: BTreeMap<(i32, i64), Vec<Vec<Primitive>>> = BTreeMap::new();
        let mut arrows = Vec::new();

        let mut sorted = primitives;
        sorted.sort_by(|a, b| {
            a.bbox
                .earliest
                .total_cmp(&b.bbox.earliest)
                .then_with(|| b.bbox.latest.total_cmp(&a.bbox.latest))
        });

        for p in sorted {
            if !p.is_single_line() {
                arrows.push(Drawable::Primitive(p));
                continue;
            }
            let groups = runs.entry((p.category_index, p.start.line_id)).or_default();
            match groups.last_mut() {
                Some(run) if run_latest(run) >= p.bbox.earliest => run.push(p),
                _ => groups.push(vec![p]),
            }
        }

        let mut out = arrows;
        for (_, groups) in runs {
            for mut run in groups {
                if run.len() == 1 {
                    out.extend(run.pop().map(Drawable::Primitive));
                } else if let Ok(composite) = Composite::new(run) {
                    out.push(Drawable::Composite(composite));
                }
            }
        }
        out
    }

    pub fn category_index(&self) -> i32 {
        self.category_index
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn resolve_category(&mut self, categories: &CategoryMap) -> ModelResult<()> {
        let category = categories
            .get(&self.category_index)
            .ok_or(ModelError::UnknownCategory(self.category_index))?;
        self.category = Some(Arc::clone(category));
        for p in &mut self.primitives {
            p.resolve_category(categories)?;
        }
        Ok(())
    }

    pub fn release_category(&mut self) {
        self.category = None;
        for p in &mut self.primitives {
            p.release_category();
        }
    }
}

fn run_latest(run: &[Primitive]) -> f64 {
    run.iter()
        .map(|p| p.bbox.latest)
        .fold(f64::NEG_INFINITY, f64::max)
}

impl PartialEq for Composite {
    fn eq(&self, other: &Self) -> bool {
        self.category_index == other.category_index
            && self.bbox == other.bbox
            && self.primitives == other.primitives
    }
}

impl TimeBounded for Composite {
    fn bbox(&self) -> &TimeBoundingBox {
        &self.bbox
    }
}

/// Anything the tree stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Drawable {
    Primitive(Primitive),
    Composite(Composite),
}

impl Drawable {
    pub fn category_index(&self) -> i32 {
        match self {
            Drawable::Primitive(p) => p.category_index,
            Drawable::Composite(c) => c.category_index,
        }
    }

    pub fn category(&self) -> Option<&Arc<Category>> {
        match self {
            Drawable::Primitive(p) => p.category.as_ref(),
            Drawable::Composite(c) => c.category.as_ref(),
        }
    }

    /// Topology of the resolved category, if resolved
    pub fn topology(&self) -> Option<Topology> {
        self.category().map(|c| c.topology)
    }

    pub fn start_vertex(&self) -> Vertex {
        match self {
            Drawable::Primitive(p) => p.start,
            Drawable::Composite(c) => c
                .primitives
                .first()
                .map(|p| p.start)
                .unwrap_or(Vertex::new(0, c.bbox.earliest)),
        }
    }

    pub fn final_vertex(&self) -> Vertex {
        match self {
            Drawable::Primitive(p) => p.finish,
            Drawable::Composite(c) => c
                .primitives
                .last()
                .map(|p| p.finish)
                .unwrap_or(Vertex::new(0, c.bbox.latest)),
        }
    }

    /// Distinct line ids touched by this drawable
    pub fn line_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = match self {
            Drawable::Primitive(p) => vec![p.start.line_id, p.finish.line_id],
            Drawable::Composite(c) => c
                .primitives
                .iter()
                .flat_map(|p| [p.start.line_id, p.finish.line_id])
                .collect(),
        };
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Number of real (observed) primitives inside
    pub fn primitive_count(&self) -> usize {
        match self {
            Drawable::Primitive(_) => 1,
            Drawable::Composite(c) => c.primitives.len(),
        }
    }

    pub fn resolve_category(&mut self, categories: &CategoryMap) -> ModelResult<()> {
        match self {
            Drawable::Primitive(p) => p.resolve_category(categories),
            Drawable::Composite(c) => c.resolve_category(categories),
        }
    }

    pub fn release_category(&mut self) {
        match self {
            Drawable::Primitive(p) => p.release_category(),
            Drawable::Composite(c) => c.release_category(),
        }
    }
}

impl TimeBounded for Drawable {
    fn bbox(&self) -> &TimeBoundingBox {
        match self {
            Drawable::Primitive(p) => &p.bbox,
            Drawable::Composite(c) => &c.bbox,
        }
    }
}

impl From<Primitive> for Drawable {
    fn from(p: Primitive) -> Self {
        Drawable::Primitive(p)
    }
}

impl From<Composite> for Drawable {
    fn from(c: Composite) -> Self {
        Drawable::Composite(c)
    }
}
