//! Shadows: per-category summaries of everything below a tree node
//!
//! A leaf computes one `CategoryWeight` per category from its drawables.
//! Parents sum their children's weights (vertical merge). Sibling nodes at one
//! depth are summed across a time window by scaling each node's weight by the
//! fraction of the node that lies inside the window (horizontal merge).

use crate::model::{Drawable, TimeBounded, TimeBoundingBox};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub category_index: i32,
    pub num_drawables: u64,
    /// Summed duration of the category's drawables
    pub incl_time: f64,
    /// Inclusive time minus time spent in nested drawables on the same line
    pub excl_time: f64,
}

impl CategoryWeight {
    pub fn new(category_index: i32) -> Self {
        Self {
            category_index,
            num_drawables: 0,
            incl_time: 0.0,
            excl_time: 0.0,
        }
    }

    pub fn incl_ratio(&self, node_duration: f64) -> f64 {
        ratio(self.incl_time, node_duration)
    }

    pub fn excl_ratio(&self, node_duration: f64) -> f64 {
        ratio(self.excl_time, node_duration)
    }

    pub fn merge(&mut self, other: &CategoryWeight) {
        self.num_drawables += other.num_drawables;
        self.incl_time += other.incl_time;
        self.excl_time += other.excl_time;
    }

    /// Times scaled by `fraction`; the drawable count is kept
    pub fn scaled(&self, fraction: f64) -> CategoryWeight {
        CategoryWeight {
            category_index: self.category_index,
            num_drawables: self.num_drawables,
            incl_time: self.incl_time * fraction,
            excl_time: self.excl_time * fraction,
        }
    }
}

fn ratio(time: f64, node_duration: f64) -> f64 {
    if node_duration > 0.0 {
        time / node_duration
    } else {
        0.0
    }
}

/// Weights of a leaf's drawables, sorted by category index
pub fn leaf_shadows(drawables: &[Drawable]) -> Vec<CategoryWeight> {
    let mut weights: BTreeMap<i32, CategoryWeight> = BTreeMap::new();
    let excl = exclusive_times(drawables);

    for (d, excl_time) in drawables.iter().zip(excl) {
        let w = weights
            .entry(d.category_index())
            .or_insert_with(|| CategoryWeight::new(d.category_index()));
        w.num_drawables += d.primitive_count() as u64;
        w.incl_time += d.duration();
        w.excl_time += excl_time;
    }

    weights.into_values().collect()
}

/// Exclusive time of every drawable, in input order
///
/// Only single-line drawables nest. Each one is charged against its innermost
/// enclosing interval on the same line.
fn exclusive_times(drawables: &[Drawable]) -> Vec<f64> {
    let mut excl: Vec<f64> = drawables.iter().map(|d| d.duration()).collect();

    let mut by_line: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, d) in drawables.iter().enumerate() {
        let start = d.start_vertex().line_id;
        if start == d.final_vertex().line_id && d.duration() > 0.0 {
            by_line.entry(start).or_default().push(i);
        }
    }

    for (_, mut idx) in by_line {
        idx.sort_by(|&a, &b| {
            let (a, b) = (drawables[a].bbox(), drawables[b].bbox());
            a.earliest
                .total_cmp(&b.earliest)
                .then_with(|| b.latest.total_cmp(&a.latest))
        });

        let mut open: Vec<usize> = Vec::new();
        for i in idx {
            let current = *drawables[i].bbox();
            while let Some(&top) = open.last() {
                if drawables[top].latest_time() <= current.earliest {
                    open.pop();
                } else {
                    break;
                }
            }
            if let Some(&parent) = open.last() {
                let overlap = drawables[parent].bbox().intersection_duration(&current);
                excl[parent] = (excl[parent] - overlap).max(0.0);
            }
            open.push(i);
        }
    }

    excl
}

/// Add `from` into `into`, keeping it sorted by category index
pub fn merge_shadows(into: &mut Vec<CategoryWeight>, from: &[CategoryWeight]) {
    for w in from {
        match into.binary_search_by_key(&w.category_index, |x| x.category_index) {
            Ok(pos) => into[pos].merge(w),
            Err(pos) => into.insert(pos, w.clone()),
        }
    }
}

/// Horizontal merge of sibling shadows clipped to `window`
pub fn merge_in_window<'a, I>(nodes: I, window: &TimeBoundingBox) -> Vec<CategoryWeight>
where
    I: IntoIterator<Item = (&'a TimeBoundingBox, &'a [CategoryWeight])>,
{
    let mut out = Vec::new();
    for (bbox, shadows) in nodes {
        if !bbox.overlaps(window) {
            continue;
        }
        let fraction = if bbox.duration() > 0.0 {
            bbox.intersection_duration(window) / bbox.duration()
        } else {
            1.0
        };
        let scaled: Vec<CategoryWeight> = shadows.iter().map(|w| w.scaled(fraction)).collect();
        merge_shadows(&mut out, &scaled);
    }
    out
}
