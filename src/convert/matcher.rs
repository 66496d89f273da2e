//! Two-event matching
//!
//! Turns the flat stream of start / final / solo events into primitives.
//! Each category owns one matcher chosen by its topology:
//!
//! - **State**: per line, a final closes the most recent open start (LIFO)
//! - **Arrow**: sends and receives meet in FIFO queues keyed by
//!   `(tag, sender_line, receiver_line)`
//! - **Event**: solo events become point primitives at once
//!
//! Unpaired halves are counted, never fatal.

use crate::clog::{ByteOrder, Payload, Preamble, Record, CARGO_SIZE};
use crate::convert::error::ConvertResult;
use crate::convert::objdef::{CargoFormat, ObjDefs, Role, MESSAGE_CATEGORY};
use crate::model::{CategoryMap, InfoSlot, InfoValue, Primitive, Topology, Vertex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Bound on partials waiting in one matcher list; the oldest is evicted past it
    #[serde(default)]
    pub max_pending: Option<usize>,
}

impl MatcherConfig {
    pub fn max_pending(mut self, max: usize) -> Self {
        self.max_pending = Some(max);
        self
    }
}

/// What an event carries besides its time and line
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Bare,
    Cargo([u8; CARGO_SIZE]),
    Message { partner_line: i64, tag: i32, size: i32 },
}

/// One half of a drawable, as seen by a matcher
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvent {
    pub time: f64,
    pub line_id: i64,
    pub kind: EventKind,
}

impl MatchEvent {
    fn cargo(&self) -> Option<&[u8; CARGO_SIZE]> {
        match &self.kind {
            EventKind::Cargo(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Counters reported at the end of a conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub matched: u64,
    pub unmatched: u64,
    /// Partials dropped because a list hit `max_pending`; also counted as unmatched
    pub evicted: u64,
    /// Finals that closed a state other than the innermost open one on their line
    pub nesting_violations: u64,
    /// Events whose type code was never defined
    pub unknown_events: u64,
    pub unmatched_by_category: BTreeMap<i32, u64>,
}

impl MatchStats {
    fn count_unmatched(&mut self, category_index: i32, n: u64) {
        if n == 0 {
            return;
        }
        self.unmatched += n;
        *self.unmatched_by_category.entry(category_index).or_insert(0) += n;
    }
}

/// Interface shared by the per-topology matchers
pub trait TwoEventMatch {
    /// Feed a start (or solo) event
    fn match_start(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive>;

    /// Feed a final event
    fn match_final(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive>;

    /// Partials still waiting for their other half
    fn pending(&self) -> usize;

    /// Discard everything still pending, returning how many partials that was
    fn drain(&mut self) -> usize;
}

/// Decoder for a category's cargo
#[derive(Debug, Clone)]
struct InfoDecoder {
    format: Option<CargoFormat>,
    order: ByteOrder,
}

impl InfoDecoder {
    fn infos(&self, first: &MatchEvent, second: Option<&MatchEvent>) -> Vec<InfoSlot> {
        let Some(format) = &self.format else {
            return Vec::new();
        };
        match first.cargo().or_else(|| second.and_then(|e| e.cargo())) {
            Some(cargo) => format.decode(cargo, self.order),
            None => format.empty_slots(),
        }
    }
}

/// Index of the oldest entry across several lists, by the time of each list's oldest entry
fn oldest_key<'a, K, I>(lists: I) -> Option<K>
where
    K: Copy + 'a,
    I: Iterator<Item = (&'a K, Option<&'a MatchEvent>)>,
{
    lists
        .filter_map(|(k, e)| e.map(|e| (*k, e.time)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(k, _)| k)
}

#[derive(Debug, Clone)]
pub struct StateMatcher {
    category_index: i32,
    decoder: InfoDecoder,
    max_pending: Option<usize>,
    open: HashMap<i64, Vec<MatchEvent>>,
    pending: usize,
    /// Lines that lost an open start to eviction since the last `take_evicted`
    evicted_lines: Vec<i64>,
}

impl StateMatcher {
    fn new(category_index: i32, decoder: InfoDecoder, max_pending: Option<usize>) -> Self {
        Self {
            category_index,
            decoder,
            max_pending,
            open: HashMap::new(),
            pending: 0,
            evicted_lines: Vec::new(),
        }
    }

    /// Lines whose oldest open start was evicted, drained
    pub fn take_evicted(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.evicted_lines)
    }

    fn evict_oldest(&mut self, stats: &mut MatchStats) {
        // The bottom of each line's stack is its oldest open start
        let line = oldest_key(self.open.iter().map(|(line, stack)| (line, stack.first())));
        let Some(line) = line else {
            return;
        };
        if let Some(stack) = self.open.get_mut(&line) {
            stack.remove(0);
            if stack.is_empty() {
                self.open.remove(&line);
            }
            self.evicted_lines.push(line);
            self.pending -= 1;
            stats.evicted += 1;
            stats.count_unmatched(self.category_index, 1);
        }
    }
}

impl TwoEventMatch for StateMatcher {
    fn match_start(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        self.open.entry(event.line_id).or_default().push(event);
        self.pending += 1;
        if self.max_pending.map_or(false, |max| self.pending > max) {
            self.evict_oldest(stats);
        }
        None
    }

    fn match_final(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        let Some(start) = self.open.get_mut(&event.line_id).and_then(|s| s.pop()) else {
            stats.count_unmatched(self.category_index, 1);
            return None;
        };
        self.pending -= 1;
        stats.matched += 1;

        let infos = self.decoder.infos(&start, Some(&event));
        Some(
            Primitive::new(
                self.category_index,
                Vertex::new(start.line_id, start.time),
                Vertex::new(event.line_id, event.time),
            )
            .with_infos(infos),
        )
    }

    fn pending(&self) -> usize {
        self.pending
    }

    fn drain(&mut self) -> usize {
        self.open.clear();
        self.evicted_lines.clear();
        std::mem::take(&mut self.pending)
    }
}

/// `(tag, sender_line, receiver_line)`
type MessageKey = (i32, i64, i64);

#[derive(Debug, Clone)]
pub struct ArrowMatcher {
    category_index: i32,
    max_pending: Option<usize>,
    sends: HashMap<MessageKey, VecDeque<MatchEvent>>,
    recvs: HashMap<MessageKey, VecDeque<MatchEvent>>,
}

impl ArrowMatcher {
    fn new(category_index: i32, max_pending: Option<usize>) -> Self {
        Self {
            category_index,
            max_pending,
            sends: HashMap::new(),
            recvs: HashMap::new(),
        }
    }

    fn arrow(&self, send: &MatchEvent, recv: &MatchEvent) -> Primitive {
        let (tag, size) = match send.kind {
            EventKind::Message { tag, size, .. } => (tag, size),
            _ => (0, 0),
        };
        Primitive::new(
            self.category_index,
            Vertex::new(send.line_id, send.time),
            Vertex::new(recv.line_id, recv.time),
        )
        .with_infos(vec![
            InfoSlot::with_value(InfoValue::I32(tag)),
            InfoSlot::with_value(InfoValue::I32(size)),
        ])
    }

    /// Queue a half with no partner yet, evicting the oldest past the bound
    fn enqueue(
        queues: &mut HashMap<MessageKey, VecDeque<MatchEvent>>,
        key: MessageKey,
        event: MatchEvent,
        max_pending: Option<usize>,
    ) -> bool {
        queues.entry(key).or_default().push_back(event);
        let total: usize = queues.values().map(VecDeque::len).sum();
        if !max_pending.map_or(false, |max| total > max) {
            return false;
        }
        let oldest = oldest_key(queues.iter().map(|(k, q)| (k, q.front())));
        if let Some(queue) = oldest.and_then(|k| queues.get_mut(&k)) {
            queue.pop_front();
        }
        queues.retain(|_, q| !q.is_empty());
        true
    }

    fn message_key(event: &MatchEvent, sending: bool) -> MessageKey {
        match event.kind {
            EventKind::Message {
                partner_line, tag, ..
            } => {
                if sending {
                    (tag, event.line_id, partner_line)
                } else {
                    (tag, partner_line, event.line_id)
                }
            }
            _ => (0, event.line_id, event.line_id),
        }
    }

    fn take(queues: &mut HashMap<MessageKey, VecDeque<MatchEvent>>, key: &MessageKey) -> Option<MatchEvent> {
        let queue = queues.get_mut(key)?;
        let event = queue.pop_front();
        if queue.is_empty() {
            queues.remove(key);
        }
        event
    }
}

impl TwoEventMatch for ArrowMatcher {
    fn match_start(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        let key = Self::message_key(&event, true);
        if let Some(recv) = Self::take(&mut self.recvs, &key) {
            stats.matched += 1;
            return Some(self.arrow(&event, &recv));
        }
        if Self::enqueue(&mut self.sends, key, event, self.max_pending) {
            stats.evicted += 1;
            stats.count_unmatched(self.category_index, 1);
        }
        None
    }

    fn match_final(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        let key = Self::message_key(&event, false);
        if let Some(send) = Self::take(&mut self.sends, &key) {
            stats.matched += 1;
            return Some(self.arrow(&send, &event));
        }
        if Self::enqueue(&mut self.recvs, key, event, self.max_pending) {
            stats.evicted += 1;
            stats.count_unmatched(self.category_index, 1);
        }
        None
    }

    fn pending(&self) -> usize {
        self.sends.values().chain(self.recvs.values()).map(VecDeque::len).sum()
    }

    fn drain(&mut self) -> usize {
        let n = self.pending();
        self.sends.clear();
        self.recvs.clear();
        n
    }
}

#[derive(Debug, Clone)]
pub struct EventMatcher {
    category_index: i32,
    decoder: InfoDecoder,
}

impl TwoEventMatch for EventMatcher {
    fn match_start(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        stats.matched += 1;
        let infos = self.decoder.infos(&event, None);
        Some(Primitive::event(self.category_index, event.line_id, event.time).with_infos(infos))
    }

    fn match_final(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        self.match_start(event, stats)
    }

    fn pending(&self) -> usize {
        0
    }

    fn drain(&mut self) -> usize {
        0
    }
}

/// Matcher picked by a category's topology
#[derive(Debug, Clone)]
pub enum TopologyMatcher {
    State(StateMatcher),
    Arrow(ArrowMatcher),
    Event(EventMatcher),
}

impl TopologyMatcher {
    fn for_topology(
        topology: Topology,
        category_index: i32,
        format: Option<CargoFormat>,
        order: ByteOrder,
        max_pending: Option<usize>,
    ) -> Self {
        let decoder = InfoDecoder { format, order };
        match topology {
            Topology::State => TopologyMatcher::State(StateMatcher::new(category_index, decoder, max_pending)),
            Topology::Arrow => TopologyMatcher::Arrow(ArrowMatcher::new(category_index, max_pending)),
            Topology::Event => TopologyMatcher::Event(EventMatcher {
                category_index,
                decoder,
            }),
        }
    }
}

impl TwoEventMatch for TopologyMatcher {
    fn match_start(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        match self {
            TopologyMatcher::State(m) => m.match_start(event, stats),
            TopologyMatcher::Arrow(m) => m.match_start(event, stats),
            TopologyMatcher::Event(m) => m.match_start(event, stats),
        }
    }

    fn match_final(&mut self, event: MatchEvent, stats: &mut MatchStats) -> Option<Primitive> {
        match self {
            TopologyMatcher::State(m) => m.match_final(event, stats),
            TopologyMatcher::Arrow(m) => m.match_final(event, stats),
            TopologyMatcher::Event(m) => m.match_final(event, stats),
        }
    }

    fn pending(&self) -> usize {
        match self {
            TopologyMatcher::State(m) => m.pending(),
            TopologyMatcher::Arrow(m) => m.pending(),
            TopologyMatcher::Event(m) => m.pending(),
        }
    }

    fn drain(&mut self) -> usize {
        match self {
            TopologyMatcher::State(m) => m.drain(),
            TopologyMatcher::Arrow(m) => m.drain(),
            TopologyMatcher::Event(m) => m.drain(),
        }
    }
}

/// Routes records to per-category matchers
pub struct Matcher {
    config: MatcherConfig,
    defs: ObjDefs,
    matchers: BTreeMap<i32, TopologyMatcher>,
    /// Categories of the states open on each line, innermost last
    open_states: HashMap<i64, Vec<i32>>,
    stats: MatchStats,
    preamble: Preamble,
}

impl Matcher {
    pub fn new(config: MatcherConfig, preamble: &Preamble) -> Self {
        let mut matchers = BTreeMap::new();
        matchers.insert(
            MESSAGE_CATEGORY,
            TopologyMatcher::for_topology(
                Topology::Arrow,
                MESSAGE_CATEGORY,
                None,
                preamble.byte_order,
                config.max_pending,
            ),
        );
        Self {
            config,
            defs: ObjDefs::new(),
            matchers,
            open_states: HashMap::new(),
            stats: MatchStats::default(),
            preamble: preamble.clone(),
        }
    }

    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    pub fn defs(&self) -> &ObjDefs {
        &self.defs
    }

    pub fn category_map(&self) -> CategoryMap {
        self.defs.category_map()
    }

    /// Partials waiting across all categories
    pub fn pending(&self) -> usize {
        self.matchers.values().map(TwoEventMatch::pending).sum()
    }

    fn register(&mut self, index: i32) {
        if self.matchers.contains_key(&index) {
            return;
        }
        if let Some(category) = self.defs.category(index) {
            let matcher = TopologyMatcher::for_topology(
                category.topology,
                index,
                self.defs.format(index).cloned(),
                self.preamble.byte_order,
                self.config.max_pending,
            );
            self.matchers.insert(index, matcher);
        }
    }

    /// Feed one record; returns the primitive it completes, if any
    pub fn feed(&mut self, record: &Record) -> ConvertResult<Option<Primitive>> {
        let header = &record.header;
        let line_id = self.preamble.line_id(header.icomm, header.rank);

        let (etype, kind) = match &record.payload {
            Payload::StateDef(def) => {
                let index = self.defs.define_state(def)?;
                self.register(index);
                return Ok(None);
            }
            Payload::EventDef(def) => {
                let index = self.defs.define_event(def)?;
                self.register(index);
                return Ok(None);
            }
            Payload::BareEvt { etype } => (*etype, EventKind::Bare),
            Payload::CargoEvt { etype, bytes } => (*etype, EventKind::Cargo(*bytes)),
            Payload::MsgEvt(msg) => (
                msg.etype,
                EventKind::Message {
                    partner_line: self.preamble.line_id(msg.icomm, msg.rank),
                    tag: msg.tag,
                    size: msg.size,
                },
            ),
            _ => return Ok(None),
        };

        let Some(binding) = self.defs.binding(etype) else {
            self.stats.unknown_events += 1;
            if self.stats.unknown_events == 1 {
                warn!("Event type {} has no definition; such events are ignored", etype);
            }
            return Ok(None);
        };
        let Some(matcher) = self.matchers.get_mut(&binding.category_index) else {
            return Ok(None);
        };

        let event = MatchEvent {
            time: header.time,
            line_id,
            kind,
        };
        let primitive = match binding.role {
            Role::Start | Role::Solo => matcher.match_start(event, &mut self.stats),
            Role::Final => matcher.match_final(event, &mut self.stats),
        };

        if let TopologyMatcher::State(state) = matcher {
            let evicted = state.take_evicted();
            self.track_nesting(line_id, binding.category_index, binding.role, primitive.is_some());
            for line in evicted {
                self.forget_oldest_open(line, binding.category_index);
            }
        }
        Ok(primitive)
    }

    /// Follow the cross-category stack of open states on a line
    fn track_nesting(&mut self, line_id: i64, category_index: i32, role: Role, closed: bool) {
        let stack = self.open_states.entry(line_id).or_default();
        match role {
            Role::Start => stack.push(category_index),
            Role::Final if closed => {
                if let Some(pos) = stack.iter().rposition(|c| *c == category_index) {
                    if pos + 1 != stack.len() {
                        self.stats.nesting_violations += 1;
                        debug!(
                            "Line {}: state {} closed while {} inner states are still open",
                            line_id,
                            category_index,
                            stack.len() - pos - 1
                        );
                    }
                    stack.remove(pos);
                }
            }
            _ => {}
        }
        if stack.is_empty() {
            self.open_states.remove(&line_id);
        }
    }

    /// Drop the outermost open state of a category after its start was evicted
    fn forget_oldest_open(&mut self, line_id: i64, category_index: i32) {
        let Some(stack) = self.open_states.get_mut(&line_id) else {
            return;
        };
        if let Some(pos) = stack.iter().position(|c| *c == category_index) {
            stack.remove(pos);
        }
        if stack.is_empty() {
            self.open_states.remove(&line_id);
        }
    }

    /// Count everything still pending as unmatched and report
    pub fn finish(&mut self) -> MatchStats {
        for (index, matcher) in self.matchers.iter_mut() {
            let left = matcher.drain() as u64;
            self.stats.count_unmatched(*index, left);
        }
        self.open_states.clear();

        info!(
            "Matched {} drawables; {} unmatched ({} evicted), {} nesting violations, {} unknown events",
            self.stats.matched,
            self.stats.unmatched,
            self.stats.evicted,
            self.stats.nesting_violations,
            self.stats.unknown_events
        );
        if self.stats.nesting_violations > 0 {
            warn!(
                "{} states were not properly nested on their line",
                self.stats.nesting_violations
            );
        }
        for (index, count) in &self.stats.unmatched_by_category {
            let name = self
                .defs
                .category(*index)
                .map(|c| c.name.as_str())
                .unwrap_or("?");
            debug!("Category {} ({}): {} unmatched", index, name, count);
        }
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clog::{EventDef, MsgEvt, StateDef, RECV_ETYPE, SEND_ETYPE};
    use crate::model::TimeBounded;

    fn state_def(start: i32, format: &str) -> Record {
        Record::new(
            0.0,
            0,
            0,
            Payload::StateDef(StateDef {
                stateid: 1,
                start_etype: start,
                final_etype: start + 1,
                color: "red".into(),
                name: format!("state{}", start),
                format: format.into(),
            }),
        )
    }

    fn bare(time: f64, rank: i32, etype: i32) -> Record {
        Record::new(time, 0, rank, Payload::BareEvt { etype })
    }

    fn msg(time: f64, rank: i32, etype: i32, partner: i32, tag: i32, size: i32) -> Record {
        Record::new(
            time,
            0,
            rank,
            Payload::MsgEvt(MsgEvt {
                etype,
                icomm: 0,
                rank: partner,
                tag,
                size,
            }),
        )
    }

    fn run(matcher: &mut Matcher, records: &[Record]) -> Vec<Primitive> {
        records
            .iter()
            .filter_map(|r| matcher.feed(r).unwrap())
            .collect()
    }

    #[test]
    fn test_state_pairs_nest_lifo() {
        let mut matcher = Matcher::new(MatcherConfig::default(), &Preamble::new(2));
        let out = run(
            &mut matcher,
            &[
                state_def(10, ""),
                bare(1.0, 0, 10),
                bare(2.0, 0, 10),
                bare(3.0, 0, 11),
                bare(4.0, 0, 11),
                bare(5.0, 0, 11),
            ],
        );
        let stats = matcher.finish();

        assert_eq!(out.len(), 2);
        assert_eq!(*out[0].bbox(), crate::model::TimeBoundingBox::new(2.0, 3.0));
        assert_eq!(*out[1].bbox(), crate::model::TimeBoundingBox::new(1.0, 4.0));
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.unmatched_by_category.get(&1), Some(&1));
    }

    #[test]
    fn test_states_on_different_lines_do_not_pair() {
        let mut matcher = Matcher::new(MatcherConfig::default(), &Preamble::new(2));
        let out = run(
            &mut matcher,
            &[state_def(10, ""), bare(1.0, 0, 10), bare(2.0, 1, 11)],
        );
        assert!(out.is_empty());
        let stats = matcher.finish();
        assert_eq!(stats.unmatched, 2);
    }

    #[test]
    fn test_arrows_match_across_lines() {
        let mut matcher = Matcher::new(MatcherConfig::default(), &Preamble::new(2));
        let out = run(
            &mut matcher,
            &[
                // Receive logged before its send
                msg(1.0, 1, RECV_ETYPE, 0, 7, 0),
                msg(2.0, 0, SEND_ETYPE, 1, 7, 128),
                msg(3.0, 0, SEND_ETYPE, 1, 8, 64),
                msg(4.0, 1, RECV_ETYPE, 0, 8, 0),
            ],
        );
        assert_eq!(out.len(), 2);

        let first = &out[0];
        assert_eq!(first.category_index(), MESSAGE_CATEGORY);
        assert_eq!(*first.start_vertex(), Vertex::new(0, 2.0));
        assert_eq!(*first.final_vertex(), Vertex::new(1, 1.0));
        assert_eq!(first.infos()[0].value(), Some(&InfoValue::I32(7)));
        assert_eq!(first.infos()[1].value(), Some(&InfoValue::I32(128)));

        assert_eq!(out[1].infos()[1].value(), Some(&InfoValue::I32(64)));
        assert_eq!(matcher.finish().unmatched, 0);
    }

    #[test]
    fn test_arrow_fifo_per_key() {
        let mut matcher = Matcher::new(MatcherConfig::default(), &Preamble::new(2));
        let out = run(
            &mut matcher,
            &[
                msg(1.0, 0, SEND_ETYPE, 1, 3, 10),
                msg(2.0, 0, SEND_ETYPE, 1, 3, 20),
                msg(5.0, 1, RECV_ETYPE, 0, 3, 0),
                msg(6.0, 1, RECV_ETYPE, 0, 4, 0),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start_vertex().time, 1.0);
        let stats = matcher.finish();
        assert_eq!(stats.unmatched, 2);
        assert_eq!(stats.unmatched_by_category.get(&MESSAGE_CATEGORY), Some(&2));
    }

    #[test]
    fn test_cargo_decoded_into_infos() {
        let mut matcher = Matcher::new(MatcherConfig::default(), &Preamble::new(1));
        let mut cargo = [0u8; CARGO_SIZE];
        cargo[0..4].copy_from_slice(&42i32.to_le_bytes());

        let out = run(
            &mut matcher,
            &[
                state_def(20, "count=%d"),
                bare(1.0, 0, 20),
                Record::new(2.0, 0, 0, Payload::CargoEvt { etype: 21, bytes: cargo }),
                Record::new(
                    2.5,
                    0,
                    0,
                    Payload::EventDef(EventDef {
                        etype: 30,
                        color: "blue".into(),
                        name: "mark".into(),
                        format: String::new(),
                    }),
                ),
                bare(3.0, 0, 30),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].infos()[0].value(), Some(&InfoValue::I32(42)));
        assert_eq!(*out[1].bbox(), crate::model::TimeBoundingBox::point(3.0));
    }

    #[test]
    fn test_max_pending_evicts_oldest() {
        let config = MatcherConfig::default().max_pending(2);
        let mut matcher = Matcher::new(config, &Preamble::new(1));
        let out = run(
            &mut matcher,
            &[
                state_def(10, ""),
                bare(1.0, 0, 10),
                bare(2.0, 0, 10),
                bare(3.0, 0, 10),
                bare(4.0, 0, 11),
                bare(5.0, 0, 11),
                bare(6.0, 0, 11),
            ],
        );
        assert_eq!(out.len(), 2);
        let stats = matcher.finish();
        assert_eq!(stats.evicted, 1);
        // Evicted start plus the final left without an opener
        assert_eq!(stats.unmatched, 2);
    }

    #[test]
    fn test_crossed_states_count_nesting_violation() {
        let mut matcher = Matcher::new(MatcherConfig::default(), &Preamble::new(1));
        let out = run(
            &mut matcher,
            &[
                state_def(10, ""),
                state_def(20, ""),
                bare(1.0, 0, 10),
                bare(2.0, 0, 20),
                bare(3.0, 0, 11),
                bare(4.0, 0, 21),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(matcher.finish().nesting_violations, 1);
    }

    #[test]
    fn test_eviction_releases_open_state() {
        let config = MatcherConfig::default().max_pending(1);
        let mut matcher = Matcher::new(config, &Preamble::new(1));
        let out = run(
            &mut matcher,
            &[
                state_def(10, ""),
                state_def(20, ""),
                bare(1.0, 0, 10),
                bare(2.0, 0, 20),
                // Evicts the start at 2.0
                bare(3.0, 0, 20),
                bare(4.0, 0, 21),
                bare(5.0, 0, 11),
            ],
        );
        assert_eq!(out.len(), 2);
        assert!(matcher.open_states.is_empty());

        let stats = matcher.finish();
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.nesting_violations, 0);
    }

    #[test]
    fn test_unknown_etype_counted() {
        let mut matcher = Matcher::new(MatcherConfig::default(), &Preamble::new(1));
        assert!(matcher.feed(&bare(1.0, 0, 999)).unwrap().is_none());
        assert_eq!(matcher.stats().unknown_events, 1);
    }
}
