//! Dependency graph: behaviors, abstract variables, and the emitter that
//! stamps read/write/modify edges.
//!
//! Variables live in one arena ([`VarTable`]) and are referenced by stable
//! [`VarId`]s; behaviors hold de-duplicated read and write sets of those ids.
//! Memory spans are special: a read resolves the span against the device
//! memory's recorded-span list *at the moment of read*, and a write inserts a
//! fresh span record (replacing the overlap), so that a later read of a wider
//! range picks up one edge per covering writer.

use std::collections::HashMap;

use tracing::debug;

use vkdce_protocol::handle::{SubCmdIdx, TraceHandle, VkDeviceMemory};

use crate::binding::{BindingList, MemBinding, U64Span, VK_WHOLE_SIZE};
use crate::error::FootprintError;

/// Stable index of an abstract variable in the builder's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(u32);

/// Index of a behavior in the footprint, assigned when the behavior is
/// appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BehaviorId(pub usize);

/// A half-open interval of a Vulkan device memory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySpan {
    pub memory: VkDeviceMemory,
    pub span: U64Span,
}

impl MemorySpan {
    pub fn new(memory: VkDeviceMemory, offset: u64, size: u64) -> Self {
        MemorySpan {
            memory,
            span: U64Span {
                start: offset,
                end: offset.saturating_add(size),
            },
        }
    }
}

/// A stamping-time reference to an abstract variable.
#[derive(Debug, Clone, Copy)]
pub enum Var {
    /// An arena variable: label, descriptor, binding, recorded command, ...
    Id(VarId),
    /// A Vulkan handle, interned by value. The null handle is dropped.
    Handle(TraceHandle),
    /// A memory-span descriptor, resolved against the recorded-span list.
    Span(MemorySpan),
}

pub(crate) enum VarKind {
    Plain,
    Handle(TraceHandle),
    /// A label whose defining writer later needs to know its readers
    /// (render-pass begin/end pairing).
    ForwardPaired(Vec<BehaviorId>),
    /// One recorded span of a device memory object.
    Span(MemorySpan),
}

pub(crate) struct VarTable {
    kinds: Vec<VarKind>,
    defs: Vec<Option<BehaviorId>>,
}

impl VarTable {
    fn new() -> Self {
        VarTable {
            kinds: Vec::new(),
            defs: Vec::new(),
        }
    }

    pub(crate) fn alloc(&mut self, kind: VarKind) -> VarId {
        let id = VarId(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.defs.push(None);
        id
    }

    /// Allocate a new variable with the same defining behavior as `of`.
    /// Used when a binding is split: both halves were defined by the same
    /// writer.
    pub(crate) fn alloc_copy(&mut self, of: VarId) -> VarId {
        let def = self.defs[of.0 as usize];
        let kind = match &self.kinds[of.0 as usize] {
            VarKind::Plain => VarKind::Plain,
            VarKind::Handle(h) => VarKind::Handle(*h),
            VarKind::ForwardPaired(_) => VarKind::ForwardPaired(Vec::new()),
            VarKind::Span(s) => VarKind::Span(*s),
        };
        let id = self.alloc(kind);
        self.defs[id.0 as usize] = def;
        id
    }

    fn kind(&self, id: VarId) -> &VarKind {
        &self.kinds[id.0 as usize]
    }
}

/// A node in the footprint: one stamped unit of work with its read and write
/// sets over abstract variables.
#[derive(Debug)]
pub struct Behavior {
    pub owner: SubCmdIdx,
    pub reads: Vec<VarId>,
    pub writes: Vec<VarId>,
    /// Keep this behavior regardless of downstream use.
    pub alive: bool,
    /// Set when the mutation this behavior models failed upstream.
    pub aborted: bool,
}

impl Behavior {
    pub fn new(owner: SubCmdIdx) -> Self {
        Behavior {
            owner,
            reads: Vec::new(),
            writes: Vec::new(),
            alive: false,
            aborted: false,
        }
    }

    fn record_read(&mut self, v: VarId) {
        if !self.reads.contains(&v) {
            self.reads.push(v);
        }
    }

    fn record_write(&mut self, v: VarId) {
        if !self.writes.contains(&v) {
            self.writes.push(v);
        }
    }
}

/// The ordered sequence of behaviors built for one trace.
#[derive(Default)]
pub struct Footprint {
    behaviors: Vec<Behavior>,
}

impl Footprint {
    pub fn new() -> Self {
        Footprint::default()
    }

    /// Append a fully-stamped behavior. Defining-behavior back-pointers of
    /// written variables and reader lists of forward-paired labels are fixed
    /// up here, once the behavior's position is known.
    pub fn add_behavior(&mut self, tracker: &mut DepTracker, bh: Behavior) -> BehaviorId {
        let id = BehaviorId(self.behaviors.len());
        for &w in &bh.writes {
            tracker.set_def(w, id);
        }
        for &r in &bh.reads {
            tracker.note_reader(r, id);
        }
        self.behaviors.push(bh);
        id
    }

    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

/// One recorded span of a device memory object, as stored in the
/// recorded-span list the emitter resolves reads against.
pub(crate) struct SpanRecord {
    pub span: U64Span,
    pub var: VarId,
}

impl MemBinding for SpanRecord {
    fn span(&self) -> U64Span {
        self.span
    }

    fn shrink(&mut self, offset: u64, size: u64) -> Result<(), FootprintError> {
        let mut size = size;
        if size == VK_WHOLE_SIZE {
            size = self.span.size().wrapping_sub(offset);
        }
        if offset.checked_add(size).is_none() || offset + size > self.span.size() {
            return Err(FootprintError::ShrinkOutOfBounds {
                offset,
                size,
                bound: self.span.size(),
            });
        }
        self.span.start += offset;
        self.span.end = self.span.start + size;
        Ok(())
    }

    fn duplicate(&self, vars: &mut VarTable) -> Self {
        SpanRecord {
            span: self.span,
            var: vars.alloc_copy(self.var),
        }
    }
}

/// The dependency tracker: variable arena, handle interning, the per-memory
/// recorded-span lists, and the read/write/modify emitter.
pub struct DepTracker {
    pub(crate) vars: VarTable,
    handles: HashMap<u64, VarId>,
    records: HashMap<VkDeviceMemory, BindingList<SpanRecord>>,
    debug_edges: bool,
}

impl DepTracker {
    pub fn new(debug_edges: bool) -> Self {
        DepTracker {
            vars: VarTable::new(),
            handles: HashMap::new(),
            records: HashMap::new(),
            debug_edges,
        }
    }

    /// Allocate an identity-only variable (a label).
    pub fn new_var(&mut self) -> VarId {
        self.vars.alloc(VarKind::Plain)
    }

    /// Allocate a forward-paired label and record `bh` as its writer.
    pub fn new_forward_paired(&mut self, bh: &mut Behavior) -> VarId {
        let v = self.vars.alloc(VarKind::ForwardPaired(Vec::new()));
        self.write(bh, &[Var::Id(v)]);
        v
    }

    /// The interned variable for a (non-null) handle value.
    pub fn handle_id(&mut self, h: TraceHandle) -> VarId {
        if let Some(&id) = self.handles.get(&h.0) {
            return id;
        }
        let id = self.vars.alloc(VarKind::Handle(h));
        self.handles.insert(h.0, id);
        id
    }

    pub fn def_behavior(&self, v: VarId) -> Option<BehaviorId> {
        self.vars.defs[v.0 as usize]
    }

    pub fn forward_paired_readers(&self, v: VarId) -> &[BehaviorId] {
        match self.vars.kind(v) {
            VarKind::ForwardPaired(readers) => readers,
            _ => &[],
        }
    }

    fn set_def(&mut self, v: VarId, b: BehaviorId) {
        self.vars.defs[v.0 as usize] = Some(b);
    }

    fn note_reader(&mut self, v: VarId, b: BehaviorId) {
        if let VarKind::ForwardPaired(readers) = &mut self.vars.kinds[v.0 as usize] {
            readers.push(b);
        }
    }

    /// Stamp read edges for each variable. Returns false if any variable was
    /// a null handle or failed to resolve; the remaining variables are still
    /// stamped.
    pub fn read(&mut self, bh: &mut Behavior, vars: &[Var]) -> bool {
        let mut all_succeeded = true;
        for v in vars {
            match v {
                Var::Handle(h) => {
                    if h.is_null() {
                        if self.debug_edges {
                            debug!("read of VK_NULL_HANDLE ignored");
                        }
                        all_succeeded = false;
                        continue;
                    }
                    let id = self.handle_id(*h);
                    bh.record_read(id);
                }
                Var::Id(id) => {
                    bh.record_read(*id);
                }
                Var::Span(ms) => {
                    if ms.memory.is_null() {
                        continue;
                    }
                    if let Some(list) = self.records.get(&ms.memory) {
                        let (first, count) = list.intersect(ms.span);
                        for rec in &list.as_slice()[first..first + count] {
                            bh.record_read(rec.var);
                        }
                    }
                }
            }
            if self.debug_edges {
                debug!(behavior = ?bh.owner, var = ?v, "read");
            }
        }
        all_succeeded
    }

    /// Stamp write edges for each variable. Memory spans are duplicated into
    /// the recorded-span list (replacing any overlap) and the write lands on
    /// the duplicate.
    pub fn write(&mut self, bh: &mut Behavior, vars: &[Var]) -> bool {
        let mut all_succeeded = true;
        for v in vars {
            match v {
                Var::Handle(h) => {
                    if h.is_null() {
                        if self.debug_edges {
                            debug!("write of VK_NULL_HANDLE ignored");
                        }
                        all_succeeded = false;
                        continue;
                    }
                    let id = self.handle_id(*h);
                    bh.record_write(id);
                }
                Var::Id(id) => {
                    bh.record_write(*id);
                }
                Var::Span(ms) => {
                    if ms.memory.is_null() {
                        continue;
                    }
                    let var = self.vars.alloc(VarKind::Span(*ms));
                    let rec = SpanRecord { span: ms.span, var };
                    let list = self.records.entry(ms.memory).or_default();
                    if let Err(e) = list.add(&mut self.vars, rec) {
                        if self.debug_edges {
                            debug!(memory = ?ms.memory, span = ?ms.span, error = %e,
                                "recording memory span failed");
                        }
                        all_succeeded = false;
                        continue;
                    }
                    bh.record_write(var);
                }
            }
            if self.debug_edges {
                debug!(behavior = ?bh.owner, var = ?v, "write");
            }
        }
        all_succeeded
    }

    /// Read then write. The write is skipped entirely if any read failed.
    pub fn modify(&mut self, bh: &mut Behavior, vars: &[Var]) -> bool {
        let all_succeeded = self.read(bh, vars);
        all_succeeded && self.write(bh, vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(mem: u64, start: u64, end: u64) -> Var {
        Var::Span(MemorySpan::new(TraceHandle(mem), start, end - start))
    }

    #[test]
    fn null_handle_reads_are_dropped() {
        let mut tracker = DepTracker::new(false);
        let mut bh = Behavior::new(SubCmdIdx::new(vec![0]));
        assert!(!tracker.read(&mut bh, &[Var::Handle(TraceHandle::NULL)]));
        assert!(bh.reads.is_empty());
        assert!(tracker.read(&mut bh, &[Var::Handle(TraceHandle(3))]));
        assert_eq!(bh.reads.len(), 1);
    }

    #[test]
    fn span_read_sees_one_edge_per_covering_writer() {
        // write [0, 256), write [128, 384), then read [0, 384): the first
        // writer still covers [0, 128), so the read must pick up both.
        let mut tracker = DepTracker::new(false);
        let mut ft = Footprint::new();

        let mut w1 = Behavior::new(SubCmdIdx::new(vec![1]));
        assert!(tracker.write(&mut w1, &[span(9, 0, 256)]));
        let w1_id = ft.add_behavior(&mut tracker, w1);

        let mut w2 = Behavior::new(SubCmdIdx::new(vec![2]));
        assert!(tracker.write(&mut w2, &[span(9, 128, 384)]));
        let w2_id = ft.add_behavior(&mut tracker, w2);

        let mut r = Behavior::new(SubCmdIdx::new(vec![3]));
        assert!(tracker.read(&mut r, &[span(9, 0, 384)]));
        assert_eq!(r.reads.len(), 2);
        let defs: Vec<_> = r
            .reads
            .iter()
            .map(|&v| tracker.def_behavior(v).unwrap())
            .collect();
        assert!(defs.contains(&w1_id));
        assert!(defs.contains(&w2_id));
    }

    #[test]
    fn span_read_resolves_state_at_the_moment_of_read() {
        // A write that happens after the read must not add edges to it.
        let mut tracker = DepTracker::new(false);
        let mut ft = Footprint::new();

        let mut w1 = Behavior::new(SubCmdIdx::new(vec![1]));
        tracker.write(&mut w1, &[span(4, 0, 64)]);
        ft.add_behavior(&mut tracker, w1);

        let mut r = Behavior::new(SubCmdIdx::new(vec![2]));
        tracker.read(&mut r, &[span(4, 0, 128)]);
        let before = r.reads.clone();

        let mut w2 = Behavior::new(SubCmdIdx::new(vec![3]));
        tracker.write(&mut w2, &[span(4, 64, 128)]);
        ft.add_behavior(&mut tracker, w2);

        assert_eq!(before, r.reads);
        assert_eq!(r.reads.len(), 1);
    }

    #[test]
    fn modify_short_circuits_on_failed_read() {
        let mut tracker = DepTracker::new(false);
        let mut bh = Behavior::new(SubCmdIdx::new(vec![0]));
        assert!(!tracker.modify(&mut bh, &[Var::Handle(TraceHandle::NULL)]));
        assert!(bh.writes.is_empty());
    }

    #[test]
    fn forward_paired_label_collects_readers() {
        let mut tracker = DepTracker::new(false);
        let mut ft = Footprint::new();

        let mut writer = Behavior::new(SubCmdIdx::new(vec![1]));
        let fp = tracker.new_forward_paired(&mut writer);
        ft.add_behavior(&mut tracker, writer);

        let mut reader = Behavior::new(SubCmdIdx::new(vec![2]));
        tracker.read(&mut reader, &[Var::Id(fp)]);
        let reader_id = ft.add_behavior(&mut tracker, reader);

        assert_eq!(tracker.forward_paired_readers(fp), &[reader_id]);
    }

    #[test]
    fn handle_identity_is_by_value() {
        let mut tracker = DepTracker::new(false);
        let a = tracker.handle_id(TraceHandle(42));
        let b = tracker.handle_id(TraceHandle(42));
        let c = tracker.handle_id(TraceHandle(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
