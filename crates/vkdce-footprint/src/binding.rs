//! Ordered, non-overlapping interval lists mapping a resource's address space
//! to backing data variables.
//!
//! Two binding flavors share the machinery: memory-span records (the
//! emitter's per-device-memory write history) and resource bindings (what a
//! range of an image or buffer is bound to). Rebinding overwrites the
//! overlap, so insertion trims or splits existing bindings.

use tracing::error;

use crate::error::FootprintError;
use crate::graph::{Behavior, DepTracker, MemorySpan, Var, VarId, VarTable};

pub const VK_WHOLE_SIZE: u64 = u64::MAX;

/// Half-open `[start, end)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U64Span {
    pub start: u64,
    pub end: u64,
}

impl U64Span {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &U64Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// An interval occupying a binding list.
pub(crate) trait MemBinding: Sized {
    fn span(&self) -> U64Span;
    /// Narrow to `[offset, offset+size)` relative to the binding's own start.
    /// `VK_WHOLE_SIZE` means "to the end".
    fn shrink(&mut self, offset: u64, size: u64) -> Result<(), FootprintError>;
    /// Copy with a fresh variable identity sharing the original's defining
    /// behavior.
    fn duplicate(&self, vars: &mut VarTable) -> Self;
}

/// Sorted, non-overlapping sequence of bindings.
pub(crate) struct BindingList<T: MemBinding> {
    items: Vec<T>,
}

impl<T: MemBinding> Default for BindingList<T> {
    fn default() -> Self {
        BindingList { items: Vec::new() }
    }
}

impl<T: MemBinding> BindingList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// `(first, count)` of the bindings overlapping `span`.
    pub fn intersect(&self, span: U64Span) -> (usize, usize) {
        intersect_list(&self.items, span)
    }

    /// Insert `nb` preserving order. Existing bindings are overwritten over
    /// the overlap: trimmed at the edges, split when `nb` lands strictly
    /// inside, dropped when fully covered.
    pub fn add(&mut self, vars: &mut VarTable, nb: T) -> Result<(), FootprintError> {
        let ns = nb.span();
        if ns.start >= ns.end {
            return Err(FootprintError::InvalidSpan {
                start: ns.start,
                end: ns.end,
            });
        }
        let mut out = Vec::with_capacity(self.items.len() + 2);
        let mut pending = Some(nb);
        for mut old in self.items.drain(..) {
            let os = old.span();
            if os.end <= ns.start {
                out.push(old);
                continue;
            }
            if os.start >= ns.end {
                if let Some(n) = pending.take() {
                    out.push(n);
                }
                out.push(old);
                continue;
            }
            let has_left = os.start < ns.start;
            let has_right = os.end > ns.end;
            if has_left && has_right {
                let mut right = old.duplicate(vars);
                if right.shrink(ns.end - os.start, os.end - ns.end).is_ok() {
                    match old.shrink(0, ns.start - os.start) {
                        Ok(()) => out.push(old),
                        Err(e) => error!(error = %e, "dropping untrimmable binding remainder"),
                    }
                    out.push(pending.take().expect("split binding seen twice"));
                    out.push(right);
                } else {
                    // A binding that cannot be split is overwritten whole.
                    error!("dropping unsplittable binding overwritten by rebind");
                }
            } else if has_left {
                match old.shrink(0, ns.start - os.start) {
                    Ok(()) => out.push(old),
                    Err(e) => error!(error = %e, "dropping untrimmable binding remainder"),
                }
            } else if has_right {
                let trimmed = old.shrink(ns.end - os.start, os.end - ns.end);
                if let Some(n) = pending.take() {
                    out.push(n);
                }
                match trimmed {
                    Ok(()) => out.push(old),
                    Err(e) => error!(error = %e, "dropping untrimmable binding remainder"),
                }
            }
            // fully covered: drop old
        }
        if let Some(n) = pending.take() {
            out.push(n);
        }
        self.items = out;
        Ok(())
    }
}

pub(crate) fn intersect_list<T: MemBinding>(items: &[T], span: U64Span) -> (usize, usize) {
    let mut first = items.len();
    let mut count = 0;
    for (i, b) in items.iter().enumerate() {
        if b.span().overlaps(&span) {
            if count == 0 {
                first = i;
            }
            count += 1;
        } else if count > 0 {
            break;
        }
    }
    (first, count)
}

/// What a bound resource range is backed by.
#[derive(Debug, Clone, Copy)]
pub enum BackingData {
    /// An opaque device-memory bind.
    Span(MemorySpan),
    /// Backing owned outside traced memory (swapchain-created images);
    /// represented by an identity-only label.
    Opaque(VarId),
}

impl BackingData {
    pub fn as_var(&self) -> Var {
        match self {
            BackingData::Span(ms) => Var::Span(*ms),
            BackingData::Opaque(v) => Var::Id(*v),
        }
    }
}

/// One resource-to-backing binding: `[resource_offset, resource_offset +
/// bind_size)` of the resource maps onto `backing`. The binding itself is a
/// def-use variable (`var`), so rebinds invalidate earlier readers.
#[derive(Debug)]
pub struct ResBinding {
    pub resource_offset: u64,
    pub bind_size: u64,
    pub backing: BackingData,
    pub var: VarId,
}

impl MemBinding for ResBinding {
    fn span(&self) -> U64Span {
        U64Span {
            start: self.resource_offset,
            end: self.resource_offset.saturating_add(self.bind_size),
        }
    }

    fn shrink(&mut self, offset: u64, size: u64) -> Result<(), FootprintError> {
        let mut size = size;
        if size == VK_WHOLE_SIZE {
            size = self.bind_size.wrapping_sub(offset);
        }
        if offset.checked_add(size).is_none() || offset + size > self.bind_size {
            return Err(FootprintError::ShrinkOutOfBounds {
                offset,
                size,
                bound: self.bind_size,
            });
        }
        match &mut self.backing {
            BackingData::Span(ms) => {
                self.resource_offset += offset;
                self.bind_size = size;
                ms.span.start += offset;
                ms.span.end = ms.span.start + size;
                Ok(())
            }
            BackingData::Opaque(_) => {
                if offset != 0 || size != self.bind_size {
                    return Err(FootprintError::BindingNotResizable);
                }
                Ok(())
            }
        }
    }

    fn duplicate(&self, vars: &mut VarTable) -> Self {
        ResBinding {
            resource_offset: self.resource_offset,
            bind_size: self.bind_size,
            backing: self.backing,
            var: vars.alloc_copy(self.var),
        }
    }
}

/// The ordered sub-list of `list` covering `[offset, offset+size)`, with
/// boundary bindings clipped to the requested range. Each source binding is
/// read and each produced sub-binding written on `bh` when present. Overflow
/// of `offset + size` is clamped to `VK_WHOLE_SIZE`.
pub(crate) fn sub_binding_list(
    list: &[ResBinding],
    tracker: &mut DepTracker,
    mut bh: Option<&mut Behavior>,
    offset: u64,
    size: u64,
) -> Vec<ResBinding> {
    let mut size = size;
    if offset.checked_add(size).is_none() {
        size = VK_WHOLE_SIZE - offset;
    }
    let end = offset.saturating_add(size);
    let (first, count) = intersect_list(list, U64Span { start: offset, end });
    let mut out = Vec::with_capacity(count);
    for b in &list[first..first + count] {
        let bs = b.span();
        let start = bs.start.max(offset);
        let stop = bs.end.min(end);
        if let Some(bh) = bh.as_deref_mut() {
            tracker.read(bh, &[Var::Id(b.var)]);
        }
        let mut sub = b.duplicate(&mut tracker.vars);
        if let Err(e) = sub.shrink(start - bs.start, stop - start) {
            error!(error = %e, "dropping out-of-range sub-binding");
            continue;
        }
        if let Some(bh) = bh.as_deref_mut() {
            tracker.write(bh, &[Var::Id(sub.var)]);
        }
        out.push(sub);
    }
    out
}

/// Flatten [`sub_binding_list`] to the backing-data variables of the range.
pub(crate) fn bound_data(
    list: &[ResBinding],
    tracker: &mut DepTracker,
    bh: Option<&mut Behavior>,
    offset: u64,
    size: u64,
) -> Vec<Var> {
    sub_binding_list(list, tracker, bh, offset, size)
        .iter()
        .map(|b| b.backing.as_var())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkdce_protocol::handle::TraceHandle;

    fn tracker() -> DepTracker {
        DepTracker::new(false)
    }

    fn span_binding(t: &mut DepTracker, res_off: u64, size: u64, mem_off: u64) -> ResBinding {
        let var = t.new_var();
        ResBinding {
            resource_offset: res_off,
            bind_size: size,
            backing: BackingData::Span(MemorySpan::new(TraceHandle(77), mem_off, size)),
            var,
        }
    }

    fn spans_of(list: &BindingList<ResBinding>) -> Vec<(u64, u64)> {
        list.as_slice()
            .iter()
            .map(|b| (b.span().start, b.span().end))
            .collect()
    }

    #[test]
    fn add_keeps_order_and_rejects_empty() {
        let mut t = tracker();
        let mut list = BindingList::new();
        let b = span_binding(&mut t, 100, 50, 0);
        list.add(&mut t.vars, b).unwrap();
        let b = span_binding(&mut t, 0, 50, 0);
        list.add(&mut t.vars, b).unwrap();
        assert_eq!(spans_of(&list), vec![(0, 50), (100, 150)]);

        let empty = span_binding(&mut t, 10, 0, 0);
        assert!(list.add(&mut t.vars, empty).is_err());
    }

    #[test]
    fn rebinding_overwrites_the_overlap() {
        let mut t = tracker();
        let mut list = BindingList::new();
        let b = span_binding(&mut t, 0, 400, 0);
        list.add(&mut t.vars, b).unwrap();
        // Bind the middle; the original must split around it.
        let b = span_binding(&mut t, 100, 100, 4096);
        list.add(&mut t.vars, b).unwrap();
        assert_eq!(spans_of(&list), vec![(0, 100), (100, 200), (200, 400)]);

        // Bind across the tail of one and the head of the next.
        let b = span_binding(&mut t, 150, 100, 8192);
        list.add(&mut t.vars, b).unwrap();
        assert_eq!(
            spans_of(&list),
            vec![(0, 100), (100, 150), (150, 250), (250, 400)]
        );
        // Intervals stay sorted and disjoint.
        for w in list.as_slice().windows(2) {
            assert!(w[0].span().end <= w[1].span().start);
        }
    }

    #[test]
    fn split_halves_share_the_defining_behavior() {
        use crate::graph::Footprint;
        use vkdce_protocol::handle::SubCmdIdx;

        let mut t = tracker();
        let mut ft = Footprint::new();
        let mut list = BindingList::new();

        let mut w = Behavior::new(SubCmdIdx::new(vec![1]));
        let b = span_binding(&mut t, 0, 300, 0);
        t.write(&mut w, &[Var::Id(b.var)]);
        let w_id = ft.add_behavior(&mut t, w);
        list.add(&mut t.vars, b).unwrap();

        let b = span_binding(&mut t, 100, 100, 4096);
        list.add(&mut t.vars, b).unwrap();
        let left = &list.as_slice()[0];
        let right = &list.as_slice()[2];
        assert_eq!(t.def_behavior(left.var), Some(w_id));
        assert_eq!(t.def_behavior(right.var), Some(w_id));
        assert_ne!(left.var, right.var);
    }

    #[test]
    fn sub_binding_list_clips_to_the_range() {
        let mut t = tracker();
        let mut list = BindingList::new();
        let b = span_binding(&mut t, 0, 256, 1000);
        list.add(&mut t.vars, b).unwrap();
        let b = span_binding(&mut t, 256, 256, 2000);
        list.add(&mut t.vars, b).unwrap();

        let subs = sub_binding_list(list.as_slice(), &mut t, None, 128, 256);
        assert_eq!(subs.len(), 2);
        assert_eq!((subs[0].span().start, subs[0].span().end), (128, 256));
        assert_eq!((subs[1].span().start, subs[1].span().end), (256, 384));
        // The clipped memory spans shift with the clip.
        match subs[0].backing {
            BackingData::Span(ms) => {
                assert_eq!(ms.span.start, 1128);
                assert_eq!(ms.span.end, 1256);
            }
            _ => panic!("expected span backing"),
        }
    }

    #[test]
    fn whole_size_reaches_the_end_from_any_offset() {
        let mut t = tracker();
        let mut list = BindingList::new();
        let b = span_binding(&mut t, 0, 512, 0);
        list.add(&mut t.vars, b).unwrap();

        let subs = sub_binding_list(list.as_slice(), &mut t, None, 200, VK_WHOLE_SIZE);
        assert_eq!(subs.len(), 1);
        assert_eq!((subs[0].span().start, subs[0].span().end), (200, 512));
    }

    #[test]
    fn non_span_backing_is_only_returned_whole() {
        let mut t = tracker();
        let label = t.new_var();
        let var = t.new_var();
        let mut list = BindingList::new();
        list.add(
            &mut t.vars,
            ResBinding {
                resource_offset: 0,
                bind_size: VK_WHOLE_SIZE,
                backing: BackingData::Opaque(label),
                var,
            },
        )
        .unwrap();

        // Whole-resource request returns the binding unchanged.
        let subs = sub_binding_list(list.as_slice(), &mut t, None, 0, VK_WHOLE_SIZE);
        assert_eq!(subs.len(), 1);
        // A partial request cannot resize a non-span binding and drops it.
        let subs = sub_binding_list(list.as_slice(), &mut t, None, 64, 128);
        assert!(subs.is_empty());
    }
}
