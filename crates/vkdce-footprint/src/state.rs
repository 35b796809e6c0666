//! Per-handle shadow state the builder maintains across the trace.
//!
//! Entries are created on the corresponding `Create*`/`Allocate*` command,
//! mutated as the trace progresses, and removed on `Destroy*`/`Free*`.

use std::collections::HashMap;

use crate::binding::{BindingList, ResBinding};
use crate::graph::{Behavior, DepTracker, MemorySpan, Var, VarId};

/// Shadow of one image: its layout label, the opaque binding list, and the
/// sparse bindings keyed `aspect -> layer -> level -> blockIndex`.
pub struct ImageShadow {
    pub layout: VarId,
    pub(crate) opaque: BindingList<ResBinding>,
    pub(crate) sparse: HashMap<u32, HashMap<u32, HashMap<u32, HashMap<u64, SparseBinding>>>>,
}

impl ImageShadow {
    /// Allocates the layout label and records `bh` as its writer.
    pub fn new(tracker: &mut DepTracker, bh: &mut Behavior) -> Self {
        let layout = tracker.new_var();
        tracker.write(bh, &[Var::Id(layout)]);
        ImageShadow {
            layout,
            opaque: BindingList::new(),
            sparse: HashMap::new(),
        }
    }
}

/// One block-sized sparse backing for a `(aspect, layer, level, block)` slot.
pub struct SparseBinding {
    pub var: VarId,
    pub backing: MemorySpan,
}

/// The three labels carried per command buffer. The deferred-command list
/// itself lives in the builder's `commands` map.
#[derive(Clone, Copy)]
pub struct CommandBufferShadow {
    pub begin: VarId,
    pub end: VarId,
    pub render_pass_begin: VarId,
}

impl CommandBufferShadow {
    pub fn new(tracker: &mut DepTracker) -> Self {
        CommandBufferShadow {
            begin: tracker.new_var(),
            end: tracker.new_var(),
            render_pass_begin: tracker.new_var(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct FenceShadow {
    pub signal: VarId,
    pub unsignal: VarId,
}

impl FenceShadow {
    pub fn new(tracker: &mut DepTracker) -> Self {
        FenceShadow {
            signal: tracker.new_var(),
            unsignal: tracker.new_var(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct EventShadow {
    pub signal: VarId,
    pub unsignal: VarId,
}

impl EventShadow {
    pub fn new(tracker: &mut DepTracker) -> Self {
        EventShadow {
            signal: tracker.new_var(),
            unsignal: tracker.new_var(),
        }
    }
}

/// Label quadruple tracking one query slot's lifecycle.
#[derive(Clone, Copy)]
pub struct QueryShadow {
    pub reset: VarId,
    pub begin: VarId,
    pub end: VarId,
    pub result: VarId,
}

impl QueryShadow {
    pub fn new(tracker: &mut DepTracker) -> Self {
        QueryShadow {
            reset: tracker.new_var(),
            begin: tracker.new_var(),
            end: tracker.new_var(),
            result: tracker.new_var(),
        }
    }
}

pub struct QueryPoolShadow {
    pub queries: Vec<QueryShadow>,
}

impl QueryPoolShadow {
    pub fn new(tracker: &mut DepTracker, count: u32) -> Self {
        QueryPoolShadow {
            queries: (0..count).map(|_| QueryShadow::new(tracker)).collect(),
        }
    }
}

/// Snapshot of a coherent host mapping taken at `MapMemory` time.
#[derive(Clone, Copy)]
pub struct MappedCoherentMemory {
    pub offset: u64,
    pub size: u64,
    pub address: u64,
}
