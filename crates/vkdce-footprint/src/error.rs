use vkdce_protocol::handle::TraceHandle;

/// Error kinds raised while building a footprint. None of them abort the
/// build: the builder logs, degrades to a conservative stamping, and keeps
/// going.
#[derive(Debug, thiserror::Error)]
pub enum FootprintError {
    #[error("mutation failed: {0}")]
    Mutation(String),

    #[error("unknown handle: {0:?}")]
    UnknownHandle(TraceHandle),

    #[error("sub-range [{offset}, {offset}+{size}) exceeds binding of size {bound}")]
    ShrinkOutOfBounds { offset: u64, size: u64, bound: u64 },

    #[error("cannot resize a binding not backed by a memory span")]
    BindingNotResizable,

    #[error("binding span [{start}, {end}) is empty or inverted")]
    InvalidSpan { start: u64, end: u64 },
}
