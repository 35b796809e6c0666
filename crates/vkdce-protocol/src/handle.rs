use serde::{Deserialize, Serialize};

/// The raw 64-bit Vulkan object handle value as recorded in a trace.
/// Handle values are assumed unique across the trace; zero is the null handle
/// and never participates in dependency tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceHandle(pub u64);

impl TraceHandle {
    pub const NULL: TraceHandle = TraceHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for TraceHandle {
    fn from(raw: u64) -> Self {
        TraceHandle(raw)
    }
}

// Semantic aliases. The trace does not carry enough information to type-check
// handle classes, but spelling the class at use sites keeps the intent clear.
pub type VkDeviceMemory = TraceHandle;
pub type VkImage = TraceHandle;
pub type VkImageView = TraceHandle;
pub type VkBuffer = TraceHandle;
pub type VkBufferView = TraceHandle;
pub type VkSampler = TraceHandle;
pub type VkSwapchainKHR = TraceHandle;
pub type VkQueryPool = TraceHandle;
pub type VkDescriptorSetLayout = TraceHandle;
pub type VkDescriptorSet = TraceHandle;
pub type VkPipelineLayout = TraceHandle;
pub type VkPipeline = TraceHandle;
pub type VkPipelineCache = TraceHandle;
pub type VkShaderModule = TraceHandle;
pub type VkRenderPass = TraceHandle;
pub type VkFramebuffer = TraceHandle;
pub type VkCommandBuffer = TraceHandle;
pub type VkSemaphore = TraceHandle;
pub type VkFence = TraceHandle;
pub type VkEvent = TraceHandle;
pub type VkQueue = TraceHandle;

/// Hierarchical index of a command or subcommand in the trace:
/// `[cmdId]` for API-level commands, `[cmdId, submitIdx, cbIdx, cmdIdx]` for
/// primary command-buffer commands, and two further elements for commands
/// inside secondary command buffers. Ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubCmdIdx(pub Vec<u64>);

impl SubCmdIdx {
    pub fn new(indices: Vec<u64>) -> Self {
        SubCmdIdx(indices)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lexicographic "strictly precedes" over the shared prefix length.
    pub fn less_than(&self, other: &SubCmdIdx) -> bool {
        self.0 < other.0
    }

    pub fn prefix(&self, len: usize) -> &[u64] {
        &self.0[..len.min(self.0.len())]
    }
}

impl From<Vec<u64>> for SubCmdIdx {
    fn from(indices: Vec<u64>) -> Self {
        SubCmdIdx(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle() {
        assert!(TraceHandle::NULL.is_null());
        assert!(!TraceHandle(7).is_null());
    }

    #[test]
    fn sub_cmd_idx_ordering() {
        let a = SubCmdIdx::new(vec![4, 0, 0, 1]);
        let b = SubCmdIdx::new(vec![4, 0, 0, 2]);
        let c = SubCmdIdx::new(vec![4, 0, 0, 1, 0, 0]);
        assert!(a.less_than(&b));
        assert!(!b.less_than(&a));
        // a is a prefix of c, so a sorts first
        assert!(a.less_than(&c));
        assert_eq!(a.prefix(3), &[4, 0, 0]);
    }
}
