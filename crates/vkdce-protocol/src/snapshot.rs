//! State-snapshot data types exposed by the trace collaborator.
//!
//! The footprint builder never mutates Vulkan state itself; after each
//! command is applied by the collaborator, the builder consults these
//! accessor shapes to learn sizes, view ranges, attachment wiring and
//! memory-mapping facts it cannot derive from the command alone.

use serde::{Deserialize, Serialize};

use crate::commands::{
    AttachmentDescription, DescriptorSetLayoutBinding, Extent3d, ImageCreateInfo,
    ImageSubresourceRange, SubpassDescription,
};
use crate::handle::*;

/// Per-aspect sparse binding granularity, from
/// `VkSparseImageMemoryRequirements`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SparseImageRequirements {
    pub aspect_mask: u32,
    pub image_granularity: Extent3d,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageState {
    pub info: ImageCreateInfo,
    /// Total size of the image's opaque memory requirement.
    pub memory_size: u64,
    /// Sparse block size (the memory requirement alignment).
    pub block_size: u64,
    pub sparse_requirements: Vec<SparseImageRequirements>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageViewState {
    pub image: VkImage,
    pub view_type: i32,
    pub subresource_range: ImageSubresourceRange,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferState {
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferViewState {
    pub buffer: VkBuffer,
    pub offset: u64,
    pub range: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramebufferState {
    pub render_pass: VkRenderPass,
    pub attachments: Vec<VkImageView>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPassState {
    pub attachments: Vec<AttachmentDescription>,
    pub subpasses: Vec<SubpassDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorSetLayoutState {
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceMemoryState {
    pub size: u64,
    pub coherent: bool,
    /// Offset into the memory object of the active host mapping, if any.
    pub mapped_offset: u64,
    pub mapped_size: u64,
    /// Host address the mapping was observed at.
    pub mapped_address: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapchainState {
    pub images: Vec<VkImage>,
}

/// A host-memory range the collaborator observed being read while applying
/// the current command. Intersected with mapped-coherent device memory to
/// derive coherent writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryObservation {
    pub base: u64,
    pub size: u64,
}

impl MemoryObservation {
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn overlaps(&self, base: u64, size: u64) -> bool {
        self.base < base.saturating_add(size) && base < self.end()
    }
}
