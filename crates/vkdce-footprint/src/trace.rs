//! The collaborator interface.
//!
//! The builder does not parse traces or replay commands; the surrounding
//! trace machinery does, and hands the builder one command at a time through
//! [`MutationContext`]. `mutate` applies the command to the collaborator's
//! Vulkan state snapshot; the accessors answer questions about live handles
//! after that application.

use vkdce_protocol::commands::Command;
use vkdce_protocol::handle::{
    SubCmdIdx, VkBuffer, VkBufferView, VkDescriptorSetLayout, VkDeviceMemory, VkFramebuffer,
    VkImage, VkImageView, VkRenderPass, VkSemaphore, VkSwapchainKHR,
};
use vkdce_protocol::snapshot::{
    BufferState, BufferViewState, DescriptorSetLayoutState, DeviceMemoryState, FramebufferState,
    ImageState, ImageViewState, MemoryObservation, RenderPassState, SwapchainState,
};

use crate::error::FootprintError;

/// What the collaborator learned while applying one command.
#[derive(Debug, Default)]
pub struct MutationOutcome {
    /// For `QueueSubmit` and `SetEvent`: the full indices of every
    /// subcommand that actually executed, in execution order. Replay may
    /// abort partway, and a submission may execute commands pending from an
    /// earlier submit.
    pub executed: Vec<SubCmdIdx>,
}

impl MutationOutcome {
    pub fn none() -> Self {
        MutationOutcome::default()
    }

    pub fn with_executed(executed: Vec<SubCmdIdx>) -> Self {
        MutationOutcome { executed }
    }
}

/// Implemented by the trace collaborator. Accessors default to "not known",
/// which the builder treats like a missing handle: log and skip.
pub trait MutationContext {
    /// Apply the command to the collaborator's state. On error the builder
    /// skips stamping for this command and continues with the next.
    fn mutate(&mut self, id: u64, cmd: &Command) -> Result<MutationOutcome, FootprintError>;

    fn image(&self, _image: VkImage) -> Option<ImageState> {
        None
    }

    fn buffer(&self, _buffer: VkBuffer) -> Option<BufferState> {
        None
    }

    fn image_view(&self, _view: VkImageView) -> Option<ImageViewState> {
        None
    }

    fn buffer_view(&self, _view: VkBufferView) -> Option<BufferViewState> {
        None
    }

    fn framebuffer(&self, _framebuffer: VkFramebuffer) -> Option<FramebufferState> {
        None
    }

    fn render_pass(&self, _render_pass: VkRenderPass) -> Option<RenderPassState> {
        None
    }

    fn descriptor_set_layout(
        &self,
        _layout: VkDescriptorSetLayout,
    ) -> Option<DescriptorSetLayoutState> {
        None
    }

    fn device_memory(&self, _memory: VkDeviceMemory) -> Option<DeviceMemoryState> {
        None
    }

    fn swapchain(&self, _swapchain: VkSwapchainKHR) -> Option<SwapchainState> {
        None
    }

    fn semaphore_known(&self, _semaphore: VkSemaphore) -> bool {
        false
    }

    /// The framebuffer of the most recent draw of the last submission, if
    /// the global state reports one. Its attachments are pinned live after
    /// every command.
    fn last_draw_framebuffer(&self) -> Option<VkFramebuffer> {
        None
    }

    /// Host-memory ranges observed as read while applying the current
    /// command.
    fn read_observations(&self) -> Vec<MemoryObservation> {
        Vec::new()
    }
}
