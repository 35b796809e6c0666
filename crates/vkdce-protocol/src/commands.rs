use serde::{Deserialize, Serialize};

use crate::handle::*;

// ============================================================================
// Serialized Vulkan types shared between trace commands and state snapshots
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset3d {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Rect2d {
    pub offset: [i32; 2],
    pub extent: [u32; 2],
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageSubresourceRange {
    pub aspect_mask: u32,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageSubresourceLayers {
    pub aspect_mask: u32,
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageSubresource {
    pub aspect_mask: u32,
    pub mip_level: u32,
    pub array_layer: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCreateInfo {
    pub flags: u32,
    pub image_type: i32,
    pub format: i32,
    pub extent: Extent3d,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: u32,
    pub tiling: i32,
    pub usage: u32,
    pub initial_layout: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MappedMemoryRange {
    pub memory: VkDeviceMemory,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageCopy {
    pub src_subresource: ImageSubresourceLayers,
    pub src_offset: Offset3d,
    pub dst_subresource: ImageSubresourceLayers,
    pub dst_offset: Offset3d,
    pub extent: Extent3d,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    pub buffer_row_length: u32,
    pub buffer_image_height: u32,
    pub image_subresource: ImageSubresourceLayers,
    pub image_offset: Offset3d,
    pub image_extent: Extent3d,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageBlit {
    pub src_subresource: ImageSubresourceLayers,
    pub src_offsets: [Offset3d; 2],
    pub dst_subresource: ImageSubresourceLayers,
    pub dst_offsets: [Offset3d; 2],
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClearRect {
    pub rect: Rect2d,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClearAttachment {
    pub aspect_mask: u32,
    pub color_attachment: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttachmentDescription {
    pub flags: u32,
    pub format: i32,
    pub samples: u32,
    pub load_op: i32,
    pub store_op: i32,
    pub stencil_load_op: i32,
    pub stencil_store_op: i32,
    pub initial_layout: i32,
    pub final_layout: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubpassDescription {
    pub flags: u32,
    pub pipeline_bind_point: i32,
    pub input_attachments: Vec<AttachmentReference>,
    pub color_attachments: Vec<AttachmentReference>,
    pub resolve_attachments: Vec<AttachmentReference>,
    pub depth_stencil_attachment: Option<AttachmentReference>,
    pub preserve_attachments: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DescriptorImageInfo {
    pub sampler: VkSampler,
    pub image_view: VkImageView,
    pub image_layout: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DescriptorBufferInfo {
    pub buffer: VkBuffer,
    pub offset: u64,
    pub range: u64,
}

/// One `VkWriteDescriptorSet`. Which of the three payload lists is populated
/// depends on `descriptor_type`, as in the Vulkan structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteDescriptorSet {
    pub dst_set: VkDescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_type: i32,
    pub image_infos: Vec<DescriptorImageInfo>,
    pub buffer_infos: Vec<DescriptorBufferInfo>,
    pub texel_buffer_views: Vec<VkBufferView>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CopyDescriptorSet {
    pub src_set: VkDescriptorSet,
    pub src_binding: u32,
    pub src_array_element: u32,
    pub dst_set: VkDescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitInfo {
    pub wait_semaphores: Vec<VkSemaphore>,
    pub wait_dst_stage_masks: Vec<u32>,
    pub command_buffers: Vec<VkCommandBuffer>,
    pub signal_semaphores: Vec<VkSemaphore>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryBarrier {
    pub src_access_mask: u32,
    pub dst_access_mask: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferMemoryBarrier {
    pub src_access_mask: u32,
    pub dst_access_mask: u32,
    pub src_queue_family_index: u32,
    pub dst_queue_family_index: u32,
    pub buffer: VkBuffer,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageMemoryBarrier {
    pub src_access_mask: u32,
    pub dst_access_mask: u32,
    pub old_layout: i32,
    pub new_layout: i32,
    pub src_queue_family_index: u32,
    pub dst_queue_family_index: u32,
    pub image: VkImage,
    pub subresource_range: ImageSubresourceRange,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SparseMemoryBind {
    pub resource_offset: u64,
    pub size: u64,
    pub memory: VkDeviceMemory,
    pub memory_offset: u64,
    pub flags: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseBufferMemoryBindInfo {
    pub buffer: VkBuffer,
    pub binds: Vec<SparseMemoryBind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseImageOpaqueMemoryBindInfo {
    pub image: VkImage,
    pub binds: Vec<SparseMemoryBind>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SparseImageMemoryBind {
    pub subresource: ImageSubresource,
    pub offset: Offset3d,
    pub extent: Extent3d,
    pub memory: VkDeviceMemory,
    pub memory_offset: u64,
    pub flags: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseImageMemoryBindInfo {
    pub image: VkImage,
    pub binds: Vec<SparseImageMemoryBind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindSparseInfo {
    pub wait_semaphores: Vec<VkSemaphore>,
    pub buffer_binds: Vec<SparseBufferMemoryBindInfo>,
    pub image_opaque_binds: Vec<SparseImageOpaqueMemoryBindInfo>,
    pub image_binds: Vec<SparseImageMemoryBindInfo>,
    pub signal_semaphores: Vec<VkSemaphore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentInfo {
    pub wait_semaphores: Vec<VkSemaphore>,
    pub swapchains: Vec<VkSwapchainKHR>,
    pub image_indices: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: i32,
    pub descriptor_count: u32,
    pub stage_flags: u32,
    pub immutable_samplers: Vec<VkSampler>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsPipelineCreateInfo {
    pub stage_modules: Vec<VkShaderModule>,
    pub layout: VkPipelineLayout,
    pub render_pass: VkRenderPass,
    pub subpass: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputePipelineCreateInfo {
    pub stage_module: VkShaderModule,
    pub layout: VkPipelineLayout,
}

// ============================================================================
// Trace commands
// ============================================================================

/// One recorded Vulkan API call. Handle-typed fields carry the handle values
/// recorded in the trace; result handles (for `Create*`/`Allocate*` calls) are
/// the values the driver returned at capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    // ── Device memory ───────────────────────────────────────
    AllocateMemory {
        memory: VkDeviceMemory,
        size: u64,
        memory_type_index: u32,
    },
    FreeMemory {
        memory: VkDeviceMemory,
    },
    MapMemory {
        memory: VkDeviceMemory,
        offset: u64,
        size: u64,
    },
    UnmapMemory {
        memory: VkDeviceMemory,
    },
    FlushMappedMemoryRanges {
        ranges: Vec<MappedMemoryRange>,
    },
    InvalidateMappedMemoryRanges {
        ranges: Vec<MappedMemoryRange>,
    },
    GetDeviceMemoryCommitment {
        memory: VkDeviceMemory,
    },

    // ── Image ───────────────────────────────────────────────
    CreateImage {
        image: VkImage,
        info: ImageCreateInfo,
    },
    DestroyImage {
        image: VkImage,
    },
    GetImageMemoryRequirements {
        image: VkImage,
    },
    GetImageSparseMemoryRequirements {
        image: VkImage,
    },
    GetImageSubresourceLayout {
        image: VkImage,
    },
    BindImageMemory {
        image: VkImage,
        memory: VkDeviceMemory,
        memory_offset: u64,
    },
    CreateImageView {
        view: VkImageView,
        image: VkImage,
        view_type: i32,
        format: i32,
        subresource_range: ImageSubresourceRange,
    },
    DestroyImageView {
        view: VkImageView,
    },

    // ── Buffer ──────────────────────────────────────────────
    CreateBuffer {
        buffer: VkBuffer,
        size: u64,
        usage: u32,
    },
    DestroyBuffer {
        buffer: VkBuffer,
    },
    GetBufferMemoryRequirements {
        buffer: VkBuffer,
    },
    BindBufferMemory {
        buffer: VkBuffer,
        memory: VkDeviceMemory,
        memory_offset: u64,
    },
    CreateBufferView {
        view: VkBufferView,
        buffer: VkBuffer,
        offset: u64,
        range: u64,
    },
    DestroyBufferView {
        view: VkBufferView,
    },

    // ── Sampler ─────────────────────────────────────────────
    CreateSampler {
        sampler: VkSampler,
    },
    DestroySampler {
        sampler: VkSampler,
    },

    // ── Swapchain & presentation ────────────────────────────
    CreateSwapchain {
        swapchain: VkSwapchainKHR,
    },
    CreateSharedSwapchains {
        swapchains: Vec<VkSwapchainKHR>,
    },
    /// `images` is empty for the count-query form of the call.
    GetSwapchainImages {
        swapchain: VkSwapchainKHR,
        images: Vec<VkImage>,
    },
    DestroySwapchain {
        swapchain: VkSwapchainKHR,
    },
    AcquireNextImage {
        swapchain: VkSwapchainKHR,
        semaphore: VkSemaphore,
        fence: VkFence,
        /// Image index written back by the driver at capture time.
        image_index: u32,
    },
    QueuePresent {
        queue: VkQueue,
        present: PresentInfo,
    },

    // ── Query pool ──────────────────────────────────────────
    CreateQueryPool {
        query_pool: VkQueryPool,
        query_count: u32,
    },
    DestroyQueryPool {
        query_pool: VkQueryPool,
    },
    GetQueryPoolResults {
        query_pool: VkQueryPool,
        first_query: u32,
        query_count: u32,
    },

    // ── Descriptor set layout / pool / set ──────────────────
    CreateDescriptorSetLayout {
        layout: VkDescriptorSetLayout,
        bindings: Vec<DescriptorSetLayoutBinding>,
    },
    DestroyDescriptorSetLayout {
        layout: VkDescriptorSetLayout,
    },
    CreateDescriptorPool {
        pool: TraceHandle,
    },
    DestroyDescriptorPool {
        pool: TraceHandle,
    },
    ResetDescriptorPool {
        pool: TraceHandle,
    },
    AllocateDescriptorSets {
        sets: Vec<VkDescriptorSet>,
        layouts: Vec<VkDescriptorSetLayout>,
    },
    FreeDescriptorSets {
        sets: Vec<VkDescriptorSet>,
    },
    UpdateDescriptorSets {
        writes: Vec<WriteDescriptorSet>,
        copies: Vec<CopyDescriptorSet>,
    },

    // ── Pipeline layout / pipeline / cache / shader ─────────
    CreatePipelineLayout {
        layout: VkPipelineLayout,
        set_layouts: Vec<VkDescriptorSetLayout>,
    },
    DestroyPipelineLayout {
        layout: VkPipelineLayout,
    },
    CreateGraphicsPipelines {
        pipeline_cache: VkPipelineCache,
        pipelines: Vec<VkPipeline>,
        infos: Vec<GraphicsPipelineCreateInfo>,
    },
    CreateComputePipelines {
        pipeline_cache: VkPipelineCache,
        pipelines: Vec<VkPipeline>,
        infos: Vec<ComputePipelineCreateInfo>,
    },
    DestroyPipeline {
        pipeline: VkPipeline,
    },
    CreatePipelineCache {
        cache: VkPipelineCache,
    },
    DestroyPipelineCache {
        cache: VkPipelineCache,
    },
    GetPipelineCacheData {
        cache: VkPipelineCache,
    },
    MergePipelineCaches {
        dst_cache: VkPipelineCache,
        src_caches: Vec<VkPipelineCache>,
    },
    CreateShaderModule {
        module: VkShaderModule,
    },
    DestroyShaderModule {
        module: VkShaderModule,
    },

    // ── Render pass / framebuffer ───────────────────────────
    CreateRenderPass {
        render_pass: VkRenderPass,
    },
    DestroyRenderPass {
        render_pass: VkRenderPass,
    },
    GetRenderAreaGranularity {
        render_pass: VkRenderPass,
    },
    CreateFramebuffer {
        framebuffer: VkFramebuffer,
        render_pass: VkRenderPass,
        attachments: Vec<VkImageView>,
        width: u32,
        height: u32,
        layers: u32,
    },
    DestroyFramebuffer {
        framebuffer: VkFramebuffer,
    },

    // ── Command pool / command buffer ───────────────────────
    CreateCommandPool {
        pool: TraceHandle,
    },
    ResetCommandPool {
        pool: TraceHandle,
    },
    TrimCommandPool {
        pool: TraceHandle,
    },
    DestroyCommandPool {
        pool: TraceHandle,
    },
    AllocateCommandBuffers {
        command_buffers: Vec<VkCommandBuffer>,
    },
    FreeCommandBuffers {
        command_buffers: Vec<VkCommandBuffer>,
    },
    ResetCommandBuffer {
        command_buffer: VkCommandBuffer,
    },
    BeginCommandBuffer {
        command_buffer: VkCommandBuffer,
    },
    EndCommandBuffer {
        command_buffer: VkCommandBuffer,
    },

    // ── Recorded transfer commands ──────────────────────────
    CmdCopyImage {
        command_buffer: VkCommandBuffer,
        src_image: VkImage,
        dst_image: VkImage,
        regions: Vec<ImageCopy>,
    },
    CmdCopyBuffer {
        command_buffer: VkCommandBuffer,
        src_buffer: VkBuffer,
        dst_buffer: VkBuffer,
        regions: Vec<BufferCopy>,
    },
    CmdCopyImageToBuffer {
        command_buffer: VkCommandBuffer,
        src_image: VkImage,
        dst_buffer: VkBuffer,
        regions: Vec<BufferImageCopy>,
    },
    CmdCopyBufferToImage {
        command_buffer: VkCommandBuffer,
        src_buffer: VkBuffer,
        dst_image: VkImage,
        regions: Vec<BufferImageCopy>,
    },
    CmdBlitImage {
        command_buffer: VkCommandBuffer,
        src_image: VkImage,
        dst_image: VkImage,
        regions: Vec<ImageBlit>,
    },
    CmdResolveImage {
        command_buffer: VkCommandBuffer,
        src_image: VkImage,
        dst_image: VkImage,
        regions: Vec<ImageCopy>,
    },
    CmdFillBuffer {
        command_buffer: VkCommandBuffer,
        buffer: VkBuffer,
        offset: u64,
        size: u64,
    },
    CmdUpdateBuffer {
        command_buffer: VkCommandBuffer,
        buffer: VkBuffer,
        offset: u64,
        data_size: u64,
    },
    CmdClearColorImage {
        command_buffer: VkCommandBuffer,
        image: VkImage,
        ranges: Vec<ImageSubresourceRange>,
    },
    CmdClearDepthStencilImage {
        command_buffer: VkCommandBuffer,
        image: VkImage,
        ranges: Vec<ImageSubresourceRange>,
    },

    // ── Recorded render-pass commands ───────────────────────
    CmdBeginRenderPass {
        command_buffer: VkCommandBuffer,
        render_pass: VkRenderPass,
        framebuffer: VkFramebuffer,
    },
    CmdNextSubpass {
        command_buffer: VkCommandBuffer,
    },
    CmdEndRenderPass {
        command_buffer: VkCommandBuffer,
    },

    // ── Recorded bind commands ──────────────────────────────
    CmdBindVertexBuffers {
        command_buffer: VkCommandBuffer,
        first_binding: u32,
        buffers: Vec<VkBuffer>,
        offsets: Vec<u64>,
    },
    CmdBindIndexBuffer {
        command_buffer: VkCommandBuffer,
        buffer: VkBuffer,
        offset: u64,
        index_type: i32,
    },
    CmdBindPipeline {
        command_buffer: VkCommandBuffer,
        pipeline_bind_point: i32,
        pipeline: VkPipeline,
    },
    CmdBindDescriptorSets {
        command_buffer: VkCommandBuffer,
        layout: VkPipelineLayout,
        first_set: u32,
        sets: Vec<VkDescriptorSet>,
        dynamic_offsets: Vec<u32>,
    },

    // ── Recorded draws & dispatches ─────────────────────────
    CmdDraw {
        command_buffer: VkCommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    CmdDrawIndexed {
        command_buffer: VkCommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    CmdDrawIndirect {
        command_buffer: VkCommandBuffer,
        buffer: VkBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    },
    CmdDrawIndexedIndirect {
        command_buffer: VkCommandBuffer,
        buffer: VkBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    },
    CmdDispatch {
        command_buffer: VkCommandBuffer,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    },
    CmdDispatchIndirect {
        command_buffer: VkCommandBuffer,
        buffer: VkBuffer,
        offset: u64,
    },

    // ── Recorded dynamic state ──────────────────────────────
    CmdPushConstants {
        command_buffer: VkCommandBuffer,
        layout: VkPipelineLayout,
    },
    CmdSetViewport {
        command_buffer: VkCommandBuffer,
    },
    CmdSetScissor {
        command_buffer: VkCommandBuffer,
    },
    CmdSetLineWidth {
        command_buffer: VkCommandBuffer,
    },
    CmdSetDepthBias {
        command_buffer: VkCommandBuffer,
    },
    CmdSetDepthBounds {
        command_buffer: VkCommandBuffer,
    },
    CmdSetBlendConstants {
        command_buffer: VkCommandBuffer,
    },
    CmdSetStencilCompareMask {
        command_buffer: VkCommandBuffer,
    },
    CmdSetStencilWriteMask {
        command_buffer: VkCommandBuffer,
    },
    CmdSetStencilReference {
        command_buffer: VkCommandBuffer,
    },
    CmdClearAttachments {
        command_buffer: VkCommandBuffer,
        attachments: Vec<ClearAttachment>,
        rects: Vec<ClearRect>,
    },

    // ── Recorded query commands ─────────────────────────────
    CmdResetQueryPool {
        command_buffer: VkCommandBuffer,
        query_pool: VkQueryPool,
        first_query: u32,
        query_count: u32,
    },
    CmdBeginQuery {
        command_buffer: VkCommandBuffer,
        query_pool: VkQueryPool,
        query: u32,
    },
    CmdEndQuery {
        command_buffer: VkCommandBuffer,
        query_pool: VkQueryPool,
        query: u32,
    },
    CmdWriteTimestamp {
        command_buffer: VkCommandBuffer,
        query_pool: VkQueryPool,
        query: u32,
    },
    CmdCopyQueryPoolResults {
        command_buffer: VkCommandBuffer,
        query_pool: VkQueryPool,
        first_query: u32,
        query_count: u32,
        dst_buffer: VkBuffer,
        dst_offset: u64,
        stride: u64,
    },

    // ── Recorded event / barrier commands ───────────────────
    CmdSetEvent {
        command_buffer: VkCommandBuffer,
        event: VkEvent,
    },
    CmdResetEvent {
        command_buffer: VkCommandBuffer,
        event: VkEvent,
    },
    CmdWaitEvents {
        command_buffer: VkCommandBuffer,
        events: Vec<VkEvent>,
        memory_barriers: Vec<MemoryBarrier>,
        buffer_barriers: Vec<BufferMemoryBarrier>,
        image_barriers: Vec<ImageMemoryBarrier>,
    },
    CmdPipelineBarrier {
        command_buffer: VkCommandBuffer,
        memory_barriers: Vec<MemoryBarrier>,
        buffer_barriers: Vec<BufferMemoryBarrier>,
        image_barriers: Vec<ImageMemoryBarrier>,
    },

    // ── Recorded debug markers ──────────────────────────────
    CmdDebugMarkerBegin {
        command_buffer: VkCommandBuffer,
    },
    CmdDebugMarkerEnd {
        command_buffer: VkCommandBuffer,
    },
    CmdDebugMarkerInsert {
        command_buffer: VkCommandBuffer,
    },

    // ── Secondary command buffers ───────────────────────────
    CmdExecuteCommands {
        command_buffer: VkCommandBuffer,
        command_buffers: Vec<VkCommandBuffer>,
    },

    // ── Synchronization primitives ──────────────────────────
    CreateSemaphore {
        semaphore: VkSemaphore,
    },
    DestroySemaphore {
        semaphore: VkSemaphore,
    },
    CreateEvent {
        event: VkEvent,
    },
    DestroyEvent {
        event: VkEvent,
    },
    SetEvent {
        event: VkEvent,
    },
    ResetEvent {
        event: VkEvent,
    },
    GetEventStatus {
        event: VkEvent,
    },
    CreateFence {
        fence: VkFence,
        signaled: bool,
    },
    DestroyFence {
        fence: VkFence,
    },
    ResetFences {
        fences: Vec<VkFence>,
    },
    GetFenceStatus {
        fence: VkFence,
    },
    WaitForFences {
        fences: Vec<VkFence>,
    },

    // ── Queue operations ────────────────────────────────────
    QueueSubmit {
        queue: VkQueue,
        submits: Vec<SubmitInfo>,
        fence: VkFence,
    },
    QueueBindSparse {
        queue: VkQueue,
        bind_infos: Vec<BindSparseInfo>,
    },
    QueueWaitIdle {
        queue: VkQueue,
    },
    DeviceWaitIdle,

    // ── Debug markers (object naming) ───────────────────────
    DebugMarkerSetObjectName {
        object: TraceHandle,
    },
    DebugMarkerSetObjectTag {
        object: TraceHandle,
    },

    // ── Instance-level commands, kept alive ─────────────────
    CreateInstance,
    EnumeratePhysicalDevices,
    CreateDevice,
    GetDeviceQueue {
        queue: VkQueue,
    },
    GetDeviceProcAddr,
    GetInstanceProcAddr,
    CreateSurface {
        surface: TraceHandle,
    },
    DestroySurface {
        surface: TraceHandle,
    },
    GetPhysicalDeviceProperties,
    GetPhysicalDeviceMemoryProperties,
    GetPhysicalDeviceQueueFamilyProperties,
    GetPhysicalDeviceFeatures,
    GetPhysicalDeviceFormatProperties,
    GetPhysicalDeviceSurfaceSupport,
    GetPhysicalDeviceSurfaceCapabilities,
    GetPhysicalDeviceSurfaceFormats,
    GetPhysicalDeviceSurfacePresentModes,

    // ── Enumerations, droppable ─────────────────────────────
    EnumerateInstanceExtensionProperties,
    EnumerateDeviceExtensionProperties,
    EnumerateInstanceLayerProperties,
    EnumerateDeviceLayerProperties,

    /// Any command the analyzer does not understand. Kept alive.
    Unknown {
        name: String,
    },
}
