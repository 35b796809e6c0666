//! The footprint builder: shadow-state owner and per-command dispatcher.
//!
//! `build_footprint` is invoked once per trace command, in trace order. It
//! first lets the collaborator apply the command; on success it stamps a
//! behavior for the command, records deferred behaviors for `Cmd*` calls,
//! and rolls out submitted commands when the collaborator reports execution.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, error, warn};

use vkdce_protocol::commands::{
    BufferMemoryBarrier, Command, ImageMemoryBarrier, SparseImageMemoryBind,
};
use vkdce_protocol::handle::{
    SubCmdIdx, TraceHandle, VkBuffer, VkCommandBuffer, VkDescriptorSet, VkDeviceMemory, VkEvent,
    VkFence, VkImage, VkQueryPool, VkQueue, VkSemaphore, VkSwapchainKHR,
};
use vkdce_protocol::snapshot::ImageState;

use crate::binding::{bound_data, sub_binding_list, BackingData, BindingList, ResBinding, VK_WHOLE_SIZE};
use crate::config::FootprintOptions;
use crate::coverage::{
    blit_fully_cover_image, subresource_layers_fully_cover_image,
    subresource_range_fully_cover_image,
};
use crate::descriptor::DescriptorSetShadow;
use crate::exec::{QueueExecState, QueueSubmitInfo};
use crate::graph::{Behavior, DepTracker, Footprint, MemorySpan, Var, VarId};
use crate::record::{AttachmentViewRecord, CmdBufCommand, FramebufferRecord, RecordedOp};
use crate::state::{
    CommandBufferShadow, EventShadow, FenceShadow, ImageShadow, MappedCoherentMemory,
    QueryPoolShadow, SparseBinding,
};
use crate::trace::MutationContext;

const DRAW_INDIRECT_COMMAND_SIZE: u64 = 4 * 4;
const DRAW_INDEXED_INDIRECT_COMMAND_SIZE: u64 = 5 * 4;
const DISPATCH_INDIRECT_COMMAND_SIZE: u64 = 3 * 4;

/// Builds the footprint for one trace. All state is owned by the instance;
/// commands must be fed strictly in trace order.
pub struct FootprintBuilder {
    pub(crate) tracker: DepTracker,

    // deferred commands per command buffer
    pub(crate) commands: HashMap<VkCommandBuffer, Vec<Rc<CmdBufCommand>>>,

    // coherent memory mappings, snapshotted at map time
    pub(crate) mapped_coherent: HashMap<VkDeviceMemory, MappedCoherentMemory>,

    // per-handle shadow state
    pub(crate) semaphore_signals: HashMap<VkSemaphore, VarId>,
    pub(crate) fences: HashMap<VkFence, FenceShadow>,
    pub(crate) events: HashMap<VkEvent, EventShadow>,
    pub(crate) query_pools: HashMap<VkQueryPool, QueryPoolShadow>,
    pub(crate) command_buffers: HashMap<VkCommandBuffer, CommandBufferShadow>,
    pub(crate) images: HashMap<VkImage, ImageShadow>,
    pub(crate) buffers: HashMap<VkBuffer, BindingList<ResBinding>>,
    pub(crate) descriptor_sets: HashMap<VkDescriptorSet, Rc<RefCell<DescriptorSetShadow>>>,

    // execution state
    pub(crate) execution: HashMap<VkQueue, QueueExecState>,
    pub(crate) submits: HashMap<u64, QueueSubmitInfo>,

    // presentation state
    pub(crate) swapchain_acquired: HashMap<VkSwapchainKHR, Vec<VarId>>,
    pub(crate) swapchain_presented: HashMap<VkSwapchainKHR, Vec<VarId>>,
}

impl FootprintBuilder {
    pub fn new(options: FootprintOptions) -> Self {
        FootprintBuilder {
            tracker: DepTracker::new(options.debug_dependencies),
            commands: HashMap::new(),
            mapped_coherent: HashMap::new(),
            semaphore_signals: HashMap::new(),
            fences: HashMap::new(),
            events: HashMap::new(),
            query_pools: HashMap::new(),
            command_buffers: HashMap::new(),
            images: HashMap::new(),
            buffers: HashMap::new(),
            descriptor_sets: HashMap::new(),
            execution: HashMap::new(),
            submits: HashMap::new(),
            swapchain_acquired: HashMap::new(),
            swapchain_presented: HashMap::new(),
        }
    }

    /// The dependency tracker, for downstream passes that need variable
    /// identities (defining behaviors, forward-paired readers).
    pub fn tracker(&self) -> &DepTracker {
        &self.tracker
    }

    // ── shadow lookups ──────────────────────────────────────

    fn semaphore_signal(&self, semaphore: VkSemaphore) -> Option<VarId> {
        let signal = self.semaphore_signals.get(&semaphore).copied();
        if signal.is_none() {
            error!(semaphore = ?semaphore, "semaphore has no shadow state");
        }
        signal
    }

    fn fence_shadow(&self, fence: VkFence) -> Option<FenceShadow> {
        let shadow = self.fences.get(&fence).copied();
        if shadow.is_none() {
            error!(fence = ?fence, "fence has no shadow state");
        }
        shadow
    }

    fn event_shadow(&self, event: VkEvent) -> Option<EventShadow> {
        let shadow = self.events.get(&event).copied();
        if shadow.is_none() {
            error!(event = ?event, "event has no shadow state");
        }
        shadow
    }

    // ── image & buffer data ─────────────────────────────────

    /// Read the image handle, layout and bindings, returning the backing
    /// data of the whole image (opaque bindings plus sparse blocks). With no
    /// behavior, collects the data without stamping.
    pub(crate) fn get_image_data(
        &mut self,
        mut bh: Option<&mut Behavior>,
        image: VkImage,
    ) -> Vec<Var> {
        if let Some(b) = bh.as_deref_mut() {
            if !self.tracker.read(b, &[Var::Handle(image)]) {
                return Vec::new();
            }
        }
        let Some(shadow) = self.images.get(&image) else {
            return Vec::new();
        };
        let layout = shadow.layout;
        if let Some(b) = bh.as_deref_mut() {
            self.tracker.read(b, &[Var::Id(layout)]);
        }
        let mut data = bound_data(
            shadow.opaque.as_slice(),
            &mut self.tracker,
            bh.as_deref_mut(),
            0,
            VK_WHOLE_SIZE,
        );
        for layers in shadow.sparse.values() {
            for levels in layers.values() {
                for blocks in levels.values() {
                    for block in blocks.values() {
                        if let Some(b) = bh.as_deref_mut() {
                            self.tracker.read(b, &[Var::Id(block.var)]);
                        }
                        data.push(Var::Span(block.backing));
                    }
                }
            }
        }
        data
    }

    /// Read the image handle and its bindings but not the layout; returns
    /// the layout label together with the data.
    pub(crate) fn get_image_layout_and_data(
        &mut self,
        mut bh: Option<&mut Behavior>,
        image: VkImage,
    ) -> (VarId, Vec<Var>) {
        if let Some(b) = bh.as_deref_mut() {
            self.tracker.read(b, &[Var::Handle(image)]);
        }
        let Some(shadow) = self.images.get(&image) else {
            error!(image = ?image, "image has no shadow state");
            return (self.tracker.new_var(), Vec::new());
        };
        let layout = shadow.layout;
        let data = self.get_image_data(bh, image);
        (layout, data)
    }

    pub(crate) fn get_buffer_data(
        &mut self,
        mut bh: Option<&mut Behavior>,
        buffer: VkBuffer,
        offset: u64,
        size: u64,
    ) -> Vec<Var> {
        if let Some(b) = bh.as_deref_mut() {
            self.tracker.read(b, &[Var::Handle(buffer)]);
        }
        let Some(list) = self.buffers.get(&buffer) else {
            return Vec::new();
        };
        if let Some(b) = bh.as_deref_mut() {
            let vars: Vec<Var> = list.as_slice().iter().map(|rb| Var::Id(rb.var)).collect();
            self.tracker.read(b, &vars);
        }
        bound_data(list.as_slice(), &mut self.tracker, bh, offset, size)
    }

    // ── binding updates ─────────────────────────────────────

    fn add_buffer_binding(
        &mut self,
        bh: &mut Behavior,
        buffer: VkBuffer,
        memory: VkDeviceMemory,
        res_offset: u64,
        size: u64,
        mem_offset: u64,
    ) {
        let var = self.tracker.new_var();
        self.tracker.write(bh, &[Var::Id(var)]);
        let binding = ResBinding {
            resource_offset: res_offset,
            bind_size: size,
            backing: BackingData::Span(MemorySpan::new(memory, mem_offset, size)),
            var,
        };
        let list = self.buffers.entry(buffer).or_default();
        if let Err(e) = list.add(&mut self.tracker.vars, binding) {
            error!(buffer = ?buffer, error = %e, "buffer memory binding rejected");
        }
    }

    fn add_opaque_image_binding(
        &mut self,
        bh: &mut Behavior,
        image: VkImage,
        memory: VkDeviceMemory,
        res_offset: u64,
        size: u64,
        mem_offset: u64,
    ) {
        let var = self.tracker.new_var();
        self.tracker.write(bh, &[Var::Id(var)]);
        let binding = ResBinding {
            resource_offset: res_offset,
            bind_size: size,
            backing: BackingData::Span(MemorySpan::new(memory, mem_offset, size)),
            var,
        };
        let Some(shadow) = self.images.get_mut(&image) else {
            error!(image = ?image, "binding memory to image without shadow state");
            return;
        };
        if let Err(e) = shadow.opaque.add(&mut self.tracker.vars, binding) {
            error!(image = ?image, error = %e, "image memory binding rejected");
        }
    }

    fn add_swapchain_image_binding(&mut self, bh: &mut Behavior, image: VkImage) {
        let backing = self.tracker.new_var();
        let var = self.tracker.new_var();
        self.tracker.write(bh, &[Var::Id(var)]);
        let binding = ResBinding {
            resource_offset: 0,
            bind_size: VK_WHOLE_SIZE,
            backing: BackingData::Opaque(backing),
            var,
        };
        let Some(shadow) = self.images.get_mut(&image) else {
            error!(image = ?image, "binding swapchain backing to image without shadow state");
            return;
        };
        if let Err(e) = shadow.opaque.add(&mut self.tracker.vars, binding) {
            error!(image = ?image, error = %e, "swapchain image binding rejected");
        }
    }

    fn add_sparse_image_binding(
        &mut self,
        ctx: &dyn MutationContext,
        bh: &mut Behavior,
        image: VkImage,
        bind: &SparseImageMemoryBind,
    ) {
        let Some(state) = ctx.image(image) else {
            error!(image = ?image, "sparse bind to image without snapshot state");
            return;
        };
        let block_size = state.block_size;
        for (aspect, layer, level, block_index, mem_offset) in sparse_blocks(&state, bind) {
            let var = self.tracker.new_var();
            self.tracker.write(bh, &[Var::Id(var)]);
            let backing = MemorySpan::new(bind.memory, mem_offset, block_size);
            if let Some(shadow) = self.images.get_mut(&image) {
                shadow
                    .sparse
                    .entry(aspect)
                    .or_default()
                    .entry(layer)
                    .or_default()
                    .entry(level)
                    .or_default()
                    .insert(block_index, SparseBinding { var, backing });
            }
        }
    }

    // ── command-buffer recording ────────────────────────────

    /// Record a deferred command on `cb`: reads the buffer handle and its
    /// begin label, writes the command's own variable, and appends it to the
    /// buffer's deferred list.
    pub(crate) fn new_command(
        &mut self,
        bh: &mut Behavior,
        cb: VkCommandBuffer,
        op: RecordedOp,
    ) -> Option<Rc<CmdBufCommand>> {
        self.new_command_in(bh, cb, op, false, Vec::new())
    }

    fn new_command_in(
        &mut self,
        bh: &mut Behavior,
        cb: VkCommandBuffer,
        op: RecordedOp,
        is_execute_commands: bool,
        secondary: Vec<VkCommandBuffer>,
    ) -> Option<Rc<CmdBufCommand>> {
        self.tracker.read(bh, &[Var::Handle(cb)]);
        let Some(shadow) = self.command_buffers.get(&cb).copied() else {
            debug!(command_buffer = ?cb, "recording into unknown command buffer");
            return None;
        };
        self.tracker.read(bh, &[Var::Id(shadow.begin)]);
        let var = self.tracker.new_var();
        self.tracker.write(bh, &[Var::Id(var)]);
        let cmd = Rc::new(CmdBufCommand {
            var,
            op,
            is_execute_commands,
            secondary,
        });
        self.commands.entry(cb).or_default().push(cmd.clone());
        Some(cmd)
    }

    fn record_reads_writes_modifies(
        &mut self,
        bh: &mut Behavior,
        cb: VkCommandBuffer,
        reads: Vec<Var>,
        writes: Vec<Var>,
        modifies: Vec<Var>,
    ) {
        self.new_command(
            bh,
            cb,
            RecordedOp::ReadsWritesModifies {
                reads,
                writes,
                modifies,
            },
        );
    }

    fn record_modifying_dynamic_state(&mut self, bh: &mut Behavior, cb: VkCommandBuffer) {
        self.new_command(bh, cb, RecordedOp::ModifyDynamicState);
    }

    fn keep_submitted_command_alive(&mut self, bh: &mut Behavior, cb: VkCommandBuffer) {
        self.new_command(bh, cb, RecordedOp::KeepAlive);
    }

    /// Record a barrier. A global memory barrier touches every image and
    /// buffer backing datum; otherwise only the ranges the per-resource
    /// barriers name.
    fn record_barriers(
        &mut self,
        bh: &mut Behavior,
        cb: VkCommandBuffer,
        has_global_barrier: bool,
        buffer_barriers: &[BufferMemoryBarrier],
        image_barriers: &[ImageMemoryBarrier],
        attached_reads: Vec<Var>,
    ) {
        let mut touched = Vec::new();
        if has_global_barrier {
            let mut image_handles: Vec<VkImage> = self.images.keys().copied().collect();
            image_handles.sort();
            for image in image_handles {
                touched.extend(self.get_image_data(Some(bh), image));
            }
            let mut buffer_handles: Vec<VkBuffer> = self.buffers.keys().copied().collect();
            buffer_handles.sort();
            for buffer in buffer_handles {
                touched.extend(self.get_buffer_data(Some(bh), buffer, 0, VK_WHOLE_SIZE));
            }
        } else {
            for barrier in buffer_barriers {
                touched.extend(self.get_buffer_data(
                    Some(bh),
                    barrier.buffer,
                    barrier.offset,
                    barrier.size,
                ));
            }
            for barrier in image_barriers {
                let (layout, data) = self.get_image_layout_and_data(Some(bh), barrier.image);
                touched.push(Var::Id(layout));
                touched.extend(data);
            }
        }
        self.new_command(
            bh,
            cb,
            RecordedOp::Barriers {
                touched,
                attached_reads,
            },
        );
    }

    // ── coherent memory observation ─────────────────────────

    /// Intersect the collaborator's read observations with the mapped
    /// coherent memories; any overlap is a host write to the corresponding
    /// device memory span. A behavior carrying such a write must stay alive
    /// because observed pages can be shared with later submissions.
    fn write_coherent_memory_data(&mut self, ctx: &dyn MutationContext, bh: &mut Behavior) {
        let observations = ctx.read_observations();
        if observations.is_empty() {
            return;
        }
        let mut mapped: Vec<(VkDeviceMemory, MappedCoherentMemory)> = self
            .mapped_coherent
            .iter()
            .map(|(&m, &info)| (m, info))
            .collect();
        mapped.sort_by_key(|(m, _)| *m);
        for observation in &observations {
            for (memory, mapping) in &mapped {
                if observation.overlaps(mapping.address, mapping.size) {
                    bh.alive = true;
                    let start = observation.base.max(mapping.address);
                    let end = observation.end().min(mapping.address + mapping.size);
                    let offset = mapping.offset + (start - mapping.address);
                    let span = MemorySpan::new(*memory, offset, end - start);
                    self.tracker.write(bh, &[Var::Span(span)]);
                }
            }
        }
    }

    // ── the dispatcher ──────────────────────────────────────

    /// Incrementally build the footprint with one more command.
    pub fn build_footprint(
        &mut self,
        ctx: &mut dyn MutationContext,
        ft: &mut Footprint,
        id: u64,
        cmd: &Command,
    ) {
        let outcome = match ctx.mutate(id, cmd) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(command = id, error = %e, "mutation failed, skipping command");
                return;
            }
        };

        let mut bh = Behavior::new(SubCmdIdx::new(vec![id]));

        match cmd {
            // ── Device memory ───────────────────────────────
            Command::AllocateMemory { memory, .. } => {
                self.tracker.write(&mut bh, &[Var::Handle(*memory)]);
            }
            Command::FreeMemory { memory } => {
                self.tracker.read(&mut bh, &[Var::Handle(*memory)]);
                bh.alive = true;
            }
            Command::MapMemory { memory, .. } => {
                self.tracker.modify(&mut bh, &[Var::Handle(*memory)]);
                if let Some(state) = ctx.device_memory(*memory) {
                    if state.coherent {
                        self.mapped_coherent.insert(
                            *memory,
                            MappedCoherentMemory {
                                offset: state.mapped_offset,
                                size: state.mapped_size,
                                address: state.mapped_address,
                            },
                        );
                    }
                }
                bh.alive = true;
            }
            Command::UnmapMemory { memory } => {
                self.tracker.modify(&mut bh, &[Var::Handle(*memory)]);
                self.write_coherent_memory_data(ctx, &mut bh);
                self.mapped_coherent.remove(memory);
                bh.alive = true;
            }
            Command::FlushMappedMemoryRanges { ranges } => {
                let mut coherent_done = false;
                for range in ranges {
                    self.tracker.read(&mut bh, &[Var::Handle(range.memory)]);
                    let Some(state) = ctx.device_memory(range.memory) else {
                        continue;
                    };
                    if state.coherent {
                        if !coherent_done {
                            self.write_coherent_memory_data(ctx, &mut bh);
                            coherent_done = true;
                        }
                        continue;
                    }
                    let size = if range.size == VK_WHOLE_SIZE {
                        state.size.saturating_sub(range.offset)
                    } else {
                        range.size
                    };
                    let span = MemorySpan::new(range.memory, range.offset, size);
                    self.tracker.write(&mut bh, &[Var::Span(span)]);
                }
            }
            Command::InvalidateMappedMemoryRanges { ranges } => {
                for range in ranges {
                    self.tracker.read(&mut bh, &[Var::Handle(range.memory)]);
                    let size = if range.size == VK_WHOLE_SIZE {
                        ctx.device_memory(range.memory)
                            .map(|m| m.size.saturating_sub(range.offset))
                            .unwrap_or(range.size)
                    } else {
                        range.size
                    };
                    let span = MemorySpan::new(range.memory, range.offset, size);
                    self.tracker.read(&mut bh, &[Var::Span(span)]);
                }
            }
            Command::GetDeviceMemoryCommitment { memory } => {
                self.tracker.read(&mut bh, &[Var::Handle(*memory)]);
            }

            // ── Image ───────────────────────────────────────
            Command::CreateImage { image, .. } => {
                self.tracker.write(&mut bh, &[Var::Handle(*image)]);
                let shadow = ImageShadow::new(&mut self.tracker, &mut bh);
                self.images.insert(*image, shadow);
            }
            Command::DestroyImage { image } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*image)]) {
                    self.images.remove(image);
                }
                bh.alive = true;
            }
            Command::GetImageMemoryRequirements { image }
            | Command::GetImageSparseMemoryRequirements { image } => {
                self.tracker.modify(&mut bh, &[Var::Handle(*image)]);
            }
            Command::GetImageSubresourceLayout { image } => {
                self.tracker.read(&mut bh, &[Var::Handle(*image)]);
            }
            Command::BindImageMemory {
                image,
                memory,
                memory_offset,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*image)]);
                self.tracker.read(&mut bh, &[Var::Handle(*memory)]);
                let size = match ctx.image(*image) {
                    Some(state) => state.memory_size,
                    None => {
                        error!(image = ?image, "cannot infer size of image to bind");
                        bh.aborted = true;
                        0
                    }
                };
                self.add_opaque_image_binding(&mut bh, *image, *memory, 0, size, *memory_offset);
            }
            Command::CreateImageView { view, image, .. } => {
                self.tracker.write(&mut bh, &[Var::Handle(*view)]);
                let data = self.get_image_data(Some(&mut bh), *image);
                self.tracker.read(&mut bh, &data);
            }
            Command::DestroyImageView { view } => {
                self.tracker.read(&mut bh, &[Var::Handle(*view)]);
                bh.alive = true;
            }

            // ── Buffer ──────────────────────────────────────
            Command::CreateBuffer { buffer, .. } => {
                self.tracker.write(&mut bh, &[Var::Handle(*buffer)]);
            }
            Command::DestroyBuffer { buffer } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*buffer)]) {
                    self.buffers.remove(buffer);
                }
                bh.alive = true;
            }
            Command::GetBufferMemoryRequirements { buffer } => {
                self.tracker.modify(&mut bh, &[Var::Handle(*buffer)]);
            }
            Command::BindBufferMemory {
                buffer,
                memory,
                memory_offset,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*buffer)]);
                self.tracker.read(&mut bh, &[Var::Handle(*memory)]);
                let size = match ctx.buffer(*buffer) {
                    Some(state) => state.size,
                    None => {
                        error!(buffer = ?buffer, "cannot find size of buffer to bind");
                        0
                    }
                };
                self.add_buffer_binding(&mut bh, *buffer, *memory, 0, size, *memory_offset);
            }
            Command::CreateBufferView {
                view,
                buffer,
                offset,
                range,
            } => {
                self.tracker.write(&mut bh, &[Var::Handle(*view)]);
                let data = self.get_buffer_data(Some(&mut bh), *buffer, *offset, *range);
                self.tracker.read(&mut bh, &data);
            }
            Command::DestroyBufferView { view } => {
                self.tracker.read(&mut bh, &[Var::Handle(*view)]);
                bh.alive = true;
            }

            // ── Sampler ─────────────────────────────────────
            Command::CreateSampler { sampler } => {
                self.tracker.write(&mut bh, &[Var::Handle(*sampler)]);
            }
            Command::DestroySampler { sampler } => {
                self.tracker.read(&mut bh, &[Var::Handle(*sampler)]);
                bh.alive = true;
            }

            // ── Swapchain ───────────────────────────────────
            Command::CreateSwapchain { swapchain } => {
                self.tracker.write(&mut bh, &[Var::Handle(*swapchain)]);
            }
            Command::CreateSharedSwapchains { swapchains } => {
                for swapchain in swapchains {
                    self.tracker.write(&mut bh, &[Var::Handle(*swapchain)]);
                }
            }
            Command::GetSwapchainImages { swapchain, images } => {
                self.tracker.read(&mut bh, &[Var::Handle(*swapchain)]);
                if images.is_empty() {
                    // count query form
                    self.tracker.modify(&mut bh, &[Var::Handle(*swapchain)]);
                } else {
                    for image in images {
                        self.tracker.write(&mut bh, &[Var::Handle(*image)]);
                        let shadow = ImageShadow::new(&mut self.tracker, &mut bh);
                        self.images.insert(*image, shadow);
                        self.add_swapchain_image_binding(&mut bh, *image);
                        let acquired = self.tracker.new_var();
                        let presented = self.tracker.new_var();
                        self.swapchain_acquired
                            .entry(*swapchain)
                            .or_default()
                            .push(acquired);
                        self.swapchain_presented
                            .entry(*swapchain)
                            .or_default()
                            .push(presented);
                    }
                }
            }
            Command::DestroySwapchain { swapchain } => {
                self.tracker.read(&mut bh, &[Var::Handle(*swapchain)]);
                self.swapchain_acquired.remove(swapchain);
                self.swapchain_presented.remove(swapchain);
                bh.alive = true;
            }

            // ── Presentation engine ─────────────────────────
            Command::AcquireNextImage {
                swapchain,
                semaphore,
                fence,
                image_index,
            } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*semaphore)]) {
                    if let Some(signal) = self.semaphore_signal(*semaphore) {
                        self.tracker.write(&mut bh, &[Var::Id(signal)]);
                    }
                }
                if self.tracker.read(&mut bh, &[Var::Handle(*fence)]) {
                    if let Some(shadow) = self.fence_shadow(*fence) {
                        self.tracker.write(&mut bh, &[Var::Id(shadow.signal)]);
                    }
                }
                self.tracker.read(&mut bh, &[Var::Handle(*swapchain)]);
                let image = ctx
                    .swapchain(*swapchain)
                    .and_then(|s| s.images.get(*image_index as usize).copied());
                if let Some(image) = image {
                    if self.tracker.read(&mut bh, &[Var::Handle(image)]) {
                        let (layout, data) = self.get_image_layout_and_data(Some(&mut bh), image);
                        self.tracker.write(&mut bh, &[Var::Id(layout)]);
                        self.tracker.write(&mut bh, &data);
                    }
                }
                let acquired = self
                    .swapchain_acquired
                    .get(swapchain)
                    .and_then(|labels| labels.get(*image_index as usize))
                    .copied();
                if let Some(acquired) = acquired {
                    self.tracker.write(&mut bh, &[Var::Id(acquired)]);
                }
                let presented = self
                    .swapchain_presented
                    .get(swapchain)
                    .and_then(|labels| labels.get(*image_index as usize))
                    .copied();
                if let Some(presented) = presented {
                    self.tracker.read(&mut bh, &[Var::Id(presented)]);
                }
            }
            Command::QueuePresent { queue, present } => {
                self.tracker.read(&mut bh, &[Var::Handle(*queue)]);
                for semaphore in &present.wait_semaphores {
                    if self.tracker.read(&mut bh, &[Var::Handle(*semaphore)]) {
                        if let Some(signal) = self.semaphore_signal(*semaphore) {
                            self.tracker.read(&mut bh, &[Var::Id(signal)]);
                        }
                    }
                }
                for (i, swapchain) in present.swapchains.iter().enumerate() {
                    self.tracker.read(&mut bh, &[Var::Handle(*swapchain)]);
                    let Some(&image_index) = present.image_indices.get(i) else {
                        continue;
                    };
                    let image = ctx
                        .swapchain(*swapchain)
                        .and_then(|s| s.images.get(image_index as usize).copied());
                    let Some(image) = image else {
                        continue;
                    };
                    let (layout, data) = self.get_image_layout_and_data(Some(&mut bh), image);
                    self.tracker.read(&mut bh, &[Var::Id(layout)]);
                    self.tracker.read(&mut bh, &data);

                    // One extra always-alive behavior per presented image
                    // holds the acquire/present pair live, so pruning can
                    // never stall the presentation engine.
                    let mut extra = Behavior::new(SubCmdIdx::new(vec![id]));
                    for semaphore in &present.wait_semaphores {
                        self.tracker.read(&mut extra, &[Var::Handle(*queue)]);
                        if self.tracker.read(&mut extra, &[Var::Handle(*semaphore)]) {
                            if let Some(signal) = self.semaphore_signal(*semaphore) {
                                self.tracker.read(&mut extra, &[Var::Id(signal)]);
                            }
                        }
                    }
                    let acquired = self
                        .swapchain_acquired
                        .get(swapchain)
                        .and_then(|labels| labels.get(image_index as usize))
                        .copied();
                    if let Some(acquired) = acquired {
                        self.tracker.read(&mut extra, &[Var::Id(acquired)]);
                    }
                    let presented = self
                        .swapchain_presented
                        .get(swapchain)
                        .and_then(|labels| labels.get(image_index as usize))
                        .copied();
                    if let Some(presented) = presented {
                        self.tracker.write(&mut extra, &[Var::Id(presented)]);
                    }
                    extra.alive = true;
                    ft.add_behavior(&mut self.tracker, extra);
                }
            }

            // ── Query pool ──────────────────────────────────
            Command::CreateQueryPool {
                query_pool,
                query_count,
            } => {
                self.tracker.write(&mut bh, &[Var::Handle(*query_pool)]);
                let pool = QueryPoolShadow::new(&mut self.tracker, *query_count);
                self.query_pools.insert(*query_pool, pool);
            }
            Command::DestroyQueryPool { query_pool } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*query_pool)]) {
                    self.query_pools.remove(query_pool);
                }
                bh.alive = true;
            }
            Command::GetQueryPoolResults {
                query_pool,
                first_query,
                query_count,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*query_pool)]);
                let mut results = Vec::new();
                if let Some(pool) = self.query_pools.get(query_pool) {
                    for i in 0..*query_count as usize {
                        if let Some(query) = pool.queries.get(*first_query as usize + i) {
                            results.push(Var::Id(query.result));
                        }
                    }
                }
                self.tracker.read(&mut bh, &results);
            }

            // ── Descriptor set layout / pool / set ──────────
            Command::CreateDescriptorSetLayout { layout, bindings } => {
                self.tracker.write(&mut bh, &[Var::Handle(*layout)]);
                for binding in bindings {
                    for sampler in &binding.immutable_samplers {
                        self.tracker.read(&mut bh, &[Var::Handle(*sampler)]);
                    }
                }
            }
            Command::DestroyDescriptorSetLayout { layout } => {
                self.tracker.read(&mut bh, &[Var::Handle(*layout)]);
                bh.alive = true;
            }
            Command::AllocateDescriptorSets { sets, layouts } => {
                for (i, set) in sets.iter().enumerate() {
                    let Some(layout) = layouts.get(i) else {
                        break;
                    };
                    self.tracker.read(&mut bh, &[Var::Handle(*layout)]);
                    self.tracker.write(&mut bh, &[Var::Handle(*set)]);
                    let shadow = Rc::new(RefCell::new(DescriptorSetShadow::new()));
                    if let Some(layout_state) = ctx.descriptor_set_layout(*layout) {
                        let mut inner = shadow.borrow_mut();
                        for binding in &layout_state.bindings {
                            for _ in 0..binding.descriptor_count {
                                inner.reserve(binding.binding as u64);
                            }
                        }
                    }
                    self.descriptor_sets.insert(*set, shadow);
                }
            }
            Command::UpdateDescriptorSets { writes, copies } => {
                for write in writes {
                    self.tracker.read(&mut bh, &[Var::Handle(write.dst_set)]);
                    let Some(set) = self.descriptor_sets.get(&write.dst_set).cloned() else {
                        error!(set = ?write.dst_set, "descriptor write to unknown set");
                        continue;
                    };
                    self.write_descriptors(ctx, &mut bh, &set, write);
                }
                for copy in copies {
                    self.tracker.read(&mut bh, &[Var::Handle(copy.src_set)]);
                    self.tracker.read(&mut bh, &[Var::Handle(copy.dst_set)]);
                    let (Some(dst), Some(src)) = (
                        self.descriptor_sets.get(&copy.dst_set).cloned(),
                        self.descriptor_sets.get(&copy.src_set).cloned(),
                    ) else {
                        error!("descriptor copy between unknown sets");
                        continue;
                    };
                    self.copy_descriptors(&mut bh, &dst, &src, copy);
                }
            }
            Command::FreeDescriptorSets { sets } => {
                for set in sets {
                    self.tracker.read(&mut bh, &[Var::Handle(*set)]);
                    self.descriptor_sets.remove(set);
                }
                bh.alive = true;
            }

            // ── Pipelines ───────────────────────────────────
            Command::CreatePipelineLayout {
                layout,
                set_layouts,
            } => {
                self.tracker.write(&mut bh, &[Var::Handle(*layout)]);
                for set_layout in set_layouts {
                    self.tracker.read(&mut bh, &[Var::Handle(*set_layout)]);
                }
            }
            Command::DestroyPipelineLayout { layout } => {
                self.tracker.read(&mut bh, &[Var::Handle(*layout)]);
                bh.alive = true;
            }
            Command::CreateGraphicsPipelines {
                pipeline_cache,
                pipelines,
                infos,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*pipeline_cache)]);
                for info in infos {
                    for module in &info.stage_modules {
                        self.tracker.read(&mut bh, &[Var::Handle(*module)]);
                    }
                    self.tracker.read(&mut bh, &[Var::Handle(info.layout)]);
                    self.tracker.read(&mut bh, &[Var::Handle(info.render_pass)]);
                }
                for pipeline in pipelines {
                    self.tracker.write(&mut bh, &[Var::Handle(*pipeline)]);
                }
            }
            Command::CreateComputePipelines {
                pipeline_cache,
                pipelines,
                infos,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*pipeline_cache)]);
                for info in infos {
                    self.tracker.read(&mut bh, &[Var::Handle(info.stage_module)]);
                    self.tracker.read(&mut bh, &[Var::Handle(info.layout)]);
                }
                for pipeline in pipelines {
                    self.tracker.write(&mut bh, &[Var::Handle(*pipeline)]);
                }
            }
            Command::DestroyPipeline { pipeline } => {
                self.tracker.read(&mut bh, &[Var::Handle(*pipeline)]);
                bh.alive = true;
            }
            Command::CreatePipelineCache { cache } => {
                self.tracker.write(&mut bh, &[Var::Handle(*cache)]);
            }
            Command::DestroyPipelineCache { cache } => {
                self.tracker.read(&mut bh, &[Var::Handle(*cache)]);
                bh.alive = true;
            }
            Command::GetPipelineCacheData { cache } => {
                self.tracker.read(&mut bh, &[Var::Handle(*cache)]);
            }
            Command::MergePipelineCaches {
                dst_cache,
                src_caches,
            } => {
                self.tracker.modify(&mut bh, &[Var::Handle(*dst_cache)]);
                for src in src_caches {
                    self.tracker.read(&mut bh, &[Var::Handle(*src)]);
                }
            }
            Command::CreateShaderModule { module } => {
                self.tracker.write(&mut bh, &[Var::Handle(*module)]);
            }
            Command::DestroyShaderModule { module } => {
                self.tracker.read(&mut bh, &[Var::Handle(*module)]);
                bh.alive = true;
            }

            // ── Render pass / framebuffer ───────────────────
            Command::CreateRenderPass { render_pass } => {
                self.tracker.write(&mut bh, &[Var::Handle(*render_pass)]);
            }
            Command::DestroyRenderPass { render_pass } => {
                self.tracker.read(&mut bh, &[Var::Handle(*render_pass)]);
                bh.alive = true;
            }
            Command::GetRenderAreaGranularity { render_pass } => {
                self.tracker.read(&mut bh, &[Var::Handle(*render_pass)]);
            }
            Command::CreateFramebuffer {
                framebuffer,
                render_pass,
                attachments,
                ..
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*render_pass)]);
                for attachment in attachments {
                    self.tracker.read(&mut bh, &[Var::Handle(*attachment)]);
                }
                self.tracker.write(&mut bh, &[Var::Handle(*framebuffer)]);
            }
            Command::DestroyFramebuffer { framebuffer } => {
                self.tracker.read(&mut bh, &[Var::Handle(*framebuffer)]);
                bh.alive = true;
            }

            // ── Debug marker object naming, always kept ─────
            Command::DebugMarkerSetObjectName { object }
            | Command::DebugMarkerSetObjectTag { object } => {
                self.tracker.read(&mut bh, &[Var::Handle(*object)]);
                bh.alive = true;
            }

            // ── Command buffers ─────────────────────────────
            Command::AllocateCommandBuffers { command_buffers } => {
                for cb in command_buffers {
                    self.tracker.write(&mut bh, &[Var::Handle(*cb)]);
                    let shadow = CommandBufferShadow::new(&mut self.tracker);
                    self.command_buffers.insert(*cb, shadow);
                }
            }
            Command::ResetCommandBuffer { command_buffer } => {
                self.tracker.read(&mut bh, &[Var::Handle(*command_buffer)]);
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker
                        .write(&mut bh, &[Var::Id(shadow.begin), Var::Id(shadow.end)]);
                    self.commands.insert(*command_buffer, Vec::new());
                }
            }
            Command::FreeCommandBuffers { command_buffers } => {
                for cb in command_buffers {
                    if let Some(shadow) = self.command_buffers.get(cb).copied() {
                        if self.tracker.read(&mut bh, &[Var::Handle(*cb)]) {
                            self.tracker
                                .write(&mut bh, &[Var::Id(shadow.begin), Var::Id(shadow.end)]);
                            self.command_buffers.remove(cb);
                            self.commands.remove(cb);
                        }
                    }
                }
                bh.alive = true;
            }
            Command::BeginCommandBuffer { command_buffer } => {
                self.tracker.read(&mut bh, &[Var::Handle(*command_buffer)]);
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker.write(&mut bh, &[Var::Id(shadow.begin)]);
                    self.commands.insert(*command_buffer, Vec::new());
                }
            }
            Command::EndCommandBuffer { command_buffer } => {
                self.tracker.read(&mut bh, &[Var::Handle(*command_buffer)]);
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker.read(&mut bh, &[Var::Id(shadow.begin)]);
                    self.tracker.write(&mut bh, &[Var::Id(shadow.end)]);
                }
            }

            // ── Copies, blits, clears, fills, updates ───────
            Command::CmdCopyImage {
                command_buffer,
                src_image,
                dst_image,
                regions,
            } => {
                let dst = self.get_image_data(Some(&mut bh), *dst_image);
                let src = self.get_image_data(Some(&mut bh), *src_image);
                let overwritten = match ctx.image(*dst_image) {
                    Some(state) => regions.iter().any(|r| {
                        subresource_layers_fully_cover_image(
                            &state,
                            &r.dst_subresource,
                            &r.dst_offset,
                            &r.extent,
                        )
                    }),
                    None => false,
                };
                if overwritten {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, dst, Vec::new());
                } else {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, Vec::new(), dst);
                }
            }
            Command::CmdCopyBuffer {
                command_buffer,
                src_buffer,
                dst_buffer,
                regions,
            } => {
                let mut src = Vec::new();
                let mut dst = Vec::new();
                for region in regions {
                    src.extend(self.get_buffer_data(
                        Some(&mut bh),
                        *src_buffer,
                        region.src_offset,
                        region.size,
                    ));
                    dst.extend(self.get_buffer_data(
                        Some(&mut bh),
                        *dst_buffer,
                        region.dst_offset,
                        region.size,
                    ));
                }
                self.record_reads_writes_modifies(&mut bh, *command_buffer, src, dst, Vec::new());
            }
            Command::CmdCopyImageToBuffer {
                command_buffer,
                src_image,
                dst_buffer,
                ..
            } => {
                // TODO: narrow the modified range to the written regions.
                let dst = self.get_buffer_data(Some(&mut bh), *dst_buffer, 0, VK_WHOLE_SIZE);
                let src = self.get_image_data(Some(&mut bh), *src_image);
                self.record_reads_writes_modifies(&mut bh, *command_buffer, src, Vec::new(), dst);
            }
            Command::CmdCopyBufferToImage {
                command_buffer,
                src_buffer,
                dst_image,
                regions,
            } => {
                let src = self.get_buffer_data(Some(&mut bh), *src_buffer, 0, VK_WHOLE_SIZE);
                let dst = self.get_image_data(Some(&mut bh), *dst_image);
                let overwritten = match ctx.image(*dst_image) {
                    Some(state) => regions.iter().any(|r| {
                        subresource_layers_fully_cover_image(
                            &state,
                            &r.image_subresource,
                            &r.image_offset,
                            &r.image_extent,
                        )
                    }),
                    None => false,
                };
                if overwritten {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, dst, Vec::new());
                } else {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, Vec::new(), dst);
                }
            }
            Command::CmdBlitImage {
                command_buffer,
                src_image,
                dst_image,
                regions,
            } => {
                let src = self.get_image_data(Some(&mut bh), *src_image);
                let dst = self.get_image_data(Some(&mut bh), *dst_image);
                let overwritten = match ctx.image(*dst_image) {
                    Some(state) => regions.iter().any(|r| {
                        blit_fully_cover_image(
                            &state,
                            &r.dst_subresource,
                            &r.dst_offsets[0],
                            &r.dst_offsets[1],
                        )
                    }),
                    None => false,
                };
                if overwritten {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, dst, Vec::new());
                } else {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, Vec::new(), dst);
                }
            }
            Command::CmdResolveImage {
                command_buffer,
                src_image,
                dst_image,
                regions,
            } => {
                let src = self.get_image_data(Some(&mut bh), *src_image);
                let dst = self.get_image_data(Some(&mut bh), *dst_image);
                let overwritten = match ctx.image(*dst_image) {
                    Some(state) => regions.iter().any(|r| {
                        subresource_layers_fully_cover_image(
                            &state,
                            &r.dst_subresource,
                            &r.dst_offset,
                            &r.extent,
                        )
                    }),
                    None => false,
                };
                if overwritten {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, dst, Vec::new());
                } else {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, src, Vec::new(), dst);
                }
            }
            Command::CmdFillBuffer {
                command_buffer,
                buffer,
                offset,
                size,
            } => {
                let dst = self.get_buffer_data(Some(&mut bh), *buffer, *offset, *size);
                self.record_reads_writes_modifies(&mut bh, *command_buffer, Vec::new(), dst, Vec::new());
            }
            Command::CmdUpdateBuffer {
                command_buffer,
                buffer,
                offset,
                data_size,
            } => {
                let dst = self.get_buffer_data(Some(&mut bh), *buffer, *offset, *data_size);
                self.record_reads_writes_modifies(&mut bh, *command_buffer, Vec::new(), dst, Vec::new());
            }
            Command::CmdClearColorImage {
                command_buffer,
                image,
                ranges,
            }
            | Command::CmdClearDepthStencilImage {
                command_buffer,
                image,
                ranges,
            } => {
                let dst = self.get_image_data(Some(&mut bh), *image);
                let overwritten = match ctx.image(*image) {
                    Some(state) => ranges
                        .iter()
                        .any(|r| subresource_range_fully_cover_image(&state, r)),
                    None => false,
                };
                if overwritten {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, Vec::new(), dst, Vec::new());
                } else {
                    self.record_reads_writes_modifies(&mut bh, *command_buffer, Vec::new(), Vec::new(), dst);
                }
            }

            // ── Render pass progression ─────────────────────
            Command::CmdBeginRenderPass {
                command_buffer,
                render_pass,
                framebuffer,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*render_pass)]);
                self.tracker.read(&mut bh, &[Var::Handle(*framebuffer)]);
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker
                        .write(&mut bh, &[Var::Id(shadow.render_pass_begin)]);
                }
                let rp_state = ctx.render_pass(*render_pass);
                let fb_state = ctx.framebuffer(*framebuffer);
                if let (Some(rp_state), Some(fb_state)) = (rp_state, fb_state) {
                    self.tracker
                        .read(&mut bh, &[Var::Handle(fb_state.render_pass)]);
                    let mut attachments = Vec::with_capacity(fb_state.attachments.len());
                    for view in &fb_state.attachments {
                        let view_state = ctx.image_view(*view);
                        if self.tracker.read(&mut bh, &[Var::Handle(*view)]) {
                            if let Some(view_state) = &view_state {
                                self.tracker
                                    .read(&mut bh, &[Var::Handle(view_state.image)]);
                            }
                        }
                        let image_state =
                            view_state.and_then(|v| ctx.image(v.image));
                        attachments.push(attachment_view_record(
                            *view,
                            view_state,
                            image_state.as_ref(),
                        ));
                    }
                    let record = FramebufferRecord {
                        handle: *framebuffer,
                        width: fb_state.width,
                        height: fb_state.height,
                        layers: fb_state.layers,
                        attachments,
                    };
                    self.new_command(
                        &mut bh,
                        *command_buffer,
                        RecordedOp::BeginRenderPass {
                            render_pass: *render_pass,
                            render_pass_state: Box::new(rp_state),
                            framebuffer: record,
                        },
                    );
                } else {
                    error!(render_pass = ?render_pass, framebuffer = ?framebuffer,
                        "render pass begin without snapshot state");
                }
            }
            Command::CmdNextSubpass { command_buffer } => {
                self.new_command(&mut bh, *command_buffer, RecordedOp::NextSubpass);
            }
            Command::CmdEndRenderPass { command_buffer } => {
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker
                        .read(&mut bh, &[Var::Id(shadow.render_pass_begin)]);
                    self.new_command(&mut bh, *command_buffer, RecordedOp::EndRenderPass);
                }
            }

            // ── Bind commands ───────────────────────────────
            Command::CmdBindVertexBuffers {
                command_buffer,
                first_binding,
                buffers,
                offsets,
            } => {
                let mut bindings = Vec::with_capacity(buffers.len());
                for (i, buffer) in buffers.iter().enumerate() {
                    let offset = offsets.get(i).copied().unwrap_or(0);
                    let subs = match self.buffers.get(buffer) {
                        Some(list) => sub_binding_list(
                            list.as_slice(),
                            &mut self.tracker,
                            Some(&mut bh),
                            offset,
                            VK_WHOLE_SIZE,
                        ),
                        None => Vec::new(),
                    };
                    bindings.push(Rc::new(subs));
                }
                self.new_command(
                    &mut bh,
                    *command_buffer,
                    RecordedOp::BindVertexBuffers {
                        first_binding: *first_binding,
                        bindings,
                    },
                );
            }
            Command::CmdBindIndexBuffer {
                command_buffer,
                buffer,
                offset,
                index_type,
            } => {
                let subs = match self.buffers.get(buffer) {
                    Some(list) => sub_binding_list(
                        list.as_slice(),
                        &mut self.tracker,
                        Some(&mut bh),
                        *offset,
                        VK_WHOLE_SIZE,
                    ),
                    None => Vec::new(),
                };
                self.new_command(
                    &mut bh,
                    *command_buffer,
                    RecordedOp::BindIndexBuffer {
                        bindings: Rc::new(subs),
                        index_type: *index_type,
                    },
                );
            }
            Command::CmdBindPipeline {
                command_buffer,
                pipeline,
                ..
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*pipeline)]);
                self.new_command(
                    &mut bh,
                    *command_buffer,
                    RecordedOp::BindPipeline {
                        pipeline: *pipeline,
                    },
                );
            }
            Command::CmdBindDescriptorSets {
                command_buffer,
                layout,
                first_set,
                sets,
                dynamic_offsets,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*layout)]);
                let mut captured = Vec::with_capacity(sets.len());
                for set in sets {
                    self.tracker.read(&mut bh, &[Var::Handle(*set)]);
                    captured.push(self.descriptor_sets.get(set).cloned());
                }
                self.new_command(
                    &mut bh,
                    *command_buffer,
                    RecordedOp::BindDescriptorSets {
                        first_set: *first_set,
                        sets: captured,
                        dynamic_offsets: dynamic_offsets.clone(),
                    },
                );
            }

            // ── Draws & dispatches ──────────────────────────
            Command::CmdDraw { command_buffer, .. } => {
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker
                        .read(&mut bh, &[Var::Id(shadow.render_pass_begin)]);
                    self.new_command(&mut bh, *command_buffer, RecordedOp::Draw);
                }
            }
            Command::CmdDrawIndexed {
                command_buffer,
                index_count,
                first_index,
                ..
            } => {
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker
                        .read(&mut bh, &[Var::Id(shadow.render_pass_begin)]);
                    self.new_command(
                        &mut bh,
                        *command_buffer,
                        RecordedOp::DrawIndexed {
                            first_index: *first_index,
                            index_count: *index_count,
                        },
                    );
                }
            }
            Command::CmdDrawIndirect {
                command_buffer,
                buffer,
                offset,
                draw_count,
                stride,
            } => {
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker
                        .read(&mut bh, &[Var::Id(shadow.render_pass_begin)]);
                }
                let mut src = Vec::new();
                let mut offset = *offset;
                for _ in 0..*draw_count {
                    src.extend(self.get_buffer_data(
                        Some(&mut bh),
                        *buffer,
                        offset,
                        DRAW_INDIRECT_COMMAND_SIZE,
                    ));
                    offset += *stride as u64;
                }
                self.new_command(&mut bh, *command_buffer, RecordedOp::DrawIndirect { src });
            }
            Command::CmdDrawIndexedIndirect {
                command_buffer,
                buffer,
                offset,
                draw_count,
                stride,
            } => {
                if let Some(shadow) = self.command_buffers.get(command_buffer).copied() {
                    self.tracker
                        .read(&mut bh, &[Var::Id(shadow.render_pass_begin)]);
                }
                let mut src = Vec::new();
                let mut offset = *offset;
                for _ in 0..*draw_count {
                    src.extend(self.get_buffer_data(
                        Some(&mut bh),
                        *buffer,
                        offset,
                        DRAW_INDEXED_INDIRECT_COMMAND_SIZE,
                    ));
                    offset += *stride as u64;
                }
                self.new_command(
                    &mut bh,
                    *command_buffer,
                    RecordedOp::DrawIndexedIndirect { src },
                );
            }
            Command::CmdDispatch { command_buffer, .. } => {
                self.new_command(&mut bh, *command_buffer, RecordedOp::Dispatch);
            }
            Command::CmdDispatchIndirect {
                command_buffer,
                buffer,
                offset,
            } => {
                let src = self.get_buffer_data(
                    Some(&mut bh),
                    *buffer,
                    *offset,
                    DISPATCH_INDIRECT_COMMAND_SIZE,
                );
                self.new_command(&mut bh, *command_buffer, RecordedOp::DispatchIndirect { src });
            }

            // ── Dynamic state ───────────────────────────────
            Command::CmdPushConstants {
                command_buffer,
                layout,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*layout)]);
                self.record_modifying_dynamic_state(&mut bh, *command_buffer);
            }
            Command::CmdSetViewport { command_buffer }
            | Command::CmdSetScissor { command_buffer }
            | Command::CmdSetLineWidth { command_buffer }
            | Command::CmdSetDepthBias { command_buffer }
            | Command::CmdSetDepthBounds { command_buffer }
            | Command::CmdSetBlendConstants { command_buffer }
            | Command::CmdSetStencilCompareMask { command_buffer }
            | Command::CmdSetStencilWriteMask { command_buffer }
            | Command::CmdSetStencilReference { command_buffer } => {
                self.record_modifying_dynamic_state(&mut bh, *command_buffer);
            }
            Command::CmdClearAttachments {
                command_buffer,
                attachments,
                rects,
            } => {
                self.new_command(
                    &mut bh,
                    *command_buffer,
                    RecordedOp::ClearAttachments {
                        attachments: attachments.clone(),
                        rects: rects.clone(),
                    },
                );
            }

            // ── Query commands ──────────────────────────────
            Command::CmdResetQueryPool {
                command_buffer,
                query_pool,
                first_query,
                query_count,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*query_pool)]);
                let mut reset = Vec::new();
                if let Some(pool) = self.query_pools.get(query_pool) {
                    for i in 0..*query_count as usize {
                        if let Some(query) = pool.queries.get(*first_query as usize + i) {
                            reset.push(Var::Id(query.reset));
                        }
                    }
                }
                self.record_reads_writes_modifies(&mut bh, *command_buffer, Vec::new(), reset, Vec::new());
            }
            Command::CmdBeginQuery {
                command_buffer,
                query_pool,
                query,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*query_pool)]);
                let labels = self
                    .query_pools
                    .get(query_pool)
                    .and_then(|pool| pool.queries.get(*query as usize))
                    .copied();
                if let Some(labels) = labels {
                    self.record_reads_writes_modifies(
                        &mut bh,
                        *command_buffer,
                        vec![Var::Id(labels.reset)],
                        vec![Var::Id(labels.begin)],
                        Vec::new(),
                    );
                }
            }
            Command::CmdEndQuery {
                command_buffer,
                query_pool,
                query,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*query_pool)]);
                let labels = self
                    .query_pools
                    .get(query_pool)
                    .and_then(|pool| pool.queries.get(*query as usize))
                    .copied();
                if let Some(labels) = labels {
                    self.record_reads_writes_modifies(
                        &mut bh,
                        *command_buffer,
                        vec![Var::Id(labels.begin)],
                        vec![Var::Id(labels.end), Var::Id(labels.result)],
                        Vec::new(),
                    );
                }
            }
            Command::CmdWriteTimestamp {
                command_buffer,
                query_pool,
                query,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*query_pool)]);
                let labels = self
                    .query_pools
                    .get(query_pool)
                    .and_then(|pool| pool.queries.get(*query as usize))
                    .copied();
                if let Some(labels) = labels {
                    self.record_reads_writes_modifies(
                        &mut bh,
                        *command_buffer,
                        vec![Var::Id(labels.reset)],
                        vec![Var::Id(labels.result)],
                        Vec::new(),
                    );
                }
            }
            Command::CmdCopyQueryPoolResults {
                command_buffer,
                query_pool,
                first_query,
                query_count,
                dst_buffer,
                ..
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*query_pool)]);
                // TODO: narrow the destination range to stride * count.
                let dst = self.get_buffer_data(Some(&mut bh), *dst_buffer, 0, VK_WHOLE_SIZE);
                let mut src = Vec::new();
                if let Some(pool) = self.query_pools.get(query_pool) {
                    for i in 0..*query_count as usize {
                        if let Some(query) = pool.queries.get(*first_query as usize + i) {
                            src.push(Var::Id(query.result));
                        }
                    }
                }
                self.record_reads_writes_modifies(&mut bh, *command_buffer, src, Vec::new(), dst);
            }

            // ── Debug marker commands, kept if submitted ────
            Command::CmdDebugMarkerBegin { command_buffer }
            | Command::CmdDebugMarkerEnd { command_buffer }
            | Command::CmdDebugMarkerInsert { command_buffer } => {
                self.keep_submitted_command_alive(&mut bh, *command_buffer);
            }

            // ── Event & barrier commands ────────────────────
            Command::CmdSetEvent {
                command_buffer,
                event,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*event)]);
                if let Some(shadow) = self.event_shadow(*event) {
                    self.record_reads_writes_modifies(
                        &mut bh,
                        *command_buffer,
                        Vec::new(),
                        vec![Var::Id(shadow.signal)],
                        Vec::new(),
                    );
                }
            }
            Command::CmdResetEvent {
                command_buffer,
                event,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*event)]);
                if let Some(shadow) = self.event_shadow(*event) {
                    self.record_reads_writes_modifies(
                        &mut bh,
                        *command_buffer,
                        Vec::new(),
                        vec![Var::Id(shadow.unsignal)],
                        Vec::new(),
                    );
                }
            }
            Command::CmdWaitEvents {
                command_buffer,
                events,
                memory_barriers,
                buffer_barriers,
                image_barriers,
            } => {
                let mut event_labels = Vec::with_capacity(events.len() * 2);
                for event in events {
                    self.tracker.read(&mut bh, &[Var::Handle(*event)]);
                    if let Some(shadow) = self.events.get(event).copied() {
                        event_labels.push(Var::Id(shadow.signal));
                        event_labels.push(Var::Id(shadow.unsignal));
                    }
                }
                self.record_barriers(
                    &mut bh,
                    *command_buffer,
                    !memory_barriers.is_empty(),
                    buffer_barriers,
                    image_barriers,
                    event_labels,
                );
            }
            Command::CmdPipelineBarrier {
                command_buffer,
                memory_barriers,
                buffer_barriers,
                image_barriers,
            } => {
                self.record_barriers(
                    &mut bh,
                    *command_buffer,
                    !memory_barriers.is_empty(),
                    buffer_barriers,
                    image_barriers,
                    Vec::new(),
                );
            }

            // ── Secondary command buffers ───────────────────
            Command::CmdExecuteCommands {
                command_buffer,
                command_buffers,
            } => {
                for secondary in command_buffers {
                    self.tracker.read(&mut bh, &[Var::Handle(*secondary)]);
                }
                self.new_command_in(
                    &mut bh,
                    *command_buffer,
                    RecordedOp::ExecuteCommands,
                    true,
                    command_buffers.clone(),
                );
            }

            // ── Queue submission ────────────────────────────
            Command::QueueSubmit {
                queue,
                submits,
                fence,
            } => {
                self.tracker.read(&mut bh, &[Var::Handle(*queue)]);
                self.execution
                    .entry(*queue)
                    .or_insert_with(|| QueueExecState::new(&mut self.tracker, id))
                    .last_submit_id = id;

                let mut info = QueueSubmitInfo {
                    queue: *queue,
                    began: false,
                    queued: self.tracker.new_var(),
                    done: self.tracker.new_var(),
                    wait_semaphores: Vec::new(),
                    signal_semaphores: Vec::new(),
                    signal_fence: *fence,
                    pending: VecDeque::new(),
                };
                let mut has_commands = false;
                for (i, submit) in submits.iter().enumerate() {
                    for (j, cb) in submit.command_buffers.iter().enumerate() {
                        // An invalid command buffer stops traversal of the
                        // whole list.
                        let Some(shadow) = self.command_buffers.get(cb).copied() else {
                            break;
                        };
                        self.tracker.read(&mut bh, &[Var::Id(shadow.end)]);
                        let recorded = self.commands.get(cb).cloned().unwrap_or_default();
                        for (k, cbc) in recorded.iter().enumerate() {
                            has_commands = true;
                            let fci =
                                SubCmdIdx::new(vec![id, i as u64, j as u64, k as u64]);
                            info.pending.push_back(crate::record::SubmittedCommand {
                                id: fci,
                                cmd: cbc.clone(),
                                parent: None,
                            });
                            if cbc.is_execute_commands {
                                for (sci, scb) in cbc.secondary.iter().enumerate() {
                                    let Some(sshadow) =
                                        self.command_buffers.get(scb).copied()
                                    else {
                                        break;
                                    };
                                    self.tracker.read(&mut bh, &[Var::Id(sshadow.end)]);
                                    let srecorded =
                                        self.commands.get(scb).cloned().unwrap_or_default();
                                    for (sk, scbc) in srecorded.iter().enumerate() {
                                        let fci = SubCmdIdx::new(vec![
                                            id, i as u64, j as u64, k as u64, sci as u64,
                                            sk as u64,
                                        ]);
                                        info.pending.push_back(
                                            crate::record::SubmittedCommand {
                                                id: fci,
                                                cmd: scbc.clone(),
                                                parent: Some(cbc.clone()),
                                            },
                                        );
                                    }
                                }
                            }
                        }
                    }
                    for semaphore in &submit.wait_semaphores {
                        if !ctx.semaphore_known(*semaphore) {
                            break;
                        }
                        info.wait_semaphores.push(*semaphore);
                    }
                    for semaphore in &submit.signal_semaphores {
                        if !ctx.semaphore_known(*semaphore) {
                            break;
                        }
                        info.signal_semaphores.push(*semaphore);
                    }
                }

                self.write_coherent_memory_data(ctx, &mut bh);
                if self.tracker.read(&mut bh, &[Var::Handle(*fence)]) {
                    if let Some(shadow) = self.fence_shadow(*fence) {
                        self.tracker.read(&mut bh, &[Var::Id(shadow.unsignal)]);
                        self.tracker.write(&mut bh, &[Var::Id(shadow.signal)]);
                    }
                }
                // With no commands in the submission the semaphore and fence
                // operations happen right here; otherwise they are stamped by
                // the rollout's begin and terminal behaviors.
                self.tracker.write(&mut bh, &[Var::Id(info.queued)]);
                for semaphore in info.wait_semaphores.clone() {
                    if self.tracker.read(&mut bh, &[Var::Handle(semaphore)]) && !has_commands {
                        if let Some(signal) = self.semaphore_signal(semaphore) {
                            self.tracker.modify(&mut bh, &[Var::Id(signal)]);
                        }
                    }
                }
                for semaphore in info.signal_semaphores.clone() {
                    if self.tracker.read(&mut bh, &[Var::Handle(semaphore)]) && !has_commands {
                        if let Some(signal) = self.semaphore_signal(semaphore) {
                            self.tracker.write(&mut bh, &[Var::Id(signal)]);
                        }
                    }
                }
                if self.tracker.read(&mut bh, &[Var::Handle(*fence)]) && !has_commands {
                    if let Some(shadow) = self.fence_shadow(*fence) {
                        self.tracker.write(&mut bh, &[Var::Id(shadow.signal)]);
                    }
                }
                self.submits.insert(id, info);
            }

            Command::QueueBindSparse { queue, bind_infos } => {
                self.tracker.read(&mut bh, &[Var::Handle(*queue)]);
                for bind_info in bind_infos {
                    for buffer_binds in &bind_info.buffer_binds {
                        if self
                            .tracker
                            .read(&mut bh, &[Var::Handle(buffer_binds.buffer)])
                        {
                            for bind in &buffer_binds.binds {
                                if self.tracker.read(&mut bh, &[Var::Handle(bind.memory)]) {
                                    self.add_buffer_binding(
                                        &mut bh,
                                        buffer_binds.buffer,
                                        bind.memory,
                                        bind.resource_offset,
                                        bind.size,
                                        bind.memory_offset,
                                    );
                                }
                            }
                        }
                    }
                    for opaque_binds in &bind_info.image_opaque_binds {
                        if self
                            .tracker
                            .read(&mut bh, &[Var::Handle(opaque_binds.image)])
                        {
                            for bind in &opaque_binds.binds {
                                if self.tracker.read(&mut bh, &[Var::Handle(bind.memory)]) {
                                    self.add_opaque_image_binding(
                                        &mut bh,
                                        opaque_binds.image,
                                        bind.memory,
                                        bind.resource_offset,
                                        bind.size,
                                        bind.memory_offset,
                                    );
                                }
                            }
                        }
                    }
                    for image_binds in &bind_info.image_binds {
                        if self.tracker.read(&mut bh, &[Var::Handle(image_binds.image)]) {
                            for bind in &image_binds.binds {
                                if self.tracker.read(&mut bh, &[Var::Handle(bind.memory)]) {
                                    self.add_sparse_image_binding(
                                        ctx,
                                        &mut bh,
                                        image_binds.image,
                                        bind,
                                    );
                                }
                            }
                        }
                    }
                }
            }

            // ── Synchronization primitives ──────────────────
            Command::SetEvent { event } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*event)]) {
                    if let Some(shadow) = self.event_shadow(*event) {
                        self.tracker.write(&mut bh, &[Var::Id(shadow.signal)]);
                    }
                    self.write_coherent_memory_data(ctx, &mut bh);
                    bh.alive = true;
                }
            }
            Command::ResetEvent { event } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*event)]) {
                    if let Some(shadow) = self.event_shadow(*event) {
                        self.tracker.write(&mut bh, &[Var::Id(shadow.unsignal)]);
                    }
                    bh.alive = true;
                }
            }
            Command::CreateSemaphore { semaphore } => {
                self.tracker.write(&mut bh, &[Var::Handle(*semaphore)]);
                let signal = self.tracker.new_var();
                self.semaphore_signals.insert(*semaphore, signal);
            }
            Command::DestroySemaphore { semaphore } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*semaphore)]) {
                    self.semaphore_signals.remove(semaphore);
                    bh.alive = true;
                }
            }
            Command::CreateEvent { event } => {
                self.tracker.write(&mut bh, &[Var::Handle(*event)]);
                let shadow = EventShadow::new(&mut self.tracker);
                self.events.insert(*event, shadow);
            }
            Command::GetEventStatus { event } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*event)]) {
                    if let Some(shadow) = self.event_shadow(*event) {
                        self.tracker
                            .read(&mut bh, &[Var::Id(shadow.signal), Var::Id(shadow.unsignal)]);
                    }
                    bh.alive = true;
                }
            }
            Command::DestroyEvent { event } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*event)]) {
                    self.events.remove(event);
                    bh.alive = true;
                }
            }
            Command::CreateFence { fence, .. } => {
                self.tracker.write(&mut bh, &[Var::Handle(*fence)]);
                let shadow = FenceShadow::new(&mut self.tracker);
                self.fences.insert(*fence, shadow);
            }
            Command::GetFenceStatus { fence } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*fence)]) {
                    if let Some(shadow) = self.fence_shadow(*fence) {
                        self.tracker
                            .read(&mut bh, &[Var::Id(shadow.signal), Var::Id(shadow.unsignal)]);
                    }
                    bh.alive = true;
                }
            }
            Command::WaitForFences { fences } => {
                for fence in fences {
                    if self.tracker.read(&mut bh, &[Var::Handle(*fence)]) {
                        if let Some(shadow) = self.fence_shadow(*fence) {
                            self.tracker.read(
                                &mut bh,
                                &[Var::Id(shadow.signal), Var::Id(shadow.unsignal)],
                            );
                        }
                        bh.alive = true;
                    }
                }
            }
            Command::ResetFences { fences } => {
                for fence in fences {
                    if self.tracker.read(&mut bh, &[Var::Handle(*fence)]) {
                        if let Some(shadow) = self.fence_shadow(*fence) {
                            self.tracker.write(&mut bh, &[Var::Id(shadow.unsignal)]);
                        }
                        bh.alive = true;
                    }
                }
            }
            Command::DestroyFence { fence } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*fence)]) {
                    self.fences.remove(fence);
                    bh.alive = true;
                }
            }
            Command::QueueWaitIdle { queue } => {
                if self.tracker.read(&mut bh, &[Var::Handle(*queue)])
                    && self.execution.contains_key(queue)
                {
                    bh.alive = true;
                }
            }
            Command::DeviceWaitIdle => {
                let last_submits: Vec<u64> =
                    self.execution.values().map(|e| e.last_submit_id).collect();
                for submit_id in last_submits {
                    if let Some(info) = self.submits.get(&submit_id) {
                        let done = info.done;
                        self.tracker.read(&mut bh, &[Var::Id(done)]);
                    }
                    bh.alive = true;
                }
            }

            // ── Keep-alive families ─────────────────────────
            Command::CreateInstance
            | Command::EnumeratePhysicalDevices
            | Command::CreateDevice
            | Command::GetDeviceQueue { .. }
            | Command::GetDeviceProcAddr
            | Command::GetInstanceProcAddr
            | Command::CreateDescriptorPool { .. }
            | Command::DestroyDescriptorPool { .. }
            | Command::ResetDescriptorPool { .. }
            | Command::CreateSurface { .. }
            | Command::DestroySurface { .. }
            | Command::CreateCommandPool { .. }
            | Command::ResetCommandPool { .. }
            | Command::TrimCommandPool { .. }
            | Command::DestroyCommandPool { .. }
            | Command::GetPhysicalDeviceProperties
            | Command::GetPhysicalDeviceMemoryProperties
            | Command::GetPhysicalDeviceQueueFamilyProperties
            | Command::GetPhysicalDeviceFeatures
            | Command::GetPhysicalDeviceFormatProperties
            | Command::GetPhysicalDeviceSurfaceSupport
            | Command::GetPhysicalDeviceSurfaceCapabilities
            | Command::GetPhysicalDeviceSurfaceFormats
            | Command::GetPhysicalDeviceSurfacePresentModes => {
                bh.alive = true;
            }

            // ── Droppable enumerations ──────────────────────
            Command::EnumerateInstanceExtensionProperties
            | Command::EnumerateDeviceExtensionProperties
            | Command::EnumerateInstanceLayerProperties
            | Command::EnumerateDeviceLayerProperties => {}

            Command::Unknown { name } => {
                warn!(command = %name, "command not handled by footprint builder");
                bh.alive = true;
            }
        }

        ft.add_behavior(&mut self.tracker, bh);

        // Roll out the recorded behaviors the collaborator reported as
        // actually executed.
        match cmd {
            Command::QueueSubmit { .. } | Command::SetEvent { .. } => {
                self.roll_out_executed(ft, &outcome.executed);
            }
            _ => {}
        }

        // Pin the last-draw framebuffer data live so the observation point
        // always survives pruning.
        let mut framebuffer_data = Vec::new();
        if let Some(fb_handle) = ctx.last_draw_framebuffer() {
            if let Some(fb) = ctx.framebuffer(fb_handle) {
                for view in fb.attachments {
                    let Some(view_state) = ctx.image_view(view) else {
                        continue;
                    };
                    framebuffer_data.extend(self.get_image_data(None, view_state.image));
                }
            }
        }
        if !framebuffer_data.is_empty() {
            let mut pin = Behavior::new(SubCmdIdx::new(vec![id]));
            self.tracker.read(&mut pin, &framebuffer_data);
            ft.add_behavior(&mut self.tracker, pin);
        }
    }
}

fn attachment_view_record(
    view: TraceHandle,
    view_state: Option<vkdce_protocol::snapshot::ImageViewState>,
    image_state: Option<&ImageState>,
) -> AttachmentViewRecord {
    AttachmentViewRecord {
        view,
        image: view_state.map(|v| v.image).unwrap_or(TraceHandle::NULL),
        view_type: view_state.map(|v| v.view_type).unwrap_or(0),
        base_array_layer: view_state
            .map(|v| v.subresource_range.base_array_layer)
            .unwrap_or(0),
        layer_count: view_state
            .map(|v| v.subresource_range.layer_count)
            .unwrap_or(0),
        image_type: image_state.map(|i| i.info.image_type).unwrap_or(0),
        image_array_layers: image_state.map(|i| i.info.array_layers).unwrap_or(0),
        image_width: image_state.map(|i| i.info.extent.width).unwrap_or(0),
        image_height: image_state.map(|i| i.info.extent.height).unwrap_or(0),
    }
}

/// Enumerate the block-granularity slots covered by one sparse image bind,
/// with the memory offset backing each block. The granularity is the first
/// sparse memory requirement matching the bind's aspect mask.
fn sparse_blocks(
    state: &ImageState,
    bind: &SparseImageMemoryBind,
) -> Vec<(u32, u32, u32, u64, u64)> {
    let aspect = bind.subresource.aspect_mask;
    let layer = bind.subresource.array_layer;
    let level = bind.subresource.mip_level;
    let Some(requirement) = state
        .sparse_requirements
        .iter()
        .find(|r| r.aspect_mask == aspect)
    else {
        error!(aspect, "sparse image granularity not found for aspect mask");
        return Vec::new();
    };
    let granularity = requirement.image_granularity;
    let width = mip_size(state.info.extent.width, level);
    let height = mip_size(state.info.extent.height, level);
    let width_blocks = div_round_up(width, granularity.width) as u64;
    let height_blocks = div_round_up(height, granularity.height) as u64;
    let x_blocks = div_round_up(bind.extent.width, granularity.width) as u64;
    let y_blocks = div_round_up(bind.extent.height, granularity.height) as u64;
    let z_blocks = div_round_up(bind.extent.depth, granularity.depth) as u64;
    let mut blocks = Vec::new();
    for zi in 0..z_blocks {
        for yi in 0..y_blocks {
            for xi in 0..x_blocks {
                let index = xi + yi * width_blocks + zi * width_blocks * height_blocks;
                let memory_offset = bind.memory_offset + index * state.block_size;
                blocks.push((aspect, layer, level, index, memory_offset));
            }
        }
    }
    blocks
}

fn mip_size(extent: u32, level: u32) -> u32 {
    (extent >> level).max(1)
}

fn div_round_up(value: u32, granularity: u32) -> u32 {
    if granularity == 0 {
        return 0;
    }
    value.div_ceil(granularity)
}
