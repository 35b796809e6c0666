//! Queue execution engine.
//!
//! `QueueSubmit` stamps its own top-level behavior, but the recorded commands
//! it carries are only played back when the collaborator reports the
//! subcommands that actually executed. Rollout walks that report in order,
//! draining each submit's pending queue, replaying the deferred op of every
//! subcommand against the queue's execution state, and emitting the begin
//! and terminal synchronization behaviors.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use ash::vk;
use tracing::error;

use vkdce_protocol::commands::{AttachmentDescription, ClearAttachment, ClearRect};
use vkdce_protocol::handle::{SubCmdIdx, VkFence, VkQueue, VkSemaphore};
use vkdce_protocol::snapshot::RenderPassState;

use crate::binding::{bound_data, ResBinding, VK_WHOLE_SIZE};
use crate::builder::FootprintBuilder;
use crate::coverage::{attachment_fully_covers_image, framebuffer_covered_by_clear_rect};
use crate::descriptor::DescriptorSetShadow;
use crate::graph::{Behavior, DepTracker, Footprint, Var, VarId};
use crate::record::{FramebufferRecord, RecordedOp, SubmittedCommand};

/// A descriptor set as captured by `CmdBindDescriptorSets`: the set plus the
/// dynamic offsets snapshot, sized to the set's dynamic descriptor count.
pub struct BoundDescriptorSet {
    pub var: VarId,
    pub set: Rc<RefCell<DescriptorSetShadow>>,
    pub dynamic_offsets: Vec<u32>,
}

impl BoundDescriptorSet {
    pub fn new(
        tracker: &mut DepTracker,
        bh: &mut Behavior,
        set: Rc<RefCell<DescriptorSetShadow>>,
        dynamic_offsets: &[u32],
    ) -> Self {
        let count = set.borrow().dynamic_descriptor_count() as usize;
        let take = count.min(dynamic_offsets.len());
        let mut offsets = vec![0u32; count];
        offsets[..take].copy_from_slice(&dynamic_offsets[..take]);
        let var = tracker.new_var();
        tracker.write(bh, &[Var::Id(var)]);
        BoundDescriptorSet {
            var,
            set,
            dynamic_offsets: offsets,
        }
    }
}

/// Execution-time state of one (primary or secondary) command buffer.
pub struct CmdBufExecState {
    pub vertex_bindings: BTreeMap<u32, Rc<Vec<ResBinding>>>,
    pub index_bindings: Option<Rc<Vec<ResBinding>>>,
    pub index_type: i32,
    pub descriptor_sets: BTreeMap<u32, BoundDescriptorSet>,
    pub pipeline: VarId,
    pub dynamic_state: VarId,
}

impl CmdBufExecState {
    pub fn new(tracker: &mut DepTracker) -> Self {
        CmdBufExecState {
            vertex_bindings: BTreeMap::new(),
            index_bindings: None,
            index_type: vk::IndexType::UINT16.as_raw(),
            descriptor_sets: BTreeMap::new(),
            pipeline: tracker.new_var(),
            dynamic_state: tracker.new_var(),
        }
    }
}

/// One framebuffer attachment as seen by the in-progress render pass.
/// Shared (by identity) between the per-subpass attachment lists.
pub struct SubpassAttachmentInfo {
    pub full_image_data: bool,
    pub data: Vec<Var>,
    pub layout: VarId,
    pub desc: AttachmentDescription,
}

#[derive(Default)]
pub struct SubpassInfo {
    pub load_attachments: Vec<Rc<SubpassAttachmentInfo>>,
    pub store_attachments: Vec<Rc<SubpassAttachmentInfo>>,
    pub color_attachments: Vec<Rc<SubpassAttachmentInfo>>,
    pub resolve_attachments: Vec<Rc<SubpassAttachmentInfo>>,
    pub input_attachments: Vec<Rc<SubpassAttachmentInfo>>,
    pub depth_stencil_attachment: Option<Rc<SubpassAttachmentInfo>>,
    pub modified_descriptor_data: Vec<Var>,
}

/// Per-queue execution state across submissions.
pub struct QueueExecState {
    pub primary: CmdBufExecState,
    pub secondary: CmdBufExecState,
    pub use_secondary: bool,

    pub subpasses: Vec<SubpassInfo>,
    pub subpass_index: usize,
    /// Identity of the subpass progression within the current render pass.
    pub subpass_var: VarId,
    pub render_pass_begin: Option<VarId>,
    pub framebuffer: Option<FramebufferRecord>,

    pub current_command: SubCmdIdx,
    pub last_submit_id: u64,
}

impl QueueExecState {
    pub fn new(tracker: &mut DepTracker, submit_id: u64) -> Self {
        QueueExecState {
            primary: CmdBufExecState::new(tracker),
            secondary: CmdBufExecState::new(tracker),
            use_secondary: false,
            subpasses: Vec::new(),
            subpass_index: 0,
            subpass_var: tracker.new_var(),
            render_pass_begin: None,
            framebuffer: None,
            current_command: SubCmdIdx::new(vec![0, 0, 0, 0]),
            last_submit_id: submit_id,
        }
    }

    pub fn current(&self) -> &CmdBufExecState {
        if self.use_secondary {
            &self.secondary
        } else {
            &self.primary
        }
    }

    pub fn current_mut(&mut self) -> &mut CmdBufExecState {
        if self.use_secondary {
            &mut self.secondary
        } else {
            &mut self.primary
        }
    }

    /// Track which command buffer the incoming subcommand belongs to,
    /// resetting the bound state whenever a new buffer starts executing.
    pub fn update_current_command(&mut self, tracker: &mut DepTracker, fci: &SubCmdIdx) {
        match fci.len() {
            4 => {
                if self.current_command.prefix(3) < fci.prefix(3) {
                    self.primary = CmdBufExecState::new(tracker);
                }
                self.use_secondary = false;
            }
            6 => {
                if self.current_command.len() != 6 || self.current_command.prefix(5) < fci.prefix(5)
                {
                    self.secondary = CmdBufExecState::new(tracker);
                }
                self.use_secondary = true;
            }
            _ => error!(index = ?fci, "invalid length of full command index"),
        }
        self.current_command = fci.clone();
    }
}

/// Everything collected from one `QueueSubmit` at dispatch time.
pub struct QueueSubmitInfo {
    pub queue: VkQueue,
    pub began: bool,
    pub queued: VarId,
    pub done: VarId,
    pub wait_semaphores: Vec<VkSemaphore>,
    pub signal_semaphores: Vec<VkSemaphore>,
    pub signal_fence: VkFence,
    pub pending: VecDeque<SubmittedCommand>,
}

fn is_load(op: i32) -> bool {
    vk::AttachmentLoadOp::from_raw(op) == vk::AttachmentLoadOp::LOAD
}

fn is_store(op: i32) -> bool {
    vk::AttachmentStoreOp::from_raw(op) == vk::AttachmentStoreOp::STORE
}

impl FootprintBuilder {
    /// Behavior for one executed subcommand: reads the recorded command, the
    /// submit's queued label, and the parent command for secondary buffers.
    fn new_submitted_behavior(&mut self, sc: &SubmittedCommand, info: &QueueSubmitInfo) -> Behavior {
        let mut bh = Behavior::new(sc.id.clone());
        self.tracker
            .read(&mut bh, &[Var::Id(sc.cmd.var), Var::Id(info.queued)]);
        if let Some(parent) = &sc.parent {
            self.tracker.read(&mut bh, &[Var::Id(parent.var)]);
        }
        bh
    }

    /// Walk the collaborator-reported execution order, draining each submit's
    /// pending queue. Divergence between observed and submitted order stops
    /// the rollout after logging once.
    pub(crate) fn roll_out_executed(&mut self, ft: &mut Footprint, executed: &[SubCmdIdx]) {
        for fci in executed {
            let Some(&submit_id) = fci.0.first() else {
                continue;
            };
            let Some(mut info) = self.submits.remove(&submit_id) else {
                error!(submit = submit_id, "executed subcommand for unknown submit");
                continue;
            };
            if !info.began {
                let mut bh = Behavior::new(SubCmdIdx::new(vec![submit_id]));
                for sp in info.wait_semaphores.clone() {
                    if self.tracker.read(&mut bh, &[Var::Handle(sp)]) {
                        if let Some(&signal) = self.semaphore_signals.get(&sp) {
                            self.tracker.modify(&mut bh, &[Var::Id(signal)]);
                        }
                    }
                }
                ft.add_behavior(&mut self.tracker, bh);
                info.began = true;
            }

            let head_matches = info
                .pending
                .front()
                .map(|sc| sc.id == *fci)
                .unwrap_or(false);
            if !head_matches {
                let submitted = info.pending.front().map(|sc| sc.id.clone());
                error!(
                    executed = ?fci,
                    submitted = ?submitted,
                    "execution order differs from submission order"
                );
                self.submits.insert(submit_id, info);
                return;
            }
            let sc = info.pending.pop_front().expect("non-empty pending queue");

            let mut exec = match self.execution.remove(&info.queue) {
                Some(exec) => exec,
                None => QueueExecState::new(&mut self.tracker, submit_id),
            };
            exec.update_current_command(&mut self.tracker, fci);
            self.replay(ft, &sc, &mut exec, &info);
            self.execution.insert(info.queue, exec);

            if info.pending.is_empty() {
                let mut bh = Behavior::new(SubCmdIdx::new(vec![submit_id]));
                self.tracker.read(&mut bh, &[Var::Id(info.queued)]);
                self.tracker.write(&mut bh, &[Var::Id(info.done)]);
                for sp in info.signal_semaphores.clone() {
                    if self.tracker.read(&mut bh, &[Var::Handle(sp)]) {
                        if let Some(&signal) = self.semaphore_signals.get(&sp) {
                            self.tracker.write(&mut bh, &[Var::Id(signal)]);
                        }
                    }
                }
                if self.tracker.read(&mut bh, &[Var::Handle(info.signal_fence)]) {
                    if let Some(fence) = self.fences.get(&info.signal_fence).copied() {
                        self.tracker.write(&mut bh, &[Var::Id(fence.signal)]);
                    }
                }
                ft.add_behavior(&mut self.tracker, bh);
            }
            self.submits.insert(submit_id, info);
        }
    }

    fn replay(
        &mut self,
        ft: &mut Footprint,
        sc: &SubmittedCommand,
        exec: &mut QueueExecState,
        info: &QueueSubmitInfo,
    ) {
        let cmd = sc.cmd.clone();
        match &cmd.op {
            RecordedOp::ReadsWritesModifies {
                reads,
                writes,
                modifies,
            } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.tracker.read(&mut bh, reads);
                self.tracker.write(&mut bh, writes);
                self.tracker.modify(&mut bh, modifies);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::ModifyDynamicState => {
                let mut bh = self.new_submitted_behavior(sc, info);
                let dynamic_state = exec.current().dynamic_state;
                self.tracker.modify(&mut bh, &[Var::Id(dynamic_state)]);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::KeepAlive => {
                let mut bh = self.new_submitted_behavior(sc, info);
                bh.alive = true;
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::Barriers {
                touched,
                attached_reads,
            } => {
                for datum in touched {
                    let mut bh = self.new_submitted_behavior(sc, info);
                    self.tracker.read(&mut bh, attached_reads);
                    self.tracker.modify(&mut bh, &[*datum]);
                    ft.add_behavior(&mut self.tracker, bh);
                }
                let mut bh = self.new_submitted_behavior(sc, info);
                self.tracker.read(&mut bh, attached_reads);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::BeginRenderPass {
                render_pass,
                render_pass_state,
                framebuffer,
            } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.begin_render_pass_replay(
                    &mut bh,
                    exec,
                    *render_pass,
                    render_pass_state,
                    framebuffer,
                );
                let paired = self.tracker.new_forward_paired(&mut bh);
                exec.render_pass_begin = Some(paired);
                bh.alive = true;
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::NextSubpass => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.end_subpass(ft, &mut bh, sc, info, exec);
                exec.subpass_index += 1;
                self.start_subpass(&mut bh, exec);
                bh.alive = true;
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::EndRenderPass => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.end_subpass(ft, &mut bh, sc, info, exec);
                if let Some(paired) = exec.render_pass_begin {
                    self.tracker.read(&mut bh, &[Var::Id(paired)]);
                }
                bh.alive = true;
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::BindVertexBuffers {
                first_binding,
                bindings,
            } => {
                let bh = self.new_submitted_behavior(sc, info);
                for (i, list) in bindings.iter().enumerate() {
                    exec.current_mut()
                        .vertex_bindings
                        .insert(first_binding + i as u32, list.clone());
                }
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::BindIndexBuffer {
                bindings,
                index_type,
            } => {
                let bh = self.new_submitted_behavior(sc, info);
                exec.current_mut().index_bindings = Some(bindings.clone());
                exec.current_mut().index_type = *index_type;
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::BindPipeline { pipeline } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.tracker.read(&mut bh, &[Var::Handle(*pipeline)]);
                let pipeline_label = exec.current().pipeline;
                self.tracker.write(&mut bh, &[Var::Id(pipeline_label)]);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::BindDescriptorSets {
                first_set,
                sets,
                dynamic_offsets,
            } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                for (i, set) in sets.iter().enumerate() {
                    let Some(set) = set else { continue };
                    let bound = BoundDescriptorSet::new(
                        &mut self.tracker,
                        &mut bh,
                        set.clone(),
                        dynamic_offsets,
                    );
                    exec.current_mut()
                        .descriptor_sets
                        .insert(first_set + i as u32, bound);
                }
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::Draw => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.draw(&mut bh, exec);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::DrawIndexed {
                first_index,
                index_count,
            } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.read_bound_index_buffer(&mut bh, exec, Some((*first_index, *index_count)));
                self.draw(&mut bh, exec);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::DrawIndirect { src } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.draw(&mut bh, exec);
                self.tracker.read(&mut bh, src);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::DrawIndexedIndirect { src } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                self.read_bound_index_buffer(&mut bh, exec, None);
                self.draw(&mut bh, exec);
                self.tracker.read(&mut bh, src);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::Dispatch => {
                let mut bh = self.new_submitted_behavior(sc, info);
                let pipeline = exec.current().pipeline;
                self.tracker.read(&mut bh, &[Var::Id(pipeline)]);
                let modified = self.use_bound_descriptor_sets(&mut bh, exec.current());
                self.tracker.modify(&mut bh, &modified);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::DispatchIndirect { src } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                let pipeline = exec.current().pipeline;
                self.tracker.read(&mut bh, &[Var::Id(pipeline)]);
                let modified = self.use_bound_descriptor_sets(&mut bh, exec.current());
                self.tracker.modify(&mut bh, &modified);
                self.tracker.read(&mut bh, src);
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::ClearAttachments { attachments, rects } => {
                let mut bh = self.new_submitted_behavior(sc, info);
                for attachment in attachments {
                    self.clear_attachment_data(&mut bh, exec, attachment, rects);
                }
                ft.add_behavior(&mut self.tracker, bh);
            }
            RecordedOp::ExecuteCommands => {
                // Expanded into the pending queue at submit time; the marker
                // itself has no deferred effect.
            }
        }
    }

    fn draw(&mut self, bh: &mut Behavior, exec: &mut QueueExecState) {
        let subpass_var = exec.subpass_var;
        let pipeline = exec.current().pipeline;
        let dynamic_state = exec.current().dynamic_state;
        self.tracker.read(
            bh,
            &[Var::Id(subpass_var), Var::Id(pipeline), Var::Id(dynamic_state)],
        );

        let vertex: Vec<Rc<Vec<ResBinding>>> =
            exec.current().vertex_bindings.values().cloned().collect();
        for list in vertex {
            let data = bound_data(&list, &mut self.tracker, Some(bh), 0, VK_WHOLE_SIZE);
            self.tracker.read(bh, &data);
        }

        let modified = self.use_bound_descriptor_sets(bh, exec.current());
        let spi = exec.subpass_index;
        if let Some(subpass) = exec.subpasses.get_mut(spi) {
            subpass
                .modified_descriptor_data
                .extend(modified.iter().copied());
        }

        if let Some(index_bindings) = exec.current().index_bindings.clone() {
            let data = bound_data(&index_bindings, &mut self.tracker, Some(bh), 0, VK_WHOLE_SIZE);
            self.tracker.read(bh, &data);
        }

        let Some(subpass) = exec.subpasses.get(spi) else {
            error!("draw outside of a render pass subpass");
            return;
        };
        let inputs = subpass.input_attachments.clone();
        let colors = subpass.color_attachments.clone();
        let depth_stencil = subpass.depth_stencil_attachment.clone();
        for input in inputs {
            self.tracker.read(bh, &input.data);
        }
        for color in colors {
            self.tracker.modify(bh, &color.data);
        }
        if let Some(ds) = depth_stencil {
            self.tracker.modify(bh, &ds.data);
        }
    }

    /// Read the bound index buffer. Indexed draws read the exact index
    /// range; indirect indexed draws read the whole binding.
    fn read_bound_index_buffer(
        &mut self,
        bh: &mut Behavior,
        exec: &QueueExecState,
        indexed: Option<(u32, u32)>,
    ) {
        let index_type = vk::IndexType::from_raw(exec.current().index_type);
        let index_size: u64 = if index_type == vk::IndexType::UINT16 {
            2
        } else if index_type == vk::IndexType::UINT32 {
            4
        } else {
            error!(index_type = ?index_type, "invalid index type for bound index buffer");
            0
        };
        let (offset, size) = match indexed {
            Some((first_index, index_count)) => (
                first_index as u64 * index_size,
                index_count as u64 * index_size,
            ),
            None => (0, VK_WHOLE_SIZE),
        };
        if let Some(bindings) = exec.current().index_bindings.clone() {
            let data = bound_data(&bindings, &mut self.tracker, Some(bh), offset, size);
            self.tracker.read(bh, &data);
        }
    }

    fn begin_render_pass_replay(
        &mut self,
        bh: &mut Behavior,
        exec: &mut QueueExecState,
        render_pass: vkdce_protocol::handle::VkRenderPass,
        rp: &RenderPassState,
        fb: &FramebufferRecord,
    ) {
        self.tracker
            .read(bh, &[Var::Handle(render_pass), Var::Handle(fb.handle)]);
        exec.framebuffer = Some(fb.clone());
        exec.subpasses = Vec::with_capacity(rp.subpasses.len());

        // Which subpass first uses each attachment (its load subpass) and
        // which uses it last (its store subpass).
        let mut load_subpass: HashMap<u32, usize> = HashMap::new();
        let mut store_subpass: HashMap<u32, usize> = HashMap::new();
        let mut store_info: HashMap<u32, Rc<SubpassAttachmentInfo>> = HashMap::new();

        for (si, desc) in rp.subpasses.iter().enumerate() {
            let color_set: HashSet<u32> = desc
                .color_attachments
                .iter()
                .filter(|r| r.attachment != vk::ATTACHMENT_UNUSED)
                .map(|r| r.attachment)
                .collect();
            let resolve_set: HashSet<u32> = desc
                .resolve_attachments
                .iter()
                .filter(|r| r.attachment != vk::ATTACHMENT_UNUSED)
                .map(|r| r.attachment)
                .collect();
            let input_set: HashSet<u32> = desc
                .input_attachments
                .iter()
                .filter(|r| r.attachment != vk::ATTACHMENT_UNUSED)
                .map(|r| r.attachment)
                .collect();

            exec.subpasses.push(SubpassInfo::default());

            for view in fb.attachments.clone() {
                if self.tracker.read(bh, &[Var::Handle(view.view)]) {
                    self.tracker.read(bh, &[Var::Handle(view.image)]);
                }
            }

            for ai in 0..rp.attachments.len() as u32 {
                if color_set.contains(&ai) {
                    if let Some(attachment) = self.record_attachment(
                        bh,
                        exec,
                        fb,
                        rp,
                        ai,
                        si,
                        &mut load_subpass,
                        &mut store_subpass,
                        &mut store_info,
                    ) {
                        exec.subpasses[si].color_attachments.push(attachment);
                    }
                }
                if resolve_set.contains(&ai) {
                    if let Some(attachment) = self.record_attachment(
                        bh,
                        exec,
                        fb,
                        rp,
                        ai,
                        si,
                        &mut load_subpass,
                        &mut store_subpass,
                        &mut store_info,
                    ) {
                        exec.subpasses[si].resolve_attachments.push(attachment);
                    }
                }
                if input_set.contains(&ai) {
                    if let Some(attachment) = self.record_attachment(
                        bh,
                        exec,
                        fb,
                        rp,
                        ai,
                        si,
                        &mut load_subpass,
                        &mut store_subpass,
                        &mut store_info,
                    ) {
                        exec.subpasses[si].input_attachments.push(attachment);
                    }
                }
            }
            if let Some(ds_ref) = &desc.depth_stencil_attachment {
                if ds_ref.attachment != vk::ATTACHMENT_UNUSED {
                    if let Some(attachment) = self.record_attachment(
                        bh,
                        exec,
                        fb,
                        rp,
                        ds_ref.attachment,
                        si,
                        &mut load_subpass,
                        &mut store_subpass,
                        &mut store_info,
                    ) {
                        exec.subpasses[si].depth_stencil_attachment = Some(attachment);
                    }
                }
            }
        }

        for (ai, si) in store_subpass {
            exec.subpasses[si]
                .store_attachments
                .push(store_info[&ai].clone());
        }

        exec.subpass_index = 0;
        exec.subpass_var = self.tracker.new_var();
        self.start_subpass(bh, exec);
    }

    /// Build the attachment info for `ai` as referenced by subpass `si`, and
    /// register it with the load/store tracking. A fresh info is produced per
    /// reference; the store maps keep the last one.
    #[allow(clippy::too_many_arguments)]
    fn record_attachment(
        &mut self,
        bh: &mut Behavior,
        exec: &mut QueueExecState,
        fb: &FramebufferRecord,
        rp: &RenderPassState,
        ai: u32,
        si: usize,
        load_subpass: &mut HashMap<u32, usize>,
        store_subpass: &mut HashMap<u32, usize>,
        store_info: &mut HashMap<u32, Rc<SubpassAttachmentInfo>>,
    ) -> Option<Rc<SubpassAttachmentInfo>> {
        let Some(view) = fb.attachments.get(ai as usize) else {
            error!(attachment = ai, "attachment index out of framebuffer bounds");
            return None;
        };
        let Some(&desc) = rp.attachments.get(ai as usize) else {
            error!(attachment = ai, "attachment index out of render pass bounds");
            return None;
        };
        let view = view.clone();
        let (layout, data) = self.get_image_layout_and_data(Some(bh), view.image);
        let full_image_data = attachment_fully_covers_image(&view, fb);
        let attachment = Rc::new(SubpassAttachmentInfo {
            full_image_data,
            data,
            layout,
            desc,
        });
        if let std::collections::hash_map::Entry::Vacant(e) = load_subpass.entry(ai) {
            e.insert(si);
            exec.subpasses[si].load_attachments.push(attachment.clone());
        }
        store_subpass.insert(ai, si);
        store_info.insert(ai, attachment.clone());
        Some(attachment)
    }

    /// Apply load-op semantics for every attachment first used by the
    /// current subpass.
    fn start_subpass(&mut self, bh: &mut Behavior, exec: &mut QueueExecState) {
        self.tracker.write(bh, &[Var::Id(exec.subpass_var)]);
        let spi = exec.subpass_index;
        let Some(subpass) = exec.subpasses.get(spi) else {
            error!(subpass = spi, "subpass index out of range");
            return;
        };
        let loads = subpass.load_attachments.clone();
        let depth_stencil = subpass.depth_stencil_attachment.clone();
        for attachment in loads {
            let is_depth_stencil = depth_stencil
                .as_ref()
                .map_or(false, |ds| Rc::ptr_eq(ds, &attachment));
            // TODO: not every subpass transitions the attachment layout.
            self.tracker.modify(bh, &[Var::Id(attachment.layout)]);
            let load = is_load(attachment.desc.load_op);
            let stencil_load = is_load(attachment.desc.stencil_load_op);
            if is_depth_stencil {
                if load && stencil_load {
                    self.tracker.read(bh, &attachment.data);
                } else if !load && !stencil_load {
                    if attachment.full_image_data {
                        self.tracker.write(bh, &attachment.data);
                    } else {
                        self.tracker.modify(bh, &attachment.data);
                    }
                } else {
                    self.tracker.modify(bh, &attachment.data);
                }
            } else if load {
                self.tracker.read(bh, &attachment.data);
            } else if attachment.full_image_data {
                self.tracker.write(bh, &attachment.data);
            } else {
                self.tracker.modify(bh, &attachment.data);
            }
        }
    }

    /// Store-op behavior for one color/resolve/input attachment: one behavior
    /// for the layout dependency and one for the data. Resolve attachments
    /// additionally read their paired color attachment.
    fn store_attachment_output(
        &mut self,
        ft: &mut Footprint,
        sc: &SubmittedCommand,
        info: &QueueSubmitInfo,
        subpass_var: VarId,
        attachment: &Rc<SubpassAttachmentInfo>,
        read_attachment: Option<&Rc<SubpassAttachmentInfo>>,
    ) {
        let mut layout_bh = self.new_submitted_behavior(sc, info);
        self.tracker
            .modify(&mut layout_bh, &[Var::Id(attachment.layout)]);
        self.tracker.read(&mut layout_bh, &[Var::Id(subpass_var)]);
        ft.add_behavior(&mut self.tracker, layout_bh);

        let mut data_bh = self.new_submitted_behavior(sc, info);
        if let Some(read_attachment) = read_attachment {
            self.tracker.read(&mut data_bh, &read_attachment.data);
        }
        if is_store(attachment.desc.store_op) {
            self.tracker.modify(&mut data_bh, &attachment.data);
        } else if attachment.full_image_data {
            // A discarded attachment covering the whole image clears it,
            // which is a plain write.
            self.tracker.write(&mut data_bh, &attachment.data);
        } else {
            self.tracker.modify(&mut data_bh, &attachment.data);
        }
        self.tracker.read(&mut data_bh, &[Var::Id(subpass_var)]);
        ft.add_behavior(&mut self.tracker, data_bh);
    }

    fn store_depth_stencil_output(
        &mut self,
        ft: &mut Footprint,
        sc: &SubmittedCommand,
        info: &QueueSubmitInfo,
        subpass_var: VarId,
        attachment: &Rc<SubpassAttachmentInfo>,
    ) {
        let mut bh = self.new_submitted_behavior(sc, info);
        if is_store(attachment.desc.store_op) || is_store(attachment.desc.stencil_store_op) {
            self.tracker.modify(&mut bh, &attachment.data);
        } else if attachment.full_image_data {
            self.tracker.write(&mut bh, &attachment.data);
        } else {
            self.tracker.modify(&mut bh, &attachment.data);
        }
        self.tracker.read(&mut bh, &[Var::Id(subpass_var)]);
        ft.add_behavior(&mut self.tracker, bh);
    }

    /// Apply store-op semantics for every attachment last used by the current
    /// subpass, plus the flush of storage-descriptor data modified during it.
    fn emit_subpass_output(
        &mut self,
        ft: &mut Footprint,
        sc: &SubmittedCommand,
        info: &QueueSubmitInfo,
        exec: &QueueExecState,
    ) {
        let spi = exec.subpass_index;
        let Some(subpass) = exec.subpasses.get(spi) else {
            return;
        };
        let stores = subpass.store_attachments.clone();
        let resolves = subpass.resolve_attachments.clone();
        let colors = subpass.color_attachments.clone();
        let inputs = subpass.input_attachments.clone();
        let depth_stencil = subpass.depth_stencil_attachment.clone();
        let modified = subpass.modified_descriptor_data.clone();
        let subpass_var = exec.subpass_var;

        let stored = |attachment: &Rc<SubpassAttachmentInfo>| {
            stores.iter().any(|s| Rc::ptr_eq(s, attachment))
        };

        for (i, resolve) in resolves.iter().enumerate() {
            if stored(resolve) {
                let paired_color = colors.get(i);
                self.store_attachment_output(ft, sc, info, subpass_var, resolve, paired_color);
            }
        }
        for color in &colors {
            if stored(color) {
                self.store_attachment_output(ft, sc, info, subpass_var, color, None);
            }
        }
        for input in &inputs {
            if stored(input) {
                self.store_attachment_output(ft, sc, info, subpass_var, input, None);
            }
        }
        if let Some(ds) = &depth_stencil {
            if stored(ds) {
                self.store_depth_stencil_output(ft, sc, info, subpass_var, ds);
            }
        }
        for datum in modified {
            let mut bh = self.new_submitted_behavior(sc, info);
            self.tracker.modify(&mut bh, &[datum]);
            self.tracker.read(&mut bh, &[Var::Id(subpass_var)]);
            ft.add_behavior(&mut self.tracker, bh);
        }
    }

    fn end_subpass(
        &mut self,
        ft: &mut Footprint,
        bh: &mut Behavior,
        sc: &SubmittedCommand,
        info: &QueueSubmitInfo,
        exec: &QueueExecState,
    ) {
        self.emit_subpass_output(ft, sc, info, exec);
        self.tracker.read(bh, &[Var::Id(exec.subpass_var)]);
    }

    fn clear_attachment_data(
        &mut self,
        bh: &mut Behavior,
        exec: &QueueExecState,
        attachment: &ClearAttachment,
        rects: &[ClearRect],
    ) {
        let Some(subpass) = exec.subpasses.get(exec.subpass_index) else {
            error!("clear attachments outside of a render pass subpass");
            return;
        };
        let aspect = vk::ImageAspectFlags::from_raw(attachment.aspect_mask);
        let covered = |fb: &Option<FramebufferRecord>| {
            fb.as_ref()
                .map(|fb| rects.iter().any(|r| framebuffer_covered_by_clear_rect(fb, r)))
                .unwrap_or(false)
        };
        if aspect == vk::ImageAspectFlags::DEPTH || aspect == vk::ImageAspectFlags::STENCIL {
            if let Some(ds) = &subpass.depth_stencil_attachment {
                let data = ds.data.clone();
                self.tracker.modify(bh, &data);
            }
        } else if aspect == vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL {
            if let Some(ds) = &subpass.depth_stencil_attachment {
                let overwritten = covered(&exec.framebuffer);
                let data = ds.data.clone();
                if overwritten && ds.full_image_data {
                    self.tracker.write(bh, &data);
                } else {
                    self.tracker.modify(bh, &data);
                }
            }
        } else if attachment.color_attachment != vk::ATTACHMENT_UNUSED {
            let Some(color) = subpass
                .color_attachments
                .get(attachment.color_attachment as usize)
            else {
                error!(
                    attachment = attachment.color_attachment,
                    "cleared color attachment not bound in current subpass"
                );
                return;
            };
            let overwritten = covered(&exec.framebuffer);
            let data = color.data.clone();
            if overwritten && color.full_image_data {
                self.tracker.write(bh, &data);
            } else {
                self.tracker.modify(bh, &data);
            }
        }
    }
}
