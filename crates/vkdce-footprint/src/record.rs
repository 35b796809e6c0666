//! Deferred command-buffer commands.
//!
//! A `vkCmd*` call cannot be stamped when it is recorded: its effect depends
//! on the queue state at submission time (active subpass, bound pipeline,
//! dynamic offsets). Recording therefore stores a [`RecordedOp`] carrying the
//! record-time inputs; the queue execution engine dispatches on it when the
//! submission is rolled out.

use std::cell::RefCell;
use std::rc::Rc;

use vkdce_protocol::commands::{ClearAttachment, ClearRect};
use vkdce_protocol::snapshot::RenderPassState;
use vkdce_protocol::handle::{
    SubCmdIdx, TraceHandle, VkCommandBuffer, VkFramebuffer, VkImage, VkImageView, VkRenderPass,
};

use crate::binding::ResBinding;
use crate::descriptor::DescriptorSetShadow;
use crate::graph::{Var, VarId};

/// Record-time snapshot of one framebuffer attachment: the view's range and
/// the viewed image's geometry, as needed for full-image-coverage decisions.
#[derive(Debug, Clone)]
pub struct AttachmentViewRecord {
    pub view: VkImageView,
    pub image: VkImage,
    pub view_type: i32,
    pub base_array_layer: u32,
    pub layer_count: u32,
    pub image_type: i32,
    pub image_array_layers: u32,
    pub image_width: u32,
    pub image_height: u32,
}

/// Record-time snapshot of the framebuffer named by a render-pass begin.
#[derive(Debug, Clone)]
pub struct FramebufferRecord {
    pub handle: VkFramebuffer,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub attachments: Vec<AttachmentViewRecord>,
}

/// The deferred effect of one recorded command, dispatched at rollout.
pub enum RecordedOp {
    /// Fixed read/write/modify sets captured at record time.
    ReadsWritesModifies {
        reads: Vec<Var>,
        writes: Vec<Var>,
        modifies: Vec<Var>,
    },
    /// Dynamic-state setters: modify the dynamic-state label.
    ModifyDynamicState,
    /// Commands without modeled semantics that must survive pruning.
    KeepAlive,
    /// Pipeline / wait-events barriers: one modify behavior per touched
    /// datum, each also reading the attached event labels.
    Barriers {
        touched: Vec<Var>,
        attached_reads: Vec<Var>,
    },
    BeginRenderPass {
        render_pass: VkRenderPass,
        render_pass_state: Box<RenderPassState>,
        framebuffer: FramebufferRecord,
    },
    NextSubpass,
    EndRenderPass,
    BindVertexBuffers {
        first_binding: u32,
        bindings: Vec<Rc<Vec<ResBinding>>>,
    },
    BindIndexBuffer {
        bindings: Rc<Vec<ResBinding>>,
        index_type: i32,
    },
    BindPipeline {
        pipeline: TraceHandle,
    },
    BindDescriptorSets {
        first_set: u32,
        sets: Vec<Option<Rc<RefCell<DescriptorSetShadow>>>>,
        dynamic_offsets: Vec<u32>,
    },
    Draw,
    DrawIndexed {
        first_index: u32,
        index_count: u32,
    },
    DrawIndirect {
        src: Vec<Var>,
    },
    DrawIndexedIndirect {
        src: Vec<Var>,
    },
    Dispatch,
    DispatchIndirect {
        src: Vec<Var>,
    },
    ClearAttachments {
        attachments: Vec<ClearAttachment>,
        rects: Vec<ClearRect>,
    },
    /// The primary-side `CmdExecuteCommands` itself has no deferred effect;
    /// the secondary buffers' commands are expanded at submit time.
    ExecuteCommands,
}

/// One recorded command of a command buffer. The command is a def-use
/// variable in its own right so a re-record invalidates stale submissions.
pub struct CmdBufCommand {
    pub var: VarId,
    pub op: RecordedOp,
    pub is_execute_commands: bool,
    pub secondary: Vec<VkCommandBuffer>,
}

/// One concrete invocation of a recorded command within a submission,
/// identified by its full subcommand index. Secondary-buffer commands carry
/// the `CmdExecuteCommands` that pulled them in.
pub struct SubmittedCommand {
    pub id: SubCmdIdx,
    pub cmd: Rc<CmdBufCommand>,
    pub parent: Option<Rc<CmdBufCommand>>,
}
