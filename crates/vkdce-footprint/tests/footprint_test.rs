//! Integration tests: FootprintBuilder
//!
//! Drives the builder with hand-written command sequences through a mock
//! collaborator (no real trace, no GPU) and checks the dependency shape of
//! the resulting footprint: def-use edges, liveness pinning, execution-order
//! handling, and the write-vs-modify coverage rules.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Once;

use ash::vk;

use vkdce_footprint::{
    Footprint, FootprintBuilder, FootprintError, FootprintOptions, MutationContext,
    MutationOutcome, VarId,
};
use vkdce_protocol::commands::*;
use vkdce_protocol::handle::{SubCmdIdx, TraceHandle};
use vkdce_protocol::snapshot::*;

static INIT: Once = Once::new();

/// Run with VKDCE_LOG=debug -- --nocapture to see the stamped edges.
fn init_logging() {
    INIT.call_once(vkdce_common::logging::init_logging);
}

fn h(raw: u64) -> TraceHandle {
    TraceHandle(raw)
}

// ── mock collaborator ───────────────────────────────────────

#[derive(Default)]
struct MockTrace {
    images: HashMap<TraceHandle, ImageState>,
    buffers: HashMap<TraceHandle, BufferState>,
    image_views: HashMap<TraceHandle, ImageViewState>,
    framebuffers: HashMap<TraceHandle, FramebufferState>,
    render_passes: HashMap<TraceHandle, RenderPassState>,
    set_layouts: HashMap<TraceHandle, DescriptorSetLayoutState>,
    memories: HashMap<TraceHandle, DeviceMemoryState>,
    swapchains: HashMap<TraceHandle, SwapchainState>,
    semaphores: HashSet<TraceHandle>,
    last_draw_fb: Option<TraceHandle>,
    /// One entry per upcoming QueueSubmit/SetEvent, in order.
    executed: VecDeque<Vec<SubCmdIdx>>,
    observations: Vec<MemoryObservation>,
}

impl MutationContext for MockTrace {
    fn mutate(&mut self, _id: u64, cmd: &Command) -> Result<MutationOutcome, FootprintError> {
        match cmd {
            Command::QueueSubmit { .. } | Command::SetEvent { .. } => Ok(
                MutationOutcome::with_executed(self.executed.pop_front().unwrap_or_default()),
            ),
            _ => Ok(MutationOutcome::none()),
        }
    }

    fn image(&self, image: TraceHandle) -> Option<ImageState> {
        self.images.get(&image).cloned()
    }

    fn buffer(&self, buffer: TraceHandle) -> Option<BufferState> {
        self.buffers.get(&buffer).copied()
    }

    fn image_view(&self, view: TraceHandle) -> Option<ImageViewState> {
        self.image_views.get(&view).copied()
    }

    fn framebuffer(&self, framebuffer: TraceHandle) -> Option<FramebufferState> {
        self.framebuffers.get(&framebuffer).cloned()
    }

    fn render_pass(&self, render_pass: TraceHandle) -> Option<RenderPassState> {
        self.render_passes.get(&render_pass).cloned()
    }

    fn descriptor_set_layout(&self, layout: TraceHandle) -> Option<DescriptorSetLayoutState> {
        self.set_layouts.get(&layout).cloned()
    }

    fn device_memory(&self, memory: TraceHandle) -> Option<DeviceMemoryState> {
        self.memories.get(&memory).copied()
    }

    fn swapchain(&self, swapchain: TraceHandle) -> Option<SwapchainState> {
        self.swapchains.get(&swapchain).cloned()
    }

    fn semaphore_known(&self, semaphore: TraceHandle) -> bool {
        self.semaphores.contains(&semaphore)
    }

    fn last_draw_framebuffer(&self) -> Option<TraceHandle> {
        self.last_draw_fb
    }

    fn read_observations(&self) -> Vec<MemoryObservation> {
        self.observations.clone()
    }
}

// ── mock state helpers ──────────────────────────────────────

fn image_2d(width: u32, height: u32, memory_size: u64) -> ImageState {
    ImageState {
        info: ImageCreateInfo {
            flags: 0,
            image_type: vk::ImageType::TYPE_2D.as_raw(),
            format: vk::Format::R8G8B8A8_UNORM.as_raw(),
            extent: Extent3d {
                width,
                height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: 1,
            tiling: 0,
            usage: 0,
            initial_layout: 0,
        },
        memory_size,
        block_size: 0x10000,
        sparse_requirements: Vec::new(),
    }
}

fn color_view(image: TraceHandle) -> ImageViewState {
    ImageViewState {
        image,
        view_type: vk::ImageViewType::TYPE_2D.as_raw(),
        subresource_range: ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR.as_raw(),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
    }
}

fn color_pass() -> RenderPassState {
    RenderPassState {
        attachments: vec![AttachmentDescription {
            flags: 0,
            format: vk::Format::R8G8B8A8_UNORM.as_raw(),
            samples: 1,
            load_op: vk::AttachmentLoadOp::CLEAR.as_raw(),
            store_op: vk::AttachmentStoreOp::STORE.as_raw(),
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE.as_raw(),
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE.as_raw(),
            initial_layout: 0,
            final_layout: 0,
        }],
        subpasses: vec![SubpassDescription {
            flags: 0,
            pipeline_bind_point: 0,
            input_attachments: Vec::new(),
            color_attachments: vec![AttachmentReference {
                attachment: 0,
                layout: 0,
            }],
            resolve_attachments: Vec::new(),
            depth_stencil_attachment: None,
            preserve_attachments: Vec::new(),
        }],
    }
}

fn unmapped_memory(size: u64) -> DeviceMemoryState {
    DeviceMemoryState {
        size,
        coherent: false,
        mapped_offset: 0,
        mapped_size: 0,
        mapped_address: 0,
    }
}

fn full_color_copy(extent: u32) -> ImageCopy {
    let layers = ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR.as_raw(),
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    };
    ImageCopy {
        src_subresource: layers,
        src_offset: Offset3d { x: 0, y: 0, z: 0 },
        dst_subresource: layers,
        dst_offset: Offset3d { x: 0, y: 0, z: 0 },
        extent: Extent3d {
            width: extent,
            height: extent,
            depth: 1,
        },
    }
}

// ── footprint analysis helpers ──────────────────────────────

/// For each behavior, the indices of the behaviors it depends on, resolved
/// the way the pruner resolves them: reads attach to the most recent writer
/// at that point in the stream.
fn dependency_edges(ft: &Footprint) -> Vec<HashSet<usize>> {
    let mut def: HashMap<VarId, usize> = HashMap::new();
    let mut deps = Vec::new();
    for (i, behavior) in ft.behaviors().iter().enumerate() {
        let mut edges = HashSet::new();
        for read in &behavior.reads {
            if let Some(&writer) = def.get(read) {
                edges.insert(writer);
            }
        }
        for write in &behavior.writes {
            def.insert(*write, i);
        }
        deps.push(edges);
    }
    deps
}

/// The behaviors a pruner would keep: alive behaviors plus the final one
/// (the user-requested observation point), and everything they transitively
/// depend on.
fn live_set(ft: &Footprint) -> HashSet<usize> {
    let deps = dependency_edges(ft);
    let mut stack: Vec<usize> = ft
        .behaviors()
        .iter()
        .enumerate()
        .filter(|(i, b)| b.alive || *i + 1 == ft.len())
        .map(|(i, _)| i)
        .collect();
    let mut live = HashSet::new();
    while let Some(i) = stack.pop() {
        if live.insert(i) {
            stack.extend(deps[i].iter().copied());
        }
    }
    live
}

fn find_behavior(ft: &Footprint, owner: &[u64]) -> Option<usize> {
    ft.behaviors().iter().position(|b| b.owner.0 == owner)
}

fn behaviors_with_owner(ft: &Footprint, owner: &[u64]) -> Vec<usize> {
    ft.behaviors()
        .iter()
        .enumerate()
        .filter(|(_, b)| b.owner.0 == owner)
        .map(|(i, _)| i)
        .collect()
}

fn run(
    builder: &mut FootprintBuilder,
    mock: &mut MockTrace,
    ft: &mut Footprint,
    commands: Vec<(u64, Command)>,
) {
    for (id, cmd) in commands {
        builder.build_footprint(mock, ft, id, &cmd);
    }
}

/// The render-pass-with-one-draw sequence of the dead/live draw scenarios.
/// Returns the commands; the submit gets id 13.
fn draw_scenario_commands() -> Vec<(u64, Command)> {
    vec![
        (1, Command::CreateImage {
            image: h(1),
            info: image_2d(512, 512, 4096).info,
        }),
        (2, Command::AllocateMemory {
            memory: h(2),
            size: 4096,
            memory_type_index: 0,
        }),
        (3, Command::BindImageMemory {
            image: h(1),
            memory: h(2),
            memory_offset: 0,
        }),
        (4, Command::CreateImageView {
            view: h(4),
            image: h(1),
            view_type: vk::ImageViewType::TYPE_2D.as_raw(),
            format: vk::Format::R8G8B8A8_UNORM.as_raw(),
            subresource_range: color_view(h(1)).subresource_range,
        }),
        (5, Command::CreateRenderPass { render_pass: h(5) }),
        (6, Command::CreateFramebuffer {
            framebuffer: h(6),
            render_pass: h(5),
            attachments: vec![h(4)],
            width: 512,
            height: 512,
            layers: 1,
        }),
        (7, Command::AllocateCommandBuffers {
            command_buffers: vec![h(7)],
        }),
        (8, Command::BeginCommandBuffer { command_buffer: h(7) }),
        (9, Command::CmdBeginRenderPass {
            command_buffer: h(7),
            render_pass: h(5),
            framebuffer: h(6),
        }),
        (10, Command::CmdDraw {
            command_buffer: h(7),
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }),
        (11, Command::CmdEndRenderPass { command_buffer: h(7) }),
        (12, Command::EndCommandBuffer { command_buffer: h(7) }),
        (13, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: vec![h(7)],
                signal_semaphores: Vec::new(),
            }],
            fence: TraceHandle::NULL,
        }),
    ]
}

fn draw_scenario_mock() -> MockTrace {
    let mut mock = MockTrace::default();
    mock.images.insert(h(1), image_2d(512, 512, 4096));
    mock.memories.insert(h(2), unmapped_memory(4096));
    mock.image_views.insert(h(4), color_view(h(1)));
    mock.render_passes.insert(h(5), color_pass());
    mock.framebuffers.insert(h(6), FramebufferState {
        render_pass: h(5),
        attachments: vec![h(4)],
        width: 512,
        height: 512,
        layers: 1,
    });
    mock.executed.push_back(vec![
        SubCmdIdx::new(vec![13, 0, 0, 0]),
        SubCmdIdx::new(vec![13, 0, 0, 1]),
        SubCmdIdx::new(vec![13, 0, 0, 2]),
    ]);
    mock
}

// ── scenarios ───────────────────────────────────────────────

#[test]
fn dead_draw_is_pruner_eligible() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = draw_scenario_mock();
    let mut ft = Footprint::new();
    run(&mut builder, &mut mock, &mut ft, draw_scenario_commands());

    let draw = find_behavior(&ft, &[13, 0, 0, 1]).expect("draw behavior stamped");
    let draw_behavior = &ft.behaviors()[draw];
    assert!(!draw_behavior.alive, "draw must not be pinned by itself");
    assert!(
        !draw_behavior.writes.is_empty(),
        "draw must write the attachment backing data"
    );
    // Nothing observes the image afterwards: the draw is prunable.
    assert!(
        !live_set(&ft).contains(&draw),
        "dead draw must not be in the live set"
    );
}

#[test]
fn last_draw_pin_keeps_the_draw_live() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = draw_scenario_mock();
    let mut ft = Footprint::new();
    run(&mut builder, &mut mock, &mut ft, draw_scenario_commands());

    // The global state now reports framebuffer 6 as the last-draw target;
    // the next command triggers the retention behavior.
    mock.last_draw_fb = Some(h(6));
    builder.build_footprint(
        &mut mock,
        &mut ft,
        14,
        &Command::EnumerateInstanceLayerProperties,
    );

    let draw = find_behavior(&ft, &[13, 0, 0, 1]).expect("draw behavior stamped");
    assert!(
        live_set(&ft).contains(&draw),
        "pinned framebuffer data must keep the draw live"
    );
}

#[test]
fn full_copy_overwrites_partial_copy_modifies() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    let pixels = 512u64 * 512 * 4;
    mock.images.insert(h(10), image_2d(512, 512, pixels));
    mock.images.insert(h(11), image_2d(512, 512, pixels));
    mock.memories.insert(h(12), unmapped_memory(pixels));
    mock.memories.insert(h(13), unmapped_memory(pixels));
    mock.executed.push_back(vec![
        SubCmdIdx::new(vec![28, 0, 0, 0]),
        SubCmdIdx::new(vec![28, 0, 0, 1]),
    ]);
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (20, Command::CreateImage { image: h(10), info: image_2d(512, 512, pixels).info }),
        (21, Command::CreateImage { image: h(11), info: image_2d(512, 512, pixels).info }),
        (22, Command::BindImageMemory { image: h(10), memory: h(12), memory_offset: 0 }),
        (23, Command::BindImageMemory { image: h(11), memory: h(13), memory_offset: 0 }),
        // Establish a recorded write covering the source image data.
        (24, Command::FlushMappedMemoryRanges {
            ranges: vec![MappedMemoryRange { memory: h(12), offset: 0, size: pixels }],
        }),
        (25, Command::AllocateCommandBuffers { command_buffers: vec![h(14)] }),
        (26, Command::BeginCommandBuffer { command_buffer: h(14) }),
        (27, Command::CmdCopyImage {
            command_buffer: h(14),
            src_image: h(10),
            dst_image: h(11),
            regions: vec![full_color_copy(512)],
        }),
        (27, Command::CmdCopyImage {
            command_buffer: h(14),
            src_image: h(10),
            dst_image: h(11),
            regions: vec![full_color_copy(256)],
        }),
        (28, Command::EndCommandBuffer { command_buffer: h(14) }),
        (28, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: vec![h(14)],
                signal_semaphores: Vec::new(),
            }],
            fence: TraceHandle::NULL,
        }),
    ]);

    let flush = find_behavior(&ft, &[24]).expect("flush behavior");
    let full = find_behavior(&ft, &[28, 0, 0, 0]).expect("full copy behavior");
    let partial = find_behavior(&ft, &[28, 0, 0, 1]).expect("partial copy behavior");
    let deps = dependency_edges(&ft);
    // Both copies read the source data written by the flush.
    assert!(deps[full].contains(&flush));
    assert!(deps[partial].contains(&flush));
    // The full copy is a plain write: it does not read the destination. The
    // quarter copy modifies, so it depends on the full copy's write.
    assert!(deps[partial].contains(&full));
}

#[test]
fn repeated_full_copies_do_not_chain() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    let pixels = 512u64 * 512 * 4;
    mock.images.insert(h(10), image_2d(512, 512, pixels));
    mock.images.insert(h(11), image_2d(512, 512, pixels));
    mock.memories.insert(h(12), unmapped_memory(pixels));
    mock.memories.insert(h(13), unmapped_memory(pixels));
    mock.executed.push_back(vec![
        SubCmdIdx::new(vec![28, 0, 0, 0]),
        SubCmdIdx::new(vec![28, 0, 0, 1]),
    ]);
    let mut ft = Footprint::new();

    let copy = Command::CmdCopyImage {
        command_buffer: h(14),
        src_image: h(10),
        dst_image: h(11),
        regions: vec![full_color_copy(512)],
    };
    run(&mut builder, &mut mock, &mut ft, vec![
        (20, Command::CreateImage { image: h(10), info: image_2d(512, 512, pixels).info }),
        (21, Command::CreateImage { image: h(11), info: image_2d(512, 512, pixels).info }),
        (22, Command::BindImageMemory { image: h(10), memory: h(12), memory_offset: 0 }),
        (23, Command::BindImageMemory { image: h(11), memory: h(13), memory_offset: 0 }),
        (25, Command::AllocateCommandBuffers { command_buffers: vec![h(14)] }),
        (26, Command::BeginCommandBuffer { command_buffer: h(14) }),
        (27, copy.clone()),
        (27, copy),
        (28, Command::EndCommandBuffer { command_buffer: h(14) }),
        (28, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: vec![h(14)],
                signal_semaphores: Vec::new(),
            }],
            fence: TraceHandle::NULL,
        }),
    ]);

    let first = find_behavior(&ft, &[28, 0, 0, 0]).expect("first copy behavior");
    let second = find_behavior(&ft, &[28, 0, 0, 1]).expect("second copy behavior");
    let deps = dependency_edges(&ft);
    // A full overwrite does not read what the previous full overwrite wrote.
    assert!(!deps[second].contains(&first));
}

#[test]
fn semaphore_chaining_across_submits() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    mock.semaphores.insert(h(5));
    mock.buffers.insert(h(40), BufferState { size: 1024 });
    mock.memories.insert(h(41), unmapped_memory(1024));
    // Submit A carries no commands; submit B runs the recorded fill.
    mock.executed.push_back(Vec::new());
    mock.executed
        .push_back(vec![SubCmdIdx::new(vec![40, 0, 0, 0])]);
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (30, Command::CreateSemaphore { semaphore: h(5) }),
        (31, Command::CreateFence { fence: h(6), signaled: false }),
        (32, Command::CreateBuffer { buffer: h(40), size: 1024, usage: 0 }),
        (33, Command::AllocateMemory { memory: h(41), size: 1024, memory_type_index: 0 }),
        (34, Command::BindBufferMemory { buffer: h(40), memory: h(41), memory_offset: 0 }),
        (35, Command::AllocateCommandBuffers { command_buffers: vec![h(42)] }),
        (36, Command::BeginCommandBuffer { command_buffer: h(42) }),
        (37, Command::CmdFillBuffer { command_buffer: h(42), buffer: h(40), offset: 0, size: 1024 }),
        (38, Command::EndCommandBuffer { command_buffer: h(42) }),
        (39, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: Vec::new(),
                signal_semaphores: vec![h(5)],
            }],
            fence: TraceHandle::NULL,
        }),
        (40, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: vec![h(5)],
                wait_dst_stage_masks: vec![0],
                command_buffers: vec![h(42)],
                signal_semaphores: Vec::new(),
            }],
            fence: h(6),
        }),
        (41, Command::WaitForFences { fences: vec![h(6)] }),
    ]);

    let submit_a = find_behavior(&ft, &[39]).expect("submit A behavior");
    let b_behaviors = behaviors_with_owner(&ft, &[40]);
    // Submit B: the top-level behavior, the execution-begin behavior, and
    // the terminal signal behavior.
    assert_eq!(b_behaviors.len(), 3);
    let begin = b_behaviors[1];
    let terminal = b_behaviors[2];

    let deps = dependency_edges(&ft);
    // B's first executed behavior modifies the semaphore signal A wrote.
    assert!(deps[begin].contains(&submit_a));
    // The fence wait observes the terminal behavior's fence-signal write.
    let wait = find_behavior(&ft, &[41]).expect("wait behavior");
    assert!(deps[wait].contains(&terminal));
    assert!(ft.behaviors()[wait].alive);
}

#[test]
fn dynamic_offset_selects_the_buffer_range() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    mock.buffers.insert(h(20), BufferState { size: 1024 });
    mock.memories.insert(h(60), unmapped_memory(1024));
    mock.set_layouts.insert(h(30), DescriptorSetLayoutState {
        bindings: vec![DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC.as_raw(),
            descriptor_count: 1,
            stage_flags: 0,
            immutable_samplers: Vec::new(),
        }],
    });
    mock.executed.push_back(vec![
        SubCmdIdx::new(vec![64, 0, 0, 0]),
        SubCmdIdx::new(vec![64, 0, 0, 1]),
    ]);
    let mut ft = Footprint::new();

    let update = Command::UpdateDescriptorSets {
        writes: vec![WriteDescriptorSet {
            dst_set: h(31),
            dst_binding: 0,
            dst_array_element: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC.as_raw(),
            image_infos: Vec::new(),
            buffer_infos: vec![DescriptorBufferInfo {
                buffer: h(20),
                offset: 0,
                range: 256,
            }],
            texel_buffer_views: Vec::new(),
        }],
        copies: Vec::new(),
    };
    run(&mut builder, &mut mock, &mut ft, vec![
        (50, Command::AllocateMemory { memory: h(60), size: 1024, memory_type_index: 0 }),
        (51, Command::CreateBuffer { buffer: h(20), size: 1024, usage: 0 }),
        (52, Command::BindBufferMemory { buffer: h(20), memory: h(60), memory_offset: 0 }),
        // Three disjoint recorded writes; only the middle one covers the
        // dynamically-offset descriptor range [64, 320).
        (53, Command::FlushMappedMemoryRanges {
            ranges: vec![MappedMemoryRange { memory: h(60), offset: 0, size: 64 }],
        }),
        (54, Command::FlushMappedMemoryRanges {
            ranges: vec![MappedMemoryRange { memory: h(60), offset: 64, size: 256 }],
        }),
        (55, Command::FlushMappedMemoryRanges {
            ranges: vec![MappedMemoryRange { memory: h(60), offset: 320, size: 704 }],
        }),
        (56, Command::CreateDescriptorSetLayout {
            layout: h(30),
            bindings: vec![DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC.as_raw(),
                descriptor_count: 1,
                stage_flags: 0,
                immutable_samplers: Vec::new(),
            }],
        }),
        (57, Command::AllocateDescriptorSets {
            sets: vec![h(31)],
            layouts: vec![h(30)],
        }),
        // Identical updates back to back must leave the same dependency
        // shape as a single one.
        (58, update.clone()),
        (59, update),
        (60, Command::AllocateCommandBuffers { command_buffers: vec![h(32)] }),
        (61, Command::BeginCommandBuffer { command_buffer: h(32) }),
        (62, Command::CmdBindDescriptorSets {
            command_buffer: h(32),
            layout: h(33),
            first_set: 0,
            sets: vec![h(31)],
            dynamic_offsets: vec![64],
        }),
        (63, Command::CmdDispatch {
            command_buffer: h(32),
            group_count_x: 1,
            group_count_y: 1,
            group_count_z: 1,
        }),
        (63, Command::EndCommandBuffer { command_buffer: h(32) }),
        (64, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: vec![h(32)],
                signal_semaphores: Vec::new(),
            }],
            fence: TraceHandle::NULL,
        }),
    ]);

    let flush_low = find_behavior(&ft, &[53]).expect("low flush");
    let flush_mid = find_behavior(&ft, &[54]).expect("mid flush");
    let flush_high = find_behavior(&ft, &[55]).expect("high flush");
    let dispatch = find_behavior(&ft, &[64, 0, 0, 1]).expect("dispatch behavior");
    let deps = dependency_edges(&ft);
    assert!(
        deps[dispatch].contains(&flush_mid),
        "dispatch must read the [64, 320) range selected by the dynamic offset"
    );
    assert!(!deps[dispatch].contains(&flush_low));
    assert!(!deps[dispatch].contains(&flush_high));
}

#[test]
fn secondary_command_buffers_interleave_in_order() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    mock.executed.push_back(vec![
        SubCmdIdx::new(vec![81, 0, 0, 0]),
        SubCmdIdx::new(vec![81, 0, 0, 0, 0, 0]),
        SubCmdIdx::new(vec![81, 0, 0, 0, 0, 1]),
        SubCmdIdx::new(vec![81, 0, 0, 0, 1, 0]),
    ]);
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (70, Command::AllocateCommandBuffers { command_buffers: vec![h(7), h(8), h(9)] }),
        (71, Command::BeginCommandBuffer { command_buffer: h(8) }),
        (72, Command::CmdSetViewport { command_buffer: h(8) }),
        (73, Command::CmdSetViewport { command_buffer: h(8) }),
        (74, Command::EndCommandBuffer { command_buffer: h(8) }),
        (75, Command::BeginCommandBuffer { command_buffer: h(9) }),
        (76, Command::CmdSetViewport { command_buffer: h(9) }),
        (77, Command::EndCommandBuffer { command_buffer: h(9) }),
        (78, Command::BeginCommandBuffer { command_buffer: h(7) }),
        (79, Command::CmdExecuteCommands {
            command_buffer: h(7),
            command_buffers: vec![h(8), h(9)],
        }),
        (80, Command::EndCommandBuffer { command_buffer: h(7) }),
        (81, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: vec![h(7)],
                signal_semaphores: Vec::new(),
            }],
            fence: TraceHandle::NULL,
        }),
    ]);

    let d1 = find_behavior(&ft, &[81, 0, 0, 0, 0, 0]).expect("first secondary command");
    let d2 = find_behavior(&ft, &[81, 0, 0, 0, 0, 1]).expect("second secondary command");
    let d3 = find_behavior(&ft, &[81, 0, 0, 0, 1, 0]).expect("third secondary command");
    assert!(d1 < d2 && d2 < d3, "secondary commands replay in order");

    // Each secondary command reads its parent CmdExecuteCommands.
    let exec_record = find_behavior(&ft, &[79]).expect("execute-commands record behavior");
    let deps = dependency_edges(&ft);
    for idx in [d1, d2, d3] {
        assert!(deps[idx].contains(&exec_record));
    }
    // The full pending queue drained: submit, begin and terminal behaviors.
    assert_eq!(behaviors_with_owner(&ft, &[81]).len(), 3);
}

#[test]
fn execution_order_divergence_stops_rollout() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    // Report the second recorded command first.
    mock.executed
        .push_back(vec![SubCmdIdx::new(vec![85, 0, 0, 1])]);
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (82, Command::AllocateCommandBuffers { command_buffers: vec![h(7)] }),
        (83, Command::BeginCommandBuffer { command_buffer: h(7) }),
        (84, Command::CmdSetViewport { command_buffer: h(7) }),
        (84, Command::CmdSetViewport { command_buffer: h(7) }),
        (84, Command::EndCommandBuffer { command_buffer: h(7) }),
        (85, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: vec![h(7)],
                signal_semaphores: Vec::new(),
            }],
            fence: TraceHandle::NULL,
        }),
    ]);

    // Only the submit and execution-begin behaviors exist; no subcommand was
    // rolled out and no terminal behavior was emitted.
    assert_eq!(behaviors_with_owner(&ft, &[85]).len(), 2);
    assert!(find_behavior(&ft, &[85, 0, 0, 0]).is_none());
    assert!(find_behavior(&ft, &[85, 0, 0, 1]).is_none());
}

#[test]
fn reset_clears_recorded_commands() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    mock.executed
        .push_back(vec![SubCmdIdx::new(vec![95, 0, 0, 0])]);
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (90, Command::AllocateCommandBuffers { command_buffers: vec![h(7)] }),
        (91, Command::BeginCommandBuffer { command_buffer: h(7) }),
        (92, Command::CmdSetViewport { command_buffer: h(7) }),
        (92, Command::CmdSetViewport { command_buffer: h(7) }),
        (93, Command::ResetCommandBuffer { command_buffer: h(7) }),
        (94, Command::BeginCommandBuffer { command_buffer: h(7) }),
        (94, Command::CmdSetViewport { command_buffer: h(7) }),
        (94, Command::EndCommandBuffer { command_buffer: h(7) }),
        (95, Command::QueueSubmit {
            queue: h(3),
            submits: vec![SubmitInfo {
                wait_semaphores: Vec::new(),
                wait_dst_stage_masks: Vec::new(),
                command_buffers: vec![h(7)],
                signal_semaphores: Vec::new(),
            }],
            fence: TraceHandle::NULL,
        }),
    ]);

    // The single re-recorded command drains cleanly: submit, begin and
    // terminal behaviors all present, and no second subcommand exists.
    assert_eq!(behaviors_with_owner(&ft, &[95]).len(), 3);
    assert!(find_behavior(&ft, &[95, 0, 0, 0]).is_some());
    assert!(find_behavior(&ft, &[95, 0, 0, 1]).is_none());
}

#[test]
fn coherent_observation_marks_submit_alive_and_writes_memory() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    mock.memories.insert(h(120), DeviceMemoryState {
        size: 4096,
        coherent: true,
        mapped_offset: 0,
        mapped_size: 4096,
        mapped_address: 0x10000,
    });
    mock.executed.push_back(Vec::new());
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (110, Command::AllocateMemory { memory: h(120), size: 4096, memory_type_index: 0 }),
        (111, Command::MapMemory { memory: h(120), offset: 0, size: 4096 }),
    ]);

    // The collaborator observed the host writing into the mapped range while
    // applying the submit.
    mock.observations = vec![MemoryObservation {
        base: 0x10000 + 256,
        size: 128,
    }];
    builder.build_footprint(&mut mock, &mut ft, 112, &Command::QueueSubmit {
        queue: h(3),
        submits: Vec::new(),
        fence: TraceHandle::NULL,
    });
    mock.observations = Vec::new();

    builder.build_footprint(&mut mock, &mut ft, 113, &Command::InvalidateMappedMemoryRanges {
        ranges: vec![MappedMemoryRange { memory: h(120), offset: 256, size: 128 }],
    });

    let submit = find_behavior(&ft, &[112]).expect("submit behavior");
    assert!(
        ft.behaviors()[submit].alive,
        "coherent observations pin the submit"
    );
    let invalidate = find_behavior(&ft, &[113]).expect("invalidate behavior");
    let deps = dependency_edges(&ft);
    assert!(
        deps[invalidate].contains(&submit),
        "reading the invalidated range must observe the coherent write"
    );
}

#[test]
fn queue_present_keeps_the_acquire_present_pair_alive() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    mock.swapchains.insert(h(200), SwapchainState {
        images: vec![h(201)],
    });
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (120, Command::CreateSwapchain { swapchain: h(200) }),
        (121, Command::GetSwapchainImages {
            swapchain: h(200),
            images: vec![h(201)],
        }),
        (122, Command::AcquireNextImage {
            swapchain: h(200),
            semaphore: TraceHandle::NULL,
            fence: TraceHandle::NULL,
            image_index: 0,
        }),
        (123, Command::QueuePresent {
            queue: h(3),
            present: PresentInfo {
                wait_semaphores: Vec::new(),
                swapchains: vec![h(200)],
                image_indices: vec![0],
            },
        }),
    ]);

    // One extra behavior per presented image, emitted before the present's
    // own behavior; it must be pinned and write the presented label.
    let present = behaviors_with_owner(&ft, &[123]);
    assert_eq!(present.len(), 2);
    let extra = present[0];
    let main = present[1];
    assert!(ft.behaviors()[extra].alive);
    assert!(!ft.behaviors()[extra].writes.is_empty());
    assert!(!ft.behaviors()[main].alive);

    // The pair behavior reads the acquired label the acquire wrote.
    let acquire = find_behavior(&ft, &[122]).expect("acquire behavior");
    let deps = dependency_edges(&ft);
    assert!(deps[extra].contains(&acquire));
}

#[test]
fn unknown_commands_are_kept_alive() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    let mut ft = Footprint::new();
    builder.build_footprint(&mut mock, &mut ft, 1, &Command::Unknown {
        name: "vkCmdDrawMeshTasksEXT".to_string(),
    });
    assert_eq!(ft.len(), 1);
    assert!(ft.behaviors()[0].alive);
}

#[test]
fn destroy_commands_stay_alive_and_clear_shadow_state() {
    init_logging();
    let mut builder = FootprintBuilder::new(FootprintOptions::default());
    let mut mock = MockTrace::default();
    mock.images.insert(h(1), image_2d(64, 64, 4096));
    mock.memories.insert(h(2), unmapped_memory(4096));
    let mut ft = Footprint::new();

    run(&mut builder, &mut mock, &mut ft, vec![
        (1, Command::CreateImage { image: h(1), info: image_2d(64, 64, 4096).info }),
        (2, Command::AllocateMemory { memory: h(2), size: 4096, memory_type_index: 0 }),
        (3, Command::BindImageMemory { image: h(1), memory: h(2), memory_offset: 0 }),
        (4, Command::DestroyImage { image: h(1) }),
    ]);

    let destroy = find_behavior(&ft, &[4]).expect("destroy behavior");
    assert!(ft.behaviors()[destroy].alive);
    assert!(live_set(&ft).contains(&destroy));
}
