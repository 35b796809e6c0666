//! Descriptor-set shadow state: reservation from the set layout, updates with
//! binding-overflow carry, copies, and the per-type read/write semantics a
//! draw or dispatch applies when the set is consumed.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use ash::vk;
use tracing::error;

use vkdce_protocol::commands::{CopyDescriptorSet, WriteDescriptorSet};
use vkdce_protocol::handle::{TraceHandle, VkBuffer, VkImage};

use crate::binding::sub_binding_list;
use crate::builder::FootprintBuilder;
use crate::exec::CmdBufExecState;
use crate::graph::{Behavior, Var, VarId};
use crate::trace::MutationContext;

/// One descriptor slot's contents. The slot itself is a def-use variable so a
/// later update invalidates earlier consumers.
#[derive(Clone, Copy)]
pub struct Descriptor {
    pub ty: i32,
    pub image: VkImage,
    pub sampler: TraceHandle,
    pub buffer: VkBuffer,
    pub buf_offset: u64,
    pub buf_range: u64,
    pub var: VarId,
}

fn is_dynamic(ty: i32) -> bool {
    let ty = vk::DescriptorType::from_raw(ty);
    ty == vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        || ty == vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
}

/// Shadow of one descriptor set: reserved slot counts per binding and the
/// written slots. Bindings iterate in increasing order so dynamic offsets are
/// consumed the way they were supplied at bind time.
#[derive(Default)]
pub struct DescriptorSetShadow {
    descriptors: HashMap<(u64, u64), Descriptor>,
    descriptor_counts: BTreeMap<u64, u64>,
    dynamic_descriptor_count: u64,
}

impl DescriptorSetShadow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve one more slot in `binding`, per the set layout.
    pub fn reserve(&mut self, binding: u64) {
        *self.descriptor_counts.entry(binding).or_insert(0) += 1;
    }

    pub fn count(&self, binding: u64) -> u64 {
        self.descriptor_counts.get(&binding).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.descriptor_counts
            .iter()
            .map(|(&b, &c)| (b, c))
            .collect()
    }

    pub fn dynamic_descriptor_count(&self) -> u64 {
        self.dynamic_descriptor_count
    }

    pub fn peek(&self, binding: u64, index: u64) -> Option<Descriptor> {
        self.descriptors.get(&(binding, index)).copied()
    }

    fn replace(&mut self, binding: u64, index: u64, d: Descriptor) {
        if let Some(old) = self.descriptors.get(&(binding, index)) {
            if is_dynamic(old.ty) {
                self.dynamic_descriptor_count -= 1;
            }
        }
        if is_dynamic(d.ty) {
            self.dynamic_descriptor_count += 1;
        }
        self.descriptors.insert((binding, index), d);
    }
}

/// Advance `(binding, element)` to the next binding when the element index
/// runs past the binding's reserved slot count.
fn carry(set: &DescriptorSetShadow, binding: &mut u64, element: &mut u64) {
    if *element >= set.count(*binding) {
        *binding += 1;
        *element = 0;
    }
}

impl FootprintBuilder {
    fn set_descriptor(
        &mut self,
        bh: &mut Behavior,
        set: &Rc<RefCell<DescriptorSetShadow>>,
        binding: u64,
        element: u64,
        ty: i32,
        image: VkImage,
        sampler: TraceHandle,
        buffer: VkBuffer,
        buf_offset: u64,
        buf_range: u64,
    ) {
        let var = self.tracker.new_var();
        self.tracker.write(bh, &[Var::Id(var)]);
        set.borrow_mut().replace(
            binding,
            element,
            Descriptor {
                ty,
                image,
                sampler,
                buffer,
                buf_offset,
                buf_range,
                var,
            },
        );
    }

    /// Apply one `VkWriteDescriptorSet`, carrying `DstBinding` forward when
    /// `DstArrayElement` overflows the binding's reserved count.
    pub(crate) fn write_descriptors(
        &mut self,
        ctx: &dyn MutationContext,
        bh: &mut Behavior,
        set: &Rc<RefCell<DescriptorSetShadow>>,
        write: &WriteDescriptorSet,
    ) {
        let ty = vk::DescriptorType::from_raw(write.descriptor_type);
        let mut dst_binding = write.dst_binding as u64;
        let mut dst_elm = write.dst_array_element as u64;

        if ty == vk::DescriptorType::SAMPLER
            || ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            || ty == vk::DescriptorType::SAMPLED_IMAGE
            || ty == vk::DescriptorType::STORAGE_IMAGE
            || ty == vk::DescriptorType::INPUT_ATTACHMENT
        {
            for info in &write.image_infos {
                carry(&set.borrow(), &mut dst_binding, &mut dst_elm);
                let mut sampler = TraceHandle::NULL;
                let mut image = TraceHandle::NULL;
                if ty != vk::DescriptorType::SAMPLER
                    && self.tracker.read(bh, &[Var::Handle(info.image_view)])
                {
                    image = ctx
                        .image_view(info.image_view)
                        .map(|v| v.image)
                        .unwrap_or(TraceHandle::NULL);
                }
                if (ty == vk::DescriptorType::SAMPLER
                    || ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    && self.tracker.read(bh, &[Var::Handle(info.sampler)])
                {
                    sampler = info.sampler;
                }
                self.set_descriptor(
                    bh,
                    set,
                    dst_binding,
                    dst_elm,
                    write.descriptor_type,
                    image,
                    sampler,
                    TraceHandle::NULL,
                    0,
                    0,
                );
                dst_elm += 1;
            }
        } else if ty == vk::DescriptorType::UNIFORM_BUFFER
            || ty == vk::DescriptorType::STORAGE_BUFFER
            || ty == vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
            || ty == vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
        {
            for info in &write.buffer_infos {
                carry(&set.borrow(), &mut dst_binding, &mut dst_elm);
                self.tracker.read(bh, &[Var::Handle(info.buffer)]);
                if let Some(list) = self.buffers.get(&info.buffer) {
                    sub_binding_list(
                        list.as_slice(),
                        &mut self.tracker,
                        Some(bh),
                        info.offset,
                        info.range,
                    );
                }
                self.set_descriptor(
                    bh,
                    set,
                    dst_binding,
                    dst_elm,
                    write.descriptor_type,
                    TraceHandle::NULL,
                    TraceHandle::NULL,
                    info.buffer,
                    info.offset,
                    info.range,
                );
                dst_elm += 1;
            }
        } else if ty == vk::DescriptorType::UNIFORM_TEXEL_BUFFER
            || ty == vk::DescriptorType::STORAGE_TEXEL_BUFFER
        {
            for view in &write.texel_buffer_views {
                carry(&set.borrow(), &mut dst_binding, &mut dst_elm);
                self.tracker.read(bh, &[Var::Handle(*view)]);
                let (buffer, offset, range) = ctx
                    .buffer_view(*view)
                    .map(|v| (v.buffer, v.offset, v.range))
                    .unwrap_or((TraceHandle::NULL, 0, 0));
                self.set_descriptor(
                    bh,
                    set,
                    dst_binding,
                    dst_elm,
                    write.descriptor_type,
                    TraceHandle::NULL,
                    TraceHandle::NULL,
                    buffer,
                    offset,
                    range,
                );
                dst_elm += 1;
            }
        }
    }

    /// Apply one `VkCopyDescriptorSet` with parallel overflow carry on the
    /// source and destination cursors.
    pub(crate) fn copy_descriptors(
        &mut self,
        bh: &mut Behavior,
        dst: &Rc<RefCell<DescriptorSetShadow>>,
        src: &Rc<RefCell<DescriptorSetShadow>>,
        copy: &CopyDescriptorSet,
    ) {
        let mut dst_binding = copy.dst_binding as u64;
        let mut dst_elm = copy.dst_array_element as u64;
        let mut src_binding = copy.src_binding as u64;
        let mut src_elm = copy.src_array_element as u64;
        for _ in 0..copy.descriptor_count {
            carry(&dst.borrow(), &mut dst_binding, &mut dst_elm);
            carry(&src.borrow(), &mut src_binding, &mut src_elm);
            let d = src.borrow().peek(src_binding, src_elm);
            if let Some(d) = d {
                self.tracker.read(bh, &[Var::Id(d.var)]);
                self.set_descriptor(
                    bh,
                    dst,
                    dst_binding,
                    dst_elm,
                    d.ty,
                    d.image,
                    d.sampler,
                    d.buffer,
                    d.buf_offset,
                    d.buf_range,
                );
            }
            src_elm += 1;
            dst_elm += 1;
        }
    }

    /// Consume a bound set the way a draw or dispatch does. Returns the data
    /// variables the consumption may have modified (storage descriptors).
    pub(crate) fn use_descriptors(
        &mut self,
        bh: &mut Behavior,
        set: &Rc<RefCell<DescriptorSetShadow>>,
        dynamic_offsets: &[u32],
    ) -> Vec<Var> {
        let counts = set.borrow().counts();
        let mut modified = Vec::new();
        let mut doi = 0usize;
        for (binding, count) in counts {
            for di in 0..count {
                let d = set.borrow().peek(binding, di);
                let Some(d) = d else { continue };
                self.tracker.read(bh, &[Var::Id(d.var)]);
                self.tracker.read(bh, &[Var::Handle(d.sampler)]);
                let ty = vk::DescriptorType::from_raw(d.ty);
                if ty == vk::DescriptorType::STORAGE_IMAGE {
                    let data = self.get_image_data(Some(bh), d.image);
                    self.tracker.modify(bh, &data);
                    modified.extend(data);
                } else if ty == vk::DescriptorType::SAMPLER {
                    // sampler already read above
                } else if ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER
                    || ty == vk::DescriptorType::SAMPLED_IMAGE
                    || ty == vk::DescriptorType::INPUT_ATTACHMENT
                {
                    let data = self.get_image_data(Some(bh), d.image);
                    self.tracker.read(bh, &data);
                } else if ty == vk::DescriptorType::STORAGE_BUFFER
                    || ty == vk::DescriptorType::STORAGE_TEXEL_BUFFER
                {
                    let data = self.get_buffer_data(Some(bh), d.buffer, d.buf_offset, d.buf_range);
                    self.tracker.modify(bh, &data);
                    modified.extend(data);
                } else if ty == vk::DescriptorType::STORAGE_BUFFER_DYNAMIC {
                    if doi < dynamic_offsets.len() {
                        let offset = dynamic_offsets[doi] as u64 + d.buf_offset;
                        doi += 1;
                        let data = self.get_buffer_data(Some(bh), d.buffer, offset, d.buf_range);
                        self.tracker.modify(bh, &data);
                        modified.extend(data);
                    } else {
                        error!("descriptor set has more dynamic descriptors than bound offsets");
                    }
                } else if ty == vk::DescriptorType::UNIFORM_BUFFER
                    || ty == vk::DescriptorType::UNIFORM_TEXEL_BUFFER
                {
                    let data = self.get_buffer_data(Some(bh), d.buffer, d.buf_offset, d.buf_range);
                    self.tracker.read(bh, &data);
                } else if ty == vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC {
                    if doi < dynamic_offsets.len() {
                        let offset = dynamic_offsets[doi] as u64 + d.buf_offset;
                        doi += 1;
                        let data = self.get_buffer_data(Some(bh), d.buffer, offset, d.buf_range);
                        self.tracker.read(bh, &data);
                    } else {
                        error!("descriptor set has more dynamic descriptors than bound offsets");
                    }
                }
            }
        }
        modified
    }

    /// Consume every descriptor set bound in `state`, in set-index order.
    pub(crate) fn use_bound_descriptor_sets(
        &mut self,
        bh: &mut Behavior,
        state: &CmdBufExecState,
    ) -> Vec<Var> {
        let mut modified = Vec::new();
        for bds in state.descriptor_sets.values() {
            self.tracker.read(bh, &[Var::Id(bds.var)]);
            let set = bds.set.clone();
            let offsets = bds.dynamic_offsets.clone();
            modified.extend(self.use_descriptors(bh, &set, &offsets));
        }
        modified
    }
}
