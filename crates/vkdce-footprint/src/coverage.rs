//! Full-image coverage predicates.
//!
//! A copy, blit or clear that provably overwrites an entire image subresource
//! is stamped as a `write` to the destination data; anything partial must be
//! a `modify` so earlier contents stay live.

use ash::vk;

use vkdce_protocol::commands::{
    Extent3d, ImageSubresourceLayers, ImageSubresourceRange, Offset3d,
};
use vkdce_protocol::snapshot::ImageState;

use crate::record::{AttachmentViewRecord, FramebufferRecord};

/// Whether a region described by subresource layers, an offset, and an extent
/// overwrites the whole image. Conservative for depth-stencil: both aspect
/// bits must be present.
pub fn subresource_layers_fully_cover_image(
    img: &ImageState,
    layers: &ImageSubresourceLayers,
    offset: &Offset3d,
    extent: &Extent3d,
) -> bool {
    if offset.x != 0 || offset.y != 0 || offset.z != 0 {
        return false;
    }
    if *extent != img.info.extent {
        return false;
    }
    if layers.base_array_layer != 0 {
        return false;
    }
    if layers.layer_count != img.info.array_layers
        && layers.layer_count != vk::REMAINING_ARRAY_LAYERS
    {
        return false;
    }
    let aspect = vk::ImageAspectFlags::from_raw(layers.aspect_mask);
    aspect == vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        || aspect == vk::ImageAspectFlags::COLOR
}

/// Whole-image coverage for a `VkImageSubresourceRange` (clears).
pub fn subresource_range_fully_cover_image(
    img: &ImageState,
    range: &ImageSubresourceRange,
) -> bool {
    if range.base_array_layer != 0 || range.base_mip_level != 0 {
        return false;
    }
    if (range.layer_count != img.info.array_layers
        && range.layer_count != vk::REMAINING_ARRAY_LAYERS)
        || (range.level_count != img.info.mip_levels
            && range.level_count != vk::REMAINING_MIP_LEVELS)
    {
        return false;
    }
    let aspect = vk::ImageAspectFlags::from_raw(range.aspect_mask);
    aspect == vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        || aspect == vk::ImageAspectFlags::COLOR
}

/// Whole-image coverage for a blit destination, given its two corner offsets
/// in either order.
pub fn blit_fully_cover_image(
    img: &ImageState,
    layers: &ImageSubresourceLayers,
    offset1: &Offset3d,
    offset2: &Offset3d,
) -> bool {
    if offset1.x == 0 && offset1.y == 0 && offset1.z == 0 {
        let extent = Extent3d {
            width: (offset2.x - offset1.x) as u32,
            height: (offset2.y - offset1.y) as u32,
            depth: (offset2.z - offset1.z) as u32,
        };
        subresource_layers_fully_cover_image(img, layers, offset1, &extent)
    } else if offset2.x == 0 && offset2.y == 0 && offset2.z == 0 {
        let extent = Extent3d {
            width: (offset1.x - offset2.x) as u32,
            height: (offset1.y - offset2.y) as u32,
            depth: (offset1.z - offset2.z) as u32,
        };
        subresource_layers_fully_cover_image(img, layers, offset2, &extent)
    } else {
        false
    }
}

/// Whether a clear rect spans the whole framebuffer.
pub fn framebuffer_covered_by_clear_rect(
    fb: &FramebufferRecord,
    rect: &vkdce_protocol::commands::ClearRect,
) -> bool {
    rect.base_array_layer == 0
        && rect.layer_count == fb.layers
        && rect.rect.offset == [0, 0]
        && rect.rect.extent == [fb.width, fb.height]
}

/// Whether a 2D (or 2D-array) attachment view spans every texel of its image
/// and the framebuffer matches the image geometry, so that a loadOp/storeOp
/// write clobbers the whole image.
pub fn attachment_fully_covers_image(view: &AttachmentViewRecord, fb: &FramebufferRecord) -> bool {
    let view_type = vk::ImageViewType::from_raw(view.view_type);
    if view_type != vk::ImageViewType::TYPE_2D && view_type != vk::ImageViewType::TYPE_2D_ARRAY {
        return false;
    }
    view.base_array_layer == 0
        && (view.layer_count == view.image_array_layers
            || view.layer_count == vk::REMAINING_ARRAY_LAYERS)
        && vk::ImageType::from_raw(view.image_type) == vk::ImageType::TYPE_2D
        && view.image_width == fb.width
        && view.image_height == fb.height
        && (fb.layers == view.image_array_layers || fb.layers == vk::REMAINING_ARRAY_LAYERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkdce_protocol::commands::ImageCreateInfo;

    fn image_2d(w: u32, h: u32, layers: u32, mips: u32) -> ImageState {
        ImageState {
            info: ImageCreateInfo {
                flags: 0,
                image_type: vk::ImageType::TYPE_2D.as_raw(),
                format: vk::Format::R8G8B8A8_UNORM.as_raw(),
                extent: Extent3d {
                    width: w,
                    height: h,
                    depth: 1,
                },
                mip_levels: mips,
                array_layers: layers,
                samples: 1,
                tiling: 0,
                usage: 0,
                initial_layout: 0,
            },
            memory_size: (w * h * 4) as u64,
            block_size: 0x10000,
            sparse_requirements: Vec::new(),
        }
    }

    fn color_layers(layer_count: u32) -> ImageSubresourceLayers {
        ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR.as_raw(),
            mip_level: 0,
            base_array_layer: 0,
            layer_count,
        }
    }

    #[test]
    fn full_extent_color_region_covers() {
        let img = image_2d(512, 512, 1, 1);
        let offset = Offset3d { x: 0, y: 0, z: 0 };
        let extent = Extent3d {
            width: 512,
            height: 512,
            depth: 1,
        };
        assert!(subresource_layers_fully_cover_image(
            &img,
            &color_layers(1),
            &offset,
            &extent
        ));
        assert!(subresource_layers_fully_cover_image(
            &img,
            &color_layers(vk::REMAINING_ARRAY_LAYERS),
            &offset,
            &extent
        ));
    }

    #[test]
    fn partial_region_does_not_cover() {
        let img = image_2d(512, 512, 1, 1);
        let offset = Offset3d { x: 0, y: 0, z: 0 };
        let quarter = Extent3d {
            width: 256,
            height: 256,
            depth: 1,
        };
        assert!(!subresource_layers_fully_cover_image(
            &img,
            &color_layers(1),
            &offset,
            &quarter
        ));
        let shifted = Offset3d { x: 1, y: 0, z: 0 };
        let extent = Extent3d {
            width: 512,
            height: 512,
            depth: 1,
        };
        assert!(!subresource_layers_fully_cover_image(
            &img,
            &color_layers(1),
            &shifted,
            &extent
        ));
    }

    #[test]
    fn depth_only_aspect_is_conservative() {
        let img = image_2d(64, 64, 1, 1);
        let offset = Offset3d { x: 0, y: 0, z: 0 };
        let extent = Extent3d {
            width: 64,
            height: 64,
            depth: 1,
        };
        let depth_only = ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::DEPTH.as_raw(),
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        assert!(!subresource_layers_fully_cover_image(
            &img,
            &depth_only,
            &offset,
            &extent
        ));
    }

    #[test]
    fn subresource_range_needs_all_mips_and_layers() {
        let img = image_2d(64, 64, 2, 3);
        let full = ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR.as_raw(),
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: 2,
        };
        assert!(subresource_range_fully_cover_image(&img, &full));
        let partial = ImageSubresourceRange {
            level_count: 1,
            ..full
        };
        assert!(!subresource_range_fully_cover_image(&img, &partial));
    }

    #[test]
    fn blit_accepts_either_corner_order() {
        let img = image_2d(128, 128, 1, 1);
        let zero = Offset3d { x: 0, y: 0, z: 0 };
        let corner = Offset3d {
            x: 128,
            y: 128,
            z: 1,
        };
        assert!(blit_fully_cover_image(&img, &color_layers(1), &zero, &corner));
        assert!(blit_fully_cover_image(&img, &color_layers(1), &corner, &zero));
        let inner = Offset3d { x: 64, y: 64, z: 1 };
        assert!(!blit_fully_cover_image(&img, &color_layers(1), &zero, &inner));
    }
}
