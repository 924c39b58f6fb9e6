//! Descriptor shapes, one per [`pipewarm_model::EntryTag`].
//!
//! Each descriptor holds the fields `pipewarm-driver` needs to issue the
//! matching `vk*Create*` call, plus, for any field that names another
//! entry by handle, a slot of the real `ash::vk` handle newtype that the
//! parser registers as a fixup target and the create phase patches once
//! that dependency is `Created`.

use ash::vk;

#[derive(Debug, Clone, Copy)]
pub struct ApplicationInfoDescriptor<'a> {
    pub application_name: &'a str,
    pub application_version: u32,
    pub engine_name: &'a str,
    pub engine_version: u32,
    pub api_version: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SamplerDescriptor {
    pub flags: vk::SamplerCreateFlags,
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode_u: vk::SamplerAddressMode,
    pub address_mode_v: vk::SamplerAddressMode,
    pub address_mode_w: vk::SamplerAddressMode,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_enable: bool,
    pub compare_op: vk::CompareOp,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: vk::BorderColor,
    pub unnormalized_coordinates: bool,
}

/// One binding in a descriptor set layout. `immutable_samplers` is empty
/// unless the binding's descriptor type embeds samplers, in which case it
/// holds one null handle slot per array element, patched as each sampler
/// dependency reaches `Created`.
pub struct DescriptorSetLayoutBindingDescriptor<'a> {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: vk::ShaderStageFlags,
    pub immutable_samplers: &'a mut [vk::Sampler],
}

pub struct DescriptorSetLayoutDescriptor<'a> {
    pub flags: vk::DescriptorSetLayoutCreateFlags,
    pub bindings: &'a mut [DescriptorSetLayoutBindingDescriptor<'a>],
}

pub struct PipelineLayoutDescriptor<'a> {
    pub flags: vk::PipelineLayoutCreateFlags,
    /// One null handle slot per referenced descriptor set layout, in the
    /// archive's set-index order; patched as each layout is created.
    pub set_layouts: &'a mut [vk::DescriptorSetLayout],
    pub push_constant_ranges: &'a [vk::PushConstantRange],
}

pub struct ShaderModuleDescriptor<'a> {
    pub flags: vk::ShaderModuleCreateFlags,
    /// Decoded SPIR-V words (see `pipewarm_codec::decode_shader_words`).
    /// Leaf descriptor: a shader module names no other entry.
    pub code: &'a [u32],
}

pub struct RenderPassDescriptor<'a> {
    pub flags: vk::RenderPassCreateFlags,
    pub attachments: &'a [vk::AttachmentDescription],
    pub subpasses: &'a [SubpassDescriptor<'a>],
    pub dependencies: &'a [vk::SubpassDependency],
}

#[derive(Debug, Clone, Copy)]
pub struct SubpassDescriptor<'a> {
    pub pipeline_bind_point: vk::PipelineBindPoint,
    pub input_attachments: &'a [vk::AttachmentReference],
    pub color_attachments: &'a [vk::AttachmentReference],
    pub resolve_attachments: &'a [vk::AttachmentReference],
    pub depth_stencil_attachment: Option<vk::AttachmentReference>,
    pub preserve_attachments: &'a [u32],
}

/// One shader stage attached to a pipeline. `module` is a fixup target:
/// the referenced shader module's handle is patched in once it is created.
pub struct ShaderStageDescriptor<'a> {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: &'a str,
}

pub struct ComputePipelineDescriptor<'a> {
    pub flags: vk::PipelineCreateFlags,
    pub stage: ShaderStageDescriptor<'a>,
    /// Fixup target: patched once the referenced pipeline layout is
    /// created.
    pub layout: vk::PipelineLayout,
}

pub struct GraphicsPipelineDescriptor<'a> {
    pub flags: vk::PipelineCreateFlags,
    pub stages: &'a mut [ShaderStageDescriptor<'a>],
    pub vertex_bindings: &'a [vk::VertexInputBindingDescription],
    pub vertex_attributes: &'a [vk::VertexInputAttributeDescription],
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart_enable: bool,
    pub viewport_count: u32,
    pub scissor_count: u32,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub rasterization_samples: vk::SampleCountFlags,
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: vk::CompareOp,
    pub color_blend_attachments: &'a [vk::PipelineColorBlendAttachmentState],
    pub dynamic_states: &'a [vk::DynamicState],
    /// Fixup target: patched once the referenced pipeline layout is
    /// created.
    pub layout: vk::PipelineLayout,
    /// Fixup target: patched once the referenced render pass is created.
    /// Null (and left unpatched) for a pipeline that uses dynamic
    /// rendering instead of a render pass.
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    /// One null handle slot per referenced pipeline-library entry (a
    /// graphics pipeline may reference other graphics pipelines as
    /// libraries, same as raytracing pipelines); patched as each library
    /// pipeline is created.
    pub libraries: &'a mut [vk::Pipeline],
}

#[derive(Debug, Clone, Copy)]
pub struct RaytracingGroupDescriptor {
    pub group_type: vk::RayTracingShaderGroupTypeKHR,
    pub general_shader: u32,
    pub closest_hit_shader: u32,
    pub any_hit_shader: u32,
    pub intersection_shader: u32,
}

pub struct RaytracingPipelineDescriptor<'a> {
    pub flags: vk::PipelineCreateFlags,
    pub stages: &'a mut [ShaderStageDescriptor<'a>],
    pub groups: &'a [RaytracingGroupDescriptor],
    pub max_pipeline_ray_recursion_depth: u32,
    /// Fixup target: patched once the referenced pipeline layout is
    /// created.
    pub layout: vk::PipelineLayout,
    /// One null handle slot per referenced pipeline-library entry (see
    /// spec.md's library reference handling); patched as each library
    /// pipeline is created.
    pub libraries: &'a mut [vk::Pipeline],
}

/// A type-erased `Entry::descriptor_ptr()` recovered as its real shape.
/// Built by the tag-aware create phase right before issuing the matching
/// driver call.
pub enum DescriptorRef<'a> {
    ApplicationInfo(&'a ApplicationInfoDescriptor<'a>),
    Sampler(&'a SamplerDescriptor),
    DescriptorSetLayout(&'a DescriptorSetLayoutDescriptor<'a>),
    PipelineLayout(&'a PipelineLayoutDescriptor<'a>),
    ShaderModule(&'a ShaderModuleDescriptor<'a>),
    RenderPass(&'a RenderPassDescriptor<'a>),
    ComputePipeline(&'a ComputePipelineDescriptor<'a>),
    GraphicsPipeline(&'a GraphicsPipelineDescriptor<'a>),
    RaytracingPipeline(&'a RaytracingPipelineDescriptor<'a>),
}

impl<'a> DescriptorRef<'a> {
    /// Reinterprets a type-erased descriptor pointer as its tag's real
    /// shape.
    ///
    /// # Safety
    /// `ptr` must have come from `RootArena::alloc` of the descriptor type
    /// matching `tag` (see `pipewarm-parser`, which is the only producer),
    /// must still be alive, and must not be concurrently mutated.
    pub unsafe fn from_tag_ptr(tag: pipewarm_model::EntryTag, ptr: *mut ()) -> DescriptorRef<'a> {
        use pipewarm_model::EntryTag;
        unsafe {
            match tag {
                EntryTag::ApplicationInfo => {
                    DescriptorRef::ApplicationInfo(&*ptr.cast::<ApplicationInfoDescriptor<'a>>())
                }
                EntryTag::Sampler => DescriptorRef::Sampler(&*ptr.cast::<SamplerDescriptor>()),
                EntryTag::DescriptorSetLayout => DescriptorRef::DescriptorSetLayout(
                    &*ptr.cast::<DescriptorSetLayoutDescriptor<'a>>(),
                ),
                EntryTag::PipelineLayout => {
                    DescriptorRef::PipelineLayout(&*ptr.cast::<PipelineLayoutDescriptor<'a>>())
                }
                EntryTag::ShaderModule => {
                    DescriptorRef::ShaderModule(&*ptr.cast::<ShaderModuleDescriptor<'a>>())
                }
                EntryTag::RenderPass => {
                    DescriptorRef::RenderPass(&*ptr.cast::<RenderPassDescriptor<'a>>())
                }
                EntryTag::ComputePipeline => {
                    DescriptorRef::ComputePipeline(&*ptr.cast::<ComputePipelineDescriptor<'a>>())
                }
                EntryTag::GraphicsPipeline => {
                    DescriptorRef::GraphicsPipeline(&*ptr.cast::<GraphicsPipelineDescriptor<'a>>())
                }
                EntryTag::RaytracingPipeline => DescriptorRef::RaytracingPipeline(
                    &*ptr.cast::<RaytracingPipelineDescriptor<'a>>(),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bump::RootArena;
    use pipewarm_model::EntryTag;

    #[test]
    fn descriptor_ref_recovers_tagged_shape() {
        let arena = RootArena::new();
        let descriptor = arena.alloc(SamplerDescriptor {
            flags: vk::SamplerCreateFlags::empty(),
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            mip_lod_bias: 0.0,
            anisotropy_enable: false,
            max_anisotropy: 1.0,
            compare_enable: false,
            compare_op: vk::CompareOp::ALWAYS,
            min_lod: 0.0,
            max_lod: 0.0,
            border_color: vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
            unnormalized_coordinates: false,
        });
        let ptr: *mut () = (descriptor as *mut SamplerDescriptor).cast();
        let recovered = unsafe { DescriptorRef::from_tag_ptr(EntryTag::Sampler, ptr) };
        match recovered {
            DescriptorRef::Sampler(s) => assert_eq!(s.mag_filter, vk::Filter::LINEAR),
            _ => panic!("expected Sampler descriptor"),
        }
    }
}
