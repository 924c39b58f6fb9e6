#![allow(unsafe_code)]

//! Dispatches a tag to its `parse_<kind>`/`create_<kind>`/`destroy_<kind>`
//! functions. This is the one place in the engine that knows the concrete
//! descriptor type behind an entry's type-erased pointer.

use pipewarm_arena::{
    ComputePipelineDescriptor, DescriptorSetLayoutDescriptor, GraphicsPipelineDescriptor,
    PipelineLayoutDescriptor, RaytracingPipelineDescriptor, RenderPassDescriptor, RootArena,
    SamplerDescriptor, ShaderModuleDescriptor,
};
use pipewarm_driver::{Driver, DriverError};
use pipewarm_model::{DependencyEdge, EntryTable, EntryTag};
use pipewarm_parser::{
    parse_compute_pipeline, parse_descriptor_set_layout, parse_graphics_pipeline,
    parse_pipeline_layout, parse_raytracing_pipeline, parse_render_pass, parse_sampler,
    parse_shader_module, ParseError,
};

fn erase<D>(descriptor: &D) -> *mut () {
    (descriptor as *const D as *mut D).cast::<()>()
}

/// Parses `bytes` for `tag`, returning the type-erased descriptor pointer
/// (allocated out of `arena`), its fixup list, and any unknown-field
/// warnings. `application_info` is never reachable here: nothing in a
/// dependency subgraph references it, so the engine's DFS never visits
/// one.
pub fn parse_entry(
    tag: EntryTag,
    arena: &RootArena,
    table: &EntryTable,
    bytes: &[u8],
) -> Result<(*mut (), Vec<DependencyEdge>, Vec<String>), ParseError> {
    match tag {
        EntryTag::ApplicationInfo => {
            unreachable!("application_info is never a dependency-graph member")
        }
        EntryTag::Sampler => {
            parse_sampler(arena, bytes).map(|r| (erase(r.descriptor), r.fixups, r.warnings))
        }
        EntryTag::DescriptorSetLayout => parse_descriptor_set_layout(arena, table, bytes)
            .map(|r| (erase(r.descriptor), r.fixups, r.warnings)),
        EntryTag::PipelineLayout => parse_pipeline_layout(arena, table, bytes)
            .map(|r| (erase(r.descriptor), r.fixups, r.warnings)),
        EntryTag::ShaderModule => {
            parse_shader_module(arena, bytes).map(|r| (erase(r.descriptor), r.fixups, r.warnings))
        }
        EntryTag::RenderPass => {
            parse_render_pass(arena, bytes).map(|r| (erase(r.descriptor), r.fixups, r.warnings))
        }
        EntryTag::ComputePipeline => parse_compute_pipeline(arena, table, bytes)
            .map(|r| (erase(r.descriptor), r.fixups, r.warnings)),
        EntryTag::GraphicsPipeline => parse_graphics_pipeline(arena, table, bytes)
            .map(|r| (erase(r.descriptor), r.fixups, r.warnings)),
        EntryTag::RaytracingPipeline => parse_raytracing_pipeline(arena, table, bytes)
            .map(|r| (erase(r.descriptor), r.fixups, r.warnings)),
    }
}

/// Reconstructs the concrete descriptor reference behind `descriptor_ptr`
/// and issues the matching driver create call.
///
/// # Safety
/// `descriptor_ptr` must be the pointer `parse_entry` returned for this
/// same `tag`, still backed by a live arena, with every dependency fixup
/// already patched to its dependency's real handle.
pub unsafe fn create_entry(
    tag: EntryTag,
    descriptor_ptr: *mut (),
    driver: &dyn Driver,
) -> Result<u64, DriverError> {
    unsafe {
        match tag {
            EntryTag::ApplicationInfo => {
                unreachable!("application_info is never a dependency-graph member")
            }
            EntryTag::Sampler => driver.create_sampler(&*descriptor_ptr.cast::<SamplerDescriptor>()),
            EntryTag::DescriptorSetLayout => driver.create_descriptor_set_layout(
                &*descriptor_ptr.cast::<DescriptorSetLayoutDescriptor<'_>>(),
            ),
            EntryTag::PipelineLayout => {
                driver.create_pipeline_layout(&*descriptor_ptr.cast::<PipelineLayoutDescriptor<'_>>())
            }
            EntryTag::ShaderModule => {
                driver.create_shader_module(&*descriptor_ptr.cast::<ShaderModuleDescriptor<'_>>())
            }
            EntryTag::RenderPass => {
                driver.create_render_pass(&*descriptor_ptr.cast::<RenderPassDescriptor<'_>>())
            }
            EntryTag::ComputePipeline => driver
                .create_compute_pipeline(&*descriptor_ptr.cast::<ComputePipelineDescriptor<'_>>()),
            EntryTag::GraphicsPipeline => driver
                .create_graphics_pipeline(&*descriptor_ptr.cast::<GraphicsPipelineDescriptor<'_>>()),
            EntryTag::RaytracingPipeline => driver.create_raytracing_pipeline(
                &*descriptor_ptr.cast::<RaytracingPipelineDescriptor<'_>>(),
            ),
        }
    }
}

/// Issues the matching driver destroy call. Same pointer-validity
/// contract as [`create_entry`], except here `handle` is a plain `u64`.
pub fn destroy_entry(tag: EntryTag, handle: u64, driver: &dyn Driver) {
    match tag {
        EntryTag::ApplicationInfo => {
            unreachable!("application_info is never a dependency-graph member")
        }
        EntryTag::Sampler => driver.destroy_sampler(handle),
        EntryTag::DescriptorSetLayout => driver.destroy_descriptor_set_layout(handle),
        EntryTag::PipelineLayout => driver.destroy_pipeline_layout(handle),
        EntryTag::ShaderModule => driver.destroy_shader_module(handle),
        EntryTag::RenderPass => driver.destroy_render_pass(handle),
        EntryTag::ComputePipeline => driver.destroy_compute_pipeline(handle),
        EntryTag::GraphicsPipeline => driver.destroy_graphics_pipeline(handle),
        EntryTag::RaytracingPipeline => driver.destroy_raytracing_pipeline(handle),
    }
}
