use std::path::Path;

use pipewarm_arena::{
    ComputePipelineDescriptor, DescriptorSetLayoutDescriptor, GraphicsPipelineDescriptor,
    PipelineLayoutDescriptor, RaytracingPipelineDescriptor, RenderPassDescriptor,
    SamplerDescriptor, ShaderModuleDescriptor,
};
use pipewarm_filter::FeatureChain;

use crate::error::DriverError;

/// The abstract driver surface the engine drives: setup entry points plus
/// one `create_<kind>`/`destroy_<kind>` pair per tagged descriptor kind
/// (spec.md §4.5). A single implementation may be swapped for a counting
/// mock in tests; both sides of that swap are `Send + Sync` so the engine
/// can share one driver reference across its whole thread pool.
pub trait Driver: Send + Sync {
    fn instance_create(&self, enable_validation: bool) -> Result<(), DriverError>;

    fn debug_sink_init(&self, enable_validation: bool) -> Result<(), DriverError>;

    fn pick_physical_device(&self, device_index: Option<u32>) -> Result<(), DriverError>;

    /// Runs the feature/extension filter (spec.md §4.7) against the
    /// currently selected physical device's reported capabilities, then
    /// creates the logical device with the filtered result.
    fn device_create(
        &self,
        requested: &FeatureChain,
        application_engine_name: &str,
    ) -> Result<(), DriverError>;

    /// Loads an on-disk pipeline cache blob from `path` (if it exists) and
    /// creates the `VkPipelineCache` every subsequent `create_<pipeline
    /// kind>` call seeds into. `path` absent means "create an empty,
    /// in-memory-only cache" — the point of replay is still to warm the
    /// driver's *own* on-disk cache, this is only the optional explicit
    /// `VkPipelineCache` object spec.md §6's `--on-disk-pipeline-cache`
    /// flag names.
    fn pipeline_cache_init(&self, path: Option<&Path>) -> Result<(), DriverError>;

    /// Merges the cache's current contents back to `path`, if given.
    fn pipeline_cache_save(&self, path: Option<&Path>) -> Result<(), DriverError>;

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<u64, DriverError>;
    fn destroy_sampler(&self, handle: u64);

    fn create_descriptor_set_layout(
        &self,
        descriptor: &DescriptorSetLayoutDescriptor<'_>,
    ) -> Result<u64, DriverError>;
    fn destroy_descriptor_set_layout(&self, handle: u64);

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor<'_>,
    ) -> Result<u64, DriverError>;
    fn destroy_pipeline_layout(&self, handle: u64);

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<u64, DriverError>;
    fn destroy_shader_module(&self, handle: u64);

    fn create_render_pass(&self, descriptor: &RenderPassDescriptor<'_>) -> Result<u64, DriverError>;
    fn destroy_render_pass(&self, handle: u64);

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<u64, DriverError>;
    fn destroy_compute_pipeline(&self, handle: u64);

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor<'_>,
    ) -> Result<u64, DriverError>;
    fn destroy_graphics_pipeline(&self, handle: u64);

    fn create_raytracing_pipeline(
        &self,
        descriptor: &RaytracingPipelineDescriptor<'_>,
    ) -> Result<u64, DriverError>;
    fn destroy_raytracing_pipeline(&self, handle: u64);
}
