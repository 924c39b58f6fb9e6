use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use pipewarm_arena::{
    ComputePipelineDescriptor, DescriptorSetLayoutDescriptor, GraphicsPipelineDescriptor,
    PipelineLayoutDescriptor, RaytracingPipelineDescriptor, RenderPassDescriptor,
    SamplerDescriptor, ShaderModuleDescriptor,
};
use pipewarm_filter::FeatureChain;

use crate::error::DriverError;
use crate::trait_def::Driver;

/// A counting test double: every `create_<kind>` hands out the next
/// integer handle, and every `destroy_<kind>` is recorded so tests can
/// assert exact create/destroy ordering (spec.md §8's testable
/// properties).
pub struct MockDriver {
    next_handle: AtomicU64,
    events: Mutex<Vec<MockEvent>>,
    fail_on_create: Mutex<Vec<u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    CreatedSampler(u64),
    DestroyedSampler(u64),
    CreatedDescriptorSetLayout(u64),
    DestroyedDescriptorSetLayout(u64),
    CreatedPipelineLayout(u64),
    DestroyedPipelineLayout(u64),
    CreatedShaderModule(u64),
    DestroyedShaderModule(u64),
    CreatedRenderPass(u64),
    DestroyedRenderPass(u64),
    CreatedComputePipeline(u64),
    DestroyedComputePipeline(u64),
    CreatedGraphicsPipeline(u64),
    DestroyedGraphicsPipeline(u64),
    CreatedRaytracingPipeline(u64),
    DestroyedRaytracingPipeline(u64),
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            // Handle 0 is reserved to mean "null"/"not yet created"
            // (`pipewarm_model::Entry::handle`), so the mock never hands
            // it out.
            next_handle: AtomicU64::new(1),
            events: Mutex::new(Vec::new()),
            fail_on_create: Mutex::new(Vec::new()),
        }
    }

    /// Makes every future `create_<kind>` whose would-be handle is in
    /// `handles` fail instead, to exercise the create-failure scenarios in
    /// spec.md §8.
    pub fn fail_next_handles(&self, handles: &[u64]) {
        self.fail_on_create.lock().unwrap().extend_from_slice(handles);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().unwrap().clone()
    }

    fn next(&self) -> Result<u64, DriverError> {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_create.lock().unwrap().contains(&handle) {
            return Err(DriverError::Create(ash::vk::Result::ERROR_UNKNOWN));
        }
        Ok(handle)
    }

    fn record(&self, event: MockEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for MockDriver {
    fn instance_create(&self, _enable_validation: bool) -> Result<(), DriverError> {
        Ok(())
    }

    fn debug_sink_init(&self, _enable_validation: bool) -> Result<(), DriverError> {
        Ok(())
    }

    fn pick_physical_device(&self, _device_index: Option<u32>) -> Result<(), DriverError> {
        Ok(())
    }

    fn device_create(
        &self,
        _requested: &FeatureChain,
        _application_engine_name: &str,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    fn pipeline_cache_init(&self, _path: Option<&std::path::Path>) -> Result<(), DriverError> {
        Ok(())
    }

    fn pipeline_cache_save(&self, _path: Option<&std::path::Path>) -> Result<(), DriverError> {
        Ok(())
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedSampler(handle));
        Ok(handle)
    }

    fn destroy_sampler(&self, handle: u64) {
        self.record(MockEvent::DestroyedSampler(handle));
    }

    fn create_descriptor_set_layout(
        &self,
        _descriptor: &DescriptorSetLayoutDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedDescriptorSetLayout(handle));
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, handle: u64) {
        self.record(MockEvent::DestroyedDescriptorSetLayout(handle));
    }

    fn create_pipeline_layout(
        &self,
        _descriptor: &PipelineLayoutDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedPipelineLayout(handle));
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, handle: u64) {
        self.record(MockEvent::DestroyedPipelineLayout(handle));
    }

    fn create_shader_module(
        &self,
        _descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedShaderModule(handle));
        Ok(handle)
    }

    fn destroy_shader_module(&self, handle: u64) {
        self.record(MockEvent::DestroyedShaderModule(handle));
    }

    fn create_render_pass(
        &self,
        _descriptor: &RenderPassDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedRenderPass(handle));
        Ok(handle)
    }

    fn destroy_render_pass(&self, handle: u64) {
        self.record(MockEvent::DestroyedRenderPass(handle));
    }

    fn create_compute_pipeline(
        &self,
        _descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedComputePipeline(handle));
        Ok(handle)
    }

    fn destroy_compute_pipeline(&self, handle: u64) {
        self.record(MockEvent::DestroyedComputePipeline(handle));
    }

    fn create_graphics_pipeline(
        &self,
        _descriptor: &GraphicsPipelineDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedGraphicsPipeline(handle));
        Ok(handle)
    }

    fn destroy_graphics_pipeline(&self, handle: u64) {
        self.record(MockEvent::DestroyedGraphicsPipeline(handle));
    }

    fn create_raytracing_pipeline(
        &self,
        _descriptor: &RaytracingPipelineDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let handle = self.next()?;
        self.record(MockEvent::CreatedRaytracingPipeline(handle));
        Ok(handle)
    }

    fn destroy_raytracing_pipeline(&self, handle: u64) {
        self.record(MockEvent::DestroyedRaytracingPipeline(handle));
    }
}
