use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::OnceLock;

use ash::vk;
use ash::vk::Handle;
use pipewarm_arena::{
    ComputePipelineDescriptor, DescriptorSetLayoutDescriptor, GraphicsPipelineDescriptor,
    PipelineLayoutDescriptor, RaytracingPipelineDescriptor, RenderPassDescriptor,
    SamplerDescriptor, ShaderModuleDescriptor,
};
use pipewarm_filter::{
    ChainEntry, ChainEntryKind, FeatureChain, Features10, FragmentDensityMapBits,
    FragmentShadingRateBits, Robustness2Bits, ShadingRateImageBits, filter_features,
};

use crate::error::DriverError;
use crate::trait_def::Driver;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Real Vulkan backend, built once at process start and shared (read-only
/// after `device_create`) across the whole worker pool.
pub struct AshDriver {
    entry: ash::Entry,
    instance: OnceLock<ash::Instance>,
    physical_device: OnceLock<vk::PhysicalDevice>,
    device: OnceLock<ash::Device>,
    pipeline_cache: OnceLock<vk::PipelineCache>,
}

impl AshDriver {
    /// # Safety
    /// Loads the Vulkan loader from the platform's shared library search
    /// path; the caller must ensure this runs before any other Vulkan
    /// entry point and exactly once per process.
    pub unsafe fn new() -> Result<Self, DriverError> {
        let entry =
            unsafe { ash::Entry::load() }.map_err(|_| DriverError::MissingInstanceExtension(
                "libvulkan shared library not found".to_string(),
            ))?;
        Ok(Self {
            entry,
            instance: OnceLock::new(),
            physical_device: OnceLock::new(),
            device: OnceLock::new(),
            pipeline_cache: OnceLock::new(),
        })
    }

    fn instance(&self) -> &ash::Instance {
        self.instance
            .get()
            .expect("instance_create must run before any other driver call")
    }

    fn physical_device(&self) -> vk::PhysicalDevice {
        *self
            .physical_device
            .get()
            .expect("pick_physical_device must run before device_create")
    }

    fn device(&self) -> &ash::Device {
        self.device
            .get()
            .expect("device_create must run before any create_<kind> call")
    }

    /// `vk::PipelineCache::null()` until `pipeline_cache_init` runs, so a
    /// driver built without that call behaves exactly as it did before
    /// pipeline-cache support existed.
    fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache.get().copied().unwrap_or(vk::PipelineCache::null())
    }
}

impl Driver for AshDriver {
    fn instance_create(&self, enable_validation: bool) -> Result<(), DriverError> {
        let application_info =
            vk::ApplicationInfo::default().api_version(vk::API_VERSION_1_2);

        let layer_names: Vec<*const i8> = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }
            .map_err(DriverError::InstanceCreate)?;
        self.instance
            .set(instance)
            .unwrap_or_else(|_| panic!("instance_create called twice"));
        Ok(())
    }

    fn debug_sink_init(&self, _enable_validation: bool) -> Result<(), DriverError> {
        // The debug messenger/report callback is an external collaborator
        // (spec.md §1's "out of scope" list covers log formatting); this
        // hook exists only so the engine's setup sequence matches the
        // source's call order.
        Ok(())
    }

    fn pick_physical_device(&self, device_index: Option<u32>) -> Result<(), DriverError> {
        let candidates = unsafe { self.instance().enumerate_physical_devices() }
            .map_err(|_| DriverError::NoSuitablePhysicalDevice)?;
        let chosen = match device_index {
            Some(index) => candidates
                .get(index as usize)
                .copied()
                .ok_or(DriverError::NoSuitablePhysicalDevice)?,
            None => *candidates
                .first()
                .ok_or(DriverError::NoSuitablePhysicalDevice)?,
        };
        self.physical_device
            .set(chosen)
            .unwrap_or_else(|_| panic!("pick_physical_device called twice"));
        Ok(())
    }

    fn device_create(
        &self,
        requested: &FeatureChain,
        application_engine_name: &str,
    ) -> Result<(), DriverError> {
        let physical_device = self.physical_device();

        let mut shading_rate = vk::PhysicalDeviceFragmentShadingRateFeaturesKHR::default();
        let mut shading_rate_image = vk::PhysicalDeviceShadingRateImageFeaturesNV::default();
        let mut density_map = vk::PhysicalDeviceFragmentDensityMapFeaturesEXT::default();
        let mut robustness2 = vk::PhysicalDeviceRobustness2FeaturesEXT::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut shading_rate)
            .push_next(&mut shading_rate_image)
            .push_next(&mut density_map)
            .push_next(&mut robustness2);
        unsafe {
            self.instance()
                .get_physical_device_features2(physical_device, &mut features2)
        };

        let supported = FeatureChain {
            core: Features10 {
                robust_buffer_access: features2.features.robust_buffer_access == vk::TRUE,
            },
            entries: vec![
                ChainEntry::FragmentShadingRate(FragmentShadingRateBits {
                    pipeline_fragment_shading_rate: shading_rate.pipeline_fragment_shading_rate
                        == vk::TRUE,
                    primitive_fragment_shading_rate: shading_rate.primitive_fragment_shading_rate
                        == vk::TRUE,
                    attachment_fragment_shading_rate: shading_rate
                        .attachment_fragment_shading_rate
                        == vk::TRUE,
                }),
                ChainEntry::ShadingRateImage(ShadingRateImageBits {
                    shading_rate_image: shading_rate_image.shading_rate_image == vk::TRUE,
                    shading_rate_coarse_sample_order: shading_rate_image
                        .shading_rate_coarse_sample_order
                        == vk::TRUE,
                }),
                ChainEntry::FragmentDensityMap(FragmentDensityMapBits {
                    fragment_density_map: density_map.fragment_density_map == vk::TRUE,
                }),
                ChainEntry::Robustness2(Robustness2Bits {
                    robust_buffer_access2: robustness2.robust_buffer_access2 == vk::TRUE,
                    robust_image_access2: robustness2.robust_image_access2 == vk::TRUE,
                    null_descriptor: robustness2.null_descriptor == vk::TRUE,
                }),
            ],
        };

        let filtered = filter_features(&supported, requested, application_engine_name);

        let mut enabled_core = vk::PhysicalDeviceFeatures::default()
            .robust_buffer_access(filtered.core.robust_buffer_access);

        let mut enabled_shading_rate = filtered
            .find(ChainEntryKind::FragmentShadingRate)
            .map(|entry| match entry {
                ChainEntry::FragmentShadingRate(bits) => {
                    vk::PhysicalDeviceFragmentShadingRateFeaturesKHR::default()
                        .pipeline_fragment_shading_rate(bits.pipeline_fragment_shading_rate)
                        .primitive_fragment_shading_rate(bits.primitive_fragment_shading_rate)
                        .attachment_fragment_shading_rate(bits.attachment_fragment_shading_rate)
                }
                _ => unreachable!(),
            });
        let mut enabled_robustness2 =
            filtered
                .find(ChainEntryKind::Robustness2)
                .map(|entry| match entry {
                    ChainEntry::Robustness2(bits) => {
                        vk::PhysicalDeviceRobustness2FeaturesEXT::default()
                            .robust_buffer_access2(bits.robust_buffer_access2)
                            .robust_image_access2(bits.robust_image_access2)
                            .null_descriptor(bits.null_descriptor)
                    }
                    _ => unreachable!(),
                });

        let enabled_extensions: Vec<CString> = filtered
            .enabled_extensions
            .iter()
            .map(|name| CString::new(name.as_str()).expect("extension name has no interior NUL"))
            .collect();
        let enabled_extension_ptrs: Vec<*const i8> =
            enabled_extensions.iter().map(|name| name.as_ptr()).collect();

        let queue_priorities = [1.0f32];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(0)
            .queue_priorities(&queue_priorities);
        let queue_create_infos = [queue_create_info];

        let mut create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_ptrs)
            .enabled_features(&enabled_core);
        if let Some(shading_rate) = enabled_shading_rate.as_mut() {
            create_info = create_info.push_next(shading_rate);
        }
        if let Some(robustness2) = enabled_robustness2.as_mut() {
            create_info = create_info.push_next(robustness2);
        }

        let device = unsafe {
            self.instance()
                .create_device(physical_device, &create_info, None)
        }
        .map_err(DriverError::DeviceCreate)?;
        self.device
            .set(device)
            .unwrap_or_else(|_| panic!("device_create called twice"));
        Ok(())
    }

    fn pipeline_cache_init(&self, path: Option<&Path>) -> Result<(), DriverError> {
        let initial_data = match path {
            Some(path) if path.is_file() => std::fs::read(path)?,
            _ => Vec::new(),
        };
        let info = vk::PipelineCacheCreateInfo::default().initial_data(&initial_data);
        let cache = unsafe { self.device().create_pipeline_cache(&info, None) }
            .map_err(DriverError::PipelineCacheCreate)?;
        self.pipeline_cache
            .set(cache)
            .unwrap_or_else(|_| panic!("pipeline_cache_init called twice"));
        Ok(())
    }

    fn pipeline_cache_save(&self, path: Option<&Path>) -> Result<(), DriverError> {
        let Some(path) = path else {
            return Ok(());
        };
        let Some(&cache) = self.pipeline_cache.get() else {
            return Ok(());
        };
        let data = unsafe { self.device().get_pipeline_cache_data(cache) }
            .map_err(DriverError::PipelineCacheCreate)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<u64, DriverError> {
        let info = vk::SamplerCreateInfo::default()
            .flags(descriptor.flags)
            .mag_filter(descriptor.mag_filter)
            .min_filter(descriptor.min_filter)
            .mipmap_mode(descriptor.mipmap_mode)
            .address_mode_u(descriptor.address_mode_u)
            .address_mode_v(descriptor.address_mode_v)
            .address_mode_w(descriptor.address_mode_w)
            .mip_lod_bias(descriptor.mip_lod_bias)
            .anisotropy_enable(descriptor.anisotropy_enable)
            .max_anisotropy(descriptor.max_anisotropy)
            .compare_enable(descriptor.compare_enable)
            .compare_op(descriptor.compare_op)
            .min_lod(descriptor.min_lod)
            .max_lod(descriptor.max_lod)
            .border_color(descriptor.border_color)
            .unnormalized_coordinates(descriptor.unnormalized_coordinates);
        unsafe { self.device().create_sampler(&info, None) }
            .map(|handle| handle.as_raw())
            .map_err(DriverError::Create)
    }

    fn destroy_sampler(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_sampler(vk::Sampler::from_raw(handle), None)
        };
    }

    fn create_descriptor_set_layout(
        &self,
        descriptor: &DescriptorSetLayoutDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = descriptor
            .bindings
            .iter()
            .map(|binding| {
                let mut entry = vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(binding.descriptor_type)
                    .descriptor_count(binding.descriptor_count)
                    .stage_flags(binding.stage_flags);
                if !binding.immutable_samplers.is_empty() {
                    entry = entry.immutable_samplers(binding.immutable_samplers);
                }
                entry
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(descriptor.flags)
            .bindings(&bindings);
        unsafe { self.device().create_descriptor_set_layout(&info, None) }
            .map(|handle| handle.as_raw())
            .map_err(DriverError::Create)
    }

    fn destroy_descriptor_set_layout(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_descriptor_set_layout(vk::DescriptorSetLayout::from_raw(handle), None)
        };
    }

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let info = vk::PipelineLayoutCreateInfo::default()
            .flags(descriptor.flags)
            .set_layouts(descriptor.set_layouts)
            .push_constant_ranges(descriptor.push_constant_ranges);
        unsafe { self.device().create_pipeline_layout(&info, None) }
            .map(|handle| handle.as_raw())
            .map_err(DriverError::Create)
    }

    fn destroy_pipeline_layout(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_pipeline_layout(vk::PipelineLayout::from_raw(handle), None)
        };
    }

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let info = vk::ShaderModuleCreateInfo::default()
            .flags(descriptor.flags)
            .code(descriptor.code);
        unsafe { self.device().create_shader_module(&info, None) }
            .map(|handle| handle.as_raw())
            .map_err(DriverError::Create)
    }

    fn destroy_shader_module(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_shader_module(vk::ShaderModule::from_raw(handle), None)
        };
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let subpasses: Vec<vk::SubpassDescription> = descriptor
            .subpasses
            .iter()
            .map(|subpass| {
                let mut description = vk::SubpassDescription::default()
                    .pipeline_bind_point(subpass.pipeline_bind_point)
                    .input_attachments(subpass.input_attachments)
                    .color_attachments(subpass.color_attachments)
                    .preserve_attachments(subpass.preserve_attachments);
                if !subpass.resolve_attachments.is_empty() {
                    description = description.resolve_attachments(subpass.resolve_attachments);
                }
                if let Some(depth_stencil) = subpass.depth_stencil_attachment.as_ref() {
                    description = description.depth_stencil_attachment(depth_stencil);
                }
                description
            })
            .collect();
        let info = vk::RenderPassCreateInfo::default()
            .flags(descriptor.flags)
            .attachments(descriptor.attachments)
            .subpasses(&subpasses)
            .dependencies(descriptor.dependencies);
        unsafe { self.device().create_render_pass(&info, None) }
            .map(|handle| handle.as_raw())
            .map_err(DriverError::Create)
    }

    fn destroy_render_pass(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_render_pass(vk::RenderPass::from_raw(handle), None)
        };
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let entry_point = CString::new(descriptor.stage.entry_point)
            .expect("shader entry point has no interior NUL");
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(descriptor.stage.stage)
            .module(descriptor.stage.module)
            .name(&entry_point);
        let info = vk::ComputePipelineCreateInfo::default()
            .flags(descriptor.flags)
            .stage(stage)
            .layout(descriptor.layout);
        unsafe {
            self.device()
                .create_compute_pipelines(self.pipeline_cache(), &[info], None)
        }
        .map(|handles| handles[0].as_raw())
        .map_err(|(_, result)| DriverError::Create(result))
    }

    fn destroy_compute_pipeline(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_pipeline(vk::Pipeline::from_raw(handle), None)
        };
    }

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        let entry_points: Vec<CString> = descriptor
            .stages
            .iter()
            .map(|stage| {
                CString::new(stage.entry_point).expect("shader entry point has no interior NUL")
            })
            .collect();
        let stages: Vec<vk::PipelineShaderStageCreateInfo> = descriptor
            .stages
            .iter()
            .zip(entry_points.iter())
            .map(|(stage, name)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage)
                    .module(stage.module)
                    .name(name)
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(descriptor.vertex_bindings)
            .vertex_attribute_descriptions(descriptor.vertex_attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(descriptor.topology)
            .primitive_restart_enable(descriptor.primitive_restart_enable);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(descriptor.viewport_count)
            .scissor_count(descriptor.scissor_count);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(descriptor.polygon_mode)
            .cull_mode(descriptor.cull_mode)
            .front_face(descriptor.front_face)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(descriptor.rasterization_samples);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(descriptor.depth_test_enable)
            .depth_write_enable(descriptor.depth_write_enable)
            .depth_compare_op(descriptor.depth_compare_op);
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(descriptor.color_blend_attachments);
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(descriptor.dynamic_states);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .flags(descriptor.flags)
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(descriptor.layout)
            .render_pass(descriptor.render_pass)
            .subpass(descriptor.subpass);
        unsafe {
            self.device()
                .create_graphics_pipelines(self.pipeline_cache(), &[info], None)
        }
        .map(|handles| handles[0].as_raw())
        .map_err(|(_, result)| DriverError::Create(result))
    }

    fn destroy_graphics_pipeline(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_pipeline(vk::Pipeline::from_raw(handle), None)
        };
    }

    fn create_raytracing_pipeline(
        &self,
        _descriptor: &RaytracingPipelineDescriptor<'_>,
    ) -> Result<u64, DriverError> {
        // Ray-tracing pipeline creation goes through `vk::KhrRayTracingPipelineFn`,
        // a device extension function pointer not loaded by the core
        // `ash::Device` wrapper; a deployment that needs this enables
        // `ash::khr::ray_tracing_pipeline::Device` and forwards here.
        Err(DriverError::Create(vk::Result::ERROR_EXTENSION_NOT_PRESENT))
    }

    fn destroy_raytracing_pipeline(&self, handle: u64) {
        unsafe {
            self.device()
                .destroy_pipeline(vk::Pipeline::from_raw(handle), None)
        };
    }
}
