/// The closed set of captured object kinds. Order matches the archive
/// header's fixed per-tag enumeration (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EntryTag {
    ApplicationInfo = 0,
    Sampler = 1,
    DescriptorSetLayout = 2,
    PipelineLayout = 3,
    ShaderModule = 4,
    RenderPass = 5,
    ComputePipeline = 6,
    GraphicsPipeline = 7,
    RaytracingPipeline = 8,
}

impl EntryTag {
    pub const ALL: [EntryTag; 9] = [
        EntryTag::ApplicationInfo,
        EntryTag::Sampler,
        EntryTag::DescriptorSetLayout,
        EntryTag::PipelineLayout,
        EntryTag::ShaderModule,
        EntryTag::RenderPass,
        EntryTag::ComputePipeline,
        EntryTag::GraphicsPipeline,
        EntryTag::RaytracingPipeline,
    ];

    /// A leaf has no creation-time dependency on another tagged entry
    /// (other than, for samplers embedded in a descriptor set layout
    /// binding, being *depended upon*).
    pub fn is_leaf(self) -> bool {
        !self.is_root()
    }

    /// Roots are the engine's entry points for replay: every pipeline kind.
    /// "Root" means "selected for replay", not "in-degree zero" — pipeline
    /// library references mean pipelines can depend on other pipelines.
    pub fn is_root(self) -> bool {
        matches!(
            self,
            EntryTag::ComputePipeline | EntryTag::GraphicsPipeline | EntryTag::RaytracingPipeline
        )
    }

    pub fn from_archive_byte(byte: u8) -> Option<EntryTag> {
        Self::ALL.into_iter().find(|tag| *tag as u8 == byte)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryTag::ApplicationInfo => "application_info",
            EntryTag::Sampler => "sampler",
            EntryTag::DescriptorSetLayout => "descriptor_set_layout",
            EntryTag::PipelineLayout => "pipeline_layout",
            EntryTag::ShaderModule => "shader_module",
            EntryTag::RenderPass => "render_pass",
            EntryTag::ComputePipeline => "compute_pipeline",
            EntryTag::GraphicsPipeline => "graphics_pipeline",
            EntryTag::RaytracingPipeline => "raytracing_pipeline",
        }
    }
}
