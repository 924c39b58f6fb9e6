//! Deserializes capture-payload JSON into arena-resolved creation
//! descriptors, one `parse_<kind>` function per `EntryTag`.

mod application_info;
mod compute_pipeline;
mod descriptor_set_layout;
mod document;
mod error;
mod graphics_pipeline;
mod json_util;
mod pipeline_layout;
mod raytracing_pipeline;
mod render_pass;
mod sampler;
mod shader_module;
mod stage;

pub use application_info::parse_application_info;
pub use compute_pipeline::parse_compute_pipeline;
pub use descriptor_set_layout::parse_descriptor_set_layout;
pub use document::ParseResult;
pub use error::ParseError;
pub use graphics_pipeline::parse_graphics_pipeline;
pub use pipeline_layout::parse_pipeline_layout;
pub use raytracing_pipeline::parse_raytracing_pipeline;
pub use render_pass::parse_render_pass;
pub use sampler::parse_sampler;
pub use shader_module::parse_shader_module;
