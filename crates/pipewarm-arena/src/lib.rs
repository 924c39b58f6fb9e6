//! Bump-allocated descriptor trees.
//!
//! Every root (pipeline) owns one [`RootArena`]. The parse phase allocates
//! the descriptor tree for that root's whole dependency subgraph out of the
//! arena and leaves raw-pointer "fixup" slots inside it wherever a field
//! must hold another entry's not-yet-known driver handle. The create phase
//! walks the subgraph bottom-up and patches each slot in turn via
//! [`RootArena::patch`].
//!
//! Nothing here is safe to call concurrently on the same arena; a
//! `RootArena` is built by exactly one worker thread during that root's
//! parse step (spec.md §4's single-step parse discipline keeps this true).

#![allow(unsafe_code)]

mod bump;
mod descriptor;

pub use bump::{handle_array_slot_ptr, handle_slot_ptr, RootArena};
pub use descriptor::{
    ApplicationInfoDescriptor, ComputePipelineDescriptor, DescriptorRef,
    DescriptorSetLayoutBindingDescriptor, DescriptorSetLayoutDescriptor,
    GraphicsPipelineDescriptor, PipelineLayoutDescriptor, RaytracingGroupDescriptor,
    RaytracingPipelineDescriptor, RenderPassDescriptor, SamplerDescriptor, ShaderModuleDescriptor,
    ShaderStageDescriptor, SubpassDescriptor,
};
