use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to create a Vulkan instance: {0}")]
    InstanceCreate(#[source] ash::vk::Result),
    #[error("no physical device satisfies the requested API version or extensions")]
    NoSuitablePhysicalDevice,
    #[error("failed to create a logical device: {0}")]
    DeviceCreate(#[source] ash::vk::Result),
    #[error("driver rejected object creation: {0}")]
    Create(#[source] ash::vk::Result),
    #[error("requested Vulkan API version is not supported by the loaded driver")]
    ApiVersionUnsupported,
    #[error("a required instance extension is missing: {0}")]
    MissingInstanceExtension(String),
    #[error("failed to create a pipeline cache: {0}")]
    PipelineCacheCreate(#[source] ash::vk::Result),
    #[error("reading or writing the on-disk pipeline cache file: {0}")]
    PipelineCacheIo(#[from] std::io::Error),
}
