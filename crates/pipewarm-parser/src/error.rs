use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("field `{0}` is missing or not a number")]
    InvalidNumber(&'static str),
    #[error("field `{0}` is missing or not a float")]
    InvalidFloat(&'static str),
    #[error("field `{0}` is missing or not a string")]
    InvalidString(&'static str),
    #[error("field `{0}` is not valid base64")]
    InvalidBase64(&'static str),
    #[error("shader varint region did not exactly cover the declared word count")]
    InvalidShaderPayloadEncoding,
    #[error("shader payload is missing its NUL separator or declared region")]
    InvalidShaderPayload,
    #[error("shader module payload has no code section")]
    NoShaderCodePayload,
    #[error("dependency hash `{0}` is not present in the entry table")]
    NoHandle(String),
    #[error("derivative pipelines (non-zero basePipelineHandle) are not supported")]
    BasePipelinesNotSupported,
    #[error("pipeline library chain entry has an unexpected sType")]
    InvalidSTypeForLibraries,
    #[error("unknown pNext chain entry type {0}")]
    UnknownExtension(u32),
}
