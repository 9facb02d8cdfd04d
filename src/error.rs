use thiserror::Error;

/// Failures raised by the hierarchy resolver, the stack simulator and the remapper.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum Error {
    /// The class is neither registered nor known to the fallback loader.
    #[error("unable to resolve class {name}")]
    Resolution { name: String },
    /// The instruction or class-file version has no modelled stack effect.
    #[error("unsupported bytecode in {method} at instruction {index}: {detail}")]
    UnsupportedBytecode {
        method: String,
        index: usize,
        detail: String,
    },
    /// The observed stack or frame state contradicts the instruction's requirements.
    #[error("malformed bytecode in {method} at instruction {index}: {detail}")]
    MalformedBytecode {
        method: String,
        index: usize,
        detail: String,
    },
    #[error(
        "conflicting mapping for {owner}.{name}{descriptor}: already renamed to {existing}, refusing {requested}"
    )]
    ConflictingMapping {
        owner: String,
        descriptor: String,
        name: String,
        existing: String,
        requested: String,
    },
    #[error("duplicate class {name}")]
    DuplicateClass { name: String },
}
