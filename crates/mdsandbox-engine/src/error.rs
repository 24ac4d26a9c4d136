use std::path::PathBuf;

/// Module bytecode could not be acquired.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read module bytecode at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The module could not be loaded or instantiated. Fatal for the parser
/// instance until `initialize()` succeeds again.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Invalid module image: {0}")]
    InvalidImage(String),
    #[error("Unsupported module ABI version {found} (expected {expected})")]
    UnsupportedAbi { found: u32, expected: u32 },
    #[error("Failed to allocate module memory: {0}")]
    Memory(#[source] Trap),
}

/// A fault raised while the module is executing against linear memory.
///
/// Module-raised aborts carry the module's own message unmodified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    #[error("out of bounds memory access: {len} bytes at {ptr} (memory size {memory_size})")]
    OutOfBounds {
        ptr: u32,
        len: u32,
        memory_size: u32,
    },
    #[error("memory limit exceeded: {requested_pages} pages requested, maximum is {max_pages}")]
    MemoryLimit { requested_pages: u32, max_pages: u32 },
    #[error("invalid UTF-8 in {len} bytes at {ptr}")]
    InvalidUtf8 { ptr: u32, len: u32 },
    #[error("{0}")]
    Abort(String),
}

/// The module returned output the decoder cannot make sense of.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("node record at {ptr} lies outside module memory")]
    OutOfBounds { ptr: u32 },
    #[error("children nested deeper than {max_depth} levels")]
    DepthExceeded { max_depth: usize },
    #[error("module reported {reported} nodes but output region holds at most {capacity}")]
    CountMismatch { reported: u32, capacity: u32 },
    #[error("module output references more than {limit} nodes")]
    TooManyNodes { limit: usize },
}

/// Errors returned by [`crate::Parser::parse`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Raised before any module interaction; the caller should chunk or reject.
    #[error("Document too large: {size} characters (maximum {max})")]
    DocumentTooLarge { size: usize, max: usize },
    #[error("Parser initialization failed: {0}")]
    Initialization(#[from] InitializationError),
    #[error("Module trapped during parse: {0}")]
    Module(#[source] Trap),
    #[error("Module returned inconsistent output: {0}")]
    Decode(#[from] DecodeError),
    #[error("Parser has been disposed; call initialize() before parsing again")]
    Disposed,
}

impl From<Trap> for ParseError {
    fn from(trap: Trap) -> Self {
        ParseError::Module(trap)
    }
}
