use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

use super::{ModuleSource, native};

/// Bytecode compiled into the binary (production builds).
#[derive(Debug, Clone)]
pub struct EmbeddedSource {
    bytes: Cow<'static, [u8]>,
}

impl EmbeddedSource {
    pub fn new(bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// The image of the built-in native block grammar.
    pub fn native() -> Self {
        Self::new(native::IMAGE)
    }
}

impl Default for EmbeddedSource {
    fn default() -> Self {
        Self::native()
    }
}

impl ModuleSource for EmbeddedSource {
    fn load_module_bytes(&self) -> Result<Vec<u8>, LoadError> {
        Ok(self.bytes.to_vec())
    }
}

/// Bytecode read from disk on every load (development builds).
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleSource for FileSource {
    fn load_module_bytes(&self) -> Result<Vec<u8>, LoadError> {
        std::fs::read(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
