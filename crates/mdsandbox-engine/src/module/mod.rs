//! # Parser Module Seam
//!
//! The parsing grammar runs as an opaque, sandboxed module that only sees the
//! linear memory it is handed. This module defines the seam:
//!
//! - **`ModuleSource`**: acquires the module bytecode (`load_module_bytes`)
//! - **`ModuleEngine`**: validates and instantiates bytecode into a running module
//! - **`ParserModule`**: the instance, exporting `parse_document` and `heap_usage`
//! - **`HostImports`**: callbacks the module may invoke (`log`, `error`)
//!
//! ## ABI
//!
//! `parse_document(text_ptr, text_len, output_ptr) -> node_count` reads UTF-8
//! text at `text_ptr` and writes `node_count` little-endian `u32` pointers at
//! `output_ptr`. Each pointer addresses a 16-byte record:
//!
//! | offset | field          |
//! |-------:|----------------|
//! | 0      | `type: u32`    |
//! | 4      | `start: u32`   |
//! | 8      | `end: u32`     |
//! | 12     | `children: u32`|
//!
//! A non-zero `children` pointer addresses `count: u32` followed by `count`
//! record pointers. Offsets in records are relative to the start of the text.
//!
//! Implementations of [`ModuleEngine`] other than [`native::NativeEngine`]
//! can host a different grammar without touching the bridge or decoder.

pub mod grammar;
pub mod native;
pub mod source;

use crate::{
    error::{InitializationError, LoadError, Trap},
    memory::LinearMemory,
};

pub use native::NativeEngine;
pub use source::{EmbeddedSource, FileSource};

/// Size of one node record in bytes.
pub const RECORD_SIZE: u32 = 16;

/// Functions the host exposes to the running module.
pub trait HostImports: Send + Sync {
    fn log(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards module callbacks to the `log` facade, unmodified.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogForwarder;

impl HostImports for LogForwarder {
    fn log(&self, message: &str) {
        log::info!(target: "mdsandbox::module", "{message}");
    }

    fn error(&self, message: &str) {
        log::error!(target: "mdsandbox::module", "{message}");
    }
}

/// What a module sees during a call: its memory and the host's imports.
pub struct ModuleContext<'a> {
    pub memory: &'a mut LinearMemory,
    pub host: &'a dyn HostImports,
}

/// A running module instance.
pub trait ParserModule: Send {
    /// The exported parse entry point. Returns the number of top-level node
    /// pointers written at `output_ptr`.
    fn parse_document(
        &mut self,
        ctx: &mut ModuleContext<'_>,
        text_ptr: u32,
        text_len: u32,
        output_ptr: u32,
    ) -> Result<u32, Trap>;

    /// Bytes of linear memory the module considers in use after the last call.
    fn heap_usage(&self) -> u32;
}

/// Turns module bytecode into a running instance.
pub trait ModuleEngine: Send + Sync {
    fn instantiate(&self, bytes: &[u8]) -> Result<Box<dyn ParserModule>, InitializationError>;
}

/// Where module bytecode comes from (embedded payload, file on disk, ...).
pub trait ModuleSource: Send + Sync {
    fn load_module_bytes(&self) -> Result<Vec<u8>, LoadError>;
}
