//! # Memory/ABI Bridge
//!
//! Owns one module instance together with its linear memory and provides the
//! raw marshaling primitives the rest of the pipeline is built on. The
//! invoker (`invoke_parse`) performs exactly one parse round-trip:
//!
//! 1. write the UTF-8 text at offset 0
//! 2. reserve an output region right after it (`text_len + output_slack`)
//! 3. call the module's `parse_document` export
//!
//! Writes grow memory before copying, so a write either lands completely or
//! fails with a trap and leaves the buffer contents untouched.

use std::sync::Arc;

use crate::{
    error::{InitializationError, Trap},
    memory::LinearMemory,
    module::{HostImports, ModuleContext, ModuleEngine, ModuleSource, ParserModule},
    options::MemoryOptions,
};

/// Output of one module invocation, still encoded in linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNodes {
    pub output_ptr: u32,
    pub node_count: u32,
}

pub struct Bridge {
    memory: LinearMemory,
    instance: Box<dyn ParserModule>,
    host: Arc<dyn HostImports>,
    output_slack: u32,
}

impl Bridge {
    /// Loads bytecode from `source` and instantiates it with fresh memory.
    pub fn instantiate(
        source: &dyn ModuleSource,
        engine: &dyn ModuleEngine,
        host: Arc<dyn HostImports>,
        memory: MemoryOptions,
    ) -> Result<Self, InitializationError> {
        let bytes = source.load_module_bytes()?;
        let instance = engine.instantiate(&bytes)?;
        let linear = LinearMemory::new(memory.initial_pages, memory.max_pages)
            .map_err(InitializationError::Memory)?;
        log::debug!(
            "instantiated parser module ({} bytes, {} initial pages, {} max)",
            bytes.len(),
            linear.pages(),
            linear.max_pages()
        );
        Ok(Self {
            memory: linear,
            instance,
            host,
            output_slack: memory.output_slack,
        })
    }

    /// UTF-8 encodes `text` at `offset`, growing memory first if needed.
    /// Returns the pointer the text was written to.
    pub fn write_string(&mut self, text: &str, offset: u32) -> Result<u32, Trap> {
        self.memory
            .ensure(u64::from(offset) + text.len() as u64)?;
        self.memory.write(offset, text.as_bytes())?;
        Ok(offset)
    }

    pub fn read_string(&self, ptr: u32, length: u32) -> Result<String, Trap> {
        self.memory.read_str(ptr, length).map(str::to_owned)
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, Trap> {
        self.memory.read_u32(ptr)
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    pub fn memory_size(&self) -> u32 {
        self.memory.size()
    }

    pub fn heap_usage(&self) -> u32 {
        self.instance.heap_usage()
    }

    /// Writes `text`, reserves the output region and calls `parse_document`.
    pub fn invoke_parse(&mut self, text: &str) -> Result<RawNodes, Trap> {
        let text_len = u32::try_from(text.len()).map_err(|_| Trap::MemoryLimit {
            requested_pages: u32::MAX,
            max_pages: self.memory.max_pages(),
        })?;
        let output_ptr = text_len.checked_next_multiple_of(4).ok_or(Trap::OutOfBounds {
            ptr: text_len,
            len: 4,
            memory_size: self.memory.size(),
        })?;
        let reserved =
            u64::from(output_ptr) + u64::from(text_len) + u64::from(self.output_slack);
        self.memory.ensure(reserved)?;

        let text_ptr = self.write_string(text, 0)?;

        let mut ctx = ModuleContext {
            memory: &mut self.memory,
            host: self.host.as_ref(),
        };
        let node_count = self
            .instance
            .parse_document(&mut ctx, text_ptr, text_len, output_ptr)?;

        Ok(RawNodes {
            output_ptr,
            node_count,
        })
    }
}
