//! Native implementation of the parser module.
//!
//! The native module honours the same sandbox contract as a compiled one:
//! it reads its input from linear memory, writes records through the
//! bounds-checked accessors, and grows memory itself when its output does not
//! fit, trapping past the configured page ceiling.

use crate::error::{InitializationError, Trap};

use super::{
    ModuleContext, ModuleEngine, ParserModule, RECORD_SIZE,
    grammar::{Block, parse_blocks},
};

/// Magic bytes at the start of every module image.
pub const MAGIC: &[u8; 4] = b"\0mdp";

/// ABI version this host speaks.
pub const ABI_VERSION: u32 = 1;

/// Image of the built-in grammar: magic followed by the LE ABI version.
pub const IMAGE: &[u8] = b"\0mdp\x01\x00\x00\x00";

/// Instantiates module images for the built-in block grammar.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl ModuleEngine for NativeEngine {
    fn instantiate(&self, bytes: &[u8]) -> Result<Box<dyn ParserModule>, InitializationError> {
        if bytes.len() < 8 {
            return Err(InitializationError::InvalidImage(format!(
                "image is {} bytes, header needs 8",
                bytes.len()
            )));
        }
        if &bytes[..4] != MAGIC {
            return Err(InitializationError::InvalidImage(
                "missing module magic".to_string(),
            ));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != ABI_VERSION {
            return Err(InitializationError::UnsupportedAbi {
                found: version,
                expected: ABI_VERSION,
            });
        }
        Ok(Box::new(NativeModule::default()))
    }
}

#[derive(Debug, Default)]
pub struct NativeModule {
    heap_top: u32,
}

impl ParserModule for NativeModule {
    fn parse_document(
        &mut self,
        ctx: &mut ModuleContext<'_>,
        text_ptr: u32,
        text_len: u32,
        output_ptr: u32,
    ) -> Result<u32, Trap> {
        let text = match ctx.memory.read_str(text_ptr, text_len) {
            Ok(text) => text.to_owned(),
            Err(trap) => {
                ctx.host.error(&trap.to_string());
                return Err(trap);
            }
        };

        let blocks = parse_blocks(&text);
        let records: usize = blocks.iter().map(Block::record_count).sum();
        let arrays: usize = blocks.iter().map(Block::children_bytes).sum();
        let needed = u64::from(output_ptr)
            + 4 * blocks.len() as u64
            + u64::from(RECORD_SIZE) * records as u64
            + arrays as u64;

        let before = ctx.memory.pages();
        ctx.memory.ensure(needed)?;
        if ctx.memory.pages() > before {
            ctx.host.log(&format!(
                "grew memory to {} pages ({} KiB) for {records} records",
                ctx.memory.pages(),
                ctx.memory.size() / 1024
            ));
        }

        let mut writer = RecordWriter {
            next: output_ptr + 4 * blocks.len() as u32,
        };
        for (i, block) in blocks.iter().enumerate() {
            let ptr = writer.write(ctx, block)?;
            ctx.memory.write_u32(output_ptr + 4 * i as u32, ptr)?;
        }

        self.heap_top = writer.next;
        Ok(blocks.len() as u32)
    }

    fn heap_usage(&self) -> u32 {
        self.heap_top
    }
}

/// Bump allocator laying records and children arrays out after the pointer table.
struct RecordWriter {
    next: u32,
}

impl RecordWriter {
    fn alloc(&mut self, len: u32) -> u32 {
        let ptr = self.next;
        self.next += len;
        ptr
    }

    fn write(&mut self, ctx: &mut ModuleContext<'_>, block: &Block) -> Result<u32, Trap> {
        let record = self.alloc(RECORD_SIZE);
        let children_ptr = if block.children.is_empty() {
            0
        } else {
            let count = block.children.len() as u32;
            let array = self.alloc(4 + 4 * count);
            ctx.memory.write_u32(array, count)?;
            for (i, child) in block.children.iter().enumerate() {
                let child_ptr = self.write(ctx, child)?;
                ctx.memory.write_u32(array + 4 + 4 * i as u32, child_ptr)?;
            }
            array
        };

        ctx.memory.write_u32(record, block.node_type.tag())?;
        ctx.memory.write_u32(record + 4, block.start)?;
        ctx.memory.write_u32(record + 8, block.end)?;
        ctx.memory.write_u32(record + 12, children_ptr)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::{LinearMemory, PAGE_SIZE},
        module::LogForwarder,
        node::NodeType,
    };

    fn run(text: &str, max_pages: u32) -> (LinearMemory, Result<u32, Trap>, u32) {
        let mut memory = LinearMemory::new(1, max_pages).unwrap();
        memory.ensure(text.len() as u64).unwrap();
        memory.write(0, text.as_bytes()).unwrap();
        let mut module = NativeEngine.instantiate(IMAGE).unwrap();
        let output_ptr = (text.len() as u32).next_multiple_of(4);
        let mut ctx = ModuleContext {
            memory: &mut memory,
            host: &LogForwarder,
        };
        let result = module.parse_document(&mut ctx, 0, text.len() as u32, output_ptr);
        (memory, result, output_ptr)
    }

    #[test]
    fn rejects_short_image() {
        let err = NativeEngine.instantiate(b"\0md").err().unwrap();
        assert!(matches!(err, InitializationError::InvalidImage(_)));
    }

    #[test]
    fn rejects_bad_magic() {
        let err = NativeEngine.instantiate(b"\0asm\x01\0\0\0").err().unwrap();
        assert!(matches!(err, InitializationError::InvalidImage(_)));
    }

    #[test]
    fn rejects_other_abi_versions() {
        let err = NativeEngine.instantiate(b"\0mdp\x02\0\0\0").err().unwrap();
        assert!(matches!(
            err,
            InitializationError::UnsupportedAbi {
                found: 2,
                expected: 1
            }
        ));
    }

    #[test]
    fn writes_pointer_table_and_records() {
        let text = "# Hi\n\nbody";
        let (memory, result, output_ptr) = run(text, 2);
        assert_eq!(result.unwrap(), 2);

        let heading = memory.read_u32(output_ptr).unwrap();
        assert_eq!(
            NodeType::from_tag(memory.read_u32(heading).unwrap()),
            NodeType::Heading
        );
        assert_eq!(memory.read_u32(heading + 4).unwrap(), 2);
        assert_eq!(memory.read_u32(heading + 8).unwrap(), 4);
        assert_eq!(memory.read_u32(heading + 12).unwrap(), 0);
    }

    #[test]
    fn children_arrays_are_length_prefixed() {
        let text = "- a\n- b";
        let (memory, result, output_ptr) = run(text, 2);
        assert_eq!(result.unwrap(), 1);

        let list = memory.read_u32(output_ptr).unwrap();
        let children = memory.read_u32(list + 12).unwrap();
        assert_eq!(memory.read_u32(children).unwrap(), 2);
        let second = memory.read_u32(children + 8).unwrap();
        assert_eq!(memory.read_u32(second + 4).unwrap(), 6);
    }

    #[test]
    fn traps_when_output_exceeds_page_ceiling() {
        let text = "x\n\n".repeat(PAGE_SIZE as usize / 8);
        let (_, result, _) = run(&text, 1);
        assert!(matches!(result, Err(Trap::MemoryLimit { .. })));
    }

    #[test]
    fn grows_memory_when_allowed() {
        let text = "x\n\n".repeat(PAGE_SIZE as usize / 8);
        let (memory, result, _) = run(&text, 8);
        assert!(result.is_ok());
        assert!(memory.pages() > 1);
    }

    #[test]
    fn invalid_utf8_traps() {
        let mut memory = LinearMemory::new(1, 1).unwrap();
        memory.write(0, &[0xc3, 0x28]).unwrap();
        let mut module = NativeEngine.instantiate(IMAGE).unwrap();
        let mut ctx = ModuleContext {
            memory: &mut memory,
            host: &LogForwarder,
        };
        assert_eq!(
            module.parse_document(&mut ctx, 0, 2, 4),
            Err(Trap::InvalidUtf8 { ptr: 0, len: 2 })
        );
    }
}
