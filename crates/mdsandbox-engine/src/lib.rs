//! Sandboxed Markdown parsing.
//!
//! The grammar runs as an isolated module that only sees a linear memory
//! buffer; this crate marshals text in, decodes the node records it writes
//! back, and layers inline styling, validation and caching on top.
//!
//! ```
//! use mdsandbox_engine::{NodeType, Parser, ParserOptions};
//!
//! let parser = Parser::new(ParserOptions::default());
//! let result = parser.parse("# Hello\n\nSome **bold** text").unwrap();
//! assert_eq!(result.nodes[0].node_type, NodeType::Heading);
//! println!("{}", parser.to_html(&result.nodes));
//! ```

pub mod bridge;
pub mod cache;
pub mod decode;
pub mod error;
pub mod inline;
pub mod memory;
pub mod module;
pub mod node;
pub mod options;
pub mod parser;
pub mod render;
pub mod validate;

pub use error::{DecodeError, InitializationError, LoadError, ParseError, Trap};
pub use module::{
    EmbeddedSource, FileSource, HostImports, LogForwarder, ModuleEngine, ModuleSource,
    NativeEngine, ParserModule,
};
pub use node::{AttributeValue, Attributes, NodeType, ParseResult, ParsedNode};
pub use options::{CacheKeyStrategy, MemoryOptions, ParserOptions};
pub use parser::{Parser, ParserStats};
pub use render::to_html;
pub use validate::{ValidationWarning, WarningKind};
