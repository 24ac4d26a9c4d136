use serde::{Deserialize, Serialize};

/// How the result cache derives its key from the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyStrategy {
    /// Byte length plus a 64-bit hash over the whole text.
    #[default]
    ContentHash,
    /// Byte length plus a hash of the first 100 characters only.
    ///
    /// Cheap, but two texts of equal length that share their first 100
    /// characters collide and the second one is served the first one's result.
    Fingerprint,
}

/// Linear memory sizing for one parser instance.
///
/// A parse needs roughly twice the UTF-8 length of the text plus
/// `output_slack` bytes, so with the defaults (200 pages, 12.8 MB) documents
/// above about 6.4 MB trap with [`Trap::MemoryLimit`](crate::Trap::MemoryLimit)
/// even though `max_document_size` admits them. Raise `max_pages` to parse
/// larger inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryOptions {
    pub initial_pages: u32,
    pub max_pages: u32,
    /// Extra bytes reserved past the text for the module's output region.
    pub output_slack: u32,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            initial_pages: 2,
            max_pages: 200,
            output_slack: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Inputs longer than this many characters are rejected before parsing.
    /// The memory ceiling in [`MemoryOptions`] may reject smaller ones.
    pub max_document_size: usize,
    pub enable_cache: bool,
    pub cache_size: usize,
    pub cache_key: CacheKeyStrategy,
    pub parse_inline_styles: bool,
    pub validate_structure: bool,
    pub memory: MemoryOptions,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_document_size: 10_000_000,
            enable_cache: true,
            cache_size: 50,
            cache_key: CacheKeyStrategy::default(),
            parse_inline_styles: true,
            validate_structure: true,
            memory: MemoryOptions::default(),
        }
    }
}
