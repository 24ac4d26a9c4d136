//! # Parse Orchestration
//!
//! [`Parser`] ties the pipeline together and owns the module instance's
//! lifecycle:
//!
//! ```text
//! size check -> (lazy) initialize -> cache lookup -> invoke -> decode
//!            -> inline styles -> validate -> cache insert
//! ```
//!
//! All mutable state sits behind one mutex that `parse` holds for the whole
//! call, so concurrent callers never share the module's input region.
//!
//! ## Lifecycle
//!
//! - `parse` initializes a parser that was never initialized.
//! - After `dispose`, `parse` fails with [`ParseError::Disposed`] until
//!   `initialize` is called again, which starts over with fresh memory and an
//!   empty cache.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::{
    bridge::Bridge,
    cache::{CacheKey, ResultCache},
    decode::decode_nodes,
    error::{InitializationError, ParseError},
    inline::apply_inline_styles,
    module::{EmbeddedSource, HostImports, LogForwarder, ModuleEngine, ModuleSource, NativeEngine},
    node::{ParseResult, ParsedNode},
    options::ParserOptions,
    render,
    validate::validate,
};

/// Snapshot of a parser's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    pub initialized: bool,
    /// Linear memory size in bytes; 0 when not initialized.
    pub memory_size: u32,
    pub heap_usage: u32,
    pub cache_size: usize,
}

enum Lifecycle {
    Uninitialized,
    Ready(Bridge),
    Disposed,
}

struct State {
    lifecycle: Lifecycle,
    cache: ResultCache,
}

pub struct Parser {
    options: ParserOptions,
    source: Box<dyn ModuleSource>,
    engine: Box<dyn ModuleEngine>,
    host: Arc<dyn HostImports>,
    state: Mutex<State>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl Parser {
    /// A parser running the embedded native grammar, with module callbacks
    /// forwarded to `log`.
    pub fn new(options: ParserOptions) -> Self {
        let cache = ResultCache::new(options.cache_size);
        Self {
            options,
            source: Box::new(EmbeddedSource::native()),
            engine: Box::new(NativeEngine),
            host: Arc::new(LogForwarder),
            state: Mutex::new(State {
                lifecycle: Lifecycle::Uninitialized,
                cache,
            }),
        }
    }

    pub fn with_source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_engine(mut self, engine: impl ModuleEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostImports>) -> Self {
        self.host = host;
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic mid-parse leaves no half-applied state worth refusing.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn instantiate(&self) -> Result<Bridge, InitializationError> {
        Bridge::instantiate(
            self.source.as_ref(),
            self.engine.as_ref(),
            Arc::clone(&self.host),
            self.options.memory,
        )
    }

    /// Loads and instantiates the module. A no-op when already initialized.
    pub fn initialize(&self) -> Result<(), InitializationError> {
        let mut state = self.lock();
        if matches!(state.lifecycle, Lifecycle::Ready(_)) {
            return Ok(());
        }
        let bridge = self.instantiate()?;
        state.lifecycle = Lifecycle::Ready(bridge);
        state.cache.clear();
        log::debug!("parser initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.lock().lifecycle, Lifecycle::Ready(_))
    }

    /// Parses `text` into a node tree.
    ///
    /// Identical input is served from the cache when enabled. Texts longer
    /// than `max_document_size` characters are rejected before the module is
    /// touched.
    pub fn parse(&self, text: &str) -> Result<Arc<ParseResult>, ParseError> {
        self.check_size(text)?;

        let mut guard = self.lock();
        let State { lifecycle, cache } = &mut *guard;

        match lifecycle {
            Lifecycle::Disposed => return Err(ParseError::Disposed),
            Lifecycle::Uninitialized => {
                *lifecycle = Lifecycle::Ready(self.instantiate()?);
                log::debug!("parser initialized on first parse");
            }
            Lifecycle::Ready(_) => {}
        }
        let Lifecycle::Ready(bridge) = lifecycle else {
            return Err(ParseError::Disposed);
        };

        let key = self
            .options
            .enable_cache
            .then(|| CacheKey::new(text, self.options.cache_key));
        if let Some(hit) = key.as_ref().and_then(|key| cache.get(key)) {
            log::debug!("cache hit ({} bytes)", text.len());
            return Ok(hit);
        }

        let started = Instant::now();
        let raw = bridge.invoke_parse(text)?;
        let parse_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        log::debug!(
            "module parse: {} nodes in {parse_time_ms:.3} ms",
            raw.node_count
        );

        let mut nodes = decode_nodes(bridge.memory(), raw, text)?;
        if self.options.parse_inline_styles {
            apply_inline_styles(&mut nodes);
        }
        if self.options.validate_structure {
            // Length fit in u32 or the invocation above would have trapped.
            validate(&nodes, text.len() as u32);
        }

        let result = Arc::new(ParseResult {
            nodes,
            parse_time_ms,
            node_count: raw.node_count,
            memory_used: bridge.heap_usage(),
        });
        if let Some(key) = key {
            cache.insert(key, Arc::clone(&result));
        }
        Ok(result)
    }

    fn check_size(&self, text: &str) -> Result<(), ParseError> {
        let max = self.options.max_document_size;
        // Byte length bounds the character count from above.
        if text.len() <= max {
            return Ok(());
        }
        let size = text.chars().count();
        if size > max {
            return Err(ParseError::DocumentTooLarge { size, max });
        }
        Ok(())
    }

    /// Renders nodes back to HTML. See [`crate::render`].
    pub fn to_html(&self, nodes: &[ParsedNode]) -> String {
        render::to_html(nodes)
    }

    pub fn get_stats(&self) -> ParserStats {
        let state = self.lock();
        let (initialized, memory_size, heap_usage) = match &state.lifecycle {
            Lifecycle::Ready(bridge) => (true, bridge.memory_size(), bridge.heap_usage()),
            Lifecycle::Uninitialized | Lifecycle::Disposed => (false, 0, 0),
        };
        ParserStats {
            initialized,
            memory_size,
            heap_usage,
            cache_size: state.cache.len(),
        }
    }

    /// Releases the module instance, its memory and the cache.
    pub fn dispose(&self) {
        let mut state = self.lock();
        state.lifecycle = Lifecycle::Disposed;
        state.cache.clear();
        log::debug!("parser disposed");
    }
}
