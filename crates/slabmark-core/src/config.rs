/// Sizing limits for one [`Engine`](crate::Engine) instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on bytes the allocator may hand out, bookkeeping excluded.
    pub memory_limit: u32,
    /// Size of each backing segment the allocator grows by.
    pub segment_size: u32,
    /// Maximum number of block plus inline nodes per render.
    pub node_limit: usize,
    /// Deepest container nesting; deeper markers are read as text.
    pub max_nesting: usize,
    pub emit: HtmlEmitOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit: 256 * 1024 * 1024,
            segment_size: 64 * 1024,
            node_limit: 4 * 1024 * 1024,
            max_nesting: 100,
            emit: HtmlEmitOptions::default(),
        }
    }
}

/// How soft line breaks are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SoftBreak {
    #[default]
    Newline,
    Space,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HtmlEmitOptions {
    /// Pass the rendered HTML through an allow-list sanitizer.
    pub sanitize: bool,
    pub soft_break: SoftBreak,
}
