mod arena;
mod ast;
mod config;
mod emit;
mod engine;
mod entities;
mod error;
mod html;
mod inline;
mod label;
mod memory;
mod output;
mod parser;
mod span;

pub use arena::{Children, NodeArena};
pub use ast::{
    Block, BlockId, BlockKind, CodeData, HtmlBlockKind, Inline, InlineId, InlineKind, InlineRange,
    ListData, ListKind,
};
pub use config::{EngineConfig, HtmlEmitOptions, SoftBreak};
pub use emit::emit_html;
pub use engine::{Engine, markdown_to_html, markdown_to_html_with};
pub use error::{ArenaError, MemoryError, RenderError};
pub use memory::{ALIGN, LinearMemory};
pub use output::OutputBuffer;
pub use parser::parse;
pub use span::Span;
