use crate::span::Span;

/// Index of a block in the node arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Index of an inline in the node arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct InlineId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub parent: Option<BlockId>,
    pub first_child: Option<BlockId>,
    pub last_child: Option<BlockId>,
    pub prev: Option<BlockId>,
    pub next: Option<BlockId>,
    /// Raw text of a leaf block once it is closed.
    pub content: Span,
    /// Inline children of paragraphs and headings.
    pub inlines: InlineRange,
    /// 1-based source line the block started on.
    pub start_line: u32,
    pub open: bool,
    pub last_line_blank: bool,
}

impl Block {
    pub fn new(kind: BlockKind, start_line: u32) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev: None,
            next: None,
            content: Span::EMPTY,
            inlines: InlineRange::EMPTY,
            start_line,
            open: true,
            last_line_blank: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Document,
    BlockQuote,
    List(ListData),
    ListItem(ListData),
    Paragraph,
    Heading { level: u8, setext: bool },
    CodeBlock(CodeData),
    HtmlBlock(HtmlBlockKind),
    ThematicBreak,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListData {
    pub kind: ListKind,
    /// Bullet character (`-`, `*`, `+`) or ordered delimiter (`.`, `)`).
    pub marker: u8,
    pub start: u32,
    pub tight: bool,
    /// Columns of indentation before the marker.
    pub marker_offset: usize,
    /// Marker width plus the spaces up to the item's content column.
    pub padding: usize,
}

impl ListData {
    pub fn is_ordered(&self) -> bool {
        self.kind == ListKind::Ordered
    }

    /// Items join the same list only when kind and marker agree.
    pub fn matches(&self, other: &ListData) -> bool {
        self.kind == other.kind && self.marker == other.marker
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeData {
    pub fenced: bool,
    pub fence_char: u8,
    pub fence_len: usize,
    /// Indentation of the opening fence, stripped from content lines.
    pub fence_offset: usize,
    /// Decoded info string.
    pub info: Span,
}

/// The seven HTML block start conditions, each with its own end condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HtmlBlockKind {
    /// `<pre`, `<script`, `<style`, `<textarea`; ends at the closing tag.
    Raw(&'static str),
    Comment,
    ProcessingInstruction,
    Declaration,
    Cdata,
    /// Known block-level tag; ends at a blank line.
    BlockTag,
    /// Any complete open or closing tag alone on its line.
    OtherTag,
}

/// Contiguous run of sibling inlines in the node arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InlineRange {
    pub start: u32,
    pub len: u32,
}

impl InlineRange {
    pub const EMPTY: InlineRange = InlineRange { start: 0, len: 0 };

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = InlineId> + use<> {
        (self.start..self.start + self.len).map(InlineId)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inline {
    pub kind: InlineKind,
    pub children: InlineRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InlineKind {
    Text(Span),
    Emphasis { strength: u8 },
    CodeSpan(Span),
    Link {
        destination: Span,
        title: Option<Span>,
    },
    /// Children hold the alt text.
    Image {
        destination: Span,
        title: Option<Span>,
    },
    LineBreak { hard: bool },
    RawHtml(Span),
}
