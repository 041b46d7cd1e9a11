//! Block structure parsing.
//!
//! Lines are fed one at a time through a stack of open containers. Each
//! line first walks the open containers it continues, then opens any new
//! container or leaf blocks its remaining text starts, and finally lands in
//! the deepest block as text. Leaf text is buffered until the block closes.

use tracing::trace;

use crate::arena::NodeArena;
use crate::ast::{BlockId, BlockKind, CodeData, HtmlBlockKind, ListData, ListKind};
use crate::error::ArenaError;
use crate::html::{html_block_end, html_block_start};
use crate::inline::{
    LinkDefinitions, parse_inlines, parse_link_reference_definition, unescape_and_decode,
};
use crate::span::Span;

const TAB_STOP: usize = 4;
const CODE_INDENT: usize = 4;
const MAX_LIST_START_DIGITS: usize = 9;

/// Parses `source` into `arena`: the block tree first, then the inline
/// content of every paragraph and heading. Returns the document block.
pub fn parse(
    arena: &mut NodeArena,
    source: &str,
    max_nesting: usize,
) -> Result<BlockId, ArenaError> {
    let doc = parse_document(arena, source, max_nesting)?;
    let mut stack = vec![doc.root];
    let mut text = String::new();
    while let Some(id) = stack.pop() {
        let block = *arena.block(id);
        match block.kind {
            BlockKind::Paragraph | BlockKind::Heading { .. } => {
                text.clear();
                text.push_str(arena.text(block.content));
                let inlines = parse_inlines(arena, &text, &doc.link_defs)?;
                arena.block_mut(id).inlines = inlines;
            }
            _ => stack.extend(arena.children(id)),
        }
    }
    trace!(inlines = arena.inline_count(), "inline pass done");
    Ok(doc.root)
}

pub(crate) struct ParsedDocument {
    pub root: BlockId,
    pub link_defs: LinkDefinitions,
}

/// Builds the block tree for `source` in `arena`. Blockquotes and list
/// items nested deeper than `max_nesting` are read as text.
pub(crate) fn parse_document(
    arena: &mut NodeArena,
    source: &str,
    max_nesting: usize,
) -> Result<ParsedDocument, ArenaError> {
    let root = arena.push_block(BlockKind::Document, 0)?;
    let mut parser = BlockParser::new(arena, root, max_nesting);
    let mut line = String::new();
    let mut rest = source;
    while !rest.is_empty() {
        let (raw, next) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        rest = next;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        line.clear();
        if raw.contains('\0') {
            line.push_str(&raw.replace('\0', "\u{FFFD}"));
        } else {
            line.push_str(raw);
        }
        line.push('\n');
        parser.process_line(&line)?;
    }
    parser.finish()
}

enum Continuation {
    Matched,
    NotMatched,
    /// The line closed a fenced code block and is fully consumed.
    Consumed,
}

struct BlockParser<'a> {
    arena: &'a mut NodeArena,
    root: BlockId,
    current: BlockId,
    max_nesting: usize,
    line_number: u32,
    offset: usize,
    column: usize,
    first_nonspace: usize,
    first_nonspace_column: usize,
    indent: usize,
    blank: bool,
    partially_consumed_tab: bool,
    leaf_buf: String,
    leaf_owner: Option<BlockId>,
    link_defs: LinkDefinitions,
}

impl<'a> BlockParser<'a> {
    fn new(arena: &'a mut NodeArena, root: BlockId, max_nesting: usize) -> Self {
        Self {
            arena,
            root,
            current: root,
            max_nesting,
            line_number: 0,
            offset: 0,
            column: 0,
            first_nonspace: 0,
            first_nonspace_column: 0,
            indent: 0,
            blank: false,
            partially_consumed_tab: false,
            leaf_buf: String::new(),
            leaf_owner: None,
            link_defs: LinkDefinitions::new(),
        }
    }

    fn kind(&self, id: BlockId) -> BlockKind {
        self.arena.block(id).kind
    }

    fn process_line(&mut self, line: &str) -> Result<(), ArenaError> {
        self.offset = 0;
        self.column = 0;
        self.first_nonspace = 0;
        self.first_nonspace_column = 0;
        self.indent = 0;
        self.blank = false;
        self.partially_consumed_tab = false;
        self.line_number += 1;

        let Some((container, all_matched)) = self.check_open_blocks(line)? else {
            return Ok(());
        };
        let last_matched = container;
        let container = self.open_new_blocks(container, line, all_matched)?;
        self.add_text_to_container(container, last_matched, line)
    }

    fn finish(mut self) -> Result<ParsedDocument, ArenaError> {
        while self.current != self.root {
            self.current = self.finalize(self.current)?;
        }
        self.finalize(self.root)?;
        trace!(
            lines = self.line_number,
            blocks = self.arena.block_count(),
            link_defs = self.link_defs.len(),
            "block tree built"
        );
        Ok(ParsedDocument {
            root: self.root,
            link_defs: self.link_defs,
        })
    }

    /// Walks the open containers the line continues. Returns `None` when the
    /// line was consumed by a closing code fence.
    fn check_open_blocks(&mut self, line: &str) -> Result<Option<(BlockId, bool)>, ArenaError> {
        let mut container = self.root;
        loop {
            let Some(last_child) = self.arena.block(container).last_child else {
                break;
            };
            if !self.arena.block(last_child).open {
                break;
            }
            container = last_child;
            self.find_first_nonspace(line);

            let continuation = match self.kind(container) {
                BlockKind::BlockQuote => self.parse_block_quote_prefix(line),
                BlockKind::ListItem(data) => self.parse_item_prefix(line, container, &data),
                BlockKind::CodeBlock(data) => self.parse_code_block_prefix(line, container, &data)?,
                BlockKind::HtmlBlock(HtmlBlockKind::BlockTag | HtmlBlockKind::OtherTag)
                | BlockKind::Paragraph
                    if self.blank =>
                {
                    Continuation::NotMatched
                }
                BlockKind::Heading { .. } | BlockKind::ThematicBreak => Continuation::NotMatched,
                _ => Continuation::Matched,
            };
            match continuation {
                Continuation::Matched => {}
                Continuation::Consumed => return Ok(None),
                Continuation::NotMatched => {
                    let parent = self.arena.block(container).parent.unwrap_or(self.root);
                    return Ok(Some((parent, false)));
                }
            }
        }
        Ok(Some((container, true)))
    }

    fn open_new_blocks(
        &mut self,
        mut container: BlockId,
        line: &str,
        all_matched: bool,
    ) -> Result<BlockId, ArenaError> {
        let mut maybe_lazy = matches!(self.kind(self.current), BlockKind::Paragraph);
        while !matches!(
            self.kind(container),
            BlockKind::CodeBlock(_) | BlockKind::HtmlBlock(_)
        ) {
            self.find_first_nonspace(line);
            let indented = self.indent >= CODE_INDENT;
            let rest = &line[self.first_nonspace..];
            let container_kind = self.kind(container);
            let in_paragraph = matches!(container_kind, BlockKind::Paragraph);

            if !indented && rest.starts_with('>') && self.can_nest(container) {
                self.advance_offset(line, self.first_nonspace + 1 - self.offset, false);
                if line.as_bytes().get(self.offset).copied().is_some_and(is_space_or_tab) {
                    self.advance_offset(line, 1, true);
                }
                container = self.add_child(container, BlockKind::BlockQuote)?;
            } else if !indented && let Some(level) = scan_atx_open(rest) {
                self.advance_offset(line, self.first_nonspace + level as usize - self.offset, false);
                container = self.add_child(
                    container,
                    BlockKind::Heading {
                        level,
                        setext: false,
                    },
                )?;
            } else if !indented && let Some((fence_len, fence_char)) = scan_fence_open(rest) {
                let data = CodeData {
                    fenced: true,
                    fence_char,
                    fence_len,
                    fence_offset: self.first_nonspace - self.offset,
                    info: Span::EMPTY,
                };
                container = self.add_child(container, BlockKind::CodeBlock(data))?;
                self.advance_offset(line, self.first_nonspace + fence_len - self.offset, false);
            } else if !indented
                && let Some(kind) = html_block_start(rest, !in_paragraph && !maybe_lazy)
            {
                container = self.add_child(container, BlockKind::HtmlBlock(kind))?;
            } else if !indented
                && in_paragraph
                && let Some(level) = setext_underline_level(rest)
            {
                self.claim_leaf(container);
                let mut content = std::mem::take(&mut self.leaf_buf);
                let has_content = self.strip_reference_definitions(&mut content);
                self.leaf_buf = content;
                if has_content {
                    self.arena.block_mut(container).kind = BlockKind::Heading {
                        level,
                        setext: true,
                    };
                    self.advance_offset(line, line.len() - 1 - self.offset, false);
                }
            } else if !indented
                && !(in_paragraph && !all_matched)
                && is_thematic_break_line(rest)
            {
                container = self.add_child(container, BlockKind::ThematicBreak)?;
                self.advance_offset(line, line.len() - 1 - self.offset, false);
            } else if !indented
                && self.can_nest(container)
                && let Some((matched, mut data)) =
                    parse_list_marker(line, self.first_nonspace, in_paragraph)
            {
                self.advance_offset(line, self.first_nonspace + matched - self.offset, false);
                let saved = (self.partially_consumed_tab, self.offset, self.column);
                while self.column - saved.2 <= 5
                    && line.as_bytes().get(self.offset).copied().is_some_and(is_space_or_tab)
                {
                    self.advance_offset(line, 1, true);
                }
                let spaces = self.column - saved.2;
                let at_line_end = matches!(line.as_bytes().get(self.offset), None | Some(b'\n'));
                if !(1..5).contains(&spaces) || at_line_end {
                    data.padding = matched + 1;
                    (self.partially_consumed_tab, self.offset, self.column) = saved;
                    if spaces > 0 {
                        self.advance_offset(line, 1, true);
                    }
                } else {
                    data.padding = matched + spaces;
                }
                data.marker_offset = self.indent;

                let continues_list =
                    matches!(container_kind, BlockKind::List(existing) if existing.matches(&data));
                if !continues_list {
                    container = self.add_child(container, BlockKind::List(data))?;
                }
                container = self.add_child(container, BlockKind::ListItem(data))?;
            } else if indented && !maybe_lazy && !self.blank {
                self.advance_offset(line, CODE_INDENT, true);
                let data = CodeData {
                    fenced: false,
                    fence_char: 0,
                    fence_len: 0,
                    fence_offset: 0,
                    info: Span::EMPTY,
                };
                container = self.add_child(container, BlockKind::CodeBlock(data))?;
            } else {
                break;
            }

            if accepts_lines(&self.kind(container)) {
                break;
            }
            maybe_lazy = false;
        }
        Ok(container)
    }

    fn add_text_to_container(
        &mut self,
        mut container: BlockId,
        last_matched: BlockId,
        line: &str,
    ) -> Result<(), ArenaError> {
        self.find_first_nonspace(line);

        if self.blank
            && let Some(last_child) = self.arena.block(container).last_child
        {
            self.arena.block_mut(last_child).last_line_blank = true;
        }
        let last_line_blank = self.blank
            && match self.kind(container) {
                BlockKind::BlockQuote | BlockKind::Heading { .. } | BlockKind::ThematicBreak => {
                    false
                }
                BlockKind::CodeBlock(data) => !data.fenced,
                BlockKind::ListItem(_) => {
                    let block = self.arena.block(container);
                    block.first_child.is_some() || block.start_line != self.line_number
                }
                _ => true,
            };
        self.arena.block_mut(container).last_line_blank = last_line_blank;
        let mut ancestor = self.arena.block(container).parent;
        while let Some(id) = ancestor {
            self.arena.block_mut(id).last_line_blank = false;
            ancestor = self.arena.block(id).parent;
        }

        let lazy = self.current != last_matched
            && container == last_matched
            && !self.blank
            && matches!(self.kind(self.current), BlockKind::Paragraph);
        if lazy {
            self.add_line(self.current, line);
            return Ok(());
        }

        while self.current != last_matched {
            self.current = self.finalize(self.current)?;
        }

        match self.kind(container) {
            BlockKind::CodeBlock(_) => self.add_line(container, line),
            BlockKind::HtmlBlock(kind) => {
                self.add_line(container, line);
                if html_block_end(kind, &line[self.first_nonspace..]) {
                    self.current = self.finalize(container)?;
                    return Ok(());
                }
            }
            _ if self.blank => {}
            BlockKind::Heading { setext: false, .. } => {
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                let content = atx_content(&line[self.offset..]);
                self.append_leaf(container, content);
            }
            BlockKind::Paragraph | BlockKind::Heading { .. } => {
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                self.add_line(container, line);
            }
            _ => {
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                container = self.add_child(container, BlockKind::Paragraph)?;
                self.add_line(container, line);
            }
        }
        self.current = container;
        Ok(())
    }

    fn parse_block_quote_prefix(&mut self, line: &str) -> Continuation {
        let bytes = line.as_bytes();
        if self.indent > 3 || bytes.get(self.first_nonspace) != Some(&b'>') {
            return Continuation::NotMatched;
        }
        self.advance_offset(line, self.indent + 1, true);
        if bytes.get(self.offset).copied().is_some_and(is_space_or_tab) {
            self.advance_offset(line, 1, true);
        }
        Continuation::Matched
    }

    fn parse_item_prefix(&mut self, line: &str, item: BlockId, data: &ListData) -> Continuation {
        let content_column = data.marker_offset + data.padding;
        if self.indent >= content_column {
            self.advance_offset(line, content_column, true);
            Continuation::Matched
        } else if self.blank && self.arena.block(item).first_child.is_some() {
            self.advance_offset(line, self.first_nonspace - self.offset, false);
            Continuation::Matched
        } else {
            Continuation::NotMatched
        }
    }

    fn parse_code_block_prefix(
        &mut self,
        line: &str,
        block: BlockId,
        data: &CodeData,
    ) -> Result<Continuation, ArenaError> {
        if !data.fenced {
            if self.indent >= CODE_INDENT {
                self.advance_offset(line, CODE_INDENT, true);
                return Ok(Continuation::Matched);
            }
            if self.blank {
                self.advance_offset(line, self.first_nonspace - self.offset, false);
                return Ok(Continuation::Matched);
            }
            return Ok(Continuation::NotMatched);
        }

        if self.indent <= 3 && is_fence_close(&line[self.first_nonspace..], data) {
            self.advance_offset(line, line.len() - 1 - self.offset, false);
            self.current = self.finalize(block)?;
            return Ok(Continuation::Consumed);
        }
        let mut remaining = data.fence_offset;
        while remaining > 0 && line.as_bytes().get(self.offset) == Some(&b' ') {
            self.advance_offset(line, 1, true);
            remaining -= 1;
        }
        Ok(Continuation::Matched)
    }

    /// Adds `kind` under `parent`, closing blocks until one can hold it.
    fn add_child(&mut self, mut parent: BlockId, kind: BlockKind) -> Result<BlockId, ArenaError> {
        while !can_contain(&self.kind(parent), &kind) {
            parent = self.finalize(parent)?;
        }
        let id = self.arena.push_block(kind, self.line_number)?;
        self.arena.append_child(parent, id);
        Ok(id)
    }

    fn can_nest(&self, container: BlockId) -> bool {
        let mut depth = 0;
        let mut cursor = Some(container);
        while let Some(id) = cursor {
            let block = self.arena.block(id);
            if matches!(block.kind, BlockKind::BlockQuote | BlockKind::ListItem(_)) {
                depth += 1;
            }
            cursor = block.parent;
        }
        depth < self.max_nesting
    }

    /// Closes `id` and returns its parent. Closing a closed block does
    /// nothing.
    fn finalize(&mut self, id: BlockId) -> Result<BlockId, ArenaError> {
        let parent = self.arena.block(id).parent.unwrap_or(self.root);
        if !self.arena.block(id).open {
            return Ok(parent);
        }
        self.arena.block_mut(id).open = false;

        match self.kind(id) {
            BlockKind::Paragraph => {
                let mut content = self.take_leaf(id);
                if self.strip_reference_definitions(&mut content) {
                    let span = self.arena.push_text(trim_trailing_whitespace(&content));
                    self.arena.block_mut(id).content = span;
                } else {
                    self.arena.detach(id);
                }
            }
            BlockKind::Heading { .. } => {
                let content = self.take_leaf(id);
                let span = self.arena.push_text(trim_trailing_whitespace(&content));
                self.arena.block_mut(id).content = span;
            }
            BlockKind::CodeBlock(mut data) => {
                let content = self.take_leaf(id);
                let body = if data.fenced {
                    let (first, body) = content.split_once('\n').unwrap_or((content.as_str(), ""));
                    let info = unescape_and_decode(first.trim_matches([' ', '\t']));
                    data.info = self.arena.push_text(&info);
                    body
                } else {
                    strip_trailing_blank_lines(&content)
                };
                let span = self.arena.push_text(body);
                let block = self.arena.block_mut(id);
                block.content = span;
                block.kind = BlockKind::CodeBlock(data);
            }
            BlockKind::HtmlBlock(_) => {
                let content = self.take_leaf(id);
                let span = self.arena.push_text(&content);
                self.arena.block_mut(id).content = span;
            }
            BlockKind::List(mut data) => {
                data.tight = self.list_is_tight(id);
                self.arena.block_mut(id).kind = BlockKind::List(data);
            }
            _ => {}
        }
        Ok(parent)
    }

    fn list_is_tight(&self, list: BlockId) -> bool {
        for item in self.arena.children(list) {
            let has_next_item = self.arena.block(item).next.is_some();
            if self.arena.block(item).last_line_blank && has_next_item {
                return false;
            }
            for child in self.arena.children(item) {
                let has_next = has_next_item || self.arena.block(child).next.is_some();
                if has_next && self.ends_with_blank_line(child) {
                    return false;
                }
            }
        }
        true
    }

    fn ends_with_blank_line(&self, mut id: BlockId) -> bool {
        loop {
            let block = self.arena.block(id);
            if block.last_line_blank {
                return true;
            }
            match (block.kind, block.last_child) {
                (BlockKind::List(_) | BlockKind::ListItem(_), Some(child)) => id = child,
                _ => return false,
            }
        }
    }

    /// Moves leading link reference definitions out of paragraph text.
    /// Returns whether any other content remains.
    fn strip_reference_definitions(&mut self, content: &mut String) -> bool {
        let mut consumed = 0;
        while content[consumed..].trim_start_matches([' ', '\t']).starts_with('[') {
            let Some((label, def, used)) = parse_link_reference_definition(&content[consumed..])
            else {
                break;
            };
            self.link_defs.entry(label).or_insert(def);
            consumed += used;
        }
        content.drain(..consumed);
        content.bytes().any(|b| !matches!(b, b' ' | b'\t' | b'\n'))
    }

    fn add_line(&mut self, id: BlockId, line: &str) {
        self.claim_leaf(id);
        if self.partially_consumed_tab {
            self.offset += 1;
            let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
            self.leaf_buf.extend(std::iter::repeat_n(' ', chars_to_tab));
        }
        if let Some(text) = line.get(self.offset..) {
            self.leaf_buf.push_str(text);
        }
    }

    fn append_leaf(&mut self, id: BlockId, text: &str) {
        self.claim_leaf(id);
        self.leaf_buf.push_str(text);
    }

    /// Points the leaf buffer at `id`, parking the previous owner's text in
    /// the arena.
    fn claim_leaf(&mut self, id: BlockId) {
        if self.leaf_owner == Some(id) {
            return;
        }
        if let Some(owner) = self.leaf_owner.take() {
            let span = self.arena.push_text(&self.leaf_buf);
            self.arena.block_mut(owner).content = span;
        }
        let parked = self.arena.block(id).content;
        self.leaf_buf.clear();
        self.leaf_buf.push_str(self.arena.text(parked));
        self.leaf_owner = Some(id);
    }

    fn take_leaf(&mut self, id: BlockId) -> String {
        if self.leaf_owner == Some(id) {
            self.leaf_owner = None;
            return std::mem::take(&mut self.leaf_buf);
        }
        self.arena.text(self.arena.block(id).content).to_string()
    }

    fn find_first_nonspace(&mut self, line: &str) {
        let bytes = line.as_bytes();
        self.first_nonspace = self.offset;
        self.first_nonspace_column = self.column;
        let mut chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
        loop {
            match bytes.get(self.first_nonspace) {
                Some(b' ') => {
                    self.first_nonspace += 1;
                    self.first_nonspace_column += 1;
                    chars_to_tab -= 1;
                    if chars_to_tab == 0 {
                        chars_to_tab = TAB_STOP;
                    }
                }
                Some(b'\t') => {
                    self.first_nonspace += 1;
                    self.first_nonspace_column += chars_to_tab;
                    chars_to_tab = TAB_STOP;
                }
                _ => break,
            }
        }
        self.indent = self.first_nonspace_column - self.column;
        self.blank = matches!(bytes.get(self.first_nonspace), None | Some(b'\n'));
    }

    /// Advances by `count` bytes, or by `count` columns when `columns` is
    /// set, in which case a tab may be consumed partially.
    fn advance_offset(&mut self, line: &str, mut count: usize, columns: bool) {
        let bytes = line.as_bytes();
        while count > 0 {
            match bytes.get(self.offset) {
                None => break,
                Some(b'\t') => {
                    let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
                    if columns {
                        self.partially_consumed_tab = chars_to_tab > count;
                        let step = chars_to_tab.min(count);
                        self.column += step;
                        if !self.partially_consumed_tab {
                            self.offset += 1;
                        }
                        count -= step;
                    } else {
                        self.partially_consumed_tab = false;
                        self.column += chars_to_tab;
                        self.offset += 1;
                        count -= 1;
                    }
                }
                Some(_) => {
                    self.partially_consumed_tab = false;
                    self.offset += 1;
                    self.column += 1;
                    count -= 1;
                }
            }
        }
    }
}

fn can_contain(parent: &BlockKind, child: &BlockKind) -> bool {
    match parent {
        BlockKind::Document | BlockKind::BlockQuote | BlockKind::ListItem(_) => {
            !matches!(child, BlockKind::ListItem(_))
        }
        BlockKind::List(_) => matches!(child, BlockKind::ListItem(_)),
        _ => false,
    }
}

fn accepts_lines(kind: &BlockKind) -> bool {
    matches!(
        kind,
        BlockKind::Paragraph
            | BlockKind::Heading { .. }
            | BlockKind::CodeBlock(_)
            | BlockKind::HtmlBlock(_)
    )
}

fn is_space_or_tab(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

fn trim_trailing_whitespace(text: &str) -> &str {
    text.trim_end_matches([' ', '\t', '\n'])
}

fn strip_trailing_blank_lines(content: &str) -> &str {
    let kept = trim_trailing_whitespace(content).len();
    match content[kept..].find('\n') {
        Some(idx) => &content[..kept + idx + 1],
        None => content,
    }
}

/// Returns the heading level when `rest` opens an ATX heading.
fn scan_atx_open(rest: &str) -> Option<u8> {
    let bytes = rest.as_bytes();
    let level = bytes.iter().take_while(|b| **b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    match bytes.get(level) {
        None | Some(b' ' | b'\t' | b'\n') => Some(level as u8),
        _ => None,
    }
}

/// Strips the optional closing `#` sequence and surrounding whitespace
/// from the text after an ATX opener.
fn atx_content(rest: &str) -> &str {
    let text = rest.trim_end_matches([' ', '\t', '\n']);
    let bytes = text.as_bytes();
    let hash_start = text.trim_end_matches('#').len();
    if hash_start == bytes.len() {
        return text;
    }
    if hash_start == 0 {
        return "";
    }
    if !is_space_or_tab(bytes[hash_start - 1]) {
        return text;
    }
    text[..hash_start].trim_end_matches([' ', '\t'])
}

/// Returns the fence length and character when `rest` opens a code fence.
fn scan_fence_open(rest: &str) -> Option<(usize, u8)> {
    let bytes = rest.as_bytes();
    let fence_char = *bytes.first()?;
    if fence_char != b'`' && fence_char != b'~' {
        return None;
    }
    let fence_len = bytes.iter().take_while(|b| **b == fence_char).count();
    if fence_len < 3 {
        return None;
    }
    if fence_char == b'`' && rest[fence_len..].contains('`') {
        return None;
    }
    Some((fence_len, fence_char))
}

fn is_fence_close(rest: &str, data: &CodeData) -> bool {
    let bytes = rest.as_bytes();
    let count = bytes.iter().take_while(|b| **b == data.fence_char).count();
    count >= data.fence_len
        && bytes[count..]
            .iter()
            .all(|b| matches!(b, b' ' | b'\t' | b'\n'))
}

fn setext_underline_level(rest: &str) -> Option<u8> {
    let bytes = rest.as_bytes();
    let ch = *bytes.first()?;
    if ch != b'=' && ch != b'-' {
        return None;
    }
    let run = bytes.iter().take_while(|b| **b == ch).count();
    if bytes[run..].iter().any(|b| !matches!(b, b' ' | b'\t' | b'\n')) {
        return None;
    }
    Some(if ch == b'=' { 1 } else { 2 })
}

fn is_thematic_break_line(rest: &str) -> bool {
    let mut marker: Option<u8> = None;
    let mut count = 0;
    for b in rest.bytes() {
        match b {
            b' ' | b'\t' | b'\n' => continue,
            b'-' | b'*' | b'_' if marker.is_none_or(|m| m == b) => {
                marker = Some(b);
                count += 1;
            }
            _ => return false,
        }
    }
    count >= 3
}

/// Parses a list marker at `pos`. Returns the marker width and list data
/// with padding and offset still unset.
fn parse_list_marker(
    line: &str,
    pos: usize,
    interrupts_paragraph: bool,
) -> Option<(usize, ListData)> {
    let bytes = line.as_bytes();
    let rest_is_blank = |from: usize| {
        bytes[from..]
            .iter()
            .all(|b| matches!(b, b' ' | b'\t' | b'\n'))
    };
    let first = *bytes.get(pos)?;
    if matches!(first, b'*' | b'-' | b'+') {
        let after = pos + 1;
        if !matches!(bytes.get(after), None | Some(b' ' | b'\t' | b'\n')) {
            return None;
        }
        if interrupts_paragraph && rest_is_blank(after) {
            return None;
        }
        let data = ListData {
            kind: ListKind::Bullet,
            marker: first,
            start: 1,
            tight: false,
            marker_offset: 0,
            padding: 0,
        };
        return Some((1, data));
    }

    if !first.is_ascii_digit() {
        return None;
    }
    let digits = bytes[pos..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits > MAX_LIST_START_DIGITS {
        return None;
    }
    let start: u32 = line[pos..pos + digits].parse().ok()?;
    if interrupts_paragraph && start != 1 {
        return None;
    }
    let delimiter = *bytes.get(pos + digits)?;
    if delimiter != b'.' && delimiter != b')' {
        return None;
    }
    let after = pos + digits + 1;
    if !matches!(bytes.get(after), None | Some(b' ' | b'\t' | b'\n')) {
        return None;
    }
    if interrupts_paragraph && rest_is_blank(after) {
        return None;
    }
    let data = ListData {
        kind: ListKind::Ordered,
        marker: delimiter,
        start,
        tight: false,
        marker_offset: 0,
        padding: 0,
    };
    Some((digits + 1, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(source: &str) -> String {
        let mut arena = NodeArena::new(1 << 20);
        let doc = parse_document(&mut arena, source, 100).unwrap();
        let mut out = String::new();
        write_outline(&arena, doc.root, 0, &mut out);
        out
    }

    fn write_outline(arena: &NodeArena, id: BlockId, depth: usize, out: &mut String) {
        let block = arena.block(id);
        let label = match block.kind {
            BlockKind::Document => "document".to_string(),
            BlockKind::BlockQuote => "quote".to_string(),
            BlockKind::List(data) => format!(
                "list({}{}{})",
                data.marker as char,
                data.start,
                if data.tight { " tight" } else { "" }
            ),
            BlockKind::ListItem(_) => "item".to_string(),
            BlockKind::Paragraph => format!("para {:?}", arena.text(block.content)),
            BlockKind::Heading { level, .. } => {
                format!("h{level} {:?}", arena.text(block.content))
            }
            BlockKind::CodeBlock(data) => format!(
                "code[{}] {:?}",
                arena.text(data.info),
                arena.text(block.content)
            ),
            BlockKind::HtmlBlock(_) => format!("html {:?}", arena.text(block.content)),
            BlockKind::ThematicBreak => "hr".to_string(),
        };
        out.push_str(&"  ".repeat(depth));
        out.push_str(&label);
        out.push('\n');
        for child in arena.children(id) {
            write_outline(arena, child, depth + 1, out);
        }
    }

    #[test]
    fn paragraphs_and_headings() {
        assert_eq!(
            outline("# Title #\n\nsome\ntext\n\nSub\n---\n"),
            "document\n  h1 \"Title\"\n  para \"some\\ntext\"\n  h2 \"Sub\"\n"
        );
    }

    #[test]
    fn atx_closing_sequence_rules() {
        assert_eq!(atx_content("foo ##\n"), "foo");
        assert_eq!(atx_content("foo#\n"), "foo#");
        assert_eq!(atx_content("###\n"), "");
        assert_eq!(atx_content("foo \\#\n"), "foo \\#");
        assert_eq!(scan_atx_open("#5 bolt"), None);
        assert_eq!(scan_atx_open("####### x"), None);
        assert_eq!(scan_atx_open("#\n"), Some(1));
    }

    #[test]
    fn bullet_marker_change_starts_new_list() {
        assert_eq!(
            outline("- a\n- b\n* c\n"),
            "document\n  list(-1 tight)\n    item\n      para \"a\"\n    item\n      para \"b\"\n  list(*1 tight)\n    item\n      para \"c\"\n"
        );
    }

    #[test]
    fn blank_line_between_items_makes_list_loose() {
        assert_eq!(
            outline("1. a\n\n2. b\n"),
            "document\n  list(.1)\n    item\n      para \"a\"\n    item\n      para \"b\"\n"
        );
    }

    #[test]
    fn ordered_list_keeps_start_number() {
        let tree = outline("7) x\n8) y\n");
        assert!(tree.starts_with("document\n  list()7 tight)"));
    }

    #[test]
    fn only_ordered_one_interrupts_paragraph() {
        assert_eq!(outline("a\n2. b\n"), "document\n  para \"a\\n2. b\"\n");
        assert!(outline("a\n1. b\n").contains("list(.1 tight)"));
        assert_eq!(outline("a\n-\n"), "document\n  h2 \"a\"\n");
    }

    #[test]
    fn lazy_continuation_extends_quoted_paragraph() {
        assert_eq!(
            outline("> a\nb\n"),
            "document\n  quote\n    para \"a\\nb\"\n"
        );
        assert_eq!(
            outline("> a\n---\n"),
            "document\n  quote\n    para \"a\"\n  hr\n"
        );
    }

    #[test]
    fn fenced_code_keeps_info_and_closes_on_matching_fence() {
        assert_eq!(
            outline("```rust  extra\nfn x() {}\n``\n```\n"),
            "document\n  code[rust  extra] \"fn x() {}\\n``\\n\"\n"
        );
        assert_eq!(
            outline("  ~~~\n  a\n b\nc\n"),
            "document\n  code[] \"a\\nb\\nc\\n\"\n"
        );
    }

    #[test]
    fn unterminated_fence_runs_to_container_end() {
        assert_eq!(
            outline("> ```\n> a\n\nb\n"),
            "document\n  quote\n    code[] \"a\\n\"\n  para \"b\"\n"
        );
    }

    #[test]
    fn indented_code_strips_trailing_blank_lines() {
        assert_eq!(
            outline("    a\n\n      b\n\n\nc\n"),
            "document\n  code[] \"a\\n\\n  b\\n\"\n  para \"c\"\n"
        );
        assert_eq!(outline("a\n    b\n"), "document\n  para \"a\\nb\"\n");
    }

    #[test]
    fn tabs_expand_to_four_columns() {
        assert_eq!(outline("\tfoo\tbar\n"), "document\n  code[] \"foo\\tbar\\n\"\n");
        assert_eq!(
            outline("-\tfoo\n\n\tbar\n"),
            "document\n  list(-1)\n    item\n      para \"foo\"\n      para \"bar\"\n"
        );
    }

    #[test]
    fn reference_definitions_are_collected_and_removed() {
        let mut arena = NodeArena::new(1 << 10);
        let doc = parse_document(&mut arena, "[a]: /x\n[A]: /y\n\n[a]\n", 100).unwrap();
        assert_eq!(doc.link_defs.len(), 1);
        assert_eq!(doc.link_defs["a"].url, "/x");
        assert_eq!(arena.children(doc.root).count(), 1);
    }

    #[test]
    fn definition_only_paragraph_leaves_setext_underline_as_text() {
        assert_eq!(outline("[foo]: /url\n===\n"), "document\n  para \"===\"\n");
    }

    #[test]
    fn html_blocks() {
        assert_eq!(
            outline("<div>\n*x*\n\ntext\n"),
            "document\n  html \"<div>\\n*x*\\n\"\n  para \"text\"\n"
        );
        assert_eq!(
            outline("<!-- a\nb -->\nc\n"),
            "document\n  html \"<!-- a\\nb -->\\n\"\n  para \"c\"\n"
        );
        assert_eq!(outline("a\n<span>\n"), "document\n  para \"a\\n<span>\"\n");
    }

    #[test]
    fn crlf_and_nul_are_normalised() {
        assert_eq!(outline("a\r\nb\0\r\n"), "document\n  para \"a\\nb\u{fffd}\"\n");
    }

    #[test]
    fn nesting_beyond_limit_is_text() {
        let mut arena = NodeArena::new(1 << 20);
        let source = ">".repeat(10);
        let doc = parse_document(&mut arena, &source, 3).unwrap();
        let mut depth = 0;
        let mut cursor = doc.root;
        while let Some(child) = arena.block(cursor).first_child {
            if arena.block(child).kind == BlockKind::BlockQuote {
                depth += 1;
            }
            cursor = child;
        }
        assert_eq!(depth, 3);
        assert_eq!(arena.text(arena.block(cursor).content), ">>>>>>>");
    }

    #[test]
    fn node_limit_surfaces_as_error() {
        let mut arena = NodeArena::new(4);
        let source = "a\n\nb\n\nc\n\nd\n";
        assert!(parse_document(&mut arena, source, 100).is_err());
    }
}
