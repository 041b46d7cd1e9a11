//! Inline parsing for paragraph and heading text.
//!
//! Text is scanned once into a scratch tree using a delimiter stack for
//! emphasis and a bracket stack for links and images, then committed to the
//! node arena as contiguous sibling ranges.

use std::collections::HashMap;

use crate::arena::NodeArena;
use crate::ast::{Inline, InlineKind, InlineRange};
use crate::entities::decode_entity;
use crate::error::ArenaError;
use crate::html::scan_inline_html;
use crate::label::{normalize_link_label, scan_link_label};

/// Deepest nesting of emphasis, links and images inside one leaf block.
/// Delimiters that would nest deeper stay literal.
const MAX_INLINE_NESTING: u16 = 64;

const MAX_PAREN_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LinkDefinition {
    pub url: String,
    pub title: Option<String>,
}

/// Normalised label -> definition. The first definition of a label wins.
pub(crate) type LinkDefinitions = HashMap<String, LinkDefinition>;

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    depth: u16,
}

#[derive(Debug)]
enum NodeKind {
    Text(String),
    Emphasis {
        strength: u8,
        children: Vec<Node>,
    },
    CodeSpan(String),
    Link {
        url: String,
        title: Option<String>,
        children: Vec<Node>,
    },
    Image {
        url: String,
        title: Option<String>,
        children: Vec<Node>,
    },
    SoftBreak,
    HardBreak,
    RawHtml(String),
}

impl Node {
    fn leaf(kind: NodeKind) -> Self {
        Node { kind, depth: 0 }
    }

    fn text(text: impl Into<String>) -> Self {
        Node::leaf(NodeKind::Text(text.into()))
    }

    fn container(kind: NodeKind) -> Self {
        let depth = match &kind {
            NodeKind::Emphasis { children, .. }
            | NodeKind::Link { children, .. }
            | NodeKind::Image { children, .. } => nesting(children) + 1,
            _ => 0,
        };
        Node { kind, depth }
    }
}

fn nesting(nodes: &[Node]) -> u16 {
    nodes.iter().map(|node| node.depth).max().unwrap_or(0)
}

const NIL: usize = usize::MAX;

struct Slot {
    node: Option<Node>,
    prev: usize,
    next: usize,
}

/// Scratch siblings in a doubly linked list, so emphasis and links can
/// take a run of nodes without shifting the rest.
struct NodeList {
    slots: Vec<Slot>,
    head: usize,
    tail: usize,
}

impl NodeList {
    fn new() -> Self {
        NodeList {
            slots: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn push(&mut self, node: Node) -> usize {
        let id = self.slots.len();
        self.slots.push(Slot {
            node: Some(node),
            prev: self.tail,
            next: NIL,
        });
        if self.tail == NIL {
            self.head = id;
        } else {
            self.slots[self.tail].next = id;
        }
        self.tail = id;
        id
    }

    fn insert_after(&mut self, at: usize, node: Node) {
        let id = self.slots.len();
        let next = self.slots[at].next;
        self.slots.push(Slot {
            node: Some(node),
            prev: at,
            next,
        });
        self.slots[at].next = id;
        if next == NIL {
            self.tail = id;
        } else {
            self.slots[next].prev = id;
        }
    }

    fn replace(&mut self, id: usize, node: Node) {
        self.slots[id].node = Some(node);
    }

    fn unlink(&mut self, id: usize) {
        let (prev, next) = (self.slots[id].prev, self.slots[id].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
        self.slots[id].node = None;
    }

    /// Detaches the nodes strictly between `after` and `before`. A `before`
    /// of `NIL` takes everything up to the end.
    fn take_between(&mut self, after: usize, before: usize) -> Vec<Node> {
        let mut taken = Vec::new();
        let mut id = self.slots[after].next;
        while id != before && id != NIL {
            taken.extend(self.slots[id].node.take());
            id = self.slots[id].next;
        }
        self.slots[after].next = before;
        if before == NIL {
            self.tail = after;
        } else {
            self.slots[before].prev = after;
        }
        taken
    }

    fn into_vec(mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut id = self.head;
        while id != NIL {
            nodes.extend(self.slots[id].node.take());
            id = self.slots[id].next;
        }
        nodes
    }
}

/// One `*` or `_` run. `can_open` and `can_close` keep their flanking
/// values for the whole pass; a closer that finds no opener is unlinked
/// or skipped instead.
#[derive(Clone, Copy, Debug)]
struct Delimiter {
    ch: u8,
    len: usize,
    orig_len: usize,
    slot: usize,
    can_open: bool,
    can_close: bool,
    /// Deepest node between the previous live delimiter and this one.
    gap: u16,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Delimiters in push order, linked so removal is O(1). Entry indices grow
/// with position, so an index doubles as a stack position.
#[derive(Default)]
struct DelimiterStack {
    entries: Vec<Delimiter>,
    last: Option<usize>,
    /// Deepest node pushed after the last live delimiter.
    tail_gap: u16,
}

impl DelimiterStack {
    fn push(&mut self, mut delim: Delimiter) {
        let id = self.entries.len();
        delim.prev = self.last;
        delim.next = None;
        delim.gap = std::mem::take(&mut self.tail_gap);
        if let Some(last) = self.last {
            self.entries[last].next = Some(id);
        }
        self.entries.push(delim);
        self.last = Some(id);
    }

    fn remove(&mut self, id: usize) {
        let Delimiter {
            prev, next, gap, ..
        } = self.entries[id];
        match next {
            Some(next) => {
                let entry = &mut self.entries[next];
                entry.prev = prev;
                entry.gap = entry.gap.max(gap);
            }
            None => {
                self.last = prev;
                self.tail_gap = self.tail_gap.max(gap);
            }
        }
        if let Some(prev) = prev {
            self.entries[prev].next = next;
        }
    }

    /// Oldest live delimiter at position `bottom` or above.
    fn first_from(&self, bottom: usize) -> Option<usize> {
        let mut first = None;
        let mut cursor = self.last;
        while let Some(id) = cursor.filter(|id| *id >= bottom) {
            first = Some(id);
            cursor = self.entries[id].prev;
        }
        first
    }

    fn remove_from(&mut self, bottom: usize) {
        while let Some(id) = self.last.filter(|id| *id >= bottom) {
            self.remove(id);
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BracketEntry {
    slot: usize,
    start: usize,
    image: bool,
    active: bool,
    /// Delimiter stack position when the bracket was pushed.
    delim_bottom: usize,
}

/// Working state of one inline pass.
struct Scratch {
    nodes: NodeList,
    delims: DelimiterStack,
    brackets: Vec<BracketEntry>,
    /// Non-image brackets below this index are already inactive.
    inactive_below: usize,
    text: String,
}

impl Scratch {
    fn push(&mut self, node: Node) -> usize {
        self.flush_text();
        self.delims.tail_gap = self.delims.tail_gap.max(node.depth);
        self.nodes.push(node)
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.nodes.push(Node::text(std::mem::take(&mut self.text)));
        }
    }

    fn push_bracket(&mut self, start: usize, image: bool) {
        let slot = self.push(Node::text(if image { "![" } else { "[" }));
        self.brackets.push(BracketEntry {
            slot,
            start,
            image,
            active: true,
            delim_bottom: self.delims.entries.len(),
        });
    }

    fn pop_bracket(&mut self) {
        self.brackets.pop();
        self.inactive_below = self.inactive_below.min(self.brackets.len());
    }

    /// Links may not contain other links.
    fn deactivate_link_openers(&mut self) {
        let len = self.brackets.len();
        for entry in &mut self.brackets[self.inactive_below.min(len)..] {
            if !entry.image {
                entry.active = false;
            }
        }
        self.inactive_below = len;
    }
}

/// Parses `text` and stores the result in `arena`.
pub(crate) fn parse_inlines(
    arena: &mut NodeArena,
    text: &str,
    defs: &LinkDefinitions,
) -> Result<InlineRange, ArenaError> {
    let nodes = InlineParser { text, defs }.parse();
    commit(arena, nodes)
}

struct InlineParser<'a> {
    text: &'a str,
    defs: &'a LinkDefinitions,
}

fn is_special(byte: u8) -> bool {
    matches!(
        byte,
        b'\\' | b'`' | b'<' | b'&' | b'!' | b'[' | b']' | b'*' | b'_' | b'\n'
    )
}

impl InlineParser<'_> {
    fn parse(&self) -> Vec<Node> {
        let bytes = self.text.as_bytes();
        let end = bytes.len();
        let mut scratch = Scratch {
            nodes: NodeList::new(),
            delims: DelimiterStack::default(),
            brackets: Vec::new(),
            inactive_below: 0,
            text: String::new(),
        };
        let mut i = 0;

        while i < end {
            match bytes[i] {
                b'\\' => match bytes.get(i + 1) {
                    Some(b'\n') => {
                        scratch.push(Node::leaf(NodeKind::HardBreak));
                        i = skip_spaces_tabs(bytes, i + 2);
                        continue;
                    }
                    Some(next) if next.is_ascii_punctuation() => {
                        scratch.text.push(*next as char);
                        i += 2;
                        continue;
                    }
                    _ => {}
                },
                b'`' => {
                    if let Some((node, next)) = self.parse_code_span(i) {
                        scratch.push(node);
                        i = next;
                        continue;
                    }
                    let run_len = count_run(bytes, i, b'`');
                    scratch.text.push_str(&self.text[i..i + run_len]);
                    i += run_len;
                    continue;
                }
                b'<' => {
                    if let Some((node, next)) = self.parse_autolink(i) {
                        scratch.push(node);
                        i = next;
                        continue;
                    }
                    if let Some(next) = scan_inline_html(bytes, i) {
                        scratch.push(Node::leaf(NodeKind::RawHtml(self.text[i..next].to_string())));
                        i = next;
                        continue;
                    }
                }
                b'&' => {
                    if let Some((decoded, next)) = decode_entity(bytes, i, end) {
                        scratch.text.push_str(&decoded);
                        i = next;
                        continue;
                    }
                }
                b'!' if bytes.get(i + 1) == Some(&b'[') => {
                    scratch.push_bracket(i, true);
                    i += 2;
                    continue;
                }
                b'[' => {
                    scratch.push_bracket(i, false);
                    i += 1;
                    continue;
                }
                b']' => {
                    scratch.flush_text();
                    if let Some(next) = self.try_close_link(i, &mut scratch) {
                        i = next;
                        continue;
                    }
                }
                ch @ (b'*' | b'_') => {
                    let run_len = count_run(bytes, i, ch);
                    let (can_open, can_close) = delimiter_properties(self.text, i, run_len, ch);
                    let slot = scratch.push(Node::text(&self.text[i..i + run_len]));
                    if can_open || can_close {
                        scratch.delims.push(Delimiter {
                            ch,
                            len: run_len,
                            orig_len: run_len,
                            slot,
                            can_open,
                            can_close,
                            gap: 0,
                            prev: None,
                            next: None,
                        });
                    }
                    i += run_len;
                    continue;
                }
                b'\n' => {
                    let kept = scratch.text.trim_end_matches(' ').len();
                    let hard = scratch.text.len() - kept >= 2;
                    scratch.text.truncate(kept);
                    scratch.push(Node::leaf(if hard {
                        NodeKind::HardBreak
                    } else {
                        NodeKind::SoftBreak
                    }));
                    i = skip_spaces_tabs(bytes, i + 1);
                    continue;
                }
                _ => {}
            }
            // Literal run up to the next byte with a meaning.
            let stop = bytes[i + 1..]
                .iter()
                .position(|b| is_special(*b))
                .map_or(end, |pos| i + 1 + pos);
            scratch.text.push_str(&self.text[i..stop]);
            i = stop;
        }

        scratch.flush_text();
        process_emphasis(&mut scratch.nodes, &mut scratch.delims, 0);
        scratch.nodes.into_vec()
    }

    fn parse_code_span(&self, start: usize) -> Option<(Node, usize)> {
        let bytes = self.text.as_bytes();
        let run_len = count_run(bytes, start, b'`');
        let mut i = start + run_len;
        while i < bytes.len() {
            if bytes[i] != b'`' {
                i += 1;
                continue;
            }
            let close_len = count_run(bytes, i, b'`');
            if close_len == run_len {
                let mut content = self.text[start + run_len..i].replace('\n', " ");
                if content.len() >= 2
                    && content.starts_with(' ')
                    && content.ends_with(' ')
                    && content.bytes().any(|b| b != b' ')
                {
                    content = content[1..content.len() - 1].to_string();
                }
                return Some((Node::leaf(NodeKind::CodeSpan(content)), i + run_len));
            }
            i += close_len;
        }
        None
    }

    fn parse_autolink(&self, start: usize) -> Option<(Node, usize)> {
        let bytes = self.text.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'>' => break,
                b'<' => return None,
                b if b <= b' ' || b == 0x7f => return None,
                _ => i += 1,
            }
        }
        if i >= bytes.len() || i == start + 1 {
            return None;
        }
        let inner = &self.text[start + 1..i];
        let url = if is_autolink_uri(inner) {
            inner.to_string()
        } else if is_autolink_email(inner) {
            format!("mailto:{inner}")
        } else {
            return None;
        };
        let node = Node::container(NodeKind::Link {
            url,
            title: None,
            children: vec![Node::text(inner)],
        });
        Some((node, i + 1))
    }

    fn try_close_link(&self, close: usize, scratch: &mut Scratch) -> Option<usize> {
        let opener = *scratch.brackets.last()?;
        if !opener.active {
            scratch.pop_bracket();
            return None;
        }
        let content_start = opener.start + if opener.image { 2 } else { 1 };
        let Some((url, title, next)) = self.parse_link_tail(close, content_start) else {
            scratch.pop_bracket();
            return None;
        };
        scratch.pop_bracket();

        process_emphasis(&mut scratch.nodes, &mut scratch.delims, opener.delim_bottom);
        let children = scratch.nodes.take_between(opener.slot, NIL);
        if nesting(&children) >= MAX_INLINE_NESTING {
            for node in children {
                scratch.nodes.push(node);
            }
            // Every enclosing bracket would hold the same content.
            scratch.brackets.clear();
            scratch.inactive_below = 0;
            return None;
        }
        scratch.nodes.unlink(opener.slot);

        scratch.push(Node::container(if opener.image {
            NodeKind::Image {
                url,
                title,
                children,
            }
        } else {
            NodeKind::Link {
                url,
                title,
                children,
            }
        }));
        if !opener.image {
            scratch.deactivate_link_openers();
        }
        Some(next)
    }

    /// Parses what follows `]`: an inline destination, or a full,
    /// collapsed or shortcut reference.
    fn parse_link_tail(
        &self,
        close: usize,
        content_start: usize,
    ) -> Option<(String, Option<String>, usize)> {
        let bytes = self.text.as_bytes();
        if bytes.get(close + 1) == Some(&b'(')
            && let Some(found) = parse_inline_link_tail(self.text, close + 1)
        {
            return Some(found);
        }
        let link_text = &self.text[content_start..close];
        let (label, next) = if bytes.get(close + 1) == Some(&b'[') {
            match scan_link_label(bytes, close + 2) {
                Some(label_end) if label_end > close + 2 => {
                    (&self.text[close + 2..label_end], label_end + 1)
                }
                Some(label_end) => (link_text, label_end + 1),
                None => (link_text, close + 1),
            }
        } else {
            (link_text, close + 1)
        };
        if label.len() > 999 {
            return None;
        }
        let key = normalize_link_label(label);
        if key.is_empty() {
            return None;
        }
        let def = self.defs.get(&key)?;
        Some((def.url.clone(), def.title.clone(), next))
    }
}

fn count_run(bytes: &[u8], start: usize, needle: u8) -> usize {
    bytes[start..].iter().take_while(|b| **b == needle).count()
}

fn skip_spaces_tabs(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
        pos += 1;
    }
    pos
}

fn skip_link_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn delimiter_properties(text: &str, pos: usize, run_len: usize, delim: u8) -> (bool, bool) {
    let before = text[..pos].chars().next_back();
    let after = text[pos + run_len..].chars().next();

    let before_is_whitespace = before.is_none_or(char::is_whitespace);
    let after_is_whitespace = after.is_none_or(char::is_whitespace);
    let before_is_punctuation = before.is_some_and(is_unicode_punctuation);
    let after_is_punctuation = after.is_some_and(is_unicode_punctuation);

    let left_flanking = !after_is_whitespace
        && (!after_is_punctuation || before_is_whitespace || before_is_punctuation);
    let right_flanking = !before_is_whitespace
        && (!before_is_punctuation || after_is_whitespace || after_is_punctuation);

    if delim == b'_' {
        let can_open = left_flanking && (!right_flanking || before_is_punctuation);
        let can_close = right_flanking && (!left_flanking || after_is_punctuation);
        (can_open, can_close)
    } else {
        (left_flanking, right_flanking)
    }
}

fn is_unicode_punctuation(ch: char) -> bool {
    !ch.is_whitespace() && !ch.is_alphanumeric()
}

/// Rule of three: a delimiter that can both open and close may not pair
/// when the original run lengths sum to a multiple of 3, unless both are.
fn delimiter_blocked(opener: &Delimiter, closer: &Delimiter) -> bool {
    let either_both = opener.can_close || closer.can_open;
    either_both
        && (opener.orig_len + closer.orig_len) % 3 == 0
        && !(opener.orig_len % 3 == 0 && closer.orig_len % 3 == 0)
}

/// Row of the openers-bottom table for `closer`: its character, whether it
/// can also open, and its original length modulo 3.
fn bottom_row(closer: &Delimiter) -> usize {
    usize::from(closer.ch == b'_') * 6 + usize::from(closer.can_open) * 3 + closer.orig_len % 3
}

/// Pairs the delimiters at stack position `bottom` and above, then drops
/// them from the stack.
fn process_emphasis(nodes: &mut NodeList, delims: &mut DelimiterStack, bottom: usize) {
    let mut openers_bottom = [bottom; 12];
    let mut closer = delims.first_from(bottom);
    while let Some(closer_id) = closer {
        let current = delims.entries[closer_id];
        if !current.can_close {
            closer = current.next;
            continue;
        }
        let row = bottom_row(&current);
        let mut inner_depth = current.gap;
        let mut rule_of_three = false;
        let mut found = None;
        let mut candidate = current.prev;
        while let Some(opener_id) = candidate.filter(|id| *id >= openers_bottom[row]) {
            let opener = &delims.entries[opener_id];
            if opener.ch == current.ch && opener.can_open {
                if !delimiter_blocked(opener, &current) {
                    found = Some(opener_id);
                    break;
                }
                rule_of_three = true;
            }
            inner_depth = inner_depth.max(opener.gap);
            candidate = opener.prev;
        }
        match found {
            Some(opener_id) if inner_depth < MAX_INLINE_NESTING => {
                closer = insert_emphasis(nodes, delims, opener_id, closer_id);
            }
            _ => {
                // Later closers of this row cannot match anything below.
                if !rule_of_three {
                    openers_bottom[row] = closer_id;
                }
                closer = current.next;
                if !current.can_open {
                    delims.remove(closer_id);
                }
            }
        }
    }
    delims.remove_from(bottom);
}

/// Wraps the nodes between a matched opener and closer in an emphasis node.
/// Returns the closer to process next.
fn insert_emphasis(
    nodes: &mut NodeList,
    delims: &mut DelimiterStack,
    opener_id: usize,
    closer_id: usize,
) -> Option<usize> {
    let opener = delims.entries[opener_id];
    let closer = delims.entries[closer_id];
    let use_len = if opener.len >= 2 && closer.len >= 2 { 2 } else { 1 };

    let mut between = closer.prev;
    while let Some(id) = between.filter(|id| *id != opener_id) {
        between = delims.entries[id].prev;
        delims.remove(id);
    }

    let children = nodes.take_between(opener.slot, closer.slot);
    let emphasis = Node::container(NodeKind::Emphasis {
        strength: use_len as u8,
        children,
    });
    delims.entries[closer_id].gap = emphasis.depth;
    nodes.insert_after(opener.slot, emphasis);

    let ch = opener.ch as char;
    let opener_remain = opener.len - use_len;
    delims.entries[opener_id].len = opener_remain;
    if opener_remain == 0 {
        nodes.unlink(opener.slot);
        delims.remove(opener_id);
    } else {
        nodes.replace(opener.slot, Node::text(ch.to_string().repeat(opener_remain)));
    }

    let closer_remain = closer.len - use_len;
    delims.entries[closer_id].len = closer_remain;
    if closer_remain == 0 {
        let next = delims.entries[closer_id].next;
        nodes.unlink(closer.slot);
        delims.remove(closer_id);
        next
    } else {
        nodes.replace(closer.slot, Node::text(ch.to_string().repeat(closer_remain)));
        Some(closer_id)
    }
}

fn commit(arena: &mut NodeArena, nodes: Vec<Node>) -> Result<InlineRange, ArenaError> {
    let nodes = merge_text(nodes);
    let range = arena.reserve_inlines(nodes.len())?;
    for (id, node) in range.ids().zip(nodes) {
        let empty = InlineRange::EMPTY;
        let inline = match node.kind {
            NodeKind::Text(text) => Inline {
                kind: InlineKind::Text(arena.push_text(&text)),
                children: empty,
            },
            NodeKind::CodeSpan(code) => Inline {
                kind: InlineKind::CodeSpan(arena.push_text(&code)),
                children: empty,
            },
            NodeKind::RawHtml(raw) => Inline {
                kind: InlineKind::RawHtml(arena.push_text(&raw)),
                children: empty,
            },
            NodeKind::SoftBreak => Inline {
                kind: InlineKind::LineBreak { hard: false },
                children: empty,
            },
            NodeKind::HardBreak => Inline {
                kind: InlineKind::LineBreak { hard: true },
                children: empty,
            },
            NodeKind::Emphasis { strength, children } => Inline {
                kind: InlineKind::Emphasis { strength },
                children: commit(arena, children)?,
            },
            NodeKind::Link {
                url,
                title,
                children,
            } => {
                let destination = arena.push_text(&url);
                let title = title.map(|title| arena.push_text(&title));
                Inline {
                    kind: InlineKind::Link { destination, title },
                    children: commit(arena, children)?,
                }
            }
            NodeKind::Image {
                url,
                title,
                children,
            } => {
                let destination = arena.push_text(&url);
                let title = title.map(|title| arena.push_text(&title));
                Inline {
                    kind: InlineKind::Image { destination, title },
                    children: commit(arena, children)?,
                }
            }
        };
        arena.set_inline(id, inline);
    }
    Ok(range)
}

fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let NodeKind::Text(text) = &node.kind {
            if text.is_empty() {
                continue;
            }
            if let Some(Node {
                kind: NodeKind::Text(prev),
                ..
            }) = merged.last_mut()
            {
                prev.push_str(text);
                continue;
            }
        }
        merged.push(node);
    }
    merged
}

/// Parses `(dest "title")` starting at the `(`.
fn parse_inline_link_tail(text: &str, open: usize) -> Option<(String, Option<String>, usize)> {
    let bytes = text.as_bytes();
    let mut i = skip_link_whitespace(bytes, open + 1);
    let url = if bytes.get(i) == Some(&b')') {
        String::new()
    } else {
        let (url, after) = parse_link_destination(text, i, false)?;
        i = after;
        url
    };
    let ws_end = skip_link_whitespace(bytes, i);
    let mut title = None;
    if ws_end > i && matches!(bytes.get(ws_end), Some(b'"' | b'\'' | b'(')) {
        let (parsed, after) = parse_link_title(text, ws_end)?;
        title = Some(parsed);
        i = skip_link_whitespace(bytes, after);
    } else {
        i = ws_end;
    }
    if bytes.get(i) != Some(&b')') {
        return None;
    }
    Some((url, title, i + 1))
}

/// Parses a link destination at `start`, either `<...>` or a run of
/// non-space characters with balanced parentheses.
fn parse_link_destination(text: &str, start: usize, reference: bool) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(start) == Some(&b'<') {
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'>' => return Some((unescape_and_decode(&text[start + 1..i]), i + 1)),
                b'\n' | b'<' => return None,
                b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => i += 2,
                _ => i += 1,
            }
        }
        return None;
    }
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => i += 2,
            b'(' => {
                depth += 1;
                if depth > MAX_PAREN_DEPTH {
                    return None;
                }
                i += 1;
            }
            b')' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                i += 1;
            }
            b if b <= b' ' || b == 0x7f => break,
            _ => i += 1,
        }
    }
    if depth != 0 || (i == start && reference) || i == start {
        return None;
    }
    Some((unescape_and_decode(&text[start..i]), i))
}

fn parse_link_title(text: &str, start: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let open = *bytes.get(start)?;
    let close = match open {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) {
            i += 2;
            continue;
        }
        if b == close {
            return Some((unescape_and_decode(&text[start + 1..i]), i + 1));
        }
        if open == b'(' && b == b'(' {
            return None;
        }
        i += 1;
    }
    None
}

/// Parses one link reference definition at the start of `text`. Returns
/// the normalised label, the definition and the bytes consumed, including
/// the line ending that closes the definition.
pub(crate) fn parse_link_reference_definition(
    text: &str,
) -> Option<(String, LinkDefinition, usize)> {
    let bytes = text.as_bytes();
    let mut i = skip_spaces_tabs(bytes, 0);
    if bytes.get(i) != Some(&b'[') {
        return None;
    }
    let label_end = scan_link_label(bytes, i + 1)?;
    let label = normalize_link_label(&text[i + 1..label_end]);
    if label.is_empty() || bytes.get(label_end + 1) != Some(&b':') {
        return None;
    }
    i = skip_one_line_ending(bytes, label_end + 2);
    let (url, after_dest) = parse_link_destination(text, i, true)?;

    let dest_line_end = line_end_after(bytes, after_dest);
    let title_start = skip_one_line_ending(bytes, after_dest);
    if title_start > after_dest
        && let Some((title, after_title)) = parse_link_title(text, title_start)
        && let Some(end) = line_end_after(bytes, after_title)
    {
        let def = LinkDefinition {
            url,
            title: Some(title),
        };
        return Some((label, def, end));
    }
    let end = dest_line_end?;
    Some((label, LinkDefinition { url, title: None }, end))
}

/// Skips spaces and tabs and at most one line ending.
fn skip_one_line_ending(bytes: &[u8], pos: usize) -> usize {
    let mut pos = skip_spaces_tabs(bytes, pos);
    if bytes.get(pos) == Some(&b'\n') {
        pos = skip_spaces_tabs(bytes, pos + 1);
    }
    pos
}

/// When only spaces and tabs remain on the line, returns the index past its
/// line ending.
fn line_end_after(bytes: &[u8], pos: usize) -> Option<usize> {
    let pos = skip_spaces_tabs(bytes, pos);
    match bytes.get(pos) {
        None => Some(pos),
        Some(b'\n') => Some(pos + 1),
        Some(_) => None,
    }
}

/// Applies backslash escapes and character references.
pub(crate) fn unescape_and_decode(text: &str) -> String {
    if !text.contains(['\\', '&']) {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut result = String::with_capacity(text.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => {
                result.push(bytes[i + 1] as char);
                i += 2;
            }
            b'&' => match decode_entity(bytes, i, bytes.len()) {
                Some((decoded, next)) => {
                    result.push_str(&decoded);
                    i = next;
                }
                None => {
                    result.push('&');
                    i += 1;
                }
            },
            _ => {
                let stop = bytes[i + 1..]
                    .iter()
                    .position(|b| *b == b'\\' || *b == b'&')
                    .map_or(bytes.len(), |pos| i + 1 + pos);
                result.push_str(&text[i..stop]);
                i = stop;
            }
        }
    }
    result
}

fn is_autolink_uri(value: &str) -> bool {
    let Some(colon) = value.find(':') else {
        return false;
    };
    let scheme = value[..colon].as_bytes();
    (2..=32).contains(&scheme.len())
        && scheme[0].is_ascii_alphabetic()
        && scheme
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

fn is_autolink_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b".!#$%&'*+/=?^_`{|}~-".contains(&b)
        });
    let domain_ok = !domain.is_empty()
        && domain.split('.').all(|part| {
            !part.is_empty()
                && part.len() <= 63
                && !part.starts_with('-')
                && !part.ends_with('-')
                && part.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    local_ok && domain_ok
}
