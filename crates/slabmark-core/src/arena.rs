//! Node arena for one render's parse tree.
//!
//! Blocks, inlines and their text live in three growable regions that are
//! truncated, not freed, when the next render starts.

use tracing::trace;

use crate::ast::{Block, BlockId, BlockKind, Inline, InlineId, InlineKind, InlineRange};
use crate::error::ArenaError;
use crate::span::Span;

pub struct NodeArena {
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
    text: String,
    node_limit: usize,
}

impl NodeArena {
    pub fn new(node_limit: usize) -> Self {
        Self {
            blocks: Vec::new(),
            inlines: Vec::new(),
            text: String::new(),
            node_limit,
        }
    }

    /// Drops every node while keeping the regions' capacity.
    pub fn reset(&mut self) {
        trace!(
            blocks = self.blocks.len(),
            inlines = self.inlines.len(),
            text = self.text.len(),
            "node arena reset"
        );
        self.blocks.clear();
        self.inlines.clear();
        self.text.clear();
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn inline_count(&self) -> usize {
        self.inlines.len()
    }

    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    fn check_capacity(&self, extra: usize) -> Result<(), ArenaError> {
        if self.blocks.len() + self.inlines.len() + extra > self.node_limit {
            return Err(ArenaError::OutOfCapacity {
                limit: self.node_limit,
            });
        }
        Ok(())
    }

    pub fn push_block(&mut self, kind: BlockKind, start_line: u32) -> Result<BlockId, ArenaError> {
        self.check_capacity(1)?;
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(kind, start_line));
        Ok(id)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    pub fn append_child(&mut self, parent: BlockId, child: BlockId) {
        let prev = self.block(parent).last_child;
        {
            let node = self.block_mut(child);
            node.parent = Some(parent);
            node.prev = prev;
            node.next = None;
        }
        match prev {
            Some(prev) => self.block_mut(prev).next = Some(child),
            None => self.block_mut(parent).first_child = Some(child),
        }
        self.block_mut(parent).last_child = Some(child);
    }

    /// Unlinks a block from its siblings. The node stays allocated.
    pub fn detach(&mut self, id: BlockId) {
        let Block {
            parent, prev, next, ..
        } = *self.block(id);
        match prev {
            Some(prev) => self.block_mut(prev).next = next,
            None => {
                if let Some(parent) = parent {
                    self.block_mut(parent).first_child = next;
                }
            }
        }
        match next {
            Some(next) => self.block_mut(next).prev = prev,
            None => {
                if let Some(parent) = parent {
                    self.block_mut(parent).last_child = prev;
                }
            }
        }
        let node = self.block_mut(id);
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    pub fn children(&self, id: BlockId) -> Children<'_> {
        Children {
            arena: self,
            next: self.block(id).first_child,
        }
    }

    pub fn push_text(&mut self, text: &str) -> Span {
        let start = self.text.len();
        self.text.push_str(text);
        Span::new(start, self.text.len())
    }

    pub fn text(&self, span: Span) -> &str {
        self.text.get(span.start..span.end).unwrap_or("")
    }

    /// Reserves `count` consecutive inline slots to be filled with
    /// [`set_inline`](Self::set_inline).
    pub fn reserve_inlines(&mut self, count: usize) -> Result<InlineRange, ArenaError> {
        if count == 0 {
            return Ok(InlineRange::EMPTY);
        }
        self.check_capacity(count)?;
        let start = self.inlines.len() as u32;
        let placeholder = Inline {
            kind: InlineKind::Text(Span::EMPTY),
            children: InlineRange::EMPTY,
        };
        self.inlines.extend(std::iter::repeat_n(placeholder, count));
        Ok(InlineRange {
            start,
            len: count as u32,
        })
    }

    pub fn set_inline(&mut self, id: InlineId, inline: Inline) {
        self.inlines[id.0 as usize] = inline;
    }

    pub fn inline(&self, id: InlineId) -> &Inline {
        &self.inlines[id.0 as usize]
    }

    pub fn inlines(&self, range: InlineRange) -> &[Inline] {
        let start = range.start as usize;
        &self.inlines[start..start + range.len as usize]
    }
}

pub struct Children<'a> {
    arena: &'a NodeArena,
    next: Option<BlockId>,
}

impl Iterator for Children<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let id = self.next?;
        self.next = self.arena.block(id).next;
        Some(id)
    }
}
