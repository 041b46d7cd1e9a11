//! One renderer instance: allocator, node arena and output slot.

use tracing::{debug, trace, warn};

use crate::arena::NodeArena;
use crate::config::EngineConfig;
use crate::emit::emit_html;
use crate::error::{MemoryError, RenderError};
use crate::memory::LinearMemory;
use crate::output::{OutputBuffer, OutputSlot};
use crate::parser::parse;

pub struct Engine {
    config: EngineConfig,
    memory: LinearMemory,
    arena: NodeArena,
    output: OutputSlot,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            memory: LinearMemory::new(config.memory_limit, config.segment_size),
            arena: NodeArena::new(config.node_limit),
            output: OutputSlot::default(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    /// Reserves `size` writable bytes for the caller.
    pub fn alloc(&mut self, size: u32) -> Result<u32, RenderError> {
        Ok(self.memory.alloc(size)?)
    }

    /// Releases a caller allocation. Invalid pointers are logged and
    /// ignored.
    pub fn free(&mut self, ptr: u32, len: u32) {
        match self.memory.free(ptr, len) {
            Ok(()) => {
                if self.output.forget(ptr) {
                    trace!(ptr, "output released through free");
                }
            }
            Err(err) => warn!(ptr, len, %err, "ignored invalid free"),
        }
    }

    /// Copies `bytes` into the allocation at `ptr`.
    pub fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), RenderError> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| RenderError::InvalidSpan(MemoryError::OutOfBounds { ptr, len: u32::MAX }))?;
        self.memory.slice_mut(ptr, len)?.copy_from_slice(bytes);
        Ok(())
    }

    /// Renders the `len` bytes at `ptr` and publishes the result. Returns
    /// `0`, or the error's status with its message published instead.
    pub fn render(&mut self, ptr: u32, len: u32) -> i32 {
        match self.render_span(ptr, len) {
            Ok(()) => RenderError::STATUS_OK,
            Err(err) => err.status(),
        }
    }

    /// Stages `input` in engine memory, renders it and borrows the output.
    pub fn render_bytes(&mut self, input: &[u8]) -> Result<&str, RenderError> {
        let len = u32::try_from(input.len())
            .map_err(|_| RenderError::AllocationFailure("input exceeds 4 GiB".to_string()))?;
        let ptr = self.alloc(len)?;
        self.write(ptr, input)?;
        let result = self.render_span(ptr, len);
        self.free(ptr, len);
        result?;
        std::str::from_utf8(self.output()).map_err(|err| RenderError::InvalidEncoding {
            valid_up_to: err.valid_up_to(),
        })
    }

    /// Bytes of the published output; empty when none is live.
    pub fn output(&self) -> &[u8] {
        match self.output.get() {
            Some(buffer) => self.memory.slice(buffer.ptr, buffer.len).unwrap_or(&[]),
            None => &[],
        }
    }

    pub fn output_buffer(&self) -> Option<OutputBuffer> {
        self.output.get()
    }

    pub fn output_ptr(&self) -> u32 {
        self.output.get().map_or(0, |buffer| buffer.ptr)
    }

    pub fn output_len(&self) -> u32 {
        self.output.get().map_or(0, |buffer| buffer.len)
    }

    /// Releases the published output. Does nothing when none is live.
    pub fn free_output_buffer(&mut self) {
        match self.output.take() {
            Some(buffer) => self.release(buffer),
            None => trace!("free_output_buffer with no live output"),
        }
    }

    /// Real address of `ptr` for hosts sharing this address space.
    pub fn host_address(&self, ptr: u32) -> Option<usize> {
        self.memory.host_address(ptr)
    }

    pub fn from_host_address(&self, address: usize) -> Option<u32> {
        self.memory.from_host_address(address)
    }

    fn render_span(&mut self, ptr: u32, len: u32) -> Result<(), RenderError> {
        if let Some(previous) = self.output.take() {
            warn!(
                ptr = previous.ptr,
                len = previous.len,
                "previous output still live at render start; releasing it"
            );
            self.release(previous);
        }
        self.arena.reset();
        debug!(ptr, len, "render start");

        let result = self.render_html(ptr, len).and_then(|html| self.publish(html.as_bytes()));
        match &result {
            Ok(()) => debug!(status = 0, output_len = self.output_len(), "render finished"),
            Err(err) => {
                debug!(status = err.status(), %err, "render failed");
                self.publish_error(err);
            }
        }
        result
    }

    fn render_html(&mut self, ptr: u32, len: u32) -> Result<String, RenderError> {
        let input = self.memory.slice(ptr, len)?;
        let source = std::str::from_utf8(input).map_err(|err| RenderError::InvalidEncoding {
            valid_up_to: err.valid_up_to(),
        })?;
        let root = parse(&mut self.arena, source, self.config.max_nesting)?;
        trace!(
            blocks = self.arena.block_count(),
            inlines = self.arena.inline_count(),
            text = self.arena.text_len(),
            "parse tree built"
        );
        Ok(emit_html(&self.arena, root, &self.config.emit))
    }

    fn publish(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| RenderError::AllocationFailure("output exceeds 4 GiB".to_string()))?;
        let ptr = self.memory.alloc(len)?;
        match self.memory.slice_mut(ptr, len) {
            Ok(target) => target.copy_from_slice(bytes),
            Err(err) => {
                let _ = self.memory.free(ptr, len);
                return Err(err.into());
            }
        }
        self.output.publish(OutputBuffer { ptr, len });
        Ok(())
    }

    /// Replaces any output with the error's message. If even that cannot be
    /// allocated, the output is left empty.
    fn publish_error(&mut self, err: &RenderError) {
        if let Some(previous) = self.output.take() {
            self.release(previous);
        }
        if let Err(publish_err) = self.publish(err.to_string().as_bytes()) {
            warn!(%publish_err, "could not publish error message");
        }
    }

    fn release(&mut self, buffer: OutputBuffer) {
        if let Err(err) = self.memory.free(buffer.ptr, buffer.len) {
            warn!(ptr = buffer.ptr, %err, "output release failed");
        }
    }
}

/// Renders Markdown to HTML with the default configuration.
///
/// On a fatal error the error message is returned in place of HTML.
pub fn markdown_to_html(source: &str) -> String {
    markdown_to_html_with(source, &EngineConfig::default())
}

/// Renders Markdown to HTML without staging the input in engine memory.
pub fn markdown_to_html_with(source: &str, config: &EngineConfig) -> String {
    let mut arena = NodeArena::new(config.node_limit);
    match parse(&mut arena, source, config.max_nesting) {
        Ok(root) => emit_html(&arena, root, &config.emit),
        Err(err) => RenderError::from(err).to_string(),
    }
}
