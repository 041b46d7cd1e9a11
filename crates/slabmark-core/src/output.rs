/// Location of a published render result in engine memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    pub ptr: u32,
    pub len: u32,
}

/// Holds at most one published buffer.
#[derive(Debug, Default)]
pub(crate) struct OutputSlot {
    current: Option<OutputBuffer>,
}

impl OutputSlot {
    pub fn get(&self) -> Option<OutputBuffer> {
        self.current
    }

    pub fn publish(&mut self, buffer: OutputBuffer) -> Option<OutputBuffer> {
        self.current.replace(buffer)
    }

    pub fn take(&mut self) -> Option<OutputBuffer> {
        self.current.take()
    }

    /// Forgets the buffer at `ptr` if it is the published one.
    pub fn forget(&mut self, ptr: u32) -> bool {
        if self.current.is_some_and(|buffer| buffer.ptr == ptr) {
            self.current = None;
            return true;
        }
        false
    }
}
