use thiserror::Error;

/// Failures raised by the byte allocator.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    #[error("out of memory: requested {requested} bytes with {limit} byte limit")]
    Exhausted { requested: u32, limit: u32 },
    #[error("no live allocation at {ptr:#x}")]
    UnknownAllocation { ptr: u32 },
    #[error("range {ptr:#x}+{len} is not inside a live allocation")]
    OutOfBounds { ptr: u32, len: u32 },
}

/// Failures raised by the node arena.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("node arena out of capacity: {limit} nodes")]
    OutOfCapacity { limit: usize },
}

/// Fatal render failures. The `Display` text is what callers find in the
/// output buffer when `render` returns a nonzero status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("invalid encoding: input is not valid UTF-8 (error at byte {valid_up_to})")]
    InvalidEncoding { valid_up_to: usize },
    #[error("allocation failure: {0}")]
    AllocationFailure(String),
    #[error("invalid span: {0}")]
    InvalidSpan(MemoryError),
}

impl RenderError {
    pub const STATUS_OK: i32 = 0;

    /// Status code reported across the boundary.
    pub fn status(&self) -> i32 {
        match self {
            RenderError::InvalidEncoding { .. } => 1,
            RenderError::AllocationFailure(_) => 2,
            RenderError::InvalidSpan(_) => 3,
        }
    }
}

impl From<ArenaError> for RenderError {
    fn from(err: ArenaError) -> Self {
        RenderError::AllocationFailure(err.to_string())
    }
}

impl From<MemoryError> for RenderError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Exhausted { .. } => RenderError::AllocationFailure(err.to_string()),
            MemoryError::UnknownAllocation { .. } | MemoryError::OutOfBounds { .. } => {
                RenderError::InvalidSpan(err)
            }
        }
    }
}
