//! Buffer descriptors.

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Hint that the contents are rewritten frequently.
    pub dynamic: bool,
}

impl BufferDescriptor {
    /// Create a new static buffer descriptor.
    pub fn new(size: u64) -> Self {
        Self {
            label: None,
            size,
            dynamic: false,
        }
    }

    /// Mark the buffer as frequently updated.
    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
