//! Draw batching.

use std::sync::Arc;

use glam::Mat4;
use parking_lot::Mutex;

use lattice_core::profiling::{profile_plot, profile_scope};

use crate::error::GraphicsError;
use crate::reflect::Uniform;
use crate::resources::Program;
use crate::types::DrawMode;
use crate::vertex::{IndexSource, VertexSource};

/// A batch shared between the code that fills it and a recorded
/// [`super::RenderCommand::DrawBatch`].
pub type SharedBatch = Arc<Mutex<Batch>>;

/// One draw inside a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchEntry {
    /// Uploaded to the `model` uniform before the draw.
    pub transform: Mat4,
    /// Vertex or index count, 0 for the derived count.
    pub count: u32,
    /// First vertex, or first index element when indexed.
    pub offset: u32,
    /// Instance count, 0 for the derived count.
    pub instances: u32,
}

impl Default for BatchEntry {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            count: 0,
            offset: 0,
            instances: 0,
        }
    }
}

/// Draws that share a vertex source, index buffer and primitive mode.
///
/// Committing builds (or reuses) one vertex binding and issues one draw per
/// entry through it. The entries are cleared afterwards so the batch can be
/// refilled for the next frame.
///
/// ```ignore
/// let batch = Batch::shared(mesh.clone(), None, DrawMode::Triangles);
/// for transform in &transforms {
///     batch.lock().push(*transform, 0, 0, 1);
/// }
/// script.draw_batch(batch.clone());
/// ```
#[derive(Default)]
pub struct Batch {
    source: Option<Arc<VertexSource>>,
    index: Option<IndexSource>,
    mode: DrawMode,
    entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn new(source: Arc<VertexSource>, index: Option<IndexSource>, mode: DrawMode) -> Self {
        Self {
            source: Some(source),
            index,
            mode,
            entries: Vec::new(),
        }
    }

    /// Create a batch ready to be recorded into a script.
    pub fn shared(source: Arc<VertexSource>, index: Option<IndexSource>, mode: DrawMode) -> SharedBatch {
        Arc::new(Mutex::new(Self::new(source, index, mode)))
    }

    pub fn source(&self) -> Option<&Arc<VertexSource>> {
        self.source.as_ref()
    }

    pub fn index(&self) -> Option<&IndexSource> {
        self.index.as_ref()
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether draws from this source, index buffer and mode belong here.
    pub fn matches(
        &self,
        source: &Arc<VertexSource>,
        index: Option<&IndexSource>,
        mode: DrawMode,
    ) -> bool {
        let same_source = self
            .source
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, source));
        let same_index = match (&self.index, index) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(&a.buffer, &b.buffer) && a.element_size == b.element_size,
            _ => false,
        };
        same_source && same_index && self.mode == mode
    }

    /// Drop all entries and retarget the batch.
    pub fn reset(&mut self, source: Arc<VertexSource>, index: Option<IndexSource>, mode: DrawMode) {
        self.entries.clear();
        self.source = Some(source);
        self.index = index;
        self.mode = mode;
    }

    /// Drop all entries and the source.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.source = None;
        self.index = None;
    }

    pub fn push(&mut self, transform: Mat4, count: u32, offset: u32, instances: u32) {
        self.entries.push(BatchEntry {
            transform,
            count,
            offset,
            instances,
        });
    }

    pub fn push_entry(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    /// Issue every entry as a draw with `program`, then clear the entries.
    ///
    /// `model` is the uniform each entry's transform is written to, if any.
    /// Returns the number of draws issued. An empty batch issues nothing.
    pub fn commit(&mut self, program: &Arc<Program>, model: Option<&Uniform>) -> Result<usize, GraphicsError> {
        if self.entries.is_empty() {
            return Ok(0);
        }
        profile_scope!("batch_commit");

        let source = self.source.as_ref().ok_or_else(|| {
            GraphicsError::InvalidParameter("batch has entries but no vertex source".into())
        })?;
        let binding = source.binding(program, self.index.as_ref())?;

        for entry in &self.entries {
            if let Some(model) = model {
                program.set_uniform(&model.name, &entry.transform)?;
            }
            binding.render(self.mode, entry.count, entry.offset, entry.instances)?;
        }

        let issued = self.entries.len();
        profile_plot!("batch_draws", issued);
        log::trace!(
            "Batch: committed {issued} draws through binding {} ({:?})",
            binding.handle(),
            self.mode
        );
        self.entries.clear();
        Ok(issued)
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("has_source", &self.source.is_some())
            .field("indexed", &self.index.is_some())
            .field("mode", &self.mode)
            .field("entries", &self.entries.len())
            .finish()
    }
}

// Ensure Batch is Send + Sync
static_assertions::assert_impl_all!(Batch: Send, Sync);
