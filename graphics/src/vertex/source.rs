//! Reusable vertex data with per-program binding cache.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{IndexSource, VertexBinder, VertexBinding, VertexBufferBinding};
use crate::backend::Handle;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Program};

type CacheKey = (Handle, Option<(Handle, u32)>);

struct CachedBinding {
    binding: Arc<VertexBinding>,
    program: Weak<Program>,
    generations: Vec<u64>,
}

impl CachedBinding {
    fn program_is_gone(&self) -> bool {
        self.program.upgrade().map_or(true, |program| program.is_released())
    }
}

/// A set of vertex buffers that can be drawn with any compatible program.
///
/// Bindings are built on first use for each (program, index buffer) pair
/// and reused while the buffers keep their storage. Resizing a buffer makes
/// the next lookup rebuild the binding. Bindings of released programs are
/// released on the next lookup, and a released buffer makes lookups fail.
///
/// # Example
///
/// ```ignore
/// let source = Arc::new(VertexSource::new(vec![
///     VertexBufferBinding::new(positions, "3f", ["in_vert"])?,
/// ]));
/// let binding = source.binding(&program, None)?;
/// binding.render(DrawMode::Triangles, 0, 0, 0)?;
/// ```
pub struct VertexSource {
    buffers: Vec<VertexBufferBinding>,
    cache: Mutex<HashMap<CacheKey, CachedBinding>>,
}

impl VertexSource {
    pub fn new(buffers: Vec<VertexBufferBinding>) -> Self {
        Self {
            buffers,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A source backed by a single buffer.
    pub fn single<I, A>(buffer: Arc<Buffer>, layout: &str, attributes: I) -> Result<Self, GraphicsError>
    where
        I: IntoIterator<Item = A>,
        A: Into<super::AttributeTarget>,
    {
        Ok(Self::new(vec![VertexBufferBinding::new(
            buffer, layout, attributes,
        )?]))
    }

    pub fn buffers(&self) -> &[VertexBufferBinding] {
        &self.buffers
    }

    /// Number of bindings currently cached.
    pub fn cached_bindings(&self) -> usize {
        self.cache.lock().len()
    }

    fn generations(&self, index: Option<&IndexSource>) -> Vec<u64> {
        self.buffers
            .iter()
            .map(|b| b.buffer.generation())
            .chain(index.map(|i| i.buffer.generation()))
            .collect()
    }

    /// Get the binding for `program`, building it if needed.
    pub fn binding(
        &self,
        program: &Arc<Program>,
        index: Option<&IndexSource>,
    ) -> Result<Arc<VertexBinding>, GraphicsError> {
        let key = (
            program.live_handle()?,
            index.map(|i| (i.buffer.handle(), i.element_size)),
        );
        let generations = self.generations(index);

        let mut cache = self.cache.lock();
        Self::purge_released_programs(&mut cache);

        for entry in &self.buffers {
            if let Err(err) = entry.buffer.live_handle() {
                Self::evict_all(&mut cache);
                return Err(err);
            }
        }
        if let Some(index) = index {
            if let Err(err) = index.buffer.live_handle() {
                if let Some(stale) = cache.remove(&key) {
                    release_cached(&stale.binding);
                }
                return Err(err);
            }
        }

        if let Some(cached) = cache.get(&key) {
            if Weak::ptr_eq(&cached.program, &Arc::downgrade(program))
                && cached.generations == generations
                && !cached.binding.is_released()
            {
                return Ok(cached.binding.clone());
            }
        }

        if let Some(stale) = cache.remove(&key) {
            log::debug!(
                "VertexSource: rebuilding binding {} for program {}",
                stale.binding.handle(),
                key.0
            );
            release_cached(&stale.binding);
        }

        let binding = Arc::new(VertexBinder::bind(program, &self.buffers, index)?);
        cache.insert(
            key,
            CachedBinding {
                binding: binding.clone(),
                program: Arc::downgrade(program),
                generations,
            },
        );
        Ok(binding)
    }

    /// Release every cached binding. The buffers stay alive.
    pub fn invalidate(&self) {
        Self::evict_all(&mut self.cache.lock());
    }

    fn evict_all(cache: &mut HashMap<CacheKey, CachedBinding>) {
        for (_, cached) in cache.drain() {
            release_cached(&cached.binding);
        }
    }

    fn purge_released_programs(cache: &mut HashMap<CacheKey, CachedBinding>) {
        cache.retain(|key, cached| {
            if !cached.program_is_gone() {
                return true;
            }
            log::debug!(
                "VertexSource: dropping binding {} of released program {}",
                cached.binding.handle(),
                key.0
            );
            release_cached(&cached.binding);
            false
        });
    }
}

fn release_cached(binding: &VertexBinding) {
    if binding.is_released() {
        return;
    }
    if let Err(err) = binding.release() {
        log::warn!("VertexSource: failed to release binding {}: {err}", binding.handle());
    }
}

impl std::fmt::Debug for VertexSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexSource")
            .field("buffers", &self.buffers.len())
            .field("cached_bindings", &self.cached_bindings())
            .finish()
    }
}

// Ensure VertexSource is Send + Sync
static_assertions::assert_impl_all!(VertexSource: Send, Sync);
