//! Reference-counted cache of compiled particle programs.
//!
//! Each particle type compiles its program at most once per context. Fields
//! [`acquire`](ProgramCache::acquire) the program on construction and
//! [`release`](ProgramCache::release) it on teardown; the program is deleted
//! from the context when the last holder lets go. The cache belongs to one
//! render loop and is emptied when that loop is disposed.

use std::collections::HashMap;

use crate::assets::ShaderLibrary;
use crate::error::GpuError;
use crate::gpu::{GraphicsContext, ProgramDesc, ProgramId, VertexLayout};

/// The particle programs known to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Instanced cube mesh, per-instance world transforms.
    InstancedCube,
    /// Single quad per particle, world transform in the uniforms.
    PooledQuad,
}

impl ProgramKind {
    fn label(self) -> &'static str {
        match self {
            ProgramKind::InstancedCube => "instanced-cube",
            ProgramKind::PooledQuad => "pooled-quad",
        }
    }

    fn layout(self) -> VertexLayout {
        match self {
            ProgramKind::InstancedCube => VertexLayout::Instanced,
            ProgramKind::PooledQuad => VertexLayout::PerObject,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedProgram {
    id: ProgramId,
    refs: usize,
}

/// Programs compiled against one graphics context.
#[derive(Debug)]
pub struct ProgramCache {
    shaders: ShaderLibrary,
    programs: HashMap<ProgramKind, CachedProgram>,
}

impl ProgramCache {
    pub fn new(shaders: ShaderLibrary) -> Self {
        Self {
            shaders,
            programs: HashMap::new(),
        }
    }

    /// Take a reference to the program for `kind`, compiling it on first use.
    pub fn acquire<G>(&mut self, gfx: &mut G, kind: ProgramKind) -> Result<ProgramId, GpuError>
    where
        G: GraphicsContext + ?Sized,
    {
        if let Some(cached) = self.programs.get_mut(&kind) {
            cached.refs += 1;
            return Ok(cached.id);
        }

        let source = match kind {
            ProgramKind::InstancedCube => self.shaders.instanced.as_ref(),
            ProgramKind::PooledQuad => self.shaders.pooled.as_ref(),
        };
        let id = gfx.create_program(&ProgramDesc {
            label: kind.label(),
            source,
            layout: kind.layout(),
        })?;
        log::debug!("compiled {} program as {:?}", kind.label(), id);
        self.programs.insert(kind, CachedProgram { id, refs: 1 });
        Ok(id)
    }

    /// Drop one reference; deletes the program when none remain.
    ///
    /// Releasing a kind that was never acquired does nothing.
    pub fn release<G>(&mut self, gfx: &mut G, kind: ProgramKind)
    where
        G: GraphicsContext + ?Sized,
    {
        let Some(cached) = self.programs.get_mut(&kind) else {
            return;
        };
        cached.refs -= 1;
        if cached.refs == 0 {
            gfx.delete_program(cached.id);
            self.programs.remove(&kind);
            log::debug!("deleted {} program", kind.label());
        }
    }

    /// Delete every program regardless of outstanding references.
    pub fn release_all<G>(&mut self, gfx: &mut G)
    where
        G: GraphicsContext + ?Sized,
    {
        for (kind, cached) in self.programs.drain() {
            if cached.refs > 0 {
                log::debug!("force-deleting {} program ({} refs)", kind.label(), cached.refs);
            }
            gfx.delete_program(cached.id);
        }
    }

    /// Outstanding references to `kind`.
    pub fn ref_count(&self, kind: ProgramKind) -> usize {
        self.programs.get(&kind).map_or(0, |c| c.refs)
    }

    /// Number of programs currently compiled.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Command, RecordingContext};

    #[test]
    fn test_compiles_once_per_kind() {
        let mut gfx = RecordingContext::new();
        let mut cache = ProgramCache::new(ShaderLibrary::builtin());

        let a = cache.acquire(&mut gfx, ProgramKind::InstancedCube).unwrap();
        let b = cache.acquire(&mut gfx, ProgramKind::InstancedCube).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.ref_count(ProgramKind::InstancedCube), 2);

        let compiles = gfx
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::CreateProgram { .. }))
            .count();
        assert_eq!(compiles, 1);
    }

    #[test]
    fn test_release_deletes_at_zero() {
        let mut gfx = RecordingContext::new();
        let mut cache = ProgramCache::new(ShaderLibrary::builtin());

        cache.acquire(&mut gfx, ProgramKind::PooledQuad).unwrap();
        cache.acquire(&mut gfx, ProgramKind::PooledQuad).unwrap();
        cache.release(&mut gfx, ProgramKind::PooledQuad);
        assert_eq!(gfx.live_programs(), 1);

        cache.release(&mut gfx, ProgramKind::PooledQuad);
        assert_eq!(cache.ref_count(ProgramKind::PooledQuad), 0);
        assert_eq!(gfx.live_programs(), 0);
        assert!(cache.is_empty());

        // Extra releases are ignored.
        cache.release(&mut gfx, ProgramKind::PooledQuad);
    }

    #[test]
    fn test_release_all() {
        let mut gfx = RecordingContext::new();
        let mut cache = ProgramCache::new(ShaderLibrary::builtin());

        cache.acquire(&mut gfx, ProgramKind::PooledQuad).unwrap();
        cache.acquire(&mut gfx, ProgramKind::InstancedCube).unwrap();
        assert_eq!(cache.len(), 2);

        cache.release_all(&mut gfx);
        assert!(cache.is_empty());
        assert_eq!(gfx.live_programs(), 0);
    }

    #[test]
    fn test_failed_compile_is_not_cached() {
        let mut gfx = RecordingContext::new();
        gfx.lose_context();
        let mut cache = ProgramCache::new(ShaderLibrary::builtin());

        assert!(cache.acquire(&mut gfx, ProgramKind::InstancedCube).is_err());
        assert_eq!(cache.ref_count(ProgramKind::InstancedCube), 0);
    }
}
