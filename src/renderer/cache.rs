//! GPU resource cache
//!
//! Holds programs by name and buffers/textures by an opaque [`OwnerKey`].
//! Each renderable keeps a small struct of its own keys; the cache only
//! maps keys to handles. Buffers and textures are get-or-create.
//!
//! On context loss every handle is dropped without further GPU calls and
//! the next frame rebuilds whatever it asks for.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::GpuError;

/// Opaque identity of one GPU resource slot owned by a renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerKey(u64);

impl OwnerKey {
    /// A key no other caller has
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Result of a get-or-create lookup
pub struct Fetched<'a, R> {
    pub resource: &'a mut R,
    /// The resource was missing and has just been built; its contents are
    /// whatever the builder put there
    pub created: bool,
}

#[derive(Debug)]
pub struct GpuCache<P, B, T> {
    programs: HashMap<String, P>,
    buffers: HashMap<OwnerKey, B>,
    textures: HashMap<OwnerKey, T>,
}

impl<P, B, T> Default for GpuCache<P, B, T> {
    fn default() -> Self {
        Self {
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
        }
    }
}

impl<P, B, T> GpuCache<P, B, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A previously created program, if any
    pub fn program(&self, name: &str) -> Option<&P> {
        self.programs.get(name)
    }

    /// Build and store a program, replacing one of the same name. The old
    /// program is released before the build runs; a failed build leaves
    /// no entry.
    pub fn create_program<F>(&mut self, name: &str, build: F) -> Result<&P, GpuError>
    where
        F: FnOnce() -> Result<P, GpuError>,
    {
        if self.programs.remove(name).is_some() {
            log::debug!("replacing program '{name}'");
        }
        let program = build()?;
        Ok(&*self.programs.entry(name.to_string()).or_insert(program))
    }

    /// Cached program, building it on first use
    pub fn program_or_create<F>(&mut self, name: &str, build: F) -> Result<&P, GpuError>
    where
        F: FnOnce() -> Result<P, GpuError>,
    {
        match self.programs.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(&*entry.into_mut()),
            Entry::Vacant(entry) => Ok(&*entry.insert(build()?)),
        }
    }

    pub fn buffer<F>(&mut self, key: OwnerKey, build: F) -> Fetched<'_, B>
    where
        F: FnOnce() -> B,
    {
        fetch(&mut self.buffers, key, build)
    }

    /// Swap in a new buffer for `key`, e.g. after outgrowing the old one
    pub fn replace_buffer(&mut self, key: OwnerKey, buffer: B) -> &mut B {
        match self.buffers.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(buffer);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(buffer),
        }
    }

    /// Lookup without creating, for use while a render pass holds borrows
    pub fn cached_buffer(&self, key: OwnerKey) -> Option<&B> {
        self.buffers.get(&key)
    }

    pub fn cached_texture(&self, key: OwnerKey) -> Option<&T> {
        self.textures.get(&key)
    }

    pub fn texture<F>(&mut self, key: OwnerKey, build: F) -> Fetched<'_, T>
    where
        F: FnOnce() -> T,
    {
        fetch(&mut self.textures, key, build)
    }

    pub fn remove_texture(&mut self, key: OwnerKey) -> Option<T> {
        self.textures.remove(&key)
    }

    /// Forget every handle. The context that owned them is gone, so
    /// nothing is explicitly destroyed.
    pub fn on_context_lost(&mut self) {
        log::warn!(
            "dropping {} program(s), {} buffer(s), {} texture(s) after context loss",
            self.programs.len(),
            self.buffers.len(),
            self.textures.len()
        );
        self.programs.clear();
        self.buffers.clear();
        self.textures.clear();
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.programs.len(), self.buffers.len(), self.textures.len())
    }
}

fn fetch<R, F>(map: &mut HashMap<OwnerKey, R>, key: OwnerKey, build: F) -> Fetched<'_, R>
where
    F: FnOnce() -> R,
{
    let mut created = false;
    let resource = map.entry(key).or_insert_with(|| {
        created = true;
        build()
    });
    Fetched { resource, created }
}
