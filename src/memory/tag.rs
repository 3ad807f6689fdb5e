//! Per-category allocation accounting, ported from the original engine's
//! `MemoryTag`-keyed global allocators (`utils/memory_system.hpp`). The
//! original installs a distinct C++ allocator per tag so every `new`/`delete`
//! is attributed; Rust's ownership model makes that unnecessary for
//! correctness, so this keeps only the diagnostic value: a process-wide
//! table of live byte counts per tag, updated by the allocators that care
//! (the managed GPU buffer, the image/texture allocator).

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryTag {
    GpuBuffer,
    Texture,
    Mesh,
    Shader,
    Material,
    Unknown,
}

#[derive(Default)]
pub struct MemoryTagTable {
    live_bytes: HashMap<MemoryTag, u64>,
}

impl MemoryTagTable {
    pub fn record_alloc(&mut self, tag: MemoryTag, bytes: u64) {
        *self.live_bytes.entry(tag).or_insert(0) += bytes;
    }

    pub fn record_free(&mut self, tag: MemoryTag, bytes: u64) {
        if let Some(count) = self.live_bytes.get_mut(&tag) {
            *count = count.saturating_sub(bytes);
        }
    }

    pub fn live_bytes(&self, tag: MemoryTag) -> u64 {
        self.live_bytes.get(&tag).copied().unwrap_or(0)
    }
}

fn table() -> &'static Mutex<MemoryTagTable> {
    static TABLE: OnceLock<Mutex<MemoryTagTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(MemoryTagTable::default()))
}

pub fn record_alloc(tag: MemoryTag, bytes: u64) {
    table().lock().unwrap().record_alloc(tag, bytes);
}

pub fn record_free(tag: MemoryTag, bytes: u64) {
    table().lock().unwrap().record_free(tag, bytes);
}

pub fn live_bytes(tag: MemoryTag) -> u64 {
    table().lock().unwrap().live_bytes(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_live_bytes_per_tag() {
        record_alloc(MemoryTag::Mesh, 100);
        record_alloc(MemoryTag::Mesh, 50);
        assert!(live_bytes(MemoryTag::Mesh) >= 150);
        record_free(MemoryTag::Mesh, 150);
    }
}
