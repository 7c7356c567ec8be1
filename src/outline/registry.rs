//! Kernel table: the id → function mapping handed to the backend.

use crate::ir::FnId;

/// What a kernel was outlined from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelOrigin {
    /// An order-independent counting loop.
    Loop,
    /// An explicit `kernel(count, size) { }` block.
    Block,
}

impl KernelOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            KernelOrigin::Loop => "loop",
            KernelOrigin::Block => "block",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelEntry {
    pub id: u32,
    pub func: FnId,
    pub origin: KernelOrigin,
}

/// Append-only table of generated kernels. Ids are dense and start at 0.
#[derive(Clone, Debug, Default)]
pub struct KernelRegistry {
    entries: Vec<KernelEntry>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next registered kernel will receive.
    pub fn next_id(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn register(&mut self, func: FnId, origin: KernelOrigin) -> u32 {
        let id = self.next_id();
        self.entries.push(KernelEntry { id, func, origin });
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &KernelEntry> {
        self.entries.iter()
    }

    pub fn fn_ids(&self) -> Vec<FnId> {
        self.entries.iter().map(|e| e.func).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
