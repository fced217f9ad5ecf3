use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Allocator for scheduled-message identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce an identifier never returned before by this allocator.
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs in their compact form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic counter starting at 1.
#[derive(Debug, Default)]
pub struct SequentialIds {
    last: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        (self.last.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}
