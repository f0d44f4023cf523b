use super::Meta;

use sqlkit_core::Value;

use std::sync::Mutex;

/// Observes every row written to a cache.
pub trait Recorder: Send + Sync {
    fn record(&self, meta: &Meta, values: &[Value]);
}

/// Keeps every recorded row in memory, tagged with the SQL it belongs to.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    rows: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MemoryRecorder {
    pub fn new() -> MemoryRecorder {
        MemoryRecorder::default()
    }

    /// Recorded rows, oldest first.
    pub fn rows(&self) -> Vec<(String, Vec<Value>)> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Recorder for MemoryRecorder {
    fn record(&self, meta: &Meta, values: &[Value]) {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((meta.sql.clone(), values.to_vec()));
    }
}
