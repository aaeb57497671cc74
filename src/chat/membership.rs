//! Channel membership listings.

use std::collections::HashMap;

/// Accumulates `353` name batches per channel until the `366` for that
/// channel arrives. Owned by the dispatcher, so no locking.
#[derive(Debug, Default)]
pub struct NamesCache {
    pending: HashMap<String, Vec<String>>,
}

impl NamesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch of space-separated names.
    pub fn extend(&mut self, channel: &str, names: &str) {
        self.pending
            .entry(channel.to_owned())
            .or_default()
            .extend(names.split_whitespace().map(str::to_owned));
    }

    /// Take the finished listing for `channel`, leaving nothing behind.
    pub fn flush(&mut self, channel: &str) -> Vec<String> {
        self.pending.remove(channel).unwrap_or_default()
    }

    pub fn is_pending(&self, channel: &str) -> bool {
        self.pending.contains_key(channel)
    }
}
