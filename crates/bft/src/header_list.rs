//! Bounded sliding window of recent block headers.

use std::collections::VecDeque;
use tidemark_types::{BlockHeader, BlockHeight, GeneratorKey};

/// Ordered window of the most recent block headers.
///
/// Headers are kept in ascending height order; once the window is full the
/// oldest headers are evicted from the front. The engine that owns the list
/// enforces height ordering before inserting, so the list itself never
/// fails.
#[derive(Debug, Clone)]
pub struct HeaderList {
    headers: VecDeque<BlockHeader>,
    max_size: usize,
}

impl HeaderList {
    /// Create an empty window holding at most `max_size` headers.
    pub fn new(max_size: usize) -> Self {
        Self {
            headers: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Append a header, evicting from the front while over capacity.
    pub fn add(&mut self, header: BlockHeader) {
        self.headers.push_back(header);
        while self.headers.len() > self.max_size {
            self.headers.pop_front();
        }
    }

    /// Number of headers currently in the window.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Maximum number of headers the window retains.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Oldest header in the window.
    pub fn first(&self) -> Option<&BlockHeader> {
        self.headers.front()
    }

    /// Newest header in the window.
    pub fn last(&self) -> Option<&BlockHeader> {
        self.headers.back()
    }

    /// Iterate headers in ascending height order.
    pub fn items(&self) -> impl Iterator<Item = &BlockHeader> {
        self.headers.iter()
    }

    /// Header at an exact height, if still in the window.
    pub fn get(&self, height: BlockHeight) -> Option<&BlockHeader> {
        self.headers
            .binary_search_by(|h| h.height.cmp(&height))
            .ok()
            .and_then(|idx| self.headers.get(idx))
    }

    /// Most recent header produced by the given validator.
    ///
    /// Scans from the newest header backwards; the scan is bounded by the
    /// window capacity.
    pub fn header_for_generator(&self, generator: &GeneratorKey) -> Option<&BlockHeader> {
        self.headers.iter().rev().find(|h| h.generator == *generator)
    }
}
