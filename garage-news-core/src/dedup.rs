use std::collections::HashSet;

/// Article URLs already handled during one pipeline run.
///
/// Built fresh for every run and dropped with it; persistence across runs is
/// the record sink's job.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn mark(&mut self, url: &str) {
        self.seen.insert(url.to_string());
    }

    /// Mark `url` and report whether it was new.
    pub fn first_sighting(&mut self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
