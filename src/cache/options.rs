//! Per-call options for `CacheFacade::safe_get`

use crate::bloom::BloomFilter;
use std::fmt;

/// Predicate that forces the lock-and-load path regardless of the filter
pub type PresenceOverride = dyn Fn(&str) -> bool + Send + Sync;

/// Callback invoked when the loader finds nothing for a key
pub type StillAbsentCallback<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// Optional collaborators of a safe load
#[derive(Clone, Copy, Default)]
pub struct SafeGetOptions<'a> {
    pub(crate) bloom_filter: Option<&'a dyn BloomFilter>,
    pub(crate) presence_override: Option<&'a PresenceOverride>,
    pub(crate) on_still_absent: Option<&'a StillAbsentCallback<'a>>,
}

impl<'a> SafeGetOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short-circuit keys the filter has never seen
    pub fn bloom_filter(mut self, filter: &'a dyn BloomFilter) -> Self {
        self.bloom_filter = Some(filter);
        self
    }

    /// Use `filter` when one is configured, otherwise leave it unset
    pub fn maybe_bloom_filter(mut self, filter: Option<&'a dyn BloomFilter>) -> Self {
        self.bloom_filter = filter;
        self
    }

    pub fn presence_override(mut self, predicate: &'a PresenceOverride) -> Self {
        self.presence_override = Some(predicate);
        self
    }

    pub fn on_still_absent(mut self, callback: &'a StillAbsentCallback<'a>) -> Self {
        self.on_still_absent = Some(callback);
        self
    }

    /// Whether the filter check should be skipped for `key`
    pub(crate) fn bypasses_filter(&self, key: &str) -> bool {
        self.presence_override
            .is_some_and(|predicate| predicate(key))
    }
}

impl fmt::Debug for SafeGetOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeGetOptions")
            .field("bloom_filter", &self.bloom_filter.map(|b| b.name()))
            .field("presence_override", &self.presence_override.is_some())
            .field("on_still_absent", &self.on_still_absent.is_some())
            .finish()
    }
}
