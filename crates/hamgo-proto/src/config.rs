//! Decoder configuration.

/// Limits applied while decoding list payloads.
///
/// Declared entry counts come straight off the wire and are never trusted.
/// The decoders loop at most `min(declared, max_entries)` times and stop
/// earlier if the buffer runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Upper bound on entries attempted in a single list decode. The default
    /// is unbounded; the buffer length alone limits the loop.
    pub max_entries: u32,
}

impl DecodeConfig {
    /// Default entry bound: every entry the wire can declare.
    pub const DEFAULT_MAX_ENTRIES: u32 = u32::MAX;

    /// Config with a custom entry bound.
    ///
    /// Lists declaring more entries than `max_entries` decode only the first
    /// `max_entries` and report [`crate::SkipReason::EntryLimitReached`].
    pub fn with_max_entries(max_entries: u32) -> Self {
        Self { max_entries }
    }

    /// Number of entries a decoder should attempt for a declared count.
    pub(crate) fn entry_budget(&self, declared: u32) -> u32 {
        declared.min(self.max_entries)
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self { max_entries: Self::DEFAULT_MAX_ENTRIES }
    }
}
