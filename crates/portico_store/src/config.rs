//! Engine configuration.

/// Configuration for an embedded engine.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of cursors open at once across all sessions.
    ///
    /// Streaming iteration holds a cursor open until exhaustion, and a
    /// caller who abandons one early leaks it until the session closes.
    /// The cap turns a runaway leak into an error instead of unbounded
    /// growth.
    pub max_open_cursors: usize,

    /// Whether `like` patterns match case-insensitively.
    pub like_case_insensitive: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_open_cursors: 32,
            like_case_insensitive: false,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the open-cursor cap.
    #[must_use]
    pub const fn max_open_cursors(mut self, limit: usize) -> Self {
        self.max_open_cursors = limit;
        self
    }

    /// Sets case-insensitive `like` matching.
    #[must_use]
    pub const fn like_case_insensitive(mut self, value: bool) -> Self {
        self.like_case_insensitive = value;
        self
    }
}
