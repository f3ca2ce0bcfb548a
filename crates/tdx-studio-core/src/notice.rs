//! Transient User Notices
//!
//! Error and status strings shown to the user expire on their own: the
//! deadline travels with the value instead of living in an external timer
//! tied to some component's lifetime.

use std::time::{Duration, Instant};

/// How long a notice stays visible by default
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

/// A message with a built-in expiry
#[derive(Debug, Clone)]
pub struct ExpiringNotice {
    text: String,
    expires_at: Instant,
}

impl ExpiringNotice {
    /// Creates a notice with the default TTL
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_ttl(text, DEFAULT_NOTICE_TTL)
    }

    /// Creates a notice that expires after `ttl`
    pub fn with_ttl(text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            text: text.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    /// Returns the message while the notice is still live
    pub fn message(&self) -> Option<&str> {
        (!self.is_expired()).then_some(self.text.as_str())
    }

    /// Whether the notice has passed its deadline
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Holds at most one notice; cleared by expiry or by the next action
#[derive(Debug, Default)]
pub struct NoticeSlot {
    current: Option<ExpiringNotice>,
}

impl NoticeSlot {
    /// Replaces the current notice with a fresh one
    pub fn set(&mut self, text: impl Into<String>) {
        self.current = Some(ExpiringNotice::new(text));
    }

    /// Replaces the current notice with a custom TTL
    pub fn set_with_ttl(&mut self, text: impl Into<String>, ttl: Duration) {
        self.current = Some(ExpiringNotice::with_ttl(text, ttl));
    }

    /// Clears the slot, e.g. when the user starts a new action
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Returns the live message, if any
    pub fn message(&self) -> Option<&str> {
        self.current.as_ref().and_then(|n| n.message())
    }
}

// ============================================================================
// Tests
// ============================================================================
