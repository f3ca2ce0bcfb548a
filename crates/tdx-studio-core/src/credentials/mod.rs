//! Credential Session Management
//!
//! Session-scoped access to the generation service API key. The hosting
//! environment supplies the key through a [`CredentialStore`] capability;
//! the session tracks whether a key has been selected, hands it out fresh at
//! the start of each remote call, and invalidates itself when the service no
//! longer recognizes the key.
//!
//! Credential values are never logged; use [`redact`] for any diagnostic
//! output that needs to reference a key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{CoreError, CoreResult};

/// Upstream error text that identifies a rejected or expired API key
pub const ENTITY_NOT_FOUND_MARKER: &str = "Requested entity was not found";

/// Returns a redacted preview of a credential for logging
pub fn redact(value: &str) -> String {
    if value.len() < 12 {
        "*".repeat(value.len())
    } else {
        format!("{}...{}", &value[..4], &value[value.len() - 4..])
    }
}

/// Environment capability that supplies the API key
pub trait CredentialStore: Send + Sync {
    /// Whether a credential is currently configured
    fn has_credential(&self) -> bool;

    /// Reads the credential value
    fn read_credential(&self) -> CoreResult<String>;
}

/// Reads the credential from a process environment variable
pub struct EnvCredentialStore {
    var_name: String,
}

impl EnvCredentialStore {
    /// Creates a store backed by the named environment variable
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn has_credential(&self) -> bool {
        std::env::var(&self.var_name)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    fn read_credential(&self) -> CoreResult<String> {
        match std::env::var(&self.var_name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(CoreError::ValidationError(format!(
                "No API key found in the {} environment variable",
                self.var_name
            ))),
        }
    }
}

/// Fixed credential supplied by the embedding application
pub struct StaticCredentialStore {
    value: Option<String>,
}

impl StaticCredentialStore {
    /// Creates a store holding the given key
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// Creates a store with no key configured
    pub fn empty() -> Self {
        Self { value: None }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn has_credential(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }

    fn read_credential(&self) -> CoreResult<String> {
        match self.value.as_deref() {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(CoreError::ValidationError(
                "No API key is configured".to_string(),
            )),
        }
    }
}

/// Process-wide session context passed explicitly to each remote-call site.
///
/// Replaces ambient global credential state: the session is initialized once
/// against the environment capability and invalidated explicitly when the
/// service reports the key as unknown.
pub struct CredentialSession {
    store: Arc<dyn CredentialStore>,
    selected: AtomicBool,
}

impl std::fmt::Debug for CredentialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSession")
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl CredentialSession {
    /// Checks the environment capability and builds the session context.
    ///
    /// `None` means the hosting environment exposes no credential selection
    /// mechanism at all, which is itself an error condition.
    pub fn init(store: Option<Arc<dyn CredentialStore>>) -> CoreResult<Self> {
        let store = store.ok_or_else(|| {
            CoreError::CapabilityUnavailable(
                "No credential selection mechanism is available".to_string(),
            )
        })?;

        let selected = store.has_credential();
        info!(selected, "credential session initialized");

        Ok(Self {
            store,
            selected: AtomicBool::new(selected),
        })
    }

    /// Whether a key has been selected for this session
    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    /// Marks the credential as selected after the user picked one
    pub fn select(&self) -> CoreResult<()> {
        if !self.store.has_credential() {
            return Err(CoreError::ValidationError(
                "Select an API key before submitting".to_string(),
            ));
        }
        self.selected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Reads the key fresh; called at the start of every remote call
    pub fn api_key(&self) -> CoreResult<String> {
        if !self.is_selected() {
            return Err(CoreError::ValidationError(
                "Select an API key before submitting".to_string(),
            ));
        }
        self.store.read_credential()
    }

    /// Drops the selected flag so the caller must re-select a key
    pub fn invalidate(&self) {
        self.selected.store(false, Ordering::SeqCst);
        warn!("credential session invalidated; key re-selection required");
    }

    /// Translates a remote failure message into a core error.
    ///
    /// The "entity not found" marker means the service rejected the key, so
    /// the session resets itself and the caller sees
    /// [`CoreError::InvalidOrExpiredCredential`].
    pub fn classify_remote_error(&self, message: String) -> CoreError {
        if message.contains(ENTITY_NOT_FOUND_MARKER) {
            self.invalidate();
            CoreError::InvalidOrExpiredCredential
        } else {
            CoreError::RemoteCallFailed(message)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
