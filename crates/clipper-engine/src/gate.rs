//! # Security Gate
//!
//! Shared-secret check gating destructive operations (invoice void).
//!
//! The secret is the `void-pin` entry in site configuration. When no pin is
//! configured the gate is **open**: every void passes. That default is
//! deliberate and documented - small shops run without a pin and tightening
//! it silently would lock their registers - so hardening it is a product
//! decision, not something this module takes upon itself.

use tracing::debug;

/// Site-config key holding the void security pin.
pub const VOID_PIN_KEY: &str = "void-pin";

/// Shared-secret check for destructive operations.
#[derive(Debug, Clone)]
pub struct SecurityGate {
    secret: Option<String>,
}

impl SecurityGate {
    /// Creates a gate over the configured secret.
    ///
    /// An empty or whitespace-only secret counts as unconfigured.
    pub fn new(secret: Option<String>) -> Self {
        let secret = secret.filter(|s| !s.trim().is_empty());
        if secret.is_none() {
            debug!("no void pin configured; security gate is open");
        }
        SecurityGate { secret }
    }

    /// Checks whether the gate has no secret configured.
    pub fn is_open(&self) -> bool {
        self.secret.is_none()
    }

    /// Authorizes a caller-supplied key against the configured secret.
    ///
    /// - No secret configured → always true (open gate)
    /// - Secret configured → true only on an exact match
    pub fn authorize(&self, provided: Option<&str>) -> bool {
        match &self.secret {
            None => true,
            Some(secret) => provided == Some(secret.as_str()),
        }
    }
}
