use serde::{Deserialize, Serialize};
use trellis_core::ScopeId;

/// Engine configuration supplied by the embedding process.
///
/// The engine performs no environment parsing of its own; callers construct
/// this once and hand it to the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The process-wide default domain. It cannot be deleted while it holds
    /// this designation, even when disabled.
    pub default_domain_id: ScopeId,
    /// Whether inherited grants are recognized. While disabled, inherited
    /// grant operations report `NotFound` and the resolver skips
    /// inheritance expansion; stored inherited rows are left untouched.
    pub inheritance_enabled: bool,
    /// Whether a project's owning domain is immutable after creation.
    pub domain_id_immutable: bool,
}

impl EngineConfig {
    /// Creates a configuration with the defaults the original service
    /// ships with: inheritance recognized, domain ownership immutable.
    #[must_use]
    pub fn new(default_domain_id: ScopeId) -> Self {
        Self {
            default_domain_id,
            inheritance_enabled: true,
            domain_id_immutable: true,
        }
    }

    /// Returns a copy with the inheritance extension toggled.
    #[must_use]
    pub fn with_inheritance(mut self, enabled: bool) -> Self {
        self.inheritance_enabled = enabled;
        self
    }
}
