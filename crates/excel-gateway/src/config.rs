//! Gateway configuration

use std::env;

/// Environment variable holding the worksheet protection password
pub const ENV_PROTECTION_SECRET: &str = "EXCEL_GATEWAY_PROTECTION_SECRET";
/// Environment variable overriding the component label used in failure logs
pub const ENV_COMPONENT: &str = "EXCEL_GATEWAY_COMPONENT";
/// Environment variable overriding the API version gating autofit
pub const ENV_AUTOFIT_REQUIREMENT: &str = "EXCEL_GATEWAY_AUTOFIT_REQUIREMENT";

/// Settings for [`SheetGateway`](crate::SheetGateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Password used when protecting, unprotecting or pausing protection.
    /// `None` protects without a password.
    pub protection_secret: Option<String>,

    /// Component label passed to the log sink on every failure.
    pub component: String,

    /// API version that must be supported before layout autofit is attempted.
    pub autofit_requirement: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            protection_secret: None,
            component: "Excel Service".to_string(),
            autofit_requirement: "1.2".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by any `EXCEL_GATEWAY_*` variables that are set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(secret) = lookup(ENV_PROTECTION_SECRET).filter(|s| !s.is_empty()) {
            config.protection_secret = Some(secret);
        }
        if let Some(component) = lookup(ENV_COMPONENT).filter(|s| !s.is_empty()) {
            config.component = component;
        }
        if let Some(version) = lookup(ENV_AUTOFIT_REQUIREMENT).filter(|s| !s.is_empty()) {
            config.autofit_requirement = version;
        }
        config
    }

    pub fn with_protection_secret(mut self, secret: impl Into<String>) -> Self {
        self.protection_secret = Some(secret.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_autofit_requirement(mut self, version: impl Into<String>) -> Self {
        self.autofit_requirement = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.protection_secret, None);
        assert_eq!(config.component, "Excel Service");
        assert_eq!(config.autofit_requirement, "1.2");
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_PROTECTION_SECRET, "s3cret"),
            (ENV_COMPONENT, ""),
            (ENV_AUTOFIT_REQUIREMENT, "1.4"),
        ]
        .into_iter()
        .collect();
        let config = GatewayConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.protection_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.component, "Excel Service");
        assert_eq!(config.autofit_requirement, "1.4");
    }
}
