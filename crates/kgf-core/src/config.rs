//! Federation configuration.
//!
//! Keys use the camelCase option names exposed to callers (`maxDepth`,
//! `maxNodes`, ...). Every field has a default so partial files load.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KgfError, KgfResult};

/// Hard ceiling on traversal depth, whatever the configuration says.
pub const MAX_DEPTH_LIMIT: u32 = 5;

/// Tunables for the gateway and the subgraph assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FederationConfig {
    /// Hop limit for neighbour expansion.
    pub max_depth: u32,
    /// Hard ceiling on returned node count, seed included.
    pub max_nodes: usize,
    /// Timeout applied to each backend call.
    pub per_backend_timeout_ms: u64,
    /// Entity store override for `per_backend_timeout_ms`.
    pub entity_timeout_ms: Option<u64>,
    /// Graph store override for `per_backend_timeout_ms`.
    pub graph_timeout_ms: Option<u64>,
    /// Concurrent frontier expansions within one depth level.
    pub max_concurrent_expansions: usize,
    /// Merge relational-store relationships into subgraphs.
    pub include_entity_only_edges: bool,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_nodes: 50,
            per_backend_timeout_ms: 3000,
            entity_timeout_ms: None,
            graph_timeout_ms: None,
            max_concurrent_expansions: 8,
            include_entity_only_edges: true,
        }
    }
}

impl FederationConfig {
    pub fn entity_timeout(&self) -> Duration {
        Duration::from_millis(self.entity_timeout_ms.unwrap_or(self.per_backend_timeout_ms))
    }

    pub fn graph_timeout(&self) -> Duration {
        Duration::from_millis(self.graph_timeout_ms.unwrap_or(self.per_backend_timeout_ms))
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.per_backend_timeout_ms = timeout_ms;
        self
    }

    pub fn with_entity_only_edges(mut self, include: bool) -> Self {
        self.include_entity_only_edges = include;
        self
    }

    /// Applies environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `KGF_MAX_DEPTH` | `max_depth` |
    /// | `KGF_MAX_NODES` | `max_nodes` |
    /// | `KGF_TIMEOUT_MS` | `per_backend_timeout_ms` |
    /// | `KGF_MAX_CONCURRENT_EXPANSIONS` | `max_concurrent_expansions` |
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("KGF_MAX_DEPTH") {
            self.max_depth = v;
        }
        if let Some(v) = env_parse("KGF_MAX_NODES") {
            self.max_nodes = v;
        }
        if let Some(v) = env_parse("KGF_TIMEOUT_MS") {
            self.per_backend_timeout_ms = v;
        }
        if let Some(v) = env_parse("KGF_MAX_CONCURRENT_EXPANSIONS") {
            self.max_concurrent_expansions = v;
        }
        self
    }

    /// Reject settings that would make traversal meaningless.
    pub fn validate(&self) -> KgfResult<()> {
        if self.max_nodes == 0 {
            return Err(KgfError::Config("maxNodes must be at least 1".into()));
        }
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(KgfError::Config(format!(
                "maxDepth {} exceeds the limit of {}",
                self.max_depth, MAX_DEPTH_LIMIT
            )));
        }
        if self.max_concurrent_expansions == 0 {
            return Err(KgfError::Config("maxConcurrentExpansions must be at least 1".into()));
        }
        if self.per_backend_timeout_ms == 0
            || self.entity_timeout_ms == Some(0)
            || self.graph_timeout_ms == Some(0)
        {
            return Err(KgfError::Config("backend timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Validate a per-request depth against the hard ceiling.
    pub fn check_depth(depth: i64) -> KgfResult<u32> {
        if depth < 0 || depth > i64::from(MAX_DEPTH_LIMIT) {
            return Err(KgfError::invalid(format!(
                "depth must be between 0 and {}, got {}",
                MAX_DEPTH_LIMIT, depth
            )));
        }
        Ok(depth as u32)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FederationConfig::default();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_nodes, 50);
        assert_eq!(config.graph_timeout(), Duration::from_millis(3000));
        assert!(config.include_entity_only_edges);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_camel_case_keys() {
        let config: FederationConfig = toml::from_str(
            "maxNodes = 3\ngraphTimeoutMs = 250\nincludeEntityOnlyEdges = false\n",
        )
        .unwrap();
        assert_eq!(config.max_nodes, 3);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.graph_timeout(), Duration::from_millis(250));
        assert_eq!(config.entity_timeout(), Duration::from_millis(3000));
        assert!(!config.include_entity_only_edges);
    }

    #[test]
    fn test_validate_rejects_bad_caps() {
        assert!(FederationConfig::default().with_max_nodes(0).validate().is_err());
        assert!(FederationConfig::default().with_max_depth(9).validate().is_err());
        assert!(FederationConfig::default().with_timeout_ms(0).validate().is_err());
    }

    #[test]
    fn test_check_depth() {
        assert_eq!(FederationConfig::check_depth(3), Ok(3));
        assert!(matches!(
            FederationConfig::check_depth(-1),
            Err(KgfError::InvalidArgument(_))
        ));
        assert!(FederationConfig::check_depth(6).is_err());
    }
}
