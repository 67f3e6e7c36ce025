//! Proxy estimation of model features the live inputs do not carry
//!
//! A proxy is a linear rule `feature = factor × source` where `source` must be
//! read directly from the inputs; proxies never chain.

use crate::models::ProcessInputs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRule {
    pub feature: String,
    pub source: String,
    pub factor: f64,
}

impl ProxyRule {
    pub fn new(feature: impl Into<String>, source: impl Into<String>, factor: f64) -> Self {
        Self {
            feature: feature.into(),
            source: source.into(),
            factor,
        }
    }
}

/// A model feature value and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFeature {
    pub name: String,
    pub value: f64,
    pub estimated: bool,
}

/// Resolves one model feature: direct input first, then the first matching proxy
pub fn resolve(name: &str, inputs: &ProcessInputs, proxies: &[ProxyRule]) -> Option<ResolvedFeature> {
    if let Some(value) = inputs.get(name) {
        return Some(ResolvedFeature {
            name: name.to_string(),
            value,
            estimated: false,
        });
    }

    proxies
        .iter()
        .filter(|rule| rule.feature == name)
        .find_map(|rule| {
            inputs.get(&rule.source).map(|source| ResolvedFeature {
                name: name.to_string(),
                value: rule.factor * source,
                estimated: true,
            })
        })
}

/// Resolves all features in order; on failure returns the first unresolved name
pub fn resolve_all(
    names: &[String],
    inputs: &ProcessInputs,
    proxies: &[ProxyRule],
) -> std::result::Result<Vec<ResolvedFeature>, String> {
    names
        .iter()
        .map(|name| resolve(name, inputs, proxies).ok_or_else(|| name.clone()))
        .collect()
}
