//! Policy Enforcer.
//!
//! Stateless scope + whitelist + skip-rule validator, invoked identically at
//! task generation time and again at dispatch time.

use crate::domain::models::expr::{ip_in_cidr, Expr};
use crate::domain::models::{AttrMap, AttrValue, Target, TargetType};

/// The outcome of a [`PolicyEnforcer`] check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(String),
}

impl PolicyDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Global policy: the project's declared scope plus the operator's global
/// whitelist and skip rule. Distinct from a stage's own [`crate::domain::models::TargetPolicy`],
/// which is applied earlier, during target resolution.
#[derive(Debug, Clone, Default)]
pub struct GlobalPolicy {
    /// Project scope: CIDRs and domain suffixes a target must fall within.
    /// Empty means unrestricted (any target is in scope).
    pub scope: Vec<String>,
    pub whitelist: Vec<String>,
    pub skip_rule: Option<Expr>,
}

/// Stateless scope/whitelist/skip-rule validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEnforcer;

impl PolicyEnforcer {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `target` against `policy`, checking in order: scope, then
    /// global whitelist, then global skip rule.
    pub fn enforce(&self, target: &Target, policy: &GlobalPolicy) -> PolicyDecision {
        if !policy.scope.is_empty() && !in_scope(target, &policy.scope) {
            return PolicyDecision::Deny("target out of project scope".to_string());
        }

        if policy.whitelist.iter().any(|w| w == &target.value) {
            return PolicyDecision::Deny("denied by whitelist".to_string());
        }

        if let Some(skip_rule) = &policy.skip_rule {
            if skip_rule.evaluate(&target_attrs(target)) {
                return PolicyDecision::Deny("denied by skip rule".to_string());
            }
        }

        PolicyDecision::Allow
    }
}

fn in_scope(target: &Target, scope: &[String]) -> bool {
    scope.iter().any(|entry| scope_matches(target, entry))
}

fn scope_matches(target: &Target, entry: &str) -> bool {
    if entry.contains('/') {
        if matches!(target.target_type, TargetType::Ip) {
            return ip_in_cidr(&target.value, entry).unwrap_or(false);
        }
        return false;
    }
    match target.target_type {
        TargetType::Domain => target.value == entry || target.value.ends_with(&format!(".{entry}")),
        _ => target.value == entry,
    }
}

fn target_attrs(target: &Target) -> AttrMap {
    let mut attrs = AttrMap::new();
    attrs.insert("value".to_string(), AttrValue::String(target.value.clone()));
    attrs.insert("source".to_string(), AttrValue::String(target.source.clone()));
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scope_allows_everything() {
        let target = Target::new("10.0.0.1", "seed");
        let decision = PolicyEnforcer::new().enforce(&target, &GlobalPolicy::default());
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn out_of_scope_target_is_denied() {
        let target = Target::new("192.168.1.1", "seed");
        let policy = GlobalPolicy { scope: vec!["10.0.0.0/8".to_string()], ..Default::default() };
        let decision = PolicyEnforcer::new().enforce(&target, &policy);
        assert!(!decision.is_allow());
    }

    #[test]
    fn in_scope_cidr_target_is_allowed() {
        let target = Target::new("10.1.2.3", "seed");
        let policy = GlobalPolicy { scope: vec!["10.0.0.0/8".to_string()], ..Default::default() };
        let decision = PolicyEnforcer::new().enforce(&target, &policy);
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn global_whitelist_denies_match() {
        let target = Target::new("10.0.0.1", "seed");
        let policy = GlobalPolicy { whitelist: vec!["10.0.0.1".to_string()], ..Default::default() };
        let decision = PolicyEnforcer::new().enforce(&target, &policy);
        assert!(!decision.is_allow());
    }

    #[test]
    fn domain_suffix_match_is_in_scope() {
        let target = Target::new("api.example.com", "seed");
        let policy = GlobalPolicy { scope: vec!["example.com".to_string()], ..Default::default() };
        let decision = PolicyEnforcer::new().enforce(&target, &policy);
        assert_eq!(decision, PolicyDecision::Allow);
    }
}
