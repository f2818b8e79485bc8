//! Generic boolean expression tree shared by skip-rule evaluation (Policy
//! Enforcer, Target Provider) and detection-rule matcher definitions.
//!
//! The tree is a JSON expression over named fields: `and`/`or` combinators
//! over leaves, each leaf an `operator` applied to a `field` and a `value`.
//! Evaluating a leaf against a detection rule's response data is the Agent's
//! responsibility (spec treats `match(data, rule)` as a black box); the core
//! only evaluates leaves against flat string/number attribute maps for skip
//! rules and whitelists, which is a much smaller surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single attribute value as seen by expression evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Flat bag of attributes an expression is evaluated against (e.g. a
/// target's tags/zone/CVE list, or a candidate target's derived fields).
pub type AttrMap = HashMap<String, AttrValue>;

/// Comparison operator for a leaf expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
    Regex,
    In,
    Cidr,
    Exists,
}

/// A leaf comparison: `field <operator> value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaf {
    pub field: String,
    pub operator: Operator,
    /// Absent for `exists`.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// A boolean expression tree: `and`/`or` combinators over leaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Leaf(Leaf),
}

impl Expr {
    /// Evaluate this expression against a flat attribute map. Unknown
    /// fields evaluate to `false` for comparisons other than `exists`
    /// (which correctly reports absence).
    pub fn evaluate(&self, attrs: &AttrMap) -> bool {
        match self {
            Expr::And(children) => children.iter().all(|c| c.evaluate(attrs)),
            Expr::Or(children) => children.iter().any(|c| c.evaluate(attrs)),
            Expr::Leaf(leaf) => leaf.evaluate(attrs),
        }
    }
}

impl Leaf {
    fn evaluate(&self, attrs: &AttrMap) -> bool {
        match self.operator {
            Operator::Exists => attrs.contains_key(&self.field),
            Operator::Equals => {
                let Some(attr) = attrs.get(&self.field) else { return false };
                let Some(val) = &self.value else { return false };
                match (attr, val) {
                    (AttrValue::String(a), serde_json::Value::String(v)) => a == v,
                    (AttrValue::Number(a), serde_json::Value::Number(v)) => {
                        v.as_f64().is_some_and(|v| (*a - v).abs() < f64::EPSILON)
                    }
                    (AttrValue::Bool(a), serde_json::Value::Bool(v)) => a == v,
                    _ => false,
                }
            }
            Operator::Contains => {
                let Some(attr) = attrs.get(&self.field).and_then(AttrValue::as_str) else {
                    return false;
                };
                let Some(needle) = self.value.as_ref().and_then(|v| v.as_str()) else {
                    return false;
                };
                attr.contains(needle)
            }
            Operator::Regex => {
                let Some(attr) = attrs.get(&self.field).and_then(AttrValue::as_str) else {
                    return false;
                };
                let Some(pattern) = self.value.as_ref().and_then(|v| v.as_str()) else {
                    return false;
                };
                regex::Regex::new(pattern).is_ok_and(|re| re.is_match(attr))
            }
            Operator::In => {
                let Some(attr) = attrs.get(&self.field).and_then(AttrValue::as_str) else {
                    return false;
                };
                let Some(arr) = self.value.as_ref().and_then(|v| v.as_array()) else {
                    return false;
                };
                arr.iter().any(|v| v.as_str() == Some(attr))
            }
            Operator::Cidr => {
                let Some(attr) = attrs.get(&self.field).and_then(AttrValue::as_str) else {
                    return false;
                };
                let Some(cidr) = self.value.as_ref().and_then(|v| v.as_str()) else {
                    return false;
                };
                ip_in_cidr(attr, cidr).unwrap_or(false)
            }
        }
    }
}

/// Whether `ip` (a plain IPv4/IPv6 literal) falls inside `cidr` (`addr/prefix`).
/// Returns `None` if either side fails to parse; callers log a warning and
/// treat that as a non-match rather than an error for malformed policy
/// fragments.
pub fn ip_in_cidr(ip: &str, cidr: &str) -> Option<bool> {
    use std::net::IpAddr;

    let (base, prefix_len) = cidr.split_once('/')?;
    let base: IpAddr = base.trim().parse().ok()?;
    let prefix_len: u32 = prefix_len.trim().parse().ok()?;
    let addr: IpAddr = ip.trim().parse().ok()?;

    match (base, addr) {
        (IpAddr::V4(base), IpAddr::V4(addr)) => {
            if prefix_len > 32 {
                return None;
            }
            let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
            Some(u32::from(base) & mask == u32::from(addr) & mask)
        }
        (IpAddr::V6(base), IpAddr::V6(addr)) => {
            if prefix_len > 128 {
                return None;
            }
            let mask = if prefix_len == 0 { 0 } else { u128::MAX << (128 - prefix_len) };
            Some(u128::from(base) & mask == u128::from(addr) & mask)
        }
        _ => Some(false),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttrValue::String(v.to_string())))
            .collect()
    }

    #[test]
    fn leaf_equals_matches_string() {
        let leaf = Leaf {
            field: "zone".to_string(),
            operator: Operator::Equals,
            value: Some(serde_json::json!("internal")),
        };
        let expr = Expr::Leaf(leaf);
        assert!(expr.evaluate(&attrs(&[("zone", "internal")])));
        assert!(!expr.evaluate(&attrs(&[("zone", "external")])));
    }

    #[test]
    fn and_requires_all_children() {
        let expr = Expr::And(vec![
            Expr::Leaf(Leaf {
                field: "zone".to_string(),
                operator: Operator::Equals,
                value: Some(serde_json::json!("internal")),
            }),
            Expr::Leaf(Leaf {
                field: "tag".to_string(),
                operator: Operator::Exists,
                value: None,
            }),
        ]);
        assert!(!expr.evaluate(&attrs(&[("zone", "internal")])));
        assert!(expr.evaluate(&attrs(&[("zone", "internal"), ("tag", "x")])));
    }

    #[test]
    fn or_requires_any_child() {
        let expr = Expr::Or(vec![
            Expr::Leaf(Leaf {
                field: "zone".to_string(),
                operator: Operator::Equals,
                value: Some(serde_json::json!("internal")),
            }),
            Expr::Leaf(Leaf {
                field: "zone".to_string(),
                operator: Operator::Equals,
                value: Some(serde_json::json!("dmz")),
            }),
        ]);
        assert!(expr.evaluate(&attrs(&[("zone", "dmz")])));
        assert!(!expr.evaluate(&attrs(&[("zone", "external")])));
    }

    #[test]
    fn cidr_operator_matches_ip_in_range() {
        let leaf = Leaf {
            field: "ip".to_string(),
            operator: Operator::Cidr,
            value: Some(serde_json::json!("10.0.0.0/8")),
        };
        let expr = Expr::Leaf(leaf);
        assert!(expr.evaluate(&attrs(&[("ip", "10.1.2.3")])));
        assert!(!expr.evaluate(&attrs(&[("ip", "192.168.1.1")])));
    }

    #[test]
    fn regex_operator_evaluates_real_regex_syntax() {
        let leaf = Leaf {
            field: "host".to_string(),
            operator: Operator::Regex,
            value: Some(serde_json::json!(r"^10\.")),
        };
        let expr = Expr::Leaf(leaf);
        assert!(expr.evaluate(&attrs(&[("host", "10.0.0.5")])));
        assert!(!expr.evaluate(&attrs(&[("host", "210.0.0.5")])));

        let alternation = Leaf {
            field: "zone".to_string(),
            operator: Operator::Regex,
            value: Some(serde_json::json!("^(internal|dmz)$")),
        };
        let expr = Expr::Leaf(alternation);
        assert!(expr.evaluate(&attrs(&[("zone", "dmz")])));
        assert!(!expr.evaluate(&attrs(&[("zone", "external")])));
    }

    #[test]
    fn missing_field_is_false_except_exists() {
        let leaf = Leaf {
            field: "absent".to_string(),
            operator: Operator::Equals,
            value: Some(serde_json::json!("x")),
        };
        assert!(!Expr::Leaf(leaf).evaluate(&AttrMap::new()));
        let exists = Leaf {
            field: "absent".to_string(),
            operator: Operator::Exists,
            value: None,
        };
        assert!(!Expr::Leaf(exists).evaluate(&AttrMap::new()));
    }
}
