//! Comparison policies deciding whether observed state already matches
//!
//! One generic comparator driven by a declarative [`ComparisonPolicy`] per
//! kind. Keys present only in observed state never cause drift, so fields the
//! appliance derives on its own (hashes, counters, timestamps) cannot trigger
//! an update loop.

use crate::value::{Fields, is_blank, normalize, scalar_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// How declared values are matched against observed values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Declared values must string-equal observed values
    #[default]
    Exact,
    /// Like `Exact`, ignoring letter case
    CaseInsensitive,
    /// Declared maps must be a recursive subset of observed maps
    DeepSubset,
}

/// Per-kind comparison rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonPolicy {
    pub mode: MatchMode,
    ignored: BTreeSet<String>,
    ignored_prefixes: Vec<String>,
}

impl ComparisonPolicy {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn exact() -> Self {
        Self::new(MatchMode::Exact)
    }

    pub fn case_insensitive() -> Self {
        Self::new(MatchMode::CaseInsensitive)
    }

    pub fn deep_subset() -> Self {
        Self::new(MatchMode::DeepSubset)
    }

    /// Ignore a field; a trailing `*` ignores every field with that prefix
    pub fn ignore(mut self, pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => self.ignored_prefixes.push(prefix.to_string()),
            None => {
                self.ignored.insert(pattern.to_string());
            }
        }
        self
    }

    /// Ignore several fields at once
    pub fn ignore_all(self, patterns: &[&str]) -> Self {
        patterns.iter().fold(self, |policy, p| policy.ignore(p))
    }

    /// Check whether a field name is excluded from comparison
    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignored.contains(field) || self.ignored_prefixes.iter().any(|p| field.starts_with(p))
    }
}

/// A single out-of-sync field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    /// Dotted path of the field
    pub field: String,
    /// Observed rendering, `None` when the field is absent
    pub observed: Option<String>,
    /// Declared rendering
    pub desired: String,
}

/// Check whether observed state satisfies the declared fields
pub fn in_sync(observed: &Fields, desired: &Fields, policy: &ComparisonPolicy) -> bool {
    field_diffs(observed, desired, policy).is_empty()
}

/// List the declared fields that observed state does not satisfy
pub fn field_diffs(observed: &Fields, desired: &Fields, policy: &ComparisonPolicy) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    collect_diffs(observed, desired, policy, "", &mut diffs);
    diffs
}

fn collect_diffs(
    observed: &Fields,
    desired: &Fields,
    policy: &ComparisonPolicy,
    prefix: &str,
    diffs: &mut Vec<FieldDiff>,
) {
    for (key, want) in desired {
        if policy.is_ignored(key) {
            continue;
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        let Some(have) = observed.get(key) else {
            if !is_blank(want) {
                diffs.push(FieldDiff {
                    field: path,
                    observed: None,
                    desired: render(want),
                });
            }
            continue;
        };

        match (policy.mode, want, have) {
            (MatchMode::DeepSubset, Value::Object(want_map), Value::Object(have_map)) => {
                collect_diffs(have_map, want_map, policy, &path, diffs);
            }
            _ => {
                if !values_match(have, want, policy.mode) {
                    diffs.push(FieldDiff {
                        field: path,
                        observed: Some(render(have)),
                        desired: render(want),
                    });
                }
            }
        }
    }
}

fn values_match(have: &Value, want: &Value, mode: MatchMode) -> bool {
    if want.is_object() || have.is_object() {
        let (have, want) = (normalize(have), normalize(want));
        return match mode {
            MatchMode::CaseInsensitive => {
                have.to_string().to_lowercase() == want.to_string().to_lowercase()
            }
            // A declared empty map is satisfied by anything in subset mode.
            MatchMode::DeepSubset => want.as_object().is_some_and(|m| m.is_empty()) || have == want,
            MatchMode::Exact => have == want,
        };
    }

    let (have, want) = (scalar_string(have), scalar_string(want));
    match mode {
        MatchMode::CaseInsensitive => have.to_lowercase() == want.to_lowercase(),
        MatchMode::Exact | MatchMode::DeepSubset => have == want,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Object(_) => normalize(value).to_string(),
        other => scalar_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_exact_match_and_drift() {
        let policy = ComparisonPolicy::exact();
        let observed = fields(json!({"name": "web", "port": "443", "hash": "abc"}));

        assert!(in_sync(&observed, &fields(json!({"port": "443"})), &policy));
        assert!(in_sync(&observed, &fields(json!({"port": 443})), &policy));
        assert!(!in_sync(&observed, &fields(json!({"port": "80"})), &policy));
        assert!(!in_sync(&observed, &fields(json!({"name": "WEB"})), &policy));
    }

    #[test]
    fn test_case_insensitive() {
        let policy = ComparisonPolicy::case_insensitive();
        let observed = fields(json!({"protocol": "TCP"}));

        assert!(in_sync(&observed, &fields(json!({"protocol": "tcp"})), &policy));
        assert!(!in_sync(&observed, &fields(json!({"protocol": "udp"})), &policy));
        assert!(!in_sync(
            &observed,
            &fields(json!({"protocol": "tcp"})),
            &ComparisonPolicy::exact()
        ));
    }

    #[test]
    fn test_deep_subset() {
        let policy = ComparisonPolicy::deep_subset();
        let observed = fields(json!({"general": {"enabled": "1", "tuning": {"x": "1"}}}));

        assert!(in_sync(
            &observed,
            &fields(json!({"general": {"enabled": "1"}})),
            &policy
        ));

        let diffs = field_diffs(&observed, &fields(json!({"general": {"enabled": "0"}})), &policy);
        assert_eq!(
            diffs,
            vec![FieldDiff {
                field: "general.enabled".to_string(),
                observed: Some("1".to_string()),
                desired: "0".to_string(),
            }]
        );
    }

    #[test]
    fn test_deep_subset_nested_object_against_scalar() {
        let policy = ComparisonPolicy::deep_subset();
        let observed = fields(json!({"general": "flat"}));
        assert!(!in_sync(
            &observed,
            &fields(json!({"general": {"enabled": "1"}})),
            &policy
        ));
        assert!(in_sync(&observed, &fields(json!({"general": {}})), &policy));
    }

    #[test]
    fn test_exact_mode_compares_whole_objects() {
        let policy = ComparisonPolicy::exact();
        let observed = fields(json!({"general": {"enabled": "1", "extra": "x"}}));
        assert!(!in_sync(
            &observed,
            &fields(json!({"general": {"enabled": "1"}})),
            &policy
        ));
    }

    #[test]
    fn test_ignored_names_and_prefixes() {
        let policy = ComparisonPolicy::exact().ignore_all(&["uuid", "counter_*"]);
        let observed = fields(json!({"uuid": "a", "counter_in": "5", "name": "x"}));
        let desired = fields(json!({"uuid": "b", "counter_in": "0", "counter_out": "9", "name": "x"}));

        assert!(in_sync(&observed, &desired, &policy));
        assert!(policy.is_ignored("counter_anything"));
        assert!(!policy.is_ignored("counter"));
    }

    #[test]
    fn test_missing_observed_field() {
        let policy = ComparisonPolicy::exact();
        let observed = fields(json!({"name": "x"}));

        assert!(in_sync(&observed, &fields(json!({"description": ""})), &policy));
        let diffs = field_diffs(&observed, &fields(json!({"description": "d"})), &policy);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].observed, None);
    }

    #[test]
    fn test_extra_observed_fields_ignored() {
        for policy in [
            ComparisonPolicy::exact(),
            ComparisonPolicy::case_insensitive(),
            ComparisonPolicy::deep_subset(),
        ] {
            let observed = fields(json!({"a": "1", "derived": "zzz"}));
            assert!(in_sync(&observed, &fields(json!({"a": "1"})), &policy));
        }
    }

    #[test]
    fn test_boolean_and_list_encoding() {
        let policy = ComparisonPolicy::exact();
        let observed = fields(json!({"enabled": "1", "members": "a,b"}));
        assert!(in_sync(
            &observed,
            &fields(json!({"enabled": true, "members": ["a", "b"]})),
            &policy
        ));
    }
}
