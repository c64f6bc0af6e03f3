//! `${VAR}` / `${VAR:default}` substitution over a parsed YAML tree.
//!
//! Walks every string scalar in the document and resolves references against the
//! process environment. A reference with no default and no matching env var is
//! left unresolved as an empty string, mirroring the common "missing secret becomes
//! blank" behavior of other template-substitution loaders rather than failing load.

use serde_yaml::Value;
use std::env;

/// Finds the next `${...}` reference starting at `from`. Returns `(start, end, inner)`
/// where `end` is one past the closing brace and `inner` is the text between braces.
fn next_reference(s: &str, from: usize) -> Option<(usize, usize, &str)> {
    let bytes = s.as_bytes();
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            if let Some(rel_end) = s[i + 2..].find('}') {
                let end = i + 2 + rel_end + 1;
                return Some((i, end, &s[i + 2..i + 2 + rel_end]));
            }
            return None;
        }
        i += 1;
    }
    None
}

/// Resolves all `${VAR}` / `${VAR:default}` references in one string.
pub fn substitute_str(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    loop {
        match next_reference(rest, 0) {
            Some((start, end, inner)) => {
                out.push_str(&rest[..start]);
                let (name, default) = match inner.split_once(':') {
                    Some((n, d)) => (n, Some(d)),
                    None => (inner, None),
                };
                let resolved = env::var(name).ok().or_else(|| default.map(str::to_string));
                out.push_str(&resolved.unwrap_or_default());
                rest = &rest[end..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

/// Walks a YAML value tree, substituting `${VAR}`/`${VAR:default}` in every string scalar.
pub fn substitute_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            let resolved = substitute_str(s);
            *s = resolved;
        }
        Value::Sequence(seq) => {
            for item in seq.iter_mut() {
                substitute_value(item);
            }
        }
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_existing_env_var() {
        env::set_var("ORBIT_CFG_TEST_A", "hello");
        assert_eq!(substitute_str("${ORBIT_CFG_TEST_A}"), "hello");
        env::remove_var("ORBIT_CFG_TEST_A");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        env::remove_var("ORBIT_CFG_TEST_MISSING");
        assert_eq!(substitute_str("${ORBIT_CFG_TEST_MISSING:fallback}"), "fallback");
    }

    #[test]
    fn env_var_wins_over_default() {
        env::set_var("ORBIT_CFG_TEST_B", "from_env");
        assert_eq!(substitute_str("${ORBIT_CFG_TEST_B:fallback}"), "from_env");
        env::remove_var("ORBIT_CFG_TEST_B");
    }

    #[test]
    fn missing_without_default_becomes_empty() {
        env::remove_var("ORBIT_CFG_TEST_EMPTY");
        assert_eq!(substitute_str("${ORBIT_CFG_TEST_EMPTY}"), "");
    }

    #[test]
    fn multiple_references_in_one_string() {
        env::set_var("ORBIT_CFG_TEST_HOST", "localhost");
        env::set_var("ORBIT_CFG_TEST_PORT", "6379");
        assert_eq!(
            substitute_str("redis://${ORBIT_CFG_TEST_HOST}:${ORBIT_CFG_TEST_PORT}"),
            "redis://localhost:6379"
        );
        env::remove_var("ORBIT_CFG_TEST_HOST");
        env::remove_var("ORBIT_CFG_TEST_PORT");
    }

    #[test]
    fn string_without_reference_is_unchanged() {
        assert_eq!(substitute_str("plain-value"), "plain-value");
    }

    #[test]
    fn substitute_value_walks_nested_mapping() {
        env::set_var("ORBIT_CFG_TEST_NESTED", "nested-value");
        let mut value: Value = serde_yaml::from_str(
            "outer:\n  inner: \"${ORBIT_CFG_TEST_NESTED}\"\n  list:\n    - \"${ORBIT_CFG_TEST_NESTED}\"\n",
        )
        .unwrap();
        substitute_value(&mut value);
        assert_eq!(value["outer"]["inner"].as_str(), Some("nested-value"));
        assert_eq!(value["outer"]["list"][0].as_str(), Some("nested-value"));
        env::remove_var("ORBIT_CFG_TEST_NESTED");
    }
}
