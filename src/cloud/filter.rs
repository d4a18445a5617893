//! List filters
//!
//! A [`Filter`] renders the provider's `filter` query parameter for real list
//! calls and evaluates itself against stored objects for mock list calls.
//!
//! The provider rejects filters mixing its comparison syntax with the
//! `eq`/`ne` regular expression syntax, so every filter is rendered in the
//! latter. Literal values are escaped so equality stays literal.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    /// Match everything
    #[default]
    None,
    /// `field eq "value"` with `value` escaped
    Equal(String, String),
    /// `field ne "value"` with `value` escaped
    NotEqual(String, String),
    /// `field eq "pattern"`; the pattern must match the whole value
    Regexp(String, String),
    /// All of the inner filters
    And(Vec<Filter>),
}

impl Filter {
    pub fn equal(field: &str, value: &str) -> Self {
        Filter::Equal(field.to_string(), value.to_string())
    }

    pub fn not_equal(field: &str, value: &str) -> Self {
        Filter::NotEqual(field.to_string(), value.to_string())
    }

    pub fn regexp(field: &str, pattern: &str) -> Self {
        Filter::Regexp(field.to_string(), pattern.to_string())
    }

    /// Combine with another filter.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::None, f) | (f, Filter::None) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            },
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            },
            (f, g) => Filter::And(vec![f, g]),
        }
    }

    /// Provider query string for this filter, `None` when it matches everything.
    pub fn to_query(&self) -> Option<String> {
        match self {
            Filter::None => None,
            Filter::Equal(f, v) => Some(format!("{} eq {}", f, quote(&regex::escape(v)))),
            Filter::NotEqual(f, v) => Some(format!("{} ne {}", f, quote(&regex::escape(v)))),
            Filter::Regexp(f, p) => Some(format!("{} eq {}", f, quote(p))),
            Filter::And(fs) => {
                let parts: Vec<String> = fs
                    .iter()
                    .filter_map(Filter::to_query)
                    .map(|q| format!("({})", q))
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(" "))
                }
            },
        }
    }

    /// Evaluate against an object. Missing fields never match a positive test.
    pub fn matches(&self, obj: &Value) -> bool {
        match self {
            Filter::None => true,
            Filter::Equal(f, v) => field_value(obj, f).as_deref() == Some(v.as_str()),
            Filter::NotEqual(f, v) => field_value(obj, f).as_deref() != Some(v.as_str()),
            Filter::Regexp(f, p) => {
                let Some(value) = field_value(obj, f) else {
                    return false;
                };
                match regex::Regex::new(&format!("^(?:{})$", p)) {
                    Ok(re) => re.is_match(&value),
                    Err(e) => {
                        tracing::warn!("Invalid filter pattern {:?}: {}", p, e);
                        false
                    },
                }
            },
            Filter::And(fs) => fs.iter().all(|f| f.matches(obj)),
        }
    }
}

fn quote(v: &str) -> String {
    format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Scalar at a dot-separated path, rendered as a string
fn field_value(obj: &Value, path: &str) -> Option<String> {
    let mut current = obj;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_query() {
        assert_eq!(Filter::None.to_query(), None);
        assert_eq!(Filter::regexp("name", "a.*").to_query().unwrap(), "name eq \"a.*\"");
        let f = Filter::equal("status", "RUNNING").and(Filter::not_equal("zone", "x"));
        assert_eq!(f.to_query().unwrap(), "(status eq \"RUNNING\") (zone ne \"x\")");
    }

    #[test]
    fn test_to_query_uses_one_syntax() {
        let f = Filter::equal("name", "vm.1")
            .and(Filter::regexp("zone", ".*-b"))
            .and(Filter::not_equal("status", "TERMINATED"));
        let q = f.to_query().unwrap();
        assert_eq!(
            q,
            "(name eq \"vm\\\\.1\") (zone eq \".*-b\") (status ne \"TERMINATED\")"
        );
        assert!(!q.contains(" = ") && !q.contains(" != "), "{q}");
    }

    #[test]
    fn test_matches() {
        let obj = json!({"name": "abc", "status": "RUNNING", "scheduling": {"preemptible": true}});
        assert!(Filter::None.matches(&obj));
        assert!(Filter::regexp("name", "a.*").matches(&obj));
        assert!(!Filter::regexp("name", "b").matches(&obj));
        assert!(Filter::equal("scheduling.preemptible", "true").matches(&obj));
        assert!(Filter::not_equal("status", "STOPPED").matches(&obj));
        assert!(!Filter::equal("missing", "x").matches(&obj));
        assert!(!Filter::regexp("name", "(").matches(&obj));
    }

    #[test]
    fn test_and_flattens() {
        let f = Filter::None.and(Filter::equal("a", "1"));
        assert_eq!(f, Filter::equal("a", "1"));
        let f = f.and(Filter::equal("b", "2")).and(Filter::equal("c", "3"));
        assert!(matches!(f, Filter::And(ref v) if v.len() == 3));
    }
}
