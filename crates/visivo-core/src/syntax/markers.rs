use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn column_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"column\(\s*([^()]+?)\s*\)").expect("column marker regex should compile")
    })
}

fn query_open_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\bquery\(").expect("query marker regex should compile"))
}

fn whole_column_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\s*column\(\s*([^()]+?)\s*\)\s*$")
            .expect("whole column marker regex should compile")
    })
}

/// Every identifier named by a `column(...)` marker in `text`, in order.
#[must_use]
pub fn column_references(text: &str) -> Vec<&str> {
    column_regex()
        .captures_iter(text)
        .filter_map(|captures| captures.get(1).map(|name| name.as_str()))
        .collect()
}

/// Identifiers named by `column(...)` markers in any string leaf of `value`.
#[must_use]
pub fn column_references_in_value(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    visit_strings(value, &mut |text| {
        names.extend(column_references(text).into_iter().map(ToString::to_string));
    });
    names
}

/// The raw SQL inside `query(...)` when the whole string is one marker.
/// `query(a) AND query(b)` is two markers, not one.
#[must_use]
pub fn unwrap_query(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("query(")?.strip_suffix(')')?;
    (closing_paren(inner) == Some(inner.len())).then(|| inner.trim())
}

/// Replaces every balanced `query(...)` marker in `text` with the SQL it
/// wraps. An unclosed marker and everything after it is kept verbatim.
#[must_use]
pub fn expand_query_markers(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = query_open_regex().find(rest) {
        let inner = &rest[open.end()..];
        let Some(close) = closing_paren(inner).filter(|close| *close < inner.len()) else {
            break;
        };
        output.push_str(&rest[..open.start()]);
        output.push_str(inner[..close].trim());
        rest = &inner[close + 1..];
    }

    output.push_str(rest);
    output
}

/// Byte offset of the `)` that closes an already-open parenthesis, skipping
/// single-quoted literals. `Some(text.len())` means `text` is balanced;
/// `None` means a parenthesis is left open.
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (index, character) in text.char_indices() {
        match character {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return Some(index),
            },
            _ => {}
        }
    }
    (depth == 0 && !quoted).then_some(text.len())
}

/// The identifier when the whole string is a single `column(...)` marker.
#[must_use]
pub fn whole_column(text: &str) -> Option<&str> {
    whole_column_regex()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}

/// Replaces each `column(name)` marker with its declared expression.
///
/// Fails with the first identifier that has no entry in `columns`.
pub fn substitute_columns(text: &str, columns: &BTreeMap<String, String>) -> Result<String, String> {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;

    for captures in column_regex().captures_iter(text) {
        let (Some(marker), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let expression = columns
            .get(name.as_str())
            .ok_or_else(|| name.as_str().to_string())?;
        output.push_str(&text[cursor..marker.start()]);
        output.push_str(expression);
        cursor = marker.end();
    }

    output.push_str(&text[cursor..]);
    Ok(output)
}

fn visit_strings(value: &Value, visit: &mut impl FnMut(&str)) {
    match value {
        Value::String(text) => visit(text),
        Value::Array(values) => values.iter().for_each(|value| visit_strings(value, visit)),
        Value::Object(map) => map.values().for_each(|value| visit_strings(value, visit)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::{
        column_references, column_references_in_value, expand_query_markers, substitute_columns,
        unwrap_query, whole_column,
    };

    fn columns() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("rev".to_string(), "sum(revenue)".to_string()),
            ("week".to_string(), "date_trunc('week', created_at)".to_string()),
        ])
    }

    #[test]
    fn finds_every_column_marker() {
        assert_eq!(
            column_references("column(rev) / column( week )"),
            vec!["rev", "week"]
        );
        assert_eq!(column_references("column(z)[1:3]"), vec!["z"]);
        assert!(column_references("query(count(*))").is_empty());
    }

    #[test]
    fn walks_nested_prop_values() {
        let props = json!({
            "x": "column(week)",
            "marker": {"color": ["column(rev)", 3]},
            "type": "bar"
        });
        let mut names = column_references_in_value(&props);
        names.sort();
        assert_eq!(names, vec!["rev", "week"]);
    }

    #[test]
    fn unwraps_query_with_nested_parentheses() {
        assert_eq!(
            unwrap_query(r#"query( max_by("Value", "Date") )"#),
            Some(r#"max_by("Value", "Date")"#)
        );
        assert_eq!(unwrap_query("count(*)"), None);
        assert_eq!(unwrap_query("query(label = ')')"), Some("label = ')'"));
    }

    #[test]
    fn adjacent_query_markers_are_not_one_marker() {
        assert_eq!(unwrap_query("query(a > 1) AND query(b < 2)"), None);
        assert_eq!(unwrap_query("query(max(v))"), Some("max(v)"));
        assert_eq!(unwrap_query("query(max(v)"), None);
    }

    #[test]
    fn expands_every_query_marker() {
        assert_eq!(
            expand_query_markers("query(a > 1) AND query( b < 2 )"),
            "a > 1 AND b < 2"
        );
        assert_eq!(expand_query_markers("query(count(*))"), "count(*)");
        assert_eq!(expand_query_markers("subquery(x)"), "subquery(x)");
        assert_eq!(expand_query_markers("query(open"), "query(open");
        assert_eq!(expand_query_markers("plain > 0"), "plain > 0");
    }

    #[test]
    fn whole_column_requires_single_marker() {
        assert_eq!(whole_column("column(rev)"), Some("rev"));
        assert_eq!(whole_column("column(rev)[1]"), None);
    }

    #[test]
    fn substitution_is_idempotent() {
        let once = substitute_columns("column(rev) > 100", &columns()).expect("rev is declared");
        let twice = substitute_columns(&once, &columns()).expect("nothing left to substitute");
        assert_eq!(once, "sum(revenue) > 100");
        assert_eq!(once, twice);
    }

    #[test]
    fn substitution_reports_missing_identifier() {
        let missing = substitute_columns("column(cost) > 0", &columns())
            .expect_err("cost is not declared");
        assert_eq!(missing, "cost");
    }
}
