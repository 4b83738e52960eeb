//! Tolerant field decoders.
//!
//! Both the language model and the search backend produce loosely typed
//! JSON: years arrive as `1990`, `1990.0` or `"1990"`, genre lists arrive as
//! arrays, bare strings or Python list literals (`"['Drama', 'Crime']"`),
//! and the backend scrubs NaN to `null`. These helpers are used through
//! `#[serde(default, deserialize_with = "...")]` so that one odd field
//! never sinks a whole record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Any scalar as a string; `null` or missing becomes empty.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.unwrap_or_default())
}

/// Any scalar as an optional string.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// A number or numeric string; anything else is treated as absent.
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

/// Integral variant of [`opt_number`] used for years and durations.
pub fn opt_integer<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_number(deserializer)?.map(|v| v.trunc() as i32))
}

/// A list of strings from an array, a single string or a list literal.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => parse_list_literal(&s),
        Some(other) => vec![other.to_string()],
    })
}

/// A nested object, falling back to its default on `null`.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn number_from_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Split `"['Drama', \"Crime\"]"` or `"Drama, Crime"` into its items.
pub fn parse_list_literal(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    inner
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct Probe {
        #[serde(default, deserialize_with = "opt_integer")]
        year: Option<i32>,
        #[serde(default, deserialize_with = "opt_number")]
        rating: Option<f64>,
        #[serde(default, deserialize_with = "string_list")]
        genres: Vec<String>,
        #[serde(default, deserialize_with = "string")]
        text: String,
    }

    fn probe(json: &str) -> Probe {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_numbers_accept_strings_and_floats() {
        let p = probe(r#"{"year": "1994", "rating": 8}"#);
        assert_eq!(p.year, Some(1994));
        assert_eq!(p.rating, Some(8.0));

        let p = probe(r#"{"year": 1999.0, "rating": "not a number"}"#);
        assert_eq!(p.year, Some(1999));
        assert_eq!(p.rating, None);
    }

    #[test]
    fn test_nulls_and_missing_fields() {
        let p = probe(r#"{"year": null, "genres": null, "text": null}"#);
        assert_eq!(p.year, None);
        assert!(p.genres.is_empty());
        assert_eq!(p.text, "");

        let p = probe("{}");
        assert_eq!(p.rating, None);
        assert!(p.genres.is_empty());
    }

    #[test]
    fn test_list_shapes() {
        let p = probe(r#"{"genres": ["Drama", " Crime ", ""]}"#);
        assert_eq!(p.genres, vec!["Drama", "Crime"]);

        let p = probe(r#"{"genres": "['Drama', \"Crime\"]"}"#);
        assert_eq!(p.genres, vec!["Drama", "Crime"]);

        let p = probe(r#"{"genres": "Comedy"}"#);
        assert_eq!(p.genres, vec!["Comedy"]);

        assert!(parse_list_literal("[]").is_empty());
    }
}
