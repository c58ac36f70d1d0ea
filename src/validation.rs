//! Request-body helpers shared by the resource handlers.

use serde::{Deserialize, Deserializer};
use validator::ValidationError;

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed text, with blank treated as unset.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Apply a nullable patch: absent keeps `target`, null or blank clears it.
pub fn patch(target: &mut Option<String>, value: Option<Option<String>>) {
    if let Some(value) = value {
        *target = clean(value);
    }
}

/// `#rgb` or `#rrggbb`.
pub fn hex_color(value: &str) -> Result<(), ValidationError> {
    let digits = value.strip_prefix('#').unwrap_or("");
    if matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color").with_message("must be a hex color such as #1c1917.".into()))
    }
}

pub fn json_object(value: &serde_json::Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("object").with_message("must be an object.".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "nullable")]
        bio: Option<Option<String>>,
    }

    #[test]
    fn nullable_distinguishes_missing_from_null() {
        let missing: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.bio, None);
        let null: Body = serde_json::from_str(r#"{"bio":null}"#).unwrap();
        assert_eq!(null.bio, Some(None));
        let set: Body = serde_json::from_str(r#"{"bio":"hi"}"#).unwrap();
        assert_eq!(set.bio, Some(Some("hi".to_string())));
    }

    #[test]
    fn patch_keeps_clears_and_sets() {
        let mut value = Some("old".to_string());
        patch(&mut value, None);
        assert_eq!(value.as_deref(), Some("old"));
        patch(&mut value, Some(Some("  new ".into())));
        assert_eq!(value.as_deref(), Some("new"));
        patch(&mut value, Some(Some("   ".into())));
        assert_eq!(value, None);
    }

    #[test]
    fn hex_colors() {
        assert!(hex_color("#fff").is_ok());
        assert!(hex_color("#1C1917").is_ok());
        assert!(hex_color("1c1917").is_err());
        assert!(hex_color("#12345").is_err());
        assert!(hex_color("#gggggg").is_err());
    }
}
