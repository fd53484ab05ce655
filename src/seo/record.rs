//! SEO override records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Longest value accepted for any override field.
pub const MAX_FIELD_LEN: usize = 255;

/// Per-URL replacement text for a page's title, H1 and meta description.
///
/// Blank fields leave the page's own content in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoOverride {
    /// Exact request path the override applies to
    pub url: String,
    /// Replacement `<title>` text
    #[serde(default)]
    pub title_tag: String,
    /// Replacement meta description
    #[serde(default)]
    pub meta_description: String,
    /// Replacement text for the first `<h1>`
    #[serde(default)]
    pub page_h1: String,
}

/// Field-level validation failures, keyed by field name.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

impl SeoOverride {
    /// Create an empty override for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the title override.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title_tag = title.into();
        self
    }

    /// Set the H1 override.
    pub fn with_h1(mut self, h1: impl Into<String>) -> Self {
        self.page_h1 = h1.into();
        self
    }

    /// Set the meta description override.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.meta_description = description.into();
        self
    }

    /// Title override, if non-blank.
    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title_tag)
    }

    /// H1 override, if non-blank.
    pub fn h1(&self) -> Option<&str> {
        non_blank(&self.page_h1)
    }

    /// Meta description override, if non-blank.
    pub fn description(&self) -> Option<&str> {
        non_blank(&self.meta_description)
    }

    /// Whether the record would change nothing.
    pub fn is_empty(&self) -> bool {
        self.title().is_none() && self.h1().is_none() && self.description().is_none()
    }

    /// Check the record before it is stored.
    pub fn validate(&self) -> std::result::Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.url.trim().is_empty() {
            push(&mut errors, "url", "This field is required.".to_string());
        } else if !self.url.starts_with('/') {
            push(&mut errors, "url", "Enter a path starting with '/'.".to_string());
        }

        for (field, value) in [
            ("url", &self.url),
            ("title_tag", &self.title_tag),
            ("meta_description", &self.meta_description),
            ("page_h1", &self.page_h1),
        ] {
            let len = value.chars().count();
            if len > MAX_FIELD_LEN {
                push(
                    &mut errors,
                    field,
                    format!(
                        "Ensure this value has at most {} characters (it has {}).",
                        MAX_FIELD_LEN, len
                    ),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn push(errors: &mut FieldErrors, field: &'static str, message: String) {
    errors.entry(field).or_default().push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_blank_fields_are_none() {
        let record = SeoOverride::new("/").with_title("  ").with_h1("Hello");
        assert_eq!(record.title(), None);
        assert_eq!(record.h1(), Some("Hello"));
        assert_eq!(record.description(), None);
        assert!(!record.is_empty());
        assert!(SeoOverride::new("/").is_empty());
    }

    #[test]
    fn test_validate_accepts_reasonable_record() {
        let record = SeoOverride::new("/mx-lookup/")
            .with_title("MX Lookup")
            .with_description("Look up mail exchangers");
        assert_ok!(record.validate());
    }

    #[test]
    fn test_validate_requires_url() {
        let errors = assert_err!(SeoOverride::new("").validate());
        assert_eq!(errors["url"], vec!["This field is required.".to_string()]);

        let errors = SeoOverride::new("mx-lookup").validate().unwrap_err();
        assert!(errors.contains_key("url"));
    }

    #[test]
    fn test_validate_length_limit() {
        let record = SeoOverride::new("/").with_title("x".repeat(MAX_FIELD_LEN + 1));
        let errors = record.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors["title_tag"][0].contains("at most 255"));

        let record = SeoOverride::new("/").with_h1("é".repeat(MAX_FIELD_LEN));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_default_when_deserialized() {
        let record: SeoOverride = serde_json::from_str(r#"{"url": "/who-is/"}"#).unwrap();
        assert_eq!(record, SeoOverride::new("/who-is/"));
    }
}
