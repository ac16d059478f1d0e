//! Validation of submitted playground forms.
//!
//! Content is checked for presence and size only. The sandbox is the trust
//! boundary, so nothing here tries to sanitize what the script will read.

use playground_engine::Config;
use thiserror::Error;

/// Default ceiling for submitted content, in bytes.
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 4096;

/// Prefix marking a form field as an option override.
pub const OVERRIDE_PREFIX: &str = "config-";

const CONTENT_FIELD: &str = "content";
const GENERATE_FIELD: &str = "generate";
const DOWNLOAD_FIELD: &str = "download";

/// Errors in the submitted content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing or empty content")]
    MissingContent,

    #[error("content too large")]
    ContentTooLarge { limit: usize },
}

/// What the client asked to get back from a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Show the output inline in the page
    Generate,
    /// Return the output as a file
    Download,
    /// Re-render the page without output
    Render,
}

/// A decoded form submission, fields kept in submission order.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    fields: Vec<(String, String)>,
}

impl Submission {
    pub fn from_fields(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// First value submitted for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn content(&self) -> Option<&str> {
        self.first(CONTENT_FIELD)
    }

    /// `generate` wins over `download` when both are present.
    pub fn intent(&self) -> Intent {
        if self.has(GENERATE_FIELD) {
            Intent::Generate
        } else if self.has(DOWNLOAD_FIELD) {
            Intent::Download
        } else {
            Intent::Render
        }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// Check that content is present and within `max_size` bytes.
pub fn validate_content(raw: Option<&str>, max_size: usize) -> Result<String, ValidationError> {
    match raw {
        None | Some("") => Err(ValidationError::MissingContent),
        Some(content) if content.len() > max_size => {
            Err(ValidationError::ContentTooLarge { limit: max_size })
        }
        Some(content) => Ok(content.to_string()),
    }
}

/// Copy `schema`, replacing values named by `config-<name>` fields.
///
/// Keys that don't name a schema option are ignored, so arbitrary fields can
/// never add arguments to the script invocation. The first value submitted for
/// a key wins.
pub fn merge_overrides(schema: &Config, fields: &[(String, String)]) -> Config {
    let mut effective = schema.clone();
    let mut seen: Vec<&str> = Vec::new();

    for (key, value) in fields {
        let Some(name) = key.strip_prefix(OVERRIDE_PREFIX) else {
            continue;
        };
        if seen.contains(&name) {
            continue;
        }
        if effective.set_value(name, value.as_str()) {
            seen.push(name);
        }
    }

    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use playground_engine::parse_usage;

    fn schema() -> Config {
        parse_usage("  --width=\"640\"\n  --color=\"blue\"\n  --font=\"serif\"\n")
    }

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_content() {
        assert_eq!(
            validate_content(None, DEFAULT_MAX_CONTENT_SIZE),
            Err(ValidationError::MissingContent)
        );
        assert_eq!(
            validate_content(Some(""), DEFAULT_MAX_CONTENT_SIZE),
            Err(ValidationError::MissingContent)
        );
    }

    #[test]
    fn test_content_size_boundary() {
        let at_limit = "a".repeat(DEFAULT_MAX_CONTENT_SIZE);
        let over_limit = "a".repeat(DEFAULT_MAX_CONTENT_SIZE + 1);

        assert_eq!(
            validate_content(Some(&at_limit), DEFAULT_MAX_CONTENT_SIZE),
            Ok(at_limit.clone())
        );
        assert_eq!(
            validate_content(Some(&over_limit), DEFAULT_MAX_CONTENT_SIZE),
            Err(ValidationError::ContentTooLarge {
                limit: DEFAULT_MAX_CONTENT_SIZE
            })
        );
    }

    #[test]
    fn test_size_is_measured_in_bytes() {
        // Four bytes per character.
        let content = "🦀".repeat(3);
        assert!(validate_content(Some(&content), 12).is_ok());
        assert!(validate_content(Some(&content), 11).is_err());
    }

    #[test]
    fn test_content_is_returned_unchanged() {
        let raw = "  <script>\n\tstays as is  ";
        assert_eq!(validate_content(Some(raw), 100).unwrap(), raw);
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::MissingContent.to_string(), "missing or empty content");
        assert_eq!(
            ValidationError::ContentTooLarge { limit: 1 }.to_string(),
            "content too large"
        );
    }

    #[test]
    fn test_merge_without_overrides_is_identity() {
        let schema = schema();
        let effective = merge_overrides(&schema, &[]);
        assert_eq!(effective, schema);
        assert_eq!(effective.cmdline_args(), schema.cmdline_args());
    }

    #[test]
    fn test_merge_replaces_only_prefixed_known_names() {
        let schema = schema();
        let submitted = fields(&[
            ("config-color", "red"),
            ("color", "green"),
            ("config-height", "10"),
            ("config-", "x"),
            ("content", "data"),
        ]);

        let effective = merge_overrides(&schema, &submitted);
        assert_eq!(
            effective.cmdline_args(),
            vec!["--width=640", "--color=red", "--font=serif"]
        );
    }

    #[test]
    fn test_merge_never_changes_names_or_order() {
        let schema = schema();
        let submitted = fields(&[
            ("config-font", "mono"),
            ("config-width", "100"),
            ("config-extra", "1"),
        ]);

        let effective = merge_overrides(&schema, &submitted);
        let names: Vec<_> = effective.iter().map(|o| o.name.clone()).collect();
        let original: Vec<_> = schema.iter().map(|o| o.name.clone()).collect();
        assert_eq!(names, original);
        assert_eq!(effective.get("font").unwrap().value, "mono");
        assert_eq!(effective.get("width").unwrap().value, "100");
    }

    #[test]
    fn test_merge_first_value_wins() {
        let submitted = fields(&[("config-width", "1"), ("config-width", "2")]);
        let effective = merge_overrides(&schema(), &submitted);
        assert_eq!(effective.get("width").unwrap().value, "1");
    }

    #[test]
    fn test_merge_accepts_empty_override() {
        let submitted = fields(&[("config-color", "")]);
        let effective = merge_overrides(&schema(), &submitted);
        assert_eq!(effective.get("color").unwrap().value, "");
    }

    #[test]
    fn test_submission_intent() {
        let s = Submission::from_fields(fields(&[("content", "x"), ("generate", "")]));
        assert_eq!(s.intent(), Intent::Generate);

        let s = Submission::from_fields(fields(&[("download", ""), ("content", "x")]));
        assert_eq!(s.intent(), Intent::Download);

        let s = Submission::from_fields(fields(&[("download", ""), ("generate", "1")]));
        assert_eq!(s.intent(), Intent::Generate);

        let s = Submission::from_fields(fields(&[("content", "x")]));
        assert_eq!(s.intent(), Intent::Render);
    }

    #[test]
    fn test_submission_first_content_wins() {
        let s = Submission::from_fields(fields(&[("content", "a"), ("content", "b")]));
        assert_eq!(s.content(), Some("a"));
        assert_eq!(Submission::default().content(), None);
    }
}
