//! Allow-list of path extensions eligible for write-through caching.

use haven_core::Error;
use regex::Regex;
use url::Url;

/// Default cacheable set: stylesheets, scripts, images, fonts.
pub const DEFAULT_EXTENSIONS: &[&str] = &["css", "js", "png", "jpg", "jpeg", "gif", "svg", "woff", "woff2", "ttf"];

/// Case-insensitive matcher for the final extension of a URL path.
#[derive(Debug, Clone)]
pub struct CacheableExtensions {
    pattern: Regex,
}

impl CacheableExtensions {
    /// Build a matcher for `extensions` (with or without a leading dot).
    pub fn new<I, S>(extensions: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = extensions
            .into_iter()
            .map(|ext| regex::escape(ext.as_ref().trim().trim_start_matches('.')))
            .filter(|ext| !ext.is_empty())
            .collect();

        if alternatives.is_empty() {
            return Err(Error::InvalidInput("no cacheable extensions configured".into()));
        }

        let pattern = Regex::new(&format!(r"(?i)\.(?:{})$", alternatives.join("|")))
            .map_err(|e| Error::InvalidInput(format!("cacheable extensions: {e}")))?;

        Ok(Self { pattern })
    }

    /// Whether the path of `url` ends in an allowed extension.
    ///
    /// Only the path is considered; query and fragment are ignored.
    pub fn matches(&self, url: &Url) -> bool {
        self.pattern.is_match(url.path())
    }
}

impl Default for CacheableExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS).expect("default extensions form a valid pattern")
    }
}
