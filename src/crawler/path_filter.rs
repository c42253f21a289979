//! Pattern matching for excluding repository paths from a crawl
//!
//! Patterns are regular expressions by default. A `glob:` prefix selects glob
//! syntax instead. Both kinds must match the whole repository path, so
//! `/module2` never matches `/module20`.

use crate::error::ValidationError;
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

const GLOB_PREFIX: &str = "glob:";

/// One compiled exclusion pattern
#[derive(Debug, Clone)]
pub enum PathPattern {
    Regex { source: String, regex: Regex },
    Glob { source: String, matcher: GlobMatcher },
}

impl PathPattern {
    /// Compile a pattern string
    pub fn parse(pattern: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        if let Some(glob) = pattern.strip_prefix(GLOB_PREFIX) {
            let matcher = GlobBuilder::new(glob)
                .literal_separator(true)
                .build()
                .map_err(|e| invalid(e.to_string()))?
                .compile_matcher();
            return Ok(PathPattern::Glob {
                source: pattern.to_string(),
                matcher,
            });
        }

        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| invalid(e.to_string()))?;
        Ok(PathPattern::Regex {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written by the user
    pub fn as_str(&self) -> &str {
        match self {
            PathPattern::Regex { source, .. } | PathPattern::Glob { source, .. } => source,
        }
    }

    /// Whether the pattern matches the full path
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            PathPattern::Regex { regex, .. } => regex.is_match(path),
            // Globs are usually written relative, so also try without the leading slash
            PathPattern::Glob { matcher, .. } => {
                matcher.is_match(path) || matcher.is_match(path.trim_start_matches('/'))
            }
        }
    }
}

/// A set of exclusion patterns evaluated as alternatives
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<PathPattern>,
}

impl PathFilter {
    /// Filter that excludes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile every pattern, failing on the first invalid one
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ValidationError> {
        let patterns = patterns
            .iter()
            .map(|pattern| PathPattern::parse(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether any pattern matches the path
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Source strings of the compiled patterns
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(PathPattern::as_str)
    }
}

/// Check a path against pattern strings without keeping a compiled filter
///
/// Invalid patterns are logged and only match a path equal to the pattern text.
pub fn is_excluded(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match PathPattern::parse(pattern) {
        Ok(compiled) => compiled.is_match(path),
        Err(e) => {
            tracing::warn!("{}, falling back to literal match", e);
            path == pattern
        }
    })
}
