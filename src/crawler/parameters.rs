use super::path_filter::PathFilter;
use crate::error::{CrawlError, CrawlerError, ValidationError};
use crate::repository::normalize_path;

/// A revision bound: either a fixed number or whatever is newest at crawl time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevisionSpec {
    #[default]
    Latest,
    Number(u64),
}

impl From<u64> for RevisionSpec {
    fn from(revision: u64) -> Self {
        RevisionSpec::Number(revision)
    }
}

impl From<Option<u64>> for RevisionSpec {
    fn from(revision: Option<u64>) -> Self {
        revision.map_or(RevisionSpec::Latest, RevisionSpec::Number)
    }
}

/// Immutable settings for one crawl invocation
///
/// Built through [`ParametersBuilder`], which validates everything up front.
#[derive(Debug, Clone)]
pub struct Parameters {
    base_path: String,
    start_revision: u64,
    end_revision: RevisionSpec,
    maximum_file_size: Option<u64>,
    filter: PathFilter,
    fetch_workers: usize,
    detect_binary: bool,
}

impl Parameters {
    pub fn builder() -> ParametersBuilder {
        ParametersBuilder::default()
    }

    /// Normalized path the crawl is scoped to
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn start_revision(&self) -> u64 {
        self.start_revision
    }

    pub fn end_revision(&self) -> RevisionSpec {
        self.end_revision
    }

    /// Largest file whose content is fetched; `None` means unbounded
    pub fn maximum_file_size(&self) -> Option<u64> {
        self.maximum_file_size
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn fetch_workers(&self) -> usize {
        self.fetch_workers
    }

    pub fn detect_binary(&self) -> bool {
        self.detect_binary
    }

    /// Same settings with a different start revision, used to resume a crawl
    pub fn starting_at(&self, start_revision: u64) -> Result<Self, CrawlerError> {
        check_range(start_revision, self.end_revision)?;
        Ok(Self {
            start_revision,
            ..self.clone()
        })
    }

    /// Same settings with a fixed end revision
    pub fn ending_at(&self, end_revision: u64) -> Result<Self, CrawlerError> {
        let end_revision = RevisionSpec::Number(end_revision);
        check_range(self.start_revision, end_revision)?;
        Ok(Self {
            end_revision,
            ..self.clone()
        })
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            base_path: "/".to_string(),
            start_revision: 1,
            end_revision: RevisionSpec::Latest,
            maximum_file_size: None,
            filter: PathFilter::empty(),
            fetch_workers: 1,
            detect_binary: true,
        }
    }
}

fn check_range(start: u64, end: RevisionSpec) -> Result<(), CrawlError> {
    match end {
        RevisionSpec::Number(end) if start > end => Err(CrawlError::InvalidRange { start, end }),
        _ => Ok(()),
    }
}

/// Builder for [`Parameters`]
#[derive(Debug, Clone)]
pub struct ParametersBuilder {
    base_path: String,
    start_revision: u64,
    end_revision: RevisionSpec,
    maximum_file_size: Option<u64>,
    exclude_patterns: Vec<String>,
    fetch_workers: usize,
    detect_binary: bool,
}

impl Default for ParametersBuilder {
    fn default() -> Self {
        Self {
            base_path: "/".to_string(),
            start_revision: 1,
            end_revision: RevisionSpec::Latest,
            maximum_file_size: None,
            exclude_patterns: Vec::new(),
            fetch_workers: 1,
            detect_binary: true,
        }
    }
}

impl ParametersBuilder {
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_start_revision(mut self, start_revision: u64) -> Self {
        self.start_revision = start_revision;
        self
    }

    pub fn with_end_revision(mut self, end_revision: u64) -> Self {
        self.end_revision = RevisionSpec::Number(end_revision);
        self
    }

    /// Set the end bound, `RevisionSpec::Latest` resolving to the head at crawl time
    pub fn with_end_revision_spec(mut self, end_revision: RevisionSpec) -> Self {
        self.end_revision = end_revision;
        self
    }

    pub fn with_maximum_file_size(mut self, maximum_file_size: Option<u64>) -> Self {
        self.maximum_file_size = maximum_file_size;
        self
    }

    pub fn with_exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    pub fn with_exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_fetch_workers(mut self, fetch_workers: usize) -> Self {
        self.fetch_workers = fetch_workers;
        self
    }

    pub fn with_binary_detection(mut self, detect_binary: bool) -> Self {
        self.detect_binary = detect_binary;
        self
    }

    /// Validate and freeze the parameters
    pub fn build(self) -> Result<Parameters, CrawlerError> {
        check_range(self.start_revision, self.end_revision)?;

        if self.fetch_workers == 0 {
            return Err(ValidationError::ConstraintViolation {
                field: "fetch_workers".to_string(),
                constraint: "at least 1".to_string(),
                actual: "0".to_string(),
            }
            .into());
        }

        let filter = PathFilter::new(self.exclude_patterns.as_slice())?;

        Ok(Parameters {
            base_path: normalize_path(&self.base_path),
            start_revision: self.start_revision,
            end_revision: self.end_revision,
            maximum_file_size: self.maximum_file_size,
            filter,
            fetch_workers: self.fetch_workers,
            detect_binary: self.detect_binary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Parameters::builder().build().unwrap();
        assert_eq!(params.base_path(), "/");
        assert_eq!(params.start_revision(), 1);
        assert_eq!(params.end_revision(), RevisionSpec::Latest);
        assert_eq!(params.maximum_file_size(), None);
        assert!(params.filter().is_empty());
        assert_eq!(params.fetch_workers(), 1);
        assert!(params.detect_binary());
    }

    #[test]
    fn test_default_matches_empty_builder() {
        let built = Parameters::builder().build().unwrap();
        let default = Parameters::default();
        assert_eq!(built.base_path(), default.base_path());
        assert_eq!(built.start_revision(), default.start_revision());
        assert_eq!(built.end_revision(), default.end_revision());
    }

    #[test]
    fn test_base_path_normalized() {
        let params = Parameters::builder()
            .with_base_path("module2/trunk/")
            .build()
            .unwrap();
        assert_eq!(params.base_path(), "/module2/trunk");
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = Parameters::builder()
            .with_start_revision(5)
            .with_end_revision(3)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CrawlerError::Crawl(CrawlError::InvalidRange { start: 5, end: 3 })
        ));
    }

    #[test]
    fn test_single_revision_range_allowed() {
        let params = Parameters::builder()
            .with_start_revision(4)
            .with_end_revision(4)
            .build()
            .unwrap();
        assert_eq!(params.end_revision(), RevisionSpec::Number(4));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Parameters::builder()
            .with_fetch_workers(0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CrawlerError::Validation(ValidationError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern_rejected_at_build() {
        let err = Parameters::builder()
            .with_exclude_pattern("[")
            .build()
            .unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_exclude_patterns_accumulate() {
        let params = Parameters::builder()
            .with_exclude_pattern("/a.*")
            .with_exclude_patterns(["/b.*", "glob:**/*.png"])
            .build()
            .unwrap();
        assert_eq!(params.filter().len(), 3);
    }

    #[test]
    fn test_starting_at_keeps_other_settings() {
        let params = Parameters::builder()
            .with_base_path("/module1")
            .with_maximum_file_size(Some(80))
            .build()
            .unwrap();
        let resumed = params.starting_at(6).unwrap();
        assert_eq!(resumed.start_revision(), 6);
        assert_eq!(resumed.base_path(), "/module1");
        assert_eq!(resumed.maximum_file_size(), Some(80));
    }

    #[test]
    fn test_starting_at_checks_range() {
        let params = Parameters::builder().with_end_revision(3).build().unwrap();
        assert!(params.starting_at(4).is_err());
    }

    #[test]
    fn test_ending_at_pins_latest() {
        let params = Parameters::default().starting_at(3).unwrap();
        let pinned = params.ending_at(5).unwrap();
        assert_eq!(pinned.start_revision(), 3);
        assert_eq!(pinned.end_revision(), RevisionSpec::Number(5));
        assert!(params.ending_at(2).is_err());
    }

    #[test]
    fn test_end_revision_spec() {
        let params = Parameters::builder()
            .with_end_revision(2)
            .with_end_revision_spec(RevisionSpec::Latest)
            .build()
            .unwrap();
        assert_eq!(params.end_revision(), RevisionSpec::Latest);
    }

    #[test]
    fn test_revision_spec_from_option() {
        assert_eq!(RevisionSpec::from(None), RevisionSpec::Latest);
        assert_eq!(RevisionSpec::from(Some(7)), RevisionSpec::Number(7));
    }
}
