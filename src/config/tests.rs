use super::*;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.repository.location, ".");
    assert_eq!(config.crawl.base_path, "/");
    assert_eq!(config.crawl.start_revision, 1);
    assert_eq!(config.crawl.end_revision, None);
    assert_eq!(config.crawl.maximum_file_size, None);
    assert!(config.crawl.exclude_patterns.is_empty());
    assert_eq!(config.crawl.fetch_workers, 1);
    assert!(config.crawl.detect_binary);
    assert!(!config.state.resume);
}

#[test]
fn test_validate_valid_config() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_validate_empty_location() {
    let mut config = Config::default();
    config.repository.location = "  ".to_string();
    assert!(matches!(
        config.validate().unwrap_err(),
        CrawlerError::Config(ConfigError::MissingRequired(_))
    ));
}

#[test]
fn test_validate_zero_workers() {
    let mut config = Config::default();
    config.crawl.fetch_workers = 0;
    let err = config.validate().unwrap_err();
    assert!(err.is_user_error());
    assert!(err.to_string().contains("crawl.fetch_workers"));
}

#[test]
fn test_validate_zero_max_file_size() {
    let mut config = Config::default();
    config.crawl.maximum_file_size = Some(0);
    assert!(config.validate().is_err());

    config.crawl.maximum_file_size = None;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_inverted_range() {
    let mut config = Config::default();
    config.crawl.start_revision = 6;
    config.crawl.end_revision = Some(5);
    assert!(config.validate().is_err());

    config.crawl.end_revision = Some(6);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_invalid_pattern() {
    let mut config = Config::default();
    config.crawl.exclude_patterns = vec!["(broken".to_string()];
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("crawl.exclude_patterns"));
}

#[test]
fn test_save_and_load() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let mut config = Config::default();
    config.repository.location = "/srv/repos/project".to_string();
    config.crawl.end_revision = Some(42);
    config.crawl.exclude_patterns = vec!["/module2.*".to_string()];

    config.save(path).unwrap();
    let loaded = Config::from_file(path).unwrap();

    assert_eq!(loaded.repository.location, "/srv/repos/project");
    assert_eq!(loaded.crawl.end_revision, Some(42));
    assert_eq!(loaded.crawl.exclude_patterns, vec!["/module2.*"]);
}

#[test]
fn test_load_nonexistent_file() {
    let result = Config::from_file(Path::new("/nonexistent/revision-crawler.toml"));
    assert!(matches!(
        result.unwrap_err(),
        CrawlerError::Config(ConfigError::FileNotFound(_))
    ));
}

#[test]
fn test_from_file_invalid_toml() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[crawl\nbase_path = ").unwrap();
    assert!(matches!(
        Config::from_file(temp_file.path()).unwrap_err(),
        CrawlerError::Config(ConfigError::ParseFailed(_))
    ));
}

#[test]
fn test_from_file_partial_config() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(
        temp_file.path(),
        "[crawl]\nbase_path = \"/module1\"\nfetch_workers = 3\n",
    )
    .unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.crawl.base_path, "/module1");
    assert_eq!(config.crawl.fetch_workers, 3);
    assert_eq!(config.crawl.start_revision, 1);
    assert_eq!(config.repository.location, ".");
}

#[test]
fn test_from_file_validates_loaded_config() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[crawl]\nfetch_workers = 0\n").unwrap();
    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_save_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/config.toml");
    Config::default().save(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_apply_env_overrides() {
    // Safety: only this test touches these variables
    unsafe {
        std::env::set_var("REVISION_CRAWLER_LOCATION", "/tmp/other-repo");
        std::env::set_var("REVISION_CRAWLER_BASE_PATH", "/module2");
        std::env::set_var("REVISION_CRAWLER_MAX_FILE_SIZE", "80");
        std::env::set_var("REVISION_CRAWLER_WORKERS", "not-a-number");
    }

    let mut config = Config::default();
    config.apply_env_overrides();

    assert_eq!(config.repository.location, "/tmp/other-repo");
    assert_eq!(config.crawl.base_path, "/module2");
    assert_eq!(config.crawl.maximum_file_size, Some(80));
    assert_eq!(config.crawl.fetch_workers, 1);

    // Safety: cleaning up the variables set above
    unsafe {
        std::env::remove_var("REVISION_CRAWLER_LOCATION");
        std::env::remove_var("REVISION_CRAWLER_BASE_PATH");
        std::env::remove_var("REVISION_CRAWLER_MAX_FILE_SIZE");
        std::env::remove_var("REVISION_CRAWLER_WORKERS");
    }
}

#[test]
fn test_to_parameters() {
    let mut config = Config::default();
    config.crawl.base_path = "module1/".to_string();
    config.crawl.start_revision = 2;
    config.crawl.end_revision = Some(7);
    config.crawl.maximum_file_size = Some(80);
    config.crawl.exclude_patterns = vec!["/module2.*".to_string()];
    config.crawl.fetch_workers = 2;

    let params = config.to_parameters().unwrap();
    assert_eq!(params.base_path(), "/module1");
    assert_eq!(params.start_revision(), 2);
    assert_eq!(params.end_revision(), RevisionSpec::Number(7));
    assert_eq!(params.maximum_file_size(), Some(80));
    assert!(params.filter().is_excluded("/module2/trunk/playlist.txt"));
    assert_eq!(params.fetch_workers(), 2);
}

#[test]
fn test_to_parameters_defaults_to_latest() {
    let params = Config::default().to_parameters().unwrap();
    assert_eq!(params.end_revision(), RevisionSpec::Latest);
}

#[test]
fn test_size_limit_unbounded_by_default() {
    let params = Config::default().to_parameters().unwrap();
    assert_eq!(params.maximum_file_size(), None);
}

#[test]
fn test_size_limit_unbounded_when_omitted_from_file() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "[crawl]\nbase_path = \"/module1\"\n").unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.crawl.maximum_file_size, None);

    std::fs::write(temp_file.path(), "[crawl]\nmaximum_file_size = 4096\n").unwrap();
    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.crawl.maximum_file_size, Some(4096));
}
