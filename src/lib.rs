//! # Revision Crawler - Version-Controlled History as Indexable Documents
//!
//! Walks the revision history of a version-controlled repository and turns every
//! file change into a flat document record ready for a full-text index.
//!
//! ## Overview
//!
//! A crawl covers a revision range under one base path. Revisions are visited in
//! ascending order; each yields the documents of the files it touched, with the
//! file content attached when it is small enough and looks like text. Oversized,
//! binary and unreadable files still produce a document, marked with the reason
//! its content was left out.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │ RevisionCrawler  │────>│ RepositoryOpener │
//! └────────┬─────────┘     └────────┬─────────┘
//!          │                        │ open(location)
//!          │               ┌────────▼─────────┐
//!          │               │ RepositoryAccess │  (git2 / in-memory)
//!          │               └──────────────────┘
//!   ┌──────┴───────┬──────────────┐
//! ┌─▼──────────┐ ┌─▼───────────┐ ┌▼───────────┐
//! │ PathFilter │ │ DocumentBld │ │ CrawlState │
//! └────────────┘ └─────────────┘ └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`crawler`]: Crawl orchestration, parameters, path filtering and documents
//! - [`repository`]: Repository access seam with git and in-memory backends
//! - [`state`]: Persisted progress for resumable crawls
//! - [`config`]: Configuration management with environment variable support
//! - [`error`]: Error types and result aliases
//! - [`paths`]: Platform directories for config and state files
//!
//! ## Usage Example
//!
//! ```no_run
//! use revision_crawler::crawler::{Parameters, RevisionCrawler};
//! use revision_crawler::repository::GitOpener;
//!
//! fn main() -> anyhow::Result<()> {
//!     let crawler = RevisionCrawler::new(GitOpener);
//!     let params = Parameters::builder()
//!         .with_base_path("/src")
//!         .with_maximum_file_size(Some(64 * 1024))
//!         .build()?;
//!
//!     for revision in crawler.crawl(".", &params)? {
//!         for record in revision.records() {
//!             println!("{}", record.to_json()?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Revision crawling and document building
pub mod crawler;

/// Error types and utilities
pub mod error;

/// Platform-specific default paths
pub mod paths;

/// Repository access backends
pub mod repository;

/// Resumable crawl progress
pub mod state;
