//! # Archivist
//!
//! Publishing, permission, dependency and copy-orchestration engine for
//! package archives: a distribution's primary and partner archives plus any
//! number of personal package archives (PPAs) and copy archives.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! archivist = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use archivist::config::EngineConfig;
//! use archivist::engine::ArchiveEngine;
//!
//! let engine = ArchiveEngine::open(EngineConfig::default())?;
//! let archive = engine.get_by_reference("~alice/ubuntu/ppa", None)?;
//! ```
//!
//! Upload checks return expected denials as values:
//!
//! ```rust,ignore
//! match engine.check_upload(&archive, person_id, &series, Some("hello"), None, pocket, false)? {
//!     None => println!("accepted"),
//!     Some(denial) => println!("rejected: {denial}"),
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the administrative CLI module. Disable with
//!   `default-features = false`.

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod membership;
pub mod store;
pub mod types;

pub use engine::ArchiveEngine;
