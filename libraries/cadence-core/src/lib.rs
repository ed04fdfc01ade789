//! Cadence Core
//!
//! Domain types, collaborator traits and error handling shared by the
//! Cadence playback engine and its host applications.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`
//! - **Collaborator Traits**: `TrackRepository`, `KeyValueStore`, `SnapshotStore`
//! - **Stores**: memory and file backed implementations of the traits
//! - **Error Handling**: unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{Library, Track, TrackId, TrackRepository};
//!
//! let library = Library::from_tracks([
//!     Track::new(TrackId::new(1), "Intro", "/music/01.flac").with_duration_ms(90_000),
//!     Track::new(TrackId::new(2), "Outro", "/music/02.flac").with_duration_ms(120_000),
//! ]);
//!
//! let resolved = library
//!     .resolve_tracks_by_ids(&[TrackId::new(2), TrackId::new(1), TrackId::new(2)])
//!     .unwrap();
//! assert_eq!(resolved.len(), 3);
//! assert_eq!(resolved[0].title, "Outro");
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod library;
pub mod storage;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
pub use library::Library;
pub use storage::{FileSnapshotStore, FileStore, MemorySnapshotStore, MemoryStore};
pub use traits::{KeyValueStore, SnapshotStore, TrackRepository};
pub use types::{Track, TrackId};
