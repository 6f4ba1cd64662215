//! Content stream management for the content graph.
//!
//! A content stream is a branchable, versioned timeline of content changes.
//! Streams may be forked from another stream, carry a version counter that
//! advances exactly once per applied event, and are marked removed when
//! discarded. Callers serialize writes per stream through
//! [`ContentStreamStore::compare_and_increment`]; there is no implicit
//! locking and no built-in retry.
//!
//! # Modules
//!
//! - [`error`]: [`StreamError`] and [`StreamResult`]
//! - [`types`]: [`ContentStream`] rows and [`ContentStreamState`]
//! - [`traits`]: the [`ContentStreamStore`] storage interface
//! - [`memory`]: [`InMemoryContentStreamStore`]

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{StreamError, StreamResult};
pub use memory::InMemoryContentStreamStore;
pub use traits::ContentStreamStore;
pub use types::{ContentStream, ContentStreamState};
