//! Core types for cfsnap.
//!
//! This crate defines the CatalogFS record format (encode/decode), the
//! field-selection policy for a snapshot run, and the error taxonomy shared
//! by the indexing engine and the CLI.

pub mod codec;
mod error;
mod policy;
mod record;

pub use codec::{CURRENT_VERSION, MAX_RECORD_SIZE, RecordError, decode, decode_bytes, encode};
pub use error::{EntryWarning, SnapshotError, WarningKind};
pub use policy::{SnapshotPolicy, SnapshotPolicyBuilder};
pub use record::{CaptureMode, FileRecord};
