//! Test doubles for the storage pipeline.
//!
//! Mirrors the collaborator traits with in-memory implementations that
//! record every call, so orchestrator tests can assert on call counts and
//! arguments without a storage backend or database.

mod mock;

pub use mock::{MockMetadataStore, MockObjectStore, RecordedCall, StubResizer};
