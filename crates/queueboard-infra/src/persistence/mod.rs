//! Persistence implementations
//!
//! This module provides key-value-store backed implementations of the
//! domain traits.

mod stored_session;

pub use stored_session::StoredSession;
