//! Capability traits and error types
//!
//! Defines the interfaces the tracker depends on: a string-keyed durable
//! store and a source of outcomes. Neither is implemented by the tracker
//! itself.

use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors reported by the daily quota tracker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    /// No uses left for today
    #[error("Daily quota exhausted")]
    QuotaExhausted,

    /// Another use is still being recorded
    #[error("A use is already in progress")]
    AlreadyInProgress,

    /// Durable store could not be read or written
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Stored state could not be decoded
    #[error("Corrupt stored state: {0}")]
    CorruptState(String),
}

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend cannot be reached or refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for QuotaError {
    fn from(err: StorageError) -> Self {
        QuotaError::PersistenceUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for QuotaError {
    fn from(err: serde_json::Error) -> Self {
        QuotaError::CorruptState(err.to_string())
    }
}

// ============================================================================
// Storage Trait
// ============================================================================

/// String-keyed durable key/value store
///
/// Implementations must make a completed `set` visible to later `get`
/// calls, including after a process restart for durable backends.
///
/// Two trackers sharing the same keys through one backend are not
/// coordinated: the last write wins.
#[async_trait]
pub trait QuotaStorage: Send + Sync {
    /// Short name used in log lines
    fn backend_name(&self) -> &'static str;

    /// Read a value, `Ok(None)` if the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Write several values
    ///
    /// The default writes them one after another. Backends that can write
    /// atomically should override this.
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Outcome Source
// ============================================================================

/// Decides what a single use yields
///
/// The tracker only records outcomes. Deciding them belongs to the caller
/// (a UI widget, a backend call), which keeps that logic movable server-side.
pub trait OutcomeSource<O>: Send + Sync {
    fn determine_outcome(&self) -> O;
}

impl<O, F> OutcomeSource<O> for F
where
    F: Fn() -> O + Send + Sync,
{
    fn determine_outcome(&self) -> O {
        self()
    }
}

// ============================================================================
// Tests
// ============================================================================
