//! Backend-agnostic persistence trait.
//!
//! The onboarding service persists tiny JSON records (the session record,
//! operator settings) in a key-value `settings` table. The trait keeps the
//! flow layer testable against an in-memory backend.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// Async key-value settings store, keyed by `(user_id, key)`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Read a setting, `None` if absent.
    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Write (upsert) a setting.
    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Delete a setting. Deleting an absent key is not an error.
    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<(), DatabaseError>;
}
