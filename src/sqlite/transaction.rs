//! Scoped write transactions.
//!
//! Every mutating statement in the crate runs through [`write_transaction`]:
//! the unit of work either commits as a whole or is rolled back before its
//! error reaches the caller.

use crate::error::{Result, StoreError};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::warn;

/// Run `work` inside a transaction on `conn`.
///
/// Commits when `work` succeeds. Otherwise rolls back and returns the error
/// from `work`, with statement failures tagged as [`StoreError::Transaction`].
/// A failing rollback is logged and never replaces the original error.
pub fn write_transaction<T, F>(conn: &mut Connection, work: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::Transaction)?;

    match work(&tx) {
        Ok(value) => {
            tx.commit().map_err(StoreError::Transaction)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e.into_transaction())
        }
    }
}
