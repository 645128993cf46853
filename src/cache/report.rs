//! Failure reporting.
//!
//! Reporters observe failures; they never change what the caller gets back.

use tracing::{error, warn};

use crate::cache::key::EntityKey;
use crate::conversation::{DispatchError, Update};
use crate::store::StoreError;

pub trait FailureReporter: Send + Sync {
    /// A dictionary write was not accepted by the store.
    fn write_failed(&self, key: &EntityKey, err: &StoreError);

    /// A dictionary read failed before a mutation could run.
    fn read_failed(&self, key: &EntityKey, err: &StoreError);

    /// A bulk delete or full clear failed. `keys` is empty for a clear.
    fn clear_failed(&self, keys: &[EntityKey], err: &StoreError);

    /// Handling `update` for `chat_id` failed.
    fn dispatch_failed(&self, chat_id: i64, update: &Update, err: &DispatchError);
}

/// Emits every failure as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn write_failed(&self, key: &EntityKey, err: &StoreError) {
        error!(key = %key, error = %err, "Cache write failed");
    }

    fn read_failed(&self, key: &EntityKey, err: &StoreError) {
        error!(key = %key, error = %err, "Cache read failed");
    }

    fn clear_failed(&self, keys: &[EntityKey], err: &StoreError) {
        if keys.is_empty() {
            error!(error = %err, "Cache clear failed");
        } else {
            let keys: Vec<&str> = keys.iter().map(EntityKey::as_str).collect();
            error!(keys = ?keys, error = %err, "Cache delete failed");
        }
    }

    fn dispatch_failed(&self, chat_id: i64, update: &Update, err: &DispatchError) {
        match err {
            DispatchError::Fetch(_) => warn!(
                chat_id,
                update_id = update.update_id,
                error = %err,
                "Could not load conversation state"
            ),
            _ => error!(
                chat_id,
                update_id = update.update_id,
                error = %err,
                "Conversation handler failed, clearing state"
            ),
        }
    }
}
