use std::sync::Arc;

use tracing::warn;

use super::store::AffinityStore;

/// Scoped ownership of a temporary merge key.
///
/// [`TempMergeKey::release`] deletes the key on the normal and error paths. If the
/// owning future is dropped first (cancellation), `Drop` schedules the delete on the
/// current tokio runtime instead; that delete is best effort.
pub(crate) struct TempMergeKey {
    store: Arc<dyn AffinityStore>,
    name: String,
    armed: bool,
}

impl TempMergeKey {
    pub(crate) fn new(store: Arc<dyn AffinityStore>, name: String) -> Self {
        Self { store, name, armed: true }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn release(mut self) {
        self.armed = false;
        if let Err(error) = self.store.delete_key(&self.name).await {
            warn!(
                event_name = "recommender.temp_key.cleanup_failed",
                temp_key = %self.name,
                error = %error,
                "temporary merge key could not be deleted"
            );
        }
    }
}

impl Drop for TempMergeKey {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let name = std::mem::take(&mut self.name);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                event_name = "recommender.temp_key.leaked",
                temp_key = %name,
                "no runtime available to delete abandoned temporary merge key"
            );
            return;
        };

        let store = Arc::clone(&self.store);
        runtime.spawn(async move {
            if let Err(error) = store.delete_key(&name).await {
                warn!(
                    event_name = "recommender.temp_key.cleanup_failed",
                    temp_key = %name,
                    error = %error,
                    "abandoned temporary merge key could not be deleted"
                );
            }
        });
    }
}
