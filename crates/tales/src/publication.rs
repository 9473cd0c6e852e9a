use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of an in-flight publication. The wallet sits between
/// `TxPrepared` and `TxRecorded`, so a flow can stay parked there for
/// as long as the user keeps the signing dialog open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationState {
    Drafted,
    BlobUploaded,
    TxPrepared,
    TxRecorded,
}

/// Fields gathered during the prepare step, persisted to the database
/// only once the signed transaction is recorded.
#[derive(Debug, Clone)]
pub struct PreparedPublication {
    pub id: String,
    pub state: PublicationState,
    pub author_id: String,
    pub title: String,
    pub description: String,
    pub content_blob_id: Option<String>,
    pub cover_image_url: String,
    pub cover_image_blob_id: Option<String>,
    pub tags: Vec<String>,
    pub word_count: i32,
    pub reading_time: i32,
    created: Instant,
}

/// Transient store of prepared publication flows.
///
/// Entries are reaped after `ttl` on every access, which makes
/// abandoned flows (and their orphaned content blobs) observable in
/// the logs instead of leaking silently.
pub struct PendingPublications {
    entries: Mutex<HashMap<String, PreparedPublication>>,
    ttl: Duration,
}

pub const DEFAULT_PUBLICATION_TTL: Duration = Duration::from_secs(15 * 60);

impl PendingPublications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn reap_expired(&self, entries: &mut HashMap<String, PreparedPublication>) {
        let ttl = self.ttl;
        let now = Instant::now();
        entries.retain(|id, entry| {
            let alive = now.duration_since(entry.created) < ttl;
            if !alive {
                warn!(
                    "Reaping abandoned publication flow {} in state {:?}{}",
                    id,
                    entry.state,
                    entry
                        .content_blob_id
                        .as_ref()
                        .map(|b| format!(" (orphaned blob {})", b))
                        .unwrap_or_default()
                );
            }
            alive
        });
    }

    /// Open a new flow in `Drafted` state, returning its id
    #[allow(clippy::too_many_arguments)]
    pub fn draft(
        &self,
        author_id: String,
        title: String,
        description: String,
        cover_image_url: String,
        cover_image_blob_id: Option<String>,
        tags: Vec<String>,
        word_count: i32,
        reading_time: i32,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = PreparedPublication {
            id: id.clone(),
            state: PublicationState::Drafted,
            author_id,
            title,
            description,
            content_blob_id: None,
            cover_image_url,
            cover_image_blob_id,
            tags,
            word_count,
            reading_time,
            created: Instant::now(),
        };

        let mut entries = self.entries.lock();
        self.reap_expired(&mut entries);
        entries.insert(id.clone(), entry);
        debug!("Drafted publication flow {}", id);
        id
    }

    /// Advance a flow to `BlobUploaded` once Walrus returns a blob id
    pub fn mark_blob_uploaded(&self, id: &str, content_blob_id: String) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(id) {
            Some(entry) => {
                entry.content_blob_id = Some(content_blob_id);
                entry.state = PublicationState::BlobUploaded;
                true
            }
            None => false,
        }
    }

    /// Advance a flow to `TxPrepared` once the unsigned transaction is built
    pub fn mark_tx_prepared(&self, id: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(id) {
            Some(entry) => {
                entry.state = PublicationState::TxPrepared;
                true
            }
            None => false,
        }
    }

    /// Remove and return a flow for recording. Only flows that reached
    /// `TxPrepared` can be recorded; unknown or expired ids yield None.
    pub fn take_for_record(&self, id: &str) -> Option<PreparedPublication> {
        let mut entries = self.entries.lock();
        self.reap_expired(&mut entries);

        match entries.get(id).map(|e| e.state) {
            Some(PublicationState::TxPrepared) => {
                let mut entry = entries.remove(id)?;
                entry.state = PublicationState::TxRecorded;
                Some(entry)
            }
            Some(state) => {
                warn!(
                    "Publication flow {} cannot be recorded from state {:?}",
                    id, state
                );
                None
            }
            None => None,
        }
    }

    /// Re-park a flow after a failed record attempt so the caller can retry
    pub fn restore(&self, entry: PreparedPublication) {
        let mut entries = self.entries.lock();
        entries.insert(
            entry.id.clone(),
            PreparedPublication {
                state: PublicationState::TxPrepared,
                ..entry
            },
        );
    }

    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        self.reap_expired(&mut entries);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingPublications {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLICATION_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(store: &PendingPublications) -> String {
        store.draft(
            "0xabc".to_string(),
            "My Tale".to_string(),
            "desc".to_string(),
            "https://aggregator/v1/blobs/cover".to_string(),
            Some("cover".to_string()),
            vec!["fiction".to_string()],
            100,
            1,
        )
    }

    #[test]
    fn flow_advances_through_states_and_records_once() {
        let store = PendingPublications::default();
        let id = draft(&store);

        assert!(store.mark_blob_uploaded(&id, "blob-1".to_string()));
        assert!(store.mark_tx_prepared(&id));

        let taken = store.take_for_record(&id).expect("flow is ready");
        assert_eq!(taken.state, PublicationState::TxRecorded);
        assert_eq!(taken.content_blob_id.as_deref(), Some("blob-1"));

        // A second record attempt finds nothing
        assert!(store.take_for_record(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn drafted_flows_cannot_be_recorded_early() {
        let store = PendingPublications::default();
        let id = draft(&store);

        assert!(store.take_for_record(&id).is_none());
        store.mark_blob_uploaded(&id, "blob-1".to_string());
        assert!(store.take_for_record(&id).is_none());
        // The entry survives the failed attempts
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let store = PendingPublications::default();
        assert!(!store.mark_blob_uploaded("missing", "blob".to_string()));
        assert!(!store.mark_tx_prepared("missing"));
        assert!(store.take_for_record("missing").is_none());
    }

    #[test]
    fn expired_flows_are_reaped() {
        let store = PendingPublications::new(Duration::ZERO);
        let id = draft(&store);
        // Zero TTL: the entry is gone on the next access
        assert!(store.take_for_record(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn restored_flows_can_be_recorded_again() {
        let store = PendingPublications::default();
        let id = draft(&store);
        store.mark_blob_uploaded(&id, "blob-1".to_string());
        store.mark_tx_prepared(&id);

        let taken = store.take_for_record(&id).expect("flow is ready");
        store.restore(taken);
        assert!(store.take_for_record(&id).is_some());
    }
}
