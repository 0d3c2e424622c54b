use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// One ordered slice of a chunked message, as received from a client.
///
/// The payload stays base64-encoded until feature extraction; a chunk that
/// fails to decode there contributes zero bytes to the reassembly instead of
/// failing the whole message.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub index: u32,
    pub payload_b64: String,
    pub timestamp: Option<String>,
}

struct Message {
    chunks: HashMap<u32, ChunkRecord>,
    declared_total: usize,
    #[allow(dead_code)]
    last_seen: Instant,
    client_id: Option<String>,
}

/// Snapshot of a message handed off for processing, chunks ordered by index.
#[derive(Debug, Clone)]
pub struct CompletedMessage {
    pub message_id: String,
    pub chunks: Vec<ChunkRecord>,
    pub client_id: Option<String>,
}

#[derive(Debug)]
pub enum ReceiveOutcome {
    Received { received_count: usize },
    Complete(CompletedMessage),
}

/// Tracks in-flight chunked messages and detects completion.
///
/// The declared total is a mutable cell: every arrival for an id overwrites
/// it with the total supplied in that call. A later chunk can therefore grow
/// or shrink the completion target mid-stream; callers that send inconsistent
/// totals get whatever completion the last total implies. Duplicate indices
/// overwrite the stored chunk rather than counting twice.
///
/// The completion check and the removal of the entry happen inside the same
/// critical section as the insert, so exactly one concurrent arrival observes
/// completion and exclusively owns the chunk snapshot. Partial messages are
/// never expired; they live until completed or the process restarts.
pub struct ReassemblyStore {
    messages: Mutex<HashMap<String, Message>>,
}

impl ReassemblyStore {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
        }
    }

    /// Record one chunk arrival. Returns the completed message snapshot when
    /// this arrival makes `len(chunks) == declared_total`; the entry is gone
    /// from the store by the time this returns, so a later arrival for the
    /// same id starts a brand-new message.
    pub fn add_chunk(
        &self,
        message_id: &str,
        index: u32,
        total: usize,
        payload_b64: String,
        client_id: Option<String>,
        timestamp: Option<String>,
    ) -> ReceiveOutcome {
        let mut messages = self.messages.lock().unwrap();

        let message = messages
            .entry(message_id.to_string())
            .or_insert_with(|| Message {
                chunks: HashMap::new(),
                declared_total: total,
                last_seen: Instant::now(),
                client_id: client_id.clone(),
            });

        message.declared_total = total;
        message.last_seen = Instant::now();
        message.chunks.insert(
            index,
            ChunkRecord {
                index,
                payload_b64,
                timestamp,
            },
        );

        let received_count = message.chunks.len();
        if received_count == message.declared_total {
            let message = messages.remove(message_id).unwrap();
            let mut chunks: Vec<ChunkRecord> = message.chunks.into_values().collect();
            chunks.sort_by_key(|c| c.index);
            return ReceiveOutcome::Complete(CompletedMessage {
                message_id: message_id.to_string(),
                chunks,
                client_id: message.client_id,
            });
        }

        ReceiveOutcome::Received { received_count }
    }

    /// Number of incomplete messages currently held.
    pub fn pending_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl Default for ReassemblyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkio::encode_chunk;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn add(store: &ReassemblyStore, id: &str, index: u32, total: usize) -> ReceiveOutcome {
        store.add_chunk(id, index, total, encode_chunk(b"x"), None, None)
    }

    #[test]
    fn test_single_chunk_completes_immediately() {
        let store = ReassemblyStore::new();
        match add(&store, "m1", 0, 1) {
            ReceiveOutcome::Complete(completed) => {
                assert_eq!(completed.message_id, "m1");
                assert_eq!(completed.chunks.len(), 1);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_out_of_order_arrival_yields_index_order() {
        let store = ReassemblyStore::new();
        for index in [2u32, 0, 1] {
            let outcome = store.add_chunk(
                "m1",
                index,
                3,
                encode_chunk(format!("part{index}").as_bytes()),
                None,
                None,
            );
            if index == 1 {
                match outcome {
                    ReceiveOutcome::Complete(completed) => {
                        let indices: Vec<u32> = completed.chunks.iter().map(|c| c.index).collect();
                        assert_eq!(indices, vec![0, 1, 2]);
                    }
                    other => panic!("expected completion, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_any_arrival_order_yields_same_reassembly() {
        let parts: [&[u8]; 3] = [b"alpha-", b"bravo-", b"charlie"];
        let orders: [[u32; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let store = ReassemblyStore::new();
            let mut completed = None;
            for index in order {
                let outcome = store.add_chunk(
                    "m1",
                    index,
                    3,
                    encode_chunk(parts[index as usize]),
                    None,
                    None,
                );
                if let ReceiveOutcome::Complete(c) = outcome {
                    completed = Some(c);
                }
            }
            let completed = completed.expect("message never completed");
            let (_, reassembled) = crate::features::extract_features(&completed.chunks);
            assert_eq!(reassembled, b"alpha-bravo-charlie", "order {order:?}");
        }
    }

    #[test]
    fn test_duplicate_index_overwrites() {
        let store = ReassemblyStore::new();
        assert!(matches!(
            add(&store, "m1", 0, 3),
            ReceiveOutcome::Received { received_count: 1 }
        ));
        // Same index again: map size stays at 1, no double count.
        assert!(matches!(
            add(&store, "m1", 0, 3),
            ReceiveOutcome::Received { received_count: 1 }
        ));
        assert!(matches!(
            add(&store, "m1", 1, 3),
            ReceiveOutcome::Received { received_count: 2 }
        ));
    }

    #[test]
    fn test_declared_total_growth_defers_completion() {
        let store = ReassemblyStore::new();
        assert!(matches!(
            add(&store, "m1", 0, 2),
            ReceiveOutcome::Received { received_count: 1 }
        ));
        // Second chunk raises the total, so 2 of 3 is still incomplete.
        assert!(matches!(
            add(&store, "m1", 1, 3),
            ReceiveOutcome::Received { received_count: 2 }
        ));
        assert!(matches!(add(&store, "m1", 2, 3), ReceiveOutcome::Complete(_)));
    }

    #[test]
    fn test_declared_total_shrink_triggers_completion() {
        let store = ReassemblyStore::new();
        assert!(matches!(
            add(&store, "m1", 0, 5),
            ReceiveOutcome::Received { received_count: 1 }
        ));
        // The shrunken total makes this second arrival the completing one.
        match add(&store, "m1", 1, 2) {
            ReceiveOutcome::Complete(completed) => assert_eq!(completed.chunks.len(), 2),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_arrival_after_completion_starts_fresh_message() {
        let store = ReassemblyStore::new();
        assert!(matches!(add(&store, "m1", 0, 1), ReceiveOutcome::Complete(_)));
        assert!(matches!(
            add(&store, "m1", 0, 2),
            ReceiveOutcome::Received { received_count: 1 }
        ));
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn test_concurrent_arrivals_complete_exactly_once() {
        let total = 16usize;
        let store = Arc::new(ReassemblyStore::new());
        let completions = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..total)
            .map(|index| {
                let store = store.clone();
                let completions = completions.clone();
                std::thread::spawn(move || {
                    let outcome = store.add_chunk(
                        "m1",
                        index as u32,
                        total,
                        encode_chunk(b"payload"),
                        None,
                        None,
                    );
                    if matches!(outcome, ReceiveOutcome::Complete(_)) {
                        completions.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_distinct_ids_are_independent() {
        let store = ReassemblyStore::new();
        assert!(matches!(
            add(&store, "m1", 0, 2),
            ReceiveOutcome::Received { received_count: 1 }
        ));
        assert!(matches!(
            add(&store, "m2", 0, 2),
            ReceiveOutcome::Received { received_count: 1 }
        ));
        assert_eq!(store.pending_count(), 2);
        assert!(matches!(add(&store, "m1", 1, 2), ReceiveOutcome::Complete(_)));
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn test_client_id_preserved_from_first_arrival() {
        let store = ReassemblyStore::new();
        store.add_chunk(
            "m1",
            0,
            2,
            encode_chunk(b"a"),
            Some("client-7".to_string()),
            None,
        );
        match store.add_chunk("m1", 1, 2, encode_chunk(b"b"), None, None) {
            ReceiveOutcome::Complete(completed) => {
                assert_eq!(completed.client_id.as_deref(), Some("client-7"));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }
}
