use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

use crate::reassembly::ChunkRecord;

/// Statistical summary of one reassembled message. Field order matters: the
/// model scorer consumes these eight values in exactly this order.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureVector {
    pub chunk_count: usize,
    pub avg_chunk_size: f64,
    pub std_chunk_size: f64,
    pub total_bytes: usize,
    pub interarrival_mean: f64,
    pub duration: f64,
    pub entropy: f64,
    pub printable_ratio: f64,
}

impl FeatureVector {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.chunk_count as f64,
            self.avg_chunk_size,
            self.std_chunk_size,
            self.total_bytes as f64,
            self.interarrival_mean,
            self.duration,
            self.entropy,
            self.printable_ratio,
        ]
    }
}

/// Decode a base64 payload, substituting empty bytes on failure. Bad payloads
/// degrade the reassembly instead of erroring out of the pipeline.
pub fn decode_payload(payload_b64: &str) -> Vec<u8> {
    STANDARD.decode(payload_b64).unwrap_or_default()
}

/// Shannon entropy in bits over the byte-value histogram. Empty input is 0.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Parse an ISO-8601 timestamp to fractional epoch seconds. A literal "Z" is
/// treated as UTC; a naive timestamp is assumed UTC. Unparsable values are
/// dropped from the timing features, not treated as zero.
fn parse_timestamp(ts: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.timestamp_micros() as f64 / 1_000_000.0);
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_micros() as f64 / 1_000_000.0)
}

/// Compute the feature vector and the reassembled payload for a completed
/// message. Chunks must already be in index order; their concatenation is the
/// canonical byte stream regardless of arrival order.
pub fn extract_features(chunks: &[ChunkRecord]) -> (FeatureVector, Vec<u8>) {
    let mut times = Vec::new();
    let mut sizes = Vec::new();
    let mut reassembled = Vec::new();

    for chunk in chunks {
        let payload = decode_payload(&chunk.payload_b64);
        sizes.push(payload.len());
        reassembled.extend_from_slice(&payload);
        if let Some(ts) = chunk.timestamp.as_deref() {
            if let Some(epoch) = parse_timestamp(ts) {
                times.push(epoch);
            }
        }
    }

    let chunk_count = chunks.len();
    let total_bytes: usize = sizes.iter().sum();
    let avg_chunk_size = if sizes.is_empty() {
        0.0
    } else {
        total_bytes as f64 / sizes.len() as f64
    };
    // Population standard deviation (divide by n).
    let std_chunk_size = if sizes.is_empty() {
        0.0
    } else {
        let variance = sizes
            .iter()
            .map(|&size| {
                let diff = size as f64 - avg_chunk_size;
                diff * diff
            })
            .sum::<f64>()
            / sizes.len() as f64;
        variance.sqrt()
    };

    let mut interarrival_mean = 0.0;
    let mut duration = 0.0;
    if times.len() >= 2 {
        times.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let diffs: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
        interarrival_mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
        duration = times[times.len() - 1] - times[0];
    }

    let entropy = shannon_entropy(&reassembled);
    let printable = reassembled
        .iter()
        .filter(|&&byte| (32..=126).contains(&byte))
        .count();
    let printable_ratio = if reassembled.is_empty() {
        0.0
    } else {
        printable as f64 / reassembled.len() as f64
    };

    let features = FeatureVector {
        chunk_count,
        avg_chunk_size,
        std_chunk_size,
        total_bytes,
        interarrival_mean,
        duration,
        entropy,
        printable_ratio,
    };
    (features, reassembled)
}
