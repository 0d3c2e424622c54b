use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Split a payload into fixed-size slices, last one possibly shorter.
pub fn chunk_bytes(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if chunk_size == 0 {
        return Vec::new();
    }
    data.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

/// Base64-encode a chunk for transport.
pub fn encode_chunk(chunk: &[u8]) -> String {
    STANDARD.encode(chunk)
}
