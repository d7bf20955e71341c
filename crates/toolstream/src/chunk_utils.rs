//! Splitting helpers for simulating a streaming transport.

/// Split `payload` into approximately equal-sized chunks without
/// breaking UTF-8 code points.
///
/// # Panics
///
/// Panics if `parts` is zero.
#[must_use]
pub fn produce_chunks(payload: &str, parts: usize) -> Vec<&str> {
    assert!(parts > 0);
    let len = payload.len();
    let chunk_size = len.div_ceil(parts);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < len {
        let mut end = core::cmp::min(start + chunk_size, len);
        while end < len && !payload.is_char_boundary(end) {
            end += 1;
        }
        chunks.push(&payload[start..end]);
        start = end;
    }
    chunks
}

/// Split `payload` into chunks of `size` characters (the last one may be
/// shorter).
///
/// # Panics
///
/// Panics if `size` is zero.
#[must_use]
pub fn chunks_of(payload: &str, size: usize) -> Vec<&str> {
    assert!(size > 0);
    let mut chunks = Vec::with_capacity(payload.len() / size + 1);
    let mut start = 0;
    for (count, (idx, _)) in payload.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(&payload[start..idx]);
            start = idx;
        }
    }
    if start < payload.len() {
        chunks.push(&payload[start..]);
    }
    chunks
}

/// Split `payload` at the given character counts, as produced by a fuzzer or
/// property test. Each entry of `splits` is taken modulo the number of
/// characters left, plus one, so every chunk is non-empty.
#[must_use]
pub fn split_by_lengths<'a>(payload: &'a str, splits: &[usize]) -> Vec<&'a str> {
    let offsets: Vec<usize> = payload
        .char_indices()
        .map(|(idx, _)| idx)
        .chain(core::iter::once(payload.len()))
        .collect();
    let total = offsets.len() - 1;
    let mut chunks = Vec::new();
    let mut idx = 0;
    for s in splits {
        let remaining = total - idx;
        if remaining == 0 {
            break;
        }
        let size = 1 + (s % remaining);
        chunks.push(&payload[offsets[idx]..offsets[idx + size]]);
        idx += size;
    }
    if idx < total {
        chunks.push(&payload[offsets[idx]..]);
    }
    chunks
}
