//! Fixed-size overlapping text windows with lineage metadata.

use crate::index::ChunkRecord;

/// Split `text` into windows of `size` characters, advancing by
/// `size - overlap` characters per window.
///
/// Windowing is measured in characters, not bytes, so multi-byte input
/// never splits inside a code point. The final window may be shorter.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }

    // Byte offset of every character boundary, including the end.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total_chars {
        let end = (start + size).min(total_chars);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == total_chars {
            break;
        }
        start += step;
    }
    chunks
}

/// Pair chunk texts with their embeddings and wrap them as records.
///
/// `first_index` numbers the chunks across batches when callers embed a
/// document in several provider calls.
pub fn into_records(
    namespace: &str,
    file_name: &str,
    file_hash: &str,
    first_index: usize,
    texts: Vec<String>,
    vectors: Vec<Vec<f32>>,
) -> Vec<ChunkRecord> {
    texts
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(offset, (text, vector))| {
            let chunk_index = first_index + offset;
            let metadata = serde_json::json!({
                "file_name": file_name,
                "file_hash": file_hash,
                "chunk_index": chunk_index,
            });
            ChunkRecord::new(namespace, file_name, chunk_index, text)
                .with_metadata(metadata)
                .with_embedding(vector)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("tiny", 1000, 200);
        assert_eq!(chunks, vec!["tiny".to_string()]);
    }

    #[test]
    fn windows_overlap_by_the_configured_amount() {
        let chunks = chunk_text("abcdefghij", 4, 2);
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn zero_overlap_windows_tile_the_text() {
        assert_eq!(chunk_text("0123456789", 5, 0), vec!["01234", "56789"]);
    }

    #[test]
    fn multibyte_windows_count_characters_not_bytes() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text, 10, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1000, 200).is_empty());
    }

    #[test]
    fn records_carry_lineage_metadata() {
        let records = into_records(
            "ns-hash",
            "doc.pdf",
            "ns-hash",
            64,
            vec!["one".to_string(), "two".to_string()],
            vec![vec![0.1], vec![0.2]],
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].chunk_index, 64);
        assert_eq!(records[1].chunk_index, 65);
        assert_eq!(records[1].metadata["chunk_index"], 65);
        assert_eq!(records[0].metadata["file_name"], "doc.pdf");
        assert_eq!(records[0].metadata["file_hash"], "ns-hash");
        assert_eq!(records[0].embedding.as_deref(), Some(&[0.1_f32][..]));
    }
}
