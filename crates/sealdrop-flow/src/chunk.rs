//! Fixed-size split of a ciphertext into ordered upload chunks.
//!
//! Chunking is pure transport: it runs over already-encrypted bytes, so the
//! concatenation of chunks 1..N is the ciphertext byte-for-byte.

use sealdrop_core::{ShareError, ShareResult};

/// One chunk's position in the ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// 1-based, as sent in `chunkNumber`
    pub number: u32,
    pub offset: usize,
    pub length: usize,
}

impl ChunkSpan {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.length
    }
}

/// Split `len` bytes into `ceil(len / chunk_size)` spans; every span is
/// `chunk_size` long except a shorter final one. `len == 0` yields no spans.
pub fn chunk_plan(len: usize, chunk_size: usize) -> ShareResult<Vec<ChunkSpan>> {
    if chunk_size == 0 {
        return Err(ShareError::validation("chunk size must be greater than zero"));
    }
    let count = len.div_ceil(chunk_size);
    if count > u32::MAX as usize {
        return Err(ShareError::validation(format!(
            "{len} bytes at {chunk_size} bytes per chunk exceeds the chunk limit"
        )));
    }

    Ok((0..count)
        .map(|i| {
            let offset = i * chunk_size;
            ChunkSpan {
                number: i as u32 + 1,
                offset,
                length: chunk_size.min(len - offset),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_twelve_mib_in_five_mib_chunks() {
        let plan = chunk_plan(12 * MIB, 5 * MIB).unwrap();
        let lengths: Vec<usize> = plan.iter().map(|s| s.length).collect();
        assert_eq!(lengths, vec![5 * MIB, 5 * MIB, 2 * MIB]);
        assert_eq!(
            plan.iter().map(|s| s.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(plan[2].offset, 10 * MIB);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let plan = chunk_plan(10 * MIB, 5 * MIB).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|s| s.length == 5 * MIB));
    }

    #[test]
    fn test_small_payload_is_one_chunk() {
        let plan = chunk_plan(21, 5 * MIB).unwrap();
        assert_eq!(
            plan,
            vec![ChunkSpan {
                number: 1,
                offset: 0,
                length: 21
            }]
        );
    }

    #[test]
    fn test_empty_and_zero_chunk_size() {
        assert!(chunk_plan(0, 5 * MIB).unwrap().is_empty());
        assert!(matches!(
            chunk_plan(10, 0),
            Err(ShareError::Validation(_))
        ));
    }
}
