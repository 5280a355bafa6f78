//! Pack/unpack framer (C6): zero-run elision over aligned 8-byte segments.
//!
//! Each segment is either a **sparse** segment (1 bitmask byte + the segment's
//! non-zero bytes in order) or a **dense** segment (`0xFF`, a count byte, then
//! the raw bytes of 1-256 blocks copied through verbatim). A maximal run of
//! consecutive blocks that each have 6 or more non-zero bytes is always
//! emitted dense — sparse would cost as much or more per block in that case.

use crate::errors::SprotoError;
use crate::wire::Reader;

const BLOCK: usize = 8;
const DENSE_THRESHOLD: usize = 6;
const MAX_RUN_BLOCKS: usize = 256;

/// Packs `input`, zero-padding the final block to a multiple of 8 bytes.
pub fn pack(input: &[u8]) -> Vec<u8> {
    let pad = (BLOCK - input.len() % BLOCK) % BLOCK;
    let mut padded = Vec::with_capacity(input.len() + pad);
    padded.extend_from_slice(input);
    padded.resize(input.len() + pad, 0);

    let blocks: Vec<&[u8]> = padded.chunks_exact(BLOCK).collect();
    let popcounts: Vec<usize> = blocks.iter().map(|b| b.iter().filter(|&&x| x != 0).count()).collect();

    let mut out = Vec::new();
    let mut i = 0;
    while i < blocks.len() {
        if popcounts[i] >= DENSE_THRESHOLD {
            let mut j = i;
            while j < blocks.len() && popcounts[j] >= DENSE_THRESHOLD && (j - i) < MAX_RUN_BLOCKS {
                j += 1;
            }
            let run_len = j - i;
            log::trace!("pack: dense run of {run_len} block(s) starting at block {i}");
            out.push(0xFF);
            out.push((run_len - 1) as u8);
            for block in &blocks[i..j] {
                out.extend_from_slice(block);
            }
            i = j;
        } else {
            out.push(sparse_header(blocks[i]));
            out.extend(blocks[i].iter().copied().filter(|&b| b != 0));
            i += 1;
        }
    }

    out
}

fn sparse_header(block: &[u8]) -> u8 {
    let mut mask = 0u8;
    for (bit, &byte) in block.iter().enumerate() {
        if byte != 0 {
            mask |= 1 << bit;
        }
    }
    mask
}

/// Unpacks a buffer produced by [`pack`]. The result length is always a
/// multiple of 8 (the zero-padding `pack` applied is not recoverable here;
/// callers needing the exact original length carry it out-of-band, e.g. via
/// a record's own internal length prefixes — see §4.5).
pub fn unpack(data: &[u8]) -> Result<Vec<u8>, SprotoError> {
    let mut reader = Reader::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);

    while !reader.is_empty() {
        let header = reader.read_u8()?;
        if header == 0xFF {
            let count = reader.read_u8()? as usize + 1;
            let bytes = reader.read_bytes(count * BLOCK)?;
            out.extend_from_slice(bytes);
        } else {
            for bit in 0..8 {
                if header & (1 << bit) != 0 {
                    out.push(reader.read_u8()?);
                } else {
                    out.push(0);
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_pad(mut v: Vec<u8>) -> Vec<u8> {
        let pad = (BLOCK - v.len() % BLOCK) % BLOCK;
        v.resize(v.len() + pad, 0);
        v
    }

    #[test]
    fn sparse_segment_matches_spec_example() {
        let input = [0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(pack(&input), vec![0x00, 0x01, 0x01]);
    }

    #[test]
    fn all_zero_block_packs_to_single_zero_byte() {
        let input = [0u8; 8];
        assert_eq!(pack(&input), vec![0x00]);
        assert_eq!(unpack(&pack(&input)).unwrap(), input);
    }

    #[test]
    fn dense_run_of_one_block_still_uses_dense_form() {
        let input: Vec<u8> = (1..=8).collect(); // 8 non-zero bytes
        let packed = pack(&input);
        assert_eq!(packed[0], 0xFF);
        assert_eq!(packed[1], 0); // run_len - 1 == 0 -> one block
        assert_eq!(&packed[2..], &input[..]);
    }

    #[test]
    fn dense_run_spans_multiple_blocks() {
        let input: Vec<u8> = (1..=24).collect(); // 3 dense blocks
        let packed = pack(&input);
        assert_eq!(packed[0], 0xFF);
        assert_eq!(packed[1], 2); // 3 blocks - 1
        assert_eq!(&packed[2..], &input[..]);
        assert_eq!(unpack(&packed).unwrap(), input);
    }

    #[test]
    fn mixed_sparse_and_dense_round_trips() {
        let mut input = vec![0u8; 8];
        input[2] = 9;
        input.extend((1..=16).collect::<Vec<u8>>());
        input.extend(vec![0u8; 8]);

        let packed = pack(&input);
        assert_eq!(unpack(&packed).unwrap(), zero_pad(input));
    }

    #[test]
    fn pads_final_partial_block_with_zeros() {
        let input = [1, 2, 3];
        let packed = pack(&input);
        let unpacked = unpack(&packed).unwrap();
        assert_eq!(unpacked, vec![1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn dense_run_longer_than_256_blocks_splits() {
        let input = vec![7u8; BLOCK * 300];
        let packed = pack(&input);
        // First dense segment covers 256 blocks, second covers the remaining 44.
        assert_eq!(packed[0], 0xFF);
        assert_eq!(packed[1], 255);
        let second_header_at = 2 + 256 * BLOCK;
        assert_eq!(packed[second_header_at], 0xFF);
        assert_eq!(packed[second_header_at + 1], 43);
        assert_eq!(unpack(&packed).unwrap(), input);
    }
}
