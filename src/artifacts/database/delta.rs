//! Git delta instructions
//!
//! A delta starts with the base size and the result size as little-endian
//! base-128 varints, followed by commands:
//!
//! - `1xxxxxxx`: copy from the base; the low nibble flags which offset bytes
//!   follow, bits 4..6 which size bytes follow (a zero size means `0x10000`)
//! - `0nnnnnnn`: insert the next `n` literal bytes (`n` > 0)

use crate::errors::{Error, Result};

const WHAT: &str = "delta";
const MAX_INSERT: usize = 0x7f;
const MAX_COPY: usize = 0xffff;

fn read_varint(delta: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *delta
            .get(*pos)
            .ok_or_else(|| Error::corrupt(WHAT, "truncated size header"))?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::corrupt(WHAT, "size header too long"));
        }
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Base and result sizes declared at the head of a delta
pub fn delta_sizes(delta: &[u8]) -> Result<(u64, u64)> {
    let mut pos = 0;
    let base_size = read_varint(delta, &mut pos)?;
    let result_size = read_varint(delta, &mut pos)?;
    Ok((base_size, result_size))
}

/// Reconstruct the target object from `base` and a delta
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;
    let base_size = read_varint(delta, &mut pos)? as usize;
    let result_size = read_varint(delta, &mut pos)? as usize;
    if base_size != base.len() {
        return Err(Error::corrupt(WHAT, "base size mismatch"));
    }

    let mut out = Vec::with_capacity(result_size);
    while pos < delta.len() {
        let cmd = delta[pos];
        pos += 1;

        if cmd & 0x80 != 0 {
            let mut offset = 0usize;
            let mut size = 0usize;
            for i in 0..4 {
                if cmd & (1 << i) != 0 {
                    let byte = *delta
                        .get(pos)
                        .ok_or_else(|| Error::corrupt(WHAT, "truncated copy offset"))?;
                    offset |= (byte as usize) << (8 * i);
                    pos += 1;
                }
            }
            for i in 0..3 {
                if cmd & (0x10 << i) != 0 {
                    let byte = *delta
                        .get(pos)
                        .ok_or_else(|| Error::corrupt(WHAT, "truncated copy size"))?;
                    size |= (byte as usize) << (8 * i);
                    pos += 1;
                }
            }
            if size == 0 {
                size = 0x10000;
            }

            let end = offset
                .checked_add(size)
                .filter(|&end| end <= base.len())
                .ok_or_else(|| Error::corrupt(WHAT, "copy out of base range"))?;
            out.extend_from_slice(&base[offset..end]);
        } else if cmd != 0 {
            let size = cmd as usize;
            let literal = delta
                .get(pos..pos + size)
                .ok_or_else(|| Error::corrupt(WHAT, "truncated insert"))?;
            out.extend_from_slice(literal);
            pos += size;
        } else {
            return Err(Error::corrupt(WHAT, "reserved command 0"));
        }

        if out.len() > result_size {
            return Err(Error::corrupt(WHAT, "result overruns declared size"));
        }
    }

    if out.len() != result_size {
        return Err(Error::corrupt(WHAT, "result size mismatch"));
    }
    Ok(out)
}

fn push_copy(out: &mut Vec<u8>, mut offset: usize, mut len: usize) {
    while len > 0 {
        let size = len.min(MAX_COPY);
        let mut cmd = 0x80u8;
        let mut args = Vec::with_capacity(7);
        for i in 0..4 {
            let byte = ((offset >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                cmd |= 1 << i;
                args.push(byte);
            }
        }
        for i in 0..2 {
            let byte = ((size >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                cmd |= 0x10 << i;
                args.push(byte);
            }
        }
        out.push(cmd);
        out.extend_from_slice(&args);
        offset += size;
        len -= size;
    }
}

fn push_insert(out: &mut Vec<u8>, literal: &[u8]) {
    for chunk in literal.chunks(MAX_INSERT) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
}

/// Encode `target` against `base` by sharing their common prefix and suffix
pub fn encode_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let prefix = base
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = base.len().min(target.len()) - prefix;
    let suffix = base
        .iter()
        .rev()
        .zip(target.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = Vec::with_capacity(16 + target.len() - prefix - suffix);
    write_varint(&mut out, base.len() as u64);
    write_varint(&mut out, target.len() as u64);

    push_copy(&mut out, 0, prefix);
    push_insert(&mut out, &target[prefix..target.len() - suffix]);
    push_copy(&mut out, base.len() - suffix, suffix);
    out
}
