//! GIF-variant LZW compression.
//!
//! Codes start at `min_code_size + 1` bits and grow up to 12. The stream
//! opens with a clear code, ends with end-of-information, and is packed
//! least-significant bit first. When the 4096-entry table fills, a clear
//! code is emitted and the table starts over.

use std::collections::HashMap;

/// Largest code width allowed by GIF.
pub const MAX_CODE_BITS: u8 = 12;
const MAX_CODES: u16 = 1 << MAX_CODE_BITS;

/// LSB-first bit packer.
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    fn with_capacity(cap: usize) -> Self {
        Self {
            out: Vec::with_capacity(cap),
            acc: 0,
            bits: 0,
        }
    }

    #[inline]
    fn write(&mut self, code: u16, width: u8) {
        self.acc |= (code as u32) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.out.push(self.acc as u8);
        }
        self.out
    }
}

/// Minimum code size for a color table of `table_len` entries.
///
/// GIF requires at least 2 even for 2-color tables.
pub fn min_code_size(table_len: usize) -> u8 {
    let mut bits = 1u8;
    while (1usize << bits) < table_len {
        bits += 1;
    }
    bits.max(2)
}

/// Compress palette indices into an LZW byte stream (before sub-blocking).
///
/// Every index must be below `1 << min_code_size`.
pub fn compress(indices: &[u8], min_code_size: u8) -> Vec<u8> {
    debug_assert!((2..=8).contains(&min_code_size));

    let clear = 1u16 << min_code_size;
    let eoi = clear + 1;
    let mut code_size = min_code_size + 1;
    let mut next_code = eoi + 1;
    let mut table: HashMap<(u16, u8), u16> = HashMap::new();
    let mut w = BitWriter::with_capacity(indices.len() / 2 + 16);

    w.write(clear, code_size);

    let Some((&first, rest)) = indices.split_first() else {
        w.write(eoi, code_size);
        return w.finish();
    };

    let mut prefix = first as u16;
    for &k in rest {
        if let Some(&code) = table.get(&(prefix, k)) {
            prefix = code;
            continue;
        }

        w.write(prefix, code_size);
        if next_code >= (1 << code_size) && code_size < MAX_CODE_BITS {
            code_size += 1;
        }
        if next_code < MAX_CODES {
            table.insert((prefix, k), next_code);
            next_code += 1;
        } else {
            w.write(clear, code_size);
            table.clear();
            next_code = eoi + 1;
            code_size = min_code_size + 1;
        }
        prefix = k as u16;
    }

    w.write(prefix, code_size);
    if next_code >= (1 << code_size) && code_size < MAX_CODE_BITS {
        code_size += 1;
    }
    w.write(eoi, code_size);
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10x10 four-color sample image (two-tone blocks).
    fn sample_indices() -> Vec<u8> {
        let rows = [
            "1111122222",
            "1111122222",
            "1111122222",
            "1110000222",
            "1110000222",
            "2220000111",
            "2220000111",
            "2222211111",
            "2222211111",
            "2222211111",
        ];
        rows.iter()
            .flat_map(|r| r.bytes().map(|b| b - b'0'))
            .collect()
    }

    #[test]
    fn test_known_reference_stream() {
        let out = compress(&sample_indices(), 2);
        assert_eq!(
            out,
            vec![
                0x8C, 0x2D, 0x99, 0x87, 0x2A, 0x1C, 0xDC, 0x33, 0xA0, 0x02, 0x75, 0xEC, 0x95, 0xFA,
                0xA8, 0xDE, 0x60, 0x8C, 0x04, 0x91, 0x4C, 0x01,
            ]
        );
    }

    #[test]
    fn test_min_code_size() {
        assert_eq!(min_code_size(2), 2);
        assert_eq!(min_code_size(4), 2);
        assert_eq!(min_code_size(8), 3);
        assert_eq!(min_code_size(16), 4);
        assert_eq!(min_code_size(256), 8);
    }

    #[test]
    fn test_empty_input_is_clear_then_eoi() {
        // clear=4 (3 bits), eoi=5 (3 bits): 0b101_100 -> 0x2C.
        assert_eq!(compress(&[], 2), vec![0x2C]);
    }

    #[test]
    fn test_bit_writer_lsb_first() {
        let mut w = BitWriter::with_capacity(2);
        w.write(0b101, 3);
        w.write(0b11111, 5);
        w.write(0b1, 1);
        assert_eq!(w.finish(), vec![0b1111_1101, 0b1]);
    }
}
