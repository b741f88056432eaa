use crate::weights::{self, Ce};

//
// Implicit weights for code points without table data
//

// Two CEs per code point: a block weight AAAA with common secondary and
// tertiary, then a primary-only continuation carrying the offset within
// the block. The offset is spread over two bytes in base 251 so that
// neither byte collides with the NUL terminator, the level separator,
// or the lead-compression sentinels.

const FIRST_SECONDARY: u8 = weights::COMMON_SECONDARY;
const FIRST_TERTIARY: u8 = weights::COMMON_TERTIARY;

const TRAIL_BASE: u16 = 251;
const TRAIL_OFFSET: u16 = 0x04;

pub fn implicit_ces(code: u32) -> [Ce; 2] {
    let (block, offset) = block_and_offset(code);

    let d1 = offset / TRAIL_BASE + TRAIL_OFFSET;
    let d2 = offset % TRAIL_BASE + TRAIL_OFFSET;

    [
        weights::pack(block, FIRST_SECONDARY, FIRST_TERTIARY),
        weights::continuation((d1 << 8) | d2),
    ]
}

fn block_and_offset(code: u32) -> (u16, u16) {
    if is_han_core(code) {
        return (0xFB40 + (code >> 15) as u16, (code & 0x7FFF) as u16);
    }

    if is_han_other(code) {
        return (0xFB80 + (code >> 15) as u16, (code & 0x7FFF) as u16);
    }

    if is_tangut(code) {
        return (0xFB05, (code - 0x17000) as u16);
    }

    if is_nushu(code) {
        return (0xFB06, (code - 0x1B170) as u16);
    }

    if is_khitan(code) {
        return (0xFB07, (code - 0x18B00) as u16);
    }

    // Everything else, including unassigned code points and unpaired
    // surrogates, sorts after the ideographs.
    (0xFBC0 + (code >> 15) as u16, (code & 0x7FFF) as u16)
}

/// Core Han unified ideographs: the base CJK block. The handful of
/// unified ideographs in the compatibility block carry real table
/// weights in any reasonable tailoring, so they are not special-cased
/// here.
fn is_han_core(code: u32) -> bool {
    (0x4E00..=0x9FFF).contains(&code)
}

/// Han unified ideographs outside the base block (extensions A..H).
fn is_han_other(code: u32) -> bool {
    [
        (0x3400..=0x4DBF),
        (0x20000..=0x2A6DF),
        (0x2A700..=0x2B739),
        (0x2B740..=0x2B81D),
        (0x2B820..=0x2CEA1),
        (0x2CEB0..=0x2EBE0),
        (0x2EBF0..=0x2EE5D),
        (0x30000..=0x3134A),
        (0x31350..=0x323AF),
    ]
    .iter()
    .any(|range| range.contains(&code))
}

fn is_tangut(code: u32) -> bool {
    [
        (0x17000..=0x187F7),
        (0x18800..=0x18AFF),
        (0x18D00..=0x18D08),
    ]
    .iter()
    .any(|range| range.contains(&code))
}

fn is_nushu(code: u32) -> bool {
    (0x1B170..=0x1B2FB).contains(&code)
}

fn is_khitan(code: u32) -> bool {
    (0x18B00..=0x18CD5).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::{is_continuation, primary};

    #[test]
    fn han_before_unassigned() {
        let han = implicit_ces(0x4E00);
        let unassigned = implicit_ces(0xE000);

        assert!(primary(han[0]) < primary(unassigned[0]));
    }

    #[test]
    fn second_ce_is_continuation() {
        let [first, second] = implicit_ces(0x4E00);

        assert!(!is_continuation(first));
        assert!(is_continuation(second));
    }

    #[test]
    fn ordering_within_a_block() {
        // Consecutive code points in the same block must keep their
        // order under (AAAA, trailing) comparison.
        let mut prev = implicit_ces(0x4E00);

        for code in 0x4E01..0x4E20 {
            let cur = implicit_ces(code);
            assert_eq!(primary(prev[0]), primary(cur[0]));
            assert!(primary(prev[1]) < primary(cur[1]), "{code:04X}");
            prev = cur;
        }
    }

    #[test]
    fn trailing_bytes_stay_clear_of_sentinels() {
        for code in [0x4E00, 0x9FFF, 0x17000, 0xE000, 0x10FFFF, 0xD800] {
            let [_, second] = implicit_ces(code);
            let p = primary(second);

            assert!(p >> 8 >= 0x04, "{code:04X}");
            assert!(p & 0xFF >= 0x04, "{code:04X}");
            assert!(p >> 8 <= 0xFE, "{code:04X}");
            assert!(p & 0xFF <= 0xFE, "{code:04X}");
        }
    }
}
