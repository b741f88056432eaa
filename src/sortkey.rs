use crate::options::{CaseFirst, CollationOptions, Strength};
use crate::table::WeightTable;
use crate::weights::{self, Ce, COMMON_SECONDARY, COMMON_TERTIARY};

//
// Sort key assembly
//

pub(crate) const LEVEL_SEPARATOR: u8 = 0x01;

// Common-run compression windows, one per level. Each window is split
// in half between the two flush directions; weights other than the
// common one must sit outside the window.
const SEC_BOT: u8 = COMMON_SECONDARY;
const SEC_TOP: u8 = 0x86;
const TER_BOT: u8 = COMMON_TERTIARY;
const TER_TOP: u8 = 0x85;
const QUAT_SHIFTED_BOT: u8 = 0xF0;
const QUAT_SHIFTED_TOP: u8 = 0xFE;
const QUAT_HIRAGANA_BOT: u8 = 0x05;
const QUAT_HIRAGANA_TOP: u8 = 0xFD;

// Group boundary sentinels for primary lead-byte compression; trail
// bytes of compressible primaries stay inside 0x04..=0xFE.
const PRIMARY_BOUNDARY_LOW: u8 = 0x03;
const PRIMARY_BOUNDARY_HIGH: u8 = 0xFF;

/// Quaternary weight of a CE that is neither variable nor Hiragana.
pub(crate) const QUAT_COMMON: u16 = 0xFFFF;
/// Quaternary weight of a Hiragana CE under `hiragana_quaternary`.
pub(crate) const QUAT_HIRAGANA: u16 = 0xFFFE;
const QUAT_HIRAGANA_BYTE: u8 = 0x04;

/// A CE annotated with its level disposition after variable-weight
/// handling: whether it still participates in the first three levels,
/// and what it contributes to the quaternary (0 = nothing).
#[derive(Clone, Copy, Debug)]
pub(crate) struct LevelCe {
    pub ce: Ce,
    pub suppressed: bool,
    pub quat: u16,
}

#[derive(Clone, Copy, PartialEq)]
enum Disposition {
    Normal,
    Variable,
    Suppressed,
}

/// Streaming variable-weight filter. Implements shifted handling,
/// including the rule that ignorable CEs directly after a variable are
/// suppressed along with it; continuations follow their parent.
pub(crate) struct ShiftFilter {
    shifted: bool,
    hiragana_q: bool,
    variable_top: u16,
    last_variable: bool,
    prev: Disposition,
}

impl ShiftFilter {
    pub(crate) fn new(options: &CollationOptions, variable_top: u16) -> Self {
        Self {
            shifted: options.shifted(),
            hiragana_q: options.hiragana_quaternary,
            variable_top,
            last_variable: false,
            prev: Disposition::Normal,
        }
    }

    pub(crate) fn apply(&mut self, ce: Ce, hiragana: bool) -> LevelCe {
        if weights::is_continuation(ce) {
            return match self.prev {
                Disposition::Suppressed => LevelCe {
                    ce,
                    suppressed: true,
                    quat: 0,
                },
                Disposition::Variable => LevelCe {
                    ce,
                    suppressed: true,
                    quat: weights::primary(ce),
                },
                Disposition::Normal => LevelCe {
                    ce,
                    suppressed: false,
                    quat: 0,
                },
            };
        }

        if ce == 0 {
            self.prev = Disposition::Suppressed;
            return LevelCe {
                ce,
                suppressed: true,
                quat: 0,
            };
        }

        let p = weights::primary(ce);

        if self.shifted {
            if p != 0 && p <= self.variable_top {
                self.last_variable = true;
                self.prev = Disposition::Variable;
                return LevelCe {
                    ce,
                    suppressed: true,
                    quat: p,
                };
            }
            if self.last_variable && p == 0 {
                self.prev = Disposition::Suppressed;
                return LevelCe {
                    ce,
                    suppressed: true,
                    quat: 0,
                };
            }
            self.last_variable = false;
            self.prev = Disposition::Normal;
            return LevelCe {
                ce,
                suppressed: false,
                quat: QUAT_COMMON,
            };
        }

        self.prev = Disposition::Normal;
        let quat = if self.hiragana_q && p != 0 {
            if hiragana {
                QUAT_HIRAGANA
            } else {
                QUAT_COMMON
            }
        } else {
            0
        };

        LevelCe {
            ce,
            suppressed: false,
            quat,
        }
    }
}

pub(crate) fn filter_ces(
    flagged: &[(Ce, bool)],
    options: &CollationOptions,
    variable_top: u16,
) -> Vec<LevelCe> {
    let mut filter = ShiftFilter::new(options, variable_top);
    flagged.iter().map(|&(ce, h)| filter.apply(ce, h)).collect()
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Level {
    Primary,
    Secondary,
    Case,
    Tertiary,
    Quaternary,
    Identical,
}

/// The levels present under these options, in key order.
pub(crate) fn levels(options: &CollationOptions) -> Vec<Level> {
    let mut out = vec![Level::Primary];

    if options.strength >= Strength::Secondary {
        out.push(Level::Secondary);
    }
    if options.case_level {
        out.push(Level::Case);
    }
    if options.strength >= Strength::Tertiary {
        out.push(Level::Tertiary);
    }
    if options.has_quaternary() {
        out.push(Level::Quaternary);
    }
    if options.strength >= Strength::Identical {
        out.push(Level::Identical);
    }

    out
}

pub(crate) fn level_bytes(
    level: Level,
    filtered: &[LevelCe],
    nfd: &[u32],
    table: &WeightTable,
    options: &CollationOptions,
) -> Vec<u8> {
    match level {
        Level::Primary => primary_level(filtered, table, options),
        Level::Secondary => secondary_level(filtered, options.french_secondary),
        Level::Case => case_level(filtered, options.case_first),
        Level::Tertiary => tertiary_level(filtered, options),
        Level::Quaternary => quaternary_level(filtered, options.shifted()),
        Level::Identical => identical_level(nfd),
    }
}

/// Concatenate all present levels with separators and terminate with
/// NUL. The result is byte-comparable: memcmp order is collation order.
pub(crate) fn assemble_key(
    filtered: &[LevelCe],
    nfd: &[u32],
    table: &WeightTable,
    options: &CollationOptions,
) -> Vec<u8> {
    let mut key = Vec::new();

    for (i, level) in levels(options).iter().enumerate() {
        if i > 0 {
            key.push(LEVEL_SEPARATOR);
        }
        key.extend(level_bytes(*level, filtered, nfd, table, options));
    }

    key.push(0);
    key
}

pub(crate) fn permute_primary(p: u16, options: &CollationOptions) -> u16 {
    match &options.reorder {
        Some(perm) => (u16::from(perm[(p >> 8) as usize]) << 8) | (p & 0xFF),
        None => p,
    }
}

/// Primary bytes with lead-byte compression: within a run of
/// compressible primaries sharing a lead byte, only trail bytes are
/// emitted; leaving the run emits a low or high sentinel depending on
/// the direction of change, so truncated runs still compare correctly.
fn primary_level(
    filtered: &[LevelCe],
    table: &WeightTable,
    options: &CollationOptions,
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev_lead: u16 = 0xFFFF;
    let mut prev_compressible = false;

    for lce in filtered {
        if lce.suppressed {
            continue;
        }
        let p = weights::primary(lce.ce);
        if p == 0 {
            continue;
        }

        if weights::is_continuation(lce.ce) {
            // continuations carry raw primary bytes and break any run
            out.push((p >> 8) as u8);
            if p as u8 != 0 {
                out.push(p as u8);
            }
            prev_lead = 0xFFFF;
            prev_compressible = false;
            continue;
        }

        let orig_lead = (p >> 8) as u8;
        let p = permute_primary(p, options);
        let lead = (p >> 8) as u8;
        let trail = p as u8;
        let compressible = table.is_compressible(orig_lead);

        if compressible && u16::from(lead) == prev_lead {
            out.push(trail);
        } else {
            if prev_compressible {
                out.push(if u16::from(lead) < prev_lead {
                    PRIMARY_BOUNDARY_LOW
                } else {
                    PRIMARY_BOUNDARY_HIGH
                });
            }
            out.push(lead);
            if trail != 0 {
                out.push(trail);
            }
            prev_lead = u16::from(lead);
            prev_compressible = compressible;
        }
    }

    out
}

fn secondary_level(filtered: &[LevelCe], french: bool) -> Vec<u8> {
    if french {
        return secondary_level_french(filtered);
    }

    let mut out = Vec::new();
    let mut count = 0_usize;

    for lce in filtered {
        if lce.suppressed {
            continue;
        }
        let s = weights::secondary(lce.ce);
        if s == 0 {
            continue;
        }
        if s == COMMON_SECONDARY {
            count += 1;
            continue;
        }

        // non-common secondaries sit above the window
        flush_common(&mut out, &mut count, true, SEC_BOT, SEC_TOP);
        out.push(s);
    }

    flush_common(&mut out, &mut count, false, SEC_BOT, SEC_TOP);
    out
}

/// French accent ordering: secondary bytes are grouped per CE span (a
/// CE plus its continuations) and the spans are emitted in reverse
/// order; bytes inside a span keep their order. Runs of the common
/// weight are not compressed here, so span reversal stays exact.
fn secondary_level_french(filtered: &[LevelCe]) -> Vec<u8> {
    let mut spans: Vec<Vec<u8>> = Vec::new();

    for lce in filtered {
        if lce.suppressed {
            continue;
        }
        if !weights::is_continuation(lce.ce) || spans.is_empty() {
            spans.push(Vec::new());
        }

        let s = weights::secondary(lce.ce);
        if s != 0 {
            if let Some(span) = spans.last_mut() {
                span.push(s);
            }
        }
    }

    let mut out = Vec::new();
    for span in spans.iter().rev() {
        out.extend_from_slice(span);
    }
    out
}

/// One bit per eligible CE (non-continuation, non-zero primary),
/// packed seven to a byte behind a high marker bit.
fn case_level(filtered: &[LevelCe], case_first: CaseFirst) -> Vec<u8> {
    let invert = case_first == CaseFirst::Upper;
    let mut out = Vec::new();
    let mut bits: u8 = 0;
    let mut n = 0;

    for lce in filtered {
        if lce.suppressed || weights::is_continuation(lce.ce) {
            continue;
        }
        if weights::primary(lce.ce) == 0 {
            continue;
        }

        let mut bit = u8::from(weights::is_upper(lce.ce));
        if invert {
            bit ^= 1;
        }
        bits |= bit << (6 - n);
        n += 1;

        if n == 7 {
            out.push(0x80 | bits);
            bits = 0;
            n = 0;
        }
    }

    if n > 0 {
        out.push(0x80 | bits);
    }
    out
}

fn tertiary_level(filtered: &[LevelCe], options: &CollationOptions) -> Vec<u8> {
    // Without case handling, the case bits are dropped and non-common
    // weights are lifted above the compression window. With case
    // handling, every byte carries explicit case bits and no run
    // compression applies.
    let plain = options.case_first == CaseFirst::Off && !options.case_level;
    let swap = options.case_first == CaseFirst::Upper;

    let mut out = Vec::new();
    let mut count = 0_usize;

    for lce in filtered {
        if lce.suppressed {
            continue;
        }
        let t6 = weights::tertiary_weight(lce.ce);
        if t6 == 0 {
            continue;
        }

        if plain {
            if t6 == COMMON_TERTIARY {
                count += 1;
                continue;
            }
            flush_common(&mut out, &mut count, true, TER_BOT, TER_TOP);
            out.push(0x80 | t6);
        } else {
            let upper = weights::is_upper(lce.ce);
            out.push(if upper != swap { 0x80 | t6 } else { 0x40 | t6 });
        }
    }

    if plain {
        flush_common(&mut out, &mut count, false, TER_BOT, TER_TOP);
    }
    out
}

fn quaternary_level(filtered: &[LevelCe], shifted: bool) -> Vec<u8> {
    let (bot, top) = if shifted {
        (QUAT_SHIFTED_BOT, QUAT_SHIFTED_TOP)
    } else {
        (QUAT_HIRAGANA_BOT, QUAT_HIRAGANA_TOP)
    };

    let mut out = Vec::new();
    let mut count = 0_usize;

    for lce in filtered {
        match lce.quat {
            0 => {}
            QUAT_COMMON => count += 1,
            QUAT_HIRAGANA => {
                flush_common(&mut out, &mut count, false, bot, top);
                out.push(QUAT_HIRAGANA_BYTE);
            }
            p => {
                flush_common(&mut out, &mut count, false, bot, top);
                out.push((p >> 8) as u8);
                if p as u8 != 0 {
                    out.push(p as u8);
                }
            }
        }
    }

    flush_common(&mut out, &mut count, false, bot, top);
    out
}

/// The identical level: NFD code points under an order-preserving
/// variable-length byte code clear of the NUL terminator and the level
/// separator.
fn identical_level(nfd: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nfd.len());

    for &code in nfd {
        if code < 0x80 {
            out.push(0x02 + code as u8);
        } else {
            out.push(0x82 + (code >> 14) as u8);
            out.push(0x02 + ((code >> 7) & 0x7F) as u8);
            out.push(0x02 + (code & 0x7F) as u8);
        }
    }

    out
}

/// Emit a pending run of common weights. The window [bot, top] splits
/// in half: runs closed by a greater weight count down from the top,
/// runs closed by a smaller weight (or the level end) count up from
/// the bottom. Runs longer than a half window spill into chunk bytes
/// that keep the ordering intact.
fn flush_common(out: &mut Vec<u8>, count: &mut usize, next_greater: bool, bot: u8, top: u8) {
    if *count == 0 {
        return;
    }

    let half = usize::from(top - bot) / 2;

    if next_greater {
        let chunk = top - half as u8;
        while *count > half {
            out.push(chunk);
            *count -= half;
        }
        out.push(top - (*count as u8 - 1));
    } else {
        let chunk = bot + half as u8;
        while *count > half {
            out.push(chunk);
            *count -= half;
        }
        out.push(bot + (*count as u8 - 1));
    }

    *count = 0;
}
