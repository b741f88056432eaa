use std::collections::VecDeque;

use crate::implicit::implicit_ces;
use crate::normalize::Normalizer;
use crate::options::CollationOptions;
use crate::table::{ContractionNode, Lookup, WeightTable};
use crate::weights::{self, Ce, COMMON_SECONDARY, COMMON_TERTIARY};

//
// Collation element iteration
//

const HANGUL_S_BASE: u32 = 0xAC00;
const HANGUL_S_LAST: u32 = 0xD7A3;
const HANGUL_L_BASE: u32 = 0x1100;
const HANGUL_V_BASE: u32 = 0x1161;
const HANGUL_T_BASE: u32 = 0x11A7;
const HANGUL_V_COUNT: u32 = 21;
const HANGUL_T_COUNT: u32 = 28;

/// Numeric runs longer than this are chunked into separate mantissa
/// groups at this boundary, never mid-pair.
const MAX_NUMERIC_DIGITS: usize = 252;

/// Pulls code points from a source buffer, resolves them against the
/// weight table, and yields packed CEs in logical order. One instance
/// per traversal; the shared table and options are never written.
///
/// Reads pass through three layers: a pushback queue (lookahead that
/// did not pan out), the normalization side buffer (spans rewritten
/// after a failed FCD check), and the source itself.
pub(crate) struct CeIter<'a> {
    table: &'a WeightTable,
    options: &'a CollationOptions,
    normalizer: &'a dyn Normalizer,
    src: &'a [u32],
    pos: usize,
    pushback: VecDeque<u32>,
    norm_buf: VecDeque<u32>,
    pending: VecDeque<Ce>,
    /// Source positions below this are proven canonically ordered and
    /// are never rescanned.
    fcd_clear_until: usize,
    hiragana: bool,
    // Backward iteration state: everything above `bpos` has already
    // been yielded by `prev_ce`.
    bpos: usize,
    back_ces: Vec<Ce>,
}

impl<'a> CeIter<'a> {
    pub(crate) fn new(
        table: &'a WeightTable,
        options: &'a CollationOptions,
        normalizer: &'a dyn Normalizer,
        src: &'a [u32],
    ) -> Self {
        Self {
            table,
            options,
            normalizer,
            src,
            pos: 0,
            pushback: VecDeque::new(),
            norm_buf: VecDeque::new(),
            pending: VecDeque::new(),
            fcd_clear_until: 0,
            hiragana: false,
            bpos: src.len(),
            back_ces: Vec::new(),
        }
    }

    /// Whether the most recent CE came from a Hiragana code point.
    pub(crate) fn hiragana_flag(&self) -> bool {
        self.hiragana
    }

    pub(crate) fn next_ce(&mut self) -> Option<Ce> {
        loop {
            if let Some(ce) = self.pending.pop_front() {
                return Some(ce);
            }

            let code = self.next_source_code()?;
            self.hiragana = (0x3041..=0x309F).contains(&code);

            if let Some(ce) = self.resolve(code) {
                return Some(ce);
            }
        }
    }

    /// Mirror of `next_ce`: yields the same CEs in reverse order.
    ///
    /// Works by resolving a bounded window forward and draining it back
    /// to front. The window reaches back past non-starters, contraction
    /// trailing units, and (under numeric collation) digits, so nothing
    /// that combines leftward can straddle its left edge.
    pub(crate) fn prev_ce(&mut self) -> Option<Ce> {
        if let Some(ce) = self.back_ces.pop() {
            return Some(ce);
        }
        if self.bpos == 0 {
            return None;
        }

        let end = self.bpos;
        let mut start = end - 1;
        while start > 0 {
            let code = self.src[start];
            let combines = self.normalizer.combining_class(code) != 0
                || self.table.is_contraction_trailer(code)
                || (self.options.numeric && self.table.digit_value(code).is_some());
            if !combines {
                break;
            }
            start -= 1;
        }

        let mut window = CeIter::new(self.table, self.options, self.normalizer, &self.src[start..end]);
        while let Some(ce) = window.next_ce() {
            self.back_ces.push(ce);
        }

        self.bpos = start;
        self.back_ces.pop()
    }

    /// Drain the whole source, collecting each CE with its Hiragana flag.
    pub(crate) fn collect_flagged(&mut self) -> Vec<(Ce, bool)> {
        let mut out = Vec::with_capacity(self.src.len());
        while let Some(ce) = self.next_ce() {
            out.push((ce, self.hiragana_flag()));
        }
        out
    }

    fn resolve(&mut self, code: u32) -> Option<Ce> {
        let table = self.table;

        if self.options.numeric {
            if let Some(value) = table.digit_value(code) {
                self.numeric_run(value);
                return self.pending.pop_front();
            }
        }

        match table.lookup(code) {
            Lookup::Ces(run) => {
                self.pending.extend(&run[1..]);
                Some(run[0])
            }
            Lookup::Contraction { ces, node } => Some(self.contraction(ces, node)),
            Lookup::Missing => {
                if (HANGUL_S_BASE..=HANGUL_S_LAST).contains(&code) {
                    self.decompose_hangul(code);
                    return None;
                }

                let [first, second] = implicit_ces(code);
                self.pending.push_back(second);
                Some(first)
            }
        }
    }

    /// Longest-match contraction scan with explicit restore: characters
    /// read past the final match go back onto the pushback queue. A
    /// non-matching non-starter with a climbing combining class is
    /// skipped and recombined afterwards (discontiguous matching).
    fn contraction(&mut self, base: &'a [Ce], root: &'a ContractionNode) -> Ce {
        let mut best: &[Ce] = base;
        let mut node = root;
        let mut taken: Vec<u32> = Vec::new();
        let mut skipped: Vec<u32> = Vec::new();
        let mut last_skipped_ccc = 0_u8;

        loop {
            let code = match self.next_source_code() {
                Some(code) => code,
                None => break,
            };
            taken.push(code);

            // Once we have skipped marks, anything that breaks the
            // strictly climbing class chain blocks further matching.
            let ccc = self.normalizer.combining_class(code);
            if !skipped.is_empty() && (ccc == 0 || ccc <= last_skipped_ccc) {
                break;
            }

            match node.branch(code) {
                Some(branch) => {
                    if !branch.ces().is_empty() {
                        best = branch.ces();
                        taken.clear();
                    }
                    match branch.next() {
                        Some(next) => node = next,
                        None => break,
                    }
                }
                None => {
                    if ccc != 0 && ccc > last_skipped_ccc {
                        taken.pop();
                        skipped.push(code);
                        last_skipped_ccc = ccc;
                        continue;
                    }
                    break;
                }
            }
        }

        // Restore reading order: skipped marks come before the
        // unconsumed lookahead tail.
        for &code in taken.iter().rev() {
            self.pushback.push_front(code);
        }
        for &code in skipped.iter().rev() {
            self.pushback.push_front(code);
        }

        self.pending.extend(&best[1..]);
        best[0]
    }

    /// Consume a maximal run of decimal digits and queue CEs that sort
    /// the run by numeric value: an exponent CE (pair count) followed
    /// by base-100 mantissa continuations, two pairs per CE.
    fn numeric_run(&mut self, first: u8) {
        let mut digits: Vec<u8> = vec![first];

        loop {
            let code = match self.next_source_code() {
                Some(code) => code,
                None => break,
            };
            match self.table.digit_value(code) {
                Some(value) => digits.push(value),
                None => {
                    self.pushback.push_front(code);
                    break;
                }
            }
        }

        let first_nonzero = digits
            .iter()
            .position(|&d| d != 0)
            .unwrap_or(digits.len() - 1);
        let digits = &digits[first_nonzero..];

        let lead = u16::from(self.table.numeric_lead());

        for chunk in digits.chunks(MAX_NUMERIC_DIGITS) {
            let mut pairs: Vec<u8> = Vec::with_capacity(chunk.len() / 2 + 1);
            let mut i = 0;
            if chunk.len() % 2 == 1 {
                pairs.push(chunk[0]);
                i = 1;
            }
            while i < chunk.len() {
                pairs.push(chunk[i] * 10 + chunk[i + 1]);
                i += 2;
            }

            let exponent = 0x80 + pairs.len() as u16;
            self.pending.push_back(weights::pack(
                (lead << 8) | exponent,
                COMMON_SECONDARY,
                COMMON_TERTIARY,
            ));

            // Mantissa bytes are offset by 4 to stay clear of the
            // terminator, separator, and boundary sentinels.
            for two in pairs.chunks(2) {
                let hi = u16::from(two[0]) + 4;
                let lo = if two.len() == 2 {
                    u16::from(two[1]) + 4
                } else {
                    0
                };
                self.pending.push_back(weights::continuation((hi << 8) | lo));
            }
        }
    }

    /// L/V/T arithmetic decomposition; the Jamo then resolve through
    /// the table like any other code points.
    fn decompose_hangul(&mut self, code: u32) {
        let s = code - HANGUL_S_BASE;
        let l = HANGUL_L_BASE + s / (HANGUL_V_COUNT * HANGUL_T_COUNT);
        let v = HANGUL_V_BASE + (s % (HANGUL_V_COUNT * HANGUL_T_COUNT)) / HANGUL_T_COUNT;
        let t = s % HANGUL_T_COUNT;

        if t != 0 {
            self.pushback.push_front(HANGUL_T_BASE + t);
        }
        self.pushback.push_front(v);
        self.pushback.push_front(l);
    }

    fn next_source_code(&mut self) -> Option<u32> {
        if let Some(code) = self.pushback.pop_front() {
            return Some(code);
        }
        if let Some(code) = self.norm_buf.pop_front() {
            return Some(code);
        }
        if self.pos >= self.src.len() {
            return None;
        }

        if self.options.normalization && self.pos >= self.fcd_clear_until {
            self.fcd_scan();
            if let Some(code) = self.norm_buf.pop_front() {
                return Some(code);
            }
        }

        let code = self.src[self.pos];
        self.pos += 1;
        Some(code)
    }

    /// Walk the combining sequence starting at the current position.
    /// If the combining classes are in canonical order, mark the span
    /// clear; otherwise rewrite it into the side buffer in NFD.
    fn fcd_scan(&mut self) {
        let start = self.pos;
        let mut end = start + 1;
        while end < self.src.len() && self.normalizer.lead_ccc(self.src[end]) != 0 {
            end += 1;
        }

        let mut ordered = true;
        let mut prev_trail = self.normalizer.trail_ccc(self.src[start]);
        for &code in &self.src[start + 1..end] {
            let lead = self.normalizer.lead_ccc(code);
            if prev_trail > lead {
                ordered = false;
                break;
            }
            prev_trail = self.normalizer.trail_ccc(code);
        }

        self.fcd_clear_until = end;

        if !ordered {
            let nfd = self.normalizer.decompose(&self.src[start..end]);
            self.norm_buf.extend(nfd);
            self.pos = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::StandardNormalizer;
    use crate::weights::{is_continuation, primary};
    use crate::DEMO_TABLE;

    fn ces_of(codes: &[u32], options: &CollationOptions) -> Vec<Ce> {
        let mut iter = CeIter::new(&DEMO_TABLE, options, &StandardNormalizer, codes);
        let mut out = Vec::new();
        while let Some(ce) = iter.next_ce() {
            out.push(ce);
        }
        out
    }

    fn str_ces(s: &str, options: &CollationOptions) -> Vec<Ce> {
        let codes: Vec<u32> = s.chars().map(|c| c as u32).collect();
        ces_of(&codes, options)
    }

    #[test]
    fn plain_letters() {
        let options = CollationOptions::default();
        let ces = str_ces("ab", &options);

        assert_eq!(ces.len(), 2);
        assert_eq!(primary(ces[0]), 0x2010);
        assert_eq!(primary(ces[1]), 0x2018);
    }

    #[test]
    fn expansion() {
        let options = CollationOptions::default();
        let ces = str_ces("é", &options);

        assert_eq!(ces.len(), 2);
        assert_eq!(primary(ces[0]), 0x2030);
        assert_eq!(primary(ces[1]), 0);
        assert_eq!(weights::secondary(ces[1]), 0x8A);
    }

    #[test]
    fn contraction_matches() {
        let options = CollationOptions::default();

        let ces = str_ces("ch", &options);
        assert_eq!(ces.len(), 1);
        assert_eq!(primary(ces[0]), 0x2024);

        // 'c' followed by anything else falls back to plain 'c'
        let ces = str_ces("cz", &options);
        assert_eq!(ces.len(), 2);
        assert_eq!(primary(ces[0]), 0x2020);
        assert_eq!(primary(ces[1]), 0x20D8);
    }

    #[test]
    fn discontiguous_contraction() {
        let options = CollationOptions::default();

        // a + cedilla(202) + acute(230): the acute matches the a+acute
        // contraction across the interposed cedilla.
        let ces = ces_of(&[0x61, 0x0327, 0x0301], &options);
        assert_eq!(primary(ces[0]), 0x2014);
        assert_eq!(weights::secondary(ces[1]), 0x90);
        assert_eq!(ces.len(), 2);
    }

    #[test]
    fn contiguous_match_takes_first_mark() {
        let options = CollationOptions::default();

        // The first acute matches directly; the second is an ordinary
        // trailing mark.
        let ces = ces_of(&[0x61, 0x0301, 0x0301], &options);
        assert_eq!(primary(ces[0]), 0x2014);
        assert_eq!(weights::secondary(ces[1]), 0x8A);
        assert_eq!(ces.len(), 2);
    }

    #[test]
    fn discontiguous_blocked_by_repeated_class() {
        let options = CollationOptions::default();

        // Two cedillas before the acute: the second cedilla breaks the
        // strictly climbing class chain, so the contraction never
        // reaches the acute.
        let ces = ces_of(&[0x61, 0x0327, 0x0327, 0x0301], &options);
        assert_eq!(primary(ces[0]), 0x2010);
        assert_eq!(weights::secondary(ces[1]), 0x90);
        assert_eq!(weights::secondary(ces[2]), 0x90);
        assert_eq!(weights::secondary(ces[3]), 0x8A);
        assert_eq!(ces.len(), 4);
    }

    #[test]
    fn fcd_violation_reorders() {
        let options = CollationOptions::default();

        // acute then cedilla is not FCD; after reordering it matches
        // the cedilla-then-acute form exactly.
        let direct = ces_of(&[0x61, 0x0327, 0x0301], &options);
        let reordered = ces_of(&[0x61, 0x0301, 0x0327], &options);
        assert_eq!(direct, reordered);
    }

    #[test]
    fn composed_form_stays_composed_when_fcd() {
        let options = CollationOptions::default();

        // é resolves through its own table entry, no decomposition
        let composed = str_ces("é", &options);
        let decomposed = ces_of(&[0x65, 0x0301], &options);
        assert_eq!(composed.len(), 2);
        assert_eq!(decomposed.len(), 2);
        assert_eq!(composed[0] & 0xFFFF_0000, decomposed[0] & 0xFFFF_0000);
    }

    #[test]
    fn numeric_run_single_vs_double_digit() {
        let options = CollationOptions {
            numeric: true,
            ..Default::default()
        };

        let two = str_ces("2", &options);
        let ten = str_ces("10", &options);

        // exponent CE then one mantissa continuation each
        assert_eq!(two.len(), 2);
        assert_eq!(ten.len(), 2);
        assert!(is_continuation(two[1]));

        // same exponent, mantissa decides
        assert_eq!(primary(two[0]), primary(ten[0]));
        assert!(primary(two[1]) < primary(ten[1]));

        // an extra pair raises the exponent
        let hundred = str_ces("100", &options);
        assert!(primary(hundred[0]) > primary(ten[0]));
    }

    #[test]
    fn numeric_strips_leading_zeros() {
        let options = CollationOptions {
            numeric: true,
            ..Default::default()
        };

        assert_eq!(str_ces("007", &options), str_ces("7", &options));
        assert_eq!(str_ces("000", &options), str_ces("0", &options));
    }

    #[test]
    fn hangul_decomposes_to_jamo() {
        let options = CollationOptions::default();

        // U+AC00 is L+V only
        let ces = ces_of(&[0xAC00], &options);
        assert_eq!(ces.len(), 2);
        assert_eq!(primary(ces[0]), 0x3304);
        assert_eq!(primary(ces[1]), 0x3380);

        // U+AC01 adds a trailing consonant
        let ces = ces_of(&[0xAC01], &options);
        assert_eq!(ces.len(), 3);
        assert_eq!(primary(ces[2]), 0x3410);
    }

    #[test]
    fn implicit_pair_for_unassigned() {
        let options = CollationOptions::default();

        let ces = ces_of(&[0x4E00], &options);
        assert_eq!(ces.len(), 2);
        assert!(!is_continuation(ces[0]));
        assert!(is_continuation(ces[1]));
        assert_eq!(primary(ces[0]), 0xFB41);
    }

    #[test]
    fn unpaired_surrogate_is_unassigned() {
        let options = CollationOptions::default();

        let ces = ces_of(&[0xD800], &options);
        assert_eq!(ces.len(), 2);
        assert_eq!(primary(ces[0]), 0xFBC0 + (0xD800 >> 15));
    }

    #[test]
    fn backward_mirrors_forward() {
        let options = CollationOptions::default();

        for s in ["abc", "chair", "czar", "déjà", "が", "a\u{0327}\u{0301}b"] {
            let codes: Vec<u32> = s.chars().map(|c| c as u32).collect();

            let forward = ces_of(&codes, &options);

            let mut iter = CeIter::new(&DEMO_TABLE, &options, &StandardNormalizer, &codes);
            let mut backward = Vec::new();
            while let Some(ce) = iter.prev_ce() {
                backward.push(ce);
            }
            backward.reverse();

            assert_eq!(forward, backward, "{s}");
        }
    }
}
