use unicode_canonical_combining_class::get_canonical_combining_class as get_ccc;
use unicode_normalization::UnicodeNormalization;

//
// Normalization collaborator
//

/// The slice of normalization the collation engine actually needs:
/// combining classes, single-character NFD, and FCD boundary checks.
/// The engine never normalizes text itself; it asks this collaborator.
pub trait Normalizer: Send + Sync {
    fn combining_class(&self, code: u32) -> u8;

    /// Append the canonical decomposition of one code point, in
    /// canonical order. A code point with no decomposition is appended
    /// as itself.
    fn decompose_code(&self, code: u32, out: &mut Vec<u32>);

    /// Combining class of the first code point of the NFD form.
    fn lead_ccc(&self, code: u32) -> u8 {
        let mut nfd = Vec::new();
        self.decompose_code(code, &mut nfd);
        match nfd.first() {
            Some(&first) => self.combining_class(first),
            None => 0,
        }
    }

    /// Combining class of the last code point of the NFD form.
    fn trail_ccc(&self, code: u32) -> u8 {
        let mut nfd = Vec::new();
        self.decompose_code(code, &mut nfd);
        match nfd.last() {
            Some(&last) => self.combining_class(last),
            None => 0,
        }
    }

    /// NFD of a whole span: decompose every code point, then put
    /// non-starter runs in canonical order.
    fn decompose(&self, text: &[u32]) -> Vec<u32> {
        let mut nfd = Vec::with_capacity(text.len());
        for &code in text {
            self.decompose_code(code, &mut nfd);
        }
        canonical_reorder(self, &mut nfd);
        nfd
    }

    /// FCD check: every adjacent pair must satisfy
    /// `trail_ccc(a) <= lead_ccc(b)` unless `b` starts a new sequence.
    fn is_fcd(&self, text: &[u32]) -> bool {
        let mut prev_trail = 0_u8;

        for &code in text {
            let lead = self.lead_ccc(code);
            if lead != 0 && prev_trail > lead {
                return false;
            }
            prev_trail = self.trail_ccc(code);
        }

        true
    }
}

/// Stable-sort each maximal run of non-starters by combining class.
fn canonical_reorder<N: Normalizer + ?Sized>(normalizer: &N, text: &mut [u32]) {
    let mut start = 0;

    while start < text.len() {
        if normalizer.combining_class(text[start]) == 0 {
            start += 1;
            continue;
        }

        let mut end = start + 1;
        while end < text.len() && normalizer.combining_class(text[end]) != 0 {
            end += 1;
        }

        text[start..end].sort_by_key(|&c| normalizer.combining_class(c));
        start = end;
    }
}

/// Default collaborator, backed by the unicode-normalization and
/// canonical-combining-class crates.
pub struct StandardNormalizer;

impl Normalizer for StandardNormalizer {
    fn combining_class(&self, code: u32) -> u8 {
        match char::from_u32(code) {
            Some(c) => get_ccc(c) as u8,
            // Surrogates and out-of-range values; both sort via the
            // unassigned path, where the class is irrelevant.
            None => 0,
        }
    }

    fn decompose_code(&self, code: u32, out: &mut Vec<u32>) {
        match char::from_u32(code) {
            Some(c) => out.extend(std::iter::once(c).nfd().map(|d| d as u32)),
            None => out.push(code),
        }
    }
}
