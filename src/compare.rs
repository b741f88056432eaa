use std::cmp::Ordering;

use crate::elements::CeIter;
use crate::implicit::implicit_ces;
use crate::options::CollationOptions;
use crate::sortkey::{self, Level, ShiftFilter};
use crate::table::{Lookup, WeightTable};
use crate::weights::{self, Ce};
use crate::Collator;

//
// Direct string comparison
//

/// Flat per-code-point cache for all-Latin-1 strings. Entries whose
/// true resolution needs more than the cache can hold (contraction
/// starters, long expansions, digits under numeric collation) are
/// marked bail-out; the caller then takes the general path.
///
/// Rebuilt whenever the collator's attributes change.
#[derive(Clone, Copy)]
enum Slot {
    Ces([Ce; 2], u8),
    Bail,
}

pub(crate) struct LatinCache {
    slots: Vec<Slot>,
}

impl LatinCache {
    pub(crate) fn build(table: &WeightTable, options: &CollationOptions) -> Self {
        let mut slots = vec![Slot::Bail; 0x100];

        for code in 0..0x100_u32 {
            slots[code as usize] = match table.lookup(code) {
                Lookup::Contraction { .. } => Slot::Bail,
                Lookup::Ces(run) => {
                    if run.len() > 2 || (options.numeric && table.digit_value(code).is_some()) {
                        Slot::Bail
                    } else {
                        let mut ces = [0; 2];
                        ces[..run.len()].copy_from_slice(run);
                        Slot::Ces(ces, run.len() as u8)
                    }
                }
                Lookup::Missing => Slot::Ces(implicit_ces(code), 2),
            };
        }

        Self { slots }
    }

    /// CEs for an all-Latin-1 string, or None to bail out.
    pub(crate) fn ces(&self, codes: &[u32]) -> Option<Vec<(Ce, bool)>> {
        let mut out = Vec::with_capacity(codes.len());

        for &code in codes {
            if code >= 0x100 {
                return None;
            }
            match self.slots[code as usize] {
                Slot::Bail => return None,
                Slot::Ces(ces, len) => {
                    for &ce in &ces[..len as usize] {
                        out.push((ce, false));
                    }
                }
            }
        }

        Some(out)
    }
}

/// Pulls CEs, applies the variable-weight filter, and hands out
/// effective primaries one at a time, keeping everything it saw for
/// the later levels.
struct PrimaryStream<'a> {
    iter: CeIter<'a>,
    filter: ShiftFilter,
    options: &'a CollationOptions,
    buf: Vec<(Ce, bool)>,
}

impl PrimaryStream<'_> {
    fn next_primary(&mut self) -> Option<u16> {
        loop {
            let ce = self.iter.next_ce()?;
            let hiragana = self.iter.hiragana_flag();
            self.buf.push((ce, hiragana));

            let lce = self.filter.apply(ce, hiragana);
            if lce.suppressed {
                continue;
            }

            let p = weights::primary(ce);
            if p == 0 {
                continue;
            }

            if weights::is_continuation(ce) {
                return Some(p);
            }
            return Some(sortkey::permute_primary(p, self.options));
        }
    }
}

pub(crate) fn compare(collator: &Collator, a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let ca: Vec<u32> = a.chars().map(|c| c as u32).collect();
    let cb: Vec<u32> = b.chars().map(|c| c as u32).collect();

    if let Some(fa) = collator.latin().ces(&ca) {
        if let Some(fb) = collator.latin().ces(&cb) {
            return compare_buffered(collator, &fa, &fb, &ca, &cb);
        }
    }

    let options = collator.options();
    let variable_top = collator.resolved_variable_top();

    let mut sa = PrimaryStream {
        iter: CeIter::new(collator.table(), options, collator.normalizer(), &ca),
        filter: ShiftFilter::new(options, variable_top),
        options,
        buf: Vec::new(),
    };
    let mut sb = PrimaryStream {
        iter: CeIter::new(collator.table(), options, collator.normalizer(), &cb),
        filter: ShiftFilter::new(options, variable_top),
        options,
        buf: Vec::new(),
    };

    loop {
        match (sa.next_primary(), sb.next_primary()) {
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
            }
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => break,
        }
    }

    // Primaries tied through end of string; redo the deeper levels
    // over the buffered CEs, never re-scanning the source.
    compare_buffered(collator, &sa.buf, &sb.buf, &ca, &cb)
}

fn compare_buffered(
    collator: &Collator,
    fa: &[(Ce, bool)],
    fb: &[(Ce, bool)],
    ca: &[u32],
    cb: &[u32],
) -> Ordering {
    let options = collator.options();
    let variable_top = collator.resolved_variable_top();

    let filtered_a = sortkey::filter_ces(fa, options, variable_top);
    let filtered_b = sortkey::filter_ces(fb, options, variable_top);

    let pa = primary_sequence(&filtered_a, options);
    let pb = primary_sequence(&filtered_b, options);
    match pa.cmp(&pb) {
        Ordering::Equal => {}
        other => return other,
    }

    for level in sortkey::levels(options).into_iter().skip(1) {
        let ord = match level {
            Level::Identical => {
                let na = collator.normalizer().decompose(ca);
                let nb = collator.normalizer().decompose(cb);
                na.cmp(&nb)
            }
            _ => {
                let ba = sortkey::level_bytes(level, &filtered_a, &[], collator.table(), options);
                let bb = sortkey::level_bytes(level, &filtered_b, &[], collator.table(), options);
                ba.cmp(&bb)
            }
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

fn primary_sequence(filtered: &[sortkey::LevelCe], options: &CollationOptions) -> Vec<u16> {
    filtered
        .iter()
        .filter(|l| !l.suppressed)
        .filter_map(|l| {
            let p = weights::primary(l.ce);
            if p == 0 {
                None
            } else if weights::is_continuation(l.ce) {
                Some(p)
            } else {
                Some(sortkey::permute_primary(p, options))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AlternateHandling, Strength};
    use crate::DEMO_TABLE;

    fn collator(options: CollationOptions) -> Collator {
        Collator::new(DEMO_TABLE.clone(), options).unwrap()
    }

    #[test]
    fn latin_cache_bails_on_contraction_starter() {
        let c = collator(CollationOptions::default());

        // 'c' starts the ch digraph, 'a' the a-acute contraction
        assert!(c.latin().ces(&[0x63]).is_none());
        assert!(c.latin().ces(&[0x61]).is_none());
        // 'h' only ever trails a contraction, so it caches fine
        assert!(c.latin().ces(&[0x62, 0x68]).is_some());
        // non-Latin-1 input always bails
        assert!(c.latin().ces(&[0x3042]).is_none());
    }

    #[test]
    fn latin_cache_bails_on_digits_only_when_numeric() {
        let plain = collator(CollationOptions::default());
        assert!(plain.latin().ces(&[0x31]).is_some());

        let numeric = collator(CollationOptions {
            numeric: true,
            ..Default::default()
        });
        assert!(numeric.latin().ces(&[0x31]).is_none());
    }

    #[test]
    fn fast_path_agrees_with_general_path() {
        let c = collator(CollationOptions::default());

        // cacheable strings only: no contraction starters
        let pairs = [
            ("bd", "db"),
            ("bd", "bd!"),
            ("behold", "bold"),
            ("b", "B"),
            ("item2", "item10"),
        ];

        for (x, y) in pairs {
            let cx: Vec<u32> = x.chars().map(|ch| ch as u32).collect();
            let cy: Vec<u32> = y.chars().map(|ch| ch as u32).collect();

            let fx = c.latin().ces(&cx).unwrap();
            let fy = c.latin().ces(&cy).unwrap();
            let fast = compare_buffered(&c, &fx, &fy, &cx, &cy);

            let mut ix = CeIter::new(c.table(), c.options(), c.normalizer(), &cx);
            let mut iy = CeIter::new(c.table(), c.options(), c.normalizer(), &cy);
            let gx = ix.collect_flagged();
            let gy = iy.collect_flagged();
            let general = compare_buffered(&c, &gx, &gy, &cx, &cy);

            assert_eq!(fast, general, "{x} vs {y}");
            assert_eq!(fast, c.compare(x, y), "{x} vs {y}");
        }
    }

    #[test]
    fn shifted_punctuation_compares_at_quaternary() {
        let c = collator(CollationOptions {
            strength: Strength::Quaternary,
            alternate: AlternateHandling::Shifted,
            ..Default::default()
        });

        // primary/secondary/tertiary ignore the hyphen entirely
        assert_eq!(c.compare("de-luge", "deluge"), Ordering::Less);
        assert_eq!(c.compare("de luge", "de-luge"), Ordering::Less);

        let weaker = collator(CollationOptions {
            strength: Strength::Tertiary,
            alternate: AlternateHandling::Shifted,
            ..Default::default()
        });
        assert_eq!(weaker.compare("de-luge", "deluge"), Ordering::Equal);
    }

    #[test]
    fn non_ignorable_sorts_punctuation_by_primary() {
        let c = collator(CollationOptions::default());

        // the hyphen's low primary participates like any letter
        assert_eq!(c.compare("de-luge", "deluge"), Ordering::Less);
        assert_eq!(c.compare("de-luge", "death"), Ordering::Less);
    }
}
