use crate::elements::CeIter;
use crate::options::Strength;
use crate::sortkey;
use crate::{CollationError, Collator};

//
// Resumable partial sort keys
//

// State word layout: `state.0` is the ordinal of the level currently
// being emitted, in strict key order; one past the last level means
// the terminating NUL is due, one past that means the key is done.
// `state.1` is the byte offset inside the level's stream (including
// its leading separator). Levels regenerate deterministically from the
// immutable collator and the text, so this pair is a complete resume
// point at any chunk boundary, including mid-run and mid-primary.

/// Write up to `dest.len()` further key bytes, advancing `state`.
/// Starts a new session when `state == (0, 0)`. Concatenating the
/// written chunks over any sequence of calls reproduces `sort_key`
/// exactly. After the key is exhausted, pads `dest` with zeros and
/// reports zero bytes written.
pub(crate) fn next_sort_key_part(
    collator: &Collator,
    text: &str,
    state: &mut (u32, u32),
    dest: &mut [u8],
) -> Result<usize, CollationError> {
    let options = collator.options();
    let levels = sortkey::levels(options);
    let terminator = levels.len() as u32;
    let exhausted = terminator + 1;

    if state.0 > exhausted {
        return Err(CollationError::IllegalArgument("invalid iteration state"));
    }

    let codes: Vec<u32> = text.chars().map(|c| c as u32).collect();
    let mut iter = CeIter::new(collator.table(), options, collator.normalizer(), &codes);
    let flagged = iter.collect_flagged();
    let filtered = sortkey::filter_ces(&flagged, options, collator.resolved_variable_top());
    let nfd = if options.strength >= Strength::Identical {
        collator.normalizer().decompose(&codes)
    } else {
        Vec::new()
    };

    let mut written = 0;

    while written < dest.len() {
        if state.0 == exhausted {
            for byte in dest[written..].iter_mut() {
                *byte = 0;
            }
            break;
        }

        if state.0 == terminator {
            dest[written] = 0;
            written += 1;
            state.0 = exhausted;
            state.1 = 0;
            continue;
        }

        let level_idx = state.0 as usize;
        let mut bytes =
            sortkey::level_bytes(levels[level_idx], &filtered, &nfd, collator.table(), options);
        if level_idx > 0 {
            bytes.insert(0, sortkey::LEVEL_SEPARATOR);
        }

        let offset = state.1 as usize;
        if offset >= bytes.len() {
            state.0 += 1;
            state.1 = 0;
            continue;
        }

        let n = (bytes.len() - offset).min(dest.len() - written);
        dest[written..written + n].copy_from_slice(&bytes[offset..offset + n]);
        written += n;
        state.1 += n as u32;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AlternateHandling, CollationOptions};
    use crate::DEMO_TABLE;

    fn chunked_key(collator: &Collator, text: &str, chunk: usize) -> Vec<u8> {
        let mut state = (0_u32, 0_u32);
        let mut out = Vec::new();
        let mut dest = vec![0_u8; chunk];

        loop {
            let n = collator
                .next_sort_key_part(text, &mut state, &mut dest)
                .unwrap();
            out.extend_from_slice(&dest[..n]);
            if n < chunk {
                break;
            }
        }

        out
    }

    #[test]
    fn chunks_reassemble_the_full_key() {
        let sets = [
            CollationOptions::default(),
            CollationOptions {
                strength: Strength::Quaternary,
                alternate: AlternateHandling::Shifted,
                ..Default::default()
            },
            CollationOptions {
                strength: Strength::Identical,
                french_secondary: true,
                numeric: true,
                ..Default::default()
            },
        ];

        for options in sets {
            let collator = Collator::new(DEMO_TABLE.clone(), options).unwrap();

            for text in ["", "a", "chair", "de-luge 42", "déjà", "가나?"] {
                let full = collator.sort_key(text);

                for chunk in [1, 2, 3, 5, 8, 64] {
                    assert_eq!(
                        chunked_key(&collator, text, chunk),
                        full,
                        "text {text:?}, chunk {chunk}"
                    );
                }
            }
        }
    }

    #[test]
    fn exhausted_state_pads_with_zeros() {
        let collator = Collator::new(DEMO_TABLE.clone(), CollationOptions::default()).unwrap();

        let mut state = (0_u32, 0_u32);
        let mut dest = vec![0xAA_u8; 64];
        let n = collator
            .next_sort_key_part("a", &mut state, &mut dest)
            .unwrap();
        assert_eq!(n, collator.sort_key_len("a"));

        let n = collator
            .next_sort_key_part("a", &mut state, &mut dest)
            .unwrap();
        assert_eq!(n, 0);
        assert!(dest.iter().all(|&b| b == 0));
    }

    #[test]
    fn garbage_state_is_rejected() {
        let collator = Collator::new(DEMO_TABLE.clone(), CollationOptions::default()).unwrap();

        let mut state = (99, 0);
        let mut dest = [0_u8; 8];
        assert!(matches!(
            collator.next_sort_key_part("a", &mut state, &mut dest),
            Err(CollationError::IllegalArgument(_))
        ));
    }
}
