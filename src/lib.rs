use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;

mod compare;
mod elements;
mod implicit;
mod normalize;
mod options;
mod partial;
mod sortkey;
mod table;
mod weights;

pub use normalize::{Normalizer, StandardNormalizer};
pub use options::{AlternateHandling, CaseFirst, CollationOptions, Strength};
pub use table::{TableBuilder, WeightTable};
pub use weights::Weights;

//
// Errors
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollationError {
    /// A caller-supplied argument is out of range for this collator.
    IllegalArgument(&'static str),
    /// The destination buffer is too small; `needed` is the full size.
    BufferOverflow { needed: usize },
    /// Weight data failed validation.
    BadData(String),
    /// A lookup structure produced a value that cannot occur with valid
    /// data; indicates a table bug, not a usage bug.
    InternalInconsistency(&'static str),
}

impl fmt::Display for CollationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalArgument(what) => write!(f, "illegal argument: {what}"),
            Self::BufferOverflow { needed } => {
                write!(f, "destination buffer too small, need {needed} bytes")
            }
            Self::BadData(what) => write!(f, "bad weight data: {what}"),
            Self::InternalInconsistency(what) => write!(f, "internal inconsistency: {what}"),
        }
    }
}

impl std::error::Error for CollationError {}

//
// Static/const
//

static DEMO_KEYS: &str = include_str!("data/demo_keys.txt");

/// A small demonstration tailoring, parsed once on first use. Covers
/// basic Latin, some accents and precomposed letters, digits, kana,
/// Jamo, a couple of contractions, and variable punctuation.
pub static DEMO_TABLE: Lazy<WeightTable> =
    Lazy::new(|| WeightTable::from_allkeys(DEMO_KEYS).unwrap());

//
// Collator
//

/// A weight table plus attributes. Construction is fallible (the
/// attributes are validated against the table); afterwards the
/// collator is read-only and can be shared freely across threads.
/// Changing attributes goes through `set_options`, which needs
/// exclusive access and rebuilds the derived fast-path cache.
pub struct Collator {
    table: WeightTable,
    options: CollationOptions,
    normalizer: Box<dyn Normalizer>,
    variable_top: u16,
    latin: compare::LatinCache,
}

impl Collator {
    pub fn new(table: WeightTable, options: CollationOptions) -> Result<Self, CollationError> {
        Self::with_normalizer(table, options, Box::new(StandardNormalizer))
    }

    /// Construct with a caller-supplied normalization collaborator.
    pub fn with_normalizer(
        table: WeightTable,
        options: CollationOptions,
        normalizer: Box<dyn Normalizer>,
    ) -> Result<Self, CollationError> {
        let variable_top = resolve_variable_top(&table, &options)?;
        validate_reorder(&options)?;
        let latin = compare::LatinCache::build(&table, &options);

        Ok(Self {
            table,
            options,
            normalizer,
            variable_top,
            latin,
        })
    }

    /// Replace the attributes, rebuilding derived caches. On error the
    /// collator is left exactly as it was.
    pub fn set_options(&mut self, options: CollationOptions) -> Result<(), CollationError> {
        let variable_top = resolve_variable_top(&self.table, &options)?;
        validate_reorder(&options)?;

        self.latin = compare::LatinCache::build(&self.table, &options);
        self.options = options;
        self.variable_top = variable_top;
        Ok(())
    }

    pub fn options(&self) -> &CollationOptions {
        &self.options
    }

    pub fn table(&self) -> &WeightTable {
        &self.table
    }

    /// Compare two strings level by level without building sort keys.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        compare::compare(self, a, b)
    }

    /// The binary sort key: NUL-terminated, levels separated by 0x01.
    /// Byte order over keys equals `compare` order over strings.
    pub fn sort_key(&self, text: &str) -> Vec<u8> {
        let codes: Vec<u32> = text.chars().map(|c| c as u32).collect();

        let mut iter =
            elements::CeIter::new(&self.table, &self.options, self.normalizer.as_ref(), &codes);
        let flagged = iter.collect_flagged();
        let filtered = sortkey::filter_ces(&flagged, &self.options, self.variable_top);

        let nfd = if self.options.strength >= Strength::Identical {
            self.normalizer.decompose(&codes)
        } else {
            Vec::new()
        };

        sortkey::assemble_key(&filtered, &nfd, &self.table, &self.options)
    }

    /// Size-only preflight for `sort_key_into`.
    pub fn sort_key_len(&self, text: &str) -> usize {
        self.sort_key(text).len()
    }

    /// Write the sort key into a caller-provided buffer. A short buffer
    /// is a recoverable error carrying the required size.
    pub fn sort_key_into(&self, text: &str, dest: &mut [u8]) -> Result<usize, CollationError> {
        let key = self.sort_key(text);

        if dest.len() < key.len() {
            return Err(CollationError::BufferOverflow { needed: key.len() });
        }

        dest[..key.len()].copy_from_slice(&key);
        Ok(key.len())
    }

    /// Generate the sort key in caller-sized chunks. `state = (0, 0)`
    /// starts a session; the state is advanced in place and is owned by
    /// exactly one session at a time. Concatenating the chunks equals
    /// `sort_key` for every chunking.
    pub fn next_sort_key_part(
        &self,
        text: &str,
        state: &mut (u32, u32),
        dest: &mut [u8],
    ) -> Result<usize, CollationError> {
        partial::next_sort_key_part(self, text, state, dest)
    }

    pub(crate) fn normalizer(&self) -> &dyn Normalizer {
        self.normalizer.as_ref()
    }

    pub(crate) fn latin(&self) -> &compare::LatinCache {
        &self.latin
    }

    pub(crate) fn resolved_variable_top(&self) -> u16 {
        self.variable_top
    }
}

fn resolve_variable_top(
    table: &WeightTable,
    options: &CollationOptions,
) -> Result<u16, CollationError> {
    let top = options.variable_top.unwrap_or_else(|| table.variable_top());

    // The quaternary level reserves the high lead bytes for run counts.
    if top >= 0xF000 {
        return Err(CollationError::IllegalArgument(
            "variable top primary too long",
        ));
    }

    Ok(top)
}

fn validate_reorder(options: &CollationOptions) -> Result<(), CollationError> {
    if let Some(perm) = &options.reorder {
        let mut seen = [false; 256];
        for &b in perm.iter() {
            if seen[b as usize] {
                return Err(CollationError::IllegalArgument(
                    "reorder table is not a permutation",
                ));
            }
            seen[b as usize] = true;
        }

        // Lead bytes live in 0x02..=0xFE; mapping one onto the NUL
        // terminator or the level separator would corrupt key framing.
        for lead in 0x02..=0xFE_usize {
            if !(0x02..=0xFE).contains(&perm[lead]) {
                return Err(CollationError::IllegalArgument(
                    "reorder table maps a lead byte onto a reserved byte",
                ));
            }
        }
    }

    Ok(())
}

//
// Functions, public
//

/// Convenience comparison with an identity early exit.
pub fn collate(collator: &Collator, a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    collator.compare(a, b)
}
