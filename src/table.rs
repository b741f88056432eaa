use std::collections::{HashMap, HashSet};

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::weights::{self, Ce, Weights, CASE_MASK, CASE_UPPER, TERTIARY_MASK};
use crate::CollationError;

macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: OnceCell<Regex> = OnceCell::new();
        RE.get_or_init(|| Regex::new($re).unwrap())
    }};
}

//
// Weight table
//

/// The serializable portion of a table: raw weight rows, keyed by code
/// point (singles) or code point sequence (contractions and
/// many-to-many mappings), plus the registered decimal digits.
#[derive(Clone, Default, Deserialize, Serialize)]
struct TableData {
    singles: HashMap<u32, Vec<Weights>>,
    multis: HashMap<Vec<u32>, Vec<Weights>>,
    digits: HashMap<u32, u8>,
}

/// One decision point in a contraction: the possible next code points,
/// sorted, so that a linear "skip while smaller" scan finds the branch
/// or proves its absence.
#[derive(Clone)]
pub(crate) struct ContractionNode {
    branches: Vec<Branch>,
}

#[derive(Clone)]
pub(crate) struct Branch {
    code: u32,
    ces: Vec<Ce>,
    next: Option<ContractionNode>,
}

impl ContractionNode {
    pub(crate) fn branch(&self, code: u32) -> Option<&Branch> {
        for branch in &self.branches {
            if branch.code < code {
                continue;
            }
            if branch.code == code {
                return Some(branch);
            }
            break;
        }

        None
    }
}

impl Branch {
    /// CEs for the path ending at this branch; empty when the branch
    /// only continues into longer contractions.
    pub(crate) fn ces(&self) -> &[Ce] {
        &self.ces
    }

    pub(crate) fn next(&self) -> Option<&ContractionNode> {
        self.next.as_ref()
    }
}

pub(crate) enum Lookup<'a> {
    /// A plain CE run; expansions are already flattened.
    Ces(&'a [Ce]),
    /// The code point starts at least one contraction. `ces` is the
    /// fallback for the code point on its own.
    Contraction {
        ces: &'a [Ce],
        node: &'a ContractionNode,
    },
    Missing,
}

/// Immutable, locale-specific weight data. Built once, then shared
/// read-only by every iterator.
#[derive(Clone)]
pub struct WeightTable {
    data: TableData,
    singles: HashMap<u32, Vec<Ce>>,
    contractions: HashMap<u32, ContractionNode>,
    compressible: [bool; 256],
    variable_top: u16,
    numeric_lead: u8,
    trailers: HashSet<u32>,
}

impl WeightTable {
    /// Parse a tailoring fragment in `allkeys.txt` syntax. DUCET-style
    /// weight values are remapped into key space (see `remap_row`).
    pub fn from_allkeys(text: &str) -> Result<Self, CollationError> {
        let mut builder = TableBuilder::new();

        for line in text.lines() {
            if line.is_empty() || line.starts_with('@') || line.starts_with('#') {
                continue;
            }

            let mut split_at_semicolon = line.split(';');
            let left_of_semicolon = split_at_semicolon.next().unwrap_or_default();
            let right_of_semicolon = match split_at_semicolon.next() {
                Some(s) => s,
                None => return Err(CollationError::BadData(format!("bad key line: {line}"))),
            };
            let left_of_hash = right_of_semicolon.split('#').next().unwrap_or_default();

            let mut codes: Vec<u32> = Vec::new();
            let re_key = regex!(r"[\dA-F]{4,5}");
            for cap in re_key.captures_iter(left_of_semicolon) {
                let as_u32 = u32::from_str_radix(&cap[0], 16)
                    .map_err(|e| CollationError::BadData(e.to_string()))?;
                codes.push(as_u32);
            }

            if codes.is_empty() {
                return Err(CollationError::BadData(format!("bad key line: {line}")));
            }

            let mut rows: Vec<Weights> = Vec::new();
            let re_weights = regex!(r"[*.\dA-F]{15}");
            let re_value = regex!(r"[\dA-F]{4}");

            for cap in re_weights.captures_iter(left_of_hash) {
                let weights_str = &cap[0];
                let mut raw = Weights::new();

                if weights_str.contains('*') {
                    raw.variable = true;
                }

                let mut vals = re_value.captures_iter(weights_str);
                for field in [&mut raw.primary, &mut raw.secondary, &mut raw.tertiary] {
                    let cap = vals
                        .next()
                        .ok_or_else(|| CollationError::BadData(format!("bad weights: {line}")))?;
                    *field = u16::from_str_radix(&cap[0], 16)
                        .map_err(|e| CollationError::BadData(e.to_string()))?;
                }

                rows.push(remap_row(raw)?);
            }

            if codes.len() == 1 {
                let code = codes[0];
                builder.add(code, rows);
                if (0x30..=0x39).contains(&code) {
                    builder.mark_digit(code, (code - 0x30) as u8);
                }
            } else {
                builder.add_contraction(codes, rows);
            }
        }

        builder.build()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CollationError> {
        let data: TableData =
            bincode::deserialize(bytes).map_err(|e| CollationError::BadData(e.to_string()))?;

        TableBuilder { data }.build()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CollationError> {
        bincode::serialize(&self.data).map_err(|e| CollationError::BadData(e.to_string()))
    }

    /// Highest primary weight carrying the variable flag; zero when the
    /// table has no variable entries.
    pub fn variable_top(&self) -> u16 {
        self.variable_top
    }

    pub(crate) fn lookup(&self, code: u32) -> Lookup<'_> {
        match self.singles.get(&code) {
            Some(ces) => match self.contractions.get(&code) {
                Some(node) => Lookup::Contraction { ces, node },
                None => Lookup::Ces(ces),
            },
            None => Lookup::Missing,
        }
    }

    pub(crate) fn digit_value(&self, code: u32) -> Option<u8> {
        self.data.digits.get(&code).copied()
    }

    pub(crate) fn is_compressible(&self, lead: u8) -> bool {
        self.compressible[lead as usize]
    }

    /// Primary lead byte under which numeric-collation CEs sort.
    pub(crate) fn numeric_lead(&self) -> u8 {
        self.numeric_lead
    }

    /// Whether the code point appears as a non-initial unit of any
    /// contraction. Used to pick safe window boundaries when iterating
    /// backward.
    pub(crate) fn is_contraction_trailer(&self, code: u32) -> bool {
        self.trailers.contains(&code)
    }
}

/// Programmatic table construction. Weight rows are given in key space;
/// `build` validates them (see `pack_row`) and derives the lookup
/// structures.
#[derive(Default)]
pub struct TableBuilder {
    data: TableData,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, code: u32, rows: Vec<Weights>) -> &mut Self {
        self.data.singles.insert(code, rows);
        self
    }

    pub fn add_contraction(&mut self, codes: Vec<u32>, rows: Vec<Weights>) -> &mut Self {
        self.data.multis.insert(codes, rows);
        self
    }

    pub fn mark_digit(&mut self, code: u32, value: u8) -> &mut Self {
        self.data.digits.insert(code, value);
        self
    }

    pub fn build(self) -> Result<WeightTable, CollationError> {
        let data = self.data;

        let mut singles: HashMap<u32, Vec<Ce>> = HashMap::new();
        let mut variable_top = 0_u16;
        let mut all_ces: Vec<Ce> = Vec::new();

        for (&code, rows) in &data.singles {
            if rows.is_empty() {
                return Err(CollationError::BadData(format!(
                    "U+{code:04X} has no weight rows"
                )));
            }

            let mut ces = Vec::with_capacity(rows.len());
            for row in rows {
                let ce = pack_row(row)?;
                if row.variable && row.primary > variable_top {
                    variable_top = row.primary;
                }
                ces.push(ce);
            }
            all_ces.extend_from_slice(&ces);
            singles.insert(code, ces);
        }

        let mut trailers: HashSet<u32> = HashSet::new();
        let mut contractions: HashMap<u32, ContractionNode> = HashMap::new();

        for (codes, rows) in &data.multis {
            if codes.len() < 2 {
                return Err(CollationError::BadData(
                    "contraction key shorter than two code points".into(),
                ));
            }
            if rows.is_empty() {
                return Err(CollationError::BadData(format!(
                    "contraction at U+{:04X} has no weight rows",
                    codes[0]
                )));
            }
            if !data.singles.contains_key(&codes[0]) {
                return Err(CollationError::BadData(format!(
                    "contraction starter U+{:04X} has no weights of its own",
                    codes[0]
                )));
            }

            let mut ces = Vec::with_capacity(rows.len());
            for row in rows {
                let ce = pack_row(row)?;
                if row.variable && row.primary > variable_top {
                    variable_top = row.primary;
                }
                ces.push(ce);
            }
            all_ces.extend_from_slice(&ces);

            trailers.extend(&codes[1..]);

            let root = contractions
                .entry(codes[0])
                .or_insert_with(|| ContractionNode { branches: Vec::new() });
            insert_contraction(root, &codes[1..], ces);
        }

        sort_branches(&mut contractions);

        // Variable weights must form a contiguous low range for the
        // threshold model to be meaningful.
        for (code, rows) in &data.singles {
            for row in rows {
                if !row.variable && row.primary != 0 && row.primary <= variable_top {
                    return Err(CollationError::BadData(format!(
                        "non-variable primary {:04X} below the variable top (U+{code:04X})",
                        row.primary
                    )));
                }
            }
        }

        let numeric_lead = match data.digits.iter().find(|(_, &v)| v == 0) {
            Some((&zero, _)) => {
                let ces = singles.get(&zero).ok_or_else(|| {
                    CollationError::BadData(format!("digit U+{zero:04X} has no weights"))
                })?;
                match ces.first() {
                    Some(&ce) => (weights::primary(ce) >> 8) as u8,
                    None => {
                        return Err(CollationError::BadData(format!(
                            "digit U+{zero:04X} has no weights"
                        )))
                    }
                }
            }
            None if data.digits.is_empty() => 0,
            None => {
                return Err(CollationError::BadData(
                    "digit set has no zero digit".into(),
                ))
            }
        };

        let compressible = derive_compressible(&all_ces, numeric_lead)?;

        Ok(WeightTable {
            data,
            singles,
            contractions,
            compressible,
            variable_top,
            numeric_lead,
            trailers,
        })
    }
}

fn insert_contraction(node: &mut ContractionNode, tail: &[u32], ces: Vec<Ce>) {
    let code = tail[0];

    let idx = match node.branches.iter().position(|b| b.code == code) {
        Some(idx) => idx,
        None => {
            node.branches.push(Branch {
                code,
                ces: Vec::new(),
                next: None,
            });
            node.branches.len() - 1
        }
    };

    if tail.len() == 1 {
        node.branches[idx].ces = ces;
    } else {
        let next = node.branches[idx]
            .next
            .get_or_insert_with(|| ContractionNode { branches: Vec::new() });
        insert_contraction(next, &tail[1..], ces);
    }
}

fn sort_branches(contractions: &mut HashMap<u32, ContractionNode>) {
    fn sort_node(node: &mut ContractionNode) {
        node.branches.sort_by_key(|b| b.code);
        for branch in &mut node.branches {
            if let Some(next) = branch.next.as_mut() {
                sort_node(next);
            }
        }
    }

    for node in contractions.values_mut() {
        sort_node(node);
    }
}

/// Validate one key-space weight row and pack it.
///
/// Key space: secondaries are 0, the common 0x05, or above the
/// run-compression window (0x87..=0xFF); tertiaries carry case bits
/// 0x00/0x80 plus a six-bit weight of 0 or 0x05..=0x3F.
fn pack_row(row: &Weights) -> Result<Ce, CollationError> {
    let p = row.primary;
    if p != 0 {
        let lead = p >> 8;
        let trail = p & 0xFF;
        if !(0x02..=0xFE).contains(&lead) {
            return Err(CollationError::BadData(format!(
                "primary weight {p:04X} outside key space"
            )));
        }
        if trail != 0 && !(0x04..=0xFE).contains(&trail) {
            return Err(CollationError::BadData(format!(
                "primary weight {p:04X} has a reserved trail byte"
            )));
        }
    }

    let s = row.secondary;
    if s != 0 && s != u16::from(weights::COMMON_SECONDARY) && !(0x87..=0xFF).contains(&s) {
        return Err(CollationError::BadData(format!(
            "secondary weight {s:04X} outside key space"
        )));
    }

    let t = row.tertiary;
    if t > 0xFF {
        return Err(CollationError::BadData(format!(
            "tertiary weight {t:04X} outside key space"
        )));
    }
    let case = t as u8 & CASE_MASK;
    let t6 = t as u8 & TERTIARY_MASK;
    if case != 0 && case != CASE_UPPER {
        return Err(CollationError::BadData(format!(
            "tertiary weight {t:04X} carries the continuation marker"
        )));
    }
    if t6 != 0 && !(weights::COMMON_TERTIARY..=0x3F).contains(&t6) {
        return Err(CollationError::BadData(format!(
            "tertiary weight {t:04X} outside key space"
        )));
    }

    Ok(weights::pack(row.primary, s as u8, t as u8))
}

/// A lead byte is compressible when every primary under it keeps its
/// trail byte inside 0x04..=0xFE, leaving room for the group-boundary
/// sentinels. Mixing single- and double-byte primaries under one lead
/// would misalign keys and is rejected outright.
fn derive_compressible(
    all_ces: &[Ce],
    numeric_lead: u8,
) -> Result<[bool; 256], CollationError> {
    let mut has_single = [false; 256];
    let mut has_double = [false; 256];
    let mut trail_in_range = [true; 256];

    for &ce in all_ces {
        let p = weights::primary(ce);
        if p == 0 {
            continue;
        }

        let lead = (p >> 8) as usize;
        let trail = (p & 0xFF) as u8;

        if trail == 0 {
            has_single[lead] = true;
        } else {
            has_double[lead] = true;
            if !(0x04..=0xFE).contains(&trail) {
                trail_in_range[lead] = false;
            }
        }
    }

    for lead in 0..256 {
        if has_single[lead] && has_double[lead] {
            return Err(CollationError::BadData(format!(
                "mixed single- and double-byte primaries under lead byte {lead:02X}"
            )));
        }
    }

    // A lead qualifies only if double-byte, in-range throughout, below
    // the quaternary window, and not the numeric lead (numeric CEs
    // splice in synthetic trail bytes under it).
    let mut result = [false; 256];
    for lead in 1..0xF0_usize {
        result[lead] =
            has_double[lead] && trail_in_range[lead] && lead as u8 != numeric_lead;
    }

    Ok(result)
}

/// Remap a DUCET-style weight row into key space and derive case bits
/// from the conventional uppercase tertiary range.
fn remap_row(raw: Weights) -> Result<Weights, CollationError> {
    let secondary = match raw.secondary {
        0 => 0,
        0x20 => u16::from(weights::COMMON_SECONDARY),
        s if s > 0x20 => {
            let mapped = 0x87 + (s - 0x21);
            if mapped > 0xFF {
                return Err(CollationError::BadData(format!(
                    "secondary weight {s:04X} too large to remap"
                )));
            }
            mapped
        }
        s => {
            return Err(CollationError::BadData(format!(
                "secondary weight {s:04X} below the common weight"
            )))
        }
    };

    let upper = (0x08..=0x0C).contains(&raw.tertiary);
    let t6 = match raw.tertiary {
        0 => 0,
        0x02 => u16::from(weights::COMMON_TERTIARY),
        t if (0x03..=0x3B).contains(&t) => t + 4,
        t => {
            return Err(CollationError::BadData(format!(
                "tertiary weight {t:04X} cannot be remapped"
            )))
        }
    };
    let tertiary = if upper { t6 | u16::from(CASE_UPPER) } else { t6 };

    Ok(Weights {
        variable: raw.variable,
        primary: raw.primary,
        secondary,
        tertiary,
    })
}
