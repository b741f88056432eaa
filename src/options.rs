//
// Collator attributes. See UTS #35 for the meaning of each knob.
//

/// Comparison level. Each level is only consulted when all previous
/// levels compare equal.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    Primary = 1,
    Secondary = 2,
    Tertiary = 3,
    Quaternary = 4,
    Identical = 5,
}

/// What to do with variable-weight characters (spaces, punctuation,
/// and symbols below the variable top).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlternateHandling {
    /// Variable weights participate at all levels, like any other CE.
    NonIgnorable,
    /// Variable weights are shifted down to the quaternary level.
    Shifted,
}

/// Whether upper case or lower case should sort first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CaseFirst {
    /// No special case ordering; lower case sorts first by tertiary weight.
    Off,
    Lower,
    Upper,
}

#[derive(Debug, Clone)]
pub struct CollationOptions {
    pub strength: Strength,
    pub alternate: AlternateHandling,
    pub case_first: CaseFirst,
    /// Insert a separate case level between secondary and tertiary.
    pub case_level: bool,
    /// Reverse secondary weights by accent span (French accent ordering).
    pub french_secondary: bool,
    /// Compare runs of decimal digits by numeric value.
    pub numeric: bool,
    /// Emit a Hiragana-vs-other marker at the quaternary level. Only
    /// meaningful with `AlternateHandling::NonIgnorable`; shifting takes
    /// precedence at that level.
    pub hiragana_quaternary: bool,
    /// Check input for canonical order and renormalize where needed.
    /// Can be switched off for input known to be FCD.
    pub normalization: bool,
    /// Highest primary weight treated as variable. `None` takes the
    /// threshold recorded in the weight table.
    pub variable_top: Option<u16>,
    /// Primary lead byte permutation for script reordering.
    pub reorder: Option<[u8; 256]>,
}

impl Default for Strength {
    fn default() -> Self {
        Self::Tertiary
    }
}

impl Default for AlternateHandling {
    fn default() -> Self {
        Self::NonIgnorable
    }
}

impl Default for CaseFirst {
    fn default() -> Self {
        Self::Off
    }
}

impl Default for CollationOptions {
    fn default() -> Self {
        Self {
            strength: Strength::default(),
            alternate: AlternateHandling::default(),
            case_first: CaseFirst::default(),
            case_level: false,
            french_secondary: false,
            numeric: false,
            hiragana_quaternary: false,
            normalization: true,
            variable_top: None,
            reorder: None,
        }
    }
}

impl CollationOptions {
    /// True if the quaternary level exists at all under these options.
    pub(crate) fn has_quaternary(&self) -> bool {
        self.strength >= Strength::Quaternary
            && (self.alternate == AlternateHandling::Shifted || self.hiragana_quaternary)
    }

    pub(crate) fn shifted(&self) -> bool {
        self.alternate == AlternateHandling::Shifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = CollationOptions::default();

        assert_eq!(options.strength, Strength::Tertiary);
        assert_eq!(options.alternate, AlternateHandling::NonIgnorable);
        assert_eq!(options.case_first, CaseFirst::Off);
        assert!(options.normalization);
        assert!(!options.has_quaternary());
    }

    #[test]
    fn quaternary_presence() {
        let mut options = CollationOptions {
            strength: Strength::Quaternary,
            alternate: AlternateHandling::Shifted,
            ..Default::default()
        };
        assert!(options.has_quaternary());

        options.alternate = AlternateHandling::NonIgnorable;
        assert!(!options.has_quaternary());

        options.hiragana_quaternary = true;
        assert!(options.has_quaternary());

        options.strength = Strength::Tertiary;
        assert!(!options.has_quaternary());
    }
}
