// src/lexer/tables/chars.rs
use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest Unicode scalar value.
pub const MAX_CHAR: u32 = 0x10FFFF;

/// A set of code points stored as sorted, disjoint, non-adjacent inclusive ranges.
///
/// Serialized as its list of ranges; deserialized ranges are normalized on the way in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Vec<(u32, u32)>", into = "Vec<(u32, u32)>")]
pub struct CharacterSet {
    ranges: Vec<(u32, u32)>,
}

impl From<Vec<(u32, u32)>> for CharacterSet {
    fn from(ranges: Vec<(u32, u32)>) -> Self {
        let mut set = Self::empty();
        for (lo, hi) in ranges {
            set.insert(lo, hi);
        }
        set
    }
}

impl From<CharacterSet> for Vec<(u32, u32)> {
    fn from(set: CharacterSet) -> Self {
        set.ranges
    }
}

impl CharacterSet {
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn all() -> Self {
        Self {
            ranges: vec![(0, MAX_CHAR)],
        }
    }

    pub fn from_char(c: char) -> Self {
        Self {
            ranges: vec![(c as u32, c as u32)],
        }
    }

    pub fn from_range(lo: char, hi: char) -> Self {
        Self::empty().add_range(lo, hi)
    }

    pub fn add_char(self, c: char) -> Self {
        self.add_range(c, c)
    }

    pub fn add_range(mut self, lo: char, hi: char) -> Self {
        self.insert(lo as u32, hi as u32);
        self
    }

    fn insert(&mut self, lo: u32, hi: u32) {
        let (mut lo, mut hi) = (lo, hi.min(MAX_CHAR));
        if lo > hi {
            return;
        }
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;
        for &(a, b) in &self.ranges {
            if b.saturating_add(1) < lo {
                out.push((a, b));
            } else if hi.saturating_add(1) < a {
                if !placed {
                    out.push((lo, hi));
                    placed = true;
                }
                out.push((a, b));
            } else {
                // overlapping or adjacent: absorb
                lo = lo.min(a);
                hi = hi.max(b);
            }
        }
        if !placed {
            out.push((lo, hi));
        }
        self.ranges = out;
    }

    pub fn union(&self, other: &CharacterSet) -> CharacterSet {
        let mut out = self.clone();
        for &(a, b) in &other.ranges {
            out.insert(a, b);
        }
        out
    }

    pub fn intersection(&self, other: &CharacterSet) -> CharacterSet {
        let (a, b) = (&self.ranges, &other.ranges);
        let mut ranges = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let lo = a[i].0.max(b[j].0);
            let hi = a[i].1.min(b[j].1);
            if lo <= hi {
                ranges.push((lo, hi));
            }
            if a[i].1 < b[j].1 {
                i += 1;
            } else {
                j += 1;
            }
        }
        CharacterSet { ranges }
    }

    pub fn negate(&self) -> CharacterSet {
        let mut ranges = Vec::with_capacity(self.ranges.len() + 1);
        let mut next = 0u32;
        for &(a, b) in &self.ranges {
            if a > next {
                ranges.push((next, a - 1));
            }
            next = b + 1;
        }
        if next <= MAX_CHAR {
            ranges.push((next, MAX_CHAR));
        }
        CharacterSet { ranges }
    }

    pub fn difference(&self, other: &CharacterSet) -> CharacterSet {
        self.intersection(&other.negate())
    }

    pub fn contains(&self, c: char) -> bool {
        let c = c as u32;
        self.ranges
            .binary_search_by(|&(a, b)| {
                if c < a {
                    std::cmp::Ordering::Greater
                } else if c > b {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn does_intersect(&self, other: &CharacterSet) -> bool {
        let (a, b) = (&self.ranges, &other.ranges);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i].0.max(b[j].0) <= a[i].1.min(b[j].1) {
                return true;
            }
            if a[i].1 < b[j].1 {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the only member of the set, if there is exactly one.
    pub fn single_char(&self) -> Option<char> {
        match self.ranges.as_slice() {
            [(a, b)] if a == b => char::from_u32(*a),
            _ => None,
        }
    }

    pub fn ranges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.ranges.iter().copied()
    }

    /// Members of the set; surrogate code points are skipped.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.ranges
            .iter()
            .flat_map(|&(a, b)| a..=b)
            .filter_map(char::from_u32)
    }
}

fn fmt_code_point(f: &mut fmt::Formatter<'_>, c: u32) -> fmt::Result {
    match char::from_u32(c) {
        Some(ch) if !ch.is_control() && ch != '\\' => write!(f, "{ch}"),
        Some(ch) => write!(f, "{}", ch.escape_default()),
        None => write!(f, "\\u{{{c:x}}}"),
    }
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for &(a, b) in &self.ranges {
            fmt_code_point(f, a)?;
            if b > a {
                write!(f, "-")?;
                fmt_code_point(f, b)?;
            }
        }
        write!(f, "]")
    }
}
