//! Weighted Levenshtein distance used by the fuzzy matcher.

use serde::{Deserialize, Serialize};

/// Edit costs for the Levenshtein distance. Deletion and insertion are
/// counted from the needle's point of view: turning the needle into the
/// haystack deletes needle bytes and inserts haystack bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevenshteinCost {
    pub del: usize,
    pub ins: usize,
    pub subs: usize,
}

impl Default for LevenshteinCost {
    fn default() -> Self {
        Self {
            del: 1,
            ins: 1,
            subs: 1,
        }
    }
}

/// Weighted edit distance between `needle` and `haystack`, over bytes.
///
/// Runs in O(m*n) time and O(min(m, n)) memory with a rolling pair of
/// rows. Swapping the operands transposes deletion and insertion costs,
/// which is what lets the DP roll over the shorter string.
pub fn levenshtein(needle: &str, haystack: &str, cost: &LevenshteinCost) -> usize {
    let (a, b, cost) = if haystack.len() < needle.len() {
        // dist(a, b, del, ins) == dist(b, a, ins, del); roll over the shorter side.
        let swapped = LevenshteinCost {
            del: cost.ins,
            ins: cost.del,
            subs: cost.subs,
        };
        (haystack.as_bytes(), needle.as_bytes(), swapped)
    } else {
        (needle.as_bytes(), haystack.as_bytes(), *cost)
    };

    if a.is_empty() {
        return b.len() * cost.ins;
    }

    let mut prev: Vec<usize> = (0..=b.len()).map(|j| j * cost.ins).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        cur[0] = (i + 1) * cost.del;
        for (j, &cb) in b.iter().enumerate() {
            let subs = if ca == cb { 0 } else { cost.subs };
            cur[j + 1] = (prev[j + 1] + cost.del)
                .min(cur[j] + cost.ins)
                .min(prev[j] + subs);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: LevenshteinCost = LevenshteinCost {
        del: 1,
        ins: 1,
        subs: 1,
    };

    #[test]
    fn identical_strings_have_zero_distance() {
        assert_eq!(levenshtein("kernel", "kernel", &UNIT), 0);
        assert_eq!(levenshtein("", "", &UNIT), 0);
    }

    #[test]
    fn distance_to_empty_scales_with_del_cost() {
        let cost = LevenshteinCost {
            del: 3,
            ins: 7,
            subs: 1,
        };
        assert_eq!(levenshtein("abcd", "", &cost), 4 * 3);
        assert_eq!(levenshtein("", "abcd", &cost), 4 * 7);
    }

    #[test]
    fn unit_costs_match_classic_examples() {
        assert_eq!(levenshtein("kitten", "sitting", &UNIT), 3);
        assert_eq!(levenshtein("flaw", "lawn", &UNIT), 2);
        assert_eq!(levenshtein("libfoo.so.1", "libfoo.so.2", &UNIT), 1);
    }

    #[test]
    fn symmetric_only_when_del_equals_ins() {
        let sym = LevenshteinCost {
            del: 2,
            ins: 2,
            subs: 1,
        };
        assert_eq!(
            levenshtein("abc", "abcdef", &sym),
            levenshtein("abcdef", "abc", &sym)
        );

        let asym = LevenshteinCost {
            del: 1,
            ins: 5,
            subs: 1,
        };
        // Turning "abc" into "abcdef" inserts three bytes; the reverse deletes them.
        assert_eq!(levenshtein("abc", "abcdef", &asym), 15);
        assert_eq!(levenshtein("abcdef", "abc", &asym), 3);
    }

    #[test]
    fn substitution_cost_applies_per_byte() {
        let cost = LevenshteinCost {
            del: 10,
            ins: 10,
            subs: 2,
        };
        assert_eq!(levenshtein("abc", "axc", &cost), 2);
        assert_eq!(levenshtein("abc", "xyz", &cost), 6);
    }
}
