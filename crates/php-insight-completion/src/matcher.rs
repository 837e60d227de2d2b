//! Approximate string matching.
//!
//! Scores are weighted edit distances from the typed text (the reference) to
//! a candidate (the approximation). Candidates are usually longer than what
//! was typed, so inserting characters is cheap, replacing one costs more and
//! deleting one costs the most. Lower is better; `None` rejects the candidate.

use php_insight_types::NAMESPACE_SEPARATOR;

/// Inputs longer than this many characters are never matched.
pub const MAX_INPUT_LENGTH: usize = 255;

/// Distances above this are not acceptable matches.
pub const MAX_DISTANCE: u32 = 300;

const INSERTION_COST: u32 = 1;
const REPLACEMENT_COST: u32 = 100;
const DELETION_COST: u32 = 300;

// The two bonuses sum to less than 1 so they only order candidates of equal
// edit cost.
const WHOLE_WORD_BONUS: f64 = 0.5;
const POSITION_BONUS: f64 = 0.4;

pub trait ApproximateStringMatcher {
    /// Score how well `approximation` approximates `reference`.
    fn score(&self, approximation: &str, reference: &str) -> Option<f64>;
}

impl<M: ApproximateStringMatcher + ?Sized> ApproximateStringMatcher for &M {
    fn score(&self, approximation: &str, reference: &str) -> Option<f64> {
        (**self).score(approximation, reference)
    }
}

/// Weighted Levenshtein distance with a bonus for the reference occurring
/// verbatim in the candidate.
///
/// The bonus rewards the best single occurrence: more for a whole
/// namespace segment, and more the closer the occurrence ends to the end of
/// the candidate. Repeated occurrences never add up.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedLevenshteinMatcher;

impl ApproximateStringMatcher for WeightedLevenshteinMatcher {
    fn score(&self, approximation: &str, reference: &str) -> Option<f64> {
        if approximation == reference {
            return Some(0.0);
        }

        let approximation: Vec<char> = approximation.chars().collect();
        let reference: Vec<char> = reference.chars().collect();
        if approximation.len() > MAX_INPUT_LENGTH || reference.len() > MAX_INPUT_LENGTH {
            return None;
        }
        if lower_bound(reference.len(), approximation.len()) > MAX_DISTANCE {
            return None;
        }

        let distance = weighted_distance(&reference, &approximation)?;
        Some(f64::from(distance) - occurrence_bonus(&approximation, &reference))
    }
}

/// Cheapest conceivable cost given only the lengths.
fn lower_bound(from_len: usize, to_len: usize) -> u32 {
    // Both lengths are within MAX_INPUT_LENGTH, so this cannot overflow.
    if to_len >= from_len {
        (to_len - from_len) as u32 * INSERTION_COST
    } else {
        (from_len - to_len) as u32 * DELETION_COST
    }
}

/// Cost of editing `from` into `to`, or `None` once it must exceed
/// [`MAX_DISTANCE`].
fn weighted_distance(from: &[char], to: &[char]) -> Option<u32> {
    let mut prev: Vec<u32> = (0..=to.len() as u32).map(|j| j * INSERTION_COST).collect();
    let mut curr = vec![0; to.len() + 1];

    for (i, &f) in from.iter().enumerate() {
        curr[0] = (i as u32 + 1) * DELETION_COST;
        for (j, &t) in to.iter().enumerate() {
            let replace = if f == t { 0 } else { REPLACEMENT_COST };
            curr[j + 1] = (prev[j] + replace)
                .min(prev[j + 1] + DELETION_COST)
                .min(curr[j] + INSERTION_COST);
        }
        // Costs only grow along a path, so a row entirely over the limit ends it.
        if curr.iter().all(|&c| c > MAX_DISTANCE) {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[to.len()];
    (distance <= MAX_DISTANCE).then_some(distance)
}

fn occurrence_bonus(approximation: &[char], reference: &[char]) -> f64 {
    if reference.is_empty() || reference.len() > approximation.len() {
        return 0.0;
    }
    let len = approximation.len() as f64;
    let is_edge = |i: Option<&char>| i.map_or(true, |&c| c == NAMESPACE_SEPARATOR);

    approximation
        .windows(reference.len())
        .enumerate()
        .filter(|(_, window)| *window == reference)
        .map(|(start, _)| {
            let end = start + reference.len();
            let before = start.checked_sub(1).and_then(|i| approximation.get(i));
            let whole_word = is_edge(before) && is_edge(approximation.get(end));
            let word = if whole_word { WHOLE_WORD_BONUS } else { 0.0 };
            word + POSITION_BONUS * end as f64 / len
        })
        .fold(0.0, f64::max)
}
