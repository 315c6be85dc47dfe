//! Edit-distance helpers for content-change invalidation.

use std::collections::HashMap;

/// Sentinel for cells outside the band; large enough to never win a `min`.
const OUT_OF_BAND: usize = usize::MAX / 2;

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let limit = a.chars().count().max(b.chars().count());
    levenshtein_within(a, b, limit).unwrap_or(limit)
}

/// Levenshtein distance if it is at most `limit`, `None` otherwise.
///
/// Shared prefixes and suffixes are skipped, a length and character-count
/// lower bound rejects most large rewrites in linear time, and the table is
/// restricted to the diagonal band of width `2 * limit + 1`, so the cost is
/// O(n·limit) rather than O(n·m).
pub fn levenshtein_within(a: &str, b: &str, limit: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if long.len() - short.len() > limit || char_count_bound(long, short) > limit {
        return None;
    }
    if short.is_empty() {
        return Some(long.len());
    }

    let width = short.len();
    let mut prev: Vec<usize> = (0..=width)
        .map(|j| if j <= limit { j } else { OUT_OF_BAND })
        .collect();
    let mut curr = vec![OUT_OF_BAND; width + 1];
    for i in 1..=long.len() {
        let lo = i.saturating_sub(limit).max(1);
        let hi = (i + limit).min(width);
        curr[lo - 1] = if lo == 1 && i <= limit { i } else { OUT_OF_BAND };
        let mut row_min = curr[lo - 1];
        for j in lo..=hi {
            let substitution = prev[j - 1] + usize::from(long[i - 1] != short[j - 1]);
            curr[j] = substitution.min(prev[j] + 1).min(curr[j - 1] + 1);
            row_min = row_min.min(curr[j]);
        }
        if hi < width {
            curr[hi + 1] = OUT_OF_BAND;
        }
        if row_min > limit {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let distance = prev[width];
    (distance <= limit).then_some(distance)
}

/// Lower bound on the edit distance from differing character counts.
fn char_count_bound(long: &[char], short: &[char]) -> usize {
    let mut counts: HashMap<char, isize> = HashMap::new();
    for c in long {
        *counts.entry(*c).or_default() += 1;
    }
    for c in short {
        *counts.entry(*c).or_default() -= 1;
    }
    let surplus: usize = counts.values().filter(|n| **n > 0).map(|n| n.unsigned_abs()).sum();
    let deficit: usize = counts.values().filter(|n| **n < 0).map(|n| n.unsigned_abs()).sum();
    surplus.max(deficit)
}

/// Edit distance normalised by the longer text, in `[0.0, 1.0]`.
///
/// Surrounding whitespace is ignored. Two empty texts have ratio `0.0`.
pub fn change_ratio(old: &str, new: &str) -> f64 {
    let (old, new) = (old.trim(), new.trim());
    let longest = old.chars().count().max(new.chars().count());
    if longest == 0 {
        return 0.0;
    }
    levenshtein(old, new) as f64 / longest as f64
}

/// Whether `change_ratio(old, new) > threshold`, without computing the
/// full distance when the answer is clear early.
pub fn changed_beyond(old: &str, new: &str, threshold: f64) -> bool {
    let (old, new) = (old.trim(), new.trim());
    let longest = old.chars().count().max(new.chars().count());
    if longest == 0 {
        return false;
    }
    let limit = (threshold.max(0.0) * longest as f64).floor() as usize;
    levenshtein_within(old, new, limit).is_none()
}
