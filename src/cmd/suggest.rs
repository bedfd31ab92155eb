/*!
suggest.rs - "did you mean" for unknown command names.

Classic Levenshtein distance over chars, compared case-insensitively.
Candidates farther than `MAX_DISTANCE` are dropped; the rest are ordered
by (distance, name) and capped at `MAX_SUGGESTIONS`.
*/

pub const MAX_DISTANCE: usize = 3;
pub const MAX_SUGGESTIONS: usize = 3;

/// Minimum single-character insertions, deletions and substitutions
/// turning `a` into `b`.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    // Keep the row over the shorter string.
    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };
    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut cur = vec![0usize; short.len() + 1];
    for (i, lc) in long.iter().enumerate() {
        cur[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let substitution = prev[j] + usize::from(lc != sc);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(substitution);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[short.len()]
}

/// Up to three candidates within edit distance 3 of `typed`, nearest first,
/// ties broken lexically.
pub fn suggest<'a, I>(typed: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let typed = typed.to_lowercase();
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .map(|c| (levenshtein(&typed, &c.to_lowercase()), c))
        .filter(|(d, _)| *d <= MAX_DISTANCE)
        .collect();
    scored.sort();
    scored.dedup();
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, c)| c.to_string())
        .collect()
}

/// One-line rendering: `Did you mean 'x'?` / `Did you mean one of these? 'a', 'b'`.
pub fn did_you_mean(suggestions: &[String]) -> Option<String> {
    match suggestions {
        [] => None,
        [only] => Some(format!("Did you mean '{only}'?")),
        many => Some(format!(
            "Did you mean one of these? {}",
            many.iter()
                .map(|s| format!("'{s}'"))
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}
