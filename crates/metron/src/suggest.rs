//! Near-match suggestions for unknown unit names.

/// Maximum number of names offered in a "Did you mean" list.
pub(crate) const MAX_SUGGESTIONS: usize = 11;

/// The dictionary names closest to `target` under case-insensitive
/// Levenshtein distance, ascending by distance with alphabetical
/// tie-breaking so diagnostics are deterministic.
pub(crate) fn nearest<'a>(names: impl Iterator<Item = &'a str>, target: &str) -> Vec<Box<str>> {
    let target = target.to_lowercase();
    let mut scored: Vec<(usize, &str)> = names
        .map(|name| (levenshtein(&target, &name.to_lowercase()), name))
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored.truncate(MAX_SUGGESTIONS);
    scored.into_iter().map(|(_, name)| name.into()).collect()
}

/// Classic two-row Levenshtein edit distance over scalar values.
fn levenshtein(a: &str, b: &str) -> usize {
    if a.is_empty() {
        return b.chars().count();
    }
    let a: Vec<char> = a.chars().collect();
    let mut previous: Vec<usize> = (0..=a.len()).collect();
    let mut current = vec![0usize; a.len() + 1];
    for (j, cb) in b.chars().enumerate() {
        current[0] = j + 1;
        for (i, &ca) in a.iter().enumerate() {
            let substitution = previous[i] + usize::from(ca != cb);
            current[i + 1] = substitution.min(previous[i + 1] + 1).min(current[i] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[a.len()]
}
