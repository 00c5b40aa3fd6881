//! Wildcard pattern matching for `like` predicates.

/// Matches `text` against a wildcard pattern.
///
/// `%` matches any run of characters (including none), `_` matches
/// exactly one. Every other character matches itself; there is no escape
/// syntax, so a literal `%` or `_` cannot be matched. With
/// `case_insensitive` set, both sides are lowercased before matching.
///
/// # Example
///
/// ```
/// use portico_store::like_match;
///
/// assert!(like_match("L%", "Lups", false));
/// assert!(like_match("_emmi", "Lemmi", false));
/// assert!(!like_match("l%", "Lups", false));
/// assert!(like_match("l%", "Lups", true));
/// ```
#[must_use]
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
        let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();
        return match_chars(&pattern, &text);
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_chars(&pattern, &text)
}

/// Iterative wildcard walk with backtracking to the last `%`.
fn match_chars(pattern: &[char], text: &[char]) -> bool {
    let mut p = 0;
    let mut t = 0;
    // Position in the pattern after the most recent `%`, and the text
    // position that `%` is currently assumed to have consumed up to.
    let mut restart: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) && pattern[p] != '%' {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            restart = Some((p + 1, t));
            p += 1;
        } else if let Some((rp, rt)) = restart {
            // Let the last `%` swallow one more character and retry.
            restart = Some((rp, rt + 1));
            p = rp;
            t = rt + 1;
        } else {
            return false;
        }
    }
    // Trailing `%` runs match the empty remainder.
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}
