//! Glob matching for cache keys.
//!
//! `*` matches any run of characters, including none. Every other character
//! matches itself.

/// Checks if a cache key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use coachbase_core::cache::pattern_matches;
///
/// assert!(pattern_matches("focus_area:list:*", "focus_area:list:active"));
/// assert!(pattern_matches("user:*:challenge:*", "user:42:challenge:open"));
/// assert!(!pattern_matches("user:*", "focus_area:1"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern = pattern.as_bytes();
    let key = key.as_bytes();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, k));
                p += 1;
            }
            Some(&c) if c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match backtrack {
                // Let the last star swallow one more character and retry.
                Some((star, matched)) => {
                    p = star + 1;
                    k = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Returns true if the pattern contains a wildcard.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains('*')
}
