use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use regex::Regex;

use crate::core::{Result, StoreError};

const REGEX_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(200) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> =
        Arc::new(Mutex::new(LruCache::new(REGEX_CACHE_CAPACITY)));
}

/// Converts a SQL LIKE pattern into a regular expression anchored on the whole text.
///
/// `%` matches any sequence and `_` exactly one character, newlines included.
/// Without an `ESCAPE` clause SQLite has no escape character, so a backslash
/// is an ordinary character here too.
pub fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str(r"(?s)\A");

    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push_str(r"\z");
    regex
}

/// Fast path for patterns with at most a leading and trailing `%`.
fn fast_path_like(text: &str, pattern: &str) -> Option<bool> {
    if pattern.contains('_') {
        return None;
    }

    let text = text.to_lowercase();
    let leading = pattern.starts_with('%');
    let trailing = pattern.len() > 1 && pattern.ends_with('%');
    let core = pattern
        .trim_start_matches('%')
        .trim_end_matches('%')
        .to_lowercase();

    if core.contains('%') {
        return None;
    }

    Some(match (leading, trailing) {
        (false, false) if pattern.is_empty() => text.is_empty(),
        (false, false) => text == core,
        (false, true) => text.starts_with(&core),
        (true, false) if pattern == "%" => true,
        (true, false) => text.ends_with(&core),
        (true, true) => text.contains(&core),
    })
}

/// Compiles `pattern` (a regular expression) once and serves it from the LRU cache afterwards.
pub fn cached_regex(pattern: &str, case_insensitive: bool) -> Result<Arc<Regex>> {
    let cache_key = if case_insensitive {
        format!("i:{}", pattern)
    } else {
        format!("s:{}", pattern)
    };

    if let Some(regex) = REGEX_LRU_CACHE.lock()?.get(&cache_key) {
        return Ok(Arc::clone(regex));
    }

    let compiled = regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| StoreError::ExecutionError(format!("Invalid pattern '{}': {}", pattern, e)))?;
    let compiled = Arc::new(compiled);

    REGEX_LRU_CACHE
        .lock()?
        .put(cache_key, Arc::clone(&compiled));

    Ok(compiled)
}

/// Case-insensitive LIKE, matching SQLite's default behaviour for ASCII text.
pub fn eval_like(text: &str, pattern: &str) -> Result<bool> {
    if let Some(result) = fast_path_like(text, pattern) {
        return Ok(result);
    }

    let regex = cached_regex(&like_to_regex(pattern), true)?;
    Ok(regex.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_wildcards() {
        assert_eq!(like_to_regex("%abc%"), r"(?s)\A.*abc.*\z");
        assert_eq!(like_to_regex("a_c"), r"(?s)\Aa.c\z");
        assert_eq!(like_to_regex("1.5%"), r"(?s)\A1\.5.*\z");
    }

    #[test]
    fn backslash_is_an_ordinary_character() {
        assert_eq!(like_to_regex(r"100\%"), r"(?s)\A100\\.*\z");
        assert!(eval_like(r"100\ off", r"100\%").unwrap());
        assert!(!eval_like("100%", r"100\%").unwrap());
        assert!(eval_like(r"C:\tools", r"C:\_ools").unwrap());
    }

    #[test]
    fn wildcards_span_newlines() {
        assert!(eval_like("Line one\nsharp saw", "%saw%").unwrap());
        assert!(eval_like("Line one\nsharp saw", "line_one%").unwrap());
        assert!(eval_like("Line one\nsharp saw", "Line%saw").unwrap());
        assert!(!eval_like("sharp saw\n", "%saw").unwrap());

        let regex = cached_regex(&like_to_regex("%saw"), true).unwrap();
        assert!(regex.is_match("Line one\nsharp saw"));
        assert!(!regex.is_match("sharp saw\n"));
    }

    #[test]
    fn like_is_case_insensitive() {
        assert!(eval_like("Blue Widget", "%widget%").unwrap());
        assert!(eval_like("Blue Widget", "blue%").unwrap());
        assert!(eval_like("Blue Widget", "%WIDGET").unwrap());
        assert!(eval_like("widget", "WIDGET").unwrap());
        assert!(!eval_like("Blue Widget", "widget%").unwrap());
    }

    #[test]
    fn underscore_matches_one_character() {
        assert!(eval_like("cat", "c_t").unwrap());
        assert!(!eval_like("cart", "c_t").unwrap());
        assert!(eval_like("Tools & Garden", "%s_&%").unwrap());
    }

    #[test]
    fn percent_alone_matches_everything() {
        assert!(eval_like("", "%").unwrap());
        assert!(eval_like("anything", "%").unwrap());
        assert!(eval_like("", "").unwrap());
        assert!(!eval_like("x", "").unwrap());
    }

    #[test]
    fn regex_cache_reuses_compiled_patterns() {
        let first = cached_regex("^a.*b$", true).unwrap();
        let second = cached_regex("^a.*b$", true).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
