//! Answer extraction from free-form responses

use std::sync::OnceLock;

use regex::Regex;

fn answer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"The answer is\s*\((\w)\)").expect("answer pattern is a valid regex")
    })
}

/// Ordinal of the chosen option in `text` (a = 0, b = 1, ...).
///
/// Only the first `The answer is (x)` occurrence counts. The letter is
/// lower-cased before conversion, so `(D)` and `(d)` both give 3. Letters past
/// `d` are returned as-is and simply never match the ground truth.
pub fn extract_answer(text: &str) -> Option<i64> {
    let caps = answer_pattern().captures(text)?;
    let letter = caps.get(1)?.as_str().chars().next()?;
    let lower = letter.to_lowercase().next()?;
    Some(lower as i64 - 'a' as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_choice() {
        assert_eq!(extract_answer("The answer is (b) Paris."), Some(1));
    }

    #[test]
    fn test_uppercase_choice() {
        assert_eq!(extract_answer("The answer is (D) ..."), Some(3));
    }

    #[test]
    fn test_no_pattern() {
        assert_eq!(extract_answer("I think it is Paris."), None);
        assert_eq!(extract_answer("the answer is (b)"), None);
        assert_eq!(extract_answer("The answer is b"), None);
    }

    #[test]
    fn test_whitespace_and_first_match() {
        assert_eq!(extract_answer("The answer is(a)"), Some(0));
        assert_eq!(extract_answer("The answer is\n  (c) foo. The answer is (a)"), Some(2));
    }

    #[test]
    fn test_reasoning_before_answer() {
        let text = "<think>Wait, maybe (a)? No.</think>\nThe answer is (c) 42";
        assert_eq!(extract_answer(text), Some(2));
    }
}
