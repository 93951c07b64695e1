//! Subdomain label generation from display names

use regex_lite::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

/// Display name reported for requesters whose profile could not be resolved
pub const UNKNOWN_USER: &str = "unknown user";

static NON_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+").expect("static pattern"));

/// Derive a subdomain label from a display name
///
/// "Jane Doe" becomes "j-doe". Empty and unknown names get a random token so
/// anonymous requesters never collide. A single-token name keeps the token
/// and gets a short random suffix.
pub fn subdomain(display_name: &str) -> String {
    let name = display_name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(UNKNOWN_USER) {
        return random_token();
    }

    let tokens: Vec<&str> = name
        .split([' ', '.'])
        .filter(|t| !t.is_empty())
        .collect();

    match tokens.as_slice() {
        [first, second, ..] => {
            let initial: String = first.chars().take(1).collect();
            let label = sanitize(&format!("{}-{}", initial, second));
            if label.is_empty() {
                random_token()
            } else {
                label
            }
        }
        [only] => {
            let label = sanitize(only);
            if label.is_empty() {
                random_token()
            } else {
                format!("{}-{}", label, &random_token()[..6])
            }
        }
        [] => random_token(),
    }
}

fn sanitize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    NON_LABEL
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

fn random_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_tokens() {
        assert_eq!(subdomain("Jane Doe"), "j-doe");
        assert_eq!(subdomain("Ann Lee"), "a-lee");
        assert_eq!(subdomain("john.smith"), "j-smith");
        assert_eq!(subdomain("  Mary   Ann  Jones "), "m-ann");
    }

    #[test]
    fn test_non_alphanumeric_collapsed() {
        assert_eq!(subdomain("Jean-Luc O'Brien"), "j-o-brien");
        assert_eq!(subdomain("Zoë Ünal"), "z-nal");
        assert_eq!(subdomain("A B__C"), "a-b-c");
    }

    #[test]
    fn test_deterministic_for_multi_token() {
        assert_eq!(subdomain("Jane Doe"), subdomain("Jane Doe"));
    }

    #[test]
    fn test_empty_and_unknown_are_random() {
        let a = subdomain("");
        let b = subdomain("");
        assert!(!a.is_empty());
        assert_ne!(a, b);

        let c = subdomain("Unknown User");
        let d = subdomain(UNKNOWN_USER);
        assert_eq!(c.len(), 32);
        assert_ne!(c, d);
    }

    #[test]
    fn test_single_token_gets_suffix() {
        let label = subdomain("Prince");
        assert!(label.starts_with("prince-"));
        assert_eq!(label.len(), "prince-".len() + 6);
        assert!(label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn test_unusable_tokens_fall_back() {
        let label = subdomain("!!! ???");
        assert_eq!(label.len(), 32);
        assert!(label.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
