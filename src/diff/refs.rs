//! Ref/path/range validation for untrusted CLI input, grounded in the same
//! blocklist-plus-allowlist style as `utils/command_security.rs`.

use crate::error::{Result, RouterError, ValidationErrorCode};

const MAX_REF_LEN: usize = 256;
const MAX_PATH_LEN: usize = 4096;
const DANGEROUS_CHARS: &[char] = &[
    '`', '$', '(', ')', ';', '|', '&', '<', '>', '\n', '\r', '\t', '*', '?', '[', ']', '~', '^',
    ':', '\\',
];

/// Reject any ref containing shell metacharacters or path traversal; refs
/// must start with an alphanumeric (prevents option-injection via `-foo`).
pub fn validate_ref(candidate: &str) -> Result<()> {
    if candidate.is_empty() {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidGitRef,
            "ref cannot be empty",
            candidate,
        ));
    }
    if candidate.len() > MAX_REF_LEN {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidGitRef,
            format!("ref exceeds {MAX_REF_LEN} characters"),
            candidate,
        ));
    }
    if !candidate.chars().next().unwrap().is_ascii_alphanumeric() {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidGitRef,
            "ref must start with an alphanumeric character",
            candidate,
        ));
    }
    if candidate.contains("..") {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidGitRef,
            "ref cannot contain '..'",
            candidate,
        ));
    }
    if candidate.chars().any(|c| DANGEROUS_CHARS.contains(&c) || c.is_whitespace()) {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidGitRef,
            "ref contains unsafe characters",
            candidate,
        ));
    }
    Ok(())
}

/// Reject paths with shell metacharacters or traversal components.
pub fn validate_path(candidate: &str) -> Result<()> {
    if candidate.is_empty() || candidate.len() > MAX_PATH_LEN {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidPath,
            "path is empty or exceeds the length limit",
            candidate,
        ));
    }
    if candidate.contains("..") {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidPath,
            "path cannot contain '..'",
            candidate,
        ));
    }
    let unsafe_chars: &[char] = &['`', '$', ';', '|', '&', '<', '>', '\n', '\r', '\0'];
    if candidate.chars().any(|c| unsafe_chars.contains(&c)) {
        return Err(RouterError::validation(
            ValidationErrorCode::InvalidPath,
            "path contains unsafe characters",
            candidate,
        ));
    }
    Ok(())
}

/// A resolved `base..head` (or `base...head`) range specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub base: String,
    pub head: String,
    /// `true` for `...` (merge-base form), `false` for plain `..`.
    pub triple_dot: bool,
}

/// Accepts exactly one of `..` / `...`; rejects multiple operators, empty
/// refs, and ambiguous inputs with distinct error kinds.
pub fn parse_range(spec: &str) -> Result<RangeSpec> {
    let triple_count = spec.matches("...").count();
    let double_count = spec.matches("..").count();

    if triple_count > 1 || (triple_count == 0 && double_count > 1) {
        return Err(RouterError::validation(
            ValidationErrorCode::MalformedRangeMultipleOperators,
            "range spec contains multiple range operators",
            spec,
        ));
    }

    let (base, head, triple_dot) = if triple_count == 1 {
        let mut parts = spec.splitn(2, "...");
        let base = parts.next().unwrap_or_default();
        let head = parts.next().unwrap_or_default();
        (base, head, true)
    } else if double_count == 1 {
        let mut parts = spec.splitn(2, "..");
        let base = parts.next().unwrap_or_default();
        let head = parts.next().unwrap_or_default();
        (base, head, false)
    } else {
        return Err(RouterError::validation(
            ValidationErrorCode::MalformedRangeMissing,
            "range spec is missing a range operator",
            spec,
        ));
    };

    if base.is_empty() {
        return Err(RouterError::validation(
            ValidationErrorCode::MalformedRangeEmptyBase,
            "base ref is empty",
            spec,
        ));
    }
    if head.is_empty() {
        return Err(RouterError::validation(
            ValidationErrorCode::MalformedRangeEmptyHead,
            "head ref is empty",
            spec,
        ));
    }

    validate_ref(base)?;
    validate_ref(head)?;

    Ok(RangeSpec {
        base: base.to_string(),
        head: head.to_string(),
        triple_dot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_refs() {
        assert!(validate_ref("main").is_ok());
        assert!(validate_ref("feature/fix-bug-123").is_ok());
        assert!(validate_ref("HEAD").is_ok());
        assert!(validate_ref("a1b2c3d4").is_ok());
    }

    #[test]
    fn rejects_shell_metacharacters_and_traversal() {
        assert!(validate_ref("main;rm -rf /").is_err());
        assert!(validate_ref("`ls`").is_err());
        assert!(validate_ref("-oexec").is_err());
        assert!(validate_ref("foo..bar").is_err());
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("src/main.rs;id").is_err());
    }

    #[test]
    fn parse_range_rejects_multiple_operators() {
        let err = parse_range("a..b..c").unwrap_err();
        assert!(matches!(
            err,
            RouterError::Validation {
                code: ValidationErrorCode::MalformedRangeMultipleOperators,
                ..
            }
        ));
    }

    #[test]
    fn parse_range_rejects_empty_sides() {
        assert!(matches!(
            parse_range("..head").unwrap_err(),
            RouterError::Validation {
                code: ValidationErrorCode::MalformedRangeEmptyBase,
                ..
            }
        ));
        assert!(matches!(
            parse_range("base..").unwrap_err(),
            RouterError::Validation {
                code: ValidationErrorCode::MalformedRangeEmptyHead,
                ..
            }
        ));
    }

    #[test]
    fn parse_range_accepts_double_and_triple_dot() {
        let r = parse_range("main..feature").unwrap();
        assert!(!r.triple_dot);
        let r = parse_range("main...feature").unwrap();
        assert!(r.triple_dot);
    }
}
