//! Property-based tests for the quantified invariants.

use pr_review_router::diff::canonicalize_path;
use pr_review_router::pipeline::deduplicate;
use pr_review_router::types::{stable_fingerprint, Finding, Severity};
use proptest::prelude::*;

proptest! {
    /// Canonicalization is idempotent no matter how many `a/`/`b/`/`./`/`/`
    /// prefixes are stacked.
    #[test]
    fn canonicalize_path_is_idempotent(
        prefixes in prop::collection::vec(prop::sample::select(vec!["a/", "b/", "./", "/"]), 0..6),
        tail in "[a-zA-Z0-9_./-]{1,40}",
    ) {
        let raw: String = prefixes.concat() + &tail;
        let once = canonicalize_path(&raw);
        let twice = canonicalize_path(&once);
        prop_assert_eq!(once, twice);
    }

    /// Downgrading severity never raises it, and always saturates at Info.
    #[test]
    fn severity_downgrade_never_raises_and_saturates(levels in 0u8..20) {
        for start in [Severity::Error, Severity::Warning, Severity::Info] {
            let downgraded = start.downgrade(levels);
            prop_assert!(downgraded >= start);
        }
    }

    /// Fingerprints are a pure function of their inputs and always 16 hex chars.
    #[test]
    fn stable_fingerprint_is_deterministic(a in "[a-zA-Z0-9]{0,20}", b in "[a-zA-Z0-9]{0,20}") {
        let first = stable_fingerprint(&[a.as_str(), b.as_str()]);
        let second = stable_fingerprint(&[a.as_str(), b.as_str()]);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), 16);
    }

    /// Two findings sharing a fingerprint and file within the proximity
    /// window always collapse to one, regardless of how many duplicates pile up.
    #[test]
    fn dedup_collapses_any_number_of_proximate_duplicates(count in 1usize..10, base_line in 1u32..500) {
        let findings: Vec<Finding> = (0..count)
            .map(|i| Finding::new(Severity::Warning, "f.js", Some(base_line + i as u32 % 3), "m", "r", "a", "fp"))
            .collect();
        let deduped = deduplicate(findings);
        prop_assert_eq!(deduped.len(), 1);
    }
}
