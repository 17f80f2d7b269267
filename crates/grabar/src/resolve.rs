//! Ambiguous-locator resolution.
//!
//! A recorded element carries several candidate selectors for the same node.
//! At run time some of them may have gone stale or grown extra matches, so
//! the resolver counts matches for every candidate and picks the one that
//! still identifies the element unambiguously: the first candidate with
//! exactly one match wins, otherwise the candidate with the fewest non-zero
//! matches. Candidates that match nothing at all never win.

use std::time::Duration;

use futures::future::join_all;

use crate::page::PageDriver;
use crate::result::{GrabarError, GrabarResult};
use crate::selector::SelectorSpec;

/// Per-candidate attach wait before counting (2 seconds).
pub const DEFAULT_ATTACH_TIMEOUT_MS: u64 = 2_000;

/// Outcome of a resolution: which candidate won and how many matches it had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Index into the candidate list
    pub index: usize,
    /// Match count for the winning candidate
    pub matches: usize,
}

/// Pick the candidate that best identifies the recorded element.
///
/// All candidates are given an attach wait concurrently (best effort; a
/// candidate that never attaches simply counts as zero), then counted in
/// order. Selection: first count of exactly one, else minimum non-zero count
/// with earlier candidates breaking ties.
///
/// # Errors
///
/// [`GrabarError::InvalidSelectors`] when the list is empty or every
/// candidate matches nothing.
pub async fn resolve_target(
    page: &dyn PageDriver,
    candidates: &[SelectorSpec],
) -> GrabarResult<Resolved> {
    if candidates.is_empty() {
        return Err(GrabarError::InvalidSelectors { tried: 0 });
    }

    // Attach waits run concurrently; failures only mean that candidate
    // will count zero below.
    let attach_timeout = Duration::from_millis(DEFAULT_ATTACH_TIMEOUT_MS);
    let waits = candidates
        .iter()
        .map(|spec| page.wait_for_attached(spec, attach_timeout));
    for (spec, outcome) in candidates.iter().zip(join_all(waits).await) {
        if let Err(err) = outcome {
            tracing::debug!(selector = %spec, %err, "candidate did not attach");
        }
    }

    let counts = join_all(candidates.iter().map(|spec| page.count_matches(spec))).await;

    let mut best: Option<Resolved> = None;
    for (index, count) in counts.into_iter().enumerate() {
        let matches = match count {
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(selector = %candidates[index], %err, "count failed");
                continue;
            }
        };
        if matches == 1 {
            return Ok(Resolved { index, matches });
        }
        if matches > 0 && best.map_or(true, |b| matches < b.matches) {
            best = Some(Resolved { index, matches });
        }
    }

    best.ok_or(GrabarError::InvalidSelectors {
        tried: candidates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;
    use crate::page::DomNode;

    fn css(value: &str) -> SelectorSpec {
        SelectorSpec::Css {
            value: value.to_string(),
        }
    }

    fn empty_page() -> MockPage {
        MockPage::new(DomNode::new("body"))
    }

    #[tokio::test]
    async fn test_first_unique_candidate_wins() {
        let candidates = [css(".a"), css(".b"), css(".c")];
        let page = empty_page()
            .with_count(&candidates[0], 0)
            .with_count(&candidates[1], 3)
            .with_count(&candidates[2], 1);
        let resolved = resolve_target(&page, &candidates).await.unwrap();
        assert_eq!(resolved, Resolved { index: 2, matches: 1 });
    }

    #[tokio::test]
    async fn test_unique_short_circuits_before_later_candidates() {
        let candidates = [css(".a"), css(".b")];
        let page = empty_page()
            .with_count(&candidates[0], 1)
            .with_count(&candidates[1], 1);
        let resolved = resolve_target(&page, &candidates).await.unwrap();
        assert_eq!(resolved.index, 0);
    }

    #[tokio::test]
    async fn test_fewest_nonzero_matches_when_none_unique() {
        let candidates = [css(".a"), css(".b"), css(".c")];
        let page = empty_page()
            .with_count(&candidates[0], 5)
            .with_count(&candidates[1], 2)
            .with_count(&candidates[2], 4);
        let resolved = resolve_target(&page, &candidates).await.unwrap();
        assert_eq!(resolved, Resolved { index: 1, matches: 2 });
    }

    #[tokio::test]
    async fn test_earlier_candidate_breaks_count_ties() {
        let candidates = [css(".a"), css(".b")];
        let page = empty_page()
            .with_count(&candidates[0], 2)
            .with_count(&candidates[1], 2);
        let resolved = resolve_target(&page, &candidates).await.unwrap();
        assert_eq!(resolved.index, 0);
    }

    #[tokio::test]
    async fn test_all_zero_is_an_error() {
        let candidates = [css(".a"), css(".b")];
        let page = empty_page();
        let err = resolve_target(&page, &candidates).await.unwrap_err();
        assert!(matches!(err, GrabarError::InvalidSelectors { tried: 2 }));
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_an_error() {
        let page = empty_page();
        let err = resolve_target(&page, &[]).await.unwrap_err();
        assert!(matches!(err, GrabarError::InvalidSelectors { tried: 0 }));
    }

    #[tokio::test]
    async fn test_detached_candidate_is_skipped_not_fatal() {
        let candidates = [css(".gone"), css(".here")];
        let page = empty_page()
            .with_detached(&candidates[0])
            .with_count(&candidates[0], 0)
            .with_count(&candidates[1], 1);
        let resolved = resolve_target(&page, &candidates).await.unwrap();
        assert_eq!(resolved.index, 1);
    }
}
