use crate::highlight::Rendering;
use std::time::{Duration, Instant};

/// How long the located occurrence keeps its emphasis after a jump.
pub const JUMP_MARK_DURATION: Duration = Duration::from_secs(2);

/// First highlight segment (in document order) whose text equals `term`
/// case-insensitively. `None` when the term has no occurrence, e.g. because
/// the vocabulary has not loaded yet; the caller decides whether to retry.
pub fn locate(rendering: &Rendering, term: &str) -> Option<usize> {
    let term = term.trim();
    rendering.segments().iter().position(|segment| {
        segment.record_id().is_some() && segment.text().to_lowercase() == term.to_lowercase()
    })
}

/// Time-boxed emphasis on the occurrence a jump landed on. The view clears
/// it once expired regardless of any interaction in between.
#[derive(Debug, Clone)]
pub struct TransientMark {
    pub segment_index: usize,
    expires_at: Instant,
}

impl TransientMark {
    pub fn new(segment_index: usize) -> Self {
        Self::with_duration(segment_index, JUMP_MARK_DURATION)
    }

    pub fn with_duration(segment_index: usize, duration: Duration) -> Self {
        Self {
            segment_index,
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Whether the mark still applies to the given segment.
    pub fn applies_to(&self, segment_index: usize) -> bool {
        self.segment_index == segment_index && !self.is_expired()
    }
}

/// A deep-link request from the vocabulary list: open a document and land on
/// the first occurrence of a term. The vocabulary may still be loading when
/// the document opens, so a miss is re-attempted exactly once after the next
/// term-set load; never a polling loop.
#[derive(Debug, Clone)]
pub struct PendingJump {
    pub term: String,
    retried: bool,
}

impl PendingJump {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            retried: false,
        }
    }

    /// Record a failed attempt. Returns true if one more attempt is allowed.
    pub fn note_miss(&mut self) -> bool {
        if self.retried {
            return false;
        }
        self.retried = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::compile;
    use crate::vocab_store::TermSet;
    use crate::vocab_store::test_support::record;
    use std::thread;

    fn rendering_with(text: &str, words: &[&str]) -> Rendering {
        let records = words
            .iter()
            .enumerate()
            .map(|(idx, word)| record(idx as i64 + 1, word, 1))
            .collect();
        compile(text, &TermSet::build(records, 1), None)
    }

    #[test]
    fn locate_returns_first_document_order_occurrence() {
        let text = "an elephant met another elephant by the river";
        let rendering = rendering_with(text, &["elephant", "river"]);
        let idx = locate(&rendering, "Elephant").unwrap();
        let first = rendering
            .segments()
            .iter()
            .position(|s| s.record_id().is_some())
            .unwrap();
        assert_eq!(idx, first);
    }

    #[test]
    fn locate_misses_absent_term() {
        let rendering = rendering_with("plain text", &[]);
        assert_eq!(locate(&rendering, "ghost"), None);
    }

    #[test]
    fn locate_ignores_plain_segments_containing_term() {
        // "river" appears in the text but is not a saved term.
        let rendering = rendering_with("elephant by the river", &["elephant"]);
        assert_eq!(locate(&rendering, "river"), None);
    }

    #[test]
    fn transient_mark_expires_after_window() {
        let mark = TransientMark::with_duration(3, Duration::from_millis(40));
        assert!(mark.applies_to(3));
        assert!(!mark.applies_to(4));

        thread::sleep(Duration::from_millis(50));
        assert!(mark.is_expired());
        assert!(!mark.applies_to(3));
    }

    #[test]
    fn second_locate_after_expiry_rearms_fresh_mark() {
        let text = "elephant here, elephant there";
        let rendering = rendering_with(text, &["elephant"]);

        let idx = locate(&rendering, "elephant").unwrap();
        let first_mark = TransientMark::with_duration(idx, Duration::from_millis(30));
        thread::sleep(Duration::from_millis(40));
        assert!(first_mark.is_expired());

        // Locating again returns the same position and arms a new mark that
        // does not inherit the expired state.
        let idx_again = locate(&rendering, "elephant").unwrap();
        assert_eq!(idx, idx_again);
        let second_mark = TransientMark::with_duration(idx_again, Duration::from_millis(30));
        assert!(second_mark.applies_to(idx_again));
    }

    #[test]
    fn pending_jump_retries_exactly_once() {
        let mut jump = PendingJump::new("elephant");
        assert!(jump.note_miss());
        assert!(!jump.note_miss());
        assert!(!jump.note_miss());
    }
}
