use crate::vocab_store::{TermSet, VocabId};
use log::warn;
use regex::Regex;

/// One run of document text in the compiled rendering.
///
/// Concatenating the `text` of every segment reproduces the source document
/// exactly; highlights carry the record that matched and preserve the
/// original casing of the occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Plain {
        text: String,
    },
    Highlight {
        text: String,
        record_id: VocabId,
        translation: String,
        jump_target: bool,
    },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain { text } => text,
            Segment::Highlight { text, .. } => text,
        }
    }

    pub fn record_id(&self) -> Option<VocabId> {
        match self {
            Segment::Plain { .. } => None,
            Segment::Highlight { record_id, .. } => Some(*record_id),
        }
    }

    pub fn is_jump_target(&self) -> bool {
        matches!(
            self,
            Segment::Highlight {
                jump_target: true,
                ..
            }
        )
    }
}

/// The compiled, annotated rendering of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendering {
    segments: Vec<Segment>,
    /// Byte offset of each segment's start in the source text.
    starts: Vec<usize>,
}

impl Rendering {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Byte range of a segment in the source text.
    pub fn segment_range(&self, index: usize) -> Option<(usize, usize)> {
        let start = *self.starts.get(index)?;
        Some((start, start + self.segments[index].text().len()))
    }

    /// Segment covering the given byte offset of the source text.
    pub fn segment_at(&self, offset: usize) -> Option<(usize, &Segment)> {
        let idx = match self.starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(0) => return None,
            Err(idx) => idx - 1,
        };
        let (start, end) = self.segment_range(idx)?;
        (offset >= start && offset < end).then(|| (idx, &self.segments[idx]))
    }

    /// Highlight segments intersecting the byte range, in document order.
    pub fn highlights_in_range(
        &self,
        range_start: usize,
        range_end: usize,
    ) -> impl Iterator<Item = (usize, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .filter(move |(idx, segment)| {
                if matches!(segment, Segment::Plain { .. }) {
                    return false;
                }
                let start = self.starts[*idx];
                let end = start + segment.text().len();
                start < range_end && range_start < end
            })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-word-boundary check against the source text: a match edge that is a
/// word character must not touch another word character outside the match.
/// This is what keeps "cat" from matching inside "category".
fn respects_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let matched = &text[start..end];
    let first = matched.chars().next();
    let last = matched.chars().next_back();

    if let Some(first) = first {
        if is_word_char(first) {
            if let Some(prev) = text[..start].chars().next_back() {
                if is_word_char(prev) {
                    return false;
                }
            }
        }
    }
    if let Some(last) = last {
        if is_word_char(last) {
            if let Some(next) = text[end..].chars().next() {
                if is_word_char(next) {
                    return false;
                }
            }
        }
    }
    true
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    start: usize,
    end: usize,
    term_index: usize,
}

/// Compile a document into an annotated rendering.
///
/// Terms are scanned in the set's order (longest first); each match claims
/// its character range, and any later match intersecting a claimed range is
/// dropped, so highlights never nest or overlap. A final left-to-right walk
/// over the claims emits alternating plain/highlight segments.
///
/// `jump_target` flags the first highlight (in document order) whose term
/// equals it case-insensitively; the reader uses that flag to scroll and arm
/// the transient jump mark.
pub fn compile(document_text: &str, terms: &TermSet, jump_target: Option<&str>) -> Rendering {
    if document_text.is_empty() {
        return Rendering::default();
    }
    if terms.is_empty() {
        return Rendering {
            segments: vec![Segment::Plain {
                text: document_text.to_string(),
            }],
            starts: vec![0],
        };
    }

    let mut claims: Vec<Claim> = Vec::new();
    for (term_index, record) in terms.iter().enumerate() {
        let pattern = format!("(?i){}", regex::escape(record.original.trim()));
        let matcher = match Regex::new(&pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                // Skip just this term; the rest of the set still applies.
                warn!("unusable term {:?}: {e}", record.original);
                continue;
            }
        };

        for found in matcher.find_iter(document_text) {
            let (start, end) = (found.start(), found.end());
            if !respects_word_boundary(document_text, start, end) {
                continue;
            }
            let overlaps = claims.iter().any(|c| start < c.end && c.start < end);
            if !overlaps {
                claims.push(Claim {
                    start,
                    end,
                    term_index,
                });
            }
        }
    }

    claims.sort_by_key(|c| c.start);

    let records: Vec<_> = terms.iter().collect();
    let mut segments = Vec::with_capacity(claims.len() * 2 + 1);
    let mut starts = Vec::with_capacity(claims.len() * 2 + 1);
    let mut cursor = 0usize;
    for claim in &claims {
        if claim.start > cursor {
            segments.push(Segment::Plain {
                text: document_text[cursor..claim.start].to_string(),
            });
            starts.push(cursor);
        }
        let record = records[claim.term_index];
        segments.push(Segment::Highlight {
            text: document_text[claim.start..claim.end].to_string(),
            record_id: record.id,
            translation: record.translation.clone(),
            jump_target: false,
        });
        starts.push(claim.start);
        cursor = claim.end;
    }
    if cursor < document_text.len() {
        segments.push(Segment::Plain {
            text: document_text[cursor..].to_string(),
        });
        starts.push(cursor);
    }

    if let Some(target) = jump_target {
        let target = target.trim();
        for segment in segments.iter_mut() {
            if let Segment::Highlight {
                text, jump_target, ..
            } = segment
            {
                if text.eq_ignore_ascii_case(target)
                    || text.to_lowercase() == target.to_lowercase()
                {
                    *jump_target = true;
                    break;
                }
            }
        }
    }

    Rendering { segments, starts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab_store::TermSet;
    use crate::vocab_store::test_support::record;

    fn terms(words: &[&str]) -> TermSet {
        let records = words
            .iter()
            .enumerate()
            .map(|(idx, word)| record(idx as i64 + 1, word, 1))
            .collect();
        TermSet::build(records, 1)
    }

    fn concat(rendering: &Rendering) -> String {
        rendering.segments().iter().map(|s| s.text()).collect()
    }

    fn highlight_texts(rendering: &Rendering) -> Vec<String> {
        rendering
            .segments()
            .iter()
            .filter(|s| s.record_id().is_some())
            .map(|s| s.text().to_string())
            .collect()
    }

    #[test]
    fn empty_term_set_is_identity() {
        let rendering = compile("some text here", &TermSet::default(), None);
        assert_eq!(rendering.segments().len(), 1);
        assert_eq!(concat(&rendering), "some text here");
    }

    #[test]
    fn empty_text_round_trips() {
        let rendering = compile("", &terms(&["word"]), None);
        assert_eq!(concat(&rendering), "");
    }

    #[test]
    fn round_trip_reconstructs_source() {
        let text = "please take off your shoes, take care, and run along";
        let rendering = compile(text, &terms(&["take off", "take", "run"]), None);
        assert_eq!(concat(&rendering), text);
    }

    #[test]
    fn longest_match_wins() {
        let text = "please take off your shoes";
        let rendering = compile(text, &terms(&["take", "take off"]), None);
        assert_eq!(highlight_texts(&rendering), vec!["take off"]);
    }

    #[test]
    fn word_boundaries_are_respected() {
        let text = "category cat catalog";
        let rendering = compile(text, &terms(&["cat"]), None);
        assert_eq!(highlight_texts(&rendering), vec!["cat"]);
    }

    #[test]
    fn matching_is_case_insensitive_and_preserves_casing() {
        let text = "Elephant saw an ELEPHANT";
        let rendering = compile(text, &terms(&["elephant"]), None);
        assert_eq!(highlight_texts(&rendering), vec!["Elephant", "ELEPHANT"]);
    }

    #[test]
    fn no_overlapping_highlights() {
        let text = "take off, take off again";
        let rendering = compile(text, &terms(&["take off", "off", "take"]), None);
        let mut last_end = 0;
        for (idx, segment) in rendering.segments().iter().enumerate() {
            let (start, end) = rendering.segment_range(idx).unwrap();
            assert!(start >= last_end);
            assert_eq!(segment.text().len(), end - start);
            last_end = end;
        }
        assert_eq!(highlight_texts(&rendering), vec!["take off", "take off"]);
    }

    #[test]
    fn compile_is_idempotent() {
        let text = "one two three two one";
        let set = terms(&["two", "one"]);
        let a = compile(text, &set, None);
        let b = compile(text, &set, None);
        assert_eq!(a, b);
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        let text = "cost is $5.00 (approx) today";
        let rendering = compile(text, &terms(&["$5.00 (approx)"]), None);
        assert_eq!(highlight_texts(&rendering), vec!["$5.00 (approx)"]);
    }

    #[test]
    fn jump_target_flags_first_occurrence_only() {
        let text = "an elephant met another elephant";
        let rendering = compile(text, &terms(&["elephant"]), Some("Elephant"));
        let flagged: Vec<_> = rendering
            .segments()
            .iter()
            .filter(|s| s.is_jump_target())
            .collect();
        assert_eq!(flagged.len(), 1);
        let first_highlight = rendering
            .segments()
            .iter()
            .position(|s| s.record_id().is_some())
            .unwrap();
        assert!(rendering.segments()[first_highlight].is_jump_target());
    }

    #[test]
    fn unknown_jump_target_flags_nothing() {
        let text = "an elephant";
        let rendering = compile(text, &terms(&["elephant"]), Some("giraffe"));
        assert!(rendering.segments().iter().all(|s| !s.is_jump_target()));
    }

    #[test]
    fn multibyte_text_is_sliced_on_char_boundaries() {
        let text = "naïve café visitors drink café au lait";
        let rendering = compile(text, &terms(&["café", "naïve"]), None);
        assert_eq!(concat(&rendering), text);
        assert_eq!(highlight_texts(&rendering), vec!["naïve", "café", "café"]);
    }

    #[test]
    fn segment_at_finds_covering_segment() {
        let text = "say hello world";
        let rendering = compile(text, &terms(&["hello"]), None);
        let offset = text.find("hello").unwrap();
        let (idx, segment) = rendering.segment_at(offset + 2).unwrap();
        assert_eq!(segment.text(), "hello");
        assert_eq!(rendering.segment_range(idx).unwrap().0, offset);
        assert!(rendering.segment_at(text.len()).is_none());
    }

    #[test]
    fn punctuation_only_terms_do_not_need_word_boundaries() {
        let text = "see §12 for details";
        let rendering = compile(text, &terms(&["§12"]), None);
        assert_eq!(highlight_texts(&rendering), vec!["§12"]);
    }
}
