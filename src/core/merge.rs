//! Stitch per-chunk transcripts into one global transcript.
//!
//! Each chunk was transcribed on its own time base starting at 0. Merging:
//!
//! 1. Order chunk results by byte offset and compute each chunk's time
//!    offset as `(byte_offset / byte_length) * reported_duration`. Without a
//!    usable duration, the end of the last placed segment is used instead,
//!    which is only an approximation.
//! 2. Shift every segment, nested word and top-level word by that offset.
//! 3. Stable-sort segments and words by start time.
//! 4. Collapse adjacent duplicates: when two segments overlap by more than
//!    half of the longer span and their normalized text is equal, the later
//!    one replaces the earlier one.
//! 5. Join trimmed segment texts with single spaces.
//!
//! The output depends only on the set of chunk results, not on the order in
//! which they are passed in.

use super::types::{ChunkResult, MergedTranscript, Segment, Word};

/// Minimum span used when comparing zero-length segments.
const SPAN_EPSILON: f64 = 1e-6;

/// Overlap ratio above which two segments with equal text are duplicates.
const DUPLICATE_OVERLAP_RATIO: f64 = 0.5;

/// Merge chunk results into a single ordered, deduplicated transcript.
pub fn merge_chunk_results(results: &[ChunkResult]) -> MergedTranscript {
    let mut ordered: Vec<&ChunkResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.offset);

    let mut segments: Vec<Segment> = Vec::new();
    let mut words: Vec<Word> = Vec::new();
    let mut last_placed_end = 0.0;

    for result in ordered {
        let time_offset = chunk_time_offset(result, last_placed_end);

        for segment in &result.transcript.segments {
            let placed = shift_segment(segment, time_offset);
            last_placed_end = placed.end;
            segments.push(placed);
        }
        words.extend(
            result
                .transcript
                .words
                .iter()
                .map(|w| shift_word(w, time_offset)),
        );
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    words.sort_by(|a, b| a.start.total_cmp(&b.start));

    let segments = dedup_segments(segments);
    let full_text = build_full_text(&segments);

    MergedTranscript {
        full_text,
        segments,
        words,
    }
}

/// Seconds to add to a chunk's local timestamps.
pub fn chunk_time_offset(result: &ChunkResult, last_placed_end: f64) -> f64 {
    match result.transcript.duration {
        Some(duration) if duration > 0.0 && result.byte_length > 0 => {
            (result.offset as f64 / result.byte_length as f64) * duration
        }
        _ => last_placed_end,
    }
}

fn shift_word(word: &Word, by: f64) -> Word {
    Word {
        word: word.word.clone(),
        start: word.start + by,
        end: word.end + by,
    }
}

fn shift_segment(segment: &Segment, by: f64) -> Segment {
    Segment {
        start: segment.start + by,
        end: segment.end + by,
        text: segment.text.clone(),
        words: segment
            .words
            .as_ref()
            .map(|ws| ws.iter().map(|w| shift_word(w, by)).collect()),
    }
}

/// Lowercase, strip punctuation and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The duplicate predicate applied to adjacent segments.
pub fn is_duplicate(prev: &Segment, cur: &Segment) -> bool {
    let overlap = (prev.end.min(cur.end) - prev.start.max(cur.start)).max(0.0);
    let span = prev.duration().max(cur.duration()).max(SPAN_EPSILON);
    overlap / span > DUPLICATE_OVERLAP_RATIO && normalize_text(&prev.text) == normalize_text(&cur.text)
}

fn dedup_segments(sorted: Vec<Segment>) -> Vec<Segment> {
    let mut kept: Vec<Segment> = Vec::with_capacity(sorted.len());

    for segment in sorted {
        match kept.last_mut() {
            Some(last) if is_duplicate(last, &segment) => *last = segment,
            _ => kept.push(segment),
        }

        // A replacement can make the new tail a duplicate of its predecessor.
        while kept.len() >= 2 && is_duplicate(&kept[kept.len() - 2], &kept[kept.len() - 1]) {
            if let Some(tail) = kept.pop()
                && let Some(last) = kept.last_mut()
            {
                *last = tail;
            }
        }
    }
    kept
}

fn build_full_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
