//! Data model shared by the pipeline stages.
//!
//! Time values are seconds as `f64`. Inside a [`ChunkTranscript`] they are
//! local to the chunk; after merging they are on the global timeline.

use serde::{Deserialize, Serialize};

use super::stt::STTError;

/// Word-level timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A transcribed span of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: None,
        }
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// What the transcription engine returned for one buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkTranscript {
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Top-level word timings (engines that report words separately from segments)
    #[serde(default)]
    pub words: Vec<Word>,
    /// Reported duration of the buffer, if the engine knows it
    #[serde(default)]
    pub duration: Option<f64>,
}

impl ChunkTranscript {
    /// Reject engine output that would poison the merge math.
    ///
    /// Every timestamp must be finite and non-negative and every span must
    /// satisfy `end >= start`. A reported duration must be finite and
    /// non-negative.
    pub fn validate(&self) -> Result<(), STTError> {
        if let Some(duration) = self.duration
            && (!duration.is_finite() || duration < 0.0)
        {
            return Err(STTError::InvalidResponse(format!(
                "invalid duration {duration}"
            )));
        }

        for (i, segment) in self.segments.iter().enumerate() {
            check_span("segment", i, segment.start, segment.end)?;
            for (j, word) in segment.words.iter().flatten().enumerate() {
                check_span("segment word", j, word.start, word.end)?;
            }
        }

        for (i, word) in self.words.iter().enumerate() {
            check_span("word", i, word.start, word.end)?;
        }

        Ok(())
    }
}

fn check_span(kind: &str, index: usize, start: f64, end: f64) -> Result<(), STTError> {
    if !start.is_finite() || !end.is_finite() {
        return Err(STTError::InvalidResponse(format!(
            "{kind} {index} has non-finite timestamps ({start}, {end})"
        )));
    }
    if start < 0.0 {
        return Err(STTError::InvalidResponse(format!(
            "{kind} {index} starts before zero ({start})"
        )));
    }
    if end < start {
        return Err(STTError::InvalidResponse(format!(
            "{kind} {index} ends before it starts ({start} > {end})"
        )));
    }
    Ok(())
}

/// An inclusive byte range to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTask {
    pub offset: u64,
    pub end_inclusive: u64,
}

impl ChunkTask {
    /// Number of bytes this task covers.
    #[inline]
    pub fn byte_len(&self) -> u64 {
        self.end_inclusive - self.offset + 1
    }

    /// Value for the HTTP `Range` header.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.offset, self.end_inclusive)
    }
}

/// The transcript of one fetched chunk, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub offset: u64,
    pub byte_length: u64,
    pub transcript: ChunkTranscript,
}

/// The stitched transcript for a whole job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedTranscript {
    pub full_text: String,
    pub segments: Vec<Segment>,
    pub words: Vec<Word>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(w: &str, start: f64, end: f64) -> Word {
        Word {
            word: w.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_valid_transcript_passes() {
        let transcript = ChunkTranscript {
            segments: vec![Segment {
                words: Some(vec![word("hello", 0.0, 0.4)]),
                ..Segment::new(0.0, 1.0, "hello")
            }],
            words: vec![word("hello", 0.0, 0.4)],
            duration: Some(1.0),
        };
        assert!(transcript.validate().is_ok());
    }

    #[test]
    fn test_inverted_segment_rejected() {
        let transcript = ChunkTranscript {
            segments: vec![Segment::new(2.0, 1.0, "backwards")],
            ..Default::default()
        };
        let err = transcript.validate().unwrap_err();
        assert!(matches!(err, STTError::InvalidResponse(_)));
    }

    #[test]
    fn test_non_finite_word_rejected() {
        let transcript = ChunkTranscript {
            words: vec![word("nan", f64::NAN, 1.0)],
            ..Default::default()
        };
        assert!(transcript.validate().is_err());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let transcript = ChunkTranscript {
            duration: Some(-3.0),
            ..Default::default()
        };
        assert!(transcript.validate().is_err());
    }

    #[test]
    fn test_chunk_task_range_header() {
        let task = ChunkTask {
            offset: 16_000_000,
            end_inclusive: 20_999_999,
        };
        assert_eq!(task.range_header(), "bytes=16000000-20999999");
        assert_eq!(task.byte_len(), 5_000_000);
    }

    #[test]
    fn test_segment_serialization_omits_missing_words() {
        let json = serde_json::to_value(Segment::new(0.0, 1.5, "hi")).unwrap();
        assert!(json.get("words").is_none());
        assert_eq!(json["text"], "hi");
    }
}
