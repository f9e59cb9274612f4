use std::path::{Path, PathBuf};

use tracing::debug;

use super::synthesize::Synthesizer;
use super::transcribe::{Transcript, TranscriptSegment};
use super::translate::Translator;
use crate::modules::dubbing::error::{DubbingError, Stage};
use crate::modules::dubbing::model::TargetLanguage;

/// One entry of the assembly plan, in playback order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipPlan {
    Silence { seconds: f64 },
    Speech { text: String },
}

/// Plans the clip sequence for a segment timeline. Silence fillers keep the
/// concatenated track's cumulative duration tracking the original segment
/// starts; a blank segment contributes a minimal filler so list structure is
/// preserved without a synthesis call.
pub fn plan_clips(
    segments: &[TranscriptSegment],
    gap_epsilon: f64,
    min_filler: f64,
) -> Vec<ClipPlan> {
    let mut plan = Vec::with_capacity(segments.len() * 2);
    let mut current_time: f64 = 0.0;

    for segment in segments {
        let gap = (segment.start_seconds - current_time).max(0.0);
        if gap > gap_epsilon {
            plan.push(ClipPlan::Silence { seconds: gap });
        }

        let text = segment.text.trim();
        if text.is_empty() {
            plan.push(ClipPlan::Silence { seconds: min_filler });
        } else {
            plan.push(ClipPlan::Speech {
                text: text.to_string(),
            });
        }

        current_time = current_time.max(segment.end_seconds);
    }

    plan
}

/// Executes a plan for one target language: translates each speech unit,
/// synthesizes it, and materializes silence fillers. Returns the clip paths
/// in concatenation order.
///
/// Translated speech that runs longer than its segment causes drift; that is
/// an accepted approximation, not corrected here.
pub struct TimelineAssembler<'a> {
    pub translator: &'a dyn Translator,
    pub synthesizer: &'a dyn Synthesizer,
    pub gap_epsilon: f64,
    pub min_filler: f64,
}

impl<'a> TimelineAssembler<'a> {
    pub async fn assemble(
        &self,
        transcript: &Transcript,
        language: TargetLanguage,
        workspace: &Path,
    ) -> Result<Vec<PathBuf>, DubbingError> {
        // Flat transcript with no timing: one clip for the whole text, no
        // silence padding.
        if transcript.segments.is_empty() {
            let text = transcript.text.trim();
            if text.is_empty() {
                return Err(DubbingError::fatal(
                    Stage::Assembling,
                    "transcript has neither segments nor text",
                ));
            }

            let translated = self.translator.translate(text, language).await?;
            let clip = workspace.join(format!("clip_000_{}.mp3", language.code()));
            self.synthesizer
                .synthesize(&translated, language, &clip)
                .await?;
            return Ok(vec![clip]);
        }

        let plan = plan_clips(&transcript.segments, self.gap_epsilon, self.min_filler);
        debug!(
            entries = plan.len(),
            language = language.code(),
            "Assembling timeline"
        );

        let mut clips = Vec::with_capacity(plan.len());
        for (index, entry) in plan.iter().enumerate() {
            let clip = workspace.join(format!("clip_{index:03}_{}.mp3", language.code()));
            match entry {
                ClipPlan::Silence { seconds } => {
                    self.synthesizer.synthesize_silence(*seconds, &clip).await?;
                }
                ClipPlan::Speech { text } => {
                    let translated = self.translator.translate(text, language).await?;
                    self.synthesizer
                        .synthesize(&translated, language, &clip)
                        .await?;
                }
            }
            clips.push(clip);
        }

        Ok(clips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const EPSILON: f64 = 0.02;
    const FILLER: f64 = 0.05;

    fn segment(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_seconds: start,
            end_seconds: end,
            text: text.to_string(),
        }
    }

    #[test]
    fn gap_between_segments_becomes_a_silence_clip() {
        let plan = plan_clips(
            &[segment(0.0, 2.0, "a"), segment(5.0, 6.0, "b")],
            EPSILON,
            FILLER,
        );

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], ClipPlan::Speech { text: "a".into() });
        match &plan[1] {
            ClipPlan::Silence { seconds } => assert!((seconds - 3.0).abs() < 1e-9),
            other => panic!("expected silence, got {other:?}"),
        }
        assert_eq!(plan[2], ClipPlan::Speech { text: "b".into() });
    }

    #[test]
    fn sub_epsilon_gaps_are_swallowed() {
        let plan = plan_clips(
            &[segment(0.0, 2.0, "a"), segment(2.01, 3.0, "b")],
            EPSILON,
            FILLER,
        );
        assert!(plan.iter().all(|p| matches!(p, ClipPlan::Speech { .. })));
    }

    #[test]
    fn blank_segment_becomes_minimal_filler_not_speech() {
        let plan = plan_clips(&[segment(0.0, 1.0, "   ")], EPSILON, FILLER);
        assert_eq!(plan, vec![ClipPlan::Silence { seconds: FILLER }]);
    }

    #[test]
    fn leading_offset_is_padded() {
        let plan = plan_clips(&[segment(4.0, 5.0, "late start")], EPSILON, FILLER);
        match &plan[0] {
            ClipPlan::Silence { seconds } => assert!((seconds - 4.0).abs() < 1e-9),
            other => panic!("expected leading silence, got {other:?}"),
        }
    }

    #[test]
    fn cumulative_silence_plus_spans_reaches_the_last_segment_end() {
        let segments = [
            segment(1.0, 2.5, "one"),
            segment(4.0, 6.0, "two"),
            segment(6.0, 7.25, "three"),
            segment(10.0, 12.0, "four"),
        ];
        let plan = plan_clips(&segments, EPSILON, FILLER);

        let silence: f64 = plan
            .iter()
            .filter_map(|p| match p {
                ClipPlan::Silence { seconds } => Some(*seconds),
                _ => None,
            })
            .sum();
        let spans: f64 = segments
            .iter()
            .map(|s| s.end_seconds - s.start_seconds)
            .sum();

        let last_end = segments.last().unwrap().end_seconds;
        assert!(silence + spans >= last_end - EPSILON * segments.len() as f64);
        // Silence clips are strictly positive and appear in timeline order.
        assert!(
            plan.iter().all(
                |p| !matches!(p, ClipPlan::Silence { seconds } if *seconds <= 0.0)
            )
        );
    }

    struct StubTranslator;

    #[async_trait]
    impl Translator for StubTranslator {
        async fn translate(
            &self,
            text: &str,
            language: TargetLanguage,
        ) -> Result<String, DubbingError> {
            Ok(format!("[{}] {}", language.code(), text))
        }
    }

    #[derive(Default)]
    struct RecordingSynthesizer {
        speech_calls: Mutex<Vec<String>>,
        silence_calls: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl Synthesizer for RecordingSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            _language: TargetLanguage,
            out: &Path,
        ) -> Result<(), DubbingError> {
            self.speech_calls.lock().unwrap().push(text.to_string());
            std::fs::write(out, b"speech").unwrap();
            Ok(())
        }

        async fn synthesize_silence(&self, seconds: f64, out: &Path) -> Result<(), DubbingError> {
            self.silence_calls.lock().unwrap().push(seconds);
            std::fs::write(out, b"silence").unwrap();
            Ok(())
        }
    }

    fn assembler<'a>(
        translator: &'a StubTranslator,
        synthesizer: &'a RecordingSynthesizer,
    ) -> TimelineAssembler<'a> {
        TimelineAssembler {
            translator,
            synthesizer,
            gap_epsilon: EPSILON,
            min_filler: FILLER,
        }
    }

    #[tokio::test]
    async fn flat_transcript_yields_exactly_one_synthesis_call() {
        let translator = StubTranslator;
        let synthesizer = RecordingSynthesizer::default();
        let workspace = tempfile::tempdir().unwrap();

        let transcript = Transcript {
            text: "whole lesson text".to_string(),
            segments: vec![],
        };

        let clips = assembler(&translator, &synthesizer)
            .assemble(&transcript, TargetLanguage::Mr, workspace.path())
            .await
            .unwrap();

        assert_eq!(clips.len(), 1);
        let speech = synthesizer.speech_calls.lock().unwrap();
        assert_eq!(speech.as_slice(), ["[mr] whole lesson text"]);
        assert!(synthesizer.silence_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_segment_never_reaches_the_synthesizer() {
        let translator = StubTranslator;
        let synthesizer = RecordingSynthesizer::default();
        let workspace = tempfile::tempdir().unwrap();

        let transcript = Transcript {
            text: "hello".to_string(),
            segments: vec![segment(0.0, 2.0, "hello"), segment(2.0, 3.0, "  ")],
        };

        let clips = assembler(&translator, &synthesizer)
            .assemble(&transcript, TargetLanguage::Hi, workspace.path())
            .await
            .unwrap();

        assert_eq!(clips.len(), 2);
        assert_eq!(synthesizer.speech_calls.lock().unwrap().len(), 1);
        assert_eq!(
            synthesizer.silence_calls.lock().unwrap().as_slice(),
            [FILLER]
        );
    }

    #[tokio::test]
    async fn clips_come_back_in_timeline_order() {
        let translator = StubTranslator;
        let synthesizer = RecordingSynthesizer::default();
        let workspace = tempfile::tempdir().unwrap();

        let transcript = Transcript {
            text: "hello world".to_string(),
            segments: vec![segment(0.0, 4.0, "hello"), segment(4.0, 10.0, "world")],
        };

        let clips = assembler(&translator, &synthesizer)
            .assemble(&transcript, TargetLanguage::Mr, workspace.path())
            .await
            .unwrap();

        assert_eq!(clips.len(), 2);
        assert!(clips.iter().all(|c| c.exists()));
        let speech = synthesizer.speech_calls.lock().unwrap();
        assert_eq!(speech.as_slice(), ["[mr] hello", "[mr] world"]);
    }

    #[tokio::test]
    async fn empty_transcript_is_an_assembly_error() {
        let translator = StubTranslator;
        let synthesizer = RecordingSynthesizer::default();
        let workspace = tempfile::tempdir().unwrap();

        let err = assembler(&translator, &synthesizer)
            .assemble(&Transcript::default(), TargetLanguage::Es, workspace.path())
            .await
            .unwrap_err();

        assert!(matches!(err, DubbingError::Fatal { .. }));
    }
}
