//! Learning loop transition table.
//!
//! `UNDERSTAND -> APPLY -> (REMEDIATE <-> APPLY)* -> MASTERED`. The function here is
//! pure: no I/O, no clock, so every edge is covered by plain unit tests below.

use crate::error::EngineError;
use crate::models::mastery::{LoopStage, LoopStatus};

const FEEDBACK_MATERIAL_DONE: &str = "Lecture complete! Time to apply what you learned.";
const FEEDBACK_MASTERED: &str = "Topic Mastered! You're ready for the next concept.";
const FEEDBACK_REMEDIATE: &str = "Let's review. Watch this key segment before trying again.";
const FEEDBACK_RECOVERED: &str = "Great recovery! Apply it again to reach mastery.";
const FEEDBACK_KEEP_GOING: &str = "Keep going.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopTrigger {
    /// Learner finished the primary material.
    MaterialConsumed,
    /// A graded submission; `proficiency` is the ledger value after applying it.
    Submission { is_correct: bool, proficiency: f64 },
    /// Learner finished the remediation segment.
    RemediationCompleted,
    /// Request to revisit a mastered topic.
    Review,
}

impl LoopTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            LoopTrigger::MaterialConsumed => "material_consumed",
            LoopTrigger::Submission { .. } => "submission",
            LoopTrigger::RemediationCompleted => "remediation_completed",
            LoopTrigger::Review => "review",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LearningLoop {
    mastery_threshold: f64,
}

impl LearningLoop {
    pub fn new(mastery_threshold: f64) -> Self {
        Self { mastery_threshold }
    }

    pub fn transition(
        &self,
        stage: LoopStage,
        trigger: LoopTrigger,
    ) -> Result<LoopStatus, EngineError> {
        use LoopStage::{Apply, Mastered, Remediate, Understand};

        let (next, feedback) = match (stage, trigger) {
            (Mastered, LoopTrigger::Review) => return Err(unsupported(stage, trigger)),
            (Mastered, _) => (Mastered, None),

            (Understand, LoopTrigger::MaterialConsumed) => {
                (Apply, Some(FEEDBACK_MATERIAL_DONE.to_string()))
            }
            // Gate challenges are graded in UNDERSTAND but never move the stage.
            (Understand, LoopTrigger::Submission { is_correct, .. }) => {
                (Understand, (!is_correct).then(|| FEEDBACK_KEEP_GOING.to_string()))
            }

            (Apply, LoopTrigger::Submission { is_correct: true, proficiency }) => {
                if proficiency >= self.mastery_threshold {
                    (Mastered, Some(FEEDBACK_MASTERED.to_string()))
                } else {
                    (
                        Apply,
                        Some(format!(
                            "Proficiency {:.0}% is below the mastery threshold ({:.0}%). Keep practicing.",
                            proficiency, self.mastery_threshold
                        )),
                    )
                }
            }
            (Apply, LoopTrigger::Submission { is_correct: false, .. }) => {
                (Remediate, Some(FEEDBACK_REMEDIATE.to_string()))
            }

            (Remediate, LoopTrigger::Submission { is_correct: true, .. })
            | (Remediate, LoopTrigger::RemediationCompleted) => {
                (Apply, Some(FEEDBACK_RECOVERED.to_string()))
            }
            (Remediate, LoopTrigger::Submission { is_correct: false, proficiency }) => (
                Remediate,
                Some(format!(
                    "{} Current proficiency: {:.0}%.",
                    FEEDBACK_REMEDIATE, proficiency
                )),
            ),

            (_, LoopTrigger::MaterialConsumed)
            | (_, LoopTrigger::RemediationCompleted)
            | (_, LoopTrigger::Review) => return Err(unsupported(stage, trigger)),
        };

        Ok(LoopStatus {
            stage: next,
            feedback,
        })
    }
}

fn unsupported(stage: LoopStage, trigger: LoopTrigger) -> EngineError {
    EngineError::UnsupportedTransition {
        stage: stage.as_str().to_string(),
        trigger: trigger.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> LearningLoop {
        LearningLoop::new(80.0)
    }

    fn submit(is_correct: bool, proficiency: f64) -> LoopTrigger {
        LoopTrigger::Submission {
            is_correct,
            proficiency,
        }
    }

    #[test]
    fn material_moves_understand_to_apply() {
        let status = machine()
            .transition(LoopStage::Understand, LoopTrigger::MaterialConsumed)
            .unwrap();
        assert_eq!(status.stage, LoopStage::Apply);
    }

    #[test]
    fn apply_incorrect_goes_to_remediate_with_feedback() {
        let status = machine()
            .transition(LoopStage::Apply, submit(false, 40.0))
            .unwrap();
        assert_eq!(status.stage, LoopStage::Remediate);
        assert!(!status.feedback.unwrap_or_default().is_empty());
    }

    #[test]
    fn apply_correct_above_threshold_masters() {
        let status = machine()
            .transition(LoopStage::Apply, submit(true, 85.0))
            .unwrap();
        assert_eq!(status.stage, LoopStage::Mastered);

        let status = machine()
            .transition(LoopStage::Apply, submit(true, 80.0))
            .unwrap();
        assert_eq!(status.stage, LoopStage::Mastered);
    }

    #[test]
    fn apply_correct_below_threshold_stays() {
        let status = machine()
            .transition(LoopStage::Apply, submit(true, 79.99))
            .unwrap();
        assert_eq!(status.stage, LoopStage::Apply);
    }

    #[test]
    fn remediate_edges() {
        let m = machine();
        let back = m.transition(LoopStage::Remediate, submit(true, 90.0)).unwrap();
        // re-evaluated against the threshold on the next cycle, not now
        assert_eq!(back.stage, LoopStage::Apply);

        let stay = m.transition(LoopStage::Remediate, submit(false, 20.0)).unwrap();
        assert_eq!(stay.stage, LoopStage::Remediate);
        assert!(stay.feedback.is_some());

        let done = m
            .transition(LoopStage::Remediate, LoopTrigger::RemediationCompleted)
            .unwrap();
        assert_eq!(done.stage, LoopStage::Apply);
    }

    #[test]
    fn understand_submissions_never_remediate() {
        let m = machine();
        for correct in [true, false] {
            let status = m
                .transition(LoopStage::Understand, submit(correct, 10.0))
                .unwrap();
            assert_eq!(status.stage, LoopStage::Understand);
        }
    }

    #[test]
    fn mastered_is_absorbing() {
        let m = machine();
        for trigger in [
            submit(false, 0.0),
            submit(true, 100.0),
            LoopTrigger::MaterialConsumed,
            LoopTrigger::RemediationCompleted,
        ] {
            let status = m.transition(LoopStage::Mastered, trigger).unwrap();
            assert_eq!(status.stage, LoopStage::Mastered);
            assert!(status.feedback.is_none());
        }
    }

    #[test]
    fn review_is_unsupported() {
        let err = machine()
            .transition(LoopStage::Mastered, LoopTrigger::Review)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTransition { .. }));
    }

    #[test]
    fn out_of_order_triggers_are_rejected() {
        let m = machine();
        assert!(m
            .transition(LoopStage::Apply, LoopTrigger::MaterialConsumed)
            .is_err());
        assert!(m
            .transition(LoopStage::Understand, LoopTrigger::RemediationCompleted)
            .is_err());
    }

    #[test]
    fn no_sequence_reaches_remediate_from_understand() {
        let m = machine();
        let triggers = [
            submit(true, 10.0),
            submit(false, 10.0),
            submit(true, 90.0),
            LoopTrigger::MaterialConsumed,
            LoopTrigger::RemediationCompleted,
            LoopTrigger::Review,
        ];
        for trigger in triggers {
            if let Ok(status) = m.transition(LoopStage::Understand, trigger) {
                assert_ne!(status.stage, LoopStage::Remediate);
            }
        }
    }
}
