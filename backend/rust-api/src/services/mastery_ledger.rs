use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use super::learning_loop::{LearningLoop, LoopTrigger};
use super::policy::Policies;
use crate::error::Result;
use crate::metrics::LOOP_TRANSITIONS_TOTAL;
use crate::models::mastery::{LoopStage, LoopStatus, MasteryRecord, MasteryUpdate};
use crate::storage::MasteryStore;

/// Challenge ids remembered per record. Activities expire long before this fills up.
const APPLIED_HISTORY: usize = 256;

/// Sole mutator of mastery records.
pub struct MasteryLedger {
    store: Arc<dyn MasteryStore>,
    policies: Arc<Policies>,
    machine: LearningLoop,
    // single writer: read-modify-write of a record happens under this lock
    write_lock: Mutex<()>,
}

impl MasteryLedger {
    pub fn new(store: Arc<dyn MasteryStore>, policies: Arc<Policies>, machine: LearningLoop) -> Self {
        Self {
            store,
            policies,
            machine,
            write_lock: Mutex::new(()),
        }
    }

    /// Current record, or a fresh NOT_STARTED one if the pair was never touched.
    pub async fn current(&self, learner_id: &str, intent_id: &str) -> Result<MasteryRecord> {
        Ok(self
            .store
            .load(learner_id, intent_id)
            .await?
            .unwrap_or_else(|| MasteryRecord::new(learner_id, intent_id)))
    }

    pub async fn list(&self, learner_id: &str) -> Result<Vec<MasteryRecord>> {
        Ok(self.store.list_for_learner(learner_id).await?)
    }

    /// Folds one graded submission into the record and saves it.
    pub async fn apply(
        &self,
        learner_id: &str,
        intent_id: &str,
        challenge_id: &str,
        is_correct: bool,
        score: f64,
    ) -> Result<MasteryUpdate> {
        self.stage(learner_id, intent_id, challenge_id, is_correct, score)
            .await?
            .commit()
            .await
    }

    /// Computes the record a graded submission would produce without saving it.
    /// The ledger stays locked until the returned update is committed or dropped,
    /// so other work can run in between and a failure there leaves the record as it was.
    /// A challenge id that was already applied comes back with `applied = false`.
    pub async fn stage(
        &self,
        learner_id: &str,
        intent_id: &str,
        challenge_id: &str,
        is_correct: bool,
        score: f64,
    ) -> Result<StagedUpdate<'_>> {
        let guard = self.write_lock.lock().await;
        let mut record = self.current(learner_id, intent_id).await?;
        let from = record.loop_stage;

        if record.has_applied(challenge_id) {
            tracing::info!(
                "Duplicate apply ignored: learner={}, intent={}, challenge={}",
                learner_id,
                intent_id,
                challenge_id
            );
            let loop_status = LoopStatus {
                stage: record.loop_stage,
                feedback: record.last_feedback.clone(),
            };
            return Ok(StagedUpdate {
                ledger: self,
                _guard: guard,
                from,
                update: MasteryUpdate {
                    record,
                    loop_status,
                    applied: false,
                },
            });
        }

        let proficiency = if from == LoopStage::Mastered {
            record.proficiency
        } else {
            self.policies
                .proficiency
                .next(record.proficiency, is_correct, score)
        };

        let loop_status = self.machine.transition(
            from,
            LoopTrigger::Submission {
                is_correct,
                proficiency,
            },
        )?;

        record.proficiency = proficiency;
        record.loop_stage = loop_status.stage;
        record.attempts += 1;
        if is_correct {
            record.correct_count += 1;
        }
        record.last_feedback = loop_status.feedback.clone();
        record.applied_challenges.push(challenge_id.to_string());
        if record.applied_challenges.len() > APPLIED_HISTORY {
            let excess = record.applied_challenges.len() - APPLIED_HISTORY;
            record.applied_challenges.drain(..excess);
        }
        record.state = record.derive_state();
        record.updated_at = Utc::now();

        Ok(StagedUpdate {
            ledger: self,
            _guard: guard,
            from,
            update: MasteryUpdate {
                record,
                loop_status,
                applied: true,
            },
        })
    }

    /// Applies a non-submission trigger (material consumed, remediation done, review).
    pub async fn advance(
        &self,
        learner_id: &str,
        intent_id: &str,
        trigger: LoopTrigger,
    ) -> Result<MasteryUpdate> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.current(learner_id, intent_id).await?;

        let from = record.loop_stage;
        let loop_status = self.machine.transition(from, trigger)?;
        let moved = loop_status.stage != from;

        if moved {
            record.loop_stage = loop_status.stage;
            record.last_feedback = loop_status.feedback.clone();
            record.state = record.derive_state();
            record.updated_at = Utc::now();
            self.store.save(&record).await?;
            record_transition(from, record.loop_stage);

            tracing::info!(
                "Loop advanced: learner={}, intent={}, trigger={}, {} -> {}",
                learner_id,
                intent_id,
                trigger.name(),
                from.as_str(),
                record.loop_stage.as_str()
            );
        }

        Ok(MasteryUpdate {
            record,
            loop_status,
            applied: moved,
        })
    }
}

/// A submission folded into a record but not yet saved. Holds the ledger lock.
pub struct StagedUpdate<'a> {
    ledger: &'a MasteryLedger,
    _guard: MutexGuard<'a, ()>,
    from: LoopStage,
    update: MasteryUpdate,
}

impl StagedUpdate<'_> {
    pub fn update(&self) -> &MasteryUpdate {
        &self.update
    }

    /// Saves the staged record. A duplicate has nothing to save.
    pub async fn commit(self) -> Result<MasteryUpdate> {
        let update = self.update;
        if !update.applied {
            return Ok(update);
        }

        self.ledger.store.save(&update.record).await?;
        record_transition(self.from, update.record.loop_stage);

        tracing::info!(
            "Mastery updated: learner={}, intent={}, proficiency={:.2}, stage={}",
            update.record.learner_id,
            update.record.intent_id,
            update.record.proficiency,
            update.record.loop_stage.as_str()
        );

        Ok(update)
    }
}

fn record_transition(from: LoopStage, to: LoopStage) {
    if from != to {
        LOOP_TRANSITIONS_TOTAL
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }
}
