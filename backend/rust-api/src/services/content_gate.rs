use std::sync::Arc;

use super::activity_engine::ActivityEngine;
use super::intent_service::IntentRegistry;
use super::learning_loop::LoopTrigger;
use super::mastery_ledger::MasteryLedger;
use crate::error::{EngineError, Result};
use crate::metrics::record_gate_check;
use crate::models::activity::{Activity, TypeHint};
use crate::models::mastery::{GateStatus, MasteryUpdate};

/// Hides a topic's primary material until proficiency reaches the gate threshold.
///
/// There is no stored "unlocked" flag: every check reads the ledger, so a correct
/// gate challenge unlocks the topic purely by moving proficiency.
pub struct ContentGate {
    intents: Arc<IntentRegistry>,
    ledger: Arc<MasteryLedger>,
    engine: Arc<ActivityEngine>,
    threshold: f64,
}

impl ContentGate {
    pub fn new(
        intents: Arc<IntentRegistry>,
        ledger: Arc<MasteryLedger>,
        engine: Arc<ActivityEngine>,
        threshold: f64,
    ) -> Self {
        Self {
            intents,
            ledger,
            engine,
            threshold,
        }
    }

    pub async fn check(&self, learner_id: &str, intent_id: &str) -> Result<GateStatus> {
        self.intents.get(learner_id, intent_id).await?;
        let record = self.ledger.current(learner_id, intent_id).await?;
        let locked = record.proficiency < self.threshold;
        record_gate_check(locked);

        Ok(GateStatus {
            intent_id: intent_id.to_string(),
            locked,
            proficiency: record.proficiency,
            threshold: self.threshold,
        })
    }

    /// Issues the gate challenge: an ordinary activity for the intent's topic.
    pub async fn unlock(
        &self,
        learner_id: &str,
        intent_id: &str,
        type_hint: TypeHint,
    ) -> Result<Activity> {
        let intent = self.intents.get(learner_id, intent_id).await?;
        let status = self.check(learner_id, intent_id).await?;
        if !status.locked {
            tracing::debug!(
                "Gate challenge requested for already open intent={}",
                intent_id
            );
        }

        self.engine
            .request_for_intent(learner_id, &intent, type_hint)
            .await
    }

    /// Marks the primary material consumed, refused while the gate is locked.
    pub async fn complete_material(
        &self,
        learner_id: &str,
        intent_id: &str,
    ) -> Result<MasteryUpdate> {
        let status = self.check(learner_id, intent_id).await?;
        if status.locked {
            return Err(EngineError::ContentLocked {
                intent_id: intent_id.to_string(),
                threshold: self.threshold,
            });
        }

        self.ledger
            .advance(learner_id, intent_id, LoopTrigger::MaterialConsumed)
            .await
    }
}
