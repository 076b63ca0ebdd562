use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use super::policy::Policies;
use crate::error::Result;
use crate::metrics::XP_CREDITED_TOTAL;
use crate::models::progression::{CreditOutcome, LeaderboardEntry, ProgressionAccount};
use crate::storage::ProgressionStore;

/// Credited challenge ids remembered per account.
const CREDIT_HISTORY: usize = 256;

pub struct ProgressionService {
    store: Arc<dyn ProgressionStore>,
    policies: Arc<Policies>,
    write_lock: Mutex<()>,
}

impl ProgressionService {
    pub fn new(store: Arc<dyn ProgressionStore>, policies: Arc<Policies>) -> Self {
        Self {
            store,
            policies,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn account(&self, learner_id: &str) -> Result<ProgressionAccount> {
        Ok(self
            .store
            .load(learner_id)
            .await?
            .unwrap_or_else(|| ProgressionAccount::new(learner_id)))
    }

    pub fn next_level_threshold(&self, total_xp: u64) -> Option<u64> {
        self.policies.levels.next_threshold(total_xp)
    }

    pub async fn credit(
        &self,
        learner_id: &str,
        challenge_id: &str,
        xp: u32,
    ) -> Result<CreditOutcome> {
        self.credit_on(learner_id, challenge_id, xp, Utc::now().date_naive())
            .await
    }

    /// Adds `xp` for `challenge_id` and updates the day streak as of `today` (UTC).
    /// Crediting the same challenge again changes nothing.
    pub async fn credit_on(
        &self,
        learner_id: &str,
        challenge_id: &str,
        xp: u32,
        today: NaiveDate,
    ) -> Result<CreditOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut account = self.account(learner_id).await?;
        let previous_level = account.level;

        if account.credited_challenges.iter().any(|c| c == challenge_id) {
            tracing::debug!(
                "Challenge already credited: learner={}, challenge={}",
                learner_id,
                challenge_id
            );
            return Ok(CreditOutcome {
                credited: false,
                total_xp: account.total_xp,
                level: account.level,
                streak_days: account.streak_days,
                leveled_up: false,
                next_level_threshold: self.next_level_threshold(account.total_xp),
            });
        }

        account.total_xp = account.total_xp.saturating_add(xp as u64);
        account.level = previous_level.max(self.policies.levels.level_for(account.total_xp));
        account.streak_days = next_streak(account.streak_days, account.last_active_on, today);
        account.last_active_on = Some(today);
        account.credited_challenges.push(challenge_id.to_string());
        if account.credited_challenges.len() > CREDIT_HISTORY {
            let excess = account.credited_challenges.len() - CREDIT_HISTORY;
            account.credited_challenges.drain(..excess);
        }
        account.updated_at = Utc::now();

        self.store.save(&account).await?;
        XP_CREDITED_TOTAL.inc_by(xp as u64);

        let leveled_up = account.level > previous_level;
        if leveled_up {
            tracing::info!(
                "Level up: learner={}, level {} -> {}",
                learner_id,
                previous_level,
                account.level
            );
        }

        Ok(CreditOutcome {
            credited: true,
            total_xp: account.total_xp,
            level: account.level,
            streak_days: account.streak_days,
            leveled_up,
            next_level_threshold: self.next_level_threshold(account.total_xp),
        })
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let accounts = self.store.top_by_xp(limit).await?;
        Ok(accounts
            .into_iter()
            .enumerate()
            .map(|(i, account)| LeaderboardEntry {
                rank: i + 1,
                learner_id: account.learner_id,
                total_xp: account.total_xp,
                level: account.level,
            })
            .collect())
    }
}

fn next_streak(current: u32, last_active: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_active {
        Some(last) if last == today => current.max(1),
        Some(last) if last.succ_opt() == Some(today) => current + 1,
        _ => 1,
    }
}
