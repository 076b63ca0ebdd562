//! Swappable scoring policies: proficiency updates, xp penalties and the level curve.

use crate::config::EngineSettings;

pub trait ProficiencyPolicy: Send + Sync {
    /// Next proficiency after a graded submission. Must stay within [0, 100].
    fn next(&self, current: f64, is_correct: bool, score: f64) -> f64;
}

pub trait XpPolicy: Send + Sync {
    /// Folds the violation count into the evaluator's xp figure.
    fn adjust(&self, evaluator_xp: u32, violation_count: u32) -> u32;
}

pub trait LevelCurve: Send + Sync {
    fn level_for(&self, total_xp: u64) -> u32;

    /// XP needed for the next level, `None` once the curve is exhausted.
    fn next_threshold(&self, total_xp: u64) -> Option<u64>;
}

/// Moves proficiency toward `score * 100` on success, decays it on failure.
#[derive(Debug, Clone)]
pub struct WeightedAverage {
    pub weight: f64,
    pub decay: f64,
}

impl ProficiencyPolicy for WeightedAverage {
    fn next(&self, current: f64, is_correct: bool, score: f64) -> f64 {
        let current = clamp_proficiency(current);
        let target = score.clamp(0.0, 1.0) * 100.0;

        let next = if is_correct {
            // a correct answer never lowers proficiency
            (current + self.weight * (target - current)).max(current)
        } else {
            current * (1.0 - self.decay)
        };

        round2(clamp_proficiency(next))
    }
}

/// Removes `pct_per_violation` percent of the xp per violation, floored at zero.
#[derive(Debug, Clone)]
pub struct ViolationPenalty {
    pub pct_per_violation: u32,
}

impl XpPolicy for ViolationPenalty {
    fn adjust(&self, evaluator_xp: u32, violation_count: u32) -> u32 {
        let penalty = self.pct_per_violation.saturating_mul(violation_count).min(100);
        ((evaluator_xp as u64 * (100 - penalty) as u64) / 100) as u32
    }
}

/// Level table: level N starts at `thresholds[N - 1]` xp.
#[derive(Debug, Clone)]
pub struct ThresholdCurve {
    thresholds: Vec<u64>,
}

impl ThresholdCurve {
    pub fn new(thresholds: Vec<u64>) -> Self {
        Self { thresholds }
    }
}

impl LevelCurve for ThresholdCurve {
    fn level_for(&self, total_xp: u64) -> u32 {
        let reached = self
            .thresholds
            .iter()
            .skip(1)
            .take_while(|t| total_xp >= **t)
            .count();
        1 + reached as u32
    }

    fn next_threshold(&self, total_xp: u64) -> Option<u64> {
        self.thresholds.iter().copied().find(|t| *t > total_xp)
    }
}

/// Bundle of the policies the engine runs with.
pub struct Policies {
    pub proficiency: Box<dyn ProficiencyPolicy>,
    pub xp: Box<dyn XpPolicy>,
    pub levels: Box<dyn LevelCurve>,
}

impl Policies {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            proficiency: Box::new(WeightedAverage {
                weight: settings.proficiency_weight,
                decay: settings.failure_decay,
            }),
            xp: Box::new(ViolationPenalty {
                pct_per_violation: settings.violation_xp_penalty_pct,
            }),
            levels: Box::new(ThresholdCurve::new(settings.level_thresholds.clone())),
        }
    }
}

pub fn clamp_proficiency(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_policy() -> WeightedAverage {
        WeightedAverage {
            weight: 0.5,
            decay: 0.1,
        }
    }

    #[test]
    fn correct_answer_moves_toward_score() {
        let policy = default_policy();
        assert_eq!(policy.next(20.0, true, 0.7), 45.0);
        assert_eq!(policy.next(70.0, true, 1.0), 85.0);
        assert_eq!(policy.next(0.0, true, 1.0), 50.0);
    }

    #[test]
    fn correct_low_score_never_lowers() {
        let policy = default_policy();
        assert_eq!(policy.next(90.0, true, 0.2), 90.0);
    }

    #[test]
    fn incorrect_answer_decays() {
        let policy = default_policy();
        assert_eq!(policy.next(50.0, false, 0.0), 45.0);
        assert_eq!(policy.next(0.0, false, 0.0), 0.0);
    }

    #[test]
    fn proficiency_stays_bounded() {
        let policy = WeightedAverage {
            weight: 1.0,
            decay: 1.0,
        };
        let mut p = 0.0;
        for (correct, score) in [(true, 1.5), (false, -2.0), (true, f64::NAN), (true, 1.0)] {
            p = policy.next(p, correct, score);
            assert!((0.0..=100.0).contains(&p), "out of bounds: {}", p);
        }
        assert_eq!(policy.next(250.0, true, 1.0), 100.0);
        assert_eq!(policy.next(-5.0, false, 0.0), 0.0);
    }

    #[test]
    fn violations_reduce_xp() {
        let policy = ViolationPenalty {
            pct_per_violation: 10,
        };
        assert_eq!(policy.adjust(100, 0), 100);
        assert_eq!(policy.adjust(100, 1), 90);
        assert_eq!(policy.adjust(100, 3), 70);
        assert_eq!(policy.adjust(100, 15), 0);
        assert_eq!(policy.adjust(0, 2), 0);
    }

    #[test]
    fn level_curve_is_monotonic() {
        let curve = ThresholdCurve::new(EngineSettings::default().level_thresholds);
        assert_eq!(curve.level_for(0), 1);
        assert_eq!(curve.level_for(99), 1);
        assert_eq!(curve.level_for(100), 2);
        assert_eq!(curve.level_for(650), 4);
        assert_eq!(curve.level_for(1_000_000), 11);

        let mut last = 0;
        for xp in (0..7000).step_by(37) {
            let level = curve.level_for(xp);
            assert!(level >= last);
            last = level;
        }
    }

    #[test]
    fn next_threshold_saturates() {
        let curve = ThresholdCurve::new(EngineSettings::default().level_thresholds);
        assert_eq!(curve.next_threshold(0), Some(100));
        assert_eq!(curve.next_threshold(150), Some(300));
        assert_eq!(curve.next_threshold(6000), None);
    }
}
