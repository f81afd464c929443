use crate::config::ScoringConfig;
use crate::formats::{CategoryOutcome, EvaluationResult, FinalScore};

/// Caps every category at the smaller of the model's and the configured max,
/// then bounds the total. Re-aggregating an already capped result is a no-op.
pub fn aggregate(result: &EvaluationResult, scoring: &ScoringConfig) -> FinalScore {
    let mut categories = Vec::with_capacity(4);
    for (name, category) in result.scores.categories() {
        let configured = scoring.max_scores.for_category(name).unwrap_or(category.max);
        let cap = category.max.min(configured).max(0.0);
        let effective = category.score.clamp(0.0, cap);
        if effective != category.score {
            tracing::warn!(
                category = name,
                score = category.score,
                cap,
                "category score capped"
            );
        }
        categories.push(CategoryOutcome {
            category: name.to_owned(),
            score: category.score,
            cap,
            effective,
        });
    }

    let bonus = result.bonus_points.total.clamp(0.0, scoring.bonus_max.max(0.0));
    let deductions = result.deductions.total.max(0.0);
    let category_total = categories.iter().map(|c| c.effective).sum::<f64>();
    let caps_total = categories.iter().map(|c| c.cap).sum::<f64>();

    let raw_total = category_total + bonus - deductions;
    let ceiling = scoring
        .max_final_score
        .min(caps_total + scoring.bonus_max)
        .max(scoring.min_final_score);
    let total = raw_total.clamp(scoring.min_final_score, ceiling);

    FinalScore {
        categories,
        bonus,
        deductions,
        raw_total,
        ceiling,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{BonusPoints, CategoryScore, Deductions, Scores};

    fn category(score: f64, max: f64) -> CategoryScore {
        CategoryScore {
            score,
            max,
            evidence: "evidence".to_owned(),
        }
    }

    fn result(scores: [(f64, f64); 4], bonus: f64, deductions: f64) -> EvaluationResult {
        EvaluationResult {
            scores: Scores {
                open_source: category(scores[0].0, scores[0].1),
                self_projects: category(scores[1].0, scores[1].1),
                production: category(scores[2].0, scores[2].1),
                technical_skills: category(scores[3].0, scores[3].1),
            },
            bonus_points: BonusPoints {
                total: bonus,
                breakdown: String::new(),
            },
            deductions: Deductions {
                total: deductions,
                reasons: String::new(),
            },
            key_strengths: vec!["a".to_owned()],
            areas_for_improvement: vec!["b".to_owned()],
        }
    }

    #[test]
    fn over_max_category_is_capped() {
        let scored = aggregate(
            &result([(40.0, 35.0), (20.0, 30.0), (25.0, 25.0), (10.0, 10.0)], 15.0, 5.0),
            &ScoringConfig::default(),
        );
        assert_eq!(scored.categories[0].effective, 35.0);
        assert_eq!(scored.total, 100.0);
    }

    #[test]
    fn model_cannot_raise_the_configured_max() {
        let scored = aggregate(
            &result([(50.0, 50.0), (0.0, 30.0), (0.0, 25.0), (0.0, 10.0)], 0.0, 0.0),
            &ScoringConfig::default(),
        );
        assert_eq!(scored.categories[0].cap, 35.0);
        assert_eq!(scored.total, 35.0);
    }

    #[test]
    fn totals_stay_in_bounds() {
        let scoring = ScoringConfig::default();
        let high = aggregate(
            &result([(99.0, 99.0), (99.0, 99.0), (99.0, 99.0), (99.0, 99.0)], 99.0, -4.0),
            &scoring,
        );
        assert_eq!(high.bonus, 20.0);
        assert_eq!(high.deductions, 0.0);
        assert!(high.total <= scoring.max_final_score);

        let low = aggregate(&result([(0.0, 35.0), (0.0, 30.0), (0.0, 25.0), (0.0, 10.0)], 0.0, 500.0), &scoring);
        assert_eq!(low.total, scoring.min_final_score);
    }

    #[test]
    fn clamping_is_idempotent() {
        let scoring = ScoringConfig::default();
        let first = aggregate(
            &result([(40.0, 35.0), (-2.0, 30.0), (30.0, 25.0), (10.0, 10.0)], 25.0, 0.0),
            &scoring,
        );
        let reapplied = result(
            [
                (first.categories[0].effective, first.categories[0].cap),
                (first.categories[1].effective, first.categories[1].cap),
                (first.categories[2].effective, first.categories[2].cap),
                (first.categories[3].effective, first.categories[3].cap),
            ],
            first.bonus,
            first.deductions,
        );
        assert_eq!(aggregate(&reapplied, &scoring).total, first.total);
    }
}
