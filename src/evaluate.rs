use anyhow::Context as _;
use serde_json::Value;

use crate::config::ScoringConfig;
use crate::extract::{ExtractOutcome, SectionExtractor};
use crate::formats::EvaluationResult;
use crate::llm::{InferenceRequest, InferenceService};
use crate::normalize::normalize_evaluation;
use crate::prompts::{EVALUATION_CRITERIA, EVALUATION_SYSTEM, PromptTemplates, TemplateError};
use crate::schema::{EVALUATION_SCHEMA_TITLE, evaluation_schema};

pub struct Evaluator<'a> {
    engine: &'a dyn InferenceService,
    templates: &'a PromptTemplates,
    scoring: &'a ScoringConfig,
    attempts: u32,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        engine: &'a dyn InferenceService,
        templates: &'a PromptTemplates,
        scoring: &'a ScoringConfig,
        attempts: u32,
    ) -> Self {
        Self {
            engine,
            templates,
            scoring,
            attempts,
        }
    }

    pub fn request(&self, resume_text: &str) -> Result<InferenceRequest, TemplateError> {
        let maxima = &self.scoring.max_scores;
        let open_source = maxima.open_source.to_string();
        let self_projects = maxima.self_projects.to_string();
        let production = maxima.production.to_string();
        let technical_skills = maxima.technical_skills.to_string();
        let bonus = self.scoring.bonus_max.to_string();
        let vars = [
            ("text_content", resume_text),
            ("open_source_max", open_source.as_str()),
            ("self_projects_max", self_projects.as_str()),
            ("production_max", production.as_str()),
            ("technical_skills_max", technical_skills.as_str()),
            ("bonus_max", bonus.as_str()),
        ];

        Ok(InferenceRequest {
            system: self.templates.render(EVALUATION_SYSTEM, &vars)?,
            prompt: self.templates.render(EVALUATION_CRITERIA, &vars)?,
            schema_name: EVALUATION_SCHEMA_TITLE.to_owned(),
            schema: Some(evaluation_schema(self.scoring)),
        })
    }

    /// One evaluation with the extractor's bounded parse-retry loop. A result
    /// that parses but breaks the contract counts as a parse failure.
    pub fn evaluate(&self, resume_text: &str) -> Result<ExtractOutcome<EvaluationResult>, TemplateError> {
        let request = self.request(resume_text)?;
        let runner = SectionExtractor::new(self.engine, self.templates, self.attempts);
        let outcome = runner.run(&request, |value| parse_evaluation(value, self.scoring));
        match &outcome {
            ExtractOutcome::Extracted(_) => tracing::debug!("evaluation parsed"),
            ExtractOutcome::ParseFailed {
                attempts,
                last_error,
            } => tracing::warn!(attempts, error = %last_error, "evaluation failed: unusable response"),
            ExtractOutcome::InferenceFailed { error } => {
                tracing::warn!(error = %error, "evaluation failed: inference error")
            }
        }
        Ok(outcome)
    }
}

pub fn parse_evaluation(value: Value, scoring: &ScoringConfig) -> anyhow::Result<EvaluationResult> {
    let result: EvaluationResult = serde_json::from_value(normalize_evaluation(value))
        .context("evaluation does not match the result shape")?;
    validate(&result, scoring)?;
    Ok(result)
}

pub fn validate(result: &EvaluationResult, scoring: &ScoringConfig) -> anyhow::Result<()> {
    for (name, category) in result.scores.categories() {
        if !category.score.is_finite() || category.score < 0.0 {
            anyhow::bail!("{name}: score must be a non-negative number");
        }
        if !category.max.is_finite() || category.max <= 0.0 {
            anyhow::bail!("{name}: max must be positive");
        }
        if category.evidence.trim().is_empty() {
            anyhow::bail!("{name}: evidence is empty");
        }
    }
    let bonus = result.bonus_points.total;
    if !(0.0..=scoring.bonus_max).contains(&bonus) {
        anyhow::bail!("bonus_points.total {bonus} outside 0..={}", scoring.bonus_max);
    }
    if !result.deductions.total.is_finite() || result.deductions.total < 0.0 {
        anyhow::bail!("deductions.total must be non-negative");
    }
    for (name, items) in [
        ("key_strengths", &result.key_strengths),
        ("areas_for_improvement", &result.areas_for_improvement),
    ] {
        if !(1..=5).contains(&items.len()) {
            anyhow::bail!("{name}: expected 1 to 5 entries, got {}", items.len());
        }
    }
    Ok(())
}
