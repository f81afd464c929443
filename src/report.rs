use std::io::Write;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

use crate::formats::{FinalScore, ResumeRecord};
use crate::pipeline::{DocumentOutcome, Processed};

/// One CSV line per processed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportRow {
    pub file: String,
    pub status: String,
    pub name: String,
    pub email: String,
    pub profiles: String,
    pub work_count: usize,
    pub education_count: usize,
    pub skills_count: usize,
    pub projects_count: usize,
    pub open_source_score: Option<f64>,
    pub open_source_max: Option<f64>,
    pub self_projects_score: Option<f64>,
    pub self_projects_max: Option<f64>,
    pub production_score: Option<f64>,
    pub production_max: Option<f64>,
    pub technical_skills_score: Option<f64>,
    pub technical_skills_max: Option<f64>,
    pub bonus: Option<f64>,
    pub deductions: Option<f64>,
    pub final_score: Option<f64>,
    pub key_strengths: String,
    pub areas_for_improvement: String,
    pub detail: String,
    pub evaluated_at: String,
}

fn effective(score: &FinalScore, category: &str) -> (Option<f64>, Option<f64>) {
    score
        .categories
        .iter()
        .find(|c| c.category == category)
        .map(|c| (Some(c.effective), Some(c.cap)))
        .unwrap_or((None, None))
}

impl ReportRow {
    pub fn new(processed: &Processed, evaluated_at: String) -> Self {
        let mut row = ReportRow {
            file: processed.path.display().to_string(),
            status: processed.outcome.status(),
            evaluated_at,
            ..ReportRow::default()
        };

        if let Some(record) = &processed.record {
            row.fill_record(record);
        }

        match &processed.outcome {
            DocumentOutcome::Scored { evaluation, score } => {
                (row.open_source_score, row.open_source_max) = effective(score, "open_source");
                (row.self_projects_score, row.self_projects_max) = effective(score, "self_projects");
                (row.production_score, row.production_max) = effective(score, "production");
                (row.technical_skills_score, row.technical_skills_max) = effective(score, "technical_skills");
                row.bonus = Some(score.bonus);
                row.deductions = Some(score.deductions);
                row.final_score = Some(score.total);
                row.key_strengths = evaluation.key_strengths.join("; ");
                row.areas_for_improvement = evaluation.areas_for_improvement.join("; ");
            }
            DocumentOutcome::Rejected(rejection) => row.detail = rejection.to_string(),
            DocumentOutcome::EvaluationFailed(reason) | DocumentOutcome::Aborted(reason) => {
                row.detail = reason.clone();
            }
        }
        row
    }

    fn fill_record(&mut self, record: &ResumeRecord) {
        self.name = record.basics.name.clone().unwrap_or_default();
        self.email = record.basics.email.clone().unwrap_or_default();
        self.profiles = record
            .basics
            .profiles
            .iter()
            .map(|p| p.url.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        self.work_count = record.work.len();
        self.education_count = record.education.len();
        self.skills_count = record.skills.len();
        self.projects_count = record.projects.len();
    }
}

/// Appends a row, writing the header only when the file is new.
pub fn append_csv(path: &Path, processed: &Processed) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let file_exists = path.exists();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    let row = ReportRow::new(processed, chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    writer.serialize(&row).context("write csv row")?;
    writer.flush().context("flush csv")?;
    Ok(())
}

fn summary_line(processed: &Processed) -> String {
    let file = processed.path.display();
    let name = processed
        .record
        .as_ref()
        .and_then(|r| r.basics.name.as_deref())
        .unwrap_or("unknown");
    match &processed.outcome {
        DocumentOutcome::Scored { score, .. } => format!("{file}: {name} scored {:.1}", score.total),
        DocumentOutcome::Rejected(rejection) => format!("{file}: {rejection}"),
        DocumentOutcome::EvaluationFailed(reason) => format!("{file}: {name} evaluation failed: {reason}"),
        DocumentOutcome::Aborted(reason) => format!("{file}: aborted: {reason}"),
    }
}

pub fn print(out: &mut impl Write, processed: &Processed, quiet: bool) -> std::io::Result<()> {
    writeln!(out, "{}", summary_line(processed))?;
    if quiet {
        return Ok(());
    }
    let DocumentOutcome::Scored { evaluation, score } = &processed.outcome else {
        return Ok(());
    };

    for (name, category) in evaluation.scores.categories() {
        let capped = score.categories.iter().find(|c| c.category == name);
        writeln!(
            out,
            "  {name}: {:.1}/{:.1}",
            capped.map(|c| c.effective).unwrap_or(category.score),
            capped.map(|c| c.cap).unwrap_or(category.max)
        )?;
        writeln!(out, "    {}", category.evidence)?;
    }
    writeln!(out, "  bonus: +{:.1} {}", score.bonus, evaluation.bonus_points.breakdown)?;
    writeln!(out, "  deductions: -{:.1} {}", score.deductions, evaluation.deductions.reasons)?;
    writeln!(out, "  final score: {:.1}", score.total)?;
    writeln!(out, "  strengths:")?;
    for strength in &evaluation.key_strengths {
        writeln!(out, "    - {strength}")?;
    }
    writeln!(out, "  areas for improvement:")?;
    for area in &evaluation.areas_for_improvement {
        writeln!(out, "    - {area}")?;
    }
    Ok(())
}
