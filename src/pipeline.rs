use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::assemble::{Rejection, merge, render_text, validate};
use crate::cache::{JsonCache, resume_key};
use crate::cli::{EngineArgs, ExtractArgs, ScoreArgs, SegmentArgs};
use crate::config::Config;
use crate::enrich;
use crate::evaluate::Evaluator;
use crate::extract::{ExtractOutcome, SectionExtractor};
use crate::formats::{EvaluationResult, FinalScore, ResumeRecord, Section, SectionData, SectionName, SectionStatus};
use crate::llm::{InferenceService, build_engine};
use crate::pdf::{is_pdf, is_text, read_document};
use crate::prompts::{PromptTemplates, TemplateError};
use crate::report;
use crate::score::aggregate;
use crate::segment::{build_context, segment};

/// How one document ended. Only `Aborted` means something went wrong with the
/// tool itself; the rest are ordinary outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Scored {
        evaluation: EvaluationResult,
        score: FinalScore,
    },
    Rejected(Rejection),
    EvaluationFailed(String),
    Aborted(String),
}

impl DocumentOutcome {
    pub fn status(&self) -> String {
        match self {
            DocumentOutcome::Scored { .. } => "scored".to_owned(),
            DocumentOutcome::Rejected(reason) => format!("rejected:{}", reason.as_str()),
            DocumentOutcome::EvaluationFailed(_) => "evaluation_failed".to_owned(),
            DocumentOutcome::Aborted(_) => "aborted".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub path: PathBuf,
    pub record: Option<ResumeRecord>,
    pub outcome: DocumentOutcome,
}

pub struct Pipeline {
    config: Config,
    engine: Box<dyn InferenceService>,
    templates: PromptTemplates,
    cache: Option<JsonCache>,
    enrich: bool,
}

impl Pipeline {
    pub fn new(config: Config, enrich: bool) -> anyhow::Result<Self> {
        let engine = build_engine(&config.llm).context("build inference engine")?;
        let templates = PromptTemplates::load(config.prompts.dir.as_deref()).context("load prompt templates")?;
        Ok(Self::with_engine(config, engine, templates, enrich))
    }

    pub fn with_engine(
        config: Config,
        engine: Box<dyn InferenceService>,
        templates: PromptTemplates,
        enrich: bool,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| JsonCache::new(config.cache.dir.clone()));
        Self {
            config,
            engine,
            templates,
            cache,
            enrich,
        }
    }

    /// Sections in extraction order: basics without context, then the rest
    /// with the basics/education snippet.
    pub fn extract_sections(&self, text: &str) -> Result<(Vec<Section>, Vec<SectionData>), TemplateError> {
        let segments = segment(text);
        if segments.is_unstructured() {
            tracing::info!("no section headers found; extracting every section from the full text");
        }
        let extractor = SectionExtractor::new(self.engine.as_ref(), &self.templates, self.config.llm.parse_attempts);
        let context = build_context(&segments);

        let mut sections = segments.sections();
        let mut extracted = Vec::new();
        for section in &mut sections {
            let context = if section.name == SectionName::Basics {
                ""
            } else {
                context.as_str()
            };
            match extractor.extract(section.name, &section.raw_text, context)? {
                ExtractOutcome::Extracted(data) => {
                    section.status = SectionStatus::Extracted;
                    extracted.push(data);
                }
                _ => section.status = SectionStatus::Failed,
            }
        }
        Ok((sections, extracted))
    }

    /// The merged record for `text`, served from the record cache when possible.
    pub fn record_for(&self, text: &str) -> Result<ResumeRecord, TemplateError> {
        let key = resume_key(text);
        if let Some(cache) = &self.cache
            && let Some(record) = cache.get::<ResumeRecord>(&key)
        {
            tracing::info!(key, "using cached record");
            return Ok(record);
        }

        let (sections, extracted) = self.extract_sections(text)?;
        let failed = sections
            .iter()
            .filter(|s| s.status == SectionStatus::Failed)
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>();
        tracing::info!(
            sections = sections.len(),
            extracted = extracted.len(),
            failed = ?failed,
            "sections extracted"
        );

        let record = merge(extracted);
        // Partial extractions are not cached so a later run can retry them.
        if failed.is_empty()
            && let Some(cache) = &self.cache
            && let Err(err) = cache.put(&key, &record)
        {
            tracing::warn!(key, error = %format!("{err:#}"), "record cache write failed");
        }
        Ok(record)
    }

    pub fn process_text(&self, text: &str) -> (Option<ResumeRecord>, DocumentOutcome) {
        let record = match self.record_for(text) {
            Ok(record) => record,
            Err(err) => return (None, DocumentOutcome::Aborted(err.to_string())),
        };
        if let Err(rejection) = validate(&record) {
            tracing::warn!(reason = rejection.as_str(), "{rejection}");
            return (Some(record), DocumentOutcome::Rejected(rejection));
        }

        let mut evaluation_input = render_text(&record);
        if self.enrich {
            let enrichment = enrich::collect(&record, &self.config, self.cache.as_ref());
            if enrichment.is_empty() {
                tracing::info!("no external signals found; evaluating the resume alone");
            } else {
                evaluation_input.push_str(&enrich::render(&enrichment));
            }
        }

        let evaluator = Evaluator::new(
            self.engine.as_ref(),
            &self.templates,
            &self.config.evaluation,
            self.config.llm.parse_attempts,
        );
        let outcome = match evaluator.evaluate(&evaluation_input) {
            Err(err) => DocumentOutcome::Aborted(err.to_string()),
            Ok(ExtractOutcome::Extracted(evaluation)) => {
                let score = aggregate(&evaluation, &self.config.evaluation);
                DocumentOutcome::Scored { evaluation, score }
            }
            Ok(ExtractOutcome::ParseFailed { last_error, .. }) => DocumentOutcome::EvaluationFailed(last_error),
            Ok(ExtractOutcome::InferenceFailed { error }) => DocumentOutcome::EvaluationFailed(error),
        };
        (Some(record), outcome)
    }

    pub fn process_document(&self, path: &Path) -> Processed {
        let _span = tracing::info_span!("document", path = %path.display()).entered();
        let (record, outcome) = match read_document(path) {
            Ok(text) => self.process_text(&text),
            Err(err) => (None, DocumentOutcome::Aborted(format!("{err:#}"))),
        };
        if let DocumentOutcome::Aborted(reason) = &outcome {
            tracing::error!(reason = %reason, "document aborted");
        }
        Processed {
            path: path.to_owned(),
            record,
            outcome,
        }
    }
}

/// Résumés under `path`: the path itself when it is a file, otherwise every
/// PDF (and text file when asked) in the folder, sorted.
pub fn collect_documents(path: &Path, recursive: bool, include_text: bool) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_owned()]);
    }
    if !path.is_dir() {
        anyhow::bail!("no such file or folder: {}", path.display());
    }

    let mut found = Vec::new();
    let mut pending = vec![path.to_owned()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).with_context(|| format!("read folder {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read folder {}", dir.display()))?;
            let entry_path = entry.path();
            if entry_path.is_dir() {
                if recursive {
                    pending.push(entry_path);
                }
            } else if is_pdf(&entry_path) || (include_text && is_text(&entry_path)) {
                found.push(entry_path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn load_config(args: &EngineArgs) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(engine) = args.engine {
        config.llm.engine = engine;
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    Ok(config)
}

pub fn run_score(args: ScoreArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.engine)?;
    if let Some(csv) = &args.csv {
        config.output.csv = csv.clone();
    }
    let documents = collect_documents(&args.path, args.recursive, args.include_text)?;
    if documents.is_empty() {
        tracing::warn!(path = %args.path.display(), "no documents found");
        return Ok(());
    }
    tracing::info!(documents = documents.len(), "scoring");

    let csv_path = config.output.csv.clone();
    let pipeline = Pipeline::new(config, !args.no_enrich)?;
    let mut stdout = std::io::stdout().lock();
    for path in &documents {
        let processed = pipeline.process_document(path);
        if let Err(err) = report::append_csv(&csv_path, &processed) {
            tracing::warn!(csv = %csv_path.display(), error = %format!("{err:#}"), "csv row not written");
        }
        report::print(&mut stdout, &processed, args.quiet).context("write report")?;
    }
    Ok(())
}

pub fn run_segment(args: SegmentArgs) -> anyhow::Result<()> {
    let text = read_document(&args.file)?;
    let segments = segment(&text);
    let json = serde_json::to_string_pretty(&segments).context("serialize segments")?;
    println!("{json}");
    Ok(())
}

pub fn run_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let config = load_config(&args.engine)?;
    let text = read_document(&args.file)?;
    let pipeline = Pipeline::new(config, false)?;
    let record = pipeline.record_for(&text).context("extract record")?;
    if let Err(rejection) = validate(&record) {
        tracing::warn!(reason = rejection.as_str(), "{rejection}");
    }

    let json = serde_json::to_string_pretty(&record).context("serialize record")?;
    match &args.out {
        Some(out) => {
            std::fs::write(out, format!("{json}\n")).with_context(|| format!("write {}", out.display()))?;
            tracing::info!(out = %out.display(), "record written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
