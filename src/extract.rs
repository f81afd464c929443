use anyhow::Context as _;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::formats::{SectionData, SectionName};
use crate::llm::{InferenceRequest, InferenceService};
use crate::normalize::normalize_section;
use crate::prompts::{PromptTemplates, SYSTEM_MESSAGE, TemplateError};
use crate::sanitize::sanitize;
use crate::schema::section_schema;

/// Result of one bounded extraction loop. Only template problems are errors;
/// everything else is an outcome the caller can skip past.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome<T> {
    Extracted(T),
    ParseFailed { attempts: u32, last_error: String },
    InferenceFailed { error: String },
}

impl<T> ExtractOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ExtractOutcome::Extracted(value) => Some(value),
            _ => None,
        }
    }
}

pub struct SectionExtractor<'a> {
    engine: &'a dyn InferenceService,
    templates: &'a PromptTemplates,
    attempts: u32,
}

impl<'a> SectionExtractor<'a> {
    pub fn new(engine: &'a dyn InferenceService, templates: &'a PromptTemplates, attempts: u32) -> Self {
        Self {
            engine,
            templates,
            attempts: attempts.max(1),
        }
    }

    pub fn extract(
        &self,
        section: SectionName,
        text: &str,
        context: &str,
    ) -> Result<ExtractOutcome<SectionData>, TemplateError> {
        let system = self
            .templates
            .render(SYSTEM_MESSAGE, &[("section_name", section.as_str())])?;
        let prompt = self
            .templates
            .render(section.as_str(), &[("text_content", text), ("context", context)])?;

        let request = InferenceRequest {
            system,
            prompt,
            schema_name: section.as_str().to_owned(),
            schema: Some(section_schema(section)),
        };

        let outcome = self.run(&request, |value| parse_section(section, value));
        match &outcome {
            ExtractOutcome::Extracted(_) => tracing::debug!(%section, "section extracted"),
            ExtractOutcome::ParseFailed {
                attempts,
                last_error,
            } => tracing::warn!(%section, attempts, error = %last_error, "section dropped: unusable response"),
            ExtractOutcome::InferenceFailed { error } => {
                tracing::warn!(%section, error = %error, "section dropped: inference failed")
            }
        }
        Ok(outcome)
    }

    /// Call, sanitize, parse; parse failures are retried immediately up to the
    /// attempt budget. Transport failures already went through their own backoff.
    pub fn run<T>(
        &self,
        request: &InferenceRequest,
        parse: impl Fn(Value) -> anyhow::Result<T>,
    ) -> ExtractOutcome<T> {
        let mut last_error = String::new();
        for attempt in 1..=self.attempts {
            let raw = match self.engine.complete(request) {
                Ok(raw) => raw,
                Err(err) => {
                    return ExtractOutcome::InferenceFailed {
                        error: format!("{err:#}"),
                    };
                }
            };

            let cleaned = sanitize(&raw);
            let parsed = serde_json::from_str::<Value>(&cleaned)
                .context("response is not JSON")
                .and_then(&parse);
            match parsed {
                Ok(value) => return ExtractOutcome::Extracted(value),
                Err(err) => {
                    last_error = format!("{err:#}");
                    if attempt < self.attempts {
                        tracing::warn!(
                            schema = %request.schema_name,
                            attempt,
                            attempts = self.attempts,
                            error = %last_error,
                            "unusable response; retrying"
                        );
                    }
                }
            }
        }
        ExtractOutcome::ParseFailed {
            attempts: self.attempts,
            last_error,
        }
    }
}

fn typed<T: DeserializeOwned>(value: Value, section: SectionName) -> anyhow::Result<T> {
    serde_json::from_value(value).with_context(|| format!("{section} payload does not match the record shape"))
}

pub fn parse_section(section: SectionName, value: Value) -> anyhow::Result<SectionData> {
    let mut normalized = normalize_section(section, value);
    let payload = normalized
        .get_mut(section.as_str())
        .map(Value::take)
        .unwrap_or(Value::Null);

    Ok(match section {
        SectionName::Basics => SectionData::Basics(typed(payload, section)?),
        SectionName::Work => SectionData::Work(typed(payload, section)?),
        SectionName::Education => SectionData::Education(typed(payload, section)?),
        SectionName::Skills => SectionData::Skills(typed(payload, section)?),
        SectionName::Projects => SectionData::Projects(typed(payload, section)?),
        SectionName::Awards => SectionData::Awards(typed(payload, section)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::Scripted;

    #[test]
    fn wrapped_response_is_extracted() -> anyhow::Result<()> {
        let engine = Scripted::new(vec![Ok(
            "<think>hmm</think>```json\n{\"work\": [{\"name\": \"Acme\", \"position\": \"SWE\"}]}\n```".to_owned(),
        )]);
        let templates = PromptTemplates::builtin();
        let extractor = SectionExtractor::new(&engine, &templates, 3);

        let outcome = extractor.extract(SectionName::Work, "Acme SWE", "Jane")?;
        let Some(SectionData::Work(work)) = outcome.ok() else {
            anyhow::bail!("expected work payload");
        };
        assert_eq!(work[0].name.as_deref(), Some("Acme"));

        let requests = engine.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("BEGIN_CONTEXT\nJane\nEND_CONTEXT"));
        assert!(requests[0].system.contains("work section"));
        assert_eq!(requests[0].schema_name, "work");
        Ok(())
    }

    #[test]
    fn parse_failures_retry_then_give_up() -> anyhow::Result<()> {
        let engine = Scripted::new(vec![
            Ok("not json".to_owned()),
            Ok("{\"skills\": \"".to_owned()),
            Ok("still not json".to_owned()),
        ]);
        let templates = PromptTemplates::builtin();
        let extractor = SectionExtractor::new(&engine, &templates, 3);

        let outcome = extractor.extract(SectionName::Skills, "Rust", "")?;
        assert!(matches!(outcome, ExtractOutcome::ParseFailed { attempts: 3, .. }));
        assert_eq!(engine.requests.borrow().len(), 3);
        Ok(())
    }

    #[test]
    fn second_attempt_can_succeed() -> anyhow::Result<()> {
        let engine = Scripted::new(vec![
            Ok("garbage".to_owned()),
            Ok("{\"basics\": {\"name\": \"Jane\"}}".to_owned()),
        ]);
        let templates = PromptTemplates::builtin();
        let extractor = SectionExtractor::new(&engine, &templates, 3);

        let outcome = extractor.extract(SectionName::Basics, "Jane", "")?;
        assert!(matches!(outcome, ExtractOutcome::Extracted(SectionData::Basics(_))));
        assert_eq!(engine.requests.borrow().len(), 2);
        Ok(())
    }

    #[test]
    fn inference_failure_stops_the_loop() -> anyhow::Result<()> {
        let engine = Scripted::new(vec![Err(anyhow::anyhow!("connection refused"))]);
        let templates = PromptTemplates::builtin();
        let extractor = SectionExtractor::new(&engine, &templates, 3);

        let outcome = extractor.extract(SectionName::Awards, "ICPC", "")?;
        assert!(matches!(outcome, ExtractOutcome::InferenceFailed { .. }));
        assert_eq!(engine.requests.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn broken_template_is_fatal() {
        let engine = Scripted::new(Vec::new());
        let mut templates = PromptTemplates::builtin();
        templates.insert("education", "{{text_content}} {{oops");
        let extractor = SectionExtractor::new(&engine, &templates, 3);

        let result = extractor.extract(SectionName::Education, "IIT", "");
        assert!(matches!(result, Err(TemplateError::Unterminated { .. })));
        assert!(engine.requests.borrow().is_empty());
    }
}
