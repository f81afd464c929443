use serde_json::{Value, json};

use crate::config::ScoringConfig;
use crate::formats::SectionName;

fn string() -> Value {
    json!({ "type": "string" })
}

fn strings() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn list_of(item: Value) -> Value {
    json!({ "type": "array", "items": item })
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Output contract for one section: `{"<section>": ...}`.
pub fn section_schema(section: SectionName) -> Value {
    let body = match section {
        SectionName::Basics => object(
            json!({
                "name": string(),
                "email": string(),
                "phone": string(),
                "url": string(),
                "summary": string(),
                "location": object(
                    json!({
                        "address": string(),
                        "postalCode": string(),
                        "city": string(),
                        "countryCode": string(),
                        "region": string(),
                    }),
                    &[],
                ),
                "profiles": list_of(object(
                    json!({ "network": string(), "username": string(), "url": string() }),
                    &["url"],
                )),
            }),
            &["name"],
        ),
        SectionName::Work => list_of(object(
            json!({
                "name": string(),
                "position": string(),
                "url": string(),
                "startDate": string(),
                "endDate": string(),
                "summary": string(),
                "highlights": strings(),
            }),
            &["name", "position"],
        )),
        SectionName::Education => list_of(object(
            json!({
                "institution": string(),
                "url": string(),
                "area": string(),
                "studyType": string(),
                "startDate": string(),
                "endDate": string(),
                "score": string(),
                "courses": strings(),
            }),
            &["institution"],
        )),
        SectionName::Skills => list_of(object(
            json!({ "name": string(), "level": string(), "keywords": strings() }),
            &["name", "keywords"],
        )),
        SectionName::Projects => list_of(object(
            json!({
                "name": string(),
                "startDate": string(),
                "endDate": string(),
                "description": string(),
                "highlights": strings(),
                "url": string(),
                "technologies": strings(),
                "skills": strings(),
            }),
            &["name"],
        )),
        SectionName::Awards => list_of(object(
            json!({
                "title": string(),
                "date": string(),
                "awarder": string(),
                "summary": string(),
            }),
            &["title"],
        )),
    };

    let mut properties = serde_json::Map::new();
    properties.insert(section.as_str().to_owned(), body);
    let mut schema = object(Value::Object(properties), &[section.as_str()]);
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("title".to_owned(), json!(section.as_str()));
    }
    schema
}

pub const EVALUATION_SCHEMA_TITLE: &str = "evaluation";

/// Output contract for the evaluation. The bonus bound follows the configured cap.
pub fn evaluation_schema(scoring: &ScoringConfig) -> Value {
    let category = object(
        json!({
            "score": { "type": "number", "minimum": 0 },
            "max": { "type": "number", "exclusiveMinimum": 0 },
            "evidence": { "type": "string", "minLength": 1 },
        }),
        &["score", "max", "evidence"],
    );

    let mut schema = object(
        json!({
            "scores": object(
                json!({
                    "open_source": category.clone(),
                    "self_projects": category.clone(),
                    "production": category.clone(),
                    "technical_skills": category,
                }),
                &["open_source", "self_projects", "production", "technical_skills"],
            ),
            "bonus_points": object(
                json!({
                    "total": { "type": "number", "minimum": 0, "maximum": scoring.bonus_max },
                    "breakdown": string(),
                }),
                &["total", "breakdown"],
            ),
            "deductions": object(
                json!({
                    "total": { "type": "number", "minimum": 0 },
                    "reasons": string(),
                }),
                &["total", "reasons"],
            ),
            "key_strengths": { "type": "array", "items": string(), "minItems": 1, "maxItems": 5 },
            "areas_for_improvement": { "type": "array", "items": string(), "minItems": 1, "maxItems": 5 },
        }),
        &[
            "scores",
            "bonus_points",
            "deductions",
            "key_strengths",
            "areas_for_improvement",
        ],
    );
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("title".to_owned(), json!(EVALUATION_SCHEMA_TITLE));
    }
    schema
}
