//! Repairs the field-name and shape drift models produce before the typed
//! deserialization of a section payload.

use serde_json::{Map, Value, json};

use crate::formats::SectionName;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const NETWORKS: &[(&str, &str)] = &[
    ("github.com", "GitHub"),
    ("gitlab.com", "GitLab"),
    ("linkedin.com", "LinkedIn"),
    ("leetcode.com", "LeetCode"),
    ("stackoverflow.com", "Stack Overflow"),
    ("hackerrank.com", "HackerRank"),
    ("behance.net", "Behance"),
    ("dev.to", "DEV Community"),
    ("medium.com", "Medium"),
    ("twitter.com", "X"),
    ("x.com", "X"),
];

/// Returns `{"<section>": payload}` with aliases resolved and values coerced to
/// the record shape.
pub fn normalize_section(section: SectionName, value: Value) -> Value {
    let container = match value {
        Value::Object(obj) => obj,
        Value::Array(items) => {
            let mut obj = Map::new();
            obj.insert(section.as_str().to_owned(), Value::Array(items));
            obj
        }
        _ => Map::new(),
    };

    let payload = match section {
        SectionName::Basics => normalize_basics(&container),
        SectionName::Work => list(section_items(&container, &["work", "work_experience", "experience"]), normalize_work),
        SectionName::Education => list(section_items(&container, &["education"]), normalize_education),
        SectionName::Skills => Value::Array(normalize_skills(&container)),
        SectionName::Projects => Value::Array(normalize_projects(&container)),
        SectionName::Awards => list(
            section_items(&container, &["awards", "achievements", "honors_and_awards"]),
            normalize_award,
        ),
    };

    let mut out = Map::new();
    out.insert(section.as_str().to_owned(), payload);
    Value::Object(out)
}

fn section_items(container: &Map<String, Value>, aliases: &[&str]) -> Vec<Value> {
    let found = aliases.iter().find_map(|key| container.get(*key));
    match found {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(obj)) => vec![Value::Object(obj.clone())],
        // a single bare entry
        None if !container.is_empty() => vec![Value::Object(container.clone())],
        _ => Vec::new(),
    }
}

fn list(items: Vec<Value>, f: fn(&Map<String, Value>) -> Option<Value>) -> Value {
    Value::Array(
        items
            .iter()
            .filter_map(|item| item.as_object())
            .filter_map(f)
            .collect(),
    )
}

fn text(value: &Value) -> Option<String> {
    let out = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().filter_map(text).collect::<Vec<_>>().join(" "),
        _ => return None,
    };
    (!out.is_empty()).then_some(out)
}

fn field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(text))
}

/// A list of strings; a lone string becomes one item.
fn items_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(text).collect(),
        Some(other) => text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// A list of strings; a lone string is split on commas.
fn comma_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => split_commas(s),
        other => items_of(other),
    }
}

fn split_commas(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

fn opt(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn normalize_basics(container: &Map<String, Value>) -> Value {
    let basics = match container.get("basics") {
        Some(Value::Object(obj)) => obj.clone(),
        _ => container.clone(),
    };

    let mut profiles = Vec::new();
    if let Some(Value::Array(items)) = basics.get("profiles") {
        for item in items {
            match item {
                Value::Object(profile) => {
                    if let Some(url) = field(profile, &["url"]) {
                        profiles.push(profile_value(
                            &url,
                            field(profile, &["network"]),
                            field(profile, &["username"]),
                        ));
                    }
                }
                Value::String(url) if url.contains('.') => {
                    profiles.push(profile_value(url.trim(), None, None));
                }
                _ => {}
            }
        }
    }
    for key in ["github", "gitlab", "linkedin", "blog"] {
        if let Some(url) = field(&basics, &[key])
            && !profiles.iter().any(|p| p["url"] == url.as_str())
        {
            profiles.push(profile_value(&url, None, None));
        }
    }

    let location = match basics.get("location") {
        Some(Value::Object(loc)) => json!({
            "address": opt(field(loc, &["address"])),
            "postalCode": opt(field(loc, &["postalCode", "postal_code"])),
            "city": opt(field(loc, &["city"])),
            "countryCode": opt(field(loc, &["countryCode", "country_code", "country"])),
            "region": opt(field(loc, &["region", "state"])),
        }),
        Some(Value::String(s)) if !s.trim().is_empty() => json!({ "address": s.trim() }),
        _ => Value::Null,
    };

    json!({
        "name": opt(field(&basics, &["name", "full_name", "fullName"])),
        "email": opt(field(&basics, &["email"])),
        "phone": opt(field(&basics, &["phone", "mobile"])),
        "url": opt(field(&basics, &["url", "website"])),
        "summary": opt(field(&basics, &["summary", "objective", "about"])),
        "location": location,
        "profiles": profiles,
    })
}

fn profile_value(url: &str, network: Option<String>, username: Option<String>) -> Value {
    let domain = domain_of(url);
    let known = NETWORKS
        .iter()
        .find(|(host, _)| domain == *host)
        .map(|(_, name)| (*name).to_owned());
    let network = network.or_else(|| known.clone());
    let username = username.or_else(|| known.and_then(|_| username_from_url(url, &domain)));
    json!({ "network": opt(network), "username": opt(username), "url": url })
}

pub fn domain_of(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    host.trim_start_matches("www.").to_ascii_lowercase()
}

fn username_from_url(url: &str, domain: &str) -> Option<String> {
    let lower = url.to_ascii_lowercase();
    let at = lower.find(domain)? + domain.len();
    let path = url.get(at..)?.split(['?', '#']).next()?;
    let parts = path.split('/').filter(|p| !p.is_empty()).collect::<Vec<_>>();
    let part = match domain {
        "linkedin.com" => parts.get(1),
        "stackoverflow.com" => parts.get(2),
        _ => parts.first(),
    }?;
    let username = part.trim_start_matches('@');
    (!username.is_empty()).then(|| username.to_owned())
}

fn normalize_work(item: &Map<String, Value>) -> Option<Value> {
    let mut start = field(item, &["startDate", "start_date"]);
    let mut end = field(item, &["endDate", "end_date"]);

    let range = field(item, &["dates", "duration", "period"]).or_else(|| start.clone());
    if let Some(range) = range
        && looks_like_range(&range)
    {
        let (parsed_start, parsed_end) = parse_date_range(&range);
        if parsed_start.is_some() {
            start = parsed_start;
            end = parsed_end.or(end);
        }
    }

    let name = field(item, &["name", "company", "organization", "employer"]);
    let position = field(item, &["position", "title", "role", "type"]);
    if name.is_none() && position.is_none() {
        return None;
    }

    Some(json!({
        "name": opt(name),
        "position": opt(position),
        "url": opt(field(item, &["url"])),
        "startDate": opt(start),
        "endDate": opt(end),
        "summary": opt(field(item, &["summary", "description"])),
        "highlights": items_of(item.get("highlights").or_else(|| item.get("achievements"))),
    }))
}

fn normalize_education(item: &Map<String, Value>) -> Option<Value> {
    let institution = field(item, &["institution", "school", "university", "college"]);
    let degree = field(item, &["degree"]);

    let (mut study_type, mut area) = (field(item, &["studyType", "study_type"]), field(item, &["area", "major", "field"]));
    if let Some(degree) = degree {
        match degree.split_once(", ") {
            Some((kind, subject)) => {
                study_type = study_type.or_else(|| Some(kind.trim().to_owned()));
                area = area.or_else(|| Some(subject.trim().to_owned()));
            }
            None => study_type = study_type.or(Some(degree)),
        }
    }

    let (mut start, mut end) = (field(item, &["startDate", "start_date"]), field(item, &["endDate", "end_date"]));
    if let Some(years) = field(item, &["years", "dates", "duration"]) {
        let (parsed_start, parsed_end) = parse_date_range(&years);
        start = start.or(parsed_start);
        end = end.or(parsed_end);
    }

    if institution.is_none() && study_type.is_none() {
        return None;
    }

    Some(json!({
        "institution": opt(institution),
        "url": opt(field(item, &["url"])),
        "area": opt(area),
        "studyType": opt(study_type),
        "startDate": opt(start),
        "endDate": opt(end),
        "score": opt(field(item, &["score", "gpa", "cgpa", "percentage", "grade"])),
        "courses": comma_list(item.get("courses")),
    }))
}

fn normalize_skills(container: &Map<String, Value>) -> Vec<Value> {
    let mut groups = Vec::new();

    match container.get("skills") {
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => {
            let keywords = items.iter().filter_map(text).collect::<Vec<_>>();
            if !keywords.is_empty() {
                groups.push(json!({ "name": "Programming Languages", "level": null, "keywords": keywords }));
            }
        }
        Some(Value::Array(items)) => {
            groups.extend(items.iter().filter_map(|item| item.as_object()).filter_map(normalize_skill));
        }
        // {"Languages": ["Rust"], "Tools": "git, docker"}
        Some(Value::Object(by_category)) => {
            for (category, keywords) in by_category {
                let keywords = comma_list(Some(keywords));
                if !keywords.is_empty() {
                    groups.push(json!({ "name": category, "level": null, "keywords": keywords }));
                }
            }
        }
        Some(Value::String(s)) => {
            groups.push(json!({ "name": "Programming Languages", "level": null, "keywords": split_commas(s) }));
        }
        _ => {
            if let Some(single) = normalize_skill(container) {
                groups.push(single);
            }
        }
    }

    for (key, name) in [
        ("librariesFrameworks", "Libraries/Frameworks"),
        ("toolsPlatforms", "Tools/Platforms"),
        ("databases", "Databases"),
    ] {
        let keywords = comma_list(container.get(key));
        if !keywords.is_empty() {
            groups.push(json!({ "name": name, "level": null, "keywords": keywords }));
        }
    }
    groups
}

fn normalize_skill(item: &Map<String, Value>) -> Option<Value> {
    let name = field(item, &["name", "category"]);
    let keywords = comma_list(item.get("keywords").or_else(|| item.get("skills")).or_else(|| item.get("items")));
    if name.is_none() && keywords.is_empty() {
        return None;
    }
    Some(json!({
        "name": opt(name),
        "level": opt(field(item, &["level"])),
        "keywords": keywords,
    }))
}

fn normalize_projects(container: &Map<String, Value>) -> Vec<Value> {
    let mut projects = Vec::new();
    let has_alias = container.contains_key("projects") || container.contains_key("projectsOpenSource");

    if has_alias {
        for key in ["projects", "projectsOpenSource"] {
            let items = match container.get(key) {
                Some(Value::Array(items)) => items.clone(),
                Some(Value::Object(obj)) => vec![Value::Object(obj.clone())],
                _ => Vec::new(),
            };
            projects.extend(items.iter().filter_map(|i| i.as_object()).filter_map(normalize_project));
        }
    } else if let Some(single) = normalize_project(container) {
        projects.push(single);
    }
    projects
}

fn normalize_project(item: &Map<String, Value>) -> Option<Value> {
    let mut name = field(item, &["name", "title"])?;
    let mut skills = comma_list(item.get("skills"));
    if let Some((project, stack)) = name.clone().split_once('|') {
        if skills.is_empty() {
            skills = split_commas(stack);
        }
        name = project.trim().to_owned();
    }

    let technologies = comma_list(item.get("technologies").or_else(|| item.get("tech_stack")));
    if skills.is_empty() {
        skills = technologies.clone();
    }

    let mut highlights = items_of(item.get("highlights"));
    if highlights.is_empty()
        && let Some(kind) = field(item, &["type"])
    {
        highlights.push(kind);
    }

    Some(json!({
        "name": name,
        "startDate": opt(field(item, &["startDate", "start_date"])),
        "endDate": opt(field(item, &["endDate", "end_date"])),
        "description": opt(field(item, &["description", "summary"])),
        "highlights": highlights,
        "url": opt(field(item, &["url", "link", "github", "repository"])),
        "technologies": technologies,
        "skills": skills,
    }))
}

fn normalize_award(item: &Map<String, Value>) -> Option<Value> {
    let title = field(item, &["title", "name"])?;
    let date = field(item, &["date"]).or_else(|| field(item, &["year"]).map(|year| format!("{year}-01")));
    Some(json!({
        "title": title,
        "date": opt(date),
        "awarder": opt(field(item, &["awarder", "organization", "issuer"])),
        "summary": opt(field(item, &["summary", "description"])),
    }))
}

fn looks_like_range(s: &str) -> bool {
    s.contains(" - ")
        || s.contains(" – ")
        || s.contains(" to ")
        || s.contains("onwards")
        || s.split_whitespace().next().is_some_and(|first| {
            first.split_once('-').is_some_and(|(a, b)| is_month(a) && is_month(b))
        })
        || is_year_range(s)
}

fn is_month(s: &str) -> bool {
    MONTHS.iter().any(|m| s.get(..3).is_some_and(|p| p.eq_ignore_ascii_case(m)))
}

fn is_year(s: &str) -> bool {
    s.trim().len() == 4 && s.trim().chars().all(|c| c.is_ascii_digit())
}

fn is_year_range(s: &str) -> bool {
    s.split_once('-').is_some_and(|(a, b)| is_year(a) && is_year(b))
}

/// `"Jan-Mar 2021"` → `("Jan 2021", "Mar 2021")`, `"2020-2021"` → `("2020-01", "2021-12")`,
/// `"Jun 2022 onwards"` → `("Jun 2022", "Present")`, `"Jan 2020 - Present"` split as written.
pub fn parse_date_range(raw: &str) -> (Option<String>, Option<String>) {
    let s = raw.trim();
    if s.is_empty() {
        return (None, None);
    }

    if let Some(start) = s.strip_suffix("onwards") {
        let start = start.trim();
        return ((!start.is_empty()).then(|| start.to_owned()), Some("Present".to_owned()));
    }

    for sep in [" - ", " – ", " to "] {
        if let Some((start, end)) = s.split_once(sep) {
            let owned = |p: &str| (!p.trim().is_empty()).then(|| p.trim().to_owned());
            return (owned(start), owned(end));
        }
    }

    if is_year_range(s)
        && let Some((start, end)) = s.split_once('-')
    {
        return (Some(format!("{}-01", start.trim())), Some(format!("{}-12", end.trim())));
    }

    let parts = s.split_whitespace().collect::<Vec<_>>();
    if parts.len() >= 2 && is_month(parts[0]) {
        let year = parts[parts.len() - 1];
        if let Some((from, to)) = parts[0].split_once('-')
            && is_month(to)
        {
            return (Some(format!("{from} {year}")), Some(format!("{to} {year}")));
        }
        return (Some(format!("{} {year}", parts[0])), None);
    }

    (None, None)
}

/// Numeric strings become numbers and string lists keep at most five entries.
pub fn normalize_evaluation(value: Value) -> Value {
    let Value::Object(mut obj) = value else {
        return value;
    };

    if let Some(Value::Object(scores)) = obj.get_mut("scores") {
        for category in scores.values_mut() {
            if let Value::Object(category) = category {
                for key in ["score", "max"] {
                    coerce_number(category, key);
                }
                if let Some(evidence) = category.get("evidence").and_then(text) {
                    category.insert("evidence".to_owned(), Value::String(evidence));
                }
            }
        }
    }
    for section in ["bonus_points", "deductions"] {
        if let Some(Value::Object(inner)) = obj.get_mut(section) {
            coerce_number(inner, "total");
            for key in ["breakdown", "reasons"] {
                if let Some(joined) = inner.get(key).filter(|v| v.is_array()).and_then(text) {
                    inner.insert(key.to_owned(), Value::String(joined));
                }
            }
        }
    }
    for key in ["key_strengths", "areas_for_improvement"] {
        let items = items_of(obj.get(key)).into_iter().take(5).collect::<Vec<_>>();
        obj.insert(key.to_owned(), json!(items));
    }
    Value::Object(obj)
}

fn coerce_number(obj: &mut Map<String, Value>, key: &str) {
    if let Some(Value::String(s)) = obj.get(key)
        && let Ok(n) = s.trim().trim_end_matches(" points").parse::<f64>()
    {
        obj.insert(key.to_owned(), json!(n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Basics, Education, Project, Skill, Work};

    fn payload<T: serde::de::DeserializeOwned>(section: SectionName, value: Value) -> anyhow::Result<T> {
        let normalized = normalize_section(section, value);
        Ok(serde_json::from_value(normalized[section.as_str()].clone())?)
    }

    #[test]
    fn work_aliases_and_field_drift() -> anyhow::Result<()> {
        let work: Vec<Work> = payload(
            SectionName::Work,
            json!({ "work_experience": [{
                "company": "Acme",
                "title": "Engineer",
                "startDate": "Jan-Mar 2021",
                "description": ["Built", "things"]
            }]}),
        )?;
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].name.as_deref(), Some("Acme"));
        assert_eq!(work[0].position.as_deref(), Some("Engineer"));
        assert_eq!(work[0].start_date.as_deref(), Some("Jan 2021"));
        assert_eq!(work[0].end_date.as_deref(), Some("Mar 2021"));
        assert_eq!(work[0].summary.as_deref(), Some("Built things"));
        Ok(())
    }

    #[test]
    fn bare_array_is_wrapped() -> anyhow::Result<()> {
        let work: Vec<Work> = payload(
            SectionName::Work,
            json!([{ "name": "Acme", "position": "SWE", "startDate": "Jan 2020 - Present" }]),
        )?;
        assert_eq!(work[0].start_date.as_deref(), Some("Jan 2020"));
        assert_eq!(work[0].end_date.as_deref(), Some("Present"));
        Ok(())
    }

    #[test]
    fn string_skills_become_one_group() -> anyhow::Result<()> {
        let skills: Vec<Skill> = payload(
            SectionName::Skills,
            json!({ "skills": ["Rust", "Go"], "databases": "Postgres, Redis" }),
        )?;
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].name.as_deref(), Some("Programming Languages"));
        assert_eq!(skills[0].keywords, vec!["Rust", "Go"]);
        assert_eq!(skills[1].name.as_deref(), Some("Databases"));
        assert_eq!(skills[1].keywords, vec!["Postgres", "Redis"]);
        Ok(())
    }

    #[test]
    fn skill_map_by_category() -> anyhow::Result<()> {
        let skills: Vec<Skill> = payload(
            SectionName::Skills,
            json!({ "skills": { "Languages": ["Rust"], "Tools": "git, docker" } }),
        )?;
        assert_eq!(skills.len(), 2);
        assert!(skills.iter().any(|s| s.keywords == vec!["git", "docker"]));
        Ok(())
    }

    #[test]
    fn education_degree_and_gpa() -> anyhow::Result<()> {
        let education: Vec<Education> = payload(
            SectionName::Education,
            json!({ "education": [{
                "institution": "IIT",
                "degree": "B.Tech, Computer Science",
                "gpa": 8.7,
                "years": "2019-2023"
            }]}),
        )?;
        assert_eq!(education[0].study_type.as_deref(), Some("B.Tech"));
        assert_eq!(education[0].area.as_deref(), Some("Computer Science"));
        assert_eq!(education[0].score.as_deref(), Some("8.7"));
        assert_eq!(education[0].start_date.as_deref(), Some("2019-01"));
        assert_eq!(education[0].end_date.as_deref(), Some("2023-12"));
        Ok(())
    }

    #[test]
    fn project_name_with_stack() -> anyhow::Result<()> {
        let projects: Vec<Project> = payload(
            SectionName::Projects,
            json!({
                "projects": [{ "name": "Crawler | Rust, Tokio", "technologies": "Rust, Tokio" }],
                "projectsOpenSource": [{ "name": "serde", "summary": "patches" }]
            }),
        )?;
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name.as_deref(), Some("Crawler"));
        assert_eq!(projects[0].skills, vec!["Rust", "Tokio"]);
        assert_eq!(projects[0].technologies, vec!["Rust", "Tokio"]);
        assert_eq!(projects[1].description.as_deref(), Some("patches"));
        Ok(())
    }

    #[test]
    fn profiles_get_network_and_username() -> anyhow::Result<()> {
        let basics: Basics = payload(
            SectionName::Basics,
            json!({ "basics": {
                "name": "Jane",
                "profiles": [
                    { "url": "https://www.linkedin.com/in/jane-doe/" },
                    { "url": "https://github.com/janedoe?tab=repositories" },
                    { "network": "Twitter" }
                ],
                "location": "Pune"
            }}),
        )?;
        assert_eq!(basics.profiles.len(), 2);
        assert_eq!(basics.profiles[0].network.as_deref(), Some("LinkedIn"));
        assert_eq!(basics.profiles[0].username.as_deref(), Some("jane-doe"));
        assert_eq!(basics.profiles[1].network.as_deref(), Some("GitHub"));
        assert_eq!(basics.profiles[1].username.as_deref(), Some("janedoe"));
        assert_eq!(
            basics.location.and_then(|l| l.address).as_deref(),
            Some("Pune")
        );
        Ok(())
    }

    #[test]
    fn awards_from_achievements_with_year() -> anyhow::Result<()> {
        let awards: Vec<crate::formats::Award> = payload(
            SectionName::Awards,
            json!({ "achievements": [{ "name": "ICPC Regionalist", "year": 2022, "organization": "ICPC" }] }),
        )?;
        assert_eq!(awards[0].title.as_deref(), Some("ICPC Regionalist"));
        assert_eq!(awards[0].date.as_deref(), Some("2022-01"));
        assert_eq!(awards[0].awarder.as_deref(), Some("ICPC"));
        Ok(())
    }

    #[test]
    fn date_ranges() {
        let own = |a: &str, b: &str| (Some(a.to_owned()), Some(b.to_owned()));
        assert_eq!(parse_date_range("Jun 2022 onwards"), own("Jun 2022", "Present"));
        assert_eq!(parse_date_range("2020-2021"), own("2020-01", "2021-12"));
        assert_eq!(parse_date_range("Jan-Mar 2021"), own("Jan 2021", "Mar 2021"));
        assert_eq!(parse_date_range("May 2021"), (Some("May 2021".to_owned()), None));
        assert_eq!(parse_date_range("sometime"), (None, None));
    }

    #[test]
    fn evaluation_strings_are_coerced() {
        let value = normalize_evaluation(json!({
            "scores": { "open_source": { "score": "12", "max": 35, "evidence": ["a", "b"] } },
            "bonus_points": { "total": "5", "breakdown": ["blog"] },
            "key_strengths": ["1", "2", "3", "4", "5", "6"],
            "areas_for_improvement": "testing"
        }));
        assert_eq!(value["scores"]["open_source"]["score"], 12.0);
        assert_eq!(value["scores"]["open_source"]["evidence"], "a b");
        assert_eq!(value["bonus_points"]["total"], 5.0);
        assert_eq!(value["bonus_points"]["breakdown"], "blog");
        assert_eq!(value["key_strengths"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["areas_for_improvement"][0], "testing");
    }
}
