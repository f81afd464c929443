use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

pub const SYSTEM_MESSAGE: &str = "system_message";
pub const EVALUATION_SYSTEM: &str = "resume_evaluation_system_message";
pub const EVALUATION_CRITERIA: &str = "resume_evaluation_criteria";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template: {0}")]
    Unknown(String),
    #[error("template {template}: missing variable `{variable}`")]
    MissingVariable { template: String, variable: String },
    #[error("template {template}: unterminated placeholder at byte {offset}")]
    Unterminated { template: String, offset: usize },
}

const BUILTIN: &[(&str, &str)] = &[
    (SYSTEM_MESSAGE, SYSTEM_MESSAGE_TEMPLATE),
    ("basics", BASICS_TEMPLATE),
    ("work", WORK_TEMPLATE),
    ("education", EDUCATION_TEMPLATE),
    ("skills", SKILLS_TEMPLATE),
    ("projects", PROJECTS_TEMPLATE),
    ("awards", AWARDS_TEMPLATE),
    (EVALUATION_SYSTEM, EVALUATION_SYSTEM_TEMPLATE),
    (EVALUATION_CRITERIA, EVALUATION_CRITERIA_TEMPLATE),
];

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<String, String>,
}

impl PromptTemplates {
    pub fn builtin() -> Self {
        Self {
            templates: BUILTIN
                .iter()
                .map(|(name, body)| ((*name).to_owned(), (*body).to_owned()))
                .collect(),
        }
    }

    /// Built-ins, with any `<name>.txt` in `dir` replacing the template of that name.
    pub fn load(dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut templates = Self::builtin();
        let Some(dir) = dir else {
            return Ok(templates);
        };

        for name in BUILTIN.iter().map(|(name, _)| *name) {
            let path: PathBuf = dir.join(format!("{name}.txt"));
            if !path.exists() {
                continue;
            }
            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("read prompt template: {}", path.display()))?;
            tracing::debug!(template = name, path = %path.display(), "template override");
            templates.templates.insert(name.to_owned(), body);
        }
        Ok(templates)
    }

    pub fn insert(&mut self, name: &str, body: &str) {
        self.templates.insert(name.to_owned(), body.to_owned());
    }

    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::Unknown(name.to_owned()))?;
        render_str(name, template, vars)
    }
}

fn render_str(name: &str, template: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut consumed = 0usize;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            return Err(TemplateError::Unterminated {
                template: name.to_owned(),
                offset: consumed + open,
            });
        };
        let variable = after[..close].trim();
        if variable.is_empty() || variable.contains("{{") {
            return Err(TemplateError::Unterminated {
                template: name.to_owned(),
                offset: consumed + open,
            });
        }
        let value = vars
            .iter()
            .find(|(key, _)| *key == variable)
            .map(|(_, value)| *value)
            .ok_or_else(|| TemplateError::MissingVariable {
                template: name.to_owned(),
                variable: variable.to_owned(),
            })?;
        out.push_str(value);

        let advance = open + 2 + close + 2;
        consumed += advance;
        rest = &rest[advance..];
    }
    out.push_str(rest);
    Ok(out)
}

const SYSTEM_MESSAGE_TEMPLATE: &str = "You are a resume parser. Extract only the {{section_name}} section \
of the resume text you are given and answer with a single JSON object that matches the requested schema. \
Use the JSON Resume field names. Never invent facts that are not in the text. \
Leave a field out when the text does not mention it. Do not wrap the JSON in prose.";

const BASICS_TEMPLATE: &str = "Extract the candidate's basic information: name, email, phone, \
personal website (url), a one paragraph summary, location and every online profile \
(GitHub, GitLab, LinkedIn, blogs, coding platforms) with its full URL.

Answer as {\"basics\": {...}}.

BEGIN_SECTION_TEXT
{{text_content}}
END_SECTION_TEXT
";

const WORK_TEMPLATE: &str = "Extract every job, internship and freelance engagement. For each one \
give the employer (name), position, url, startDate, endDate (\"Present\" when ongoing), a short \
summary and the notable highlights as a list.

Answer as {\"work\": [...]}.

Candidate background:
BEGIN_CONTEXT
{{context}}
END_CONTEXT

BEGIN_SECTION_TEXT
{{text_content}}
END_SECTION_TEXT
";

const EDUCATION_TEMPLATE: &str = "Extract every education entry: institution, area of study, \
studyType (degree), startDate, endDate, score (GPA or percentage as written) and notable courses.

Answer as {\"education\": [...]}.

Candidate background:
BEGIN_CONTEXT
{{context}}
END_CONTEXT

BEGIN_SECTION_TEXT
{{text_content}}
END_SECTION_TEXT
";

const SKILLS_TEMPLATE: &str = "Extract the candidate's skills grouped by category. Each group has a \
name (for example \"Programming Languages\" or \"Frameworks\"), an optional level and the list of \
keywords in that group. Relevant coursework goes in a group named \"Coursework\".

Answer as {\"skills\": [...]}.

Candidate background:
BEGIN_CONTEXT
{{context}}
END_CONTEXT

BEGIN_SECTION_TEXT
{{text_content}}
END_SECTION_TEXT
";

const PROJECTS_TEMPLATE: &str = "Extract every project. For each one give name, description, \
url (repository or live link), startDate, endDate, highlights, and the technologies used.

Answer as {\"projects\": [...]}.

Candidate background:
BEGIN_CONTEXT
{{context}}
END_CONTEXT

BEGIN_SECTION_TEXT
{{text_content}}
END_SECTION_TEXT
";

const AWARDS_TEMPLATE: &str = "Extract awards, achievements, competition results, scholarships and \
certifications. For each one give title, date, awarder and a one line summary.

Answer as {\"awards\": [...]}.

Candidate background:
BEGIN_CONTEXT
{{context}}
END_CONTEXT

BEGIN_SECTION_TEXT
{{text_content}}
END_SECTION_TEXT
";

const EVALUATION_SYSTEM_TEMPLATE: &str = "You are a strict technical recruiter evaluating software \
engineering candidates. Score only what the evidence supports and answer with a single JSON object \
that matches the requested schema.";

const EVALUATION_CRITERIA_TEMPLATE: &str = "Evaluate the candidate below.

Categories and maximum points:
- open_source (max {{open_source_max}}): merged contributions to projects the candidate does not own, \
maintained open source projects with outside users.
- self_projects (max {{self_projects_max}}): depth, originality and completeness of personal projects.
- production (max {{production_max}}): shipped work used by real users, internships and jobs.
- technical_skills (max {{technical_skills_max}}): breadth and depth of demonstrated technical skills.

bonus_points.total is between 0 and {{bonus_max}} for exceptional signals such as a strong blog, \
competitive programming results or major open source programs; explain them in bonus_points.breakdown.
deductions.total is 0 or more for red flags such as unverifiable claims or tutorial clones; explain them in \
deductions.reasons.

For every category give score, max and one or two sentences of evidence taken from the data.
List 1 to 5 key_strengths and 1 to 5 areas_for_improvement.

BEGIN_RESUME
{{text_content}}
END_RESUME
";
