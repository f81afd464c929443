use std::fmt;

use crate::formats::{Basics, ResumeRecord, SectionData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("not a resume: no name or email found")]
    MissingIdentity,
    #[error("not a resume: no work experience, projects or skills found")]
    NoContent,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::MissingIdentity => "missing_identity",
            Rejection::NoContent => "no_content",
        }
    }
}

/// Merges extracted sections in order without applying the gates.
pub fn merge(sections: impl IntoIterator<Item = SectionData>) -> ResumeRecord {
    let mut record = ResumeRecord::default();
    let mut seen_basics = false;

    for data in sections {
        match data {
            SectionData::Basics(basics) => {
                if seen_basics {
                    fill_basics(&mut record.basics, basics);
                } else {
                    record.basics = basics;
                    seen_basics = true;
                }
            }
            SectionData::Work(items) => record.work.extend(items),
            SectionData::Education(items) => record.education.extend(items),
            SectionData::Skills(items) => record.skills.extend(items),
            SectionData::Projects(items) => record.projects.extend(items),
            SectionData::Awards(items) => record.awards.extend(items),
        }
    }
    record
}

/// Fields already present win; gaps come from the later occurrence.
fn fill_basics(into: &mut Basics, later: Basics) {
    fn fill(slot: &mut Option<String>, candidate: Option<String>) {
        if slot.as_deref().is_none_or(|s| s.trim().is_empty()) {
            *slot = candidate;
        }
    }

    fill(&mut into.name, later.name);
    fill(&mut into.email, later.email);
    fill(&mut into.phone, later.phone);
    fill(&mut into.url, later.url);
    fill(&mut into.summary, later.summary);
    if into.location.is_none() {
        into.location = later.location;
    }
    for profile in later.profiles {
        if !into.profiles.iter().any(|p| p.url == profile.url) {
            into.profiles.push(profile);
        }
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Identity gate first, then the content gate.
pub fn validate(record: &ResumeRecord) -> Result<(), Rejection> {
    if !present(&record.basics.name) && !present(&record.basics.email) {
        return Err(Rejection::MissingIdentity);
    }
    if record.work.is_empty() && record.projects.is_empty() && record.skills.is_empty() {
        return Err(Rejection::NoContent);
    }
    Ok(())
}

pub fn assemble(sections: impl IntoIterator<Item = SectionData>) -> Result<ResumeRecord, Rejection> {
    let record = merge(sections);
    validate(&record)?;
    Ok(record)
}

fn push_field(f: &mut fmt::Formatter<'_>, label: &str, value: &Option<String>) -> fmt::Result {
    if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
        writeln!(f, "{label}: {value}")?;
    }
    Ok(())
}

fn dates(start: &Option<String>, end: &Option<String>) -> Option<String> {
    match (start.as_deref(), end.as_deref()) {
        (None, None) => None,
        (Some(start), None) => Some(start.to_owned()),
        (None, Some(end)) => Some(format!("until {end}")),
        (Some(start), Some(end)) => Some(format!("{start} - {end}")),
    }
}

/// Labeled plain-text rendering used as evaluation input.
pub fn render_text(record: &ResumeRecord) -> String {
    LabeledText(record).to_string()
}

struct LabeledText<'a>(&'a ResumeRecord);

impl fmt::Display for LabeledText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let basics = &self.0.basics;

        f.write_str("=== BASIC INFORMATION ===\n")?;
        push_field(f, "Name", &basics.name)?;
        push_field(f, "Email", &basics.email)?;
        push_field(f, "Phone", &basics.phone)?;
        push_field(f, "Website", &basics.url)?;
        if let Some(location) = &basics.location {
            let parts = [&location.city, &location.region, &location.country_code, &location.address]
                .into_iter()
                .filter_map(|p| p.as_deref())
                .collect::<Vec<_>>();
            if !parts.is_empty() {
                writeln!(f, "Location: {}", parts.join(", "))?;
            }
        }
        push_field(f, "Summary", &basics.summary)?;
        if !basics.profiles.is_empty() {
            f.write_str("Profiles:\n")?;
            for profile in &basics.profiles {
                let network = profile.network.as_deref().unwrap_or("Profile");
                writeln!(f, "  - {network}: {}", profile.url)?;
            }
        }

        if !self.0.work.is_empty() {
            f.write_str("\n=== WORK EXPERIENCE ===\n")?;
            for work in &self.0.work {
                writeln!(
                    f,
                    "- {} at {}",
                    work.position.as_deref().unwrap_or("Role"),
                    work.name.as_deref().unwrap_or("Unknown")
                )?;
                push_field(f, "  Duration", &dates(&work.start_date, &work.end_date))?;
                push_field(f, "  Summary", &work.summary)?;
                for highlight in &work.highlights {
                    writeln!(f, "  * {highlight}")?;
                }
            }
        }

        if !self.0.education.is_empty() {
            f.write_str("\n=== EDUCATION ===\n")?;
            for education in &self.0.education {
                let degree = [&education.study_type, &education.area]
                    .into_iter()
                    .filter_map(|p| p.as_deref())
                    .collect::<Vec<_>>()
                    .join(" in ");
                writeln!(
                    f,
                    "- {} {}",
                    education.institution.as_deref().unwrap_or("Unknown"),
                    if degree.is_empty() { String::new() } else { format!("({degree})") }
                )?;
                push_field(f, "  Duration", &dates(&education.start_date, &education.end_date))?;
                push_field(f, "  Score", &education.score)?;
                if !education.courses.is_empty() {
                    writeln!(f, "  Courses: {}", education.courses.join(", "))?;
                }
            }
        }

        if !self.0.skills.is_empty() {
            f.write_str("\n=== SKILLS ===\n")?;
            for skill in &self.0.skills {
                writeln!(
                    f,
                    "- {}: {}",
                    skill.name.as_deref().unwrap_or("Skills"),
                    skill.keywords.join(", ")
                )?;
            }
        }

        if !self.0.projects.is_empty() {
            f.write_str("\n=== PROJECTS ===\n")?;
            for project in &self.0.projects {
                writeln!(f, "- {}", project.name.as_deref().unwrap_or("Untitled"))?;
                push_field(f, "  URL", &project.url)?;
                push_field(f, "  Description", &project.description)?;
                let stack = if project.technologies.is_empty() {
                    &project.skills
                } else {
                    &project.technologies
                };
                if !stack.is_empty() {
                    writeln!(f, "  Technologies: {}", stack.join(", "))?;
                }
                for highlight in &project.highlights {
                    writeln!(f, "  * {highlight}")?;
                }
            }
        }

        if !self.0.awards.is_empty() {
            f.write_str("\n=== AWARDS ===\n")?;
            for award in &self.0.awards {
                writeln!(
                    f,
                    "- {}{}",
                    award.title.as_deref().unwrap_or("Award"),
                    award
                        .awarder
                        .as_deref()
                        .map(|a| format!(" ({a})"))
                        .unwrap_or_default()
                )?;
                push_field(f, "  Date", &award.date)?;
                push_field(f, "  Summary", &award.summary)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Profile, Skill, Work};

    fn basics(name: Option<&str>, email: Option<&str>) -> Basics {
        Basics {
            name: name.map(str::to_owned),
            email: email.map(str::to_owned),
            ..Basics::default()
        }
    }

    fn skill(keyword: &str) -> Skill {
        Skill {
            name: Some("Languages".to_owned()),
            level: None,
            keywords: vec![keyword.to_owned()],
        }
    }

    #[test]
    fn name_without_content_is_rejected() {
        let result = assemble([
            SectionData::Basics(basics(Some("Jane"), None)),
            SectionData::Work(Vec::new()),
            SectionData::Projects(Vec::new()),
            SectionData::Skills(Vec::new()),
        ]);
        assert_eq!(result, Err(Rejection::NoContent));
    }

    #[test]
    fn identity_gate_runs_first() {
        let result = assemble([SectionData::Basics(basics(Some("  "), None))]);
        assert_eq!(result, Err(Rejection::MissingIdentity));
    }

    #[test]
    fn email_alone_is_enough_identity() {
        let result = assemble([
            SectionData::Basics(basics(None, Some("jane@example.com"))),
            SectionData::Skills(vec![skill("Rust")]),
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn recurring_sections_merge() -> anyhow::Result<()> {
        let mut first = basics(Some("Jane"), None);
        first.profiles.push(Profile {
            network: Some("GitHub".to_owned()),
            username: Some("jane".to_owned()),
            url: "https://github.com/jane".to_owned(),
        });
        let mut second = basics(Some("Jane Doe"), Some("jane@example.com"));
        second.profiles.push(Profile {
            network: None,
            username: None,
            url: "https://github.com/jane".to_owned(),
        });
        second.profiles.push(Profile {
            network: None,
            username: None,
            url: "https://jane.dev".to_owned(),
        });

        let record = assemble([
            SectionData::Basics(first),
            SectionData::Skills(vec![skill("Rust")]),
            SectionData::Basics(second),
            SectionData::Skills(vec![skill("Go")]),
        ])
        .map_err(anyhow::Error::new)?;

        assert_eq!(record.basics.name.as_deref(), Some("Jane"));
        assert_eq!(record.basics.email.as_deref(), Some("jane@example.com"));
        assert_eq!(record.basics.profiles.len(), 2);
        assert_eq!(record.skills.len(), 2);
        Ok(())
    }

    #[test]
    fn render_text_has_labeled_sections() {
        let record = ResumeRecord {
            basics: basics(Some("Jane"), Some("jane@example.com")),
            work: vec![Work {
                name: Some("Acme".to_owned()),
                position: Some("Engineer".to_owned()),
                start_date: Some("2021".to_owned()),
                end_date: Some("Present".to_owned()),
                ..Work::default()
            }],
            skills: vec![skill("Rust")],
            ..ResumeRecord::default()
        };
        let text = render_text(&record);
        assert!(text.starts_with("=== BASIC INFORMATION ===\nName: Jane\n"));
        assert!(text.contains("=== WORK EXPERIENCE ===\n- Engineer at Acme\n  Duration: 2021 - Present"));
        assert!(text.contains("=== SKILLS ===\n- Languages: Rust"));
        assert!(!text.contains("=== PROJECTS ==="));
    }
}
