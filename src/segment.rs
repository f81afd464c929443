use serde::Serialize;

use crate::formats::{Section, SectionName, SectionStatus};

/// Key of one span of document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKey {
    Section(SectionName),
    /// No header was recognized anywhere in the document.
    Unstructured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub key: SegmentKey,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Segments {
    pub spans: Vec<Span>,
}

const HEADER_SYNONYMS: &[(&str, SectionName)] = &[
    ("summary", SectionName::Basics),
    ("profile", SectionName::Basics),
    ("about", SectionName::Basics),
    ("about me", SectionName::Basics),
    ("contact", SectionName::Basics),
    ("contact information", SectionName::Basics),
    ("personal details", SectionName::Basics),
    ("objective", SectionName::Basics),
    ("work experience", SectionName::Work),
    ("experience", SectionName::Work),
    ("professional experience", SectionName::Work),
    ("employment", SectionName::Work),
    ("employment history", SectionName::Work),
    ("work history", SectionName::Work),
    ("internships", SectionName::Work),
    ("internship experience", SectionName::Work),
    ("industry experience", SectionName::Work),
    ("education", SectionName::Education),
    ("academic details", SectionName::Education),
    ("academics", SectionName::Education),
    ("academic background", SectionName::Education),
    ("educational qualifications", SectionName::Education),
    ("qualifications", SectionName::Education),
    ("skills", SectionName::Skills),
    ("technical skills", SectionName::Skills),
    ("relevant courses", SectionName::Skills),
    ("relevant coursework", SectionName::Skills),
    ("coursework", SectionName::Skills),
    ("core competencies", SectionName::Skills),
    ("technologies", SectionName::Skills),
    ("tech stack", SectionName::Skills),
    ("tools and technologies", SectionName::Skills),
    ("projects", SectionName::Projects),
    ("personal projects", SectionName::Projects),
    ("academic projects", SectionName::Projects),
    ("side projects", SectionName::Projects),
    ("key projects", SectionName::Projects),
    ("open source", SectionName::Projects),
    ("open source contributions", SectionName::Projects),
    ("awards", SectionName::Awards),
    ("achievements", SectionName::Awards),
    ("honors", SectionName::Awards),
    ("honors and awards", SectionName::Awards),
    ("awards and achievements", SectionName::Awards),
    ("accomplishments", SectionName::Awards),
    ("certifications", SectionName::Awards),
];

/// Maps a line to a section when it reads as a known header.
pub fn header_section(line: &str) -> Option<SectionName> {
    let stripped = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '#' | '*' | '_' | '=' | '-') || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '#' | '*' | '_' | '=' | ':') || c.is_whitespace());
    if stripped.is_empty() || stripped.len() > 48 {
        return None;
    }

    let normalized = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('&', "and")
        .to_lowercase();

    HEADER_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == normalized)
        .map(|(_, section)| *section)
}

pub fn segment(raw_text: &str) -> Segments {
    let mut spans = Vec::new();
    let mut current = SegmentKey::Section(SectionName::Basics);
    let mut buffer = String::new();
    let mut saw_header = false;

    for line in raw_text.split_inclusive('\n') {
        if let Some(section) = header_section(line) {
            saw_header = true;
            flush(&mut spans, current, &mut buffer);
            current = SegmentKey::Section(section);
            continue;
        }
        buffer.push_str(line);
    }

    if !saw_header {
        return Segments {
            spans: vec![Span {
                key: SegmentKey::Unstructured,
                text: raw_text.to_owned(),
            }],
        };
    }

    flush(&mut spans, current, &mut buffer);
    Segments { spans }
}

fn flush(spans: &mut Vec<Span>, key: SegmentKey, buffer: &mut String) {
    if buffer.is_empty() {
        return;
    }
    spans.push(Span {
        key,
        text: std::mem::take(buffer),
    });
}

impl Segments {
    pub fn is_unstructured(&self) -> bool {
        self.spans
            .iter()
            .any(|span| span.key == SegmentKey::Unstructured)
    }

    /// All text for one section, spans joined in document order.
    pub fn text_for(&self, name: SectionName) -> Option<String> {
        let parts = self
            .spans
            .iter()
            .filter(|span| span.key == SegmentKey::Section(name))
            .map(|span| span.text.trim_end())
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("\n\n"))
    }

    /// Sections to extract, in extraction order. Unstructured text is handed to
    /// every section so the extractor can still pick out what it can.
    pub fn sections(&self) -> Vec<Section> {
        SectionName::ALL
            .iter()
            .filter_map(|name| {
                let raw_text = if self.is_unstructured() {
                    self.spans.first().map(|span| span.text.clone())
                } else {
                    self.text_for(*name)
                }?;
                Some(Section {
                    name: *name,
                    raw_text,
                    status: SectionStatus::Pending,
                })
            })
            .collect()
    }
}

/// Identity and education text every later extraction sees as background.
pub fn build_context(segments: &Segments) -> String {
    let mut blocks = Vec::new();
    if let Some(basics) = segments.text_for(SectionName::Basics)
        && !basics.trim().is_empty()
    {
        blocks.push(format!("BASIC INFORMATION:\n{}", basics.trim()));
    }
    if let Some(education) = segments.text_for(SectionName::Education)
        && !education.trim().is_empty()
    {
        blocks.push(format!("EDUCATION:\n{}", education.trim()));
    }
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Jane Doe\njane@example.com\n\n## Work Experience\nAcme Corp - Engineer\n  Built things\n\n**Education:**\nState University, BSc\n\n## Technical Skills\nRust, Go\n\n## Relevant Courses\nCompilers\n\n## Hobbies\nChess\n";

    #[test]
    fn header_matching_strips_markup() {
        assert_eq!(header_section("## Work Experience"), Some(SectionName::Work));
        assert_eq!(header_section("**EDUCATION:**"), Some(SectionName::Education));
        assert_eq!(header_section("  Honors & Awards  "), Some(SectionName::Awards));
        assert_eq!(header_section("Built a work experience tracker"), None);
        assert_eq!(header_section("## Hobbies"), None);
    }

    #[test]
    fn leading_text_belongs_to_basics() {
        let segments = segment(RESUME);
        assert_eq!(
            segments.spans[0].key,
            SegmentKey::Section(SectionName::Basics)
        );
        assert!(segments.spans[0].text.contains("jane@example.com"));
    }

    #[test]
    fn repeated_section_keeps_every_span() {
        let segments = segment(RESUME);
        let skills = segments
            .text_for(SectionName::Skills)
            .unwrap_or_default();
        assert!(skills.contains("Rust, Go"));
        assert!(skills.contains("Compilers"));
        // unknown headers stay as body text of the running section
        assert!(skills.contains("## Hobbies"));
    }

    #[test]
    fn concatenation_reproduces_input_minus_headers() {
        let input = "Jane\n## Projects\nfoo\n  bar  \n\n## Awards\n\nbaz";
        let segments = segment(input);
        let joined: String = segments.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, "Jane\nfoo\n  bar  \n\n\nbaz");
    }

    #[test]
    fn blank_sections_are_not_extracted() {
        let segments = segment("Jane\n## Awards\n\n## Skills\nRust\n");
        let names = segments
            .sections()
            .iter()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec![SectionName::Basics, SectionName::Skills]);
    }

    #[test]
    fn no_headers_yields_one_unstructured_span() {
        let input = "Jane Doe\nI have built many things in Rust.\n";
        let segments = segment(input);
        assert_eq!(segments.spans.len(), 1);
        assert_eq!(segments.spans[0].key, SegmentKey::Unstructured);
        assert_eq!(segments.spans[0].text, input);

        let sections = segments.sections();
        assert_eq!(sections.len(), SectionName::ALL.len());
        assert!(sections.iter().all(|s| s.raw_text == input));
        assert!(sections.iter().all(|s| s.status == SectionStatus::Pending));
    }

    #[test]
    fn empty_input_is_unstructured() {
        let segments = segment("");
        assert!(segments.is_unstructured());
    }

    #[test]
    fn context_has_basics_then_education() {
        let context = build_context(&segment(RESUME));
        assert!(context.starts_with("BASIC INFORMATION:\nJane Doe"));
        let education_at = context.find("EDUCATION:\nState University").unwrap_or(0);
        assert!(education_at > 0);
    }

    #[test]
    fn context_is_empty_without_basics_or_education() {
        let context = build_context(&segment("## Skills\nRust\n"));
        assert_eq!(context, "");
    }
}
