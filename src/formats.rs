use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    Basics,
    Work,
    Education,
    Skills,
    Projects,
    Awards,
}

impl SectionName {
    /// Extraction order. Basics first so the context snippet is available to the rest.
    pub const ALL: [SectionName; 6] = [
        SectionName::Basics,
        SectionName::Work,
        SectionName::Education,
        SectionName::Skills,
        SectionName::Projects,
        SectionName::Awards,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionName::Basics => "basics",
            SectionName::Work => "work",
            SectionName::Education => "education",
            SectionName::Skills => "skills",
            SectionName::Projects => "projects",
            SectionName::Awards => "awards",
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Pending,
    Extracted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: SectionName,
    pub raw_text: String,
    pub status: SectionStatus,
}

// JSON Resume shaped record. Every field is optional on the wire because
// extraction is best-effort; the assembler decides what is acceptable.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResumeRecord {
    pub basics: Basics,
    pub work: Vec<Work>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
    pub projects: Vec<Project>,
    pub awards: Vec<Award>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Basics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub network: Option<String>,
    pub username: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Work {
    pub name: Option<String>,
    pub position: Option<String>,
    pub url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub summary: Option<String>,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Education {
    pub institution: Option<String>,
    pub url: Option<String>,
    pub area: Option<String>,
    pub study_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub score: Option<String>,
    pub courses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Skill {
    pub name: Option<String>,
    pub level: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub highlights: Vec<String>,
    pub url: Option<String>,
    pub technologies: Vec<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Award {
    pub title: Option<String>,
    pub date: Option<String>,
    pub awarder: Option<String>,
    pub summary: Option<String>,
}

/// Typed payload of one extracted section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionData {
    Basics(Basics),
    Work(Vec<Work>),
    Education(Vec<Education>),
    Skills(Vec<Skill>),
    Projects(Vec<Project>),
    Awards(Vec<Award>),
}

impl SectionData {
    pub fn name(&self) -> SectionName {
        match self {
            SectionData::Basics(_) => SectionName::Basics,
            SectionData::Work(_) => SectionName::Work,
            SectionData::Education(_) => SectionName::Education,
            SectionData::Skills(_) => SectionName::Skills,
            SectionData::Projects(_) => SectionName::Projects,
            SectionData::Awards(_) => SectionName::Awards,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub homepage: Option<String>,
    pub language: Option<String>,
    pub license_key: Option<String>,
    pub topics: Vec<String>,
    pub stars: u64,
    pub forks: u64,
    pub fork: bool,
    pub archived: bool,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub contributions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    OpenSource,
    SelfProject,
    ForkContribution,
}

impl ProjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::OpenSource => "open_source",
            ProjectType::SelfProject => "self_project",
            ProjectType::ForkContribution => "fork_contribution",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub name: String,
    pub source_owner: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub technologies: Vec<String>,
    pub project_type: ProjectType,
    pub contributor_count: u64,
    pub author_commit_count: u64,
    pub total_commit_count: u64,
    pub license_key: Option<String>,
    pub topics: BTreeSet<String>,
    pub stars: u64,
    pub forks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPullRequest {
    pub repository: String,
    pub title: String,
    pub url: String,
    pub merged: bool,
    pub state: String,
    pub repository_stars: u64,
    pub repository_language: Option<String>,
    pub repository_description: Option<String>,
    pub repository_topics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionTier {
    Exceptional,
    Excellent,
    Good,
    Fair,
    Basic,
    NoContributions,
}

impl ContributionTier {
    pub fn label(self) -> &'static str {
        match self {
            ContributionTier::Exceptional => "Exceptional - Contributed to major open source projects",
            ContributionTier::Excellent => "Excellent - Multiple contributions to popular projects",
            ContributionTier::Good => "Good - Contributed to popular projects or multiple merged PRs",
            ContributionTier::Fair => "Fair - Some merged contributions",
            ContributionTier::Basic => "Basic - Pull requests opened but none merged",
            ContributionTier::NoContributions => "No open source contributions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSourceAnalysis {
    pub total_prs: u64,
    pub own_repo_prs: u64,
    pub external_prs: u64,
    pub merged_external_prs: u64,
    pub popular_project_contributions: u64,
    pub major_project_contributions: u64,
    pub external_contributions: Vec<ExternalPullRequest>,
    pub open_source_score: u32,
    pub contribution_quality: ContributionTier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostProfile {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub public_repos: u64,
    pub followers: u64,
    pub following: u64,
    pub created_at: Option<String>,
    pub url: String,
}

/// Everything one code host produced for the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostActivity {
    pub host: String,
    pub profile: HostProfile,
    pub projects: Vec<ContributionRecord>,
    pub open_source: Option<OpenSourceAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub url: String,
    pub description: String,
    pub published: Option<String>,
    pub platform: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogAnalysis {
    pub total_posts: usize,
    pub blog_score: f64,
    pub details: String,
    pub posts: Vec<BlogPost>,
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    pub max: f64,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub open_source: CategoryScore,
    pub self_projects: CategoryScore,
    pub production: CategoryScore,
    pub technical_skills: CategoryScore,
}

impl Scores {
    pub fn categories(&self) -> [(&'static str, &CategoryScore); 4] {
        [
            ("open_source", &self.open_source),
            ("self_projects", &self.self_projects),
            ("production", &self.production),
            ("technical_skills", &self.technical_skills),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusPoints {
    pub total: f64,
    pub breakdown: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deductions {
    pub total: f64,
    pub reasons: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub scores: Scores,
    #[serde(default)]
    pub bonus_points: BonusPoints,
    #[serde(default)]
    pub deductions: Deductions,
    pub key_strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub category: String,
    pub score: f64,
    pub cap: f64,
    pub effective: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub categories: Vec<CategoryOutcome>,
    pub bonus: f64,
    pub deductions: f64,
    pub raw_total: f64,
    pub ceiling: f64,
    pub total: f64,
}
