use std::fmt;

use crate::blog::{BlogFetcher, blog_urls};
use crate::cache::JsonCache;
use crate::config::Config;
use crate::formats::{BlogAnalysis, HostActivity, OpenSourceAnalysis, ResumeRecord};
use crate::hosts::discover;

const PROJECTS_SHOWN: usize = 10;
const CONTRIBUTIONS_SHOWN: usize = 10;

/// External signals gathered for one candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub hosts: Vec<HostActivity>,
    pub blog: Option<BlogAnalysis>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.blog.is_none()
    }
}

/// Fetches code-host activity and blog posts. Any single source failing only
/// drops that source.
pub fn collect(record: &ResumeRecord, config: &Config, cache: Option<&JsonCache>) -> Enrichment {
    let mut enrichment = Enrichment::default();

    for (entry, username) in discover(record) {
        if !(entry.enabled)(config) {
            tracing::debug!(host = entry.name, "host disabled");
            continue;
        }
        let activity = (entry.build)(config, cache.cloned()).and_then(|host| host.fetch(&username));
        match activity {
            Ok(activity) => enrichment.hosts.push(activity),
            Err(err) => tracing::warn!(
                host = entry.name,
                username = %username,
                error = %format!("{err:#}"),
                "code host data unavailable"
            ),
        }
    }

    if config.blog.enabled {
        let urls = blog_urls(record);
        if urls.is_empty() {
            tracing::debug!("no blog urls in profiles");
        } else {
            match BlogFetcher::new(&config.blog) {
                Ok(fetcher) => enrichment.blog = fetcher.analyze(&urls),
                Err(err) => tracing::warn!(error = %format!("{err:#}"), "blog fetcher unavailable"),
            }
        }
    }

    enrichment
}

fn write_host(f: &mut fmt::Formatter<'_>, activity: &HostActivity) -> fmt::Result {
    writeln!(f, "\n=== {} DATA ===", activity.host.to_ascii_uppercase())?;
    let profile = &activity.profile;
    writeln!(f, "Username: {}", profile.login)?;
    if let Some(name) = &profile.name {
        writeln!(f, "Name: {name}")?;
    }
    if let Some(bio) = &profile.bio {
        writeln!(f, "Bio: {bio}")?;
    }
    if let Some(company) = &profile.company {
        writeln!(f, "Company: {company}")?;
    }
    writeln!(
        f,
        "Public repositories: {}, followers: {}, following: {}",
        profile.public_repos, profile.followers, profile.following
    )?;
    if let Some(created) = &profile.created_at {
        writeln!(f, "Account created: {created}")?;
    }

    if activity.projects.is_empty() {
        f.write_str("Projects: none found\n")?;
    } else {
        f.write_str("Projects:\n")?;
    }
    for project in activity.projects.iter().take(PROJECTS_SHOWN) {
        writeln!(
            f,
            "- {} [{}] stars: {}, forks: {}, language: {}, commits by candidate: {}/{}",
            project.name,
            project.project_type.as_str(),
            project.stars,
            project.forks,
            project.technologies.first().map(String::as_str).unwrap_or("unknown"),
            project.author_commit_count,
            project.total_commit_count,
        )?;
        if let Some(description) = &project.description {
            writeln!(f, "  {description}")?;
        }
        if !project.url.is_empty() {
            writeln!(f, "  {}", project.url)?;
        }
    }
    Ok(())
}

fn write_open_source(f: &mut fmt::Formatter<'_>, analysis: &OpenSourceAnalysis) -> fmt::Result {
    f.write_str("\n=== OPEN SOURCE CONTRIBUTIONS ===\n")?;
    writeln!(
        f,
        "Pull requests: {} total, {} to own repositories, {} external ({} merged)",
        analysis.total_prs, analysis.own_repo_prs, analysis.external_prs, analysis.merged_external_prs
    )?;
    writeln!(
        f,
        "Popular project contributions: {}, major project contributions: {}",
        analysis.popular_project_contributions, analysis.major_project_contributions
    )?;
    writeln!(f, "Open source score: {}/100", analysis.open_source_score)?;
    writeln!(f, "Contribution quality: {}", analysis.contribution_quality.label())?;
    for pr in analysis.external_contributions.iter().take(CONTRIBUTIONS_SHOWN) {
        writeln!(
            f,
            "- {} ({} stars){}: {}",
            pr.repository,
            pr.repository_stars,
            if pr.merged { " merged" } else { "" },
            pr.title
        )?;
    }
    Ok(())
}

fn write_blog(f: &mut fmt::Formatter<'_>, blog: &BlogAnalysis) -> fmt::Result {
    f.write_str("\n=== BLOG DATA ===\n")?;
    writeln!(f, "Posts: {}", blog.total_posts)?;
    writeln!(f, "Blog score: {:.1}/10", blog.blog_score)?;
    writeln!(f, "{}", blog.details)?;
    for post in &blog.posts {
        writeln!(f, "- {} ({})", post.title, post.url)?;
        if !post.description.is_empty() {
            writeln!(f, "  {}", post.description)?;
        }
    }
    Ok(())
}

/// Text sections appended to the record rendering before evaluation.
pub fn render(enrichment: &Enrichment) -> String {
    enrichment.to_string()
}

impl fmt::Display for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for activity in &self.hosts {
            write_host(f, activity)?;
            if let Some(analysis) = &activity.open_source {
                write_open_source(f, analysis)?;
            }
        }
        if let Some(blog) = &self.blog {
            write_blog(f, blog)?;
        }
        Ok(())
    }
}
