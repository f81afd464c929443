use std::collections::{BTreeSet, HashMap};

use crate::config::ClassificationRules;
use crate::formats::{
    ContributionRecord, ContributionTier, Contributor, ExternalPullRequest, OpenSourceAnalysis,
    ProjectType, RepoMetadata,
};

/// First matching rule wins:
/// 1. licence on the open-source allow-list
/// 2. topic tagged by an open-source program
/// 3. several contributors and outside interest (stars or forks above the thresholds)
/// 4. a fork the owner committed to
/// 5. otherwise a self project
///
/// Rules 1-3 only apply to public repositories.
pub fn classify(
    repo: &RepoMetadata,
    contributors: &[Contributor],
    owner: &str,
    rules: &ClassificationRules,
) -> ContributionRecord {
    let author_commit_count = contributors
        .iter()
        .filter(|c| c.login.eq_ignore_ascii_case(owner))
        .map(|c| c.contributions)
        .sum::<u64>();
    let total_commit_count = contributors.iter().map(|c| c.contributions).sum::<u64>();
    let contributor_count = contributors
        .iter()
        .map(|c| c.login.to_ascii_lowercase())
        .collect::<BTreeSet<_>>()
        .len() as u64;

    let license_key = repo.license_key.as_deref().map(str::to_ascii_lowercase);
    let topics = repo
        .topics
        .iter()
        .map(|t| t.to_ascii_lowercase())
        .collect::<BTreeSet<_>>();

    let licensed = license_key
        .as_deref()
        .is_some_and(|key| rules.open_source_licenses.iter().any(|l| l.eq_ignore_ascii_case(key)));
    let program = rules
        .program_topics
        .iter()
        .any(|tag| topics.contains(&tag.to_ascii_lowercase()));
    let engaged = contributor_count > 1
        && (repo.stars > rules.engagement_stars || repo.forks > rules.engagement_forks);

    let project_type = if repo.public && (licensed || program || engaged) {
        ProjectType::OpenSource
    } else if repo.fork && author_commit_count > 0 {
        ProjectType::ForkContribution
    } else {
        ProjectType::SelfProject
    };

    ContributionRecord {
        name: repo.name.clone(),
        source_owner: repo.owner.clone(),
        description: repo.description.clone(),
        url: repo.url.clone(),
        technologies: repo.language.iter().cloned().collect(),
        project_type,
        contributor_count,
        author_commit_count,
        total_commit_count,
        license_key,
        topics,
        stars: repo.stars,
        forks: repo.forks,
    }
}

/// Scores pull requests to repositories the subject does not own.
pub fn analyze_pull_requests(
    owner: &str,
    pull_requests: &[ExternalPullRequest],
    rules: &ClassificationRules,
) -> OpenSourceAnalysis {
    let own_prefix = format!("{}/", owner.to_ascii_lowercase());
    let (own, external): (Vec<_>, Vec<_>) = pull_requests
        .iter()
        .partition(|pr| pr.repository.to_ascii_lowercase().starts_with(&own_prefix));

    let merged = external.iter().filter(|pr| pr.merged).copied().collect::<Vec<_>>();
    let major = merged
        .iter()
        .filter(|pr| pr.repository_stars >= rules.major_stars)
        .count() as u64;
    let popular = merged
        .iter()
        .filter(|pr| pr.repository_stars >= rules.popular_stars)
        .count() as u64;

    let score = open_source_score(&merged, rules);
    let tier = contribution_tier(external.len() as u64, merged.len() as u64, popular, major);

    OpenSourceAnalysis {
        total_prs: pull_requests.len() as u64,
        own_repo_prs: own.len() as u64,
        external_prs: external.len() as u64,
        merged_external_prs: merged.len() as u64,
        popular_project_contributions: popular,
        major_project_contributions: major,
        external_contributions: external.into_iter().cloned().collect(),
        open_source_score: score,
        contribution_quality: tier,
    }
}

/// Each merged request: 5 base + 10 merged + 25 (major target) or 15 (popular
/// target); with `n > 1` requests to the same repository each adds `n * 5`.
/// Capped at 100.
pub fn open_source_score(merged: &[&ExternalPullRequest], rules: &ClassificationRules) -> u32 {
    let mut per_repo: HashMap<String, u64> = HashMap::new();
    for pr in merged {
        *per_repo.entry(pr.repository.to_ascii_lowercase()).or_default() += 1;
    }

    let mut total = 0u64;
    for pr in merged {
        let mut points = 5 + 10;
        if pr.repository_stars >= rules.major_stars {
            points += 25;
        } else if pr.repository_stars >= rules.popular_stars {
            points += 15;
        }
        let same_repo = per_repo
            .get(&pr.repository.to_ascii_lowercase())
            .copied()
            .unwrap_or(0);
        if same_repo > 1 {
            points += same_repo * 5;
        }
        total += points;
    }
    total.min(100) as u32
}

pub fn contribution_tier(external: u64, merged: u64, popular: u64, major: u64) -> ContributionTier {
    if external == 0 {
        ContributionTier::NoContributions
    } else if major > 0 {
        ContributionTier::Exceptional
    } else if popular > 2 {
        ContributionTier::Excellent
    } else if popular > 0 || merged > 2 {
        ContributionTier::Good
    } else if merged > 0 {
        ContributionTier::Fair
    } else {
        ContributionTier::Basic
    }
}

/// Keeps the projects worth showing: top by stars, open source first when
/// preferred, repositories the owner never committed to left out.
pub fn select_projects(
    mut projects: Vec<ContributionRecord>,
    max: usize,
    prefer_open_source: bool,
) -> Vec<ContributionRecord> {
    projects.retain(|p| p.author_commit_count > 0);
    projects.sort_by(|a, b| {
        let rank = |p: &ContributionRecord| {
            u8::from(prefer_open_source && p.project_type == ProjectType::OpenSource)
        };
        rank(b)
            .cmp(&rank(a))
            .then_with(|| b.stars.cmp(&a.stars))
            .then_with(|| b.author_commit_count.cmp(&a.author_commit_count))
            .then_with(|| a.name.cmp(&b.name))
    });
    projects.truncate(max);
    projects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str) -> RepoMetadata {
        RepoMetadata {
            name: name.to_owned(),
            owner: Some("jane".to_owned()),
            url: format!("https://github.com/jane/{name}"),
            public: true,
            ..RepoMetadata::default()
        }
    }

    fn contributor(login: &str, contributions: u64) -> Contributor {
        Contributor {
            login: login.to_owned(),
            contributions,
        }
    }

    fn pr(repository: &str, stars: u64, merged: bool) -> ExternalPullRequest {
        ExternalPullRequest {
            repository: repository.to_owned(),
            title: "fix".to_owned(),
            url: format!("https://github.com/{repository}/pull/1"),
            merged,
            state: if merged { "closed" } else { "open" }.to_owned(),
            repository_stars: stars,
            repository_language: None,
            repository_description: None,
            repository_topics: Vec::new(),
        }
    }

    #[test]
    fn licence_alone_makes_open_source() {
        let mut metadata = repo("tool");
        metadata.license_key = Some("MIT".to_owned());
        let record = classify(
            &metadata,
            &[contributor("jane", 4)],
            "jane",
            &ClassificationRules::default(),
        );
        assert_eq!(record.project_type, ProjectType::OpenSource);
        assert_eq!(record.license_key.as_deref(), Some("mit"));
        assert_eq!(record.contributor_count, 1);
        assert_eq!(record.author_commit_count, 4);
    }

    #[test]
    fn program_topic_makes_open_source() {
        let mut metadata = repo("event");
        metadata.topics = vec!["Hacktoberfest".to_owned()];
        let record = classify(&metadata, &[], "jane", &ClassificationRules::default());
        assert_eq!(record.project_type, ProjectType::OpenSource);
    }

    #[test]
    fn engagement_needs_several_contributors() {
        let mut metadata = repo("popular");
        metadata.stars = 50;
        let rules = ClassificationRules::default();

        let solo = classify(&metadata, &[contributor("jane", 9)], "jane", &rules);
        assert_eq!(solo.project_type, ProjectType::SelfProject);

        let team = classify(
            &metadata,
            &[contributor("Jane", 9), contributor("bob", 2)],
            "jane",
            &rules,
        );
        assert_eq!(team.project_type, ProjectType::OpenSource);
        assert_eq!(team.author_commit_count, 9);
        assert_eq!(team.total_commit_count, 11);
    }

    #[test]
    fn fork_with_owner_commits() {
        let mut metadata = repo("forked");
        metadata.fork = true;
        let rules = ClassificationRules::default();

        let touched = classify(&metadata, &[contributor("jane", 1), contributor("up", 90)], "jane", &rules);
        assert_eq!(touched.project_type, ProjectType::ForkContribution);

        let untouched = classify(&metadata, &[contributor("up", 90)], "jane", &rules);
        assert_eq!(untouched.project_type, ProjectType::SelfProject);
    }

    #[test]
    fn private_repository_is_never_open_source() {
        let mut metadata = repo("secret");
        metadata.public = false;
        metadata.license_key = Some("mit".to_owned());
        let record = classify(&metadata, &[contributor("jane", 1)], "jane", &ClassificationRules::default());
        assert_eq!(record.project_type, ProjectType::SelfProject);
    }

    #[test]
    fn three_merged_requests_with_one_major_target() {
        let prs = [
            pr("rust-lang/rust", 12_000, true),
            pr("alice/tool", 3, true),
            pr("bob/lib", 40, true),
        ];
        let analysis = analyze_pull_requests("jane", &prs, &ClassificationRules::default());
        // 5+10+25 for the major target, 5+10 for each of the others
        assert_eq!(analysis.open_source_score, 70);
        assert_eq!(analysis.major_project_contributions, 1);
        assert_eq!(analysis.merged_external_prs, 3);
        assert_eq!(analysis.contribution_quality, ContributionTier::Exceptional);
    }

    #[test]
    fn repeated_repository_adds_bonus_and_caps() {
        let prs = [
            pr("tokio-rs/tokio", 25_000, true),
            pr("tokio-rs/tokio", 25_000, true),
            pr("tokio-rs/tokio", 25_000, true),
        ];
        // each: 5+10+25+3*5 = 55, three of them capped at 100
        let analysis = analyze_pull_requests("jane", &prs, &ClassificationRules::default());
        assert_eq!(analysis.open_source_score, 100);

        let two = [pr("a/b", 0, true), pr("a/b", 0, true)];
        // each: 5+10+2*5 = 25
        assert_eq!(
            analyze_pull_requests("jane", &two, &ClassificationRules::default()).open_source_score,
            50
        );
    }

    #[test]
    fn own_and_unmerged_requests_do_not_score() {
        let prs = [pr("Jane/site", 0, true), pr("other/repo", 5000, false)];
        let analysis = analyze_pull_requests("jane", &prs, &ClassificationRules::default());
        assert_eq!(analysis.own_repo_prs, 1);
        assert_eq!(analysis.external_prs, 1);
        assert_eq!(analysis.open_source_score, 0);
        assert_eq!(analysis.contribution_quality, ContributionTier::Basic);
    }

    #[test]
    fn tiers_in_order() {
        assert_eq!(contribution_tier(0, 0, 0, 0), ContributionTier::NoContributions);
        assert_eq!(contribution_tier(5, 3, 3, 0), ContributionTier::Excellent);
        assert_eq!(contribution_tier(5, 1, 1, 0), ContributionTier::Good);
        assert_eq!(contribution_tier(5, 3, 0, 0), ContributionTier::Good);
        assert_eq!(contribution_tier(5, 2, 0, 0), ContributionTier::Fair);
    }

    #[test]
    fn selection_prefers_open_source_then_stars() {
        let rules = ClassificationRules::default();
        let mut licensed = repo("licensed");
        licensed.license_key = Some("mit".to_owned());
        let mut starred = repo("starred");
        starred.stars = 9;
        let untouched = repo("untouched");

        let projects = vec![
            classify(&starred, &[contributor("jane", 3)], "jane", &rules),
            classify(&untouched, &[contributor("bob", 3)], "jane", &rules),
            classify(&licensed, &[contributor("jane", 1)], "jane", &rules),
        ];
        let selected = select_projects(projects, 7, true);
        let names = selected.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["licensed", "starred"]);
    }
}
