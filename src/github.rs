use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use serde_json::Value;

use crate::cache::JsonCache;
use crate::classify::{analyze_pull_requests, classify, select_projects};
use crate::config::{ClassificationRules, Config, ProjectSelection};
use crate::formats::{Contributor, ExternalPullRequest, HostActivity, HostProfile, RepoMetadata};
use crate::hosts::CodeHost;
use crate::http::{ApiClient, FetchError, RateLimitPolicy, RetryPolicy, Transport};

pub const DEFAULT_API: &str = "https://api.github.com";

pub struct GitHub {
    api: ApiClient,
    rules: ClassificationRules,
    selection: ProjectSelection,
    max_repos: u32,
}

pub fn build(config: &Config, cache: Option<JsonCache>) -> anyhow::Result<Box<dyn CodeHost>> {
    let host = &config.github;
    let transport = Transport::new(
        Duration::from_secs(host.timeout_secs.max(1)),
        RetryPolicy {
            attempts: host.retry_attempts.max(1),
            base_delay: Duration::from_millis(host.retry_delay_ms),
        },
    )?
    .with_rate_limit(RateLimitPolicy::new(RateLimitPolicy::GITHUB, host));

    let auth = host
        .token
        .as_ref()
        .map(|token| ("Authorization", format!("Bearer {token}")));

    Ok(Box::new(GitHub {
        api: ApiClient::new(transport, host.base_url_or(DEFAULT_API), auth, cache, "gh"),
        rules: config.classification.clone(),
        selection: config.project_selection.clone(),
        max_repos: host.max_repos.clamp(1, 100),
    }))
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
}

pub fn profile_from_json(value: &Value) -> HostProfile {
    HostProfile {
        login: str_field(value, "login").unwrap_or_default(),
        name: str_field(value, "name"),
        bio: str_field(value, "bio"),
        company: str_field(value, "company"),
        location: str_field(value, "location"),
        public_repos: u64_field(value, "public_repos"),
        followers: u64_field(value, "followers"),
        following: u64_field(value, "following"),
        created_at: str_field(value, "created_at"),
        url: str_field(value, "html_url").unwrap_or_default(),
    }
}

pub fn repo_from_json(value: &Value) -> RepoMetadata {
    RepoMetadata {
        name: str_field(value, "name").unwrap_or_default(),
        owner: value.pointer("/owner/login").and_then(|v| v.as_str()).map(str::to_owned),
        description: str_field(value, "description"),
        url: str_field(value, "html_url").unwrap_or_default(),
        homepage: str_field(value, "homepage"),
        language: str_field(value, "language"),
        license_key: value
            .pointer("/license/key")
            .and_then(|v| v.as_str())
            .map(str::to_owned),
        topics: value
            .get("topics")
            .and_then(|v| v.as_array())
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default(),
        stars: u64_field(value, "stargazers_count"),
        forks: u64_field(value, "forks_count"),
        fork: value.get("fork").and_then(|v| v.as_bool()).unwrap_or(false),
        archived: value.get("archived").and_then(|v| v.as_bool()).unwrap_or(false),
        public: value
            .get("private")
            .and_then(|v| v.as_bool())
            .map(|private| !private)
            .unwrap_or(true),
    }
}

/// `owner/name` of the repository a search result belongs to.
fn repository_of(item: &Value) -> Option<String> {
    let url = item.get("repository_url")?.as_str()?;
    let (_, full) = url.split_once("/repos/")?;
    Some(full.trim_matches('/').to_owned())
}

impl GitHub {
    fn contributors(&self, owner: &str, repo: &str) -> Vec<Contributor> {
        match self.api.get_json(
            &format!("repos/{owner}/{repo}/contributors"),
            &[("per_page", "100".to_owned())],
        ) {
            Ok(Value::Array(items)) => items
                .iter()
                .filter_map(|item| {
                    Some(Contributor {
                        login: str_field(item, "login")?,
                        contributions: u64_field(item, "contributions"),
                    })
                })
                .collect(),
            Ok(_) => Vec::new(),
            Err(err) => {
                tracing::debug!(owner, repo, error = %err, "no contributor data");
                Vec::new()
            }
        }
    }

    fn pull_requests(&self, username: &str) -> anyhow::Result<Vec<ExternalPullRequest>> {
        let search = self
            .api
            .get_json(
                "search/issues",
                &[
                    ("q", format!("author:{username} type:pr")),
                    ("per_page", "100".to_owned()),
                ],
            )
            .context("search pull requests")?;

        let items = search
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let own_prefix = format!("{}/", username.to_ascii_lowercase());
        let mut targets: HashMap<String, Option<RepoMetadata>> = HashMap::new();
        let mut pull_requests = Vec::new();

        for item in &items {
            let Some(repository) = repository_of(item) else {
                continue;
            };
            let external = !repository.to_ascii_lowercase().starts_with(&own_prefix);
            let metadata = if external {
                targets
                    .entry(repository.clone())
                    .or_insert_with(|| match self.api.get_json(&format!("repos/{repository}"), &[]) {
                        Ok(value) => Some(repo_from_json(&value)),
                        Err(err) => {
                            tracing::debug!(%repository, error = %err, "no repository metadata");
                            None
                        }
                    })
                    .clone()
            } else {
                None
            };

            pull_requests.push(ExternalPullRequest {
                title: str_field(item, "title").unwrap_or_default(),
                url: str_field(item, "html_url").unwrap_or_default(),
                merged: item
                    .pointer("/pull_request/merged_at")
                    .is_some_and(|v| !v.is_null()),
                state: str_field(item, "state").unwrap_or_default(),
                repository_stars: metadata.as_ref().map(|m| m.stars).unwrap_or(0),
                repository_language: metadata.as_ref().and_then(|m| m.language.clone()),
                repository_description: metadata.as_ref().and_then(|m| m.description.clone()),
                repository_topics: metadata.map(|m| m.topics).unwrap_or_default(),
                repository,
            });
        }
        Ok(pull_requests)
    }
}

impl CodeHost for GitHub {
    fn name(&self) -> &'static str {
        "github"
    }

    fn fetch(&self, username: &str) -> anyhow::Result<HostActivity> {
        let profile = match self.api.get_json(&format!("users/{username}"), &[]) {
            Ok(value) => profile_from_json(&value),
            Err(FetchError::NotFound { .. }) => anyhow::bail!("GitHub user not found: {username}"),
            Err(err) => return Err(err).context("fetch GitHub profile"),
        };

        let repos = self
            .api
            .get_json(
                &format!("users/{username}/repos"),
                &[
                    ("per_page", self.max_repos.to_string()),
                    ("sort", "updated".to_owned()),
                    ("type", "all".to_owned()),
                ],
            )
            .context("list GitHub repositories")?;

        let mut projects = Vec::new();
        for value in repos.as_array().map(Vec::as_slice).unwrap_or_default() {
            let repo = repo_from_json(value);
            if repo.fork && repo.forks < self.rules.fork_threshold {
                continue;
            }
            let owner = repo.owner.clone().unwrap_or_else(|| username.to_owned());
            let contributors = self.contributors(&owner, &repo.name);
            projects.push(classify(&repo, &contributors, username, &self.rules));
        }
        let listed = projects.len();
        let projects = select_projects(
            projects,
            self.selection.max_projects,
            self.selection.prefer_open_source,
        );

        let open_source = match self.pull_requests(username) {
            Ok(pull_requests) => Some(analyze_pull_requests(username, &pull_requests, &self.rules)),
            Err(err) => {
                tracing::warn!(username, error = %format!("{err:#}"), "pull request analysis unavailable");
                None
            }
        };

        tracing::info!(
            host = "github",
            username,
            repositories = listed,
            selected = projects.len(),
            open_source_score = open_source.as_ref().map(|a| a.open_source_score),
            "fetched code host activity"
        );

        Ok(HostActivity {
            host: "github".to_owned(),
            profile,
            projects,
            open_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_fields_map_from_api_shape() {
        let value = serde_json::json!({
            "name": "hello",
            "owner": { "login": "octocat" },
            "html_url": "https://github.com/octocat/hello",
            "description": "",
            "language": "Rust",
            "license": { "key": "mit" },
            "topics": ["cli"],
            "stargazers_count": 12,
            "forks_count": 3,
            "fork": false,
            "private": false
        });
        let repo = repo_from_json(&value);
        assert_eq!(repo.owner.as_deref(), Some("octocat"));
        assert_eq!(repo.description, None);
        assert_eq!(repo.license_key.as_deref(), Some("mit"));
        assert_eq!(repo.stars, 12);
        assert!(repo.public);
    }

    #[test]
    fn search_item_repository() {
        let item = serde_json::json!({
            "repository_url": "https://api.github.com/repos/rust-lang/rust"
        });
        assert_eq!(repository_of(&item).as_deref(), Some("rust-lang/rust"));
    }
}
