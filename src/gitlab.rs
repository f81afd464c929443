use std::time::Duration;

use anyhow::Context as _;
use serde_json::Value;

use crate::cache::JsonCache;
use crate::classify::{classify, select_projects};
use crate::config::{ClassificationRules, Config, ProjectSelection};
use crate::formats::{Contributor, HostActivity, HostProfile, RepoMetadata};
use crate::hosts::CodeHost;
use crate::http::{ApiClient, RateLimitPolicy, RetryPolicy, Transport};

pub const DEFAULT_API: &str = "https://gitlab.com/api/v4";

pub struct GitLab {
    api: ApiClient,
    rules: ClassificationRules,
    selection: ProjectSelection,
    max_repos: u32,
}

pub fn build(config: &Config, cache: Option<JsonCache>) -> anyhow::Result<Box<dyn CodeHost>> {
    let host = &config.gitlab;
    let transport = Transport::new(
        Duration::from_secs(host.timeout_secs.max(1)),
        RetryPolicy {
            attempts: host.retry_attempts.max(1),
            base_delay: Duration::from_millis(host.retry_delay_ms),
        },
    )?
    .with_rate_limit(RateLimitPolicy::new(RateLimitPolicy::GITLAB, host));

    let auth = host.token.clone().map(|token| ("PRIVATE-TOKEN", token));

    Ok(Box::new(GitLab {
        api: ApiClient::new(transport, host.base_url_or(DEFAULT_API), auth, cache, "gl"),
        rules: config.classification.clone(),
        selection: config.project_selection.clone(),
        max_repos: host.max_repos.clamp(1, 100),
    }))
}

fn text(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

fn count(value: &Value, pointer: &str) -> u64 {
    value.pointer(pointer).and_then(|v| v.as_u64()).unwrap_or(0)
}

pub fn project_from_json(value: &Value) -> RepoMetadata {
    RepoMetadata {
        name: text(value, "/path")
            .or_else(|| text(value, "/name"))
            .unwrap_or_default(),
        owner: text(value, "/namespace/path"),
        description: text(value, "/description"),
        url: text(value, "/web_url").unwrap_or_default(),
        homepage: None,
        // GitLab projects carry no primary language in the listing.
        language: None,
        license_key: text(value, "/license/key"),
        topics: value
            .get("topics")
            .or_else(|| value.get("tag_list"))
            .and_then(|v| v.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str().map(str::to_owned)).collect())
            .unwrap_or_default(),
        stars: count(value, "/star_count"),
        forks: count(value, "/forks_count"),
        fork: value.get("forked_from_project").is_some_and(|v| !v.is_null()),
        archived: value.get("archived").and_then(|v| v.as_bool()).unwrap_or(false),
        public: text(value, "/visibility").as_deref() == Some("public"),
    }
}

/// GitLab contributors are keyed by name and email. Entries that look like
/// the subject (name, username or noreply address) are credited to `username`.
pub fn contributors_from_json(items: &[Value], username: &str, display_name: Option<&str>) -> Vec<Contributor> {
    let noreply = format!("{}@users.noreply", username.to_ascii_lowercase());
    items
        .iter()
        .filter_map(|item| {
            let name = text(item, "/name").unwrap_or_default();
            let email = text(item, "/email").unwrap_or_default().to_ascii_lowercase();
            let is_subject = name.eq_ignore_ascii_case(username)
                || display_name.is_some_and(|d| name.eq_ignore_ascii_case(d))
                || email.starts_with(&noreply)
                || email.contains(&format!("-{}@users.noreply", username.to_ascii_lowercase()));
            let login = if is_subject {
                username.to_owned()
            } else if !email.is_empty() {
                email
            } else if !name.is_empty() {
                name
            } else {
                return None;
            };
            Some(Contributor {
                login,
                contributions: count(item, "/commits"),
            })
        })
        .collect()
}

impl GitLab {
    fn lookup_user(&self, username: &str) -> anyhow::Result<Value> {
        let users = self
            .api
            .get_json("users", &[("username", username.to_owned())])
            .context("look up GitLab user")?;
        users
            .as_array()
            .and_then(|users| users.first())
            .cloned()
            .with_context(|| format!("GitLab user not found: {username}"))
    }
}

impl CodeHost for GitLab {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    fn fetch(&self, username: &str) -> anyhow::Result<HostActivity> {
        let user = self.lookup_user(username)?;
        let id = user
            .get("id")
            .and_then(|v| v.as_u64())
            .with_context(|| format!("GitLab user {username} has no id"))?;

        let listing = self
            .api
            .get_json(
                &format!("users/{id}/projects"),
                &[
                    ("per_page", self.max_repos.to_string()),
                    ("order_by", "updated_at".to_owned()),
                ],
            )
            .context("list GitLab projects")?;
        let listing = listing.as_array().map(Vec::as_slice).unwrap_or_default();

        let display_name = text(&user, "/name");
        let mut projects = Vec::new();
        for value in listing {
            let repo = project_from_json(value);
            if repo.fork && repo.forks < self.rules.fork_threshold {
                continue;
            }
            let contributors = match value.get("id").and_then(|v| v.as_u64()) {
                Some(project_id) => match self
                    .api
                    .get_json(&format!("projects/{project_id}/repository/contributors"), &[])
                {
                    Ok(Value::Array(items)) if !items.is_empty() => {
                        contributors_from_json(&items, username, display_name.as_deref())
                    }
                    Ok(_) => Vec::new(),
                    Err(err) => {
                        tracing::debug!(project = %repo.name, error = %err, "no contributor data");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            let contributors = if contributors.is_empty() {
                vec![Contributor {
                    login: username.to_owned(),
                    contributions: 1,
                }]
            } else {
                contributors
            };
            projects.push(classify(&repo, &contributors, username, &self.rules));
        }

        let listed = projects.len();
        let projects = select_projects(
            projects,
            self.selection.max_projects,
            self.selection.prefer_open_source,
        );
        tracing::info!(
            host = "gitlab",
            username,
            repositories = listed,
            selected = projects.len(),
            "fetched code host activity"
        );

        let profile = HostProfile {
            login: text(&user, "/username").unwrap_or_else(|| username.to_owned()),
            name: display_name,
            bio: text(&user, "/bio"),
            company: text(&user, "/organization"),
            location: text(&user, "/location"),
            public_repos: listing.len() as u64,
            followers: count(&user, "/followers"),
            following: count(&user, "/following"),
            created_at: text(&user, "/created_at"),
            url: text(&user, "/web_url").unwrap_or_default(),
        };

        Ok(HostActivity {
            host: "gitlab".to_owned(),
            profile,
            projects,
            open_source: None,
        })
    }
}
