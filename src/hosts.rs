use std::sync::LazyLock;

use regex::Regex;

use crate::cache::JsonCache;
use crate::config::Config;
use crate::formats::{HostActivity, ResumeRecord};
use crate::normalize::domain_of;
use crate::{github, gitlab};

/// A code-hosting platform that can describe a user's public activity.
pub trait CodeHost {
    fn name(&self) -> &'static str;
    fn fetch(&self, username: &str) -> anyhow::Result<HostActivity>;
}

type HostBuilder = fn(&Config, Option<JsonCache>) -> anyhow::Result<Box<dyn CodeHost>>;

pub struct HostEntry {
    pub name: &'static str,
    pub domains: &'static [&'static str],
    pub build: HostBuilder,
    pub enabled: fn(&Config) -> bool,
}

pub const HOSTS: &[HostEntry] = &[
    HostEntry {
        name: "github",
        domains: &["github.com"],
        build: github::build,
        enabled: |config| config.github.enabled,
    },
    HostEntry {
        name: "gitlab",
        domains: &["gitlab.com"],
        build: gitlab::build,
        enabled: |config| config.gitlab.enabled,
    },
];

pub fn host_for_url(url: &str) -> Option<&'static HostEntry> {
    let domain = domain_of(url);
    HOSTS.iter().find(|host| host.domains.contains(&domain.as_str()))
}

pub fn host_for_network(network: &str) -> Option<&'static HostEntry> {
    HOSTS
        .iter()
        .find(|host| host.name.eq_ignore_ascii_case(network.trim()))
}

/// Username from a profile reference: a full URL, a bare `host/user` path,
/// `@user` or the plain username. Query strings are ignored.
pub fn username_from_profile(reference: &str, domain: &str) -> Option<String> {
    let reference = reference.trim();
    let reference = reference.split(['?', '#']).next().unwrap_or(reference);

    if let Some(caps) = HOST_PATH.captures(reference) {
        let host = caps.get(1)?.as_str();
        if !host.eq_ignore_ascii_case(domain) {
            return None;
        }
        return caps.get(2).map(|m| m.as_str().to_owned());
    }
    [&*AT_HANDLE, &*BARE_USERNAME].into_iter().find_map(|re| {
        let username = re.captures(reference)?.get(1)?.as_str();
        (!username.is_empty()).then(|| username.to_owned())
    })
}

/// `[scheme://][www.]host/first-segment`
static HOST_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?([^/\s]+)/([^/\s]+)").expect("host path pattern")
});

static AT_HANDLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^@([^/\s]+)$").expect("handle pattern"));

static BARE_USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9][A-Za-z0-9-]*)$").expect("username pattern"));

/// Hosts and usernames mentioned in the record's profiles, first mention wins.
pub fn discover(record: &ResumeRecord) -> Vec<(&'static HostEntry, String)> {
    let mut found: Vec<(&'static HostEntry, String)> = Vec::new();
    let mut push = |host: &'static HostEntry, username: String| {
        if !found.iter().any(|(h, _)| h.name == host.name) {
            found.push((host, username));
        }
    };

    for profile in &record.basics.profiles {
        if let Some(host) = host_for_url(&profile.url)
            && let Some(username) = username_from_profile(&profile.url, host.domains[0])
        {
            push(host, username);
            continue;
        }
        if let Some(network) = profile.network.as_deref()
            && let Some(host) = host_for_network(network)
            && let Some(username) = profile
                .username
                .as_deref()
                .and_then(|u| username_from_profile(u, host.domains[0]))
        {
            push(host, username);
        }
    }
    if let Some(url) = record.basics.url.as_deref()
        && let Some(host) = host_for_url(url)
        && let Some(username) = username_from_profile(url, host.domains[0])
    {
        push(host, username);
    }
    found
}
