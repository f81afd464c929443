use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::config::BlogConfig;
use crate::formats::{BlogAnalysis, BlogPost, Profile, ResumeRecord};
use crate::http::{FetchError, RetryPolicy, Transport};
use crate::normalize::domain_of;

const MAX_ITEMS_PER_FEED: usize = 10;
const DESCRIPTION_CHARS: usize = 500;
const POSTS_KEPT: usize = 5;

const BLOG_INDICATORS: &[&str] = &[
    "medium", "dev.to", "blog", "write", "hashnode", "substack", "ghost", "wordpress", "blogger",
    "blogspot", "tumblr", "wix", "squarespace", "notion", "telegraph", "write.as", "bearblog",
    "blot.im", "micro.blog", "svbtle", "posthaven",
];

const GENERIC_FEED_PATHS: &[&str] = &[
    "/feed/", "/feed", "/rss/", "/rss", "/atom/", "/atom", "/feed.xml", "/rss.xml", "/atom.xml",
    "/index.xml", "/?feed=rss2", "/?feed=atom", "/blog/feed", "/blog/rss",
];

const TECHNICAL_KEYWORDS: &[&str] = &[
    "algorithm", "architecture", "api", "database", "framework", "cloud", "docker", "kubernetes",
    "microservices", "devops", "ci/cd", "pipeline", "testing", "performance", "security",
    "scalability", "python", "javascript", "rust", "react", "node", "typescript", "aws", "azure",
    "gcp", "machine learning", "data science", "backend", "frontend", "fullstack", "deployment",
    "infrastructure", "git", "automation", "monitoring", "logging", "rest", "graphql", "websocket",
    "sql", "nosql", "redis", "nginx", "server", "networking", "authentication", "hackathon",
    "programming", "software", "debugging", "optimization", "refactor", "design pattern",
];

enum Strategy {
    /// Fixed feed URL derived from the profile username.
    MediumFeed,
    DevToApi,
    /// Feed paths relative to the blog root.
    FeedPaths(&'static [&'static str]),
    /// Common feed paths, then `<link rel="alternate">` discovery.
    Generic,
}

struct Platform {
    name: &'static str,
    matches: fn(&str) -> bool,
    strategy: Strategy,
}

const PLATFORMS: &[Platform] = &[
    Platform {
        name: "medium",
        matches: |domain| domain.ends_with("medium.com"),
        strategy: Strategy::MediumFeed,
    },
    Platform {
        name: "dev.to",
        matches: |domain| domain == "dev.to",
        strategy: Strategy::DevToApi,
    },
    Platform {
        name: "hashnode",
        matches: |domain| domain.contains("hashnode"),
        strategy: Strategy::FeedPaths(&["/rss.xml", "/feed.xml"]),
    },
    Platform {
        name: "substack",
        matches: |domain| domain.ends_with("substack.com"),
        strategy: Strategy::FeedPaths(&["/feed", "/feed/"]),
    },
    Platform {
        name: "wordpress",
        matches: |domain| domain.ends_with("wordpress.com") || domain.ends_with("wp.com"),
        strategy: Strategy::FeedPaths(&["/feed/", "/feed", "/?feed=rss2"]),
    },
    Platform {
        name: "github_pages",
        matches: |domain| domain.ends_with("github.io"),
        strategy: Strategy::FeedPaths(&["/feed.xml", "/atom.xml", "/rss.xml", "/index.xml"]),
    },
];

static GENERIC: Strategy = Strategy::Generic;

fn platform_for(domain: &str) -> (&'static str, &'static Strategy) {
    PLATFORMS
        .iter()
        .find(|p| (p.matches)(domain))
        .map(|p| (p.name, &p.strategy))
        .unwrap_or(("generic", &GENERIC))
}

fn is_blog_profile(profile: &Profile) -> bool {
    let url = profile.url.to_ascii_lowercase();
    let network = profile.network.as_deref().unwrap_or_default().to_ascii_lowercase();
    BLOG_INDICATORS
        .iter()
        .any(|indicator| url.contains(indicator) || network.contains(indicator))
}

/// Profile URLs (and the personal site) that look like blogs.
pub fn blog_urls(record: &ResumeRecord) -> Vec<String> {
    let mut urls = record
        .basics
        .profiles
        .iter()
        .filter(|p| !p.url.trim().is_empty() && is_blog_profile(p))
        .map(|p| p.url.trim().to_owned())
        .collect::<Vec<_>>();
    if let Some(url) = record.basics.url.as_deref().map(str::trim)
        && !url.is_empty()
        && BLOG_INDICATORS.iter().any(|i| url.to_ascii_lowercase().contains(i))
        && !urls.iter().any(|u| u == url)
    {
        urls.push(url.to_owned());
    }
    urls
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// HTML fragment to plain text.
fn plain_text(html: &str) -> String {
    let unescaped = html
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let markdown = html2md::parse_html(&unescaped);
    markdown
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_cdata(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
        .unwrap_or(text)
}

const FEED_TAGS: &[&str] = &[
    "title",
    "link",
    "guid",
    "content:encoded",
    "content",
    "description",
    "summary",
    "pubDate",
    "published",
    "updated",
];

static ELEMENTS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    FEED_TAGS
        .iter()
        .map(|&tag| {
            let pattern = format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>", tag = regex::escape(tag));
            (tag, Regex::new(&pattern).expect("feed tag pattern"))
        })
        .collect()
});

static ATOM_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link\b[^>]*href=["']([^"']+)["'][^>]*/?>"#).expect("atom link pattern")
});

static FEED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(item|entry)(?:\s[^>]*)?>(.*?)</(?:item|entry)>").expect("feed block pattern")
});

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<link\b[^>]*>").expect("link tag pattern"));

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("href pattern"));

/// First non-empty element among `tags`. Tags must be listed in `FEED_TAGS`.
fn element<'a>(block: &'a str, tags: &[&str]) -> Option<&'a str> {
    tags.iter().find_map(|tag| {
        let (_, re) = ELEMENTS.iter().find(|(name, _)| name == tag)?;
        let body = strip_cdata(re.captures(block)?.get(1)?.as_str());
        (!body.trim().is_empty()).then_some(body)
    })
}

fn atom_link(block: &str) -> Option<String> {
    ATOM_LINK
        .captures_iter(block)
        .find(|caps| {
            let tag = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            !tag.contains("rel=") || tag.contains("alternate")
        })
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// RSS `<item>` and Atom `<entry>` elements, at most ten per feed.
pub fn parse_feed(xml: &str, platform: &str) -> Vec<BlogPost> {
    FEED_BLOCK
        .captures_iter(xml)
        .filter_map(|caps| {
            let block = caps.get(2)?.as_str();
            let title = plain_text(element(block, &["title"])?);
            let url = element(block, &["link", "guid"])
                .map(|l| l.trim().to_owned())
                .filter(|l| l.starts_with("http"))
                .or_else(|| atom_link(block))?;
            let content = element(block, &["content:encoded", "content", "description", "summary"])
                .map(plain_text)
                .unwrap_or_default();

            Some(BlogPost {
                title,
                url,
                word_count: content.split_whitespace().count(),
                description: truncate_chars(&content, DESCRIPTION_CHARS),
                published: element(block, &["pubDate", "published", "updated"]).map(|d| d.trim().to_owned()),
                platform: platform.to_owned(),
            })
        })
        .take(MAX_ITEMS_PER_FEED)
        .collect()
}

/// Feed URLs advertised by an HTML page.
pub fn discover_feeds(html: &str, base: &url::Url) -> Vec<String> {
    let mut feeds = Vec::new();
    for tag in LINK_TAG.find_iter(html).map(|m| m.as_str()) {
        let lower = tag.to_ascii_lowercase();
        if !(lower.contains("alternate")
            && (lower.contains("rss") || lower.contains("atom") || lower.contains("feed")))
        {
            continue;
        }
        if let Some(target) = HREF.captures(tag).and_then(|c| c.get(1))
            && let Ok(resolved) = base.join(target.as_str())
        {
            let resolved = resolved.to_string();
            if !feeds.contains(&resolved) && resolved != base.as_str() {
                feeds.push(resolved);
            }
        }
    }
    feeds
}

fn devto_posts(articles: &Value) -> Vec<BlogPost> {
    articles
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .take(MAX_ITEMS_PER_FEED)
        .filter_map(|article| {
            let text = |key: &str| article.get(key).and_then(|v| v.as_str()).map(str::to_owned);
            Some(BlogPost {
                title: text("title")?,
                url: text("url")?,
                description: truncate_chars(&text("description").unwrap_or_default(), DESCRIPTION_CHARS),
                published: text("published_at"),
                platform: "dev.to".to_owned(),
                // Estimated from reading time at 200 words a minute.
                word_count: article
                    .get("reading_time_minutes")
                    .and_then(|v| v.as_u64())
                    .map(|minutes| usize::try_from(minutes).unwrap_or(usize::MAX))
                    .unwrap_or(0)
                    .saturating_mul(200),
            })
        })
        .collect()
}

fn first_path_segment(url: &url::Url) -> Option<String> {
    let segment = url.path_segments()?.find(|s| !s.is_empty())?;
    Some(segment.trim_start_matches('@').to_owned())
}

fn retry_policy(config: &BlogConfig) -> RetryPolicy {
    RetryPolicy {
        attempts: config.retry_attempts.max(1),
        base_delay: Duration::from_millis(config.retry_delay_ms),
    }
}

pub struct BlogFetcher {
    transport: Transport,
    max_posts: usize,
}

impl BlogFetcher {
    pub fn new(config: &BlogConfig) -> anyhow::Result<Self> {
        let transport = Transport::new(
            Duration::from_secs(config.timeout_secs.max(1)),
            retry_policy(config),
        )?;
        Ok(Self {
            transport,
            max_posts: config.max_posts.max(1),
        })
    }

    fn get(&self, url: &str) -> Result<String, FetchError> {
        self.transport
            .execute(url, |client| client.get(url))
            .map(|response| response.body)
    }

    fn feed_at(&self, url: &str, platform: &str) -> Vec<BlogPost> {
        match self.get(url) {
            Ok(body) => parse_feed(&body, platform),
            Err(err) => {
                tracing::debug!(url, error = %err, "no feed");
                Vec::new()
            }
        }
    }

    fn first_feed(&self, base: &url::Url, paths: &[&str], platform: &str) -> Vec<BlogPost> {
        for path in paths {
            let Ok(feed) = base.join(path) else {
                continue;
            };
            let posts = self.feed_at(feed.as_str(), platform);
            if !posts.is_empty() {
                tracing::debug!(feed = %feed, posts = posts.len(), "feed found");
                return posts;
            }
        }
        Vec::new()
    }

    fn posts_for(&self, url: &url::Url, platform: &str, strategy: &Strategy) -> Vec<BlogPost> {
        match strategy {
            Strategy::MediumFeed => match first_path_segment(url) {
                Some(user) => self.feed_at(&format!("https://medium.com/feed/@{user}"), platform),
                None => Vec::new(),
            },
            Strategy::DevToApi => {
                let Some(user) = first_path_segment(url) else {
                    return Vec::new();
                };
                match self.get(&format!("https://dev.to/api/articles?username={user}")) {
                    Ok(body) => serde_json::from_str::<Value>(&body)
                        .map(|articles| devto_posts(&articles))
                        .unwrap_or_default(),
                    Err(err) => {
                        tracing::debug!(%url, error = %err, "dev.to api unavailable");
                        Vec::new()
                    }
                }
            }
            Strategy::FeedPaths(paths) => self.first_feed(url, paths, platform),
            Strategy::Generic => {
                let posts = self.first_feed(url, GENERIC_FEED_PATHS, platform);
                if !posts.is_empty() {
                    return posts;
                }
                let Ok(html) = self.get(url.as_str()) else {
                    return Vec::new();
                };
                discover_feeds(&html, url)
                    .iter()
                    .map(|feed| self.feed_at(feed, platform))
                    .find(|posts| !posts.is_empty())
                    .unwrap_or_default()
            }
        }
    }

    /// Posts across every blog URL; `None` when nothing could be read.
    pub fn analyze(&self, urls: &[String]) -> Option<BlogAnalysis> {
        if urls.is_empty() {
            return None;
        }

        let mut posts = Vec::new();
        let mut platforms = BTreeSet::new();
        for raw in urls {
            let Ok(url) = url::Url::parse(raw) else {
                tracing::warn!(url = %raw, "skipping malformed blog url");
                continue;
            };
            let (platform, strategy) = platform_for(&domain_of(raw));
            let found = self.posts_for(&url, platform, strategy);
            tracing::info!(url = %raw, platform, posts = found.len(), "fetched blog posts");
            platforms.insert(platform.to_owned());
            posts.extend(found.into_iter().take(self.max_posts));
        }

        (!posts.is_empty()).then(|| analyze_posts(posts, platforms.into_iter().collect()))
    }
}

fn technical_score(posts: &[BlogPost]) -> f64 {
    let total = posts
        .iter()
        .map(|post| {
            let content = format!("{} {}", post.title, post.description).to_lowercase();
            let hits = TECHNICAL_KEYWORDS.iter().filter(|k| content.contains(*k)).count();
            hits.min(10) as f64
        })
        .sum::<f64>();
    total / posts.len() as f64
}

fn consistency_score(posts: &[BlogPost]) -> f64 {
    if posts.len() < 2 {
        return 5.0;
    }
    let volume = (posts.len() as f64 * 1.5).min(10.0);
    (volume + 7.0) / 2.0
}

fn quality_score(average_words: f64) -> f64 {
    match average_words {
        w if w >= 1000.0 => 10.0,
        w if w >= 500.0 => 8.0,
        w if w >= 200.0 => 6.0,
        _ => 4.0,
    }
}

pub fn analyze_posts(posts: Vec<BlogPost>, platforms: Vec<String>) -> BlogAnalysis {
    if posts.is_empty() {
        return BlogAnalysis {
            total_posts: 0,
            blog_score: 0.0,
            details: "No blog content found".to_owned(),
            posts,
            platforms,
        };
    }

    let total_words = posts.iter().map(|p| p.word_count).sum::<usize>();
    let average_words = total_words as f64 / posts.len() as f64;
    let technical = technical_score(&posts);
    let score = (technical + consistency_score(&posts) + quality_score(average_words)) / 3.0;
    let blog_score = (score.min(10.0) * 10.0).round() / 10.0;

    BlogAnalysis {
        total_posts: posts.len(),
        blog_score,
        details: format!(
            "Found {} posts across {} platforms. Average {} words/post. Technical depth: {:.1}/10",
            posts.len(),
            platforms.len(),
            average_words as u64,
            technical
        ),
        posts: posts.into_iter().take(POSTS_KEPT).collect(),
        platforms,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::testing::{Reply, Server};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Blog</title>
<item>
  <title>Scaling a Rust API</title>
  <link>https://jane.dev/scaling</link>
  <description><![CDATA[<p>How we tuned the <b>database</b> and the server.</p>]]></description>
  <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
</item>
<item>
  <title>Notes</title>
  <link>https://jane.dev/notes</link>
</item>
</channel></rss>"#;

    const ATOM: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
<entry>
  <title>Kubernetes at home</title>
  <link rel="alternate" href="https://jane.github.io/k8s"/>
  <summary>Running docker and kubernetes</summary>
  <published>2024-02-01T00:00:00Z</published>
</entry>
</feed>"#;

    #[test]
    fn rss_items_are_parsed() {
        let posts = parse_feed(RSS, "generic");
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Scaling a Rust API");
        assert_eq!(posts[0].url, "https://jane.dev/scaling");
        assert!(posts[0].description.contains("database"));
        assert!(!posts[0].description.contains("<p>"));
        assert!(posts[0].published.is_some());
        assert_eq!(posts[1].word_count, 0);
    }

    #[test]
    fn atom_entries_use_href_links() {
        let posts = parse_feed(ATOM, "github_pages");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://jane.github.io/k8s");
        assert_eq!(posts[0].platform, "github_pages");
    }

    #[test]
    fn feeds_are_capped_at_ten_items() {
        let items = (0..15)
            .map(|i| format!("<item><title>Post {i}</title><link>https://b.dev/{i}</link></item>"))
            .collect::<String>();
        let posts = parse_feed(&format!("<rss><channel>{items}</channel></rss>"), "generic");
        assert_eq!(posts.len(), 10);
    }

    #[test]
    fn alternate_links_are_discovered() -> anyhow::Result<()> {
        let html = r#"<html><head>
<link rel="stylesheet" href="/style.css">
<link rel="alternate" type="application/rss+xml" href="/posts/index.xml">
</head></html>"#;
        let base = url::Url::parse("https://jane.dev/")?;
        assert_eq!(discover_feeds(html, &base), vec!["https://jane.dev/posts/index.xml".to_owned()]);
        Ok(())
    }

    #[test]
    fn platforms_fall_through_to_generic() {
        assert_eq!(platform_for("medium.com").0, "medium");
        assert_eq!(platform_for("jane.hashnode.dev").0, "hashnode");
        assert_eq!(platform_for("jane.github.io").0, "github_pages");
        assert_eq!(platform_for("jane.dev").0, "generic");
    }

    #[test]
    fn blog_urls_come_from_indicators() {
        let mut record = ResumeRecord::default();
        record.basics.url = Some("https://janeblog.net".to_owned());
        record.basics.profiles = vec![
            Profile {
                network: Some("Medium".to_owned()),
                username: None,
                url: "https://medium.com/@jane".to_owned(),
            },
            Profile {
                network: Some("GitHub".to_owned()),
                username: None,
                url: "https://github.com/jane".to_owned(),
            },
        ];
        assert_eq!(
            blog_urls(&record),
            vec!["https://medium.com/@jane".to_owned(), "https://janeblog.net".to_owned()]
        );
    }

    #[test]
    fn every_feed_tag_has_a_pattern() {
        assert_eq!(ELEMENTS.len(), FEED_TAGS.len());
        assert_eq!(element("<pubDate>today</pubDate>", &["pubDate"]), Some("today"));
        assert_eq!(element("<author>jane</author>", &["author"]), None);
    }

    #[test]
    fn feed_fetches_retry_server_errors() {
        let server = Server::spawn(|hit, _| if hit == 1 { Reply::status(503) } else { Reply::ok(RSS) });
        let config = BlogConfig {
            retry_delay_ms: 0,
            ..BlogConfig::default()
        };
        let fetcher = BlogFetcher::new(&config).expect("fetcher");
        let posts = fetcher.feed_at(&format!("{}/feed", server.url), "generic");
        assert_eq!(posts.len(), 2);
        assert_eq!(server.hits(), 2);
    }

    #[test]
    fn single_attempt_config_gives_up_at_once() {
        let server = Server::spawn(|_, _| Reply::status(503));
        let config = BlogConfig {
            retry_attempts: 0,
            retry_delay_ms: 0,
            ..BlogConfig::default()
        };
        assert_eq!(retry_policy(&config).attempts, 1);
        let fetcher = BlogFetcher::new(&config).expect("fetcher");
        assert!(fetcher.feed_at(&format!("{}/feed", server.url), "generic").is_empty());
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn devto_word_counts_come_from_reading_time() {
        let articles = json!([
            {"title": "Short", "url": "https://dev.to/jane/short", "reading_time_minutes": 5},
            {"title": "Huge", "url": "https://dev.to/jane/huge", "reading_time_minutes": u64::MAX},
            {"title": "Untimed", "url": "https://dev.to/jane/untimed"},
        ]);
        let posts = devto_posts(&articles);
        assert_eq!(posts[0].word_count, 1000);
        assert_eq!(posts[1].word_count, usize::MAX);
        assert_eq!(posts[2].word_count, 0);
        assert!(posts.iter().all(|post| post.platform == "dev.to"));
    }

    #[test]
    fn analysis_scores_stay_in_range() {
        let post = |words| BlogPost {
            title: "Rust api performance".to_owned(),
            url: "https://jane.dev/p".to_owned(),
            description: "database server testing".to_owned(),
            published: None,
            platform: "generic".to_owned(),
            word_count: words,
        };
        let single = analyze_posts(vec![post(100)], vec!["generic".to_owned()]);
        // technical 6, consistency 5, quality 4
        assert_eq!(single.blog_score, 5.0);

        let many = analyze_posts((0..8).map(|_| post(1200)).collect(), vec!["generic".to_owned()]);
        assert_eq!(many.total_posts, 8);
        assert_eq!(many.posts.len(), 5);
        assert!(many.blog_score <= 10.0);
    }
}
