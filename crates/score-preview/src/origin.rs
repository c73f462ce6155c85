//! Origin client: title and numbered image fetches against the preview site.
//!
//! The origin offers no index of preview pages. Images live at a path derived
//! from the item identifier, and a non-2xx response means the page does not
//! exist. Network-level failures are reported separately so callers can retry
//! them.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::types::{PageOutcome, PreviewError, PreviewResult};

/// Default preview origin.
pub const DEFAULT_ORIGIN: &str = "https://www.handbellworld.com";

/// Browser user-agents rotated per request.
const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36 Edg/126.0.2592.113",
];

/// Source of preview titles and images.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Title text for an item, or an empty string when it cannot be found.
    async fn fetch_title(&self, identifier: &str) -> String;

    /// Fetch one numbered preview image.
    async fn fetch_image(&self, identifier: &str, page: usize) -> PageOutcome;

    /// Fetch an arbitrary image URL.
    async fn fetch_url(&self, url: &str) -> PageOutcome;

    /// Base URL every page of this origin lives under, without a trailing `/`.
    fn base_url(&self) -> &str;
}

/// Identifier with its one-character catalog prefix removed.
pub fn storage_base(identifier: &str) -> &str {
    let mut chars = identifier.chars();
    chars.next();
    chars.as_str()
}

/// Two-character bucket directory for an identifier.
pub fn bucket(identifier: &str) -> &str {
    let base = storage_base(identifier);
    let end = base
        .char_indices()
        .nth(2)
        .map(|(i, _)| i)
        .unwrap_or(base.len());
    &base[..end]
}

/// URL of the HTML page whose first `<strong>` holds the item title.
pub fn title_url(origin: &str, identifier: &str) -> String {
    format!("{origin}/music/preview.cfm?stocknum={identifier}&page=0")
}

/// URL of preview image `page` for `identifier`.
pub fn image_url(origin: &str, identifier: &str, page: usize) -> String {
    let base = storage_base(identifier);
    let bucket = bucket(identifier);
    format!("{origin}/music/preview/images/{bucket}/{base}/{base}-{page}.jpg")
}

/// First `<strong>` text in the document, trimmed.
pub fn extract_title(html: &str) -> String {
    let Ok(sel) = Selector::parse("strong") else {
        return String::new();
    };
    Html::parse_document(html)
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn pick_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// reqwest-backed [`Origin`].
#[derive(Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrigin {
    /// Create a client for `base_url`.
    ///
    /// `timeout` of `None` leaves requests unbounded.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> PreviewResult<Self> {
        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(5));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(PreviewError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch_title(&self, identifier: &str) -> String {
        let url = title_url(&self.base_url, identifier);
        debug!("Get title for {identifier}");

        let resp = match self
            .client
            .get(&url)
            .header(USER_AGENT, pick_user_agent())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Title fetch failed for {identifier}: {e}");
                return String::new();
            }
        };

        if !resp.status().is_success() {
            debug!("Title page for {identifier} returned {}", resp.status());
            return String::new();
        }

        match resp.text().await {
            Ok(body) => {
                let title = extract_title(&body);
                debug!("Title: {title}");
                title
            }
            Err(e) => {
                warn!("Title body read failed for {identifier}: {e}");
                String::new()
            }
        }
    }

    async fn fetch_image(&self, identifier: &str, page: usize) -> PageOutcome {
        let url = image_url(&self.base_url, identifier, page);
        self.fetch_url(&url).await
    }

    async fn fetch_url(&self, url: &str) -> PageOutcome {
        debug!("Start fetch: {url}");
        let resp = match self
            .client
            .get(url)
            .header(USER_AGENT, pick_user_agent())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return PageOutcome::Transient(e.to_string()),
        };

        let status = resp.status();
        if !status.is_success() {
            debug!("End fetch: {url} returned {status}");
            return PageOutcome::Missing;
        }

        match resp.bytes().await {
            Ok(bytes) => {
                debug!("Done fetch: {url} ({} bytes)", bytes.len());
                PageOutcome::Found {
                    bytes: bytes.to_vec(),
                    url: url.to_string(),
                }
            }
            Err(e) => PageOutcome::Transient(e.to_string()),
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
