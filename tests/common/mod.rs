#![allow(dead_code)]

use async_trait::async_trait;
use hiscores_scraper::app::ports::{HttpClientPort, HttpGetResult};
use hiscores_scraper::FetchError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const BASE_URL: &str = "http://hiscores.test/overall.ws";

#[derive(Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
    Transport(&'static str),
    Hang,
    Panic,
}

/// In-process transport keyed by page number.
#[derive(Default)]
pub struct FakeHiscores {
    pages: HashMap<u32, (Reply, Duration)>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl FakeHiscores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, reply: Reply) -> Self {
        self.pages.insert(page, (reply, Duration::ZERO));
        self
    }

    pub fn page_after(mut self, page: u32, reply: Reply, delay: Duration) -> Self {
        self.pages.insert(page, (reply, delay));
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn page_of(url: &str) -> u32 {
    url.rsplit("page=").next().and_then(|p| p.parse().ok()).unwrap_or(0)
}

#[async_trait]
impl HttpClientPort for FakeHiscores {
    async fn get(&self, url: &str) -> Result<HttpGetResult, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let (reply, delay) = self
            .pages
            .get(&page_of(url))
            .cloned()
            .unwrap_or((Reply::Status(404), Duration::ZERO));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Body(body) => Ok(HttpGetResult {
                status: 200,
                bytes: body.into_bytes(),
            }),
            Reply::Status(status) => Ok(HttpGetResult {
                status,
                bytes: Vec::new(),
            }),
            Reply::Transport(msg) => Err(FetchError::Transport(msg.into())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Transport("hung".into()))
            }
            Reply::Panic => panic!("transport blew up"),
        }
    }
}

/// A leaderboard page with the empty decoration row followed by `rows`.
pub fn hiscores_page(rows: &[(u32, &str, u32, u64)]) -> String {
    let mut html = String::from(
        "<html><body><div class=\"personal-hiscores\"><table>\n<thead><tr><th>Rank</th><th>Name</th><th>Level</th><th>XP</th></tr></thead>\n<tbody>\n<tr><td></td></tr>\n",
    );
    for (rank, name, level, xp) in rows {
        html.push_str(&format!(
            "<tr class=\"personal-hiscores__row\">\n<td class=\"right\">\n{}\n</td>\n<td class=\"left\"><a href=\"hiscorepersonal.ws?user1={}\">{}</a>\n</td>\n<td class=\"right\">\n{}\n</td>\n<td class=\"right\">\n{}\n</td>\n</tr>\n",
            with_commas(*rank as u64),
            name,
            name,
            with_commas(*level as u64),
            with_commas(*xp)
        ));
    }
    html.push_str("</tbody>\n</table></div></body></html>");
    html
}

fn with_commas(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
