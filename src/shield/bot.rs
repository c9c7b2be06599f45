// User-Agent based bot detection.

/// Who appears to be on the other end of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Human,
    SearchEngine,
    Automated,
}

const SEARCH_ENGINES: &[&str] = &[
    "googlebot",
    "bingbot",
    "duckduckbot",
    "yandexbot",
    "baiduspider",
    "applebot",
    "slurp",
];

const AUTOMATED: &[&str] = &[
    "bot",
    "crawl",
    "spider",
    "scrap",
    "curl/",
    "wget/",
    "httpie/",
    "python-requests",
    "python-urllib",
    "aiohttp",
    "go-http-client",
    "okhttp",
    "java/",
    "libwww",
    "httpclient",
    "node-fetch",
    "axios/",
    "postman",
    "insomnia",
    "headless",
    "phantomjs",
    "selenium",
    "puppeteer",
    "playwright",
];

/// Classify a request by its `User-Agent`. A missing or blank agent counts as automated.
pub fn classify(user_agent: Option<&str>) -> ClientKind {
    let Some(agent) = user_agent.map(str::trim).filter(|a| !a.is_empty()) else {
        return ClientKind::Automated;
    };
    let agent = agent.to_ascii_lowercase();

    if SEARCH_ENGINES.iter().any(|needle| agent.contains(needle)) {
        ClientKind::SearchEngine
    } else if AUTOMATED.iter().any(|needle| agent.contains(needle)) {
        ClientKind::Automated
    } else {
        ClientKind::Human
    }
}
