use crate::config::AppConfig;
use crate::model::{Candidate, SearchError, Specs};
use crate::normalizer::normalize;
use crate::parser::{KaspiParser, Parser};
use crate::search::traits::Searcher;
use crate::utils::to_file_slug;
use rand::Rng;
use reqwest::{Client, Proxy, header};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const SEARCH_URL: &str = "https://kaspi.kz/shop/search/";
const DEBUG_HTML_DIR: &str = "logs/html";

/// Fetches Kaspi search pages over plain HTTPS.
///
/// Holds one HTTP client per configured proxy (or a single direct client)
/// for as long as the fetcher lives; they are released when it is dropped.
pub struct KaspiFetcher {
    clients: Vec<Client>,
    parser: KaspiParser,
    min_delay: f64,
    max_delay: f64,
    debug_dir: PathBuf,
}

impl KaspiFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, SearchError> {
        let build = |proxy: Option<&str>| -> Result<Client, SearchError> {
            let mut builder = Client::builder()
                .user_agent(config.user_agent.as_str())
                .timeout(Duration::from_secs(config.timeout_seconds));
            if let Some(url) = proxy {
                builder = builder.proxy(Proxy::all(url)?);
            }
            Ok(builder.build()?)
        };

        let clients = if config.proxies.is_empty() {
            vec![build(None)?]
        } else {
            config
                .proxies
                .iter()
                .map(|p| build(Some(p)))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            clients,
            parser: KaspiParser::new(config.result_limit, config.scoring.priority_terms()),
            min_delay: config.min_delay.max(0.0),
            max_delay: config.max_delay.max(0.0),
            debug_dir: PathBuf::from(DEBUG_HTML_DIR),
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn pick_client(&self) -> &Client {
        let idx = if self.clients.len() > 1 {
            rand::rng().random_range(0..self.clients.len())
        } else {
            0
        };
        &self.clients[idx]
    }

    fn random_delay(&self) -> Duration {
        let secs = if self.max_delay > self.min_delay {
            rand::rng().random_range(self.min_delay..=self.max_delay)
        } else {
            self.min_delay
        };
        Duration::from_secs_f64(secs)
    }

    async fn fetch_page(&self, query: &str) -> Result<String, SearchError> {
        tokio::time::sleep(self.random_delay()).await;

        info!("Fetching search page for: {}", query);
        let response = self
            .pick_client()
            .get(SEARCH_URL)
            .query(&[("text", query)])
            .header(header::ACCEPT_LANGUAGE, "ru-RU,ru;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::InvalidResponse(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl Searcher for KaspiFetcher {
    async fn search(&self, query: &str, specs: &Specs) -> Result<Vec<Candidate>, SearchError> {
        let html = self.fetch_page(query).await?;
        let products = self.parser.parse(&html)?;

        if products.is_empty() {
            warn!("No products found for query: {}", query);
            log_and_save_html(&self.debug_dir, &html, query);
            return Ok(products);
        }

        Ok(narrow_by_specs(products, specs))
    }
}

/// Prefers products whose titles mention the requested RAM and storage
/// amounts and processor model number. A filter that would drop every
/// product is skipped.
pub fn narrow_by_specs(products: Vec<Candidate>, specs: &Specs) -> Vec<Candidate> {
    let mut products = products;
    if let Some(ram) = &specs.ram {
        let wanted = format!("{}gb", ram);
        products = keep_matching(products, &wanted, |title| {
            title.split_whitespace().any(|t| t == wanted)
        });
    }
    if let Some(storage) = &specs.storage {
        let wanted = [format!("{}gb", storage), format!("{}tb", storage)];
        products = keep_matching(products, &wanted.join("|"), |title| {
            title.split_whitespace().any(|t| wanted.iter().any(|w| w == t))
        });
    }
    if let Some(cpu) = specs.processor.as_deref().and_then(|p| p.split_whitespace().last()) {
        let wanted = cpu.to_lowercase();
        products = keep_matching(products, &wanted, |title| title.contains(&wanted));
    }
    products
}

fn keep_matching(
    products: Vec<Candidate>,
    filter: &str,
    keep: impl Fn(&str) -> bool,
) -> Vec<Candidate> {
    let narrowed: Vec<Candidate> = products
        .iter()
        .filter(|c| keep(&normalize(&c.title)))
        .cloned()
        .collect();
    if narrowed.is_empty() {
        debug!("Spec filter '{}' matches nothing, keeping all products", filter);
        products
    } else {
        narrowed
    }
}

/// Saves the page that produced no products for later inspection.
fn log_and_save_html(folder: &Path, html: &str, query: &str) {
    if let Err(e) = fs::create_dir_all(folder) {
        warn!("Failed to create debug folder: {}", e);
        return;
    }
    let filename = folder.join(format!("debug-{}.html", to_file_slug(query)));
    if let Err(e) = fs::write(&filename, html) {
        warn!("Failed to write debug HTML: {}", e);
    } else {
        info!("Saved debug HTML: {}", filename.display());
    }
}
