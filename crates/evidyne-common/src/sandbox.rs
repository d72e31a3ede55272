use crate::error::EvidyneError;
use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("Evidyne/", env!("CARGO_PKG_VERSION"), " (research)");

/// Every external service the system talks to. Anything else is refused
/// before a connection is attempted.
const DEFAULT_ALLOWLIST: [&str; 5] = [
    "eutils.ncbi.nlm.nih.gov",           // PubMed E-utilities
    "generativelanguage.googleapis.com", // Gemini
    "api.openai.com",                    // OpenAI-compatible hosted
    "localhost",                         // Self-hosted LLM endpoints
    "127.0.0.1",
];

/// HTTP client wrapper that caps outbound traffic to an allowlist of hosts.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Builds a client with the default allowlist of literature and LLM hosts.
    pub fn new() -> Result<Self, EvidyneError> {
        let allowlist = DEFAULT_ALLOWLIST.iter().map(|d| d.to_string()).collect();
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EvidyneError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Adds a hostname (and implicitly its subdomains) to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// True when the URL parses and its host is an allowlisted hostname or a
    /// subdomain of one.
    pub fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        parsed.host_str().map_or(false, |host| {
            self.allowlist
                .iter()
                .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
        })
    }

    fn authorize(&self, method: &str, url: &str) -> Result<(), EvidyneError> {
        if self.is_allowed(url) {
            return Ok(());
        }
        tracing::warn!(url, method, "blocked outbound request to non-allowlisted host");
        Err(EvidyneError::Security(format!(
            "outbound {} blocked: host of {} is not allowlisted",
            method, url
        )))
    }

    /// GET request builder for an allowlisted URL.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, EvidyneError> {
        self.authorize("GET", url)?;
        Ok(self.client.get(url))
    }

    /// POST request builder for an allowlisted URL.
    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, EvidyneError> {
        self.authorize("POST", url)?;
        Ok(self.client.post(url))
    }
}
