use regex::Regex;
use url::Url;

/// Multi-label public suffixes worth knowing about without shipping the full
/// suffix list. Anything not matched here is treated as a single-label suffix.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "gov.uk", "ac.uk", "me.uk", "co.jp", "ne.jp", "or.jp", "com.au", "net.au",
    "org.au", "com.br", "net.br", "org.br", "co.in", "net.in", "org.in", "co.nz", "net.nz",
    "com.cn", "net.cn", "org.cn", "com.mx", "com.ar", "com.tr", "co.za", "co.kr", "com.sg",
    "com.hk", "com.tw",
];

/// Best-effort extraction of a registrable domain from reassembled payload
/// bytes. Ordered heuristics, first match wins: a full URL, then a bare
/// hostname token, then any dotted token that reduces to a domain.
pub struct DomainExtractor {
    url_re: Regex,
    host_re: Regex,
    token_re: Regex,
}

impl DomainExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            url_re: Regex::new(r#"[a-zA-Z][a-zA-Z0-9+.-]*://[^\s"'<>\[\]]+"#)?,
            host_re: Regex::new(r"(?i)\b[a-z0-9](?:[a-z0-9.-]*[a-z0-9])?\.[a-z]{2,}\b")?,
            token_re: Regex::new(r"(?i)[a-z0-9][a-z0-9.-]{1,251}[a-z0-9]")?,
        })
    }

    pub fn extract_domain(&self, data: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(data);

        if let Some(m) = self.url_re.find(&text) {
            if let Some(domain) = Url::parse(m.as_str())
                .ok()
                .and_then(|url| url.host_str().map(|h| h.to_string()))
                .and_then(|host| registrable_domain(&host))
            {
                return Some(domain);
            }
        }

        if let Some(domain) = self
            .host_re
            .find(&text)
            .and_then(|m| registrable_domain(m.as_str()))
        {
            return Some(domain);
        }

        self.token_re
            .find_iter(&text)
            .map(|m| m.as_str())
            .filter(|token| token.len() >= 3 && token.len() <= 253 && token.contains('.'))
            .find_map(registrable_domain)
    }
}

/// Reduce a hostname to its registrable domain: one label plus the public
/// suffix, falling back to the bare label for suffix-less hosts.
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim_matches('.').to_lowercase();
    if host.is_empty() {
        return None;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|label| label.is_empty()) {
        return None;
    }
    if labels.len() == 1 {
        return Some(host);
    }

    for suffix in MULTI_LABEL_SUFFIXES {
        if host == *suffix {
            return None;
        }
        if host.ends_with(&format!(".{suffix}")) {
            let prefix = &host[..host.len() - suffix.len() - 1];
            let label = prefix.rsplit('.').next().unwrap();
            return Some(format!("{label}.{suffix}"));
        }
    }

    Some(labels[labels.len() - 2..].join("."))
}
