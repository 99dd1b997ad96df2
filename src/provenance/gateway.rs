use crate::config::GatewayConfig;

/// Renders content ids as gateway URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentGateway {
    base_url: String,
}

impl ContentGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Local gateway when one is configured and preferred, public otherwise.
    pub fn from_config(settings: &GatewayConfig) -> Self {
        match (&settings.local_url, settings.prefer_local) {
            (Some(local), true) => Self::new(local),
            _ => Self::new(&settings.public_url),
        }
    }

    pub fn url_for(&self, content_id: &str) -> Option<String> {
        let content_id = content_id.trim();
        if content_id.is_empty() {
            return None;
        }
        Some(format!("{}/{}", self.base_url, content_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slashes_collapse() {
        let gateway = ContentGateway::new("https://ipfs.io/ipfs/");
        assert_eq!(
            gateway.url_for("bafy123").as_deref(),
            Some("https://ipfs.io/ipfs/bafy123")
        );
        assert_eq!(gateway.url_for("  "), None);
    }

    #[test]
    fn test_local_gateway_only_when_preferred() {
        let mut settings = GatewayConfig::default();
        assert_eq!(
            ContentGateway::from_config(&settings),
            ContentGateway::new("https://ipfs.io/ipfs")
        );
        settings.prefer_local = true;
        assert_eq!(
            ContentGateway::from_config(&settings),
            ContentGateway::new("http://127.0.0.1:8080/ipfs")
        );
    }
}
