use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// C9: flat set of banned client IPs, consulted before connection admission.
pub struct AbuseList {
    ips: RwLock<HashSet<String>>,
}

impl AbuseList {
    pub fn new() -> Self {
        AbuseList {
            ips: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_banned(ips: impl IntoIterator<Item = String>) -> Self {
        AbuseList {
            ips: RwLock::new(ips.into_iter().collect()),
        }
    }

    pub fn is_banned(&self, ip: &str) -> bool {
        self.ips.read().unwrap().contains(ip)
    }

    pub fn ban(&self, ip: String) {
        self.ips.write().unwrap().insert(ip);
    }

    pub fn unban(&self, ip: &str) {
        self.ips.write().unwrap().remove(ip);
    }
}

impl Default for AbuseList {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the client IP the way HTTP admission does: `X-Forwarded-For`
/// when present, else the socket's remote address.
pub fn client_ip(forwarded_for: Option<&str>, remote_addr: Option<std::net::SocketAddr>) -> String {
    if let Some(xff) = forwarded_for {
        if let Some(first) = xff.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    remote_addr
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub type SharedAbuseList = Arc<AbuseList>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_and_check() {
        let list = AbuseList::new();
        assert!(!list.is_banned("1.2.3.4"));
        list.ban("1.2.3.4".to_string());
        assert!(list.is_banned("1.2.3.4"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let addr: std::net::SocketAddr = "10.0.0.1:1234".parse().unwrap();
        assert_eq!(
            client_ip(Some("203.0.113.5, 10.0.0.1"), Some(addr)),
            "203.0.113.5"
        );
    }

    #[test]
    fn test_client_ip_falls_back_to_remote_addr() {
        let addr: std::net::SocketAddr = "10.0.0.1:1234".parse().unwrap();
        assert_eq!(client_ip(None, Some(addr)), "10.0.0.1");
    }
}
