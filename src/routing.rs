use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

/// Where mail for a domain goes, decided once when the route table is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Stored in the local mailbox tree.
    Local,
    /// Handed to another host. Relaying is not implemented, so these are dropped.
    Relay(String),
}

impl Route {
    const LOCAL: &'static str = "local";

    fn from_target(target: &str) -> Self {
        if target == Self::LOCAL {
            Route::Local
        } else {
            Route::Relay(target.to_string())
        }
    }
}

/// Classification of a single recipient address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Local,
    Remote,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route '{0}' is not of the form domain=target")]
    MissingSeparator(String),
    #[error("route '{0}' has an empty domain")]
    EmptyDomain(String),
    #[error("route '{0}' has an empty target")]
    EmptyTarget(String),
}

/// One `domain=target` pair as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub domain: String,
    pub route: Route,
}

impl FromStr for RouteEntry {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, target) = s
            .split_once('=')
            .ok_or_else(|| RouteError::MissingSeparator(s.to_string()))?;
        let domain = domain.trim();
        let target = target.trim();
        if domain.is_empty() {
            return Err(RouteError::EmptyDomain(s.to_string()));
        }
        if target.is_empty() {
            return Err(RouteError::EmptyTarget(s.to_string()));
        }

        Ok(RouteEntry {
            domain: domain.to_string(),
            route: Route::from_target(target),
        })
    }
}

/// Static domain routing, read-only once the server is running.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: impl Into<String>, route: Route) {
        self.routes.insert(domain.into(), route);
    }

    pub fn route(&self, domain: &str) -> Option<&Route> {
        self.routes.get(domain)
    }

    /// Classifies a recipient address. Malformed addresses and unknown
    /// domains are never local.
    pub fn classify(&self, address: &str) -> Delivery {
        match extract_domain(address).and_then(|domain| self.route(domain)) {
            Some(Route::Local) => Delivery::Local,
            _ => Delivery::Remote,
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<RouteEntry> for RouteTable {
    fn from_iter<I: IntoIterator<Item = RouteEntry>>(iter: I) -> Self {
        let mut table = RouteTable::new();
        for entry in iter {
            table.insert(entry.domain, entry.route);
        }
        table
    }
}

/// Returns the domain of `address` when it splits on `@` into exactly two
/// non-empty parts.
pub fn extract_domain(address: &str) -> Option<&str> {
    let mut parts = address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
            Some(domain)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        ["domain.com=local", "test.com=localhost:2026"]
            .iter()
            .map(|s| s.parse::<RouteEntry>().unwrap())
            .collect()
    }

    #[test]
    fn test_parse_entries() {
        let entry: RouteEntry = "domain.com=local".parse().unwrap();
        assert_eq!(entry.domain, "domain.com");
        assert_eq!(entry.route, Route::Local);

        let entry: RouteEntry = "test.com=localhost:2026".parse().unwrap();
        assert_eq!(entry.route, Route::Relay("localhost:2026".to_string()));

        assert!(matches!(
            "domain.com".parse::<RouteEntry>(),
            Err(RouteError::MissingSeparator(_))
        ));
        assert!(matches!(
            "=local".parse::<RouteEntry>(),
            Err(RouteError::EmptyDomain(_))
        ));
        assert!(matches!(
            "domain.com=".parse::<RouteEntry>(),
            Err(RouteError::EmptyTarget(_))
        ));
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("user@domain.com"), Some("domain.com"));
        assert_eq!(extract_domain("user"), None);
        assert_eq!(extract_domain("a@b@domain.com"), None);
        assert_eq!(extract_domain("@domain.com"), None);
        assert_eq!(extract_domain("user@"), None);
        assert_eq!(extract_domain(""), None);
    }

    #[test]
    fn test_classify() {
        let routes = table();
        assert_eq!(routes.classify("local@domain.com"), Delivery::Local);
        assert_eq!(routes.classify("user@test.com"), Delivery::Remote);
        assert_eq!(routes.classify("user@unknown.org"), Delivery::Remote);
        assert_eq!(routes.classify("domain.com"), Delivery::Remote);
        assert_eq!(routes.classify("a@b@domain.com"), Delivery::Remote);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let routes = table();
        assert_eq!(routes.classify("user@DOMAIN.COM"), Delivery::Remote);
    }

    #[test]
    fn test_only_exact_local_target_is_local() {
        let routes: RouteTable = ["a.com=Local", "b.com=local "]
            .iter()
            .map(|s| s.parse::<RouteEntry>().unwrap())
            .collect();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes.classify("x@a.com"), Delivery::Remote);
        // surrounding whitespace is trimmed when the entry is parsed
        assert_eq!(routes.classify("x@b.com"), Delivery::Local);
    }
}
