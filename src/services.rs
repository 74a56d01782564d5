//! Well-known service names and named port presets.
//!
//! Both are static configuration data, kept out of the probe loop: the
//! engine receives a [`ServiceTable`] so tests can substitute a fake.

use std::collections::HashMap;

const WELL_KNOWN: &[(u16, &str)] = &[
    (20, "FTP-DATA"),
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8080, "HTTP-ALT"),
    (8443, "HTTPS-ALT"),
    (27017, "MongoDB"),
];

/// Read-only port → service-name lookup handed to the scan engine.
#[derive(Debug, Clone)]
pub struct ServiceTable {
    names: HashMap<u16, &'static str>,
}

impl ServiceTable {
    /// Table seeded with the common well-known TCP services.
    pub fn well_known() -> Self {
        Self {
            names: WELL_KNOWN.iter().copied().collect(),
        }
    }

    /// Empty table; every lookup resolves to "Unknown". Useful as a fake.
    pub fn empty() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    pub fn lookup(&self, port: u16) -> &'static str {
        self.names.get(&port).copied().unwrap_or("Unknown")
    }
}

impl Default for ServiceTable {
    fn default() -> Self {
        Self::well_known()
    }
}

pub const PROFILE_NAMES: &[&str] = &["common", "web", "database", "full", "quick"];

/// Resolve a named scan profile to its port list, or `None` if unknown.
pub fn profile_ports(name: &str) -> Option<Vec<u16>> {
    match name {
        "common" => Some(vec![21, 22, 23, 25, 80, 110, 143, 443, 445, 3389]),
        "web" => Some(vec![80, 443, 8080, 8443]),
        "database" => Some(vec![3306, 5432]),
        "full" => Some((1..=65535).collect()),
        "quick" => Some(vec![21, 22, 80, 443]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_and_unknown_ports() {
        let table = ServiceTable::well_known();
        assert_eq!(table.lookup(22), "SSH");
        assert_eq!(table.lookup(443), "HTTPS");
        assert_eq!(table.lookup(12345), "Unknown");
    }

    #[test]
    fn empty_table_always_resolves_unknown() {
        let table = ServiceTable::empty();
        assert_eq!(table.lookup(22), "Unknown");
    }

    #[test]
    fn profiles_resolve_expected_ports() {
        assert_eq!(profile_ports("web").unwrap(), vec![80, 443, 8080, 8443]);
        assert_eq!(profile_ports("database").unwrap(), vec![3306, 5432]);
        assert_eq!(profile_ports("full").unwrap().len(), 65535);
        assert!(profile_ports("bogus").is_none());
    }

    #[test]
    fn every_profile_name_resolves() {
        for name in PROFILE_NAMES {
            assert!(profile_ports(name).is_some(), "profile {name} missing");
        }
    }
}
