//! Intake sites
//!
//! Each site is the domain the API host is built from: `api.<site>`.

pub const US: &str = "datadoghq.com";
pub const EU: &str = "datadoghq.eu";
pub const US3: &str = "us3.datadoghq.com";
pub const US5: &str = "us5.datadoghq.com";
pub const AP1: &str = "ap1.datadoghq.com";
pub const GOV: &str = "ddog-gov.com";

/// All known sites
pub const ALL: [&str; 6] = [US, EU, US3, US5, AP1, GOV];

/// Whether `site` is one of the known intake sites
///
/// Unknown sites are still accepted by the client; this is only used for
/// a startup warning.
pub fn is_known(site: &str) -> bool {
    ALL.contains(&site)
}

/// Base URL of the intake API for `site`
pub fn api_base(site: &str) -> String {
    format!("https://api.{}", site)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base() {
        assert_eq!(api_base(US), "https://api.datadoghq.com");
        assert_eq!(api_base(GOV), "https://api.ddog-gov.com");
    }

    #[test]
    fn test_known_sites() {
        assert!(is_known(EU));
        assert!(!is_known("example.com"));
    }
}
