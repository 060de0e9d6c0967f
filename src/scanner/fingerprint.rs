//! Banner-based device fingerprinting
//!
//! Classification is a linear scan over an ordered keyword table; the first keyword found in the
//! banner decides the result. Table order is a priority order: "hp" sits above "cisco", so a
//! banner mentioning both is a printer.

use serde::{Deserialize, Serialize};

use crate::models::UNKNOWN_DEVICE_TYPE;

/// Confidence assigned when a keyword matches
pub const MATCH_CONFIDENCE: f32 = 0.85;

/// Confidence assigned when a banner was seen but nothing matched
pub const LOW_CONFIDENCE: f32 = 0.3;

/// One fingerprint rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintRule {
    pub keyword: &'static str,
    pub device_type: &'static str,
    pub vendor: &'static str,
}

const fn rule(
    keyword: &'static str,
    device_type: &'static str,
    vendor: &'static str,
) -> FingerprintRule {
    FingerprintRule {
        keyword,
        device_type,
        vendor,
    }
}

/// Ordered fingerprint table
pub const FINGERPRINT_RULES: &[FingerprintRule] = &[
    rule("canon", "Printer", "Canon"),
    rule("hp", "Printer", "HP"),
    rule("cisco", "Network", "Cisco"),
    rule("tplink", "Router", "TP-Link"),
    rule("nest", "IoT", "Google Nest"),
    rule("wyoming", "Camera", "Wylie"),
];

/// `(device_type, vendor, confidence)` for one banner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub device_type: String,
    pub vendor: String,
    pub confidence: f32,
}

impl Classification {
    pub fn is_unknown(&self) -> bool {
        self.device_type == UNKNOWN_DEVICE_TYPE
    }
}

/// Classify a service banner (typically the HTTP `Server` header).
///
/// The banner is lower-cased before matching. Unmatched banners keep their lower-cased text as
/// the vendor string; an empty banner becomes "Unknown".
pub fn classify_banner(banner: &str) -> Classification {
    let normalized = banner.trim().to_lowercase();

    if let Some(hit) = FINGERPRINT_RULES
        .iter()
        .find(|r| normalized.contains(r.keyword))
    {
        return Classification {
            device_type: hit.device_type.to_string(),
            vendor: hit.vendor.to_string(),
            confidence: MATCH_CONFIDENCE,
        };
    }

    let vendor = if normalized.is_empty() {
        UNKNOWN_DEVICE_TYPE.to_string()
    } else {
        normalized
    };

    Classification {
        device_type: UNKNOWN_DEVICE_TYPE.to_string(),
        vendor,
        confidence: LOW_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_banners() {
        let cases = [
            ("Canon HTTP Server", "Printer", "Canon"),
            ("HP HTTP Server; HP LaserJet", "Printer", "HP"),
            ("cisco-IOS", "Network", "Cisco"),
            ("TPLINK-HTTPD/1.0", "Router", "TP-Link"),
            ("nest-camera", "IoT", "Google Nest"),
            ("Wyoming/2.1", "Camera", "Wylie"),
        ];

        for (banner, device_type, vendor) in cases {
            let c = classify_banner(banner);
            assert_eq!(c.device_type, device_type, "banner {banner}");
            assert_eq!(c.vendor, vendor, "banner {banner}");
            assert_eq!(c.confidence, MATCH_CONFIDENCE);
        }
    }

    #[test]
    fn test_first_match_wins() {
        // both "hp" and "cisco" appear; "hp" is earlier in the table
        let c = classify_banner("cisco hp bridge");
        assert_eq!(c.vendor, "HP");

        // "canon" outranks "nest"
        let c = classify_banner("nest-canon-gateway");
        assert_eq!(c.vendor, "Canon");
    }

    #[test]
    fn test_unmatched_banner_keeps_text() {
        let c = classify_banner("nginx/1.25.3");
        assert_eq!(c.device_type, "Unknown");
        assert_eq!(c.vendor, "nginx/1.25.3");
        assert_eq!(c.confidence, LOW_CONFIDENCE);
        assert!(c.is_unknown());
    }

    #[test]
    fn test_empty_banner_is_unknown() {
        let c = classify_banner("   ");
        assert_eq!(c.device_type, "Unknown");
        assert_eq!(c.vendor, "Unknown");
        assert_eq!(c.confidence, LOW_CONFIDENCE);
    }

    #[test]
    fn test_classification_is_deterministic() {
        for banner in ["lighttpd", "Canon", "", "TPLink"] {
            assert_eq!(classify_banner(banner), classify_banner(banner));
        }
    }

    #[test]
    fn test_table_order_is_fixed() {
        let keywords: Vec<&str> = FINGERPRINT_RULES.iter().map(|r| r.keyword).collect();
        assert_eq!(
            keywords,
            vec!["canon", "hp", "cisco", "tplink", "nest", "wyoming"]
        );
    }
}
