//! Credit quantity resolution for one-time purchases.
//!
//! A checkout carries the purchased quantity in two places: the `credits`
//! metadata field and, for older checkout links, a reference code shaped
//! like `credits_250`. Metadata wins when both are present.

use {
    super::event::{Metadata, metadata_str},
    regex::Regex,
    std::sync::LazyLock,
};

static REFERENCE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"credits_(\d{1,5})(?:\D|$)").expect("credit reference pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditSource {
    Metadata,
    ReferenceCode,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditResolution {
    pub quantity: i64,
    pub source: CreditSource,
    /// Both sources were present and disagreed; `quantity` holds the metadata value.
    pub conflict: Option<(i64, i64)>,
}

/// Extract the quantity from a reference code such as `credits_250`.
pub fn parse_reference_code(reference: &str) -> Option<i64> {
    REFERENCE_CODE
        .captures(reference)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_metadata_credits(metadata: &Metadata) -> Option<i64> {
    metadata_str(metadata, "credits")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n > 0)
}

pub fn resolve_credits(metadata: &Metadata, reference: Option<&str>) -> CreditResolution {
    let from_metadata = parse_metadata_credits(metadata);
    let from_reference = reference
        .or_else(|| metadata_str(metadata, "reference"))
        .and_then(parse_reference_code)
        .filter(|n| *n > 0);

    match (from_metadata, from_reference) {
        (Some(m), Some(r)) => CreditResolution {
            quantity: m,
            source: CreditSource::Metadata,
            conflict: (m != r).then_some((m, r)),
        },
        (Some(m), None) => CreditResolution {
            quantity: m,
            source: CreditSource::Metadata,
            conflict: None,
        },
        (None, Some(r)) => CreditResolution {
            quantity: r,
            source: CreditSource::ReferenceCode,
            conflict: None,
        },
        (None, None) => CreditResolution {
            quantity: 0,
            source: CreditSource::None,
            conflict: None,
        },
    }
}
