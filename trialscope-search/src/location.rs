//! Location string cleanup
//!
//! The registry under-matches combined "city, region" strings, so the region
//! part is split off and kept for the alternative strategies.

use serde::Serialize;
use trialscope_core::{collapse_whitespace, Region};

/// Region part of a location string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RegionHint {
    Known(&'static Region),
    /// Trailing text that is not in the region table, lowercased.
    Unrecognized(String),
}

/// Result of cleaning a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedLocation {
    /// Lowercased city token; empty when only a region was given.
    pub city: String,
    pub region: Option<RegionHint>,
}

impl CleanedLocation {
    pub fn known_region(&self) -> Option<&'static Region> {
        match self.region {
            Some(RegionHint::Known(region)) => Some(region),
            _ => None,
        }
    }

    pub fn has_city(&self) -> bool {
        !self.city.is_empty()
    }

    /// Term for the location parameter of the primary query.
    pub fn primary_term(&self) -> String {
        if self.has_city() {
            return self.city.clone();
        }
        match &self.region {
            Some(RegionHint::Known(region)) => region.name.to_lowercase(),
            Some(RegionHint::Unrecognized(text)) => text.clone(),
            None => String::new(),
        }
    }

    /// City followed by the full region name, when the region is known.
    pub fn expanded_term(&self) -> Option<String> {
        let region = self.known_region()?;
        if !self.has_city() {
            return None;
        }
        Some(format!("{} {}", self.city, region.name.to_lowercase()))
    }
}

/// Splits a free-form location into a city token and an optional region.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationCleaner;

impl LocationCleaner {
    pub fn clean(raw: &str) -> CleanedLocation {
        let text = collapse_whitespace(raw);

        if let Some((city, rest)) = text.split_once(',') {
            return CleanedLocation {
                city: city.trim().to_lowercase(),
                region: region_after_comma(rest),
            };
        }

        // "Boston MA": a trailing two-letter code without a comma.
        if let Some((city, code)) = text.rsplit_once(' ') {
            if code.len() == 2 {
                if let Some(region) = Region::from_code(code) {
                    return CleanedLocation {
                        city: city.to_lowercase(),
                        region: Some(RegionHint::Known(region)),
                    };
                }
            }
        }

        CleanedLocation {
            city: text.to_lowercase(),
            region: None,
        }
    }
}

/// First segment after the city that names a region; otherwise the raw remainder.
fn region_after_comma(rest: &str) -> Option<RegionHint> {
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    rest.split(',')
        .map(str::trim)
        .find_map(Region::lookup)
        .map(RegionHint::Known)
        .or_else(|| Some(RegionHint::Unrecognized(rest.to_lowercase())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviation_and_full_name_agree() {
        assert_eq!(
            LocationCleaner::clean("Boston, MA"),
            LocationCleaner::clean("boston, massachusetts")
        );
    }

    #[test]
    fn test_city_and_region_split() {
        let cleaned = LocationCleaner::clean("  Los   Angeles ,  CA ");
        assert_eq!(cleaned.city, "los angeles");
        assert_eq!(cleaned.known_region().map(|r| r.name), Some("California"));
        assert_eq!(cleaned.primary_term(), "los angeles");
        assert_eq!(cleaned.expanded_term().as_deref(), Some("los angeles california"));
    }

    #[test]
    fn test_trailing_code_without_comma() {
        let cleaned = LocationCleaner::clean("Salt Lake City UT");
        assert_eq!(cleaned.city, "salt lake city");
        assert_eq!(cleaned.known_region().map(|r| r.code), Some("UT"));
    }

    #[test]
    fn test_plain_city_has_no_region() {
        let cleaned = LocationCleaner::clean("New York");
        assert_eq!(cleaned.city, "new york");
        assert!(cleaned.region.is_none());
        assert!(cleaned.expanded_term().is_none());
    }

    #[test]
    fn test_country_suffix_is_skipped() {
        let cleaned = LocationCleaner::clean("Houston, TX, USA");
        assert_eq!(cleaned.city, "houston");
        assert_eq!(cleaned.known_region().map(|r| r.code), Some("TX"));
    }

    #[test]
    fn test_unrecognized_region_is_kept() {
        let cleaned = LocationCleaner::clean("Toronto, Ontario");
        assert_eq!(cleaned.city, "toronto");
        assert_eq!(
            cleaned.region,
            Some(RegionHint::Unrecognized("ontario".to_string()))
        );
        assert!(cleaned.known_region().is_none());
        assert!(cleaned.expanded_term().is_none());
    }

    #[test]
    fn test_region_only() {
        let cleaned = LocationCleaner::clean(", Ohio");
        assert!(!cleaned.has_city());
        assert_eq!(cleaned.primary_term(), "ohio");
        assert!(cleaned.expanded_term().is_none());
    }

    mod prop_tests {
        use super::super::*;
        use proptest::prelude::*;
        use trialscope_test_utils::generators::arb_location;

        proptest! {
            #[test]
            fn prop_city_never_contains_a_comma(location in arb_location()) {
                let cleaned = LocationCleaner::clean(&location);
                prop_assert!(!cleaned.city.contains(','));
                prop_assert_eq!(cleaned.city.clone(), cleaned.city.to_lowercase());
            }

            #[test]
            fn prop_cleaning_ignores_case(location in arb_location()) {
                prop_assert_eq!(
                    LocationCleaner::clean(&location),
                    LocationCleaner::clean(&location.to_uppercase())
                );
            }
        }
    }
}
