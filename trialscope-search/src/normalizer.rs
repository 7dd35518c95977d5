//! Parameter normalization
//!
//! Turns a loosely-typed filter mapping into a validated [`SearchQuery`].
//! One interpreter walks the [`FilterSpecTable`]; no filter has bespoke
//! handling outside of its table entry.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use trialscope_core::{
    collapse_whitespace, names, parse_trial_id, DateRange, FilterSpec, FilterSpecTable,
    FilterValue, RawFilters, RawValue, SearchConfig, SearchQuery, TextRule, TrialScopeError,
    TrialScopeResult, ValidationError, ValueKind, DATE_FORMAT,
};

/// How unknown filter names are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
    /// Drop unknown names with a warning.
    #[default]
    Lenient,
    /// Report unknown names as errors.
    Strict,
}

/// Outcome of validating one filter mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Canonical query plus the report it was produced with.
///
/// The query only holds values that passed validation, so a caller may still
/// choose to run it when `report.is_valid()` is false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub query: SearchQuery,
    pub report: ValidationReport,
}

impl Normalized {
    /// Fail fast: any validation error becomes `InvalidFilter`.
    pub fn into_result(self) -> TrialScopeResult<(SearchQuery, Vec<String>)> {
        if self.report.is_valid() {
            Ok((self.query, self.report.warnings))
        } else {
            Err(TrialScopeError::InvalidFilter {
                errors: self.report.errors,
            })
        }
    }
}

/// Validates raw filter mappings against the filter table.
#[derive(Debug, Clone, Copy)]
pub struct ParameterNormalizer {
    mode: NormalizeMode,
    max_page_size: u32,
}

impl Default for ParameterNormalizer {
    fn default() -> Self {
        Self {
            mode: NormalizeMode::Lenient,
            max_page_size: 1000,
        }
    }
}

impl ParameterNormalizer {
    pub fn new(mode: NormalizeMode, max_page_size: u32) -> Self {
        Self {
            mode,
            max_page_size,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        let mode = if config.strict_filters {
            NormalizeMode::Strict
        } else {
            NormalizeMode::Lenient
        };
        Self::new(mode, config.max_page_size)
    }

    pub fn strict(mut self) -> Self {
        self.mode = NormalizeMode::Strict;
        self
    }

    pub fn mode(&self) -> NormalizeMode {
        self.mode
    }

    /// Normalize `raw` into a canonical query. Pure; never fails outright.
    pub fn normalize(&self, raw: &RawFilters) -> Normalized {
        let mut out = Normalized::default();

        for (name, value) in raw {
            if name == names::PAGE_SIZE {
                match self.page_size(value) {
                    Ok(size) => out.query.set_page_size(Some(size)),
                    Err(err) => out.report.errors.push(err),
                }
                continue;
            }

            let Some(spec) = FilterSpecTable::get(name) else {
                match self.mode {
                    NormalizeMode::Lenient => out
                        .report
                        .warnings
                        .push(format!("Ignoring unknown filter '{}'", name)),
                    NormalizeMode::Strict => out
                        .report
                        .errors
                        .push(ValidationError::UnknownFilter { name: name.clone() }),
                }
                continue;
            };

            if spec.name != name.as_str() && raw.contains_key(spec.name) {
                out.report.warnings.push(format!(
                    "Ignoring '{}' because '{}' is also set",
                    name, spec.name
                ));
                continue;
            }

            match normalize_value(spec, value) {
                Ok(Some(canonical)) => out.query.insert(spec.name, canonical),
                Ok(None) => out
                    .report
                    .warnings
                    .push(format!("Ignoring empty value for '{}'", spec.name)),
                Err(mut errors) => out.report.errors.append(&mut errors),
            }
        }

        out
    }

    fn page_size(&self, value: &RawValue) -> Result<u32, ValidationError> {
        let invalid = || ValidationError::InvalidPageSize {
            value: value.display(),
            max: self.max_page_size,
        };
        let size = match value {
            RawValue::Number(n) => u32::try_from(*n).map_err(|_| invalid())?,
            RawValue::Text(s) => s.trim().parse::<u32>().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };
        if size == 0 || size > self.max_page_size {
            return Err(invalid());
        }
        Ok(size)
    }
}

type ValueResult = Result<Option<FilterValue>, Vec<ValidationError>>;

fn invalid(spec: &FilterSpec, value: impl Into<String>, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: spec.name.to_string(),
        value: value.into(),
        reason: reason.into(),
    }
}

fn normalize_value(spec: &FilterSpec, value: &RawValue) -> ValueResult {
    match spec.kind {
        ValueKind::Text => normalize_text(spec, value),
        ValueKind::Enum => normalize_enum(spec, value),
        ValueKind::MultiEnum => normalize_multi_enum(spec, value),
        ValueKind::DateRange => normalize_date_range(spec, value),
    }
}

/// Comma-separated tokens from a text value or a list, trimmed, empties dropped.
fn tokens(value: &RawValue) -> Option<Vec<String>> {
    let pieces: Vec<&str> = match value {
        RawValue::Text(s) => s.split(',').collect(),
        RawValue::List(items) => items.iter().flat_map(|item| item.split(',')).collect(),
        _ => return None,
    };
    Some(
        pieces
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn normalize_text(spec: &FilterSpec, value: &RawValue) -> ValueResult {
    let text = match value {
        RawValue::Text(s) => collapse_whitespace(s),
        RawValue::Number(n) => n.to_string(),
        RawValue::List(items) => collapse_whitespace(&items.join(",")),
        RawValue::Range { .. } => {
            return Err(vec![invalid(spec, value.display(), "expected text")]);
        }
    };
    if text.is_empty() {
        return Ok(None);
    }

    match spec.rule {
        TextRule::Free => Ok(Some(FilterValue::Text(text))),
        TextRule::TrialIdList => {
            let mut ids = BTreeSet::new();
            let mut errors = Vec::new();
            for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                match parse_trial_id(token) {
                    Ok(id) => {
                        ids.insert(id);
                    }
                    Err(_) => errors.push(invalid(spec, token, "expected NCT followed by 8 digits")),
                }
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            if ids.is_empty() {
                return Ok(None);
            }
            let joined = ids.into_iter().collect::<Vec<_>>().join(",");
            Ok(Some(FilterValue::Text(joined)))
        }
    }
}

fn allowed_list(spec: &FilterSpec) -> String {
    let values: Vec<&str> = spec.allowed.iter().map(|v| v.value).collect();
    format!("allowed values: {}", values.join(", "))
}

/// Map tokens onto canonical allowed values, collecting every miss.
fn resolve_tokens(spec: &FilterSpec, tokens: &[String]) -> Result<BTreeSet<String>, Vec<ValidationError>> {
    let mut resolved = BTreeSet::new();
    let mut errors = Vec::new();
    for token in tokens {
        match spec.allowed_value(token) {
            Some(allowed) => {
                resolved.insert(allowed.value.to_string());
            }
            None => errors.push(invalid(spec, token.as_str(), allowed_list(spec))),
        }
    }
    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(errors)
    }
}

fn normalize_enum(spec: &FilterSpec, value: &RawValue) -> ValueResult {
    let Some(tokens) = tokens(value) else {
        return Err(vec![invalid(spec, value.display(), allowed_list(spec))]);
    };
    let resolved = resolve_tokens(spec, &tokens)?;
    if resolved.len() > 1 {
        return Err(vec![invalid(spec, value.display(), "expects a single value")]);
    }
    Ok(resolved.into_iter().next().map(FilterValue::Enum))
}

fn normalize_multi_enum(spec: &FilterSpec, value: &RawValue) -> ValueResult {
    let Some(tokens) = tokens(value) else {
        return Err(vec![invalid(spec, value.display(), allowed_list(spec))]);
    };
    let resolved = resolve_tokens(spec, &tokens)?;
    if resolved.is_empty() {
        return Ok(None);
    }
    Ok(Some(FilterValue::MultiEnum(resolved)))
}

fn parse_bound(spec: &FilterSpec, bound: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    match bound.map(str::trim).filter(|b| !b.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|_| invalid(spec, raw, "expected a date as YYYY-MM-DD")),
    }
}

/// Accepts `{from, to}`, `"from..to"` or a two-item list; either bound may be empty.
fn normalize_date_range(spec: &FilterSpec, value: &RawValue) -> ValueResult {
    let (from, to) = match value {
        RawValue::Range { from, to } => (from.as_deref(), to.as_deref()),
        RawValue::Text(s) => match s.split_once("..") {
            Some((from, to)) => (Some(from), Some(to)),
            None => (Some(s.as_str()), None),
        },
        RawValue::List(items) if items.len() == 2 => (Some(items[0].as_str()), Some(items[1].as_str())),
        _ => {
            return Err(vec![invalid(spec, value.display(), "expected a date range")]);
        }
    };

    let bounds = (parse_bound(spec, from), parse_bound(spec, to));
    let (from, to) = match bounds {
        (Ok(from), Ok(to)) => (from, to),
        (from, to) => {
            return Err(from.err().into_iter().chain(to.err()).collect());
        }
    };

    let range = DateRange { from, to };
    if range.is_open() {
        return Ok(None);
    }
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(vec![invalid(
                spec,
                value.display(),
                "start date is after end date",
            )]);
        }
    }
    Ok(Some(FilterValue::DateRange(range)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_test_utils::fixtures::raw;

    fn normalizer() -> ParameterNormalizer {
        ParameterNormalizer::default()
    }

    #[test]
    fn test_text_is_collapsed() {
        let out = normalizer().normalize(&raw(&[("condition", "  lung   cancer ")]));
        assert!(out.report.is_valid());
        assert_eq!(out.query.text("condition"), Some("lung cancer"));
    }

    #[test]
    fn test_unknown_filter_lenient_warns() {
        let out = normalizer().normalize(&raw(&[("condition", "asthma"), ("colour", "blue")]));
        assert!(out.report.is_valid());
        assert_eq!(out.report.warnings.len(), 1);
        assert!(out.report.warnings[0].contains("colour"));
        assert_eq!(out.query.len(), 1);
    }

    #[test]
    fn test_unknown_filter_strict_fails() {
        let out = normalizer().strict().normalize(&raw(&[("colour", "blue")]));
        assert_eq!(
            out.report.errors,
            vec![ValidationError::UnknownFilter {
                name: "colour".to_string()
            }]
        );
        assert!(out.into_result().unwrap_err().is_invalid_filter());
    }

    #[test]
    fn test_multi_enum_splits_and_validates() {
        let out = normalizer().normalize(&raw(&[("phase", "phase2, Phase3,,")]));
        assert!(out.report.is_valid());
        let expected: BTreeSet<String> = ["PHASE2", "PHASE3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(out.query.get("phase"), Some(&FilterValue::MultiEnum(expected)));
    }

    #[test]
    fn test_unknown_enum_token_is_an_error_even_when_lenient() {
        let out = normalizer().normalize(&raw(&[("phase", "PHASE2,PHASE9")]));
        assert!(!out.report.is_valid());
        match &out.report.errors[0] {
            ValidationError::InvalidValue { field, value, .. } => {
                assert_eq!(field, "phase");
                assert_eq!(value, "PHASE9");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(out.query.get("phase").is_none());
    }

    #[test]
    fn test_status_alias() {
        let out = normalizer().normalize(&raw(&[("status", "recruiting")]));
        assert!(out.report.is_valid());
        assert!(out.query.get(names::STUDY_STATUS).is_some());
    }

    #[test]
    fn test_alias_loses_to_canonical_name() {
        let out = normalizer().normalize(&raw(&[("status", "COMPLETED"), ("studyStatus", "RECRUITING")]));
        assert!(out.report.is_valid());
        assert_eq!(out.report.warnings.len(), 1);
        let expected: BTreeSet<String> = ["RECRUITING".to_string()].into_iter().collect();
        assert_eq!(out.query.get(names::STUDY_STATUS), Some(&FilterValue::MultiEnum(expected)));
    }

    #[test]
    fn test_single_enum_rejects_two_values() {
        let out = normalizer().normalize(&raw(&[("sex", "FEMALE,MALE")]));
        assert!(!out.report.is_valid());
    }

    #[test]
    fn test_study_ids_are_canonicalized() {
        let out = normalizer().normalize(&raw(&[("studyIds", "nct03451162, NCT00000001,NCT03451162")]));
        assert!(out.report.is_valid());
        assert_eq!(out.query.text("studyIds"), Some("NCT00000001,NCT03451162"));
    }

    #[test]
    fn test_study_ids_reject_malformed() {
        let out = normalizer().normalize(&raw(&[("studyIds", "NCT123")]));
        assert!(!out.report.is_valid());
    }

    #[test]
    fn test_date_range_forms() {
        let mut filters = raw(&[("studyStart", "2020-01-01..2021-06-30")]);
        filters.insert("completion".into(), RawValue::range(None, Some("2024-12-31")));
        let out = normalizer().normalize(&filters);
        assert!(out.report.is_valid(), "{:?}", out.report);

        match out.query.get("studyStart") {
            Some(FilterValue::DateRange(range)) => {
                assert_eq!(range.to_advanced_clause("StartDate"), "AREA[StartDate]RANGE[2020-01-01,2021-06-30]");
            }
            other => panic!("unexpected {:?}", other),
        }
        match out.query.get("completion") {
            Some(FilterValue::DateRange(range)) => assert!(range.from.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_date_range_errors() {
        let out = normalizer().normalize(&raw(&[("studyStart", "2021-01-01..2020-01-01")]));
        assert!(!out.report.is_valid());

        let out = normalizer().normalize(&raw(&[("firstPosted", "yesterday..2020-13-01")]));
        assert_eq!(out.report.errors.len(), 2);
    }

    #[test]
    fn test_page_size_bounds() {
        let mut filters = RawFilters::new();
        filters.insert("pageSize".into(), RawValue::Number(50));
        assert_eq!(normalizer().normalize(&filters).query.page_size(), Some(50));

        filters.insert("pageSize".into(), RawValue::text("0"));
        assert!(!normalizer().normalize(&filters).report.is_valid());

        filters.insert("pageSize".into(), RawValue::Number(1001));
        let out = normalizer().normalize(&filters);
        assert_eq!(
            out.report.errors,
            vec![ValidationError::InvalidPageSize {
                value: "1001".to_string(),
                max: 1000
            }]
        );
    }

    #[test]
    fn test_empty_values_are_dropped_with_warning() {
        let out = normalizer().normalize(&raw(&[("condition", "   "), ("phase", " , ")]));
        assert!(out.report.is_valid());
        assert!(out.query.is_empty());
        assert_eq!(out.report.warnings.len(), 2);
    }

    #[test]
    fn test_from_config_picks_mode() {
        let config = SearchConfig {
            strict_filters: true,
            max_page_size: 500,
            ..SearchConfig::default()
        };
        let normalizer = ParameterNormalizer::from_config(&config);
        assert_eq!(normalizer.mode(), NormalizeMode::Strict);
        let mut filters = RawFilters::new();
        filters.insert("pageSize".into(), RawValue::Number(600));
        assert!(!normalizer.normalize(&filters).report.is_valid());
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;
        use trialscope_test_utils::generators::arb_raw_filters;

        proptest! {
            #[test]
            fn prop_normalize_is_idempotent(raw in arb_raw_filters()) {
                let normalizer = ParameterNormalizer::default();
                let first = normalizer.normalize(&raw);
                prop_assert!(first.report.is_valid(), "{:?}", first.report);

                let second = normalizer.normalize(&first.query.to_raw());
                prop_assert!(second.report.is_valid());
                prop_assert_eq!(&second.query, &first.query);
                prop_assert_eq!(second.query.canonical(), first.query.canonical());
            }
        }
    }
}
