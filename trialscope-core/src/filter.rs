//! Filter specification table
//!
//! Every filter the search layer understands is declared exactly once here:
//! its public name, the upstream parameter it feeds, the kind of value it
//! takes and, for enumerated filters, the allowed values together with the
//! token each value turns into upstream. The normalizer and the executor
//! both interpret this table; neither knows about individual filters.

use serde::Serialize;

/// Public filter names.
pub mod names {
    pub const CONDITION: &str = "condition";
    pub const LOCATION: &str = "location";
    pub const INTERVENTION: &str = "intervention";
    pub const OTHER_TERMS: &str = "otherTerms";
    pub const SPONSOR: &str = "sponsor";
    pub const STUDY_IDS: &str = "studyIds";
    pub const STUDY_STATUS: &str = "studyStatus";
    pub const PHASE: &str = "phase";
    pub const AGE: &str = "age";
    pub const STUDY_TYPE: &str = "studyType";
    pub const SEX: &str = "sex";
    pub const FUNDER_TYPE: &str = "funderType";
    pub const HEALTHY_VOLUNTEERS: &str = "healthyVolunteers";
    pub const STUDY_RESULTS: &str = "studyResults";
    pub const FIRST_POSTED: &str = "firstPosted";
    pub const LAST_UPDATE: &str = "lastUpdate";
    pub const STUDY_START: &str = "studyStart";
    pub const PRIMARY_COMPLETION: &str = "primaryCompletion";
    pub const COMPLETION: &str = "completion";
    /// Not a filter, but accepted alongside filters.
    pub const PAGE_SIZE: &str = "pageSize";
}

/// Upstream parameter names that are not owned by a single filter.
pub mod params {
    pub const AGG_FILTERS: &str = "aggFilters";
    pub const ADVANCED: &str = "filter.advanced";
    pub const PAGE_SIZE: &str = "pageSize";
    pub const COUNT_TOTAL: &str = "countTotal";
    pub const FORMAT: &str = "format";
    pub const FIELDS: &str = "fields";
    pub const QUERY_TERM: &str = "query.term";
    pub const QUERY_LOCATION: &str = "query.locn";
}

/// Legacy names still accepted from callers.
const ALIASES: &[(&str, &str)] = &[("status", names::STUDY_STATUS), ("ageGroup", names::AGE)];

/// Kind of value a filter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    Text,
    Enum,
    MultiEnum,
    DateRange,
}

/// Where a filter's value goes in the upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Upstream {
    /// A plain query parameter, e.g. `query.cond`.
    Param(&'static str),
    /// A key inside the comma-joined `aggFilters` parameter.
    AggFilter(&'static str),
    /// An `AREA[...]RANGE[...]` clause inside `filter.advanced`.
    AdvancedRange(&'static str),
}

/// Extra validation applied to text filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRule {
    Free,
    /// Comma-separated registry identifiers (`NCT` + 8 digits).
    TrialIdList,
}

/// UI grouping carried over for the filter catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterGroup {
    Basic,
    Advanced,
}

/// One allowed value of an enumerated filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllowedValue {
    /// Canonical value accepted from callers.
    pub value: &'static str,
    pub label: &'static str,
    /// Token sent upstream. `None` means the value constrains nothing.
    pub token: Option<&'static str>,
}

const fn allowed(value: &'static str, label: &'static str, token: &'static str) -> AllowedValue {
    AllowedValue {
        value,
        label,
        token: Some(token),
    }
}

const fn unconstrained(value: &'static str, label: &'static str) -> AllowedValue {
    AllowedValue {
        value,
        label,
        token: None,
    }
}

/// Static description of one recognized filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub upstream: Upstream,
    pub kind: ValueKind,
    pub allowed: &'static [AllowedValue],
    pub rule: TextRule,
    pub group: FilterGroup,
}

impl FilterSpec {
    const fn text(name: &'static str, label: &'static str, param: &'static str) -> Self {
        Self {
            name,
            label,
            upstream: Upstream::Param(param),
            kind: ValueKind::Text,
            allowed: &[],
            rule: TextRule::Free,
            group: FilterGroup::Basic,
        }
    }

    const fn date_range(name: &'static str, label: &'static str, area: &'static str) -> Self {
        Self {
            name,
            label,
            upstream: Upstream::AdvancedRange(area),
            kind: ValueKind::DateRange,
            allowed: &[],
            rule: TextRule::Free,
            group: FilterGroup::Advanced,
        }
    }

    const fn advanced(mut self) -> Self {
        self.group = FilterGroup::Advanced;
        self
    }

    /// Find an allowed value, ignoring case and surrounding whitespace.
    pub fn allowed_value(&self, raw: &str) -> Option<&'static AllowedValue> {
        let raw = raw.trim();
        self.allowed
            .iter()
            .find(|candidate| candidate.value.eq_ignore_ascii_case(raw))
    }

    /// Upstream tokens for a set of canonical values, in table order.
    pub fn tokens_for<'a, I>(&self, values: I) -> Vec<&'static str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: Vec<&str> = values.into_iter().collect();
        self.allowed
            .iter()
            .filter(|candidate| wanted.iter().any(|w| *w == candidate.value))
            .filter_map(|candidate| candidate.token)
            .collect()
    }

    pub fn is_enumerated(&self) -> bool {
        matches!(self.kind, ValueKind::Enum | ValueKind::MultiEnum)
    }
}

const STATUS_VALUES: &[AllowedValue] = &[
    allowed("RECRUITING", "Recruiting", "RECRUITING"),
    allowed("NOT_YET_RECRUITING", "Not yet recruiting", "NOT_YET_RECRUITING"),
    allowed("ENROLLING_BY_INVITATION", "Enrolling by invitation", "ENROLLING_BY_INVITATION"),
    allowed("ACTIVE_NOT_RECRUITING", "Active, not recruiting", "ACTIVE_NOT_RECRUITING"),
    allowed("COMPLETED", "Completed", "COMPLETED"),
    allowed("SUSPENDED", "Suspended", "SUSPENDED"),
    allowed("TERMINATED", "Terminated", "TERMINATED"),
    allowed("WITHDRAWN", "Withdrawn", "WITHDRAWN"),
    allowed("UNKNOWN", "Unknown status", "UNKNOWN"),
];

const PHASE_VALUES: &[AllowedValue] = &[
    allowed("EARLY_PHASE1", "Early Phase 1", "0"),
    allowed("PHASE1", "Phase 1", "1"),
    allowed("PHASE2", "Phase 2", "2"),
    allowed("PHASE3", "Phase 3", "3"),
    allowed("PHASE4", "Phase 4", "4"),
    allowed("NA", "Not Applicable", "na"),
];

const AGE_VALUES: &[AllowedValue] = &[
    allowed("CHILD", "Child (birth-17)", "child"),
    allowed("ADULT", "Adult (18-64)", "adult"),
    allowed("OLDER_ADULT", "Older Adult (65+)", "older"),
];

const STUDY_TYPE_VALUES: &[AllowedValue] = &[
    allowed("INTERVENTIONAL", "Interventional", "int"),
    allowed("OBSERVATIONAL", "Observational", "obs"),
    allowed("EXPANDED_ACCESS", "Expanded Access", "exp"),
];

const SEX_VALUES: &[AllowedValue] = &[
    allowed("FEMALE", "Female", "f"),
    allowed("MALE", "Male", "m"),
    unconstrained("ALL", "All"),
];

const FUNDER_VALUES: &[AllowedValue] = &[
    allowed("NIH", "NIH", "nih"),
    allowed("FED", "Other U.S. federal agency", "fed"),
    allowed("INDUSTRY", "Industry", "industry"),
    allowed("OTHER", "All others (individuals, universities, organizations)", "other"),
];

const HEALTHY_VALUES: &[AllowedValue] = &[
    allowed("Y", "Accepts healthy volunteers", "y"),
    unconstrained("N", "All studies"),
];

const RESULTS_VALUES: &[AllowedValue] = &[
    allowed("WITH", "Studies with results", "with"),
    allowed("WITHOUT", "Studies without results", "without"),
];

static FILTER_SPECS: &[FilterSpec] = &[
    FilterSpec::text(names::CONDITION, "Condition or Disease", "query.cond"),
    FilterSpec::text(names::LOCATION, "Location", params::QUERY_LOCATION),
    FilterSpec::text(names::INTERVENTION, "Intervention/Treatment", "query.intr"),
    FilterSpec::text(names::OTHER_TERMS, "Other Terms", params::QUERY_TERM),
    FilterSpec::text(names::SPONSOR, "Sponsor/Collaborator", "query.spons").advanced(),
    FilterSpec {
        rule: TextRule::TrialIdList,
        ..FilterSpec::text(names::STUDY_IDS, "Study IDs", "query.id").advanced()
    },
    FilterSpec {
        name: names::STUDY_STATUS,
        label: "Study Status",
        upstream: Upstream::Param("filter.overallStatus"),
        kind: ValueKind::MultiEnum,
        allowed: STATUS_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Basic,
    },
    FilterSpec {
        name: names::PHASE,
        label: "Study Phase",
        upstream: Upstream::AggFilter("phase"),
        kind: ValueKind::MultiEnum,
        allowed: PHASE_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Basic,
    },
    FilterSpec {
        name: names::AGE,
        label: "Age Groups",
        upstream: Upstream::AggFilter("ages"),
        kind: ValueKind::MultiEnum,
        allowed: AGE_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Basic,
    },
    FilterSpec {
        name: names::STUDY_TYPE,
        label: "Study Type",
        upstream: Upstream::AggFilter("studyType"),
        kind: ValueKind::MultiEnum,
        allowed: STUDY_TYPE_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Basic,
    },
    FilterSpec {
        name: names::SEX,
        label: "Sex",
        upstream: Upstream::AggFilter("sex"),
        kind: ValueKind::Enum,
        allowed: SEX_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Basic,
    },
    FilterSpec {
        name: names::FUNDER_TYPE,
        label: "Funder Type",
        upstream: Upstream::AggFilter("funderType"),
        kind: ValueKind::MultiEnum,
        allowed: FUNDER_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Advanced,
    },
    FilterSpec {
        name: names::HEALTHY_VOLUNTEERS,
        label: "Healthy Volunteers",
        upstream: Upstream::AggFilter("healthy"),
        kind: ValueKind::Enum,
        allowed: HEALTHY_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Advanced,
    },
    FilterSpec {
        name: names::STUDY_RESULTS,
        label: "Study Results",
        upstream: Upstream::AggFilter("results"),
        kind: ValueKind::Enum,
        allowed: RESULTS_VALUES,
        rule: TextRule::Free,
        group: FilterGroup::Advanced,
    },
    FilterSpec::date_range(names::FIRST_POSTED, "First Posted Date", "StudyFirstPostDate"),
    FilterSpec::date_range(names::LAST_UPDATE, "Last Update Posted Date", "LastUpdatePostDate"),
    FilterSpec::date_range(names::STUDY_START, "Study Start Date", "StartDate"),
    FilterSpec::date_range(
        names::PRIMARY_COMPLETION,
        "Primary Completion Date",
        "PrimaryCompletionDate",
    ),
    FilterSpec::date_range(names::COMPLETION, "Study Completion Date", "CompletionDate"),
];

/// Read-only access to the filter specifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterSpecTable;

impl FilterSpecTable {
    /// All specifications, in the order parameters are emitted upstream.
    pub fn all() -> &'static [FilterSpec] {
        FILTER_SPECS
    }

    /// Map a legacy name onto its current name.
    pub fn canonical_name(name: &str) -> &str {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, target)| *target)
            .unwrap_or(name)
    }

    /// Look up a filter by name (aliases included).
    pub fn get(name: &str) -> Option<&'static FilterSpec> {
        let name = Self::canonical_name(name);
        FILTER_SPECS.iter().find(|spec| spec.name == name)
    }

    /// Position of a filter in the table, used for stable ordering.
    pub fn position(name: &str) -> Option<usize> {
        FILTER_SPECS.iter().position(|spec| spec.name == name)
    }

    /// Catalogue of filters for the "available filters" listing.
    pub fn catalog() -> Vec<FilterDescription> {
        FILTER_SPECS.iter().map(FilterDescription::from).collect()
    }

    /// Catalogue restricted to one UI group.
    pub fn catalog_for(group: FilterGroup) -> Vec<FilterDescription> {
        FILTER_SPECS
            .iter()
            .filter(|spec| spec.group == group)
            .map(FilterDescription::from)
            .collect()
    }
}

/// Serializable description of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescription {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ValueKind,
    pub group: FilterGroup,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<&'static str>,
}

impl From<&FilterSpec> for FilterDescription {
    fn from(spec: &FilterSpec) -> Self {
        Self {
            name: spec.name,
            label: spec.label,
            kind: spec.kind,
            group: spec.group,
            allowed_values: spec.allowed.iter().map(|v| v.value).collect(),
        }
    }
}
