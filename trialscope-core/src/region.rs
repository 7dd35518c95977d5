//! Region lookup table (US states, DC and Puerto Rico)

use serde::Serialize;

/// A recognised region: postal abbreviation plus full name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
}

macro_rules! regions {
    ($($code:literal => $name:literal),* $(,)?) => {
        &[$(Region { code: $code, name: $name }),*]
    };
}

static REGIONS: &[Region] = regions![
    "AL" => "Alabama",
    "AK" => "Alaska",
    "AZ" => "Arizona",
    "AR" => "Arkansas",
    "CA" => "California",
    "CO" => "Colorado",
    "CT" => "Connecticut",
    "DE" => "Delaware",
    "DC" => "District of Columbia",
    "FL" => "Florida",
    "GA" => "Georgia",
    "HI" => "Hawaii",
    "ID" => "Idaho",
    "IL" => "Illinois",
    "IN" => "Indiana",
    "IA" => "Iowa",
    "KS" => "Kansas",
    "KY" => "Kentucky",
    "LA" => "Louisiana",
    "ME" => "Maine",
    "MD" => "Maryland",
    "MA" => "Massachusetts",
    "MI" => "Michigan",
    "MN" => "Minnesota",
    "MS" => "Mississippi",
    "MO" => "Missouri",
    "MT" => "Montana",
    "NE" => "Nebraska",
    "NV" => "Nevada",
    "NH" => "New Hampshire",
    "NJ" => "New Jersey",
    "NM" => "New Mexico",
    "NY" => "New York",
    "NC" => "North Carolina",
    "ND" => "North Dakota",
    "OH" => "Ohio",
    "OK" => "Oklahoma",
    "OR" => "Oregon",
    "PA" => "Pennsylvania",
    "PR" => "Puerto Rico",
    "RI" => "Rhode Island",
    "SC" => "South Carolina",
    "SD" => "South Dakota",
    "TN" => "Tennessee",
    "TX" => "Texas",
    "UT" => "Utah",
    "VT" => "Vermont",
    "VA" => "Virginia",
    "WA" => "Washington",
    "WV" => "West Virginia",
    "WI" => "Wisconsin",
    "WY" => "Wyoming",
];

impl Region {
    pub fn all() -> &'static [Region] {
        REGIONS
    }

    /// Look up by two-letter code, ignoring case.
    pub fn from_code(code: &str) -> Option<&'static Region> {
        let code = code.trim();
        REGIONS.iter().find(|r| r.code.eq_ignore_ascii_case(code))
    }

    /// Look up by full name, ignoring case and repeated whitespace.
    pub fn from_name(name: &str) -> Option<&'static Region> {
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        REGIONS.iter().find(|r| r.name.eq_ignore_ascii_case(&name))
    }

    /// Code first, then full name.
    pub fn lookup(token: &str) -> Option<&'static Region> {
        Self::from_code(token).or_else(|| Self::from_name(token))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}
