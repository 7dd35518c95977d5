//! ClinicalTrials.gov v2 response types
//!
//! Only the fields the search layer reads are modelled. Every module is
//! optional: count probes request `fields=NCTId` and get back studies that
//! carry nothing but the identification module.

use serde::Deserialize;
use trialscope_core::{RegistryPage, TrialRecord};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudiesResponse {
    #[serde(default)]
    pub studies: Vec<Study>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    #[serde(default)]
    pub protocol_section: ProtocolSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSection {
    pub identification_module: IdentificationModule,
    pub status_module: StatusModule,
    pub conditions_module: ConditionsModule,
    pub design_module: DesignModule,
    pub description_module: DescriptionModule,
    pub contacts_locations_module: ContactsLocationsModule,
    pub sponsor_collaborators_module: SponsorCollaboratorsModule,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentificationModule {
    pub nct_id: String,
    pub brief_title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusModule {
    pub overall_status: Option<String>,
    pub start_date_struct: Option<DateStruct>,
    pub last_update_post_date_struct: Option<DateStruct>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateStruct {
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConditionsModule {
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignModule {
    pub study_type: Option<String>,
    pub phases: Vec<String>,
    pub enrollment_info: Option<EnrollmentInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentInfo {
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DescriptionModule {
    pub brief_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactsLocationsModule {
    pub locations: Vec<StudyLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudyLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SponsorCollaboratorsModule {
    pub lead_sponsor: Option<LeadSponsor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadSponsor {
    #[serde(default)]
    pub name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<Study> for TrialRecord {
    fn from(study: Study) -> Self {
        let p = study.protocol_section;
        let location = p.contacts_locations_module.locations.into_iter().next().and_then(|loc| {
            let parts: Vec<String> = [loc.city, loc.state]
                .into_iter()
                .filter_map(non_empty)
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        });

        TrialRecord {
            nct_id: p.identification_module.nct_id,
            title: p.identification_module.brief_title,
            condition: non_empty(p.conditions_module.conditions.into_iter().next()),
            status: non_empty(p.status_module.overall_status),
            phase: non_empty(p.design_module.phases.into_iter().next()),
            study_type: non_empty(p.design_module.study_type),
            location,
            sponsor: non_empty(p.sponsor_collaborators_module.lead_sponsor.and_then(|s| s.name)),
            brief_summary: non_empty(p.description_module.brief_summary),
            start_date: non_empty(p.status_module.start_date_struct.and_then(|d| d.date)),
            last_updated: non_empty(
                p.status_module
                    .last_update_post_date_struct
                    .and_then(|d| d.date),
            ),
            enrollment: p.design_module.enrollment_info.and_then(|e| e.count),
        }
    }
}

impl From<StudiesResponse> for RegistryPage {
    fn from(response: StudiesResponse) -> Self {
        RegistryPage {
            records: response.studies.into_iter().map(TrialRecord::from).collect(),
            total_count: response.total_count,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}
