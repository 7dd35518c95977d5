//! ClinicalTrials.gov v2 registry provider

pub mod client;
pub mod types;

pub use client::ClinicalTrialsClient;
