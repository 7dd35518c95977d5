//! TrialScope command line
//!
//! ```text
//! trialscope condition="lung cancer" location="los angeles, ca" phase=PHASE2,PHASE3
//! trialscope --trial NCT03451162
//! ```
//!
//! Runs one search (or one trial lookup) against the live registry and prints
//! the JSON response.

use std::sync::Arc;

use trialscope_core::{RawFilters, RawValue, SearchConfig};
use trialscope_registry::{ClinicalTrialsClient, OpenAITrialSummarizer, TemplateSummarizer, TrialSummarizer};
use trialscope_search::{init_tracing, SearchService, TelemetryConfig};

enum Command {
    Search(RawFilters),
    Trial(String),
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut args = args.into_iter();
    let mut filters = RawFilters::new();

    while let Some(arg) = args.next() {
        if arg == "--trial" {
            let id = args.next().ok_or("--trial needs an identifier")?;
            return Ok(Command::Trial(id));
        }
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected name=value, got '{}'", arg))?;
        filters.insert(name.trim().to_string(), RawValue::text(value));
    }

    if filters.is_empty() {
        return Err("no filters given".to_string());
    }
    Ok(Command::Search(filters))
}

fn summarizer() -> Arc<dyn TrialSummarizer> {
    match std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            let model = std::env::var("TRIALSCOPE_SUMMARY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            Arc::new(OpenAITrialSummarizer::new(key, model))
        }
        None => Arc::new(TemplateSummarizer::new()),
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    if let Err(err) = init_tracing(&TelemetryConfig::from_env()) {
        eprintln!("{}", err);
    }

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("trialscope: {}", message);
            eprintln!("usage: trialscope name=value [name=value ...] | trialscope --trial NCT########");
            std::process::exit(2);
        }
    };

    let config = SearchConfig::from_env();
    let client = ClinicalTrialsClient::new(&config)?;
    let tracker = client.tracker();
    let service = SearchService::new(config, Arc::new(client), summarizer())?.with_tracker(tracker);

    match command {
        Command::Search(filters) => print_json(&service.search(&filters).await?)?,
        Command::Trial(id) => print_json(&service.trial(&id).await?)?,
    }

    tracing::info!(stats = ?service.stats(), "done");
    Ok(())
}
