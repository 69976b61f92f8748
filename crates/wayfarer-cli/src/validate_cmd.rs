//! `wayfarer validate`: run the budget and logistics validators over an
//! itinerary file and print the combined verdict.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;

use wayfarer_core::config::EngineConfig;
use wayfarer_core::director::{self, OverallStatus};
use wayfarer_core::model::GroupProfile;

use crate::sink::read_itinerary;

pub struct ValidateArgs {
    pub file: PathBuf,
    pub budget: f64,
    pub toddler: bool,
    pub elderly: bool,
    pub mobility_impaired: bool,
    pub travelers: u32,
    pub engine_config: EngineConfig,
}

pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let days = read_itinerary(&args.file)?;
    if days.is_empty() {
        bail!("itinerary at {} contains no days", args.file.display());
    }
    let num_days = days.len() as u32;
    let profile = GroupProfile {
        has_toddler: args.toddler,
        has_elderly: args.elderly,
        has_mobility_impaired: args.mobility_impaired,
        size: args.travelers.max(1),
    };

    let verdict = director::evaluate(
        Arc::new(days),
        args.budget,
        num_days,
        profile,
        args.engine_config.budget,
        args.engine_config.logistics,
        0,
    )
    .await;

    println!("status:    {:?}", verdict.status);
    println!("budget:    {:?}", verdict.budget.status);
    println!("logistics: {:?}", verdict.logistics.status);
    if !verdict.flagged_days.is_empty() {
        println!("flagged days: {:?}", verdict.flagged_days);
    }
    for line in verdict.log_tail(20) {
        println!("  {line}");
    }
    for suggestion in &verdict.feedback {
        println!("suggestion: {suggestion}");
    }

    if verdict.status == OverallStatus::Rejected {
        bail!("itinerary rejected");
    }
    Ok(())
}
