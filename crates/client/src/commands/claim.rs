//! Batch claiming

use anyhow::Result;
use clap::Parser;
use console::style;

use client_api_core::ClaimCategory;
use runtime::RuntimeHandle;

use crate::render;

/// Claim one resource category from every owned object
#[derive(Parser, Debug)]
pub struct Claim {
    /// dust, shard or energy
    pub category: ClaimCategory,

    /// Only show what would be claimed
    #[arg(long)]
    pub dry_run: bool,
}

impl Claim {
    pub async fn execute(self, handle: &RuntimeHandle) -> Result<()> {
        handle.load().await?;

        if self.dry_run {
            let energy = handle.energy();
            let plan = runtime::plan_claims(&handle.claimables(), self.category, energy.as_ref());
            let total: u64 = plan.iter().map(|o| o.yield_for(self.category)).sum();
            println!(
                "{} {} objects, {} {} total",
                style("Would claim").bold(),
                plan.len(),
                style(total).green(),
                self.category
            );
            for object in &plan {
                println!("  {} {}", object.id, object.yield_for(self.category));
            }
            return Ok(());
        }

        let report = handle.claim_all(self.category).await?;
        render::print_claim_report(&report);

        if let Some(energy) = handle.energy() {
            println!("{}", render::energy_line(&energy));
        }
        Ok(())
    }
}
