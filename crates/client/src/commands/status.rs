//! Session overview

use anyhow::Result;
use clap::Parser;
use console::style;

use runtime::RuntimeHandle;

use crate::render;

/// Show energy, the current run, claimables and today's dungeons
#[derive(Parser, Debug)]
pub struct Status {}

impl Status {
    pub async fn execute(self, handle: &RuntimeHandle) -> Result<()> {
        handle.load().await?;

        match handle.energy() {
            Some(energy) => println!("{}", render::energy_line(&energy)),
            None => println!("{} unknown", style("Energy").bold()),
        }

        match handle.run_state() {
            Some(run) => println!("{}", render::run_line(&run)),
            None => println!("{} none", style("Run").bold()),
        }

        let totals = handle.claim_totals();
        println!(
            "{} dust {} shard {} energy {} ({} objects)",
            style("Claimable").bold(),
            style(totals.dust).cyan(),
            style(totals.shard).cyan(),
            style(totals.energy).cyan(),
            handle.claimables().len(),
        );

        let energy = handle.energy();
        let progress = handle.day_progress();
        println!("{}", style("Today's dungeons").bold());
        for dungeon in handle.dungeons() {
            println!(
                "{}",
                render::catalog_line(&dungeon, &progress, energy.as_ref())
            );
        }

        Ok(())
    }
}
