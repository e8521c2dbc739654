//! Energy display and timer watch

use anyhow::Result;
use clap::Parser;
use console::style;
use tokio::sync::broadcast::error::RecvError;

use runtime::{EnergyEvent, Event, RuntimeHandle, Topic};

use crate::render;

/// Show energy; with --watch, follow the refresh timer until Ctrl-C
#[derive(Parser, Debug)]
pub struct Energy {
    /// Keep printing timer activity until Ctrl-C
    #[arg(short, long)]
    pub watch: bool,
}

impl Energy {
    pub async fn execute(self, handle: &RuntimeHandle) -> Result<()> {
        let energy = handle.refresh_energy().await?;
        println!("{}", render::energy_line(&energy));
        if !self.watch {
            return Ok(());
        }

        let mut events = handle.subscribe(Topic::Energy);
        handle.start_energy_timer();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(Event::Energy(event)) => print_energy_event(&event),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "energy event output lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        handle.stop_energy_timer();
        Ok(())
    }
}

fn print_energy_event(event: &EnergyEvent) {
    match event {
        EnergyEvent::Refreshed(energy) => println!("{}", render::energy_line(energy)),
        EnergyEvent::Scheduled { delay } => {
            println!("  {} next refresh in {delay:.1?}", style("⏱").dim());
        }
        EnergyEvent::RefreshFailed { attempt, error } => {
            println!("  {} refresh attempt {attempt} failed: {error}", style("✗").red());
        }
        EnergyEvent::Idle => println!("  {} timer idle", style("■").dim()),
    }
}
