//! Run history

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use runtime::{HistoryRepository, RunStats};

use crate::render;

/// List recorded runs, newest last
#[derive(Parser, Debug)]
pub struct History {
    /// Only the last N records
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Print records as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Per-dungeon totals and averages, split by decision provider
    #[arg(long, conflicts_with = "limit")]
    pub stats: bool,

    /// Delete every record
    #[arg(long, conflicts_with_all = ["limit", "json", "stats"])]
    pub clear: bool,
}

impl History {
    /// Runs without a game connection; history is local.
    pub fn execute(self, history: &dyn HistoryRepository) -> Result<()> {
        if self.clear {
            let count = history.len()?;
            history.clear().context("Failed to clear history")?;
            println!("{} {count} records", style("Cleared").yellow().bold());
            return Ok(());
        }

        let records = history.list().context("Failed to read history")?;
        if self.stats {
            return self.print_stats(&RunStats::from_records(&records));
        }
        if records.is_empty() {
            println!("{}", style("No runs recorded yet").dim());
            return Ok(());
        }

        let skip = self
            .limit
            .map_or(0, |limit| records.len().saturating_sub(limit));
        for record in &records[skip..] {
            if self.json {
                println!("{}", serde_json::to_string(record)?);
            } else {
                println!("{}", render::history_line(record));
            }
        }

        if !self.json {
            let completed = records.iter().filter(|r| r.completed).count();
            println!(
                "{} runs, {} completed",
                style(records.len()).bold(),
                style(completed).green()
            );
        }
        Ok(())
    }

    fn print_stats(&self, stats: &RunStats) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(stats)?);
            return Ok(());
        }
        if stats.is_empty() {
            println!("{}", style("No runs recorded yet").dim());
            return Ok(());
        }
        for dungeon in &stats.dungeons {
            println!("{}", render::dungeon_stats_line(dungeon));
            for provider in &dungeon.by_provider {
                println!("{}", render::provider_stats_line(provider));
            }
        }
        Ok(())
    }
}
