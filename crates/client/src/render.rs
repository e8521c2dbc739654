//! Terminal formatting shared by the commands.

use console::style;

use client_api_core::{DayProgress, DungeonInfo, EnergyState, RunState};
use runtime::{
    ClaimReport, DungeonStats, HistoryRecord, LoopExit, LoopReport, ProviderStats, RunEvent,
};

pub fn energy_line(energy: &EnergyState) -> String {
    let regen = energy.regen_per_second as f64 / client_api_core::RawEnergy::SCALE as f64;
    let mut line = format!(
        "{} {}/{} (+{regen:.3}/s)",
        style("Energy").bold(),
        style(energy.visible()).cyan(),
        energy.capacity,
    );
    if energy.is_full() {
        line.push_str(&format!(" {}", style("full").green()));
    }
    if energy.boosted {
        line.push_str(&format!(" {}", style("juiced").magenta()));
    }
    line
}

pub fn run_line(run: &RunState) -> String {
    let (floor, room) = run.floor_and_room();
    let status = if !run.is_active() {
        style("closed").dim().to_string()
    } else if run.completed {
        style("completed").green().to_string()
    } else if run.player_health <= 0 {
        style("dead").red().to_string()
    } else if run.in_loot_phase() {
        style(format!("loot ({} options)", run.loot_option_count))
            .yellow()
            .to_string()
    } else {
        style("combat").cyan().to_string()
    };
    format!(
        "{} dungeon {} floor {floor} room {room} hp {}/{} [{status}]",
        style("Run").bold(),
        run.dungeon_id,
        run.player_health,
        run.player_max_health,
    )
}

pub fn catalog_line(
    dungeon: &DungeonInfo,
    progress: &DayProgress,
    energy: Option<&EnergyState>,
) -> String {
    let boosted = energy.is_some_and(|e| e.boosted);
    let visible = energy.map_or(0, EnergyState::visible);
    let used = progress.get(&dungeon.id).copied().unwrap_or(0);
    let max = dungeon.effective_max_runs(boosted);

    let runs = if dungeon.can_start(false, used, visible, boosted) {
        style(format!("{used}/{max}")).green()
    } else {
        style(format!("{used}/{max}")).red()
    };
    let mut line = format!(
        "  {} {:<24} cost {:>3} runs {runs}",
        style(format!("#{:<3}", dungeon.id)).dim(),
        dungeon.display_name(),
        dungeon.energy_cost,
    );
    if dungeon.can_start(true, used, visible, boosted) {
        line.push_str(&format!(" {}", style("juiced ok").magenta()));
    }
    line
}

/// One line per run event; `None` for events not worth printing.
pub fn run_event_line(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::Started {
            dungeon_id, juiced, ..
        } => Some(format!(
            "{} run in dungeon {dungeon_id}{}",
            style("▶").green(),
            if *juiced { " (juiced)" } else { "" }
        )),
        RunEvent::MovePlayed { mv, run } => Some(match run {
            Some(run) => format!("  {} {mv:<10} {}", style("→").cyan(), run_line(run)),
            None => format!("  {} {mv:<10} run closed", style("→").cyan()),
        }),
        RunEvent::MoveFailed { mv, error } => {
            Some(format!("  {} {mv}: {error}", style("✗").red()))
        }
        RunEvent::Ended {
            dungeon_id,
            enemies_defeated,
        } => Some(format!(
            "{} dungeon {dungeon_id} over, {enemies_defeated} enemies defeated",
            style("■").yellow()
        )),
        RunEvent::StateChanged { .. }
        | RunEvent::AutoPlayStarted
        | RunEvent::AutoPlayStopped { .. } => None,
    }
}

pub fn loop_report_line(report: &LoopReport) -> String {
    let exit = match report.exit {
        LoopExit::RunOver => "run over",
        LoopExit::NoRecommendation => "no recommendation",
        LoopExit::StepCapReached => "step cap reached",
        LoopExit::Cancelled => "cancelled",
        LoopExit::AlreadyRunning => "already running",
    };
    format!(
        "{} {exit}: {} moves submitted, {} failed",
        style("Auto-play stopped").bold(),
        report.submissions,
        report.failed_submissions
    )
}

pub fn print_claim_report(report: &ClaimReport) {
    println!(
        "{} {} of {} {} objects, {} {} total",
        style("Claimed").bold(),
        style(report.claimed.len()).cyan(),
        report.planned.len(),
        report.category,
        style(report.total_claimed).green(),
        report.category,
    );
    for failure in &report.failed {
        println!(
            "  {} {}: {}",
            style("✗").red(),
            failure.object_id,
            failure.error
        );
    }
}

pub fn history_line(record: &HistoryRecord) -> String {
    let outcome = if record.completed {
        style("completed").green()
    } else {
        style("died").red()
    };
    let items: i64 = record.item_changes.values().sum();
    format!(
        "{} {:<24} {}{outcome} enemies {:>3} items {items:+} via {}",
        style(record.recorded_at.format("%Y-%m-%d %H:%M")).dim(),
        record.dungeon_name,
        if record.juiced { "juiced " } else { "" },
        record.enemies_defeated,
        record.provider,
    )
}

pub fn dungeon_stats_line(stats: &DungeonStats) -> String {
    format!(
        "{} {:<24} runs {:>3} completed {:>3} avg defeated {:.1}",
        style(format!("#{:<3}", stats.dungeon_id)).dim(),
        stats.dungeon_name,
        stats.runs,
        stats.completed,
        stats.average_enemies(),
    )
}

pub fn provider_stats_line(stats: &ProviderStats) -> String {
    let plural = if stats.runs == 1 { "" } else { "s" };
    format!(
        "    {:<10} {} run{plural}, avg defeated {:.1}",
        stats.provider.to_uppercase(),
        stats.runs,
        stats.average_enemies(),
    )
}
