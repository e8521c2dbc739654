//! Run commands: start a run, resume auto-play, submit a single move.

use anyhow::{Result, bail};
use clap::Parser;
use console::style;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use client_api_core::Move;
use runtime::{Event, LoopExit, LoopReport, ProviderChoice, RuntimeHandle, Topic};

use crate::render;

/// Start a run and let the decision provider play it
#[derive(Parser, Debug)]
pub struct Play {
    /// Dungeon id from today's catalog (see `status`)
    #[arg(short, long)]
    pub dungeon: u32,

    /// Start a juiced run (boosted accounts only)
    #[arg(long)]
    pub juiced: bool,

    /// Decision provider: manual or random
    #[arg(long)]
    pub provider: Option<ProviderChoice>,
}

impl Play {
    pub async fn execute(self, handle: &RuntimeHandle) -> Result<()> {
        handle.load().await?;
        if let Some(choice) = self.provider {
            handle.set_provider_choice(choice);
        }

        let events = handle.subscribe(Topic::Run);
        let run = handle.start_run(self.dungeon, self.juiced).await?;
        println!("{}", render::run_line(&run));

        handle.start_auto_play();
        follow_auto_play(handle, events).await
    }
}

/// Resume auto-play on the active run
#[derive(Parser, Debug)]
pub struct AutoPlay {
    /// Decision provider: manual or random
    #[arg(long)]
    pub provider: Option<ProviderChoice>,
}

impl AutoPlay {
    pub async fn execute(self, handle: &RuntimeHandle) -> Result<()> {
        handle.load().await?;
        match handle.run_state() {
            Some(run) if !run.is_over() => println!("{}", render::run_line(&run)),
            _ => bail!("no active run; start one with `teraverse play --dungeon <id>`"),
        }
        if let Some(choice) = self.provider {
            handle.set_provider_choice(choice);
        }

        let events = handle.subscribe(Topic::Run);
        handle.start_auto_play();
        follow_auto_play(handle, events).await
    }
}

/// Submit one move on the active run
#[derive(Parser, Debug)]
pub struct PlayMove {
    /// rock, paper, scissor, or loot_one .. loot_four
    pub mv: Move,
}

impl PlayMove {
    pub async fn execute(self, handle: &RuntimeHandle) -> Result<()> {
        handle.load().await?;
        if handle.run_state().is_none_or(|run| run.is_over()) {
            bail!("no active run");
        }

        match handle.play_move(self.mv).await? {
            Some(run) => println!("{}", render::run_line(&run)),
            None => println!("{}", style("Run closed").yellow()),
        }
        if let Some(recommendation) = handle.recommended_move().await {
            println!(
                "{} {recommendation} ({})",
                style("Suggested").dim(),
                handle.provider_name()
            );
        }
        Ok(())
    }
}

/// Print run events until the auto-play loop returns. Ctrl-C stops the loop
/// and waits for it to wind down.
async fn follow_auto_play(
    handle: &RuntimeHandle,
    mut events: broadcast::Receiver<Event>,
) -> Result<()> {
    let wait = handle.wait_auto_play();
    tokio::pin!(wait);
    let mut stopping = false;

    let report = loop {
        tokio::select! {
            report = &mut wait => break report?,
            event = events.recv() => match event {
                Ok(Event::Run(event)) => print_run_event(&event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "run event output lagged");
                }
                Err(RecvError::Closed) => {}
            },
            _ = tokio::signal::ctrl_c(), if !stopping => {
                println!("{}", style("Stopping auto-play...").yellow());
                handle.stop_auto_play();
                stopping = true;
            }
        }
    };

    // Events published while the loop wound down
    loop {
        match events.try_recv() {
            Ok(Event::Run(event)) => print_run_event(&event),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    match report {
        Some(report) => print_loop_report(handle, &report),
        None => println!("{}", style("Auto-play was not running").dim()),
    }
    Ok(())
}

fn print_run_event(event: &runtime::RunEvent) {
    if let Some(line) = render::run_event_line(event) {
        println!("{line}");
    }
}

fn print_loop_report(handle: &RuntimeHandle, report: &LoopReport) {
    println!("{}", render::loop_report_line(report));
    if report.exit == LoopExit::NoRecommendation && !report.run_over {
        println!(
            "{} provider `{}` has no move; continue with `teraverse move <move>`",
            style("→").cyan(),
            handle.provider_name()
        );
    }
    if let Some(error) = handle.last_error() {
        println!("{} {error}", style("Last error:").red());
    }
}
