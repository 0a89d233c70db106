use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use log::info;

mod cli;

use cli::Cli;
use patchbot::config::FileConfig;
use patchbot::pipeline::ShellOps;
use patchbot::scheduler::{RunOptions, SchedulerLoop, StdinConsole};
use patchbot::tracker::HttpTracker;
use patchbot::workspace::Workspace;

fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let workspace = Workspace::new(&cli.workspace);
    let tracker = HttpTracker::new(&cli.server).context("failed to set up the tracker client")?;

    // Stage commands resolve once at startup; everything else in the config
    // is re-read every cycle.
    let commands = FileConfig::load(cli.config.as_ref())
        .context("failed to load configuration")?
        .commands;
    let ops = ShellOps::new(commands);

    let console = StdinConsole;
    let scheduler = SchedulerLoop::new(
        &tracker,
        &ops,
        &workspace,
        &console,
        cli.config.clone(),
        &cli.server,
        true,
    );

    if cli.list {
        for scored in scheduler.list_candidates().await.context("listing failed")? {
            println!(
                "{} {} {}",
                scored.score,
                scored.ticket.id.to_string().bold(),
                scored.ticket.title
            );
        }
        return Ok(());
    }

    info!("patchbot starting against {}", cli.server);
    println!(
        "{}",
        "Do not use this workspace while the bot is running.".yellow()
    );

    let opts = RunOptions {
        count: cli.count,
        queue: cli.tickets.clone(),
        skip_base: cli.skip_base,
    };
    scheduler.run(opts).await.context("scheduler stopped")?;
    Ok(())
}
