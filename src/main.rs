use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    zodiac_enrich::logging::init().context("init logging")?;

    let cli = zodiac_enrich::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        zodiac_enrich::cli::Command::Crawl(args) => {
            zodiac_enrich::crawl::run(args).await.context("crawl")?;
        }
        zodiac_enrich::cli::Command::Enrich(args) => {
            zodiac_enrich::enrich::run(args).await.context("enrich")?;
        }
        zodiac_enrich::cli::Command::Persist(args) => {
            zodiac_enrich::persist::run(args).await.context("persist")?;
        }
        zodiac_enrich::cli::Command::Show(args) => {
            zodiac_enrich::sink::show(args).await.context("show")?;
        }
        zodiac_enrich::cli::Command::Zodiac(args) => {
            zodiac_enrich::zodiac::run(args).context("zodiac")?;
        }
    }

    Ok(())
}
