use std::io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

mod config;
mod console;
mod datetime;
mod logger;
mod open_command;
mod recent_projects;
mod report_command;
mod session_cache;
mod session_store;
#[cfg(test)]
mod test_support;
mod time_entry;
mod tracking_api;
mod watch_command;

use config::Config;
use console::{format_duration, ConsoleMarkdownList, ConsolePresenter};
use open_command::{CloseArgs, CloseCommand, OpenArgs, OpenCommand};
use recent_projects::RecentProjects;
use report_command::{EntriesArgs, ReportCommand, SummaryArgs};
use session_cache::SessionCache;
use session_store::SessionStore;
use tracking_api::TrackingClient;
use watch_command::WatchCommand;

/// 鉄骨詳細設計プロジェクトの作業時間を計測するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- login --email detailer@example.com
/// $ cargo run -- open "Tower A"
/// $ cargo run -- watch
/// $ cargo run -- close "Tower A"
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(long = "email", global = true, help = "Acts as this user instead of the signed-in one")]
    email: Option<String>,

    #[clap(short = 'v', long = "verbose", global = true, help = "Shows debug logs")]
    verbose: bool,

    #[clap(short = 'q', long = "quiet", global = true, help = "Shows only warnings and errors")]
    quiet: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Remembers the signed-in user
    Login,
    /// Forgets the signed-in user
    Logout,
    /// Opens a project and starts tracking time on it
    Open(OpenArgs),
    /// Closes a project and stops tracking if it is the tracked one
    Close(CloseArgs),
    /// Stops the active tracking session
    Stop,
    /// Shows the active tracking session
    Status,
    /// Shows a live timer for the active session until Ctrl-C
    Watch,
    /// Shows the tracked time of a project
    Summary(SummaryArgs),
    /// Lists the time entries of a project
    Entries(EntriesArgs),
    /// Lists recently opened projects
    Recent,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::setup_logger(logger::level_filter(args.verbose, args.quiet))?;

    let config = Config::load(args.email.clone()).context("Failed to load configuration")?;
    let client = TrackingClient::new(&config.api_url).context("Failed to new tracking client")?;
    let store = SessionStore::new(
        client,
        SessionCache::in_dir(&config.data_dir),
        config.user_email.clone(),
    );
    let recent_projects = RecentProjects::in_dir(&config.data_dir);
    let mut stdout = io::stdout();
    let mut presenter = ConsoleMarkdownList::new(&mut stdout);

    match args.subcommand {
        SubCommands::Login => {
            let email = args
                .email
                .context("Pass the user to remember with --email")?;
            config::save_user_email(&config.data_dir, &email)?;
            info!("Signed in as {}", email);
        }
        SubCommands::Logout => {
            config::clear_user_email(&config.data_dir)?;
            info!("Signed out");
        }
        SubCommands::Open(open) => {
            let user_email = config.require_user_email()?;
            let _view = store.mount().await;
            let outcome = OpenCommand::new(&store, &recent_projects)
                .run(open, user_email)
                .await?;
            presenter.show_recent_projects(&outcome.recent_projects)?;
            if outcome.session.is_some() {
                presenter.show_state(&store.state())?;
            }
        }
        SubCommands::Close(close) => {
            let _view = store.mount().await;
            CloseCommand::new(&store).run(close).await;
            presenter.show_state(&store.state())?;
        }
        SubCommands::Stop => {
            let _view = store.mount().await;
            match store.state().active_project {
                Some(project) => {
                    let elapsed = store.elapsed_seconds();
                    store.stop_tracking().await?;
                    info!("Tracked {} on {}", format_duration(elapsed), project);
                }
                None => info!("No active session"),
            }
            presenter.show_state(&store.state())?;
        }
        SubCommands::Status => {
            let view = store.mount().await;
            presenter.show_state(&view.state())?;
        }
        SubCommands::Watch => {
            WatchCommand::new(&store)
                .run(&mut presenter, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                })
                .await?;
            println!();
        }
        SubCommands::Summary(summary) => {
            let user_email = config.require_user_email()?;
            let view = store.mount().await;
            let summary = ReportCommand::new(&store).summary(summary, user_email).await?;
            presenter.show_summary(&summary, &view.state())?;
        }
        SubCommands::Entries(entries) => {
            let user_email = config.require_user_email()?;
            let entries = ReportCommand::new(&store).entries(entries, user_email).await?;
            presenter.show_time_entries(&entries)?;
        }
        SubCommands::Recent => {
            let user_email = config.require_user_email()?;
            presenter.show_recent_projects(&recent_projects.list(user_email)?)?;
        }
    }

    Ok(())
}
