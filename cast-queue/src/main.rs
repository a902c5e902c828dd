//! cast-queue - Manage the scheduled post queue

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use libsocialcast::publish::PublishOutcome;
use libsocialcast::server::AppState;
use libsocialcast::types::PostStatus;
use libsocialcast::{Config, Post};

#[derive(Parser, Debug)]
#[command(name = "cast-queue")]
#[command(version)]
#[command(about = "Manage scheduled social posts")]
#[command(long_about = "\
cast-queue - Manage the scheduled post queue

COMMANDS:
    list        List scheduled posts
    cancel      Cancel a scheduled post (back to draft)
    now         Publish a scheduled post immediately
    stats       Show queue statistics

USAGE EXAMPLES:
    # List scheduled posts
    cast-queue list

    # List posts in JSON format
    cast-queue list --format json

    # Cancel a post
    cast-queue cancel <POST_ID>

    # Publish a post immediately
    cast-queue now <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/socialcast/config.toml
    Override with SOCIALCAST_CONFIG / SOCIALCAST_DB_PATH

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Configuration or authentication error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List scheduled posts
    List {
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Cancel a scheduled post, returning it to draft
    Cancel {
        /// Post UUID
        post_id: String,
    },
    /// Publish a scheduled post immediately
    Now {
        /// Post UUID
        post_id: String,
    },
    /// Show statistics about the queue
    Stats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    libsocialcast::logging::init_default();

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> libsocialcast::Result<()> {
    let config = Config::load()?;
    let state = AppState::new(config).await?;

    match cli.command {
        Command::List { format } => {
            let posts = state.store.scheduled_posts_between(0, i64::MAX).await?;
            if format == "json" {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&posts).unwrap_or_else(|_| "[]".to_string())
                );
            } else {
                print_post_table(&posts);
            }
        }
        Command::Cancel { post_id } => {
            let post = state.store.get_post(&post_id).await?.ok_or_else(|| {
                libsocialcast::CastError::InvalidInput(format!("Post not found: {}", post_id))
            })?;

            state
                .store
                .update_post_status(&post.id, PostStatus::Draft, &post.external_ids)
                .await?;
            println!("Cancelled post '{}' ({})", post.title, post.id);
        }
        Command::Now { post_id } => match state.publish.publish_now(&post_id).await? {
            PublishOutcome::Published { external_id } => {
                println!("Published: {}", external_id);
            }
            PublishOutcome::AlreadyPublished => {
                println!("Post is already published");
            }
            PublishOutcome::Failed { error } => {
                eprintln!("Publish failed: {}", error);
                std::process::exit(1);
            }
        },
        Command::Stats => {
            let posts = state.store.scheduled_posts_between(0, i64::MAX).await?;
            let now = Utc::now().timestamp();

            let scheduled = posts
                .iter()
                .filter(|p| p.status == PostStatus::Scheduled)
                .count();
            let overdue = posts
                .iter()
                .filter(|p| {
                    p.status == PostStatus::Scheduled
                        && p.scheduled_at.map(|at| at <= now).unwrap_or(false)
                })
                .count();
            let published = posts
                .iter()
                .filter(|p| p.status == PostStatus::Published)
                .count();

            println!("Scheduled posts: {}", scheduled);
            println!("  due now:       {}", overdue);
            println!("Published posts: {}", published);
        }
    }

    Ok(())
}

fn print_post_table(posts: &[Post]) {
    if posts.is_empty() {
        println!("No scheduled posts.");
        return;
    }

    for post in posts {
        let when = post
            .scheduled_at
            .and_then(|at| Utc.timestamp_opt(at, 0).single())
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{}  {:9}  {:9}  {}  {}",
            post.id, post.status, post.platform, when, post.title
        );
    }
}
