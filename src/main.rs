use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use rssagg::db::{NewUser, UserRepository};
use rssagg::feed::{AddFeedRequest, FeedService, DEFAULT_POST_LIMIT};
use rssagg::{Config, Database, IngestScheduler};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the ingestion scheduler until interrupted
    Run,
    /// Run a single ingestion pass and wait for it to finish
    IngestOnce,
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage feeds
    #[command(subcommand)]
    Feed(FeedCommand),
    /// Manage feed follows
    #[command(subcommand)]
    Follow(FollowCommand),
    /// List posts from the feeds a user follows
    Posts {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = DEFAULT_POST_LIMIT)]
        limit: u32,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Create a user
    Add { name: String },
    /// List users
    List,
}

#[derive(Debug, Subcommand)]
enum FeedCommand {
    /// Register a feed; its owner follows it
    Add {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        name: String,
        url: String,
    },
    /// List feeds with their last fetch time
    List,
}

#[derive(Debug, Subcommand)]
enum FollowCommand {
    /// Follow a feed
    Add {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        feed: Uuid,
    },
    /// Stop following a feed
    Remove {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        feed: Uuid,
    },
    /// List a user's follows
    List {
        #[arg(long)]
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config = match Config::load_with_env(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.config.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = rssagg::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        rssagg::logging::init_console_only(&config.logging.level);
    }

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database {}: {e}", config.database.path);
            return ExitCode::FAILURE;
        }
    };

    let result = execute(args.command, &db, &config).await;
    db.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command, db: &Database, config: &Config) -> rssagg::Result<()> {
    let service = FeedService::new(db);

    match command {
        Command::Run => {
            if !config.ingest.enabled {
                warn!("Ingestion is disabled in the configuration");
                return Ok(());
            }
            let handle = IngestScheduler::from_database(db, &config.ingest)?.start();
            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            handle.stop().await;
        }
        Command::IngestOnce => {
            let report = IngestScheduler::from_database(db, &config.ingest)?
                .ingest_once()
                .await?;
            println!(
                "{} feed(s) selected, {} succeeded, {} failed, {} new post(s), {} duplicate(s)",
                report.selected, report.succeeded, report.failed, report.inserted, report.duplicates
            );
        }
        Command::User(UserCommand::Add { name }) => {
            let user = UserRepository::new(db.pool())
                .create(&NewUser::new(name))
                .await?;
            println!("{}\t{}", user.id, user.name);
        }
        Command::User(UserCommand::List) => {
            for user in UserRepository::new(db.pool()).list_all().await? {
                println!("{}\t{}", user.id, user.name);
            }
        }
        Command::Feed(FeedCommand::Add { user, name, url }) => {
            let (feed, _) = service
                .add_feed(&AddFeedRequest::new(name, url, user))
                .await?;
            println!("{}\t{}\t{}", feed.id, feed.name, feed.url);
        }
        Command::Feed(FeedCommand::List) => {
            for feed in service.list_feeds().await? {
                let fetched = feed
                    .last_fetched_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}\t{}\t{}\t{}", feed.id, feed.name, feed.url, fetched);
            }
        }
        Command::Follow(FollowCommand::Add { user, feed }) => {
            let follow = service.follow(user, feed).await?;
            println!("{}", follow.id);
        }
        Command::Follow(FollowCommand::Remove { user, feed }) => {
            service.unfollow(user, feed).await?;
        }
        Command::Follow(FollowCommand::List { user }) => {
            for follow in service.list_follows(user).await? {
                println!("{}\t{}", follow.id, follow.feed_id);
            }
        }
        Command::Posts { user, limit } => {
            for post in service.posts_for_user(user, limit).await? {
                let published = post
                    .published_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}\t{}\t{}", published, post.title, post.url);
            }
        }
    }

    Ok(())
}
