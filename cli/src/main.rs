mod commands;
mod config;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_add, cmd_delete, cmd_goals_set, cmd_goals_show, cmd_history, cmd_repeat, cmd_show,
    cmd_watch,
};
use crate::config::Config;
use macrolog_core::context::ClientContext;
use macrolog_core::identity::{AnonymousIdentity, IdentityProvider, TokenIdentity};
use macrolog_core::local::LocalGateway;

const MAX_HISTORY_DAYS: i64 = 3660;

#[derive(Parser)]
#[command(
    name = "macrolog",
    version,
    about = "Track what you eat in protein, fat, carbs and calories"
)]
struct Cli {
    /// Sign in with this token instead of the local anonymous identity
    #[arg(long, global = true, env = "MACROLOG_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a food entry from its per-100g macros
    Add {
        /// Food name
        name: String,
        /// Weight eaten (e.g. "150" or "150g")
        weight: String,
        /// Protein per 100g
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Fat per 100g
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Carbs per 100g
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day's entries and progress against goals (defaults to today)
    Show {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals for the last N days
    History {
        /// Number of days to show (1 to 3660)
        #[arg(
            short,
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=MAX_HISTORY_DAYS)
        )]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food entry by ID
    Delete {
        /// Entry ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log an earlier entry again, dated today
    Repeat {
        /// Date the entry was logged on
        date: String,
        /// Entry ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage daily macro goals
    Goals {
        #[command(subcommand)]
        command: GoalsCommands,
    },
    /// Follow a day live, reprinting whenever it changes
    Watch {
        /// Date to follow (default: today)
        date: Option<String>,
        /// Output one JSON snapshot per line
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum GoalsCommands {
    /// Show the current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change one or more macro goals (grams per day)
    Set {
        #[arg(long)]
        protein: Option<f64>,
        #[arg(long)]
        fat: Option<f64>,
        #[arg(long)]
        carbs: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("macrolog=info,macrolog_core=info,tower_http=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let gateway = Arc::new(
        LocalGateway::open(&config.db_path)
            .with_context(|| format!("Failed to open {}", config.db_path.display()))?,
    );

    let identity: Box<dyn IdentityProvider> = match cli.token {
        Some(token) => Box::new(TokenIdentity::new(token)),
        None => Box::new(AnonymousIdentity::new(&config.identity_path)),
    };
    let ctx = ClientContext::connect(identity.as_ref(), gateway.clone()).await?;

    match cli.command {
        Commands::Add {
            name,
            weight,
            protein,
            fat,
            carbs,
            date,
            json,
        } => cmd_add(&ctx, &name, &weight, protein, fat, carbs, date, json).await,
        Commands::Show { date, json } => cmd_show(&ctx, date, json).await,
        Commands::History { days, json } => cmd_history(&ctx, days, json).await,
        Commands::Delete { id, json } => cmd_delete(&ctx, &id, json).await,
        Commands::Repeat { date, id, json } => cmd_repeat(&ctx, &date, &id, json).await,
        Commands::Goals { command } => match command {
            GoalsCommands::Show { json } => cmd_goals_show(&ctx, json).await,
            GoalsCommands::Set {
                protein,
                fat,
                carbs,
                json,
            } => cmd_goals_set(&ctx, protein, fat, carbs, json).await,
        },
        Commands::Watch { date, json } => {
            let _watcher = gateway.watch_external_changes(config.poll_interval);
            cmd_watch(&ctx, date, json).await
        }
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                if new {
                    eprintln!("Generated new API key: {key}");
                    eprintln!("Include in requests: Authorization: Bearer {key}");
                }
                Some(key)
            };
            let _watcher = gateway.watch_external_changes(config.poll_interval);
            server::start_server(ctx, port, &bind, api_key).await
        }
    }
}
