// ABOUTME: Command-line entry point for QuickChat account and AI agent commands
// ABOUTME: Parses arguments, initializes logging and config, then dispatches to App

use anyhow::Result;
use clap::{Parser, Subcommand};
use quickchat::{config::Config, logging, App};
use quickchat_gateway::Ack;

#[derive(Parser)]
#[command(name = "quickchat", about = "QuickChat account and AI agent controls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in as an existing user.
    Login { user_id: String },
    /// Register a new user and log in.
    Register {
        user_id: String,
        /// Display name (defaults to the user id).
        #[arg(long)]
        name: Option<String>,
    },
    /// Forget the stored credentials.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// List the AI characters offered by the backend.
    Characters,
    /// Add or remove the AI agent in a channel.
    Agent {
        #[command(subcommand)]
        action: AgentCommand,
    },
    /// Start a conversation between two AI characters.
    Converse {
        channel: String,
        first: String,
        second: String,
        /// Upper bound on AI-to-AI turns (overrides config).
        #[arg(long)]
        max_turns: Option<u32>,
    },
}

#[derive(Subcommand)]
enum AgentCommand {
    Start {
        channel: String,
        #[arg(long)]
        character: Option<String>,
    },
    Stop {
        channel: String,
    },
}

fn print_ack(ack: &Ack) -> Result<()> {
    match ack {
        serde_json::Value::Null => println!("OK"),
        serde_json::Value::String(message) => println!("{}", message),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.log_level, cli.json_logs)?;

    let config = Config::load()?;
    tracing::debug!(
        backend = %config.backend.url,
        agent_prefix = %config.presence.agent_prefix,
        "Configuration loaded"
    );
    let app = App::from_config(&config)?;

    match cli.command {
        Commands::Login { user_id } => {
            let credentials = app.login(&user_id).await?;
            println!("Logged in as {}", credentials.user_id);
        }
        Commands::Register { user_id, name } => {
            let credentials = app.register(&user_id, name.as_deref()).await?;
            println!("Registered and logged in as {}", credentials.user_id);
        }
        Commands::Logout => {
            if app.logout()? {
                println!("Logged out");
            } else {
                println!("Not logged in");
            }
        }
        Commands::Whoami => match app.whoami() {
            Some(user_id) => println!("{}", user_id),
            None => println!("Not logged in"),
        },
        Commands::Characters => {
            for character in app.characters().await? {
                if character.personality.is_empty() {
                    println!("{}\t{}", character.id, character.name);
                } else {
                    println!(
                        "{}\t{}\t{}",
                        character.id, character.name, character.personality
                    );
                }
            }
        }
        Commands::Agent { action } => {
            let ack = match action {
                AgentCommand::Start { channel, character } => {
                    app.start_agent(&channel, character.as_deref()).await?
                }
                AgentCommand::Stop { channel } => app.stop_agent(&channel).await?,
            };
            print_ack(&ack)?;
        }
        Commands::Converse {
            channel,
            first,
            second,
            max_turns,
        } => {
            let ack = app.converse(&channel, &first, &second, max_turns).await?;
            print_ack(&ack)?;
        }
    }

    Ok(())
}
