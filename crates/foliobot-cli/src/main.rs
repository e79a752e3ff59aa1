use anyhow::Result;
use clap::{Parser, Subcommand};
use foliobot_agents::ClientMeta;
use foliobot_common::SessionId;
use foliobot_config::{AppConfig, ConfigLoader};
use foliobot_gateway::{GatewayServer, build_chatbot};
use foliobot_security::InputValidator;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "foliobot",
    version,
    about = "FolioBot - portfolio chatbot with retrieval-augmented answers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); defaults to the config value or info
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Embed and store the built-in knowledge facts
    Seed,

    /// Answer one message and print the result as JSON
    Ask {
        message: String,

        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
    },

    /// Query a running gateway for its status
    Status,

    /// Create the config and data directories
    Init,
}

fn init_tracing(cli_level: Option<&str>, config: &AppConfig) {
    let level = cli_level
        .or(config.log_level.as_deref())
        .unwrap_or("info")
        .to_string();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let config_loader = ConfigLoader::new()?;
    let config = config_loader.load()?;
    init_tracing(cli.log_level.as_deref(), &config);

    match cli.command {
        Commands::Start { host, port } => {
            config_loader.ensure_dirs()?;
            let mut config = config;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }

            let data_dir = config_loader.data_dir(&config);
            info!("starting gateway with data dir {}", data_dir.display());
            let chatbot = build_chatbot(&config, &data_dir)?;
            GatewayServer::new(config, chatbot).run().await?;
        }
        Commands::Seed => {
            let chatbot = build_chatbot(&config, &config_loader.data_dir(&config))?;
            let inserted = chatbot.seed_knowledge().await?;
            let total = chatbot.status(false).await.knowledge_items.unwrap_or_default();
            info!(inserted, total, "knowledge seeding finished");
            println!("Seeded {inserted} new facts ({total} total).");
        }
        Commands::Ask { message, session } => {
            let chatbot = build_chatbot(&config, &config_loader.data_dir(&config))?;
            let message =
                InputValidator::validate_message(&message, config.gateway.max_message_len)?;
            let session = session.map(SessionId::from_str);
            let answer = chatbot
                .answer(&message, session.as_ref(), &ClientMeta::default())
                .await;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        Commands::Status => {
            let url = format!(
                "http://{}:{}/api/status",
                config.gateway.host, config.gateway.port
            );
            let resp = reqwest::get(&url).await.map_err(|_| {
                anyhow::anyhow!(
                    "Gateway is not running at {}:{}",
                    config.gateway.host,
                    config.gateway.port
                )
            })?;

            let body = resp.json::<serde_json::Value>().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Init => {
            config_loader.ensure_dirs()?;
            info!(
                "initialized config directory {}",
                config_loader.config_dir().display()
            );
            println!("FolioBot setup");
            println!("Config directory: {}", config_loader.config_dir().display());
            println!("Data directory: {}", config_loader.data_dir(&config).display());
            if !config_loader.config_file_exists() {
                println!("No config.yml yet. Defaults apply; set GEMINI_API_KEY to get started.");
            }
        }
    }

    Ok(())
}
