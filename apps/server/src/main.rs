use anyhow::Context;
use clap::{Parser, Subcommand};
use kestrel_chats::StaticId;
use kestrel_config::load as load_config;
use kestrel_database::CreateUserRequest;
use kestrel_gateway::{create_router, events, presenter};
use kestrel_runtime::{shutdown_signal, telemetry, BackendServices};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "kestrel")]
#[command(about = "Kestrel real-time chat backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server (default)
    Serve,
    /// Register a user and print a session token for it
    SeedUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Print every chat a participant belongs to
    DumpChats {
        #[arg(long)]
        static_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedUser {
            username,
            display_name,
        } => seed_user(username, display_name).await,
        Commands::DumpChats { static_id } => dump_chats(static_id).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Kestrel backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let app = create_router(services.gateway_state());

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, environment = %config.environment, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn seed_user(username: String, display_name: Option<String>) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let user = services
        .users
        .create(&CreateUserRequest {
            username,
            display_name,
        })
        .await
        .context("failed to create user")?;

    let ttl = i64::try_from(config.auth.session_ttl_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .context("session lifetime does not fit a duration")?;
    let session = services
        .sessions
        .issue(&user.public_id, ttl)
        .await
        .context("failed to issue session")?;

    println!("username:   {}", user.username);
    println!("static id:  {}", user.public_id);
    println!("token:      {}", session.token);
    println!("expires at: {}", session.expires_at);

    Ok(())
}

async fn dump_chats(static_id: String) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let participant = StaticId::from(static_id);
    let chats = services
        .chats
        .list_chats(&participant)
        .await
        .context("failed to list chats")?;

    if chats.is_empty() {
        println!("No chats found for {participant}");
        return Ok(());
    }

    let data: Vec<Value> = chats.iter().map(presenter::chat_data).collect();
    let dump = presenter::envelope(events::GET_CHATS, Value::Array(data));
    println!(
        "{}",
        serde_json::to_string_pretty(&dump).context("failed to render chats")?
    );

    Ok(())
}
