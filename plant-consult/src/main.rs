mod chat;

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use consultation_flow::{
    AuthStatus, ClientConfig, FileAuthStore, HttpApiClient,
    auth::{self, AuthStore},
    client::Registration,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Terminal client for the medicinal-plant recommendation service
#[derive(Parser)]
#[command(name = "plant-consult", version)]
struct Cli {
    /// Base URL of the recommendation service
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the session
    Login {
        /// Username or email
        identifier: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Show the logged-in user and role
    Whoami,
    /// Start a guided consultation
    Chat,
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    dni: String,
    #[arg(long)]
    phone_number: String,
    #[arg(long)]
    age: u32,
    #[arg(long)]
    gender: String,
    /// Kilograms
    #[arg(long)]
    weight: f64,
    /// Meters
    #[arg(long)]
    height: f64,
    #[arg(long)]
    zone: String,
    #[arg(long)]
    occupation: Option<String>,
}

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "plant_consult=info,consultation_flow=info".into());

    // stderr keeps the conversation on stdout readable
    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = ClientConfig::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    info!(base_url = %config.base_url, "Using recommendation service");

    let store: Arc<dyn AuthStore> = Arc::new(FileAuthStore::new(config.auth_file.clone()));
    let client = HttpApiClient::new(config)?;

    match cli.command {
        Command::Login {
            identifier,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_line("Contraseña: ").await?,
            };
            let session = auth::login(store.as_ref(), &client, &identifier, &password).await?;
            println!("Sesión iniciada como {}", session.user.username);
        }
        Command::Register(args) => {
            let password = match args.password {
                Some(p) => p,
                None => prompt_line("Contraseña: ").await?,
            };
            let registration = Registration {
                full_name: args.full_name,
                email: args.email,
                username: args.username,
                password,
                dni: args.dni,
                phone_number: args.phone_number,
                age: args.age,
                gender: args.gender,
                weight: args.weight,
                height: args.height,
                zone: args.zone,
                occupation: args.occupation,
            };
            let reply = client.register(&registration).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Logout => {
            auth::logout(store.as_ref()).await?;
            println!("Sesión cerrada");
        }
        Command::Whoami => match auth::resolve_auth(store.as_ref(), &client).await? {
            AuthStatus::Authenticated(session) => println!(
                "{} ({})",
                session.user.username,
                session.user.role.as_deref().unwrap_or("rol sin verificar")
            ),
            AuthStatus::Anonymous => println!("No hay una sesión iniciada"),
        },
        Command::Chat => {
            let AuthStatus::Authenticated(session) =
                auth::resolve_auth(store.as_ref(), &client).await?
            else {
                bail!("No hay una sesión iniciada. Usa `plant-consult login` primero.");
            };
            chat::run(client.with_token(&session.token), store, session).await?;
        }
    }

    Ok(())
}

async fn prompt_line(prompt: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
