use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shopfront::{
    QueryTranslator, StoreFacade, Value, bootstrap::seed_admin, build_router, config::AppConfig,
    web::AppState,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shopfront", version, about = "Storefront backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the schema and seed the admin account
    Init,
    /// Run a literal statement against the configured store and print JSON
    Query {
        sql: String,
        params: Vec<String>,
    },
    /// Print the typed plan a literal statement translates to
    Translate {
        sql: String,
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Init => {
            let config = load_config()?;
            let store = open_store(&config).await?;
            seed_configured_admin(&store, &config).await
        }
        Command::Query { sql, params } => {
            let config = load_config()?;
            let store = open_store(&config).await?;
            run_query(&store, &sql, &literals(&params)).await
        }
        Command::Translate { sql, params } => {
            let statement = QueryTranslator::new()
                .translate(&sql, &literals(&params))
                .context("failed to translate statement")?;
            println!("{statement}");
            println!("{statement:#?}");
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    seed_configured_admin(&store, &config).await?;

    let app = build_router(AppState::from_config(store, &config));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, env = ?config.env, "shopfront started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    AppConfig::from_env().context("failed to load application configuration")
}

async fn open_store(config: &AppConfig) -> Result<StoreFacade> {
    let store = StoreFacade::open(&config.store)
        .await
        .with_context(|| format!("failed to open store at {}", config.store.redacted_url()))?;
    store.init().await.context("failed to initialize schema")?;
    Ok(store)
}

async fn seed_configured_admin(store: &StoreFacade, config: &AppConfig) -> Result<()> {
    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => {
            seed_admin(store, email, password, config.bcrypt_cost)
                .await
                .context("failed to seed admin account")?;
        }
        (Some(_), None) | (None, Some(_)) => {
            bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together")
        }
        (None, None) => warn!("no admin account configured"),
    }
    Ok(())
}

async fn run_query(store: &StoreFacade, sql: &str, params: &[Value]) -> Result<()> {
    let is_select = sql.trim_start().get(..6).is_some_and(|verb| verb.eq_ignore_ascii_case("select"));

    let output = if is_select {
        let records = store.get_many(sql, params).await.context("query failed")?;
        serde_json::to_string_pretty(&records)?
    } else {
        let result = store.run(sql, params).await.context("statement failed")?;
        serde_json::to_string_pretty(&serde_json::json!({
            "last_id": result.last_id,
            "changes": result.changes,
        }))?
    };
    println!("{output}");
    Ok(())
}

fn literals(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|param| Value::parse_literal(param)).collect()
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shopfront=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
