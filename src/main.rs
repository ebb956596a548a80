use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use yatube::auth::{accounts, session};
use yatube::config::{Cli, Command, Config, GroupCommand, UserCommand};
use yatube::db;
use yatube::posts::groups;
use yatube::routes;
use yatube::state::{AppState, DbPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    if let Some(command) = cli.command {
        return run_command(&pool, command);
    }

    let purged = session::purge_expired(&*pool.get()?)?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = routes::app(AppState::new(pool, config));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Administrative commands run against the database and exit.
fn run_command(pool: &DbPool, command: Command) -> anyhow::Result<()> {
    let conn = pool.get()?;
    match command {
        Command::Group(GroupCommand::Create {
            slug,
            title,
            description,
        }) => {
            let group = groups::create(&conn, &slug, &title, description.as_deref())
                .map_err(describe)?;
            println!("Created group {} ({})", group.title, group.slug);
        }
        Command::Group(GroupCommand::Delete { slug }) => {
            groups::delete(&conn, &slug).map_err(describe)?;
            println!("Deleted group {}", slug);
        }
        Command::User(UserCommand::Delete { username }) => {
            accounts::delete_user(&conn, &username).map_err(describe)?;
            println!("Deleted user {}", username);
        }
        Command::User(UserCommand::Promote { username }) => {
            accounts::promote(&conn, &username).map_err(describe)?;
            println!("{} is now an admin", username);
        }
    }
    Ok(())
}

/// Spell out field messages so the operator sees what was wrong with the input.
fn describe(err: yatube::error::AppError) -> anyhow::Error {
    match err.field_errors() {
        [] => anyhow::Error::new(err),
        fields => anyhow::anyhow!(
            "{}",
            fields
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}
