//! reload-server
//!
//! Serves a page and the reload bootstrap script on `--app-port`, runs the
//! reload WebSocket listener on `--port`, and sends `reload` to every open
//! client for each line read from stdin.
//!
//! ```text
//!   browser ──GET /──────────────────▶ app router (script route)
//!   browser ──WebSocket──────────────▶ reload listener
//!   stdin line ──▶ ReloadHandle::reload ──▶ every open channel
//! ```

use std::path::PathBuf;

use axum::{response::Html, routing::get, Router};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

use reload_server::config::load_options;
use reload_server::observability::logging;
use reload_server::{reload, Mode, ReloadOptions};

#[derive(Parser)]
#[command(name = "reload-server")]
#[command(about = "Live-reload WebSocket server driven from stdin", long_about = None)]
struct Cli {
    /// TOML file with reload options.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port of the reload WebSocket listener.
    #[arg(short, long)]
    port: Option<u16>,

    /// Port of the demo page and bootstrap script.
    #[arg(long, default_value_t = 8080)]
    app_port: u16,

    /// Route of the bootstrap script.
    #[arg(short, long)]
    route: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut options = match &cli.config {
        Some(path) => load_options(path)?,
        None => ReloadOptions::default(),
    };
    if let Some(port) = cli.port {
        options.port = Some(port.into());
    }
    if cli.route.is_some() {
        options.route = cli.route.clone();
    }
    if cli.verbose {
        options.verbose = Some(true);
    }

    let mut app: Router = Router::new();
    let handle = reload(Some(&mut app), &options, Mode::Standalone).await?;

    let script_route = handle.config().route_path.clone();
    let page = format!(
        "<!doctype html><html><body><p>Waiting for reload.</p><script src=\"{}\"></script></body></html>",
        script_route
    );
    let app = app.route(
        "/",
        get(move || {
            let page = page.clone();
            async move { Html(page) }
        }),
    );

    let app_listener = TcpListener::bind(("0.0.0.0", cli.app_port)).await?;
    tracing::info!(
        address = %app_listener.local_addr()?,
        script = %script_route,
        reload_port = handle.config().port,
        "Serving page"
    );
    let app_task = tokio::spawn(async move { axum::serve(app_listener, app).await });

    let trigger = handle.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            let delivery = trigger.reload();
            tracing::info!(
                delivered = delivery.delivered,
                dropped = delivery.dropped,
                "Reload sent"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    handle.shutdown().await?;
    app_task.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
