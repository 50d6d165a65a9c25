use anyhow::Context;
use axum::Router;
use clap::{Args, Parser, Subcommand};
use opentelemetry_otlp::WithExportConfig;
use streamstub_api::app;
use streamstub_common::config::StubConfig;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "streamstub", version, about = "Streaming chat-completion stub for client benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Serve(ServeArgs),
    Version,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Address to bind (overrides STUB_HOST / config file)
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (overrides STUB_PORT / config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let cfg = StubConfig::load()
        .context("loading config")?
        .with_overrides(args.host, args.port);
    let app: Router = app();
    let listener = tokio::net::TcpListener::bind((cfg.host.as_str(), cfg.port))
        .await
        .with_context(|| format!("binding {}:{}", cfg.host, cfg.port))?;
    println!("Server listening on :{}", cfg.port);
    tracing::info!(host = %cfg.host, port = cfg.port, "listening");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving")?;
    Ok(())
}

/// `RUST_LOG` filter (default `info`) over the fmt layer, plus an OTLP span
/// exporter when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // tracing is not up yet, so exporter failures go to stderr
    let otlp = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|endpoint| {
            opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
                .install_simple()
                .map_err(|e| eprintln!("otlp export disabled: {}", e))
                .ok()
        })
        .map(|tracer| OpenTelemetryLayer::new(tracer));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otlp)
        .init();
}
