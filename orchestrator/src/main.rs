use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use warp::Filter;

use orchestrator::{api, config, error, metrics, middleware, Pipeline};

/// Plan, execute and verify a task with three cooperating model agents
#[derive(Parser)]
#[command(name = "pev")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one task and print the final answer (the default)
    Run {
        /// Task text; read from stdin when omitted
        #[arg(long)]
        task: Option<String>,
    },
    /// Serve the pipeline over HTTP
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing; stdout is reserved for the answer
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .json()
        .init();

    info!(model = %config.gemini_model, "Configuration loaded");
    let pipeline = Arc::new(Pipeline::from_config(&config)?);

    match cli.command.unwrap_or(Command::Run { task: None }) {
        Command::Run { task } => run_once(&pipeline, task).await,
        Command::Serve { port } => {
            serve(pipeline, port.unwrap_or(config.port)).await;
            Ok(())
        }
    }
}

async fn run_once(pipeline: &Pipeline, task: Option<String>) -> anyhow::Result<()> {
    let task = match task {
        Some(task) => task,
        None => prompt_for_task()?,
    };
    if task.trim().is_empty() {
        bail!("no task given");
    }

    let state = pipeline.run(&task).await?;

    println!("\nFinal Answer:\n");
    println!("{}", state.final_output.unwrap_or_default());
    Ok(())
}

fn prompt_for_task() -> anyhow::Result<String> {
    print!("Enter your task: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read task from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn serve(pipeline: Arc<Pipeline>, port: u16) {
    let api_routes = api::routes(pipeline)
        .with(middleware::access_log())
        .with(middleware::cors());

    // Health check route
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    // Metrics route
    let metrics = warp::path("metrics").and(warp::get()).map(|| {
        let (buffer, content_type) = metrics::render();
        warp::reply::with_header(buffer, "Content-Type", content_type)
    });

    let routes = health
        .or(metrics)
        .or(api_routes)
        .recover(error::handle_rejection);

    let addr = ([0, 0, 0, 0], port);
    info!("Server listening on {}", addr.1);

    warp::serve(routes).run(addr).await;
}
