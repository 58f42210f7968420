use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use irdata::app::{output_path, App};
use irdata::auth::jwt;
use irdata::config::loader::file_to_config;
use irdata::utils::logging::{self, LogLevel};
use irdata::worker::WorkerPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "IRDATA_CONFIG", default_value = "irdata.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in (persisting the token when an auth file is configured) and show token expiry
    Login,
    /// Fetch data API resources, e.g. /data/member/info
    Get {
        /// Concurrent requests; defaults to api.workers from the config
        #[arg(short, long)]
        workers: Option<usize>,
        /// Write each response to DIR/<uri>.json instead of stdout
        #[arg(short, long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[arg(required = true)]
        uris: Vec<String>,
    },
}

enum Fetched {
    Written(PathBuf),
    Body(Vec<u8>),
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let config = file_to_config(args.config.as_ref()).await?;
    logging::init_logging(&logging::resolve(Some(&config), args.log_level));

    // -------------------------------
    // 2. Ctrl-C cancels everything below
    // -------------------------------

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    // -------------------------------
    // 3. Login and build the client
    // -------------------------------

    let app = App::init(&config, &cancel).await.context("failed to initialise")?;

    let outcome = match args.command {
        Command::Login => {
            report_expiry(&app);
            Ok(())
        }
        Command::Get { workers, out_dir, uris } => {
            fetch_all(&app, workers.unwrap_or(app.workers()), out_dir, uris, &cancel).await
        }
    };

    app.shutdown().await;
    outcome
}

fn report_expiry(app: &App) {
    let Some(token) = app.tokens.token() else {
        return;
    };
    let show = |t: &str| {
        jwt::expires_at(t)
            .map(|exp| exp.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_owned())
    };
    println!("access token expires:  {}", show(&token.access_token));
    println!("refresh token expires: {}", show(&token.refresh_token));
}

async fn fetch_all(
    app: &App,
    workers: usize,
    out_dir: Option<PathBuf>,
    uris: Vec<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    if let Some(dir) = &out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let total = uris.len();
    let failures = Arc::new(AtomicUsize::new(0));
    let client = app.client.clone();

    let task = move |uri: String| {
        let client = client.clone();
        let out_dir = out_dir.clone();
        async move {
            let body = client.get(&uri).await?;
            match out_dir {
                Some(dir) => {
                    let path = output_path(&dir, &uri);
                    tokio::fs::write(&path, &body)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    Ok::<_, anyhow::Error>(Fetched::Written(path))
                }
                None => Ok(Fetched::Body(body)),
            }
        }
    };

    let names = uris.clone();
    let failed = failures.clone();
    let mut pool = WorkerPool::builder(task)
        .workers(workers)
        .cancellation(cancel)
        .on_result(move |index, outcome| {
            let uri = &names[index];
            match outcome {
                Ok(Fetched::Written(path)) => info!(uri = %uri, path = %path.display(), "saved"),
                Ok(Fetched::Body(body)) => {
                    let mut stdout = std::io::stdout().lock();
                    if let Err(e) = stdout.write_all(&body).and_then(|_| stdout.write_all(b"\n")) {
                        error!(uri = %uri, error = %e, "failed to write response");
                        failed.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Err(e) => {
                    error!(uri = %uri, error = %format!("{e:#}"), "request failed");
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .build()?;

    let reported = pool.process(uris).await;
    let failures = failures.load(Ordering::SeqCst) + (total - reported);
    if failures > 0 {
        bail!("{failures} of {total} requests failed");
    }
    Ok(())
}
