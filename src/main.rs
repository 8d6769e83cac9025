use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exercise_screens::checkpoint::CheckpointStore;
use exercise_screens::classify::ClassifierRules;
use exercise_screens::config::Config;
use exercise_screens::pipeline::{
    ArtifactPipeline, MagickTransformer, PipelineConfig, RasterizeRenderer, S3Publisher,
};
use exercise_screens::repo::Mirror;
use exercise_screens::server::{AppState, build_router};
use exercise_screens::types::CommitRange;
use exercise_screens::worker::{ScreenshotWorker, job_queue};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exercise_screens=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    if let Err(e) = run(config).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mirror = Mirror::new(config.git_url(), config.mirror_dir(), &config.default_branch);
    let checkpoint = CheckpointStore::new(&config.work_dir);

    let pipeline = Arc::new(ArtifactPipeline::new(
        PipelineConfig {
            output_dir: config.output_dir(),
            base_url: config.exercise_file_base_url(),
            thumbnail_dimension: config.thumbnail_dimension,
        },
        RasterizeRenderer::new(
            &config.render_command,
            &config.rasterize_script,
            config.render_timeout(),
        ),
        MagickTransformer::new(&config.convert_command, config.thumbnail_dimension),
        S3Publisher::new(&config.aws_command, &config.s3_bucket),
    ));

    let (jobs, queue) = job_queue();
    let shutdown = CancellationToken::new();

    let worker = ScreenshotWorker::new(
        mirror,
        ClassifierRules::default(),
        checkpoint.clone(),
        Arc::clone(&pipeline),
        config.pipeline_concurrency,
    );
    let worker_handle = tokio::spawn(worker.run(queue, shutdown.clone()));

    // Backfill from the last checkpoint through the current head before
    // accepting new hooks; a first run starts at the earliest commit.
    let last_processed = checkpoint.load()?;
    match &last_processed {
        Some(commit) => info!(checkpoint = %commit, "Resuming from checkpoint"),
        None => info!("No checkpoint found, backfilling from the beginning"),
    }
    jobs.enqueue(CommitRange::backfill(last_processed));

    let app_state = AppState::new(
        jobs,
        &config.repo_url,
        config.hook_allowlist.clone(),
        config.webhook_secret_bytes(),
        config.mirror_dir(),
    );
    let app = build_router(app_state);

    let addr = config.listen_addr();
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    // The worker failing is fatal: the mirror or checkpoint is in an
    // unknown state and further automated progress is unsafe.
    tokio::select! {
        result = server => {
            info!("Server stopped");
            shutdown.cancel();
            result?;
        }
        joined = worker_handle => {
            shutdown.cancel();
            match joined {
                Ok(Ok(())) => info!("Worker stopped"),
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install ctrl-c handler");
    }
}
