use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use oj_runner::config::{CliArgs, Config};
use oj_runner::queue::JobQueue;
use oj_runner::sandbox::Engine;
use oj_runner::web_server::build_server;
use oj_runner::worker::worker;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let n_threads = cli.threads;

    if n_threads == 0 {
        bail!("The number of worker threads must not be 0");
    }

    let Config {
        server: server_config,
        engine: engine_config,
    } = cli.to_config().context("Failed to load configuration")?;

    let engine = Arc::new(Engine::new(engine_config).context("Failed to initialize engine")?);

    for (language, probe) in engine.probe_toolchains().await {
        match probe {
            Ok(()) => log::info!("Toolchain for {language} is available"),
            Err(e) => log::warn!("Toolchain for {language} is unavailable: {e}"),
        }
    }

    let job_queue = Arc::new(JobQueue::new());
    let shutdown_token = CancellationToken::new();

    // ======= PREPARATION END, EXECUTION START =======

    let mut workers = JoinSet::new();
    for i in 1..=n_threads {
        workers.spawn(worker(
            i,
            engine.clone(),
            job_queue.clone(),
            shutdown_token.clone(),
        ));
    }

    let server = build_server(server_config, job_queue).context("Failed to build server")?;

    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    // ===== EXECUTION END, WAITING FOR SHUTDOWN ======

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
        Some(res_worker) = workers.join_next() => {
            log::error!("A worker terminated unexpectedly: {:?}", res_worker);
        }
    }

    // 1. Shutdown actix-web server gracefully
    server_handle.stop(true).await;

    // 2. Broadcast shutdown signal to workers
    shutdown_token.cancel();
    log::info!("Shutdown signal sent to workers, waiting for them to finish...");

    // 3. Wait until every worker terminates
    while let Some(res) = workers.join_next().await {
        match res {
            Ok(Err(e)) => log::error!("Worker finished with error: {e:?}"),
            Err(e) if e.is_panic() => log::error!("Worker handle panicked: {e:?}"),
            Err(e) => log::error!("Worker handle finished with error: {e:?}"),
            Ok(Ok(())) => {}
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}
