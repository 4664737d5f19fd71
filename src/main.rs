use tracing_subscriber::EnvFilter;
use users_cluster::cluster::{Role, primary, worker};
use users_cluster::config::Config;
use users_cluster::server;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr: a worker's stdout carries its store channel.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let role = Role::detect(config.cluster)?;
    tracing::debug!("Starting as {} with {:?}", role, config);

    match role {
        Role::Single => server::run_single(&config).await,
        Role::Primary => primary::run(&config).await,
        Role::Worker(ordinal) => {
            // stdin is read on a blocking thread that would hold the runtime open, so a
            // failed worker exits explicitly.
            if let Err(e) = worker::run(&config, ordinal).await {
                tracing::error!("Worker {} failed: {:#}", ordinal, e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
