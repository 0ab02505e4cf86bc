use std::{env, error::Error, time::Duration};

use chunkserver::{
    config::{CONFIG, Config},
    heartbeat::{register_with_backoff, start_heartbeat_loop},
    nameserver_service::NameserverService,
    server::DataServer,
};
use storage::DirStore;
use utilities::logger::{LogSettings, error, info, init_logger};
use utilities::retry_policy::RetryPolicy;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // positional overrides for running several nodes off one config:
    // chunkserver [node_id] [port] [nameserver_addr]
    let args: Vec<String> = env::args().collect();
    let mut config: Config = CONFIG.clone();
    if let Some(node_id) = args.get(1) {
        config.node_id = node_id.clone();
    }
    if let Some(port) = args.get(2) {
        config.port = port.parse()?;
    }
    if let Some(nameserver_addr) = args.get(3) {
        config.nameserver_addr = nameserver_addr.clone();
    }

    let _guard = init_logger(LogSettings::with_file_dir(
        "ChunkServer",
        &config.node_id,
        &config.log_dir,
    ));
    let io_timeout = Duration::from_secs(config.io_timeout_secs);
    info!(
        node_id = %config.node_id,
        port = %config.port,
        nameserver = %config.nameserver_addr,
        storage = %config.storage_dir(),
        "Starting the chunk server"
    );

    let store = DirStore::open(config.storage_dir()).await?;
    let nameserver = NameserverService::new(config.nameserver_addr.clone(), io_timeout);
    let register_policy = RetryPolicy::new(
        config.register_max_attempts,
        Duration::from_millis(config.register_backoff_ms),
    );
    if let Err(e) = register_with_backoff(
        &nameserver,
        &config.node_id,
        &config.host,
        config.port,
        &register_policy,
    )
    .await
    {
        error!(error = %e, "Could not register with the name server, shutting down");
        std::process::exit(1);
    }
    info!("Registered with the name server");

    start_heartbeat_loop(
        nameserver,
        store.clone(),
        config.node_id.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
    );

    let server = DataServer::bind(
        &format!("{}:{}", config.host, config.port),
        store,
        io_timeout,
    )
    .await?;
    server.serve().await?;
    Ok(())
}
