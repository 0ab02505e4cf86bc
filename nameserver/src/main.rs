use std::{error::Error, sync::Arc};

use nameserver::{
    config::CONFIG,
    handler::{HandlerSettings, RequestHandler},
    maintainer::{MaintainerSettings, StateMaintainer},
    server::NameServer,
    state::NameServerState,
};
use utilities::logger::{LogSettings, info, init_logger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _guard = init_logger(LogSettings::with_file_dir(
        "NameServer",
        &CONFIG.port.to_string(),
        &CONFIG.log_dir,
    ));
    info!(
        host = %CONFIG.host,
        port = %CONFIG.port,
        chunk_size = %CONFIG.chunk_size,
        replication_factor = %CONFIG.replication_factor,
        "Starting the name server"
    );

    let state = Arc::new(NameServerState::new());
    let _shutdown =
        StateMaintainer::new(state.clone(), MaintainerSettings::from(&*CONFIG)).start();

    let handler = Arc::new(RequestHandler::new(
        state,
        HandlerSettings::from(&*CONFIG),
    ));
    let server = NameServer::bind(&format!("{}:{}", CONFIG.host, CONFIG.port), handler).await?;
    server.serve().await?;
    Ok(())
}
