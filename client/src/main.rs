use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use client::command_runner::CommandRunner;
use utilities::logger::{LogSettings, init_logger};

#[derive(Parser)]
#[command(name = "dfs-client", about = "Client for the distributed file system")]
struct Cli {
    /// Name server control-plane address.
    #[arg(long, default_value = "127.0.0.1:8000")]
    nameserver: String,

    /// Per-socket-operation timeout.
    #[arg(long, default_value_t = 10)]
    io_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a local file.
    Upload {
        local_path: PathBuf,
        /// Remote name; defaults to the local file name.
        #[arg(long)]
        remote: Option<String>,
    },
    /// Download a file.
    Download {
        remote_name: String,
        /// Local destination; defaults to the remote name.
        #[arg(long)]
        local: Option<PathBuf>,
    },
    /// List stored files.
    List,
    /// Delete a file.
    Delete { remote_name: String },
    /// Show a file's chunk layout.
    Info { remote_name: String },
    /// Show chunk servers and cluster totals.
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _guard = init_logger(LogSettings::stdout_only("Client", "client"));
    let runner = CommandRunner::new(&cli.nameserver, Duration::from_secs(cli.io_timeout_secs));

    let outcome = match cli.command {
        Command::Upload { local_path, remote } => {
            let remote_name = remote.unwrap_or_else(|| {
                local_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            runner.upload(&local_path, &remote_name).await
        }
        Command::Download { remote_name, local } => {
            let local_path = local.unwrap_or_else(|| PathBuf::from(&remote_name));
            runner.download(&remote_name, &local_path).await
        }
        Command::List => runner.list().await,
        Command::Delete { remote_name } => runner.delete(&remote_name).await,
        Command::Info { remote_name } => runner.info(&remote_name).await,
        Command::Status => runner.status().await,
    };

    match outcome {
        Ok(message) => println!("{message}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
