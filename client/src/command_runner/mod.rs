mod admin_handler;
mod download_handler;
mod upload_handler;

use std::{path::Path, time::Duration};

use utilities::result::Result;

use crate::{chunkserver_service::ChunkserverService, nameserver_service::NameserverService};
use admin_handler::AdminHandler;
use download_handler::DownloadHandler;
use upload_handler::UploadHandler;

/// One instance per invocation; every method is a complete client operation
/// returning the message to print.
pub struct CommandRunner {
    upload_handler: UploadHandler,
    download_handler: DownloadHandler,
    admin_handler: AdminHandler,
}

impl CommandRunner {
    pub fn new(nameserver_addr: &str, io_timeout: Duration) -> Self {
        let nameserver = NameserverService::new(nameserver_addr, io_timeout);
        let chunkserver = ChunkserverService::new(io_timeout);
        CommandRunner {
            upload_handler: UploadHandler::new(nameserver.clone(), chunkserver.clone()),
            download_handler: DownloadHandler::new(nameserver.clone(), chunkserver),
            admin_handler: AdminHandler::new(nameserver),
        }
    }

    pub async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<String> {
        self.upload_handler.upload(local_path, remote_name).await
    }

    pub async fn download(&self, remote_name: &str, local_path: &Path) -> Result<String> {
        self.download_handler.download(remote_name, local_path).await
    }

    pub async fn list(&self) -> Result<String> {
        self.admin_handler.list_files().await
    }

    pub async fn delete(&self, remote_name: &str) -> Result<String> {
        self.admin_handler.delete_file(remote_name).await
    }

    pub async fn info(&self, remote_name: &str) -> Result<String> {
        self.admin_handler.file_info(remote_name).await
    }

    pub async fn status(&self) -> Result<String> {
        self.admin_handler.cluster_status().await
    }
}
