use std::{collections::HashMap, time::Duration};

use protocol::{
    message::{
        Ack, ClusterStatusBody, DownloadInitBody, FileInfoBody, ListFilesBody, Reply, Request,
        UploadInitBody,
    },
    wire,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use utilities::logger::{instrument, tracing};
use utilities::result::Result;

/// Control-plane RPC wrapper: fresh connection per request, reply envelope
/// unwrapped into [`Result`].
#[derive(Debug, Clone)]
pub struct NameserverService {
    addr: String,
    io_timeout: Duration,
}

impl NameserverService {
    pub fn new(addr: impl Into<String>, io_timeout: Duration) -> Self {
        NameserverService {
            addr: addr.into(),
            io_timeout,
        }
    }

    async fn call<T: Serialize + DeserializeOwned>(&self, request: &Request) -> Result<T> {
        let mut stream = wire::connect(&self.addr, self.io_timeout).await?;
        wire::send_message(&mut stream, request, self.io_timeout).await?;
        let reply: Reply<T> = wire::read_message(&mut stream, self.io_timeout).await?;
        reply.into_result()
    }

    #[instrument(skip(self))]
    pub async fn upload_init(&self, filename: &str, filesize: u64) -> Result<UploadInitBody> {
        self.call(&Request::UploadInit {
            filename: filename.to_owned(),
            filesize,
        })
        .await
    }

    #[instrument(skip(self, chunks))]
    pub async fn upload_complete(
        &self,
        filename: &str,
        filesize: u64,
        chunks: HashMap<String, Vec<String>>,
    ) -> Result<Ack> {
        self.call(&Request::UploadComplete {
            filename: filename.to_owned(),
            filesize,
            chunks,
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn download_init(&self, filename: &str) -> Result<DownloadInitBody> {
        self.call(&Request::DownloadInit {
            filename: filename.to_owned(),
        })
        .await
    }

    pub async fn list_files(&self) -> Result<ListFilesBody> {
        self.call(&Request::ListFiles).await
    }

    pub async fn delete_file(&self, filename: &str) -> Result<Ack> {
        self.call(&Request::DeleteFile {
            filename: filename.to_owned(),
        })
        .await
    }

    pub async fn file_info(&self, filename: &str) -> Result<FileInfoBody> {
        self.call(&Request::FileInfo {
            filename: filename.to_owned(),
        })
        .await
    }

    pub async fn cluster_status(&self) -> Result<ClusterStatusBody> {
        self.call(&Request::ClusterStatus).await
    }
}
