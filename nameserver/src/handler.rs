use std::{collections::HashMap, sync::Arc, time::Duration};

use protocol::{
    message::{
        Ack, ClusterStatusBody, DownloadInitBody, FileInfoBody, ListFilesBody, NodeMeta, Reply,
        Request, UploadInitBody,
    },
    wire,
};
use serde_json::{Value, to_value};
use tokio::net::TcpStream;
use utilities::logger::{instrument, tracing, warn};
use utilities::result::{DfsError, Result};

use crate::{
    config::Config,
    placement::{NodeSelectionPolicy, SpaceWeightedPolicy},
    state::{FileRecord, NameServerState},
};

/// The handler's slice of the configuration.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub chunk_size: u64,
    pub replication_factor: u32,
    pub liveness_timeout: Duration,
    pub io_timeout: Duration,
}

impl From<&Config> for HandlerSettings {
    fn from(config: &Config) -> Self {
        HandlerSettings {
            chunk_size: config.chunk_size,
            replication_factor: config.replication_factor,
            liveness_timeout: Duration::from_secs(config.liveness_timeout_secs),
            io_timeout: Duration::from_secs(config.io_timeout_secs),
        }
    }
}

/// Serves the control plane: one request per connection, every failure mapped
/// to an error envelope, the socket closed on all paths.
pub struct RequestHandler {
    state: Arc<NameServerState>,
    policy: Box<dyn NodeSelectionPolicy + Send + Sync>,
    settings: HandlerSettings,
}

impl RequestHandler {
    pub fn new(state: Arc<NameServerState>, settings: HandlerSettings) -> Self {
        RequestHandler {
            state,
            policy: Box::new(SpaceWeightedPolicy),
            settings,
        }
    }

    #[instrument(name = "control_connection", skip(self, stream))]
    pub async fn handle_connection(&self, mut stream: TcpStream) {
        let outcome = match wire::read_message::<Request>(&mut stream, self.settings.io_timeout)
            .await
        {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Err(e),
        };
        let reply: Reply<Value> = match outcome {
            Ok(body) => Reply::Success { body },
            Err(e) => {
                warn!(error = %e, "Request failed");
                Reply::failure(&e)
            }
        };
        if let Err(e) = wire::send_message(&mut stream, &reply, self.settings.io_timeout).await {
            warn!(error = %e, "Could not deliver reply");
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Value> {
        match request {
            Request::RegisterDatanode {
                node_id,
                host,
                port,
            } => {
                let newly_registered = self.state.register_node(&node_id, &host, port).await;
                let note = if newly_registered {
                    "chunk server registered"
                } else {
                    "chunk server already registered"
                };
                Ok(to_value(Ack::with_message(note))?)
            }
            Request::Heartbeat {
                node_id,
                available_space,
                total_space,
                chunks,
            } => {
                self.state
                    .record_heartbeat(&node_id, available_space, total_space, chunks)
                    .await?;
                Ok(to_value(Ack::default())?)
            }
            Request::UploadInit { filename, filesize } => {
                Ok(to_value(self.upload_init(&filename, filesize).await?)?)
            }
            Request::UploadComplete {
                filename,
                filesize,
                chunks,
            } => {
                let mut record = FileRecord::new(
                    filename.clone(),
                    filesize,
                    self.settings.chunk_size,
                    self.settings.replication_factor,
                );
                for (index, node_ids) in chunks {
                    let index: u64 = index.parse().map_err(|_| {
                        DfsError::Internal(format!("invalid chunk index: {index}"))
                    })?;
                    for node_id in node_ids {
                        record.add_location(index, &node_id);
                    }
                }
                self.state.install_file(record).await;
                Ok(to_value(Ack::with_message(format!(
                    "File {filename} uploaded successfully"
                )))?)
            }
            Request::DownloadInit { filename } => {
                Ok(to_value(self.download_init(&filename).await?)?)
            }
            Request::ListFiles => Ok(to_value(ListFilesBody {
                files: self.state.list_summaries().await,
            })?),
            Request::DeleteFile { filename } => {
                // replicas are NOT contacted; their blobs stay behind
                self.state.remove_file(&filename).await?;
                Ok(to_value(Ack::with_message(format!(
                    "File {filename} deleted"
                )))?)
            }
            Request::FileInfo { filename } => {
                let record = self
                    .state
                    .get_file(&filename)
                    .await
                    .ok_or_else(|| DfsError::NotFound(filename))?;
                Ok(to_value(FileInfoBody {
                    file: record.detail(),
                })?)
            }
            Request::ClusterStatus => {
                let datanodes = self.state.node_statuses().await;
                let (total_files, total_size) = self.state.file_totals().await;
                Ok(to_value(ClusterStatusBody {
                    datanodes,
                    total_files,
                    total_size,
                })?)
            }
            Request::StoreChunk { .. } | Request::RetrieveChunk { .. }
            | Request::DeleteChunk { .. } => Err(DfsError::Internal(
                "data-plane command sent to the name server".to_owned(),
            )),
        }
    }

    /// Plan an upload: chunk count from the fixed chunk size, one placement
    /// per chunk over a single snapshot of the live fleet. Nothing is
    /// reserved; overlapping assignments to concurrent uploaders are fine
    /// because chunk servers key blobs by chunk identifier.
    async fn upload_init(&self, filename: &str, filesize: u64) -> Result<UploadInitBody> {
        let replication_factor = self.settings.replication_factor as usize;
        let num_chunks = filesize.div_ceil(self.settings.chunk_size);
        let mut chunk_assignments = HashMap::new();
        if num_chunks > 0 {
            let live = self
                .state
                .live_snapshot(self.settings.liveness_timeout)
                .await;
            for index in 0..num_chunks {
                let assigned = self.policy.select(&live, replication_factor);
                if assigned.len() < replication_factor {
                    return Err(DfsError::InsufficientCapacity {
                        needed: replication_factor,
                        found: assigned.len(),
                    });
                }
                chunk_assignments.insert(index, assigned);
            }
        }
        tracing::info!(%filename, %filesize, %num_chunks, "Planned upload");
        Ok(UploadInitBody {
            chunk_size: self.settings.chunk_size,
            num_chunks,
            chunk_assignments,
        })
    }

    /// Resolve a download: each chunk's replica list filtered to live nodes,
    /// in record order. Any chunk left without a live replica fails the call.
    async fn download_init(&self, filename: &str) -> Result<DownloadInitBody> {
        let live = self
            .state
            .live_node_metas(self.settings.liveness_timeout)
            .await;
        let record = self
            .state
            .get_file(filename)
            .await
            .ok_or_else(|| DfsError::NotFound(filename.to_owned()))?;
        let mut chunk_locations: HashMap<u64, Vec<NodeMeta>> = HashMap::new();
        for (index, node_ids) in &record.chunks {
            let reachable: Vec<NodeMeta> = node_ids
                .iter()
                .filter_map(|id| live.get(id).cloned())
                .collect();
            if reachable.is_empty() {
                return Err(DfsError::UnrecoverableChunk(*index));
            }
            chunk_locations.insert(*index, reachable);
        }
        Ok(DownloadInitBody {
            filename: record.name,
            filesize: record.size,
            chunk_size: record.chunk_size,
            chunk_locations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::message::{FileInfoBody, ListFilesBody};
    use utilities::result::ErrorKind;

    const MIB: u64 = 1024 * 1024;

    fn settings() -> HandlerSettings {
        HandlerSettings {
            chunk_size: MIB,
            replication_factor: 3,
            liveness_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(2),
        }
    }

    fn handler() -> RequestHandler {
        RequestHandler::new(Arc::new(NameServerState::new()), settings())
    }

    async fn join_fleet(handler: &RequestHandler, count: usize) {
        for i in 1..=count {
            let id = format!("node-{i}");
            handler.state.register_node(&id, "127.0.0.1", 8000 + i as u16).await;
            handler
                .state
                .record_heartbeat(&id, 100 * i as u64, 1000, vec![])
                .await
                .unwrap();
        }
    }

    async fn complete_upload(handler: &RequestHandler, filename: &str, filesize: u64) {
        let plan = handler.upload_init(filename, filesize).await.unwrap();
        let chunks = plan
            .chunk_assignments
            .iter()
            .map(|(index, nodes)| {
                (
                    index.to_string(),
                    nodes.iter().map(|meta| meta.node_id.clone()).collect(),
                )
            })
            .collect();
        handler
            .dispatch(Request::UploadComplete {
                filename: filename.to_owned(),
                filesize,
                chunks,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upload_init_assigns_full_replica_sets() {
        let handler = handler();
        join_fleet(&handler, 4).await;
        let plan = handler.upload_init("a.bin", 3 * MIB).await.unwrap();
        assert_eq!(plan.num_chunks, 3);
        assert_eq!(plan.chunk_size, MIB);
        for index in 0..3u64 {
            let assigned = &plan.chunk_assignments[&index];
            assert_eq!(assigned.len(), 3);
            // most free space first: node-4 leads
            assert_eq!(assigned[0].node_id, "node-4");
        }
    }

    #[tokio::test]
    async fn upload_init_fails_on_a_small_fleet() {
        let handler = handler();
        join_fleet(&handler, 2).await;
        let err = handler.upload_init("a.bin", MIB).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientCapacity);
        // nothing was installed
        assert!(handler.state.get_file("a.bin").await.is_none());
    }

    #[tokio::test]
    async fn empty_files_need_no_fleet() {
        let handler = handler();
        let plan = handler.upload_init("empty.bin", 0).await.unwrap();
        assert_eq!(plan.num_chunks, 0);
        assert!(plan.chunk_assignments.is_empty());
    }

    #[tokio::test]
    async fn upload_complete_then_file_info_round_trips() {
        let handler = handler();
        join_fleet(&handler, 3).await;
        complete_upload(&handler, "a.bin", 2 * MIB + 1).await;

        let body = handler
            .dispatch(Request::FileInfo {
                filename: "a.bin".to_owned(),
            })
            .await
            .unwrap();
        let info: FileInfoBody = serde_json::from_value(body).unwrap();
        assert_eq!(info.file.size, 2 * MIB + 1);
        assert_eq!(info.file.chunks.len(), 3);
        assert_eq!(info.file.replication_factor, 3);
        for locations in info.file.chunks.values() {
            assert_eq!(locations.len(), 3);
        }
    }

    #[tokio::test]
    async fn download_init_filters_dead_replicas() {
        let handler = handler();
        join_fleet(&handler, 3).await;
        complete_upload(&handler, "a.bin", 2 * MIB).await;

        let body = handler
            .dispatch(Request::DownloadInit {
                filename: "a.bin".to_owned(),
            })
            .await
            .unwrap();
        let init: DownloadInitBody = serde_json::from_value(body).unwrap();
        assert_eq!(init.chunk_locations.len(), 2);
        assert_eq!(init.chunk_locations[&0].len(), 3);

        // node-3 goes silent while the others keep beating: the sweep strips
        // it from the record and downloads resolve through the survivors
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler
            .state
            .record_heartbeat("node-1", 100, 1000, vec![])
            .await
            .unwrap();
        handler
            .state
            .record_heartbeat("node-2", 200, 1000, vec![])
            .await
            .unwrap();
        let dead = handler.state.sweep_dead(Duration::from_millis(50)).await;
        assert_eq!(dead, vec!["node-3".to_owned()]);
        let body = handler
            .dispatch(Request::DownloadInit {
                filename: "a.bin".to_owned(),
            })
            .await
            .unwrap();
        let init: DownloadInitBody = serde_json::from_value(body).unwrap();
        assert_eq!(init.chunk_locations[&0].len(), 2);
    }

    #[tokio::test]
    async fn download_init_fails_when_every_replica_is_dead() {
        let handler = handler();
        join_fleet(&handler, 3).await;
        complete_upload(&handler, "a.bin", MIB).await;

        handler.state.sweep_dead(Duration::ZERO).await;
        let err = handler
            .dispatch(Request::DownloadInit {
                filename: "a.bin".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecoverableChunk);
    }

    #[tokio::test]
    async fn unknown_files_are_not_found() {
        let handler = handler();
        for request in [
            Request::DownloadInit {
                filename: "ghost".to_owned(),
            },
            Request::FileInfo {
                filename: "ghost".to_owned(),
            },
            Request::DeleteFile {
                filename: "ghost".to_owned(),
            },
        ] {
            let err = handler.dispatch(request).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn delete_removes_only_the_record() {
        let handler = handler();
        join_fleet(&handler, 3).await;
        complete_upload(&handler, "hello.bin", 500).await;

        handler
            .dispatch(Request::DeleteFile {
                filename: "hello.bin".to_owned(),
            })
            .await
            .unwrap();
        let body = handler.dispatch(Request::ListFiles).await.unwrap();
        let listing: ListFilesBody = serde_json::from_value(body).unwrap();
        assert!(listing.files.is_empty());
        let err = handler
            .dispatch(Request::DownloadInit {
                filename: "hello.bin".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn last_upload_complete_wins() {
        let handler = handler();
        join_fleet(&handler, 3).await;
        complete_upload(&handler, "a.bin", MIB).await;
        complete_upload(&handler, "a.bin", 2 * MIB).await;
        let record = handler.state.get_file("a.bin").await.unwrap();
        assert_eq!(record.size, 2 * MIB);
        assert_eq!(record.num_chunks(), 2);
    }

    #[tokio::test]
    async fn concurrent_uploads_of_distinct_names_both_land() {
        let handler = Arc::new(handler());
        join_fleet(&handler, 3).await;
        let mut tasks = vec![];
        for name in ["left.bin", "right.bin"] {
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                let plan = handler.upload_init(name, MIB).await.unwrap();
                let chunks = plan
                    .chunk_assignments
                    .iter()
                    .map(|(index, nodes)| {
                        (
                            index.to_string(),
                            nodes.iter().map(|meta| meta.node_id.clone()).collect(),
                        )
                    })
                    .collect();
                handler
                    .dispatch(Request::UploadComplete {
                        filename: name.to_owned(),
                        filesize: MIB,
                        chunks,
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(handler.state.get_file("left.bin").await.is_some());
        assert!(handler.state.get_file("right.bin").await.is_some());
    }

    #[tokio::test]
    async fn data_plane_commands_are_rejected() {
        let handler = handler();
        let err = handler
            .dispatch(Request::RetrieveChunk {
                chunk_id: "chunk_a.bin_0".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn cluster_status_counts_files_and_nodes() {
        let handler = handler();
        join_fleet(&handler, 3).await;
        complete_upload(&handler, "a.bin", 500).await;

        let body = handler.dispatch(Request::ClusterStatus).await.unwrap();
        let status: ClusterStatusBody = serde_json::from_value(body).unwrap();
        assert_eq!(status.datanodes.len(), 3);
        assert_eq!(status.total_files, 1);
        assert_eq!(status.total_size, 500);
        assert!(status.datanodes.iter().all(|node| node.is_alive));
    }
}
