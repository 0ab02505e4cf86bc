use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utilities::result::{DfsError, ErrorKind, Result};

/// Every request is a single JSON document tagged by its `command` field.
/// Control-plane commands go to the name server, the last three are the
/// chunk-server data plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    RegisterDatanode {
        node_id: String,
        host: String,
        port: u16,
    },
    Heartbeat {
        node_id: String,
        available_space: u64,
        total_space: u64,
        chunks: Vec<String>,
    },
    UploadInit {
        filename: String,
        filesize: u64,
    },
    UploadComplete {
        filename: String,
        filesize: u64,
        // JSON object keys are strings; the name server parses the indexes
        chunks: HashMap<String, Vec<String>>,
    },
    DownloadInit {
        filename: String,
    },
    ListFiles,
    DeleteFile {
        filename: String,
    },
    FileInfo {
        filename: String,
    },
    ClusterStatus,
    StoreChunk {
        chunk_id: String,
        chunk_size: u64,
    },
    RetrieveChunk {
        chunk_id: String,
    },
    DeleteChunk {
        chunk_id: String,
    },
}

/// Response envelope: `status` is `"success"` with the body flattened beside
/// it, or `"error"` with a message and an optional machine-readable kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply<T> {
    Success {
        #[serde(flatten)]
        body: T,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<ErrorKind>,
        message: String,
    },
}

// Hand-rolled so success bodies deserialize through `serde_json::Value`:
// derived internally-tagged deserialization buffers fields in a way that
// cannot rebuild integer-keyed maps like `chunk_assignments`.
impl<'de, T: DeserializeOwned> Deserialize<'de> for Reply<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let mut value = serde_json::Value::deserialize(deserializer)?;
        let status = value
            .get("status")
            .and_then(|status| status.as_str())
            .map(str::to_owned)
            .ok_or_else(|| D::Error::missing_field("status"))?;
        match status.as_str() {
            "success" => {
                if let Some(fields) = value.as_object_mut() {
                    fields.remove("status");
                }
                let body = serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Reply::Success { body })
            }
            "error" => {
                let kind = value
                    .get("kind")
                    .filter(|kind| !kind.is_null())
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(D::Error::custom)?;
                let message = value
                    .get("message")
                    .and_then(|message| message.as_str())
                    .unwrap_or_default()
                    .to_owned();
                Ok(Reply::Error { kind, message })
            }
            other => Err(D::Error::custom(format!("unknown status: {other}"))),
        }
    }
}

impl<T: Serialize + DeserializeOwned> Reply<T> {
    pub fn success(body: T) -> Self {
        Reply::Success { body }
    }

    pub fn failure(err: &DfsError) -> Self {
        Reply::Error {
            kind: Some(err.kind()),
            message: err.to_string(),
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Reply::Success { body } => Ok(body),
            Reply::Error { kind, message } => Err(DfsError::from_wire(kind, message)),
        }
    }
}

/// Empty success body, with room for the human-readable note some operations
/// attach (`register_datanode`, `delete_file`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn with_message(message: impl Into<String>) -> Self {
        Ack {
            message: Some(message.into()),
        }
    }
}

/// Network identity of one chunk server, as handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub node_id: String,
    pub host: String,
    pub port: u16,
}

impl NodeMeta {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadInitBody {
    pub chunk_size: u64,
    pub num_chunks: u64,
    pub chunk_assignments: HashMap<u64, Vec<NodeMeta>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadInitBody {
    pub filename: String,
    pub filesize: u64,
    pub chunk_size: u64,
    pub chunk_locations: HashMap<u64, Vec<NodeMeta>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub filename: String,
    pub size: u64,
    pub chunks: u64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesBody {
    pub files: Vec<FileSummary>,
}

/// Full per-file record as returned by `file_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDetail {
    pub filename: String,
    pub size: u64,
    pub chunk_size: u64,
    pub replication_factor: u32,
    pub created_at: i64,
    pub chunks: HashMap<u64, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfoBody {
    pub file: FileDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub is_alive: bool,
    pub available_space: u64,
    pub total_space: u64,
    pub chunk_count: u64,
    pub seconds_since_heartbeat: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStatusBody {
    pub datanodes: Vec<NodeStatus>,
    pub total_files: u64,
    pub total_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreChunkBody {
    pub chunk_id: String,
    pub size: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveChunkBody {
    pub chunk_id: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_command_tag() {
        let req = Request::UploadInit {
            filename: "hello.bin".to_owned(),
            filesize: 42,
        };
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["command"], "upload_init");
        assert_eq!(json["filename"], "hello.bin");
        assert_eq!(json["filesize"], 42);
    }

    #[test]
    fn unit_commands_round_trip() {
        let req: Request = serde_json::from_str(r#"{"command":"list_files"}"#).unwrap();
        assert!(matches!(req, Request::ListFiles));
        let req: Request = serde_json::from_str(r#"{"command":"cluster_status"}"#).unwrap();
        assert!(matches!(req, Request::ClusterStatus));
    }

    #[test]
    fn upload_complete_round_trips_its_chunk_map() {
        let mut chunks = HashMap::new();
        chunks.insert("0".to_owned(), vec!["node-1".to_owned()]);
        chunks.insert("1".to_owned(), vec!["node-2".to_owned()]);
        let req = Request::UploadComplete {
            filename: "f".to_owned(),
            filesize: 2,
            chunks,
        };
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["chunks"]["0"][0], "node-1");
        assert_eq!(json["chunks"]["1"][0], "node-2");
        let back: Request = serde_json::from_value(json).unwrap();
        match back {
            Request::UploadComplete { chunks, .. } => {
                assert_eq!(chunks["1"], vec!["node-2".to_owned()])
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn replies_rebuild_integer_keyed_bodies() {
        let mut chunk_locations = HashMap::new();
        chunk_locations.insert(
            3u64,
            vec![NodeMeta {
                node_id: "node-1".to_owned(),
                host: "127.0.0.1".to_owned(),
                port: 8001,
            }],
        );
        let reply = Reply::success(DownloadInitBody {
            filename: "f".to_owned(),
            filesize: 4 * 1024 * 1024,
            chunk_size: 1024 * 1024,
            chunk_locations,
        });
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("\"3\""));
        let back: Reply<DownloadInitBody> = serde_json::from_str(&json).unwrap();
        let body = back.into_result().unwrap();
        assert_eq!(body.chunk_locations[&3][0].node_id, "node-1");
        assert_eq!(body.chunk_locations[&3][0].addr(), "127.0.0.1:8001");
    }

    #[test]
    fn success_reply_flattens_body() {
        let reply = Reply::success(StoreChunkBody {
            chunk_id: "chunk_f_0".to_owned(),
            size: 500,
            checksum: "d41d8cd98f00b204e9800998ecf8427e".to_owned(),
        });
        let json: serde_json::Value = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["size"], 500);
    }

    #[test]
    fn error_reply_round_trips_kind() {
        let err = DfsError::NotFound("hello.bin".to_owned());
        let reply: Reply<Ack> = Reply::failure(&err);
        let json = serde_json::to_string(&reply).unwrap();
        let back: Reply<Ack> = serde_json::from_str(&json).unwrap();
        let err = back.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "file not found: hello.bin");
    }

    #[test]
    fn bare_error_without_kind_still_parses() {
        let back: Reply<Ack> =
            serde_json::from_str(r#"{"status":"error","message":"boom"}"#).unwrap();
        let err = back.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn plain_success_parses_into_ack() {
        let back: Reply<Ack> = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(back.into_result().unwrap().message.is_none());
    }
}
