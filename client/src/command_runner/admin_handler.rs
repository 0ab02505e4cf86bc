use std::fmt::Write;

use utilities::result::Result;

use crate::nameserver_service::NameserverService;

/// The four metadata-only commands, each rendered as the text the CLI prints.
pub struct AdminHandler {
    nameserver: NameserverService,
}

impl AdminHandler {
    pub fn new(nameserver: NameserverService) -> Self {
        AdminHandler { nameserver }
    }

    pub async fn list_files(&self) -> Result<String> {
        let listing = self.nameserver.list_files().await?;
        if listing.files.is_empty() {
            return Ok("No files stored".to_owned());
        }
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<40} {:>12} {:>8}  {:<20}",
            "Filename", "Size", "Chunks", "Created"
        );
        for file in &listing.files {
            let _ = writeln!(
                out,
                "{:<40} {:>12} {:>8}  {:<20}",
                file.filename, file.size, file.chunks, file.created_at
            );
        }
        let _ = write!(out, "Total files: {}", listing.files.len());
        Ok(out)
    }

    pub async fn file_info(&self, remote_name: &str) -> Result<String> {
        let info = self.nameserver.file_info(remote_name).await?;
        let file = info.file;
        let mut out = String::new();
        let _ = writeln!(out, "Filename: {}", file.filename);
        let _ = writeln!(out, "Size: {} bytes", file.size);
        let _ = writeln!(out, "Chunk size: {} bytes", file.chunk_size);
        let _ = writeln!(out, "Replication factor: {}", file.replication_factor);
        let _ = writeln!(out, "Chunks: {}", file.chunks.len());
        let mut indexes: Vec<u64> = file.chunks.keys().copied().collect();
        indexes.sort_unstable();
        for index in indexes {
            let _ = writeln!(out, "  chunk {index}: {}", file.chunks[&index].join(", "));
        }
        out.truncate(out.trim_end().len());
        Ok(out)
    }

    pub async fn delete_file(&self, remote_name: &str) -> Result<String> {
        let ack = self.nameserver.delete_file(remote_name).await?;
        Ok(ack
            .message
            .unwrap_or_else(|| format!("File {remote_name} deleted")))
    }

    pub async fn cluster_status(&self) -> Result<String> {
        let status = self.nameserver.cluster_status().await?;
        let mut out = String::new();
        let _ = writeln!(out, "Total files: {}", status.total_files);
        let _ = writeln!(out, "Total size: {} bytes", status.total_size);
        let _ = writeln!(
            out,
            "{:<15} {:<22} {:<7} {:>8} {:>24}",
            "Node", "Address", "State", "Chunks", "Space (free/total)"
        );
        for node in &status.datanodes {
            let _ = writeln!(
                out,
                "{:<15} {:<22} {:<7} {:>8} {:>11}/{:<12}",
                node.node_id,
                format!("{}:{}", node.host, node.port),
                if node.is_alive { "alive" } else { "dead" },
                node.chunk_count,
                node.available_space,
                node.total_space
            );
        }
        out.truncate(out.trim_end().len());
        Ok(out)
    }
}
