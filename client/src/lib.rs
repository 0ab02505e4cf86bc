pub mod chunk_joiner;
pub mod chunkserver_service;
pub mod command_runner;
pub mod file_chunker;
pub mod nameserver_service;
