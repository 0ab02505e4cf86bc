pub mod chunk_id;
pub mod message;
pub mod wire;
