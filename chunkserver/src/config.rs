use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub nameserver_addr: String,
    /// Defaults to `chunkserver_<node_id>_storage` when unset.
    pub storage_dir: Option<String>,
    pub log_dir: String,
    pub heartbeat_interval_secs: u64,
    pub io_timeout_secs: u64,
    pub register_max_attempts: u8,
    pub register_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_id: "node-1".to_owned(),
            host: "127.0.0.1".to_owned(),
            port: 8001,
            nameserver_addr: "127.0.0.1:8000".to_owned(),
            storage_dir: None,
            log_dir: "logs".to_owned(),
            heartbeat_interval_secs: 10,
            io_timeout_secs: 5,
            register_max_attempts: 5,
            register_backoff_ms: 500,
        }
    }
}

impl Config {
    pub fn storage_dir(&self) -> String {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| format!("chunkserver_{}_storage", self.node_id))
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    let config_file_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "./chunkserver/config/default.yaml".to_owned());
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Yaml::file(config_file_path))
        .merge(Env::prefixed("CHUNKSERVER_"))
        .extract()
        .unwrap()
});
