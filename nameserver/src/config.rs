use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub chunk_size: u64,
    pub replication_factor: u32,
    pub heartbeat_check_interval_secs: u64,
    pub liveness_timeout_secs: u64,
    pub replication_check_interval_secs: u64,
    pub stats_interval_secs: u64,
    pub io_timeout_secs: u64,
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_owned(),
            port: 8000,
            chunk_size: 1024 * 1024,
            replication_factor: 3,
            heartbeat_check_interval_secs: 10,
            liveness_timeout_secs: 30,
            replication_check_interval_secs: 30,
            stats_interval_secs: 30,
            io_timeout_secs: 5,
            log_dir: "logs".to_owned(),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    let config_file_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "./nameserver/config/default.yaml".to_owned());
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Yaml::file(config_file_path))
        .merge(Env::prefixed("NAMESERVER_"))
        .extract()
        .unwrap()
});
