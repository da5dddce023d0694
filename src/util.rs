use std::path::PathBuf;

const CONFIG_PATH: &str = "PLAYER_COUNT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./player-count.json";

pub fn get_config_path() -> String {
    std::env::var(CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

const DB_PATH: &str = "PLAYER_COUNT_DB";

pub fn get_db_path() -> Option<PathBuf> {
    std::env::var(DB_PATH).ok().map(PathBuf::from)
}

const PROVIDER_URL: &str = "PLAYER_COUNT_PROVIDER_URL";

pub fn get_provider_url() -> Option<String> {
    std::env::var(PROVIDER_URL).ok()
}
