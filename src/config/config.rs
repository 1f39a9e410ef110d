use dotenv::dotenv;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_ca_file: Option<String>,
    pub database_pool_size: usize,
    pub jwt_secret: String,
    pub jwt_max_age: i32,
    pub server_host: String,
    pub server_port: u16,
    pub challenge_sweep_interval_secs: u64,
    pub admin_user_ids: Vec<Uuid>,
    pub default_playing_xi: i32,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse::<T>()
            .unwrap_or_else(|_| panic!("Failed to parse {key}")),
        _ => default,
    }
}

fn parse_admins(raw: &str) -> Vec<Uuid> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| Uuid::parse_str(id).unwrap_or_else(|_| panic!("ADMIN_USER_IDS has an invalid id: {id}")))
        .collect()
}

impl Config {
    pub fn init() -> Config {
        dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        let database_ca_file = std::env::var("DATABASE_CA_FILE")
            .ok()
            .filter(|path| !path.is_empty());
        let admin_user_ids = parse_admins(&std::env::var("ADMIN_USER_IDS").unwrap_or_default());

        Config {
            database_url,
            database_ca_file,
            database_pool_size: var_or("DATABASE_POOL_SIZE", 16),
            jwt_secret,
            jwt_max_age: var_or("JWT_MAX_AGE", 3600),
            server_host: var_or("SERVER_HOST", "127.0.0.1".to_string()),
            server_port: var_or("SERVER_PORT", 8080),
            challenge_sweep_interval_secs: var_or("CHALLENGE_SWEEP_INTERVAL_SECS", 300),
            admin_user_ids,
            default_playing_xi: var_or("DEFAULT_PLAYING_XI", 11),
        }
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}
