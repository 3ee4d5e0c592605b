use std::env;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub port: u16,
    /// When set, a booked appointment only blocks a slot if both its start and
    /// end time match. Otherwise start time alone decides.
    pub slot_conflict_match_end_time: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| match raw.parse() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        warn!("PORT={} is not a valid port, using {}", raw, DEFAULT_PORT);
                        None
                    }
                })
                .unwrap_or(DEFAULT_PORT),
            slot_conflict_match_end_time: parse_conflict_match(
                env::var("SLOT_CONFLICT_MATCH").ok().as_deref(),
            ),
        };

        if !config.is_configured() {
            warn!("Supabase not fully configured - falling back to in-memory storage");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }

    pub fn is_auth_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_conflict_match(value: Option<&str>) -> bool {
    match value {
        None | Some("") | Some("start_time") => false,
        Some("start_and_end") => true,
        Some(other) => {
            warn!("Unknown SLOT_CONFLICT_MATCH '{}', matching on start time only", other);
            false
        }
    }
}
