//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            info!(target = "env", "loaded .env");
        }
    });
}

/// Get required env var; error if missing or blank.
pub fn env_req(key: &str) -> anyhow::Result<String> {
    env_opt(key).ok_or_else(|| anyhow::anyhow!("missing env var {key}"))
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Optional parsed value.
pub fn env_parse_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    init_env();
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Postgres DSN composed from POSTGRES_HOST / POSTGRES_PORT / POSTGRES_DB /
/// POSTGRES_USER / POSTGRES_PASSWORD. Every component is required.
pub fn store_dsn() -> anyhow::Result<String> {
    let host = env_req("POSTGRES_HOST")?;
    let port = env_req("POSTGRES_PORT")?;
    let database = env_req("POSTGRES_DB")?;
    let user = env_req("POSTGRES_USER")?;
    let password = env_req("POSTGRES_PASSWORD")?;
    compose_dsn(&host, &port, &database, &user, &password)
}

/// Build via `url::Url` so reserved characters in credentials get percent-encoded.
pub fn compose_dsn(
    host: &str,
    port: &str,
    database: &str,
    user: &str,
    password: &str,
) -> anyhow::Result<String> {
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("POSTGRES_PORT is not a valid port: {port}"))?;

    let mut out = url::Url::parse("postgresql://localhost")?;
    out.set_username(user)
        .map_err(|_| anyhow::anyhow!("cannot use POSTGRES_USER in a DSN"))?;
    out.set_password(Some(password))
        .map_err(|_| anyhow::anyhow!("cannot use POSTGRES_PASSWORD in a DSN"))?;
    out.set_host(Some(&normalize_host(host)))?;
    out.set_port(Some(port))
        .map_err(|_| anyhow::anyhow!("cannot set port on DSN"))?;
    out.set_path(&format!("/{}", database.trim()));

    Ok(out.to_string())
}

fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '[' || c == ']');
    if trimmed.contains(':') {
        format!("[{trimmed}]")
    } else {
        trimmed.to_string()
    }
}
