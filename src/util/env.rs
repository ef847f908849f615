//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::path::Path;
use std::str::FromStr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        load_dotenv(&Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    });
}

/// `.env` from the working directory (or a parent); `fallback` when none is found.
fn load_dotenv(fallback: &Path) {
    if dotenv::dotenv().is_err() {
        let _ = dotenv::from_path(fallback);
    }
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
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(target = "env", key, value = %raw, "unparseable env value; using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Database URL: `DATABASE_URL` wins, otherwise composed from the `DB_*` parts.
pub fn db_url() -> anyhow::Result<String> {
    if let Some(v) = env_opt("DATABASE_URL") {
        info!(target = "env", "using DATABASE_URL");
        return Ok(v);
    }

    let (Some(host), Some(user), Some(database)) =
        (env_opt("DB_HOST"), env_opt("DB_USER"), env_opt("DB_NAME"))
    else {
        return Err(anyhow::anyhow!(
            "no database configured; set DATABASE_URL or DB_HOST/DB_USER/DB_PASS/DB_NAME"
        ));
    };
    let scheme = env_opt("DB_SCHEME").unwrap_or_else(|| "postgres".into());
    let port = env_opt("DB_PORT").and_then(|p| p.trim().parse::<u16>().ok());
    let password = env_opt("DB_PASS");

    info!(target = "env", %scheme, "composing database URL from DB_* variables");
    compose_db_url(&scheme, &host, port, &user, password.as_deref(), &database)
}

/// Build a DSN from parts. Goes through `url::Url` so reserved characters in
/// the username/password are percent-encoded.
pub fn compose_db_url(
    scheme: &str,
    host: &str,
    port: Option<u16>,
    user: &str,
    password: Option<&str>,
    database: &str,
) -> anyhow::Result<String> {
    let mut out = url::Url::parse(&format!("{scheme}://localhost"))
        .map_err(|e| anyhow::anyhow!("invalid DB_SCHEME {scheme}: {e}"))?;

    let host_trimmed = host.trim().trim_matches(|c| c == '[' || c == ']');
    let host_value = if host_trimmed.contains(':') {
        format!("[{host_trimmed}]")
    } else {
        host_trimmed.to_string()
    };
    out.set_host(Some(&host_value))
        .map_err(|e| anyhow::anyhow!("invalid DB_HOST {host}: {e}"))?;
    out.set_username(user)
        .map_err(|_| anyhow::anyhow!("DB_USER cannot be set on {scheme} URL"))?;
    if let Some(pass) = password {
        out.set_password(Some(pass))
            .map_err(|_| anyhow::anyhow!("DB_PASS cannot be set on {scheme} URL"))?;
    }
    if port.is_some() {
        out.set_port(port)
            .map_err(|_| anyhow::anyhow!("DB_PORT cannot be set on {scheme} URL"))?;
    }
    out.set_path(&format!("/{database}"));
    Ok(out.to_string())
}

pub(crate) fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASS") || k.contains("SECRET") || k.contains("KEY") || k.contains("TOKEN") {
        return "***".to_string();
    }

    let val_trim = val.trim();

    // DSNs carry credentials even when the key name looks harmless.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        if u.password().is_some() || !u.username().is_empty() {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    val_trim.to_string()
}

/// Validate required keys and log a consolidated, redacted snapshot of configuration.
/// Returns error if any required key is missing.
pub fn preflight_check(title: &str, required: &[&str], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| env_opt(k).is_none())
        .collect();
    let snapshot: Vec<(String, String)> = also_log
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    if !missing.is_empty() {
        return Err(anyhow::anyhow!("missing required env: {:?}", missing));
    }
    Ok(())
}
