use anyhow::{bail, Context, Result};
use url::Url;

/// Sanity-checks a Postgres connection string before handing it to
/// `PostgresCatalog::connect` — catches a missing database name early rather
/// than surfacing it as an opaque connection failure from sqlx.
pub fn validate_database_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).context("database URL is not a valid URL")?;
    if parsed.scheme() != "postgres" && parsed.scheme() != "postgresql" {
        bail!("database URL must use the postgres:// scheme");
    }
    if parsed.path().trim_start_matches('/').is_empty() {
        bail!("database URL must include a database name");
    }
    Ok(())
}
