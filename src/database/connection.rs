use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use url::Url;

const MAX_RETRIES: usize = 3;
const WAIT_BETWEEN_RETRIES: u64 = 2;

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| format!("Error loading CA cert: {}", e))?;

    Ok(MakeTlsConnector::new(builder.build()))
}

/// A database URL split into the part libpq understands and the CA path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub url: String,
    pub sslrootcert: String,
}

/// Pull the `sslrootcert` query parameter out of a PostgreSQL URL
///
/// tokio-postgres rejects parameters it does not know, so the CA path is
/// removed from the URL and handed to the TLS connector instead.
pub fn split_database_url(database_url: &str) -> Result<ConnectionTarget, String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    let mut sslrootcert = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let sslrootcert = sslrootcert.ok_or("sslrootcert parameter missing")?;

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    Ok(ConnectionTarget {
        url: clean_url.to_string(),
        sslrootcert,
    })
}

/// Connect and run `operation`, retrying a few times on failure
///
/// Configuration problems (bad URL, missing or unreadable CA file) fail
/// immediately since retrying cannot fix them.
pub async fn execute_with_retry<F, Fut>(database_url: &str, operation: F) -> Result<(), String>
where
    F: Fn(tokio_postgres::Client) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<u64, tokio_postgres::Error>> + Send,
{
    let target = split_database_url(database_url)?;
    let connector = create_ssl_connector(&target.sslrootcert)?;

    for attempt in 0..MAX_RETRIES {
        match tokio_postgres::connect(&target.url, connector.clone()).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Connection error: {}", e);
                    }
                });

                match operation(client).await {
                    Ok(_) => return Ok(()),
                    Err(e) => warn!("Attempt {}: query error: {}", attempt + 1, e),
                }
            }
            Err(e) => warn!("Attempt {}: connection error: {}", attempt + 1, e),
        }

        if attempt < MAX_RETRIES - 1 {
            tokio::time::sleep(Duration::from_secs(WAIT_BETWEEN_RETRIES)).await;
        }
    }

    Err("Max retries exceeded".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_database_url() {
        let target = split_database_url(
            "postgres://user:pw@db.local:5432/sensors?sslmode=require&sslrootcert=/etc/ca.pem",
        )
        .unwrap();

        assert_eq!(target.sslrootcert, "/etc/ca.pem");
        assert_eq!(
            target.url,
            "postgres://user:pw@db.local:5432/sensors?sslmode=require"
        );
    }

    #[test]
    fn test_split_database_url_only_cert() {
        let target =
            split_database_url("postgres://db.local/sensors?sslrootcert=ca.pem").unwrap();
        assert_eq!(target.url, "postgres://db.local/sensors");
    }

    #[test]
    fn test_split_database_url_requires_cert() {
        assert!(split_database_url("postgres://db.local/sensors").is_err());
        assert!(split_database_url("not a url").is_err());
    }
}
