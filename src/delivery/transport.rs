//! Transports that carry a record to the logging endpoint.

use crate::error::Result;
use crate::types::ErrorRecord;

#[cfg(feature = "http")]
use super::worker::DeliveryConfig;

/// Sends one record to the remote endpoint.
///
/// Called from the delivery worker thread, one record at a time. An `Err`
/// is counted as a failed delivery and otherwise ignored.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, record: &ErrorRecord) -> Result<()>;
}

impl<F> Transport for F
where
    F: Fn(&ErrorRecord) -> Result<()> + Send + Sync + 'static,
{
    fn send(&self, record: &ErrorRecord) -> Result<()> {
        self(record)
    }
}

/// Transport that accepts and discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, _record: &ErrorRecord) -> Result<()> {
        Ok(())
    }
}

/// POSTs each record as JSON to `{base_url}{path}`.
///
/// The blocking client is built on first use, which is always the delivery
/// worker thread, so constructing a collector inside an async runtime is safe.
#[cfg(feature = "http")]
pub struct HttpTransport {
    url: String,
    timeout: std::time::Duration,
    client: std::sync::OnceLock<reqwest::blocking::Client>,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            url: config.endpoint(),
            timeout: config.timeout,
            client: std::sync::OnceLock::new(),
        }
    }

    /// Full endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn send(&self, record: &ErrorRecord) -> Result<()> {
        let body = serde_json::to_vec(record)?;

        // Response body is never read.
        self.client()?
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()?
            .error_for_status()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectorError;
    use crate::types::{ErrorInput, ErrorKind};

    fn make_record() -> ErrorRecord {
        ErrorRecord::from_input("test", ErrorInput::new(ErrorKind::Uncaught, "boom"))
    }

    #[test]
    fn test_closure_transport() {
        let transport = |record: &ErrorRecord| -> Result<()> {
            if record.message == "boom" {
                Err(CollectorError::Transport("refused".into()))
            } else {
                Ok(())
            }
        };
        assert!(transport.send(&make_record()).is_err());
        assert!(NullTransport.send(&make_record()).is_ok());
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_transport_url() {
        let config = DeliveryConfig {
            base_url: "http://collector.local:9000".to_string(),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config);
        assert_eq!(transport.url(), "http://collector.local:9000/api/errors/log");
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_transport_unreachable_is_error() {
        let config = DeliveryConfig {
            // Port 9 (discard) on localhost is closed on test machines.
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: std::time::Duration::from_secs(2),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config);
        assert!(matches!(
            transport.send(&make_record()),
            Err(CollectorError::Transport(_))
        ));
    }
}
