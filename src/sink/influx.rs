//! InfluxDB v2 writer using the HTTP line-protocol endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{instrument, trace};

use crate::config::InfluxConfig;

use super::{MetricSink, Point, SinkError, SinkResult};

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct InfluxSink {
    client: Client,
    write_url: String,
    token: String,
    org: String,
    bucket: String,
}

impl std::fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSink")
            .field("write_url", &self.write_url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> SinkResult<Self> {
        if config.url.is_empty() {
            return Err(SinkError::InvalidConfig("url must not be empty".to_string()));
        }
        if config.bucket.is_empty() {
            return Err(SinkError::InvalidConfig(
                "bucket must not be empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(WRITE_TIMEOUT).build()?;

        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl MetricSink for InfluxSink {
    #[instrument(skip_all, fields(measurement = %point.measurement))]
    async fn write_point(&self, point: Point) -> SinkResult<()> {
        let body = point.to_line_protocol();
        trace!("writing {body}");

        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
