use anyhow::{Context, Result, bail};
use futures_util::future::BoxFuture;
use log::debug;

use crate::transport::Transport;

/// Loads beacon URLs with a plain GET, ignoring the response body.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn load(&self, src: String) -> BoxFuture<'static, Result<()>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client
                .get(&src)
                .send()
                .await
                .with_context(|| format!("Beacon request to {} failed", src))?;

            let status = response.status();
            if !status.is_success() {
                bail!("Collector answered {} for {}", status, src);
            }
            debug!("Beacon delivered: {}", src);
            Ok(())
        })
    }
}
