//! [`DeliveryChannel`] over a small HTTP protocol.
//!
//! | Method | Path | Body / response |
//! |--------|------|-----------------|
//! | `GET`  | `{base}/status` | `{"status":"ready"\|"awaiting_authentication"\|"disconnected"}` |
//! | `POST` | `{base}/send` | `{"to":"<destination>","text":"<message>"}` |

use nudge_core::channel::{ChannelStatus, DeliveryChannel};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
  config::HttpEndpoint,
  error::{Result, check},
};

#[derive(Clone)]
pub struct HttpChannel {
  client:   Client,
  base_url: String,
}

#[derive(Deserialize)]
struct StatusBody {
  status: ChannelStatus,
}

#[derive(Serialize)]
struct SendBody<'a> {
  to:   &'a str,
  text: &'a str,
}

impl HttpChannel {
  pub fn new(endpoint: &HttpEndpoint) -> Result<Self> {
    let client = Client::builder().timeout(endpoint.timeout()).build()?;
    Ok(Self {
      client,
      base_url: endpoint.base_url.trim_end_matches('/').to_owned(),
    })
  }

  fn url(&self, path: &str) -> String { format!("{}{path}", self.base_url) }
}

impl DeliveryChannel for HttpChannel {
  type Error = crate::Error;

  async fn status(&self) -> Result<ChannelStatus> {
    let resp = self.client.get(self.url("/status")).send().await?;
    let body: StatusBody = check(resp, "GET /status").await?.json().await?;
    Ok(body.status)
  }

  async fn send(&self, destination: &str, text: &str) -> Result<()> {
    let resp = self
      .client
      .post(self.url("/send"))
      .json(&SendBody { to: destination, text })
      .send()
      .await?;
    check(resp, "POST /send").await?;
    Ok(())
  }
}
