//! HTTP client for the gateway's robot endpoints

use std::time::Duration;

use serde::Serialize;

use crate::config::ActuatorConfig;
use crate::plan::{ActionStep, SensorSnapshot};
use crate::{Error, Result};

/// Per-request timeout; a slow poll is simply retried next cycle
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct StateReport<'a> {
    distances: &'a SensorSnapshot,
}

/// Blocking client used on the robot side
pub struct ActuatorClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ActuatorClient {
    /// Create a client for the configured gateway
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &ActuatorConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    /// Report the latest readings
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it
    pub fn submit_state(&self, snapshot: &SensorSnapshot) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/submit_state", self.base_url))
            .json(&StateReport {
                distances: snapshot,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Actuator(format!("submit_state returned {status}: {body}")));
        }
        Ok(())
    }

    /// Fetch the next plan; empty when nothing is pending
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply is not a plan
    pub fn fetch_plan(&self) -> Result<Vec<ActionStep>> {
        let response = self
            .client
            .get(format!("{}/get_command", self.base_url))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Actuator(format!("get_command returned {status}")));
        }

        Ok(response.json()?)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
