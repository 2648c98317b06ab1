// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2025 Ridelink Contributors. All rights reserved.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! REST fallback path for publishing locations and reading ride state when
//! the duplex channel is unavailable.

use async_trait::async_trait;
use reqwest::StatusCode;
use ridelink_model::{LocationUpdate, RideId, TrackingUpdate};

use crate::{
    config::TrackingConfig,
    error::TrackingError,
    reconciler::RideStateSource,
    simulator::LocationSink,
};

/// HTTP gateway to the ride tracking REST endpoints.
#[derive(Clone, Debug)]
pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestGateway {
    /// Creates a new [`RestGateway`] from the given config.
    #[must_use]
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    /// Returns the base REST API URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl LocationSink for RestGateway {
    async fn publish(
        &self,
        ride_id: RideId,
        update: LocationUpdate,
    ) -> Result<(), TrackingError> {
        let url = format!("{}/rides/{ride_id}/location", self.base_url);
        tracing::trace!("PUT {url}");

        self.with_auth(self.http.put(&url))
            .json(&update)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[async_trait]
impl RideStateSource for RestGateway {
    async fn fetch(&self, ride_id: RideId) -> Result<Option<TrackingUpdate>, TrackingError> {
        let url = format!("{}/rides/{ride_id}/tracking", self.base_url);
        tracing::trace!("GET {url}");

        let response = self.with_auth(self.http.get(&url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let update = response.error_for_status()?.json::<TrackingUpdate>().await?;
        Ok(Some(update))
    }
}
