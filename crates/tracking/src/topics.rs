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

//! Topic naming and endpoint derivation for the duplex channel.

use ridelink_model::RideId;

/// The fixed WebSocket upgrade path on the server.
pub const WS_PATH: &str = "/ws";

/// The REST path suffix replaced by [`WS_PATH`] when deriving the duplex endpoint.
const REST_SUFFIX: &str = "/api/v1";

/// Returns the tracking topic for the given ride.
#[must_use]
pub fn ride_tracking_topic(ride_id: RideId) -> String {
    format!("/topic/rides/{ride_id}/tracking")
}

/// Returns the per-user notification topic for the given account email.
#[must_use]
pub fn user_notifications_topic(email: &str) -> String {
    format!("/topic/notifications/{email}")
}

/// Extracts the ride ID from a ride tracking topic, if the topic matches.
#[must_use]
pub fn parse_ride_tracking_topic(topic: &str) -> Option<RideId> {
    let rest = topic.strip_prefix("/topic/rides/")?;
    let id = rest.strip_suffix("/tracking")?;
    id.parse::<u64>().ok().map(RideId::new)
}

/// Derives the duplex WebSocket endpoint from the base REST API URL.
///
/// The scheme is swapped from `http(s)` to `ws(s)` and the REST path suffix
/// is replaced with the fixed upgrade path, so
/// `https://api.ridelink.io/api/v1` becomes `wss://api.ridelink.io/ws`.
#[must_use]
pub fn duplex_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = match base.strip_suffix(REST_SUFFIX) {
        Some(stripped) => format!("{stripped}{WS_PATH}"),
        None => format!("{base}{WS_PATH}"),
    };

    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base
    }
}

/// Returns the connect headers carrying the bearer token, when present.
#[must_use]
pub fn bearer_headers(token: Option<&str>) -> Vec<(String, String)> {
    token
        .map(|token| {
            vec![(
                "authorization".to_string(),
                format!("Bearer {token}"),
            )]
        })
        .unwrap_or_default()
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_ride_tracking_topic() {
        assert_eq!(
            ride_tracking_topic(RideId::new(42)),
            "/topic/rides/42/tracking"
        );
    }

    #[rstest]
    fn test_user_notifications_topic() {
        assert_eq!(
            user_notifications_topic("rider@example.com"),
            "/topic/notifications/rider@example.com"
        );
    }

    #[rstest]
    #[case("/topic/rides/42/tracking", Some(42))]
    #[case("/topic/rides/0/tracking", Some(0))]
    #[case("/topic/rides/abc/tracking", None)]
    #[case("/topic/rides/42", None)]
    #[case("/topic/notifications/rider@example.com", None)]
    fn test_parse_ride_tracking_topic(#[case] topic: &str, #[case] expected: Option<u64>) {
        assert_eq!(
            parse_ride_tracking_topic(topic),
            expected.map(RideId::new)
        );
    }

    #[rstest]
    #[case("https://api.ridelink.io/api/v1", "wss://api.ridelink.io/ws")]
    #[case("http://localhost:8080/api/v1", "ws://localhost:8080/ws")]
    #[case("http://localhost:8080/api/v1/", "ws://localhost:8080/ws")]
    #[case("http://localhost:8080", "ws://localhost:8080/ws")]
    fn test_duplex_endpoint(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(duplex_endpoint(base), expected);
    }

    #[rstest]
    fn test_bearer_headers() {
        assert!(bearer_headers(None).is_empty());

        let headers = bearer_headers(Some("token-123"));
        assert_eq!(
            headers,
            vec![("authorization".to_string(), "Bearer token-123".to_string())]
        );
    }
}
