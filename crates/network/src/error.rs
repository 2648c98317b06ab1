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

use thiserror::Error;

/// Errors raised by the duplex client.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The underlying WebSocket transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// A configured header name or value was not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A reconnection attempt did not complete within the configured timeout.
    #[error("Reconnection timed out after {0}s")]
    ReconnectTimeout(f64),

    /// The client is closed and can no longer send.
    #[error("Client is closed")]
    Closed,
}
