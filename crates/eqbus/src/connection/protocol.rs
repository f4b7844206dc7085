// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker wire protocol.
//!
//! Length-prefixed JSON, one request and one reply per TCP connection:
//!
//! ```text
//! -> {"type":"query","service":"sensors"}
//! <- {"type":"endpoints","endpoints":["tcp://10.0.0.5:41234"]}
//! <- {"type":"error","message":"unknown service 'sensors'"}
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Client to broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BrokerRequest {
    /// Ask for the broker's endpoints. `None` accepts any table name.
    #[serde(rename = "query")]
    Query {
        #[serde(default)]
        service: Option<String>,
    },
}

/// Broker to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BrokerReply {
    #[serde(rename = "endpoints")]
    Endpoints { endpoints: Vec<String> },

    #[serde(rename = "error")]
    Error { message: String },
}

impl BrokerRequest {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Protocol(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Protocol(format!("malformed broker request: {}", e)))
    }
}

impl BrokerReply {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Protocol(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Protocol(format!("malformed broker reply: {}", e)))
    }
}
