//! Wire payload deserialization structs
//!
//! Internal shapes of the JSON objects carried in `data:` frames and in
//! single-body JSON responses.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Crisis interrupt: `{"blocked": true, "reason": "CRISIS", "resources": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CrisisBody {
    /// Region code to hotline; numbers are accepted as well as strings
    #[serde(default)]
    pub resources: BTreeMap<String, Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend failure frame sent as `event: error`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}
