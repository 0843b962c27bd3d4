use serde::Serialize;
use serde_json::Value;

use crate::normalize::LineRecord;

/// Body of a recognition response. `raw_result` is part of the contract but
/// always serialized as null; the engine's raw output is not passed through.
#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub lines: Vec<LineRecord>,
    pub raw_result: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
