use napi::Result as NapiResult;
use napi_derive::napi;

use crypto_index_core::index_construction::verification::{verify_history, VerificationInput};
use crypto_index_core::IndexCalculationInput;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Run the chain-linked engine over JSON period data; returns the output
/// envelope with the full history and per-period reports.
#[napi]
pub fn calculate_index(input_json: String) -> NapiResult<String> {
    let input: IndexCalculationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = crypto_index_core::calculate_index(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn verify_index_history(input_json: String) -> NapiResult<String> {
    let input: VerificationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let report = verify_history(&input).map_err(to_napi_error)?;
    serde_json::to_string(&report).map_err(to_napi_error)
}
