//! Validator keys file: a JSON list of hex-encoded BLS public keys.
//!
//! Every key listed gets a proposal history partition at startup.

use std::path::Path;

use slashguard_types::pubkey::ValidatorPubkey;

#[derive(Debug, thiserror::Error)]
pub enum KeysFileError {
    #[error("failed to read validators file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse validators file: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn read_validators_file(path: &Path) -> Result<Vec<ValidatorPubkey>, KeysFileError> {
    let contents = std::fs::read_to_string(path)?;
    parse_validators(&contents)
}

pub fn parse_validators(json: &str) -> Result<Vec<ValidatorPubkey>, KeysFileError> {
    Ok(serde_json::from_str(json)?)
}
