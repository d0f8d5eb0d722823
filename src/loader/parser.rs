use serde::de::DeserializeOwned;
use std::fs;

use crate::error::Result;

/// Reads `file_path` and parses it as JSON into `T`.
///
/// I/O failures surface as `Error::IoError`, malformed documents as `Error::DeserializationError`.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    parse_json_str(&data)
}

pub fn parse_json_str<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}
