//! The 302-byte repeater configuration blob sent once, immediately after
//! authentication completes.
//!
//! The wire contract is the field table below, summing to exactly 302
//! bytes; every field is packed with no padding, and
//! [`Config::to_bytes`]/[`Config::BLOB_LEN`] are asserted to be exactly 302.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn field(
    buf: &mut [u8],
    offset: usize,
    len: usize,
    value: &str,
    pad: u8,
) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(len);
    buf[offset..offset + n].copy_from_slice(&bytes[..n]);
    for b in buf[offset + n..offset + len].iter_mut() {
        *b = pad;
    }
}

/// Repeater configuration sent once per session, right after auth.
///
/// Loading this from a file is an external collaborator's job per the
/// crate's scope, but the shape is `serde`-derived so a JSON config file is
/// one `serde_json::from_str` away for the CLI front-end in [`crate`]'s
/// binary; the wire encoding ([`Config::to_bytes`]) is unrelated to this
/// derive and always produces the fixed 302-byte blob regardless of how the
/// struct was populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub repeater_id: String,
    pub call_sign: String,
    pub rx_freq_hz: String,
    pub tx_freq_hz: String,
    pub tx_power: String,
    pub color_code: String,
    pub latitude: String,
    pub longitude: String,
    pub antenna_height_m: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub software_id: String,
    pub package_id: String,
}

impl Config {
    const REPEATER_ID_LEN: usize = 8;
    const CALL_SIGN_LEN: usize = 8;
    const RX_FREQ_LEN: usize = 9;
    const TX_FREQ_LEN: usize = 9;
    const TX_POWER_LEN: usize = 2;
    const COLOR_CODE_LEN: usize = 2;
    const LATITUDE_LEN: usize = 8;
    const LONGITUDE_LEN: usize = 9;
    const ANTENNA_HEIGHT_LEN: usize = 3;
    const LOCATION_LEN: usize = 20;
    const DESCRIPTION_LEN: usize = 19;
    const URL_LEN: usize = 124;
    const SOFTWARE_ID_LEN: usize = 40;
    const PACKAGE_ID_LEN: usize = 40;

    /// Total wire size of the blob: exactly 302 bytes.
    pub const BLOB_LEN: usize = Self::REPEATER_ID_LEN
        + Self::CALL_SIGN_LEN
        + Self::RX_FREQ_LEN
        + Self::TX_FREQ_LEN
        + Self::TX_POWER_LEN
        + Self::COLOR_CODE_LEN
        + Self::LATITUDE_LEN
        + Self::LONGITUDE_LEN
        + Self::ANTENNA_HEIGHT_LEN
        + Self::LOCATION_LEN
        + Self::DESCRIPTION_LEN
        + Self::URL_LEN
        + Self::SOFTWARE_ID_LEN
        + Self::PACKAGE_ID_LEN;

    /// Validate field lengths and serialize to the fixed 302-byte blob.
    /// ASCII fields are space-padded on the right; numeric-looking fields
    /// (repeater id, frequencies, power, color code) are expected
    /// right-justified by the caller, per the field contract.
    pub fn to_bytes(&self) -> Result<[u8; Self::BLOB_LEN]> {
        for (name, value, max_len) in [
            ("repeater_id", &self.repeater_id, Self::REPEATER_ID_LEN),
            ("call_sign", &self.call_sign, Self::CALL_SIGN_LEN),
            ("rx_freq_hz", &self.rx_freq_hz, Self::RX_FREQ_LEN),
            ("tx_freq_hz", &self.tx_freq_hz, Self::TX_FREQ_LEN),
            ("tx_power", &self.tx_power, Self::TX_POWER_LEN),
            ("color_code", &self.color_code, Self::COLOR_CODE_LEN),
            ("latitude", &self.latitude, Self::LATITUDE_LEN),
            ("longitude", &self.longitude, Self::LONGITUDE_LEN),
            ("antenna_height_m", &self.antenna_height_m, Self::ANTENNA_HEIGHT_LEN),
            ("location", &self.location, Self::LOCATION_LEN),
            ("description", &self.description, Self::DESCRIPTION_LEN),
            ("url", &self.url, Self::URL_LEN),
            ("software_id", &self.software_id, Self::SOFTWARE_ID_LEN),
            ("package_id", &self.package_id, Self::PACKAGE_ID_LEN),
        ] {
            if !value.is_ascii() || value.len() > max_len {
                return Err(Error::InvalidArgument(format!(
                    "config field {name} must be ASCII and at most {max_len} bytes, got {value:?}"
                )));
            }
        }

        let mut buf = [0u8; Self::BLOB_LEN];
        let mut offset = 0;
        for (value, len) in [
            (&self.repeater_id, Self::REPEATER_ID_LEN),
            (&self.call_sign, Self::CALL_SIGN_LEN),
            (&self.rx_freq_hz, Self::RX_FREQ_LEN),
            (&self.tx_freq_hz, Self::TX_FREQ_LEN),
            (&self.tx_power, Self::TX_POWER_LEN),
            (&self.color_code, Self::COLOR_CODE_LEN),
            (&self.latitude, Self::LATITUDE_LEN),
            (&self.longitude, Self::LONGITUDE_LEN),
            (&self.antenna_height_m, Self::ANTENNA_HEIGHT_LEN),
            (&self.location, Self::LOCATION_LEN),
            (&self.description, Self::DESCRIPTION_LEN),
            (&self.url, Self::URL_LEN),
            (&self.software_id, Self::SOFTWARE_ID_LEN),
            (&self.package_id, Self::PACKAGE_ID_LEN),
        ] {
            field(&mut buf, offset, len, value, b' ');
            offset += len;
        }
        debug_assert_eq!(offset, Self::BLOB_LEN);
        Ok(buf)
    }

    /// Load a `Config` from a JSON file. Config-file *discovery* (where to
    /// look, env overrides, reload-on-SIGHUP) is the CLI front-end's job;
    /// this is just the deserialization step the core offers it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidArgument(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidArgument(format!("parsing {}: {e}", path.display())))
    }
}

const _: () = assert!(Config::BLOB_LEN == 302, "config blob must be exactly 302 bytes");
