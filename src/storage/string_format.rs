//! Decoding of `put_string` payloads

use crate::error::StorageError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encoding of a string passed to `put_string`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// UTF-8 text uploaded as-is
    #[default]
    Raw,
    /// Standard base64
    Base64,
    /// URL-safe base64
    Base64Url,
    /// `data:[<media type>][;base64],<data>`
    DataUrl,
}

impl StringFormat {
    /// Wire name (`raw`, `base64`, `base64url`, `data_url`)
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::Raw => "raw",
            StringFormat::Base64 => "base64",
            StringFormat::Base64Url => "base64url",
            StringFormat::DataUrl => "data_url",
        }
    }
}

/// Bytes decoded from a string, plus the media type of a data URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedString {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub(crate) fn decode(value: &str, format: StringFormat) -> Result<DecodedString, StorageError> {
    let bytes = match format {
        StringFormat::Raw => value.as_bytes().to_vec(),
        StringFormat::Base64 => BASE64
            .decode(value)
            .map_err(|_| StorageError::InvalidArgument("string is not valid base64".to_string()))?,
        StringFormat::Base64Url => BASE64_URL
            .decode(value)
            .map_err(|_| StorageError::InvalidArgument("string is not valid base64url".to_string()))?,
        StringFormat::DataUrl => return decode_data_url(value),
    };
    Ok(DecodedString {
        bytes,
        content_type: None,
    })
}

fn decode_data_url(value: &str) -> Result<DecodedString, StorageError> {
    let invalid = || StorageError::InvalidArgument("invalid data_url string provided".to_string());

    let rest = value.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, data) = rest.split_once(',').ok_or_else(invalid)?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };

    let bytes = if is_base64 {
        BASE64.decode(data).map_err(|_| invalid())?
    } else {
        urlencoding::decode_binary(data.as_bytes()).into_owned()
    };

    // Parameters such as `;charset=utf-8` stay part of the content type
    let content_type = (!media_type.is_empty()).then(|| media_type.to_string());

    Ok(DecodedString { bytes, content_type })
}
