//! Object metadata

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Keys a caller may set on an object
const SETTABLE_KEYS: [&str; 6] = [
    "cacheControl",
    "contentDisposition",
    "contentEncoding",
    "contentLanguage",
    "contentType",
    "customMetadata",
];

/// Metadata a caller can set on upload or update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettableMetadata {
    /// `Cache-Control` served with the object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// `Content-Disposition` served with the object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// `Content-Encoding` served with the object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// `Content-Language` served with the object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// MIME type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// User-defined string pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<HashMap<String, String>>,
}

impl SettableMetadata {
    /// Metadata with only a content type
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Default::default()
        }
    }

    /// Request body for the storage REST API, which nests custom pairs under `metadata`
    pub(crate) fn to_wire(&self) -> Map<String, Value> {
        let mut body = Map::new();
        let fields = [
            ("cacheControl", &self.cache_control),
            ("contentDisposition", &self.content_disposition),
            ("contentEncoding", &self.content_encoding),
            ("contentLanguage", &self.content_language),
            ("contentType", &self.content_type),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                body.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(custom) = &self.custom_metadata {
            let custom = custom
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            body.insert("metadata".to_string(), Value::Object(custom));
        }
        body
    }
}

/// Validate loosely typed metadata and convert it
///
/// Only settable keys are accepted. `customMetadata` must be an object of
/// strings. Other values must be strings or `null`.
pub fn validate_metadata(metadata: &Value) -> Result<SettableMetadata, StorageError> {
    let Some(map) = metadata.as_object() else {
        return Err(StorageError::InvalidArgument("metadata must be an object".to_string()));
    };

    for (key, value) in map {
        if !SETTABLE_KEYS.contains(&key.as_str()) {
            return Err(StorageError::InvalidArgument(format!(
                "unknown metadata property '{}'",
                key
            )));
        }

        if key == "customMetadata" {
            let Some(custom) = value.as_object() else {
                if value.is_null() {
                    continue;
                }
                return Err(StorageError::InvalidArgument(
                    "'customMetadata' must be an object".to_string(),
                ));
            };
            if let Some((k, _)) = custom.iter().find(|(_, v)| !v.is_string()) {
                return Err(StorageError::InvalidArgument(format!(
                    "'customMetadata.{}' must be a string",
                    k
                )));
            }
        } else if !(value.is_string() || value.is_null()) {
            return Err(StorageError::InvalidArgument(format!("'{}' must be a string", key)));
        }
    }

    serde_json::from_value(metadata.clone()).map_err(|e| StorageError::InvalidArgument(e.to_string()))
}

/// Metadata of a stored object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullMetadata {
    /// Bucket containing the object
    pub bucket: String,
    /// Full path of the object
    pub full_path: String,
    /// Last path segment
    pub name: String,
    /// Object generation
    pub generation: Option<String>,
    /// Metadata generation
    pub metageneration: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// RFC 3339 creation time
    pub time_created: Option<String>,
    /// RFC 3339 update time
    pub updated: Option<String>,
    /// Base64 MD5 of the content
    pub md5_hash: Option<String>,
    /// Settable fields
    pub settable: SettableMetadata,
    pub(crate) download_tokens: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectResource {
    #[serde(default)]
    bucket: String,
    #[serde(default)]
    name: String,
    generation: Option<String>,
    metageneration: Option<String>,
    size: Option<String>,
    time_created: Option<String>,
    updated: Option<String>,
    md5_hash: Option<String>,
    cache_control: Option<String>,
    content_disposition: Option<String>,
    content_encoding: Option<String>,
    content_language: Option<String>,
    content_type: Option<String>,
    metadata: Option<HashMap<String, String>>,
    download_tokens: Option<String>,
}

impl From<ObjectResource> for FullMetadata {
    fn from(resource: ObjectResource) -> Self {
        let name = resource
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            bucket: resource.bucket,
            full_path: resource.name,
            name,
            generation: resource.generation,
            metageneration: resource.metageneration,
            size: resource.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            time_created: resource.time_created,
            updated: resource.updated,
            md5_hash: resource.md5_hash,
            settable: SettableMetadata {
                cache_control: resource.cache_control,
                content_disposition: resource.content_disposition,
                content_encoding: resource.content_encoding,
                content_language: resource.content_language,
                content_type: resource.content_type,
                custom_metadata: resource.metadata,
            },
            download_tokens: resource.download_tokens,
        }
    }
}

impl FullMetadata {
    /// First download token, if the object has one
    pub(crate) fn download_token(&self) -> Option<&str> {
        self.download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_metadata_accepts_settable_keys() {
        let metadata = validate_metadata(&json!({
            "contentType": "image/png",
            "cacheControl": null,
            "customMetadata": { "owner": "me" }
        }))
        .unwrap();
        assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
        assert_eq!(metadata.cache_control, None);
        assert_eq!(metadata.custom_metadata.unwrap()["owner"], "me");
    }

    #[test]
    fn test_validate_metadata_rejects() {
        assert!(validate_metadata(&json!("nope")).is_err());
        assert!(validate_metadata(&json!({ "size": "1" })).is_err());
        assert!(validate_metadata(&json!({ "contentType": 5 })).is_err());
        assert!(validate_metadata(&json!({ "customMetadata": { "n": 1 } })).is_err());
        assert!(validate_metadata(&json!({ "customMetadata": [] })).is_err());
    }

    #[test]
    fn test_to_wire_nests_custom_metadata() {
        let mut custom = HashMap::new();
        custom.insert("k".to_string(), "v".to_string());
        let metadata = SettableMetadata {
            content_type: Some("text/plain".to_string()),
            custom_metadata: Some(custom),
            ..Default::default()
        };
        assert_eq!(
            Value::Object(metadata.to_wire()),
            json!({ "contentType": "text/plain", "metadata": { "k": "v" } })
        );
    }

    #[test]
    fn test_from_resource() {
        let resource: ObjectResource = serde_json::from_value(json!({
            "bucket": "b",
            "name": "images/cat.png",
            "size": "1024",
            "contentType": "image/png",
            "downloadTokens": "tok1,tok2",
            "metadata": { "a": "b" }
        }))
        .unwrap();
        let metadata = FullMetadata::from(resource);
        assert_eq!(metadata.name, "cat.png");
        assert_eq!(metadata.full_path, "images/cat.png");
        assert_eq!(metadata.size, 1024);
        assert_eq!(metadata.download_token(), Some("tok1"));
        assert_eq!(metadata.settable.custom_metadata.unwrap()["a"], "b");
    }
}
