//! Request bodies and identifier validation.

use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;

/// Longest identifier accepted.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Most image URLs accepted in one document request.
pub const MAX_DOCUMENT_URLS: usize = 100;

/// Body of `POST /api/make-pdf`.
///
/// Either `identifier` (or its older name `stockNum`) with `selectedIndexes`,
/// or `images` with a list of URLs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakePdfRequest {
    #[serde(alias = "stockNum")]
    pub identifier: Option<String>,
    /// Kept loose so a non-array is reported as a validation error.
    pub selected_indexes: Option<Value>,
    pub images: Option<Vec<String>>,
}

/// Where the pages of a document come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Cached pages of one item, in the requested order.
    Cached {
        identifier: String,
        indices: Vec<usize>,
    },
    /// Freshly fetched URLs, bypassing the cache.
    Urls(Vec<String>),
}

impl MakePdfRequest {
    pub fn into_source(self) -> Result<DocumentSource, ApiError> {
        match (self.identifier, self.images) {
            (Some(identifier), _) => {
                let identifier = validate_identifier(&identifier)?;
                let indices = match self.selected_indexes {
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(Value::as_u64)
                        .filter_map(|i| usize::try_from(i).ok())
                        .collect(),
                    _ => {
                        return Err(ApiError::Validation(
                            "selectedIndexes must be an array".to_string(),
                        ))
                    }
                };
                Ok(DocumentSource::Cached {
                    identifier,
                    indices,
                })
            }
            (None, Some(urls)) if urls.len() > MAX_DOCUMENT_URLS => Err(ApiError::Validation(
                format!("at most {MAX_DOCUMENT_URLS} images per document"),
            )),
            (None, Some(urls)) => Ok(DocumentSource::Urls(urls)),
            (None, None) => Err(ApiError::Validation(
                "identifier or images is required".to_string(),
            )),
        }
    }
}

/// Trim and check an item identifier.
///
/// Identifiers end up in origin URL paths, so only ASCII letters, digits,
/// `-` and `_` are allowed.
pub fn validate_identifier(raw: &str) -> Result<String, ApiError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ApiError::Validation("identifier is empty".to_string()));
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(ApiError::Validation("identifier is too long".to_string()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::Validation(format!(
            "identifier contains invalid characters: {id}"
        )));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> Result<DocumentSource, ApiError> {
        serde_json::from_value::<MakePdfRequest>(body)
            .unwrap()
            .into_source()
    }

    fn rejected(body: Value) -> bool {
        matches!(parse(body), Err(ApiError::Validation(_)))
    }

    #[test]
    fn test_cached_source() {
        let body = json!({"identifier": "M123", "selectedIndexes": [0, 2]});
        assert_eq!(
            parse(body).unwrap(),
            DocumentSource::Cached {
                identifier: "M123".into(),
                indices: vec![0, 2]
            }
        );
    }

    #[test]
    fn test_stock_num_alias() {
        let body = json!({"stockNum": "M123", "selectedIndexes": [1]});
        assert_eq!(
            parse(body).unwrap(),
            DocumentSource::Cached {
                identifier: "M123".into(),
                indices: vec![1]
            }
        );
    }

    #[test]
    fn test_non_integer_indexes_skipped() {
        let body = json!({"identifier": "M1", "selectedIndexes": [0, -1, "2", 1.5, 3]});
        assert_eq!(
            parse(body).unwrap(),
            DocumentSource::Cached {
                identifier: "M1".into(),
                indices: vec![0, 3]
            }
        );
    }

    #[test]
    fn test_indexes_must_be_array() {
        assert!(rejected(json!({"identifier": "M1", "selectedIndexes": "0,1"})));
        assert!(rejected(json!({"identifier": "M1"})));
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert!(rejected(json!({"identifier": "  ", "selectedIndexes": []})));
    }

    #[test]
    fn test_url_source() {
        let src = parse(json!({"images": ["https://a.test/1.jpg"]})).unwrap();
        let expected = vec!["https://a.test/1.jpg".to_string()];
        assert_eq!(src, DocumentSource::Urls(expected));
    }

    #[test]
    fn test_url_list_is_capped() {
        let urls: Vec<String> = (0..MAX_DOCUMENT_URLS)
            .map(|i| format!("https://a.test/{i}.jpg"))
            .collect();
        assert!(parse(json!({ "images": urls })).is_ok());

        let urls: Vec<String> = (0..=MAX_DOCUMENT_URLS)
            .map(|i| format!("https://a.test/{i}.jpg"))
            .collect();
        assert!(rejected(json!({ "images": urls })));
    }

    #[test]
    fn test_empty_body_rejected() {
        assert!(parse(json!({})).is_err());
    }

    #[test]
    fn test_identifier_charset() {
        assert_eq!(validate_identifier(" M20815 ").unwrap(), "M20815");
        assert!(validate_identifier("M1/../x").is_err());
        assert!(validate_identifier("M1?page=2").is_err());
        assert!(validate_identifier(&"M".repeat(65)).is_err());
    }
}
