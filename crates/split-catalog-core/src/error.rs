//! Router error types.

use thiserror::Error;

/// Errors that terminate a routed catalog operation.
///
/// Store backends report failures as [`anyhow::Error`]; the router wraps
/// them with the collection they came from.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A create or update sub-request failed.
    #[error("ingest failed in collection '{collection}': {source}")]
    Ingest {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    /// A query sub-request failed.
    #[error("query failed in collection '{collection}': {source}")]
    Query {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    /// Every collection rejected a delete.
    #[error("delete failed in collection '{collection}': {source}")]
    Delete {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    /// A backing-store handle could not be created.
    #[error("could not provision collection '{collection}': {source}")]
    Provision {
        collection: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid collection name '{0}': use ASCII letters, digits, and underscores")]
    InvalidCollectionName(String),

    /// The name is registered as the alias and requested as a collection,
    /// or the other way round.
    #[error("'{collection}' is registered as {existing}, not as {requested}")]
    KindConflict {
        collection: String,
        existing: &'static str,
        requested: &'static str,
    },
}

impl CatalogError {
    /// Collection the error is attributed to.
    pub fn collection(&self) -> &str {
        match self {
            CatalogError::Ingest { collection, .. }
            | CatalogError::Query { collection, .. }
            | CatalogError::Delete { collection, .. }
            | CatalogError::Provision { collection, .. } => collection,
            CatalogError::InvalidCollectionName(name) => name,
            CatalogError::KindConflict { collection, .. } => collection,
        }
    }
}

/// Collection names double as backend identifiers, so keep them to a safe
/// alphabet.
pub fn validate_collection_name(name: &str) -> Result<(), CatalogError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(CatalogError::InvalidCollectionName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_alphabet() {
        assert!(validate_collection_name("history_2").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("drop table").is_err());
        assert!(validate_collection_name("a\"b").is_err());
    }

    #[test]
    fn test_error_names_collection() {
        let err = CatalogError::Ingest {
            collection: "history".into(),
            source: anyhow::anyhow!("disk full"),
        };
        assert_eq!(err.collection(), "history");
        assert!(err.to_string().contains("disk full"));
    }
}
