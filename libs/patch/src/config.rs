//! Machine configuration document stream.
//!
//! A machine configuration is one or more YAML documents separated by `---`.
//! The first document without a `kind` key is the primary (`v1alpha1`)
//! document; every other document is addressed by its `kind` and optional
//! `name`.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::PatchError;

const DOCUMENT_SEPARATOR: &str = "---\n";

/// Identity of a document inside a configuration stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DocumentKey {
    /// The kind-less primary document.
    Primary,
    /// A typed document, optionally named.
    Typed { kind: String, name: Option<String> },
}

impl DocumentKey {
    pub(crate) fn of(doc: &Mapping) -> Self {
        match doc.get("kind").and_then(Value::as_str) {
            Some(kind) => Self::Typed {
                kind: kind.to_string(),
                name: doc.get("name").and_then(Value::as_str).map(str::to_string),
            },
            None => Self::Primary,
        }
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "v1alpha1"),
            Self::Typed { kind, name: None } => write!(f, "{kind}"),
            Self::Typed {
                kind,
                name: Some(name),
            } => write!(f, "{kind}/{name}"),
        }
    }
}

/// A parsed machine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    documents: Vec<Mapping>,

    /// Original bytes, kept while no patch has touched the documents.
    raw: Option<Vec<u8>>,
}

impl Configuration {
    /// Parse a configuration from YAML text.
    pub fn parse(input: &str) -> Result<Self, PatchError> {
        let documents = parse_documents(input).map_err(PatchError::InvalidBase)?;

        if documents.is_empty() {
            return Err(PatchError::InvalidBase(
                "configuration contains no documents".to_string(),
            ));
        }

        Ok(Self {
            documents,
            raw: Some(input.as_bytes().to_vec()),
        })
    }

    /// The documents in stream order.
    pub fn documents(&self) -> &[Mapping] {
        &self.documents
    }

    /// Number of documents in the stream.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the stream holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns true if the configuration is a single document.
    pub fn is_single_document(&self) -> bool {
        self.documents.len() == 1
    }

    /// Serialize the configuration.
    ///
    /// An untouched configuration returns its input bytes verbatim; a patched
    /// one is re-emitted document by document in stream order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PatchError> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }

        let mut out = String::new();
        for (i, doc) in self.documents.iter().enumerate() {
            if i > 0 {
                out.push_str(DOCUMENT_SEPARATOR);
            }
            let text =
                serde_yaml::to_string(doc).map_err(|e| PatchError::Serialize(e.to_string()))?;
            out.push_str(&text);
        }

        Ok(out.into_bytes())
    }

    pub(crate) fn documents_mut(&mut self) -> &mut Vec<Mapping> {
        self.raw = None;
        &mut self.documents
    }

    pub(crate) fn position(&self, key: &DocumentKey) -> Option<usize> {
        self.documents
            .iter()
            .position(|doc| DocumentKey::of(doc) == *key)
    }
}

/// Split a YAML stream into mapping documents, dropping empty documents.
pub(crate) fn parse_documents(input: &str) -> Result<Vec<Mapping>, String> {
    let mut documents = Vec::new();

    for (i, de) in serde_yaml::Deserializer::from_str(input).enumerate() {
        let value = Value::deserialize(de).map_err(|e| e.to_string())?;
        match value {
            Value::Null => continue,
            Value::Mapping(map) => documents.push(map),
            other => {
                return Err(format!(
                    "document {i} is a {}, expected a mapping",
                    value_kind(&other)
                ))
            }
        }
    }

    Ok(documents)
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multi_document() {
        let cfg = Configuration::parse(
            "version: v1alpha1\nmachine:\n  type: worker\n---\napiVersion: v1alpha1\nkind: SideroLinkConfig\n",
        )
        .unwrap();

        assert_eq!(cfg.len(), 2);
        assert_eq!(DocumentKey::of(&cfg.documents()[0]), DocumentKey::Primary);
        assert_eq!(
            DocumentKey::of(&cfg.documents()[1]).to_string(),
            "SideroLinkConfig"
        );
    }

    #[test]
    fn test_parse_skips_empty_documents() {
        let cfg = Configuration::parse("---\nversion: v1alpha1\n---\n").unwrap();
        assert!(cfg.is_single_document());
        assert!(!cfg.is_empty());
        assert_eq!(cfg.documents().len(), 1);
    }

    #[test]
    fn test_parse_rejects_scalar_document() {
        let err = Configuration::parse("just a string").unwrap_err();
        assert!(matches!(err, PatchError::InvalidBase(_)));
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        let err = Configuration::parse("").unwrap_err();
        assert!(matches!(err, PatchError::InvalidBase(_)));
    }

    #[test]
    fn test_untouched_configuration_is_verbatim() {
        let input = "# comment survives\nversion: v1alpha1\n";
        let cfg = Configuration::parse(input).unwrap();
        assert_eq!(cfg.to_bytes().unwrap(), input.as_bytes());
    }

    #[test]
    fn test_named_document_key() {
        let cfg = Configuration::parse(
            "apiVersion: v1alpha1\nkind: ExtensionServiceConfig\nname: nut-client\n",
        )
        .unwrap();
        assert_eq!(
            DocumentKey::of(&cfg.documents()[0]).to_string(),
            "ExtensionServiceConfig/nut-client"
        );
    }
}
