//! Patch loading and application.

use serde_yaml::{Mapping, Value};
use tracing::trace;

use crate::config::{parse_documents, value_kind, Configuration, DocumentKey};
use crate::error::PatchError;

/// Directive key used by strategic merge patches.
const PATCH_DIRECTIVE: &str = "$patch";

/// Directive value that deletes the addressed key or document.
const PATCH_DELETE: &str = "delete";

/// A parsed configuration patch.
#[derive(Debug, Clone)]
pub enum Patch {
    /// RFC 6902 operation list, applied to a single-document configuration.
    Json(json_patch::Patch),

    /// Strategic merge documents, merged into the matching base documents.
    StrategicMerge(Vec<Mapping>),
}

impl Patch {
    /// Parse one patch text.
    ///
    /// A YAML (or JSON) sequence of operation mappings is a JSON patch; one or
    /// more mapping documents form a strategic merge patch. Empty text is an
    /// empty strategic merge patch.
    pub fn parse(index: usize, text: &str) -> Result<Self, PatchError> {
        let load_err = |message: String| PatchError::Load { index, message };

        if let Ok(Value::Sequence(ops)) = serde_yaml::from_str::<Value>(text) {
            return Self::parse_json_patch(ops).map_err(load_err);
        }

        let documents = parse_documents(text).map_err(load_err)?;
        Ok(Self::StrategicMerge(documents))
    }

    fn parse_json_patch(ops: Vec<Value>) -> Result<Self, String> {
        if let Some(op) = ops.iter().find(|op| !op.is_mapping()) {
            return Err(format!(
                "JSON patch operations must be mappings, found a {}",
                value_kind(op)
            ));
        }

        let json = serde_json::to_value(Value::Sequence(ops)).map_err(|e| e.to_string())?;
        let patch: json_patch::Patch =
            serde_json::from_value(json).map_err(|e| format!("invalid JSON patch: {e}"))?;

        Ok(Self::Json(patch))
    }

    /// Returns true for RFC 6902 patches.
    pub fn is_json_patch(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    pub(crate) fn apply_to(
        &self,
        index: usize,
        config: &mut Configuration,
    ) -> Result<(), PatchError> {
        match self {
            Self::Json(ops) => apply_json_patch(index, ops, config),
            Self::StrategicMerge(documents) => {
                for doc in documents {
                    apply_strategic_document(index, doc, config)?;
                }
                Ok(())
            }
        }
    }
}

fn apply_json_patch(
    index: usize,
    ops: &json_patch::Patch,
    config: &mut Configuration,
) -> Result<(), PatchError> {
    if !config.is_single_document() {
        return Err(PatchError::MultiDocumentJsonPatch { index });
    }

    let apply_err = |message: String| PatchError::Apply { index, message };

    let documents = config.documents_mut();
    let mut json =
        serde_json::to_value(&documents[0]).map_err(|e| apply_err(e.to_string()))?;

    json_patch::patch(&mut json, &ops.0).map_err(|e| apply_err(e.to_string()))?;

    match serde_yaml::to_value(&json).map_err(|e| apply_err(e.to_string()))? {
        Value::Mapping(map) => {
            documents[0] = map;
            Ok(())
        }
        other => Err(apply_err(format!(
            "patched document is a {}, expected a mapping",
            value_kind(&other)
        ))),
    }
}

fn apply_strategic_document(
    index: usize,
    doc: &Mapping,
    config: &mut Configuration,
) -> Result<(), PatchError> {
    let key = DocumentKey::of(doc);
    let position = config.position(&key);
    trace!(patch = index, document = %key, found = position.is_some(), "Merging patch document");

    if is_delete_directive(doc) {
        return match (key, position) {
            (DocumentKey::Primary, _) => Err(PatchError::Apply {
                index,
                message: "the v1alpha1 document cannot be deleted".to_string(),
            }),
            (key, None) => Err(PatchError::Apply {
                index,
                message: format!("document {key} not found"),
            }),
            (_, Some(position)) => {
                config.documents_mut().remove(position);
                Ok(())
            }
        };
    }

    match (key, position) {
        (_, Some(position)) => {
            merge_mapping(&mut config.documents_mut()[position], doc);
            Ok(())
        }
        (DocumentKey::Primary, None) => Err(PatchError::Apply {
            index,
            message: "configuration has no v1alpha1 document to merge into".to_string(),
        }),
        (DocumentKey::Typed { .. }, None) => {
            config.documents_mut().push(strip_directives(doc));
            Ok(())
        }
    }
}

fn is_delete_directive(map: &Mapping) -> bool {
    map.get(PATCH_DIRECTIVE).and_then(Value::as_str) == Some(PATCH_DELETE)
}

/// Merge `patch` into `target`: mappings recurse, sequences append, anything
/// else replaces.
fn merge_mapping(target: &mut Mapping, patch: &Mapping) {
    for (key, value) in patch {
        if key.as_str() == Some(PATCH_DIRECTIVE) {
            continue;
        }

        if let Value::Mapping(inner) = value {
            if is_delete_directive(inner) {
                target.remove(key);
                continue;
            }
        }

        match target.get_mut(key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key.clone(), strip_value(value));
            }
        }
    }
}

fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Mapping(target), Value::Mapping(patch)) => merge_mapping(target, patch),
        (Value::Sequence(target), Value::Sequence(patch)) => {
            target.extend(patch.iter().map(strip_value));
        }
        (target, patch) => *target = strip_value(patch),
    }
}

fn strip_directives(map: &Mapping) -> Mapping {
    map.iter()
        .filter(|(k, _)| k.as_str() != Some(PATCH_DIRECTIVE))
        .map(|(k, v)| (k.clone(), strip_value(v)))
        .collect()
}

fn strip_value(value: &Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(strip_directives(map)),
        Value::Sequence(seq) => Value::Sequence(seq.iter().map(strip_value).collect()),
        other => other.clone(),
    }
}
