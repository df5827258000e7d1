//! Wire shape between [`crate::types::Passage`] and a Qdrant point: the passage's
//! content and citation fields travel as payload, the embedding as the point vector.
//! Qdrant only accepts an unsigned integer or a UUID-formatted string as a point id,
//! so the passage's own (arbitrary) string id never becomes the point id directly —
//! it is hashed into a `u64` via [`point_id_for`] and carried in the payload instead,
//! the same way the teacher derives a point id from tenant/context rather than
//! handing an application identifier straight to the store.

use std::collections::HashMap;

use qdrant_client::qdrant::{PointId, PointStruct, ScoredPoint, Value as QdrantValue, point_id::PointIdOptions};
use serde_json::Map;

use super::VectorDbError;
use crate::hashing::hash_to_u64;
use crate::types::{DocumentStatus, DocumentType, Passage};

/// Derives the numeric Qdrant point id for a passage's application-level string id.
/// Deterministic, so re-upserting the same passage id always lands on the same
/// point.
pub fn point_id_for(passage_id: &str) -> u64 {
    hash_to_u64(passage_id.as_bytes())
}

/// Builds the Qdrant payload for a passage, keeping every field a filter predicate or
/// a citation render might need. `passage_id` travels in the payload since the point
/// id itself is only a hash of it.
pub fn passage_to_payload(passage: &Passage) -> HashMap<String, QdrantValue> {
    let mut payload: HashMap<String, QdrantValue> = HashMap::new();
    payload.insert("passage_id".to_string(), passage.id.clone().into());
    payload.insert("content".to_string(), passage.content.clone().into());
    payload.insert("document_id".to_string(), passage.document_id.clone().into());
    payload.insert("document_title".to_string(), passage.document_title.clone().into());
    payload.insert(
        "hierarchy_path".to_string(),
        passage
            .hierarchy_path
            .iter()
            .map(|s| QdrantValue::from(s.clone()))
            .collect::<Vec<_>>()
            .into(),
    );
    payload.insert(
        "document_type".to_string(),
        document_type_str(passage.document_type).to_string().into(),
    );
    payload.insert("status".to_string(), passage.status.as_str().to_string().into());
    if let Some(valid_until) = &passage.valid_until {
        payload.insert("valid_until".to_string(), valid_until.clone().into());
    }
    for (k, v) in &passage.metadata {
        payload.insert(format!("meta_{k}"), json_value_to_qdrant(v));
    }
    payload
}

/// Recovers a [`Passage`] from a Qdrant point's payload. `point_id` (the hashed,
/// Qdrant-facing id) is only used to label an error if the payload is malformed —
/// the passage's real id is read back out of the payload's `passage_id` field,
/// never derived from the point id itself.
pub fn payload_to_passage(
    point_id: &str,
    payload: &HashMap<String, QdrantValue>,
) -> Result<Passage, VectorDbError> {
    let get_str = |key: &str| -> Option<String> { payload.get(key).and_then(|v| v.as_str()).map(str::to_string) };

    let id = get_str("passage_id").ok_or_else(|| VectorDbError::MalformedPayload {
        point_id: point_id.to_string(),
        reason: "missing 'passage_id'".to_string(),
    })?;
    let content = get_str("content").ok_or_else(|| VectorDbError::MalformedPayload {
        point_id: point_id.to_string(),
        reason: "missing 'content'".to_string(),
    })?;
    let document_id = get_str("document_id").ok_or_else(|| VectorDbError::MalformedPayload {
        point_id: point_id.to_string(),
        reason: "missing 'document_id'".to_string(),
    })?;
    let document_title = get_str("document_title").unwrap_or_default();
    let hierarchy_path = payload
        .get("hierarchy_path")
        .and_then(|v| v.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let document_type = get_str("document_type")
        .as_deref()
        .and_then(parse_document_type)
        .unwrap_or(DocumentType::Other);
    let status = get_str("status")
        .as_deref()
        .and_then(DocumentStatus::parse)
        .ok_or_else(|| VectorDbError::MalformedPayload {
            point_id: point_id.to_string(),
            reason: "missing or invalid 'status'".to_string(),
        })?;
    let valid_until = get_str("valid_until");

    let mut metadata = Map::new();
    for (k, v) in payload {
        if let Some(meta_key) = k.strip_prefix("meta_") {
            metadata.insert(meta_key.to_string(), qdrant_value_to_json(v));
        }
    }

    Ok(Passage {
        id,
        content,
        document_id,
        document_title,
        hierarchy_path,
        document_type,
        status,
        valid_until,
        metadata,
    })
}

/// Builds an upsertable point for a passage + its embedding. The point id is
/// [`point_id_for`]'s hash of the passage id, not the passage id itself — Qdrant's
/// wire format only accepts an unsigned integer or a UUID-formatted string.
pub fn passage_to_point(passage: &Passage, embedding: Vec<f32>) -> PointStruct {
    PointStruct::new(point_id_for(&passage.id), embedding, passage_to_payload(passage))
}

/// Builds the Qdrant point id to fetch by, given a passage's application-level id
/// (used by `fetch`'s `GetPointsBuilder`, which otherwise never sees a passage id).
pub fn point_id_for_lookup(passage_id: &str) -> PointId {
    point_id_for(passage_id).into()
}

/// Converts a Qdrant search hit back into `(point_id, score, payload)` — `point_id`
/// is the hashed, Qdrant-facing id, used only for error diagnostics; the caller
/// recovers the real passage id from the payload via [`payload_to_passage`].
pub fn scored_point_parts(point: ScoredPoint) -> Option<(String, f32, HashMap<String, QdrantValue>)> {
    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => return None,
    };
    Some((id, point.score, point.payload))
}

fn document_type_str(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::Law => "law",
        DocumentType::Decree => "decree",
        DocumentType::Circular => "circular",
        DocumentType::Decision => "decision",
        DocumentType::BiddingForm => "bidding_form",
        DocumentType::Other => "other",
    }
}

fn parse_document_type(s: &str) -> Option<DocumentType> {
    match s {
        "law" => Some(DocumentType::Law),
        "decree" => Some(DocumentType::Decree),
        "circular" => Some(DocumentType::Circular),
        "decision" => Some(DocumentType::Decision),
        "bidding_form" => Some(DocumentType::BiddingForm),
        "other" => Some(DocumentType::Other),
        _ => None,
    }
}

fn json_value_to_qdrant(value: &serde_json::Value) -> QdrantValue {
    match value {
        serde_json::Value::String(s) => s.clone().into(),
        serde_json::Value::Bool(b) => (*b).into(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else {
                n.as_f64().unwrap_or_default().into()
            }
        }
        other => other.to_string().into(),
    }
}

fn qdrant_value_to_json(value: &QdrantValue) -> serde_json::Value {
    if let Some(s) = value.as_str() {
        serde_json::Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        serde_json::Value::Number(i.into())
    } else if let Some(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else {
        serde_json::Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str) -> Passage {
        Passage {
            id: id.to_string(),
            content: "noi dung".to_string(),
            document_id: "doc-1".to_string(),
            document_title: "Luat Dau Thau".to_string(),
            hierarchy_path: vec!["Điều 14".to_string()],
            document_type: DocumentType::Law,
            status: DocumentStatus::Active,
            valid_until: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn point_id_for_is_deterministic_and_not_the_passage_id() {
        let a = point_id_for("doc-1");
        let b = point_id_for("doc-1");
        assert_eq!(a, b);
        assert_ne!(point_id_for("doc-1"), point_id_for("doc-2"));
    }

    #[test]
    fn passage_to_point_uses_a_hashed_numeric_id() {
        let point = passage_to_point(&passage("arbitrary-string-id"), vec![0.1, 0.2]);
        match point.id.and_then(|pid| pid.point_id_options) {
            Some(PointIdOptions::Num(n)) => assert_eq!(n, point_id_for("arbitrary-string-id")),
            other => panic!("expected a numeric point id, got {other:?}"),
        }
    }

    #[test]
    fn payload_round_trips_the_original_passage_id() {
        let original = passage("arbitrary-string-id");
        let payload = passage_to_payload(&original);
        let recovered = payload_to_passage(&point_id_for(&original.id).to_string(), &payload).unwrap();
        assert_eq!(recovered.id, original.id);
        assert_eq!(recovered.content, original.content);
        assert_eq!(recovered.hierarchy_path, original.hierarchy_path);
    }

    #[test]
    fn payload_missing_passage_id_is_malformed() {
        let mut payload = passage_to_payload(&passage("p1"));
        payload.remove("passage_id");
        let err = payload_to_passage("123", &payload).unwrap_err();
        assert!(matches!(err, VectorDbError::MalformedPayload { .. }));
    }
}
