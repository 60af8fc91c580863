use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, oid::ObjectId};
use tokio::sync::RwLock;

use super::{
    DeleteOutcome, DocumentStore, FindSpec, InsertOutcome, StoreError, StoreResult,
    UpdateOutcome,
};

/// In-process [`DocumentStore`].
///
/// Collections keep insertion order, which stands in for MongoDB's natural
/// order. Filters support top-level equality and `$gt`, projections are
/// inclusive only, and updates support `$set` only.
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    acknowledge_writes: AtomicBool,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            acknowledge_writes: AtomicBool::new(true),
            available: AtomicBool::new(true),
        }
    }

    /// Writes still land but report `acknowledged: false`, as under `w: 0`.
    pub fn set_acknowledge_writes(&self, acknowledge: bool) {
        self.acknowledge_writes
            .store(acknowledge, AtomicOrdering::SeqCst);
    }

    /// While unavailable every call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Number of documents currently held in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindSpec,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_available()?;

        let mut found = Vec::new();
        {
            let collections = self.collections.read().await;
            if let Some(documents) = collections.get(collection) {
                for document in documents {
                    if matches(document, &filter)? {
                        found.push(document.clone());
                    }
                }
            }
        }

        if let Some(sort) = &options.sort {
            sort_documents(&mut found, sort);
        }
        // A zero limit means no limit; a negative one is treated as its magnitude.
        if let Some(limit) = options.limit.filter(|limit| *limit != 0) {
            found.truncate(usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX));
        }
        if let Some(projection) = &options.projection {
            found = found
                .into_iter()
                .map(|document| project(document, projection))
                .collect();
        }

        Ok(found)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        self.ensure_available()?;

        let collections = self.collections.read().await;
        if let Some(documents) = collections.get(collection) {
            for document in documents {
                if matches(document, &filter)? {
                    return Ok(Some(document.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
    ) -> StoreResult<InsertOutcome> {
        self.ensure_available()?;

        let id = document
            .remove("_id")
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
        let mut stored = Document::new();
        stored.insert("_id", id.clone());
        for (field, value) in document {
            stored.insert(field, value);
        }

        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents
            .iter()
            .any(|existing| existing.get("_id") == Some(&id))
        {
            return Err(StoreError::DuplicateKey(id));
        }
        documents.push(stored);

        Ok(InsertOutcome {
            acknowledged: self.acknowledge_writes.load(AtomicOrdering::SeqCst),
            inserted_id: id,
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        self.ensure_available()?;
        let set = set_fields(&update)?;

        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            for document in documents.iter_mut() {
                if !matches(document, &filter)? {
                    continue;
                }
                // MongoDB only counts a document as modified when a value actually changes.
                let mut modified = false;
                for (field, value) in set {
                    if document.get(field) != Some(value) {
                        document.insert(field.clone(), value.clone());
                        modified = true;
                    }
                }
                return Ok(UpdateOutcome {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                });
            }
        }

        Ok(UpdateOutcome {
            matched_count: 0,
            modified_count: 0,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<DeleteOutcome> {
        self.ensure_available()?;

        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            let mut position = None;
            for (index, document) in documents.iter().enumerate() {
                if matches(document, &filter)? {
                    position = Some(index);
                    break;
                }
            }
            if let Some(index) = position {
                documents.remove(index);
                return Ok(DeleteOutcome { deleted_count: 1 });
            }
        }

        Ok(DeleteOutcome { deleted_count: 0 })
    }
}

fn set_fields(update: &Document) -> StoreResult<&Document> {
    let mut set = None;
    for (operator, fields) in update {
        match (operator.as_str(), fields) {
            ("$set", Bson::Document(fields)) => set = Some(fields),
            _ => return Err(StoreError::UnsupportedOperator(operator.clone())),
        }
    }
    set.ok_or_else(|| StoreError::UnsupportedOperator("<empty update>".to_string()))
}

fn matches(document: &Document, filter: &Document) -> StoreResult<bool> {
    for (field, expected) in filter {
        // Missing fields compare as null, as they do on the server.
        let actual = document.get(field).unwrap_or(&Bson::Null);
        let matched = match expected {
            Bson::Document(operators) if is_operator_document(operators) => {
                matches_operators(actual, operators)?
            }
            _ => values_equal(actual, expected),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn matches_operators(actual: &Bson, operators: &Document) -> StoreResult<bool> {
    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$gt" => compare_same_type(actual, operand) == Some(Ordering::Greater),
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    left == right || compare_same_type(left, right) == Some(Ordering::Equal)
}

/// Comparison operators only match within one type bracket.
fn compare_same_type(left: &Bson, right: &Bson) -> Option<Ordering> {
    if type_rank(left) != type_rank(right) {
        return None;
    }
    compare_values(left, right)
}

/// BSON cross-type sort order.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Match-time comparison. `None` when the values are not comparable, which
/// includes NaN against any number.
fn compare_values(left: &Bson, right: &Bson) -> Option<Ordering> {
    match (left, right) {
        (Bson::String(l), Bson::String(r)) => Some(l.cmp(r)),
        (Bson::ObjectId(l), Bson::ObjectId(r)) => Some(l.bytes().cmp(&r.bytes())),
        (Bson::Boolean(l), Bson::Boolean(r)) => Some(l.cmp(r)),
        (Bson::DateTime(l), Bson::DateTime(r)) => {
            Some(l.timestamp_millis().cmp(&r.timestamp_millis()))
        }
        (Bson::Null | Bson::Undefined, Bson::Null | Bson::Undefined) => Some(Ordering::Equal),
        _ => match (as_f64(left), as_f64(right)) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => (left == right).then_some(Ordering::Equal),
        },
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

/// Total order used by `sort`: type bracket first, then value.
fn sort_order(left: &Bson, right: &Bson) -> Ordering {
    type_rank(left)
        .cmp(&type_rank(right))
        .then_with(|| match (left, right) {
            _ if type_rank(left) == 2 => compare_numbers(left, right),
            (Bson::String(l) | Bson::Symbol(l), Bson::String(r) | Bson::Symbol(r)) => l.cmp(r),
            _ => compare_values(left, right).unwrap_or(Ordering::Equal),
        })
}

/// NaN sorts below every other number and Decimal128 above them; integers
/// that collapse to the same double fall back to exact comparison.
fn compare_numbers(left: &Bson, right: &Bson) -> Ordering {
    match (left, right) {
        (Bson::Decimal128(l), Bson::Decimal128(r)) => l.bytes().cmp(&r.bytes()),
        (Bson::Decimal128(_), _) => Ordering::Greater,
        (_, Bson::Decimal128(_)) => Ordering::Less,
        _ => match (as_f64(left), as_f64(right)) {
            (Some(l), Some(r)) => (!l.is_nan())
                .cmp(&!r.is_nan())
                .then_with(|| l.total_cmp(&r))
                .then_with(|| as_i64(left).cmp(&as_i64(right))),
            _ => Ordering::Equal,
        },
    }
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in sort {
            let left = a.get(field).unwrap_or(&Bson::Null);
            let right = b.get(field).unwrap_or(&Bson::Null);
            let mut ordering = sort_order(left, right);
            if as_f64(direction).is_some_and(|d| d < 0.0) {
                ordering = ordering.reverse();
            }
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Null | Bson::Undefined => false,
        other => as_f64(other).is_none_or(|n| n != 0.0),
    }
}

/// Inclusion projection: `_id` plus every field flagged truthy.
fn project(document: Document, projection: &Document) -> Document {
    let keep_id = projection.get("_id").is_none_or(is_truthy);
    document
        .into_iter()
        .filter(|(field, _)| {
            if field == "_id" {
                keep_id
            } else {
                projection.get(field).is_some_and(is_truthy)
            }
        })
        .collect()
}
