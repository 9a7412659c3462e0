//! In-memory unique-key index.
//!
//! Used both for a base table's declared unique indexes and for the
//! transaction-local shadow indexes that mirror them (see
//! [`crate::storage::local::index_set`]). Keys are built by concatenating
//! the byte encoding of each indexed column, the same scheme
//! `ColumnValueIndex::value_to_bytes` used on disk, just kept resident
//! instead of being paged through a B-tree file.

use crate::error::{Result, StorageError};
use crate::index::KeyIndex;
use crate::types::{RowId, Value};
use std::collections::BTreeMap;

/// Encode a composite key from the indexed columns of a row.
pub fn encode_key(values: &[&Value]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for value in values {
        encode_value(value, &mut buf)?;
    }
    Ok(buf)
}

fn encode_value(value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Integer(i) => buf.extend_from_slice(&i.to_be_bytes()),
        Value::Float(f) => buf.extend_from_slice(&f.to_be_bytes()),
        Value::Bool(b) => buf.push(if *b { 1 } else { 0 }),
        Value::Text(s) => {
            buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Timestamp(ts) => buf.extend_from_slice(&ts.as_micros().to_be_bytes()),
        Value::Null => {
            return Err(StorageError::Constraint(
                "cannot index a NULL value in a unique column".to_string(),
            ))
        }
    }
    Ok(())
}

/// A single-valued, BTreeMap-backed unique index: `key -> row_id`.
pub struct UniqueIndex {
    name: String,
    /// Positions, within a row, of the columns this index is keyed on.
    columns: Vec<usize>,
    is_unique: bool,
    map: BTreeMap<Vec<u8>, RowId>,
}

impl UniqueIndex {
    pub fn new(name: String, columns: Vec<usize>, is_unique: bool) -> Self {
        Self {
            name,
            columns,
            is_unique,
            map: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Build this index's key for `row`, selecting the indexed columns.
    pub fn key_for(&self, row: &[Value]) -> Result<Vec<u8>> {
        let values: Vec<&Value> = self.columns.iter().map(|&pos| &row[pos]).collect();
        encode_key(&values)
    }

    /// Row id currently mapped to `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<RowId> {
        self.map.get(key).copied()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }
}

impl KeyIndex for UniqueIndex {
    fn is_unique(&self) -> bool {
        self.is_unique
    }

    fn insert(&mut self, key: Vec<u8>, row_id: RowId) -> Result<bool> {
        if self.is_unique {
            if let Some(&existing) = self.map.get(&key) {
                if existing != row_id {
                    return Ok(false);
                }
            }
        }
        self.map.insert(key, row_id);
        Ok(true)
    }

    fn remove(&mut self, key: &[u8], row_id: RowId) {
        if let Some(&existing) = self.map.get(key) {
            if existing == row_id {
                self.map.remove(key);
            }
        }
    }

    fn scan(&self) -> Vec<(Vec<u8>, RowId)> {
        self.map.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn test_insert_and_get() {
        let mut idx = UniqueIndex::new("pk".into(), vec![0], true);
        let key = encode_key(&[&Value::Integer(1)]).unwrap();
        assert!(idx.insert(key.clone(), 100).unwrap());
        assert_eq!(idx.get(&key), Some(100));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut idx = UniqueIndex::new("pk".into(), vec![0], true);
        let key = encode_key(&[&Value::Integer(1)]).unwrap();
        assert!(idx.insert(key.clone(), 100).unwrap());
        assert!(!idx.insert(key.clone(), 200).unwrap());
        assert_eq!(idx.get(&key), Some(100));
    }

    #[test]
    fn test_remove() {
        let mut idx = UniqueIndex::new("pk".into(), vec![0], true);
        let key = encode_key(&[&Value::Integer(1)]).unwrap();
        idx.insert(key.clone(), 100).unwrap();
        idx.remove(&key, 100);
        assert_eq!(idx.get(&key), None);
    }

    #[test]
    fn test_remove_wrong_row_id_is_noop() {
        let mut idx = UniqueIndex::new("pk".into(), vec![0], true);
        let key = encode_key(&[&Value::Integer(1)]).unwrap();
        idx.insert(key.clone(), 100).unwrap();
        idx.remove(&key, 999);
        assert_eq!(idx.get(&key), Some(100));
    }

    #[test]
    fn test_scan() {
        let mut idx = UniqueIndex::new("pk".into(), vec![0], true);
        idx.insert(encode_key(&[&Value::Integer(1)]).unwrap(), 100).unwrap();
        idx.insert(encode_key(&[&Value::Integer(2)]).unwrap(), 101).unwrap();
        assert_eq!(idx.scan().len(), 2);
    }

    #[test]
    fn test_composite_key() {
        let mut idx = UniqueIndex::new("pk".into(), vec![0, 1], true);
        let row = vec![Value::Integer(1), Value::Text("a".into())];
        let key = idx.key_for(&row).unwrap();
        assert!(idx.insert(key, 1).unwrap());
    }

    #[test]
    fn test_null_value_rejected() {
        let err = encode_key(&[&Value::Null]).unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[test]
    fn test_text_and_timestamp_keys_distinct() {
        let a = encode_key(&[&Value::Text("ab".into())]).unwrap();
        let b = encode_key(&[&Value::Timestamp(Timestamp::from_micros(1))]).unwrap();
        assert_ne!(a, b);
    }
}
