use crate::common::Value;

/// Outcome of [crate::collection::Collection::insert_one].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOneResult {
    /// The `_id` of the stored document; generated when the document had none.
    pub inserted_id: Value,
}

/// Outcome of [crate::collection::Collection::insert_many].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    /// `_id`s in payload order.
    pub inserted_ids: Vec<Value>,
}

impl InsertManyResult {
    pub fn len(&self) -> usize {
        self.inserted_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserted_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}
