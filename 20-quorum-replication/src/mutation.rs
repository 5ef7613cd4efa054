use serde_json::Value;

/// The change carried by a [`Mutation`].
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    Put(Value),
    Delete,
}

/// A versioned mutation of a single key.
///
/// The leader builds one per write or delete and hands the same mutation to
/// every follower; followers merge it with [`crate::store::VersionedStore::apply_if_newer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub key: String,
    pub version: u64,
    pub op: MutationOp,
}

impl Mutation {
    pub fn put(key: impl Into<String>, value: Value, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
            op: MutationOp::Put(value),
        }
    }

    pub fn delete(key: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
            op: MutationOp::Delete,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.op, MutationOp::Delete)
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.op {
            MutationOp::Put(value) => Some(value),
            MutationOp::Delete => None,
        }
    }
}
