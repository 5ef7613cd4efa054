use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::NodeError;

/// Runtime-adjustable number of follower acks a write needs.
///
/// The coordinator reads it once at the start of each round; a change only
/// affects rounds that start afterwards.
#[derive(Debug)]
pub struct WriteQuorum {
    required: AtomicUsize,
}

impl WriteQuorum {
    pub fn new(required: usize) -> Result<Self, NodeError> {
        if required == 0 {
            return Err(NodeError::InvalidQuorum(0));
        }
        Ok(Self {
            required: AtomicUsize::new(required),
        })
    }

    pub fn get(&self) -> usize {
        self.required.load(Ordering::Acquire)
    }

    /// Replaces the quorum, returning the previous value.
    pub fn set(&self, required: i64) -> Result<usize, NodeError> {
        let required = Self::check(required)?;
        Ok(self.required.swap(required, Ordering::AcqRel))
    }

    fn check(required: i64) -> Result<usize, NodeError> {
        match usize::try_from(required) {
            Ok(required) if required >= 1 => Ok(required),
            _ => Err(NodeError::InvalidQuorum(required)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_values_below_one() {
        assert!(matches!(WriteQuorum::new(0), Err(NodeError::InvalidQuorum(0))));

        let quorum = WriteQuorum::new(2).expect("valid quorum");
        assert!(matches!(quorum.set(0), Err(NodeError::InvalidQuorum(0))));
        assert!(matches!(quorum.set(-3), Err(NodeError::InvalidQuorum(-3))));
        assert_eq!(quorum.get(), 2);
    }

    #[test]
    fn accepts_quorums_beyond_i64_range() {
        let quorum = WriteQuorum::new(usize::MAX).expect("valid quorum");
        assert_eq!(quorum.get(), usize::MAX);
    }

    #[test]
    fn set_returns_previous_value() {
        let quorum = WriteQuorum::new(1).expect("valid quorum");
        assert_eq!(quorum.set(3).expect("valid update"), 1);
        assert_eq!(quorum.get(), 3);
    }
}
