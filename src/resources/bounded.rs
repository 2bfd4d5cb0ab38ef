//! Fixed-capacity list that reports overflow instead of growing

use std::ops::Deref;

use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone)]
pub struct BoundedVec<T> {
    items: Vec<T>,
    capacity: usize,
    what: &'static str,
}

impl<T> BoundedVec<T> {
    /// `what` names the list in capacity errors
    pub fn new(what: &'static str, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            what,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.items.len()
    }

    /// Fail unless `count` more items fit
    pub fn reserve_exact(&self, count: usize) -> GraphResult<()> {
        if count > self.remaining() {
            return Err(GraphError::CapacityExceeded {
                what: self.what,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn push(&mut self, item: T) -> GraphResult<()> {
        self.reserve_exact(1)?;
        self.items.push(item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> Deref for BoundedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut list = BoundedVec::new("test list", 2);
        list.push(1).unwrap();
        list.push(2).unwrap();
        assert_eq!(list.remaining(), 0);

        let err = list.push(3).unwrap_err();
        assert!(matches!(
            err,
            GraphError::CapacityExceeded {
                what: "test list",
                capacity: 2
            }
        ));
        // Nothing was truncated or overwritten
        assert_eq!(&*list, &[1, 2]);
    }

    #[test]
    fn test_reserve_checks_whole_batch() {
        let mut list = BoundedVec::new("faces", 8);
        list.push(0).unwrap();
        list.push(1).unwrap();
        list.push(2).unwrap();
        assert!(list.reserve_exact(5).is_ok());
        assert!(list.reserve_exact(6).is_err());
    }
}
