use super::{PageReplacementPolicy, PolicyError};
use crate::swapping::frame_table::RecordId;
use alloc::{boxed::Box, vec, vec::Vec};

#[derive(Debug, Clone, Copy)]
struct Node {
    record: Option<RecordId>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Node {
    const FREE: Self = Self {
        record: None,
        prev: None,
        next: None,
    };
}

/// Evicts the least recently used page.
///
/// Recency is kept as a doubly linked list threaded through a fixed arena of
/// `capacity` nodes: the head is the most recently used page, the tail the
/// victim. Insertion and touches move a page to the head.
pub struct LruPolicy {
    nodes: Box<[Node]>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl LruPolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: vec![Node::FREE; capacity].into_boxed_slice(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn find(&self, record: RecordId) -> Option<usize> {
        self.nodes.iter().position(|node| node.record == Some(record))
    }

    fn unlink(&mut self, index: usize) {
        let Node { prev, next, .. } = self.nodes[index];
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[index].prev = None;
        self.nodes[index].next = None;
    }

    fn push_front(&mut self, index: usize) {
        self.nodes[index].prev = None;
        self.nodes[index].next = self.head;
        match self.head {
            Some(head) => self.nodes[head].prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }
}

impl PageReplacementPolicy for LruPolicy {
    fn on_insert(&mut self, record: RecordId) -> Result<(), PolicyError> {
        if self.find(record).is_some() {
            return Err(PolicyError::AlreadyTracked);
        }
        let index = self
            .nodes
            .iter()
            .position(|node| node.record.is_none())
            .ok_or(PolicyError::Full)?;
        self.nodes[index].record = Some(record);
        self.push_front(index);
        self.len += 1;
        Ok(())
    }

    fn on_touch(&mut self, record: RecordId) -> Result<(), PolicyError> {
        let index = self.find(record).ok_or(PolicyError::NotTracked)?;
        if self.head != Some(index) {
            self.unlink(index);
            self.push_front(index);
        }
        Ok(())
    }

    fn select_victim(&mut self) -> Result<RecordId, PolicyError> {
        self.tail
            .and_then(|tail| self.nodes[tail].record)
            .ok_or(PolicyError::Empty)
    }

    fn on_remove(&mut self, record: RecordId) -> Result<(), PolicyError> {
        let index = self.find(record).ok_or(PolicyError::NotTracked)?;
        self.unlink(index);
        self.nodes[index] = Node::FREE;
        self.len -= 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    /// Most recently used first.
    fn tracked(&self) -> Vec<RecordId> {
        let mut order = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            order.extend(self.nodes[index].record);
            cursor = self.nodes[index].next;
        }
        order
    }
}
