//! Hot Tier - 按条目数限制的内存 LRU
//!
//! HashMap (key -> slab 下标) + slab 上的侵入式双向链表：
//! - 链表头是最久未使用 (LRU)，链表尾是最近使用 (MRU)
//! - `get` / `set` / `delete` 均为 O(1)
//! - 淘汰是静默的，只丢弃内存副本

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlabIdx(usize);

#[derive(Debug)]
struct SlabNode<V> {
    key: String,
    value: V,
    prev: Option<SlabIdx>,
    next: Option<SlabIdx>,
}

/// 内存 LRU 缓存
#[derive(Debug)]
pub struct HotTier<V> {
    index: HashMap<String, SlabIdx>,
    slots: Vec<Option<SlabNode<V>>>,
    free_indices: Vec<usize>,
    head: Option<SlabIdx>,
    tail: Option<SlabIdx>,
    capacity: usize,
}

impl<V> HotTier<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free_indices: Vec::new(),
            head: None,
            tail: None,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// 读取并标记为最近使用
    pub fn get(&mut self, key: &str) -> Option<&mut V> {
        let idx = *self.index.get(key)?;
        self.move_to_back(idx);
        self.node_mut(idx).map(|n| &mut n.value)
    }

    /// 读取但不改变使用顺序
    pub fn peek(&self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.node(idx).map(|n| &n.value)
    }

    /// 写入并标记为最近使用；超出容量时淘汰最久未使用的条目并返回其 key
    pub fn set(&mut self, key: impl Into<String>, value: V) -> Option<String> {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.node_mut(idx) {
                node.value = value;
            }
            self.move_to_back(idx);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_front().map(|(k, _)| k)
        } else {
            None
        };

        let idx = self.alloc_slot(key.clone(), value);
        self.link_back(idx);
        self.index.insert(key, idx);
        evicted
    }

    pub fn delete(&mut self, key: &str) -> Option<V> {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        self.release_slot(idx).map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free_indices.clear();
        self.head = None;
        self.tail = None;
    }

    /// 从 LRU 到 MRU 的 key 顺序
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut current = self.head;
        while let Some(idx) = current {
            match self.node(idx) {
                Some(node) => {
                    keys.push(node.key.clone());
                    current = node.next;
                }
                None => break,
            }
        }
        keys
    }

    fn pop_front(&mut self) -> Option<(String, V)> {
        let idx = self.head?;
        self.unlink(idx);
        let (key, value) = self.release_slot(idx)?;
        self.index.remove(&key);
        Some((key, value))
    }

    fn move_to_back(&mut self, idx: SlabIdx) {
        if self.tail == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.link_back(idx);
    }

    fn link_back(&mut self, idx: SlabIdx) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(idx) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail.and_then(|t| self.node_mut(t)) {
            Some(tail) => tail.next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn unlink(&mut self, idx: SlabIdx) {
        let (prev, next) = match self.node_mut(idx) {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match prev.and_then(|p| self.node_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }

    fn alloc_slot(&mut self, key: String, value: V) -> SlabIdx {
        let node = SlabNode {
            key,
            value,
            prev: None,
            next: None,
        };
        match self.free_indices.pop() {
            Some(free) => {
                self.slots[free] = Some(node);
                SlabIdx(free)
            }
            None => {
                self.slots.push(Some(node));
                SlabIdx(self.slots.len() - 1)
            }
        }
    }

    fn release_slot(&mut self, idx: SlabIdx) -> Option<(String, V)> {
        let node = self.slots.get_mut(idx.0)?.take()?;
        self.free_indices.push(idx.0);
        Some((node.key, node.value))
    }

    fn node(&self, idx: SlabIdx) -> Option<&SlabNode<V>> {
        self.slots.get(idx.0).and_then(|s| s.as_ref())
    }

    fn node_mut(&mut self, idx: SlabIdx) -> Option<&mut SlabNode<V>> {
        self.slots.get_mut(idx.0).and_then(|s| s.as_mut())
    }
}
