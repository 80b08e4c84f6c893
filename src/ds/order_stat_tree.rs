//! Augmented order-statistics multiset.
//!
//! An AVL tree whose nodes live in a [`SlotArena`] and link to each other by
//! [`SlotId`]. Every node caches aggregates of its subtree, refreshed on the
//! way back up from each insert, remove and rotation:
//!
//! ```text
//!                      ┌──────────────────────────────┐
//!                      │ value: 3000   payload: 2     │
//!                      │ size: 5  sum: 15000          │
//!                      │ sum_sq: 55_000_000  h: 3     │
//!                      └──────────────┬───────────────┘
//!                 ┌───────────────────┴───────────────────┐
//!     ┌───────────▼────────────┐              ┌───────────▼────────────┐
//!     │ 1000  size 2  sum 3000 │              │ 5000  size 2  sum 9000 │
//!     └───────────┬────────────┘              └───────────┬────────────┘
//!                 └──► 2000                   4000 ◄──────┘
//! ```
//!
//! ## Operations
//!
//! | Operation      | Description                                   | Complexity |
//! |----------------|-----------------------------------------------|------------|
//! | [`insert`]     | Add one `(value, payload)` entry              | O(log n)   |
//! | [`remove`]     | Remove one entry equal to `value`             | O(log n)   |
//! | [`rank`]       | k-th smallest value (0-indexed)               | O(log n)   |
//! | [`rank_of`]    | Number of entries strictly before `value`     | O(log n)   |
//! | [`find`]       | Payload of one entry equal to `value`         | O(log n)   |
//! | [`cum_sum`]    | Sum of the k smallest measures                | O(log n)   |
//! | [`cum_sum_sq`] | Sum of squares of the k smallest measures     | O(log n)   |
//!
//! [`insert`]: OrderStatTree::insert
//! [`remove`]: OrderStatTree::remove
//! [`rank`]: OrderStatTree::rank
//! [`rank_of`]: OrderStatTree::rank_of
//! [`find`]: OrderStatTree::find
//! [`cum_sum`]: OrderStatTree::cum_sum
//! [`cum_sum_sq`]: OrderStatTree::cum_sum_sq
//!
//! Equal values are allowed and are told apart only by payload. Which of
//! several equal entries `remove` and `find` pick depends on tree shape.
//!
//! Aggregates are exact `i128` sums of [`Measure::measure`]. For readings
//! that includes `-1` for every DNF held; use `rank_of(&Reading::Dnf)` to
//! count finite entries before trusting a prefix sum.
//!
//! ## Example Usage
//!
//! ```
//! use timestat::ds::OrderStatTree;
//! use timestat::reading::Reading;
//!
//! let mut tree = OrderStatTree::new();
//! for (pos, ms) in [5000, 1000, 3000, 2000, 4000].into_iter().enumerate() {
//!     tree.insert(Reading::Finite(ms), pos);
//! }
//!
//! assert_eq!(tree.rank(0), Some(&Reading::Finite(1000)));
//! assert_eq!(tree.rank_of(&Reading::Finite(3000)), 2);
//! assert_eq!(tree.find(&Reading::Finite(5000)), Some(&0));
//!
//! // Trim one from each end: keep ranks 1..4.
//! let kept = tree.cum_sum(4) - tree.cum_sum(1);
//! assert_eq!(kept, 9000);
//!
//! tree.remove(&Reading::Finite(1000));
//! assert_eq!(tree.rank(0), Some(&Reading::Finite(2000)));
//! ```
//!
//! ## Thread Safety
//!
//! `OrderStatTree` is not synchronised; it is owned by one engine or one
//! range query at a time.

use std::cmp::Ordering;
use std::fmt;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::InvariantError;
use crate::reading::{Comparator, Measure, NaturalOrder};

#[derive(Debug, Clone)]
struct Node<T, P> {
    value: T,
    payload: P,
    left: Option<SlotId>,
    right: Option<SlotId>,
    height: u8,
    size: usize,
    sum: i128,
    sum_sq: i128,
}

impl<T: Measure, P> Node<T, P> {
    fn leaf(value: T, payload: P) -> Self {
        let m = i128::from(value.measure());
        Self {
            value,
            payload,
            left: None,
            right: None,
            height: 1,
            size: 1,
            sum: m,
            sum_sq: m * m,
        }
    }
}

/// Balanced multiset of `(value, payload)` entries with rank and prefix-sum
/// queries.
///
/// # Type Parameters
///
/// - `T`: value type, summed through [`Measure`]
/// - `P`: payload carried alongside each value (sequence position by default)
/// - `C`: total order over `T`
#[derive(Clone)]
pub struct OrderStatTree<T, P = usize, C = NaturalOrder> {
    arena: SlotArena<Node<T, P>>,
    root: Option<SlotId>,
    order: C,
}

impl<T, P> OrderStatTree<T, P, NaturalOrder>
where
    T: Measure + Ord,
{
    /// Creates an empty tree ordered by `T`'s [`Ord`].
    pub fn new() -> Self {
        Self::with_order(NaturalOrder)
    }
}

impl<T, P> Default for OrderStatTree<T, P, NaturalOrder>
where
    T: Measure + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P, C> OrderStatTree<T, P, C>
where
    T: Measure,
    C: Comparator<T>,
{
    /// Creates an empty tree ordered by `order`.
    ///
    /// ```
    /// use timestat::ds::OrderStatTree;
    ///
    /// let mut desc: OrderStatTree<i64, (), _> =
    ///     OrderStatTree::with_order(|a: &i64, b: &i64| b.cmp(a));
    /// desc.insert(1, ()).insert(3, ()).insert(2, ());
    /// assert_eq!(desc.rank(0), Some(&3));
    /// ```
    pub fn with_order(order: C) -> Self {
        Self {
            arena: SlotArena::new(),
            root: None,
            order,
        }
    }

    /// Creates an empty tree with room for `capacity` entries.
    pub fn with_capacity_and_order(capacity: usize, order: C) -> Self {
        Self {
            arena: SlotArena::with_capacity(capacity),
            root: None,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.size_of(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the ordering this tree was built with.
    pub fn order(&self) -> &C {
        &self.order
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
    }

    /// Adds one entry. Equal values are kept side by side.
    pub fn insert(&mut self, value: T, payload: P) -> &mut Self {
        let root = self.insert_at(self.root, value, payload);
        self.root = Some(root);
        self
    }

    /// Removes one entry comparing equal to `value` and returns its payload.
    ///
    /// Returns `None` when nothing matches; callers only remove values they
    /// inserted earlier, so `None` points at a bookkeeping bug upstream.
    pub fn remove(&mut self, value: &T) -> Option<P> {
        let (root, payload) = self.remove_at(self.root, value);
        self.root = root;
        payload
    }

    /// Returns the `k`-th smallest value, 0-indexed.
    pub fn rank(&self, k: usize) -> Option<&T> {
        let mut node = self.root;
        let mut k = k;
        while let Some(id) = node {
            let n = &self.arena[id];
            let left = self.size_of(n.left);
            match k.cmp(&left) {
                Ordering::Less => node = n.left,
                Ordering::Equal => return Some(&n.value),
                Ordering::Greater => {
                    k -= left + 1;
                    node = n.right;
                }
            }
        }
        None
    }

    /// Counts entries ordered strictly before `value`.
    ///
    /// With `Reading::Dnf` as argument this is the number of finite entries.
    pub fn rank_of(&self, value: &T) -> usize {
        let mut node = self.root;
        let mut count = 0;
        while let Some(id) = node {
            let n = &self.arena[id];
            if self.order.compare(&n.value, value) == Ordering::Less {
                count += self.size_of(n.left) + 1;
                node = n.right;
            } else {
                node = n.left;
            }
        }
        count
    }

    /// Returns the payload of one entry comparing equal to `value`.
    pub fn find(&self, value: &T) -> Option<&P> {
        let mut node = self.root;
        while let Some(id) = node {
            let n = &self.arena[id];
            match self.order.compare(value, &n.value) {
                Ordering::Less => node = n.left,
                Ordering::Greater => node = n.right,
                Ordering::Equal => return Some(&n.payload),
            }
        }
        None
    }

    /// Sum of the measures of the `k` smallest entries (`k` clamped to `len`).
    pub fn cum_sum(&self, k: usize) -> i128 {
        self.prefix(k).0
    }

    /// Sum of the squared measures of the `k` smallest entries.
    pub fn cum_sum_sq(&self, k: usize) -> i128 {
        self.prefix(k).1
    }

    /// Iterates `(value, payload)` in ascending order.
    pub fn iter(&self) -> Iter<'_, T, P> {
        let mut iter = Iter {
            arena: &self.arena,
            stack: Vec::new(),
            remaining: self.len(),
        };
        iter.push_left_spine(self.root);
        iter
    }

    /// Validates ordering, balance and cached aggregates.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.check_links()?;
        let summary = self.check_subtree(self.root)?;
        if summary.size != self.arena.len() {
            return Err(InvariantError::new(format!(
                "tree reaches {} nodes but arena holds {}",
                summary.size,
                self.arena.len()
            )));
        }
        let mut prev: Option<&T> = None;
        for (value, _) in self.iter() {
            if let Some(p) = prev {
                if self.order.compare(p, value) == Ordering::Greater {
                    return Err(InvariantError::new("in-order walk is not sorted"));
                }
            }
            prev = Some(value);
        }
        Ok(())
    }

    /// Every link points at a live node and every live node has exactly
    /// one incoming link (the root counts as linked).
    fn check_links(&self) -> Result<(), InvariantError> {
        if let Some(root) = self.root {
            if !self.arena.contains(root) {
                return Err(InvariantError::new(format!("root slot {} is freed", root.index())));
            }
        }
        let mut linked = usize::from(self.root.is_some());
        for (id, node) in self.arena.iter() {
            for child in [node.left, node.right].into_iter().flatten() {
                if !self.arena.contains(child) {
                    return Err(InvariantError::new(format!(
                        "node {} links to freed slot {}",
                        id.index(),
                        child.index()
                    )));
                }
                if Some(child) == self.root {
                    return Err(InvariantError::new("root has a parent link"));
                }
                linked += 1;
            }
        }
        if linked != self.arena.len() {
            return Err(InvariantError::new(format!(
                "{linked} linked nodes but arena holds {}",
                self.arena.len()
            )));
        }
        Ok(())
    }

    fn size_of(&self, node: Option<SlotId>) -> usize {
        node.map_or(0, |id| self.arena[id].size)
    }

    fn height_of(&self, node: Option<SlotId>) -> u8 {
        node.map_or(0, |id| self.arena[id].height)
    }

    fn sums_of(&self, node: Option<SlotId>) -> (i128, i128) {
        node.map_or((0, 0), |id| {
            let n = &self.arena[id];
            (n.sum, n.sum_sq)
        })
    }

    fn prefix(&self, k: usize) -> (i128, i128) {
        let mut k = k.min(self.len());
        let mut node = self.root;
        let (mut sum, mut sum_sq) = (0i128, 0i128);
        while k > 0 {
            let Some(id) = node else { break };
            let n = &self.arena[id];
            let left = self.size_of(n.left);
            if k <= left {
                node = n.left;
                continue;
            }
            let (ls, lq) = self.sums_of(n.left);
            let m = i128::from(n.value.measure());
            sum += ls + m;
            sum_sq += lq + m * m;
            k -= left + 1;
            node = n.right;
        }
        (sum, sum_sq)
    }

    fn update(&mut self, id: SlotId) {
        let (left, right, m) = {
            let n = &self.arena[id];
            (n.left, n.right, i128::from(n.value.measure()))
        };
        let size = 1 + self.size_of(left) + self.size_of(right);
        let height = 1 + self.height_of(left).max(self.height_of(right));
        let (ls, lq) = self.sums_of(left);
        let (rs, rq) = self.sums_of(right);

        let n = &mut self.arena[id];
        n.size = size;
        n.height = height;
        n.sum = ls + rs + m;
        n.sum_sq = lq + rq + m * m;
    }

    fn balance_factor(&self, id: SlotId) -> i16 {
        let n = &self.arena[id];
        i16::from(self.height_of(n.left)) - i16::from(self.height_of(n.right))
    }

    fn rotate_left(&mut self, id: SlotId) -> SlotId {
        let Some(pivot) = self.arena[id].right else {
            return id;
        };
        self.arena[id].right = self.arena[pivot].left;
        self.arena[pivot].left = Some(id);
        self.update(id);
        self.update(pivot);
        pivot
    }

    fn rotate_right(&mut self, id: SlotId) -> SlotId {
        let Some(pivot) = self.arena[id].left else {
            return id;
        };
        self.arena[id].left = self.arena[pivot].right;
        self.arena[pivot].right = Some(id);
        self.update(id);
        self.update(pivot);
        pivot
    }

    fn rebalance(&mut self, id: SlotId) -> SlotId {
        self.update(id);
        let bf = self.balance_factor(id);
        if bf > 1 {
            if let Some(left) = self.arena[id].left {
                if self.balance_factor(left) < 0 {
                    let new_left = self.rotate_left(left);
                    self.arena[id].left = Some(new_left);
                }
            }
            return self.rotate_right(id);
        }
        if bf < -1 {
            if let Some(right) = self.arena[id].right {
                if self.balance_factor(right) > 0 {
                    let new_right = self.rotate_right(right);
                    self.arena[id].right = Some(new_right);
                }
            }
            return self.rotate_left(id);
        }
        id
    }

    fn insert_at(&mut self, node: Option<SlotId>, value: T, payload: P) -> SlotId {
        let Some(id) = node else {
            return self.arena.insert(Node::leaf(value, payload));
        };
        let (left, right) = (self.arena[id].left, self.arena[id].right);
        if self.order.compare(&value, &self.arena[id].value) == Ordering::Less {
            let child = self.insert_at(left, value, payload);
            self.arena[id].left = Some(child);
        } else {
            let child = self.insert_at(right, value, payload);
            self.arena[id].right = Some(child);
        }
        self.rebalance(id)
    }

    fn remove_at(&mut self, node: Option<SlotId>, value: &T) -> (Option<SlotId>, Option<P>) {
        let Some(id) = node else {
            return (None, None);
        };
        let (left, right) = (self.arena[id].left, self.arena[id].right);
        let payload = match self.order.compare(value, &self.arena[id].value) {
            Ordering::Less => {
                let (child, payload) = self.remove_at(left, value);
                self.arena[id].left = child;
                payload
            }
            Ordering::Greater => {
                let (child, payload) = self.remove_at(right, value);
                self.arena[id].right = child;
                payload
            }
            Ordering::Equal => {
                match (left, right) {
                    (Some(_), Some(r)) => {
                        let (new_right, successor) = self.take_min(r);
                        let n = &mut self.arena[id];
                        n.right = new_right;
                        n.value = successor.value;
                        Some(std::mem::replace(&mut n.payload, successor.payload))
                    }
                    (child, None) | (None, child) => {
                        let removed = self.arena.take(id);
                        return (child, Some(removed.payload));
                    }
                }
            }
        };
        if payload.is_none() {
            return (Some(id), None);
        }
        (Some(self.rebalance(id)), payload)
    }

    /// Detaches the minimum of the subtree at `id`.
    fn take_min(&mut self, id: SlotId) -> (Option<SlotId>, Node<T, P>) {
        match self.arena[id].left {
            None => {
                let right = self.arena[id].right;
                (right, self.arena.take(id))
            }
            Some(left) => {
                let (new_left, min) = self.take_min(left);
                self.arena[id].left = new_left;
                (Some(self.rebalance(id)), min)
            }
        }
    }

    fn check_subtree(&self, node: Option<SlotId>) -> Result<SubtreeSummary, InvariantError> {
        let Some(id) = node else {
            return Ok(SubtreeSummary::default());
        };
        let n = self
            .arena
            .get(id)
            .ok_or_else(|| InvariantError::new(format!("dangling child link {id:?}")))?;
        let left = self.check_subtree(n.left)?;
        let right = self.check_subtree(n.right)?;

        let m = i128::from(n.value.measure());
        let expected = SubtreeSummary {
            size: left.size + right.size + 1,
            height: left.height.max(right.height) + 1,
            sum: left.sum + right.sum + m,
            sum_sq: left.sum_sq + right.sum_sq + m * m,
        };
        if n.size != expected.size {
            return Err(InvariantError::new(format!(
                "node {id:?} caches size {} but holds {}",
                n.size, expected.size
            )));
        }
        if n.height != expected.height {
            return Err(InvariantError::new(format!(
                "node {id:?} caches height {} but measures {}",
                n.height, expected.height
            )));
        }
        if n.sum != expected.sum || n.sum_sq != expected.sum_sq {
            return Err(InvariantError::new(format!(
                "node {id:?} aggregates ({}, {}) != recomputed ({}, {})",
                n.sum, n.sum_sq, expected.sum, expected.sum_sq
            )));
        }
        if left.height.abs_diff(right.height) > 1 {
            return Err(InvariantError::new(format!(
                "node {id:?} unbalanced: left height {} right height {}",
                left.height, right.height
            )));
        }
        Ok(expected)
    }
}

impl<T, P, C> Extend<(T, P)> for OrderStatTree<T, P, C>
where
    T: Measure,
    C: Comparator<T>,
{
    fn extend<I: IntoIterator<Item = (T, P)>>(&mut self, iter: I) {
        for (value, payload) in iter {
            self.insert(value, payload);
        }
    }
}

impl<T, P, C> fmt::Debug for OrderStatTree<T, P, C>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = Iter {
            arena: &self.arena,
            stack: Vec::new(),
            remaining: self.arena.len(),
        };
        iter.push_left_spine(self.root);
        f.debug_list().entries(iter.map(|(value, _)| value)).finish()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SubtreeSummary {
    size: usize,
    height: u8,
    sum: i128,
    sum_sq: i128,
}

/// In-order iterator over an [`OrderStatTree`].
pub struct Iter<'a, T, P> {
    arena: &'a SlotArena<Node<T, P>>,
    stack: Vec<SlotId>,
    remaining: usize,
}

impl<T, P> Iter<'_, T, P> {
    fn push_left_spine(&mut self, mut node: Option<SlotId>) {
        while let Some(id) = node {
            self.stack.push(id);
            node = self.arena[id].left;
        }
    }
}

impl<'a, T, P> Iterator for Iter<'a, T, P> {
    type Item = (&'a T, &'a P);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let arena = self.arena;
        let n = &arena[id];
        self.push_left_spine(n.right);
        self.remaining = self.remaining.saturating_sub(1);
        Some((&n.value, &n.payload))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, P> ExactSizeIterator for Iter<'_, T, P> {}
