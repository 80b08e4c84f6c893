pub mod order_stat_tree;
pub mod slot_arena;

pub use order_stat_tree::{Iter, OrderStatTree};
pub use slot_arena::{SlotArena, SlotId};
