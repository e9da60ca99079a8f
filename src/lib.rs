//! Liveseq - a continuously re-orderable sequence over live items.
//!
//! The sequence is stored as an order-statistics red-black tree of
//! 64-item blocks, giving O(log n) access by index and by comparator,
//! with cheap `Finger` cursors on top. `LiveList` layers live shaping
//! over it: items are kept sorted and filtered, changed items are
//! marked dirty (from any thread), and a restore pass moves each one
//! back into place, reporting the moves so observers can mirror them.
//!
//! # Quick Start
//!
//! ```
//! use liveseq::{DirtyKind, LiveList, MoveEvent};
//!
//! let mut list = LiveList::new(|a: &i32, b: &i32| a.cmp(b));
//! for x in [5, 3, 8, 1, 9] {
//!     list.add(x);
//! }
//! assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![1, 3, 5, 8, 9]);
//!
//! // Mutate an item in place, mark it, and restore order.
//! let id = list.id_at(2).unwrap();
//! *list.item_mut(id).unwrap() = 0;
//! list.mark_dirty(id, DirtyKind::Sort).unwrap();
//! let moves = list.drain_and_restore();
//! assert_eq!(moves, vec![MoveEvent { old_index: 2, new_index: 0 }]);
//! assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![0, 1, 3, 8, 9]);
//! ```

pub mod block;
pub mod error;
pub mod finger;
pub mod list;
pub mod tree;

pub use block::{BlockIdx, MAX_SIZE, NONE};
pub use error::SeqError;
pub use finger::Finger;
pub use list::{DirtyKind, DirtyNotifier, DrainReport, ElemId, LiveList, MoveEvent};
pub use tree::{BlockTree, FnHook, NoHook, RelocateHook};
