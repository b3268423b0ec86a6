#![forbid(unsafe_code)]

//! Lens data tree for lensync.
//!
//! - [`Node`]: a handle onto one path of a shared `serde_json::Value` tree.
//!   Nodes derived with [`Node::go`] alias the same storage.
//! - [`Lens`]: the `get`/`set`/`subscribe` surface shared by nodes and by
//!   derived lenses ([`Mapped`], [`Typed`]).
//! - [`ChangeEvent`]: what a listener is told about a write (never the value
//!   itself; listeners re-read).
//! - [`Subscription`]: RAII guard that detaches its listener on drop.
//!
//! # Example
//!
//! ```
//! use lensync_core::{Lens, Node};
//! use serde_json::json;
//!
//! let root = Node::new(json!({ "name": "a" }));
//! let name = root.go("name");
//! let _sub = name.subscribe(|event| assert!(event.is_current()));
//! name.set(json!("b"));
//! assert_eq!(root.get(), json!({ "name": "b" }));
//! ```
//!
//! # Concurrency
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Delivery is
//! synchronous: `set` returns after every related listener ran.

pub mod event;
pub mod lens;
pub mod listeners;
pub mod mapped;
pub mod node;
pub mod path;

pub use event::{ChangeEvent, Relation};
pub use lens::{Lens, LensKey, storage_id};
pub use listeners::{Listener, ListenerRegistry, Subscription};
pub use mapped::{Mapped, Typed, transform};
pub use node::{Node, is_ancestor};
pub use path::{MAX_INDEX_GAP, Path, PathSegment, display_path};
