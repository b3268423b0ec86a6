#![forbid(unsafe_code)]

//! Notification core for lens-bound views.
//!
//! `lensync-runtime` sits between a lens tree ([`lensync_core`]) and a view
//! layer. It decides which writes concern a view ([`reactive::trigger`]),
//! coalesces bursts of reads and writes ([`reactive::debounce`]), and hands
//! the view bindings, local stores and derived lenses with stable identity
//! ([`reactive::scope`]).
//!
//! # Example
//!
//! ```
//! use lensync_core::{Lens, Node};
//! use lensync_runtime::reactive::{Directive, Scope};
//! use serde_json::json;
//!
//! let state = Node::new(json!({ "name": "Ada" }));
//! let scope = Scope::new();
//!
//! let name = scope.render(|cx| cx.use_lens(&state.go("name"), Directive::Strict));
//! name.set(json!("Grace"));
//! assert_eq!(state.go("name").get(), json!("Grace"));
//! assert!(scope.take_dirty());
//! ```

pub mod config;
pub mod reactive;
pub mod timer;

pub use config::{BindingConfig, ConfigError, TimeoutConfig};
pub use reactive::{
    ChainCache, Debounce, DerivedStore, Directive, LensBinding, MatchMode, Scope, Store, Timeout,
    Trigger, Triggers, create_store,
};
pub use timer::{Scheduler, TimerQueue};

pub use lensync_core::{ChangeEvent, Lens, LensKey, Node, Subscription};
