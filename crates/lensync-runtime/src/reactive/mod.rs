#![forbid(unsafe_code)]

//! Reactive bindings over lenses.
//!
//! This module turns lens notifications into view updates:
//!
//! - [`Triggers`]: which change events a listener cares about.
//! - [`SubscriptionScope`] and [`Attachment`]: scoped listener lifetimes.
//! - [`Debounce`]: last-call-wins coalescing of reads and writes.
//! - [`LensBinding`]: a read/write pair that invalidates its owner.
//! - [`Store`] and [`DerivedStore`]: lenses over locally owned values.
//! - [`ChainCache`]: derived lenses with stable identity.
//! - [`Scope`]: per-call-site hook state for immediate-mode views.
//! - [`LensContext`], [`FieldModel`] and [`LensComponent`]: adapters for
//!   contextual lenses, plain widgets and retained-mode components.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc`/`RefCell`). Listeners capture their
//! owners weakly and are detached by RAII guards, so dropping a binding,
//! store hook or scope is enough to stop notifications.
//!
//! The data flow for one write is: lens write, trigger match, optional read
//! debounce, invalidation callback, re-read through the lens. Notifications
//! never carry values; consumers always read the lens.
//!
//! # Invariants
//!
//! 1. A listener sees each related write at most once.
//! 2. Listeners run in registration order.
//! 3. A superseded or cancelled debounced task never runs.
//! 4. Releasing a guard detaches exactly what it attached.

pub mod binding;
pub mod chain;
pub mod component;
pub mod context;
pub mod debounce;
pub mod scope;
pub mod store;
pub mod subscription;
pub mod trigger;

pub use binding::{Invalidate, LensBinding, Setter};
pub use chain::{ChainCache, chain};
pub use component::{BoundField, FieldModel, LensComponent};
pub use context::{LensContext, ProvidedLens};
pub use debounce::{Debounce, Timeout};
pub use scope::Scope;
pub use store::{DerivedStore, Store, StoreValue, create_store};
pub use subscription::{
    Attachment, Callback, SubscriptionScope, callback, subscribe, subscribe_all,
    subscribe_matching,
};
pub use trigger::{Directive, MatchMode, Trigger, Triggers, UnknownDirective};
