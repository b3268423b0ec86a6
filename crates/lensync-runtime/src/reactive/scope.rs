#![forbid(unsafe_code)]

//! Hook host: per-call-site state for immediate-mode views.
//!
//! A [`Scope`] owns one slot per hook call site. Slots are keyed by the
//! caller's source location (captured with `#[track_caller]`), the stack of
//! keys pushed with [`Scope::keyed`], and an occurrence counter for repeated
//! calls from the same site within one pass. Hooks return the same binding,
//! store or debouncer every pass as long as their inputs are unchanged.
//!
//! # Usage
//!
//! ```ignore
//! let scope = Scope::new();
//! scope.on_invalidate(|| request_redraw());
//!
//! scope.render(|cx| {
//!     let name = cx.use_lens(&state.go("name"), Directive::Strict);
//!     let draft = cx.use_store(String::new);
//!     draw(name.get(), draft.get());
//! });
//! ```
//!
//! # Invariants
//!
//! 1. A slot not visited during a [`Scope::render`] pass is released at the
//!    end of that pass, detaching its listeners and cancelling its timers.
//!    Pending debounced writes are committed rather than cancelled.
//! 2. When a hook's lens identity or triggers change, the old listener is
//!    detached before the new one attaches. A pending debounced write moves
//!    to the new binding if the lens is unchanged.
//! 3. Listeners hold the scope weakly; dropping the scope releases every slot.
//! 4. Matching notifications mark the scope dirty and call the invalidation
//!    hook; [`Scope::take_dirty`] reads and clears the flag.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::panic::Location;
use std::rc::{Rc, Weak};
use std::time::Duration;

use ahash::{AHashMap, RandomState};
use lensync_core::{ChangeEvent, Lens, LensKey};

use super::binding::{Invalidate, LensBinding};
use super::component::{BoundField, FieldModel};
use super::context::LensContext;
use super::debounce::{Debounce, Timeout};
use super::store::{DerivedStore, Store, StoreValue};
use super::subscription::{Attachment, Callback, SubscriptionScope};
use super::trigger::Triggers;
use crate::timer::{Scheduler, TimerQueue};

type Site = (&'static Location<'static>, u64);
type SlotKey = (&'static Location<'static>, u64, u32);

struct Slot {
    pass: u64,
    value: Rc<dyn Any>,
    release: Box<dyn Fn()>,
}

struct ScopeInner {
    slots: RefCell<AHashMap<SlotKey, Slot>>,
    occurrences: RefCell<AHashMap<Site, u32>>,
    keys: RefCell<Vec<u64>>,
    hasher: RandomState,
    pass: Cell<u64>,
    dirty: Cell<bool>,
    on_invalidate: RefCell<Option<Rc<dyn Fn()>>>,
    scheduler: Rc<dyn Scheduler>,
}

impl ScopeInner {
    fn invalidate(&self) {
        self.dirty.set(true);
        let hook = self.on_invalidate.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Owner of hook state for one view.
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Scope scheduling debounced work on the thread-local [`TimerQueue`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_scheduler(Rc::new(TimerQueue::global()))
    }

    /// Scope scheduling debounced work on `scheduler`.
    #[must_use]
    pub fn with_scheduler(scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                slots: RefCell::new(AHashMap::new()),
                occurrences: RefCell::new(AHashMap::new()),
                keys: RefCell::new(Vec::new()),
                hasher: RandomState::new(),
                pass: Cell::new(0),
                dirty: Cell::new(false),
                on_invalidate: RefCell::new(None),
                scheduler,
            }),
        }
    }

    /// Install the hook called whenever a bound value needs re-rendering.
    pub fn on_invalidate(&self, hook: impl Fn() + 'static) {
        *self.inner.on_invalidate.borrow_mut() = Some(Rc::new(hook));
    }

    /// Invalidation callback for bindings owned by this scope.
    #[must_use]
    pub fn invalidator(&self) -> Invalidate {
        let weak: Weak<ScopeInner> = Rc::downgrade(&self.inner);
        Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
        })
    }

    /// Mark the scope dirty and call the invalidation hook.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    /// Whether anything invalidated the scope since the last call.
    pub fn take_dirty(&self) -> bool {
        self.inner.dirty.replace(false)
    }

    /// Whether the scope is dirty, without clearing.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Scheduler used for debounced hooks.
    #[must_use]
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::clone(&self.inner.scheduler)
    }

    /// Number of live slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Run one render pass, then release slots the pass did not visit.
    pub fn render<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let pass = self.inner.pass.get() + 1;
        self.inner.pass.set(pass);
        self.inner.occurrences.borrow_mut().clear();
        self.inner.dirty.set(false);

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("scope_render", pass).entered();

        let out = f(self);
        self.sweep(pass);
        out
    }

    /// Run `f` with `key` pushed onto the slot key stack.
    ///
    /// Hooks called from a loop should be wrapped so each item keeps its own
    /// slots when items are reordered.
    pub fn keyed<R>(&self, key: impl Hash, f: impl FnOnce(&Self) -> R) -> R {
        let hashed = self.inner.hasher.hash_one(key);
        self.inner.keys.borrow_mut().push(hashed);
        let out = f(self);
        self.inner.keys.borrow_mut().pop();
        out
    }

    fn sweep(&self, pass: u64) {
        let stale: Vec<Slot> = {
            let mut slots = self.inner.slots.borrow_mut();
            let keys: Vec<SlotKey> = slots
                .iter()
                .filter(|(_, slot)| slot.pass != pass)
                .map(|(key, _)| *key)
                .collect();
            keys.iter().filter_map(|key| slots.remove(key)).collect()
        };
        if stale.is_empty() {
            return;
        }
        tracing::debug!(released = stale.len(), pass, "scope swept stale slots");
        for slot in stale {
            (slot.release)();
        }
    }

    #[track_caller]
    fn slot_key(&self) -> SlotKey {
        let location = Location::caller();
        let keys = self.inner.hasher.hash_one(&*self.inner.keys.borrow());
        let mut occurrences = self.inner.occurrences.borrow_mut();
        let seen = occurrences.entry((location, keys)).or_insert(0);
        let occurrence = *seen;
        *seen += 1;
        (location, keys, occurrence)
    }

    /// Per-call-site state, created by `init` on first visit. `release` runs
    /// when the slot is swept or the scope is dropped.
    #[track_caller]
    pub fn slot<T: 'static>(&self, init: impl FnOnce() -> T, release: impl Fn(&T) + 'static) -> Rc<T> {
        let key = self.slot_key();
        let pass = self.inner.pass.get();

        let existing = {
            let mut slots = self.inner.slots.borrow_mut();
            match slots.get_mut(&key) {
                Some(slot) => {
                    slot.pass = pass;
                    Some(Rc::clone(&slot.value))
                }
                None => None,
            }
        };
        if let Some(value) = existing {
            match value.downcast::<T>() {
                Ok(value) => return value,
                Err(_) => {
                    tracing::warn!(
                        location = %key.0,
                        ty = std::any::type_name::<T>(),
                        "hook slot changed type; recreating"
                    );
                    let old = self.inner.slots.borrow_mut().remove(&key);
                    if let Some(old) = old {
                        (old.release)();
                    }
                }
            }
        }

        let value = Rc::new(init());
        let held = Rc::clone(&value);
        let slot = Slot {
            pass,
            value: Rc::clone(&value) as Rc<dyn Any>,
            release: Box::new(move || release(&held)),
        };
        self.inner.slots.borrow_mut().insert(key, slot);
        value
    }

    /// Bind `lens` for this view.
    #[track_caller]
    pub fn use_lens<L: Lens>(&self, lens: &L, triggers: impl Into<Triggers>) -> LensBinding<L> {
        self.use_lens_opt(Some(lens), triggers)
    }

    /// Bind `lens` if present; an absent lens yields an inert binding.
    #[track_caller]
    pub fn use_lens_opt<L: Lens>(
        &self,
        lens: Option<&L>,
        triggers: impl Into<Triggers>,
    ) -> LensBinding<L> {
        let triggers = triggers.into();
        let deps = (lens.map(Lens::key), triggers.clone(), None);
        self.binding_slot(deps, || {
            LensBinding::from_option(lens, triggers, self.invalidator_fn())
        })
    }

    /// Bind `lens` with debounced reads and writes.
    #[track_caller]
    pub fn use_lens_debounce<L: Lens>(
        &self,
        lens: Option<&L>,
        timeout: impl Into<Timeout>,
        triggers: impl Into<Triggers>,
    ) -> LensBinding<L> {
        let triggers = triggers.into();
        let timeout = timeout.into();
        let deps = (lens.map(Lens::key), triggers.clone(), Some(timeout));
        self.binding_slot(deps, || {
            LensBinding::debounced(
                lens,
                timeout,
                triggers,
                self.scheduler(),
                self.invalidator_fn(),
            )
        })
    }

    /// Bind the lens currently provided by `ctx`, falling back to `default`.
    #[track_caller]
    pub fn use_context<L: Lens>(
        &self,
        ctx: &LensContext<L>,
        default: Option<&L>,
        triggers: impl Into<Triggers>,
    ) -> LensBinding<L> {
        let lens = ctx.current().or_else(|| default.cloned());
        self.use_lens_opt(lens.as_ref(), triggers)
    }

    /// Bind `lens` and view it through `model`.
    #[track_caller]
    pub fn use_field<L, P, E>(
        &self,
        lens: &L,
        model: &FieldModel<L::Value, P, E>,
        triggers: impl Into<Triggers>,
    ) -> BoundField<L, P, E>
    where
        L: Lens,
        P: 'static,
        E: 'static,
    {
        BoundField::new(self.use_lens(lens, triggers), model.clone())
    }

    #[track_caller]
    fn binding_slot<L: Lens>(
        &self,
        deps: BindingDeps,
        build: impl FnOnce() -> LensBinding<L>,
    ) -> LensBinding<L> {
        type Held<L> = RefCell<Option<(BindingDeps, LensBinding<L>)>>;
        let slot: Rc<Held<L>> = self.slot(
            || RefCell::new(None),
            |held: &Held<L>| {
                if let Some((_, binding)) = held.borrow_mut().take() {
                    binding.detach();
                }
            },
        );
        if let Some((current, binding)) = &*slot.borrow()
            && *current == deps
        {
            return binding.clone();
        }
        let previous = slot.borrow_mut().take();
        let carried = previous.map(|(_, old)| {
            let pending = old.take_pending_write();
            old.detach();
            tracing::debug!("binding dependencies changed; reattaching");
            (old, pending)
        });
        let binding = build();
        if let Some((old, Some(value))) = carried {
            binding.carry_write(&old, value);
        }
        *slot.borrow_mut() = Some((deps, binding.clone()));
        binding
    }

    fn invalidator_fn(&self) -> impl Fn() + 'static {
        let invalidate = self.invalidator();
        move || invalidate()
    }

    /// Attach raw callbacks to `lens`, re-attaching when the lens identity
    /// changes. The newest callbacks passed in always receive events.
    #[track_caller]
    pub fn use_subscribe<L: Lens>(&self, lens: &L, callbacks: impl IntoIterator<Item = Callback<L>>) {
        struct Held<L: Lens> {
            attachment: RefCell<Attachment<(LensKey, usize)>>,
            current: Rc<RefCell<Vec<Callback<L>>>>,
        }
        let held: Rc<Held<L>> = self.slot(
            || Held {
                attachment: RefCell::new(Attachment::new()),
                current: Rc::new(RefCell::new(Vec::new())),
            },
            |held: &Held<L>| held.attachment.borrow_mut().release(),
        );
        let callbacks: Vec<Callback<L>> = callbacks.into_iter().collect();
        let count = callbacks.len();
        *held.current.borrow_mut() = callbacks;

        let current = Rc::clone(&held.current);
        held.attachment
            .borrow_mut()
            .ensure((lens.key(), count), |scope: &mut SubscriptionScope| {
                for index in 0..count {
                    let current = Rc::clone(&current);
                    scope.subscribe(lens, move |event: &ChangeEvent, target: &L| {
                        let callback = current.borrow().get(index).cloned();
                        if let Some(callback) = callback {
                            callback(event, target);
                        }
                    });
                }
            });
    }

    /// Count matching changes of `lens`; each one invalidates the scope.
    #[track_caller]
    pub fn use_catch<L: Lens>(&self, lens: &L, triggers: impl Into<Triggers>) -> u64 {
        struct Held {
            attachment: RefCell<Attachment<(LensKey, Triggers)>>,
            count: Rc<Cell<u64>>,
        }
        let held: Rc<Held> = self.slot(
            || Held {
                attachment: RefCell::new(Attachment::new()),
                count: Rc::new(Cell::new(0)),
            },
            |held: &Held| held.attachment.borrow_mut().release(),
        );
        let triggers = triggers.into();
        let count = Rc::clone(&held.count);
        let invalidate = self.invalidator();
        held.attachment
            .borrow_mut()
            .ensure((lens.key(), triggers.clone()), |scope| {
                scope.subscribe_matching(lens, triggers, move |_| {
                    count.set(count.get() + 1);
                    invalidate();
                });
            });
        held.count.get()
    }

    /// Store created from `init` on first visit, stable afterwards.
    #[track_caller]
    pub fn use_store<T: StoreValue>(&self, init: impl FnOnce() -> T) -> Store<T> {
        let store: Rc<Store<T>> = self.slot(|| Store::new(init()), |_| {});
        Store::clone(&store)
    }

    /// Store recreated from `init` whenever `deps` change.
    #[track_caller]
    pub fn use_store_with<T, D>(&self, init: impl FnOnce() -> T, deps: D) -> Store<T>
    where
        T: StoreValue,
        D: PartialEq + 'static,
    {
        type Held<T, D> = RefCell<Option<(D, Store<T>)>>;
        let held: Rc<Held<T, D>> = self.slot(|| RefCell::new(None), |_| {});
        if let Some((current, store)) = &*held.borrow()
            && *current == deps
        {
            return store.clone();
        }
        let store = Store::new(init());
        *held.borrow_mut() = Some((deps, store.clone()));
        store
    }

    /// Store re-seeded whenever `seed` changes, keeping its identity.
    #[track_caller]
    pub fn use_derived_store<T: StoreValue + PartialEq>(&self, seed: T) -> DerivedStore<T> {
        let mut created = false;
        let derived: Rc<DerivedStore<T>> = self.slot(
            || {
                created = true;
                DerivedStore::new(seed.clone())
            },
            |_| {},
        );
        if !created {
            derived.sync(seed);
        }
        DerivedStore::clone(&derived)
    }

    /// Derived lens for this call site, re-derived when the source lens
    /// identity or `deps` change.
    ///
    /// `deps` stands for whatever the factory captures; pass `()` when it
    /// captures nothing.
    #[track_caller]
    pub fn use_chain<L, K, D, F>(&self, lens: &L, deps: K, factory: F) -> D
    where
        L: Lens,
        K: PartialEq + 'static,
        D: Lens,
        F: FnOnce(&L) -> D,
    {
        type Held<K, D> = RefCell<Option<((LensKey, K), D)>>;
        let held: Rc<Held<K, D>> = self.slot(|| RefCell::new(None), |_| {});
        let deps = (lens.key(), deps);
        if let Some((current, derived)) = &*held.borrow()
            && *current == deps
        {
            return derived.clone();
        }
        let derived = factory(lens);
        tracing::trace!(
            path = %lensync_core::display_path(deps.0.path()),
            "chain derived"
        );
        *held.borrow_mut() = Some((deps, derived.clone()));
        derived
    }

    /// Debouncer owned by this call site; pending work is cancelled on release.
    #[track_caller]
    pub fn use_debounce(&self, default_delay: Duration) -> Debounce {
        let scheduler = self.scheduler();
        let debounce: Rc<Debounce> = self.slot(
            || Debounce::new(scheduler, default_delay),
            Debounce::cancel,
        );
        Debounce::clone(&debounce)
    }
}

type BindingDeps = (Option<LensKey>, Triggers, Option<Timeout>);

impl Drop for Scope {
    fn drop(&mut self) {
        let slots: Vec<Slot> = self
            .inner
            .slots
            .borrow_mut()
            .drain()
            .map(|(_, slot)| slot)
            .collect();
        for slot in slots {
            (slot.release)();
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("slots", &self.slot_count())
            .field("pass", &self.inner.pass.get())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
