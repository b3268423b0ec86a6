#![forbid(unsafe_code)]

//! Component adapters.
//!
//! - [`FieldModel`] and [`BoundField`] wrap a plain input widget: a getter
//!   mapper turns the lens value into the widget's prop, a setter mapper turns
//!   the widget's event into the next lens value.
//! - [`LensComponent`] is the retained-mode counterpart of a binding: it
//!   keeps its own copy of the lens value, refreshed by a change handler
//!   while mounted.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use lensync_core::{ChangeEvent, Lens, Subscription, display_path};

use super::binding::LensBinding;

/// Getter/setter mapping between a lens value and a widget's prop and event.
pub struct FieldModel<V, P, E> {
    prop: &'static str,
    event: &'static str,
    getter: Rc<dyn Fn(V) -> P>,
    setter: Rc<dyn Fn(E) -> V>,
}

impl<V, P, E> Clone for FieldModel<V, P, E> {
    fn clone(&self) -> Self {
        Self {
            prop: self.prop,
            event: self.event,
            getter: Rc::clone(&self.getter),
            setter: Rc::clone(&self.setter),
        }
    }
}

impl<V: 'static, P: 'static, E: 'static> FieldModel<V, P, E> {
    /// Model with named prop and event slots.
    pub fn new(
        prop: &'static str,
        getter: impl Fn(V) -> P + 'static,
        event: &'static str,
        setter: impl Fn(E) -> V + 'static,
    ) -> Self {
        Self {
            prop,
            event,
            getter: Rc::new(getter),
            setter: Rc::new(setter),
        }
    }

    /// Name of the prop the value is passed as.
    #[must_use]
    pub fn prop_name(&self) -> &'static str {
        self.prop
    }

    /// Name of the event the widget reports changes through.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        self.event
    }

    /// Map a lens value to the prop.
    pub fn to_prop(&self, value: V) -> P {
        (self.getter)(value)
    }

    /// Map an event to the next lens value.
    pub fn from_event(&self, event: E) -> V {
        (self.setter)(event)
    }
}

impl<V: 'static> FieldModel<V, V, V> {
    /// `value` prop in, `on_change` event out, both passed through unchanged.
    #[must_use]
    pub fn html_like() -> Self {
        Self::new("value", |v| v, "on_change", |e| e)
    }
}

impl<V, P, E> fmt::Debug for FieldModel<V, P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldModel")
            .field("prop", &self.prop)
            .field("event", &self.event)
            .finish()
    }
}

/// A binding seen through a [`FieldModel`].
pub struct BoundField<L: Lens, P, E> {
    binding: LensBinding<L>,
    model: FieldModel<L::Value, P, E>,
}

impl<L: Lens, P, E> Clone for BoundField<L, P, E> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            model: self.model.clone(),
        }
    }
}

impl<L: Lens, P: 'static, E: 'static> BoundField<L, P, E> {
    /// Wrap `binding` with `model`.
    pub fn new(binding: LensBinding<L>, model: FieldModel<L::Value, P, E>) -> Self {
        Self { binding, model }
    }

    /// Prop for the widget, or `None` without a lens.
    pub fn prop(&self) -> Option<P> {
        self.binding.value().map(|v| self.model.to_prop(v))
    }

    /// Feed a widget event back into the lens.
    pub fn emit(&self, event: E) {
        self.binding.set(self.model.from_event(event));
    }

    /// The underlying binding.
    #[must_use]
    pub fn binding(&self) -> &LensBinding<L> {
        &self.binding
    }

    /// The model in use.
    #[must_use]
    pub fn model(&self) -> &FieldModel<L::Value, P, E> {
        &self.model
    }
}

impl<L: Lens, P, E> fmt::Debug for BoundField<L, P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundField")
            .field("model", &self.model)
            .finish()
    }
}

type ChangeHandler<L> = Rc<dyn Fn(&ChangeEvent, &L, &mut <L as Lens>::Value)>;

struct ComponentInner<L: Lens> {
    lens: L,
    state: RefCell<L::Value>,
    version: Cell<u64>,
    handler: ChangeHandler<L>,
    invalidate: Rc<dyn Fn()>,
    subscription: RefCell<Option<Subscription>>,
}

/// Retained-mode component state bound to a lens.
///
/// State is read from the lens at construction. While mounted, every change
/// event reaching the lens runs the change handler, which by default re-reads
/// the lens into the state, and then invalidates.
pub struct LensComponent<L: Lens> {
    inner: Rc<ComponentInner<L>>,
}

impl<L: Lens> LensComponent<L> {
    /// Component over `lens` with the default re-read handler.
    pub fn new(lens: L, invalidate: impl Fn() + 'static) -> Self {
        Self::with_handler(lens, invalidate, |_, lens, state| *state = lens.get())
    }

    /// Component with a custom change handler.
    pub fn with_handler(
        lens: L,
        invalidate: impl Fn() + 'static,
        handler: impl Fn(&ChangeEvent, &L, &mut L::Value) + 'static,
    ) -> Self {
        let state = RefCell::new(lens.get());
        Self {
            inner: Rc::new(ComponentInner {
                lens,
                state,
                version: Cell::new(0),
                handler: Rc::new(handler),
                invalidate: Rc::new(invalidate),
                subscription: RefCell::new(None),
            }),
        }
    }

    /// Start listening. Mounting twice keeps a single listener.
    pub fn mount(&self) {
        if self.is_mounted() {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let sub = self.inner.lens.subscribe(move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let handler = Rc::clone(&inner.handler);
            {
                let mut state = inner.state.borrow_mut();
                handler(event, &inner.lens, &mut state);
            }
            inner.version.set(inner.version.get() + 1);
            (inner.invalidate)();
        });
        tracing::debug!(path = %display_path(self.inner.lens.key().path()), "component mounted");
        *self.inner.subscription.borrow_mut() = Some(sub);
    }

    /// Stop listening.
    pub fn unmount(&self) {
        if let Some(sub) = self.inner.subscription.borrow_mut().take() {
            sub.unsubscribe();
            tracing::debug!("component unmounted");
        }
    }

    /// Whether the component is listening.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.subscription.borrow().is_some()
    }

    /// Component state.
    #[must_use]
    pub fn value(&self) -> L::Value {
        self.inner.state.borrow().clone()
    }

    /// Number of handled change events.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// The lens the component is bound to.
    #[must_use]
    pub fn lens(&self) -> &L {
        &self.inner.lens
    }
}

impl<L: Lens> Drop for LensComponent<L> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<L: Lens> fmt::Debug for LensComponent<L>
where
    L::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LensComponent")
            .field("value", &*self.inner.state.borrow())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
