#![forbid(unsafe_code)]

//! Trigger matching: deciding whether a [`ChangeEvent`] concerns a listener.
//!
//! A listener declares one or more [`Trigger`]s. Each is either a named
//! [`Directive`], a name that did not resolve, or a predicate closure. The
//! declarations are resolved once into [`Triggers`] and evaluated per event.
//!
//! # Directives
//!
//! | Directive | Aliases             | Matches when                              |
//! |-----------|---------------------|-------------------------------------------|
//! | `strict`  | `object`, `change`  | the write hit this exact node             |
//! | `path`    |                     | exact node, or an ancestor was written    |
//! | `subtree` | `tree`, `deep`      | exact node, or a descendant was written   |
//! | `all`     | `objectDefined`     | always                                    |
//!
//! # Combination Modes
//!
//! - [`MatchMode::Union`]: the event matches if any declaration says yes.
//!   Adding declarations can only turn a miss into a hit.
//! - [`MatchMode::Priority`]: declarations are consulted in order and the
//!   first one with an opinion decides. Directives only have an opinion when
//!   they match; predicates return `None` to pass.
//!
//! # Failure Modes
//!
//! An unknown directive name never matches. It is logged at `warn` when
//! resolved and otherwise ignored, so a misspelt trigger leaves the view
//! un-updated instead of failing.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use lensync_core::ChangeEvent;

/// Named match policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Write at exactly this node.
    Strict,
    /// Write at this node or an ancestor.
    Path,
    /// Write at this node or a descendant.
    Subtree,
    /// Any related write.
    All,
}

const DIRECTIVE_NAMES: &[(&str, Directive)] = &[
    ("strict", Directive::Strict),
    ("object", Directive::Strict),
    ("change", Directive::Strict),
    ("path", Directive::Path),
    ("subtree", Directive::Subtree),
    ("tree", Directive::Subtree),
    ("deep", Directive::Subtree),
    ("all", Directive::All),
    ("objectDefined", Directive::All),
];

impl Directive {
    /// Every directive.
    pub const ALL: [Self; 4] = [Self::Strict, Self::Path, Self::Subtree, Self::All];

    /// Whether `event` satisfies this directive.
    #[must_use]
    pub fn matches(self, event: &ChangeEvent) -> bool {
        match self {
            Self::Strict => event.is_current(),
            Self::Path => event.is_current() || !event.diffs().is_empty(),
            Self::Subtree => event.is_current() || event.diffs().is_empty(),
            Self::All => true,
        }
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Path => "path",
            Self::Subtree => "subtree",
            Self::All => "all",
        }
    }

    /// Look up a directive by name or alias.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        DIRECTIVE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|&(_, directive)| directive)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned by [`Directive::from_str`] for an unrecognized name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownDirective(pub String);

impl fmt::Display for UnknownDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown trigger directive `{}`", self.0)
    }
}

impl std::error::Error for UnknownDirective {}

impl FromStr for Directive {
    type Err = UnknownDirective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| UnknownDirective(s.to_owned()))
    }
}

type Predicate = Rc<dyn Fn(&ChangeEvent) -> Option<bool>>;

/// One match declaration.
#[derive(Clone)]
pub enum Trigger {
    /// A named directive.
    Directive(Directive),
    /// A name that did not resolve. Never matches.
    Unrecognized(Rc<str>),
    /// A custom predicate. `None` means "no opinion".
    Predicate(Predicate),
}

impl Trigger {
    /// Predicate trigger from a yes/no closure.
    pub fn when(f: impl Fn(&ChangeEvent) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(move |event: &ChangeEvent| Some(f(event))))
    }

    /// Predicate trigger that may abstain by returning `None`.
    pub fn opinion(f: impl Fn(&ChangeEvent) -> Option<bool> + 'static) -> Self {
        Self::Predicate(Rc::new(f))
    }

    /// Resolve a name, degrading unknown names to [`Trigger::Unrecognized`].
    #[must_use]
    pub fn named(name: &str) -> Self {
        match Directive::lookup(name) {
            Some(directive) => Self::Directive(directive),
            None => {
                tracing::warn!(directive = name, "unknown trigger directive; it will never match");
                Self::Unrecognized(Rc::from(name))
            }
        }
    }

    /// Verdict of this declaration for `event`.
    ///
    /// Directives answer `Some(true)` or abstain, unrecognized names always
    /// abstain, predicates answer for themselves.
    #[must_use]
    pub fn verdict(&self, event: &ChangeEvent) -> Option<bool> {
        match self {
            Self::Directive(directive) => directive.matches(event).then_some(true),
            Self::Unrecognized(_) => None,
            Self::Predicate(predicate) => predicate(event),
        }
    }

    /// Whether this declaration alone matches `event`.
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.verdict(event).unwrap_or(false)
    }
}

impl From<Directive> for Trigger {
    fn from(directive: Directive) -> Self {
        Self::Directive(directive)
    }
}

impl From<&str> for Trigger {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Trigger {
    fn from(name: String) -> Self {
        Self::named(&name)
    }
}

/// Declarations compare by directive, by name, or by predicate identity.
impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Directive(a), Self::Directive(b)) => a == b,
            (Self::Unrecognized(a), Self::Unrecognized(b)) => a == b,
            (Self::Predicate(a), Self::Predicate(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directive(directive) => write!(f, "Directive({directive})"),
            Self::Unrecognized(name) => write!(f, "Unrecognized({name:?})"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// How a list of declarations is combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Any declaration saying yes matches.
    #[default]
    Union,
    /// The first declaration with an opinion decides.
    Priority,
}

/// Union of declarations: true iff any matches. Short-circuits.
#[must_use]
pub fn matches(triggers: &[Trigger], event: &ChangeEvent) -> bool {
    triggers.iter().any(|trigger| trigger.matches(event))
}

/// Priority chain: the first defined verdict wins; no verdict is a miss.
#[must_use]
pub fn first_verdict(triggers: &[Trigger], event: &ChangeEvent) -> bool {
    triggers
        .iter()
        .find_map(|trigger| trigger.verdict(event))
        .unwrap_or(false)
}

/// A resolved declaration list plus its combination mode.
///
/// An empty list behaves as `[strict]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Triggers {
    list: Vec<Trigger>,
    mode: MatchMode,
}

impl Triggers {
    /// Union of `triggers`.
    pub fn union<I, T>(triggers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Trigger>,
    {
        Self {
            list: triggers.into_iter().map(Into::into).collect(),
            mode: MatchMode::Union,
        }
    }

    /// Priority chain of `triggers`.
    pub fn priority<I, T>(triggers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Trigger>,
    {
        Self {
            list: triggers.into_iter().map(Into::into).collect(),
            mode: MatchMode::Priority,
        }
    }

    /// The default: `[strict]`.
    #[must_use]
    pub fn strict() -> Self {
        Self::union([Directive::Strict])
    }

    /// Append a declaration.
    #[must_use]
    pub fn with(mut self, trigger: impl Into<Trigger>) -> Self {
        self.list.push(trigger.into());
        self
    }

    /// Declarations as written.
    #[must_use]
    pub fn as_slice(&self) -> &[Trigger] {
        &self.list
    }

    /// Combination mode.
    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Whether no declaration was given (the `strict` default applies).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Evaluate against `event`.
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if self.list.is_empty() {
            return Directive::Strict.matches(event);
        }
        match self.mode {
            MatchMode::Union => matches(&self.list, event),
            MatchMode::Priority => first_verdict(&self.list, event),
        }
    }
}

impl From<Directive> for Triggers {
    fn from(directive: Directive) -> Self {
        Self::union([directive])
    }
}

impl From<Trigger> for Triggers {
    fn from(trigger: Trigger) -> Self {
        Self::union([trigger])
    }
}

impl From<&str> for Triggers {
    fn from(name: &str) -> Self {
        Self::union([name])
    }
}

impl<T: Into<Trigger>> From<Vec<T>> for Triggers {
    fn from(triggers: Vec<T>) -> Self {
        Self::union(triggers)
    }
}

impl<T: Into<Trigger>, const N: usize> From<[T; N]> for Triggers {
    fn from(triggers: [T; N]) -> Self {
        Self::union(triggers)
    }
}

/// Build a union [`Triggers`] from mixed declarations.
///
/// # Examples
///
/// ```ignore
/// let t = triggers!["path", Directive::Subtree, Trigger::when(|e| e.is_current())];
/// ```
#[macro_export]
macro_rules! triggers {
    () => {
        $crate::reactive::trigger::Triggers::default()
    };
    ($($t:expr),+ $(,)?) => {
        $crate::reactive::trigger::Triggers::union(
            [$($crate::reactive::trigger::Trigger::from($t)),+]
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensync_core::PathSegment;

    fn exact() -> ChangeEvent {
        ChangeEvent::exact(vec![PathSegment::from("a")])
    }

    fn from_ancestor() -> ChangeEvent {
        ChangeEvent::new(false, vec![PathSegment::from("a")], Vec::new())
    }

    fn from_descendant() -> ChangeEvent {
        ChangeEvent::new(
            false,
            Vec::new(),
            vec![PathSegment::from("a"), PathSegment::from("b")],
        )
    }

    #[test]
    fn directive_table() {
        let cases = [
            (Directive::Strict, [true, false, false]),
            (Directive::Path, [true, true, false]),
            (Directive::Subtree, [true, false, true]),
            (Directive::All, [true, true, true]),
        ];
        for (directive, [e, a, d]) in cases {
            assert_eq!(directive.matches(&exact()), e, "{directive} exact");
            assert_eq!(directive.matches(&from_ancestor()), a, "{directive} ancestor");
            assert_eq!(directive.matches(&from_descendant()), d, "{directive} descendant");
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!("object".parse::<Directive>(), Ok(Directive::Strict));
        assert_eq!("change".parse::<Directive>(), Ok(Directive::Strict));
        assert_eq!("tree".parse::<Directive>(), Ok(Directive::Subtree));
        assert_eq!("deep".parse::<Directive>(), Ok(Directive::Subtree));
        assert_eq!("objectDefined".parse::<Directive>(), Ok(Directive::All));
        for directive in Directive::ALL {
            assert_eq!(directive.name().parse::<Directive>(), Ok(directive));
        }
    }

    #[test]
    fn unknown_name_parses_to_error() {
        let err = "sideways".parse::<Directive>().unwrap_err();
        assert_eq!(err.to_string(), "unknown trigger directive `sideways`");
    }

    #[test]
    fn unknown_trigger_never_matches() {
        let t = Trigger::from("sideways");
        assert!(matches!(t, Trigger::Unrecognized(_)));
        assert!(!t.matches(&exact()));
        assert!(!Triggers::from("sideways").matches(&exact()));
    }

    #[test]
    fn union_is_any() {
        let t = triggers!["strict", "subtree"];
        assert!(t.matches(&exact()));
        assert!(t.matches(&from_descendant()));
        assert!(!t.matches(&from_ancestor()));
    }

    #[test]
    fn empty_defaults_to_strict() {
        let t = Triggers::default();
        assert!(t.matches(&exact()));
        assert!(!t.matches(&from_ancestor()));
    }

    #[test]
    fn predicate_union() {
        let t = Triggers::union([Trigger::when(|e| e.origin().is_empty())]);
        assert!(t.matches(&from_ancestor()));
        assert!(!t.matches(&exact()));
    }

    #[test]
    fn priority_first_opinion_wins() {
        let veto = Trigger::opinion(|e| (!e.is_current()).then_some(false));
        let t = Triggers::priority([veto, Trigger::from(Directive::All)]);
        assert!(t.matches(&exact()));
        assert!(!t.matches(&from_ancestor()));
    }

    #[test]
    fn priority_falls_through_abstentions() {
        let abstain = Trigger::opinion(|_| None);
        let t = Triggers::priority([abstain, Trigger::from("nonsense"), Trigger::from("path")]);
        assert!(t.matches(&from_ancestor()));
        assert!(!t.matches(&from_descendant()));
    }

    #[test]
    fn equality_by_identity_for_predicates() {
        let p = Trigger::when(|_| true);
        assert_eq!(p, p.clone());
        assert_ne!(p, Trigger::when(|_| true));
        assert_eq!(Trigger::from("object"), Trigger::from(Directive::Strict));
        assert_eq!(triggers!["path"], Triggers::from(Directive::Path));
    }
}
