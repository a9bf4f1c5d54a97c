//! The immutable state/loading/error triple.
//!
//! Every accepted mutation of a store produces a brand new [`Triple`];
//! existing triples are never modified in place.

use serde::{Deserialize, Serialize};

/// Which segment of a triple the latest accepted mutation changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripleEvent {
    /// The state value changed (also the tag of a freshly built triple)
    #[default]
    State,
    /// The loading flag changed
    Loading,
    /// The error changed
    Error,
}

/// Immutable bundle of state, loading flag, error and event tag.
///
/// Equality compares state, loading flag and error only. The event tag
/// is metadata about how the triple was produced and never takes part in
/// change detection.
///
/// # Example
///
/// ```rust
/// use tristore::core::{Triple, TripleEvent};
///
/// let idle: Triple<String, u32> = Triple::new(0);
/// let loading = idle.with_loading(true);
///
/// assert!(!idle.is_loading());
/// assert!(loading.is_loading());
/// assert_eq!(loading.event(), TripleEvent::Loading);
/// assert_ne!(idle, loading);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Triple<E, S> {
    state: S,
    is_loading: bool,
    error: Option<E>,
    event: TripleEvent,
}

/// Field overrides for [`Triple::copy_with`].
///
/// `None` keeps the receiver's value. The error uses a nested option so a
/// patch can distinguish "keep" (`None`) from "clear" (`Some(None)`).
#[derive(Clone, Debug)]
pub struct TriplePatch<E, S> {
    pub state: Option<S>,
    pub is_loading: Option<bool>,
    pub error: Option<Option<E>>,
    pub event: TripleEvent,
}

impl<E, S> TriplePatch<E, S> {
    /// A patch that overrides nothing and tags the result with `event`.
    pub fn tagged(event: TripleEvent) -> Self {
        Self {
            state: None,
            is_loading: None,
            error: None,
            event,
        }
    }
}

impl<E, S> Triple<E, S> {
    /// Build the initial triple: not loading, no error, tagged `State`.
    pub fn new(state: S) -> Self {
        Self::from_parts(state, false, None, TripleEvent::State)
    }

    /// Build a triple from all four parts.
    pub fn from_parts(state: S, is_loading: bool, error: Option<E>, event: TripleEvent) -> Self {
        Self {
            state,
            is_loading,
            error,
            event,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    pub fn event(&self) -> TripleEvent {
        self.event
    }

    /// Split the triple into `(state, is_loading, error, event)`.
    pub fn into_parts(self) -> (S, bool, Option<E>, TripleEvent) {
        (self.state, self.is_loading, self.error, self.event)
    }
}

impl<E: Clone, S: Clone> Triple<E, S> {
    /// Copy the triple, overriding the fields set in `patch`.
    ///
    /// Pure: the receiver is left untouched.
    pub fn copy_with(&self, patch: TriplePatch<E, S>) -> Self {
        Self {
            state: patch.state.unwrap_or_else(|| self.state.clone()),
            is_loading: patch.is_loading.unwrap_or(self.is_loading),
            error: patch.error.unwrap_or_else(|| self.error.clone()),
            event: patch.event,
        }
    }

    /// Copy with a new state, tagged `State`.
    pub fn with_state(&self, state: S) -> Self {
        self.copy_with(TriplePatch {
            state: Some(state),
            ..TriplePatch::tagged(TripleEvent::State)
        })
    }

    /// Copy with a new loading flag, tagged `Loading`.
    pub fn with_loading(&self, is_loading: bool) -> Self {
        self.copy_with(TriplePatch {
            is_loading: Some(is_loading),
            ..TriplePatch::tagged(TripleEvent::Loading)
        })
    }

    /// Copy with a new error, tagged `Error`. The loading flag is kept.
    pub fn with_error(&self, error: E) -> Self {
        self.copy_with(TriplePatch {
            error: Some(Some(error)),
            ..TriplePatch::tagged(TripleEvent::Error)
        })
    }

    /// Copy with the error cleared, tagged `Error`.
    pub fn without_error(&self) -> Self {
        self.copy_with(TriplePatch {
            error: Some(None),
            ..TriplePatch::tagged(TripleEvent::Error)
        })
    }
}

impl<E: PartialEq, S: PartialEq> Triple<E, S> {
    /// Whether the segment named by `event` differs between the two triples.
    pub fn segment_differs(&self, other: &Self, event: TripleEvent) -> bool {
        match event {
            TripleEvent::State => self.state != other.state,
            TripleEvent::Loading => self.is_loading != other.is_loading,
            TripleEvent::Error => self.error != other.error,
        }
    }
}

impl<E: PartialEq, S: PartialEq> PartialEq for Triple<E, S> {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.is_loading == other.is_loading
            && self.error == other.error
    }
}
