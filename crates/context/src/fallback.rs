//! Two-branch recovery for fallible collaborator calls.
//!
//! Every degradable dependency in this crate (tokenizer, summarizer, search,
//! embeddings) goes through [`or_fallback`], so the recovered path shows up in
//! the type and can be tested on its own.

/// A value that either came from the primary path or was substituted after
/// the primary path failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallible<T, E> {
    Primary(T),
    Fallback { value: T, error: E },
}

impl<T, E> Fallible<T, E> {
    pub fn value(&self) -> &T {
        match self {
            Self::Primary(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Primary(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// The error that forced the fallback, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Primary(_) => None,
            Self::Fallback { error, .. } => Some(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fallible<U, E> {
        match self {
            Self::Primary(value) => Fallible::Primary(f(value)),
            Self::Fallback { value, error } => Fallible::Fallback {
                value: f(value),
                error,
            },
        }
    }
}

/// Take the primary result, or build a substitute from its error.
pub fn or_fallback<T, E>(result: Result<T, E>, fallback: impl FnOnce(&E) -> T) -> Fallible<T, E> {
    match result {
        Ok(value) => Fallible::Primary(value),
        Err(error) => Fallible::Fallback {
            value: fallback(&error),
            error,
        },
    }
}
