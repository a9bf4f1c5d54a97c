//! Two-variant result type consumed by `Store::execute_either`.

use serde::{Deserialize, Serialize};

/// Either an error (`Left`) or a state (`Right`).
///
/// Convertible to and from `Result<S, E>`.
///
/// # Example
///
/// ```rust
/// use tristore::core::Either;
///
/// let ok: Either<String, u32> = Ok(4).into();
/// assert_eq!(ok.fold(|_| 0, |n| n * 2), 8);
///
/// let err: Either<String, u32> = Either::Left("offline".to_string());
/// assert!(err.is_left());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Either<E, S> {
    Left(E),
    Right(S),
}

impl<E, S> Either<E, S> {
    pub fn is_left(&self) -> bool {
        matches!(self, Self::Left(_))
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Self::Right(_))
    }

    /// Collapse both variants into one value.
    pub fn fold<T>(self, on_left: impl FnOnce(E) -> T, on_right: impl FnOnce(S) -> T) -> T {
        match self {
            Self::Left(error) => on_left(error),
            Self::Right(state) => on_right(state),
        }
    }

    pub fn into_result(self) -> Result<S, E> {
        self.fold(Err, Ok)
    }
}

impl<E, S> From<Result<S, E>> for Either<E, S> {
    fn from(result: Result<S, E>) -> Self {
        match result {
            Ok(state) => Self::Right(state),
            Err(error) => Self::Left(error),
        }
    }
}

impl<E, S> From<Either<E, S>> for Result<S, E> {
    fn from(either: Either<E, S>) -> Self {
        either.into_result()
    }
}
