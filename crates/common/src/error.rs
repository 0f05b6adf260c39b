//! `.context()` support for crate-local error types.
//!
//! Each library crate owns its error enum. Giving it a message variant and a
//! [`FromMessage`] impl, then invoking [`impl_context!`](crate::impl_context)
//! next to its `Result` alias, adds `.context()`/`.with_context()` to
//! `Result` and `Option` inside that crate.

/// An error type with a variant that carries a plain message.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Define a crate-local `Context` trait for the `Error`/`Result` in scope.
///
/// Results keep their source text after the context, `"{context}: {source}"`;
/// a `None` becomes the context alone.
///
/// ```ignore
/// pub type Result<T> = std::result::Result<T, Error>;
/// meshrelay_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let context = context.into();
                self.map_err(|e| $crate::error::prefixed(&context, e))
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|e| $crate::error::prefixed(&f().into(), e))
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(context.into()))
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}

#[doc(hidden)]
pub fn prefixed<E: FromMessage>(context: &str, source: impl std::fmt::Display) -> E {
    E::from_message(format!("{context}: {source}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    mod config {
        use crate::FromMessage;

        #[derive(Debug, PartialEq, Eq)]
        pub struct Error(pub String);

        impl FromMessage for Error {
            fn from_message(message: String) -> Self {
                Self(message)
            }
        }

        pub type Result<T> = std::result::Result<T, Error>;

        crate::impl_context!();
    }

    use config::{Context, Error};

    #[test]
    fn result_error_keeps_source_text() {
        let res: Result<(), &str> = Err("expected value at line 1");
        let err = res.context("failed to read channels.json").unwrap_err();
        assert_eq!(err, Error("failed to read channels.json: expected value at line 1".into()));
    }

    #[test]
    fn lazy_context_only_runs_on_error() {
        let ok: Result<u8, &str> = Ok(7);
        assert_eq!(ok.with_context(|| -> String { unreachable!() }).unwrap(), 7);
    }

    #[test]
    fn none_becomes_context() {
        let err = None::<u8>.with_context(|| "no default channel").unwrap_err();
        assert_eq!(err, Error("no default channel".into()));
    }
}
