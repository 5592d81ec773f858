//! Message-context helpers shared by the crate-local `thiserror` enums.

/// An error type with a plain-message variant.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;

    /// `"{context}: {source}"`, the shape every context wrapper produces.
    fn wrap(context: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::from_message(format!("{}: {source}", context.into()))
    }
}

/// Define a crate-local `Context` trait adding `.context()` and
/// `.with_context()` to `Result` and `Option`.
///
/// Expects `Error: FromMessage` and a `Result<T>` alias in scope.
///
/// ```ignore
/// voxrelay_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.map_err(|e| <Error as $crate::FromMessage>::wrap(context, e))
            }

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|e| <Error as $crate::FromMessage>::wrap(f(), e))
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(context.into()))
            }

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}
