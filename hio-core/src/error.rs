use std::io;

/// The error taxonomy of the storage backend. Kinds, not messages: callers
/// branch on the variant, not on `to_string()`.
#[derive(Debug, thiserror::Error)]
pub enum HioError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("out of resource: {0}")]
    OutOfResource(String),

    #[error("I/O error ({code}) during {context}")]
    Io {
        code: i32,
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("bad state: {0}")]
    BadState(String),
}

pub type Result<T> = std::result::Result<T, HioError>;

impl HioError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        let code = source.raw_os_error().unwrap_or(-1);
        HioError::Io { code, context: context.into(), source }
    }
}

impl From<io::Error> for HioError {
    fn from(source: io::Error) -> Self {
        HioError::io("io", source)
    }
}

/// Adapts a raw `io::Result` into an `HioError::Io` carrying the platform
/// errno, without leaking `io::Error`'s own Display text as the primary
/// error kind.
pub trait IoContext<T> {
    fn io_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| HioError::io(context, e))
    }
}

/// Maps an error kind to the signed status code a request's `status` field
/// carries (`spec.md` §4.G/§7): negative = error, magnitude is the kind's
/// code. Never exposed to callers as a platform errno.
pub fn status_code(err: &HioError) -> i64 {
    let kind = match err {
        HioError::NotFound(_) => 1,
        HioError::Permission(_) => 2,
        HioError::OutOfResource(_) => 3,
        HioError::Io { .. } => 4,
        HioError::NotAvailable(_) => 5,
        HioError::BadState(_) => 6,
    };
    -kind
}
