use core::fmt;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned when decoding fails.
///
/// Every failure aborts the decode of the current image; no partial image is
/// ever produced. [`Error::kind`] tells the broad category apart, the
/// [`Display`][fmt::Display] impl carries a short diagnostic message.
pub struct Error {
    repr: Repr,
}

pub(crate) enum Repr {
    /// Malformed segment structure: unknown/misplaced markers, bad lengths.
    Structural(String),
    /// Well-formed segments carrying invalid contents.
    Semantic(String),
    /// Errors in the Huffman tables or the entropy-coded data.
    Entropy(String),
    /// The byte source ran dry, or raw reads failed.
    Io(String),
}

/// Broad category of a decode [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    Structural,
    Semantic,
    Entropy,
    Io,
}

impl Error {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Self {
            repr: Repr::Structural(msg.into()),
        }
    }

    pub(crate) fn semantic(msg: impl Into<String>) -> Self {
        Self {
            repr: Repr::Semantic(msg.into()),
        }
    }

    pub(crate) fn entropy(msg: impl Into<String>) -> Self {
        Self {
            repr: Repr::Entropy(msg.into()),
        }
    }

    pub(crate) fn io(msg: impl Into<String>) -> Self {
        Self {
            repr: Repr::Io(msg.into()),
        }
    }

    /// Returns the category this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            Repr::Structural(_) => ErrorKind::Structural,
            Repr::Semantic(_) => ErrorKind::Semantic,
            Repr::Entropy(_) => ErrorKind::Entropy,
            Repr::Io(_) => ErrorKind::Io,
        }
    }

    fn message(&self) -> &str {
        match &self.repr {
            Repr::Structural(s) | Repr::Semantic(s) | Repr::Entropy(s) | Repr::Io(s) => s,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message().fmt(f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message().fmt(f)
    }
}

impl std::error::Error for Error {}
