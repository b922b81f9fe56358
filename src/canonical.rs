//! Molecule validation and canonicalization.
//!
//! Parsing molecules is left to a chemistry toolkit. The filter only needs a
//! pure function from text to an optional normalized form: `None` marks the
//! input as invalid.

/// Validates a textual molecule and returns its canonical form.
///
/// Implementations must be pure, since they are called concurrently from
/// worker threads.
pub trait Canonicalize: Send + Sync {
    /// Return the canonical form of `text`, or `None` if it is not a valid molecule.
    fn canonicalize(&self, text: &str) -> Option<String>;
}

impl<F> Canonicalize for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn canonicalize(&self, text: &str) -> Option<String> {
        self(text)
    }
}

/// Accepts any non-blank text as-is, minus surrounding whitespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct Verbatim;

impl Canonicalize for Verbatim {
    fn canonicalize(&self, text: &str) -> Option<String> {
        let text = text.trim();

        if text.is_empty() {
            None
        } else {
            Some(text.to_owned())
        }
    }
}
