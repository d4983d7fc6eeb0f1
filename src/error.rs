//! Error types for graph construction, naming, and rendering.

use thiserror::Error;

/// Fatal errors raised by the core.
///
/// User input problems (malformed samples, unsupported schema constructs)
/// never surface here; they degrade to a conservative type and are reported
/// as [`Diagnostic`]s or renderer annotations. This enum is reserved for
/// broken internal invariants and unusable configuration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A redirect chain in the class arena failed to reach a live entry.
    #[error("redirect chain for class {0} does not terminate at a live entry")]
    BrokenRedirect(usize),

    /// A class id referenced an arena slot that holds no data.
    #[error("class {0} refers to an empty arena entry")]
    EmptyClassEntry(usize),

    /// A reachable type still carries `NoInformation` after
    /// canonicalization.
    #[error("a NoInformation placeholder survived canonicalization")]
    UnerasedPlaceholder,

    /// Name resolution reached a fixed point with names still unassigned.
    #[error("name resolution did not converge; {0} name(s) left unresolved")]
    NameResolutionCycle(usize),

    /// A renderer asked for the name of a type that was never assigned one.
    #[error("no name was assigned for {0}")]
    UnresolvedName(String),

    /// The configured target language is not registered.
    #[error("unknown target language `{0}`")]
    UnknownLanguage(String),

    /// An input document could not be decoded at all.
    ///
    /// This is a pre-emission failure: inference cannot even start, so there
    /// is no generated artifact to attach an annotation to.
    #[error("malformed {kind} document: {message}")]
    MalformedInput { kind: &'static str, message: String },
}

/// A structured pre-emission diagnostic.
///
/// Produced by the schema translators for constructs they degrade rather
/// than reject (`allOf`, numeric ranges, unresolvable `$ref`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Slash-separated path into the source document.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
