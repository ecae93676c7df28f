//! RDF terms and triples.
//!
//! All types here are immutable values. Equality and hashing are structural,
//! except for [`BlankNode`], which compares by identity: every call to
//! [`BlankNode::new`] yields a node that is equal only to itself and its
//! clones.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An IRI, used both as a term and as the name of a triple collection.
///
/// Equality is by full code-point string. The string is not validated;
/// providers decide which shapes they accept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri(Arc<str>);

impl Iri {
    /// Creates an IRI from a string.
    #[must_use]
    pub fn new(iri: impl AsRef<str>) -> Self {
        Self(Arc::from(iri.as_ref()))
    }

    /// Returns the IRI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the IRI string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Iri {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Iri {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

static NEXT_BLANK_NODE: AtomicU64 = AtomicU64::new(1);

/// A blank node, identified by identity rather than by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlankNode(u64);

impl BlankNode {
    /// Creates a fresh blank node, distinct from every other node.
    #[must_use]
    pub fn new() -> Self {
        Self(NEXT_BLANK_NODE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the process-local identity of this node.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl Default for BlankNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:b{}", self.0)
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    /// A plain literal with an optional language tag.
    Plain {
        /// Lexical form.
        lexical: Arc<str>,
        /// Language tag, lowercased.
        language: Option<Arc<str>>,
    },
    /// A literal with a datatype IRI.
    Typed {
        /// Lexical form.
        lexical: Arc<str>,
        /// Datatype IRI.
        datatype: Iri,
    },
}

impl Literal {
    /// Creates a plain literal without a language tag.
    #[must_use]
    pub fn plain(lexical: impl AsRef<str>) -> Self {
        Self::Plain {
            lexical: Arc::from(lexical.as_ref()),
            language: None,
        }
    }

    /// Creates a language-tagged literal.
    ///
    /// Language tags compare case-insensitively, so the tag is stored
    /// lowercased.
    #[must_use]
    pub fn with_language(lexical: impl AsRef<str>, language: impl AsRef<str>) -> Self {
        Self::Plain {
            lexical: Arc::from(lexical.as_ref()),
            language: Some(Arc::from(language.as_ref().to_lowercase())),
        }
    }

    /// Creates a typed literal.
    #[must_use]
    pub fn typed(lexical: impl AsRef<str>, datatype: Iri) -> Self {
        Self::Typed {
            lexical: Arc::from(lexical.as_ref()),
            datatype,
        }
    }

    /// Returns the lexical form.
    #[must_use]
    pub fn lexical(&self) -> &str {
        match self {
            Self::Plain { lexical, .. } | Self::Typed { lexical, .. } => lexical,
        }
    }

    /// Returns the language tag, if any.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Plain { language, .. } => language.as_deref(),
            Self::Typed { .. } => None,
        }
    }

    /// Returns the datatype IRI for typed literals.
    #[must_use]
    pub const fn datatype(&self) -> Option<&Iri> {
        match self {
            Self::Plain { .. } => None,
            Self::Typed { datatype, .. } => Some(datatype),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.lexical().chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                _ => write!(f, "{c}")?,
            }
        }
        f.write_str("\"")?;
        match self {
            Self::Plain {
                language: Some(language),
                ..
            } => write!(f, "@{language}"),
            Self::Plain { language: None, .. } => Ok(()),
            Self::Typed { datatype, .. } => write!(f, "^^<{datatype}>"),
        }
    }
}

/// The subject position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// A named resource.
    Iri(Iri),
    /// An anonymous resource.
    BlankNode(BlankNode),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::BlankNode(node) => write!(f, "{node}"),
        }
    }
}

impl From<Iri> for Subject {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<BlankNode> for Subject {
    fn from(node: BlankNode) -> Self {
        Self::BlankNode(node)
    }
}

/// Any RDF term; the object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A named resource.
    Iri(Iri),
    /// An anonymous resource.
    BlankNode(BlankNode),
    /// A literal value.
    Literal(Literal),
}

impl Term {
    /// Returns the IRI if this term is one.
    #[must_use]
    pub const fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Returns the literal if this term is one.
    #[must_use]
    pub const fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::BlankNode(node) => write!(f, "{node}"),
            Self::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<BlankNode> for Term {
    fn from(node: BlankNode) -> Self {
        Self::BlankNode(node)
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<Subject> for Term {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::Iri(iri) => Self::Iri(iri),
            Subject::BlankNode(node) => Self::BlankNode(node),
        }
    }
}

/// An RDF triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    subject: Subject,
    predicate: Iri,
    object: Term,
}

impl Triple {
    /// Composes a triple.
    #[must_use]
    pub fn new(subject: impl Into<Subject>, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }

    /// Returns the subject.
    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Returns the predicate.
    #[must_use]
    pub const fn predicate(&self) -> &Iri {
        &self.predicate
    }

    /// Returns the object.
    #[must_use]
    pub const fn object(&self) -> &Term {
        &self.object
    }

    /// Checks the triple against a pattern; `None` positions match anything.
    #[must_use]
    pub fn matches(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> bool {
        subject.is_none_or(|s| *s == self.subject)
            && predicate.is_none_or(|p| *p == self.predicate)
            && object.is_none_or(|o| *o == self.object)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iri_equality_is_by_string() {
        assert_eq!(Iri::new("urn:a"), Iri::from("urn:a".to_string()));
        assert_ne!(Iri::new("urn:a"), Iri::new("urn:A"));
    }

    #[test]
    fn test_blank_nodes_compare_by_identity() {
        let a = BlankNode::new();
        let b = BlankNode::new();
        let copy = a;
        assert_ne!(a, b);
        assert_eq!(a, copy);
    }

    #[test]
    fn test_literal_language_is_case_insensitive() {
        let a = Literal::with_language("chat", "FR");
        let b = Literal::with_language("chat", "fr");
        assert_eq!(a, b);
        assert_eq!(a.language(), Some("fr"));
        assert_ne!(a, Literal::plain("chat"));
    }

    #[test]
    fn test_typed_literal_accessors() {
        let int = Iri::new("http://www.w3.org/2001/XMLSchema#integer");
        let literal = Literal::typed("42", int.clone());
        assert_eq!(literal.lexical(), "42");
        assert_eq!(literal.datatype(), Some(&int));
        assert_eq!(literal.language(), None);
        assert_ne!(literal, Literal::plain("42"));
    }

    #[test]
    fn test_triple_matches_wildcards() {
        let s = Iri::new("urn:s");
        let p = Iri::new("urn:p");
        let triple = Triple::new(s.clone(), p.clone(), Literal::plain("o"));

        assert!(triple.matches(None, None, None));
        assert!(triple.matches(Some(&Subject::Iri(s)), Some(&p), None));
        assert!(!triple.matches(None, Some(&Iri::new("urn:other")), None));
        assert!(triple.matches(None, None, Some(&Term::Literal(Literal::plain("o")))));
    }

    #[test]
    fn test_display_is_ntriples_like() {
        let triple = Triple::new(
            Iri::new("urn:s"),
            Iri::new("urn:p"),
            Literal::with_language("say \"hi\"", "en"),
        );
        assert_eq!(triple.to_string(), r#"<urn:s> <urn:p> "say \"hi\""@en ."#);
    }
}
