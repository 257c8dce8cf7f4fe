//! Error types shared across the resolver, algebra, dictionary, and cache.
//!
//! Every fallible operation in the crate returns [`UnitResult`]. Errors carry
//! a [`UnitErrorKind`] discriminant for programmatic matching, a human-readable
//! message, and, where the failure happened inside an expression, the
//! original expression text and the byte position at fault. Near-match
//! suggestions for unknown names ride along so the rendered message can end
//! with a "Did you mean" list.

use std::fmt;

use strum::{Display, IntoStaticStr};

/// Result type alias for operations that can produce a [`UnitError`].
pub type UnitResult<T> = Result<T, UnitError>;

/// Classification of unit-engine failures.
///
/// Uses strum derives for automatic `Display` and `Into<&'static str>`; the
/// string form matches the variant name exactly (e.g. `UnknownUnit` ->
/// "UnknownUnit").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum UnitErrorKind {
    /// Configuration was malformed or a seed expression did not resolve.
    /// Fatal to resolver construction.
    InvalidConfig,
    /// A sub-token resolved as neither number, function, nor dictionary name.
    UnknownUnit,
    /// Parenthesis, comma, or operator placement errors.
    Syntax,
    /// An operator was applied with too few operands on the stack.
    MissingOperand,
    /// `+`/`-` or a conversion over exponent vectors that do not agree
    /// within the commensurability tolerance.
    IncommensurableUnits,
    /// A disallowed operation involving a non-zero offset (affine) unit.
    OffsetMisuse,
    /// A scaled exponent left the representable storage range.
    ExponentOverflow,
    /// A sub-token that started numerically but was not a valid literal.
    NumericParse,
}

/// An error produced while configuring a resolver or resolving an expression.
///
/// All error kinds are recoverable: the failing call returns this value,
/// per-call scratch is reset, and the caller may retry or proceed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitError {
    kind: UnitErrorKind,
    message: String,
    expression: Option<Box<str>>,
    position: Option<usize>,
    suggestions: Vec<Box<str>>,
}

impl UnitError {
    /// Builds an error with no expression context attached; the resolver
    /// annotates expression text and token position as the error propagates.
    /// This is the constructor [`crate::Algebra`] implementations use.
    pub fn new(kind: UnitErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            expression: None,
            position: None,
            suggestions: Vec::new(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(UnitErrorKind::InvalidConfig, message)
    }

    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::new(UnitErrorKind::Syntax, message).with_position(position)
    }

    /// Attaches the byte position at fault, keeping an already-known one.
    ///
    /// Positions recorded close to the failure (e.g. an operator's recorded
    /// position) win over positions attached later by outer layers.
    pub(crate) fn with_position(mut self, position: usize) -> Self {
        self.position.get_or_insert(position);
        self
    }

    /// Attaches the expression under resolution, keeping an already-known one.
    pub(crate) fn with_expression(mut self, expression: &str) -> Self {
        if self.expression.is_none() {
            self.expression = Some(expression.into());
        }
        self
    }

    /// Attaches a "Did you mean" list, closest candidate first.
    pub fn with_suggestions(mut self, suggestions: Vec<Box<str>>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn kind(&self) -> UnitErrorKind {
        self.kind
    }

    /// The message body, without expression/position/suggestion framing.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The expression that was being resolved, if the failure happened in one.
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Byte offset of the offending token within [`Self::expression`].
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Near-match dictionary names, closest first. Empty unless
    /// [`Self::kind`] is [`UnitErrorKind::UnknownUnit`].
    pub fn suggestions(&self) -> &[Box<str>] {
        &self.suggestions
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(expression) = &self.expression {
            write!(f, "{expression}: ")?;
        }
        f.write_str(&self.message)?;
        if let Some(position) = self.position {
            write!(f, " at position {position}")?;
        }
        if !self.suggestions.is_empty() {
            f.write_str(". Did you mean: ")?;
            for (i, name) in self.suggestions.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
            }
            f.write_str("?")?;
        }
        Ok(())
    }
}

impl std::error::Error for UnitError {}
