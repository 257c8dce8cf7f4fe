//! The generic algebraic expression resolver.
//!
//! [`ExpressionResolver`] is a shunting-yard evaluator parameterised over a
//! variable algebra: it tokenises a character expression left-to-right,
//! pushes parsed operands (numeric literals or named variables) onto an
//! operand stack and operators onto an operator stack, and pops/applies
//! operators according to precedence and associativity. Everything the
//! engine knows about the variables themselves (how to make one from a
//! number or a name, and what the operators mean) comes from the caller's
//! [`Algebra`] implementation.
//!
//! Operator and function registration happens during construction of a
//! concrete resolver; the first call to [`ExpressionResolver::resolve_with`]
//! freezes the tables and any later registration fails. Evaluation is
//! re-entrant and thread-safe: all mutable state for a call lives in the
//! caller-supplied [`Scratch`].

use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use ahash::AHashMap;

use crate::error::{UnitError, UnitErrorKind, UnitResult};

/// Default capacity of each scratch stack; a call that grows past this gets
/// its stacks re-initialised on reset so threads do not retain unbounded
/// memory after an unusually deep expression.
pub(crate) const DEFAULT_STACK_CAPACITY: usize = 256;

/// Tokens that structure the grammar itself and may never be registered
/// as operators.
const RESERVED_TOKENS: [char; 4] = [' ', '(', ')', ','];

/// Binary operators occupy 0..=253; unary is 254; function call is 255.
pub const MAX_BINARY_PRECEDENCE: u8 = 253;
const UNARY_PRECEDENCE: u8 = 254;
const FUNCTION_PRECEDENCE: u8 = 255;
/// The Group pseudo-operator marking `(` and `,`; never applied.
const GROUP_PRECEDENCE: u8 = 0;

/// Declared argument count of a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments.
    Exact(usize),
    /// Any count of arguments >= 1.
    Variadic,
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exact(expected) => count == expected,
            Self::Variadic => count >= 1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(expected) => write!(f, "{expected}"),
            Self::Variadic => f.write_str("at least 1"),
        }
    }
}

/// The capability set a variable type supplies to the engine.
///
/// The engine dispatches to these methods for every operand and operator it
/// parses; implementations own the semantics (and the semantic errors).
/// Errors returned from the algebra are annotated by the engine with the
/// expression text and, where missing, the position of the triggering token.
pub trait Algebra {
    /// The variable type operated on.
    type Var;

    /// Builds a variable from a numeric literal.
    fn number(&self, value: f64) -> Self::Var;

    /// Builds a variable from a name that is neither a number nor a
    /// registered function. Unknown names should error with
    /// [`UnitErrorKind::UnknownUnit`] and any suggestions attached.
    fn variable(&self, name: &str) -> UnitResult<Self::Var>;

    /// Applies a registered unary operator.
    fn unary(&self, token: char, operand: Self::Var) -> UnitResult<Self::Var>;

    /// Applies a registered binary operator. `left` was parsed before
    /// `right`.
    fn binary(&self, token: char, left: Self::Var, right: Self::Var) -> UnitResult<Self::Var>;

    /// Applies a registered function to its arguments in left-to-right
    /// order. The argument buffer is scratch owned by the engine; drain it.
    fn function(&self, name: &str, args: &mut Vec<Self::Var>) -> UnitResult<Self::Var>;
}

/// An operator or group marker parked on the operator stack.
#[derive(Debug, Clone, Copy)]
enum PendingKind {
    /// A `(` or the re-opened group after a `,`.
    Group,
    Unary(u8),
    Binary {
        token: u8,
        precedence: u8,
        right_associative: bool,
    },
    /// A registered function name; the span locates it in the expression so
    /// arguments can be re-counted when the function is applied.
    Function {
        start: usize,
        end: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct PendingOp {
    kind: PendingKind,
    position: usize,
}

impl PendingOp {
    fn precedence(&self) -> u8 {
        match self.kind {
            PendingKind::Group => GROUP_PRECEDENCE,
            PendingKind::Unary(_) => UNARY_PRECEDENCE,
            PendingKind::Binary { precedence, .. } => precedence,
            PendingKind::Function { .. } => FUNCTION_PRECEDENCE,
        }
    }

    fn right_associative(&self) -> bool {
        match self.kind {
            PendingKind::Unary(_) => true,
            PendingKind::Binary { right_associative, .. } => right_associative,
            PendingKind::Group | PendingKind::Function { .. } => false,
        }
    }
}

/// Per-call evaluation state: operator stack, operand stack, and the
/// function-argument buffer.
///
/// A `Scratch` may be cached per thread and handed to
/// [`ExpressionResolver::resolve_with`] repeatedly; the engine resets it
/// unconditionally on exit, so a failed resolution never corrupts the next
/// call. Reset re-initialises any stack whose capacity outgrew
/// the default.
#[derive(Debug)]
pub struct Scratch<V> {
    operators: Vec<PendingOp>,
    operands: Vec<V>,
    args: Vec<V>,
}

impl<V> Scratch<V> {
    pub fn new() -> Self {
        Self {
            operators: Vec::with_capacity(DEFAULT_STACK_CAPACITY),
            operands: Vec::with_capacity(DEFAULT_STACK_CAPACITY),
            args: Vec::with_capacity(DEFAULT_STACK_CAPACITY),
        }
    }

    /// Empties all three stacks, shedding any growth past the default
    /// capacity.
    pub fn reset(&mut self) {
        reset_stack(&mut self.operators);
        reset_stack(&mut self.operands);
        reset_stack(&mut self.args);
    }
}

impl<V> Default for Scratch<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn reset_stack<T>(stack: &mut Vec<T>) {
    if stack.capacity() > DEFAULT_STACK_CAPACITY {
        *stack = Vec::with_capacity(DEFAULT_STACK_CAPACITY);
    } else {
        stack.clear();
    }
}

/// A reusable shunting-yard engine over a caller-supplied [`Algebra`].
///
/// Single-character operators dispatch through direct-index tables; function
/// names through a hash map. The engine itself holds no per-call state.
#[derive(Debug)]
pub struct ExpressionResolver {
    /// Tokens registered as prefix (unary) operators.
    unary: [bool; 256],
    /// Tokens registered as infix (binary) operators, with their precedence
    /// and associativity.
    binary: [Option<BinaryOp>; 256],
    /// Union of all registered operator tokens; these act as sub-token seek
    /// characters alongside the reserved tokens.
    operator_tokens: [bool; 256],
    functions: AHashMap<Box<str>, Arity>,
    /// Set by the first resolution; registration afterwards fails.
    frozen: AtomicBool,
}

#[derive(Debug, Clone, Copy)]
struct BinaryOp {
    precedence: u8,
    right_associative: bool,
}

impl Default for ExpressionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionResolver {
    pub fn new() -> Self {
        Self {
            unary: [false; 256],
            binary: [None; 256],
            operator_tokens: [false; 256],
            functions: AHashMap::new(),
            frozen: AtomicBool::new(false),
        }
    }

    /// Registers a single-character prefix operator (precedence 254,
    /// right-associative).
    pub fn add_unary(&mut self, token: char) -> UnitResult<()> {
        let index = self.operator_index(token)?;
        if self.unary[index] {
            return Err(UnitError::invalid_config(format!(
                "unary operator '{token}' is already registered"
            )));
        }
        self.unary[index] = true;
        self.operator_tokens[index] = true;
        Ok(())
    }

    /// Registers a single-character infix operator.
    pub fn add_binary(&mut self, token: char, precedence: u8, right_associative: bool) -> UnitResult<()> {
        let index = self.operator_index(token)?;
        if precedence > MAX_BINARY_PRECEDENCE {
            return Err(UnitError::invalid_config(format!(
                "binary operator '{token}' precedence {precedence} exceeds {MAX_BINARY_PRECEDENCE}"
            )));
        }
        if self.binary[index].is_some() {
            return Err(UnitError::invalid_config(format!(
                "binary operator '{token}' is already registered"
            )));
        }
        self.binary[index] = Some(BinaryOp {
            precedence,
            right_associative,
        });
        self.operator_tokens[index] = true;
        Ok(())
    }

    /// Registers a named function. The name is trimmed of ASCII spaces and
    /// must be non-empty.
    pub fn add_function(&mut self, name: &str, arity: Arity) -> UnitResult<()> {
        self.ensure_unfrozen()?;
        let name = name.trim_matches(' ');
        if name.is_empty() {
            return Err(UnitError::invalid_config("function name is empty"));
        }
        if self.functions.contains_key(name) {
            return Err(UnitError::invalid_config(format!(
                "function '{name}' is already registered"
            )));
        }
        self.functions.insert(name.into(), arity);
        Ok(())
    }

    /// Validates an operator token and returns its dispatch index.
    ///
    /// Tokens must be ASCII: the dispatch tables are indexed by byte, and a
    /// non-ASCII scalar would span multiple bytes in the expression.
    fn operator_index(&self, token: char) -> UnitResult<usize> {
        self.ensure_unfrozen()?;
        if RESERVED_TOKENS.contains(&token) {
            return Err(UnitError::invalid_config(format!(
                "token '{token}' is reserved and cannot be an operator"
            )));
        }
        if !token.is_ascii() {
            return Err(UnitError::invalid_config(format!(
                "operator token '{token}' must be a single-byte character"
            )));
        }
        Ok(token as usize)
    }

    fn ensure_unfrozen(&self) -> UnitResult<()> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(UnitError::invalid_config(
                "operators cannot be registered after the resolver has resolved an expression",
            ));
        }
        Ok(())
    }

    /// Resolves an expression with a freshly allocated [`Scratch`].
    pub fn resolve<A: Algebra>(&self, algebra: &A, expression: &str) -> UnitResult<A::Var> {
        let mut scratch = Scratch::new();
        self.resolve_with(algebra, expression, &mut scratch)
    }

    /// Resolves an expression to a single variable, reusing the caller's
    /// scratch stacks.
    ///
    /// The scratch is reset unconditionally before this returns, success or
    /// failure. Errors are annotated with the expression text.
    pub fn resolve_with<A: Algebra>(
        &self,
        algebra: &A,
        expression: &str,
        scratch: &mut Scratch<A::Var>,
    ) -> UnitResult<A::Var> {
        self.frozen.store(true, Ordering::Release);
        let outcome = self.eval(algebra, expression, scratch);
        scratch.reset();
        outcome.map_err(|err| err.with_expression(expression))
    }

    fn eval<A: Algebra>(&self, algebra: &A, expression: &str, scratch: &mut Scratch<A::Var>) -> UnitResult<A::Var> {
        let bytes = expression.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b' ' {
                i += 1;
                continue;
            }
            if b == b'(' {
                scratch.operators.push(PendingOp {
                    kind: PendingKind::Group,
                    position: i,
                });
                i += 1;
                continue;
            }
            if b == b',' || b == b')' {
                self.close_group(algebra, expression, scratch, i, b == b',')?;
                i += 1;
                continue;
            }

            // Prefix/infix disambiguation: the token is in prefix position
            // iff everything to its left (ignoring spaces) is empty, an
            // opening `(`, a `,`, or another operator.
            let prefix_position = match last_nonspace(bytes, i) {
                None => true,
                Some(prev) => prev == b'(' || prev == b',' || self.operator_tokens[prev as usize],
            };
            if prefix_position && self.unary[b as usize] {
                let op = PendingOp {
                    kind: PendingKind::Unary(b),
                    position: i,
                };
                self.push_operator(algebra, expression, scratch, op)?;
                i += 1;
                continue;
            }
            if !prefix_position {
                if let Some(binary) = self.binary[b as usize] {
                    let op = PendingOp {
                        kind: PendingKind::Binary {
                            token: b,
                            precedence: binary.precedence,
                            right_associative: binary.right_associative,
                        },
                        position: i,
                    };
                    self.push_operator(algebra, expression, scratch, op)?;
                    i += 1;
                    continue;
                }
            }

            i = self.read_operand(algebra, expression, scratch, i)?;
        }

        while let Some(op) = scratch.operators.pop() {
            if matches!(op.kind, PendingKind::Group) {
                return Err(UnitError::syntax("Missing right parenthesis", op.position));
            }
            self.apply(algebra, expression, scratch, op)?;
        }

        match scratch.operands.pop() {
            None => Err(UnitError::new(UnitErrorKind::Syntax, "No variables found")),
            Some(_) if !scratch.operands.is_empty() => {
                Err(UnitError::new(UnitErrorKind::Syntax, "Variables remain on stack"))
            }
            Some(result) => Ok(result),
        }
    }

    /// Handles `,` and `)`: rejects misplaced commas, pops and applies
    /// operators down to the matching group, and re-opens the group for a
    /// comma (a comma separates function arguments by re-opening a group).
    fn close_group<A: Algebra>(
        &self,
        algebra: &A,
        expression: &str,
        scratch: &mut Scratch<A::Var>,
        position: usize,
        comma: bool,
    ) -> UnitResult<()> {
        let bytes = expression.as_bytes();
        match last_nonspace(bytes, position) {
            Some(b',') => return Err(UnitError::syntax("Unexpected comma", position)),
            Some(b'(') if comma => return Err(UnitError::syntax("Unexpected comma", position)),
            _ => {}
        }
        loop {
            let Some(op) = scratch.operators.pop() else {
                return Err(UnitError::syntax("No matching left parenthesis or comma", position));
            };
            if matches!(op.kind, PendingKind::Group) {
                break;
            }
            self.apply(algebra, expression, scratch, op)?;
        }
        if comma {
            scratch.operators.push(PendingOp {
                kind: PendingKind::Group,
                position,
            });
        }
        Ok(())
    }

    /// Pops any stacked operators that bind at least as tightly as the
    /// incoming one, then pushes it.
    fn push_operator<A: Algebra>(
        &self,
        algebra: &A,
        expression: &str,
        scratch: &mut Scratch<A::Var>,
        incoming: PendingOp,
    ) -> UnitResult<()> {
        let precedence = incoming.precedence();
        let left_associative = !incoming.right_associative();
        while let Some(top) = scratch.operators.last().copied() {
            if matches!(top.kind, PendingKind::Group) {
                break;
            }
            let top_precedence = top.precedence();
            if top_precedence > precedence || (top_precedence == precedence && left_associative) {
                scratch.operators.pop();
                self.apply(algebra, expression, scratch, top)?;
            } else {
                break;
            }
        }
        scratch.operators.push(incoming);
        Ok(())
    }

    /// Scans the sub-token starting at `i` and pushes the operand it denotes:
    /// a numeric literal, a function name (onto the operator stack), or an
    /// algebra variable. Returns the cursor position after the token.
    fn read_operand<A: Algebra>(
        &self,
        algebra: &A,
        expression: &str,
        scratch: &mut Scratch<A::Var>,
        i: usize,
    ) -> UnitResult<usize> {
        let bytes = expression.as_bytes();
        let mut end = self.seek(bytes, i);
        let mut token = &expression[i..end];

        // Signed-exponent peek: `1e+7` first scans as `1e` stopped on the
        // `+` operator; widening one operator past the stop and re-scanning
        // lets the whole slice parse as a single numeric literal.
        if end < bytes.len() && self.operator_tokens[bytes[end] as usize] {
            let widened_end = self.seek(bytes, end + 1);
            let widened = &expression[i..widened_end];
            if widened.parse::<f64>().is_ok() {
                token = widened;
                end = widened_end;
            }
        }

        // An operator token in operand position scans as an empty sub-token;
        // surface the operator character itself in the diagnostic.
        if token.is_empty() {
            token = &expression[i..=i];
            end = i + 1;
        }

        if let Ok(number) = token.parse::<f64>() {
            scratch.operands.push(algebra.number(number));
        } else if token.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return Err(UnitError::new(
                UnitErrorKind::NumericParse,
                format!("Invalid numeric literal '{token}'"),
            )
            .with_position(i));
        } else if self.functions.contains_key(token) {
            scratch.operators.push(PendingOp {
                kind: PendingKind::Function { start: i, end },
                position: i,
            });
        } else {
            let variable = algebra.variable(token).map_err(|err| err.with_position(i))?;
            scratch.operands.push(variable);
        }
        Ok(end)
    }

    /// Applies one popped operator against the operand stack.
    fn apply<A: Algebra>(
        &self,
        algebra: &A,
        expression: &str,
        scratch: &mut Scratch<A::Var>,
        op: PendingOp,
    ) -> UnitResult<()> {
        match op.kind {
            // Group markers are consumed by close_group and never applied.
            PendingKind::Group => Ok(()),
            PendingKind::Unary(token) => {
                let Some(operand) = scratch.operands.pop() else {
                    return Err(missing_operand(1, char::from(token), op.position));
                };
                let result = algebra
                    .unary(char::from(token), operand)
                    .map_err(|err| err.with_position(op.position))?;
                scratch.operands.push(result);
                Ok(())
            }
            PendingKind::Binary { token, .. } => {
                // Top of stack is the right operand.
                let Some(right) = scratch.operands.pop() else {
                    return Err(missing_operand(1, char::from(token), op.position));
                };
                let Some(left) = scratch.operands.pop() else {
                    return Err(missing_operand(2, char::from(token), op.position));
                };
                let result = algebra
                    .binary(char::from(token), left, right)
                    .map_err(|err| err.with_position(op.position))?;
                scratch.operands.push(result);
                Ok(())
            }
            PendingKind::Function { start, end } => self.apply_function(algebra, expression, scratch, start, end),
        }
    }

    fn apply_function<A: Algebra>(
        &self,
        algebra: &A,
        expression: &str,
        scratch: &mut Scratch<A::Var>,
        start: usize,
        end: usize,
    ) -> UnitResult<()> {
        let name = &expression[start..end];
        let Some(arity) = self.functions.get(name).copied() else {
            // Only registered names are pushed as functions.
            return Err(UnitError::syntax(format!("Unknown function '{name}'"), start));
        };
        let count = self.count_arguments(expression, name, start, end)?;
        if !arity.accepts(count) {
            return Err(UnitError::syntax(
                format!("Function '{name}' expects {arity} argument(s), found {count}"),
                start,
            ));
        }
        if scratch.operands.len() < count {
            return Err(missing_operand(scratch.operands.len() + 1, name, start));
        }
        let split = scratch.operands.len() - count;
        scratch.args.clear();
        scratch.args.extend(scratch.operands.drain(split..));
        let result = algebra
            .function(name, &mut scratch.args)
            .map_err(|err| err.with_position(start))?;
        scratch.operands.push(result);
        Ok(())
    }

    /// Counts the comma-separated arguments of a function call by re-scanning
    /// from the `(` that follows the recorded name span, tracking nested
    /// parentheses.
    fn count_arguments(&self, expression: &str, name: &str, start: usize, end: usize) -> UnitResult<usize> {
        let bytes = expression.as_bytes();
        let mut open = end;
        while open < bytes.len() && bytes[open] == b' ' {
            open += 1;
        }
        if open >= bytes.len() || bytes[open] != b'(' {
            return Err(UnitError::syntax(format!("Expected '(' after function '{name}'"), start));
        }
        let mut depth = 1usize;
        let mut commas = 0usize;
        let mut seen_any = false;
        for &b in &bytes[open + 1..] {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(if seen_any { commas + 1 } else { 0 });
                    }
                }
                b',' if depth == 1 => commas += 1,
                b' ' => {}
                _ => seen_any = true,
            }
        }
        // Unbalanced parentheses are caught before application; this guards
        // the re-scan anyway.
        Err(UnitError::syntax("Missing right parenthesis", open))
    }

    /// Advances to the next seek character: space, `(`, `)`, `,`, or any
    /// registered operator token. Multi-byte UTF-8 sequences never match a
    /// seek byte, so names scan intact.
    fn seek(&self, bytes: &[u8], mut i: usize) -> usize {
        while i < bytes.len() {
            let b = bytes[i];
            if b == b' ' || b == b'(' || b == b')' || b == b',' || self.operator_tokens[b as usize] {
                break;
            }
            i += 1;
        }
        i
    }
}

/// The last non-space byte before `i`, if any.
fn last_nonspace(bytes: &[u8], i: usize) -> Option<u8> {
    bytes[..i].iter().rev().copied().find(|&b| b != b' ')
}

fn missing_operand(index: usize, token: impl fmt::Display, position: usize) -> UnitError {
    UnitError::new(
        UnitErrorKind::MissingOperand,
        format!("Missing operand {index} for '{token}'"),
    )
    .with_position(position)
}
