//! The unit variable type and its algebra.
//!
//! A [`UnitInfo`] is the canonical form of a unit expression: a fixed-length
//! vector of base-unit exponents (each scaled by `10^3` so fractional
//! exponents down to 0.001 are representable) plus the linear conversion
//! `base = value * factor + offset`. [`UnitAlgebra`] wires this type into the
//! generic expression engine, implementing the operator table with
//! commensurability and offset checks.

use std::{fmt, sync::Arc, time::Duration};

use smallvec::SmallVec;

use crate::{
    dictionary::Dictionary,
    error::{UnitError, UnitErrorKind, UnitResult},
    resolve::Algebra,
};

/// Exponents are stored as integers scaled by this factor: an exponent of
/// `1` is stored as `1000`, `4/3` as `1333`.
pub const EXPONENT_SCALE: i16 = 1000;

/// Upper bound on the summed absolute exponent differences below which two
/// unit vectors are deemed equal. `10` corresponds to `0.01` in fractional
/// exponents: `m^1.333` matches `m^(4/3)` (distance 1) while `m^1.3` does
/// not (distance 33).
pub const COMMENSURABILITY_TOLERANCE: i32 = 10;

/// Exponent vectors are padded to a multiple of this lane count so the
/// commensurability distance reduces to straight-line chunked arithmetic.
pub(crate) const EXPONENT_LANES: usize = 8;

type ExponentVec = SmallVec<[i16; 16]>;

const OFFSET_COMBINE_MESSAGE: &str = "Units with offsets (e.g. degC, degF) should be converted to base \
     (e.g. degK) or delta variants (delC, delF) before being combined with other units";

/// The canonical, immutable representation of a resolved unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    exponents: ExponentVec,
    factor: f64,
    offset: f64,
}

impl UnitInfo {
    /// A dimensionless constant: zero exponents, no offset.
    pub(crate) fn constant(dimension: usize, value: f64) -> Self {
        Self {
            exponents: SmallVec::from_elem(0, dimension),
            factor: value,
            offset: 0.0,
        }
    }

    /// The base unit at `ordinal`: a single scaled `1` exponent, factor 1,
    /// offset 0.
    pub(crate) fn base(dimension: usize, ordinal: usize) -> Self {
        let mut exponents = SmallVec::from_elem(0, dimension);
        exponents[ordinal] = EXPONENT_SCALE;
        Self {
            exponents,
            factor: 1.0,
            offset: 0.0,
        }
    }

    /// The same unit scaled by a prefix factor.
    pub(crate) fn with_prefix_factor(&self, prefix_factor: f64) -> Self {
        Self {
            exponents: self.exponents.clone(),
            factor: self.factor * prefix_factor,
            offset: self.offset,
        }
    }

    /// The scaled base-unit exponents, one per dimension (including padding
    /// positions, which hold zero).
    pub fn exponents(&self) -> &[i16] {
        &self.exponents
    }

    /// Multiplicative conversion to the base-unit combination.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Additive conversion to the base-unit combination; non-zero only for
    /// affine units such as `degC`.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Whether this is a pure number: every exponent is zero.
    pub fn is_constant(&self) -> bool {
        self.exponents.iter().all(|&e| e == 0)
    }

    pub fn is_commensurable_with(&self, other: &Self) -> bool {
        exponent_distance(&self.exponents, &other.exponents) <= COMMENSURABILITY_TOLERANCE
    }

    /// The linear conversion from this unit into `target`, or into the bare
    /// base-unit combination when `target` is `None`.
    ///
    /// Converting a value `x` of this unit yields `x * factor + offset` in
    /// the target unit.
    pub fn conversion_to(&self, target: Option<&Self>) -> UnitResult<Conversion> {
        let Some(target) = target else {
            return Ok(Conversion {
                factor: self.factor,
                offset: self.offset,
            });
        };
        if !self.is_commensurable_with(target) {
            return Err(UnitError::new(
                UnitErrorKind::IncommensurableUnits,
                "Units must be commensurable",
            ));
        }
        Ok(Conversion {
            factor: self.factor / target.factor,
            offset: (self.offset - target.offset) / target.factor,
        })
    }

    fn negated(mut self) -> Self {
        self.factor = -self.factor;
        self.offset = -self.offset;
        self
    }

    /// `self ^ exponent`. The exponent must be unitless; offset-bearing
    /// bases cannot be raised at all.
    fn powered(&self, exponent: &Self) -> UnitResult<Self> {
        if !exponent.is_constant() {
            return Err(UnitError::new(
                UnitErrorKind::IncommensurableUnits,
                "Units can only be raised to a unitless power",
            ));
        }
        if self.offset != 0.0 {
            return Err(UnitError::new(
                UnitErrorKind::OffsetMisuse,
                "Units with offsets cannot be raised to a power",
            ));
        }
        let power = exponent.factor;
        let mut exponents = ExponentVec::with_capacity(self.exponents.len());
        for &e in &self.exponents {
            exponents.push(scale_exponent(e, power)?);
        }
        Ok(Self {
            exponents,
            factor: self.factor.powf(power),
            offset: 0.0,
        })
    }

    /// `self * other` or `self / other`: exponents add (or subtract),
    /// factors multiply (or divide), offsets combine additively. A
    /// non-constant operand may not meet a non-zero offset.
    fn scaled(&self, other: &Self, divide: bool) -> UnitResult<Self> {
        if (self.offset != 0.0 && !(other.is_constant() && other.offset == 0.0))
            || (other.offset != 0.0 && !(self.is_constant() && self.offset == 0.0))
        {
            return Err(UnitError::new(UnitErrorKind::OffsetMisuse, OFFSET_COMBINE_MESSAGE));
        }
        let mut exponents = ExponentVec::with_capacity(self.exponents.len());
        for (&l, &r) in self.exponents.iter().zip(&other.exponents) {
            let combined = if divide { l.checked_sub(r) } else { l.checked_add(r) };
            exponents.push(combined.ok_or_else(exponent_overflow)?);
        }
        Ok(Self {
            exponents,
            factor: if divide {
                self.factor / other.factor
            } else {
                self.factor * other.factor
            },
            offset: self.offset + other.offset,
        })
    }

    /// `self + other` or `self - other`.
    ///
    /// Two non-constants must be commensurable and combine linearly. A
    /// constant mixed with a unit is absorbed into the unit's offset, which
    /// is how affine spellings like `K + 273.15` are written. A resulting
    /// factor of zero collapses to the zero constant.
    fn combined(&self, other: &Self, subtract: bool) -> UnitResult<Self> {
        if self.offset != 0.0 && other.offset != 0.0 {
            return Err(UnitError::new(UnitErrorKind::OffsetMisuse, OFFSET_COMBINE_MESSAGE));
        }
        let sign = if subtract { -1.0 } else { 1.0 };
        match (self.is_constant(), other.is_constant()) {
            (true, true) => Ok(Self::constant(
                self.exponents.len(),
                self.factor + sign * other.factor,
            )),
            (false, true) => Ok(Self {
                exponents: self.exponents.clone(),
                factor: self.factor,
                offset: self.offset + sign * (other.factor + other.offset),
            }),
            (true, false) => Ok(Self {
                exponents: other.exponents.clone(),
                factor: sign * other.factor,
                offset: self.factor + self.offset + sign * other.offset,
            }),
            (false, false) => {
                if !self.is_commensurable_with(other) {
                    return Err(UnitError::new(
                        UnitErrorKind::IncommensurableUnits,
                        "Units must be commensurable",
                    ));
                }
                let factor = self.factor + sign * other.factor;
                if factor == 0.0 {
                    // The zero unit is the zero constant.
                    return Ok(Self::constant(self.exponents.len(), 0.0));
                }
                Ok(Self {
                    exponents: self.exponents.clone(),
                    factor,
                    offset: self.offset + sign * other.offset,
                })
            }
        }
    }
}

/// Rounds a scaled exponent multiplied by `power`, half away from zero,
/// erroring when the result leaves `i16` range.
fn scale_exponent(exponent: i16, power: f64) -> UnitResult<i16> {
    let scaled = (f64::from(exponent) * power).round();
    if scaled < f64::from(i16::MIN) || scaled > f64::from(i16::MAX) {
        return Err(exponent_overflow());
    }
    Ok(scaled as i16)
}

fn exponent_overflow() -> UnitError {
    UnitError::new(
        UnitErrorKind::ExponentOverflow,
        "Exponent exceeds the representable range",
    )
}

/// Summed absolute difference of two exponent vectors.
///
/// Vectors of equal (padded) length reduce to lane-chunked straight-line
/// arithmetic; positions missing from a shorter vector count as zero.
pub(crate) fn exponent_distance(a: &[i16], b: &[i16]) -> i32 {
    if a.len() == b.len() {
        let mut chunks_a = a.chunks_exact(EXPONENT_LANES);
        let mut chunks_b = b.chunks_exact(EXPONENT_LANES);
        let mut total = 0i32;
        for (ca, cb) in chunks_a.by_ref().zip(chunks_b.by_ref()) {
            let mut lane = [0i32; EXPONENT_LANES];
            for (slot, (&x, &y)) in lane.iter_mut().zip(ca.iter().zip(cb)) {
                *slot = (i32::from(x) - i32::from(y)).abs();
            }
            total += lane.iter().sum::<i32>();
        }
        total
            + chunks_a
                .remainder()
                .iter()
                .zip(chunks_b.remainder())
                .map(|(&x, &y)| (i32::from(x) - i32::from(y)).abs())
                .sum::<i32>()
    } else {
        let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        let tail: i32 = long[short.len()..].iter().map(|&e| i32::from(e).abs()).sum();
        tail + short
            .iter()
            .zip(long)
            .map(|(&x, &y)| (i32::from(x) - i32::from(y)).abs())
            .sum::<i32>()
    }
}

/// The `(factor, offset)` pair converting values of one unit into another:
/// `target_value = source_value * factor + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub factor: f64,
    pub offset: f64,
}

impl Conversion {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.factor + self.offset
    }
}

/// A resolved unit handle: the canonical [`UnitInfo`] plus the cache-key
/// spelling it resolved from. Cloning is cheap; clones share one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    inner: Arc<UnitInner>,
}

#[derive(Debug, PartialEq)]
struct UnitInner {
    info: UnitInfo,
    text: Box<str>,
}

impl Unit {
    pub(crate) fn new(info: UnitInfo, text: impl Into<Box<str>>) -> Self {
        Self {
            inner: Arc::new(UnitInner {
                info,
                text: text.into(),
            }),
        }
    }

    /// The spelling this unit resolved from, with ASCII spaces removed.
    pub fn text(&self) -> &str {
        &self.inner.text
    }

    pub fn info(&self) -> &UnitInfo {
        &self.inner.info
    }

    /// The linear conversion into `target`, or into the base-unit
    /// combination when `target` is `None`. Errors iff the exponent vectors
    /// are not commensurable.
    pub fn conversion_to(&self, target: Option<&Self>) -> UnitResult<Conversion> {
        self.inner.info.conversion_to(target.map(Self::info))
    }

    /// Converts a value of this unit into `target`.
    pub fn convert(&self, value: f64, target: &Self) -> UnitResult<f64> {
        Ok(self.conversion_to(Some(target))?.apply(value))
    }

    /// Interprets `value` of this unit as a span of time.
    ///
    /// The unit must be commensurable with `seconds` (the canonical
    /// time-axis unit of the same system); the converted value must be
    /// non-negative and finite.
    pub fn duration(&self, value: f64, seconds: &Self) -> UnitResult<Duration> {
        let secs = self.convert(value, seconds)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            UnitError::new(
                UnitErrorKind::NumericParse,
                format!("value {secs} seconds cannot be represented as a duration"),
            )
        })
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// The concrete [`Algebra`] over [`UnitInfo`] variables, backed by a frozen
/// [`Dictionary`] for name lookups.
pub(crate) struct UnitAlgebra<'d> {
    dictionary: &'d Dictionary,
}

impl<'d> UnitAlgebra<'d> {
    pub(crate) fn new(dictionary: &'d Dictionary) -> Self {
        Self { dictionary }
    }
}

impl Algebra for UnitAlgebra<'_> {
    type Var = UnitInfo;

    fn number(&self, value: f64) -> UnitInfo {
        UnitInfo::constant(self.dictionary.dimension(), value)
    }

    fn variable(&self, name: &str) -> UnitResult<UnitInfo> {
        match self.dictionary.lookup(name) {
            Some(info) => Ok(info.clone()),
            None => Err(self.dictionary.unknown_name_error(name)),
        }
    }

    fn unary(&self, token: char, operand: UnitInfo) -> UnitResult<UnitInfo> {
        match token {
            '+' => Ok(operand),
            '-' => Ok(operand.negated()),
            _ => Err(UnitError::new(
                UnitErrorKind::Syntax,
                format!("Unsupported unary operator '{token}'"),
            )),
        }
    }

    fn binary(&self, token: char, left: UnitInfo, right: UnitInfo) -> UnitResult<UnitInfo> {
        match token {
            '^' => left.powered(&right),
            '*' => left.scaled(&right, false),
            '/' => left.scaled(&right, true),
            '+' => left.combined(&right, false),
            '-' => left.combined(&right, true),
            _ => Err(UnitError::new(
                UnitErrorKind::Syntax,
                format!("Unsupported binary operator '{token}'"),
            )),
        }
    }

    fn function(&self, name: &str, args: &mut Vec<UnitInfo>) -> UnitResult<UnitInfo> {
        match name {
            // pow(base, exponent) has the same semantics as `^`; arity is
            // verified by the engine before this is called.
            "pow" => match (args.pop(), args.pop()) {
                (Some(exponent), Some(base)) => base.powered(&exponent),
                _ => Err(UnitError::new(
                    UnitErrorKind::MissingOperand,
                    "Missing operand 1 for 'pow'",
                )),
            },
            _ => Err(UnitError::new(
                UnitErrorKind::Syntax,
                format!("Unsupported function '{name}'"),
            )),
        }
    }
}
