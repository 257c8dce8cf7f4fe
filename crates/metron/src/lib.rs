#![doc = include_str!("../../../README.md")]

mod cache;
mod config;
mod dictionary;
mod error;
mod quantity;
mod resolve;
mod suggest;
mod system;
mod units;

pub use crate::{
    config::{
        DEFAULT_HIGH_MEMORY_PRESSURE_CLEAR_PERCENTAGE, DEFAULT_HIGH_MEMORY_PRESSURE_THRESHOLD,
        DEFAULT_SLIDING_EXPIRATION_SECONDS, UnitConfig, default_config,
    },
    dictionary::Dictionary,
    error::{UnitError, UnitErrorKind, UnitResult},
    quantity::Quantity,
    resolve::{Algebra, Arity, ExpressionResolver, MAX_BINARY_PRECEDENCE, Scratch},
    system::{UnitResolver, UnitSystem, active, configure, on_expiration_tick, unit},
    units::{COMMENSURABILITY_TOLERANCE, Conversion, EXPONENT_SCALE, Unit, UnitInfo},
};
