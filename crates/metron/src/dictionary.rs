//! Construction of the name -> [`UnitInfo`] dictionary.
//!
//! The dictionary is built once from a [`UnitConfig`] and is read-only for
//! the life of its resolver. Base units are inserted first; each configured
//! unit entry is then resolved *against the dictionary under construction*,
//! which is why entries must be ordered so that every name an expression
//! mentions is already defined. Prefix families attached to a name via
//! `[family]` tags expand into scaled spellings, with collisions falling
//! back to the bracketed `[prefix]name` form.

use ahash::AHashMap;

use crate::{
    config::UnitConfig,
    error::{UnitError, UnitErrorKind, UnitResult},
    resolve::{ExpressionResolver, Scratch},
    suggest,
    units::{EXPONENT_LANES, UnitAlgebra, UnitInfo},
};

/// The frozen name table of one resolver.
#[derive(Debug)]
pub struct Dictionary {
    units: AHashMap<Box<str>, UnitInfo>,
    base_units: Vec<Box<str>>,
    /// Padded dimensionality of every exponent vector in this dictionary.
    dimension: usize,
}

impl Dictionary {
    /// Builds the dictionary from configuration, resolving each unit entry's
    /// expression with `engine`.
    pub(crate) fn build(engine: &ExpressionResolver, config: &UnitConfig) -> UnitResult<Self> {
        let base_units: Vec<Box<str>> = config
            .base_units
            .iter()
            .map(|name| strip_spaces(name).into())
            .collect();
        let dimension = base_units.len().next_multiple_of(EXPONENT_LANES);
        let mut dictionary = Self {
            units: AHashMap::with_capacity(base_units.len() + config.units.len() * 4),
            base_units,
            dimension,
        };

        for (ordinal, name) in dictionary.base_units.clone().into_iter().enumerate() {
            dictionary.units.insert(name, UnitInfo::base(dimension, ordinal));
        }

        let mut scratch = Scratch::new();
        for (names, expression) in &config.units {
            let info = engine
                .resolve_with(&UnitAlgebra::new(&dictionary), expression, &mut scratch)
                .map_err(|err| UnitError::invalid_config(format!("unit entry '{names}': {err}")))?;
            for entry in parse_name_list(names, config)? {
                dictionary.insert_bare(&entry.name, &info)?;
                for family in &entry.families {
                    // Family tags were validated by parse_name_list.
                    let Some(prefixes) = config.prefixes.get(family.as_str()) else {
                        continue;
                    };
                    for (prefix, prefix_factor) in prefixes {
                        dictionary.insert_prefixed(prefix, &entry.name, info.with_prefix_factor(*prefix_factor))?;
                    }
                }
            }
        }
        Ok(dictionary)
    }

    /// Single hash probe over the name's UTF-8 bytes.
    pub(crate) fn lookup(&self, name: &str) -> Option<&UnitInfo> {
        self.units.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Padded dimensionality of this dictionary's exponent vectors.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The configured base-unit names, in ordinal order.
    pub fn base_units(&self) -> impl Iterator<Item = &str> {
        self.base_units.iter().map(|name| &**name)
    }

    /// Every registered name, in unspecified order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(|name| &**name)
    }

    pub(crate) fn unknown_name_error(&self, name: &str) -> UnitError {
        UnitError::new(
            UnitErrorKind::UnknownUnit,
            format!("Unrecognized unit expression '{name}'"),
        )
        .with_suggestions(suggest::nearest(self.names(), name))
    }

    /// Inserts a bare (unprefixed) name. A name matching a base unit keeps
    /// the base binding; any other duplicate is a configuration error.
    fn insert_bare(&mut self, name: &str, info: &UnitInfo) -> UnitResult<()> {
        if self.units.contains_key(name) {
            if self.base_units.iter().any(|base| &**base == name) {
                return Ok(());
            }
            return Err(UnitError::invalid_config(format!("duplicate unit name '{name}'")));
        }
        self.units.insert(name.into(), info.clone());
        Ok(())
    }

    /// Inserts a prefix-expanded spelling. If the concatenated spelling is
    /// taken (e.g. `k` + `g` against the base unit `kg`), the entry is
    /// stored under the bracketed form `[prefix]name` instead, preserving
    /// the original binding.
    fn insert_prefixed(&mut self, prefix: &str, name: &str, info: UnitInfo) -> UnitResult<()> {
        let spelling = format!("{prefix}{name}");
        if !self.units.contains_key(spelling.as_str()) {
            self.units.insert(spelling.into_boxed_str(), info);
            return Ok(());
        }
        let bracketed = format!("[{prefix}]{name}");
        if self.units.contains_key(bracketed.as_str()) {
            return Err(UnitError::invalid_config(format!(
                "prefixed unit name '{spelling}' collides twice (both '{spelling}' and '{bracketed}' are taken)"
            )));
        }
        self.units.insert(bracketed.into_boxed_str(), info);
        Ok(())
    }
}

struct NameEntry {
    name: String,
    families: Vec<String>,
}

/// Parses the comma-separated name list of a unit entry.
///
/// A `[family1,family2]` tag binds prefix families to the single name that
/// follows it; tags do not carry across commas. ASCII spaces inside names
/// are stripped.
fn parse_name_list(field: &str, config: &UnitConfig) -> UnitResult<Vec<NameEntry>> {
    let mut entries = Vec::new();
    let mut rest = field;
    loop {
        rest = rest.trim_start_matches(' ');
        let mut families = Vec::new();
        if let Some(after) = rest.strip_prefix('[') {
            let Some(close) = after.find(']') else {
                return Err(UnitError::invalid_config(format!(
                    "unterminated prefix-family tag in unit names '{field}'"
                )));
            };
            for family in after[..close].split(',') {
                let family = family.trim_matches(' ');
                if !config.prefixes.contains_key(family) {
                    return Err(UnitError::invalid_config(format!(
                        "unknown prefix family '{family}' in unit names '{field}'"
                    )));
                }
                families.push(family.to_owned());
            }
            rest = &after[close + 1..];
        }
        let (name, remainder) = match rest.find(',') {
            Some(comma) => (&rest[..comma], Some(&rest[comma + 1..])),
            None => (rest, None),
        };
        let name = strip_spaces(name);
        if name.is_empty() {
            return Err(UnitError::invalid_config(format!("empty name in unit names '{field}'")));
        }
        entries.push(NameEntry { name, families });
        match remainder {
            Some(r) => rest = r,
            None => break,
        }
    }
    Ok(entries)
}

fn strip_spaces(name: &str) -> String {
    name.chars().filter(|&c| c != ' ').collect()
}
