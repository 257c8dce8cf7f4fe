//! Dictionary construction: base units, seed-expression resolution against
//! the partial dictionary, prefix expansion, and the collision policy.

use metron::{UnitConfig, UnitErrorKind, UnitResolver, UnitSystem};

fn config(json: &str) -> UnitConfig {
    serde_json::from_str(json).expect("test config must parse")
}

fn resolver(json: &str) -> UnitResolver {
    UnitResolver::from_config(&config(json)).expect("test config must build")
}

#[test]
fn prefix_families_expand_tagged_names() {
    let resolver = resolver(
        r#"{
            "prefixes": {"si": {"k": 1e3, "m": 1e-3}},
            "baseUnits": ["m", "kg", "s"],
            "units": {"[si]m": "m", "[si]g": "kg / 1000"}
        }"#,
    );
    let dictionary = resolver.dictionary();
    assert!(dictionary.contains("km"));
    assert!(dictionary.contains("mm"));
    assert!((resolver.resolve("km").unwrap().factor() - 1000.0).abs() < 1e-12);
    assert!((resolver.resolve("mg").unwrap().factor() - 1e-6).abs() < 1e-18);
}

#[test]
fn prefixed_collision_with_a_base_unit_goes_bracketed() {
    let resolver = resolver(
        r#"{
            "prefixes": {"si": {"k": 1e3}},
            "baseUnits": ["m", "kg"],
            "units": {"[si]g": "kg / 1000"}
        }"#,
    );
    let dictionary = resolver.dictionary();
    // `k` + `g` collides with the base unit `kg`; the base binding wins and
    // the kilogram-via-prefix spelling moves to `[k]g`.
    assert!(dictionary.contains("[k]g"));
    assert_eq!(resolver.resolve("kg").unwrap().factor(), 1.0);
    assert!((resolver.resolve("[k]g").unwrap().factor() - 1.0).abs() < 1e-12);
}

#[test]
fn prefixed_collision_with_an_earlier_unit_goes_bracketed() {
    let resolver = resolver(
        r#"{
            "prefixes": {"si": {"m": 1e-3}},
            "baseUnits": ["m", "s"],
            "units": {"min": "60 * s", "[si]in": "0.0254 * m"}
        }"#,
    );
    let dictionary = resolver.dictionary();
    // `m` + `in` would spell `min`; the minute keeps that name and the
    // milli-inch moves to `[m]in`.
    assert!((resolver.resolve("min").unwrap().factor() - 60.0).abs() < 1e-12);
    assert!(dictionary.contains("[m]in"));
    assert!((resolver.resolve("[m]in").unwrap().factor() - 2.54e-5).abs() < 1e-18);
}

#[test]
fn bare_names_never_overwrite_base_units() {
    let resolver = resolver(
        r#"{
            "baseUnits": ["m", "s"],
            "units": {"s, sec": "s"}
        }"#,
    );
    assert_eq!(resolver.resolve("s").unwrap().factor(), 1.0);
    assert_eq!(resolver.resolve("sec").unwrap(), resolver.resolve("s").unwrap());
}

#[test]
fn family_tags_bind_only_the_following_name() {
    let resolver = resolver(
        r#"{
            "prefixes": {"si": {"k": 1e3}},
            "baseUnits": ["m"],
            "units": {"[si]m, meter": "m"}
        }"#,
    );
    let dictionary = resolver.dictionary();
    assert!(dictionary.contains("km"));
    assert!(dictionary.contains("meter"));
    assert!(!dictionary.contains("kmeter"), "tag must not carry across the comma");
}

#[test]
fn names_are_stripped_of_spaces() {
    let resolver = resolver(
        r#"{
            "baseUnits": ["m"],
            "units": {" n mi , nautical mile ": "1852 * m"}
        }"#,
    );
    assert!(resolver.dictionary().contains("nmi"));
    assert!(resolver.dictionary().contains("nauticalmile"));
}

#[test]
fn forward_references_fail_construction() {
    let err = UnitResolver::from_config(&config(
        r#"{
            "baseUnits": ["m", "kg", "s"],
            "units": {"J": "N * m", "N": "kg * m / s^2"}
        }"#,
    ))
    .expect_err("J references N before it is defined");
    assert_eq!(err.kind(), UnitErrorKind::InvalidConfig);
    assert!(err.message().contains("'J'"), "got: {}", err.message());
}

#[test]
fn duplicate_bare_names_fail_construction() {
    let err = UnitResolver::from_config(&config(
        r#"{
            "baseUnits": ["m"],
            "units": {"ft": "0.3048 * m", "ft, foot": "0.3048 * m"}
        }"#,
    ))
    .expect_err("duplicate name must fail");
    assert_eq!(err.kind(), UnitErrorKind::InvalidConfig);
    assert!(err.message().contains("duplicate"), "got: {}", err.message());
}

#[test]
fn unknown_families_and_empty_names_fail_construction() {
    let err = UnitResolver::from_config(&config(
        r#"{
            "baseUnits": ["m"],
            "units": {"[nope]x": "m"}
        }"#,
    ))
    .expect_err("unknown family must fail");
    assert!(err.message().contains("nope"), "got: {}", err.message());

    let err = UnitResolver::from_config(&config(
        r#"{
            "baseUnits": ["m"],
            "units": {"x, ": "m"}
        }"#,
    ))
    .expect_err("empty name must fail");
    assert!(err.message().contains("empty name"), "got: {}", err.message());
}

#[test]
fn malformed_structural_config_fails() {
    for (json, needle) in [
        (r#"{"baseUnits": ["m", "m"]}"#, "duplicate base unit"),
        (r#"{"baseUnits": [" "]}"#, "empty name"),
        (r#"{"baseUnits": ["m"], "prefixes": {"si": {"k": 0}}}"#, "invalid factor"),
        (r#"{"baseUnits": ["m"], "units": {"x": " "}}"#, "empty expression"),
        (r#"{"baseUnits": ["m"], "highMemoryPressureThreshold": 101}"#, "0..=100"),
    ] {
        let err = UnitResolver::from_config(&config(json)).expect_err(json);
        assert_eq!(err.kind(), UnitErrorKind::InvalidConfig, "for {json}");
        assert!(err.message().contains(needle), "for {json}, got: {}", err.message());
    }
}

#[test]
fn default_catalog_builds_and_disambiguates() {
    let system = UnitSystem::with_defaults();
    let dictionary = system.resolver().dictionary();
    assert_eq!(dictionary.base_units().count(), 10);
    // Collisions baked into the catalog: kilo-gram vs the kg base unit,
    // centi-tonne vs the ct base unit, femto-tonne vs foot.
    assert!(dictionary.contains("[k]g"));
    assert!(dictionary.contains("[c]t"));
    assert!(dictionary.contains("[f]t"));
    // Long-form prefixes expand alongside the short forms.
    assert_eq!(
        system.resolver().resolve("kilometre").unwrap(),
        system.resolver().resolve("km").unwrap()
    );
    assert_eq!(
        system.resolver().resolve("milliseconds").unwrap(),
        system.resolver().resolve("ms").unwrap()
    );
}

#[test]
fn unit_definitions_round_trip_through_their_expressions() {
    let system = UnitSystem::with_defaults();
    for (name, expression) in [
        ("N", "kg * m / s^2"),
        ("Pa", "N / m^2"),
        ("W", "J / s"),
        ("mph", "mi / h"),
        ("L", "dm^3"),
    ] {
        let named = system.resolver().resolve(name).unwrap();
        let expanded = system.resolver().resolve(expression).unwrap();
        assert!(named.is_commensurable_with(&expanded), "{name} vs {expression}");
        assert!(
            (named.factor() - expanded.factor()).abs() <= f64::EPSILON * expanded.factor().abs(),
            "{name} vs {expression}"
        );
    }
}
