//! Conversion queries between resolved units, including affine temperature
//! conversions and the ring-homomorphism laws.

use metron::{Quantity, Unit, UnitErrorKind, UnitSystem};

fn system() -> UnitSystem {
    UnitSystem::with_defaults()
}

fn unit(system: &UnitSystem, text: &str) -> Unit {
    system.unit(text).expect("expected unit to resolve")
}

#[test]
fn fahrenheit_to_celsius() {
    let system = system();
    let degf = unit(&system, "degF");
    let degc = unit(&system, "degC");
    let converted = degf.convert(32.0, &degc).unwrap();
    assert!(converted.abs() < 1e-9, "expected 32 degF = 0 degC, got {converted}");
    let converted = degf.convert(212.0, &degc).unwrap();
    assert!((converted - 100.0).abs() < 1e-9, "expected 212 degF = 100 degC, got {converted}");
}

#[test]
fn inches_to_millimeters() {
    let system = system();
    let converted = unit(&system, "in").convert(1.0, &unit(&system, "mm")).unwrap();
    assert!((converted - 25.4).abs() < 1e-9, "got {converted}");
}

#[test]
fn joules_per_second_is_watts() {
    let system = system();
    let conversion = unit(&system, "J/s").conversion_to(Some(&unit(&system, "W"))).unwrap();
    assert!((conversion.factor - 1.0).abs() < 1e-12);
    assert_eq!(conversion.offset, 0.0);
}

#[test]
fn conversion_factors_compose() {
    let system = system();
    let km = unit(&system, "km");
    let m = unit(&system, "m");
    let inch = unit(&system, "in");

    let km_to_m = km.conversion_to(Some(&m)).unwrap().factor;
    let m_to_in = m.conversion_to(Some(&inch)).unwrap().factor;
    let km_to_in = km.conversion_to(Some(&inch)).unwrap().factor;
    assert!((km_to_m * m_to_in - km_to_in).abs() / km_to_in < 1e-12);
}

#[test]
fn conversion_factors_invert() {
    let system = system();
    for (a, b) in [("mi", "km"), ("lb", "kg"), ("gal", "L"), ("kWh", "J")] {
        let forward = unit(&system, a).conversion_to(Some(&unit(&system, b))).unwrap().factor;
        let backward = unit(&system, b).conversion_to(Some(&unit(&system, a))).unwrap().factor;
        assert!((forward * backward - 1.0).abs() < 1e-12, "{a} <-> {b}");
    }
}

#[test]
fn base_form_conversion_is_the_units_own_factor() {
    let system = system();
    let inch = unit(&system, "in");
    let conversion = inch.conversion_to(None).unwrap();
    assert!((conversion.factor - 0.0254).abs() < 1e-12);
    assert_eq!(conversion.offset, 0.0);

    let degc = unit(&system, "degC");
    let conversion = degc.conversion_to(None).unwrap();
    assert_eq!(conversion.factor, 1.0);
    assert_eq!(conversion.offset, 273.15);
}

#[test]
fn incommensurable_conversions_fail() {
    let system = system();
    let err = unit(&system, "m").conversion_to(Some(&unit(&system, "s"))).unwrap_err();
    assert_eq!(err.kind(), UnitErrorKind::IncommensurableUnits);
}

#[test]
fn tolerant_exponents_convert() {
    let system = system();
    let close = unit(&system, "m^1.333");
    let exact = unit(&system, "m^(4/3)");
    assert!(close.conversion_to(Some(&exact)).is_ok());

    let off = unit(&system, "m^1.3");
    let err = off.conversion_to(Some(&exact)).unwrap_err();
    assert_eq!(err.kind(), UnitErrorKind::IncommensurableUnits);
}

#[test]
fn resolving_twice_yields_equal_units() {
    let system = system();
    assert_eq!(unit(&system, "kg*m/s^2").info(), unit(&system, "kg*m/s^2").info());
    // Uncached resolution agrees with the cached path.
    assert_eq!(system.resolver().resolve("kg*m/s^2").unwrap(), *unit(&system, "kg*m/s^2").info());
}

#[test]
fn compound_customary_conversions() {
    let system = system();
    let mph_to_kph = unit(&system, "mph").convert(60.0, &unit(&system, "kph")).unwrap();
    assert!((mph_to_kph - 96.56064).abs() < 1e-6, "got {mph_to_kph}");

    let psi_to_kpa = unit(&system, "psi").convert(1.0, &unit(&system, "kPa")).unwrap();
    assert!((psi_to_kpa - 6.894757).abs() < 1e-3, "got {psi_to_kpa}");
}

#[test]
fn quantities_convert_and_display() {
    let system = system();
    let quantity = Quantity::new(5.0, unit(&system, "km"));
    let in_miles = quantity.convert_to(&unit(&system, "mi")).unwrap();
    assert!((in_miles.value - 3.106855).abs() < 1e-5, "got {}", in_miles.value);
    assert_eq!(in_miles.unit.text(), "mi");
    assert_eq!(in_miles.to_string(), format!("{} mi", in_miles.value));
}

#[test]
fn time_quantities_become_durations() {
    let system = system();
    let duration = Quantity::new(1.5, unit(&system, "min")).to_duration(&system).unwrap();
    assert_eq!(duration.as_secs(), 90);

    let duration = Quantity::new(250.0, unit(&system, "ms")).to_duration(&system).unwrap();
    assert_eq!(duration.as_millis(), 250);

    let err = Quantity::new(-1.0, unit(&system, "s")).to_duration(&system).unwrap_err();
    assert_eq!(err.kind(), UnitErrorKind::NumericParse);

    let err = Quantity::new(1.0, unit(&system, "m")).to_duration(&system).unwrap_err();
    assert_eq!(err.kind(), UnitErrorKind::IncommensurableUnits);
}

#[test]
fn unknown_units_suggest_near_matches() {
    let system = system();
    let err = system.unit("degc").unwrap_err();
    assert_eq!(err.kind(), UnitErrorKind::UnknownUnit);
    let suggestions: Vec<&str> = err.suggestions().iter().map(|s| &**s).collect();
    assert_eq!(suggestions.first(), Some(&"degC"));
    assert!(suggestions.contains(&"degF"), "got {suggestions:?}");
    assert!(suggestions.contains(&"degR"), "got {suggestions:?}");
    assert!(suggestions.len() <= 11);

    let rendered = err.to_string();
    assert!(rendered.contains("Unrecognized unit expression 'degc'"), "got {rendered}");
    assert!(rendered.contains("Did you mean: "), "got {rendered}");
}
