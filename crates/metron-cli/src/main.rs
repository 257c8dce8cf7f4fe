use std::{env, fs, process::ExitCode};

use metron::{Unit, UnitConfig, UnitInfo, EXPONENT_SCALE};

const USAGE: &str = "usage: metron [--config <path>] <expression>...
       metron [--config <path>] convert <value> <from> <to>";

fn main() -> ExitCode {
    let mut args: Vec<String> = env::args().skip(1).collect();

    if let Some(i) = args.iter().position(|a| a == "--config") {
        if i + 1 >= args.len() {
            eprintln!("error: --config requires a path\n{USAGE}");
            return ExitCode::FAILURE;
        }
        let path = args.remove(i + 1);
        args.remove(i);
        let config = match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(err) = metron::configure(&config) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    if args.is_empty() {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    }

    if args[0] == "convert" {
        return convert(&args[1..]);
    }

    for expression in &args {
        match metron::unit(expression) {
            Ok(unit) => println!("{expression} = {}", describe(&unit)),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn convert(args: &[String]) -> ExitCode {
    let [value, from, to] = args else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let value: f64 = match value.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("error: '{value}' is not a number");
            return ExitCode::FAILURE;
        }
    };
    let result = metron::unit(from)
        .and_then(|from| Ok((from, metron::unit(to)?)))
        .and_then(|(from, to)| from.convert(value, &to));
    match result {
        Ok(converted) => {
            println!("{value} {from} = {converted} {to}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &str) -> Result<UnitConfig, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("{path}: {err}"))?;
    serde_json::from_str(&text).map_err(|err| format!("{path}: {err}"))
}

/// Renders the canonical form with exponents labelled by base-unit name.
fn describe(unit: &Unit) -> String {
    let info: &UnitInfo = unit.info();
    let system = metron::active();
    let mut dimensions = String::new();
    for (name, &exponent) in system.resolver().dictionary().base_units().zip(info.exponents()) {
        if exponent != 0 {
            if !dimensions.is_empty() {
                dimensions.push(' ');
            }
            let value = f64::from(exponent) / f64::from(EXPONENT_SCALE);
            dimensions.push_str(&format!("{name}^{value}"));
        }
    }
    if dimensions.is_empty() {
        dimensions.push_str("dimensionless");
    }
    if info.offset() == 0.0 {
        format!("factor {} [{dimensions}]", info.factor())
    } else {
        format!("factor {} offset {} [{dimensions}]", info.factor(), info.offset())
    }
}
