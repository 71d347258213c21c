use std::path::PathBuf;

use tfcheck::{
    config::{ExpectationsConfig, FixtureConfig},
    fixture::verify_plan,
    plan::decode_plan,
    terraform::SystemTerraform,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        usage();
        std::process::exit(2);
    }

    let passed = match args[0].as_str() {
        "run" => run_command(&args[1..])?,
        "match" => match_command(&args[1..])?,
        _ => {
            usage();
            std::process::exit(2);
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

fn run_command(args: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let config = required_arg(args, "--config")?;
    let fixture = FixtureConfig::load(&PathBuf::from(config))?.into_fixture()?;

    let report = fixture.run(&mut SystemTerraform)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(report.passed())
}

fn match_command(args: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let plan_file = required_arg(args, "--plan")?;
    let expect_file = required_arg(args, "--expect")?;

    let plan = decode_plan(&std::fs::read_to_string(plan_file)?)?;
    let expectations = ExpectationsConfig::load_json(&PathBuf::from(expect_file))?
        .into_expectations()?;

    let checks = verify_plan(&plan, &expectations);
    let passed = checks.iter().all(|check| check.passed());
    let payload = serde_json::json!({
        "passed": passed,
        "checks": checks,
        "outputs": plan.output_values(),
    });

    println!("{}", serde_json::to_string(&payload)?);
    Ok(passed)
}

fn required_arg(args: &[String], key: &str) -> Result<String, Box<dyn std::error::Error>> {
    let pos = args
        .iter()
        .position(|arg| arg == key)
        .ok_or_else(|| format!("missing arg {key}"))?;
    let value = args
        .get(pos + 1)
        .ok_or_else(|| format!("missing value for {key}"))?;
    if value.starts_with('-') {
        return Err(format!("missing value for {key}").into());
    }
    Ok(value.to_string())
}

fn usage() {
    eprintln!("tfcheck run --config <fixture.toml>");
    eprintln!("tfcheck match --plan <show.json> --expect <expectations.json>");
}
