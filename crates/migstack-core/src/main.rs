use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use migstack_core::{DryRunExecutor, MigrationStack, StackConfig, SynthesizedStack};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Stack config file (.json, .yaml, .yml or .toml)")
}

fn cli() -> Command {
    Command::new("migstack")
        .version(migstack_core::VERSION)
        .about("Builds the database migration stack descriptor graph")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("synth")
                .about("Print the synthesized stack as JSON")
                .arg(config_arg())
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the JSON"),
                ),
        )
        .subcommand(
            Command::new("outputs")
                .about("Print only the output records as JSON")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("plan")
                .about("Print the apply order, one logical id per line")
                .arg(config_arg()),
        )
}

fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();
}

fn synthesize(args: &ArgMatches) -> anyhow::Result<SynthesizedStack> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("--config is required")?;
    let config = StackConfig::from_path(path)
        .with_context(|| format!("loading {}", path.display()))?
        .with_process_env();
    let stack = MigrationStack::synthesize(&config).context("synthesizing stack")?;
    Ok(stack)
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    init_tracing(level);

    match matches.subcommand() {
        Some(("synth", args)) => {
            let stack = synthesize(args)?;
            let json = if args.get_flag("pretty") {
                serde_json::to_string_pretty(&stack)?
            } else {
                serde_json::to_string(&stack)?
            };
            println!("{json}");
        }
        Some(("outputs", args)) => {
            let stack = synthesize(args)?;
            println!("{}", serde_json::to_string_pretty(stack.outputs())?);
        }
        Some(("plan", args)) => {
            let stack = synthesize(args)?;
            let mut executor = DryRunExecutor::new();
            stack.hand_off(&mut executor)?;
            for step in executor.steps() {
                println!("{}", step.logical_id);
            }
        }
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn synth_accepts_pretty_flag() {
        let matches = cli()
            .try_get_matches_from(["migstack", "synth", "--config", "stack.yaml", "--pretty"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "synth");
        assert!(args.get_flag("pretty"));
    }

    #[test]
    fn config_is_required() {
        assert!(cli().try_get_matches_from(["migstack", "plan"]).is_err());
    }
}
