use anyhow::{Context, Result};
use session::Session;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing_subscriber::EnvFilter;

mod dice_tracker;
mod session;
mod shake;
mod util;

const USAGE: &str = "usage: shake_dice [--seed <u64>] [<samples file>]";

struct Args {
    seed: Option<u64>,
    path: Option<String>,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut parsed = Args {
        seed: None,
        path: None,
    };
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => parsed.seed = Some(args.next()?.parse().ok()?),
            _ if arg.starts_with('-') => return None,
            _ if parsed.path.is_none() => parsed.path = Some(arg.clone()),
            _ => return None,
        }
    }
    Some(parsed)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Some(args) => args,
        None => {
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    let mut session = match args.seed {
        Some(seed) => Session::with_seed(seed),
        None => Session::from_entropy(),
    };

    if let Some(path) = args.path {
        let file = File::open(&path).with_context(|| format!("opening {}", path))?;
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("reading {}", path))?;
            session.parse_line(&line);
        }
        println!("{}", session.build_table());
        return Ok(());
    }

    println!("Shake to throw. Commands: replay, dismiss, pause, resume, history, stats, state");
    while let Some(line) = util::input("> ").context("reading stdin")? {
        session.parse_line(&line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_args;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(&args(&["--seed", "12", "shakes.log"])).unwrap();
        assert_eq!(parsed.seed, Some(12));
        assert_eq!(parsed.path.as_deref(), Some("shakes.log"));

        let parsed = parse_args(&[]).unwrap();
        assert!(parsed.seed.is_none() && parsed.path.is_none());

        assert!(parse_args(&args(&["--seed"])).is_none());
        assert!(parse_args(&args(&["--seed", "x"])).is_none());
        assert!(parse_args(&args(&["--verbose"])).is_none());
        assert!(parse_args(&args(&["a", "b"])).is_none());
    }
}
