//! Experiment runner: loads a configuration and seed genome, picks an
//! experiment, and executes its trials.

use evoneat::config::Config;
use evoneat::genomics::Genome;

use evoneat_experiments::experiment::{Experiment, GenerationEvaluator};
use evoneat_experiments::pole::CartPoleEvaluator;
use evoneat_experiments::pole2::CartDoublePoleEvaluator;
use evoneat_experiments::xor::XorEvaluator;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::process::ExitCode;

struct Args {
    out_dir: String,
    config_path: String,
    genome_path: String,
    experiment: String,
    trials: Option<usize>,
    seed: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        out_dir: "./out".to_string(),
        config_path: "./data/xor.neat".to_string(),
        genome_path: "./data/xorstartgenes".to_string(),
        experiment: "XOR".to_string(),
        trials: None,
        seed: 42,
    };
    let mut it = env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .ok_or_else(|| format!("missing value for {}", name))
        };
        match flag.as_str() {
            "--out" => args.out_dir = value("--out")?,
            "--config" => args.config_path = value("--config")?,
            "--genome" => args.genome_path = value("--genome")?,
            "--experiment" => args.experiment = value("--experiment")?,
            "--trials" => {
                args.trials = Some(
                    value("--trials")?
                        .parse()
                        .map_err(|_| "bad value for --trials".to_string())?,
                )
            }
            "--seed" => {
                args.seed = value("--seed")?
                    .parse()
                    .map_err(|_| "bad value for --seed".to_string())?
            }
            other => {
                return Err(format!(
                    "unknown flag {} (expected --out, --config, --genome, --experiment, --trials, --seed)",
                    other
                ))
            }
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut config = match File::open(&args.config_path)
        .map_err(|e| e.to_string())
        .and_then(|f| Config::read(BufReader::new(f)).map_err(|e| e.to_string()))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration {}: {}", args.config_path, e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(trials) = args.trials {
        config.num_runs = trials;
    }

    let seed_genome = match File::open(&args.genome_path)
        .map_err(|e| e.to_string())
        .and_then(|f| Genome::read(BufReader::new(f)).map_err(|e| e.to_string()))
    {
        Ok(genome) => genome,
        Err(e) => {
            eprintln!("failed to load seed genome {}: {}", args.genome_path, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::create_dir_all(&args.out_dir) {
        eprintln!("failed to create output directory {}: {}", args.out_dir, e);
        return ExitCode::FAILURE;
    }

    let (mut experiment, mut evaluator): (Experiment, Box<dyn GenerationEvaluator>) =
        match args.experiment.as_str() {
            "XOR" => (
                Experiment {
                    name: "XOR".to_string(),
                    max_fitness_score: 16.0,
                    ..Experiment::default()
                },
                Box::new(XorEvaluator::new(&args.out_dir)),
            ),
            "cart_pole" => (
                Experiment {
                    name: "cart_pole".to_string(),
                    max_fitness_score: 500_000.0,
                    ..Experiment::default()
                },
                Box::new(CartPoleEvaluator::new(&args.out_dir, 500_000)),
            ),
            "cart_2pole_markov" => (
                Experiment {
                    name: "cart_2pole_markov".to_string(),
                    max_fitness_score: 100_000.0,
                    ..Experiment::default()
                },
                Box::new(CartDoublePoleEvaluator::new(&args.out_dir, true)),
            ),
            "cart_2pole_non-markov" => (
                Experiment {
                    name: "cart_2pole_non-markov".to_string(),
                    ..Experiment::default()
                },
                Box::new(CartDoublePoleEvaluator::new(&args.out_dir, false)),
            ),
            other => {
                eprintln!(
                    "unsupported experiment {} (expected XOR, cart_pole, cart_2pole_markov, cart_2pole_non-markov)",
                    other
                );
                return ExitCode::FAILURE;
            }
        };

    let mut rng = SmallRng::seed_from_u64(args.seed);
    if let Err(e) = experiment.execute(&config, &seed_genome, evaluator.as_mut(), &mut rng) {
        eprintln!("experiment failed: {}", e);
        return ExitCode::FAILURE;
    }

    experiment.print_statistics();
    println!(">>> start genome file:   {}", args.genome_path);
    println!(">>> configuration file:  {}", args.config_path);
    ExitCode::SUCCESS
}
