//! Creature Evolve CLI - Train locomotion controllers from a seed creature.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use creature_evolve::{
    compute::evolution::{EvolutionEngine, GenerationArchive},
    schema::{Creature, EvolutionConfig},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <creature.json> [generations] [output_dir]", args[0]);
        eprintln!();
        eprintln!("Evolve controllers for a seed creature and save the best");
        eprintln!("creature of every generation.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  creature.json  Seed creature genome");
        eprintln!("  generations    Number of generations (default: from config)");
        eprintln!("  output_dir     Output directory (default: data)");
        eprintln!();
        eprintln!("An optional <creature>.config.json next to the genome overrides");
        eprintln!("the training configuration. Print an example with --example.");
        std::process::exit(1);
    }

    let creature_path = PathBuf::from(&args[1]);
    let output_dir = args.get(3).map(PathBuf::from).unwrap_or_else(|| "data".into());

    // Load seed creature
    let creature_str = fs::read_to_string(&creature_path).unwrap_or_else(|e| {
        eprintln!("Error reading creature file: {}", e);
        std::process::exit(1);
    });
    let seed = Creature::from_json(&creature_str).unwrap_or_else(|e| {
        eprintln!("Error parsing creature: {}", e);
        std::process::exit(1);
    });

    // Load or create configuration
    let config_path = creature_path.with_extension("config.json");
    let mut config: EvolutionConfig = if config_path.exists() {
        let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
            eprintln!("Error reading config file: {}", e);
            std::process::exit(1);
        });
        serde_json::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Error parsing config: {}", e);
            std::process::exit(1);
        })
    } else {
        EvolutionConfig::default()
    };
    if let Some(arg) = args.get(2) {
        config.generations = parse_generations(arg).unwrap_or_else(|e| {
            eprintln!("Invalid generation count '{}': {}", arg, e);
            std::process::exit(1);
        });
    }

    println!("Creature Evolve");
    println!("===============");
    println!("Bones: {}", seed.bone_count());
    println!("Population: {}", config.population_size);
    println!("Generations: {}", config.generations);
    println!("Mutation rate: {}", config.mutation_rate);
    println!("Rollout steps: {}", config.simulation.steps);
    println!("Output: {}", output_dir.display());
    println!();

    let mut archive = GenerationArchive::new(&output_dir).unwrap_or_else(|e| {
        eprintln!("Error creating output directory: {}", e);
        std::process::exit(1);
    });
    // Reset and retrain: drop results of any previous run
    archive.reset().unwrap_or_else(|e| {
        eprintln!("Error clearing previous results: {}", e);
        std::process::exit(1);
    });

    let mut engine = EvolutionEngine::new(config, seed).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    println!("Training...");
    let start = Instant::now();

    let reports = engine
        .run_with_callback(|report| {
            archive.save_generation(report).unwrap_or_else(|e| {
                eprintln!("Error saving generation {}: {}", report.generation, e);
                std::process::exit(1);
            });
            println!(
                "  Generation {}: best={:.3}, avg={:.3}, diversity={:.3}",
                report.generation, report.best_fitness, report.avg_fitness, report.diversity
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Training failed: {}", e);
            std::process::exit(1);
        });

    archive.write_index().unwrap_or_else(|e| {
        eprintln!("Error writing index: {}", e);
        std::process::exit(1);
    });

    let elapsed = start.elapsed();
    let best = reports
        .iter()
        .map(|r| r.best_fitness)
        .fold(f64::NEG_INFINITY, f64::max);

    println!();
    println!("Training complete!");
    println!("  Generations: {}", reports.len());
    if !reports.is_empty() {
        println!("  Best fitness: {:.3}", best);
    }
    println!("  Time: {:.2}s", elapsed.as_secs_f32());
}

/// Generation count from the command line. Anything but a plain
/// non-negative integer is rejected.
fn parse_generations(arg: &str) -> Result<usize, std::num::ParseIntError> {
    arg.parse()
}

fn print_example_config() {
    let config = EvolutionConfig::default();
    let creature = Creature::example();

    println!("Example configuration (creature.config.json):");
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );
    println!();
    println!("Example creature (creature.json):");
    println!("{}", creature.to_json_pretty().unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generations() {
        assert_eq!(parse_generations("12").unwrap(), 12);
        assert_eq!(parse_generations("0").unwrap(), 0);
        assert!(parse_generations("2O").is_err());
        assert!(parse_generations("-3").is_err());
        assert!(parse_generations("").is_err());
    }
}
