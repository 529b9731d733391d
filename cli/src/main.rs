//! Spectral Translator CLI
//!
//! Command-line interface for the spectra library.
//! Trains a translator from table files and evaluates saved bundles.

use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process;
use std::str::FromStr;
use std::time::Instant;

use clap::{Arg, ArgMatches, Command};
use spectra_lib::{
    bundle::{weights_path, TrainingBundle},
    codec::{CodecConfig, DEFAULT_TARGET_LENGTH},
    evaluate::Evaluator,
    utils::{self, DatasetFiles},
    DeviceKind, SpectralTranslator, Trainer, TrainerConfig, TranslatorConfig,
};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Arguments shared by both subcommands
fn data_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .help("Table of input signals, one per row")
                .value_name("FILE")
                .required(true),
        )
        .arg(
            Arg::new("target")
                .long("target")
                .short('t')
                .help("Table of target signals, one per row")
                .value_name("FILE")
                .required(true),
        )
        .arg(
            Arg::new("params")
                .long("params")
                .short('p')
                .help("Table of conditioning parameters, one row per sample")
                .value_name("FILE")
                .required(true),
        )
        .arg(
            Arg::new("columns")
                .long("columns")
                .short('c')
                .help("Parameter columns to use, e.g. 0,1,2")
                .value_name("LIST"),
        )
        .arg(
            Arg::new("device")
                .long("device")
                .help("Compute device (cpu, cuda:N)")
                .value_name("DEVICE"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Output JSON file")
                .value_name("FILE")
                .required(true),
        )
}

fn train_command() -> Command {
    data_args(Command::new("train").about("Train a translator and save it as a bundle"))
        .arg(
            Arg::new("epochs")
                .long("epochs")
                .short('e')
                .help("Number of epochs (default: 50)")
                .value_name("N"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .short('b')
                .help("Samples per batch (default: 16)")
                .value_name("N"),
        )
        .arg(
            Arg::new("learning-rate")
                .long("learning-rate")
                .help("Peak learning rate (default: 1e-3)")
                .value_name("RATE"),
        )
        .arg(
            Arg::new("weight-decay")
                .long("weight-decay")
                .help("AdamW weight decay (default: 1e-2)")
                .value_name("DECAY"),
        )
        .arg(
            Arg::new("warmup-epochs")
                .long("warmup-epochs")
                .help("Epochs of learning rate warmup (default: 5)")
                .value_name("N"),
        )
        .arg(
            Arg::new("target-length")
                .long("target-length")
                .help("Resampled signal length, even (default: 400)")
                .value_name("N"),
        )
        .arg(
            Arg::new("d-model")
                .long("d-model")
                .help("Model width (default: 64)")
                .value_name("N"),
        )
        .arg(
            Arg::new("heads")
                .long("heads")
                .help("Attention heads (default: 4)")
                .value_name("N"),
        )
        .arg(
            Arg::new("layers")
                .long("layers")
                .help("Encoder blocks (default: 3)")
                .value_name("N"),
        )
        .arg(
            Arg::new("ff-dim")
                .long("ff-dim")
                .help("Feedforward width (default: 256)")
                .value_name("N"),
        )
        .arg(
            Arg::new("dropout")
                .long("dropout")
                .help("Dropout probability (default: 0.1)")
                .value_name("P"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed for the batch order")
                .value_name("N"),
        )
}

fn evaluate_command() -> Command {
    data_args(Command::new("evaluate").about("Predict samples with a trained bundle"))
        .arg(
            Arg::new("bundle")
                .long("bundle")
                .help("Bundle manifest written by the train command")
                .value_name("FILE")
                .required(true),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .short('n')
                .help("Only predict this sample (default: all)")
                .value_name("N"),
        )
}

/// Parse an optional flag, falling back to `default`
fn parse_or<T>(matches: &ArgMatches, name: &str, default: T) -> CliResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match matches.get_one::<String>(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| format!("Invalid value for --{}: {} ({})", name, raw, e).into()),
        None => Ok(default),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> CliResult<&'a Path> {
    matches
        .get_one::<String>(name)
        .map(Path::new)
        .ok_or_else(|| format!("--{} is required", name).into())
}

fn dataset_files(matches: &ArgMatches) -> CliResult<DatasetFiles<'_>> {
    Ok(DatasetFiles {
        input: required(matches, "input")?,
        target: required(matches, "target")?,
        params: required(matches, "params")?,
    })
}

fn run_train(matches: &ArgMatches) -> CliResult<()> {
    let columns = utils::parse_columns(
        matches
            .get_one::<String>("columns")
            .map(String::as_str)
            .unwrap_or("0,1,2"),
    )?;
    let device: DeviceKind = parse_or(matches, "device", DeviceKind::Cpu)?;
    let codec = CodecConfig::new(parse_or(matches, "target-length", DEFAULT_TARGET_LENGTH)?)?;

    println!("Loading training data...");
    let dataset = utils::load_dataset(dataset_files(matches)?, &columns, codec, None)?;

    let defaults = TranslatorConfig::for_data(dataset.num_bins(), dataset.num_parameters());
    let translator_config = TranslatorConfig {
        d_model: parse_or(matches, "d-model", defaults.d_model)?,
        num_heads: parse_or(matches, "heads", defaults.num_heads)?,
        num_layers: parse_or(matches, "layers", defaults.num_layers)?,
        ff_dim: parse_or(matches, "ff-dim", defaults.ff_dim)?,
        dropout: parse_or(matches, "dropout", defaults.dropout)?,
        ..defaults
    };

    let defaults = TrainerConfig::default();
    let trainer_config = TrainerConfig {
        epochs: parse_or(matches, "epochs", defaults.epochs)?,
        batch_size: parse_or(matches, "batch-size", defaults.batch_size)?,
        learning_rate: parse_or(matches, "learning-rate", defaults.learning_rate)?,
        weight_decay: parse_or(matches, "weight-decay", defaults.weight_decay)?,
        warmup_epochs: parse_or(matches, "warmup-epochs", defaults.warmup_epochs)?,
        seed: matches
            .get_one::<String>("seed")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .map_err(|e| format!("Invalid value for --seed: {}", e))?,
    };

    let model = SpectralTranslator::new(translator_config, &device.to_device()?)?;
    print!("{}", utils::training_summary(&dataset, &model));
    println!("Device: {}", device);

    let mut trainer = Trainer::new(&model, &dataset, trainer_config)?;
    let start = Instant::now();
    trainer.fit(&model, &dataset)?;
    println!(
        "Training completed in {}",
        utils::format_time(start.elapsed().as_secs_f64())
    );
    print!("{}", utils::history_summary(trainer.history()));

    let output = required(matches, "output")?;
    TrainingBundle::capture(&model, &dataset, &trainer, columns).save(&model, output)?;
    println!(
        "Saved bundle to {} (weights in {})",
        output.display(),
        weights_path(output).display()
    );

    Ok(())
}

fn run_evaluate(matches: &ArgMatches) -> CliResult<()> {
    let bundle_path = required(matches, "bundle")?;
    let bundle = TrainingBundle::load(bundle_path)?;
    let columns = match matches.get_one::<String>("columns") {
        Some(spec) => utils::parse_columns(spec)?,
        None => bundle.parameter_columns.clone(),
    };
    let device: DeviceKind = parse_or(matches, "device", DeviceKind::Cpu)?;

    println!("Loading evaluation data...");
    let dataset = utils::load_dataset(
        dataset_files(matches)?,
        &columns,
        bundle.codec,
        Some(bundle.parameter_stats.clone()),
    )?;

    let model = SpectralTranslator::from_bundle(&bundle, bundle_path, &device.to_device()?)?;
    let evaluator = Evaluator::new(&model, &dataset)?;

    let predictions = match matches.get_one::<String>("index") {
        Some(raw) => {
            let idx = raw
                .parse::<usize>()
                .map_err(|e| format!("Invalid value for --index: {} ({})", raw, e))?;
            vec![evaluator.predict(idx)?]
        }
        None => evaluator.predict_all()?,
    };

    for prediction in &predictions {
        println!(
            "Sample {:>4}: reconstruction RMSE {:.6}",
            prediction.index,
            prediction.signal_error()?
        );
    }

    let output = required(matches, "output")?;
    let mut writer = BufWriter::new(File::create(output)?);
    serde_json::to_writer_pretty(&mut writer, &predictions)?;
    writer.flush()?;
    log::debug!("Wrote {} predictions", predictions.len());
    println!("Saved predictions to {}", output.display());

    Ok(())
}

fn main() {
    let matches = Command::new("Spectral Translator")
        .version(spectra_lib::VERSION)
        .about("Learn parameter-conditioned translations between signals in the frequency domain")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(train_command())
        .subcommand(evaluate_command())
        .get_matches();

    println!("Spectral Translator v{}", spectra_lib::VERSION);

    // Initialize the library
    spectra_lib::init();

    let result = match matches.subcommand() {
        Some(("train", sub)) => run_train(sub),
        Some(("evaluate", sub)) => run_evaluate(sub),
        _ => Err("Unknown command".into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> Command {
        Command::new("test")
            .subcommand(train_command())
            .subcommand(evaluate_command())
    }

    #[test]
    fn test_train_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "test", "train", "-i", "in.csv", "-t", "out.csv", "-p", "p.csv", "--epochs", "7",
                "--device", "cuda:1", "-o", "bundle.json",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();

        assert_eq!(parse_or(sub, "epochs", 50usize).unwrap(), 7);
        assert_eq!(parse_or(sub, "batch-size", 16usize).unwrap(), 16);
        assert_eq!(
            parse_or(sub, "device", DeviceKind::Cpu).unwrap(),
            DeviceKind::Cuda(1)
        );
        assert_eq!(required(sub, "output").unwrap(), Path::new("bundle.json"));
        assert_eq!(dataset_files(sub).unwrap().target, Path::new("out.csv"));
    }

    #[test]
    fn test_invalid_and_missing_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "test", "train", "-i", "a", "-t", "b", "-p", "c", "-o", "d", "--epochs", "many",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(parse_or(sub, "epochs", 50usize).is_err());

        assert!(cli()
            .try_get_matches_from(["test", "evaluate", "-i", "a", "-t", "b", "-p", "c", "-o", "d"])
            .is_err());
    }
}
