//! Command-line client: train an MLP service on exchange-format files, or
//! delete a service.

use std::path::PathBuf;

use ddmlp::config::{self, ClientConfig};
use ddmlp::dd::{ClearMode, DdCalls};
use ddmlp::logging::{self, Console, LogOptions};
use ddmlp::mlp::{GenericMlp, TrainProgress};

fn main() {
    if let Err(err) = logging::init_with(log_options()) {
        eprintln!("Logging disabled: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so predictions printed on stdout stay machine-readable.
fn log_options() -> LogOptions {
    LogOptions {
        console: Console::Stderr,
        ..LogOptions::default()
    }
}

fn run() -> Result<(), String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return Err(help_text());
    }
    let command = args.remove(0);
    match command.as_str() {
        "fit" => run_fit(parse_fit_args(args)?),
        "delete" => run_delete(parse_delete_args(args)?),
        "-h" | "--help" | "help" => {
            println!("{}", help_text());
            Ok(())
        }
        other => Err(format!("Unknown command: {other}\n\n{}", help_text())),
    }
}

#[derive(Debug, Default)]
struct FitArgs {
    data: Vec<String>,
    sname: Option<String>,
    nclasses: Option<usize>,
    iterations: Option<u32>,
    learning_rate: Option<f64>,
    batch: Option<u32>,
    layers: Option<Vec<usize>>,
    gpu: bool,
    repository: Option<PathBuf>,
    predict: Option<String>,
    config: Option<PathBuf>,
}

#[derive(Debug)]
struct DeleteArgs {
    sname: String,
    clear: ClearMode,
    config: Option<PathBuf>,
}

fn run_fit(args: FitArgs) -> Result<(), String> {
    let config = load_config(args.config.as_ref())?;
    let mut service = config.service.clone();
    if let Some(name) = args.sname {
        service.name = Some(name);
    }
    if let Some(nclasses) = args.nclasses {
        service.nclasses = Some(nclasses);
    }
    if let Some(layers) = args.layers {
        service.layers = layers;
    }
    if args.gpu {
        service.gpu = true;
    }
    if let Some(repository) = args.repository {
        service.repository = Some(repository);
    }
    let mut options = config.fit.clone();
    if let Some(iterations) = args.iterations {
        options.iterations = iterations;
    }
    if let Some(base_lr) = args.learning_rate {
        options.base_lr = base_lr;
    }
    if let Some(batch) = args.batch {
        options.batch_size = batch;
    }

    let mut mlp = GenericMlp::connect(&config, service).map_err(|err| err.to_string())?;
    eprintln!("Service {} ready", mlp.service_name());
    let mut progress = |update: &TrainProgress<'_>| {
        let iteration = update
            .measure
            .and_then(|measure| measure.get("iteration"))
            .map(|value| value.to_string())
            .unwrap_or_else(|| "?".to_string());
        eprintln!("poll {}: iteration {iteration}", update.attempt);
    };
    let outcome = mlp
        .fit_with_progress(args.data, &options, Some(&mut progress))
        .map_err(|err| err.to_string())?;
    eprintln!(
        "Training ended in state {:?} after {} status request(s)",
        outcome.state, outcome.polls
    );
    if let Some(measure) = outcome.response.measure() {
        for (key, value) in measure {
            eprintln!("  {key}: {value}");
        }
    }

    if let Some(path) = args.predict {
        let classes = mlp.predict(&path).map_err(|err| err.to_string())?;
        for class in classes.column(0) {
            println!("{class}");
        }
    }
    Ok(())
}

fn run_delete(args: DeleteArgs) -> Result<(), String> {
    let config = load_config(args.config.as_ref())?;
    let client = config.dd_client().map_err(|err| err.to_string())?;
    let response = client
        .delete_service(&args.sname, args.clear)
        .map_err(|err| err.to_string())?;
    if response.is_error() {
        return Err(format!(
            "Delete of {} failed with status {}: {}",
            args.sname,
            response.code(),
            response.message()
        ));
    }
    println!("Deleted service {} (clear={})", args.sname, args.clear.as_str());
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig, String> {
    match path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())
}

fn parse_fit_args(args: Vec<String>) -> Result<FitArgs, String> {
    let mut parsed = FitArgs::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                parsed.data.push(value.clone());
            }
            "--sname" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--sname requires a value".to_string())?;
                parsed.sname = Some(value.clone());
            }
            "--nclasses" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--nclasses requires a value".to_string())?;
                parsed.nclasses = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --nclasses value: {value}"))?,
                );
            }
            "--iterations" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--iterations requires a value".to_string())?;
                parsed.iterations = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("Invalid --iterations value: {value}"))?,
                );
            }
            "--learning-rate" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--learning-rate requires a value".to_string())?;
                parsed.learning_rate = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --learning-rate value: {value}"))?,
                );
            }
            "--batch" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--batch requires a value".to_string())?;
                parsed.batch = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("Invalid --batch value: {value}"))?,
                );
            }
            "--layers" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--layers requires a value".to_string())?;
                parsed.layers = Some(parse_layers(value)?);
            }
            "--gpu" => parsed.gpu = true,
            "--repository" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--repository requires a value".to_string())?;
                parsed.repository = Some(PathBuf::from(value));
            }
            "--predict" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--predict requires a value".to_string())?;
                parsed.predict = Some(value.clone());
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                parsed.config = Some(PathBuf::from(value));
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    if parsed.data.is_empty() {
        return Err(format!("fit needs at least one --data file\n\n{}", help_text()));
    }
    Ok(parsed)
}

fn parse_delete_args(args: Vec<String>) -> Result<DeleteArgs, String> {
    let mut sname = None;
    let mut clear = ClearMode::default();
    let mut config = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--sname" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--sname requires a value".to_string())?;
                sname = Some(value.clone());
            }
            "--clear" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--clear requires a value".to_string())?;
                clear = ClearMode::parse(value)
                    .ok_or_else(|| format!("Invalid --clear value: {value} (mem|lib|full)"))?;
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    let sname = sname.ok_or_else(|| format!("delete needs --sname\n\n{}", help_text()))?;
    Ok(DeleteArgs {
        sname,
        clear,
        config,
    })
}

fn parse_layers(value: &str) -> Result<Vec<usize>, String> {
    let layers = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| format!("Invalid --layers value: {value}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if layers.is_empty() {
        return Err(format!("Invalid --layers value: {value}"));
    }
    Ok(layers)
}

fn help_text() -> String {
    [
        "ddmlp fit --data <file.svm> [--data <file.svm> ...] [options]",
        "  --sname <name>          Service name (generated when omitted)",
        "  --nclasses <k>          Number of classes",
        "  --iterations <n>        Solver iterations",
        "  --learning-rate <f>     Base learning rate",
        "  --batch <n>             Batch size",
        "  --layers <a,b,...>      Hidden layer sizes",
        "  --gpu                   Train on GPU",
        "  --repository <dir>      Model repository on the server host",
        "  --predict <file.svm>    Print one predicted class per line after training",
        "  --config <file.toml>    Config file (default: .ddmlp/ddmlp.toml)",
        "",
        "ddmlp delete --sname <name> [--clear mem|lib|full] [--config <file.toml>]",
    ]
    .join("\n")
}
