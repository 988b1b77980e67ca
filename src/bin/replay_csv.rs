use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mlrunner::csv_loader::{load_samples_from_csv, SampleUnits};
use mlrunner::{DataProcessor, ModelHeader, ProcessorConfig};

const USAGE: &str = "Uso: replay_csv [--config cfg.json] [--model model.bin] [--milli-g] <muestras.csv>";

struct ReplayOptions {
    csv_path: PathBuf,
    config_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    units: SampleUnits,
}

fn parse_args() -> Result<ReplayOptions> {
    let mut csv_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut model_path: Option<PathBuf> = None;
    let mut units = SampleUnits::G;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = Some(args.next().map(PathBuf::from).ok_or_else(|| anyhow!(USAGE))?)
            }
            "--model" => {
                model_path = Some(args.next().map(PathBuf::from).ok_or_else(|| anyhow!(USAGE))?)
            }
            "--milli-g" => units = SampleUnits::MilliG,
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV\n{}", USAGE))?;
    Ok(ReplayOptions {
        csv_path,
        config_path,
        model_path,
        units,
    })
}

fn load_config(path: &PathBuf) -> Result<ProcessorConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("No se pudo leer la configuración {:?}", path))?;
    serde_json::from_str(&json).with_context(|| format!("Configuración inválida en {:?}", path))
}

fn print_model(header: &ModelHeader<'_>) -> Result<()> {
    let engine = header.engine_model();
    println!("Modelo:");
    println!("  periodo de muestreo: {} ms", header.samples_period());
    println!("  longitud de ventana: {}", header.samples_length());
    println!("  dimensiones:         {}", header.sample_dimensions());
    println!("  entrada:             {:?} ({} valores)", engine.input_shape().collect::<Vec<_>>(), engine.input_len());
    println!("  salida:              {:?} ({} valores)", engine.output_shape().collect::<Vec<_>>(), engine.output_len());
    println!("  acciones:");
    for action in header.actions() {
        let action = action?;
        println!("    {:<20} umbral {:.2}", action.name(), action.threshold);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = parse_args()?;

    let model_bytes = match &opts.model_path {
        Some(path) => Some(fs::read(path).with_context(|| format!("No se pudo leer el modelo {:?}", path))?),
        None => None,
    };
    let header = match &model_bytes {
        Some(bytes) => {
            let header = ModelHeader::parse(bytes).context("Descriptor de modelo inválido")?;
            print_model(&header)?;
            Some(header)
        }
        None => None,
    };

    let config = match (&opts.config_path, &header) {
        (Some(path), header) => {
            let config = load_config(path)?;
            if let Some(header) = header {
                let expected = header.engine_model().input_len();
                if config.output_length != expected {
                    warn!(
                        output_length = config.output_length,
                        expected, "configuration does not match the model input"
                    );
                }
            }
            config
        }
        (None, Some(header)) => ProcessorConfig::for_model(header, &header.engine_model()),
        (None, None) => ProcessorConfig::default(),
    };

    let samples = load_samples_from_csv(&opts.csv_path, config.dimensions, opts.units)?;
    info!(
        path = ?opts.csv_path,
        samples = samples.len() / config.dimensions,
        "samples loaded"
    );

    let samples_length = config.samples_length;
    let dimensions = config.dimensions;
    let mut processor = DataProcessor::new(config)?;

    let mut windows = 0;
    for (idx, sample) in samples.chunks_exact(dimensions).enumerate() {
        processor.record(sample)?;
        if (idx + 1) % samples_length != 0 {
            continue;
        }

        let features = processor.feature_vector()?;
        windows += 1;
        let line: Vec<String> = features.iter().map(|v| format!("{:.6}", v)).collect();
        println!("ventana {:>4} (muestra {:>6}): {}", windows, idx + 1, line.join(","));
    }

    if windows == 0 {
        println!(
            "No se completó ninguna ventana ({} muestras, se necesitan {})",
            samples.len() / dimensions,
            samples_length
        );
    }

    Ok(())
}
