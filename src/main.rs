use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use density_histogram::{
    ComputeContext, ComputeContextConfig, HistogramConfig, HistogramError, HistogramOutput,
    OutOfRangePolicy, export, fatal, grid, histogram, reference,
};
use env_logger::Env;

#[derive(Debug, Default, Clone)]
struct Cli {
    input: Option<PathBuf>,
    config: Option<PathBuf>,
    bins: Option<u32>,
    color_scaler: Option<f32>,
    policy: Option<OutOfRangePolicy>,
    output: Option<PathBuf>,
    density_png: Option<PathBuf>,
    cpu: bool,
}

const USAGE: &str = "supported: --input <grid.json|image.png>, --config <config.json>, --bins <n>, \
--color-scaler <s>, --policy <reject|clamp|skip>, --output <result.json>, --density-png <out.png>, --cpu";

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing value for {flag}"))
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--cpu" => {
                cli.cpu = true;
                i += 1;
            }
            "--input" => {
                cli.input = Some(PathBuf::from(flag_value(args, i, "--input")?));
                i += 2;
            }
            "--config" => {
                cli.config = Some(PathBuf::from(flag_value(args, i, "--config")?));
                i += 2;
            }
            "--bins" => {
                let v = flag_value(args, i, "--bins")?;
                cli.bins = Some(v.parse::<u32>().map_err(|e| anyhow!("invalid --bins {v}: {e}"))?);
                i += 2;
            }
            "--color-scaler" => {
                let v = flag_value(args, i, "--color-scaler")?;
                cli.color_scaler =
                    Some(v.parse::<f32>().map_err(|e| anyhow!("invalid --color-scaler {v}: {e}"))?);
                i += 2;
            }
            "--policy" => {
                cli.policy = Some(flag_value(args, i, "--policy")?.parse()?);
                i += 2;
            }
            "--output" => {
                cli.output = Some(PathBuf::from(flag_value(args, i, "--output")?));
                i += 2;
            }
            "--density-png" => {
                cli.density_png = Some(PathBuf::from(flag_value(args, i, "--density-png")?));
                i += 2;
            }
            other => {
                return Err(anyhow!("unknown argument: {other} ({USAGE})"));
            }
        }
    }
    Ok(cli)
}

fn build_config(cli: &Cli) -> Result<HistogramConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => HistogramConfig::load(path)?,
        None => HistogramConfig::default(),
    };
    if let Some(bins) = cli.bins {
        config.bin_count = bins;
    }
    if let Some(scaler) = cli.color_scaler {
        config.color_scaler = scaler;
    }
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }
    if cli.density_png.is_some() {
        config.colorize = true;
    }
    config.validate()?;
    Ok(config)
}

/// Domain errors go back to the caller; device failures abort like a failed runtime check.
fn device_checked<T>(result: Result<T, HistogramError>) -> Result<T> {
    match result {
        Err(err) if !err.is_device_error() => Err(err.into()),
        other => Ok(fatal::or_abort(other)),
    }
}

fn run_on_gpu(grid: &grid::Grid, config: &HistogramConfig) -> Result<HistogramOutput> {
    let ctx = device_checked(ComputeContext::new(ComputeContextConfig::default()))?;
    eprintln!("[histogram] adapter: {}", ctx.adapter_info.name);
    device_checked(histogram(&ctx, grid, config))
}

fn write_results(cli: &Cli, output: &HistogramOutput) -> Result<()> {
    match cli.output.as_deref() {
        Some(path) => {
            export::write_json(output, path)?;
            eprintln!("[histogram] saved: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(output)?),
    }
    if let Some(path) = cli.density_png.as_deref() {
        export::write_density_png(output, path)?;
        eprintln!("[histogram] saved: {}", path.display());
    }
    Ok(())
}

fn run(cli: &Cli, input: &Path) -> Result<()> {
    let config = build_config(cli)?;
    let grid = grid::load_grid_from_path(input)?;
    eprintln!(
        "[histogram] {}: {}x{} grid, {} bins, color scaler {}, policy {}",
        input.display(),
        grid.width(),
        grid.height(),
        config.bin_count,
        config.color_scaler,
        config.policy
    );

    let output = if cli.cpu {
        reference::histogram(&grid, &config)?
    } else {
        run_on_gpu(&grid, &config)?
    };

    if output.counted() != u64::from(output.total) {
        log::warn!(
            "{} of {} samples fell outside the bin range and were skipped",
            u64::from(output.total) - output.counted(),
            output.total
        );
    }
    write_results(cli, &output)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    let input = cli
        .input
        .clone()
        .ok_or_else(|| anyhow!("missing --input ({USAGE})"))?;
    run(&cli, &input)
}
