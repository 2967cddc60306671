// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::debug;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fractalbench::harness::{BenchmarkHarness, Fractal, Job, Sweep};
use fractalbench::metrics::{CsvMetrics, MemoryMetrics, MetricsSink, RunRecord};
use fractalbench::render::PngSink;
use fractalbench::{
    julia, transforms, ChaosSettings, Device, DeviceConfig, EscapeSettings, FractalError, Strategy,
};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_list<T: FromStr>(s: &str) -> Option<Vec<T>> {
    s.split(',').map(|v| T::from_str(v.trim()).ok()).collect()
}

fn validate_size(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<u16>(s, separator) {
        Some((0, _)) | Some((_, 0)) => Err("Image size must be at least 1x1".to_string()),
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_positive(s: &str, err: &str) -> Result<(), String> {
    match f64::from_str(s) {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(()),
        _ => Err(err.to_string()),
    }
}

fn validate_list(s: &str, err: &str) -> Result<(), String> {
    match parse_list::<usize>(s) {
        Some(ref v) if !v.is_empty() && v.iter().all(|n| *n > 0) => Ok(()),
        _ => Err(err.to_string()),
    }
}

const NAME: &str = "name";
const SET: &str = "set";
const POINTS: &str = "points";
const SIZE: &str = "size";
const SIZES: &str = "sizes";
const WIDTH: &str = "width";
const ITERATIONS: &str = "iterations";
const DIVERGENCE: &str = "divergence";
const PASSES: &str = "passes";
const SEED: &str = "seed";
const STRATEGY: &str = "strategy";
const BLOCK_SIZE: &str = "block-size";
const THREADS: &str = "threads";
const CPU_OUTPUT: &str = "cpu-output";
const GPU_OUTPUT: &str = "gpu-output";
const IMAGES: &str = "images";
const METRICS: &str = "metrics";

fn device_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    let max_threads = num_cpus::get() * 4;
    cmd.arg(
        Arg::with_name(BLOCK_SIZE)
            .long(BLOCK_SIZE)
            .short("b")
            .takes_value(true)
            .default_value("64")
            .validator(|s| {
                validate_range(
                    &s,
                    1,
                    1024,
                    "Could not parse block size",
                    "Block size must be between 1 and 1024",
                )
            })
            .help("Lanes per block on the parallel device"),
    )
    .arg(
        Arg::with_name(THREADS)
            .long(THREADS)
            .short("t")
            .takes_value(true)
            .validator(move |s| {
                validate_range(
                    &s,
                    1,
                    max_threads,
                    "Could not parse thread count",
                    &format!("Thread count must be between 1 and {}", max_threads),
                )
            })
            .help("Threads the parallel device spreads blocks over [default: all CPUs]"),
    )
    .arg(
        Arg::with_name(METRICS)
            .long(METRICS)
            .short("m")
            .takes_value(true)
            .help("CSV file timing rows are appended to"),
    )
}

fn output_args<'a, 'b>(cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.arg(
        Arg::with_name(STRATEGY)
            .long(STRATEGY)
            .takes_value(true)
            .possible_values(&["cpu", "gpu", "both"])
            .default_value("both")
            .help("Which strategies to run"),
    )
    .arg(
        Arg::with_name(CPU_OUTPUT)
            .long(CPU_OUTPUT)
            .takes_value(true)
            .help("PNG file for the sequential result"),
    )
    .arg(
        Arg::with_name(GPU_OUTPUT)
            .long(GPU_OUTPUT)
            .takes_value(true)
            .help("PNG file for the parallel result"),
    )
}

fn passes_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name(PASSES)
        .long(PASSES)
        .takes_value(true)
        .default_value("15")
        .validator(|s| {
            validate_range(
                &s,
                0,
                10_000,
                "Could not parse pass count",
                "Pass count must be between 0 and 10000",
            )
        })
        .help("Extra parallel kernel passes after the first")
}

fn args<'a>() -> ArgMatches<'a> {
    let ifs = SubCommand::with_name("ifs")
        .about("Chaos-game attractor of an Iterated Function System")
        .arg(
            Arg::with_name(NAME)
                .required(true)
                .long(NAME)
                .short("n")
                .takes_value(true)
                .possible_values(&transforms::NAMES)
                .help("Transform table"),
        )
        .arg(
            Arg::with_name(POINTS)
                .long(POINTS)
                .short("p")
                .takes_value(true)
                .default_value("100000")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        50_000_000,
                        "Could not parse point count",
                        "Point count must be between 1 and 50000000",
                    )
                })
                .help("Number of points in the fractal"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("600x600")
                .validator(|s| validate_size(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(passes_arg())
        .arg(
            Arg::with_name(SEED)
                .long(SEED)
                .takes_value(true)
                .validator(|s| {
                    u64::from_str(&s)
                        .map(|_| ())
                        .map_err(|_| "Could not parse seed".to_string())
                })
                .help("Seed for the sequential strategy's random numbers"),
        );

    let julia = SubCommand::with_name("julia")
        .about("Escape-time Julia set of z^2 + c")
        .arg(
            Arg::with_name(SET)
                .long(SET)
                .takes_value(true)
                .default_value("1")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        julia::NAMES.len(),
                        "Could not parse constant number",
                        &format!("Constant number must be between 1 and {}", julia::NAMES.len()),
                    )
                })
                .help("Which Julia constant to use"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("200")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Iteration budget per cell"),
        )
        .arg(
            Arg::with_name(DIVERGENCE)
                .long(DIVERGENCE)
                .short("d")
                .takes_value(true)
                .default_value("10")
                .validator(|s| validate_positive(&s, "Divergence value must be a positive number"))
                .help("Magnitude past which a point has escaped"),
        )
        .arg(
            Arg::with_name(WIDTH)
                .long(WIDTH)
                .short("w")
                .takes_value(true)
                .default_value("300")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        16_384,
                        "Could not parse width",
                        "Width must be between 1 and 16384",
                    )
                })
                .help("Width of the grid, which is also its height"),
        );

    let sweep = SubCommand::with_name("sweep")
        .about("Every IFS table over a grid of point counts and image sizes")
        .arg(
            Arg::with_name(POINTS)
                .long(POINTS)
                .short("p")
                .takes_value(true)
                .default_value("10000,50000,100000,150000,200000,300000")
                .validator(|s| validate_list(&s, "Could not parse point counts"))
                .help("Comma-separated point counts"),
        )
        .arg(
            Arg::with_name(SIZES)
                .long(SIZES)
                .short("s")
                .takes_value(true)
                .default_value("300,600,1200")
                .validator(|s| validate_list(&s, "Could not parse image sizes"))
                .help("Comma-separated square image sizes"),
        )
        .arg(
            Arg::with_name(NAME)
                .long(NAME)
                .short("n")
                .takes_value(true)
                .multiple(true)
                .use_delimiter(true)
                .possible_values(&transforms::NAMES)
                .help("Transform tables to run [default: all]"),
        )
        .arg(passes_arg())
        .arg(
            Arg::with_name(IMAGES)
                .long(IMAGES)
                .takes_value(true)
                .help("Directory the images are written to"),
        );

    App::new("fractalbench")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Sequential versus parallel fractal generation")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(output_args(device_args(ifs)))
        .subcommand(output_args(device_args(julia)))
        .subcommand(device_args(sweep))
        .get_matches()
}

fn value<T: FromStr>(m: &ArgMatches, name: &str) -> Result<T, FractalError> {
    m.value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| FractalError::config(format!("could not parse --{}", name)))
}

fn device(m: &ArgMatches) -> Result<Device, FractalError> {
    let mut config = DeviceConfig::default();
    config.block_size = value(m, BLOCK_SIZE)?;
    if m.is_present(THREADS) {
        config.partitions = value(m, THREADS)?;
    }
    let device = Device::new(config)?;
    debug!("device: {:?}", device.config());
    Ok(device)
}

fn job(m: &ArgMatches, fractal: Fractal) -> Result<Job, FractalError> {
    let mut job = Job::new(fractal);
    job.strategies = match m.value_of(STRATEGY).unwrap_or("both") {
        "both" => vec![Strategy::Sequential, Strategy::Parallel],
        single => vec![Strategy::from_str(single)?],
    };
    job.cpu_output = m.value_of(CPU_OUTPUT).map(PathBuf::from);
    job.gpu_output = m.value_of(GPU_OUTPUT).map(PathBuf::from);
    Ok(job)
}

fn ifs_job(m: &ArgMatches) -> Result<Job, FractalError> {
    let (width, height) = m
        .value_of(SIZE)
        .and_then(|s| parse_pair::<usize>(s, 'x'))
        .ok_or_else(|| FractalError::config("could not parse --size"))?;
    let settings = ChaosSettings {
        num_points: value(m, POINTS)?,
        passes: value(m, PASSES)?,
        seed: match m.value_of(SEED) {
            Some(_) => Some(value(m, SEED)?),
            None => None,
        },
        ..ChaosSettings::default()
    };
    let name = m.value_of(NAME).unwrap_or_default();
    job(m, Fractal::ifs(name, settings, width, height)?)
}

fn julia_job(m: &ArgMatches) -> Result<Job, FractalError> {
    let width = value(m, WIDTH)?;
    let settings = EscapeSettings {
        max_iterations: value(m, ITERATIONS)?,
        divergence: value(m, DIVERGENCE)?,
        width,
        height: width,
        ..EscapeSettings::default()
    };
    job(m, Fractal::julia(value(m, SET)?, settings)?)
}

fn sweep(m: &ArgMatches) -> Result<Sweep, FractalError> {
    let list = |name: &str| {
        m.value_of(name)
            .and_then(parse_list::<usize>)
            .ok_or_else(|| FractalError::config(format!("could not parse --{}", name)))
    };
    let mut sweep = Sweep {
        points: list(POINTS)?,
        sizes: list(SIZES)?,
        passes: value(m, PASSES)?,
        image_dir: m.value_of(IMAGES).map(PathBuf::from),
        ..Sweep::default()
    };
    if let Some(names) = m.values_of(NAME) {
        sweep.names = names.map(|n| n.to_string()).collect();
    }
    Ok(sweep)
}

fn seconds(d: Option<Duration>) -> String {
    d.map(|d| format!("{:.4}s", d.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string())
}

fn report(record: &RunRecord) {
    let speedup = record
        .speedup()
        .map(|s| format!("{:.2}x", s))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<12} count {:>9}  {:>5}x{:<5} block {:>4}  cpu {:>10}  gpu {:>10}  speedup {}",
        record.fractal,
        record.count,
        record.width,
        record.height,
        record.block_size,
        seconds(record.cpu),
        seconds(record.gpu),
        speedup
    );
}

fn metrics_sink(m: &ArgMatches) -> Box<dyn MetricsSink> {
    match m.value_of(METRICS) {
        Some(path) => {
            let sink = CsvMetrics::new(path);
            debug!("appending timings to {}", sink.path().display());
            Box::new(sink)
        }
        None => Box::new(MemoryMetrics::default()),
    }
}

fn run(matches: &ArgMatches) -> Result<(), FractalError> {
    let (command, m) = match matches.subcommand() {
        (command, Some(m)) => (command, m),
        _ => return Err(FractalError::config("no command given")),
    };

    let device = device(m)?;
    let mut images = PngSink::default();
    let mut metrics = metrics_sink(m);
    let mut harness = BenchmarkHarness::new(&device, &mut images, metrics.as_mut());

    let records = match command {
        "ifs" => vec![harness.run(&ifs_job(m)?)?],
        "julia" => vec![harness.run(&julia_job(m)?)?],
        "sweep" => harness.sweep(&sweep(m)?)?,
        other => return Err(FractalError::config(format!("unknown command {}", other))),
    };
    for record in &records {
        report(record);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
