use std::path::Path;
use std::process;
use std::time::Instant;

use bytesize::{ByteSize, MIB};
use clap::ArgEnum;
use env_logger;
use log;

use polysort::{generate, PolyphaseSorterBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    match arg_parser.subcommand() {
        Some(("generate", args)) => generate_cmd(args),
        Some(("sort", args)) => sort_cmd(args),
        _ => process::exit(1),
    }
}

fn generate_cmd(args: &clap::ArgMatches) {
    let file = args.value_of("file").expect("value is required");
    let size_mb: u64 = args.value_of_t_or_exit("size");

    if let Err(err) = generate::generate(Path::new(file), size_mb * MIB) {
        log::error!("test file generation error: {}", err);
        process::exit(1);
    }
}

fn sort_cmd(args: &clap::ArgMatches) {
    let input = args.value_of("file").expect("value is required");
    let output = args.value_of("output").expect("value is required");
    let memory_mb: u64 = args.value_of_t_or_exit("memory");
    let budget = memory_mb * MIB;

    let mut sorter_builder = PolyphaseSorterBuilder::new().with_memory_budget(budget);
    if let Some(tmp_dir) = args.value_of("tmp_dir") {
        sorter_builder = sorter_builder.with_tmp_dir(Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    log::info!("sorting {} with a {} memory budget", input, ByteSize(budget));
    let started = Instant::now();

    match sorter.sort(Path::new(input), Path::new(output)) {
        Ok(metrics) => log::info!(
            "sorting took {} ms ({} runs, {} merge passes), result in {}",
            started.elapsed().as_millis(),
            metrics.run_count,
            metrics.merge_passes,
            output,
        ),
        Err(err) => {
            log::error!("sorting error: {}", err);
            process::exit(1);
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    build_app().get_matches()
}

fn build_app() -> clap::App<'static> {
    clap::App::new("polysort")
        .about("polyphase external merge sort for newline-delimited integers")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .global(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .subcommand(
            clap::App::new("generate")
                .about("generate a test file of random integers")
                .arg(
                    clap::Arg::new("file")
                        .help("file to be generated")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("size")
                        .help("target file size in MiB")
                        .required(true)
                        .takes_value(true)
                        .validator(validate_u64),
                ),
        )
        .subcommand(
            clap::App::new("sort")
                .about("sort a file of newline-delimited integers")
                .arg(
                    clap::Arg::new("file")
                        .help("file to be sorted")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("memory")
                        .help("memory budget in MiB")
                        .required(true)
                        .takes_value(true)
                        .validator(validate_u64),
                )
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("result file")
                        .takes_value(true)
                        .default_value("sorted.txt"),
                )
                .arg(
                    clap::Arg::new("tmp_dir")
                        .short('d')
                        .long("tmp-dir")
                        .help("directory to be used to store temporary data")
                        .takes_value(true),
                ),
        )
}

fn validate_u64(value: &str) -> Result<(), String> {
    match value.parse::<u64>() {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}

#[cfg(test)]
mod test {
    use super::{build_app, LogLevel};

    #[test]
    fn test_log_level_values() {
        let values: Vec<_> = LogLevel::possible_values().collect();
        assert_eq!(values.len(), 6);

        assert!(matches!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug)));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_version_flag() {
        let err = build_app()
            .try_get_matches_from(["polysort", "--version"])
            .unwrap_err();
        assert_eq!(err.kind, clap::ErrorKind::DisplayVersion);
    }
}
