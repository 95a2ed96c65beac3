extern crate chrono;
extern crate clap;
extern crate fern;
#[macro_use]
extern crate log;
extern crate regex;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate tempdir;
extern crate thiserror;

mod benchmarks;
mod perfbench;

use benchmarks::PerformanceRunner;
use perfbench::error::{Error, Result};
use perfbench::params::Params;

fn main() {
    // Enable backtraces
    ::std::env::set_var("RUST_BACKTRACE", "1");
    setup_logger().expect("failed to setup logger");

    let matches = clap::App::new("Storage Performance Benchmark")
        .version("0.1")
        .about("Runs IOR and mdtest performance tests against a DFS cluster")
        .arg(
            clap::Arg::with_name("CONFIG")
                .short("c")
                .long("config")
                .help("Path to the JSON test configuration")
                .takes_value(true)
                .required(true),
        )
        .arg(
            clap::Arg::with_name("TEST")
                .short("t")
                .long("test")
                .help("Test case to run (ior-easy, ior-hard, mdtest-hard)")
                .takes_value(true)
                .required(true),
        )
        .arg(
            clap::Arg::with_name("VARIANT")
                .short("v")
                .long("variant")
                .help("Test variant (default = 'dfs-sx')")
                .takes_value(true),
        )
        .arg(
            clap::Arg::with_name("NO_INTERCEPT")
                .long("no-intercept")
                .help("Run dfuse tests without the I/O interception library"),
        )
        .get_matches();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        ::std::process::exit(1);
    }
}

fn run(matches: &clap::ArgMatches) -> Result<()> {
    let config = matches.value_of("CONFIG").expect("CONFIG is required");
    let test = matches.value_of("TEST").expect("TEST is required");
    let variant = matches.value_of("VARIANT").unwrap_or("dfs-sx");
    let use_intercept = !matches.is_present("NO_INTERCEPT");

    let params = Params::load(config)?;
    let mut context: benchmarks::RunContext = params.section("context")?;
    if context.test_id.is_empty() {
        context.test_id = format!("{}.{}", test, variant);
    }

    let mut runner = PerformanceRunner::new(&params, context)?;
    let result = dispatch(&mut runner, test, variant, use_intercept);
    if result.is_err() {
        // Best-effort cleanup; the original error is the one to report.
        if let Err(cleanup) = runner.teardown() {
            warn!("cleanup failed: {}", cleanup);
        }
    }
    result
}

fn dispatch(
    runner: &mut PerformanceRunner,
    test: &str,
    variant: &str,
    use_intercept: bool,
) -> Result<()> {
    match test {
        // ior-easy and ior-hard share namespaces; the config file supplies
        // the easy/hard flag sets and geometry.
        "ior-easy" | "ior-hard" => {
            let ns = ior_namespace(variant)?;
            runner.run_performance_ior(Some(&ns), use_intercept)
        }
        "mdtest-hard" => {
            let ns = mdtest_namespace(variant)?;
            runner.run_performance_mdtest(Some(&ns))
        }
        other => Err(Error::Configuration(format!(
            "unknown test case '{}'",
            other
        ))),
    }
}

fn ior_namespace(variant: &str) -> Result<String> {
    match variant {
        "dfs-sx" => Ok("/run/ior_dfs_sx/*".to_string()),
        "dfs-ec-16p2gx" => Ok("/run/ior_dfs_ec_16p2gx/*".to_string()),
        "dfuse-sx" => Ok("/run/ior_dfuse_sx/*".to_string()),
        "dfuse-ec-16p2gx" => Ok("/run/ior_dfuse_ec_16p2gx/*".to_string()),
        other => Err(Error::Configuration(format!(
            "unknown ior variant '{}'",
            other
        ))),
    }
}

fn mdtest_namespace(variant: &str) -> Result<String> {
    match variant {
        "dfs-sx" => Ok("/run/mdtest_dfs_sx/*".to_string()),
        "dfs-ec-16p2gx" => Ok("/run/mdtest_dfs_ec_16p2gx/*".to_string()),
        other => Err(Error::Configuration(format!(
            "unknown mdtest variant '{}'",
            other
        ))),
    }
}

fn setup_logger() -> ::std::result::Result<(), fern::InitError> {
    use fern::colors::{Color, ColoredLevelConfig};
    fern::Dispatch::new()
        .format(|out, message, record| {
            let colors = ColoredLevelConfig::new()
                .info(Color::Green)
                .warn(Color::Yellow);
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ior_namespace, mdtest_namespace};

    #[test]
    fn variants_map_to_namespaces() {
        assert_eq!(ior_namespace("dfs-sx").unwrap(), "/run/ior_dfs_sx/*");
        assert_eq!(
            ior_namespace("dfuse-ec-16p2gx").unwrap(),
            "/run/ior_dfuse_ec_16p2gx/*"
        );
        assert_eq!(
            mdtest_namespace("dfs-sx").unwrap(),
            "/run/mdtest_dfs_sx/*"
        );
    }

    #[test]
    fn unknown_variants_are_rejected() {
        assert!(ior_namespace("dfs-xyz").is_err());
        assert!(mdtest_namespace("dfuse-sx").is_err());
    }
}
