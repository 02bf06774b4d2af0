//! `splatlod` command line tool
//!
//! Reads a PLY point cloud or splat file, reduces it and writes the result in
//! the input's encoding.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use splatlod_io::{read_point_set, write_point_set};
use splatlod_reduction::{LodConfig, LodEngine, Reducer, ReductionStrategy};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keep a uniform random fraction of the points
    Subsample {
        #[arg(value_name = "INPUT")]
        /// The input .ply file
        input: PathBuf,

        #[arg(value_name = "KEEP_RATIO", allow_negative_numbers = true)]
        /// Fraction of points to keep, between 0 and 1
        keep_ratio: f64,

        #[arg(value_name = "OUTPUT")]
        /// The output .ply file
        output: PathBuf,

        #[arg(long)]
        /// Seed for a reproducible selection
        seed: Option<u64>,
    },

    /// Merge all points that fall into the same voxel
    Merge {
        #[arg(value_name = "INPUT")]
        /// The input .ply file
        input: PathBuf,

        #[arg(value_name = "VOXEL_SIZE", allow_negative_numbers = true)]
        /// Edge length of a voxel, in input units
        voxel_size: f64,

        #[arg(value_name = "OUTPUT")]
        /// The output .ply file
        output: PathBuf,

        #[arg(long, value_name = "REDUCER")]
        /// How scalar attributes are combined: mean, first or mode
        numeric: Option<Reducer>,

        #[arg(long, value_name = "REDUCER")]
        /// How list attributes are combined: mean, first or mode
        other: Option<Reducer>,

        #[arg(long = "attribute", value_name = "NAME=REDUCER", value_parser = parse_override)]
        /// Reducer for one named attribute. May be repeated.
        overrides: Vec<(String, Reducer)>,

        #[arg(long)]
        /// Leave merged normals at their averaged length
        no_renormalize: bool,
    },
}

#[derive(Parser, Debug)]
#[command(name = "splatlod", version, about, long_about = None)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE")]
    /// TOML configuration; command line options take precedence
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    /// Run on a single thread
    sequential: bool,

    #[arg(long, global = true)]
    /// Print the reduction summary as JSON on stdout
    summary_json: bool,

    #[arg(short, long, global = true)]
    /// Log debug output
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// What a single invocation will do
#[derive(Debug)]
struct Job {
    config: LodConfig,
    input: PathBuf,
    output: PathBuf,
}

fn parse_override(arg: &str) -> Result<(String, Reducer)> {
    let Some((name, reducer)) = arg.split_once('=') else {
        bail!("expected NAME=REDUCER, got '{}'", arg);
    };
    if name.is_empty() {
        bail!("attribute name is empty in '{}'", arg);
    }
    Ok((name.to_string(), reducer.parse()?))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Layer the command line over the configuration file
fn build_job(cli: Cli) -> Result<Job> {
    let mut config = match &cli.config {
        Some(path) => LodConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => LodConfig::default(),
    };
    if cli.sequential {
        config.parallel = false;
    }

    let (input, output) = match cli.command {
        Commands::Subsample {
            input,
            keep_ratio,
            output,
            seed,
        } => {
            config.strategy = ReductionStrategy::Subsample { keep_ratio };
            if seed.is_some() {
                config.seed = seed;
            }
            (input, output)
        }
        Commands::Merge {
            input,
            voxel_size,
            output,
            numeric,
            other,
            overrides,
            no_renormalize,
        } => {
            config.strategy = ReductionStrategy::VoxelMerge { voxel_size };
            if let Some(reducer) = numeric {
                config.policy.numeric = reducer;
            }
            if let Some(reducer) = other {
                config.policy.other = reducer;
            }
            config.policy.overrides.extend(overrides);
            if no_renormalize {
                config.renormalize_normals = false;
            }
            (input, output)
        }
    };

    config.validate().context("invalid reduction parameters")?;
    Ok(Job {
        config,
        input,
        output,
    })
}

fn run(job: &Job, summary_json: bool) -> Result<()> {
    let ply = read_point_set(&job.input)
        .with_context(|| format!("failed to read {}", job.input.display()))?;
    info!("Total splats: {}", ply.points.len());

    let engine = LodEngine::from_config(&job.config);
    let reduction = engine
        .reduce(&ply.points, &job.config.strategy)
        .with_context(|| format!("failed to reduce {}", job.input.display()))?;

    write_output(&reduction.points, ply.encoding, &job.output)?;
    info!(
        "Saved {} points to {} ({})",
        reduction.points.len(),
        job.output.display(),
        if ply.encoding.is_binary() {
            "binary"
        } else {
            "ascii"
        }
    );

    if summary_json {
        println!("{}", serde_json::to_string_pretty(&reduction.summary)?);
    }
    Ok(())
}

fn write_output(
    points: &splatlod_core::PointSet,
    encoding: splatlod_io::PlyEncoding,
    path: &Path,
) -> Result<()> {
    write_point_set(points, encoding, path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let summary_json = cli.summary_json;
    let job = build_job(cli)?;
    run(&job, summary_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use splatlod_core::PointSet;
    use splatlod_io::PlyEncoding;
    use tempfile::tempdir;

    fn job_from(args: &[&str]) -> Result<Job> {
        build_job(Cli::try_parse_from(args)?)
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subsample_arguments() {
        let job = job_from(&[
            "splatlod",
            "subsample",
            "in.ply",
            "0.25",
            "out.ply",
            "--seed",
            "7",
        ])
        .unwrap();
        assert_eq!(
            job.config.strategy,
            ReductionStrategy::Subsample { keep_ratio: 0.25 }
        );
        assert_eq!(job.config.seed, Some(7));
        assert!(job.config.parallel);
        assert_eq!(job.input, PathBuf::from("in.ply"));
        assert_eq!(job.output, PathBuf::from("out.ply"));
    }

    #[test]
    fn test_merge_arguments() {
        let job = job_from(&[
            "splatlod",
            "--sequential",
            "merge",
            "in.ply",
            "0.01",
            "out.ply",
            "--numeric",
            "mode",
            "--attribute",
            "opacity=first",
            "--no-renormalize",
        ])
        .unwrap();
        assert_eq!(
            job.config.strategy,
            ReductionStrategy::VoxelMerge { voxel_size: 0.01 }
        );
        assert!(!job.config.parallel);
        assert!(!job.config.renormalize_normals);
        assert_eq!(job.config.policy.numeric, Reducer::Mode);
        assert_eq!(job.config.policy.other, Reducer::First);
        assert_eq!(
            job.config.policy.overrides.get("opacity"),
            Some(&Reducer::First)
        );
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let rejected: [&[&str]; 4] = [
            &["splatlod", "merge", "in.ply", "-0.5", "out.ply"],
            &["splatlod", "subsample", "in.ply", "1.5", "out.ply"],
            &["splatlod", "merge", "in.ply", "0.1", "out.ply", "--attribute", "opacity"],
            &["splatlod", "merge", "in.ply", "0.1", "out.ply", "--numeric", "median"],
        ];
        for args in rejected {
            assert!(job_from(args).is_err(), "accepted {:?}", args);
        }
    }

    #[test]
    fn test_config_file_is_overridden_by_flags() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("lod.toml");
        std::fs::write(
            &config_path,
            "seed = 3\nrenormalize_normals = false\n[policy]\nother = \"mode\"\n",
        )
        .unwrap();
        let config_arg = config_path.to_str().unwrap();

        let job = job_from(&[
            "splatlod", "--config", config_arg, "merge", "in.ply", "0.2", "out.ply", "--other",
            "mean",
        ])
        .unwrap();
        assert_eq!(job.config.seed, Some(3));
        assert!(!job.config.renormalize_normals);
        assert_eq!(job.config.policy.other, Reducer::Mean);
        assert_eq!(
            job.config.strategy,
            ReductionStrategy::VoxelMerge { voxel_size: 0.2 }
        );
    }

    #[test]
    fn test_run_keeps_input_encoding() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.ply");
        let output = dir.path().join("out.ply");

        let points = PointSet::from_positions(&[
            [0.0, 0.0, 0.0],
            [0.005, 0.0, 0.0],
            [1.0, 1.0, 1.0],
        ])
        .unwrap();
        write_point_set(&points, PlyEncoding::BinaryBigEndian, &input).unwrap();

        let job = job_from(&[
            "splatlod",
            "merge",
            input.to_str().unwrap(),
            "0.01",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(&job, false).unwrap();

        let reduced = read_point_set(&output).unwrap();
        assert_eq!(reduced.encoding, PlyEncoding::BinaryBigEndian);
        assert_eq!(reduced.points.len(), 2);
    }

    #[test]
    fn test_run_reports_missing_input() {
        let dir = tempdir().unwrap();
        let job = job_from(&[
            "splatlod",
            "subsample",
            dir.path().join("missing.ply").to_str().unwrap(),
            "0.5",
            dir.path().join("out.ply").to_str().unwrap(),
        ])
        .unwrap();
        let err = run(&job, false).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read"));
    }
}
