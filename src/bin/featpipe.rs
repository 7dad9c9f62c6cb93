//! Command-line front end: list generators, show their defaults, compute a
//! descriptor set over an image list, and inspect the resulting containers.
//!
//! ## Usage
//!
//! ```sh
//! featpipe list
//! featpipe info tiny_image
//! featpipe compute tiny_image --rootdir images/ --filelist images/list.txt \
//!     --output out/tiny_ -p params.width=8 -p params.colorspace=rgb --threads 8
//! featpipe inspect out/tiny_features
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use featpipe::config::Configuration;
use featpipe::{
    ContainerInspector, DataSource, GeneratorRegistry, ImageListSource, Pipeline, RunOptions,
};

#[derive(Parser, Debug)]
#[command(name = "featpipe")]
#[command(version, about = "Compute and persist image descriptors in parallel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered generators
    List,

    /// Show the default parameters and outputs of a generator
    Info {
        /// Generator name
        generator: String,
    },

    /// Compute a descriptor set over a list of images
    Compute {
        /// Generator name
        generator: String,

        /// Directory the file list entries are relative to
        #[arg(long)]
        rootdir: PathBuf,

        /// File with one relative image path per line
        #[arg(long)]
        filelist: PathBuf,

        /// Output prefix; each output is written to `{output}{name}`
        #[arg(short, long)]
        output: PathBuf,

        /// Generator parameter as `key=value` (repeatable)
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,

        /// Worker threads (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,

        /// Seconds between progress reports (0 disables them)
        #[arg(long, default_value_t = 10)]
        progress_secs: u64,
    },

    /// Print the structure of a container file
    Inspect {
        /// Container path
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "featpipe failed");
            ExitCode::from(1)
        }
    }
}

fn run(command: Commands) -> featpipe::Result<ExitCode> {
    let registry = GeneratorRegistry::with_builtin();

    match command {
        Commands::List => {
            for name in registry.list() {
                println!("{name}");
            }
        }

        Commands::Info { generator } => {
            let generator = registry.create_default(&generator)?;
            println!("{}", generator.name());
            println!("\n[PARAMETERS]");
            println!("{}", generator.parameters().to_json_string_pretty()?);
            println!("\n[OUTPUTS]");
            for output in generator.outputs() {
                println!("{:<16}{}", output.name, output.kind);
            }
        }

        Commands::Compute {
            generator,
            rootdir,
            filelist,
            output,
            params,
            threads,
            progress_secs,
        } => {
            let config = Configuration::parse_assignments(&params)?;
            let generator = registry.create(&generator, config)?;
            let source = ImageListSource::from_filelist(rootdir, &filelist)?;
            info!(
                generator = generator.name(),
                items = source.len(),
                prefix = %output.display(),
                "computing descriptors"
            );

            let mut options = RunOptions::default();
            if let Some(threads) = threads {
                options.workers = threads;
            }
            options.progress_interval =
                (progress_secs > 0).then(|| Duration::from_secs(progress_secs));

            let report = Pipeline::run(generator, Box::new(source), &output, &options)?;
            if !report.is_success() {
                if let Some(e) = &report.first_error {
                    error!(error = %e, completed = report.completed, "run aborted");
                }
                return Ok(ExitCode::from(1));
            }
        }

        Commands::Inspect { path } => {
            let report = ContainerInspector::inspect(&path)?;
            print!("{report}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
