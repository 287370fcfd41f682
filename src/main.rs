use clap::Parser;
use log::info;
use std::error::Error;
use std::path::PathBuf;
use traxelstore::config::{load_options, ProjectOptions};
use traxelstore::volume::io::write_json_file;
use traxelstore::{open_project, PipelineError, PluginRegistry};

/// Build a traxel store from a tracking project container and its raw data.
#[derive(Parser, Debug)]
#[command(name = "traxelstore", version, about, long_about = None)]
struct Args {
    /// JSON project options; command-line flags override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Project container with label images and classifiers.
    #[arg(long = "ilastik-project", value_name = "FILE")]
    ilastik_project: Option<PathBuf>,

    /// Container holding the raw volume.
    #[arg(long, value_name = "FILE")]
    raw: Option<PathBuf>,

    /// Dataset of the raw volume inside its container.
    #[arg(long, value_name = "PATH")]
    raw_path: Option<String>,

    /// Label image template with placeholders (t, t+1, x, y, z).
    #[arg(long, value_name = "TEMPLATE")]
    label_image_path: Option<String>,

    /// Object count classifier group [default: /CountClassification].
    #[arg(long, value_name = "PATH")]
    object_count_classifier_path: Option<String>,

    /// Division classifier group [default: /DivisionDetection].
    #[arg(long, value_name = "PATH")]
    division_classifier_path: Option<String>,

    /// Transition classifier group; none by default.
    #[arg(long, value_name = "PATH")]
    transition_classifier_path: Option<String>,

    /// Disable division features and the division classifier.
    #[arg(long)]
    without_divisions: bool,

    /// Digits of the sub-model index in `Forest0000` [default: 4].
    #[arg(long, value_name = "DIGITS")]
    rf_zero_padding: Option<usize>,

    /// Inclusive pixel count window for objects.
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    size_filter: Option<Vec<f64>>,

    /// Process frames `START..END` only.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    time_range: Option<Vec<usize>>,

    /// Process frames in parallel.
    #[arg(long)]
    parallel: bool,

    /// Write the assembled store as JSON.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Write the run report as JSON.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); `RUST_LOG` otherwise.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());
    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn init_logging(level: Option<&str>) {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.init();
}

fn apply_overrides(options: &mut ProjectOptions, args: &Args) {
    if let Some(path) = &args.ilastik_project {
        options.project_file = path.clone();
    }
    if let Some(path) = &args.raw {
        options.raw_image_file = path.clone();
    }
    if let Some(path) = &args.raw_path {
        options.raw_image_path = path.clone();
    }
    if let Some(template) = &args.label_image_path {
        options.label_image_path = template.clone();
    }
    if let Some(path) = &args.object_count_classifier_path {
        options.object_count_classifier_path = Some(path.clone());
    }
    if let Some(path) = &args.division_classifier_path {
        options.division_classifier_path = Some(path.clone());
    }
    if let Some(path) = &args.transition_classifier_path {
        options.transition_classifier_path = Some(path.clone());
    }
    if args.without_divisions {
        options.division_classifier_path = None;
    }
    if let Some(width) = args.rf_zero_padding {
        options.random_forest_zero_padding_width = width;
    }
    if let Some([min, max]) = args.size_filter.as_deref() {
        options.size_filter = Some([*min, *max]);
    }
    if let Some([start, end]) = args.time_range.as_deref() {
        options.time_range = Some([*start, *end]);
    }
    if args.parallel {
        options.parallel = true;
    }
}

fn run(args: Args) -> Result<(), PipelineError> {
    let mut options = match &args.config {
        Some(path) => {
            info!("loading options from {}", path.display());
            load_options(path)?
        }
        None => ProjectOptions::default(),
    };
    apply_overrides(&mut options, &args);
    if options.project_file.as_os_str().is_empty() {
        return Err(PipelineError::configuration(
            "no project file given (--ilastik-project or config)",
        ));
    }
    if options.raw_image_file.as_os_str().is_empty() || options.raw_image_path.is_empty() {
        return Err(PipelineError::configuration(
            "no raw volume given (--raw and --raw-path or config)",
        ));
    }

    let mut pipeline = open_project(&options, PluginRegistry::with_default_plugins())?;
    let store = pipeline.fill_traxel_store()?;
    println!(
        "{} traxels in {} frames",
        store.len(),
        store.timesteps().len()
    );
    if let Some(path) = &args.out {
        write_json_file(path, store)?;
        println!("store written to {}", path.display());
    }
    let report = pipeline.report();
    println!("{}", report.summary());
    if let Some(path) = &args.report {
        write_json_file(path, report)?;
        println!("report written to {}", path.display());
    }
    Ok(())
}
