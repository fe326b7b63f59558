//! objcsdk - Objective-C metadata reader and SDK database tool.
//!
//! Dump ObjC metadata, scan binaries into SDKDB JSON, merge databases and
//! diff them for API regressions.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use objcsdk::api::PackedVersion;
use objcsdk::objc::{ObjCMethod, ObjCProperty};
use objcsdk::{
    diff, read_binary_api, Binary, ContentRoot, Diagnostics, MachOFile, ObjCMetaDataReader,
    ObjCRuntime, ScanOptions, Sdkdb, SdkdbBuilder, API,
};

/// Objective-C metadata reader and SDK database tool.
#[derive(Parser, Debug)]
#[command(name = "objcsdk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the ObjC metadata of a binary
    Dump {
        /// Path to a thin or universal Mach-O binary
        binary: PathBuf,

        /// Architecture to dump (e.g., "arm64e", "x86_64"); all slices if omitted
        #[arg(short, long)]
        arch: Option<String>,

        /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
        #[arg(short, long, default_value = "1")]
        verbosity: u8,
    },

    /// Read binaries into an SDKDB
    Scan {
        /// Binaries to read
        #[arg(required = true)]
        binaries: Vec<PathBuf>,

        /// Architectures to read (repeatable); all slices if omitted
        #[arg(short, long)]
        arch: Vec<String>,

        /// Deployment target for images without a platform load command (e.g., "10.15")
        #[arg(long)]
        min_os: Option<String>,

        /// Skip the symbol table and export trie
        #[arg(long)]
        no_symtab: bool,

        /// Skip ObjC metadata
        #[arg(long)]
        no_objc: bool,

        /// Project name recorded in the output
        #[arg(short, long)]
        project: Option<String>,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
        #[arg(short, long, default_value = "1")]
        verbosity: u8,

        /// Number of parallel jobs (default: number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Merge SDKDB files into one
    Merge {
        /// SDKDB files, in priority-neutral input order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Project name recorded in the output
        #[arg(short, long)]
        project: Option<String>,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
        #[arg(short, long, default_value = "1")]
        verbosity: u8,
    },

    /// Compare a candidate SDKDB against a baseline
    Diff {
        /// Baseline SDKDB
        baseline: PathBuf,

        /// Candidate SDKDB
        candidate: PathBuf,

        /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
        #[arg(short, long, default_value = "1")]
        verbosity: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dump {
            binary,
            arch,
            verbosity,
        } => {
            setup_logging(verbosity);
            cmd_dump(&binary, arch)
        }
        Commands::Scan {
            binaries,
            arch,
            min_os,
            no_symtab,
            no_objc,
            project,
            output,
            verbosity,
            jobs,
        } => {
            setup_logging(verbosity);
            let min_os = min_os
                .map(|v| {
                    PackedVersion::parse(&v).with_context(|| format!("Invalid version: {}", v))
                })
                .transpose()?;
            let options = ScanOptions {
                arches: arch,
                min_os,
                parse_header: true,
                parse_symbol_table: !no_symtab,
                parse_objc: !no_objc,
                project_name: project,
                verbosity,
            };
            cmd_scan(&binaries, options, output, jobs)
        }
        Commands::Merge {
            inputs,
            project,
            output,
            verbosity,
        } => {
            setup_logging(verbosity);
            cmd_merge(&inputs, project, output)
        }
        Commands::Diff {
            baseline,
            candidate,
            verbosity,
        } => {
            setup_logging(verbosity);
            cmd_diff(&baseline, &candidate)
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Writes a database to a file, or to stdout.
fn write_sdkdb(db: &Sdkdb, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => db
            .write(path)
            .with_context(|| format!("Failed to write: {}", path.display())),
        None => {
            println!("{}", db.to_json()?);
            Ok(())
        }
    }
}

fn read_sdkdbs(paths: &[PathBuf]) -> Result<Vec<Sdkdb>> {
    paths
        .iter()
        .map(|path| {
            Sdkdb::read(path).with_context(|| format!("Failed to read SDKDB: {}", path.display()))
        })
        .collect()
}

/// Ranks every database into one canonical SDK.
fn merge_sdkdbs(
    dbs: &[Sdkdb],
    project: Option<String>,
    diags: &mut Diagnostics,
) -> objcsdk::CanonicalSdk {
    let mut builder = SdkdbBuilder::new();
    if let Some(project) = project.or_else(|| dbs.iter().find_map(|db| db.project_name.clone())) {
        builder.set_project_name(project);
    }
    for db in dbs {
        builder.add_sdkdb(db, diags);
    }
    builder.build(diags)
}

// ===== dump =====

fn cmd_dump(path: &Path, arch: Option<String>) -> Result<()> {
    let binary =
        Binary::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let arches: Vec<String> = arch.into_iter().collect();
    let images = binary
        .images(&arches)
        .with_context(|| format!("Failed to parse: {}", path.display()))?;

    for image in &images {
        dump_image(image).with_context(|| {
            format!("Failed to read {} slice of {}", image.arch_name(), path.display())
        })?;
    }

    Ok(())
}

fn dump_image(image: &MachOFile<'_>) -> Result<()> {
    let reader = ObjCMetaDataReader::new(image)?;
    println!("{} ({:?})", image.arch_name(), reader.runtime());
    if reader.runtime() == ObjCRuntime::Unsupported {
        println!();
        return Ok(());
    }

    let swift = reader.swift_abi_version()?;
    if !swift.is_empty() {
        println!("Swift ABI: {}", swift);
    }

    for protocol in reader.protocols()? {
        println!("\n@protocol {}{}", protocol.name()?, conformances(protocol.protocols()?)?);
        print_methods("+", &protocol.class_methods()?)?;
        print_methods("-", &protocol.instance_methods()?)?;
        let optional_class = protocol.optional_class_methods()?;
        let optional_instance = protocol.optional_instance_methods()?;
        if !optional_class.is_empty() || !optional_instance.is_empty() {
            println!("@optional");
            print_methods("+", &optional_class)?;
            print_methods("-", &optional_instance)?;
        }
        print_properties(&protocol.properties()?)?;
        println!("@end");
    }

    for class in reader.classes()? {
        let super_class = class.super_class_name()?;
        let mut header = format!("\n@interface {}", class.name()?);
        if !super_class.is_empty() {
            header.push_str(" : ");
            header.push_str(super_class);
        }
        if class.is_swift()? {
            header.push_str(" (swift)");
        }
        println!("{}{}", header, conformances(class.protocols()?)?);

        for ivar in class.ivars()? {
            println!("  ivar {} {} +{}", ivar.name()?, ivar.types()?, ivar.offset()?);
        }
        print_methods("+", &class.class_methods()?)?;
        print_methods("-", &class.instance_methods()?)?;
        print_properties(&class.class_properties()?)?;
        print_properties(&class.properties()?)?;
        println!("@end");
    }

    for category in reader.categories()? {
        println!(
            "\n@interface {} ({}){}",
            category.base_class_name()?,
            category.name()?,
            conformances(category.protocols()?)?
        );
        print_methods("+", &category.class_methods()?)?;
        print_methods("-", &category.instance_methods()?)?;
        print_properties(&category.class_properties()?)?;
        print_properties(&category.properties()?)?;
        println!("@end");
    }

    let selectors = reader.referenced_selectors()?;
    if !selectors.is_empty() {
        println!("\nSelector references:");
        for selector in &selectors {
            println!("  {:#x} {}", selector.address(), selector.name()?);
        }
    }
    println!();

    Ok(())
}

fn conformances(protocols: Vec<objcsdk::objc::ObjCProtocolRef<'_>>) -> Result<String> {
    if protocols.is_empty() {
        return Ok(String::new());
    }
    let names = protocols
        .iter()
        .map(|p| p.name())
        .collect::<objcsdk::Result<Vec<_>>>()?;
    Ok(format!(" <{}>", names.join(", ")))
}

fn print_methods(prefix: &str, methods: &[ObjCMethod<'_>]) -> Result<()> {
    for method in methods {
        println!("  {}{} {}", prefix, method.name()?, method.types()?);
    }
    Ok(())
}

fn print_properties(properties: &[ObjCProperty<'_>]) -> Result<()> {
    for property in properties {
        println!("  @property {} {}", property.name()?, property.attributes()?);
    }
    Ok(())
}

// ===== scan =====

/// Reads every requested slice of one binary. A slice that fails is
/// logged and dropped without losing the others.
fn scan_binary(path: &Path, options: &ScanOptions) -> Result<Vec<API>> {
    let binary =
        Binary::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let images = binary
        .images(&options.arches)
        .with_context(|| format!("Failed to parse: {}", path.display()))?;

    let mut apis = Vec::with_capacity(images.len());
    for image in &images {
        let mut api = match read_binary_api(image, options) {
            Ok(api) => api,
            Err(e) => {
                error!(
                    "  Failed to read {} slice of {}: {}",
                    image.arch_name(),
                    path.display(),
                    e
                );
                continue;
            }
        };
        if let Some(info) = api.binary.as_mut() {
            info.path = path.display().to_string();
        }
        apis.push(api);
    }
    Ok(apis)
}

fn cmd_scan(
    binaries: &[PathBuf],
    options: ScanOptions,
    output: Option<PathBuf>,
    jobs: Option<usize>,
) -> Result<()> {
    let start = Instant::now();

    // Configure thread pool
    if let Some(n) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
    }

    let progress = ProgressBar::new(binaries.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    // Read in parallel, keep input order for the builder
    let results: Vec<_> = binaries
        .par_iter()
        .map(|path| {
            let result = scan_binary(path, &options);
            progress.inc(1);
            (path, result)
        })
        .collect();

    progress.finish_and_clear();

    let mut apis = Vec::new();
    let mut failures = 0usize;
    for (path, result) in results {
        match result {
            Ok(mut read) => apis.append(&mut read),
            Err(e) => {
                failures += 1;
                error!("  {}: {:#}", path.display(), e);
            }
        }
    }
    if failures > 0 {
        warn!("{} binaries failed to read", failures);
    }

    let mut diags = Diagnostics::new();
    let mut builder = SdkdbBuilder::new();
    if let Some(project) = &options.project_name {
        builder.set_project_name(project.clone());
    }
    for api in &apis {
        builder.add_api(api, ContentRoot::Runtime, &mut diags);
    }
    let sdk = builder.build(&mut diags);

    write_sdkdb(
        &sdk.to_sdkdb(diags.has_errors() || failures > 0),
        output.as_deref(),
    )?;

    info!(
        "Scanned {}/{} binaries ({} slices) in {:.2}s",
        binaries.len() - failures,
        binaries.len(),
        apis.len(),
        start.elapsed().as_secs_f64()
    );

    if failures > 0 {
        bail!("{} of {} binaries failed to read", failures, binaries.len());
    }
    Ok(())
}

// ===== merge =====

fn cmd_merge(inputs: &[PathBuf], project: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let start = Instant::now();
    let dbs = read_sdkdbs(inputs)?;

    let mut diags = Diagnostics::new();
    let sdk = merge_sdkdbs(&dbs, project, &mut diags);
    write_sdkdb(&sdk.to_sdkdb(diags.has_errors()), output.as_deref())?;

    info!(
        "Merged {} databases in {:.2}s: {} errors, {} warnings",
        dbs.len(),
        start.elapsed().as_secs_f64(),
        diags.error_count(),
        diags.warning_count()
    );

    if diags.has_errors() {
        bail!("Merge reported {} errors", diags.error_count());
    }
    Ok(())
}

// ===== diff =====

fn cmd_diff(baseline: &Path, candidate: &Path) -> Result<()> {
    let baseline_dbs = read_sdkdbs(&[baseline.to_path_buf()])?;
    let candidate_dbs = read_sdkdbs(&[candidate.to_path_buf()])?;

    let mut diags = Diagnostics::new();
    let baseline_sdk = merge_sdkdbs(&baseline_dbs, None, &mut diags);
    let candidate_sdk = merge_sdkdbs(&candidate_dbs, None, &mut diags);

    let result = diff(&baseline_sdk, &candidate_sdk, &mut diags);
    for diagnostic in diags.entries() {
        println!("{}: {}", diagnostic.severity, diagnostic);
    }

    if !result.passed {
        bail!(
            "{} API regressions between {} and {}",
            diags.error_count(),
            baseline.display(),
            candidate.display()
        );
    }
    Ok(())
}
