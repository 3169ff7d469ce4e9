// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! ferro-gwas CLI
//!
//! Command-line interface for querying GWAS-VCF files, building side
//! indexes and resolving LD proxies.

use clap::{Parser, Subcommand};
use ferro_gwas::cli::{
    output_error, output_header_info, output_paths, output_proxy_summary, output_records,
    parse_regions, read_id_file, OutputFormat,
};
use ferro_gwas::config::FerroGwasConfig;
use ferro_gwas::ld::{LdReference, PanelReference, TagDatabase};
use ferro_gwas::proxy::{ProxyMode, ProxyResolver, TieBreak};
use ferro_gwas::query::{AccessPath, GwasSource, QueryPlan, QueryPlanner};
use ferro_gwas::{Capabilities, GwasError, IdentifierIndex, ThresholdIndex};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "ferro-gwas")]
#[command(author, version, about = "Indexed queries and LD proxies for GWAS-VCF files")]
#[command(
    long_about = "Query GWAS summary statistics by region, identifier or p-value, and substitute LD proxies for missing variants.

Examples:
  ferro-gwas query --vcf ieu-a-2.vcf.gz --region 1:1097291-1099437
  ferro-gwas index-rsid --vcf ieu-a-2.vcf.gz --out ieu-a-2.rsidx
  ferro-gwas query --vcf ieu-a-2.vcf.gz --id rs12565286 --rsidx ieu-a-2.rsidx
  ferro-gwas index-pval --vcf ieu-a-2.vcf.gz --out ieu-a-2.pvalidx --max-pval 0.05
  ferro-gwas query --vcf ieu-a-2.vcf.gz --pval 5e-8 --pvalidx ieu-a-2.pvalidx
  ferro-gwas build-ldref --bfile EUR --db EUR.ldtags.db --min-r2 0.2
  ferro-gwas proxy --vcf ieu-a-2.vcf.gz --id rs4442317 --dbfile EUR.ldtags.db"
)]
struct Cli {
    /// Log level or filter directive (e.g., info, debug, ferro_gwas=trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Configuration file (default: .ferro-gwas.toml, then ~/.config/ferro-gwas/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select records by region, identifier and/or p-value
    ///
    /// Filters given together are combined with AND, applied in the order
    /// region, identifier, p-value.
    Query {
        /// Input GWAS-VCF (plain or gzipped)
        #[arg(long)]
        vcf: PathBuf,

        /// Region (chr, chr:pos or chr:start-end); repeat or comma-separate
        #[arg(short, long)]
        region: Vec<String>,

        /// Variant identifier; may be repeated
        #[arg(long)]
        id: Vec<String>,

        /// File of identifiers, one per line
        #[arg(long)]
        id_file: Option<PathBuf>,

        /// Keep records with p-value at or below this threshold
        #[arg(long)]
        pval: Option<f64>,

        /// Identifier index built with `index-rsid`
        #[arg(long)]
        rsidx: Option<PathBuf>,

        /// Threshold index built with `index-pval`
        #[arg(long)]
        pvalidx: Option<PathBuf>,

        /// Surface index failures instead of falling back to a scan
        #[arg(long)]
        require_index: bool,

        /// Never delegate to bcftools
        #[arg(long)]
        no_accelerator: bool,

        /// Fail if any step produces more records than this
        #[arg(long)]
        max_records: Option<usize>,

        /// Fail if the query runs longer than this many seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, default_value = "text", value_parser = ["text", "json", "vcf"])]
        format: String,
    },

    /// Build an identifier index (SQLite)
    IndexRsid {
        /// Input GWAS-VCF
        #[arg(long)]
        vcf: PathBuf,

        /// Index file to create (replaced if present)
        #[arg(long)]
        out: PathBuf,
    },

    /// Build a threshold index (SQLite) over records with p <= --max-pval
    IndexPval {
        /// Input GWAS-VCF
        #[arg(long)]
        vcf: PathBuf,

        /// Index file to create (replaced if present)
        #[arg(long)]
        out: PathBuf,

        /// Maximum p-value admitted to the index
        #[arg(long, default_value = "0.05")]
        max_pval: f64,
    },

    /// Precompute an LD tag database from a PLINK fileset (requires plink)
    BuildLdref {
        /// PLINK fileset prefix (<bfile>.bed/.bim/.fam)
        #[arg(long)]
        bfile: PathBuf,

        /// Tag database to create (replaced if present)
        #[arg(long)]
        db: PathBuf,

        /// Minimum r² retained
        #[arg(long, default_value = "0.2")]
        min_r2: f64,
    },

    /// Fetch identifiers, substituting LD proxies for missing ones
    Proxy {
        /// Input GWAS-VCF
        #[arg(long)]
        vcf: PathBuf,

        /// Variant identifier; may be repeated
        #[arg(long)]
        id: Vec<String>,

        /// File of identifiers, one per line
        #[arg(long)]
        id_file: Option<PathBuf>,

        /// PLINK reference panel prefix (live LD, requires plink)
        #[arg(long, conflicts_with = "dbfile")]
        bfile: Option<PathBuf>,

        /// Precomputed tag database from `build-ldref`
        #[arg(long)]
        dbfile: Option<PathBuf>,

        /// yes: proxies only for missing identifiers; only: proxies for all
        #[arg(long, value_parser = ["yes", "only"])]
        mode: Option<String>,

        /// Minimum r² between requested variant and proxy
        #[arg(long)]
        min_r2: Option<f64>,

        /// Order among candidates with equal r²
        #[arg(long, value_parser = ["reported-order", "identifier"])]
        tie_break: Option<String>,

        /// Identifier index used to look up candidates
        #[arg(long)]
        rsidx: Option<PathBuf>,

        /// Write the per-identifier resolution summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, default_value = "text", value_parser = ["text", "json", "vcf"])]
        format: String,
    },

    /// Show GWAS-VCF header metadata
    Info {
        /// Input GWAS-VCF
        #[arg(long)]
        vcf: PathBuf,

        /// Output format
        #[arg(short = 'f', long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Print a sample configuration file
    Config {
        /// Print the configuration currently in effect instead
        #[arg(long)]
        current: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level) {
        eprintln!("{}", e);
        std::process::exit(2);
    }

    let format = match &cli.command {
        Commands::Query { format, .. }
        | Commands::Proxy { format, .. }
        | Commands::Info { format, .. } => format.parse().unwrap_or_default(),
        _ => OutputFormat::Text,
    };

    if let Err(e) = run(cli) {
        let _ = output_error(&mut io::stderr(), &e, format);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), GwasError> {
    let config = match &cli.config {
        Some(path) => FerroGwasConfig::load_from_path(path)?,
        None => FerroGwasConfig::load(),
    };

    match cli.command {
        Commands::Query {
            vcf,
            region,
            id,
            id_file,
            pval,
            rsidx,
            pvalidx,
            require_index,
            no_accelerator,
            max_records,
            timeout,
            output,
            format,
        } => {
            let mut plan = QueryPlan::new();
            if !region.is_empty() {
                plan = plan.region(parse_regions(&region)?);
            }
            let ids = collect_ids(id, id_file.as_deref())?;
            if !ids.is_empty() {
                plan = plan.ids(&ids);
            }
            if let Some(pval) = pval {
                plan = plan.threshold(pval);
            }
            if plan.is_empty() {
                return Err(GwasError::InvalidArgument {
                    msg: "give at least one of --region, --id, --id-file or --pval".to_string(),
                });
            }

            let mut budget = config.query;
            if let Some(max) = max_records {
                budget = budget.with_max_records(max);
            }
            if let Some(secs) = timeout {
                budget = budget.with_timeout(Duration::from_secs_f64(secs));
            }

            let capabilities = if no_accelerator {
                Capabilities::none()
            } else {
                Capabilities::detect(&config.tools)
            };
            let mut planner = QueryPlanner::new(&capabilities).with_budget(budget);
            if let Some(path) = &rsidx {
                planner = planner.with_identifier_index(IdentifierIndex::open(path)?);
            }
            if let Some(path) = &pvalidx {
                planner = planner.with_threshold_index(ThresholdIndex::open(path)?);
            }
            if require_index {
                if rsidx.is_some() {
                    planner = planner.require(AccessPath::IdentifierIndex)?;
                }
                if pvalidx.is_some() {
                    planner = planner.require(AccessPath::ThresholdIndex)?;
                }
            }

            let source = GwasSource::open(&vcf)?;
            let outcome = planner.execute(&source, &plan)?;
            output_paths(&mut io::stderr(), &outcome.paths)?;
            info!("{} records selected", outcome.records.len());

            let mut writer = open_output(output.as_deref())?;
            output_records(
                &mut writer,
                source.header(),
                outcome.records.records(),
                format.parse().unwrap_or_default(),
            )?;
            writer.flush()?;
            Ok(())
        }

        Commands::IndexRsid { vcf, out } => {
            let source = GwasSource::open(&vcf)?;
            let index = IdentifierIndex::build(source.variants().records(), &out)?;
            eprintln!("Indexed {} identifiers into {}", index.len()?, out.display());
            Ok(())
        }

        Commands::IndexPval { vcf, out, max_pval } => {
            let source = GwasSource::open(&vcf)?;
            let index = ThresholdIndex::build(source.variants().records(), max_pval, &out)?;
            eprintln!(
                "Indexed {} loci with p <= {} into {}",
                index.len()?,
                max_pval,
                out.display()
            );
            Ok(())
        }

        Commands::BuildLdref { bfile, db, min_r2 } => {
            let capabilities = Capabilities::detect(&config.tools);
            let database = TagDatabase::build_with(&capabilities, &bfile, &db, min_r2)?;
            eprintln!("Stored {} tag pairs in {}", database.len()?, db.display());
            Ok(())
        }

        Commands::Proxy {
            vcf,
            id,
            id_file,
            bfile,
            dbfile,
            mode,
            min_r2,
            tie_break,
            rsidx,
            summary,
            output,
            format,
        } => {
            let ids = collect_ids(id, id_file.as_deref())?;
            if ids.is_empty() {
                return Err(GwasError::InvalidArgument {
                    msg: "give at least one --id or --id-file".to_string(),
                });
            }

            let mut options = config.proxy.options();
            if let Some(mode) = mode {
                options = options.with_mode(mode.parse::<ProxyMode>()?);
            }
            if let Some(min_r2) = min_r2 {
                options = options.with_min_r2(min_r2);
            }
            if let Some(tie_break) = tie_break {
                options = options.with_tie_break(tie_break.parse::<TieBreak>()?);
            }

            let capabilities = Capabilities::detect(&config.tools);
            let reference = open_reference(&config, &capabilities, bfile, dbfile)?;

            let mut planner = QueryPlanner::new(&capabilities).with_budget(config.query);
            if let Some(path) = &rsidx {
                planner = planner.with_identifier_index(IdentifierIndex::open(path)?);
            }

            let source = GwasSource::open(&vcf)?;
            let resolver = ProxyResolver::new(&planner, reference.as_ref(), options);
            let outcome = resolver.resolve(&source, &ids)?;

            let format: OutputFormat = format.parse().unwrap_or_default();
            let mut writer = open_output(output.as_deref())?;
            output_records(&mut writer, source.header(), outcome.records.records(), format)?;
            writer.flush()?;

            if let Some(path) = summary {
                let mut writer = open_output(Some(path.as_path()))?;
                output_proxy_summary(&mut writer, &outcome, format)?;
                writer.flush()?;
            }
            Ok(())
        }

        Commands::Info { vcf, format } => {
            let source = GwasSource::open(&vcf)?;
            let mut stdout = io::stdout().lock();
            output_header_info(
                &mut stdout,
                source.header(),
                source.len(),
                format.parse().unwrap_or_default(),
            )?;
            Ok(())
        }

        Commands::Config { current } => {
            if current {
                print!("{}", config.to_toml_string()?);
            } else {
                print!("{}", FerroGwasConfig::sample());
            }
            Ok(())
        }
    }
}

/// Identifiers from repeated flags plus an optional file
fn collect_ids(mut ids: Vec<String>, file: Option<&Path>) -> Result<Vec<String>, GwasError> {
    if let Some(path) = file {
        ids.extend(read_id_file(path)?);
    }
    Ok(ids)
}

fn open_reference(
    config: &FerroGwasConfig,
    capabilities: &Capabilities,
    bfile: Option<PathBuf>,
    dbfile: Option<PathBuf>,
) -> Result<Box<dyn LdReference>, GwasError> {
    match (bfile, dbfile) {
        (_, Some(db)) => Ok(Box::new(TagDatabase::open(db)?)),
        (Some(bfile), None) => {
            let plink = capabilities.correlation_tool().ok_or_else(|| {
                GwasError::configuration("live LD from --bfile requires plink; set tools.plink")
            })?;
            let settings = &config.proxy;
            Ok(Box::new(
                PanelReference::open(bfile, plink)?
                    .with_window(settings.window_kb, settings.window_variants)
                    .with_threads(settings.threads),
            ))
        }
        (None, None) => Err(GwasError::configuration(
            "proxy resolution requires an LD reference: give --bfile or --dbfile",
        )),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, GwasError> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::create(path).map_err(|e| GwasError::Io {
                msg: format!("cannot create {}: {}", path.display(), e),
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn init_tracing(level: &str) -> Result<(), String> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_new(level).map_err(|e| format!("Invalid log level '{}': {}", level, e))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    Ok(())
}
