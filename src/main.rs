use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;

use reqnum::config::{find_default_config, load_config, AppConfig, DEFAULT_CONFIG_FILENAME};
use reqnum::number::NumberingOrder;
use reqnum::pattern::TokenPattern;
use reqnum::pipeline::{
    extract_glossary_docx, write_report_json, EnumerateOptions, Enumerator,
};
use reqnum::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "reqnum")]
#[command(about = "Number [PREFIX-XXX] placeholders in DOCX requirement documents", long_about = None)]
struct Args {
    /// Input .docx
    #[arg(value_name = "DOCX")]
    input: PathBuf,

    /// Output .docx (default: <input_stem>_numbered.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Prefixes to number (default: REQ SYS)
    #[arg(long, num_args = 1.., value_name = "PREFIX")]
    prefixes: Option<Vec<String>>,

    /// Placeholder regex; one capture group for the prefix
    #[arg(long, value_name = "REGEX")]
    pattern: Option<String>,

    /// Number assignment order: document | prefix
    #[arg(long, value_name = "ORDER")]
    order: Option<String>,

    /// Match whole paragraphs and rebuild runs when a placeholder spans several
    #[arg(long)]
    fallback_runs: bool,

    /// Write the replacement report as JSON
    #[arg(long, value_name = "JSON")]
    report_json: Option<PathBuf>,

    /// Skip structure verification before saving
    #[arg(long)]
    no_verify: bool,

    /// Collect '@'/'#' comment annotations into glossary tables instead of numbering
    #[arg(long)]
    extract_glossary: bool,

    /// Abbreviation table output (default: <input_stem>_abbr.docx)
    #[arg(long, value_name = "DOCX")]
    abbr_output: Option<PathBuf>,

    /// Term table output (default: <input_stem>_terms.docx)
    #[arg(long, value_name = "DOCX")]
    terms_output: Option<PathBuf>,

    /// Config file path (default: search for reqnum.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if !args.input.exists() {
        return Err(anyhow!("input file not found: {}", args.input.display()));
    }

    let cfg = match args.config.as_ref() {
        Some(path) => load_config(path)?,
        None => {
            let workdir = args
                .input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            match find_default_config(workdir, DEFAULT_CONFIG_FILENAME) {
                Some(path) => {
                    progress.info(format!("Config: {}", path.display()));
                    load_config(&path)?
                }
                None => AppConfig::default(),
            }
        }
    };

    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();

    if args.extract_glossary {
        let abbr_suffix = cfg
            .glossary
            .abbr_suffix
            .clone()
            .unwrap_or_else(|| "_abbr".to_string());
        let terms_suffix = cfg
            .glossary
            .terms_suffix
            .clone()
            .unwrap_or_else(|| "_terms".to_string());
        let abbr_output = args
            .abbr_output
            .clone()
            .unwrap_or_else(|| args.input.with_file_name(format!("{stem}{abbr_suffix}.docx")));
        let terms_output = args
            .terms_output
            .clone()
            .unwrap_or_else(|| args.input.with_file_name(format!("{stem}{terms_suffix}.docx")));

        let glossary = extract_glossary_docx(&progress, &args.input, &abbr_output, &terms_output)?;
        println!(
            "Abbreviations table has been written to {} ({} entries)",
            abbr_output.display(),
            glossary.abbreviations.len()
        );
        println!(
            "Terms table has been written to {} ({} entries)",
            terms_output.display(),
            glossary.terms.len()
        );
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_file_name(format!("{stem}_numbered.docx")));

    let prefixes = args
        .prefixes
        .clone()
        .or_else(|| cfg.numbering.prefixes.clone())
        .unwrap_or_else(|| vec!["REQ".to_string(), "SYS".to_string()]);
    let pattern = match args.pattern.as_deref().or(cfg.numbering.pattern.as_deref()) {
        Some(p) => TokenPattern::new(p).context("compile placeholder pattern")?,
        None => TokenPattern::default(),
    };
    let order = match args.order.as_deref().or(cfg.numbering.order.as_deref()) {
        Some(o) => NumberingOrder::parse(o)?,
        None => NumberingOrder::Document,
    };
    let verify_structure = if args.no_verify {
        false
    } else {
        cfg.numbering.verify_structure.unwrap_or(true)
    };

    let enumerator = Enumerator::new(
        EnumerateOptions {
            prefixes,
            pattern,
            order,
            fallback_runs: args.fallback_runs,
            verify_structure,
        },
        progress,
    );
    let report = enumerator.renumber_docx(&args.input, &output)?;

    if let Some(path) = args.report_json.as_ref() {
        write_report_json(&report, path)?;
    }

    println!(
        "Successfully processed '{}' -> '{}'",
        args.input.display(),
        output.display()
    );
    for (prefix, tags) in &report.tags {
        if tags.is_empty() {
            continue;
        }
        println!("{prefix}: {} replacements", tags.len());
        let examples: Vec<&str> = tags.iter().take(5).map(String::as_str).collect();
        println!("  Examples: {}", examples.join(", "));
        if tags.len() > 5 {
            println!("  ... and {} more", tags.len() - 5);
        }
    }

    Ok(())
}
