//! CLI entry point for `maillens`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use maillens::classify::{CategoryCatalog, Classifier};
use maillens::config::{self, Config};
use maillens::i18n::{self, Lang};
use maillens::model::classification::{ClassifyOutcome, UNDETERMINED};
use maillens::model::document::SanitizedDocument;
use maillens::{MailLensError, Pipeline};

#[derive(Parser)]
#[command(name = "maillens", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language (en, ru). Defaults to the configuration, then the system locale.
    #[arg(long, global = true, value_name = "LANG")]
    lang: Option<String>,

    /// Configuration file (overrides $MAILLENS_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and sanitize message text
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Classify messages against categories from a TOML file
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Categories file with [[category]] tables
        #[arg(short, long, value_name = "TOML")]
        categories: PathBuf,
        /// Similarity below which a message is "Undetermined"
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Detect language early from --lang arg or system env, before clap processes --help.
fn detect_lang_early() -> Lang {
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        if arg == "--lang" {
            if let Some(lang) = args.get(i + 1).and_then(|code| Lang::from_code(code)) {
                return lang;
            }
        }
        if let Some(lang) = arg.strip_prefix("--lang=").and_then(Lang::from_code) {
            return lang;
        }
    }
    i18n::detect_system_lang()
}

/// Build a localized clap Command using i18n strings.
fn build_localized_command(lang: Lang) -> clap::Command {
    let mut cmd = Cli::command().about(i18n::app_about(lang));

    let subcommands: Vec<clap::Command> = cmd
        .get_subcommands()
        .map(|sub| {
            let about = match sub.get_name() {
                "extract" => Some(i18n::help_cmd_extract(lang)),
                "classify" => Some(i18n::help_cmd_classify(lang)),
                "completions" => Some(i18n::help_cmd_completions(lang)),
                "manpage" => Some(i18n::help_cmd_manpage(lang)),
                _ => None,
            };
            match about {
                Some(about) => sub.clone().about(about),
                None => sub.clone(),
            }
        })
        .collect();

    for sub in subcommands {
        cmd = cmd.mut_subcommand(sub.get_name(), |_| sub.clone());
    }
    cmd
}

fn main() -> anyhow::Result<()> {
    let early_lang = detect_lang_early();
    let matches = build_localized_command(early_lang).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config(),
    };
    if let Some(lang) = cli.lang.as_deref().and_then(Lang::from_code) {
        config.general.language = lang;
    } else if std::env::var_os("MAILLENS_LANG").is_some() {
        config.general.language = early_lang;
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Extract { files, json } => cmd_extract(&files, json, config),
        Commands::Classify {
            files,
            categories,
            threshold,
            json,
        } => cmd_classify(&files, &categories, threshold, json, config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "maillens.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "maillens", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn progress_bar(len: usize, label: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Read a file, returning its bytes and the name used for format detection.
fn read_input(path: &Path, lang: Lang) -> maillens::Result<(Vec<u8>, String)> {
    if !path.exists() {
        return Err(MailLensError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, i18n::err_file_not_found(lang)),
        ));
    }
    let data = std::fs::read(path).map_err(|e| MailLensError::io(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((data, name))
}

/// Extract documents and print them.
fn cmd_extract(files: &[PathBuf], json: bool, config: Config) -> anyhow::Result<()> {
    let lang = config.general.language;
    let pipeline = Pipeline::new(config);
    let pb = progress_bar(files.len(), i18n::msg_processing(lang))?;
    let start = Instant::now();

    let mut processed = Vec::new();
    let mut failures = 0usize;
    for path in files {
        match read_input(path, lang).and_then(|(data, name)| pipeline.process(&data, &name)) {
            Ok(message) => processed.push(message),
            Err(e) => {
                failures += 1;
                pb.suspend(|| eprintln!("{}: {e}", path.display()));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    tracing::info!(files = files.len(), elapsed = ?start.elapsed(), "Extraction finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&processed)?);
    } else {
        for message in &processed {
            print_document(&message.document, lang);
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} file(s) could not be processed", files.len());
    }
    Ok(())
}

fn print_document(doc: &SanitizedDocument, lang: Lang) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<12} {}", i18n::label_file(lang), doc.filename);
    println!("  {}", doc.subject_line);
    println!("  {}", doc.sender_line);
    println!("  {}", doc.recipient_line);
    println!("  {}", doc.date_line);
    println!();
    println!("{}", doc.body);

    if !doc.urls.is_empty() {
        println!();
        println!("  {} ({}):", i18n::label_urls(lang), doc.urls.len());
        for url in &doc.urls {
            println!("    - {url}");
        }
    }

    if !doc.attachments.is_empty() {
        println!();
        println!(
            "  {} ({}):",
            i18n::attachments_label(lang),
            doc.attachments.len()
        );
        for attachment in &doc.attachments {
            println!(
                "    - {} ({}, {})",
                attachment.filename,
                attachment.content_type,
                format_size(attachment.size as u64, BINARY)
            );
            let preview: String = attachment.text.chars().take(200).collect();
            if !preview.is_empty() {
                println!("      {}", preview.replace('\n', "\n      "));
            }
        }
    }
}

#[derive(serde::Serialize)]
struct ClassifiedFile {
    file: String,
    #[serde(flatten)]
    outcome: ClassifyOutcome,
}

/// Build the registry from a categories file and classify every input.
fn cmd_classify(
    files: &[PathBuf],
    categories: &Path,
    threshold: Option<f32>,
    json: bool,
    config: Config,
) -> anyhow::Result<()> {
    let lang = config.general.language;
    let catalog = CategoryCatalog::load(categories)?;
    let classifier = Classifier::from_config(&config)?;
    if let Some(threshold) = threshold {
        classifier.set_threshold(threshold);
    }
    let pipeline = Pipeline::new(config);

    let pb = progress_bar(catalog.categories.len(), i18n::msg_loading_categories(lang))?;
    for spec in &catalog.categories {
        let mut examples = Vec::new();
        for path in spec.example_files()? {
            match read_input(&path, lang).and_then(|(data, name)| pipeline.process(&data, &name)) {
                Ok(message) => examples.push(message.classification_text),
                Err(e) => pb.suspend(|| eprintln!("{}: {e}", path.display())),
            }
        }
        classifier.add_category(&spec.name, spec.description.as_deref(), &examples)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    let pb = progress_bar(files.len(), i18n::msg_processing(lang))?;
    let mut results = Vec::new();
    let mut failures = 0usize;
    for path in files {
        match read_input(path, lang).and_then(|(data, name)| pipeline.process(&data, &name)) {
            Ok(message) => results.push(ClassifiedFile {
                file: path.display().to_string(),
                outcome: classifier.classify(&message.classification_text),
            }),
            Err(e) => {
                failures += 1;
                pb.suspend(|| eprintln!("{}: {e}", path.display()));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_classification_table(&results, lang);
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} file(s) could not be processed", files.len());
    }
    Ok(())
}

fn print_classification_table(results: &[ClassifiedFile], lang: Lang) {
    println!();
    println!(
        "  {:<40} {:<30} {}",
        i18n::label_file(lang),
        i18n::label_category(lang),
        i18n::label_similarity(lang)
    );
    for result in results {
        match &result.outcome {
            ClassifyOutcome::Classified(r) => {
                let category = if r.predicted_category == UNDETERMINED {
                    i18n::undetermined(lang)
                } else {
                    r.predicted_category.as_str()
                };
                println!(
                    "  {:<40} {:<30} {:.3}",
                    truncate(&result.file, 40),
                    truncate(category, 30),
                    r.best_similarity
                );
            }
            ClassifyOutcome::NoCategories => {
                println!(
                    "  {:<40} {}",
                    truncate(&result.file, 40),
                    i18n::msg_no_categories(lang)
                );
            }
            ClassifyOutcome::ProviderUnavailable { reason } => {
                println!(
                    "  {:<40} {}: {reason}",
                    truncate(&result.file, 40),
                    i18n::msg_provider_unavailable(lang)
                );
            }
        }
    }
}

/// Keep the tail of long paths so the file name stays visible.
fn truncate(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max - 1)).collect();
        format!("…{tail}")
    }
}
