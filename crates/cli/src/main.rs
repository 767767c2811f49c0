mod echo;

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use fieldsift_core::{
    ArchiveLookup, BoundedFetcher, Extractor, ExtractorConfig, JsonConfig, ProfileLoader, fetch_file, fetch_stdin,
    profiles,
};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::echo::{
    format_size, print_banner, print_detail, print_extraction_details, print_info, print_step, print_success,
    print_timing_summary, print_warning,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What to extract from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Profile,
    Narrative,
    Tables,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profile" | "fields" => Ok(Self::Profile),
            "narrative" | "resume" => Ok(Self::Narrative),
            "tables" => Ok(Self::Tables),
            _ => Err(format!("Invalid mode: {}. Valid options: profile, narrative, tables", s)),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!("Invalid format: {}. Valid options: json, text", s)),
        }
    }
}

/// Extract profile fields, history and narrative text from web pages
#[derive(Parser, Debug)]
#[command(name = "fieldsift")]
#[command(version)]
#[command(about = "Extract profile fields, history and narrative text from web pages", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// What to extract (profile, narrative, tables)
    #[arg(short, long, default_value = "profile", value_name = "MODE")]
    mode: Mode,

    /// Output format (json, text)
    #[arg(short, long, default_value = "json", value_name = "FORMAT")]
    format: OutputFormat,

    /// Subject name; defaults to the page title and anchors the narrative window
    #[arg(short, long)]
    name: Option<String>,

    /// Label for the result's source field
    #[arg(long, value_name = "LABEL")]
    source: Option<String>,

    /// Fetch deadline in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Maximum response bytes to read
    #[arg(long, value_name = "BYTES")]
    max_bytes: Option<usize>,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Site profile JSON file (skips per-domain lookup)
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Custom site profile directory
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Look up an archived copy of the page
    #[arg(long)]
    archive: bool,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) {
    let default = if verbose { "fieldsift=debug,fieldsift_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn is_url(input: &str) -> bool {
    url::Url::parse(input).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Profile file, then per-domain profile, then defaults; flags override all three.
fn resolve_config(args: &Args) -> anyhow::Result<ExtractorConfig> {
    let mut config = if let Some(path) = &args.profile {
        profiles::load_file(path).with_context(|| format!("Failed to load profile: {}", path.display()))?
    } else if is_url(&args.input) {
        let mut builder = ProfileLoader::builder();
        if let Some(dir) = &args.config_dir {
            builder = builder.custom_dir(dir);
        }
        if let Some(dir) = ProfileLoader::default_standard_dir() {
            builder = builder.standard_dir(dir);
        }
        builder
            .build()
            .load_for_url(&args.input)
            .context("Failed to resolve site profile")?
    } else {
        ExtractorConfig::default()
    };

    if let Some(timeout_ms) = args.timeout_ms {
        config.fetch.timeout_ms = timeout_ms;
    }
    if let Some(max_bytes) = args.max_bytes {
        config.fetch.max_bytes = max_bytes;
    }
    if let Some(user_agent) = &args.user_agent {
        config.fetch.user_agent = user_agent.clone();
    }
    if let Some(source) = &args.source {
        config.source = source.clone();
    }
    if args.archive {
        config.archive = true;
    }

    Ok(config)
}

fn to_json(value: &serde_json::Value, pretty: bool) -> anyhow::Result<String> {
    let json = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    json.context("Failed to serialize output")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    let config = resolve_config(&args)?;
    let extractor = Extractor::new(config);
    let total = Instant::now();
    let mut timings = Vec::new();

    let started = Instant::now();
    let (html, page_url, fetcher) = if args.input == "-" {
        if args.verbose {
            print_step(1, 3, "Reading from stdin");
        }
        (fetch_stdin().context("Failed to read from stdin")?, None, None)
    } else if is_url(&args.input) {
        if args.verbose {
            print_step(
                1,
                3,
                &format!("Fetching from {}", args.input.bright_white().underline()),
            );
        }

        let fetcher = BoundedFetcher::new(extractor.config().fetch.clone()).context("Failed to build HTTP client")?;
        let fetched = fetcher
            .fetch(&args.input)
            .await
            .with_context(|| format!("Failed to fetch URL: {}", args.input))?;
        if fetched.truncated {
            print_warning(&format!(
                "Response cut at {}, extracting from a partial page",
                format_size(fetched.bytes_read)
            ));
        }
        (fetched.text, Some(args.input.clone()), Some(fetcher))
    } else {
        if args.verbose {
            print_step(1, 3, &format!("Reading from file {}", args.input.bright_white()));
        }
        let content = fetch_file(&args.input).with_context(|| format!("Failed to read file: {}", args.input))?;
        (content, None, None)
    };
    timings.push(("Read".to_string(), started.elapsed()));

    if args.verbose {
        print_detail("Size", &format_size(html.len()));
        eprintln!();
        print_step(2, 3, &format!("Extracting ({:?})", args.mode));
    }

    let started = Instant::now();
    let mut output = match args.mode {
        Mode::Profile => {
            let mut result = extractor.extract(&html, args.name.as_deref(), None, page_url.as_deref());

            if extractor.config().archive
                && let (Some(fetcher), Some(url)) = (&fetcher, &page_url)
            {
                let archive_url = ArchiveLookup::new().closest_snapshot(fetcher, url).await;
                if archive_url.is_none() {
                    print_warning("No archived copy found");
                }
                result = result.with_archive_url(archive_url);
            }

            if result.is_empty() {
                print_warning("No fields found on the page");
            }
            if args.verbose {
                print_extraction_details(&result);
            }

            match args.format {
                OutputFormat::Json => result
                    .to_json_string(&JsonConfig { pretty: args.pretty })
                    .context("Failed to serialize result")?,
                OutputFormat::Text => result.to_text(),
            }
        }
        Mode::Narrative => {
            let span = extractor.narrative_span(&html, args.name.as_deref());
            if args.verbose {
                print_detail("Located by", &format!("{:?}", span.source));
            }
            match args.format {
                OutputFormat::Json => to_json(
                    &serde_json::json!({ "url": page_url, "narrative": span.text }),
                    args.pretty,
                )?,
                OutputFormat::Text => span.text,
            }
        }
        Mode::Tables => {
            let selection = extractor.filter_tables(&html);
            let joined = selection.joined(&extractor.config().tables.separator);
            if args.verbose {
                print_detail("Kept", &selection.kept.len().to_string());
                print_detail("Discarded", &selection.discarded.len().to_string());
            }
            match args.format {
                OutputFormat::Json => to_json(
                    &serde_json::json!({
                        "url": page_url,
                        "kept": selection.kept,
                        "discarded": selection.discarded.len(),
                        "joined": joined,
                    }),
                    args.pretty,
                )?,
                OutputFormat::Text => joined,
            }
        }
    };
    timings.push(("Extract".to_string(), started.elapsed()));

    if !output.ends_with('\n') {
        output.push('\n');
    }

    if args.verbose {
        print_step(3, 3, "Writing output");
        print_detail("Format", &format!("{:?}", args.format));
        eprintln!();
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => {
            print!("{}", output);
        }
    }

    if args.verbose {
        print_timing_summary(total.elapsed(), &timings);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("profile".parse::<Mode>().unwrap(), Mode::Profile);
        assert_eq!("Narrative".parse::<Mode>().unwrap(), Mode::Narrative);
        assert_eq!("tables".parse::<Mode>().unwrap(), Mode::Tables);
        assert!("article".parse::<Mode>().is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.jp/p/1"));
        assert!(is_url("http://localhost:8080"));
        assert!(!is_url("player.html"));
        assert!(!is_url("ftp://example.jp/file"));
        assert!(!is_url("-"));
    }

    #[test]
    fn test_flags_override_profile() {
        let args = Args::parse_from([
            "fieldsift",
            "page.html",
            "--timeout-ms",
            "1500",
            "--max-bytes",
            "4096",
            "--user-agent",
            "probe",
            "--source",
            "npb",
            "--archive",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.fetch.timeout_ms, 1500);
        assert_eq!(config.fetch.max_bytes, 4096);
        assert_eq!(config.fetch.user_agent, "probe");
        assert_eq!(config.source, "npb");
        assert!(config.archive);
    }
}
