//! WHOIS Check CLI Application
//!
//! A command-line interface for bulk WHOIS lookups. Domains come from
//! arguments, a file or stdin; results are printed as a table, JSON or CSV.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use futures::StreamExt;
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::process;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use whois_check_lib::{
    load_env_config, parse_duration_string, CheckConfig, ConfigManager, DomainChecker, EnvConfig,
    ErrorKind, FileConfig, LookupResult, LookupStatus, ServerAddress,
};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for whois-check
#[derive(Parser, Debug)]
#[command(name = "whois-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Check domain registration status, expiry and registrar over WHOIS")]
#[command(
    long_about = "Check domain registration status over WHOIS (RFC 3912).\n\nResolves the registry server for each suffix, follows registrar referrals and reports availability, expiration date and registrar. Domains are read from arguments, a file, or stdin."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domain names to check (a single *.txt argument is read as a file)
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line, # starts a comment)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Output results in CSV format
    #[arg(long = "csv", help_heading = "Output Format")]
    pub csv: bool,

    /// Print each result as soon as it completes
    #[arg(long = "stream", help_heading = "Output Format")]
    pub stream: bool,

    /// List results in input order instead of available-first
    #[arg(long = "keep-order", help_heading = "Output Format")]
    pub keep_order: bool,

    /// Maximum concurrent lookups (1-100)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Lookup"
    )]
    pub concurrency: Option<usize>,

    /// Per-query timeout (e.g. 500ms, 8s, 1m)
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "DURATION",
        help_heading = "Lookup"
    )]
    pub timeout: Option<String>,

    /// Timeout for each referral hop
    #[arg(long = "referral-timeout", value_name = "DURATION", help_heading = "Lookup")]
    pub referral_timeout: Option<String>,

    /// Maximum registrar referrals to follow (0 disables)
    #[arg(long = "max-hops", value_name = "N", help_heading = "Lookup")]
    pub max_hops: Option<usize>,

    /// Give up on pending domains after this long
    #[arg(long = "deadline", value_name = "DURATION", help_heading = "Lookup")]
    pub deadline: Option<String>,

    /// Broker asked for suffixes missing from the built-in table
    #[arg(long = "broker", value_name = "HOST[:PORT]", help_heading = "Lookup")]
    pub broker: Option<String>,

    /// Route a suffix to a specific server (repeatable)
    #[arg(
        short = 's',
        long = "server",
        value_name = "SUFFIX=HOST[:PORT]",
        action = clap::ArgAction::Append,
        help_heading = "Lookup"
    )]
    pub servers: Vec<String>,

    /// Also report DNS resolution and website reachability
    #[arg(long = "probe", help_heading = "Lookup")]
    pub probe: bool,

    /// Use a specific config file instead of discovering one
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show progress details on stderr
    #[arg(short = 'v', long = "verbose", help_heading = "Debugging")]
    pub verbose: bool,

    /// Show lookup timings and debug logging
    #[arg(short = 'd', long = "debug", help_heading = "Debugging")]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Domains that could not be checked, grouped by error category.
#[derive(Debug, Default)]
pub struct ErrorStats {
    pub invalid_inputs: Vec<String>,
    pub unknown_suffixes: Vec<String>,
    pub timeouts: Vec<String>,
    pub network_errors: Vec<String>,
    pub parsing_errors: Vec<String>,
    pub rate_limited: Vec<String>,
    pub other_errors: Vec<String>,
}

impl ErrorStats {
    fn add_error(&mut self, domain: &str, kind: Option<ErrorKind>) {
        let domain = domain.to_string();
        match kind {
            Some(ErrorKind::Validation) => self.invalid_inputs.push(domain),
            Some(ErrorKind::Resolver) => self.unknown_suffixes.push(domain),
            Some(ErrorKind::Timeout) => self.timeouts.push(domain),
            Some(ErrorKind::Network) => self.network_errors.push(domain),
            Some(ErrorKind::Parse) => self.parsing_errors.push(domain),
            Some(ErrorKind::RateLimited) => self.rate_limited.push(domain),
            Some(ErrorKind::Config) | None => self.other_errors.push(domain),
        }
    }

    fn add_result(&mut self, result: &LookupResult) {
        if result.status == LookupStatus::Unknown {
            self.add_error(&result.domain, result.error_kind);
        }
    }

    fn has_errors(&self) -> bool {
        self.categories().iter().any(|(_, _, domains)| !domains.is_empty())
    }

    /// `(singular, plural, domains)` per category, in display order.
    fn categories(&self) -> [(&'static str, &'static str, &[String]); 7] {
        [
            ("invalid input", "invalid inputs", self.invalid_inputs.as_slice()),
            ("unknown suffix", "unknown suffixes", self.unknown_suffixes.as_slice()),
            ("timeout", "timeouts", self.timeouts.as_slice()),
            ("network error", "network errors", self.network_errors.as_slice()),
            ("unparseable response", "unparseable responses", self.parsing_errors.as_slice()),
            ("rate-limited lookup", "rate-limited lookups", self.rate_limited.as_slice()),
            ("other error", "other errors", self.other_errors.as_slice()),
        ]
    }

    /// One line per non-empty category, e.g. `2 timeouts: a.com, b.com`.
    fn summary_lines(&self) -> Vec<String> {
        let format_domain_list = |domains: &[String], max_show: usize| -> String {
            if domains.len() <= max_show {
                domains.join(", ")
            } else {
                let shown = &domains[..max_show];
                let remaining = domains.len() - max_show;
                format!("{}, ... and {} more", shown.join(", "), remaining)
            }
        };

        self.categories()
            .into_iter()
            .filter(|(_, _, domains)| !domains.is_empty())
            .map(|(singular, plural, domains)| {
                let label = if domains.len() == 1 { singular } else { plural };
                format!(
                    "{} {}: {}",
                    domains.len(),
                    label,
                    format_domain_list(domains, 5)
                )
            })
            .collect()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(&args);

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "whois-check starting");

    if let Err(e) = run_whois_check(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over the flags.
fn init_tracing(args: &Args) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,whois_check={level},whois_check_lib={level}",
            level = level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.json && args.csv {
        return Err("Cannot specify multiple output formats (--json, --csv)".to_string());
    }

    if args.stream && (args.json || args.csv) {
        return Err("Cannot use --stream with --json or --csv".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if !(1..=100).contains(&concurrency) {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    for (flag, value) in [
        ("--timeout", &args.timeout),
        ("--referral-timeout", &args.referral_timeout),
        ("--deadline", &args.deadline),
    ] {
        if let Some(value) = value {
            parse_duration_arg(flag, value)?;
        }
    }

    if let Some(broker) = &args.broker {
        ServerAddress::parse(broker).map_err(|e| format!("Invalid --broker: {}", e))?;
    }

    for server in &args.servers {
        parse_server_override(server)?;
    }

    Ok(())
}

fn parse_duration_arg(flag: &str, value: &str) -> Result<Duration, String> {
    parse_duration_string(value)
        .ok_or_else(|| format!("Invalid {} '{}' (use e.g. 500ms, 5s, 2m)", flag, value))
}

/// Parse `SUFFIX=HOST[:PORT]`.
fn parse_server_override(value: &str) -> Result<(String, ServerAddress), String> {
    let (suffix, server) = value
        .split_once('=')
        .ok_or_else(|| format!("Invalid --server '{}', expected SUFFIX=HOST[:PORT]", value))?;

    let suffix = suffix.trim().trim_start_matches('.').to_lowercase();
    if suffix.is_empty() {
        return Err(format!("Invalid --server '{}': empty suffix", value));
    }

    let server = ServerAddress::parse(server.trim())
        .map_err(|e| format!("Invalid --server '{}': {}", value, e))?;

    Ok((suffix, server))
}

/// Main lookup logic
async fn run_whois_check(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let file_config = load_file_config(&args, &env_config)?;

    let config = build_config(&args, &file_config, &env_config)?;
    let format = resolve_output_format(&args, &env_config, &file_config);
    let sort = !args.keep_order
        && file_config
            .output
            .as_ref()
            .and_then(|o| o.sort)
            .unwrap_or(true);

    let domains = get_domains_to_check(&args, &env_config)?;
    debug!(domains = domains.len(), ?format, sort, "inputs collected");

    let checker = DomainChecker::with_config(config);

    if args.stream && format == OutputFormat::Table {
        run_streaming_check(&checker, &domains, &args).await;
    } else {
        if args.stream {
            warn!("--stream only applies to table output, collecting results first");
        }
        run_batch_check(&checker, &domains, &args, format, sort).await?;
    }

    Ok(())
}

/// `--config` or `WC_CONFIG` replaces discovery; an explicit file must load.
fn load_file_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new();

    let explicit = args.config.as_ref().or(env_config.config.as_ref());
    match explicit {
        Some(path) => {
            info!(path = %path, "using explicit config file");
            let file_config = config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;
            Ok(file_config)
        }
        None => Ok(config_manager.discover_and_load()),
    }
}

/// Build CheckConfig with precedence (highest to lowest):
/// CLI arguments, environment variables (WC_*), config files, built-in defaults.
fn build_config(
    args: &Args,
    file_config: &FileConfig,
    env_config: &EnvConfig,
) -> Result<CheckConfig, Box<dyn std::error::Error>> {
    let config = file_config.apply(CheckConfig::default())?;
    let config = env_config.apply(config);
    let config = apply_cli_args_to_config(config, args)?;
    Ok(config)
}

/// Apply CLI arguments to config (highest precedence).
///
/// Only flags the user actually passed override earlier layers.
fn apply_cli_args_to_config(mut config: CheckConfig, args: &Args) -> Result<CheckConfig, String> {
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(timeout) = &args.timeout {
        config = config.with_timeout(parse_duration_arg("--timeout", timeout)?);
    }
    if let Some(timeout) = &args.referral_timeout {
        config = config.with_referral_timeout(parse_duration_arg("--referral-timeout", timeout)?);
    }
    if let Some(hops) = args.max_hops {
        config = config.with_max_referral_hops(hops);
    }
    if let Some(deadline) = &args.deadline {
        config = config.with_batch_deadline(Some(parse_duration_arg("--deadline", deadline)?));
    }
    if let Some(broker) = &args.broker {
        let broker = ServerAddress::parse(broker).map_err(|e| format!("Invalid --broker: {}", e))?;
        config = config.with_broker(broker);
    }
    for server in &args.servers {
        let (suffix, server) = parse_server_override(server)?;
        config = config.with_server(suffix, server);
    }
    if args.probe {
        config = config.with_probes(true, true);
    }

    Ok(config)
}

/// CLI flags, then `WC_JSON`/`WC_CSV`, then `[output] default_format`.
fn resolve_output_format(
    args: &Args,
    env_config: &EnvConfig,
    file_config: &FileConfig,
) -> OutputFormat {
    if args.json {
        return OutputFormat::Json;
    }
    if args.csv {
        return OutputFormat::Csv;
    }

    if env_config.has_output_format_conflict() {
        warn!("both WC_JSON and WC_CSV are set, ignoring both");
    } else if env_config.json == Some(true) {
        return OutputFormat::Json;
    } else if env_config.csv == Some(true) {
        return OutputFormat::Csv;
    }

    match file_config
        .output
        .as_ref()
        .and_then(|o| o.default_format.as_deref())
    {
        Some("json") => OutputFormat::Json,
        Some("csv") => OutputFormat::Csv,
        _ => OutputFormat::Table,
    }
}

/// Collect the domains to check from arguments, a file, `WC_FILE`, or stdin.
fn get_domains_to_check(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let (mut domains, positional_file) = split_positional_file(&args.domains);

    let file = args
        .file
        .clone()
        .or(positional_file)
        .or_else(|| env_config.file.clone());

    if let Some(path) = &file {
        info!(path = %path, "reading domains from file");
        domains.extend(read_domains_from_file(path)?);
    } else if domains.is_empty() {
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(
                "You must specify domain names, a file with --file, or pipe domains on stdin"
                    .into(),
            );
        }
        let mut content = String::new();
        stdin.read_to_string(&mut content)?;
        domains.extend(parse_domain_lines(&content));
    }

    if domains.is_empty() {
        return Err("No domains found to check".into());
    }

    Ok(domains)
}

/// A lone positional argument ending in `.txt` names an input file.
fn split_positional_file(domains: &[String]) -> (Vec<String>, Option<String>) {
    match domains {
        [single] if single.to_lowercase().ends_with(".txt") => (Vec::new(), Some(single.clone())),
        _ => (domains.to_vec(), None),
    }
}

/// Read domains from a file
fn read_domains_from_file(file_path: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {}", file_path).into());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", file_path, e))?;
    let domains = parse_domain_lines(&content);

    if domains.is_empty() {
        return Err(format!("No domains found in file: {}", file_path).into());
    }

    Ok(domains)
}

/// One domain per line; blank lines and `#` comments are skipped.
fn parse_domain_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let domain = line.split('#').next().unwrap_or("").trim();
            if domain.is_empty() {
                None
            } else {
                Some(domain.to_string())
            }
        })
        .collect()
}

/// Run in streaming mode, printing each result as it completes
async fn run_streaming_check(checker: &DomainChecker, domains: &[String], args: &Args) {
    let show_probe = probes_enabled(checker.config());
    let total = domains.len();

    if total > 1 {
        ui::print_header(total, checker.config());
    }

    let mut error_stats = ErrorStats::default();
    let mut tally = Tally::default();
    let mut completed = 0usize;
    let start_time = Instant::now();

    let mut stream = checker.check_domains_stream(domains);
    while let Some((_, result)) = stream.next().await {
        completed += 1;
        tally.add(&result);
        error_stats.add_result(&result);

        let counter = if total > 1 {
            Some((completed, total))
        } else {
            None
        };
        ui::print_result(&result, show_probe, args.debug, counter);
    }

    if total > 1 {
        println!();
        ui::print_summary(
            total,
            tally.available,
            tally.registered,
            tally.unknown,
            start_time.elapsed(),
        );
        if error_stats.has_errors() {
            println!();
            ui::print_error_summary(&error_stats);
        }
    }
}

/// Run in batch mode (collect all results first)
async fn run_batch_check(
    checker: &DomainChecker,
    domains: &[String],
    args: &Args,
    format: OutputFormat,
    sort: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = if format == OutputFormat::Table && domains.len() > 1 {
        ui::Spinner::start(format!("Checking {} domains...", domains.len()))
    } else {
        None
    };

    let start_time = Instant::now();
    let results = checker.check_domains(domains).await;
    let duration = start_time.elapsed();

    if let Some(s) = spinner {
        s.stop().await;
    }

    let show_probe = probes_enabled(checker.config());
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Csv => print!("{}", ui::format_csv(&results, show_probe)),
        OutputFormat::Table => {
            display_table_results(&results, show_probe, args.debug, sort, duration)
        }
    }

    Ok(())
}

fn display_table_results(
    results: &[LookupResult],
    show_probe: bool,
    debug: bool,
    sort: bool,
    duration: Duration,
) {
    let ordered = display_order(results, sort);
    ui::print_table(&ordered, show_probe, debug);

    if results.len() > 1 {
        let mut tally = Tally::default();
        let mut error_stats = ErrorStats::default();
        for result in results {
            tally.add(result);
            error_stats.add_result(result);
        }

        println!();
        ui::print_summary(
            results.len(),
            tally.available,
            tally.registered,
            tally.unknown,
            duration,
        );
        if error_stats.has_errors() {
            println!();
            ui::print_error_summary(&error_stats);
        }
    }
}

/// Available first, then registered, then unknown; input order within each group.
fn display_order(results: &[LookupResult], sort: bool) -> Vec<&LookupResult> {
    let mut ordered: Vec<&LookupResult> = results.iter().collect();
    if sort {
        ordered.sort_by_key(|r| match r.status {
            LookupStatus::Available => 0,
            LookupStatus::Registered => 1,
            LookupStatus::Unknown => 2,
        });
    }
    ordered
}

fn probes_enabled(config: &CheckConfig) -> bool {
    config.probe_dns || config.probe_http
}

#[derive(Debug, Default)]
struct Tally {
    available: usize,
    registered: usize,
    unknown: usize,
}

impl Tally {
    fn add(&mut self, result: &LookupResult) {
        match result.status {
            LookupStatus::Available => self.available += 1,
            LookupStatus::Registered => self.registered += 1,
            LookupStatus::Unknown => self.unknown += 1,
        }
    }
}
