//! Terminal display for whois-check.
//!
//! Aligned result tables, streaming result lines, the spinner, summaries
//! and the CSV rendering. Uses only the `console` crate for styling.

use console::{pad_str, style, Alignment, Term};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use whois_check_lib::{CheckConfig, LookupResult, LookupStatus, ProbeReport};

use crate::ErrorStats;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[char] = &['◐', '◓', '◑', '◒'];
const SPINNER_TICK: Duration = Duration::from_millis(120);

/// Progress indicator on stderr showing the message and elapsed seconds.
pub struct Spinner {
    stop_tx: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Spinner {
    /// Returns `None` when stderr is not a terminal.
    pub fn start(message: String) -> Option<Self> {
        let term = Term::stderr();
        if !term.is_term() {
            return None;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(SPINNER_TICK);

            for frame in SPINNER_FRAMES.iter().cycle() {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let line = format!(
                            "{} {} {}",
                            style(frame).cyan(),
                            message,
                            style(format!("{}s", started.elapsed().as_secs())).dim(),
                        );
                        let _ = term.clear_line();
                        let _ = term.write_str(&line);
                    }
                }
            }
            let _ = term.clear_line();
        });

        Some(Self { stop_tx, task })
    }

    /// Signal the task and wait until it has cleared its line.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.task.await;
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a streaming run.
pub fn print_header(domain_count: usize, config: &CheckConfig) {
    println!(
        "{} {} {}",
        style("whois-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "· Checking {} domain{}",
            domain_count,
            if domain_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let mut meta_parts = vec![
        format!("Concurrency: {}", config.concurrency),
        format!("Timeout: {}s", config.whois_timeout.as_secs_f64()),
    ];
    if let Some(deadline) = config.batch_deadline {
        meta_parts.push(format!("Deadline: {}s", deadline.as_secs_f64()));
    }
    if config.probe_dns || config.probe_http {
        meta_parts.push("Probes: on".to_string());
    }

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Single result line ───────────────────────────────────────────────────────

/// Print one result as soon as it is known.
///
/// If `counter` is Some((current, total)), a progress prefix like `[3/8]` is shown.
pub fn print_result(
    result: &LookupResult,
    show_probe: bool,
    debug: bool,
    counter: Option<(usize, usize)>,
) {
    let padded_domain = fit_cell(&result.domain, 30);
    let padded_status = pad_str(status_label(result.status), 10, Alignment::Left, None);

    let prefix = match counter {
        Some((cur, total)) => format!("{} ", style(format!("[{}/{}]", cur, total)).dim()),
        None => String::new(),
    };

    let detail = match result.status {
        LookupStatus::Registered => format_registration(result),
        LookupStatus::Unknown => brief_error(result),
        LookupStatus::Available => String::new(),
    };
    let probe = if show_probe {
        format!("  {}", format_probe(result.probe.as_ref()))
    } else {
        String::new()
    };

    println!(
        "  {}{}  {}  {}{}",
        prefix,
        style(padded_domain).white(),
        style_status(result.status, &padded_status),
        style(detail).dim(),
        style(probe).dim(),
    );

    if debug {
        print_timing(result, "    ");
    }
}

// ── Table ────────────────────────────────────────────────────────────────────

const MAX_COLUMN_WIDTH: usize = 40;

/// Print results as an aligned table, in the order given.
pub fn print_table(results: &[&LookupResult], show_probe: bool, debug: bool) {
    let headers = table_headers(show_probe);
    let rows: Vec<Vec<String>> = results.iter().map(|r| table_cells(r, show_probe)).collect();
    let widths = column_widths(&headers, &rows);

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad_str(h, *w, Alignment::Left, None).into_owned())
        .collect::<Vec<_>>()
        .join("  ");
    println!("  {}", style(header_line.trim_end()).bold());

    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    println!("  {}", style("─".repeat(rule_width)).dim());

    for (result, cells) in results.iter().zip(&rows) {
        let mut padded = render_row(cells, &widths);
        if let Some(status) = padded.get_mut(1) {
            *status = style_status(result.status, status.as_str());
        }
        let line = padded.join("  ");

        if result.status == LookupStatus::Unknown {
            println!("  {}  {}", line, style(brief_error(result)).dim());
        } else {
            println!("  {}", line);
        }

        if debug {
            print_timing(result, "    ");
        }
    }
}

fn table_headers(show_probe: bool) -> Vec<&'static str> {
    let mut headers = vec!["Domain", "Status", "Expires", "Registrar"];
    if show_probe {
        headers.extend(["DNS", "Website"]);
    }
    headers
}

/// Plain-text cells for one row.
fn table_cells(result: &LookupResult, show_probe: bool) -> Vec<String> {
    let mut cells = vec![
        result.domain.clone(),
        status_label(result.status).to_string(),
        result
            .expiration_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string()),
        result.registrar.clone().unwrap_or_else(|| "-".to_string()),
    ];

    if show_probe {
        let (dns, website) = match &result.probe {
            Some(probe) => (yes_no(Some(probe.has_dns)), yes_no(probe.has_website)),
            None => ("-", "-"),
        };
        cells.push(dns.to_string());
        cells.push(website.to_string());
    }

    cells
}

/// Cells padded to their column widths.
fn render_row(cells: &[String], widths: &[usize]) -> Vec<String> {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| fit_cell(cell, *width).into_owned())
        .collect()
}

/// Pad `cell` to `width`, cutting it with a `..` tail only when it is wider.
fn fit_cell(cell: &str, width: usize) -> Cow<'_, str> {
    let tail = if console::measure_text_width(cell) > width {
        Some("..")
    } else {
        None
    };
    pad_str(cell, width, Alignment::Left, tail)
}

/// Widest cell per column, capped at `MAX_COLUMN_WIDTH`.
fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(column, header)| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .map(|cell| console::measure_text_width(cell))
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(
    total: usize,
    available: usize,
    registered: usize,
    unknown: usize,
    duration: Duration,
) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", available)).green(),
        style("|").dim(),
        style(format!("{} registered", registered)).red(),
        style("|").dim(),
        style(format!("{} unknown", unknown)).yellow(),
    );
}

// ── Error summary ────────────────────────────────────────────────────────────

/// Print the categorized list of domains that could not be checked.
pub fn print_error_summary(error_stats: &ErrorStats) {
    if !error_stats.has_errors() {
        return;
    }

    println!("  {}", style("Some domains could not be checked:").yellow());
    for line in error_stats.summary_lines() {
        println!("  {} {}", style("•").dim(), line);
    }
}

// ── CSV ──────────────────────────────────────────────────────────────────────

/// Render results as CSV, one row per result, in the order given.
pub fn format_csv(results: &[LookupResult], show_probe: bool) -> String {
    let mut out = String::from("domain,status,expiration_date,registrar,error");
    if show_probe {
        out.push_str(",has_dns,has_website");
    }
    out.push('\n');

    for result in results {
        let status = match result.status {
            LookupStatus::Available => "available",
            LookupStatus::Registered => "registered",
            LookupStatus::Unknown => "unknown",
        };
        let expires = result
            .expiration_date
            .map(|d| d.to_string())
            .unwrap_or_default();

        let mut fields = vec![
            csv_field(&result.domain),
            Cow::Borrowed(status),
            Cow::Owned(expires),
            csv_field(result.registrar.as_deref().unwrap_or("")),
            csv_field(result.error.as_deref().unwrap_or("")),
        ];
        if show_probe {
            let probe = result.probe.unwrap_or_default();
            let probed = result.probe.is_some();
            fields.push(Cow::Borrowed(if probed { bool_str(probe.has_dns) } else { "" }));
            fields.push(Cow::Borrowed(match probe.has_website {
                Some(reachable) => bool_str(reachable),
                None => "",
            }));
        }

        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}

/// Quote a field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn status_label(status: LookupStatus) -> &'static str {
    match status {
        LookupStatus::Available => "AVAILABLE",
        LookupStatus::Registered => "REGISTERED",
        LookupStatus::Unknown => "UNKNOWN",
    }
}

fn style_status(status: LookupStatus, text: &str) -> String {
    match status {
        LookupStatus::Available => style(text).green().bold().to_string(),
        LookupStatus::Registered => style(text).red().bold().to_string(),
        LookupStatus::Unknown => style(text).yellow().to_string(),
    }
}

/// Expiry and registrar of a registered result, e.g. `expires 2030-01-01, Example Inc`.
fn format_registration(result: &LookupResult) -> String {
    let mut parts = Vec::new();
    if let Some(expires) = result.expiration_date {
        parts.push(format!("expires {}", expires));
    }
    if let Some(registrar) = &result.registrar {
        parts.push(registrar.clone());
    }
    parts.join(", ")
}

/// Short reason for an unknown status, e.g. `(timeout)`.
fn brief_error(result: &LookupResult) -> String {
    match result.error_kind {
        Some(kind) => format!("({})", kind),
        None => "(unknown status)".to_string(),
    }
}

fn format_probe(probe: Option<&ProbeReport>) -> String {
    match probe {
        Some(p) => format!(
            "dns: {}, website: {}",
            yes_no(Some(p.has_dns)),
            yes_no(p.has_website)
        ),
        None => "dns: -, website: -".to_string(),
    }
}

fn yes_no(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn print_timing(result: &LookupResult, indent: &str) {
    if let Some(duration) = result.check_duration {
        println!(
            "{}{} Checked in {}ms",
            indent,
            style("└─").dim(),
            duration.as_millis(),
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use whois_check_lib::{normalize_date, WhoisCheckError};

    fn registered() -> LookupResult {
        LookupResult::registered(
            "example.com",
            normalize_date("2030-01-15"),
            Some("Example Registrar, Inc.".to_string()),
        )
    }

    #[test]
    fn test_brief_error_uses_kind() {
        let timeout = LookupResult::unknown(
            "a.com",
            &WhoisCheckError::timeout("query", Duration::from_secs(3)),
        );
        assert_eq!(brief_error(&timeout), "(timeout)");

        let resolver = LookupResult::unknown("a.zz", &WhoisCheckError::resolver("zz", "unknown"));
        assert_eq!(brief_error(&resolver), "(unknown suffix)");
    }

    #[test]
    fn test_format_registration() {
        assert_eq!(
            format_registration(&registered()),
            "expires 2030-01-15, Example Registrar, Inc."
        );
        assert_eq!(
            format_registration(&LookupResult::registered("a.com", None, None)),
            ""
        );
    }

    #[test]
    fn test_table_cells_and_widths() {
        let available = LookupResult::available("a.io");
        let rows = vec![
            table_cells(&registered(), false),
            table_cells(&available, false),
        ];
        assert_eq!(rows[1], vec!["a.io", "AVAILABLE", "-", "-"]);

        let widths = column_widths(&table_headers(false), &rows);
        assert_eq!(widths, vec![11, 10, 10, 23]);
    }

    #[test]
    fn test_table_cells_with_probe() {
        let mut result = registered();
        result.probe = Some(ProbeReport {
            has_dns: true,
            has_website: None,
        });

        let cells = table_cells(&result, true);
        assert_eq!(&cells[4..], &["yes".to_string(), "-".to_string()]);

        let cells = table_cells(&LookupResult::available("a.io"), true);
        assert_eq!(&cells[4..], &["-".to_string(), "-".to_string()]);
    }

    #[test]
    fn test_rendered_row_keeps_cells_that_fit() {
        let rows = vec![
            table_cells(&registered(), false),
            table_cells(&LookupResult::available("a.io"), false),
        ];
        let widths = column_widths(&table_headers(false), &rows);

        let line = render_row(&rows[0], &widths).join("  ");
        assert_eq!(
            line,
            "example.com  REGISTERED  2030-01-15  Example Registrar, Inc."
        );
        assert!(!line.contains(".."));

        let line = render_row(&rows[1], &widths).join("  ");
        assert!(line.starts_with("a.io         AVAILABLE   -"));
    }

    #[test]
    fn test_fit_cell_truncates_only_wider_cells() {
        assert_eq!(fit_cell("REGISTERED", 10), "REGISTERED");
        assert_eq!(fit_cell("a.io", 6), "a.io  ");

        let long = "a".repeat(60);
        let cut = fit_cell(&long, MAX_COLUMN_WIDTH);
        assert_eq!(console::measure_text_width(&cut), MAX_COLUMN_WIDTH);
        assert!(cut.ends_with(".."));
    }

    #[test]
    fn test_column_width_is_capped() {
        let long = "a".repeat(60);
        let rows = vec![vec![long, "x".into(), "x".into(), "x".into()]];
        let widths = column_widths(&table_headers(false), &rows);
        assert_eq!(widths[0], MAX_COLUMN_WIDTH);
    }

    #[test]
    fn test_format_csv_quotes_fields() {
        let unknown = LookupResult::unknown(
            "a.zz",
            &WhoisCheckError::resolver("zz", "unknown suffix"),
        );
        let csv = format_csv(&[registered(), unknown], false);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "domain,status,expiration_date,registrar,error");
        assert_eq!(
            lines[1],
            "example.com,registered,2030-01-15,\"Example Registrar, Inc.\","
        );
        assert!(lines[2].starts_with("a.zz,unknown,,,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_format_csv_with_probe_columns() {
        let mut result = LookupResult::available("a.io");
        result.probe = Some(ProbeReport {
            has_dns: false,
            has_website: None,
        });

        let csv = format_csv(&[result, registered()], true);
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].ends_with(",has_dns,has_website"));
        assert_eq!(lines[1], "a.io,available,,,,false,");
        assert!(lines[2].ends_with(",,"));
    }

    #[test]
    fn test_csv_field_escaping() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
