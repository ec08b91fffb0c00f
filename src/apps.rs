use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::config::{BucketWidth, Credentials, ExplorerConfig};
use crate::errors::ExplorerError;
use crate::export::write_csv;
use crate::pipeline::{AggregateView, Dashboard, DashboardView, PageLayout};
use crate::source::utilities::date_helpers::{format_bucket, parse_date};
use crate::transport::http::{HttpTransport, UreqTransport};
use crate::types::{CategoryValue, FieldName};
use crate::utils::{format_count_with_commas, split_list_arg};
use crate::view::{Page, UiEvent, ViewState};

const CATEGORY_ROWS_SHOWN: usize = 15;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PageArg {
    Home,
    Models,
    Datasets,
    Benchmarks,
    News,
}

impl From<PageArg> for Page {
    fn from(value: PageArg) -> Self {
        match value {
            PageArg::Home => Page::Home,
            PageArg::Models => Page::Models,
            PageArg::Datasets => Page::Datasets,
            PageArg::Benchmarks => Page::Benchmarks,
            PageArg::News => Page::News,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BucketArg {
    Day,
    Month,
}

impl From<BucketArg> for BucketWidth {
    fn from(value: BucketArg) -> Self {
        match value {
            BucketArg::Day => BucketWidth::Day,
            BucketArg::Month => BucketWidth::Month,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "hf_explorer",
    disable_help_subcommand = true,
    about = "Explore Hugging Face models, datasets, leaderboard benchmarks, and AI news",
    long_about = concat!(
        "Fetch one dashboard page, apply filters, and print its aggregate views. ",
        "The filtered table can be exported as CSV."
    ),
    after_help = concat!(
        "HF_TOKEN is sent to Hugging Face endpoints when set. ",
        "The news page requires EVENT_REGISTRY_API_KEY."
    )
)]
/// CLI for `hf_explorer`.
///
/// Common usage:
/// - Models created per month: `--page models --limit 500`
/// - Tag filter: `--page models --select pipeline_tag=text-generation,fill-mask`
/// - Positive news only, per day: `--page news --range sentiment=0..1 --bucket day`
/// - Export what is shown: `--page benchmarks --search llama --csv /tmp/llama.csv`
struct DashboardCli {
    #[arg(long, value_enum, default_value = "models", help = "Dashboard page to render")]
    page: PageArg,
    #[arg(
        long,
        value_parser = parse_positive_usize,
        help = "Maximum number of upstream rows to fetch"
    )]
    limit: Option<usize>,
    #[arg(
        long = "select",
        value_name = "FIELD=A,B",
        value_parser = parse_selection_arg,
        help = concat!(
            "Keep records whose FIELD is one of the listed values; repeat per field. ",
            "`FIELD=` selects nothing"
        )
    )]
    selections: Vec<(FieldName, Vec<CategoryValue>)>,
    #[arg(
        long = "range",
        value_name = "FIELD=LO..HI",
        value_parser = parse_range_arg,
        help = "Keep records whose numeric FIELD lies in [LO, HI]; repeat per field"
    )]
    ranges: Vec<(FieldName, f64, f64)>,
    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        value_parser = parse_date_arg,
        help = "First day of the period (inclusive)"
    )]
    since: Option<NaiveDate>,
    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        value_parser = parse_date_arg,
        help = "Last day of the period (inclusive)"
    )]
    until: Option<NaiveDate>,
    #[arg(long, help = "Case-insensitive search in the page's name/title field")]
    search: Option<String>,
    #[arg(
        long,
        value_enum,
        default_value = "month",
        help = "Calendar bucket for time-series views"
    )]
    bucket: BucketArg,
    #[arg(
        long = "metric",
        value_name = "NAME",
        help = "Metric for the top-performer trend; repeat as needed"
    )]
    metrics: Vec<String>,
    #[arg(long, value_name = "PATH", help = "Write the filtered table as CSV to PATH")]
    csv: Option<PathBuf>,
    #[arg(long, help = "Print the view as JSON instead of text")]
    json: bool,
}

impl DashboardCli {
    fn config(&self, credentials: Credentials) -> ExplorerConfig {
        let mut config = ExplorerConfig {
            credentials,
            ..ExplorerConfig::default()
        };
        if let Some(limit) = self.limit {
            config.hub.row_limit = limit;
            config.leaderboard.row_limit = Some(limit);
            let per_page = config.news.articles_per_page.max(1);
            config.news.max_pages = limit.div_ceil(per_page).max(1);
        }
        config
    }

    fn events(&self) -> Vec<UiEvent> {
        let mut events = vec![
            UiEvent::Navigate(self.page.into()),
            UiEvent::SetBucket(self.bucket.into()),
        ];
        for (field, values) in &self.selections {
            events.push(UiEvent::Select {
                field: field.clone(),
                values: values.clone(),
            });
        }
        for (field, lo, hi) in &self.ranges {
            events.push(UiEvent::SetRange {
                field: field.clone(),
                lo: *lo,
                hi: *hi,
            });
        }
        if self.since.is_some() || self.until.is_some() {
            let start = self.since.unwrap_or_default();
            let end = self.until.unwrap_or_else(|| Utc::now().date_naive());
            events.push(UiEvent::SetPeriod { start, end });
        }
        if let Some(search) = &self.search {
            events.push(UiEvent::Search(search.clone()));
        }
        if !self.metrics.is_empty() {
            events.push(UiEvent::SelectMetrics(self.metrics.clone()));
        }
        events
    }
}

/// Parse args, fetch the requested page over HTTP, and print it to stdout.
pub fn run_dashboard<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let defaults = ExplorerConfig::default();
    let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::new(&defaults.fetch));
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_dashboard_with(args_iter, Credentials::from_env(), transport, &mut out)
}

/// `run_dashboard` with injected credentials, transport, and output.
pub fn run_dashboard_with<I, W>(
    args_iter: I,
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    out: &mut W,
) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
    W: Write,
{
    let Some(cli) =
        parse_cli::<DashboardCli, _>(std::iter::once("hf_explorer".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let config = cli.config(credentials);
    let dashboard = Dashboard::from_config(&config, transport);
    let state = ViewState::default().apply_all(cli.events());
    let view = dashboard.view(&state);

    if cli.json {
        serde_json::to_writer_pretty(&mut *out, &view)?;
        writeln!(out)?;
    } else {
        print_view(out, &view, &state)?;
    }

    if let Some(path) = &cli.csv {
        write_csv(&view.filtered, path)?;
        writeln!(
            out,
            "Wrote {} rows to {}",
            format_count_with_commas(view.filtered.len() as u128),
            path.display()
        )?;
    }
    Ok(())
}

fn print_view<W: Write>(
    out: &mut W,
    view: &DashboardView,
    state: &ViewState,
) -> std::io::Result<()> {
    let layout = PageLayout::for_page(state.page());
    writeln!(out, "== {} ==", layout.title)?;
    if state.page() == Page::Home {
        writeln!(out, "Pages: models, datasets, benchmarks, news (select with --page).")?;
        return Ok(());
    }
    if let Some(notice) = &view.notice {
        writeln!(out, "{notice}")?;
    }
    writeln!(
        out,
        "{} records after filters",
        format_count_with_commas(view.filtered.len() as u128)
    )?;
    for aggregate in &view.aggregates {
        writeln!(out)?;
        writeln!(out, "-- {} --", aggregate.title())?;
        print_aggregate(out, aggregate, state.bucket())?;
    }
    Ok(())
}

fn print_aggregate<W: Write>(
    out: &mut W,
    aggregate: &AggregateView,
    width: BucketWidth,
) -> std::io::Result<()> {
    match aggregate {
        AggregateView::CategoryCounts { counts, .. } => {
            for (category, count) in counts.iter().take(CATEGORY_ROWS_SHOWN) {
                writeln!(out, "  {category}: {}", format_count_with_commas(*count as u128))?;
            }
            if counts.len() > CATEGORY_ROWS_SHOWN {
                writeln!(out, "  ... {} more", counts.len() - CATEGORY_ROWS_SHOWN)?;
            }
        }
        AggregateView::TopPerBucket { leaders, .. } => {
            for leader in leaders {
                writeln!(
                    out,
                    "  {} {}: {:.2} ({})",
                    leader.metric,
                    format_bucket(leader.bucket, width),
                    leader.value,
                    leader.record.id
                )?;
            }
        }
        AggregateView::Cumulative { points, .. } => match points.last() {
            Some(last) => writeln!(
                out,
                "  {} points, running total {:.0} at {}",
                points.len(),
                last.running_total,
                last.timestamp.date_naive()
            )?,
            None => writeln!(out, "  no data")?,
        },
        AggregateView::BucketCounts { counts, .. } => {
            for entry in counts {
                writeln!(out, "  {}: {}", format_bucket(entry.bucket, width), entry.count)?;
            }
        }
        AggregateView::CategoryStats { stats, .. } => {
            for stat in stats {
                writeln!(out, "  {}: n={} mean={}", stat.key, stat.count, format_mean(stat.mean))?;
            }
        }
        AggregateView::BucketStats { stats, .. } => {
            for stat in stats {
                writeln!(
                    out,
                    "  {}: n={} mean={}",
                    format_bucket(stat.key, width),
                    stat.count,
                    format_mean(stat.mean)
                )?;
            }
        }
        AggregateView::Summary { summary, .. } => match summary {
            Some(s) => writeln!(
                out,
                "  n={} min={:.2} q1={:.2} median={:.2} q3={:.2} max={:.2} mean={:.2}",
                s.count, s.min, s.q1, s.median, s.q3, s.max, s.mean
            )?,
            None => writeln!(out, "  no data")?,
        },
        AggregateView::Scatter {
            points,
            correlation,
            ..
        } => writeln!(
            out,
            "  {} points, pearson r = {}",
            points.len(),
            correlation.map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"))
        )?,
    }
    Ok(())
}

fn format_mean(mean: Option<f64>) -> String {
    mean.map_or_else(|| "n/a".to_string(), |value| format!("{value:.3}"))
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse --limit value '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("--limit must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn split_field_arg(raw: &str) -> Result<(&str, &str), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field, value))
}

fn parse_selection_arg(raw: &str) -> Result<(FieldName, Vec<CategoryValue>), String> {
    let (field, values) = split_field_arg(raw)?;
    Ok((field.to_string(), split_list_arg(values)))
}

fn parse_range_arg(raw: &str) -> Result<(FieldName, f64, f64), ExplorerError> {
    let (field, bounds) = split_field_arg(raw).map_err(ExplorerError::Configuration)?;
    let (lo, hi) = bounds.split_once("..").ok_or_else(|| {
        ExplorerError::Configuration(format!("expected LO..HI for '{field}', got '{bounds}'"))
    })?;
    // An empty side is an open bound; spelled-out `inf`/`NaN` are rejected.
    let parse_bound = |text: &str, open: f64| -> Result<f64, ExplorerError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(open);
        }
        text.parse::<f64>()
            .ok()
            .filter(|bound| bound.is_finite())
            .ok_or_else(|| {
                ExplorerError::Configuration(format!(
                    "invalid bound '{text}' for '{field}': must be a finite number"
                ))
            })
    };
    Ok((
        field.to_string(),
        parse_bound(lo, f64::NEG_INFINITY)?,
        parse_bound(hi, f64::INFINITY)?,
    ))
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("invalid date '{raw}': expected YYYY-MM-DD"))
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
