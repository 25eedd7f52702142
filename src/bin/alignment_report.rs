use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use monotonic_align::alignment::report::{expansion_case_report, search_case_report};
use monotonic_align::{
    build_report, AlignerConfig, CaseMode, CaseReport, LikelihoodMatrix, MonotonicAligner,
    MonotonicAlignerBuilder, ValidExtent,
};
use serde::Deserialize;

#[path = "alignment_report/json_report_formatter.rs"]
mod json_report_formatter;
#[path = "alignment_report/text_report_formatter.rs"]
mod text_report_formatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "alignment_report")]
#[command(about = "Run monotonic alignment search or duration expansion over a JSON fixture")]
struct Args {
    /// Fixture with a `cases` array; each case holds `likelihood` or `log_durations`.
    #[arg(env = "MAS_REPORT_INPUT")]
    input: PathBuf,
    #[arg(long, env = "MAS_REPORT_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "MAS_REPORT_OUT")]
    out: Option<PathBuf>,
    #[arg(long, env = "MAS_REPORT_THREADS")]
    threads: Option<usize>,
    #[arg(
        long,
        env = "MAS_REPORT_FORMAT",
        value_enum,
        default_value_t = OutputFormat::Json
    )]
    output_format: OutputFormat,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    cases: Vec<FixtureCase>,
}

#[derive(Debug, Deserialize)]
struct FixtureCase {
    id: String,
    likelihood: Option<Vec<Vec<f32>>>,
    log_durations: Option<Vec<f32>>,
    x_len: Option<usize>,
    y_len: Option<usize>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => AlignerConfig::load(path).map_err(|err| err.to_string())?,
        None => AlignerConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.num_threads = threads;
    }
    let aligner = MonotonicAlignerBuilder::new(config)
        .build()
        .map_err(|err| err.to_string())?;

    let fixture = load_fixture(&args.input)?;
    if fixture.cases.is_empty() {
        return Err(format!("No cases in fixture '{}'.", args.input.display()));
    }

    let cases = fixture
        .cases
        .iter()
        .map(|case| run_case(&aligner, case))
        .collect::<Vec<_>>();
    let report = build_report(cases);

    match (args.output_format, args.out.as_ref()) {
        (OutputFormat::Json, Some(path)) => json_report_formatter::write_report(path, &report),
        (OutputFormat::Json, None) => json_report_formatter::print_report(&report),
        (OutputFormat::Text, Some(path)) => {
            fs::write(path, text_report_formatter::render(&report)).map_err(|err| {
                format!("Failed to write text report '{}': {err}", path.display())
            })
        }
        (OutputFormat::Text, None) => {
            print!("{}", text_report_formatter::render(&report));
            Ok(())
        }
    }
}

fn load_fixture(path: &Path) -> Result<Fixture, String> {
    let data = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read fixture '{}': {err}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|err| format!("Failed to parse fixture '{}': {err}", path.display()))
}

fn run_case(aligner: &MonotonicAligner, case: &FixtureCase) -> CaseReport {
    match (&case.likelihood, &case.log_durations) {
        (Some(rows), None) => {
            let likelihood = match LikelihoodMatrix::from_rows(rows.clone()) {
                Ok(likelihood) => likelihood,
                Err(err) => {
                    let extent = ValidExtent::new(rows.len(), 0);
                    return CaseReport::failed(&case.id, CaseMode::Search, extent, &err);
                }
            };
            let extent = ValidExtent::new(
                case.x_len.unwrap_or(likelihood.rows()),
                case.y_len.unwrap_or(likelihood.cols()),
            );
            let result = aligner.align(&likelihood, extent);
            search_case_report(&case.id, &likelihood, extent, &result)
        }
        (None, Some(log_durations)) => {
            let x_len = case.x_len.unwrap_or(log_durations.len());
            let result = aligner.expand_log_durations(log_durations, x_len);
            expansion_case_report(&case.id, x_len, &result)
        }
        _ => CaseReport {
            id: case.id.clone(),
            mode: CaseMode::Search,
            x_len: case.x_len.unwrap_or(0),
            y_len: case.y_len.unwrap_or(0),
            error: Some("case must set exactly one of `likelihood` or `log_durations`".to_string()),
            durations: Vec::new(),
            assignments: Vec::new(),
            score: None,
            notes: Vec::new(),
        },
    }
}
