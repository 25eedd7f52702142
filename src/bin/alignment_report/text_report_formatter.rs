use std::fmt::Write as _;

use monotonic_align::{CaseMode, CaseReport, Report};

/// One block per case: a header line, then the path drawn as a unit × frame grid.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "cases={} failed={} units={} frames={}",
        report.meta.case_count,
        report.meta.failed_count,
        report.meta.total_units,
        report.meta.total_frames
    );
    for case in &report.cases {
        out.push('\n');
        render_case(&mut out, case);
    }
    out
}

fn render_case(out: &mut String, case: &CaseReport) {
    let mode = match case.mode {
        CaseMode::Search => "search",
        CaseMode::Expand => "expand",
    };
    if let Some(error) = &case.error {
        let _ = writeln!(out, "{} [{mode}] FAILED: {error}", case.id);
        return;
    }

    let score = case
        .score
        .map(|s| format!(" score={s:.3}"))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "{} [{mode}] x_len={} y_len={} durations={:?}{score}",
        case.id, case.x_len, case.y_len, case.durations
    );
    for unit in 0..case.x_len {
        let row: String = case
            .assignments
            .iter()
            .map(|&assigned| if assigned == unit { '#' } else { '.' })
            .collect();
        let _ = writeln!(out, "  {unit:>4} {row}");
    }
    for note in &case.notes {
        let _ = writeln!(out, "  note: {note}");
    }
}
