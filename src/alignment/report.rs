use serde::Serialize;

use crate::alignment::search::path_score;
use crate::error::AlignmentError;
use crate::pipeline::runtime::Expansion;
use crate::types::{AlignmentPath, LikelihoodMatrix, ValidExtent};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub case_count: usize,
    pub failed_count: usize,
    pub total_units: usize,
    pub total_frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    Search,
    Expand,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub id: String,
    pub mode: CaseMode,
    pub x_len: usize,
    pub y_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Frames per source unit, padding units included.
    pub durations: Vec<usize>,
    /// Source unit of each valid frame, in frame order.
    pub assignments: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub notes: Vec<String>,
}

impl CaseReport {
    pub fn failed(id: &str, mode: CaseMode, extent: ValidExtent, err: &AlignmentError) -> Self {
        Self {
            id: id.to_string(),
            mode,
            x_len: extent.x_len,
            y_len: extent.y_len,
            error: Some(err.to_string()),
            durations: Vec::new(),
            assignments: Vec::new(),
            score: None,
            notes: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub fn search_case_report(
    id: &str,
    likelihood: &LikelihoodMatrix,
    extent: ValidExtent,
    result: &Result<AlignmentPath, AlignmentError>,
) -> CaseReport {
    let path = match result {
        Ok(path) => path,
        Err(err) => return CaseReport::failed(id, CaseMode::Search, extent, err),
    };
    let mut notes = Vec::new();
    if let Err(err) = path.validate(extent) {
        notes.push(format!("structural check failed: {err}"));
    }
    let score = match path_score(likelihood, path) {
        Ok(score) => Some(score),
        Err(err) => {
            notes.push(format!("score unavailable: {err}"));
            None
        }
    };
    CaseReport {
        id: id.to_string(),
        mode: CaseMode::Search,
        x_len: extent.x_len,
        y_len: extent.y_len,
        error: None,
        durations: path.durations().into_inner(),
        assignments: path.assignments().into_iter().flatten().collect(),
        score,
        notes,
    }
}

pub fn expansion_case_report(
    id: &str,
    x_len: usize,
    result: &Result<Expansion, AlignmentError>,
) -> CaseReport {
    let expansion = match result {
        Ok(expansion) => expansion,
        Err(err) => {
            return CaseReport::failed(id, CaseMode::Expand, ValidExtent::new(x_len, 0), err)
        }
    };
    CaseReport {
        id: id.to_string(),
        mode: CaseMode::Expand,
        x_len,
        y_len: expansion.durations.total(),
        error: None,
        durations: expansion.durations.as_slice().to_vec(),
        assignments: expansion.path.assignments().into_iter().flatten().collect(),
        score: None,
        notes: Vec::new(),
    }
}

pub fn build_report(cases: Vec<CaseReport>) -> Report {
    let ok = cases.iter().filter(|c| c.is_ok());
    let (total_units, total_frames) = ok.fold((0, 0), |(units, frames), c| {
        (units + c.x_len, frames + c.y_len)
    });
    Report {
        schema_version: SCHEMA_VERSION,
        meta: Meta {
            case_count: cases.len(),
            failed_count: cases.iter().filter(|c| !c.is_ok()).count(),
            total_units,
            total_frames,
        },
        cases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::search::search_extent;

    #[test]
    fn search_report_carries_durations_and_score() {
        let likelihood = LikelihoodMatrix::from_rows(vec![
            vec![-0.1, -0.2, -5.0],
            vec![-5.0, -5.0, -0.3],
        ])
        .unwrap();
        let extent = likelihood.full_extent();
        let result = search_extent(&likelihood, extent);
        let case = search_case_report("utt", &likelihood, extent, &result);

        assert!(case.is_ok());
        assert_eq!(case.durations, vec![2, 1]);
        assert_eq!(case.assignments, vec![0, 0, 1]);
        assert!((case.score.unwrap() + 0.6).abs() < 1e-6);
        assert!(case.notes.is_empty());
    }

    #[test]
    fn failed_case_counts_in_meta() {
        let likelihood = LikelihoodMatrix::from_rows(vec![vec![0.0], vec![0.0]]).unwrap();
        let extent = likelihood.full_extent();
        let result = search_extent(&likelihood, extent);
        let report = build_report(vec![search_case_report("short", &likelihood, extent, &result)]);

        assert_eq!(report.meta.case_count, 1);
        assert_eq!(report.meta.failed_count, 1);
        assert_eq!(report.meta.total_frames, 0);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cases"][0]["mode"], "search");
        assert!(json["cases"][0]["error"].is_string());
    }
}
