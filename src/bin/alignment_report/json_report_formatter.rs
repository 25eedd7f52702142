use std::fs;
use std::path::Path;

use monotonic_align::Report;

fn to_json(report: &Report) -> Result<String, String> {
    let mut json = serde_json::to_string_pretty(report)
        .map_err(|err| format!("Failed to serialize alignment report: {err}"))?;
    json.push('\n');
    Ok(json)
}

pub fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    let json = to_json(report)?;
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|err| format!("Cannot create report directory '{}': {err}", dir.display()))?;
    }
    fs::write(path, json)
        .map_err(|err| format!("Cannot write alignment report '{}': {err}", path.display()))
}

pub fn print_report(report: &Report) -> Result<(), String> {
    print!("{}", to_json(report)?);
    Ok(())
}
