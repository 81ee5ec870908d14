use std::path::PathBuf;

use serde::Serialize;

use crate::rules::{InspectionResult, Severity};

use super::ReportError;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, results: &[InspectionResult]) -> Result<(), ReportError> {
        let report = JsonReport::from_results(results);
        let json = serde_json::to_string_pretty(&report)?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json)?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    total_matches: usize,
    results: &'a [InspectionResult],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    errors: usize,
    warnings: usize,
    infos: usize,
}

impl<'a> JsonReport<'a> {
    fn from_results(results: &'a [InspectionResult]) -> Self {
        let mut errors = 0;
        let mut warnings = 0;
        let mut infos = 0;
        for result in results {
            let count = result.match_count();
            match result.severity {
                Severity::Error => errors += count,
                Severity::Warning => warnings += count,
                Severity::Info => infos += count,
            }
        }
        Self {
            version: "1.0",
            total_matches: errors + warnings + infos,
            results,
            summary: JsonSummary {
                errors,
                warnings,
                infos,
            },
        }
    }
}
