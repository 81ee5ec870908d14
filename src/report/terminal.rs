use colored::Colorize;

use crate::rules::{InspectionResult, MatchGroup, Severity};

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// Show referencing locations under each group
    show_backrefs: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            show_backrefs: true,
        }
    }

    pub fn with_backrefs(mut self, show: bool) -> Self {
        self.show_backrefs = show;
        self
    }

    pub fn report(&self, results: &[InspectionResult]) {
        if results.is_empty() {
            println!("{}", "No defects found!".green().bold());
            return;
        }

        let total: usize = results.iter().map(InspectionResult::match_count).sum();
        println!();
        println!(
            "{}",
            format!("Found {} potential defects:", total).yellow().bold()
        );
        println!();

        for result in results {
            self.print_result(result);
            println!();
        }

        self.print_summary(results);
    }

    fn print_result(&self, result: &InspectionResult) {
        let severity_str = match result.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
        };

        println!(
            "{} [{}] {} {}",
            severity_str,
            result.id.dimmed(),
            result.message,
            format!("({})", result.category).dimmed()
        );

        for group in &result.groups {
            self.print_group(group);
        }
    }

    fn print_group(&self, group: &MatchGroup) {
        let count_suffix = if group.additional > 0 {
            format!(" +{} other", group.additional).dimmed().to_string()
        } else {
            String::new()
        };

        println!(
            "  {} {} = {} {}{}",
            "→".dimmed(),
            group.identity.white(),
            group.value,
            format!("[scope: {}]", group.scope).cyan(),
            count_suffix
        );

        if self.show_backrefs && !group.backrefs.is_empty() {
            println!("    {}", "referenced from:".dimmed());
            for backref in &group.backrefs {
                println!("      {}", backref.dimmed());
            }
        }

        if let Some(path) = &group.context_path {
            println!("    {} {}", "via:".dimmed(), path.dimmed());
        }
    }

    fn print_summary(&self, results: &[InspectionResult]) {
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

        println!("{}", "─".repeat(60).dimmed());

        let mut parts = Vec::new();
        if errors > 0 {
            parts.push(format!("{} errors", errors).red().to_string());
        }
        if warnings > 0 {
            parts.push(format!("{} warnings", warnings).yellow().to_string());
        }
        if infos > 0 {
            parts.push(format!("{} info", infos).blue().to_string());
        }
        println!("Summary: {}", parts.join(", "));
        println!();
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
