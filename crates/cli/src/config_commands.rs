use std::path::Path;

use {anyhow::Result, clap::Subcommand, secrecy::Secret};

use voxrelay_config::{
    VoxrelayConfig,
    validate::{self, Diagnostic, Severity},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and the effective settings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration (token redacted).
    Show,
}

pub fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config_path, verbose),
        ConfigAction::Show => show(config_path),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let mut result = validate::validate(config_path);

    // Print which file we're checking
    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    // The token and URLs may come from the environment, so also check what
    // the bot would actually run with.
    if !result.has_errors() {
        let effective = crate::load_effective_config(config_path)?;
        let extra: Vec<Diagnostic> = validate::validate_config(&effective)
            .into_iter()
            .filter(|d| !result.diagnostics.contains(d))
            .collect();
        result.diagnostics.extend(extra);
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        print_diagnostic(d);
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_diagnostic(d: &Diagnostic) {
    let (color, label) = match d.severity {
        Severity::Error => (RED, "error"),
        Severity::Warning => (YELLOW, "warning"),
        Severity::Info => (CYAN, "info"),
    };

    if d.path.is_empty() {
        eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
    } else {
        eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
    }
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let config = crate::load_effective_config(config_path)?;
    print!("{}", render_redacted(config)?);
    Ok(())
}

/// Effective config as TOML with the bot token masked.
fn render_redacted(mut config: VoxrelayConfig) -> Result<String> {
    if config.telegram.has_token() {
        config.telegram.token = Secret::new("[REDACTED]".into());
    }
    Ok(toml::to_string_pretty(&config)?)
}
