//! Command-line surface
//!
//! Argument definitions, translation of arguments into [`Operation`]s and
//! [`FilterSet`]s, console rendering of results, and the exit-code contract.

use crate::pipeline::PipelineOptions;
use crate::report::{FailureClass, ReportAggregator};
use crate::result::ProcessResult;
use clap::{Parser, ValueEnum};
use mtag_common::{
    AliasTable, EditorConfig, Error, FieldMap, Filter, FilterSet, Operation, Result, Schema,
};
use std::fmt::Write as _;
use std::path::PathBuf;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_NO_FILES: i32 = 3;
pub const EXIT_PERMISSION: i32 = 4;
pub const EXIT_DISK_FULL: i32 = 5;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Batches up to this size print per-file details without `--verbose`
pub const DETAIL_LIMIT: usize = 10;

/// Command-line arguments for mtag
#[derive(Parser, Debug)]
#[command(name = "mtag")]
#[command(about = "Batch audio tag editor")]
#[command(version)]
pub struct Args {
    /// File or directory to process
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Operation to apply
    #[arg(short, long, value_enum)]
    pub operation: OperationArg,

    /// Comma-separated fields the operation targets
    #[arg(short, long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Value for write, append, prefix, enlist and delist
    #[arg(short, long)]
    pub value: Option<String>,

    /// Text (or regex with --regex) to find
    #[arg(long)]
    pub find: Option<String>,

    /// Replacement for --find
    #[arg(long)]
    pub replace: Option<String>,

    /// Treat --find as a regular expression
    #[arg(long)]
    pub regex: bool,

    /// Item delimiter for list values
    #[arg(short, long)]
    pub delimiter: Option<String>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Comma-separated extensions to include
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Plan and report without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Directory for pre-write backups
    #[arg(long = "backup", value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Remove backups of files that were written and verified
    #[arg(long)]
    pub delete_backups: bool,

    /// Use numbered backup names instead of failing on a name clash
    #[arg(long)]
    pub force: bool,

    /// Skip re-reading written files
    #[arg(long)]
    pub no_verify: bool,

    /// Only process files matching FIELD=PATTERN (repeatable, all must match)
    #[arg(long = "filter", value_name = "FIELD=PATTERN")]
    pub filters: Vec<String>,

    /// Treat filter patterns as regular expressions
    #[arg(long)]
    pub filter_regex: bool,

    /// Worker threads (1 = sequential)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Field naming of the tag view
    #[arg(long)]
    pub schema: Option<Schema>,

    /// Write a JSON report to FILE
    #[arg(long, value_name = "FILE")]
    pub json_report: Option<PathBuf>,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-file details for every file and debug logging
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Write,
    Append,
    Prefix,
    FindReplace,
    Enlist,
    Delist,
    Clear,
    Delete,
    /// Clear every canonical field
    Purge,
    /// List tags without changing anything
    Print,
}

impl Args {
    /// Reject argument combinations no run could use
    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(Error::InvalidInput("--threads must be at least 1".to_string()));
        }
        if !self.path.exists() {
            return Err(Error::InvalidInput(format!(
                "path does not exist: {}",
                self.path.display()
            )));
        }
        if self.delimiter.as_deref() == Some("") {
            return Err(Error::InvalidInput("--delimiter must not be empty".to_string()));
        }
        Ok(())
    }

    /// Operations in the order they apply to each file
    pub fn operations(&self, delimiter: &str, aliases: &AliasTable) -> Result<Vec<Operation>> {
        match self.operation {
            OperationArg::Print => return Ok(Vec::new()),
            OperationArg::Purge => {
                return Ok(aliases.fields().map(|f| Operation::clear(f.name)).collect());
            }
            _ => {}
        }

        let fields: Vec<&str> = self
            .fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            return Err(Error::InvalidInput(format!(
                "--fields is required for {}",
                self.operation_name()
            )));
        }

        fields
            .into_iter()
            .map(|field| self.operation_for(field, delimiter))
            .collect()
    }

    fn operation_for(&self, field: &str, delimiter: &str) -> Result<Operation> {
        Ok(match self.operation {
            OperationArg::Write => Operation::write(field, self.required_value()?, delimiter),
            OperationArg::Append => Operation::append(field, self.required_value()?, delimiter),
            OperationArg::Prefix => Operation::prefix(field, self.required_value()?),
            OperationArg::Enlist => Operation::enlist(field, self.required_value()?, delimiter),
            OperationArg::Delist => Operation::delist(field, self.required_value()?, delimiter),
            OperationArg::FindReplace => {
                let find = self.find.as_deref().ok_or_else(|| {
                    Error::InvalidInput("--find is required for find-replace".to_string())
                })?;
                Operation::find_replace(
                    field,
                    find,
                    self.replace.as_deref().unwrap_or(""),
                    self.regex,
                    delimiter,
                )?
            }
            OperationArg::Clear => Operation::clear(field),
            OperationArg::Delete => Operation::delete(field),
            OperationArg::Purge | OperationArg::Print => {
                return Err(Error::InvalidInput(format!(
                    "{} does not take fields",
                    self.operation_name()
                )))
            }
        })
    }

    fn required_value(&self) -> Result<&str> {
        self.value.as_deref().ok_or_else(|| {
            Error::InvalidInput(format!("--value is required for {}", self.operation_name()))
        })
    }

    fn operation_name(&self) -> String {
        self.operation
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default()
    }

    pub fn filters(&self, aliases: &AliasTable) -> Result<FilterSet> {
        self.filters
            .iter()
            .map(|expr| Filter::parse_expression(expr, self.filter_regex, aliases))
            .collect::<Result<Vec<_>>>()
            .map(FilterSet::new)
    }

    /// Pipeline options: configuration overlaid with flags
    pub fn pipeline_options(&self, config: &EditorConfig) -> PipelineOptions {
        PipelineOptions {
            dry_run: self.dry_run || self.operation == OperationArg::Print,
            backup_dir: self.backup_dir.clone(),
            delete_backups: self.delete_backups,
            force: self.force,
            verify: config.verify && !self.no_verify,
            schema: self.schema.unwrap_or(config.default_schema),
            ..PipelineOptions::from_config(config)
        }
    }

    /// Whether per-file details are printed for a batch of `count` files
    pub fn show_details(&self, count: usize) -> bool {
        self.verbose || self.operation == OperationArg::Print || count <= DETAIL_LIMIT
    }
}

/// Exit code for a finished batch
///
/// Interruption wins, then disk-full, then permission, then any failure.
pub fn exit_code(cancelled: bool, worst: Option<FailureClass>) -> i32 {
    if cancelled {
        return EXIT_INTERRUPTED;
    }
    match worst {
        None => EXIT_SUCCESS,
        Some(FailureClass::DiskFull) => EXIT_DISK_FULL,
        Some(FailureClass::Permission) => EXIT_PERMISSION,
        Some(FailureClass::Other) => EXIT_FAILURE,
    }
}

fn render_map(out: &mut String, label: &str, map: &FieldMap) {
    let _ = writeln!(out, "  {}:", label);
    if map.is_empty() {
        let _ = writeln!(out, "    (none)");
    }
    for (field, values) in map {
        let _ = writeln!(out, "    {}: {}", field, values.join("; "));
    }
}

/// Console block for one file
pub fn render_file(result: &ProcessResult, dry_run: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.path.display());
    render_map(&mut out, "Original", &result.original);

    if dry_run && !result.changed.is_empty() {
        render_map(&mut out, "Planned", &result.planned);
    }
    if result.wrote || result.is_failure() {
        let status = if result.passed { "SUCCESS" } else { "FAILED" };
        let _ = writeln!(out, "  Modification: {}", status);
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "  Error: {}", error);
    }
    if let Some(note) = &result.note {
        let _ = writeln!(out, "  Note: {}", note);
    }
    out
}

/// Totals and per-extension pass rates
pub fn render_summary(aggregator: &ReportAggregator) -> String {
    let summary = aggregator.summary();
    let mut out = String::new();
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  Total: {}", summary.total);
    let _ = writeln!(out, "  Successful: {}", summary.success);
    let _ = writeln!(out, "  Failed: {}", summary.failed);
    if summary.skipped > 0 {
        let _ = writeln!(out, "  Skipped: {}", summary.skipped);
    }
    if summary.backups_created > 0 {
        let _ = writeln!(
            out,
            "  Backups: {} created, {} removed",
            summary.backups_created, summary.backups_removed
        );
    }

    for (ext, stats) in aggregator.per_extension() {
        let ext = if ext.is_empty() { "(none)".to_string() } else { ext };
        if stats.all_passed() {
            let _ = writeln!(out, "  {}: ALL PASSED", ext);
        } else {
            let _ = writeln!(out, "  {}: {}/{} passed", ext, stats.passed, stats.total);
        }
    }
    out
}
