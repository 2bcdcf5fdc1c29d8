// jarlink CLI - argument surface and command execution
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jarlink_checker::{report, Cause, CheckerConfig, LinkageChecker, LinkageProblem};
use jarlink_graph::{
    ClassPathBuilder, ClassPathResult, DependencyGraphResolver, LocalRepositorySource,
};
use jarlink_model::{Artifact, ExclusionFilter, ExclusionRule};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jarlink")]
#[command(about = "Static linkage checker for JVM artifact classpaths", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a resolved classpath for linkage problems
    Check(CheckArgs),
    /// Pairwise linkage comparison of BOM members, as CSV
    LeagueTable(LeagueTableArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// BOM coordinates whose managed members form the root set
    #[arg(long)]
    pub bom: Option<String>,
    /// Root artifact coordinates group:name[:classifier]:version (repeatable)
    #[arg(long = "artifact")]
    pub artifacts: Vec<String>,
    /// Archive files appended to the classpath as-is (repeatable)
    #[arg(long = "jar")]
    pub jars: Vec<PathBuf>,
    /// Maven-layout repository directory (defaults to ~/.m2/repository)
    #[arg(long)]
    pub repository: Option<PathBuf>,
    /// group:name exclusion filter, * wildcards allowed (repeatable)
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,
    /// Follow dependency edges marked optional
    #[arg(long)]
    pub include_optional: bool,
    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
    /// Write the report to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Worker threads for class parsing
    #[arg(long)]
    pub max_parsers: Option<usize>,
    /// Archive handles kept open at once
    #[arg(long)]
    pub max_open_archives: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LeagueTableArgs {
    /// BOM coordinates whose managed members are compared pairwise
    #[arg(long)]
    pub bom: String,
    /// Maven-layout repository directory (defaults to ~/.m2/repository)
    #[arg(long)]
    pub repository: Option<PathBuf>,
    /// Write the CSV to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    /// Grouped human-readable listing
    Text,
    /// Graphviz dot graph
    Dot,
    /// Machine-readable JSON records
    Json,
}

/// Outcome of a command, mapped to the process exit code by `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Clean,
    ProblemsFound,
}

pub fn run(cli: Cli) -> Result<RunOutcome> {
    match cli.command {
        Commands::Check(args) => run_check(args),
        Commands::LeagueTable(args) => run_league_table(args),
    }
}

fn open_repository(dir: Option<PathBuf>) -> Result<LocalRepositorySource> {
    let root = dir
        .or_else(LocalRepositorySource::default_root)
        .ok_or_else(|| anyhow!("no repository directory given and no home directory found"))?;
    Ok(LocalRepositorySource::new(root))
}

fn parse_artifact(coordinates: &str) -> Result<Artifact> {
    coordinates
        .parse()
        .with_context(|| format!("invalid coordinates '{coordinates}'"))
}

fn parse_exclusions(excludes: &[String]) -> Result<Vec<ExclusionRule>> {
    excludes
        .iter()
        .map(|pattern| {
            let filter: ExclusionFilter = pattern
                .parse()
                .map_err(|_| anyhow!("invalid exclusion '{pattern}': expected group:name"))?;
            Ok(ExclusionRule::anywhere(filter))
        })
        .collect()
}

fn resolve_classpath(
    source: &LocalRepositorySource,
    roots: &[Artifact],
    rules: Vec<ExclusionRule>,
    include_optional: bool,
    extra_jars: &[PathBuf],
) -> Result<ClassPathResult> {
    let graph = DependencyGraphResolver::new(source)
        .with_exclusion_rules(rules)
        .include_optional(include_optional)
        .resolve(roots)
        .context("dependency resolution failed")?;
    Ok(ClassPathBuilder::build(&graph, source, extra_jars))
}

fn run_check(args: CheckArgs) -> Result<RunOutcome> {
    let source = open_repository(args.repository)?;

    let mut roots: Vec<Artifact> = Vec::new();
    if let Some(bom) = &args.bom {
        let bom = parse_artifact(bom)?;
        let members = source
            .load_bom(&bom)
            .with_context(|| format!("failed to load BOM {bom}"))?;
        if members.is_empty() {
            bail!("BOM {bom} manages no artifacts");
        }
        roots.extend(members);
    }
    for coordinates in &args.artifacts {
        roots.push(parse_artifact(coordinates)?);
    }
    for jar in &args.jars {
        if !jar.is_file() {
            bail!("archive {} does not exist", jar.display());
        }
    }
    if roots.is_empty() && args.jars.is_empty() {
        bail!("nothing to check: give --bom, --artifact, or --jar");
    }

    let rules = parse_exclusions(&args.excludes)?;
    let classpath = resolve_classpath(&source, &roots, rules, args.include_optional, &args.jars)?;
    if classpath.entries().is_empty() {
        bail!("the resolved classpath is empty");
    }

    let mut config = CheckerConfig::default();
    if let Some(max_parsers) = args.max_parsers {
        config.max_parsers = max_parsers;
    }
    if let Some(max_open_archives) = args.max_open_archives {
        config.max_open_archives = max_open_archives;
    }

    let checker = LinkageChecker::new(classpath, config)?;
    let problems = checker.find_linkage_problems()?;

    let rendered = match args.format {
        ReportFormat::Text => {
            if problems.is_empty() {
                "No linkage problems found\n".to_string()
            } else {
                report::format_problems(&problems, Some(checker.classpath()))
            }
        }
        ReportFormat::Dot => report::format_graphviz(&problems),
        ReportFormat::Json => report::format_json(&problems)?,
    };
    emit(args.output.as_deref(), &rendered)?;

    if problems.is_empty() {
        Ok(RunOutcome::Clean)
    } else {
        Ok(RunOutcome::ProblemsFound)
    }
}

fn run_league_table(args: LeagueTableArgs) -> Result<RunOutcome> {
    let source = open_repository(args.repository)?;
    let bom = parse_artifact(&args.bom)?;
    let members = source
        .load_bom(&bom)
        .with_context(|| format!("failed to load BOM {bom}"))?;
    if members.is_empty() {
        bail!("BOM {bom} manages no artifacts");
    }

    let mut cells: Vec<Vec<i64>> = Vec::with_capacity(members.len());
    let mut any_problem = false;
    for left in &members {
        let mut row = Vec::with_capacity(members.len());
        for right in &members {
            let cell = if left.version == right.version {
                -1
            } else {
                match pairwise_problem_count(&source, left, right) {
                    Ok(count) => {
                        any_problem |= count > 0;
                        count as i64
                    }
                    Err(error) => {
                        tracing::warn!(
                            left = %left,
                            right = %right,
                            error = %format!("{error:#}"),
                            "pairwise check failed"
                        );
                        -1
                    }
                }
            };
            row.push(cell);
        }
        cells.push(row);
    }

    emit(args.output.as_deref(), &league_table_csv(&members, &cells))?;
    if any_problem {
        Ok(RunOutcome::ProblemsFound)
    } else {
        Ok(RunOutcome::Clean)
    }
}

/// The number of artifacts a pair of BOM members breaks, counted from the
/// attributed causes.
fn pairwise_problem_count(
    source: &LocalRepositorySource,
    left: &Artifact,
    right: &Artifact,
) -> Result<usize> {
    let classpath = resolve_classpath(
        source,
        &[left.clone(), right.clone()],
        Vec::new(),
        false,
        &[],
    )?;
    if classpath.entries().is_empty() {
        bail!("empty classpath for {left} and {right}");
    }
    let checker = LinkageChecker::new(classpath, CheckerConfig::default())?;
    let problems = checker.find_linkage_problems()?;
    Ok(blamed_artifact_count(&problems))
}

/// Distinct artifacts blamed by the problems' causes. A problem whose
/// cause names no artifact falls back to the class-path entry expected to
/// hold the symbol; the referencing class's own archive is never counted.
fn blamed_artifact_count(problems: &[LinkageProblem]) -> usize {
    let mut blamed: Vec<String> = problems
        .iter()
        .filter_map(|problem| match problem.cause() {
            Some(Cause::MissingArtifact { artifact, .. }) => Some(artifact.to_string()),
            Some(Cause::ExcludedArtifact { path, .. }) => Some(path.leaf().to_string()),
            Some(Cause::DependencyConflict { unselected, .. }) => Some(unselected.to_string()),
            Some(Cause::Unknown) | None => {
                problem.target().map(|target| target.entry.to_string())
            }
        })
        .collect();
    blamed.sort();
    blamed.dedup();
    blamed.len()
}

/// The pairwise comparison matrix: `-1` marks the diagonal, same-version
/// pairs, and failed cells.
pub fn league_table_csv(members: &[Artifact], cells: &[Vec<i64>]) -> String {
    let mut output = String::from("artifacts,");
    for member in members {
        output.push_str(&member.to_string());
        output.push(',');
    }
    output.push('\n');

    for (member, row) in members.iter().zip(cells) {
        output.push_str(&member.to_string());
        output.push(',');
        for cell in row {
            output.push_str(&cell.to_string());
            output.push(',');
        }
        output.push('\n');
    }
    output
}

fn emit(output: Option<&std::path::Path>, rendered: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write report to {}", path.display())),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}
