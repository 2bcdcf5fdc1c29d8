// jarlink_checker - linkage analysis over a built classpath
mod archive;
mod cause;
mod problems;
pub mod report;
mod repository;
mod resolve;
mod runtime;

pub use archive::RepositoryError;
pub use problems::{Cause, ClassRef, LinkageProblem, ProblemKind};
pub use repository::ClassRepository;
pub use runtime::{is_runtime_class, runtime_module_of};

use crate::cause::CauseAttributor;
use crate::resolve::{LinkageResolver, Outcome, SourceContext};
use indexmap::{IndexMap, IndexSet};
use jarlink_classfile::{extract_references, parse_class, ClassFile, SymbolReferences};
use jarlink_graph::{ClassPathEntry, ClassPathResult};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;
use tracing::{debug, warn};
use zip::ZipArchive;

/// How equal-distance version candidates are arbitrated. Only source
/// emission order is implemented; the knob exists so the policy is an
/// explicit configuration rather than an accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    EmissionOrder,
}

/// Tuning knobs for a check run.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Worker threads for class parsing and symbol extraction.
    pub max_parsers: usize,
    /// Archive handles kept open at once; colder ones reopen on demand.
    pub max_open_archives: usize,
    /// Parsed classes kept in memory; evictions re-parse on demand.
    pub max_cached_classes: usize,
    pub tie_break: TieBreak,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_parsers: thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
            max_open_archives: 64,
            max_cached_classes: 4096,
            tie_break: TieBreak::EmissionOrder,
        }
    }
}

/// Cooperative cancellation flag, checked at archive and symbol-batch
/// boundaries. In-flight class parses complete.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("linkage check cancelled")]
    Cancelled,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

struct ScannedClass {
    entry_index: usize,
    class_file: Arc<ClassFile>,
    references: SymbolReferences,
}

/// Finds the references on a classpath that would fail to link at run
/// time.
///
/// Construction indexes every archive; [`find_linkage_problems`] then
/// extracts references from each first-match class, resolves them under
/// JVM linkage rules, and annotates the failures with causes drawn from
/// the classpath builder's records.
///
/// [`find_linkage_problems`]: LinkageChecker::find_linkage_problems
pub struct LinkageChecker {
    classpath: ClassPathResult,
    repository: ClassRepository,
    config: CheckerConfig,
    cancel: CancellationToken,
}

impl LinkageChecker {
    pub fn new(classpath: ClassPathResult, config: CheckerConfig) -> Result<Self, RepositoryError> {
        let repository = ClassRepository::new(
            classpath.entries(),
            config.max_open_archives,
            config.max_cached_classes,
        )?;
        Ok(Self {
            classpath,
            repository,
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn classpath(&self) -> &ClassPathResult {
        &self.classpath
    }

    pub fn repository(&self) -> &ClassRepository {
        &self.repository
    }

    /// The full analysis: scan, resolve, attribute. The returned list has
    /// set semantics; problems equal under `(symbol, source, target)`
    /// appear once, each with its cause attributed exactly once.
    pub fn find_linkage_problems(&self) -> Result<Vec<LinkageProblem>, CheckError> {
        let scanned = self.scan_classpath()?;

        let resolver = LinkageResolver::new(&self.repository);
        let mut problems: IndexSet<LinkageProblem> = IndexSet::new();

        for class in &scanned {
            if self.cancel.is_cancelled() {
                return Err(CheckError::Cancelled);
            }
            let source = SourceContext {
                class_file: class.class_file.clone(),
                class_ref: ClassRef::new(
                    class.class_file.binary_name.clone(),
                    self.repository.entries()[class.entry_index].clone(),
                ),
            };
            for symbol in class.references.iter() {
                match resolver.resolve(&symbol, &source) {
                    Outcome::Resolved | Outcome::Skipped => {}
                    Outcome::Unresolved(unresolved) => {
                        problems.insert(LinkageProblem::new(
                            &unresolved.symbol,
                            source.class_ref.clone(),
                            unresolved.target,
                            unresolved.kind,
                        ));
                    }
                }
            }
        }

        let attributor = CauseAttributor::new(&self.classpath, &self.repository);
        let mut attributed: Vec<LinkageProblem> = problems.into_iter().collect();
        for problem in &mut attributed {
            let cause = attributor.attribute(problem);
            problem.set_cause(cause);
        }
        Ok(attributed)
    }

    /// Parses every first-match class and extracts its references, fanning
    /// out across classpath entries when more than one parser is allowed.
    /// The result is sorted, so worker scheduling cannot leak into the
    /// problem set's order.
    fn scan_classpath(&self) -> Result<Vec<ScannedClass>, CheckError> {
        let mut by_entry: IndexMap<usize, Vec<String>> = IndexMap::new();
        for (binary_name, entry_index) in self.repository.class_names() {
            by_entry.entry(entry_index).or_default().push(binary_name);
        }
        let tasks: VecDeque<(usize, Vec<String>)> = by_entry.into_iter().collect();

        let worker_count = self.config.max_parsers.max(1).min(tasks.len().max(1));
        let mut scanned = if worker_count <= 1 {
            let mut out = Vec::new();
            for (entry_index, names) in tasks {
                self.scan_entry(entry_index, &names, &mut out)?;
            }
            out
        } else {
            self.scan_parallel(tasks, worker_count)?
        };

        if self.cancel.is_cancelled() {
            return Err(CheckError::Cancelled);
        }

        scanned.sort_by(|a, b| {
            (a.entry_index, &a.class_file.binary_name)
                .cmp(&(b.entry_index, &b.class_file.binary_name))
        });
        Ok(scanned)
    }

    fn scan_parallel(
        &self,
        tasks: VecDeque<(usize, Vec<String>)>,
        worker_count: usize,
    ) -> Result<Vec<ScannedClass>, CheckError> {
        let queue = Mutex::new(tasks);
        let results: Mutex<Vec<ScannedClass>> = Mutex::new(Vec::new());
        let failure: Mutex<Option<CheckError>> = Mutex::new(None);

        thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| loop {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let Some((entry_index, names)) = queue.lock().expect("scan queue").pop_front()
                    else {
                        break;
                    };

                    let mut local = Vec::new();
                    match self.scan_entry(entry_index, &names, &mut local) {
                        Ok(()) => {
                            results.lock().expect("scan results").extend(local);
                        }
                        Err(error) => {
                            let mut slot = failure.lock().expect("scan failure");
                            if slot.is_none() {
                                *slot = Some(error);
                            }
                            self.cancel.cancel();
                            break;
                        }
                    }
                });
            }
        });

        if let Some(error) = failure.lock().expect("scan failure").take() {
            return Err(error);
        }
        Ok(results.into_inner().expect("scan results"))
    }

    /// Scans one archive with a worker-local handle, the classpath-wide
    /// pool being reserved for the resolution phase.
    fn scan_entry(
        &self,
        entry_index: usize,
        names: &[String],
        out: &mut Vec<ScannedClass>,
    ) -> Result<(), CheckError> {
        let entry = &self.repository.entries()[entry_index];
        let mut archive = open_archive(entry)?;

        let mut buffer = Vec::new();
        for (batch, binary_name) in names.iter().enumerate() {
            // Symbol-batch boundary; in-flight parses are never abandoned.
            if batch % 64 == 0 && self.cancel.is_cancelled() {
                return Ok(());
            }

            let zip_name = format!("{binary_name}.class");
            buffer.clear();
            {
                let mut zip_entry = match archive.by_name(&zip_name) {
                    Ok(zip_entry) => zip_entry,
                    Err(error) => {
                        warn!(entry = %entry, class = %zip_name, error = %error, "cannot open class entry; skipping");
                        continue;
                    }
                };
                if let Err(error) = zip_entry.read_to_end(&mut buffer) {
                    warn!(entry = %entry, class = %zip_name, error = %error, "cannot read class entry; skipping");
                    continue;
                }
            }

            let class_file = match parse_class(&buffer) {
                Ok(class_file) => class_file,
                Err(error) => {
                    warn!(entry = %entry, class = %zip_name, error = %error, "skipping unparseable class");
                    continue;
                }
            };
            if class_file.is_module_info() {
                continue;
            }

            let references = match extract_references(&class_file) {
                Ok(references) => references,
                Err(error) => {
                    warn!(entry = %entry, class = %zip_name, error = %error, "skipping class with malformed references");
                    continue;
                }
            };

            out.push(ScannedClass {
                entry_index,
                class_file: Arc::new(class_file),
                references,
            });
        }

        Ok(())
    }
}

fn open_archive(entry: &ClassPathEntry) -> Result<ZipArchive<BufReader<File>>, RepositoryError> {
    let file = match File::open(&entry.path) {
        Ok(file) => file,
        Err(first) => {
            debug!(archive = %entry.path.display(), error = %first, "retrying archive open");
            File::open(&entry.path).map_err(|source| RepositoryError::ArchiveOpen {
                path: entry.path.clone(),
                source,
            })?
        }
    };
    ZipArchive::new(BufReader::new(file)).map_err(|source| RepositoryError::ArchiveRead {
        path: entry.path.clone(),
        source,
    })
}

#[cfg(test)]
mod tests;
