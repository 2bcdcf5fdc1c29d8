use crate::archive::{ArchivePool, RepositoryError};
use crate::runtime;
use indexmap::IndexMap;
use jarlink_classfile::{parse_class, ClassFile};
use jarlink_graph::ClassPathEntry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Where a class name is defined inside the classpath.
#[derive(Debug, Clone)]
struct ClassLocation {
    entry_index: usize,
    zip_name: String,
}

struct RepositoryState {
    pool: ArchivePool,
    /// Parsed classes in least-recently-used-first order.
    cache: IndexMap<(usize, String), Arc<ClassFile>>,
    /// Locations that failed to parse, so each is logged once.
    failed: HashSet<(usize, String)>,
}

/// Lazy, cached lookup from internal class name to class file and the
/// classpath entry that defines it.
///
/// Resolution is first-match in classpath order; later definitions of the
/// same name are shadow entries, reachable only through
/// [`ClassRepository::find_shadows`] for blame attribution. The parsed-class
/// cache is bounded; eviction keeps the name index and re-parses on demand,
/// which is correct because parsing is pure.
pub struct ClassRepository {
    entries: Vec<ClassPathEntry>,
    index: HashMap<String, Vec<ClassLocation>>,
    state: Mutex<RepositoryState>,
    max_cached_classes: usize,
}

impl ClassRepository {
    /// Lists every archive once up front (names only) to build the
    /// first-match index.
    pub fn new(
        entries: &[ClassPathEntry],
        max_open_archives: usize,
        max_cached_classes: usize,
    ) -> Result<Self, RepositoryError> {
        let mut pool = ArchivePool::new(
            entries.iter().map(|entry| entry.path.clone()).collect(),
            max_open_archives,
        );

        let mut index: HashMap<String, Vec<ClassLocation>> = HashMap::new();
        for entry_index in 0..entries.len() {
            for zip_name in pool.list_class_entries(entry_index)? {
                let Some(binary_name) = internal_name_of(&zip_name) else {
                    continue;
                };
                index
                    .entry(binary_name.to_string())
                    .or_default()
                    .push(ClassLocation {
                        entry_index,
                        zip_name,
                    });
            }
        }

        Ok(Self {
            entries: entries.to_vec(),
            index,
            state: Mutex::new(RepositoryState {
                pool,
                cache: IndexMap::new(),
                failed: HashSet::new(),
            }),
            max_cached_classes: max_cached_classes.max(1),
        })
    }

    pub fn entries(&self) -> &[ClassPathEntry] {
        &self.entries
    }

    /// Every class name defined on the classpath with its authoritative
    /// (first-match) entry, in classpath-then-archive order.
    pub fn class_names(&self) -> Vec<(String, usize)> {
        let mut names: Vec<(String, usize)> = self
            .index
            .iter()
            .map(|(name, locations)| (name.clone(), locations[0].entry_index))
            .collect();
        names.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
        names
    }

    /// The authoritative definition of `binary_name`: the first location
    /// in classpath order, or `None` when that definition does not parse.
    /// Later definitions are shadows, retained for blame attribution only,
    /// and never substitute for a malformed first match.
    pub fn find_class(&self, binary_name: &str) -> Option<(Arc<ClassFile>, &ClassPathEntry)> {
        let locations = self.index.get(binary_name)?;
        let location = &locations[0];
        let class_file = self.load(location)?;
        Some((class_file, &self.entries[location.entry_index]))
    }

    /// Every definition of `binary_name` in classpath order, shadows
    /// included.
    pub fn find_shadows(&self, binary_name: &str) -> Vec<(Arc<ClassFile>, &ClassPathEntry)> {
        let Some(locations) = self.index.get(binary_name) else {
            return Vec::new();
        };
        locations
            .iter()
            .filter_map(|location| {
                self.load(location)
                    .map(|class_file| (class_file, &self.entries[location.entry_index]))
            })
            .collect()
    }

    /// Whether the name belongs to the runtime rather than the classpath.
    pub fn is_runtime_class(&self, binary_name: &str) -> bool {
        runtime::is_runtime_class(binary_name)
    }

    fn load(&self, location: &ClassLocation) -> Option<Arc<ClassFile>> {
        let key = (location.entry_index, location.zip_name.clone());
        let mut state = self.state.lock().expect("repository state poisoned");

        if let Some(slot) = state.cache.shift_remove(&key) {
            state.cache.insert(key, slot.clone());
            return Some(slot);
        }
        if state.failed.contains(&key) {
            return None;
        }

        let bytes = match state.pool.read_entry(location.entry_index, &location.zip_name) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(
                    entry = %self.entries[location.entry_index],
                    class = %location.zip_name,
                    error = %error,
                    "failed to read class; skipping"
                );
                state.failed.insert(key);
                return None;
            }
        };

        match parse_class(&bytes) {
            Ok(class_file) => {
                let class_file = Arc::new(class_file);
                if state.cache.len() >= self.max_cached_classes {
                    state.cache.shift_remove_index(0);
                }
                state.cache.insert(key, class_file.clone());
                Some(class_file)
            }
            Err(error) if error.is_unsupported_version() => {
                warn!(
                    entry = %self.entries[location.entry_index],
                    class = %location.zip_name,
                    error = %error,
                    "unsupported class file version; skipping"
                );
                state.failed.insert(key);
                None
            }
            Err(error) => {
                warn!(
                    entry = %self.entries[location.entry_index],
                    class = %location.zip_name,
                    error = %error,
                    "malformed class file; skipping"
                );
                state.failed.insert(key);
                None
            }
        }
    }
}

/// `com/foo/Bar.class` → `com/foo/Bar`; module descriptors and oddly named
/// entries are ignored.
fn internal_name_of(zip_name: &str) -> Option<&str> {
    let stripped = zip_name.strip_suffix(".class")?;
    if stripped == "module-info" || stripped.ends_with("/module-info") {
        return None;
    }
    if stripped.is_empty() {
        return None;
    }
    Some(stripped)
}
