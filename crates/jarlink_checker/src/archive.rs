use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to open archive {path}")]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read archive {path}")]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("failed to read {entry} from {path}")]
    EntryRead {
        path: PathBuf,
        entry: String,
        #[source]
        source: std::io::Error,
    },
}

type OpenArchive = ZipArchive<BufReader<File>>;

/// A bounded pool of open archives.
///
/// Archives are opened lazily and kept in least-recently-used order; when
/// the pool is full the coldest handle is dropped and reopened on the next
/// access. Opening retries once on an I/O failure before surfacing it.
pub struct ArchivePool {
    paths: Vec<PathBuf>,
    max_open: usize,
    // (archive index, handle) in least-recently-used-first order.
    open: Vec<(usize, OpenArchive)>,
}

impl ArchivePool {
    pub fn new(paths: Vec<PathBuf>, max_open: usize) -> Self {
        Self {
            paths,
            max_open: max_open.max(1),
            open: Vec::new(),
        }
    }

    /// The `.class` entry names of one archive, in archive order.
    pub fn list_class_entries(&mut self, index: usize) -> Result<Vec<String>, RepositoryError> {
        let archive = self.checkout(index)?;
        let names = archive
            .file_names()
            .filter(|name| name.ends_with(".class"))
            .filter(|name| !name.starts_with("META-INF/"))
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    /// The raw bytes of one entry.
    pub fn read_entry(
        &mut self,
        index: usize,
        entry_name: &str,
    ) -> Result<Vec<u8>, RepositoryError> {
        let path = self.paths[index].clone();
        let archive = self.checkout(index)?;
        let mut entry = archive
            .by_name(entry_name)
            .map_err(|source| RepositoryError::ArchiveRead {
                path: path.clone(),
                source,
            })?;
        let mut buffer = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buffer)
            .map_err(|source| RepositoryError::EntryRead {
                path,
                entry: entry_name.to_string(),
                source,
            })?;
        Ok(buffer)
    }

    /// Moves the archive to the hot end of the pool, opening it if needed.
    fn checkout(&mut self, index: usize) -> Result<&mut OpenArchive, RepositoryError> {
        if let Some(position) = self.open.iter().position(|(open, _)| *open == index) {
            let slot = self.open.remove(position);
            self.open.push(slot);
        } else {
            if self.open.len() >= self.max_open {
                let (evicted, _) = self.open.remove(0);
                debug!(archive = %self.paths[evicted].display(), "evicting archive handle");
            }
            let archive = self.open_archive(index)?;
            self.open.push((index, archive));
        }

        Ok(&mut self.open.last_mut().expect("archive was just pushed").1)
    }

    fn open_archive(&self, index: usize) -> Result<OpenArchive, RepositoryError> {
        let path = &self.paths[index];
        let file = match File::open(path) {
            Ok(file) => file,
            Err(first) => {
                debug!(archive = %path.display(), error = %first, "retrying archive open");
                File::open(path).map_err(|source| RepositoryError::ArchiveOpen {
                    path: path.clone(),
                    source,
                })?
            }
        };
        ZipArchive::new(BufReader::new(file)).map_err(|source| RepositoryError::ArchiveRead {
            path: path.clone(),
            source,
        })
    }
}
