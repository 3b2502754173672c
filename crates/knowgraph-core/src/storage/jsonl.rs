//! JSONL graph repository
//!
//! A graph is stored as two files in one directory:
//!
//! ```text
//! <data_dir>/
//! ├── entities.jsonl
//! └── relations.jsonl
//! ```
//!
//! One record per line, in graph order. Entity order matters: consolidation
//! resolves an incoming entity to the first match in list order, so a reload
//! must hand back the list exactly as it was saved.
//!
//! Each file is written to a temporary sibling first and renamed into place.
//! The two renames are not atomic together; relations are renamed last, so an
//! interrupted save can leave new entities next to old relations but never
//! relations that point at entities missing from disk.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::graph::{Entity, Graph, GraphRepository, GraphStats, Relation};
use crate::error::{Error, Result};

/// Entity file name within the data directory
pub const ENTITIES_FILE: &str = "entities.jsonl";

/// Relation file name within the data directory
pub const RELATIONS_FILE: &str = "relations.jsonl";

/// Repository backed by a directory of JSONL files
#[derive(Debug, Clone)]
pub struct JsonlGraphRepository {
    dir: PathBuf,
}

impl JsonlGraphRepository {
    /// Repository rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a graph has been saved here
    pub fn exists(&self) -> bool {
        self.dir.join(ENTITIES_FILE).exists()
    }

    fn entities_path(&self) -> PathBuf {
        self.dir.join(ENTITIES_FILE)
    }

    fn relations_path(&self) -> PathBuf {
        self.dir.join(RELATIONS_FILE)
    }
}

#[async_trait]
impl GraphRepository for JsonlGraphRepository {
    async fn load(&self) -> Result<Graph> {
        let entities: Vec<Entity> = read_jsonl(&self.entities_path())?;
        let relations: Vec<Relation> = read_jsonl(&self.relations_path())?;

        debug!(
            dir = %self.dir.display(),
            entities = entities.len(),
            relations = relations.len(),
            "Loaded graph"
        );

        Ok(Graph {
            entities,
            relations,
        })
    }

    async fn save(&self, graph: &Graph) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::StorageError(format!(
                "Failed to create data directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let entities = &graph.entities;
        let relations: Vec<Relation> = graph.relations.iter().map(Relation::detached).collect();

        let entities_tmp = write_jsonl_tmp(&self.entities_path(), entities.iter())?;
        let relations_tmp = write_jsonl_tmp(&self.relations_path(), relations.iter())?;

        fs::rename(&entities_tmp, self.entities_path()).map_err(Error::Io)?;
        fs::rename(&relations_tmp, self.relations_path()).map_err(Error::Io)?;

        debug!(
            dir = %self.dir.display(),
            entities = entities.len(),
            relations = relations.len(),
            "Saved graph"
        );

        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let path = self.entities_path();
        if !path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&path).map_err(Error::Io)?);
        for line in reader.lines() {
            let line = line.map_err(Error::Io)?;
            if line.trim().is_empty() {
                continue;
            }
            let entity: Entity = parse_line(&path, &line)?;
            if entity.id == id {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(self.load().await?.stats())
    }
}

/// Read every record of a JSONL file; a missing file reads as empty
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path).map_err(Error::Io)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(Error::Io)?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(path, &line)?);
    }
    Ok(records)
}

fn parse_line<T: DeserializeOwned>(path: &Path, line: &str) -> Result<T> {
    serde_json::from_str(line)
        .map_err(|e| Error::StorageError(format!("Invalid record in {}: {}", path.display(), e)))
}

/// Write records next to `path` and return the temporary file's path
fn write_jsonl_tmp<'a, T, I>(path: &Path, records: I) -> Result<PathBuf>
where
    T: Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    let tmp = path.with_extension("jsonl.tmp");
    let file = File::create(&tmp).map_err(Error::Io)?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n").map_err(Error::Io)?;
    }

    writer.flush().map_err(Error::Io)?;
    Ok(tmp)
}
