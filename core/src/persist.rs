//! Snapshot + append-only operation log.
//!
//! The index lives in memory. Every mutation can be appended to `oplog.jsonl`
//! (one JSON record per line); `snapshot.bin` holds the documents as of the
//! last compaction. Startup loads the snapshot and replays the log.

use crate::config::{SearchConfig, SNAPSHOT_VERSION};
use crate::document::{Document, DocumentId};
use crate::error::{Result, SearchError};
use crate::index::SearchIndex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, create_dir_all, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn snapshot(&self) -> PathBuf { self.root.join("snapshot.bin") }
    pub fn oplog(&self) -> PathBuf { self.root.join("oplog.jsonl") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Add { document: Document },
    Remove { id: DocumentId },
}

impl Operation {
    pub fn apply(self, index: &SearchIndex) -> Result<()> {
        match self {
            Operation::Add { document } => index.add_document(document),
            Operation::Remove { id } => {
                index.remove_document(&id);
                Ok(())
            }
        }
    }
}

/// Destination for log records. Implemented for `File`; anything else can be
/// plugged in through [`OpLog::from_writer`].
pub trait LogWriter: Write + Send {
    /// Drop every record written so far.
    fn truncate(&mut self) -> io::Result<()>;
}

impl LogWriter for File {
    fn truncate(&mut self) -> io::Result<()> {
        self.set_len(0)
    }
}

pub struct OpLog {
    writer: Box<dyn LogWriter>,
}

impl OpLog {
    pub fn open(paths: &IndexPaths) -> Result<Self> {
        create_dir_all(&paths.root)?;
        let file = OpenOptions::new().create(true).append(true).open(paths.oplog())?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer<W: LogWriter + 'static>(writer: W) -> Self {
        Self { writer: Box::new(writer) }
    }

    /// Append and flush one record.
    pub fn append(&mut self, op: &Operation) -> Result<()> {
        self.append_all(std::slice::from_ref(op))
    }

    /// Append a group of records with a single write, then flush.
    pub fn append_all(&mut self, ops: &[Operation]) -> Result<()> {
        let mut buf = String::new();
        for op in ops {
            buf.push_str(&serde_json::to_string(op)?);
            buf.push('\n');
        }
        self.writer.write_all(buf.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn truncate(&mut self) -> Result<()> {
        self.writer.truncate()?;
        Ok(())
    }
}

/// Apply every logged operation in order. A missing log counts as empty.
pub fn replay_log(paths: &IndexPaths, index: &SearchIndex) -> Result<usize> {
    let path = paths.oplog();
    if !path.exists() {
        return Ok(0);
    }
    let reader = BufReader::new(File::open(path)?);
    let mut applied = 0;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let op: Operation = serde_json::from_str(&line)
            .map_err(|source| SearchError::LogRecord { line: i + 1, source })?;
        op.apply(index)?;
        applied += 1;
    }
    Ok(applied)
}

// bincode can not decode self-describing values, so extra attributes travel as JSON text
#[derive(Serialize, Deserialize)]
struct SnapshotDocument {
    id: String,
    title: String,
    description: String,
    category: String,
    price: f64,
    brand: String,
    extra_json: String,
}

impl SnapshotDocument {
    fn from_document(doc: Document) -> Result<Self> {
        Ok(Self {
            extra_json: serde_json::to_string(&doc.extra)?,
            id: doc.id.as_str().to_string(),
            title: doc.title,
            description: doc.description,
            category: doc.category,
            price: doc.price,
            brand: doc.brand,
        })
    }

    fn into_document(self) -> Result<Document> {
        let extra: Map<String, Value> = serde_json::from_str(&self.extra_json)?;
        Ok(Document {
            id: DocumentId::new(self.id),
            title: self.title,
            description: self.description,
            category: self.category,
            price: self.price,
            brand: self.brand,
            extra,
        })
    }
}

/// Write every document (in insertion order) plus `meta.json`.
pub fn save_snapshot(paths: &IndexPaths, index: &SearchIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let docs = index
        .documents()
        .into_iter()
        .map(SnapshotDocument::from_document)
        .collect::<Result<Vec<_>>>()?;
    let bytes = bincode::serialize(&docs)?;
    let tmp = paths.root.join("snapshot.bin.tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, paths.snapshot())?;

    let meta = MetaFile {
        num_docs: docs.len() as u32,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: SNAPSHOT_VERSION,
    };
    save_meta(paths, &meta)?;
    Ok(meta)
}

pub fn load_snapshot(paths: &IndexPaths) -> Result<Vec<Document>> {
    let mut f = File::open(paths.snapshot())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let docs: Vec<SnapshotDocument> = bincode::deserialize(&buf)?;
    docs.into_iter().map(SnapshotDocument::into_document).collect()
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Rebuild an index from the snapshot (if any) and the operation log.
pub fn open_index(paths: &IndexPaths, config: SearchConfig) -> Result<SearchIndex> {
    let index = SearchIndex::new(config);
    let mut restored = 0;
    if paths.snapshot().exists() {
        for doc in load_snapshot(paths)? {
            index.add_document(doc)?;
            restored += 1;
        }
    }
    let replayed = replay_log(paths, &index)?;
    tracing::info!(root = %paths.root.display(), restored, replayed, num_docs = index.len(), "index loaded");
    Ok(index)
}

/// Fold the log into a fresh snapshot and empty the log.
pub fn compact(paths: &IndexPaths, index: &SearchIndex, log: &mut OpLog) -> Result<MetaFile> {
    let meta = save_snapshot(paths, index)?;
    log.truncate()?;
    tracing::info!(num_docs = meta.num_docs, "index compacted");
    Ok(meta)
}
