use crate::error::{Error, Result};
use crate::index::DocumentIndex;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn describe(index: &DocumentIndex) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self {
            num_docs: index.len() as u32,
            num_terms: index.vocabulary_size() as u32,
            created_at,
            version: INDEX_VERSION,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
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

/// Write the fitted index and its meta file, replacing any previous snapshot.
pub fn save_index(paths: &IndexPaths, index: &DocumentIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.index())?);
    bincode::serialize_into(&mut w, index)?;
    w.flush()?;
    let meta = MetaFile::describe(index);
    save_meta(paths, &meta)?;
    Ok(meta)
}

/// Load a snapshot written by [`save_index`]. A snapshot that disagrees with
/// its meta file or with itself is refused; rebuild it instead.
pub fn load_index(paths: &IndexPaths) -> Result<(DocumentIndex, MetaFile)> {
    let meta = load_meta(paths)?;
    if meta.version != INDEX_VERSION {
        return Err(Error::configuration(format!(
            "index version {} is not supported (expected {INDEX_VERSION})",
            meta.version
        )));
    }
    let reader = BufReader::new(File::open(paths.index())?);
    let index: DocumentIndex = bincode::deserialize_from(reader)?;
    index.validate()?;
    if index.len() != meta.num_docs as usize || index.vocabulary_size() != meta.num_terms as usize {
        return Err(Error::configuration(format!(
            "meta.json describes {} documents and {} terms, index has {} and {}",
            meta.num_docs,
            meta.num_terms,
            index.len(),
            index.vocabulary_size()
        )));
    }
    tracing::info!(num_docs = meta.num_docs, num_terms = meta.num_terms, created_at = %meta.created_at, "loaded index");
    Ok((index, meta))
}
