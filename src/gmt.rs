//! GMT (Gene Matrix Transposed) Module
//!
//! Reads and writes pathway gene-set collections.
//!
//! # Format
//! ```text
//! pathway_id<TAB>pathway_name<TAB>gene1<TAB>gene2...
//! ```
//!
//! Writing never overwrites: the destination is created with create-new
//! semantics and an existing file is reported as [`Error::FileExists`].

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Pathway identity used as the gene-set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathwayKey {
    /// Pathway identifier, e.g. `path:eco00010`.
    pub id: String,
    /// Human readable pathway title.
    pub name: String,
}

impl PathwayKey {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Insertion-ordered mapping from pathway to member genes.
#[derive(Debug, Clone, Default)]
pub struct GeneSets {
    entries: Vec<(PathwayKey, Vec<String>)>,
    index: FxHashMap<PathwayKey, usize>,
}

impl GeneSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a gene set. An existing key keeps its position and gets the new genes.
    pub fn insert(&mut self, key: PathwayKey, genes: Vec<String>) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = genes,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, genes));
            }
        }
    }

    pub fn get(&self, key: &PathwayKey) -> Option<&[String]> {
        self.index.get(key).map(|&pos| self.entries[pos].1.as_slice())
    }

    /// Looks a gene set up by pathway id alone.
    pub fn get_by_id(&self, id: &str) -> Option<(&PathwayKey, &[String])> {
        self.iter().find(|(key, _)| key.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathwayKey, &[String])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pathway ids whose gene list contains `gene` exactly.
    pub fn pathways_with_gene(&self, gene: &str) -> Vec<String> {
        self.iter()
            .filter(|(_, genes)| genes.iter().any(|g| g == gene))
            .map(|(key, _)| key.id.clone())
            .collect()
    }
}

impl FromIterator<(PathwayKey, Vec<String>)> for GeneSets {
    fn from_iter<I: IntoIterator<Item = (PathwayKey, Vec<String>)>>(iter: I) -> Self {
        let mut sets = GeneSets::new();
        for (key, genes) in iter {
            sets.insert(key, genes);
        }
        sets
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Parses GMT rows from any buffered reader.
pub fn parse<R: BufRead>(reader: R) -> Result<GeneSets> {
    let mut sets = GeneSets::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (id, name) = match (fields.next(), fields.next()) {
            (Some(id), Some(name)) => (id, name),
            _ => {
                return Err(Error::parse(format!(
                    "GMT line {}: expected pathway id and name",
                    idx + 1
                )))
            }
        };
        let genes = fields.map(str::to_string).collect();
        sets.insert(PathwayKey::new(id, name), genes);
    }
    Ok(sets)
}

/// Loads a GMT file.
pub fn read_gmt<P: AsRef<Path>>(path: P) -> Result<GeneSets> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let sets = parse(BufReader::new(File::open(path)?))?;
    log::info!("Loaded {} gene sets from {}", sets.len(), path.display());
    Ok(sets)
}

// ============================================================================
// Writing
// ============================================================================

/// Writes GMT rows to any writer.
pub fn write_to<W: Write>(writer: &mut W, sets: &GeneSets) -> io::Result<()> {
    for (key, genes) in sets.iter() {
        write!(writer, "{}\t{}\t", key.id, key.name)?;
        writeln!(writer, "{}", genes.join("\t"))?;
    }
    Ok(())
}

/// Saves gene sets to a new GMT file.
///
/// Fails with [`Error::FileExists`] without touching the file when `path`
/// already exists.
pub fn write_gmt<P: AsRef<Path>>(path: P, sets: &GeneSets) -> Result<()> {
    let path = path.as_ref();
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::FileExists(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut writer = BufWriter::new(file);
    write_to(&mut writer, sets)?;
    writer.flush()?;

    log::info!("GMT file saved: {} ({} pathways)", path.display(), sets.len());
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn genes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_rows() {
        let text = "pathway1\tDescription1\tgene1\tgene2\npathway2\tDescription2\tgene3";
        let sets = parse(Cursor::new(text)).unwrap();

        assert_eq!(sets.len(), 2);
        assert_eq!(
            sets.get(&PathwayKey::new("pathway1", "Description1")).unwrap(),
            &["gene1".to_string(), "gene2".to_string()][..]
        );
        assert_eq!(sets.get_by_id("pathway2").unwrap().1, &["gene3".to_string()][..]);
    }

    #[test]
    fn test_parse_rejects_short_row() {
        let err = parse(Cursor::new("only_id\n")).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut sets = GeneSets::new();
        sets.insert(PathwayKey::new("a", "A"), genes(&["x"]));
        sets.insert(PathwayKey::new("b", "B"), genes(&["y"]));
        sets.insert(PathwayKey::new("a", "A"), genes(&["z"]));

        let ids: Vec<_> = sets.iter().map(|(k, _)| k.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(sets.get_by_id("a").unwrap().1, &["z".to_string()][..]);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sets.gmt");

        let sets: GeneSets = vec![
            (PathwayKey::new("path:eco00010", "Glycolysis"), genes(&["b0001", "b0002"])),
            (PathwayKey::new("path:eco00020", "Citrate cycle"), genes(&["b0003"])),
        ]
        .into_iter()
        .collect();

        write_gmt(&path, &sets).unwrap();
        let back = read_gmt(&path).unwrap();

        assert_eq!(back.len(), 2);
        for (key, genes) in sets.iter() {
            assert_eq!(back.get(key).unwrap(), genes);
        }
    }

    #[test]
    fn test_write_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.gmt");
        std::fs::write(&path, "keep me").unwrap();

        let mut sets = GeneSets::new();
        sets.insert(PathwayKey::new("p", "P"), genes(&["g"]));

        let err = write_gmt(&path, &sets).unwrap_err();
        assert!(matches!(err, Error::FileExists(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_gmt("no_such_file.gmt").unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[test]
    fn test_pathways_with_gene() {
        let mut sets = GeneSets::new();
        sets.insert(PathwayKey::new("p1", "P1"), genes(&["a", "b"]));
        sets.insert(PathwayKey::new("p2", "P2"), genes(&["b"]));
        assert_eq!(sets.pathways_with_gene("b"), vec!["p1", "p2"]);
        assert!(sets.pathways_with_gene("c").is_empty());
    }
}
