//! OBO Ontology Parser Module
//!
//! Scans CARD's Antibiotic Resistance Ontology (`aro.obo`) flat file and
//! resolves gene names against `[Term]` records.
//!
//! # Record Layout
//! ```text
//! [Term]
//! id: ARO:3000873
//! name: TEM-1
//! synonym: "blaTEM-1, TEM-1 beta-lactamase" EXACT []
//! def: "TEM-1 is a broad-spectrum beta-lactamase ..." [PMID:...]
//! relationship: confers_resistance_to_antibiotic ARO:0000004 ! ampicillin
//! ```
//!
//! A record is handed out only once it is closed, i.e. when the next `[Term]`
//! marker or the end of the stream is reached. Records without a `name:` line
//! are dropped at that point.
//!
//! # Example
//! ```no_run
//! use respath::obo;
//!
//! if let Some(hit) = obo::find_gene("aro.obo", "blaTEM-1").unwrap() {
//!     println!("{} ({})", hit.gene_name, hit.gene_id);
//! }
//! ```

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Block boundary marker for ontology terms.
pub const TERM_MARKER: &str = "[Term]";

const ID_PREFIX: &str = "id: ARO:";
const NAME_PREFIX: &str = "name: ";
const SYNONYM_PREFIX: &str = "synonym: ";
const DEF_PREFIX: &str = "def: ";
const RESISTANCE_PREFIX: &str = "relationship: confers_resistance_to_antibiotic";

// ============================================================================
// Records
// ============================================================================

/// One `[Term]` block, accumulated field by field while scanning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OntologyRecord {
    /// ARO accession, e.g. `ARO:3000873`.
    pub id: Option<String>,
    /// Canonical term name.
    pub name: Option<String>,
    /// Alternate names, in declaration order.
    pub synonyms: Vec<String>,
    /// Free-text definition (the raw `def:` value).
    pub description: Option<String>,
    /// Antibiotics named by `confers_resistance_to_antibiotic` relationships.
    pub antibiotics: Vec<String>,
}

/// Projection of a matched record returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub gene_name: String,
    /// Empty when the record carried no `id: ARO:` line.
    pub gene_id: String,
    pub description: String,
    /// Antibiotics joined with `", "`; `None` when the record lists none.
    pub antibiotics: Option<String>,
    /// The name or synonym that satisfied the query, in the file's casing.
    pub matched_name: String,
    pub synonyms: Vec<String>,
}

impl OntologyRecord {
    /// Applies one whitespace-stripped line to the record.
    ///
    /// Unrecognised lines are ignored.
    pub fn apply_line(&mut self, line: &str) {
        if line.starts_with(ID_PREFIX) {
            // Value stops at a second ": " if one is present.
            self.id = after_separator(line).map(|v| v.split(": ").next().unwrap_or(v).to_string());
        } else if line.starts_with(NAME_PREFIX) {
            self.name = after_separator(line).map(str::to_string);
            self.synonyms.clear();
        } else if line.starts_with(SYNONYM_PREFIX) {
            let quoted = match line.split('"').nth(1) {
                Some(q) => q,
                None => &line[SYNONYM_PREFIX.len()..],
            };
            self.synonyms.extend(quoted.split(',').map(|s| s.trim().to_string()));
        } else if line.starts_with(DEF_PREFIX) {
            self.description = Some(after_separator(line).unwrap_or("").to_string());
        } else if line.starts_with(RESISTANCE_PREFIX) {
            if let Some(value) = after_separator(line) {
                let segment = value.split(": ").next().unwrap_or(value);
                let antibiotic = segment.rsplit("! ").next().unwrap_or(segment);
                self.antibiotics.push(antibiotic.to_string());
            }
        }
    }

    /// Returns the candidate name (canonical name or synonym) equal to `query`
    /// under case-insensitive comparison.
    pub fn matching_name(&self, query: &str) -> Option<&str> {
        let query = query.to_lowercase();
        self.name
            .iter()
            .chain(self.synonyms.iter())
            .map(String::as_str)
            .find(|candidate| candidate.to_lowercase() == query)
    }

    /// True when `query` equals the name or any synonym, ignoring case.
    pub fn matches(&self, query: &str) -> bool {
        self.matching_name(query).is_some()
    }

    /// Projects the record into a [`MatchResult`] for `query`.
    ///
    /// Returns `None` when the record does not match.
    pub fn to_match(&self, query: &str) -> Option<MatchResult> {
        let matched_name = self.matching_name(query)?.to_string();
        Some(MatchResult {
            gene_name: self.name.clone().unwrap_or_default(),
            gene_id: self.id.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            antibiotics: if self.antibiotics.is_empty() {
                None
            } else {
                Some(self.antibiotics.join(", "))
            },
            matched_name,
            synonyms: self.synonyms.clone(),
        })
    }
}

/// Text after the first `": "` of a line.
fn after_separator(line: &str) -> Option<&str> {
    line.split_once(": ").map(|(_, value)| value)
}

// ============================================================================
// Term Scanner
// ============================================================================

/// Single-pass reader yielding closed `[Term]` records.
///
/// The record under construction is flushed when the *next* stanza header is
/// seen, so each record is evaluated one marker late relative to its fields.
/// Lines of non-`[Term]` stanzas such as `[Typedef]` are skipped. The last
/// record is flushed at end of stream.
pub struct TermScanner<R: BufRead> {
    reader: R,
    line_buf: String,
    current: OntologyRecord,
    /// False inside a non-`[Term]` stanza.
    in_term: bool,
    finished: bool,
}

impl TermScanner<BufReader<File>> {
    /// Opens an ontology file for scanning.
    ///
    /// Fails with [`Error::SourceNotFound`] when the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(1024 * 1024, file)))
    }
}

impl<R: BufRead> TermScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: String::with_capacity(256),
            current: OntologyRecord::default(),
            in_term: true,
            finished: false,
        }
    }

    /// Reads until the next closed, named record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - A record was closed by a marker or by end of stream
    /// - `Ok(None)` - The stream is exhausted
    /// - `Err(e)` - I/O error occurred
    pub fn read_next(&mut self) -> Result<Option<OntologyRecord>> {
        while !self.finished {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                self.finished = true;
                return Ok(self.flush());
            }

            let line = self.line_buf.trim();
            if line.starts_with('[') && line.ends_with(']') {
                // Any other stanza ([Typedef], [Instance]) is skipped whole.
                self.in_term = line == TERM_MARKER;
                if let Some(record) = self.flush() {
                    return Ok(Some(record));
                }
            } else if self.in_term {
                self.current.apply_line(line);
            }
        }
        Ok(None)
    }

    /// Takes the accumulated record, resetting the accumulator.
    fn flush(&mut self) -> Option<OntologyRecord> {
        let record = std::mem::take(&mut self.current);
        record.name.is_some().then_some(record)
    }
}

impl<R: BufRead> Iterator for TermScanner<R> {
    type Item = Result<OntologyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Genes split into ontology hits and misses, both in query order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub found: Vec<MatchResult>,
    pub not_found: Vec<String>,
}

/// Returns the first record in `reader` matching `gene_name`.
pub fn find_in<R: BufRead>(reader: R, gene_name: &str) -> Result<Option<MatchResult>> {
    for record in TermScanner::new(reader) {
        if let Some(hit) = record?.to_match(gene_name) {
            return Ok(Some(hit));
        }
    }
    Ok(None)
}

/// Scans `obo_path` from the start and returns the first record whose name or
/// synonym equals `gene_name` (case-insensitive).
pub fn find_gene<P: AsRef<Path>>(obo_path: P, gene_name: &str) -> Result<Option<MatchResult>> {
    let mut scanner = TermScanner::open(obo_path)?;
    while let Some(record) = scanner.read_next()? {
        if let Some(hit) = record.to_match(gene_name) {
            return Ok(Some(hit));
        }
    }
    Ok(None)
}

/// Looks every gene up in `obo_path`, rescanning the file per gene.
pub fn partition_genes<P, S>(obo_path: P, genes: &[S]) -> Result<Partition>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let obo_path = obo_path.as_ref();
    let mut partition = Partition::default();

    for gene in genes {
        let gene = gene.as_ref();
        match find_gene(obo_path, gene)? {
            Some(hit) => partition.found.push(hit),
            None => partition.not_found.push(gene.to_string()),
        }
    }

    log::debug!(
        "{}: {} found, {} not found",
        obo_path.display(),
        partition.found.len(),
        partition.not_found.len()
    );
    Ok(partition)
}

// ============================================================================
// Tests
// ============================================================================
