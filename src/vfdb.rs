//! VFDB Analysis Module
//!
//! Downloads the Virulence Factor Database protein set and turns its FASTA
//! headers into tabular virulence factor entries.
//!
//! # Header Format
//! ```text
//! >VFG037176(gb|WP_001081735) (plc1) phospholipase C [Phospholipase C (VF0470) - Exotoxin (VFC0235)] [Acinetobacter baumannii ACICU]
//!            ^accession        ^gene  ^description     ^VF name       ^VFID    ^category ^category id  ^bacteria
//! ```
//!
//! # Annotations
//! The VFDB virulence factor table is downloaded as `VFs.xls.gz`, unpacked
//! and read as a spreadsheet whose second row holds the `VFID`, `VF_Name`
//! and `Function` headers. It is left-joined onto the FASTA entries by VFID.
//! A tab-separated export can be given in its place.

use crate::error::{Error, Result};
use crate::report::Table;
use crate::seqio::FastaReader;
use calamine::{open_workbook_auto, Data, Reader};
use flate2::read::MultiGzDecoder;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub use crate::remote::{VFDB_FASTA_URL, VFDB_XLS_URL};

pub const FASTA_FILENAME: &str = "VFDB_setA_pro.fas.gz";
pub const XLS_GZ_FILENAME: &str = "VFs.xls.gz";
pub const XLS_FILENAME: &str = "VFs.xls";

/// VFDB functional categories, in display order.
pub const CATEGORIES: [&str; 14] = [
    "Exotoxin",
    "Nutritional/Metabolic factor",
    "Biofilm",
    "Immune modulation",
    "Regulation",
    "Adherence",
    "Effector delivery system",
    "Exoenzyme",
    "Motility",
    "Invasion",
    "Post-translational modification",
    "Others",
    "Stress survival",
    "Antimicrobial activity/Competitive advantage",
];

static PAREN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]+)\)").expect("valid regex"));
static BRACKET_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("valid regex"));
static CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[.*?\((?:[^()]*)\)\s*-\s*(.*?)\s*\(.*?\)\]").expect("valid regex")
});

// ============================================================================
// Entries
// ============================================================================

/// One virulence factor gene parsed from a VFDB header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VfEntry {
    pub gene_name: Option<String>,
    pub description: String,
    pub category: Option<String>,
    pub bacteria: Option<String>,
    pub vfid: Option<String>,
    /// Filled by [`merge_annotations`].
    pub vf_name: Option<String>,
    /// Filled by [`merge_annotations`].
    pub function: Option<String>,
}

/// Parses one FASTA header (with or without the leading `>`).
pub fn parse_header(header: &str) -> VfEntry {
    let header = header.trim();

    let gene_name = PAREN_GROUP
        .captures_iter(header)
        .nth(1)
        .map(|c| c[1].to_string());

    // Text after the second ')' and before the first '['.
    let tail = header.splitn(3, ')').last().unwrap_or("");
    let description = tail.split('[').next().unwrap_or("").trim().to_string();

    let after_bracket = header.split_once('[').map(|(_, rest)| rest).unwrap_or("");
    let vfid = PAREN_GROUP.captures(after_bracket).map(|c| c[1].to_string());

    let category = CATEGORY.captures(header).map(|c| c[1].trim().to_string());

    let bacteria = BRACKET_GROUP
        .captures_iter(header)
        .last()
        .map(|c| c[1].to_string());

    VfEntry { gene_name, description, category, bacteria, vfid, vf_name: None, function: None }
}

/// Parses every header of a (optionally gzipped) VFDB FASTA file.
///
/// # Errors
/// - [`Error::SourceNotFound`] if the file is missing
/// - [`Error::Parse`] if no entries were found
pub fn parse_fasta_entries(path: &Path) -> Result<Vec<VfEntry>> {
    let mut entries = Vec::new();
    for record in FastaReader::open(path)? {
        entries.push(parse_header(&record?.header));
    }
    if entries.is_empty() {
        return Err(Error::parse(format!("no entries parsed from {}", path.display())));
    }
    log::info!("Parsed {} VFDB entries from {}", entries.len(), path.display());
    Ok(entries)
}

// ============================================================================
// Annotations
// ============================================================================

/// One row of the VFDB virulence factor table.
#[derive(Debug, Clone, PartialEq)]
pub struct VfAnnotation {
    pub vfid: String,
    pub vf_name: String,
    pub function: String,
}

/// Builds annotations from table rows.
///
/// Leading title rows are skipped: the header is the first row with a `VFID`
/// cell (the second row of `VFs.xls`). `VF_Name` and `Function` columns are
/// required.
pub fn annotations_from_rows<I>(rows: I) -> Result<Vec<VfAnnotation>>
where
    I: IntoIterator<Item = Result<Vec<String>>>,
{
    let mut rows = rows.into_iter();
    let mut columns: Option<(usize, usize, usize)> = None;

    for cells in rows.by_ref() {
        let cells = cells?;
        let find = |name: &str| cells.iter().position(|c| c.trim() == name);
        if let Some(vfid) = find("VFID") {
            let missing: Vec<&str> = ["VF_Name", "Function"]
                .into_iter()
                .filter(|name| find(name).is_none())
                .collect();
            if !missing.is_empty() {
                return Err(Error::validation(format!(
                    "missing required columns in VF table: {}",
                    missing.join(", ")
                )));
            }
            columns = find("VF_Name").zip(find("Function")).map(|(n, f)| (vfid, n, f));
            break;
        }
    }

    let (vfid_col, name_col, func_col) = columns.ok_or_else(|| {
        Error::validation("missing required columns in VF table: VFID, VF_Name, Function")
    })?;

    let mut annotations = Vec::new();
    for cells in rows {
        let cells = cells?;
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cell = |i: usize| cells.get(i).map(|c| c.trim().to_string()).unwrap_or_default();
        annotations.push(VfAnnotation {
            vfid: cell(vfid_col),
            vf_name: cell(name_col),
            function: cell(func_col),
        });
    }
    Ok(annotations)
}

/// Reads a tab-separated VF table.
pub fn parse_annotations<R: BufRead>(reader: R) -> Result<Vec<VfAnnotation>> {
    annotations_from_rows(reader.lines().map(|line| -> Result<Vec<String>> {
        Ok(line?.split('\t').map(str::to_string).collect())
    }))
}

/// Reads the first worksheet of an `.xls`/`.xlsx` VF table.
pub fn read_annotation_sheet(path: &Path) -> Result<Vec<VfAnnotation>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::parse(format!("{}: {}", path.display(), e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::parse(format!("{}: workbook has no sheets", path.display())))?
        .map_err(|e| Error::parse(format!("{}: {}", path.display(), e)))?;
    annotations_from_rows(range.rows().map(|row| Ok(row.iter().map(Data::to_string).collect())))
}

/// Reads a VF table, as a spreadsheet for `.xls`/`.xlsx` and as
/// tab-separated text otherwise.
pub fn read_annotations(path: &Path) -> Result<Vec<VfAnnotation>> {
    if !path.is_file() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let rows = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xls") || ext.eq_ignore_ascii_case("xlsx") => {
            read_annotation_sheet(path)?
        }
        _ => parse_annotations(BufReader::new(File::open(path)?))?,
    };
    log::info!("Read {} VF table rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Fixes VFID references and left-joins the VF table onto `entries`.
///
/// Entries whose VFID does not start with `VF` are remapped to the VFID of
/// the first table row whose `VF_Name` contains `(<id>)`.
pub fn merge_annotations(entries: &mut [VfEntry], annotations: &[VfAnnotation]) {
    let mut remap: FxHashMap<String, String> = FxHashMap::default();
    for entry in entries.iter() {
        let Some(id) = entry.vfid.as_deref() else { continue };
        if id.starts_with("VF") || remap.contains_key(id) {
            continue;
        }
        let pattern = format!("({})", id);
        if let Some(row) = annotations.iter().find(|a| a.vf_name.contains(&pattern)) {
            remap.insert(id.to_string(), row.vfid.clone());
        }
    }

    let mut by_id: FxHashMap<&str, &VfAnnotation> = FxHashMap::default();
    for a in annotations {
        by_id.entry(a.vfid.as_str()).or_insert(a);
    }

    for entry in entries.iter_mut() {
        if let Some(new_id) = entry.vfid.as_ref().and_then(|id| remap.get(id)) {
            entry.vfid = Some(new_id.clone());
        }
        if let Some(row) = entry.vfid.as_deref().and_then(|id| by_id.get(id)) {
            entry.vf_name = Some(row.vf_name.clone());
            entry.function = Some(row.function.clone());
        }
    }

    log::debug!("Remapped {} non-standard VFIDs", remap.len());
}

// ============================================================================
// Queries
// ============================================================================

/// Entries for each gene (case-insensitive equality) whose bacteria contains
/// `bacteria` (case-insensitive). Results follow the gene order.
pub fn search_virulence_genes<S: AsRef<str>>(
    entries: &[VfEntry],
    genes: &[S],
    bacteria: &str,
) -> Result<Vec<VfEntry>> {
    if genes.is_empty() {
        return Err(Error::validation("important_genes must be a non-empty list"));
    }
    if bacteria.trim().is_empty() {
        return Err(Error::validation("bacteria must be a non-empty string"));
    }

    let bacteria = bacteria.to_lowercase();
    let mut result = Vec::new();
    for gene in genes {
        let gene = gene.as_ref().to_lowercase();
        result.extend(
            entries
                .iter()
                .filter(|e| {
                    e.bacteria.as_deref().is_some_and(|b| b.to_lowercase().contains(&bacteria))
                        && e.gene_name.as_deref().is_some_and(|g| g.to_lowercase() == gene)
                })
                .cloned(),
        );
    }
    Ok(result)
}

/// Share of entries per functional category, in percent.
///
/// Categories follow [`CATEGORIES`]; zero-valued ones are dropped unless
/// `show_all` is set.
pub fn category_percentages(entries: &[VfEntry], show_all: bool) -> Result<Vec<(String, f64)>> {
    let categorised: Vec<&str> = entries.iter().filter_map(|e| e.category.as_deref()).collect();
    if categorised.is_empty() {
        return Err(Error::validation("no categorised entries to summarise"));
    }

    let total = categorised.len() as f64;
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for c in categorised.iter().copied() {
        *counts.entry(c).or_insert(0) += 1;
    }

    Ok(CATEGORIES
        .iter()
        .map(|&c| (c.to_string(), counts.get(c).copied().unwrap_or(0) as f64 / total * 100.0))
        .filter(|(_, pct)| show_all || *pct > 0.0)
        .collect())
}

pub fn entries_table(entries: &[VfEntry]) -> Table {
    let mut table = Table::new([
        "Gene_Name",
        "Description",
        "Functional category",
        "Bacteria",
        "VFID",
        "VF_Name",
        "Function",
    ]);
    for e in entries {
        table.rows.push(vec![
            e.gene_name.clone().unwrap_or_default(),
            e.description.clone(),
            e.category.clone().unwrap_or_default(),
            e.bacteria.clone().unwrap_or_default(),
            e.vfid.clone().unwrap_or_default(),
            e.vf_name.clone().unwrap_or_default(),
            e.function.clone().unwrap_or_default(),
        ]);
    }
    table
}

/// Renders the category percentages as an SVG bar chart.
pub fn plot_virulence_factors_percentage(
    entries: &[VfEntry],
    bacteria_name: &str,
    show_all_categories: bool,
    path: &Path,
) -> Result<()> {
    if entries.is_empty() {
        return Err(Error::validation("no entries to plot"));
    }
    if bacteria_name.trim().is_empty() {
        return Err(Error::validation("bacteria_name must be a non-empty string"));
    }
    let bars = category_percentages(entries, show_all_categories)?;
    crate::plot::vertical_bars(
        path,
        &format!("Relative Frequency of Virulence Factors - {}", bacteria_name),
        "Percentage",
        &bars,
        (31, 119, 180),
    )
}

// ============================================================================
// Local Database
// ============================================================================

/// VFDB files kept under a local directory.
#[derive(Debug, Clone)]
pub struct VfdbAnalysis {
    db_dir: PathBuf,
    fasta_url: String,
    xls_url: String,
    entries: Option<Vec<VfEntry>>,
}

impl VfdbAnalysis {
    /// Creates `db_dir` if needed.
    pub fn new(db_dir: &Path) -> Result<Self> {
        Self::with_urls(db_dir, VFDB_FASTA_URL, VFDB_XLS_URL)
    }

    pub fn with_urls(db_dir: &Path, fasta_url: &str, xls_url: &str) -> Result<Self> {
        if db_dir.as_os_str().is_empty() {
            return Err(Error::validation("db_dir must be a non-empty path"));
        }
        fs::create_dir_all(db_dir)?;
        Ok(Self {
            db_dir: db_dir.to_path_buf(),
            fasta_url: fasta_url.to_string(),
            xls_url: xls_url.to_string(),
            entries: None,
        })
    }

    pub fn fasta_path(&self) -> PathBuf {
        self.db_dir.join(FASTA_FILENAME)
    }

    /// Decompressed VF table.
    pub fn xls_path(&self) -> PathBuf {
        self.db_dir.join(XLS_FILENAME)
    }

    /// Downloads the FASTA file and the VF table unless already present.
    ///
    /// The table is fetched as `VFs.xls.gz`, decompressed to `VFs.xls` and
    /// the archive removed.
    pub fn download_data(&self) -> Result<()> {
        self.download_fasta()?;
        self.download_table()
    }

    fn download_fasta(&self) -> Result<()> {
        let fasta = self.fasta_path();
        if fasta.exists() {
            log::info!("FASTA file already exists: {}", fasta.display());
            return Ok(());
        }
        crate::remote::fetch_file(&self.fasta_url, &fasta)?;
        Ok(())
    }

    fn download_table(&self) -> Result<()> {
        let xls = self.xls_path();
        if xls.exists() {
            log::info!("VF table already exists: {}", xls.display());
            return Ok(());
        }
        let archive = self.db_dir.join(XLS_GZ_FILENAME);
        crate::remote::fetch_file(&self.xls_url, &archive)?;
        gunzip_file(&archive, &xls)?;
        fs::remove_file(&archive)?;
        Ok(())
    }

    /// Downloads if needed, then parses the FASTA and merges the VF table.
    ///
    /// `annotations` replaces the downloaded `VFs.xls`, which is then not
    /// fetched.
    pub fn load_and_process(&mut self, annotations: Option<&Path>) -> Result<&[VfEntry]> {
        self.download_fasta()?;
        if annotations.is_none() {
            self.download_table()?;
        }
        self.load(annotations)
    }

    /// Parses the local FASTA and merges the VF table (`annotations`, or the
    /// local `VFs.xls`).
    ///
    /// # Errors
    /// - [`Error::SourceNotFound`] if either file is missing
    /// - [`Error::Parse`] if the FASTA holds no entries
    pub fn load(&mut self, annotations: Option<&Path>) -> Result<&[VfEntry]> {
        let mut entries = parse_fasta_entries(&self.fasta_path())?;
        let table = annotations.map_or_else(|| self.xls_path(), Path::to_path_buf);
        let rows = read_annotations(&table)?;
        merge_annotations(&mut entries, &rows);
        Ok(self.entries.insert(entries).as_slice())
    }

    pub fn entries(&self) -> Option<&[VfEntry]> {
        self.entries.as_deref()
    }

    pub fn search<S: AsRef<str>>(&self, genes: &[S], bacteria: &str) -> Result<Vec<VfEntry>> {
        let entries = self
            .entries
            .as_deref()
            .ok_or_else(|| Error::validation("gene data not loaded; call load_and_process() first"))?;
        search_virulence_genes(entries, genes, bacteria)
    }
}

/// Decompresses a gzip file to `output_path`.
pub fn gunzip_file(input_path: &Path, output_path: &Path) -> Result<u64> {
    if !input_path.exists() {
        return Err(Error::SourceNotFound(input_path.to_path_buf()));
    }
    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(input_path)?));
    let mut writer = BufWriter::new(File::create(output_path)?);
    let bytes = io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;
    log::info!("Decompressed {} ({} bytes)", output_path.display(), bytes);
    Ok(bytes)
}

// ============================================================================
// Tests
// ============================================================================
