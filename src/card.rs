//! CARD Analysis Module
//!
//! Identifies antibiotic resistance genes by resolving gene names against the
//! CARD Antibiotic Resistance Ontology (`aro.obo`).
//!
//! # Workflow
//! 1. Download the ontology archive (`tar.bz2`) and extract `aro.obo`
//! 2. Look every gene up by name or synonym (see [`crate::obo`])
//! 3. Summarise the antibiotics the matched genes confer resistance to
//!
//! # Example
//! ```no_run
//! use respath::card::{self, CardAnalysis};
//! use std::path::Path;
//!
//! let obo = card::download_ontology(card::CARD_ONTOLOGY_URL, Path::new(".")).unwrap();
//! let analysis = CardAnalysis::new(&["blaTEM-1", "notAGene"], &obo).unwrap();
//! for hit in analysis.found() {
//!     println!("{}\t{:?}", hit.gene_id, hit.antibiotics);
//! }
//! ```

use crate::error::{Error, Result};
use crate::obo::{self, MatchResult, Partition};
use crate::report::Table;
use bzip2::read::BzDecoder;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::Archive;

pub use crate::remote::CARD_ONTOLOGY_URL;

/// Name of the ontology file inside the CARD archive.
pub const OBO_FILENAME: &str = "aro.obo";

const ARCHIVE_FILENAME: &str = "card-ontology.tar.bz2";

// ============================================================================
// Ontology Download
// ============================================================================

/// Downloads the CARD ontology archive and extracts `aro.obo` into `dest_dir`.
///
/// The archive is removed afterwards. Returns the path of the extracted file.
pub fn download_ontology(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)?;
    let archive_path = dest_dir.join(ARCHIVE_FILENAME);

    log::info!("Downloading CARD ontology from {}", url);
    crate::remote::fetch_file(url, &archive_path)?;

    let extracted = extract_obo(&archive_path, dest_dir);
    fs::remove_file(&archive_path)?;
    extracted
}

/// Extracts the first archive member whose path contains `aro.obo`.
pub fn extract_obo(archive_path: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(BzDecoder::new(file));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let member = entry.path()?.to_string_lossy().into_owned();
        if !member.contains(OBO_FILENAME) {
            continue;
        }

        let out_path = dest_dir.join(OBO_FILENAME);
        let mut writer = BufWriter::new(File::create(&out_path)?);
        io::copy(&mut entry, &mut writer)?;
        writer.flush()?;

        log::info!("Extracted {} to {}", member, out_path.display());
        return Ok(out_path);
    }

    Err(Error::parse(format!(
        "{} not found in archive {}",
        OBO_FILENAME,
        archive_path.display()
    )))
}

// ============================================================================
// Analysis
// ============================================================================

/// Relative frequency of one antibiotic among the matched genes.
#[derive(Debug, Clone, PartialEq)]
pub struct AntibioticFrequency {
    pub antibiotic: String,
    pub count: usize,
    /// Share of matched genes conferring resistance, in percent.
    pub percent: f64,
}

/// Gene list resolved against the CARD ontology.
#[derive(Debug, Clone)]
pub struct CardAnalysis {
    genes: Vec<String>,
    partition: Partition,
}

impl CardAnalysis {
    /// Validates `genes` and looks each one up in `obo_path`.
    ///
    /// # Errors
    /// - [`Error::Validation`] if any gene name is blank (checked before I/O)
    /// - [`Error::SourceNotFound`] if the ontology file is missing
    pub fn new<S: AsRef<str>>(genes: &[S], obo_path: &Path) -> Result<Self> {
        let genes: Vec<String> = genes.iter().map(|g| g.as_ref().to_string()).collect();
        if let Some(pos) = genes.iter().position(|g| g.trim().is_empty()) {
            return Err(Error::validation(format!("gene name at position {} is empty", pos + 1)));
        }

        let partition = obo::partition_genes(obo_path, &genes)?;
        log::info!(
            "CARD: {} of {} genes matched the ontology",
            partition.found.len(),
            genes.len()
        );
        Ok(Self { genes, partition })
    }

    /// Builds an analysis from an already computed partition.
    pub fn from_partition(genes: Vec<String>, partition: Partition) -> Self {
        Self { genes, partition }
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn found(&self) -> &[MatchResult] {
        &self.partition.found
    }

    pub fn not_found(&self) -> &[String] {
        &self.partition.not_found
    }

    /// Overrides the antibiotics of the matched gene with ARO id `gene_id`.
    ///
    /// Returns `false` when no matched gene has that id.
    pub fn set_antibiotics_by_id(&mut self, gene_id: &str, antibiotics: &str) -> bool {
        match self.partition.found.iter_mut().find(|m| m.gene_id == gene_id) {
            Some(hit) => {
                hit.antibiotics = Some(antibiotics.to_string());
                true
            }
            None => {
                log::warn!("Gene ID '{}' not found", gene_id);
                false
            }
        }
    }

    /// Counts antibiotics across matched genes.
    ///
    /// Percentages are relative to all matched genes, including those without
    /// antibiotics. Sorted by count (descending), then name.
    pub fn antibiotic_frequencies(&self) -> Vec<AntibioticFrequency> {
        antibiotic_frequencies(&self.partition.found)
    }

    /// Matched genes as a report table.
    pub fn found_table(&self) -> Table {
        let mut table = Table::new(["Gene Name", "Gene ID", "Matched Name", "Description", "Antibiotics"]);
        for hit in &self.partition.found {
            table.rows.push(vec![
                hit.gene_name.clone(),
                hit.gene_id.clone(),
                hit.matched_name.clone(),
                hit.description.clone(),
                hit.antibiotics.clone().unwrap_or_default(),
            ]);
        }
        table
    }

    pub fn frequency_table(&self) -> Table {
        let mut table = Table::new(["Antibiotic", "Genes", "Frequency (%)"]);
        for f in self.antibiotic_frequencies() {
            table.rows.push(vec![f.antibiotic, f.count.to_string(), format!("{:.2}", f.percent)]);
        }
        table
    }

    /// Renders the antibiotic frequency bar chart as SVG.
    pub fn plot_antibiotic_frequencies(&self, path: &Path, bar_color: &str) -> Result<()> {
        let color = crate::color::parse_color(bar_color)?;
        let bars: Vec<(String, f64)> = self
            .antibiotic_frequencies()
            .into_iter()
            .map(|f| (f.antibiotic, f.percent))
            .collect();
        crate::plot::horizontal_bars(
            path,
            "Frequency of Antibiotics Found in Genes",
            "Frequency of Resistant Genes (%)",
            &bars,
            color,
        )
    }
}

/// Splits each hit's antibiotics on `,` and counts them.
pub fn antibiotic_frequencies(hits: &[MatchResult]) -> Vec<AntibioticFrequency> {
    if hits.is_empty() {
        return Vec::new();
    }

    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for antibiotic in hits
        .iter()
        .filter_map(|h| h.antibiotics.as_deref())
        .flat_map(|a| a.split(','))
        .map(str::trim)
        .filter(|a| !a.is_empty())
    {
        *counts.entry(antibiotic).or_insert(0) += 1;
    }

    let total = hits.len() as f64;
    let mut freqs: Vec<AntibioticFrequency> = counts
        .into_iter()
        .map(|(antibiotic, count)| AntibioticFrequency {
            antibiotic: antibiotic.to_string(),
            count,
            percent: count as f64 / total * 100.0,
        })
        .collect();
    freqs.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.antibiotic.cmp(&b.antibiotic)));
    freqs
}

// ============================================================================
// Tests
// ============================================================================
