//! Pathway Enrichment Module
//!
//! Over-representation analysis of a gene list against a [`GeneSets`]
//! library.
//!
//! # Method
//! For every pathway sharing at least one gene with the list, the p-value is
//! the hypergeometric upper tail `P(X >= k)` where
//! - `N`: background size (default: union of all pathway genes)
//! - `K`: pathway genes inside the background
//! - `n`: list genes inside the background
//! - `k`: overlap between list and pathway
//!
//! P-values are then adjusted with Benjamini-Hochberg across all tested
//! pathways.
//!
//! # Example
//! ```no_run
//! use respath::{enrich::Enrichment, gmt};
//!
//! let sets = gmt::read_gmt("eco.gmt").unwrap();
//! let enr = Enrichment::run(&["thrA", "thrB"], &sets, None, 0.05, 10).unwrap();
//! for row in enr.limited() {
//!     println!("{}\t{}\t{:.3e}", row.term, row.pathway_name, row.adjusted_p);
//! }
//! ```

use crate::error::{Error, Result};
use crate::gmt::GeneSets;
use crate::report::Table;
use rustc_hash::FxHashSet;
use statrs::distribution::{DiscreteCDF, Hypergeometric};
use std::path::Path;

/// One tested pathway.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRow {
    /// Pathway id (first GMT column).
    pub term: String,
    /// Pathway title (second GMT column).
    pub pathway_name: String,
    /// Overlap genes, in pathway order.
    pub genes: Vec<String>,
    /// `k/K`
    pub overlap: String,
    pub p_value: f64,
    pub adjusted_p: f64,
}

impl EnrichmentRow {
    pub fn overlap_count(&self) -> usize {
        self.genes.len()
    }

    /// Chart label: the pathway name, or the id when the name is blank.
    pub fn label(&self) -> &str {
        if self.pathway_name.trim().is_empty() {
            &self.term
        } else {
            &self.pathway_name
        }
    }
}

/// Chart kind for [`Enrichment::plot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotType {
    Barplot,
    Dotplot,
}

impl std::str::FromStr for PlotType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "barplot" => Ok(PlotType::Barplot),
            "dotplot" => Ok(PlotType::Dotplot),
            other => Err(Error::validation(format!(
                "invalid plot type '{}'; expected 'barplot' or 'dotplot'",
                other
            ))),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// `P(X >= k)` for `X ~ Hypergeometric(population, successes, draws)`.
pub fn hypergeometric_upper_tail(population: u64, successes: u64, draws: u64, k: u64) -> Result<f64> {
    if k == 0 {
        return Ok(1.0);
    }
    let dist = Hypergeometric::new(population, successes, draws)
        .map_err(|e| Error::validation(format!("hypergeometric parameters: {}", e)))?;
    Ok(dist.sf(k - 1).clamp(0.0, 1.0))
}

/// Benjamini-Hochberg adjusted p-values, in input order.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut adjusted = vec![0.0; m];
    let mut running_min = 1.0f64;
    for (rank, &idx) in order.iter().enumerate().rev() {
        let q = p_values[idx] * m as f64 / (rank + 1) as f64;
        running_min = running_min.min(q);
        adjusted[idx] = running_min.min(1.0);
    }
    adjusted
}

// ============================================================================
// Enrichment
// ============================================================================

/// Enrichment result for one gene list.
#[derive(Debug, Clone)]
pub struct Enrichment {
    rows: Vec<EnrichmentRow>,
    top_n: usize,
}

impl Enrichment {
    /// Tests `genes` against every pathway in `gene_sets`.
    ///
    /// Rows with adjusted p above `cutoff` are dropped. `top_n` bounds
    /// [`Enrichment::limited`].
    pub fn run<S: AsRef<str>>(
        genes: &[S],
        gene_sets: &GeneSets,
        background: Option<&[String]>,
        cutoff: f64,
        top_n: usize,
    ) -> Result<Self> {
        if genes.is_empty() {
            return Err(Error::validation("gene list must not be empty"));
        }
        if !(0.0..=1.0).contains(&cutoff) {
            return Err(Error::validation(format!("cutoff {} is outside [0, 1]", cutoff)));
        }
        if gene_sets.is_empty() {
            return Err(Error::validation("gene sets are empty"));
        }

        let background: FxHashSet<&str> = match background {
            Some(bg) => bg.iter().map(String::as_str).collect(),
            None => gene_sets
                .iter()
                .flat_map(|(_, g)| g.iter().map(String::as_str))
                .collect(),
        };

        let query: FxHashSet<&str> = genes
            .iter()
            .map(|g| g.as_ref().trim())
            .filter(|g| background.contains(g))
            .collect();
        let population = background.len() as u64;
        let draws = query.len() as u64;
        log::info!(
            "Enrichment: {} of {} genes in background of {}",
            draws,
            genes.len(),
            population
        );

        let mut tested = Vec::new();
        for (key, set_genes) in gene_sets.iter() {
            let mut seen = FxHashSet::default();
            let in_background: Vec<&str> = set_genes
                .iter()
                .map(String::as_str)
                .filter(|g| background.contains(g) && seen.insert(*g))
                .collect();
            let overlap: Vec<String> = in_background
                .iter()
                .filter(|g| query.contains(*g))
                .map(|g| g.to_string())
                .collect();
            if overlap.is_empty() {
                continue;
            }

            let successes = in_background.len() as u64;
            let p_value = hypergeometric_upper_tail(population, successes, draws, overlap.len() as u64)?;
            tested.push(EnrichmentRow {
                term: key.id.clone(),
                pathway_name: key.name.clone(),
                overlap: format!("{}/{}", overlap.len(), successes),
                genes: overlap,
                p_value,
                adjusted_p: 1.0,
            });
        }

        let p_values: Vec<f64> = tested.iter().map(|r| r.p_value).collect();
        for (row, q) in tested.iter_mut().zip(benjamini_hochberg(&p_values)) {
            row.adjusted_p = q;
        }

        let mut rows: Vec<EnrichmentRow> = tested.into_iter().filter(|r| r.adjusted_p <= cutoff).collect();
        rows.sort_by(|a, b| {
            a.adjusted_p
                .total_cmp(&b.adjusted_p)
                .then_with(|| a.p_value.total_cmp(&b.p_value))
                .then_with(|| a.term.cmp(&b.term))
        });
        log::info!("Enrichment: {} pathways pass cutoff {}", rows.len(), cutoff);

        Ok(Self { rows, top_n })
    }

    pub fn results(&self) -> &[EnrichmentRow] {
        &self.rows
    }

    /// The first `top_n` significant rows.
    pub fn limited(&self) -> &[EnrichmentRow] {
        &self.rows[..self.top_n.min(self.rows.len())]
    }

    /// Pathway id and overlap genes of each limited row.
    pub fn pathway_genes(&self) -> Vec<(String, Vec<String>)> {
        self.limited()
            .iter()
            .map(|r| (r.term.clone(), r.genes.clone()))
            .collect()
    }

    /// Ids of significant pathways whose overlap contains `gene`.
    pub fn pathways_with_gene(&self, gene: &str) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.genes.iter().any(|g| g == gene))
            .map(|r| r.term.clone())
            .collect()
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new(["Term", "Pathway name", "Overlap", "P-value", "Adjusted P-value", "Genes"]);
        for r in self.limited() {
            table.rows.push(vec![
                r.term.clone(),
                r.pathway_name.clone(),
                r.overlap.clone(),
                format!("{:.3e}", r.p_value),
                format!("{:.3e}", r.adjusted_p),
                r.genes.join(";"),
            ]);
        }
        table
    }

    /// Charts `-log10(adjusted p)` of the limited rows as SVG.
    pub fn plot(&self, plot_type: PlotType, path: &Path, bar_color: &str) -> Result<()> {
        let title = "Pathway Enrichment";
        let x_desc = "-log10(Adjusted P-value)";
        match plot_type {
            PlotType::Barplot => {
                let color = crate::color::parse_color(bar_color)?;
                let bars: Vec<(String, f64)> =
                    self.limited().iter().map(|r| (r.label().to_string(), neg_log10(r.adjusted_p))).collect();
                crate::plot::horizontal_bars(path, title, x_desc, &bars, color)
            }
            PlotType::Dotplot => {
                let points: Vec<(String, f64, f64)> = self
                    .limited()
                    .iter()
                    .map(|r| (r.label().to_string(), neg_log10(r.adjusted_p), r.overlap_count() as f64))
                    .collect();
                crate::plot::dot_plot(path, title, x_desc, &points)
            }
        }
    }
}

/// Reads a background gene list: one gene per line, blank lines skipped.
///
/// Fails with [`Error::SourceNotFound`] when `path` does not exist.
pub fn read_background(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let genes: Vec<String> = std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    if genes.is_empty() {
        return Err(Error::validation(format!("background file {} is empty", path.display())));
    }
    Ok(genes)
}

fn neg_log10(p: f64) -> f64 {
    -p.max(f64::MIN_POSITIVE).log10()
}

/// Ids of the pathways containing `gene`.
///
/// With `in_gene_sets` the whole library is searched; otherwise only the
/// significant enrichment rows.
pub fn search_gene_path(
    gene: &str,
    in_gene_sets: bool,
    gene_sets: Option<&GeneSets>,
    enrichment: Option<&Enrichment>,
) -> Result<Vec<String>> {
    match (in_gene_sets, gene_sets, enrichment) {
        (true, Some(sets), _) => Ok(sets.pathways_with_gene(gene)),
        (false, _, Some(enr)) => Ok(enr.pathways_with_gene(gene)),
        (true, None, _) => Err(Error::validation("gene sets are not loaded")),
        (false, _, None) => Err(Error::validation("enrichment has not been run")),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmt::PathwayKey;

    fn sets() -> GeneSets {
        let genes = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        [
            (PathwayKey::new("eco00260", "Glycine metabolism"), genes(&["g1", "g2", "g3", "g4"])),
            (PathwayKey::new("eco00010", "Glycolysis"), genes(&["g5", "g6", "g7", "g8"])),
            (PathwayKey::new("eco00020", "TCA cycle"), genes(&["g1", "g9", "g10", "g11"])),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_hypergeometric_tail() {
        // N=10, K=4, n=3: P(X>=3) = C(4,3)/C(10,3) = 4/120
        let p = hypergeometric_upper_tail(10, 4, 3, 3).unwrap();
        assert!((p - 4.0 / 120.0).abs() < 1e-9);
        assert_eq!(hypergeometric_upper_tail(10, 4, 3, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_benjamini_hochberg() {
        // Raw q: 0.04, 0.0533, 0.06, 0.5 in p order; monotone from the top.
        let q = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.5]);
        assert!((q[0] - 0.04).abs() < 1e-9);
        assert!((q[1] - 0.16 / 3.0).abs() < 1e-9);
        assert!((q[2] - 0.16 / 3.0).abs() < 1e-9);
        assert!((q[3] - 0.5).abs() < 1e-9);
        assert!(q.iter().all(|v| *v <= 1.0));
        assert!(benjamini_hochberg(&[]).is_empty());
    }

    #[test]
    fn test_run_orders_by_adjusted_p() {
        let enr = Enrichment::run(&["g1", "g2", "g3", "g9"], &sets(), None, 1.0, 10).unwrap();
        let terms: Vec<_> = enr.results().iter().map(|r| r.term.as_str()).collect();
        assert_eq!(terms, vec!["eco00260", "eco00020"]);
        assert_eq!(enr.results()[0].pathway_name, "Glycine metabolism");
        assert_eq!(enr.results()[0].overlap, "3/4");
        assert!(enr.results()[0].adjusted_p <= enr.results()[1].adjusted_p);
    }

    #[test]
    fn test_cutoff_and_limit() {
        let enr = Enrichment::run(&["g1", "g2", "g3", "g9"], &sets(), None, 1.0, 1).unwrap();
        assert_eq!(enr.limited().len(), 1);
        assert_eq!(enr.pathway_genes()[0].1, vec!["g1", "g2", "g3"]);

        let strict = Enrichment::run(&["g1", "g2", "g3", "g9"], &sets(), None, 1e-6, 10).unwrap();
        assert!(strict.results().is_empty());
    }

    #[test]
    fn test_pathway_genes_keyed_by_id() {
        let sets: GeneSets = [
            (PathwayKey::new("path1", "Glycine metabolism"), vec!["a".to_string(), "b".to_string()]),
            (PathwayKey::new("path2", "Glycolysis"), vec!["c".to_string(), "d".to_string(), "e".to_string()]),
        ]
        .into_iter()
        .collect();
        let enr = Enrichment::run(&["a", "b"], &sets, None, 1.0, 10).unwrap();

        let genes = enr.pathway_genes();
        assert_eq!(genes.len(), 1);
        assert_eq!(genes[0].0, "path1");
        assert_eq!(genes[0].1, vec!["a", "b"]);
        assert_eq!(enr.results()[0].label(), "Glycine metabolism");

        let table = enr.table();
        assert_eq!(table.rows[0][0], "path1");
        assert_eq!(table.rows[0][table.column("Pathway name").unwrap()], "Glycine metabolism");
    }

    #[test]
    fn test_read_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("background.txt");
        std::fs::write(&path, "g1\n\n g2 \ng3\n").unwrap();
        assert_eq!(read_background(&path).unwrap(), vec!["g1", "g2", "g3"]);

        let missing = dir.path().join("missing_background.txt");
        assert!(matches!(read_background(&missing), Err(Error::SourceNotFound(p)) if p == missing));
    }

    #[test]
    fn test_run_validation() {
        let empty: [&str; 0] = [];
        assert!(Enrichment::run(&empty, &sets(), None, 0.05, 10).is_err());
        assert!(Enrichment::run(&["g1"], &sets(), None, 1.5, 10).is_err());
        assert!(Enrichment::run(&["g1"], &GeneSets::new(), None, 0.05, 10).is_err());
    }

    #[test]
    fn test_search_gene_path() {
        let sets = sets();
        let enr = Enrichment::run(&["g1", "g2", "g3", "g9"], &sets, None, 1.0, 10).unwrap();

        let all = search_gene_path("g1", true, Some(&sets), None).unwrap();
        assert_eq!(all.len(), 2);
        let enriched = search_gene_path("g9", false, None, Some(&enr)).unwrap();
        assert_eq!(enriched, vec!["eco00020"]);

        assert!(matches!(search_gene_path("g1", true, None, Some(&enr)), Err(Error::Validation(_))));
        assert!(matches!(search_gene_path("g1", false, Some(&sets), None), Err(Error::Validation(_))));
    }

    #[test]
    fn test_plot_type_parsing() {
        assert_eq!("Dotplot".parse::<PlotType>().unwrap(), PlotType::Dotplot);
        assert!(matches!("pie".parse::<PlotType>(), Err(Error::Validation(_))));
    }
}
