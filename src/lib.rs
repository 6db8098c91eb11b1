//! respath - Resistance, Pathway and Virulence Gene Explorer
//!
//! Aggregates gene-level annotations from three public databases: antibiotic
//! resistance from the CARD ontology, metabolic pathways from KEGG and
//! virulence factors from VFDB.
//!
//! # Modules
//! - `obo`: CARD ontology (`aro.obo`) term scanning and gene lookup
//! - `card`: CARD download, resistance summaries and reports
//! - `gmt`: GMT gene set files
//! - `kgml`: KEGG pathway XML parsing
//! - `kegg`: KEGG REST client, organism resolution and pathway map URLs
//! - `enrich`: Hypergeometric pathway enrichment
//! - `vfdb`: VFDB header parsing, annotation merge and search
//! - `seqio`: FASTA reading with gzip support
//! - `color`: CSS color validation
//! - `remote`: Blocking HTTP downloads
//! - `report`: TSV/HTML tables
//! - `plot`: SVG charts

pub mod error;
pub mod obo;
pub mod card;
pub mod gmt;
pub mod kgml;
pub mod kegg;
pub mod enrich;
pub mod vfdb;
pub mod seqio;
pub mod color;
pub mod remote;
pub mod report;
pub mod plot;

pub use error::{Error, Result};
