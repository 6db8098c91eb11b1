//! Remote Data Access Module
//!
//! Blocking HTTP downloads for the three upstream databases. Requests are
//! sequential, use a fixed timeout and are never retried: a non-success
//! status or transport failure surfaces as [`Error::Connection`].

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

pub const CARD_ONTOLOGY_URL: &str = "https://card.mcmaster.ca/latest/ontology";
pub const KEGG_REST_URL: &str = "https://rest.kegg.jp";
pub const KEGG_SHOW_PATHWAY_URL: &str = "https://www.kegg.jp/kegg-bin/show_pathway";
pub const VFDB_FASTA_URL: &str = "http://www.mgc.ac.cn/VFs/Down/VFDB_setA_pro.fas.gz";
pub const VFDB_XLS_URL: &str = "https://www.mgc.ac.cn/VFs/Down/VFs.xls.gz";

/// Timeout for a single request, large enough for the CARD archive.
const TIMEOUT: Duration = Duration::from_secs(300);

/// Base URLs of the upstream services.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub card_ontology: String,
    pub kegg_rest: String,
    pub kegg_show_pathway: String,
    pub vfdb_fasta: String,
    /// Gzipped VF table (`VFs.xls.gz`).
    pub vfdb_xls: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            card_ontology: CARD_ONTOLOGY_URL.to_string(),
            kegg_rest: KEGG_REST_URL.to_string(),
            kegg_show_pathway: KEGG_SHOW_PATHWAY_URL.to_string(),
            vfdb_fasta: VFDB_FASTA_URL.to_string(),
            vfdb_xls: VFDB_XLS_URL.to_string(),
        }
    }
}

fn get(url: &str) -> Result<ureq::Response> {
    log::debug!("GET {}", url);
    ureq::get(url).timeout(TIMEOUT).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => Error::Connection {
            url: url.to_string(),
            reason: format!("status code {}", code),
        },
        ureq::Error::Transport(t) => Error::Connection {
            url: url.to_string(),
            reason: t.to_string(),
        },
    })
}

/// Fetches a URL body as text.
pub fn fetch_text(url: &str) -> Result<String> {
    Ok(get(url)?.into_string()?)
}

/// Streams a URL body into `output_path`, replacing any existing file.
pub fn fetch_file(url: &str, output_path: &Path) -> Result<u64> {
    let response = get(url)?;
    let mut writer = BufWriter::new(File::create(output_path)?);
    let bytes = std::io::copy(&mut response.into_reader(), &mut writer)?;
    writer.flush()?;
    log::info!("Downloaded {} ({} bytes)", output_path.display(), bytes);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let ep = Endpoints::default();
        assert!(ep.card_ontology.starts_with("https://card.mcmaster.ca"));
        assert_eq!(ep.kegg_rest, KEGG_REST_URL);
        assert!(ep.vfdb_xls.ends_with("/VFs.xls.gz"));
    }

    #[test]
    fn test_unreachable_host_is_connection_error() {
        // Port 9 on localhost is the discard service and is normally closed.
        let err = fetch_text("http://127.0.0.1:9/nothing").unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }
}
