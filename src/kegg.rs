//! KEGG Access Module
//!
//! Thin client over the KEGG REST API plus the text parsing for its flat
//! responses: organism and pathway listings, gene entries, and KGML pathway
//! documents turned into GMT gene sets.
//!
//! # Endpoints
//! ```text
//! /list/organism          T-number<TAB>code<TAB>name<TAB>lineage
//! /list/pathway/{org}     pathway_id<TAB>title
//! /get/{pathway}/kgml     KGML XML
//! /find/genes/{query}     org:id<TAB>description
//! /get/{id}               flat entry (NAME, SYMBOL, ... lines)
//! ```

use crate::color::validate_color_pair;
use crate::error::{Error, Result};
use crate::gmt::{self, GeneSets, PathwayKey};
use crate::kgml;
use crate::remote::{self, KEGG_REST_URL, KEGG_SHOW_PATHWAY_URL};
use regex::Regex;
use std::path::Path;

// ============================================================================
// Organisms
// ============================================================================

/// A KEGG organism listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Organism {
    /// Genome identifier, e.g. `T00007`.
    pub t_number: String,
    /// Three or four letter KEGG code, e.g. `eco`.
    pub code: String,
    /// Full organism name.
    pub name: String,
}

/// Parses `/list/organism` output. Rows with fewer than three fields are skipped.
pub fn parse_organism_list(text: &str) -> Vec<Organism> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            Some(Organism {
                t_number: fields.next()?.to_string(),
                code: fields.next()?.to_string(),
                name: fields.next()?.to_string(),
            })
        })
        .collect()
}

/// Resolves user input to an organism.
///
/// Input containing a space or longer than four characters is treated as an
/// organism name (case-insensitive substring of the listed name, first hit
/// wins); anything else is a KEGG code (case-insensitive exact match).
pub fn resolve_in(organisms: &[Organism], input: &str) -> Result<Organism> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::validation("organism name cannot be empty"));
    }
    let query = input.to_lowercase();

    let is_name = input.contains(' ') || input.chars().count() > 4;
    let found = if is_name {
        organisms.iter().find(|o| o.name.to_lowercase().contains(&query))
    } else {
        organisms.iter().find(|o| o.code.to_lowercase() == query)
    };

    found.cloned().ok_or_else(|| {
        let kind = if is_name { "name" } else { "code" };
        Error::validation(format!("organism {} '{}' not found in KEGG database", kind, input))
    })
}

// ============================================================================
// Flat-text parsing
// ============================================================================

/// First tab field of each non-empty line of `/list/pathway/{org}`.
pub fn parse_pathway_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split('\t').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `org:id` token in `/find/genes` output.
pub fn first_gene_id(find_output: &str, org: &str) -> Result<Option<String>> {
    let pattern = format!(r"\b{}:\w+\b", regex::escape(org));
    let re = Regex::new(&pattern)
        .map_err(|e| Error::validation(format!("organism code '{}': {}", org, e)))?;
    Ok(re.find(find_output).map(|m| m.as_str().to_string()))
}

/// Value of a flat-entry field: the text after `key` and whitespace.
fn entry_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let value = rest.trim();
    (!value.is_empty()).then_some(value)
}

/// Gene symbol from the first `SYMBOL` line of a gene entry.
pub fn parse_symbol(entry: &str) -> Option<String> {
    entry.lines().find_map(|l| entry_field(l, "SYMBOL")).map(str::to_string)
}

/// Pathway name from the last `NAME` line of a pathway entry.
pub fn parse_pathway_name(entry: &str) -> Option<String> {
    entry
        .lines()
        .filter(|l| l.starts_with("NAME"))
        .last()
        .and_then(|l| entry_field(l, "NAME"))
        .map(str::to_string)
}

/// Pathway name without the trailing organism, e.g. `Glycolysis / Gluconeogenesis`.
pub fn short_pathway_name(name: &str) -> &str {
    name.split(" -").next().unwrap_or(name)
}

// ============================================================================
// Gene sets
// ============================================================================

/// Builds gene sets by fetching and parsing each pathway's KGML.
///
/// Pathways whose KGML cannot be fetched or parsed, or that contain no gene
/// entries, are skipped with a warning.
pub fn build_gene_sets_with<F>(pathways: &[String], mut fetch_kgml: F) -> GeneSets
where
    F: FnMut(&str) -> Result<String>,
{
    let mut sets = GeneSets::new();

    for (idx, path) in pathways.iter().enumerate() {
        let parsed = fetch_kgml(path).and_then(|xml| {
            let genes = kgml::gene_ids(&xml)?;
            let title = kgml::pathway_title(&xml)?;
            Ok((genes, title))
        });

        match parsed {
            Ok((genes, _)) if genes.is_empty() => {
                log::warn!("For pathway {} no genes were found", path);
            }
            Ok((genes, title)) => {
                let title = title.unwrap_or_else(|| path.clone());
                sets.insert(PathwayKey::new(path.as_str(), title), genes.into_iter().collect());
            }
            Err(e) => {
                log::warn!("Pathway {} has no information in KEGG, not added to the gene set: {}", path, e);
            }
        }

        if (idx + 1) % 25 == 0 {
            log::info!("KGML progress: {}/{} pathways", idx + 1, pathways.len());
        }
    }

    sets
}

// ============================================================================
// Client
// ============================================================================

/// Blocking KEGG REST client.
#[derive(Debug, Clone)]
pub struct KeggClient {
    base_url: String,
}

impl Default for KeggClient {
    fn default() -> Self {
        Self::new(KEGG_REST_URL)
    }
}

impl KeggClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn get(&self, path: &str) -> Result<String> {
        remote::fetch_text(&format!("{}/{}", self.base_url, path))
    }

    pub fn list_organisms(&self) -> Result<Vec<Organism>> {
        Ok(parse_organism_list(&self.get("list/organism")?))
    }

    /// Resolves a KEGG code or organism name (see [`resolve_in`]).
    pub fn resolve_organism(&self, input: &str) -> Result<Organism> {
        if input.trim().is_empty() {
            return Err(Error::validation("organism name cannot be empty"));
        }
        resolve_in(&self.list_organisms()?, input)
    }

    pub fn list_pathways(&self, org: &str) -> Result<Vec<String>> {
        Ok(parse_pathway_list(&self.get(&format!("list/pathway/{}", org))?))
    }

    pub fn kgml(&self, pathway_id: &str) -> Result<String> {
        let xml = self.get(&format!("get/{}/kgml", pathway_id))?;
        if xml.trim().is_empty() {
            return Err(Error::parse(format!("failed to get KGML for {}", pathway_id)));
        }
        Ok(xml)
    }

    /// Fetches every pathway of `org` and collects its genes.
    pub fn build_gene_sets(&self, org: &str) -> Result<GeneSets> {
        let pathways = self.list_pathways(org)?;
        log::info!("KEGG lists {} pathways for {}", pathways.len(), org);
        Ok(build_gene_sets_with(&pathways, |p| self.kgml(p)))
    }

    /// Builds the gene sets of `org` and saves them to a new GMT file.
    ///
    /// An existing `path` is rejected before any request is made.
    pub fn create_gmt(&self, org: &str, path: &Path) -> Result<GeneSets> {
        if path.exists() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        let sets = self.build_gene_sets(org)?;
        gmt::write_gmt(path, &sets)?;
        Ok(sets)
    }

    /// Converts a gene name to a KEGG gene id of organism `org`.
    pub fn find_gene_id(&self, gene_name: &str, org: &str) -> Result<Option<String>> {
        if gene_name.trim().is_empty() {
            return Err(Error::validation("gene name cannot be empty"));
        }
        first_gene_id(&self.get(&format!("find/genes/{}", gene_name))?, org)
    }

    /// Retrieves the gene symbol of a KEGG gene id such as `eco:b0002`.
    pub fn gene_symbol(&self, kegg_id: &str) -> Result<Option<String>> {
        if !kegg_id.contains(':') {
            return Err(Error::validation(format!(
                "'{}' is not a valid KEGG gene ID (expected format: 'eco:b0002')",
                kegg_id
            )));
        }
        Ok(parse_symbol(&self.get(&format!("get/{}", kegg_id))?))
    }

    pub fn pathway_name(&self, pathway_id: &str) -> Result<Option<String>> {
        Ok(parse_pathway_name(&self.get(&format!("get/{}", pathway_id))?))
    }
}

// ============================================================================
// Pathway map URL
// ============================================================================

fn encode_query(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Builds a KEGG pathway map URL with genes highlighted.
///
/// Each color is a `background,border` pair of valid colors. Validation
/// happens before the URL is assembled; nothing is fetched.
pub fn pathway_url(target_path: &str, gene_colors: &[(String, String)]) -> Result<String> {
    pathway_url_with_base(KEGG_SHOW_PATHWAY_URL, target_path, gene_colors)
}

pub fn pathway_url_with_base(
    base: &str,
    target_path: &str,
    gene_colors: &[(String, String)],
) -> Result<String> {
    let target = target_path.trim();
    if target.is_empty() {
        return Err(Error::validation("target_path must be a non-empty string"));
    }
    let map = target.strip_prefix("path:").unwrap_or(target);

    let mut lines = Vec::with_capacity(gene_colors.len());
    for (gene, color) in gene_colors {
        if gene.trim().is_empty() {
            return Err(Error::validation("gene id in color mapping cannot be empty"));
        }
        let (bg, border) = validate_color_pair(color)?;
        lines.push(format!("{} {},{}", gene.trim(), bg, border));
    }

    let mut url = format!("{}?map={}", base, encode_query(map));
    if !lines.is_empty() {
        url.push_str("&multi_query=");
        url.push_str(&encode_query(&lines.join("\n")));
    }
    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ORGANISMS: &str = "T00007\teco\tEscherichia coli K-12 MG1655\tProkaryotes;Bacteria\n\
T01001\thsa\tHomo sapiens (human)\tEukaryotes;Animals\n\
T00008\tecj\tEscherichia coli K-12 W3110\tProkaryotes;Bacteria\n";

    #[test]
    fn test_parse_organisms() {
        let orgs = parse_organism_list(ORGANISMS);
        assert_eq!(orgs.len(), 3);
        assert_eq!(orgs[1].code, "hsa");
        assert_eq!(orgs[1].name, "Homo sapiens (human)");
    }

    #[test]
    fn test_resolve_by_code_and_name() {
        let orgs = parse_organism_list(ORGANISMS);
        assert_eq!(resolve_in(&orgs, "HSA").unwrap().name, "Homo sapiens (human)");
        assert_eq!(resolve_in(&orgs, "escherichia coli").unwrap().code, "eco");
        assert_eq!(resolve_in(&orgs, "W3110").unwrap().code, "ecj");
        assert!(matches!(resolve_in(&orgs, "zzz"), Err(Error::Validation(_))));
        assert!(matches!(resolve_in(&orgs, ""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_pathway_list() {
        let text = "path:eco00010\tGlycolysis / Gluconeogenesis - Escherichia coli\n\
path:eco00020\tCitrate cycle (TCA cycle)\n\n";
        assert_eq!(parse_pathway_list(text), vec!["path:eco00010", "path:eco00020"]);
    }

    #[test]
    fn test_first_gene_id() {
        let out = "hsa:7157\tTP53; tumor protein p53\neco:b0002\tthrA\neco:b0003\tthrB\n";
        assert_eq!(first_gene_id(out, "eco").unwrap().as_deref(), Some("eco:b0002"));
        assert_eq!(first_gene_id(out, "mmu").unwrap(), None);
        assert_eq!(first_gene_id("a.b:x1\n", "a.b").unwrap().as_deref(), Some("a.b:x1"));
    }

    #[test]
    fn test_parse_entry_fields() {
        let gene = "ENTRY       b0002             CDS       T00007\nSYMBOL      thrA, Hs\nNAME        (RefSeq) thrA\n";
        assert_eq!(parse_symbol(gene).as_deref(), Some("thrA, Hs"));
        assert_eq!(parse_symbol("ENTRY b0002\n"), None);

        let pathway = "ENTRY       hsa04110                    Pathway\nNAME        Cell cycle - Homo sapiens (human)\n";
        let name = parse_pathway_name(pathway).unwrap();
        assert_eq!(name, "Cell cycle - Homo sapiens (human)");
        assert_eq!(short_pathway_name(&name), "Cell cycle");
    }

    #[test]
    fn test_build_gene_sets_skips_failures() {
        let pathways = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];
        let sets = build_gene_sets_with(&pathways, |p| match p {
            "p1" => Ok(r#"<pathway title="One"><entry type="gene" name="eco:b2 eco:b1"/></pathway>"#.to_string()),
            "p2" => Ok(r#"<pathway title="Two"><entry type="ortholog" name="ko:K1"/></pathway>"#.to_string()),
            _ => Err(Error::parse("no KGML")),
        });

        assert_eq!(sets.len(), 1);
        let (key, genes) = sets.get_by_id("p1").unwrap();
        assert_eq!(key.name, "One");
        assert_eq!(genes, &["b1".to_string(), "b2".to_string()][..]);
    }

    #[test]
    fn test_pathway_url() {
        let url = pathway_url("hsa04110", &[]).unwrap();
        assert_eq!(url, "https://www.kegg.jp/kegg-bin/show_pathway?map=hsa04110");

        let colors = vec![
            ("TP53".to_string(), "#FF0000,#000000".to_string()),
            ("BRCA1".to_string(), "blue,#00FF00".to_string()),
        ];
        let url = pathway_url("path:hsa04110", &colors).unwrap();
        assert!(url.starts_with("https://www.kegg.jp/kegg-bin/show_pathway?map=hsa04110&multi_query="));
        assert!(url.contains("TP53+%23FF0000%2C%23000000%0ABRCA1+blue%2C%2300FF00"));

        let url = pathway_url("eco00010", &[("eco:b0002".to_string(), "red,black".to_string())]).unwrap();
        assert!(url.ends_with("&multi_query=eco%3Ab0002+red%2Cblack"));
    }

    #[test]
    fn test_pathway_url_validation() {
        assert!(pathway_url("", &[]).is_err());
        let missing_comma = vec![("TP53".to_string(), "#FF0000".to_string())];
        assert!(matches!(pathway_url("hsa04110", &missing_comma), Err(Error::Validation(_))));
        let bad_hex = vec![("TP53".to_string(), "#GGGGGG,#000000".to_string())];
        assert!(pathway_url("hsa04110", &bad_hex).is_err());
    }

    #[test]
    fn test_create_gmt_refuses_existing_path_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.gmt");
        std::fs::write(&path, "x").unwrap();
        // Unroutable base URL: reaching the network would produce a Connection error.
        let client = KeggClient::new("http://127.0.0.1:9");
        assert!(matches!(client.create_gmt("eco", &path), Err(Error::FileExists(_))));
    }

    #[test]
    fn test_gene_symbol_rejects_malformed_id() {
        let client = KeggClient::new("http://127.0.0.1:9");
        assert!(matches!(client.gene_symbol("b0002"), Err(Error::Validation(_))));
    }
}
