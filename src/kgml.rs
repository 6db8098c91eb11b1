//! KGML (KEGG Markup Language) extraction.
//!
//! Only the two facts needed to build gene sets are read: the pathway title
//! and the gene identifiers of `<entry type="gene">` elements.

use crate::error::Result;
use roxmltree::{Document, ParsingOptions};
use std::collections::BTreeSet;

fn parse(xml: &str) -> Result<Document<'_>> {
    // KGML documents served by KEGG carry a DOCTYPE line.
    let opts = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(xml.trim_start(), opts)?)
}

/// Returns the `title` attribute of the root `<pathway>` element.
pub fn pathway_title(xml: &str) -> Result<Option<String>> {
    let doc = parse(xml)?;
    Ok(doc.root_element().attribute("title").map(str::to_string))
}

/// Collects gene ids from the root's direct `<entry type="gene">` children.
///
/// The `name` attribute holds space-separated `org:id` tokens; only the part
/// after the last `:` is kept.
pub fn gene_ids(xml: &str) -> Result<BTreeSet<String>> {
    let doc = parse(xml)?;
    let genes = doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("entry") && n.attribute("type") == Some("gene"))
        .flat_map(|n| n.attribute("name").unwrap_or("").split_whitespace())
        .map(|token| token.rsplit(':').next().unwrap_or(token).to_string())
        .collect();
    Ok(genes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_pathway_title() {
        let xml = "<pathway name='path:eco01100' org='eco' number='01100' title='Metabolic pathways'></pathway>";
        assert_eq!(pathway_title(xml).unwrap().as_deref(), Some("Metabolic pathways"));
        assert_eq!(pathway_title("<pathway/>").unwrap(), None);
    }

    #[test]
    fn test_gene_ids() {
        let xml = r#"
        <pathway>
            <entry type="gene" name="eco:gene1 eco:gene2"/>
            <entry type="gene" name="eco:gene3"></entry>
            <entry type="compound" name="cpd:C00031"/>
            <relation entry1="1" entry2="2"/>
        </pathway>
        "#;
        let genes: Vec<_> = gene_ids(xml).unwrap().into_iter().collect();
        assert_eq!(genes, vec!["gene1", "gene2", "gene3"]);
    }

    #[test]
    fn test_doctype_is_accepted() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE pathway SYSTEM "https://www.kegg.jp/kegg/xml/KGML_v0.7.2_.dtd">
<pathway name="path:eco00010" title="Glycolysis / Gluconeogenesis">
    <entry id="1" type="gene" name="eco:b0356 eco:b1241"/>
</pathway>"#;
        assert_eq!(gene_ids(xml).unwrap().len(), 2);
        assert_eq!(
            pathway_title(xml).unwrap().as_deref(),
            Some("Glycolysis / Gluconeogenesis")
        );
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(gene_ids("<pathway>"), Err(Error::Xml(_))));
    }
}
