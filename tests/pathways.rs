use respath::enrich::{self, Enrichment, PlotType};
use respath::gmt::{self, GeneSets, PathwayKey};
use respath::{kegg, kgml, vfdb, Error};
use std::fs;

const KGML: &str = r#"<?xml version="1.0"?>
<!DOCTYPE pathway SYSTEM "https://www.kegg.jp/kegg/xml/KGML_v0.7.2_.dtd">
<pathway name="path:eco00260" org="eco" number="00260" title="Glycine, serine and threonine metabolism">
    <entry id="1" name="eco:b0002 eco:b3940" type="gene"/>
    <entry id="2" name="eco:b0003" type="gene"/>
    <entry id="3" name="cpd:C00065" type="compound"/>
</pathway>
"#;

fn kgml_for(pathway: &str) -> respath::Result<String> {
    match pathway {
        "path:eco00260" => Ok(KGML.to_string()),
        "path:eco00010" => Ok(KGML
            .replace("eco00260", "eco00010")
            .replace("Glycine, serine and threonine metabolism", "Glycolysis / Gluconeogenesis")
            .replace("eco:b0002 eco:b3940", "eco:b1723")),
        other => Err(Error::Connection { url: other.to_string(), reason: "status code 404".to_string() }),
    }
}

#[test]
fn gene_sets_from_kgml_round_trip_through_gmt() {
    let pathways = vec![
        "path:eco00260".to_string(),
        "path:eco00010".to_string(),
        "path:eco99999".to_string(),
    ];
    let sets = kegg::build_gene_sets_with(&pathways, kgml_for);
    assert_eq!(sets.len(), 2);

    let (key, genes) = sets.get_by_id("path:eco00260").unwrap();
    assert_eq!(key.name, "Glycine, serine and threonine metabolism");
    assert_eq!(genes, &["b0002".to_string(), "b0003".to_string(), "b3940".to_string()]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eco.gmt");
    gmt::write_gmt(&path, &sets).unwrap();
    let reloaded = gmt::read_gmt(&path).unwrap();
    assert_eq!(reloaded.len(), sets.len());
    for (key, genes) in sets.iter() {
        assert_eq!(reloaded.get(key), Some(genes));
    }

    let before = fs::read(&path).unwrap();
    assert!(matches!(gmt::write_gmt(&path, &reloaded), Err(Error::FileExists(_))));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn kgml_title_and_genes() {
    assert_eq!(
        kgml::pathway_title(KGML).unwrap().as_deref(),
        Some("Glycine, serine and threonine metabolism")
    );
    assert_eq!(kgml::gene_ids(KGML).unwrap().len(), 3);
}

#[test]
fn enrichment_writes_report_and_plots() {
    let genes = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let sets: GeneSets = [
        (PathwayKey::new("eco00260", "Glycine metabolism"), genes(&["a", "b", "c", "d"])),
        (PathwayKey::new("eco00010", "Glycolysis"), genes(&["e", "f", "g", "h"])),
        (PathwayKey::new("eco00020", "TCA cycle"), genes(&["a", "i", "j", "k", "l", "m"])),
    ]
    .into_iter()
    .collect();

    let enr = Enrichment::run(&["a", "b", "c"], &sets, None, 1.0, 5).unwrap();
    assert_eq!(enr.limited()[0].term, "eco00260");
    assert_eq!(enr.limited()[0].pathway_name, "Glycine metabolism");
    assert!(enr.results().windows(2).all(|w| w[0].adjusted_p <= w[1].adjusted_p));

    let dir = tempfile::tempdir().unwrap();
    enr.table().write_tsv(dir.path().join("enrichment.tsv")).unwrap();
    enr.plot(PlotType::Barplot, &dir.path().join("bar.svg"), "steelblue").unwrap();
    enr.plot(PlotType::Dotplot, &dir.path().join("dot.svg"), "steelblue").unwrap();
    assert!(dir.path().join("dot.svg").exists());

    let hits = enrich::search_gene_path("a", true, Some(&sets), None).unwrap();
    assert_eq!(hits, vec!["eco00260", "eco00020"]);
}

#[test]
fn pathway_url_highlights_genes() {
    let url = kegg::pathway_url(
        "path:eco00260",
        &[("eco:b0002".to_string(), "#ff0000,black".to_string())],
    )
    .unwrap();
    assert!(url.starts_with("https://www.kegg.jp/kegg-bin/show_pathway?map=eco00260&multi_query="));
    assert!(url.contains("%23ff0000%2Cblack"));

    let bad = kegg::pathway_url("eco00260", &[("eco:b0002".to_string(), "nocolor,black".to_string())]);
    assert!(matches!(bad, Err(Error::Validation(_))));
}

#[test]
fn vfdb_search_and_categories() {
    let entries: Vec<_> = [
        ">VFG037176(gb|WP_001081735) (plc1) phospholipase C [Phospholipase C (VF0470) - Exotoxin (VFC0235)] [Acinetobacter baumannii ACICU]",
        ">VFG000002(gb|WP_000002) (ompA) outer membrane protein A [OmpA (VF0001) - Adherence (VFC0001)] [Acinetobacter baumannii ACICU]",
        ">VFG000003(gb|WP_000003) (ompA) outer membrane protein A [OmpA (VF0001) - Adherence (VFC0001)] [Escherichia coli O157]",
    ]
    .iter()
    .map(|h| vfdb::parse_header(h))
    .collect();

    let hits = vfdb::search_virulence_genes(&entries, &["OMPA", "plc1"], "acinetobacter").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].gene_name.as_deref(), Some("ompA"));
    assert_eq!(hits[1].category.as_deref(), Some("Exotoxin"));

    let shares = vfdb::category_percentages(&hits, false).unwrap();
    assert_eq!(shares, vec![("Exotoxin".to_string(), 50.0), ("Adherence".to_string(), 50.0)]);

    let dir = tempfile::tempdir().unwrap();
    let svg = dir.path().join("vf.svg");
    vfdb::plot_virulence_factors_percentage(&hits, "Acinetobacter baumannii", true, &svg).unwrap();
    assert!(svg.exists());
}
