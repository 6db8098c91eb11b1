use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use respath::card::{self, CardAnalysis};
use respath::enrich::{self, Enrichment, PlotType};
use respath::kegg::{self, KeggClient};
use respath::remote::Endpoints;
use respath::report::Table;
use respath::vfdb::{self, VfdbAnalysis};
use respath::{color, gmt};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

fn parse_cutoff(s: &str) -> Result<f64, String> {
    let val: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(0.0..=1.0).contains(&val) {
        Err(format!("Cutoff must be between 0 and 1, got {}", val))
    } else {
        Ok(val)
    }
}

fn parse_color(s: &str) -> Result<String, String> {
    color::validate_color_code(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}

fn parse_plot_type(s: &str) -> Result<PlotType, String> {
    s.parse().map_err(|e: respath::Error| e.to_string())
}

/// `ARO:3000873=penicillin; cephalosporin`
fn parse_antibiotic_override(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((id, value)) if !id.trim().is_empty() => Ok((id.trim().to_string(), value.trim().to_string())),
        _ => Err(format!("Expected ID=ANTIBIOTICS, got '{}'", s)),
    }
}

/// `eco:b0002=red,black`
fn parse_gene_color(s: &str) -> Result<(String, String), String> {
    let (gene, pair) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected GENE=BG,BORDER, got '{}'", s))?;
    color::validate_color_pair(pair).map_err(|e| e.to_string())?;
    Ok((gene.trim().to_string(), pair.trim().to_string()))
}

#[derive(Parser)]
#[command(name = "respath")]
#[command(version)]
#[command(about = "Resistance, pathway and virulence annotation of gene lists")]
#[command(long_about = r#"
respath - Resistance, pathway and virulence gene explorer

Annotates a gene list with data from three public databases:
  CARD   Antibiotic Resistance Ontology (aro.obo)
  KEGG   Metabolic pathways (REST API, KGML, GMT gene sets)
  VFDB   Virulence Factor Database (protein FASTA headers)

GENE LISTS:
  -g accepts either a comma-separated list (blaTEM-1,tetM) or a file with
  one gene per line.

OUTPUT FILES (in --outdir):
  card_found.tsv         Matched genes: Gene Name, Gene ID, Matched Name,
                         Description, Antibiotics
  card_not_found.tsv     Genes absent from the ontology
  card_antibiotics.tsv   Antibiotic frequencies (+ .svg with --plot)
  enrichment.tsv         Significant pathways (+ .svg with --plot)
  vfdb_hits.tsv          Virulence factor hits (+ .svg with --plot)
  *.html                 HTML versions of the tables with --html

EXAMPLES:
  respath card-fetch -o db/
  respath card --obo db/aro.obo -g blaTEM-1,tetM -o out/ --plot
  respath kegg-gmt --organism "Escherichia coli K-12 MG1655" -o eco.gmt
  respath enrich --gmt eco.gmt -g genes.txt -o out/ --plot dotplot
  respath kegg-url --pathway eco00010 --gene eco:b0002=red,black
  respath vfdb --db-dir db/ -g plc1,csuA --bacteria "Acinetobacter baumannii" -o out/
"#)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short = 'v', long, global = true, help_heading = "Output")]
    verbose: bool,

    #[arg(long = "card-url", value_name = "URL", global = true, help_heading = "Endpoints")]
    card_url: Option<String>,

    #[arg(long = "kegg-rest", value_name = "URL", global = true, help_heading = "Endpoints")]
    kegg_rest: Option<String>,

    #[arg(long = "kegg-map-url", value_name = "URL", global = true, help_heading = "Endpoints")]
    kegg_map_url: Option<String>,

    #[arg(long = "vfdb-url", value_name = "URL", global = true, help_heading = "Endpoints")]
    vfdb_url: Option<String>,

    #[arg(long = "vfdb-xls-url", value_name = "URL", global = true, help_heading = "Endpoints")]
    vfdb_xls_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Look genes up in the CARD ontology
    Card {
        #[arg(short = 'g', long, value_name = "LIST|FILE", help_heading = "Input")]
        genes: String,

        #[arg(long, value_name = "FILE", help_heading = "Input")]
        obo: PathBuf,

        #[arg(long = "set-antibiotics", value_name = "ID=ANTIBIOTICS",
              value_parser = parse_antibiotic_override, help_heading = "Input")]
        set_antibiotics: Vec<(String, String)>,

        #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
        outdir: PathBuf,

        #[arg(long, help_heading = "Output")]
        html: bool,

        #[arg(long, help_heading = "Output")]
        plot: bool,

        #[arg(long = "bar-color", value_name = "COLOR", default_value = "green",
              value_parser = parse_color, help_heading = "Output")]
        bar_color: String,
    },

    /// Download the CARD ontology and extract aro.obo
    CardFetch {
        #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
        outdir: PathBuf,
    },

    /// Build a GMT file with the KEGG pathways of an organism
    KeggGmt {
        #[arg(long, value_name = "CODE|NAME", help_heading = "Input")]
        organism: String,

        #[arg(short = 'o', long, value_name = "FILE", help_heading = "Output")]
        output: PathBuf,
    },

    /// Convert gene names to KEGG gene ids and symbols
    KeggGene {
        #[arg(short = 'g', long, value_name = "LIST|FILE", help_heading = "Input")]
        genes: String,

        #[arg(long, value_name = "CODE|NAME", help_heading = "Input")]
        organism: String,

        #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
        outdir: PathBuf,
    },

    /// Print a KEGG pathway map URL with highlighted genes
    KeggUrl {
        #[arg(long, value_name = "ID", help_heading = "Input")]
        pathway: String,

        #[arg(long = "gene", value_name = "GENE=BG,BORDER",
              value_parser = parse_gene_color, help_heading = "Input")]
        genes: Vec<(String, String)>,
    },

    /// Pathway over-representation analysis against a GMT file
    Enrich(EnrichArgs),

    /// Search virulence factors in VFDB
    Vfdb(VfdbArgs),
}

#[derive(Args)]
struct EnrichArgs {
    #[arg(short = 'g', long, value_name = "LIST|FILE", help_heading = "Input")]
    genes: String,

    #[arg(long, value_name = "FILE", help_heading = "Input")]
    gmt: PathBuf,

    #[arg(long, value_name = "FILE", help_heading = "Input")]
    background: Option<PathBuf>,

    #[arg(short = 'c', long, value_name = "FLOAT", default_value = "0.05",
          value_parser = parse_cutoff, help_heading = "Enrichment")]
    cutoff: f64,

    #[arg(short = 'n', long, value_name = "N", default_value = "10", help_heading = "Enrichment")]
    top: usize,

    /// Replace KEGG pathway ids with their names (one request per pathway)
    #[arg(long = "pathway-names", help_heading = "Enrichment")]
    pathway_names: bool,

    /// List the pathways containing this gene
    #[arg(long = "search-gene", value_name = "GENE", help_heading = "Enrichment")]
    search_gene: Option<String>,

    #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
    outdir: PathBuf,

    #[arg(long, help_heading = "Output")]
    html: bool,

    #[arg(long, value_name = "TYPE", value_parser = parse_plot_type, help_heading = "Output")]
    plot: Option<PlotType>,

    #[arg(long = "bar-color", value_name = "COLOR", default_value = "steelblue",
          value_parser = parse_color, help_heading = "Output")]
    bar_color: String,
}

#[derive(Args)]
struct VfdbArgs {
    #[arg(short = 'g', long, value_name = "LIST|FILE", help_heading = "Input")]
    genes: String,

    #[arg(long, value_name = "NAME", help_heading = "Input")]
    bacteria: String,

    #[arg(long = "db-dir", value_name = "DIR", default_value = "vfdb", help_heading = "Input")]
    db_dir: PathBuf,

    /// VF table (.xls, .xlsx or tab-separated) used instead of the downloaded VFs.xls
    #[arg(long, value_name = "FILE", help_heading = "Input")]
    annotations: Option<PathBuf>,

    #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
    outdir: PathBuf,

    #[arg(long, help_heading = "Output")]
    html: bool,

    #[arg(long, help_heading = "Output")]
    plot: bool,

    #[arg(long = "show-all", help_heading = "Output")]
    show_all: bool,
}

impl Cli {
    fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::default();
        if let Some(url) = &self.card_url {
            endpoints.card_ontology = url.clone();
        }
        if let Some(url) = &self.kegg_rest {
            endpoints.kegg_rest = url.clone();
        }
        if let Some(url) = &self.kegg_map_url {
            endpoints.kegg_show_pathway = url.clone();
        }
        if let Some(url) = &self.vfdb_url {
            endpoints.vfdb_fasta = url.clone();
        }
        if let Some(url) = &self.vfdb_xls_url {
            endpoints.vfdb_xls = url.clone();
        }
        endpoints
    }
}

/// Reads a gene list from a file (one per line) or a comma-separated string.
fn parse_genes(input: &str) -> Result<Vec<String>> {
    let path = Path::new(input);
    let text = if path.is_file() {
        fs::read_to_string(path).with_context(|| format!("Failed to read gene list {}", path.display()))?
    } else {
        input.to_string()
    };

    let genes: Vec<String> = text
        .split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    if genes.is_empty() {
        anyhow::bail!("No genes provided");
    }
    Ok(genes)
}

fn write_table(table: &Table, outdir: &Path, stem: &str, title: &str, html: bool) -> Result<()> {
    let tsv = outdir.join(format!("{}.tsv", stem));
    table
        .write_tsv(&tsv)
        .with_context(|| format!("Failed to write {}", tsv.display()))?;
    eprintln!("Created: {} ({} rows)", tsv.display(), table.len());

    if html {
        let path = outdir.join(format!("{}.html", stem));
        table
            .write_html(&path, title)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Created: {}", path.display());
    }
    Ok(())
}

fn banner(title: &str) {
    eprintln!("============================================================");
    eprintln!(" respath - {}", title);
    eprintln!("============================================================");
    eprintln!();
}

fn run_card(
    genes: &str,
    obo: &Path,
    set_antibiotics: &[(String, String)],
    outdir: &Path,
    html: bool,
    plot: bool,
    bar_color: &str,
) -> Result<()> {
    let genes = parse_genes(genes)?;
    banner("CARD Resistance Lookup");
    eprintln!("Ontology: {}", obo.display());
    eprintln!("Genes: {}", genes.len());
    eprintln!();

    let mut analysis = CardAnalysis::new(&genes, obo).context("CARD lookup failed")?;
    for (id, antibiotics) in set_antibiotics {
        analysis.set_antibiotics_by_id(id, antibiotics);
    }

    fs::create_dir_all(outdir)?;
    write_table(&analysis.found_table(), outdir, "card_found", "CARD Matched Genes", html)?;

    let mut missing = Table::new(["Gene Name"]);
    for gene in analysis.not_found() {
        missing.push_row(vec![gene.clone()])?;
    }
    write_table(&missing, outdir, "card_not_found", "Genes Not Found in CARD", html)?;
    write_table(&analysis.frequency_table(), outdir, "card_antibiotics", "Antibiotic Frequencies", html)?;

    if plot {
        if analysis.antibiotic_frequencies().is_empty() {
            eprintln!("Warning: no antibiotics to plot");
        } else {
            let path = outdir.join("card_antibiotics.svg");
            analysis.plot_antibiotic_frequencies(&path, bar_color)?;
            eprintln!("Created: {}", path.display());
        }
    }

    eprintln!();
    eprintln!("Found: {}  Not found: {}", analysis.found().len(), analysis.not_found().len());
    Ok(())
}

fn run_enrich(args: &EnrichArgs, endpoints: &Endpoints) -> Result<()> {
    let EnrichArgs {
        genes, gmt: gmt_path, background, cutoff, top, pathway_names, search_gene, outdir, html, plot, bar_color,
    } = args;

    let genes = parse_genes(genes)?;
    banner("Pathway Enrichment");
    eprintln!("Gene sets: {}", gmt_path.display());
    eprintln!("Genes: {}", genes.len());
    eprintln!("Cutoff: {}", cutoff);
    eprintln!();

    let mut sets = gmt::read_gmt(gmt_path).with_context(|| format!("Failed to load {}", gmt_path.display()))?;

    if *pathway_names {
        let client = KeggClient::new(&endpoints.kegg_rest);
        sets = sets
            .iter()
            .map(|(key, genes)| {
                let name = match client.pathway_name(&key.id) {
                    Ok(Some(name)) => kegg::short_pathway_name(&name).to_string(),
                    Ok(None) => key.name.clone(),
                    Err(e) => {
                        log::warn!("Could not resolve name of {}: {}", key.id, e);
                        key.name.clone()
                    }
                };
                (gmt::PathwayKey::new(key.id.clone(), name), genes.to_vec())
            })
            .collect();
    }

    let background = background
        .as_deref()
        .map(|p| enrich::read_background(p).with_context(|| format!("Failed to load background {}", p.display())))
        .transpose()?;
    let enrichment = Enrichment::run(&genes, &sets, background.as_deref(), *cutoff, *top)
        .context("Enrichment failed")?;

    fs::create_dir_all(outdir)?;
    write_table(&enrichment.table(), outdir, "enrichment", "Pathway Enrichment", *html)?;

    if let Some(plot_type) = plot {
        if enrichment.limited().is_empty() {
            eprintln!("Warning: no significant pathways to plot");
        } else {
            let path = outdir.join("enrichment.svg");
            enrichment.plot(*plot_type, &path, bar_color)?;
            eprintln!("Created: {}", path.display());
        }
    }

    if let Some(gene) = search_gene {
        let all = enrich::search_gene_path(gene, true, Some(&sets), None)?;
        let enriched = enrich::search_gene_path(gene, false, None, Some(&enrichment))?;
        eprintln!();
        eprintln!("Pathways with {}: {} (* = enriched)", gene, all.len());
        for id in &all {
            let name = sets.get_by_id(id).map(|(key, _)| key.name.as_str()).unwrap_or(id.as_str());
            let mark = if enriched.contains(id) { "*" } else { " " };
            println!("{} {}\t{}", mark, id, name);
        }
    }

    eprintln!();
    eprintln!("Significant pathways: {}", enrichment.results().len());
    Ok(())
}

fn run_vfdb(args: &VfdbArgs, endpoints: &Endpoints) -> Result<()> {
    let VfdbArgs { genes, bacteria, db_dir, annotations, outdir, html, plot, show_all } = args;

    let genes = parse_genes(genes)?;
    banner("VFDB Virulence Factor Search");
    eprintln!("Database directory: {}", db_dir.display());
    eprintln!("Bacteria: {}", bacteria);
    eprintln!("Genes: {}", genes.len());
    eprintln!();

    let mut analysis = VfdbAnalysis::with_urls(db_dir, &endpoints.vfdb_fasta, &endpoints.vfdb_xls)?;
    analysis
        .load_and_process(annotations.as_deref())
        .context("Failed to load VFDB data")?;
    let hits = analysis.search(&genes, bacteria)?;

    fs::create_dir_all(outdir)?;
    write_table(&vfdb::entries_table(&hits), outdir, "vfdb_hits", "Virulence Factors", *html)?;

    if *plot {
        if hits.iter().all(|e| e.category.is_none()) {
            eprintln!("Warning: no categorised hits to plot");
        } else {
            let path = outdir.join("vfdb_categories.svg");
            vfdb::plot_virulence_factors_percentage(&hits, bacteria, *show_all, &path)?;
            eprintln!("Created: {}", path.display());
        }
    }

    eprintln!();
    eprintln!("Hits: {}", hits.len());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let start_time = Instant::now();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let endpoints = cli.endpoints();

    match &cli.command {
        Command::Card { genes, obo, set_antibiotics, outdir, html, plot, bar_color } => {
            run_card(genes, obo, set_antibiotics, outdir, *html, *plot, bar_color)?;
        }
        Command::CardFetch { outdir } => {
            banner("CARD Ontology Download");
            eprintln!("Source: {}", endpoints.card_ontology);
            eprintln!();
            let path = card::download_ontology(&endpoints.card_ontology, outdir)
                .context("Failed to download CARD ontology")?;
            eprintln!("Created: {}", path.display());
        }
        Command::KeggGmt { organism, output } => {
            banner("KEGG Gene Set Builder");
            let client = KeggClient::new(&endpoints.kegg_rest);
            let org = client.resolve_organism(organism)?;
            eprintln!("Organism: {} ({})", org.name, org.code);
            eprintln!("Output: {}", output.display());
            eprintln!();
            let sets = client
                .create_gmt(&org.code, output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            eprintln!("Created: {} ({} pathways)", output.display(), sets.len());
        }
        Command::KeggGene { genes, organism, outdir } => {
            let genes = parse_genes(genes)?;
            let client = KeggClient::new(&endpoints.kegg_rest);
            let org = client.resolve_organism(organism)?;

            let mut table = Table::new(["Gene", "KEGG ID", "Symbol"]);
            for gene in &genes {
                let id = client.find_gene_id(gene, &org.code)?;
                let symbol = match &id {
                    Some(id) => client.gene_symbol(id)?,
                    None => None,
                };
                table.push_row(vec![gene.clone(), id.unwrap_or_default(), symbol.unwrap_or_default()])?;
            }
            fs::create_dir_all(outdir)?;
            write_table(&table, outdir, "kegg_genes", "KEGG Gene IDs", false)?;
        }
        Command::KeggUrl { pathway, genes } => {
            let url = kegg::pathway_url_with_base(&endpoints.kegg_show_pathway, pathway, genes)?;
            println!("{}", url);
        }
        Command::Enrich(args) => run_enrich(args, &endpoints)?,
        Command::Vfdb(args) => run_vfdb(args, &endpoints)?,
    }

    if cli.verbose {
        eprintln!("\nTotal time: {:.1}s", start_time.elapsed().as_secs_f64());
    }

    Ok(())
}
