//! Tabular reports.
//!
//! A [`Table`] is the common shape of every result set (CARD hits, VFDB
//! entries, enrichment rows) and can be written as TSV or as a styled HTML
//! page.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; it must have one cell per header.
    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.headers.len() {
            return Err(Error::validation(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.headers.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by header name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn write_tsv_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "{}", self.headers.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| c.replace(['\t', '\n'], " ")).collect();
            writeln!(w, "{}", cells.join("\t"))?;
        }
        Ok(())
    }

    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut w = BufWriter::new(File::create(path.as_ref())?);
        self.write_tsv_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Renders the table as a complete HTML document.
    pub fn to_html(&self, title: &str) -> String {
        let mut table = String::from("<table border=\"1\">\n<thead>\n<tr>");
        for h in &self.headers {
            table.push_str(&format!("<th>{}</th>", escape_html(h)));
        }
        table.push_str("</tr>\n</thead>\n<tbody>\n");
        for row in &self.rows {
            table.push_str("<tr>");
            for cell in row {
                table.push_str(&format!("<td>{}</td>", escape_html(cell)));
            }
            table.push_str("</tr>\n");
        }
        table.push_str("</tbody>\n</table>");

        let title = escape_html(title);
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: Arial, sans-serif; }}
table {{ width: 100%; border-collapse: collapse; margin-top: 20px; }}
th, td {{ border: 1px solid black; padding: 8px; text-align: center; }}
th {{ background-color: #f2f2f2; }}
h1 {{ text-align: center; margin-top: 20px; }}
</style>
</head>
<body>
<h1>{title}</h1>
{table}
</body>
</html>
"#
        )
    }

    pub fn write_html<P: AsRef<Path>>(&self, path: P, title: &str) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_html(title))?;
        log::info!("HTML file saved: {}", path.as_ref().display());
        Ok(())
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(["Gene", "Antibiotics"]);
        t.push_row(vec!["blaTEM".into(), "Penicillin".into()]).unwrap();
        t.push_row(vec!["<tetM>".into(), "".into()]).unwrap();
        t
    }

    #[test]
    fn test_row_width_is_checked() {
        let mut t = Table::new(["A", "B"]);
        assert!(t.push_row(vec!["only one".into()]).is_err());
    }

    #[test]
    fn test_tsv_output() {
        let mut buf = Vec::new();
        sample().write_tsv_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Gene\tAntibiotics\nblaTEM\tPenicillin\n<tetM>\t\n");
    }

    #[test]
    fn test_html_escapes_and_titles() {
        let html = sample().to_html("ARG Report");
        assert!(html.contains("<title>ARG Report</title>"));
        assert!(html.contains("<h1>ARG Report</h1>"));
        assert!(html.contains("<td>&lt;tetM&gt;</td>"));
        assert!(html.contains("<th>Antibiotics</th>"));
    }

    #[test]
    fn test_write_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        sample().write_html(&path, "Table").unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("<!DOCTYPE html>"));
    }
}
