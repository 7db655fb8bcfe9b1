//! HTML difference report
//!
//! A single self-contained page: inline CSS, no scripts, no external assets,
//! so it renders the same as a file, an email body or an attachment.

use chrono::NaiveDateTime;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use trove_core::reconcile::DriftCounts;
use trove_core::types::format_timestamp;
use trove_core::{DiffKind, DifferenceEntry, FileRecord};

const STYLE: &str = "body{font-family:Helvetica,Arial,sans-serif;color:#222;margin:24px}\
h1{font-size:20px;margin-bottom:4px}\
h2{font-size:16px;margin-top:28px}\
.meta{color:#666;font-size:13px}\
table{border-collapse:collapse;width:100%;font-size:13px}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
th{background:#f0f0f0}\
td.hash{font-family:monospace}\
.summary td{border:none;padding:2px 12px 2px 0}\
.ok{color:#2a7a2a}";

/// Header data for a report
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub server_name: String,
    pub generated_at: NaiveDateTime,
    /// Inventory the local tree was compared against
    pub inventory: String,
    pub local_dir: String,
    pub reference_count: usize,
    pub local_count: usize,
    pub unverified: Vec<UnverifiedFile>,
    /// Inventory entries not found locally that an unverified path may account for
    pub held_back: Vec<FileRecord>,
}

/// Local file that could not be hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedFile {
    pub path: String,
    pub reason: String,
}

fn kind_title(kind: DiffKind) -> &'static str {
    match kind {
        DiffKind::ExtraLocal => "Present locally, not in inventory",
        DiffKind::MissingLocal => "In inventory, missing locally",
    }
}

const HELD_BACK_TITLE: &str = "In inventory, not verifiable locally";

fn write_record_table(html: &mut String, title: &str, rows: &[&FileRecord]) {
    if rows.is_empty() {
        return;
    }
    let _ = write!(
        html,
        "<h2>{} ({})</h2>\n<table>\n<tr><th>Name</th><th>Hash</th><th>Size</th><th>Created</th><th>Path</th></tr>\n",
        title,
        rows.len()
    );
    for record in rows {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td class=\"hash\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&record.name),
            escape_html(&record.content_hash),
            record.size,
            format_timestamp(&record.created_at),
            escape_html(&record.path),
        );
    }
    html.push_str("</table>\n");
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Render the report page.
pub fn render_html(ctx: &ReportContext, differences: &[DifferenceEntry]) -> String {
    let counts = DriftCounts::of(differences);
    let mut html = String::new();

    // Writing to a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Inventory differences: {server}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>Inventory differences on {server}</h1>\n\
         <p class=\"meta\">Generated {generated} &middot; local tree {local} &middot; inventory {inventory}</p>\n",
        server = escape_html(&ctx.server_name),
        generated = format_timestamp(&ctx.generated_at),
        local = escape_html(&ctx.local_dir),
        inventory = escape_html(&ctx.inventory),
    );

    let _ = write!(
        html,
        "<table class=\"summary\">\n\
         <tr><td>Files in inventory</td><td>{}</td></tr>\n\
         <tr><td>Files found locally</td><td>{}</td></tr>\n\
         <tr><td>{}</td><td>{}</td></tr>\n\
         <tr><td>{}</td><td>{}</td></tr>\n\
         <tr><td>{}</td><td>{}</td></tr>\n\
         <tr><td>Not verified</td><td>{}</td></tr>\n</table>\n",
        ctx.reference_count,
        ctx.local_count,
        kind_title(DiffKind::ExtraLocal),
        counts.extra_local,
        kind_title(DiffKind::MissingLocal),
        counts.missing_local,
        HELD_BACK_TITLE,
        ctx.held_back.len(),
        ctx.unverified.len(),
    );

    if differences.is_empty() && ctx.unverified.is_empty() && ctx.held_back.is_empty() {
        html.push_str("<p class=\"ok\">No differences found.</p>\n");
    }

    for kind in [DiffKind::ExtraLocal, DiffKind::MissingLocal] {
        let rows: Vec<&FileRecord> = differences
            .iter()
            .filter(|d| d.kind() == kind)
            .map(DifferenceEntry::record)
            .collect();
        write_record_table(&mut html, kind_title(kind), &rows);
    }
    let held_back: Vec<&FileRecord> = ctx.held_back.iter().collect();
    write_record_table(&mut html, HELD_BACK_TITLE, &held_back);

    if !ctx.unverified.is_empty() {
        let _ = write!(
            html,
            "<h2>Could not be verified ({})</h2>\n<table>\n<tr><th>Path</th><th>Reason</th></tr>\n",
            ctx.unverified.len()
        );
        for file in &ctx.unverified {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&file.path),
                escape_html(&file.reason)
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Write `html` to `path`, creating parent directories.
pub fn write_report(path: &Path, html: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, html)?;
    tracing::debug!(path = %path.display(), bytes = html.len(), "Report saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use trove_core::FileRecord;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    fn record(name: &str, hash: &str) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            path: format!("/data/{name}"),
            content_hash: hash.to_string(),
            size: 10,
            created_at: ts(),
            extension: String::new(),
            content_type: None,
        }
    }

    fn context() -> ReportContext {
        ReportContext {
            server_name: "mirror <01>".to_string(),
            generated_at: ts(),
            inventory: "inventory.json".to_string(),
            local_dir: "/data".to_string(),
            reference_count: 3,
            local_count: 2,
            unverified: Vec::new(),
            held_back: Vec::new(),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_html("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
    }

    #[test]
    fn test_render_groups_by_kind() {
        let diffs = vec![
            DifferenceEntry::ExtraLocal {
                local: record("new.jpg", "aaaa"),
            },
            DifferenceEntry::MissingLocal {
                reference: record("gone&lost.jpg", "bbbb"),
            },
        ];
        let html = render_html(&context(), &diffs);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("mirror &lt;01&gt;"));
        assert!(html.contains("Present locally, not in inventory (1)"));
        assert!(html.contains("In inventory, missing locally (1)"));
        assert!(html.contains("gone&amp;lost.jpg"));
        assert!(html.contains("2024-03-01T08:30:00"));
        assert!(!html.contains("No differences found"));
    }

    #[test]
    fn test_render_clean_and_unverified() {
        let html = render_html(&context(), &[]);
        assert!(html.contains("No differences found."));

        let mut ctx = context();
        ctx.unverified.push(UnverifiedFile {
            path: "/data/locked.bin".to_string(),
            reason: "Permission denied".to_string(),
        });
        let html = render_html(&ctx, &[]);
        assert!(html.contains("Could not be verified (1)"));
        assert!(html.contains("/data/locked.bin"));
        assert!(!html.contains("No differences found."));
    }

    #[test]
    fn test_render_held_back_section() {
        let mut ctx = context();
        ctx.unverified.push(UnverifiedFile {
            path: "/data/a.jpg".to_string(),
            reason: "Permission denied".to_string(),
        });
        ctx.held_back.push(record("a.jpg", "cccc"));
        let html = render_html(&ctx, &[]);

        assert!(html.contains("In inventory, not verifiable locally (1)"));
        assert!(!html.contains("In inventory, missing locally (1)"));
        assert!(html.contains("<td class=\"hash\">cccc</td>"));
    }

    #[test]
    fn test_write_report_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports/today/report.html");
        write_report(&path, "<html></html>").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
