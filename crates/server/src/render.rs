//! Receipt rendering
//!
//! Turns paginated line items into one HTML document: each page is rendered
//! through the business line's Tera template and pages are joined with an
//! explicit page-break marker for the HTML-to-PDF service.

use std::borrow::Cow;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use orderslip_core::Page;
use regex::Regex;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, info};

pub const PAGE_BREAK: &str = r#"<div style="page-break-after: always"></div>"#;

/// Indian Standard Time, UTC+05:30 with no daylight saving.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;
const TEMPLATE_SUFFIX: &str = ".html.tera";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template load error: {0}")]
    Load(String),
    #[error("unknown receipt template `{0}`")]
    UnknownTemplate(String),
    #[error("template error: {0}")]
    Template(String),
}

#[derive(Serialize)]
struct RowView {
    no: usize,
    item_name: String,
    quantity: String,
}

#[derive(Clone, Debug)]
pub struct ReceiptRenderer {
    tera: Tera,
}

impl ReceiptRenderer {
    /// Loads every `*.html.tera` file under `template_dir`.
    pub fn from_dir(template_dir: &Path) -> Result<Self, RenderError> {
        let pattern = format!("{}/**/*{TEMPLATE_SUFFIX}", template_dir.display());
        let tera = Tera::new(&pattern).map_err(|error| RenderError::Load(describe(&error)))?;

        info!(
            template_dir = %template_dir.display(),
            templates = tera.get_template_names().count(),
            "receipt templates loaded"
        );
        Ok(Self { tera })
    }

    /// The receipt templates bundled with the repository.
    pub fn with_embedded_templates() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (
                "anil_kiryana.html.tera",
                include_str!("../../../templates/receipts/anil_kiryana.html.tera"),
            ),
            (
                "rs_vegetables.html.tera",
                include_str!("../../../templates/receipts/rs_vegetables.html.tera"),
            ),
        ])
        .map_err(|error| RenderError::Load(describe(&error)))?;

        Ok(Self { tera })
    }

    pub fn has_template(&self, template: &str) -> bool {
        let file_name = template_file(template);
        self.tera.get_template_names().any(|name| name == file_name)
    }

    /// Renders all pages into a single markup string.
    ///
    /// An order without pages still produces one explicit empty receipt so
    /// the customer gets a document rather than a blank file.
    pub fn render(
        &self,
        pages: &[Page],
        issued_at: DateTime<Utc>,
        template: &str,
    ) -> Result<String, RenderError> {
        if !self.has_template(template) {
            return Err(RenderError::UnknownTemplate(template.to_string()));
        }

        let file_name = template_file(template);
        let date = format_issued_at(issued_at);

        if pages.is_empty() {
            debug!(template, "rendering empty receipt");
            return self.render_page(&file_name, &date, 1, 1, Vec::new());
        }

        let mut markup = String::new();
        for page in pages {
            let rows = page
                .rows
                .iter()
                .map(|row| RowView {
                    no: row.serial,
                    item_name: highlight_devanagari(&tera::escape_html(&row.item.name))
                        .into_owned(),
                    quantity: tera::escape_html(&row.item.quantity),
                })
                .collect();

            markup.push_str(&self.render_page(
                &file_name,
                &date,
                page.index,
                page.total_pages,
                rows,
            )?);
            if !page.is_last() {
                markup.push_str(PAGE_BREAK);
            }
        }

        Ok(markup)
    }

    fn render_page(
        &self,
        file_name: &str,
        date: &str,
        page: usize,
        total_pages: usize,
        rows: Vec<RowView>,
    ) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("date", date);
        context.insert("page", &page);
        context.insert("total_pages", &total_pages);
        context.insert("empty", &rows.is_empty());
        context.insert("rows", &rows);

        self.tera
            .render(file_name, &context)
            .map_err(|error| RenderError::Template(describe(&error)))
    }
}

/// Wraps a trailing `(X)` segment, X free of parentheses, in a
/// `devanagari` span. Other names are returned unchanged.
pub fn highlight_devanagari(name: &str) -> Cow<'_, str> {
    static TRAILING_GROUP: OnceLock<Regex> = OnceLock::new();
    let pattern = TRAILING_GROUP
        .get_or_init(|| Regex::new(r"\(([^()]+)\)$").expect("trailing group pattern is valid"));

    pattern.replace(name, r#"(<span class="devanagari">${1}</span>)"#)
}

/// `DD-Mon-YYYY HH:MM:SS` in Indian Standard Time.
pub fn format_issued_at(issued_at: DateTime<Utc>) -> String {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    issued_at.with_timezone(&ist).format("%d-%b-%Y %H:%M:%S").to_string()
}

fn template_file(template: &str) -> String {
    format!("{template}{TEMPLATE_SUFFIX}")
}

fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use chrono::{TimeZone, Utc};
    use orderslip_core::{paginate, LineItem};

    use super::{format_issued_at, highlight_devanagari, ReceiptRenderer, RenderError, PAGE_BREAK};

    fn renderer() -> ReceiptRenderer {
        ReceiptRenderer::with_embedded_templates().expect("embedded templates should load")
    }

    fn items(count: usize) -> Vec<LineItem> {
        (1..=count).map(|n| LineItem::new(format!("Item {n}"), format!("{n} kg"))).collect()
    }

    fn page_size(size: usize) -> NonZeroUsize {
        NonZeroUsize::new(size).expect("non-zero page size")
    }

    #[test]
    fn highlights_trailing_transliteration() {
        assert_eq!(highlight_devanagari("Tea (चाय)"), r#"Tea (<span class="devanagari">चाय</span>)"#);
    }

    #[test]
    fn leaves_plain_and_nested_names_unchanged() {
        assert_eq!(highlight_devanagari("Sugar"), "Sugar");
        assert_eq!(highlight_devanagari("Item ((a)b)"), "Item ((a)b)");
        assert_eq!(highlight_devanagari("Rice (Basmati) 5kg"), "Rice (Basmati) 5kg");
        assert_eq!(highlight_devanagari("Oil ()"), "Oil ()");
    }

    #[test]
    fn issue_time_is_indian_standard_time() {
        let issued_at = Utc.with_ymd_and_hms(2024, 3, 9, 20, 45, 7).single().expect("valid time");
        assert_eq!(format_issued_at(issued_at), "10-Mar-2024 02:15:07");

        let new_year = Utc.with_ymd_and_hms(2024, 12, 31, 18, 30, 0).single().expect("valid time");
        assert_eq!(format_issued_at(new_year), "01-Jan-2025 00:00:00");
    }

    #[test]
    fn page_breaks_separate_pages_only() {
        let issued_at = Utc::now();
        for (count, expected_pages) in [(1, 1), (18, 1), (19, 2), (40, 3)] {
            let pages = paginate(&items(count), page_size(18));
            let markup =
                renderer().render(&pages, issued_at, "anil_kiryana").expect("render succeeds");

            assert_eq!(markup.matches(PAGE_BREAK).count(), expected_pages - 1);
            assert!(!markup.ends_with(PAGE_BREAK));

            let blocks: Vec<&str> = markup.split(PAGE_BREAK).collect();
            assert_eq!(blocks.len(), expected_pages);
            for (index, block) in blocks.iter().enumerate() {
                assert!(block.contains(&format!("Page {} of {expected_pages}", index + 1)));
            }
        }
    }

    #[test]
    fn rows_carry_global_serials_and_blank_annotation_column() {
        let pages = paginate(&items(20), page_size(18));
        let markup = renderer().render(&pages, Utc::now(), "rs_vegetables").expect("render");

        let second_page = markup.split(PAGE_BREAK).nth(1).expect("second page");
        assert!(second_page.contains(r#"<td class="serial">19</td>"#));
        assert!(second_page.contains(r#"<td class="serial">20</td>"#));
        assert!(second_page.contains("Item 20"));
        assert!(!second_page.contains("Item 18<"));
        assert_eq!(markup.matches(r#"<td class="notes"></td>"#).count(), 20);
    }

    #[test]
    fn item_text_is_escaped_before_highlighting() {
        let pages = paginate(
            &[LineItem::new("<b>Paneer</b> (पनीर)", "1 <kg>")],
            page_size(18),
        );
        let markup = renderer().render(&pages, Utc::now(), "anil_kiryana").expect("render");

        assert!(markup.contains(r#"&lt;b&gt;Paneer&lt;&#x2F;b&gt; (<span class="devanagari">पनीर</span>)"#));
        assert!(markup.contains("1 &lt;kg&gt;"));
        assert!(!markup.contains("<b>Paneer"));
    }

    #[test]
    fn empty_order_renders_explicit_empty_receipt() {
        let markup = renderer().render(&[], Utc::now(), "anil_kiryana").expect("render");

        assert!(markup.contains("No items could be read from this order."));
        assert!(markup.contains("Page 1 of 1"));
        assert_eq!(markup.matches(PAGE_BREAK).count(), 0);
    }

    #[test]
    fn unknown_template_is_rejected() {
        let error = renderer().render(&[], Utc::now(), "missing").expect_err("unknown template");
        assert!(matches!(error, RenderError::UnknownTemplate(ref name) if name == "missing"));
    }

    #[test]
    fn bundled_template_directory_loads() {
        let dir =
            std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates/receipts");
        let renderer = ReceiptRenderer::from_dir(&dir).expect("template dir should load");

        assert!(renderer.has_template("anil_kiryana"));
        assert!(renderer.has_template("rs_vegetables"));
        assert!(!renderer.has_template("missing"));
    }
}
