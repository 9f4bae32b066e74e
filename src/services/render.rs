//! Report rendering: a Markdown subset to HTML, and HTML/text to PDF.
//!
//! The PDF path prefers an external HTML-to-PDF service. When it is not
//! configured or fails in any way, a minimal single-page PDF is emitted
//! locally so the caller always receives a document.

use std::time::Duration;

use crate::config::Config;

pub const PDF_HEADER: &str = "%PDF-1.4";
const PDF_LINE_WIDTH: usize = 80;

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Replaces `**bold**` then `*italic*` spans. Unpaired markers are kept.
fn render_inline(text: &str) -> String {
    let bold = replace_pairs(text, "**", "<strong>", "</strong>");
    replace_pairs(&bold, "*", "<em>", "</em>")
}

fn replace_pairs(text: &str, marker: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(marker) {
        let after = &rest[start + marker.len()..];
        match after.find(marker) {
            Some(end) if end > 0 => {
                out.push_str(&rest[..start]);
                out.push_str(open);
                out.push_str(&after[..end]);
                out.push_str(close);
                rest = &after[end + marker.len()..];
            }
            _ => {
                out.push_str(&rest[..start + marker.len()]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Converts the Markdown subset the report template produces: `#`/`##`/`###`
/// headings, bold, italic, `---` rules, paragraphs and line breaks.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();

    fn flush(paragraph: &mut Vec<String>, html: &mut Vec<String>) {
        if !paragraph.is_empty() {
            html.push(format!("<p>{}</p>", paragraph.join("<br>")));
            paragraph.clear();
        }
    }

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut paragraph, &mut html);
            continue;
        }
        if trimmed == "---" {
            flush(&mut paragraph, &mut html);
            html.push("<hr>".to_string());
            continue;
        }
        let heading = [("### ", "h3"), ("## ", "h2"), ("# ", "h1")]
            .into_iter()
            .find_map(|(prefix, tag)| trimmed.strip_prefix(prefix).map(|rest| (tag, rest)));
        if let Some((tag, rest)) = heading {
            flush(&mut paragraph, &mut html);
            html.push(format!("<{tag}>{}</{tag}>", render_inline(&escape_html(rest.trim()))));
            continue;
        }
        paragraph.push(render_inline(&escape_html(trimmed)));
    }
    flush(&mut paragraph, &mut html);

    html.join("\n")
}

pub fn wrap_html_document(body_html: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>Health Report</title>
    <style>
      body {{ font-family: 'Segoe UI', system-ui, -apple-system, sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 40px 20px; color: #333; }}
      h1, h2, h3 {{ color: #2563eb; border-bottom: 2px solid #e5e7eb; padding-bottom: 8px; }}
      h1 {{ font-size: 28px; margin-bottom: 30px; }}
      h2 {{ font-size: 22px; margin-top: 30px; margin-bottom: 15px; }}
      h3 {{ font-size: 18px; margin-top: 20px; margin-bottom: 10px; }}
      p {{ margin-bottom: 12px; }}
      strong {{ color: #1f2937; }}
      .header {{ text-align: center; margin-bottom: 40px; border-bottom: 3px solid #2563eb; padding-bottom: 20px; }}
      .logo {{ color: #2563eb; font-weight: bold; font-size: 16px; }}
    </style>
  </head>
  <body>
    <div class="header"><div class="logo">Health Journal</div></div>
    {body}
  </body>
</html>
"#,
        body = body_html
    )
}

/// Escapes a line for use inside a PDF literal string.
fn pdf_literal(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Emits a single-page PDF 1.4 document showing `text` as left-aligned
/// Helvetica lines. Non-ASCII characters are dropped and lines are cut at
/// 80 characters.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    let mut stream = String::from("BT\n/F1 12 Tf\n15 TL\n50 750 Td\n");
    for line in text.lines() {
        let ascii: String = line
            .chars()
            .filter(|c| (' '..='~').contains(c))
            .take(PDF_LINE_WIDTH)
            .collect();
        stream.push_str(&format!("({}) Tj T*\n", pdf_literal(&ascii)));
    }
    stream.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = format!("{}\n", PDF_HEADER);
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_start = out.len();
    out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    out.push_str("0000000000 65535 f \n");
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_start
    ));

    out.into_bytes()
}

/// Renders report text to PDF bytes.
#[derive(Clone)]
pub struct PdfRenderer {
    http: reqwest::Client,
    service_url: Option<String>,
    user_id: String,
    api_key: String,
}

impl PdfRenderer {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.ai_timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            service_url: config.pdf_service_url.clone(),
            user_id: config.pdf_service_user_id.clone(),
            api_key: config.pdf_service_api_key.clone(),
        })
    }

    /// Never fails: any problem with the rendering service falls back to
    /// the locally emitted document.
    pub async fn render(&self, report_markdown: &str) -> Vec<u8> {
        let Some(url) = self.service_url.as_deref() else {
            tracing::debug!("No PDF service configured, using minimal PDF writer");
            return minimal_pdf(report_markdown);
        };

        let html = wrap_html_document(&markdown_to_html(report_markdown));
        match self.render_remote(url, &html).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "PDF generation failed, using minimal PDF writer");
                minimal_pdf(report_markdown)
            }
        }
    }

    async fn render_remote(&self, url: &str, html: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .http
            .post(url)
            .basic_auth(&self.user_id, Some(&self.api_key))
            .json(&serde_json::json!({
                "html": html,
                "format": "pdf",
                "width": 800,
                "height": 1100,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("PDF service returned {}", response.status());
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            anyhow::bail!("PDF service returned an empty body");
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn renderer(service_url: Option<String>) -> PdfRenderer {
        let mut config = Config::for_tests();
        config.pdf_service_url = service_url;
        PdfRenderer::new(&config).unwrap()
    }

    #[test]
    fn test_headings_and_rule() {
        let html = markdown_to_html("# Title\n## Section\n### Sub\n---");
        assert_eq!(html, "<h1>Title</h1>\n<h2>Section</h2>\n<h3>Sub</h3>\n<hr>");
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(
            markdown_to_html("**MEDICAL DISCLAIMER:** see *below*"),
            "<p><strong>MEDICAL DISCLAIMER:</strong> see <em>below</em></p>"
        );
    }

    #[test]
    fn test_paragraphs_and_line_breaks() {
        assert_eq!(
            markdown_to_html("line one\nline two\n\nnext paragraph"),
            "<p>line one<br>line two</p>\n<p>next paragraph</p>"
        );
    }

    #[test]
    fn test_unpaired_marker_is_left_alone() {
        assert_eq!(markdown_to_html("5 * 3"), "<p>5 * 3</p>");
    }

    #[test]
    fn test_html_is_escaped() {
        assert_eq!(markdown_to_html("<b>x</b> & y"), "<p>&lt;b&gt;x&lt;/b&gt; &amp; y</p>");
    }

    #[test]
    fn test_minimal_pdf_structure() {
        let pdf = String::from_utf8(minimal_pdf("# Report\nMood (avg) 6/10\nCafé ☕")).unwrap();
        assert!(pdf.starts_with("%PDF-1.4"));
        assert!(pdf.trim_end().ends_with("%%EOF"));
        assert!(pdf.contains("(# Report) Tj"));
        assert!(pdf.contains("(Mood \\(avg\\) 6/10) Tj"));
        assert!(pdf.contains("(Caf ) Tj"));
        assert!(pdf.is_ascii());
    }

    #[test]
    fn test_minimal_pdf_truncates_long_lines() {
        let long = "x".repeat(200);
        let pdf = String::from_utf8(minimal_pdf(&long)).unwrap();
        assert!(pdf.contains(&format!("({}) Tj", "x".repeat(80))));
        assert!(!pdf.contains(&"x".repeat(81)));
    }

    #[test]
    fn test_minimal_pdf_xref_offsets_point_at_objects() {
        let pdf = String::from_utf8(minimal_pdf("hello")).unwrap();
        let xref = pdf.find("xref\n").unwrap();
        let entries: Vec<usize> = pdf[xref..]
            .lines()
            .skip(3)
            .take(5)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (i, offset) in entries.iter().enumerate() {
            assert!(pdf[*offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
        let startxref: usize = pdf
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(startxref, xref);
    }

    #[tokio::test]
    async fn test_unconfigured_service_uses_fallback() {
        let bytes = renderer(None).render("# Health Report for Ana").await;
        assert!(bytes.starts_with(PDF_HEADER.as_bytes()));
    }

    #[tokio::test]
    async fn test_failing_service_falls_back_to_minimal_pdf() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let bytes = renderer(Some(server.url())).render("# Health Report for Ana").await;

        assert!(!bytes.is_empty());
        assert!(bytes.starts_with(b"%PDF-1.4"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_service_bytes_are_returned_as_is() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({ "format": "pdf", "width": 800 })))
            .with_status(200)
            .with_body("%PDF-1.7 rendered")
            .create_async()
            .await;

        let bytes = renderer(Some(server.url())).render("# Title").await;
        assert_eq!(bytes, b"%PDF-1.7 rendered");
    }
}
