//! Digest renderers.
//!
//! A renderer turns the ranked list into a document. Renderers are pure:
//! they take the generation time as an argument and never touch the
//! filesystem.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::ScoredPaper;

/// Authors shown before the list is cut short.
pub const MAX_AUTHORS: usize = 5;

/// Categories shown per paper.
pub const MAX_CATEGORIES: usize = 3;

/// Abstract length, in characters, before truncation.
pub const ABSTRACT_PREVIEW_CHARS: usize = 300;

/// Trait for digest output formats.
pub trait DigestRenderer: Send + Sync {
    /// Render `papers` (already ranked) as a complete document.
    fn render(&self, papers: &[ScoredPaper], generated_at: DateTime<Utc>) -> String;

    /// File extension, without the dot.
    fn extension(&self) -> &'static str;
}

/// Join author names, listing at most `max_authors` of them.
///
/// ```
/// use paper_digest::digest::render::format_authors;
///
/// let authors: Vec<String> = (1..=7).map(|i| format!("A{}", i)).collect();
/// assert_eq!(format_authors(&authors, 5), "A1, A2, A3, A4, A5, et al. (+2 more)");
/// ```
pub fn format_authors(authors: &[String], max_authors: usize) -> String {
    if authors.len() <= max_authors {
        return authors.join(", ");
    }

    format!(
        "{}, et al. (+{} more)",
        authors[..max_authors].join(", "),
        authors.len() - max_authors
    )
}

/// Cut `text` to `max_chars` characters, appending "..." when it was longer.
pub fn truncate_abstract(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn digest_title(generated_at: DateTime<Utc>) -> String {
    format!("arXiv Paper Digest - {}", generated_at.format("%Y-%m-%d"))
}

fn generated_line(generated_at: DateTime<Utc>) -> String {
    format!("Generated on {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"))
}

fn categories_line(scored: &ScoredPaper) -> String {
    scored
        .paper
        .categories
        .iter()
        .take(MAX_CATEGORIES)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Markdown digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl DigestRenderer for MarkdownRenderer {
    fn render(&self, papers: &[ScoredPaper], generated_at: DateTime<Utc>) -> String {
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(out, "# {}\n", digest_title(generated_at));
        let _ = writeln!(out, "*{}*\n", generated_line(generated_at));
        let _ = writeln!(out, "Found {} relevant papers.\n", papers.len());
        let _ = writeln!(out, "---\n");

        for (rank, scored) in papers.iter().enumerate() {
            let paper = &scored.paper;

            let _ = writeln!(out, "## {}. [{}]({})\n", rank + 1, paper.title, paper.url);
            let _ = writeln!(
                out,
                "**Authors:** {}\n",
                format_authors(&paper.authors, MAX_AUTHORS)
            );
            let _ = writeln!(out, "**Published:** {}\n", paper.published.format("%Y-%m-%d"));
            let _ = writeln!(out, "**Categories:** {}\n", categories_line(scored));

            let _ = write!(out, "**Relevance Score:** {:.3}", scored.similarity_score);
            if scored.keyword_matches > 0 {
                let _ = write!(out, " (Keyword matches: {})", scored.keyword_matches);
            }
            out.push_str("\n\n");

            if let Some(topic) = &paper.matched_topic {
                let _ = writeln!(out, "**Topic:** {}\n", topic);
            }

            let _ = writeln!(
                out,
                "**Abstract:** {}\n",
                truncate_abstract(&paper.abstract_text, ABSTRACT_PREVIEW_CHARS)
            );

            match &paper.pdf_url {
                Some(pdf) => {
                    let _ = writeln!(out, "[PDF]({}) | [arXiv]({})\n", pdf, paper.url);
                }
                None => {
                    let _ = writeln!(out, "[arXiv]({})\n", paper.url);
                }
            }
            let _ = writeln!(out, "---\n");
        }

        out
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

const HTML_STYLE: &str = r#"        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 900px; margin: 0 auto; padding: 20px; line-height: 1.6; color: #333; background-color: #f5f5f5; }
        .container { background-color: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        h1 { color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; }
        .meta { color: #7f8c8d; font-size: 0.9em; }
        .paper { margin-bottom: 30px; padding: 20px; background-color: #fafafa; border-left: 4px solid #3498db; border-radius: 4px; }
        .paper h2 { color: #2c3e50; margin-top: 0; font-size: 1.3em; }
        .paper h2 a { color: #2c3e50; text-decoration: none; }
        .paper-meta { color: #7f8c8d; font-size: 0.9em; margin: 10px 0; }
        .abstract { margin: 15px 0; color: #555; }
        .links a { display: inline-block; padding: 6px 12px; margin-right: 10px; background-color: #3498db; color: white; text-decoration: none; border-radius: 4px; font-size: 0.9em; }
        .score { display: inline-block; padding: 4px 8px; background-color: #2ecc71; color: white; border-radius: 3px; font-size: 0.85em; font-weight: bold; }
        .topic-tag { display: inline-block; padding: 4px 8px; background-color: #9b59b6; color: white; border-radius: 3px; font-size: 0.85em; margin-left: 10px; }
"#;

/// Standalone HTML digest with inline styling.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl DigestRenderer for HtmlRenderer {
    fn render(&self, papers: &[ScoredPaper], generated_at: DateTime<Utc>) -> String {
        let title = escape_html(&digest_title(generated_at));
        let mut out = String::new();

        let _ = write!(
            out,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    \
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    \
             <title>{title}</title>\n    <style>\n{style}    </style>\n</head>\n<body>\n    \
             <div class=\"container\">\n        <h1>{title}</h1>\n        \
             <p class=\"meta\">{generated}</p>\n        \
             <p class=\"meta\">Found {count} relevant papers.</p>\n        <hr>\n",
            title = title,
            style = HTML_STYLE,
            generated = escape_html(&generated_line(generated_at)),
            count = papers.len(),
        );

        for (rank, scored) in papers.iter().enumerate() {
            let paper = &scored.paper;
            let url = escape_html(&paper.url);

            let _ = writeln!(out, "        <div class=\"paper\">");
            let _ = writeln!(
                out,
                "            <h2>{}. <a href=\"{}\" target=\"_blank\">{}</a></h2>",
                rank + 1,
                url,
                escape_html(&paper.title)
            );
            let _ = writeln!(
                out,
                "            <div class=\"paper-meta\"><strong>Authors:</strong> {}</div>",
                escape_html(&format_authors(&paper.authors, MAX_AUTHORS))
            );
            let _ = writeln!(
                out,
                "            <div class=\"paper-meta\"><strong>Published:</strong> {} | \
                 <strong>Categories:</strong> {}</div>",
                paper.published.format("%Y-%m-%d"),
                escape_html(&categories_line(scored))
            );

            let _ = write!(
                out,
                "            <div class=\"paper-meta\"><span class=\"score\">Relevance: {:.3}</span>",
                scored.similarity_score
            );
            if let Some(topic) = &paper.matched_topic {
                let _ = write!(out, "<span class=\"topic-tag\">{}</span>", escape_html(topic));
            }
            if scored.keyword_matches > 0 {
                let _ = write!(out, " <em>(Keyword matches: {})</em>", scored.keyword_matches);
            }
            out.push_str("</div>\n");

            let _ = writeln!(
                out,
                "            <div class=\"abstract\"><strong>Abstract:</strong> {}</div>",
                escape_html(&truncate_abstract(&paper.abstract_text, ABSTRACT_PREVIEW_CHARS))
            );

            out.push_str("            <div class=\"links\">\n");
            if let Some(pdf) = &paper.pdf_url {
                let _ = writeln!(
                    out,
                    "                <a href=\"{}\" target=\"_blank\">PDF</a>",
                    escape_html(pdf)
                );
            }
            let _ = writeln!(
                out,
                "                <a href=\"{}\" target=\"_blank\">arXiv Page</a>",
                url
            );
            out.push_str("            </div>\n        </div>\n");
        }

        out.push_str("    </div>\n</body>\n</html>\n");
        out
    }

    fn extension(&self) -> &'static str {
        "html"
    }
}
