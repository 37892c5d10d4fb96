/// Default number of `<p>` elements kept per page.
pub const DEFAULT_MAX_PARAGRAPHS: usize = 10;

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first `max_paragraphs` `<p>` elements, newline-joined.
///
/// Empty paragraphs still count toward the limit but are not emitted.
pub fn paragraph_text(html: &str, max_paragraphs: usize) -> String {
    let doc = html_scraper::Html::parse_document(html);
    let Ok(sel) = html_scraper::Selector::parse("p") else {
        return String::new();
    };
    doc.select(&sel)
        .take(max_paragraphs)
        .map(|el| norm_ws(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain-text bodies have no paragraphs; keep the first `max_lines` non-blank lines.
pub fn plain_text_lines(body: &str, max_lines: usize) -> String {
    body.lines()
        .map(norm_ws)
        .filter(|l| !l.is_empty())
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn keeps_first_paragraphs_in_document_order() {
        let html = r#"
        <html><body>
          <nav><a href="/">Home</a></nav>
          <p>First <b>bold</b>   paragraph.</p>
          <div><p>Second
             paragraph.</p></div>
          <p></p>
          <p>Fourth.</p>
        </body></html>
        "#;
        assert_eq!(
            paragraph_text(html, 10),
            "First bold paragraph.\nSecond paragraph.\nFourth."
        );
        assert_eq!(paragraph_text(html, 1), "First bold paragraph.");
    }

    #[test]
    fn limit_counts_empty_paragraphs() {
        let html = "<p>a</p><p> </p><p>c</p>";
        assert_eq!(paragraph_text(html, 2), "a");
    }

    #[test]
    fn no_paragraphs_yields_empty_text() {
        assert_eq!(paragraph_text("<h1>Only a heading</h1>", 10), "");
        assert_eq!(paragraph_text("", 10), "");
    }

    #[test]
    fn plain_text_lines_skip_blanks() {
        assert_eq!(plain_text_lines("a\n\n  b  c\nd", 2), "a\nb c");
    }

    proptest! {
        #[test]
        fn paragraph_text_never_panics(s in ".{0,400}") {
            let out = paragraph_text(&s, 10);
            prop_assert!(out.lines().count() <= 10);
        }
    }
}
