//! End-to-end HTML rendering tests for the core block and inline grammar.

#[macro_use]
mod harness;

use harness::{render_html, render_html_lang};
use mmd::{Extensions, Language};

mod headings {
    html_test!(
        atx_heading_with_paragraph,
        "# Hello\n\nWorld\n",
        "<h1 id=\"hello\">Hello</h1>\n\n<p>World</p>\n"
    );
    html_test!(
        deeper_heading,
        "### Third Level\n",
        "<h3 id=\"thirdlevel\">Third Level</h3>\n"
    );
    html_test!(
        setext_heading,
        "Title\n=====\n",
        "<h1 id=\"title\">Title</h1>\n"
    );
    html_test!(
        setext_second_level,
        "Title\n-----\n",
        "<h2 id=\"title\">Title</h2>\n"
    );
    html_test!(
        closing_hashes_are_dropped,
        "## Trimmed ##\n",
        "<h2 id=\"trimmed\">Trimmed</h2>\n"
    );

    #[test]
    fn manual_label_wins() {
        crate::harness::run_contains_test(
            "## Größe [size]\n",
            mmd::Extensions::standard(),
            &["<h2 id=\"size\">", "Größe</h2>"],
        );
    }

    #[test]
    fn base_header_level_shifts_output() {
        let output = crate::harness::render_html(
            "baseheaderlevel: 2\n\n# Shifted\n",
            mmd::Extensions::standard(),
        );
        assert!(output.contains("<h2 id=\"shifted\">Shifted</h2>"));
    }

    #[test]
    fn no_labels_drops_ids() {
        let output = crate::harness::render_html(
            "# Hello\n",
            mmd::Extensions::standard() | mmd::Extensions::NO_LABELS,
        );
        assert!(output.contains("<h1>Hello</h1>"));
    }
}

mod paragraphs_and_breaks {
    html_test!(simple_paragraph, "Just text.\n", "<p>Just text.</p>\n");
    html_test!(
        soft_break_keeps_newline,
        "one\ntwo\n",
        "<p>one\ntwo</p>\n"
    );
    html_test!(
        hard_break,
        "one  \ntwo\n",
        "<p>one<br />\ntwo</p>\n"
    );
    html_test!(
        escaped_punctuation,
        "not \\*emphasis\\*\n",
        "<p>not *emphasis*</p>\n"
    );
    html_test!(
        entity_passthrough,
        "AT&amp;T &#8212; yes\n",
        "<p>AT&amp;T &#8212; yes</p>\n"
    );
    html_test!(
        bare_ampersand_is_escaped,
        "salt & pepper\n",
        "<p>salt &amp; pepper</p>\n"
    );
    html_test!(
        angle_brackets_escape,
        "1 < 2 > 0\n",
        "<p>1 &lt; 2 &gt; 0</p>\n"
    );
}

mod emphasis {
    html_test!(star_emphasis, "*hi*\n", "<p><em>hi</em></p>\n");
    html_test!(strong, "**hi**\n", "<p><strong>hi</strong></p>\n");
    html_test!(
        triple_nested,
        "***hi***\n",
        "<p><em><strong>hi</strong></em></p>\n"
    );
    html_test!(
        adjacent_mixed,
        "*hi***yes**\n",
        "<p><em>hi</em><strong>yes</strong></p>\n"
    );
    html_test!(
        underscore_emphasis,
        "_hi_\n",
        "<p><em>hi</em></p>\n"
    );
    html_test!(
        intraword_underscore_is_literal,
        "snake_case_name\n",
        "<p>snake_case_name</p>\n"
    );
    html_test!(
        unmatched_star_is_literal,
        "a * b\n",
        "<p>a * b</p>\n"
    );
    html_test!(
        subscript_and_superscript,
        "H~2~O and x^2^\n",
        "<p>H<sub>2</sub>O and x<sup>2</sup></p>\n"
    );
}

mod code {
    html_test!(
        code_span,
        "use `let x` here\n",
        "<p>use <code>let x</code> here</p>\n"
    );
    html_test!(
        code_span_escapes_html,
        "`<b>`\n",
        "<p><code>&lt;b&gt;</code></p>\n"
    );
    html_test!(
        double_backtick_span,
        "``a `tick` b``\n",
        "<p><code>a `tick` b</code></p>\n"
    );
    html_test!(
        indented_code_block,
        "    let x = 1;\n",
        "<pre><code>let x = 1;\n</code></pre>\n"
    );
    html_test!(
        fenced_code_block,
        "```\ncode here\n```\n",
        "<pre><code>code here\n</code></pre>\n"
    );
    html_test!(
        fenced_with_language,
        "```rust\nlet x = 1;\n```\n",
        "<pre><code class=\"language-rust\">let x = 1;\n</code></pre>\n"
    );

    #[test]
    fn code_block_content_is_not_parsed() {
        let output = crate::harness::render_html(
            "```\n# not a heading\n*not emphasis*\n```\n",
            mmd::Extensions::standard(),
        );
        assert!(output.contains("# not a heading"));
        assert!(output.contains("*not emphasis*"));
    }
}

mod links {
    html_test!(
        explicit_link,
        "[text](https://example.com)\n",
        "<p><a href=\"https://example.com\">text</a></p>\n"
    );
    html_test!(
        explicit_link_with_title,
        "[text](https://example.com \"A Title\")\n",
        "<p><a href=\"https://example.com\" title=\"A Title\">text</a></p>\n"
    );
    html_test!(
        reference_link,
        "[foo][bar]\n\n[bar]: https://example.com \"Example\"\n",
        "<p><a href=\"https://example.com\" title=\"Example\">foo</a></p>\n"
    );
    html_test!(
        shortcut_reference,
        "[foo]\n\n[foo]: https://example.com\n",
        "<p><a href=\"https://example.com\">foo</a></p>\n"
    );
    html_test!(
        unresolved_reference_is_literal,
        "[foo][missing]\n",
        "<p>[foo][missing]</p>\n"
    );
    html_test!(
        autolink_uri,
        "<https://example.com>\n",
        "<p><a href=\"https://example.com\">https://example.com</a></p>\n"
    );
    html_test!(
        autolink_email,
        "<user@example.com>\n",
        "<p><a href=\"mailto:user@example.com\">user@example.com</a></p>\n"
    );
    html_test!(
        image,
        "![alt text](pic.png)\n",
        "<figure>\n<img src=\"pic.png\" alt=\"alt text\" />\n<figcaption>alt text</figcaption>\n</figure>\n"
    );
    html_test!(
        inline_image_is_not_a_figure,
        "before ![alt](pic.png) after\n",
        "<p>before <img src=\"pic.png\" alt=\"alt\" /> after</p>\n"
    );

    #[test]
    fn link_attributes_carry_through() {
        crate::harness::run_contains_test(
            "![img][pic]\n\n[pic]: photo.png \"t\" width=400px height=300\n",
            mmd::Extensions::standard(),
            &["width=\"400\"", "height=\"300\""],
        );
    }
}

mod lists {
    html_test!(
        tight_bulleted_list,
        "- one\n- two\n",
        "<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n"
    );
    html_test!(
        enumerated_list,
        "1. first\n2. second\n",
        "<ol>\n<li>first</li>\n<li>second</li>\n</ol>\n"
    );

    #[test]
    fn loose_list_wraps_paragraphs() {
        crate::harness::run_contains_test(
            "- one\n\n- two\n",
            mmd::Extensions::standard(),
            &["<ul>", "<li><p>one</p></li>", "<li><p>two</p></li>", "</ul>"],
        );
    }

    #[test]
    fn nested_list() {
        crate::harness::run_contains_test(
            "- outer\n    - inner\n",
            mmd::Extensions::standard(),
            &["<ul>", "<li>outer", "<ul>", "<li>inner</li>", "</ul>", "</li>", "</ul>"],
        );
    }

    #[test]
    fn enumerator_greater_than_one_cannot_interrupt() {
        let output = crate::harness::render_html(
            "some text\n2. not a list\n",
            mmd::Extensions::standard(),
        );
        assert!(!output.contains("<ol>"));
    }
}

mod blockquotes_and_rules {
    html_fragments_test!(
        blockquote,
        "> quoted\n",
        ["<blockquote>", "<p>quoted</p>", "</blockquote>"]
    );
    html_fragments_test!(
        nested_blockquote,
        "> outer\n> > inner\n",
        ["<blockquote>", "<blockquote>", "<p>inner</p>"]
    );
    html_test!(thematic_break, "---\n", "<hr />\n");
    html_test!(spaced_thematic_break, "* * *\n", "<hr />\n");
}

mod html_blocks {
    html_test!(
        html_block_passthrough,
        "<div class=\"x\">\nraw\n</div>\n",
        "<div class=\"x\">\nraw\n</div>\n"
    );
    html_test!(
        inline_html_passthrough,
        "a <b>bold</b> word\n",
        "<p>a <b>bold</b> word</p>\n"
    );
    html_test!(
        html_comment_passthrough,
        "text <!-- hidden --> more\n",
        "<p>text <!-- hidden --> more</p>\n"
    );
}

mod tables {
    #[test]
    fn aligned_table() {
        crate::harness::run_contains_test(
            "| a | b |\n|:--|--:|\n| 1 | 2 |\n",
            mmd::Extensions::standard(),
            &[
                "<table>",
                "<col style=\"text-align:left;\"/>",
                "<col style=\"text-align:right;\"/>",
                "<thead>",
                "<th style=\"text-align:left;\">a</th>",
                "<th style=\"text-align:right;\">b</th>",
                "</thead>",
                "<tbody>",
                "<td style=\"text-align:left;\">1</td>",
                "<td style=\"text-align:right;\">2</td>",
                "</tbody>",
                "</table>",
            ],
        );
    }

    #[test]
    fn caption_paragraph_is_absorbed() {
        let output = crate::harness::render_html(
            "| a |\n|---|\n| 1 |\n[My Caption]\n",
            mmd::Extensions::standard(),
        );
        assert!(output.contains("<caption id=\"mycaption\">My Caption</caption>"));
        assert!(!output.contains("<p>[My Caption]</p>"));
    }

    #[test]
    fn compatibility_mode_has_no_tables() {
        let output = crate::harness::render_html(
            "| a | b |\n|---|---|\n",
            mmd::Extensions::COMPATIBILITY,
        );
        assert!(!output.contains("<table>"));
    }
}

mod definition_lists {
    html_fragments_test!(
        simple_definition,
        "term\n: the definition\n",
        ["<dl>", "<dt>term</dt>", "<dd>the definition</dd>", "</dl>"]
    );
}

mod metadata {
    use super::*;

    #[test]
    fn metadata_forces_complete_document() {
        let output = render_html("title: My Doc\n\nBody\n", Extensions::standard());
        assert!(output.starts_with("<!DOCTYPE html>"));
        assert!(output.contains("<title>My Doc</title>"));
        assert!(output.contains("<p>Body</p>"));
        assert!(output.trim_end().ends_with("</html>"));
    }

    #[test]
    fn snippet_suppresses_the_shell() {
        let output = render_html(
            "title: My Doc\n\nBody\n",
            Extensions::standard() | Extensions::SNIPPET,
        );
        assert!(!output.contains("<!DOCTYPE html>"));
        assert_eq!(output, "<p>Body</p>\n");
    }

    #[test]
    fn metadata_is_not_body_content() {
        let output = render_html("title: Hidden\n\nBody\n", Extensions::standard());
        assert!(!output.contains("<p>title:"));
    }

    #[test]
    fn variable_interpolation() {
        let output = render_html(
            "title: The Title\n\nSee [%title] here.\n",
            Extensions::standard(),
        );
        assert!(output.contains("<p>See The Title here.</p>"));
    }

    #[test]
    fn css_metadata_links_stylesheet() {
        let output = render_html("css: style.css\n\nBody\n", Extensions::standard());
        assert!(output.contains("<link type=\"text/css\" rel=\"stylesheet\" href=\"style.css\"/>"));
    }
}

mod smart_typography {
    use super::*;

    #[test]
    fn english_double_quotes() {
        let output = render_html("\"Hello,\" she said.\n", Extensions::standard());
        assert!(output.contains("&#8220;Hello,&#8221;"));
    }

    #[test]
    fn german_double_quotes() {
        let output = render_html_lang(
            "\"Hello,\" she said.\n",
            Extensions::standard(),
            Language::German,
        );
        assert!(output.contains("&#8222;Hello,&#8220;"));
    }

    #[test]
    fn french_quotes_via_quoteslanguage() {
        let output = render_html(
            "quoteslanguage: fr\n\n\"Bonjour\"\n",
            Extensions::standard(),
        );
        assert!(output.contains("&#171;Bonjour&#187;"));
    }

    #[test]
    fn dashes_ellipsis_apostrophe() {
        let output = render_html("en--dash em---dash wait... isn't\n", Extensions::standard());
        assert!(output.contains("en&#8211;dash"));
        assert!(output.contains("em&#8212;dash"));
        assert!(output.contains("wait&#8230;"));
        assert!(output.contains("isn&#8217;t"));
    }

    #[test]
    fn nosmart_leaves_ascii() {
        let output = render_html(
            "\"Hello\" -- there...\n",
            Extensions::standard() - Extensions::SMART,
        );
        assert!(output.contains("&quot;Hello&quot; -- there..."));
    }
}

mod math {
    html_test!(
        dollar_math,
        "Euler: $e^{i\\pi}$\n",
        "<p>Euler: <span class=\"math\">\\(e^{i\\pi}\\)</span></p>\n"
    );
    html_test!(
        bracket_math,
        "\\[x^2\\]\n",
        "<p><span class=\"math\">\\[x^2\\]</span></p>\n"
    );
}

mod raw_filters {
    use super::*;

    #[test]
    fn matching_span_filter_passes_verbatim() {
        let output = render_html("raw `<b>x</b>`{=html} here\n", Extensions::standard());
        assert!(output.contains("raw <b>x</b> here"));
    }

    #[test]
    fn mismatched_span_filter_is_dropped() {
        let output = render_html("raw `\\bf x`{=latex} here\n", Extensions::standard());
        assert!(!output.contains("\\bf"));
    }

    #[test]
    fn star_filter_matches_all_formats() {
        let output = render_html("`anything`{=*}\n", Extensions::standard());
        assert!(output.contains("anything"));
        assert!(!output.contains("<code>"));
    }

    #[test]
    fn fenced_filter_block() {
        let output = render_html(
            "```{=html}\n<aside>raw</aside>\n```\n",
            Extensions::standard(),
        );
        assert!(output.contains("<aside>raw</aside>"));
        assert!(!output.contains("<pre>"));

        let dropped = render_html(
            "```{=latex}\n\\section{x}\n```\n",
            Extensions::standard(),
        );
        assert!(!dropped.contains("\\section"));
    }
}

mod toc {
    #[test]
    fn toc_lists_headers_by_level() {
        crate::harness::run_contains_test(
            "{{TOC}}\n\n# One\n\n## Nested\n\n# Two\n",
            mmd::Extensions::standard(),
            &[
                "<div class=\"TOC\">",
                "<li><a href=\"#one\">One</a></li>",
                "<ul>",
                "<li><a href=\"#nested\">Nested</a></li>",
                "</ul>",
                "<li><a href=\"#two\">Two</a></li>",
                "</div>",
            ],
        );
    }
}
