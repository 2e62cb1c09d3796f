//! The LaTeX and MMD emitters share the renderer contract with HTML; these
//! tests cover the format-specific surface.

use mmd::{convert, Engine, Extensions, OutputFormat};

fn latex(text: &str) -> String {
    convert(text, Extensions::standard(), OutputFormat::Latex).text
}

fn mmd_out(text: &str) -> String {
    convert(text, Extensions::standard(), OutputFormat::Mmd).text
}

mod latex_format {
    use super::*;

    #[test]
    fn headings_map_to_sections() {
        let output = latex("# One\n\n## Two\n");
        assert!(output.contains("\\section{One}"));
        assert!(output.contains("\\subsection{Two}"));
        assert!(output.contains("\\label{one}"));
    }

    #[test]
    fn memoir_mode_shifts_to_chapters() {
        let output = convert("# One\n", Extensions::standard(), OutputFormat::Memoir).text;
        assert!(output.contains("\\chapter{One}"));
    }

    #[test]
    fn emphasis_and_code() {
        let output = latex("*em* **strong** `code`\n");
        assert!(output.contains("\\emph{em}"));
        assert!(output.contains("\\textbf{strong}"));
        assert!(output.contains("\\texttt{code}"));
    }

    #[test]
    fn special_characters_are_escaped() {
        let output = latex("100% of $5 & more_things\n");
        assert!(output.contains("100\\%"));
        assert!(output.contains("\\&"));
        assert!(output.contains("more\\_things"));
    }

    #[test]
    fn links_and_footnotes() {
        let output = latex("See [site](https://example.com).[^n]\n\n[^n]: The note.\n");
        assert!(output.contains("\\href{https://example.com}{site}"));
        assert!(output.contains("\\footnote{"));
        assert!(output.contains("The note."));
    }

    #[test]
    fn table_columns_from_alignment() {
        let output = latex("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        assert!(output.contains("\\begin{tabular}{lr}"));
        assert!(output.contains("1 & 2 \\\\"));
    }

    #[test]
    fn math_passes_through() {
        let output = latex("Euler: $e^2$\n");
        assert!(output.contains("$e^2$"));
    }

    #[test]
    fn raw_latex_filter_emits_only_for_latex() {
        let text = "x `\\vspace{1em}`{=latex} y\n";
        assert!(latex(text).contains("\\vspace{1em}"));
        let html = convert(text, Extensions::standard(), OutputFormat::Html).text;
        assert!(!html.contains("\\vspace"));
    }

    #[test]
    fn complete_document_preamble() {
        let output = latex("title: A Paper\nlatexmode: memoir\n\nBody\n");
        assert!(output.contains("\\documentclass"));
        assert!(output.contains("\\title{A Paper}"));
        assert!(output.contains("\\begin{document}"));
        assert!(output.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn bibtex_citations() {
        let output = latex("bibtex: true\n\nAs shown.[#doe2001]\n");
        assert!(output.contains("\\cite{#doe2001}") || output.contains("\\cite{doe2001}"));
    }
}

mod mmd_format {
    use super::*;

    #[test]
    fn block_structure_round_trips() {
        let text = "# Title\n\nA paragraph of text.\n\n- one\n- two\n";
        let once = mmd_out(text);
        assert!(once.contains("# Title"));
        assert!(once.contains("A paragraph of text."));
        assert!(once.contains("- one"));
    }

    #[test]
    fn re_emission_is_stable() {
        let text = "# Title\n\nPara one.\n\nPara two.\n\n> quote\n";
        let once = mmd_out(text);
        let twice = mmd_out(&once);
        assert_eq!(once, twice, "MMD re-emission must be a fixed point");
    }

    #[test]
    fn metadata_block_re_emits() {
        let output = mmd_out("title: X\nauthor: Y\n\nBody\n");
        assert!(output.contains("title: X"));
        assert!(output.contains("author: Y"));
        assert!(output.contains("Body"));
    }

    #[test]
    fn heading_structure_survives_round_trip() {
        let text = "# One\n\n## Two\n\nBody text.\n";
        let engine = Engine::new(&mmd_out(text), Extensions::standard());
        let labels: Vec<_> = engine
            .defs()
            .headers
            .iter()
            .map(|h| (h.level, h.label.clone()))
            .collect();
        assert_eq!(
            labels,
            vec![(1, "one".to_string()), (2, "two".to_string())]
        );
    }
}
