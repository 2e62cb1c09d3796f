#![allow(unused)]

use mmd::{Engine, Extensions, Language, OutputFormat};

pub fn render_html(input: &str, extensions: Extensions) -> String {
    Engine::new(input, extensions).render(OutputFormat::Html).text
}

pub fn render_html_lang(input: &str, extensions: Extensions, language: Language) -> String {
    Engine::with_options(input, extensions, language, 0)
        .render(OutputFormat::Html)
        .text
}

/// Assert the HTML rendering of `input` equals `expected` exactly.
#[allow(unused)]
pub fn run_html_test(input: &str, expected: &str) {
    let output = render_html(input, Extensions::standard());
    assert_eq!(expected, output, "input: {:?}", input);
}

/// Assert the HTML rendering contains every `expected` fragment, in order.
#[allow(unused)]
pub fn run_contains_test(input: &str, extensions: Extensions, expected: &[&str]) {
    let output = render_html(input, extensions);
    let mut position = 0;
    for fragment in expected {
        match output[position..].find(fragment) {
            Some(offset) => position += offset + fragment.len(),
            None => panic!(
                "fragment {:?} not found (in order) in output:\n{}",
                fragment, output
            ),
        }
    }
}

/// Test that the input renders exactly as given.
#[allow(unused)]
macro_rules! html_test {
    ($name:ident, $input:expr, $expected:expr) => {
        #[test]
        fn $name() {
            crate::harness::run_html_test($input, $expected);
        }
    };
}

/// Test that the output contains the given fragments in order.
#[allow(unused)]
macro_rules! html_fragments_test {
    ($name:ident, $input:expr, [$($expected:expr),+ $(,)?]) => {
        #[test]
        fn $name() {
            crate::harness::run_contains_test(
                $input,
                mmd::Extensions::standard(),
                &[$($expected),+],
            );
        }
    };
}

#[allow(unused)]
pub(crate) use {html_fragments_test, html_test};
