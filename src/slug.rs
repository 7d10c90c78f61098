//! Title to URL slug derivation.
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s-]+").unwrap());

/// Derive a lowercase, accent-free, hyphen-joined slug from a title.
///
/// `"Crème Brûlée: A Guide!"` becomes `"creme-brulee-a-guide"`. Empty input
/// yields an empty slug.
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let stripped: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let spaced = INVALID_CHARS.replace_all(&stripped, " ");
    SEPARATOR_RUNS
        .replace_all(spaced.trim(), "-")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_title() {
        assert_eq!(slugify("Intro to Widgets"), "intro-to-widgets");
    }

    #[test]
    fn strips_accents_and_punctuation() {
        assert_eq!(slugify("Crème Brûlée: A Guide!"), "creme-brulee-a-guide");
        assert_eq!(slugify("  Señor   Niño  "), "senor-nino");
    }

    #[test]
    fn collapses_hyphen_and_space_runs() {
        assert_eq!(slugify("Rust -- the   good parts"), "rust-the-good-parts");
        assert_eq!(slugify("C++ & Node.js"), "c-node-js");
    }

    #[test]
    fn empty_and_symbol_only_input() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn distinct_titles_get_distinct_slugs() {
        assert_ne!(slugify("Async Rust, Part 1"), slugify("Async Rust, Part 2"));
    }

    #[test]
    fn deterministic() {
        let title = "Building a Static Site with Astro";
        assert_eq!(slugify(title), slugify(title));
    }
}
