//! Static pages with a single `{{ results }}` slot in the form page.

const INDEX_HTML: &str = include_str!("../templates/index.html");
const HOME_HTML: &str = include_str!("../templates/home.html");
const RESULTS_SLOT: &str = "{{ results }}";

pub fn index() -> &'static str {
    INDEX_HTML
}

/// Form page, optionally carrying a prediction or a validation message.
pub fn home(results: Option<&str>) -> String {
    HOME_HTML.replace(
        RESULTS_SLOT,
        &html_escape::encode_text(results.unwrap_or_default()),
    )
}
