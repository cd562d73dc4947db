use axum::response::Html;

const UI_HTML: &str = include_str!("../templates/index.html");

/// Render the form UI, injecting the upload limit and version.
pub fn render_ui(max_upload_mb: usize) -> Html<String> {
    let html = UI_HTML
        .replace("{{ max_upload_mb }}", &max_upload_mb.to_string())
        .replace("{{ version }}", env!("CARGO_PKG_VERSION"));
    Html(html)
}
