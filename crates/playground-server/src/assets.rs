//! Static files compiled into the binary.
//!
//! Assets are looked up by exact relative path. Everything under `template/`
//! is also loaded into the template set at startup.

/// Path prefix of the page templates.
pub const TEMPLATE_DIR: &str = "template/";

static ASSETS: &[(&str, &[u8])] = &[
    (
        "template/index.html",
        include_bytes!("../static/template/index.html"),
    ),
    (
        "template/default-content.html",
        include_bytes!("../static/template/default-content.html"),
    ),
    (
        "template/default-preview.html",
        include_bytes!("../static/template/default-preview.html"),
    ),
    ("js/main.js", include_bytes!("../static/js/main.js")),
    ("css/main.css", include_bytes!("../static/css/main.css")),
];

/// Find an asset by its exact relative path.
pub fn lookup(path: &str) -> Option<&'static [u8]> {
    ASSETS
        .iter()
        .find(|(name, _)| *name == path)
        .map(|(_, bytes)| *bytes)
}

/// All assets, in declaration order.
pub fn iter() -> impl Iterator<Item = (&'static str, &'static [u8])> {
    ASSETS.iter().copied()
}

/// Template assets, with the directory prefix stripped from their names.
pub fn templates() -> impl Iterator<Item = (&'static str, &'static [u8])> {
    iter().filter_map(|(path, bytes)| path.strip_prefix(TEMPLATE_DIR).map(|name| (name, bytes)))
}

/// Guess a media type from the file name, then from the bytes themselves.
pub fn content_type(name: &str, bytes: &[u8]) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html") | Some("htm") => return "text/html; charset=utf-8",
        Some("js") => return "text/javascript; charset=utf-8",
        Some("css") => return "text/css; charset=utf-8",
        Some("svg") => return "image/svg+xml",
        Some("png") => return "image/png",
        Some("json") => return "application/json",
        Some("txt") => return "text/plain; charset=utf-8",
        _ => {}
    }

    sniff(bytes)
}

fn sniff(bytes: &[u8]) -> &'static str {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return "application/octet-stream";
    };
    let head = text.trim_start().to_ascii_lowercase();

    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        "image/svg+xml"
    } else if head.starts_with("<!doctype html") || head.starts_with("<html") {
        "text/html; charset=utf-8"
    } else {
        "text/plain; charset=utf-8"
    }
}
