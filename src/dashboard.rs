use core::fmt::Write;

const PAGE: &str = include_str!("../assets/index.html");
const THEME_PLACEHOLDER: &str = "{{THEME_CLASS}}";

fn theme_class(dark: bool) -> &'static str {
    if dark {
        "dark"
    } else {
        "light"
    }
}

fn split_page() -> (&'static str, &'static str) {
    PAGE.split_once(THEME_PLACEHOLDER).unwrap_or((PAGE, ""))
}

/// Length of the rendered page, for the Content-Length header
pub fn page_len(dark: bool) -> usize {
    let (head, tail) = split_page();
    head.len() + theme_class(dark).len() + tail.len()
}

/// Write the dashboard page with the stored theme applied to `<body>`
pub fn render_page<W: Write>(out: &mut W, dark: bool) -> core::fmt::Result {
    let (head, tail) = split_page();
    out.write_str(head)?;
    out.write_str(theme_class(dark))?;
    out.write_str(tail)
}

/// The page in up to three borrowed pieces, for writers that want byte slices
pub fn page_parts(dark: bool) -> [&'static str; 3] {
    let (head, tail) = split_page();
    [head, theme_class(dark), tail]
}
