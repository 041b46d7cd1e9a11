use slabmark_core::{Engine, markdown_to_html};
use std::fs;
use std::path::{Path, PathBuf};

#[test]
fn golden_fixtures() -> Result<(), Box<dyn std::error::Error>> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests");
    let expect_dir = root.join("expect");

    let mut fixtures = collect_fixtures(&root.join("fixtures"))?;
    fixtures.sort();
    assert!(!fixtures.is_empty(), "no fixtures found");

    for fixture in fixtures {
        let name = fixture
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or("fixture without a name")?
            .to_string();
        let source = fs::read_to_string(&fixture)?;
        let expected = fs::read_to_string(expect_dir.join(format!("{}.html", name)))?;

        assert_eq!(markdown_to_html(&source), expected, "HTML mismatch for fixture {}", name);

        let mut engine = Engine::default();
        let html = engine.render_bytes(source.as_bytes())?;
        assert_eq!(html, expected, "engine output mismatch for fixture {}", name);
    }
    Ok(())
}

#[test]
fn same_marker_lines_form_one_list() {
    for count in 1..=12 {
        let source: String = (0..count).map(|i| format!("- item {}\n", i)).collect();
        let items: String = (0..count).map(|i| format!("<li>item {}</li>\n", i)).collect();
        assert_eq!(markdown_to_html(&source), format!("<ul>\n{}</ul>\n", items));
    }
}

#[test]
fn item_text_is_trimmed() {
    assert_eq!(
        markdown_to_html("-   padded   \n- plain\n"),
        "<ul>\n<li>padded</li>\n<li>plain</li>\n</ul>\n"
    );
}

#[test]
fn marker_change_starts_new_list() {
    let expected = "<ul>\n<li>a</li>\n</ul>\n<ul>\n<li>b</li>\n</ul>\n<ul>\n<li>c</li>\n</ul>\n";
    assert_eq!(markdown_to_html("- a\n* b\n+ c\n"), expected);
    assert_eq!(markdown_to_html("- a\n\n* b\n\n+ c\n"), expected);
}

#[test]
fn ordered_delimiter_change_starts_new_list() {
    assert_eq!(
        markdown_to_html("1. a\n2) b\n"),
        "<ol>\n<li>a</li>\n</ol>\n<ol start=\"2\">\n<li>b</li>\n</ol>\n"
    );
}

fn collect_fixtures(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut fixtures = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "md") {
            fixtures.push(path);
        }
    }
    Ok(fixtures)
}
