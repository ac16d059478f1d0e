//! Checks the bundled chart script against the engine.

use playground_engine::{derive_schema, Capabilities, OptionKind, Sandbox, SandboxConfig, ScriptProgram};
use std::path::PathBuf;

fn chart_sandbox() -> Sandbox {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scripts/chart.rhai");
    let config = SandboxConfig::default();
    let program = ScriptProgram::load(&path, &config).unwrap();
    Sandbox::new(program, config)
}

#[test]
fn describes_its_options_in_order() {
    let schema = derive_schema(&chart_sandbox()).unwrap();

    let names: Vec<_> = schema.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "width",
            "bar-height",
            "bar-gap",
            "bar-color",
            "label-width",
            "font-family",
            "font-size",
        ]
    );
    assert_eq!(schema.get("width").unwrap().kind, OptionKind::Number);
    assert_eq!(schema.get("bar-color").unwrap().kind, OptionKind::Text);
    // Empty defaults are not configurable.
    assert!(schema.get("title").is_none());
}

#[test]
fn renders_bars_for_each_data_line() {
    let sandbox = chart_sandbox();
    let schema = derive_schema(&sandbox).unwrap();
    let input = "# comment\nRust 5400\n\nC & C++ 300\n";

    let result = sandbox
        .execute(input, &schema.cmdline_args(), Capabilities::restricted())
        .unwrap();

    assert!(result.success(), "stderr: {}", result.stderr_text());
    let svg = result.stdout_text();
    assert!(svg.starts_with("<svg"));
    assert!(svg.trim_end().ends_with("</svg>"));
    assert_eq!(svg.matches("<rect").count(), 2);
    assert!(svg.contains(">C &amp; C++</text>"));
    assert!(svg.contains("fill=\"#4c78a8\""));
}

#[test]
fn rejects_malformed_lines() {
    let result = chart_sandbox()
        .execute("Rust lots\n", &[], Capabilities::restricted())
        .unwrap();

    assert_eq!(result.exit_code, 1);
    assert!(result.stderr_text().contains("line 1"));
}

#[test]
fn rejects_non_numeric_options() {
    let args = vec!["--width=wide".to_string()];
    let result = chart_sandbox()
        .execute("Rust 1\n", &args, Capabilities::restricted())
        .unwrap();

    assert_eq!(result.exit_code, 1);
    assert!(result.stderr_text().contains("--width"));
}

#[test]
fn rejects_empty_data() {
    let result = chart_sandbox()
        .execute("# nothing here\n", &[], Capabilities::restricted())
        .unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stderr_text(), "no data to chart");
}
