//! End-to-end pipeline tests through the library API
//!
//! Each test builds a scratch document tree, runs a full session, and
//! asserts on the compiled output file.

mod common;

use common::{compile_to, read, run, write_file};
use tempfile::TempDir;

#[test]
fn test_empty_file_compiles_to_empty_output() {
    let temp = TempDir::new().unwrap();
    let input = write_file(temp.path(), "empty.md", "");
    let output = temp.path().join("out.md");

    let stats = compile_to(&input, &output);
    assert_eq!(stats.error_count, 0);
    assert_eq!(read(&output), "");
}

#[test]
fn test_plain_passthrough_is_identical() {
    let temp = TempDir::new().unwrap();
    let content = "# Hello\n\nWorld.\n";
    let input = write_file(temp.path(), "plain.md", content);
    let output = temp.path().join("out.md");

    let stats = compile_to(&input, &output);
    assert_eq!(stats.error_count, 0);
    assert_eq!(read(&output), content);
}

#[test]
fn test_idempotent_for_non_embedm_fences() {
    let temp = TempDir::new().unwrap();
    let content = "intro\n```yaml\ntype: file\nsource: looks-like-one.md\n```\noutro\n";
    let input = write_file(temp.path(), "doc.md", content);
    let output = temp.path().join("out.md");

    compile_to(&input, &output);
    assert_eq!(read(&output), content);

    // compiling the compiled output is a no-op
    let second = temp.path().join("out2.md");
    compile_to(&output, &second);
    assert_eq!(read(&second), content);
}

#[test]
fn test_file_embed_inlines_child() {
    let temp = TempDir::new().unwrap();
    let input = write_file(
        temp.path(),
        "root.md",
        "Before\n```yaml embedm\ntype: file\nsource: ./child.md\n```\nAfter\n",
    );
    write_file(temp.path(), "child.md", "Child\n");
    let output = temp.path().join("out.md");

    let stats = compile_to(&input, &output);
    assert_eq!(stats.error_count, 0);
    assert_eq!(read(&output), "Before\nChild\nAfter\n");
}

#[test]
fn test_toc_generation_includes_embedded_headings() {
    let temp = TempDir::new().unwrap();
    let input = write_file(
        temp.path(),
        "doc.md",
        "# A\n\n```yaml embedm\ntype: toc\n```\n\n## B\n\n```yaml embedm\ntype: file\nsource: ./part.md\n```\n",
    );
    write_file(temp.path(), "part.md", "### C\n");
    let output = temp.path().join("out.md");

    compile_to(&input, &output);
    let compiled = read(&output);
    assert!(compiled.contains("- A\n  - B\n    - C\n"));
    assert!(compiled.contains("### C"));
    assert!(!compiled.contains("```yaml embedm"));
}

#[test]
fn test_cycle_detection_renders_caution_inline() {
    let temp = TempDir::new().unwrap();
    let a = write_file(
        temp.path(),
        "a.md",
        "start\n```yaml embedm\ntype: file\nsource: ./b.md\n```\nend\n",
    );
    write_file(
        temp.path(),
        "b.md",
        "```yaml embedm\ntype: file\nsource: ./a.md\n```\n",
    );
    let output = temp.path().join("out.md");

    let stats = compile_to(&a, &output);
    let compiled = read(&output);
    assert!(compiled.starts_with("start\n"));
    assert!(compiled.contains("> [!CAUTION]\n> **embedm:** circular dependency detected: "));
    assert!(compiled.ends_with("end\n"));
    // planning succeeded at the outer level but the session reports the error
    assert!(stats.error_count >= 1);
}

#[test]
fn test_line_range_extraction() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "data.txt", "alpha\nbeta\ngamma\ndelta\n");
    let input = write_file(
        temp.path(),
        "doc.md",
        "```yaml embedm\ntype: file\nsource: data.txt\nlines: \"2..3\"\n```\n",
    );
    let output = temp.path().join("out.md");

    compile_to(&input, &output);
    assert_eq!(read(&output), "```txt\nbeta\ngamma\n```");
}

#[test]
fn test_symbol_extraction_overload_ambiguity() {
    let temp = TempDir::new().unwrap();
    write_file(
        temp.path(),
        "Example.cs",
        r#"public class Example
{
    public void doSomething()
    {
        var outer = 1;
    }

    public class Example
    {
        public void doSomething()
        {
            var inner = 2;
        }
    }
}
"#,
    );
    let outer_doc = write_file(
        temp.path(),
        "outer.md",
        "```yaml embedm\ntype: file\nsource: Example.cs\nsymbol: Example.doSomething()\n```\n",
    );
    let inner_doc = write_file(
        temp.path(),
        "inner.md",
        "```yaml embedm\ntype: file\nsource: Example.cs\nsymbol: Example.Example.doSomething()\n```\n",
    );

    let outer_out = temp.path().join("outer.out.md");
    compile_to(&outer_doc, &outer_out);
    let outer = read(&outer_out);
    assert!(outer.contains("var outer = 1;"));
    assert!(!outer.contains("var inner = 2;"));

    let inner_out = temp.path().join("inner.out.md");
    compile_to(&inner_doc, &inner_out);
    let inner = read(&inner_out);
    assert!(inner.contains("var inner = 2;"));
    assert!(!inner.contains("var outer = 1;"));
}

#[test]
fn test_missing_source_keeps_sibling_content() {
    let temp = TempDir::new().unwrap();
    let input = write_file(
        temp.path(),
        "doc.md",
        "keep\n```yaml embedm\ntype: file\nsource: ./gone.md\n```\nalso keep\n",
    );
    let output = temp.path().join("out.md");

    let stats = compile_to(&input, &output);
    let compiled = read(&output);
    assert!(compiled.starts_with("keep\n"));
    assert!(compiled.contains("> [!CAUTION]"));
    assert!(compiled.contains("does not exist"));
    assert!(compiled.ends_with("also keep\n"));
    assert!(stats.error_count >= 1);
}

#[test]
fn test_table_and_query_path_end_to_end() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "people.csv", "name,age\nAda,36\nBrian,41\n");
    write_file(temp.path(), "pkg.json", r#"{"package": {"version": "1.2.3"}}"#);
    let input = write_file(
        temp.path(),
        "doc.md",
        "```yaml embedm\ntype: table\nsource: people.csv\norder_by: age desc\n```\n\nVersion:\n```yaml embedm\ntype: query-path\nsource: pkg.json\npath: package.version\n```\n",
    );
    let output = temp.path().join("out.md");

    let stats = compile_to(&input, &output);
    assert_eq!(stats.error_count, 0, "unexpected errors");
    let compiled = read(&output);
    assert!(compiled.contains("| name | age |"));
    let brian = compiled.find("Brian").unwrap();
    let ada = compiled.find("Ada").unwrap();
    assert!(brian < ada, "order_by desc should put Brian first");
    assert!(compiled.contains("1.2.3"));
}

#[test]
fn test_directory_mode_mirrors_tree_and_dedupes_embedded_inputs() {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("docs");
    write_file(
        &docs,
        "index.md",
        "# Index\n```yaml embedm\ntype: file\nsource: ./sub/part.md\n```\n",
    );
    write_file(&docs, "sub/part.md", "## Part\n");
    write_file(&docs, "standalone.md", "alone\n");
    let out_dir = temp.path().join("build");

    let stats = run(&[
        docs.to_str().unwrap(),
        "-d",
        out_dir.to_str().unwrap(),
        "--no-sandbox",
        "-v",
        "0",
        "-A",
    ])
    .unwrap();

    assert_eq!(stats.error_count, 0);
    assert!(out_dir.join("index.md").is_file());
    assert!(out_dir.join("standalone.md").is_file());
    // part.md was embedded by index.md, so it is not compiled standalone
    assert!(!out_dir.join("sub/part.md").exists());
    assert!(read(&out_dir.join("index.md")).contains("## Part"));
}

#[test]
fn test_crlf_line_endings_from_config() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "embedm-config.yaml", "line_endings: crlf\n");
    let input = write_file(temp.path(), "doc.md", "one\ntwo\n");
    let output = temp.path().join("out.md");

    compile_to(&input, &output);
    assert_eq!(read(&output), "one\r\ntwo\r\n");
}

#[test]
fn test_verify_mode_reports_and_never_writes() {
    let temp = TempDir::new().unwrap();
    let input = write_file(temp.path(), "doc.md", "stable content\n");
    let output = temp.path().join("out.md");

    // missing
    let stats = run(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--verify",
        "--no-sandbox",
        "-v",
        "0",
        "-A",
    ])
    .unwrap();
    assert_eq!(stats.missing_count, 1);
    assert!(!output.exists());
    assert_eq!(stats.exit_code(), 1);

    // up-to-date
    compile_to(&input, &output);
    let stats = run(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--verify",
        "--no-sandbox",
        "-v",
        "0",
        "-A",
    ])
    .unwrap();
    assert_eq!(stats.up_to_date_count, 1);
    assert_eq!(stats.exit_code(), 0);

    // stale
    std::fs::write(&output, "drifted\n").unwrap();
    let stats = run(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--verify",
        "--no-sandbox",
        "-v",
        "0",
        "-A",
    ])
    .unwrap();
    assert_eq!(stats.stale_count, 1);
    assert_eq!(read(&output), "drifted\n");
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let input = write_file(temp.path(), "doc.md", "content\n");
    let output = temp.path().join("out.md");

    let stats = run(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--dry-run",
        "--no-sandbox",
        "-v",
        "0",
        "-A",
    ])
    .unwrap();
    assert_eq!(stats.files_written, 0);
    assert!(!output.exists());
    assert_eq!(stats.ok_count, 1);
}

#[test]
fn test_allow_path_grants_access_outside_sandbox_root() {
    let docs = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    write_file(elsewhere.path(), "shared.md", "shared text\n");
    let input = write_file(
        docs.path(),
        "doc.md",
        &format!(
            "```yaml embedm\ntype: file\nsource: {}/shared.md\n```\n",
            elsewhere.path().display()
        ),
    );
    let output = docs.path().join("out.md");

    // without the grant the source is outside every allow-list entry
    let stats = run(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--allow-path",
        docs.path().to_str().unwrap(),
        "-v",
        "0",
        "-A",
    ])
    .unwrap();
    assert!(stats.error_count >= 1);

    // with the grant it compiles cleanly
    let stats = run(&[
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--allow-path",
        docs.path().to_str().unwrap(),
        "--allow-path",
        elsewhere.path().to_str().unwrap(),
        "-v",
        "0",
        "-A",
    ])
    .unwrap();
    assert_eq!(stats.error_count, 0);
    assert_eq!(read(&output), "shared text\n");
}

#[test]
fn test_oversized_file_fails_and_sibling_compiles() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "embedm-config.yaml", "max_file_size: 256\nmax_memory: 4096\n");
    write_file(temp.path(), "big.md", &"x".repeat(300));
    write_file(temp.path(), "small.md", "small\n");
    let input = write_file(
        temp.path(),
        "doc.md",
        "```yaml embedm\ntype: file\nsource: big.md\n```\nmid\n```yaml embedm\ntype: file\nsource: small.md\n```\n",
    );
    let output = temp.path().join("out.md");

    let stats = compile_to(&input, &output);
    let compiled = read(&output);
    assert!(compiled.contains("exceeds max size"));
    assert!(compiled.contains("small\n"));
    assert!(stats.error_count >= 1);
}
