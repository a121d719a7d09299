//! Script components and pre-render scripts, run through the real
//! `stitch sandbox` subprocess

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use stitch_engine::component::ComponentDefinition;
use stitch_engine::config::SandboxConfig;
use stitch_engine::{BuildConfig, BuildError, BuildOutcome, SandboxRunner, WorkspaceManager};
use tempfile::TempDir;

const STITCH: &str = env!("CARGO_BIN_EXE_stitch");

fn sandbox_config() -> SandboxConfig {
    SandboxConfig {
        program: STITCH.into(),
        args: vec!["sandbox".to_string()],
        timeout_ms: Some(30_000),
    }
}

fn project(files: &[(&str, &str)]) -> (TempDir, BuildConfig) {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    for (name, contents) in files {
        let path = src.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    let config = BuildConfig::builder()
        .source_dir(&src)
        .target_dir(dir.path().join("dist"))
        .sandbox_program(STITCH)
        .sandbox_args(["sandbox"])
        .sandbox_timeout(Duration::from_secs(30))
        .build();
    (dir, config)
}

fn build(config: &BuildConfig) -> Result<(), BuildError> {
    match smol::block_on(WorkspaceManager::new(config.clone()).build())? {
        BuildOutcome::Built(_) => Ok(()),
        BuildOutcome::Skipped => panic!("build was skipped"),
    }
}

fn output(config: &BuildConfig, name: &str) -> String {
    fs::read_to_string(config.target_dir.join(name)).unwrap()
}

// ============================================================================
// SCRIPT COMPONENTS
// ============================================================================

#[test]
fn test_attribute_passthrough() {
    let (_dir, config) = project(&[
        ("index.html", r#"<data-comp data-name="John" data-age="30"></data-comp>"#),
        (
            "data-comp.com.ts",
            r#"
            const name = element.getAttribute('data-name');
            const age = element.getAttribute('data-age');
            element.innerHTML = `<p>Name: ${name}, Age: ${age}</p>`;
            "#,
        ),
    ]);

    build(&config).unwrap();
    let html = output(&config, "index.html");
    assert!(html.contains("<p>Name: John, Age: 30</p>"), "{html}");
    assert!(!html.contains("data-comp"));
}

#[test]
fn test_script_sees_original_inner_markup() {
    let (_dir, config) = project(&[
        ("index.html", "<wrap-it><em>inner</em></wrap-it>"),
        ("wrap-it.com.ts", "element.innerHTML = '<section>' + element.innerHTML + '</section>';"),
    ]);

    build(&config).unwrap();
    assert!(output(&config, "index.html").contains("<section><em>inner</em></section>"));
}

#[test]
fn test_local_script_overrides_root_script() {
    let (_dir, config) = project(&[
        ("priority-comp.com.ts", "element.innerHTML = '<div>Root TS</div>';"),
        ("section/index.html", "<priority-comp></priority-comp>"),
        ("section/priority-comp.com.ts", "element.innerHTML = '<div>Local TS</div>';"),
    ]);

    build(&config).unwrap();
    let html = output(&config, "section/index.html");
    assert!(html.contains("Local TS"));
    assert!(!html.contains("Root TS"));
}

#[test]
fn test_script_output_is_expanded_further() {
    let (_dir, config) = project(&[
        ("index.html", "<list-items></list-items>"),
        (
            "list-items.com.ts",
            "element.innerHTML = ['a', 'b'].map((x) => `<item-row data-x=\"${x}\"></item-row>`).join('');",
        ),
        ("item-row.com.html", "<li>row</li>"),
    ]);

    build(&config).unwrap();
    let html = output(&config, "index.html");
    assert_eq!(html.matches("<li>row</li>").count(), 2);
}

#[test]
fn test_throwing_script_fails_build() {
    let (_dir, config) = project(&[
        ("index.html", "<boom-comp></boom-comp>"),
        ("boom-comp.com.ts", "throw new Error('component exploded');"),
    ]);

    match build(&config) {
        Err(BuildError::ScriptExecution { path, stderr, .. }) => {
            assert_eq!(path, config.source_dir.join("boom-comp.com.ts"));
            assert!(stderr.contains("component exploded"), "{stderr}");
        }
        other => panic!("expected a script failure, got {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(config.source_dir.join("boom-comp.com.ts")).unwrap(),
        "throw new Error('component exploded');"
    );
}

#[test]
fn test_type_annotations_fail_with_note() {
    let (_dir, config) = project(&[
        ("index.html", "<typed-comp></typed-comp>"),
        ("typed-comp.com.ts", "const label: string = 'x';\nelement.innerHTML = label;"),
    ]);

    let err = build(&config).unwrap_err();
    assert!(matches!(err, BuildError::ScriptExecution { .. }));
    let message = err.to_string();
    assert!(message.contains("SyntaxError"), "{message}");
    assert!(message.contains("TypeScript-only syntax"), "{message}");
    assert!(message.contains(&config.source_dir.join("typed-comp.com.ts").display().to_string()));
}

// ============================================================================
// SOURCE RESTORATION
// ============================================================================

fn render_direct(path: &Path, original: &str, config: &SandboxConfig) -> Result<String, BuildError> {
    let definition = ComponentDefinition::from_path(path).unwrap();
    smol::block_on(SandboxRunner::new(config).render_component(&definition, original))
}

#[test]
fn test_source_restored_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ok-comp.com.ts");
    let source = "element.innerHTML = '<b>ok</b>';\n";
    fs::write(&path, source).unwrap();

    let markup = render_direct(&path, "<ok-comp></ok-comp>", &sandbox_config()).unwrap();
    assert_eq!(markup, "<b>ok</b>");
    assert_eq!(fs::read(&path).unwrap(), source.as_bytes());
}

#[test]
fn test_source_restored_after_throw() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad-comp.com.ts");
    let source = "// keep me\nthrow new Error('nope');\n";
    fs::write(&path, source).unwrap();

    let err = render_direct(&path, "<bad-comp></bad-comp>", &sandbox_config()).unwrap_err();
    assert!(matches!(err, BuildError::ScriptExecution { .. }));
    assert_eq!(fs::read(&path).unwrap(), source.as_bytes());
}

#[test]
fn test_source_restored_after_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spin-comp.com.ts");
    let source = "while (true) {}\n";
    fs::write(&path, source).unwrap();

    let config = SandboxConfig {
        timeout_ms: Some(300),
        ..sandbox_config()
    };
    let err = render_direct(&path, "<spin-comp></spin-comp>", &config).unwrap_err();
    assert!(matches!(err, BuildError::ScriptTimeout { timeout, .. } if timeout == Duration::from_millis(300)));
    assert_eq!(fs::read(&path).unwrap(), source.as_bytes());
}

// ============================================================================
// PRE-RENDER
// ============================================================================

#[test]
fn test_prerender_creates_missing_page() {
    let (_dir, config) = project(&[(
        "index.pre.ts",
        r#"
        const h1 = document.createElement('h1');
        h1.textContent = 'Generated';
        document.body.appendChild(h1);
        document.title = 'Made by script';
        "#,
    )]);

    build(&config).unwrap();
    let html = output(&config, "index.html");
    assert!(html.starts_with("<!doctype html>"));
    assert!(html.contains("<h1>Generated</h1>"));
    assert!(html.contains("<title>Made by script</title>"));
    assert!(!config.target_dir.join("index.pre.ts").exists());
}

#[test]
fn test_prerender_edits_existing_page_before_substitution() {
    let (_dir, config) = project(&[
        ("about.html", "<html><head></head><body><main id=\"app\"></main></body></html>"),
        (
            "about.pre.ts",
            r#"
            const app = document.getElementById('app');
            app.appendChild(document.createElement('site-banner'));
            "#,
        ),
        ("site-banner.com.html", "<header>Banner</header>"),
    ]);

    build(&config).unwrap();
    let html = output(&config, "about.html");
    assert!(html.contains("<main id=\"app\"><header>Banner</header></main>"), "{html}");
}

#[test]
fn test_failing_prerender_aborts_build() {
    let (_dir, config) = project(&[
        ("index.html", "<p>x</p>"),
        ("index.pre.ts", "document.nope.appendChild(1);"),
    ]);

    assert!(matches!(build(&config), Err(BuildError::ScriptExecution { .. })));
    assert!(!config.target_dir.exists());
}

// ============================================================================
// SANDBOX SUBCOMMAND
// ============================================================================

#[test]
fn test_sandbox_subcommand_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let ok = dir.path().join("ok.js");
    let bad = dir.path().join("bad.js");
    let out = dir.path().join("out.txt");
    fs::write(&ok, format!("__host.writeFile({:?}, 'written');", out.to_str().unwrap())).unwrap();
    fs::write(&bad, "console.log('before'); throw new Error('sandbox failure');").unwrap();

    let status = Command::new(STITCH).arg("sandbox").arg(&ok).status().unwrap();
    assert!(status.success());
    assert_eq!(fs::read_to_string(&out).unwrap(), "written");

    let output = Command::new(STITCH).arg("sandbox").arg(&bad).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sandbox failure"), "{stderr}");
    assert!(stderr.contains("before"), "{stderr}");
}
