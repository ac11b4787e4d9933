//! End-to-end integration tests for arxiv2kindle.
//!
//! The offline tests drive the public API over synthetic source trees and
//! archives, with a shell script standing in for the LaTeX compiler.
//!
//! Tests that download from arXiv and run a real `pdflatex` are gated behind
//! the `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use arxiv2kindle::{
    reflow, rewrite_tree, Arxiv2KindleError, LatexCommand, NoopProgressCallback, Orientation, PdfTool,
    ReflowConfig, ReflowProgressCallback, Stage,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const ENTRY: &str = "\
% arXiv submission
\\documentclass[12pt,twocolumn,a4paper]{article}

\\usepackage{conf}
\\begin{document}
\\section{Intro}
\\includegraphics[width=0.5\\linewidth]{fig1.png}
\\end{document}
";

const STYLE: &str = "\\ProvidesPackage{conf}\n\\twocolumn\n\\def\\venue{X}\n";

fn tree(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, body) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, body).unwrap();
    }
    dir
}

fn write_targz(path: &Path, files: &[(&str, &str)]) {
    std::fs::write(path, targz_bytes(files)).unwrap();
}

fn targz_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn config(orientation: Orientation) -> ReflowConfig {
    ReflowConfig::builder()
        .page_size(4.0, 6.0)
        .margin(0.2)
        .orientation(orientation)
        .build()
        .unwrap()
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

// ── Source rewriting (no network, no TeX) ────────────────────────────────────

#[test]
fn test_rewrite_tree_two_column_article() {
    let dir = tree(&[("paper.tex", ENTRY), ("conf.sty", STYLE)]);
    let result = rewrite_tree(dir.path(), &config(Orientation::Portrait).rewrite_options()).unwrap();

    assert_eq!(result.entry_file, dir.path().join("paper.tex"));
    let out = lines(&result.entry_file);

    let class = &out[0];
    assert!(class.starts_with("\\documentclass"), "{class}");
    for token in ["12pt", "twocolumn", "a4paper"] {
        assert!(!class.contains(token), "class line still has {token}: {class}");
    }

    let marker = out.iter().position(|l| l == "\\begin{document}").unwrap();
    assert_eq!(
        &out[marker - 3..marker],
        &[
            "\\pagestyle{empty}".to_string(),
            "\\usepackage{times}".to_string(),
            "\\usepackage[paperwidth=4in,paperheight=6in,margin=0.2in]{geometry}".to_string(),
        ]
    );
    assert!(out.contains(
        &"\\includegraphics[width=0.5\\textwidth,height=0.5\\textheight,keepaspectratio]{fig1.png}".to_string()
    ));
    assert!(!out.iter().any(|l| l.starts_with('%') || l.trim().is_empty()));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("conf.sty")).unwrap(),
        "\\ProvidesPackage{conf}\n\\def\\venue{X}\n"
    );
    assert_eq!(std::fs::read_to_string(&result.backup).unwrap(), ENTRY);
}

#[test]
fn test_rewrite_tree_landscape() {
    let dir = tree(&[("paper.tex", ENTRY)]);
    let result = rewrite_tree(dir.path(), &config(Orientation::Landscape).rewrite_options()).unwrap();
    let out = lines(&result.entry_file);

    let marker = out.iter().position(|l| l == "\\begin{document}").unwrap();
    assert_eq!(out[marker - 1], "\\usepackage{pdflscape}");
    assert_eq!(
        out[marker - 2],
        "\\usepackage[paperwidth=6in,paperheight=4in,margin=0.2in]{geometry}"
    );
    assert!(result.patched_styles.is_empty());
}

#[test]
fn test_rewrite_tree_ambiguous_entry() {
    let other = "\\documentclass{article}\n\\begin{document}\n\\end{document}\n";
    let dir = tree(&[("a.tex", ENTRY), ("b.tex", other)]);

    let err = rewrite_tree(dir.path(), &config(Orientation::Portrait).rewrite_options()).unwrap_err();
    match err {
        Arxiv2KindleError::AmbiguousEntryFile { candidates, .. } => {
            assert_eq!(candidates, vec![PathBuf::from("a.tex"), PathBuf::from("b.tex")]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_to_string(dir.path().join("a.tex")).unwrap(), ENTRY);

    let explicit = ReflowConfig::builder().entry_file("b.tex").build().unwrap();
    let result = rewrite_tree(dir.path(), &explicit.rewrite_options()).unwrap();
    assert_eq!(result.entry_file, dir.path().join("b.tex"));
}

#[test]
fn test_rewrite_tree_no_entry() {
    let dir = tree(&[("notes.tex", "\\section{A}\n"), ("sub/main.tex", ENTRY)]);
    let err = rewrite_tree(dir.path(), &config(Orientation::Portrait).rewrite_options()).unwrap_err();
    assert!(matches!(err, Arxiv2KindleError::NoEntryFile { .. }), "{err}");
}

#[test]
fn test_rewrite_tree_duplicate_marker_leaves_entry_untouched() {
    let broken = "\\documentclass{article}\n\\begin{document}\nA\n\\begin{document}\n";
    let dir = tree(&[("paper.tex", broken)]);

    let err = rewrite_tree(dir.path(), &config(Orientation::Portrait).rewrite_options()).unwrap_err();
    match err {
        Arxiv2KindleError::BodyMarker { found, .. } => assert_eq!(found, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_to_string(dir.path().join("paper.tex")).unwrap(), broken);
    assert!(!dir.path().join("paper.tex.bak").exists());
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<ReflowConfig>();
}

// ── Full runs over local archives with a stand-in compiler ──────────────────

#[cfg(unix)]
mod local_archive {
    use super::*;

    #[derive(Default)]
    struct StageRecorder {
        stages: Mutex<Vec<Stage>>,
    }

    impl ReflowProgressCallback for StageRecorder {
        fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    /// `bash <script> <file.tex>`; bash answers the `--version` preflight.
    fn fake_compiler(dir: &Path, body: &str) -> LatexCommand {
        let script = dir.join("fake-latex.sh");
        let mut f = std::fs::File::create(&script).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        LatexCommand::with_args("bash", [script.to_string_lossy().into_owned()])
    }

    /// `bash <script> <in.pdf> cat 1-endwest output <out.pdf>`.
    fn fake_pdf_tool(dir: &Path, body: &str) -> PdfTool {
        let script = dir.join("fake-pdftk.sh");
        std::fs::write(&script, body).unwrap();
        PdfTool::with_args("bash", [script.to_string_lossy().into_owned()])
    }

    fn workdirs_left(base: &Path) -> usize {
        std::fs::read_dir(base)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().starts_with("arxiv2kindle_"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_reflow_local_targz() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("paper.tar.gz");
        write_targz(&archive, &[("paper.tex", ENTRY), ("conf.sty", STYLE)]);
        let base = root.path().join("work");
        let out_dir = root.path().join("out");
        let recorder = Arc::new(StageRecorder::default());

        let config = ReflowConfig::builder()
            .workdir_base(&base)
            .output_dir(&out_dir)
            .compiler(fake_compiler(root.path(), "touch \"${1%.tex}.pdf\"\n"))
            .progress_callback(recorder.clone())
            .build()
            .unwrap();

        let output = reflow(archive.to_string_lossy(), &config).await.unwrap();

        assert_eq!(output.pdf_path, out_dir.join("paper.pdf"));
        assert!(output.pdf_path.is_file());
        assert_eq!(output.arxiv_id, None);
        assert_eq!(output.title, "paper");
        assert_eq!(output.entry_file, PathBuf::from("paper.tex"));
        assert_eq!(output.stats.patched_styles, 1);
        assert!(output.workdir.is_none());
        assert_eq!(workdirs_left(&base), 0);
        assert_eq!(
            *recorder.stages.lock().unwrap(),
            vec![
                Stage::Preflight,
                Stage::Fetch,
                Stage::Extract,
                Stage::Rewrite,
                Stage::Compile,
                Stage::Output
            ]
        );
    }

    #[tokio::test]
    async fn test_reflow_no_pdf_is_fatal_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("paper.tar.gz");
        write_targz(&archive, &[("paper.tex", ENTRY)]);
        let base = root.path().join("work");

        let config = ReflowConfig::builder()
            .workdir_base(&base)
            .output_dir(root.path().join("out"))
            .compiler(fake_compiler(root.path(), "echo '! LaTeX Error' > \"${1%.tex}.log\"\nexit 1\n"))
            .build()
            .unwrap();

        let err = reflow(archive.to_string_lossy(), &config).await.unwrap_err();
        match err {
            Arxiv2KindleError::NoPdfProduced { log, .. } => {
                assert_eq!(log, Some(PathBuf::from("paper.log")));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(workdirs_left(&base), 0);
        assert!(!root.path().join("out/paper.pdf").exists());
    }

    #[tokio::test]
    async fn test_reflow_keep_workdir() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("paper.tar.gz");
        write_targz(&archive, &[("paper.tex", ENTRY)]);
        let base = root.path().join("work");

        let config = ReflowConfig::builder()
            .workdir_base(&base)
            .keep_workdir(true)
            .output_dir(root.path().join("out"))
            .compiler(fake_compiler(root.path(), "touch \"${1%.tex}.pdf\"\n"))
            .build()
            .unwrap();

        let output = reflow(archive.to_string_lossy(), &config).await.unwrap();
        let kept = output.workdir.expect("workdir should be reported");
        assert!(kept.join("paper.tex.bak").is_file());
        assert_eq!(workdirs_left(&base), 1);
    }

    #[tokio::test]
    async fn test_reflow_gzipped_single_file() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("single.gz");
        let mut enc = GzEncoder::new(std::fs::File::create(&archive).unwrap(), Compression::default());
        enc.write_all(ENTRY.as_bytes()).unwrap();
        enc.finish().unwrap();

        let config = ReflowConfig::builder()
            .workdir_base(root.path().join("work"))
            .output_dir(root.path().join("out"))
            .compiler(fake_compiler(root.path(), "touch \"${1%.tex}.pdf\"\n"))
            .build()
            .unwrap();

        let output = reflow(archive.to_string_lossy(), &config).await.unwrap();
        assert_eq!(output.entry_file, PathBuf::from("main.tex"));
        assert_eq!(output.pdf_path, root.path().join("out/single.pdf"));
    }

    #[tokio::test]
    async fn test_reflow_missing_compiler_fails_before_extracting() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("paper.tar.gz");
        write_targz(&archive, &[("paper.tex", ENTRY)]);
        let base = root.path().join("work");

        let config = ReflowConfig::builder()
            .workdir_base(&base)
            .compiler(LatexCommand::new("arxiv2kindle-no-such-latex"))
            .build()
            .unwrap();

        let err = reflow(archive.to_string_lossy(), &config).await.unwrap_err();
        assert!(matches!(err, Arxiv2KindleError::MissingTool { .. }), "{err}");
        assert!(!base.exists());
    }

    #[tokio::test]
    async fn test_reflow_landscape_rotates_output() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("paper.tar.gz");
        write_targz(&archive, &[("paper.tex", ENTRY)]);
        let base = root.path().join("work");
        let out_dir = root.path().join("out");
        let recorder = Arc::new(StageRecorder::default());

        let config = ReflowConfig::builder()
            .orientation(Orientation::Landscape)
            .workdir_base(&base)
            .output_dir(&out_dir)
            .compiler(fake_compiler(root.path(), "printf compiled > \"${1%.tex}.pdf\"\n"))
            .pdf_tool(fake_pdf_tool(
                root.path(),
                "[ \"$2 $3 $4\" = \"cat 1-endwest output\" ] || exit 2\nprintf 'west:%s' \"$(cat \"$1\")\" > \"$5\"\n",
            ))
            .progress_callback(recorder.clone())
            .build()
            .unwrap();

        let output = reflow(archive.to_string_lossy(), &config).await.unwrap();

        assert_eq!(output.pdf_path, out_dir.join("paper.pdf"));
        assert_eq!(std::fs::read_to_string(&output.pdf_path).unwrap(), "west:compiled");
        assert_eq!(
            *recorder.stages.lock().unwrap(),
            vec![
                Stage::Preflight,
                Stage::Fetch,
                Stage::Extract,
                Stage::Rewrite,
                Stage::Compile,
                Stage::Rotate,
                Stage::Output
            ]
        );
        assert_eq!(workdirs_left(&base), 0);
    }

    #[tokio::test]
    async fn test_reflow_landscape_tool_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("paper.tar.gz");
        write_targz(&archive, &[("paper.tex", ENTRY)]);
        let base = root.path().join("work");
        let out_dir = root.path().join("out");

        let config = ReflowConfig::builder()
            .orientation(Orientation::Landscape)
            .workdir_base(&base)
            .output_dir(&out_dir)
            .compiler(fake_compiler(root.path(), "touch \"${1%.tex}.pdf\"\n"))
            .pdf_tool(fake_pdf_tool(root.path(), "exit 1\n"))
            .build()
            .unwrap();

        let err = reflow(archive.to_string_lossy(), &config).await.unwrap_err();
        assert!(matches!(err, Arxiv2KindleError::ToolFailed { .. }), "{err}");
        assert!(!out_dir.join("paper.pdf").exists());
        assert_eq!(workdirs_left(&base), 0);
    }

    #[tokio::test]
    async fn test_reflow_stale_pdf_in_archive_is_not_shipped() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("paper.tar.gz");
        write_targz(&archive, &[("paper.tex", ENTRY), ("paper.pdf", "%PDF two-column")]);
        let out_dir = root.path().join("out");

        let config = ReflowConfig::builder()
            .workdir_base(root.path().join("work"))
            .output_dir(&out_dir)
            .compiler(fake_compiler(root.path(), "exit 1\n"))
            .build()
            .unwrap();

        let err = reflow(archive.to_string_lossy(), &config).await.unwrap_err();
        assert!(matches!(err, Arxiv2KindleError::NoPdfProduced { .. }), "{err}");
        assert!(!out_dir.join("paper.pdf").exists());
    }

    // ── Downloads from a mock preprint server ────────────────────────────

    #[tokio::test]
    async fn test_reflow_downloads_from_server() {
        use httpmock::MockServer;

        let server = MockServer::start_async().await;
        let abs = server
            .mock_async(|when, then| {
                when.method("GET").path("/abs/2101.00001");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><head><title>[2101.00001] Reflowing Two-Column Papers</title></head></html>");
            })
            .await;
        let eprint = server
            .mock_async(|when, then| {
                when.method("GET").path("/e-print/2101.00001");
                then.status(200)
                    .header("content-type", "application/x-eprint-tar")
                    .body(targz_bytes(&[("paper.tex", ENTRY), ("conf.sty", STYLE)]));
            })
            .await;

        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("work");
        let out_dir = root.path().join("out");
        let recorder = Arc::new(StageRecorder::default());

        let config = ReflowConfig::builder()
            .base_url(server.base_url())
            .download_timeout_secs(10)
            .workdir_base(&base)
            .output_dir(&out_dir)
            .compiler(fake_compiler(root.path(), "touch \"${1%.tex}.pdf\"\n"))
            .progress_callback(recorder.clone())
            .build()
            .unwrap();

        let output = reflow("https://arxiv.org/abs/2101.00001", &config).await.unwrap();

        assert_eq!(output.arxiv_id.as_deref(), Some("2101.00001"));
        assert_eq!(output.title, "Reflowing Two-Column Papers");
        assert_eq!(
            output.pdf_path,
            out_dir.join("2101.00001_Reflowing Two-Column Papers.pdf")
        );
        assert!(output.pdf_path.is_file());
        assert_eq!(output.stats.patched_styles, 1);
        assert_eq!(workdirs_left(&base), 0);
        assert_eq!(recorder.stages.lock().unwrap().first(), Some(&Stage::Preflight));
        abs.assert_async().await;
        eprint.assert_async().await;
    }
}

// ── Live runs (network + TeX) ────────────────────────────────────────────────

#[tokio::test]
async fn test_reflow_attention_paper() {
    e2e_skip_unless_enabled!();
    let out_dir = tempfile::tempdir().unwrap();
    let config = ReflowConfig::builder().output_dir(out_dir.path()).build().unwrap();

    let output = reflow("https://arxiv.org/abs/1706.03762", &config).await.unwrap();
    println!("{}", serde_json::to_string_pretty(&output).unwrap());

    assert_eq!(output.arxiv_id.as_deref(), Some("1706.03762"));
    assert!(output.title.contains("Attention"));
    let bytes = std::fs::read(&output.pdf_path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_reflow_bad_identifier() {
    let err = reflow("not-an-arxiv-id", &ReflowConfig::default()).await.unwrap_err();
    assert!(matches!(err, Arxiv2KindleError::Fetch(_)), "{err}");
}
