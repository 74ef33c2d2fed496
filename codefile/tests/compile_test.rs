//! Integration tests for selection, rendering and artifact compilation.

use std::fs;
use std::path::{Path, PathBuf};

use codemanager_codefile::{
    ArtifactPaths, Compiler, FilterConfig, OrderMode, WriteMode, enumerate, header_line,
    render_codefile, render_structure,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn relative(root: &Path, paths: impl IntoIterator<Item = PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn test_selection_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "a.py", b"print(12)\n");
    write(root, "b.py", b"print(1)\x00\n");
    write(root, "sub/c.py", b"x = 1\n");
    write(root, ".git/config", b"[core]\n");

    let filter = FilterConfig::new()
        .with_extensions([".py"])
        .with_exclude_dirs([".git"])
        .with_max_bytes(1_000_000)
        .with_order(OrderMode::ByPath)
        .compile()
        .unwrap();

    let files = enumerate(root, &filter).unwrap();
    assert_eq!(
        relative(root, files.iter().map(|f| f.path.clone())),
        vec!["a.py", "sub/c.py"]
    );

    let codefile = render_codefile(&files);
    assert!(codefile.starts_with(&header_line(&files[0].path)));
    assert!(codefile.contains("print(12)"));
    assert!(!codefile.contains("print(1)"));
    assert!(!codefile.contains("[core]"));
}

#[test]
fn test_exclusion_is_structural_at_any_depth() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("proj");
    write(&root, "src/ok.rs", b"fn ok() {}\n");
    write(&root, "node_modules/top.rs", b"top\n");
    write(&root, "src/a/b/node_modules/deep.rs", b"deep\n");
    write(&root, "src/target/gen.rs", b"gen\n");

    let filter = FilterConfig::new()
        .with_exclude_dirs(["node_modules", "target"])
        .compile()
        .unwrap();

    let files = enumerate(&root, &filter).unwrap();
    assert_eq!(
        relative(&root, files.into_iter().map(|f| f.path)),
        vec!["src/ok.rs"]
    );

    let structure = render_structure(&root, ["node_modules", "target"]);
    assert!(!structure.contains("node_modules"));
    assert!(!structure.contains("target"));
    assert!(!structure.contains("deep.rs"));
    assert!(structure.contains("ok.rs"));
}

#[test]
fn test_structure_scenario_lists_directory_first() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("scenario");
    write(&root, "x.txt", b"x");
    fs::create_dir(root.join("y")).unwrap();

    let structure = render_structure(&root, Vec::<String>::new());
    let lines: Vec<&str> = structure.lines().collect();

    assert_eq!(&lines[..4], &["# Folder Structure", "", "📁 scenario/", "│"]);
    let y = lines.iter().position(|l| l.ends_with("y/")).unwrap();
    let x = lines.iter().position(|l| l.ends_with("x.txt")).unwrap();
    assert!(y < x);
}

#[test]
fn test_size_limit_boundary() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "fits.txt", b"0123456789");
    write(root, "over.txt", b"0123456789A");

    let filter = FilterConfig::new().with_max_bytes(10).compile().unwrap();
    let files = enumerate(root, &filter).unwrap();

    assert_eq!(
        relative(root, files.into_iter().map(|f| f.path)),
        vec!["fits.txt"]
    );
}

#[test]
fn test_binary_probe_only_reads_prefix() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let mut late_null = vec![b'a'; 4096];
    late_null[3000] = 0;
    write(root, "late.py", &late_null);

    let mut early_null = vec![b'a'; 4096];
    early_null[2047] = 0;
    write(root, "early.py", &early_null);

    let filter = FilterConfig::new().with_extensions(["py"]).compile().unwrap();
    let files = enumerate(root, &filter).unwrap();

    assert_eq!(
        relative(root, files.into_iter().map(|f| f.path)),
        vec!["late.py"]
    );
}

#[test]
fn test_compile_root_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("proj");
    write(&root, "src/lib.rs", b"pub mod a;\n");
    write(&root, "src/a.rs", b"pub fn a() {}\n");
    write(&root, "README.md", "caf\u{e9}\n".as_bytes());

    let out = temp_dir.path().join("out");
    let compiler = Compiler::new(ArtifactPaths::in_dir(&out));
    let filter = FilterConfig::new().compile().unwrap();

    let first = compiler.compile_root(&root, &filter).unwrap();
    let codefile = fs::read(out.join("CODEFILE.txt")).unwrap();
    let structure = fs::read(out.join("StructureLatest.md")).unwrap();

    let second = compiler.compile_root(&root, &filter).unwrap();
    assert_eq!(fs::read(out.join("CODEFILE.txt")).unwrap(), codefile);
    assert_eq!(fs::read(out.join("StructureLatest.md")).unwrap(), structure);
    assert_eq!(first.files_written, 3);
    assert_eq!(first.codefile_bytes, second.codefile_bytes);
}

#[test]
fn test_artifacts_inside_root_are_not_selected() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "main.txt", b"main\n");

    let compiler = Compiler::new(ArtifactPaths::in_dir(root)).with_write_mode(WriteMode::Atomic);
    let filter = FilterConfig::new().compile().unwrap();

    compiler.compile_root(root, &filter).unwrap();
    let report = compiler.compile_root(root, &filter).unwrap();

    assert_eq!(report.files_written, 1);
    let codefile = fs::read_to_string(root.join("CODEFILE.txt")).unwrap();
    assert_eq!(codefile.matches(">>>>>>>>>>>>>>>>>>>>").count(), 1);
}

#[test]
fn test_explicit_mode_uses_parent_directories_for_structure() {
    let temp_dir = TempDir::new().unwrap();
    let base = dunce::canonicalize(temp_dir.path()).unwrap();
    let a = write(&base, "one/a.txt", b"a\n");
    let b = write(&base, "two/b.txt", b"b\n");
    write(&base, "two/.git/HEAD", b"ref\n");

    let out = base.join("out");
    let compiler = Compiler::new(ArtifactPaths::in_dir(&out));
    let report = compiler
        .compile_paths(&[b.clone(), a.clone(), a.clone()], &[], &[".git".to_string()], 1_000)
        .unwrap();

    assert_eq!(report.files_written, 2);
    let codefile = fs::read_to_string(out.join("CODEFILE.txt")).unwrap();
    let a_at = codefile.find(&header_line(&a)).unwrap();
    let b_at = codefile.find(&header_line(&b)).unwrap();
    assert!(a_at < b_at);

    let structure = fs::read_to_string(out.join("StructureLatest.md")).unwrap();
    assert!(structure.contains("📁 one/"));
    assert!(structure.contains("📁 two/"));
    assert!(structure.contains("\n\n# Folder Structure"));
    assert!(!structure.contains(".git"));
}
