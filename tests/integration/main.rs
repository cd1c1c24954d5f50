//! Integration tests for pkgstore

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A scratch workspace with its own store and config
    struct Workspace {
        root: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                root: TempDir::new().unwrap(),
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.root.path().join(rel)
        }

        fn store(&self) -> PathBuf {
            self.path("store")
        }

        fn pkgstore(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("pkgstore");
            cmd.env("PKGSTORE_CONFIG", self.path("config.toml"))
                .env("PKGSTORE_STORE_DIR", self.store());
            cmd
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn add_package(&self) -> PathBuf {
            self.write("pkg/package.json", r#"{"name":"foo","version":"1.0.0"}"#);
            self.write("pkg/lib/index.js", "module.exports = 1");
            let index = self.path("foo.json");
            self.pkgstore()
                .arg("add")
                .arg(self.path("pkg"))
                .arg("--index")
                .arg(&index)
                .assert()
                .success()
                .stdout(predicate::str::contains("Added 2 files"));
            index
        }
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("pkgstore")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed package store"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("pkgstore")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pkgstore"));
    }

    #[test]
    fn config_path() {
        let ws = Workspace::new();
        ws.pkgstore()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let ws = Workspace::new();
        ws.pkgstore()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[store]"))
            .stdout(predicate::str::contains("package_import_method = \"auto\""));
    }

    #[test]
    fn config_init_writes_defaults() {
        let ws = Workspace::new();
        ws.pkgstore()
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        let content = read(&ws.path("config.toml"));
        assert!(content.contains("[store]"));
        assert!(content.contains("package_import_method = \"auto\""));
    }

    #[test]
    fn config_init_keeps_existing_file_unless_forced() {
        let ws = Workspace::new();
        ws.write("config.toml", "[general]\nverbose = true\n");

        ws.pkgstore()
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
        assert_eq!(read(&ws.path("config.toml")), "[general]\nverbose = true\n");

        ws.pkgstore()
            .args(["config", "init", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(read(&ws.path("config.toml")).contains("verbose = false"));
    }

    #[test]
    fn invalid_config_reports_path() {
        let ws = Workspace::new();
        ws.write("config.toml", "[store\n");
        ws.pkgstore()
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn add_writes_files_index() {
        let ws = Workspace::new();
        let index = ws.add_package();

        let content = read(&index);
        assert!(content.contains("\"lib/index.js\""));
        assert!(content.contains("sha512-"));
        assert!(ws.store().join("files").is_dir());
    }

    #[test]
    fn import_copies_package_from_store() {
        let ws = Workspace::new();
        let index = ws.add_package();
        let dest = ws.path("node_modules/foo");

        ws.pkgstore()
            .arg("import")
            .arg(&dest)
            .arg("--index")
            .arg(&index)
            .args(["--method", "copy"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Imported"))
            .stdout(predicate::str::contains("copy"));

        assert_eq!(read(&dest.join("lib/index.js")), "module.exports = 1");
    }

    #[test]
    fn second_import_is_skipped_unless_forced() {
        let ws = Workspace::new();
        let index = ws.add_package();
        let dest = ws.path("node_modules/foo");

        for _ in 0..2 {
            ws.pkgstore()
                .arg("import")
                .arg(&dest)
                .arg("--index")
                .arg(&index)
                .assert()
                .success();
        }
        ws.pkgstore()
            .arg("import")
            .arg(&dest)
            .arg("--index")
            .arg(&index)
            .assert()
            .success()
            .stdout(predicate::str::contains("already up to date"));

        ws.pkgstore()
            .arg("import")
            .arg(&dest)
            .arg("--index")
            .arg(&index)
            .arg("--force")
            .assert()
            .success()
            .stdout(predicate::str::contains("Imported"));
    }

    #[test]
    fn import_prefers_uploaded_build() {
        let ws = Workspace::new();
        let index = ws.add_package();
        ws.write("build/lib/index.js", "module.exports = 'built'");
        ws.write("build/addon.node", "native");

        ws.pkgstore()
            .arg("upload")
            .arg(ws.path("build"))
            .arg("--index")
            .arg(&index)
            .args(["--engine", "test-engine"])
            .assert()
            .success()
            .stdout(predicate::str::contains("test-engine"));

        let dest = ws.path("node_modules/foo");
        ws.pkgstore()
            .arg("import")
            .arg(&dest)
            .arg("--index")
            .arg(&index)
            .args(["--engine", "test-engine", "--requires-build"])
            .assert()
            .success()
            .stdout(predicate::str::contains("prebuilt"));

        assert_eq!(read(&dest.join("lib/index.js")), "module.exports = 'built'");
        assert!(dest.join("addon.node").exists());
    }

    #[test]
    fn import_without_matching_build_uses_plain_files() {
        let ws = Workspace::new();
        let index = ws.add_package();
        let dest = ws.path("node_modules/foo");

        ws.pkgstore()
            .arg("import")
            .arg(&dest)
            .arg("--index")
            .arg(&index)
            .args(["--engine", "other-engine"])
            .assert()
            .success()
            .stdout(predicate::str::contains("prebuilt").not());

        assert_eq!(read(&dest.join("lib/index.js")), "module.exports = 1");
    }

    #[test]
    fn import_local_places_directory() {
        let ws = Workspace::new();
        ws.write("local/package.json", "{}");
        ws.write("local/src/main.js", "main");
        let dest = ws.path("out");

        ws.pkgstore()
            .arg("import-local")
            .arg(&dest)
            .arg("--from")
            .arg(ws.path("local"))
            .args(["--method", "copy"])
            .assert()
            .success();

        assert_eq!(read(&dest.join("src/main.js")), "main");
    }

    #[test]
    fn unknown_method_shows_hint() {
        let ws = Workspace::new();
        let index = ws.add_package();

        ws.pkgstore()
            .arg("import")
            .arg(ws.path("dest"))
            .arg("--index")
            .arg(&index)
            .args(["--method", "symlink"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown package import method"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn import_missing_index_fails() {
        let ws = Workspace::new();
        ws.pkgstore()
            .arg("import")
            .arg(ws.path("dest"))
            .arg("--index")
            .arg(ws.path("missing.json"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn upload_to_corrupt_index_fails() {
        let ws = Workspace::new();
        ws.write("bad.json", "{ not json");
        ws.write("build/a.node", "x");

        ws.pkgstore()
            .arg("upload")
            .arg(ws.path("build"))
            .arg("--index")
            .arg(ws.path("bad.json"))
            .args(["--engine", "e"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unreadable"));

        assert_eq!(read(&ws.path("bad.json")), "{ not json");
    }

    #[test]
    fn tmp_creates_dir_in_store() {
        let ws = Workspace::new();
        let output = ws.pkgstore().arg("tmp").assert().success();
        let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
        let dir = PathBuf::from(stdout.trim());

        assert!(dir.is_dir());
        assert!(dir.starts_with(ws.store()));
    }

    #[test]
    fn prune_empty_store() {
        let ws = Workspace::new();
        ws.pkgstore()
            .arg("prune")
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to prune"));
    }

    #[test]
    fn engine_prints_signature() {
        let ws = Workspace::new();
        ws.pkgstore()
            .args(["engine", "v20.11.1"])
            .assert()
            .success()
            .stdout(predicate::str::ends_with("-node-20\n"));
    }

    #[test]
    fn engine_accepts_runtime_name() {
        let ws = Workspace::new();
        ws.pkgstore()
            .args(["engine", "18.0.0", "--runtime", "bun"])
            .assert()
            .success()
            .stdout(predicate::str::ends_with("-bun-18\n"));
    }
}
