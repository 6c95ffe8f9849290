//! Integration tests for Gantry

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn gantry() -> Command {
        cargo_bin_cmd!("gantry")
    }

    /// Isolate config and state under a throwaway home
    fn isolated(cmd: &mut Command, temp: &TempDir) {
        cmd.env("HOME", temp.path())
            .env("XDG_CONFIG_HOME", temp.path().join("config"))
            .env("XDG_STATE_HOME", temp.path().join("state"));
    }

    #[test]
    fn help_displays() {
        gantry()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("persistent local cache"));
    }

    #[test]
    fn version_displays() {
        gantry()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gantry"));
    }

    #[test]
    fn unknown_subcommand_fails() {
        gantry().arg("bogus").assert().failure();
    }

    #[test]
    fn job_show_requires_remote_config() {
        let temp = TempDir::new().unwrap();
        let mut cmd = gantry();
        isolated(&mut cmd, &temp);
        cmd.args(["job", "show", "j-1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no remote service configured"));
    }

    #[test]
    fn cache_status_runs_on_fresh_state() {
        let temp = TempDir::new().unwrap();
        let mut cmd = gantry();
        isolated(&mut cmd, &temp);
        cmd.args(["cache", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache root:"));
    }

    #[test]
    fn cache_status_json() {
        let temp = TempDir::new().unwrap();
        let mut cmd = gantry();
        isolated(&mut cmd, &temp);
        cmd.args(["cache", "status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"artifact_count\": 0"));
    }

    #[test]
    fn cache_gc_runs_on_fresh_state() {
        let temp = TempDir::new().unwrap();
        let mut cmd = gantry();
        isolated(&mut cmd, &temp);
        cmd.args(["cache", "gc"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to remove"));
    }

    #[test]
    fn cache_clear_skips_prompt_with_yes() {
        let temp = TempDir::new().unwrap();
        let mut cmd = gantry();
        isolated(&mut cmd, &temp);
        cmd.args(["cache", "clear", "--yes"]).assert().success();
    }

    #[test]
    fn separate_tokens_use_separate_cache_roots() {
        let temp = TempDir::new().unwrap();

        let mut first = gantry();
        isolated(&mut first, &temp);
        let first_out = first
            .args(["--token", "token-a", "cache", "status"])
            .assert()
            .success();
        let first_stdout = String::from_utf8_lossy(&first_out.get_output().stdout).to_string();

        let mut second = gantry();
        isolated(&mut second, &temp);
        let second_out = second
            .args(["--token", "token-b", "cache", "status"])
            .assert()
            .success();
        let second_stdout = String::from_utf8_lossy(&second_out.get_output().stdout).to_string();

        assert_ne!(first_stdout, second_stdout);
        assert!(first_stdout.contains("cache-"));
    }
}
