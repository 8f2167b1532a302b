//! End-to-end tests against a real kernel source tree.
//!
//! These tests invoke the autokernel binary as a subprocess and therefore
//! need a prepared kernel tree (version >= 4.2) with a writable
//! scripts/kconfig directory. They are marked `#[ignore]` because of that
//! requirement, and because Kconfig state is process-global they must run
//! serially.
//!
//! Run with:
//!   AUTOKERNEL_TEST_KERNEL=/path/to/linux \
//!     cargo test --test integration -- --ignored --test-threads=1

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Locate the compiled autokernel binary next to the test binary.
fn autokernel_binary() -> PathBuf {
    let mut path = std::env::current_exe().expect("could not determine test binary path");
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("autokernel");
    path
}

fn kernel_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("AUTOKERNEL_TEST_KERNEL")
            .expect("set AUTOKERNEL_TEST_KERNEL to a kernel source tree"),
    )
}

/// Write a config.toml + script pair and run the given subcommand.
fn run_with_script(script_name: &str, script: &str, args: &[&str]) -> (TempDir, Output) {
    let dir = TempDir::new().expect("could not create temp dir");
    let script_path = dir.path().join(script_name);
    fs::write(&script_path, script).expect("could not write script");
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!("[config]\nscript = {:?}\n", script_path),
    )
    .expect("could not write config.toml");

    let output = Command::new(autokernel_binary())
        .arg("--config")
        .arg(&config_path)
        .arg("--kernel-dir")
        .arg(kernel_dir())
        .args(args)
        .output()
        .expect("failed to execute autokernel");
    (dir, output)
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn generate_config_roundtrips_through_check() {
    let scratch = TempDir::new().unwrap();
    let out_path = scratch.path().join("out.config");
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "NET(\"y\")\nDEVTMPFS(\"y\")\n",
        &["generate-config", "-o", out_path.to_str().unwrap()],
    );
    assert!(
        output.status.success(),
        "generate-config failed:\n{}",
        stderr_of(&output)
    );
    let written = fs::read_to_string(&out_path).expect("no .config written");
    assert!(written.contains("CONFIG_NET=y"));

    // Loading the produced config back must yield an identical symbol set.
    let (_dir2, check) = run_with_script(
        "kernel.lua",
        "NET(\"y\")\nDEVTMPFS(\"y\")\n",
        &["check", "-c", out_path.to_str().unwrap()],
    );
    assert!(
        check.status.success(),
        "round-trip check failed:\n{}{}",
        String::from_utf8_lossy(&check.stdout),
        stderr_of(&check)
    );
}

#[test]
#[ignore]
fn invalid_tristate_on_boolean_symbol() {
    // NET is boolean; m is not an allowed value.
    let (_dir, output) = run_with_script("kernel.lua", "NET(\"m\")\n", &["generate-config"]);
    assert_eq!(output.status.code(), Some(12), "{}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("n, y"), "diagnostic should name allowed values:\n{stderr}");
}

#[test]
#[ignore]
fn unmet_dependencies_are_reported_with_clauses() {
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "WLAN_VENDOR_REALTEK(\"y\")\n",
        &["generate-config"],
    );
    assert_eq!(output.status.code(), Some(13), "{}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("WLAN"), "missing WLAN in:\n{stderr}");
    assert!(stderr.contains("NETDEVICES"), "missing NETDEVICES in:\n{stderr}");
}

#[test]
#[ignore]
fn satisfy_orders_prerequisites_before_dependents() {
    let scratch = TempDir::new().unwrap();
    let out_path = scratch.path().join("out.config");
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "WLAN_VENDOR_REALTEK:satisfy{\"y\", recursive=true}\n",
        &["generate-config", "-o", out_path.to_str().unwrap()],
    );
    assert!(
        output.status.success(),
        "recursive satisfy failed:\n{}",
        stderr_of(&output)
    );
    let written = fs::read_to_string(&out_path).expect("no .config written");
    for line in [
        "CONFIG_NET=y",
        "CONFIG_NETDEVICES=y",
        "CONFIG_WLAN=y",
        "CONFIG_WLAN_VENDOR_REALTEK=y",
    ] {
        assert!(written.contains(line), "missing {line} in produced config");
    }
}

#[test]
#[ignore]
fn satisfy_command_prints_ordered_plan() {
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "",
        &["satisfy", "--recursive", "--ignore-config", "WLAN_VENDOR_REALTEK"],
    );
    assert!(output.status.success(), "{}", stderr_of(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let position = |needle: &str| {
        stdout
            .find(needle)
            .unwrap_or_else(|| panic!("missing {needle} in plan:\n{stdout}"))
    };
    assert!(position("NET=y") < position("NETDEVICES=y"));
    assert!(position("NETDEVICES=y") < position("WLAN=y"));
    assert!(position("WLAN=y") < position("WLAN_VENDOR_REALTEK=y"));
}

#[test]
#[ignore]
fn select_driven_symbol_cannot_be_assigned_directly() {
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "RTLWIFI_USB(\"y\")\n",
        &["generate-config"],
    );
    assert_eq!(output.status.code(), Some(12), "{}", stderr_of(&output));
    assert!(
        stderr_of(&output).contains("select"),
        "diagnostic should mention select:\n{}",
        stderr_of(&output)
    );

    let (_dir, output) = run_with_script(
        "kernel.lua",
        "RTLWIFI_USB:satisfy{\"y\", recursive=true}\n",
        &["generate-config"],
    );
    assert!(
        output.status.success(),
        "satisfy for select-driven symbol failed:\n{}",
        stderr_of(&output)
    );
}

#[test]
#[ignore]
fn conflicting_reassignment_cites_both_sites() {
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "NET(\"y\")\nNET(\"n\")\n",
        &["generate-config"],
    );
    assert_eq!(output.status.code(), Some(12), "{}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("conflicting"), "{stderr}");
    assert!(stderr.contains("kernel.lua:1"), "should cite the first site:\n{stderr}");
    assert!(stderr.contains("kernel.lua:2"), "should cite the second site:\n{stderr}");
}

#[test]
#[ignore]
fn duplicate_same_value_assignment_only_warns() {
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "NET(\"y\")\nNET(\"y\")\n",
        &["generate-config"],
    );
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(
        stderr_of(&output).contains("duplicate"),
        "expected a duplicate warning:\n{}",
        stderr_of(&output)
    );
}

#[test]
#[ignore]
fn int_assignment_outside_declared_range() {
    // CONSOLE_LOGLEVEL_DEFAULT declares range 1..15.
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "CONSOLE_LOGLEVEL_DEFAULT(99)\n",
        &["generate-config"],
    );
    assert_eq!(output.status.code(), Some(12), "{}", stderr_of(&output));
    assert!(
        stderr_of(&output).contains("range"),
        "diagnostic should mention the range:\n{}",
        stderr_of(&output)
    );
}

#[test]
#[ignore]
fn version_conditional_takes_the_right_branch() {
    // The false branch references a symbol that may not exist; lazy
    // evaluation must keep it untouched.
    let scratch = TempDir::new().unwrap();
    let out_path = scratch.path().join("out.config");
    let (_dir, output) = run_with_script(
        "kernel.lua",
        "if kernel_version >= ver(\"999.0\") then\n\
         \tSYMBOL_FROM_THE_FUTURE(\"y\")\n\
         else\n\
         \tNET(\"y\")\n\
         end\n",
        &["generate-config", "-o", out_path.to_str().unwrap()],
    );
    assert!(output.status.success(), "{}", stderr_of(&output));
    let written = fs::read_to_string(&out_path).expect("no .config written");
    assert!(written.contains("CONFIG_NET=y"));
    assert!(!written.contains("SYMBOL_FROM_THE_FUTURE"));
}

#[test]
#[ignore]
fn unchecked_defconfig_load_does_not_pin() {
    // Re-asserting a defconfig value explicitly is not a conflict.
    let defconfig = kernel_dir().join("arch/x86/configs/x86_64_defconfig");
    let script = format!(
        "load_kconfig_unchecked({:?})\nNET(\"y\")\nNET(\"y\")\n",
        defconfig
    );
    let (_dir, output) = run_with_script("kernel.lua", &script, &["generate-config"]);
    assert!(output.status.success(), "{}", stderr_of(&output));
}

#[test]
#[ignore]
fn info_renders_type_and_dependencies() {
    let (_dir, output) = run_with_script("kernel.lua", "", &["info", "WLAN"]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("WLAN"), "{stdout}");
    assert!(stdout.contains("bool"), "{stdout}");
    assert!(stdout.contains("depends on"), "{stdout}");
}
