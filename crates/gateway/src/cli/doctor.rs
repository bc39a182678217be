use vg_domain::config::{Config, ConfigSeverity};

/// Run diagnostic checks against the resolved configuration and print a
/// summary. Returns `true` when every check passes.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("vigil-gateway doctor");
    println!("=====================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_storage_dir(config, &mut all_passed);
    check_reload_passphrase(config);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn print_check(label: &str, passed: bool, detail: String) {
    let mark = if passed { "ok" } else { "FAIL" };
    println!("[{mark}] {label}: {detail}");
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    // Missing config is not fatal — defaults are valid — so this check
    // does not flip all_passed.
    let _ = exists;
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    print_check(
        "Config validation",
        error_count == 0,
        format!("{error_count} error(s), {} warning(s)", issues.len() - error_count),
    );
    if error_count > 0 {
        *all_passed = false;
    }
}

fn check_storage_dir(config: &Config, all_passed: &mut bool) {
    let dir = &config.storage.data_dir;
    let writable = std::fs::create_dir_all(dir).is_ok();
    print_check(
        "Storage directory writable",
        writable,
        dir.display().to_string(),
    );
    if !writable {
        *all_passed = false;
    }
}

fn check_reload_passphrase(config: &Config) {
    let set = std::env::var(&config.admin.reload_passphrase_env).is_ok();
    print_check(
        "Reload passphrase configured",
        set,
        if set {
            format!("{} is set", config.admin.reload_passphrase_env)
        } else {
            format!(
                "{} is unset — /reload_config will always reject",
                config.admin.reload_passphrase_env
            )
        },
    );
}
