use scenaria_exec::config::DEFAULT_CONFIG;

use crate::exit_codes;
use crate::output::{config_path, load_config, print_error};
use crate::ConfigArgs;

pub fn init_cmd(config: &ConfigArgs, force: bool) -> i32 {
    let path = config_path(config);
    if path.exists() && !force {
        print_error(&format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
        return exit_codes::CONFIG_ERROR;
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            print_error(&format!("failed to create {}: {e}", parent.display()));
            return exit_codes::RUNTIME_ERROR;
        }
    }
    if let Err(e) = std::fs::write(&path, DEFAULT_CONFIG) {
        print_error(&format!("failed to write {}: {e}", path.display()));
        return exit_codes::RUNTIME_ERROR;
    }
    println!("wrote {}", path.display());
    exit_codes::SUCCESS
}

pub fn validate_cmd(config: &ConfigArgs) -> i32 {
    let cfg = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            print_error(&e.to_string());
            return exit_codes::CONFIG_ERROR;
        }
    };
    match cfg.discover(&[]) {
        Ok(files) => {
            println!("ok: {} scenario file(s)", files.len());
            exit_codes::SUCCESS
        }
        Err(e) => {
            print_error(&e.to_string());
            exit_codes::CONFIG_ERROR
        }
    }
}
