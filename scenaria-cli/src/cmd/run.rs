use std::path::PathBuf;

use scenaria_exec::{Engine, EngineError};
use tracing::{debug, warn};

use crate::exit_codes;
use crate::output::{load_config, print_error, reporter_options};
use crate::{ConfigArgs, OutputArgs};

pub async fn run_cmd(files: &[PathBuf], config: &ConfigArgs, output: &OutputArgs) -> i32 {
    let cfg = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            print_error(&e.to_string());
            return exit_codes::CONFIG_ERROR;
        }
    };
    let options = reporter_options(output, &cfg);
    debug!(root = %cfg.root.display(), ?options, "loaded config");
    let engine = Engine::new(cfg).with_options(options);

    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, canceling running scenarios");
            cancel.cancel();
        }
    });

    match engine.run(files).await {
        Ok(summary) if summary.passed => exit_codes::SUCCESS,
        Ok(_) => exit_codes::TEST_FAILED,
        Err(e @ (EngineError::Config(_) | EngineError::Plugin(_) | EngineError::Render(_))) => {
            print_error(&e.to_string());
            exit_codes::CONFIG_ERROR
        }
        Err(e) => {
            print_error(&e.to_string());
            exit_codes::RUNTIME_ERROR
        }
    }
}
