use std::path::PathBuf;

use scenaria_exec::{display_path, Engine, EngineError};
use serde::Serialize;

use crate::exit_codes;
use crate::output::{load_config, print_error, print_result, OutputFormat};
use crate::ConfigArgs;

#[derive(Serialize)]
struct ListedFile {
    path: String,
    scenarios: Vec<ListedScenario>,
}

#[derive(Serialize)]
struct ListedScenario {
    title: String,
    steps: Vec<ListedStep>,
}

#[derive(Serialize)]
struct ListedStep {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    include: Option<String>,
}

pub fn list_cmd(files: &[PathBuf], config: &ConfigArgs, format: OutputFormat) -> i32 {
    let cfg = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            print_error(&e.to_string());
            return exit_codes::CONFIG_ERROR;
        }
    };
    let root = cfg.root.clone();
    let listed = match Engine::new(cfg).list(files) {
        Ok(l) => l,
        Err(e @ (EngineError::Config(_) | EngineError::Parse(_))) => {
            print_error(&e.to_string());
            return exit_codes::CONFIG_ERROR;
        }
        Err(e) => {
            print_error(&e.to_string());
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let result: Vec<ListedFile> = listed
        .into_iter()
        .map(|(path, scenarios)| ListedFile {
            path: display_path(&path, &root),
            scenarios: scenarios
                .iter()
                .map(|s| ListedScenario {
                    title: s.display_name(),
                    steps: s
                        .steps
                        .iter()
                        .enumerate()
                        .map(|(i, step)| ListedStep {
                            title: step.display_name(i),
                            include: step.include.clone(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    if format == OutputFormat::Json {
        print_result(&result);
        return exit_codes::SUCCESS;
    }
    for file in &result {
        println!("{}", file.path);
        for scenario in &file.scenarios {
            println!("  {}", scenario.title);
            for step in &scenario.steps {
                match &step.include {
                    Some(include) => println!("    - {} (include {include})", step.title),
                    None => println!("    - {}", step.title),
                }
            }
        }
    }
    exit_codes::SUCCESS
}
