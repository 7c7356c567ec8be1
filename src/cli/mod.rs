pub mod check;
pub mod outline;
pub mod run;

use std::path::{Path, PathBuf};
use std::process;

use gpuloop::config::OffloadOptions;
use gpuloop::project::{OffloadConfig, CONFIG_FILE};

/// A source file with the project configuration that applies to it.
pub struct ResolvedInput {
    pub path: PathBuf,
    pub source: String,
    pub config: Option<OffloadConfig>,
}

impl ResolvedInput {
    pub fn filename(&self) -> String {
        self.path.display().to_string()
    }

    /// Options from gpuloop.toml, or the defaults.
    pub fn base_options(&self) -> OffloadOptions {
        self.config
            .as_ref()
            .map(|c| c.options.clone())
            .unwrap_or_default()
    }
}

fn load_config(toml_path: &Path) -> OffloadConfig {
    match OffloadConfig::load(toml_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}: {}", toml_path.display(), e.message);
            process::exit(1);
        }
    }
}

/// Read an `.oir` file and look for gpuloop.toml next to it or above it.
pub fn resolve_input(input: &Path) -> ResolvedInput {
    if !input.extension().is_some_and(|e| e == "oir") {
        eprintln!("error: input must be a .oir file");
        process::exit(1);
    }
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", input.display(), e);
            process::exit(1);
        }
    };
    let dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let config = OffloadConfig::find(dir).map(|p| {
        log::debug!("using {}", p.display());
        load_config(&p)
    });
    if config.is_none() {
        log::debug!("no {} found, using defaults", CONFIG_FILE);
    }
    ResolvedInput {
        path: input.to_path_buf(),
        source,
        config,
    }
}

/// Write `content` to `path`, or exit.
pub fn write_file(path: &Path, content: &str) {
    if let Err(e) = std::fs::write(path, content) {
        eprintln!("error: cannot write '{}': {}", path.display(), e);
        process::exit(1);
    }
}
