use std::path::{Path, PathBuf};

use crate::diagnostic::Diagnostic;
use crate::span::Span;

use super::OffloadOptions;

pub const CONFIG_FILE: &str = "gpuloop.toml";

/// Project configuration from gpuloop.toml.
#[derive(Clone, Debug)]
pub struct OffloadConfig {
    pub path: PathBuf,
    pub root_dir: PathBuf,
    pub options: OffloadOptions,
    /// Default entry function for `gpuloop run`.
    pub entry: Option<String>,
}

fn parse_bool(key: &str, value: &str, line: usize) -> Result<bool, Diagnostic> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Diagnostic::error(
            format!("line {}: '{}' must be true or false, found '{}'", line, key, value),
            Span::dummy(),
        )),
    }
}

impl OffloadConfig {
    /// Load configuration from a gpuloop.toml file.
    pub fn load(toml_path: &Path) -> Result<OffloadConfig, Diagnostic> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read '{}': {}", toml_path.display(), e),
                Span::dummy(),
            )
        })?;
        let mut config = Self::parse(&content)?;
        config.path = toml_path.to_path_buf();
        config.root_dir = toml_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Ok(config)
    }

    /// Section-aware minimal TOML parsing of `[offload]` and `[run]`.
    pub fn parse(content: &str) -> Result<OffloadConfig, Diagnostic> {
        let mut options = OffloadOptions::default();
        let mut entry = None;
        let mut current_section = String::new();

        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(Diagnostic::error(
                    format!("line {}: expected 'key = value'", line_no),
                    Span::dummy(),
                ));
            };
            let key = key.trim().trim_matches('"');
            let value = value.trim();

            match current_section.as_str() {
                "offload" => match key {
                    "report" => options.report = parse_bool(key, value, line_no)?,
                    "single_unit" => options.single_unit = parse_bool(key, value, line_no)?,
                    "device_copies" => options.device_copies = parse_bool(key, value, line_no)?,
                    "explicit_kernels" => {
                        options.explicit_kernels = parse_bool(key, value, line_no)?
                    }
                    "work_group_size" => {
                        options.work_group_size = match value.parse::<u32>() {
                            Ok(n) if n > 0 => n,
                            _ => {
                                return Err(Diagnostic::error(
                                    format!(
                                        "line {}: work_group_size must be a positive integer, found '{}'",
                                        line_no, value
                                    ),
                                    Span::dummy(),
                                ))
                            }
                        }
                    }
                    other => log::warn!("{}: ignoring unknown key '{}' in [offload]", CONFIG_FILE, other),
                },
                "run" => {
                    if key == "entry" {
                        entry = Some(value.trim_matches('"').to_string());
                    }
                }
                _ => {}
            }
        }

        Ok(OffloadConfig {
            path: PathBuf::from(CONFIG_FILE),
            root_dir: PathBuf::from("."),
            options,
            entry,
        })
    }

    /// Try to find a gpuloop.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join(CONFIG_FILE);
        fs::write(
            &toml_path,
            r#"# offload settings
[offload]
report = true
work_group_size = 128
device_copies = false

[run]
entry = "bench"
"#,
        )
        .unwrap();

        let config = OffloadConfig::load(&toml_path).unwrap();
        assert!(config.options.report);
        assert_eq!(config.options.work_group_size, 128);
        assert!(!config.options.device_copies);
        assert!(config.options.explicit_kernels);
        assert_eq!(config.entry.as_deref(), Some("bench"));
        assert_eq!(config.root_dir, dir.path());
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let err = OffloadConfig::parse("[offload]\nreport = yes\n").unwrap_err();
        assert!(err.message.contains("true or false"));
        let err = OffloadConfig::parse("[offload]\nwork_group_size = 0\n").unwrap_err();
        assert!(err.message.contains("positive integer"));
    }

    #[test]
    fn test_other_sections_are_ignored() {
        let config = OffloadConfig::parse("[package]\nname = \"x\"\n").unwrap();
        assert_eq!(config.options, OffloadOptions::default());
    }

    #[test]
    fn test_find_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[offload]\n").unwrap();
        let found = OffloadConfig::find(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = OffloadConfig::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(err.message.contains("cannot read"));
    }
}
