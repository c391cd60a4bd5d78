//! In-place editing of the engine's TOML configuration.
//!
//! The engine config is also edited by hand, so rewriting it through a
//! serializer would discard comments and formatting. `ConfigEditor`
//! instead patches a single `key = value` line textually, keeping
//! indentation and any trailing comment intact.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::PathBuf;

/// A value to write into a TOML key, formatted per type.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Display for SettingValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingValue::Str(s) => write!(f, "\"{s}\""),
            SettingValue::Int(n) => write!(f, "{n}"),
            SettingValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

pub struct ConfigEditor {
    path: PathBuf,
}

impl ConfigEditor {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Replace the value of `key` inside `[section]`, preserving the line's
    /// indentation and trailing comment. Fails if the file, the section or
    /// the key is missing; never creates new entries.
    pub fn update_key(
        &self,
        section: &str,
        key: &str,
        value: &SettingValue,
    ) -> Result<String, String> {
        if !self.path.exists() {
            return Err("configuration file not found".to_string());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read configuration file: {e}"))?;

        let mut out = String::with_capacity(content.len());
        let mut in_section = false;
        let mut updated = false;

        for line in content.lines() {
            let stripped = line.trim();
            if stripped.starts_with('[') && stripped.ends_with(']') {
                in_section = &stripped[1..stripped.len() - 1] == section;
            }
            if in_section && !updated && is_key_line(stripped, key) {
                let comment = line
                    .split_once('#')
                    .map(|(_, c)| format!(" #{}", c.trim_end()))
                    .unwrap_or_default();
                let indent = &line[..line.len() - line.trim_start().len()];
                out.push_str(&format!("{indent}{key} = {value}{comment}\n"));
                updated = true;
            } else {
                out.push_str(line);
                out.push('\n');
            }
        }

        if !updated {
            return Err(format!("key '{key}' not found in section [{section}]"));
        }
        fs::write(&self.path, out)
            .map_err(|e| format!("cannot write configuration file: {e}"))?;
        Ok(format!("updated [{section}] {key} = {value}"))
    }
}

fn is_key_line(stripped: &str, key: &str) -> bool {
    match stripped.strip_prefix(key) {
        Some(rest) => rest.trim_start().starts_with('='),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
# engine settings
[server]
mode = \"tcp\"  # transport
  port = 9400

[storage]
save_path = \"downloads\"
";

    fn editor(content: &str) -> (TempDir, ConfigEditor) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, content).unwrap();
        (dir, ConfigEditor::new(path))
    }

    #[test]
    fn update_preserves_comment_and_indentation() {
        let (dir, editor) = editor(SAMPLE);
        editor
            .update_key("server", "mode", &SettingValue::Str("quic".to_string()))
            .unwrap();
        editor
            .update_key("server", "port", &SettingValue::Int(9500))
            .unwrap();
        let written = fs::read_to_string(dir.path().join("engine.toml")).unwrap();
        assert!(written.contains("mode = \"quic\" # transport"));
        assert!(written.contains("  port = 9500"));
        assert!(written.starts_with("# engine settings"));
    }

    #[test]
    fn key_is_only_matched_inside_its_section() {
        let (dir, editor) = editor("[server]\npath = \"a\"\n[storage]\npath = \"b\"\n");
        editor
            .update_key("storage", "path", &SettingValue::Str("c".to_string()))
            .unwrap();
        let written = fs::read_to_string(dir.path().join("engine.toml")).unwrap();
        assert!(written.contains("path = \"a\""));
        assert!(written.contains("path = \"c\""));
    }

    #[test]
    fn unknown_key_or_section_is_an_error() {
        let (_dir, editor) = editor(SAMPLE);
        assert!(editor
            .update_key("server", "nope", &SettingValue::Int(1))
            .is_err());
        assert!(editor
            .update_key("nope", "mode", &SettingValue::Int(1))
            .is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let editor = ConfigEditor::new(PathBuf::from("/definitely/not/here.toml"));
        assert!(editor
            .update_key("server", "mode", &SettingValue::Bool(true))
            .is_err());
    }

    #[test]
    fn prefix_keys_do_not_false_match() {
        let (dir, editor) = editor("[server]\nport_range = \"1-2\"\nport = 9400\n");
        editor
            .update_key("server", "port", &SettingValue::Int(1))
            .unwrap();
        let written = fs::read_to_string(dir.path().join("engine.toml")).unwrap();
        assert!(written.contains("port_range = \"1-2\""));
        assert!(written.contains("port = 1"));
    }
}
