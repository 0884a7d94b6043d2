use crate::store::ensure_parent_dir;
use anyhow::{Context, Result, anyhow};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_RESOLUTION_HARD: &str = "480p";
pub const DEFAULT_MAX_PLAYERS: usize = 10;
const DEFAULT_COMMAND: &str = "streamlink";

/// How a resolution is chosen for a newly added stream that did not get one explicitly.
#[derive(Clone)]
pub enum ResolutionPolicy {
    Fixed(String),
    /// Rules in file order; the first URL substring that matches wins.
    ByUrl(Vec<(String, String)>),
    /// Resolution chosen by a function of the URL; `None` means the hard default.
    #[allow(dead_code)]
    Computed(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>),
    /// Configured value had a shape we do not understand.
    Unrecognized,
}

impl ResolutionPolicy {
    #[must_use]
    pub fn resolve(&self, url: &str) -> String {
        let resolved = match self {
            Self::Fixed(resolution) => Some(resolution.clone()),
            Self::ByUrl(rules) => rules
                .iter()
                .find(|(pattern, _)| url.contains(pattern.as_str()))
                .map(|(_, resolution)| resolution.clone()),
            Self::Computed(resolve) => resolve(url),
            Self::Unrecognized => None,
        };
        resolved
            .filter(|resolution| !resolution.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESOLUTION_HARD.to_owned())
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Fixed(DEFAULT_RESOLUTION_HARD.to_owned()),
            Value::String(resolution) => Self::Fixed(resolution.clone()),
            Value::Object(map) => Self::ByUrl(
                map.iter()
                    .filter_map(|(pattern, resolution)| {
                        resolution
                            .as_str()
                            .map(|resolution| (pattern.clone(), resolution.to_owned()))
                    })
                    .collect(),
            ),
            other => {
                warn!(value = %other, "unrecognized default_resolution, using {DEFAULT_RESOLUTION_HARD}");
                Self::Unrecognized
            }
        }
    }
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RESOLUTION_HARD.to_owned())
    }
}

impl fmt::Debug for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(resolution) => f.debug_tuple("Fixed").field(resolution).finish(),
            Self::ByUrl(rules) => f.debug_tuple("ByUrl").field(rules).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
            Self::Unrecognized => f.write_str("Unrecognized"),
        }
    }
}

/// One launch-command profile; the stream URL and resolution are appended as trailing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    words: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(line: &str) -> Result<Self> {
        let words = shlex::split(line)
            .ok_or_else(|| anyhow!("command '{line}' is not valid shell syntax"))?;
        if words.is_empty() {
            return Err(anyhow!("command '{line}' is empty"));
        }
        Ok(Self { words })
    }

    #[must_use]
    pub fn from_words(words: Vec<String>) -> Self {
        Self { words }
    }

    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }

    #[must_use]
    pub fn display(&self) -> String {
        self.words.join(" ")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThemePalette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub highlight: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for ThemePalette {
    fn default() -> Self {
        Self {
            text: Color::Rgb(231, 235, 243),
            muted: Color::Rgb(145, 152, 170),
            accent: Color::Rgb(102, 216, 255),
            highlight: Color::Rgb(114, 140, 255),
            success: Color::Rgb(103, 212, 142),
            warning: Color::Rgb(255, 198, 109),
            error: Color::Rgb(255, 121, 134),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ThemeFile {
    text: String,
    muted: String,
    accent: String,
    highlight: String,
    success: String,
    warning: String,
    error: String,
}

impl Default for ThemeFile {
    fn default() -> Self {
        Self {
            text: "#E7EBF3".to_owned(),
            muted: "#9198AA".to_owned(),
            accent: "#66D8FF".to_owned(),
            highlight: "#728CFF".to_owned(),
            success: "#67D48E".to_owned(),
            warning: "#FFC66D".to_owned(),
            error: "#FF7986".to_owned(),
        }
    }
}

impl ThemeFile {
    fn palette(&self) -> Result<ThemePalette> {
        Ok(ThemePalette {
            text: parse_hex_color("text", &self.text)?,
            muted: parse_hex_color("muted", &self.muted)?,
            accent: parse_hex_color("accent", &self.accent)?,
            highlight: parse_hex_color("highlight", &self.highlight)?,
            success: parse_hex_color("success", &self.success)?,
            warning: parse_hex_color("warning", &self.warning)?,
            error: parse_hex_color("error", &self.error)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct SettingsFile {
    commands: Vec<String>,
    default_resolution: Value,
    max_players: usize,
    theme: ThemeFile,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            commands: vec![DEFAULT_COMMAND.to_owned()],
            default_resolution: Value::String(DEFAULT_RESOLUTION_HARD.to_owned()),
            max_players: DEFAULT_MAX_PLAYERS,
            theme: ThemeFile::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub commands: Vec<CommandTemplate>,
    pub resolution_policy: ResolutionPolicy,
    pub max_players: usize,
    pub palette: ThemePalette,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            commands: vec![CommandTemplate::from_words(vec![DEFAULT_COMMAND.to_owned()])],
            resolution_policy: ResolutionPolicy::default(),
            max_players: DEFAULT_MAX_PLAYERS,
            palette: ThemePalette::default(),
        }
    }
}

impl Settings {
    fn from_file(file: &SettingsFile) -> Result<Self> {
        let mut commands = file
            .commands
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                CommandTemplate::parse(line)
                    .with_context(|| format!("invalid command profile #{}", idx + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        if commands.is_empty() {
            commands.push(CommandTemplate::from_words(vec![DEFAULT_COMMAND.to_owned()]));
        }

        Ok(Self {
            commands,
            resolution_policy: ResolutionPolicy::from_json(&file.default_resolution),
            max_players: file.max_players.max(1),
            palette: file.theme.palette()?,
        })
    }
}

pub fn load_or_create_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        let default_file = SettingsFile::default();
        write_settings_file(path, &default_file)?;
        return Settings::from_file(&default_file);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading settings at {}", path.display()))?;
    let parsed = serde_json::from_str::<SettingsFile>(&raw)
        .with_context(|| format!("failed parsing settings at {}", path.display()))?;
    Settings::from_file(&parsed)
        .with_context(|| format!("invalid settings at {}", path.display()))
}

fn write_settings_file(path: &Path, settings: &SettingsFile) -> Result<()> {
    ensure_parent_dir(path)?;
    let payload = serde_json::to_string_pretty(settings).context("failed serializing settings")?;
    fs::write(path, payload)
        .with_context(|| format!("failed writing settings at {}", path.display()))?;
    Ok(())
}

fn parse_hex_color(key: &str, value: &str) -> Result<Color> {
    let input = value.trim();
    let hex = input.strip_prefix('#').unwrap_or(input);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "theme field '{key}' must be a hex color like #RRGGBB, got '{value}'"
        ));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .with_context(|| format!("theme field '{key}' has an invalid component"))
    };
    Ok(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
