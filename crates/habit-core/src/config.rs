//! `habitrc` settings: `key = value` lines, `#` comments and `include <file>`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::rate::DEFAULT_RATE_WINDOW;

pub const HABITRC_ENV: &str = "HABITRC";

const DEFAULT_DATA_LOCATION: &str =
  "~/.habits";

const DEFAULTS: [(&str, &str); 4] = [
  ("data.location", DEFAULT_DATA_LOCATION),
  ("default.command", "list"),
  ("color", "on"),
  ("date.convention", "local")
];

#[derive(Debug, Clone)]
pub struct Config {
  settings:         BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

/// One meaningful line of a habitrc file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RcLine {
  Include(String),
  Setting {
    key:   String,
    value: String
  }
}

impl Default for Config {
  fn default() -> Self {
    let mut settings: BTreeMap<
      String,
      String
    > = DEFAULTS
      .iter()
      .map(|(key, value)| {
        (key.to_string(), value.to_string())
      })
      .collect();
    settings.insert(
      "rate.window".to_string(),
      DEFAULT_RATE_WINDOW.to_string()
    );

    Self {
      settings,
      loaded_files: Vec::new()
    }
  }
}

impl Config {
  /// Defaults, then the habitrc named by `explicit`, `$HABITRC` or
  /// `~/.habitrc`, whichever comes first.
  #[tracing::instrument(skip(explicit))]
  pub fn load(
    explicit: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match locate_habitrc(explicit) {
      | Some(path) => {
        info!(habitrc = %path.display(), "reading habitrc");
        cfg.read_file(&path)?;
      }
      | None => {
        debug!("no habitrc; defaults only")
      }
    }

    Ok(cfg)
  }

  /// Command-line settings win over the file. A leading `rc.` is dropped.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .map(str::to_string)
        .unwrap_or(key);
      debug!(%key, %value, "rc override");
      self.settings.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.settings.get(key).cloned()
  }

  /// `on/off`, `yes/no`, `true/false` or `1/0`; anything else is an error.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) =
      self.settings.get(key)
    else {
      return Ok(None);
    };
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => {
        Ok(Some(true))
      }
      | "off" | "no" | "false" | "0" => {
        Ok(Some(false))
      }
      | other => {
        Err(anyhow!(
          "{key} expects on or off, \
           got '{other}'"
        ))
      }
    }
  }

  /// Day count for the rate column of `list`.
  pub fn rate_window(
    &self
  ) -> anyhow::Result<u32> {
    let Some(raw) =
      self.settings.get("rate.window")
    else {
      return Ok(DEFAULT_RATE_WINDOW);
    };
    raw.trim().parse::<u32>().with_context(
      || {
        format!(
          "rate.window expects a \
           whole number of days, got \
           '{raw}'"
        )
      }
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.settings.iter()
  }

  fn read_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = home_relative(path);
    if self.loaded_files.contains(&path)
    {
      warn!(file = %path.display(), "include cycle; file already read");
      return Ok(());
    }

    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self
      .loaded_files
      .push(path.clone());

    let dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (index, raw) in
      text.lines().enumerate()
    {
      let parsed = parse_rc_line(raw)
        .with_context(|| {
          format!(
            "{}:{}",
            path.display(),
            index + 1
          )
        })?;
      match parsed {
        | None => {}
        | Some(RcLine::Include(
          target
        )) => {
          let target =
            dir.join(home_relative(
              Path::new(&target)
            ));
          if target.exists() {
            self.read_file(&target)?;
          } else {
            warn!(include = %target.display(), "included habitrc is missing");
          }
        }
        | Some(RcLine::Setting {
          key,
          value
        }) => {
          trace!(%key, %value, "habitrc setting");
          self
            .settings
            .insert(key, value);
        }
      }
    }

    Ok(())
  }
}

/// `None` for blank and comment-only lines.
fn parse_rc_line(
  raw: &str
) -> anyhow::Result<Option<RcLine>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(None);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      bail!("include needs a file name");
    }
    return Ok(Some(RcLine::Include(
      target.to_string()
    )));
  }

  let Some((key, value)) =
    line.split_once('=')
  else {
    bail!(
      "expected key = value, got \
       '{line}'"
    );
  };
  let key = key.trim();
  if key.is_empty() {
    bail!("setting has no key: '{line}'");
  }
  Ok(Some(RcLine::Setting {
    key:   key.to_string(),
    value: value.trim().to_string()
  }))
}

/// `--data`, else `data.location`. Created when missing.
#[tracing::instrument(skip(cfg, explicit))]
pub fn resolve_data_dir(
  cfg: &Config,
  explicit: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match explicit {
    | Some(path) => path.to_path_buf(),
    | None => {
      let location = cfg
        .get("data.location")
        .unwrap_or_else(|| {
          DEFAULT_DATA_LOCATION
            .to_string()
        });
      home_relative(Path::new(
        &location
      ))
    }
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn locate_habitrc(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }

  if let Ok(value) =
    std::env::var(HABITRC_ENV)
  {
    return (value != "/dev/null")
      .then(|| PathBuf::from(value));
  }

  let home = dirs::home_dir()?;
  let candidate = home.join(".habitrc");
  candidate.exists().then_some(candidate)
}

fn home_relative(
  path: &Path
) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}
