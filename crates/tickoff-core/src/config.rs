use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::gate::{
  DEFAULT_MIN_BUSY_DURATION,
  GateOptions
};

pub const BASE_URL_ENV: &str =
  "TICKOFF_API_BASE_URL";
pub const RC_ENV: &str = "TICKOFFRC";

#[derive(Debug, Clone)]
pub struct Config {
  map:             HashMap<String, String>,
  pub loaded_file: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.tickoff".to_string()
    );
    map.insert(
      "gate.min_busy_ms".to_string(),
      DEFAULT_MIN_BUSY_DURATION
        .as_millis()
        .to_string()
    );
    map.insert(
      "gate.blocking".to_string(),
      "on".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );

    Self {
      map,
      loaded_file: None
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading tickoffrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no tickoffrc found; using \
         defaults"
      );
    }

    if let Ok(base_url) =
      std::env::var(BASE_URL_ENV)
    {
      debug!(value = %base_url, "base url from environment");
      cfg.map.insert(
        "api.base_url".to_string(),
        base_url
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn api_base_url(
    &self
  ) -> Option<String> {
    self.get("api.base_url")
  }

  pub fn gate_options(
    &self
  ) -> anyhow::Result<GateOptions> {
    let min_busy_ms = match self
      .map
      .get("gate.min_busy_ms")
    {
      | Some(raw) => {
        raw.trim().parse::<u64>().map_err(
          |err| {
            anyhow!(
              "invalid gate.min_busy_ms \
               '{raw}': {err}"
            )
          }
        )?
      }
      | None => {
        DEFAULT_MIN_BUSY_DURATION
          .as_millis() as u64
      }
    };

    Ok(
      GateOptions::default()
        .min_busy_duration(
          Duration::from_millis(
            min_busy_ms
          )
        )
        .blocking(
          self
            .get_bool("gate.blocking")
            .unwrap_or(true)
        )
    )
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    for (key, value) in
      parse_rc(&text).with_context(
        || {
          format!(
            "in {}",
            path.display()
          )
        }
      )?
    {
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    self.loaded_file = Some(path);
    Ok(())
  }
}

/// `key = value` pairs, one per line; `#` starts a comment.
fn parse_rc(
  text: &str
) -> anyhow::Result<Vec<(String, String)>>
{
  text
    .lines()
    .enumerate()
    .filter_map(|(idx, raw)| {
      let line = raw
        .split_once('#')
        .map_or(raw, |(before, _)| before)
        .trim();
      (!line.is_empty())
        .then_some((idx + 1, line))
    })
    .map(
      |(line_num, line)|
       -> anyhow::Result<(
        String,
        String
      )> {
      let (k, v) =
        line.split_once('=').ok_or_else(
          || {
            anyhow!(
              "line {line_num}: expected \
               key = value, got '{line}'"
            )
          }
        )?;
      Ok((
        k.trim().to_string(),
        v.trim().to_string()
      ))
    })
    .collect()
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
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

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       ~/.tickoffrc"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".tickoffrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".tickoff"))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
