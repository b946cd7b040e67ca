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

pub const DEFAULT_SERVER_URL: &str =
  "https://cubecobra.com";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    cuberc_override
  ))]
  pub fn load(
    cuberc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::defaults();

    let cuberc = resolve_cuberc_path(
      cuberc_override
    )?;
    if let Some(path) = cuberc {
      info!(cuberc = %path.display(), "loading cuberc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no cuberc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  pub fn defaults() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("server.url", DEFAULT_SERVER_URL),
      ("data.location", "~/.cubekit"),
      ("http.timeout", "30"),
      ("cube.readonly", "off"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    Config {
      map,
      loaded_files: vec![]
    }
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

  pub fn server_url(&self) -> String {
    self
      .get("server.url")
      .filter(|url| !url.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_SERVER_URL.to_string()
      })
  }

  pub fn http_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let raw = self
      .get("http.timeout")
      .unwrap_or_else(|| {
        "30".to_string()
      });
    let secs: u64 =
      raw.trim().parse().map_err(|_| {
        anyhow!(
          "invalid http.timeout: {raw}"
        )
      })?;
    Ok(Duration::from_secs(secs))
  }

  pub fn cube_id(
    &self
  ) -> anyhow::Result<String> {
    self
      .get("cube.id")
      .filter(|id| !id.trim().is_empty())
      .ok_or_else(|| {
        anyhow!(
          "no cube selected; pass \
           --cube or set cube.id"
        )
      })
  }

  pub fn can_edit(&self) -> bool {
    !self
      .get_bool("cube.readonly")
      .unwrap_or(false)
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
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

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = match raw_line
        .split_once('#')
      {
        | Some((before, _)) => before,
        | None => raw_line
      }
      .trim();
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
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
    home_dir()?.join(".cubekit")
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
fn resolve_cuberc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    if path == Path::new("/dev/null") {
      return Ok(None);
    }
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(cuberc_env) =
    std::env::var("CUBERC")
  {
    if cuberc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      cuberc_env
    )));
  }

  let candidate =
    home_dir()?.join(".cuberc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn home_dir() -> anyhow::Result<PathBuf>
{
  dirs::home_dir().ok_or_else(|| {
    anyhow!(
      "cannot determine home \
       directory"
    )
  })
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
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

pub fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn loads_keys_comments_and_includes()
  {
    let temp =
      tempdir().expect("tempdir");
    let included =
      temp.path().join("extra.rc");
    fs::write(
      &included,
      "http.timeout = 5\n"
    )
    .expect("write include");
    let rc = temp.path().join("cuberc");
    fs::write(
      &rc,
      "# cube settings\ncube.id = \
       abc # trailing\ninclude \
       extra.rc\ninclude missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load");
    assert_eq!(
      cfg.get("cube.id").as_deref(),
      Some("abc")
    );
    assert_eq!(
      cfg.http_timeout().expect("timeout"),
      Duration::from_secs(5)
    );
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.server_url(),
      DEFAULT_SERVER_URL
    );
  }

  #[test]
  fn rejects_lines_without_equals() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("cuberc");
    fs::write(&rc, "cube.id abc\n")
      .expect("write rc");
    assert!(
      Config::load(Some(&rc)).is_err()
    );
  }

  #[test]
  fn dev_null_disables_rc_file() {
    let cfg = Config::load(Some(
      Path::new("/dev/null")
    ))
    .expect("load");
    assert!(cfg.loaded_files.is_empty());
    assert!(cfg.can_edit());
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![
      (
        "rc.cube.readonly".to_string(),
        "yes".to_string()
      ),
      (
        "cube.id".to_string(),
        "from-rc".to_string()
      ),
    ]);
    assert!(!cfg.can_edit());
    assert_eq!(
      cfg.cube_id().expect("id"),
      "from-rc"
    );
  }

  #[test]
  fn missing_cube_id_is_an_error() {
    let cfg = Config::defaults();
    assert!(cfg.cube_id().is_err());
  }

  #[test]
  fn bad_timeout_is_reported() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![(
      "http.timeout".to_string(),
      "soon".to_string()
    )]);
    assert!(cfg.http_timeout().is_err());
  }

  #[test]
  fn data_dir_override_is_created() {
    let temp =
      tempdir().expect("tempdir");
    let dir = temp.path().join("nested");
    let cfg = Config::defaults();
    let resolved =
      resolve_data_dir(&cfg, Some(&dir))
        .expect("resolve");
    assert_eq!(resolved, dir);
    assert!(dir.is_dir());
  }
}
