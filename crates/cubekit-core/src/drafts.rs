//! Durable per-cube drafts.
//!
//! A single JSON object keyed like browser local storage
//! (`{cube_id}-blogpost`, ...). Entries never expire; they are only cleared by
//! a commit or an explicit discard.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use cubekit_shared::TagColorEntry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::changes::ChangeSet;
use crate::commit::{BlogDraft, CommitPipeline};
use crate::editor::{ChangeEditor, EditorPrefs};
use crate::sorts::{SortDraft, SortPanel};
use crate::tag_colors::TagColorPanel;

#[derive(Debug)]
pub struct DraftStore {
    pub data_dir: PathBuf,
    pub drafts_path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl DraftStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let drafts_path = data_dir.join("drafts.json");
        let entries = if drafts_path.exists() {
            let raw = fs::read_to_string(&drafts_path)
                .with_context(|| format!("failed reading {}", drafts_path.display()))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("failed parsing {}", drafts_path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        info!(
            data_dir = %data_dir.display(),
            drafts = %drafts_path.display(),
            keys = entries.len(),
            "opened draft store"
        );

        Ok(Self {
            data_dir,
            drafts_path,
            entries,
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(key, error = %err, "ignoring unreadable draft entry");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> anyhow::Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("failed to serialize draft {key}"))?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    #[tracing::instrument(skip(self))]
    pub fn save(&self) -> anyhow::Result<()> {
        debug!(file = %self.drafts_path.display(), keys = self.entries.len(), "saving drafts atomically");

        let dir = self.drafts_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string_pretty(&self.entries)?;
        writeln!(temp, "{serialized}")?;
        temp.flush()?;

        temp.persist(&self.drafts_path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.drafts_path.display(), err))?;
        Ok(())
    }
}

/// Draft keys for one cube.
#[derive(Debug, Clone)]
pub struct CubeKeys {
    cube_id: String,
}

impl CubeKeys {
    pub fn new(cube_id: &str) -> Self {
        Self {
            cube_id: cube_id.to_string(),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.cube_id)
    }

    pub fn blog_post(&self) -> String {
        self.key("blogpost")
    }

    pub fn blog_title(&self) -> String {
        self.key("blogtitle")
    }

    pub fn use_maybeboard(&self) -> String {
        self.key("useMaybeboard")
    }

    pub fn specify_edition(&self) -> String {
        self.key("specifyEdition")
    }

    pub fn show_maybeboard(&self) -> String {
        self.key("showMaybeboard")
    }

    pub fn use_blog(&self) -> String {
        self.key("useBlog")
    }

    pub fn changes(&self) -> String {
        self.key("changes")
    }

    pub fn sorts(&self) -> String {
        self.key("sorts")
    }

    pub fn tag_colors(&self) -> String {
        self.key("tagcolors")
    }
}

impl DraftStore {
    pub fn load_editor(&self, keys: &CubeKeys) -> ChangeEditor {
        let changes: ChangeSet = self.get(&keys.changes()).unwrap_or_default();
        let prefs = EditorPrefs {
            active_board: self.get(&keys.use_maybeboard()).unwrap_or_default(),
            show_maybeboard: self.get(&keys.show_maybeboard()).unwrap_or(false),
            specify_edition: self.get(&keys.specify_edition()).unwrap_or(false),
        };
        ChangeEditor::new(changes, prefs)
    }

    pub fn store_editor(&mut self, keys: &CubeKeys, editor: &ChangeEditor) -> anyhow::Result<()> {
        if editor.changes().is_empty() {
            self.remove(&keys.changes());
        } else {
            self.set(&keys.changes(), editor.changes())?;
        }
        let prefs = editor.prefs();
        self.set(&keys.use_maybeboard(), &prefs.active_board)?;
        self.set(&keys.show_maybeboard(), &prefs.show_maybeboard)?;
        self.set(&keys.specify_edition(), &prefs.specify_edition)?;
        Ok(())
    }

    pub fn load_pipeline(&self, keys: &CubeKeys) -> CommitPipeline {
        let defaults = BlogDraft::default();
        CommitPipeline::new(BlogDraft {
            title: self.get(&keys.blog_title()).unwrap_or(defaults.title),
            body: self.get(&keys.blog_post()).unwrap_or(defaults.body),
            use_blog: self.get(&keys.use_blog()).unwrap_or(defaults.use_blog),
        })
    }

    pub fn store_pipeline(&mut self, keys: &CubeKeys, pipeline: &CommitPipeline) -> anyhow::Result<()> {
        let blog = pipeline.blog();
        self.set(&keys.blog_title(), &blog.title)?;
        self.set(&keys.blog_post(), &blog.body)?;
        self.set(&keys.use_blog(), &blog.use_blog)?;
        Ok(())
    }

    pub fn restore_sorts(&self, keys: &CubeKeys, panel: &mut SortPanel) {
        if let Some(draft) = self.get::<SortDraft>(&keys.sorts()) {
            panel.restore(&draft);
        }
    }

    pub fn store_sorts(&mut self, keys: &CubeKeys, panel: &SortPanel) -> anyhow::Result<()> {
        if panel.is_dirty() {
            self.set(&keys.sorts(), &panel.draft())
        } else {
            self.remove(&keys.sorts());
            Ok(())
        }
    }

    pub fn restore_tag_colors(&self, keys: &CubeKeys, panel: &mut TagColorPanel) {
        if let Some(draft) = self.get::<Vec<TagColorEntry>>(&keys.tag_colors()) {
            panel.restore(draft);
        }
    }

    pub fn store_tag_colors(&mut self, keys: &CubeKeys, panel: &TagColorPanel) -> anyhow::Result<()> {
        if panel.is_dirty() {
            self.set(&keys.tag_colors(), &panel.rows())
        } else {
            self.remove(&keys.tag_colors());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use cubekit_shared::Board;
    use tempfile::tempdir;

    use super::*;
    use crate::changes::tests::card;
    use crate::commit::DEFAULT_BLOG_TITLE;

    #[test]
    fn drafts_survive_reopen() {
        let temp = tempdir().expect("tempdir");
        let keys = CubeKeys::new("abc");

        let mut store = DraftStore::open(temp.path()).expect("open");
        let mut editor = store.load_editor(&keys);
        editor.changes_mut().add_card(card("a", "Opt"), Board::Maybeboard);
        editor.set_active_board(Board::Maybeboard);
        editor.set_specify_edition(true);
        store.store_editor(&keys, &editor).expect("store editor");

        let mut pipeline = store.load_pipeline(&keys);
        assert_eq!(pipeline.blog().title, DEFAULT_BLOG_TITLE);
        pipeline.blog_mut().body = "Draft body".to_string();
        store.store_pipeline(&keys, &pipeline).expect("store pipeline");
        store.save().expect("save");

        let reopened = DraftStore::open(temp.path()).expect("reopen");
        let editor = reopened.load_editor(&keys);
        assert_eq!(editor.changes().ops(Board::Maybeboard).len(), 1);
        assert_eq!(editor.prefs().active_board, Board::Maybeboard);
        assert!(editor.prefs().specify_edition);
        assert_eq!(reopened.load_pipeline(&keys).blog().body, "Draft body");

        let stored: Option<String> = reopened.get("abc-blogpost");
        assert_eq!(stored.as_deref(), Some("Draft body"));
        let board: Option<String> = reopened.get("abc-useMaybeboard");
        assert_eq!(board.as_deref(), Some("maybeboard"));
    }

    #[test]
    fn empty_change_set_clears_its_key() {
        let temp = tempdir().expect("tempdir");
        let keys = CubeKeys::new("abc");
        let mut store = DraftStore::open(temp.path()).expect("open");

        let mut editor = store.load_editor(&keys);
        editor.changes_mut().add_card(card("a", "Opt"), Board::Mainboard);
        store.store_editor(&keys, &editor).expect("store");
        assert!(store.keys().any(|k| k == "abc-changes"));

        editor.discard_all_changes();
        store.store_editor(&keys, &editor).expect("store");
        assert!(!store.keys().any(|k| k == "abc-changes"));
    }

    #[test]
    fn keys_are_scoped_per_cube() {
        let temp = tempdir().expect("tempdir");
        let mut store = DraftStore::open(temp.path()).expect("open");
        store.set("one-blogtitle", &"First").expect("set");

        let other = store.load_pipeline(&CubeKeys::new("two"));
        assert_eq!(other.blog().title, DEFAULT_BLOG_TITLE);
    }

    #[test]
    fn unreadable_entry_falls_back_to_default() {
        let temp = tempdir().expect("tempdir");
        let mut store = DraftStore::open(temp.path()).expect("open");
        store.set("abc-specifyEdition", &"not a bool").expect("set");

        let editor = store.load_editor(&CubeKeys::new("abc"));
        assert!(!editor.prefs().specify_edition);
    }
}
