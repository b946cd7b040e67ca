use cubekit_shared::{
    SaveShowTagColorsRequest, SaveTagColorsRequest, TagColor, TagColorEntry,
};
use tracing::{debug, error, info, instrument};

use crate::alerts::Alerts;
use crate::api::CubeApi;
use crate::error::CubeError;
use crate::session::Session;

/// Color for a card carrying `tags`: the first entry in priority order that
/// the card has and that has a color set.
pub fn color_for(entries: &[TagColorEntry], tags: &[String]) -> Option<TagColor> {
    entries
        .iter()
        .filter(|entry| tags.iter().any(|tag| *tag == entry.tag))
        .find_map(|entry| entry.color)
}

#[derive(Debug, Clone)]
pub struct TagColorPanel {
    committed: Vec<TagColorEntry>,
    draft: Vec<TagColorEntry>,
    can_edit: bool,
    loading: bool,
    open: bool,
    show_tag_colors: bool,
}

impl TagColorPanel {
    /// Starts from the cube's saved list; tags used on cards but missing from
    /// it are appended uncolored.
    pub fn new(session: &Session) -> Self {
        let mut committed = session.cube.tag_colors.clone();
        let card_tags = session
            .cube
            .cards
            .mainboard
            .iter()
            .chain(&session.cube.cards.maybeboard)
            .flat_map(|card| card.tags.iter());
        for tag in card_tags {
            if !committed.iter().any(|entry| entry.tag == *tag) {
                committed.push(TagColorEntry {
                    tag: tag.clone(),
                    color: None,
                });
            }
        }

        Self {
            draft: committed.clone(),
            committed,
            can_edit: session.can_edit,
            loading: false,
            open: true,
            show_tag_colors: session.cube.show_tag_colors,
        }
    }

    pub fn rows(&self) -> &[TagColorEntry] {
        &self.draft
    }

    pub fn committed(&self) -> &[TagColorEntry] {
        &self.committed
    }

    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn show_tag_colors(&self) -> bool {
        self.show_tag_colors
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.committed
    }

    /// Replaces the draft with a previously stored one.
    pub fn restore(&mut self, draft: Vec<TagColorEntry>) {
        self.draft = draft;
    }

    pub fn discard(&mut self) {
        self.draft = self.committed.clone();
    }

    fn ensure_editable(&self) -> Result<(), CubeError> {
        if self.can_edit {
            Ok(())
        } else {
            Err(CubeError::ReadOnly)
        }
    }

    /// Moves the entry at `from` to `to`; everything else keeps its relative
    /// order.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), CubeError> {
        self.ensure_editable()?;
        let len = self.draft.len();
        if from >= len || to >= len {
            return Err(CubeError::InvalidValue(format!(
                "position out of range (have {len} tags)"
            )));
        }
        let entry = self.draft.remove(from);
        self.draft.insert(to, entry);
        debug!(from, to, "moved tag color entry");
        Ok(())
    }

    /// Drag-and-drop form: drop `active` where `over` currently sits.
    pub fn move_tag(&mut self, active: &str, over: &str) -> Result<(), CubeError> {
        if active == over {
            return Ok(());
        }
        let position = |tag: &str| {
            self.draft
                .iter()
                .position(|entry| entry.tag == tag)
                .ok_or_else(|| CubeError::NotFound(format!("No tag named \"{tag}\".")))
        };
        let from = position(active)?;
        let to = position(over)?;
        self.move_entry(from, to)
    }

    /// Upsert by tag: an existing tag changes color in place, a new tag is
    /// appended.
    pub fn on_change(&mut self, tag: &str, color: Option<TagColor>) -> Result<(), CubeError> {
        self.ensure_editable()?;
        match self.draft.iter_mut().find(|entry| entry.tag == tag) {
            Some(entry) => entry.color = color,
            None => self.draft.push(TagColorEntry {
                tag: tag.to_string(),
                color,
            }),
        }
        Ok(())
    }

    /// Persists the whole draft, order included. On failure the draft is
    /// kept, the panel stays open and an alert is raised.
    #[instrument(skip(self, session, api, alerts), fields(count = self.draft.len()))]
    pub fn save(
        &mut self,
        session: &Session,
        api: &dyn CubeApi,
        alerts: &mut Alerts,
    ) -> Result<(), CubeError> {
        self.ensure_editable()?;
        self.loading = true;
        let request = SaveTagColorsRequest {
            tag_colors: self.draft.clone(),
        };
        let result = api.save_tag_colors(session.cube_id(), &request);
        self.loading = false;

        match result {
            Ok(()) => {
                self.committed = self.draft.clone();
                self.open = false;
                info!("saved tag colors");
                Ok(())
            }
            Err(err) => {
                error!(%err, "saving tag colors failed");
                alerts.push_error(&err);
                Err(err)
            }
        }
    }

    /// Display preference; available without edit access.
    #[instrument(skip(self, api))]
    pub fn set_show_tag_colors(&mut self, api: &dyn CubeApi, show: bool) -> Result<(), CubeError> {
        api.save_show_tag_colors(&SaveShowTagColorsRequest {
            show_tag_colors: show,
        })?;
        self.show_tag_colors = show;
        Ok(())
    }
}
