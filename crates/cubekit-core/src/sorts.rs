use std::fmt;
use std::str::FromStr;

use cubekit_shared::SaveSortsRequest;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::CubeApi;
use crate::error::CubeError;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Artist,
    Cmc,
    ColorCategory,
    ColorCategoryFull,
    ColorCount,
    ColorIdentity,
    Color,
    CubeCount,
    DateAdded,
    Elo,
    Finish,
    Guild,
    Legality,
    Loyalty,
    ManaValue,
    ManaValueFull,
    PickCount,
    Power,
    PriceUsd,
    PriceEur,
    Rarity,
    Set,
    ShardWedge,
    Status,
    Subtype,
    Supertype,
    Tags,
    Toughness,
    Type,
    TypesMulticolor,
    Unsorted,
}

impl SortKey {
    pub const ALL: [SortKey; 31] = [
        SortKey::Artist,
        SortKey::Cmc,
        SortKey::ColorCategory,
        SortKey::ColorCategoryFull,
        SortKey::ColorCount,
        SortKey::ColorIdentity,
        SortKey::Color,
        SortKey::CubeCount,
        SortKey::DateAdded,
        SortKey::Elo,
        SortKey::Finish,
        SortKey::Guild,
        SortKey::Legality,
        SortKey::Loyalty,
        SortKey::ManaValue,
        SortKey::ManaValueFull,
        SortKey::PickCount,
        SortKey::Power,
        SortKey::PriceUsd,
        SortKey::PriceEur,
        SortKey::Rarity,
        SortKey::Set,
        SortKey::ShardWedge,
        SortKey::Status,
        SortKey::Subtype,
        SortKey::Supertype,
        SortKey::Tags,
        SortKey::Toughness,
        SortKey::Type,
        SortKey::TypesMulticolor,
        SortKey::Unsorted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Artist => "Artist",
            SortKey::Cmc => "CMC",
            SortKey::ColorCategory => "Color Category",
            SortKey::ColorCategoryFull => "Color Category Full",
            SortKey::ColorCount => "Color Count",
            SortKey::ColorIdentity => "Color Identity",
            SortKey::Color => "Color",
            SortKey::CubeCount => "Cube Count",
            SortKey::DateAdded => "Date Added",
            SortKey::Elo => "Elo",
            SortKey::Finish => "Finish",
            SortKey::Guild => "Guild",
            SortKey::Legality => "Legality",
            SortKey::Loyalty => "Loyalty",
            SortKey::ManaValue => "Mana Value",
            SortKey::ManaValueFull => "Mana Value Full",
            SortKey::PickCount => "Pick Count",
            SortKey::Power => "Power",
            SortKey::PriceUsd => "Price USD",
            SortKey::PriceEur => "Price EUR",
            SortKey::Rarity => "Rarity",
            SortKey::Set => "Set",
            SortKey::ShardWedge => "Shard / Wedge",
            SortKey::Status => "Status",
            SortKey::Subtype => "Subtype",
            SortKey::Supertype => "Supertype",
            SortKey::Tags => "Tags",
            SortKey::Toughness => "Toughness",
            SortKey::Type => "Type",
            SortKey::TypesMulticolor => "Types-Multicolor",
            SortKey::Unsorted => "Unsorted",
        }
    }
}

/// Orderings allowed in the last slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedSort {
    Alphabetical,
    ManaValue,
    Price,
    Elo,
    ReleaseDate,
    CubeCount,
    PickCount,
    CollectorNumber,
    CreatureNonCreature,
    DateAdded,
}

impl OrderedSort {
    pub const ALL: [OrderedSort; 10] = [
        OrderedSort::Alphabetical,
        OrderedSort::ManaValue,
        OrderedSort::Price,
        OrderedSort::Elo,
        OrderedSort::ReleaseDate,
        OrderedSort::CubeCount,
        OrderedSort::PickCount,
        OrderedSort::CollectorNumber,
        OrderedSort::CreatureNonCreature,
        OrderedSort::DateAdded,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OrderedSort::Alphabetical => "Alphabetical",
            OrderedSort::ManaValue => "Mana Value",
            OrderedSort::Price => "Price",
            OrderedSort::Elo => "Elo",
            OrderedSort::ReleaseDate => "Release Date",
            OrderedSort::CubeCount => "Cube Count",
            OrderedSort::PickCount => "Pick Count",
            OrderedSort::CollectorNumber => "Collector number",
            OrderedSort::CreatureNonCreature => "Creature/Non-Creature",
            OrderedSort::DateAdded => "Date Added",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for OrderedSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortKey {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|key| key.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CubeError::InvalidValue(format!("unknown sort: {s}")))
    }
}

impl FromStr for OrderedSort {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderedSort::ALL
            .into_iter()
            .find(|key| key.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CubeError::InvalidValue(format!("unknown ordered sort: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortSlot {
    Primary,
    Secondary,
    Tertiary,
    Quaternary,
}

impl SortSlot {
    pub const ALL: [SortSlot; 4] = [
        SortSlot::Primary,
        SortSlot::Secondary,
        SortSlot::Tertiary,
        SortSlot::Quaternary,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SortSlot::Primary => "primary",
            SortSlot::Secondary => "secondary",
            SortSlot::Tertiary => "tertiary",
            SortSlot::Quaternary => "quaternary",
        }
    }
}

impl FromStr for SortSlot {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "1" => Ok(SortSlot::Primary),
            "secondary" | "2" => Ok(SortSlot::Secondary),
            "tertiary" | "3" => Ok(SortSlot::Tertiary),
            "quaternary" | "4" => Ok(SortSlot::Quaternary),
            other => Err(CubeError::InvalidValue(format!("unknown sort slot: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    pub primary: SortKey,
    pub secondary: SortKey,
    pub tertiary: SortKey,
    pub quaternary: OrderedSort,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            primary: SortKey::ColorCategory,
            secondary: SortKey::TypesMulticolor,
            tertiary: SortKey::ManaValue,
            quaternary: OrderedSort::Alphabetical,
        }
    }
}

impl SortConfig {
    /// The cube's stored defaults, slot by slot, falling back to the
    /// built-in default wherever the cube has nothing usable.
    pub fn effective_defaults(stored: &[String]) -> Self {
        let builtin = SortConfig::default();
        let slot = |index: usize| stored.get(index).map(String::as_str).filter(|s| !s.is_empty());

        let key = |index: usize, fallback: SortKey| match slot(index) {
            Some(label) => label.parse().unwrap_or_else(|_| {
                warn!(label, index, "ignoring unknown stored sort");
                fallback
            }),
            None => fallback,
        };

        let quaternary = match slot(3) {
            Some(label) => label.parse().unwrap_or_else(|_| {
                warn!(label, "ignoring unknown stored ordered sort");
                builtin.quaternary
            }),
            None => builtin.quaternary,
        };

        Self {
            primary: key(0, builtin.primary),
            secondary: key(1, builtin.secondary),
            tertiary: key(2, builtin.tertiary),
            quaternary,
        }
    }

    pub fn labels(&self) -> Vec<String> {
        vec![
            self.primary.label().to_string(),
            self.secondary.label().to_string(),
            self.tertiary.label().to_string(),
            self.quaternary.label().to_string(),
        ]
    }

    pub fn label_of(&self, slot: SortSlot) -> &'static str {
        match slot {
            SortSlot::Primary => self.primary.label(),
            SortSlot::Secondary => self.secondary.label(),
            SortSlot::Tertiary => self.tertiary.label(),
            SortSlot::Quaternary => self.quaternary.label(),
        }
    }

    pub fn set(&mut self, slot: SortSlot, value: &str) -> Result<(), CubeError> {
        match slot {
            SortSlot::Primary => self.primary = value.parse()?,
            SortSlot::Secondary => self.secondary = value.parse()?,
            SortSlot::Tertiary => self.tertiary = value.parse()?,
            SortSlot::Quaternary => self.quaternary = value.parse()?,
        }
        Ok(())
    }
}

/// Local sort choices that outlive a reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDraft {
    pub sorts: Vec<String>,
    pub show_unsorted: bool,
}

#[derive(Debug, Clone)]
pub struct SortPanel {
    defaults: SortConfig,
    current: SortConfig,
    saved_show_unsorted: bool,
    show_unsorted: bool,
}

impl SortPanel {
    pub fn new(session: &Session) -> Self {
        let defaults = SortConfig::effective_defaults(&session.cube.default_sorts);
        Self {
            defaults,
            current: defaults,
            saved_show_unsorted: session.cube.show_unsorted,
            show_unsorted: session.cube.show_unsorted,
        }
    }

    /// Reapplies a stored draft; unknown labels are skipped.
    pub fn restore(&mut self, draft: &SortDraft) {
        for (slot, label) in SortSlot::ALL.into_iter().zip(&draft.sorts) {
            if let Err(err) = self.current.set(slot, label) {
                warn!(%err, slot = slot.label(), "dropping stored sort draft value");
            }
        }
        self.show_unsorted = draft.show_unsorted;
    }

    pub fn draft(&self) -> SortDraft {
        SortDraft {
            sorts: self.current.labels(),
            show_unsorted: self.show_unsorted,
        }
    }

    pub fn current(&self) -> &SortConfig {
        &self.current
    }

    pub fn defaults(&self) -> &SortConfig {
        &self.defaults
    }

    pub fn show_unsorted(&self) -> bool {
        self.show_unsorted
    }

    pub fn set_sort(&mut self, slot: SortSlot, value: &str) -> Result<(), CubeError> {
        self.current.set(slot, value)
    }

    pub fn set_show_unsorted(&mut self, show: bool) {
        self.show_unsorted = show;
    }

    /// True when any slot differs from its effective default. Gates both
    /// reset and save.
    pub fn sorts_modified(&self) -> bool {
        self.current != self.defaults
    }

    /// Slots or the unsorted toggle differ from what the server has. Decides
    /// whether a local draft is worth keeping, not whether save is enabled.
    pub fn is_dirty(&self) -> bool {
        self.sorts_modified() || self.show_unsorted != self.saved_show_unsorted
    }

    /// The unsorted toggle alone never enables save; it rides along with a
    /// slot change.
    pub fn can_save(&self, session: &Session) -> bool {
        session.can_edit && self.sorts_modified()
    }

    /// Local only; the server keeps its defaults.
    pub fn reset_sorts(&mut self) {
        self.current = self.defaults;
    }

    /// Stores the current slots as the cube's defaults. Returns false when
    /// there was nothing to save.
    #[instrument(skip(self, session, api), fields(cube_id = %session.cube_id()))]
    pub fn save_sorts(&mut self, session: &Session, api: &dyn CubeApi) -> Result<bool, CubeError> {
        if !session.can_edit {
            return Err(CubeError::ReadOnly);
        }
        if !self.can_save(session) {
            return Ok(false);
        }

        let request = SaveSortsRequest {
            sorts: self.current.labels(),
            show_unsorted: self.show_unsorted,
        };
        api.save_sorts(session.cube_id(), &request)?;

        self.defaults = self.current;
        self.saved_show_unsorted = self.show_unsorted;
        info!(sorts = ?request.sorts, "saved default sorts");
        Ok(true)
    }
}
