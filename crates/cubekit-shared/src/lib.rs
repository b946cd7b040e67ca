use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Board {
  #[default]
  Mainboard,
  Maybeboard
}

impl Board {
  pub const ALL: [Board; 2] = [
    Board::Mainboard,
    Board::Maybeboard
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | Board::Mainboard => "mainboard",
      | Board::Maybeboard => {
        "maybeboard"
      }
    }
  }
}

impl fmt::Display for Board {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Board {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "mainboard" | "main" => {
        Ok(Board::Mainboard)
      }
      | "maybeboard" | "maybe" => {
        Ok(Board::Maybeboard)
      }
      | other => Err(format!(
        "unknown board: {other}"
      ))
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub enum CardStatus {
  #[serde(rename = "Not Owned")]
  NotOwned,
  Ordered,
  #[default]
  Owned,
  #[serde(rename = "Premium Owned")]
  PremiumOwned,
  Proxied,
  Borrowed
}

impl CardStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      | CardStatus::NotOwned => {
        "Not Owned"
      }
      | CardStatus::Ordered => "Ordered",
      | CardStatus::Owned => "Owned",
      | CardStatus::PremiumOwned => {
        "Premium Owned"
      }
      | CardStatus::Proxied => "Proxied",
      | CardStatus::Borrowed => {
        "Borrowed"
      }
    }
  }
}

impl fmt::Display for CardStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One physical card entry on a board.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct CardReference {
  #[serde(rename = "cardID")]
  pub card_id:    String,
  #[serde(rename = "addedTmsp")]
  pub added_tmsp: String,
  #[serde(default)]
  pub status:     CardStatus
}

/// Canonical card data as returned by
/// the name resolver. Fields this crate
/// does not interpret are kept in
/// `extra`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct CardDetails {
  pub scryfall_id: String,
  pub name:        String,
  #[serde(flatten)]
  pub extra:
    BTreeMap<String, serde_json::Value>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Card {
  #[serde(flatten)]
  pub reference: CardReference,
  #[serde(default)]
  pub details:   Option<CardDetails>,
  #[serde(default)]
  pub tags:      Vec<String>
}

impl Card {
  pub fn name(&self) -> Option<&str> {
    self
      .details
      .as_ref()
      .map(|details| {
        details.name.as_str()
      })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct BoardsDto {
  #[serde(default)]
  pub mainboard:  Vec<Card>,
  #[serde(default)]
  pub maybeboard: Vec<Card>
}

impl BoardsDto {
  pub fn board(
    &self,
    board: Board
  ) -> &[Card] {
    match board {
      | Board::Mainboard => {
        &self.mainboard
      }
      | Board::Maybeboard => {
        &self.maybeboard
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum TagColor {
  Red,
  Brown,
  Orange,
  Yellow,
  Green,
  Turquoise,
  Blue,
  Purple,
  Violet,
  Pink
}

impl TagColor {
  pub const ALL: [TagColor; 10] = [
    TagColor::Red,
    TagColor::Brown,
    TagColor::Orange,
    TagColor::Yellow,
    TagColor::Green,
    TagColor::Turquoise,
    TagColor::Blue,
    TagColor::Purple,
    TagColor::Violet,
    TagColor::Pink
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | TagColor::Red => "red",
      | TagColor::Brown => "brown",
      | TagColor::Orange => "orange",
      | TagColor::Yellow => "yellow",
      | TagColor::Green => "green",
      | TagColor::Turquoise => {
        "turquoise"
      }
      | TagColor::Blue => "blue",
      | TagColor::Purple => "purple",
      | TagColor::Violet => "violet",
      | TagColor::Pink => "pink"
    }
  }
}

impl fmt::Display for TagColor {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TagColor {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let needle =
      s.trim().to_ascii_lowercase();
    TagColor::ALL
      .into_iter()
      .find(|color| {
        color.as_str() == needle
      })
      .ok_or_else(|| {
        format!(
          "unknown tag color: {s}"
        )
      })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TagColorEntry {
  pub tag:   String,
  pub color: Option<TagColor>
}

/// Cube record as served by
/// `/cube/api/cubeJSON/{id}`.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct CubeDto {
  pub id:               String,
  #[serde(default)]
  pub name:             String,
  #[serde(
    rename = "defaultPrinting",
    default
  )]
  pub default_printing: String,
  #[serde(
    rename = "defaultStatus",
    default
  )]
  pub default_status:   CardStatus,
  #[serde(
    rename = "defaultSorts",
    default
  )]
  pub default_sorts:    Vec<String>,
  #[serde(
    rename = "showUnsorted",
    default
  )]
  pub show_unsorted:    bool,
  #[serde(
    rename = "tagColors",
    default
  )]
  pub tag_colors: Vec<TagColorEntry>,
  #[serde(
    rename = "showTagColors",
    default
  )]
  pub show_tag_colors:  bool,
  #[serde(default)]
  pub cards:            BoardsDto
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct GetCardRequest {
  pub name:            String,
  pub defaultprinting: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct GetCardResponse {
  pub success: String,
  #[serde(default)]
  pub card:    Option<CardDetails>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SaveTagColorsRequest {
  pub tag_colors: Vec<TagColorEntry>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SaveShowTagColorsRequest {
  pub show_tag_colors: bool
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SaveSortsRequest {
  pub sorts:         Vec<String>,
  #[serde(rename = "showUnsorted")]
  pub show_unsorted: bool
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(
  tag = "op",
  rename_all = "lowercase"
)]
pub enum ChangeOpDto {
  Add {
    card: CardReference
  },
  Remove {
    index: usize
  },
  Swap {
    index: usize,
    card:  CardReference
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct ChangesDto {
  #[serde(default)]
  pub mainboard:  Vec<ChangeOpDto>,
  #[serde(default)]
  pub maybeboard: Vec<ChangeOpDto>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct CommitRequest {
  pub id:       String,
  pub changes:  ChangesDto,
  pub title:    String,
  pub blog:     String,
  #[serde(rename = "useBlog")]
  pub use_blog: bool
}

/// Generic `{success, message}`
/// envelope used by the save endpoints.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ApiAck {
  #[serde(default)]
  pub success: Option<String>,
  #[serde(default)]
  pub message: Option<String>
}

impl ApiAck {
  pub fn is_success(&self) -> bool {
    self.success.as_deref()
      != Some("false")
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct CardNamesResponse {
  #[serde(default)]
  pub success:   Option<String>,
  #[serde(default)]
  pub cardnames: Vec<String>
}
