//! Pending change list.
//!
//! Edits are kept as an ordered command log per board and replayed against
//! the committed board to derive what the editor shows. Indices always refer
//! to the committed board and are never renumbered while edits accumulate.

use cubekit_shared::{Board, BoardsDto, Card, ChangeOpDto, ChangesDto};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::CubeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PendingOp {
    Add { card: Card },
    Remove { index: usize },
    Swap { index: usize, card: Card },
}

impl PendingOp {
    /// Committed index this operation takes out of the board, if any.
    pub fn target_index(&self) -> Option<usize> {
        match self {
            PendingOp::Add { .. } => None,
            PendingOp::Remove { index } | PendingOp::Swap { index, .. } => Some(*index),
        }
    }

    pub fn to_wire(&self) -> ChangeOpDto {
        match self {
            PendingOp::Add { card } => ChangeOpDto::Add {
                card: card.reference.clone(),
            },
            PendingOp::Remove { index } => ChangeOpDto::Remove { index: *index },
            PendingOp::Swap { index, card } => ChangeOpDto::Swap {
                index: *index,
                card: card.reference.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMarker {
    Added,
    Removed,
    SwappedOut,
    SwappedIn,
}

/// One row of the derived board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    /// Position in the committed board; `None` for cards that only exist as
    /// pending additions.
    pub index: Option<usize>,
    pub card: Card,
    pub marked_for_delete: bool,
    pub pending: Option<PendingMarker>,
}

impl BoardEntry {
    pub fn name(&self) -> Option<&str> {
        self.card.name()
    }

    pub fn is_live_committed(&self) -> bool {
        !self.marked_for_delete && self.index.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    mainboard: Vec<PendingOp>,
    #[serde(default)]
    maybeboard: Vec<PendingOp>,
}

impl ChangeSet {
    pub fn ops(&self, board: Board) -> &[PendingOp] {
        match board {
            Board::Mainboard => &self.mainboard,
            Board::Maybeboard => &self.maybeboard,
        }
    }

    fn ops_mut(&mut self, board: Board) -> &mut Vec<PendingOp> {
        match board {
            Board::Mainboard => &mut self.mainboard,
            Board::Maybeboard => &mut self.maybeboard,
        }
    }

    pub fn len(&self) -> usize {
        self.mainboard.len() + self.maybeboard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mainboard.is_empty() && self.maybeboard.is_empty()
    }

    /// Duplicates are allowed; a cube may hold several copies of a card.
    #[instrument(skip(self, card), fields(card_id = %card.reference.card_id))]
    pub fn add_card(&mut self, card: Card, board: Board) {
        self.ops_mut(board).push(PendingOp::Add { card });
        debug!(pending = self.len(), "queued add");
    }

    #[instrument(skip(self, base))]
    pub fn remove_card(
        &mut self,
        base: &BoardsDto,
        index: usize,
        board: Board,
    ) -> Result<(), CubeError> {
        self.ensure_live(base, index, board)?;
        self.ops_mut(board).push(PendingOp::Remove { index });
        debug!(pending = self.len(), "queued remove");
        Ok(())
    }

    /// Removal and replacement are recorded as one operation so they are
    /// reverted together.
    #[instrument(skip(self, base, card), fields(card_id = %card.reference.card_id))]
    pub fn swap_card(
        &mut self,
        base: &BoardsDto,
        index: usize,
        card: Card,
        board: Board,
    ) -> Result<(), CubeError> {
        self.ensure_live(base, index, board)?;
        self.ops_mut(board).push(PendingOp::Swap { index, card });
        debug!(pending = self.len(), "queued swap");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn discard_all_changes(&mut self) {
        let dropped = self.len();
        self.mainboard.clear();
        self.maybeboard.clear();
        debug!(dropped, "discarded pending changes");
    }

    /// Drops the operation at `position` in `board`'s log.
    pub fn revert(&mut self, board: Board, position: usize) -> Option<PendingOp> {
        let ops = self.ops_mut(board);
        (position < ops.len()).then(|| ops.remove(position))
    }

    pub fn is_marked_for_delete(&self, board: Board, index: usize) -> bool {
        self.ops(board)
            .iter()
            .any(|op| op.target_index() == Some(index))
    }

    fn ensure_live(&self, base: &BoardsDto, index: usize, board: Board) -> Result<(), CubeError> {
        if index >= base.board(board).len() || self.is_marked_for_delete(board, index) {
            return Err(CubeError::no_live_entry(index, board));
        }
        Ok(())
    }

    /// Replays the log for `board` over the committed cards.
    pub fn changed_cards(&self, base: &BoardsDto, board: Board) -> Vec<BoardEntry> {
        let mut entries: Vec<BoardEntry> = base
            .board(board)
            .iter()
            .enumerate()
            .map(|(index, card)| BoardEntry {
                index: Some(index),
                card: card.clone(),
                marked_for_delete: false,
                pending: None,
            })
            .collect();

        for op in self.ops(board) {
            match op {
                PendingOp::Add { card } => entries.push(BoardEntry {
                    index: None,
                    card: card.clone(),
                    marked_for_delete: false,
                    pending: Some(PendingMarker::Added),
                }),
                PendingOp::Remove { index } => {
                    if let Some(entry) = entries.get_mut(*index) {
                        entry.marked_for_delete = true;
                        entry.pending = Some(PendingMarker::Removed);
                    }
                }
                PendingOp::Swap { index, card } => {
                    if let Some(entry) = entries.get_mut(*index) {
                        entry.marked_for_delete = true;
                        entry.pending = Some(PendingMarker::SwappedOut);
                    }
                    entries.push(BoardEntry {
                        index: None,
                        card: card.clone(),
                        marked_for_delete: false,
                        pending: Some(PendingMarker::SwappedIn),
                    });
                }
            }
        }

        entries
    }

    /// Committed index of the card named `name` that a remove should target.
    ///
    /// Names compare case-insensitively and the last live match wins, so the
    /// most recently listed copy is the one removed.
    pub fn find_removal_index(&self, base: &BoardsDto, board: Board, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        let mut found = None;
        for entry in self.changed_cards(base, board) {
            if entry.is_live_committed()
                && entry.name().is_some_and(|n| n.to_lowercase() == needle)
            {
                found = entry.index;
            }
        }
        found
    }

    pub fn to_wire(&self) -> ChangesDto {
        ChangesDto {
            mainboard: self.mainboard.iter().map(PendingOp::to_wire).collect(),
            maybeboard: self.maybeboard.iter().map(PendingOp::to_wire).collect(),
        }
    }
}
