//! Add / remove / replace editing over the pending change list.
//!
//! Card resolution is split into a `begin_*` step that issues a
//! [`CardLookup`] and [`ChangeEditor::complete_lookup`] that applies the
//! resolver's answer. Editing an input between the two makes the answer stale
//! and it is dropped.

use chrono::Utc;
use cubekit_shared::{Board, Card, CardDetails, CardReference};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::alerts::Alerts;
use crate::api::{CardResolver, NameSource};
use crate::changes::ChangeSet;
use crate::error::CubeError;
use crate::session::Session;
use crate::token::{RequestToken, TokenGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupIntent {
    Add { board: Board },
    Swap { index: usize, board: Board },
}

/// An outstanding card-name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLookup {
    pub token: RequestToken,
    pub name: String,
    pub intent: LookupIntent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveStep {
    /// Nothing typed; nothing happened.
    Idle,
    Removed { index: usize },
    Failed,
    /// A replacement must be resolved before the swap is recorded.
    NeedsCard(CardLookup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Applied,
    Failed,
    Stale,
}

/// Editor toggles that survive reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorPrefs {
    pub active_board: Board,
    pub show_maybeboard: bool,
    pub specify_edition: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeEditor {
    add_value: String,
    remove_value: String,
    add_gate: TokenGate,
    remove_gate: TokenGate,
    changes: ChangeSet,
    alerts: Alerts,
    prefs: EditorPrefs,
}

impl ChangeEditor {
    pub fn new(changes: ChangeSet, prefs: EditorPrefs) -> Self {
        Self {
            changes,
            prefs,
            ..Self::default()
        }
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn changes_mut(&mut self) -> &mut ChangeSet {
        &mut self.changes
    }

    pub fn alerts(&self) -> &Alerts {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut Alerts {
        &mut self.alerts
    }

    pub fn prefs(&self) -> &EditorPrefs {
        &self.prefs
    }

    pub fn add_value(&self) -> &str {
        &self.add_value
    }

    pub fn remove_value(&self) -> &str {
        &self.remove_value
    }

    /// The maybeboard is only editable while it is shown.
    pub fn board_to_edit(&self) -> Board {
        if self.prefs.show_maybeboard {
            self.prefs.active_board
        } else {
            Board::Mainboard
        }
    }

    pub fn set_active_board(&mut self, board: Board) {
        self.prefs.active_board = board;
    }

    pub fn toggle_show_maybeboard(&mut self) {
        self.prefs.show_maybeboard = !self.prefs.show_maybeboard;
    }

    pub fn set_show_maybeboard(&mut self, show: bool) {
        self.prefs.show_maybeboard = show;
    }

    pub fn set_specify_edition(&mut self, specify: bool) {
        self.prefs.specify_edition = specify;
    }

    /// A replacement lookup depends on the add field too, so both gates close.
    pub fn set_add_value(&mut self, value: impl Into<String>) {
        self.add_value = value.into();
        self.add_gate.invalidate();
        self.remove_gate.invalidate();
    }

    pub fn set_remove_value(&mut self, value: impl Into<String>) {
        self.remove_value = value.into();
        self.remove_gate.invalidate();
    }

    pub fn add_source(&self) -> NameSource {
        if self.prefs.specify_edition {
            NameSource::FullNames
        } else {
            NameSource::CardNames
        }
    }

    pub fn remove_source(&self, session: &Session) -> NameSource {
        NameSource::CubeCardNames {
            cube_id: session.cube_id().to_string(),
            board: self.board_to_edit(),
        }
    }

    pub fn begin_add(&mut self) -> Option<CardLookup> {
        if self.add_value.is_empty() {
            return None;
        }
        let lookup = CardLookup {
            token: self.add_gate.issue(),
            name: self.add_value.clone(),
            intent: LookupIntent::Add {
                board: self.board_to_edit(),
            },
        };
        debug!(token = lookup.token.value(), name = %lookup.name, "begin add lookup");
        Some(lookup)
    }

    /// Removes the typed card, or starts a replacement lookup when the add
    /// field is also filled in.
    #[instrument(skip(self, session), fields(name = %self.remove_value))]
    pub fn begin_remove_or_replace(&mut self, session: &Session) -> RemoveStep {
        if self.remove_value.is_empty() {
            return RemoveStep::Idle;
        }

        let board = self.board_to_edit();
        let Some(index) = self
            .changes
            .find_removal_index(session.base(), board, &self.remove_value)
        else {
            let err = CubeError::name_not_on_board(&self.remove_value, board);
            warn!(%err, "remove target not found");
            self.alerts.push_error(&err);
            return RemoveStep::Failed;
        };

        if !self.add_value.is_empty() {
            let lookup = CardLookup {
                token: self.remove_gate.issue(),
                name: self.add_value.clone(),
                intent: LookupIntent::Swap { index, board },
            };
            debug!(token = lookup.token.value(), index, "begin replacement lookup");
            return RemoveStep::NeedsCard(lookup);
        }

        match self.changes.remove_card(session.base(), index, board) {
            Ok(()) => {
                info!(index, %board, "card marked for removal");
                self.add_value.clear();
                self.remove_value.clear();
                RemoveStep::Removed { index }
            }
            Err(err) => {
                self.alerts.push_error(&err);
                RemoveStep::Failed
            }
        }
    }

    /// Applies a resolver answer. Failures become alerts and leave the
    /// inputs and change list untouched so the user can retry.
    #[instrument(skip(self, session, outcome), fields(token = lookup.token.value()))]
    pub fn complete_lookup(
        &mut self,
        session: &Session,
        lookup: CardLookup,
        outcome: Result<CardDetails, CubeError>,
    ) -> LookupOutcome {
        let gate = match lookup.intent {
            LookupIntent::Add { .. } => &mut self.add_gate,
            LookupIntent::Swap { .. } => &mut self.remove_gate,
        };
        if !gate.settle(lookup.token) {
            debug!(name = %lookup.name, "dropping stale lookup result");
            return LookupOutcome::Stale;
        }

        let details = match outcome {
            Ok(details) => details,
            Err(err) => {
                warn!(%err, name = %lookup.name, "card lookup failed");
                self.alerts.push_error(&err);
                return LookupOutcome::Failed;
            }
        };

        let card = new_card(session, details);
        match lookup.intent {
            LookupIntent::Add { board } => {
                info!(card_id = %card.reference.card_id, %board, "card added");
                self.changes.add_card(card, board);
                self.add_value.clear();
            }
            LookupIntent::Swap { index, board } => {
                if let Err(err) = self.changes.swap_card(session.base(), index, card, board) {
                    self.alerts.push_error(&err);
                    return LookupOutcome::Failed;
                }
                info!(index, %board, "card swapped");
                self.add_value.clear();
                self.remove_value.clear();
            }
        }
        LookupOutcome::Applied
    }

    /// Runs an add end to end against `resolver`.
    pub fn handle_add<R: CardResolver + ?Sized>(
        &mut self,
        session: &Session,
        resolver: &R,
    ) -> LookupOutcome {
        let Some(lookup) = self.begin_add() else {
            return LookupOutcome::Failed;
        };
        let outcome = resolver.get_card_for_cube(&lookup.name, session.default_printing());
        self.complete_lookup(session, lookup, outcome)
    }

    /// Runs a remove, or a replace when the add field is filled, end to end.
    pub fn handle_remove_replace<R: CardResolver + ?Sized>(
        &mut self,
        session: &Session,
        resolver: &R,
    ) -> RemoveStep {
        match self.begin_remove_or_replace(session) {
            RemoveStep::NeedsCard(lookup) => {
                let outcome = resolver.get_card_for_cube(&lookup.name, session.default_printing());
                let index = match lookup.intent {
                    LookupIntent::Swap { index, .. } => index,
                    LookupIntent::Add { .. } => return RemoveStep::Failed,
                };
                match self.complete_lookup(session, lookup, outcome) {
                    LookupOutcome::Applied => RemoveStep::Removed { index },
                    LookupOutcome::Failed | LookupOutcome::Stale => RemoveStep::Failed,
                }
            }
            other => other,
        }
    }

    pub fn discard_all_changes(&mut self) {
        self.changes.discard_all_changes();
    }
}

fn new_card(session: &Session, details: CardDetails) -> Card {
    Card {
        reference: CardReference {
            card_id: details.scryfall_id.clone(),
            added_tmsp: Utc::now().timestamp_millis().to_string(),
            status: session.default_status(),
        },
        details: Some(details),
        tags: vec![],
    }
}

#[cfg(test)]
mod tests {
    use cubekit_shared::CardStatus;

    use super::*;
    use crate::changes::PendingOp;
    use crate::changes::tests::boards;
    use crate::testing::{FakeApi, session};

    #[test]
    fn add_resolves_and_clears_input() {
        let session = session(boards(&["Shock"]));
        let api = FakeApi::with_cards(&["Lightning Bolt"]);
        let mut editor = ChangeEditor::default();

        editor.set_add_value("Lightning Bolt");
        assert_eq!(editor.handle_add(&session, &api), LookupOutcome::Applied);

        assert_eq!(editor.add_value(), "");
        let ops = editor.changes().ops(Board::Mainboard);
        assert_eq!(ops.len(), 1);
        let PendingOp::Add { card } = &ops[0] else {
            panic!("expected add, got {:?}", ops[0]);
        };
        assert_eq!(card.reference.card_id, "id-lightning-bolt");
        assert_eq!(card.reference.status, CardStatus::Owned);
    }

    #[test]
    fn unknown_card_alerts_and_keeps_input() {
        let session = session(boards(&["Shock"]));
        let api = FakeApi::with_cards(&[]);
        let mut editor = ChangeEditor::default();

        editor.set_add_value("Not A Card");
        assert_eq!(editor.handle_add(&session, &api), LookupOutcome::Failed);

        assert!(editor.changes().is_empty());
        assert_eq!(editor.add_value(), "Not A Card");
        assert_eq!(
            editor.alerts().last().map(|a| a.message.as_str()),
            Some("Couldn't find card [Not A Card].")
        );
    }

    #[test]
    fn unreachable_server_never_mutates_changes() {
        let session = session(boards(&["Shock"]));
        let api = FakeApi::with_cards(&["Opt"]);
        api.unreachable.set(true);
        let mut editor = ChangeEditor::default();

        editor.set_add_value("Opt");
        assert_eq!(editor.handle_add(&session, &api), LookupOutcome::Failed);
        assert!(editor.changes().is_empty());
        assert_eq!(editor.alerts().len(), 1);
    }

    #[test]
    fn stale_add_result_is_dropped() {
        let session = session(boards(&[]));
        let api = FakeApi::with_cards(&["Opt", "Ponder"]);
        let mut editor = ChangeEditor::default();

        editor.set_add_value("Opt");
        let lookup = editor.begin_add().expect("lookup");
        editor.set_add_value("Ponder");

        let outcome = api.get_card_for_cube(&lookup.name, "recent");
        assert_eq!(
            editor.complete_lookup(&session, lookup, outcome),
            LookupOutcome::Stale
        );
        assert!(editor.changes().is_empty());
        assert_eq!(editor.add_value(), "Ponder");
        assert!(editor.alerts().is_empty());
    }

    #[test]
    fn remove_by_name_hits_last_copy() {
        let session = session(boards(&["Bolt", "Shock", "Bolt"]));
        let api = FakeApi::with_cards(&[]);
        let mut editor = ChangeEditor::default();

        editor.set_remove_value("Bolt");
        assert_eq!(
            editor.handle_remove_replace(&session, &api),
            RemoveStep::Removed { index: 2 }
        );
        assert_eq!(
            editor.changes().ops(Board::Mainboard),
            &[PendingOp::Remove { index: 2 }]
        );
        assert_eq!(editor.remove_value(), "");
        assert_eq!(api.calls.get(), 0);
    }

    #[test]
    fn remove_of_missing_name_alerts() {
        let session = session(boards(&["Bolt"]));
        let api = FakeApi::with_cards(&[]);
        let mut editor = ChangeEditor::default();

        editor.set_remove_value("Shock");
        assert_eq!(editor.handle_remove_replace(&session, &api), RemoveStep::Failed);
        assert!(editor.changes().is_empty());
        assert_eq!(editor.remove_value(), "Shock");
        assert_eq!(
            editor.alerts().last().map(|a| a.message.as_str()),
            Some("Couldn't find a card with name \"Shock\" in \"mainboard\".")
        );
    }

    #[test]
    fn replace_records_single_swap() {
        let session = session(boards(&["Bolt", "Shock"]));
        let api = FakeApi::with_cards(&["Chain Lightning"]);
        let mut editor = ChangeEditor::default();

        editor.set_add_value("Chain Lightning");
        editor.set_remove_value("shock");
        assert_eq!(
            editor.handle_remove_replace(&session, &api),
            RemoveStep::Removed { index: 1 }
        );

        let ops = editor.changes().ops(Board::Mainboard);
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], PendingOp::Swap { index: 1, card } if card.name() == Some("Chain Lightning")));
        assert_eq!(editor.add_value(), "");
        assert_eq!(editor.remove_value(), "");
    }

    #[test]
    fn replacement_lookup_goes_stale_when_add_field_changes() {
        let session = session(boards(&["Bolt"]));
        let api = FakeApi::with_cards(&["Opt"]);
        let mut editor = ChangeEditor::default();

        editor.set_add_value("Opt");
        editor.set_remove_value("Bolt");
        let RemoveStep::NeedsCard(lookup) = editor.begin_remove_or_replace(&session) else {
            panic!("expected replacement lookup");
        };
        editor.set_add_value("");

        let outcome = api.get_card_for_cube(&lookup.name, "recent");
        assert_eq!(
            editor.complete_lookup(&session, lookup, outcome),
            LookupOutcome::Stale
        );
        assert!(editor.changes().is_empty());
    }

    #[test]
    fn maybeboard_edits_need_maybeboard_shown() {
        let session = session(boards(&["Bolt"]));
        let api = FakeApi::with_cards(&["Opt"]);
        let mut editor = ChangeEditor::default();
        editor.set_active_board(Board::Maybeboard);
        assert_eq!(editor.board_to_edit(), Board::Mainboard);

        editor.toggle_show_maybeboard();
        assert_eq!(editor.board_to_edit(), Board::Maybeboard);

        editor.set_remove_value("opt");
        assert_eq!(
            editor.handle_remove_replace(&session, &api),
            RemoveStep::Removed { index: 0 }
        );
        assert_eq!(editor.changes().ops(Board::Maybeboard).len(), 1);
        assert!(editor.changes().ops(Board::Mainboard).is_empty());
    }

    #[test]
    fn specify_edition_switches_add_source() {
        let mut editor = ChangeEditor::default();
        assert_eq!(editor.add_source(), NameSource::CardNames);
        editor.set_specify_edition(true);
        assert_eq!(editor.add_source(), NameSource::FullNames);
    }
}
