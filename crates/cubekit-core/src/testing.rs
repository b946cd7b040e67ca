use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use cubekit_shared::{
    BoardsDto, CardDetails, CardStatus, CommitRequest, CubeDto, SaveShowTagColorsRequest,
    SaveSortsRequest, SaveTagColorsRequest, TagColorEntry,
};

use crate::api::{CardResolver, CubeApi, NameSource};
use crate::error::CubeError;
use crate::session::Session;

/// In-memory stand-in for the cube API that records every request.
#[derive(Default)]
pub struct FakeApi {
    cards: HashMap<String, CardDetails>,
    pub names: Vec<String>,
    pub cube: Option<CubeDto>,
    pub fail_status: Cell<Option<u16>>,
    pub unreachable: Cell<bool>,
    pub calls: Cell<usize>,
    pub commits: RefCell<Vec<CommitRequest>>,
    pub sorts: RefCell<Vec<(String, SaveSortsRequest)>>,
    pub tag_colors: RefCell<Vec<(String, SaveTagColorsRequest)>>,
    pub show_tag_colors: RefCell<Vec<bool>>,
    pub uploads: RefCell<Vec<(String, String)>>,
}

impl FakeApi {
    pub fn with_cards(names: &[&str]) -> Self {
        let mut api = FakeApi::default();
        for name in names {
            api.cards.insert(
                name.to_lowercase(),
                CardDetails {
                    scryfall_id: format!("id-{}", name.to_lowercase().replace(' ', "-")),
                    name: (*name).to_string(),
                    extra: BTreeMap::new(),
                },
            );
        }
        api
    }

    fn outcome(&self) -> Result<(), CubeError> {
        self.calls.set(self.calls.get() + 1);
        if self.unreachable.get() {
            return Err(CubeError::Unreachable("connection refused".to_string()));
        }
        if let Some(status) = self.fail_status.get() {
            return Err(CubeError::RequestFailed {
                status,
                message: "fake failure".to_string(),
            });
        }
        Ok(())
    }
}

impl CardResolver for FakeApi {
    fn get_card_for_cube(
        &self,
        name: &str,
        _default_printing: &str,
    ) -> Result<CardDetails, CubeError> {
        self.outcome()?;
        self.cards
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| CubeError::card_not_found(name))
    }
}

impl CubeApi for FakeApi {
    fn fetch_cube(&self, cube_id: &str) -> Result<CubeDto, CubeError> {
        self.outcome()?;
        self.cube
            .clone()
            .ok_or_else(|| CubeError::NotFound(format!("Cube {cube_id} not found.")))
    }

    fn commit(&self, request: &CommitRequest) -> Result<(), CubeError> {
        self.outcome()?;
        self.commits.borrow_mut().push(request.clone());
        Ok(())
    }

    fn save_sorts(&self, cube_id: &str, request: &SaveSortsRequest) -> Result<(), CubeError> {
        self.outcome()?;
        self.sorts
            .borrow_mut()
            .push((cube_id.to_string(), request.clone()));
        Ok(())
    }

    fn save_tag_colors(
        &self,
        cube_id: &str,
        request: &SaveTagColorsRequest,
    ) -> Result<(), CubeError> {
        self.outcome()?;
        self.tag_colors
            .borrow_mut()
            .push((cube_id.to_string(), request.clone()));
        Ok(())
    }

    fn save_show_tag_colors(&self, request: &SaveShowTagColorsRequest) -> Result<(), CubeError> {
        self.outcome()?;
        self.show_tag_colors.borrow_mut().push(request.show_tag_colors);
        Ok(())
    }

    fn bulk_replace(&self, cube_id: &str, encoded_file: &str) -> Result<(), CubeError> {
        self.outcome()?;
        self.uploads
            .borrow_mut()
            .push((cube_id.to_string(), encoded_file.to_string()));
        Ok(())
    }

    fn card_names(&self, _source: &NameSource) -> Result<Vec<String>, CubeError> {
        self.outcome()?;
        Ok(self.names.clone())
    }
}

pub fn cube(cards: BoardsDto) -> CubeDto {
    CubeDto {
        id: "cube1".to_string(),
        name: "Test Cube".to_string(),
        default_printing: "recent".to_string(),
        default_status: CardStatus::Owned,
        default_sorts: vec![],
        show_unsorted: false,
        tag_colors: Vec::<TagColorEntry>::new(),
        show_tag_colors: true,
        cards,
    }
}

pub fn session(cards: BoardsDto) -> Session {
    Session::new(cube(cards), true)
}
