use cubekit_shared::{BoardsDto, CardStatus, CubeDto};

/// Read-only view of the cube being edited plus what the current user may do
/// with it. Panels receive this explicitly instead of reaching for shared
/// state.
#[derive(Debug, Clone)]
pub struct Session {
    pub cube: CubeDto,
    pub can_edit: bool,
}

impl Session {
    pub fn new(cube: CubeDto, can_edit: bool) -> Self {
        Self { cube, can_edit }
    }

    pub fn cube_id(&self) -> &str {
        &self.cube.id
    }

    pub fn base(&self) -> &BoardsDto {
        &self.cube.cards
    }

    pub fn default_printing(&self) -> &str {
        &self.cube.default_printing
    }

    pub fn default_status(&self) -> CardStatus {
        self.cube.default_status
    }
}
