//! HTTP client for the cube API.
//!
//! Blocking reqwest client; every endpoint the editor panels need sits behind
//! the [`CubeApi`] trait so the state machines can be driven without a server.

use std::time::Duration;

use cubekit_shared::{
    ApiAck, Board, CardDetails, CardNamesResponse, CommitRequest, CubeDto, GetCardRequest,
    GetCardResponse, SaveShowTagColorsRequest, SaveSortsRequest, SaveTagColorsRequest,
};
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::CubeError;

/// Resolves a typed card name to canonical card details.
pub trait CardResolver {
    fn get_card_for_cube(
        &self,
        name: &str,
        default_printing: &str,
    ) -> Result<CardDetails, CubeError>;
}

pub trait CubeApi: CardResolver {
    fn fetch_cube(&self, cube_id: &str) -> Result<CubeDto, CubeError>;

    fn commit(&self, request: &CommitRequest) -> Result<(), CubeError>;

    fn save_sorts(&self, cube_id: &str, request: &SaveSortsRequest) -> Result<(), CubeError>;

    fn save_tag_colors(
        &self,
        cube_id: &str,
        request: &SaveTagColorsRequest,
    ) -> Result<(), CubeError>;

    fn save_show_tag_colors(&self, request: &SaveShowTagColorsRequest) -> Result<(), CubeError>;

    /// `encoded_file` is the data URL of the selected file.
    fn bulk_replace(&self, cube_id: &str, encoded_file: &str) -> Result<(), CubeError>;

    fn card_names(&self, source: &NameSource) -> Result<Vec<String>, CubeError>;
}

/// Autocomplete name lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSource {
    CardNames,
    FullNames,
    CubeCardNames { cube_id: String, board: Board },
}

impl NameSource {
    pub fn path(&self) -> String {
        match self {
            NameSource::CardNames => "/cube/api/cardnames".to_string(),
            NameSource::FullNames => "/cube/api/fullnames".to_string(),
            NameSource::CubeCardNames { cube_id, board } => {
                format!("/cube/api/cubecardnames/{cube_id}/{board}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpCubeApi {
    http: Client,
    base_url: String,
}

impl HttpCubeApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CubeError> {
        let http = Client::builder()
            .user_agent(format!("cubekit/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| CubeError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> Result<Response, CubeError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| CubeError::Unreachable(e.to_string()))?;
        check_status(response)
    }

    fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, CubeError> {
        let url = self.url(path);
        debug!(%url, "POST json");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| CubeError::Unreachable(e.to_string()))?;
        check_status(response)
    }

    fn post_ack<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), CubeError> {
        let response = self.post_json(path, body)?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| CubeError::Decode(e.to_string()))?;

        // Some endpoints answer with an empty body on success.
        if text.trim().is_empty() {
            return Ok(());
        }

        let ack: ApiAck = serde_json::from_str(&text).map_err(|e| CubeError::Decode(e.to_string()))?;
        if ack.is_success() {
            Ok(())
        } else {
            Err(CubeError::RequestFailed {
                status,
                message: ack.message.unwrap_or_else(|| "server reported failure".to_string()),
            })
        }
    }
}

fn check_status(response: Response) -> Result<Response, CubeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    warn!(status = status.as_u16(), "request failed");
    Err(CubeError::RequestFailed {
        status: status.as_u16(),
        message,
    })
}

fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, CubeError> {
    response.json::<T>().map_err(|e| CubeError::Decode(e.to_string()))
}

impl CardResolver for HttpCubeApi {
    #[instrument(skip(self))]
    fn get_card_for_cube(
        &self,
        name: &str,
        default_printing: &str,
    ) -> Result<CardDetails, CubeError> {
        if name.is_empty() {
            return Err(CubeError::card_not_found(name));
        }

        let request = GetCardRequest {
            name: name.to_string(),
            defaultprinting: default_printing.to_string(),
        };
        let response = self.post_json("/cube/api/getcardforcube", &request)?;
        let body: GetCardResponse = parse_json(response)?;

        match body.card {
            Some(card) if body.success == "true" => Ok(card),
            _ => Err(CubeError::card_not_found(name)),
        }
    }
}

impl CubeApi for HttpCubeApi {
    #[instrument(skip(self))]
    fn fetch_cube(&self, cube_id: &str) -> Result<CubeDto, CubeError> {
        let response = self.get(&format!("/cube/api/cubeJSON/{cube_id}"))?;
        parse_json(response)
    }

    #[instrument(skip(self, request), fields(cube_id = %request.id))]
    fn commit(&self, request: &CommitRequest) -> Result<(), CubeError> {
        self.post_ack("/cube/api/commit", request)
    }

    #[instrument(skip(self, request))]
    fn save_sorts(&self, cube_id: &str, request: &SaveSortsRequest) -> Result<(), CubeError> {
        self.post_ack(&format!("/cube/api/savesorts/{cube_id}"), request)
    }

    #[instrument(skip(self, request), fields(count = request.tag_colors.len()))]
    fn save_tag_colors(
        &self,
        cube_id: &str,
        request: &SaveTagColorsRequest,
    ) -> Result<(), CubeError> {
        self.post_ack(&format!("/cube/api/savetagcolors/{cube_id}"), request)
    }

    #[instrument(skip(self))]
    fn save_show_tag_colors(&self, request: &SaveShowTagColorsRequest) -> Result<(), CubeError> {
        self.post_ack("/cube/api/saveshowtagcolors", request)
    }

    #[instrument(skip(self, encoded_file), fields(encoded_len = encoded_file.len()))]
    fn bulk_replace(&self, cube_id: &str, encoded_file: &str) -> Result<(), CubeError> {
        let url = self.url(&format!("/cube/bulkreplace/{cube_id}"));
        debug!(%url, "POST form");
        let response = self
            .http
            .post(&url)
            .form(&[("file", encoded_file)])
            .send()
            .map_err(|e| CubeError::Unreachable(e.to_string()))?;
        check_status(response).map(|_| ())
    }

    #[instrument(skip(self))]
    fn card_names(&self, source: &NameSource) -> Result<Vec<String>, CubeError> {
        let response = self.get(&source.path())?;
        let body: CardNamesResponse = parse_json(response)?;
        if body.success.as_deref() == Some("false") {
            return Err(CubeError::NotFound(format!(
                "No card names available from {}.",
                source.path()
            )));
        }
        Ok(body.cardnames)
    }
}

#[cfg(test)]
mod tests {
    use cubekit_shared::{ChangesDto, TagColor, TagColorEntry};
    use httpmock::prelude::*;

    use super::*;

    fn client(server: &MockServer) -> HttpCubeApi {
        HttpCubeApi::new(&server.base_url(), Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn resolves_card_when_server_reports_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/cube/api/getcardforcube")
                .json_body(serde_json::json!({"name": "Lightning Bolt", "defaultprinting": "recent"}));
            then.status(200).json_body(serde_json::json!({
                "success": "true",
                "card": {"scryfall_id": "bolt-id", "name": "Lightning Bolt", "cmc": 1}
            }));
        });

        let card = client(&server)
            .get_card_for_cube("Lightning Bolt", "recent")
            .expect("card");
        mock.assert();
        assert_eq!(card.scryfall_id, "bolt-id");
        assert_eq!(card.extra["cmc"], 1);
    }

    #[test]
    fn unsuccessful_lookup_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/cube/api/getcardforcube");
            then.status(200)
                .json_body(serde_json::json!({"success": "false"}));
        });

        let err = client(&server)
            .get_card_for_cube("Nope", "recent")
            .expect_err("missing card");
        assert!(matches!(err, CubeError::NotFound(ref msg) if msg == "Couldn't find card [Nope]."));
    }

    #[test]
    fn non_success_status_is_request_failed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/cube/api/getcardforcube");
            then.status(500).body("boom");
        });

        let err = client(&server)
            .get_card_for_cube("Bolt", "recent")
            .expect_err("server error");
        assert!(matches!(err, CubeError::RequestFailed { status: 500, .. }));
    }

    #[test]
    fn closed_port_is_unreachable() {
        let api = HttpCubeApi::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client");
        let err = api.fetch_cube("abc").expect_err("nothing listening");
        assert!(err.is_unreachable());
    }

    #[test]
    fn tag_colors_post_full_ordered_list() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/cube/api/savetagcolors/cube1")
                .json_body(serde_json::json!({
                    "tag_colors": [
                        {"tag": "removal", "color": "red"},
                        {"tag": "ramp", "color": null}
                    ]
                }));
            then.status(200).json_body(serde_json::json!({"success": "true"}));
        });

        let request = SaveTagColorsRequest {
            tag_colors: vec![
                TagColorEntry {
                    tag: "removal".to_string(),
                    color: Some(TagColor::Red),
                },
                TagColorEntry {
                    tag: "ramp".to_string(),
                    color: None,
                },
            ],
        };
        client(&server)
            .save_tag_colors("cube1", &request)
            .expect("saved");
        mock.assert();
    }

    #[test]
    fn commit_reporting_failure_in_body_is_request_failed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/cube/api/commit");
            then.status(200)
                .json_body(serde_json::json!({"success": "false", "message": "Cube was modified"}));
        });

        let request = CommitRequest {
            id: "cube1".to_string(),
            changes: ChangesDto::default(),
            title: String::new(),
            blog: String::new(),
            use_blog: false,
        };
        let err = client(&server).commit(&request).expect_err("rejected");
        assert!(
            matches!(err, CubeError::RequestFailed { status: 200, ref message } if message == "Cube was modified")
        );
    }

    #[test]
    fn bulk_replace_posts_file_form_field() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/cube/bulkreplace/cube1")
                .body_contains("file=data%3Atext%2Fcsv%3Bbase64%2CYQ%3D%3D");
            then.status(200);
        });

        client(&server)
            .bulk_replace("cube1", "data:text/csv;base64,YQ==")
            .expect("uploaded");
        mock.assert();
    }

    #[test]
    fn cube_card_names_use_board_scoped_path() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/cube/api/cubecardnames/cube1/maybeboard");
            then.status(200)
                .json_body(serde_json::json!({"success": "true", "cardnames": ["Opt", "Ponder"]}));
        });

        let names = client(&server)
            .card_names(&NameSource::CubeCardNames {
                cube_id: "cube1".to_string(),
                board: Board::Maybeboard,
            })
            .expect("names");
        assert_eq!(names, vec!["Opt".to_string(), "Ponder".to_string()]);
    }
}
