use cubekit_shared::CommitRequest;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::alerts::Alert;
use crate::api::CubeApi;
use crate::editor::ChangeEditor;
use crate::error::CubeError;
use crate::session::Session;

pub const DEFAULT_BLOG_TITLE: &str = "Cube Updated – Automatic Post";

/// Optional blog post published alongside a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogDraft {
    pub title: String,
    pub body: String,
    pub use_blog: bool,
}

impl Default for BlogDraft {
    fn default() -> Self {
        Self {
            title: DEFAULT_BLOG_TITLE.to_string(),
            body: String::new(),
            use_blog: false,
        }
    }
}

impl BlogDraft {
    /// Title and body go back to defaults; the blog toggle is a preference
    /// and stays.
    pub fn reset(&mut self) {
        self.title = DEFAULT_BLOG_TITLE.to_string();
        self.body.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommitPipeline {
    loading: bool,
    blog: BlogDraft,
}

impl CommitPipeline {
    pub fn new(blog: BlogDraft) -> Self {
        Self {
            loading: false,
            blog,
        }
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn blog(&self) -> &BlogDraft {
        &self.blog
    }

    pub fn blog_mut(&mut self) -> &mut BlogDraft {
        &mut self.blog
    }

    /// Submit is offered only while there is something to commit and no
    /// commit is already running.
    pub fn can_submit(&self, editor: &ChangeEditor) -> bool {
        !self.loading && !editor.changes().is_empty()
    }

    /// Marks a commit as in flight and builds its request.
    pub fn begin(
        &mut self,
        session: &Session,
        editor: &ChangeEditor,
        title: &str,
        body: &str,
    ) -> Result<CommitRequest, CubeError> {
        if !session.can_edit {
            return Err(CubeError::ReadOnly);
        }
        if self.loading {
            return Err(CubeError::CommitInFlight);
        }
        self.loading = true;
        Ok(CommitRequest {
            id: session.cube_id().to_string(),
            changes: editor.changes().to_wire(),
            title: title.to_string(),
            blog: body.to_string(),
            use_blog: self.blog.use_blog,
        })
    }

    /// Settles an in-flight commit. Success clears the change list and the
    /// blog draft; failure keeps both and raises an alert.
    pub fn finish(&mut self, editor: &mut ChangeEditor, result: Result<(), CubeError>) -> bool {
        self.loading = false;
        match result {
            Ok(()) => {
                editor.discard_all_changes();
                self.blog.reset();
                editor.alerts_mut().push(Alert::success("Changes saved."));
                info!("commit succeeded");
                true
            }
            Err(err) => {
                error!(%err, "commit failed");
                editor.alerts_mut().push_error(&err);
                false
            }
        }
    }

    /// Sends the pending changes with an annotation. Returns whether the
    /// commit went through.
    #[instrument(skip(self, session, editor, api, body), fields(pending = editor.changes().len()))]
    pub fn commit_changes(
        &mut self,
        session: &Session,
        editor: &mut ChangeEditor,
        api: &dyn CubeApi,
        title: &str,
        body: &str,
    ) -> bool {
        let request = match self.begin(session, editor, title, body) {
            Ok(request) => request,
            Err(err) => {
                editor.alerts_mut().push_error(&err);
                return false;
            }
        };
        let result = api.commit(&request);
        self.finish(editor, result)
    }

    /// Commits with the stored blog draft as annotation.
    pub fn commit_draft(
        &mut self,
        session: &Session,
        editor: &mut ChangeEditor,
        api: &dyn CubeApi,
    ) -> bool {
        let BlogDraft { title, body, .. } = self.blog.clone();
        self.commit_changes(session, editor, api, &title, &body)
    }
}

#[cfg(test)]
mod tests {
    use cubekit_shared::{Board, ChangeOpDto};

    use super::*;
    use crate::alerts::AlertColor;
    use crate::changes::tests::{boards, card};
    use crate::testing::{FakeApi, session};

    fn editor_with_change() -> ChangeEditor {
        let mut editor = ChangeEditor::default();
        editor
            .changes_mut()
            .add_card(card("a", "Opt"), Board::Mainboard);
        editor
    }

    #[test]
    fn success_clears_changes_and_blog_draft() {
        let session = session(boards(&["Bolt"]));
        let api = FakeApi::default();
        let mut editor = editor_with_change();
        let mut pipeline = CommitPipeline::new(BlogDraft {
            title: "Week 3".to_string(),
            body: "Added Opt".to_string(),
            use_blog: true,
        });

        assert!(pipeline.commit_draft(&session, &mut editor, &api));

        assert!(editor.changes().is_empty());
        assert!(!pipeline.loading());
        assert_eq!(pipeline.blog().title, DEFAULT_BLOG_TITLE);
        assert!(pipeline.blog().body.is_empty());
        assert!(pipeline.blog().use_blog);

        let commits = api.commits.borrow();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].id, "cube1");
        assert_eq!(commits[0].title, "Week 3");
        assert!(commits[0].use_blog);
        assert!(matches!(
            &commits[0].changes.mainboard[0],
            ChangeOpDto::Add { card } if card.card_id == "a"
        ));
    }

    #[test]
    fn failure_keeps_changes_and_alerts() {
        let session = session(boards(&["Bolt"]));
        let api = FakeApi::default();
        api.fail_status.set(Some(500));
        let mut editor = editor_with_change();
        let mut pipeline = CommitPipeline::new(BlogDraft {
            title: "Keep me".to_string(),
            body: "body".to_string(),
            use_blog: false,
        });

        assert!(!pipeline.commit_draft(&session, &mut editor, &api));

        assert_eq!(editor.changes().len(), 1);
        assert!(!pipeline.loading());
        assert_eq!(pipeline.blog().title, "Keep me");
        let alert = editor.alerts().last().expect("alert");
        assert_eq!(alert.color, AlertColor::Danger);
        assert_eq!(alert.message, "Request failed: 500.");
    }

    #[test]
    fn only_one_commit_in_flight() {
        let session = session(boards(&["Bolt"]));
        let mut editor = editor_with_change();
        let mut pipeline = CommitPipeline::default();

        let _request = pipeline
            .begin(&session, &editor, "t", "b")
            .expect("first begin");
        assert!(pipeline.loading());
        assert!(!pipeline.can_submit(&editor));
        assert!(matches!(
            pipeline.begin(&session, &editor, "t", "b"),
            Err(CubeError::CommitInFlight)
        ));

        pipeline.finish(&mut editor, Err(CubeError::Unreachable("timeout".to_string())));
        assert!(!pipeline.loading());
        assert!(pipeline.can_submit(&editor));
    }

    #[test]
    fn read_only_session_cannot_commit() {
        let mut session = session(boards(&["Bolt"]));
        session.can_edit = false;
        let api = FakeApi::default();
        let mut editor = editor_with_change();
        let mut pipeline = CommitPipeline::default();

        assert!(!pipeline.commit_draft(&session, &mut editor, &api));
        assert!(!pipeline.loading());
        assert_eq!(editor.changes().len(), 1);
        assert_eq!(api.calls.get(), 0);
    }
}
