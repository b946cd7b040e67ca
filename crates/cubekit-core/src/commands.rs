use std::io::Write;
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use cubekit_shared::{Board, TagColor};
use tracing::{debug, info, instrument, warn};

use crate::alerts::Alerts;
use crate::api::{CubeApi, NameSource};
use crate::bulk_replace::BulkReplacePanel;
use crate::cli::Invocation;
use crate::config::{Config, parse_bool};
use crate::drafts::{CubeKeys, DraftStore};
use crate::editor::{ChangeEditor, LookupOutcome, RemoveStep};
use crate::render::Renderer;
use crate::search::{search_url, suggest};
use crate::session::Session;
use crate::sorts::{SortPanel, SortSlot};
use crate::tag_colors::TagColorPanel;

const SUGGESTION_LIMIT: usize = 20;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show",
        "add",
        "remove",
        "changes",
        "revert",
        "discard",
        "commit",
        "board",
        "maybeboard",
        "edition",
        "blog",
        "sorts",
        "tags",
        "bulk-replace",
        "suggest",
        "search",
        "config",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command needs; built once per run.
pub struct CommandEnv<'a> {
    pub store: &'a mut DraftStore,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub api: &'a dyn CubeApi,
}

#[instrument(skip(env, out, inv), fields(command = %inv.command))]
pub fn dispatch<W: Write>(
    env: &mut CommandEnv<'_>,
    out: &mut W,
    inv: Invocation,
) -> anyhow::Result<()> {
    let args = inv.args.as_slice();
    debug!(?args, "dispatching command");

    match inv.command.as_str() {
        "show" => cmd_show(env, out, args),
        "add" => cmd_add(env, out, args),
        "remove" => cmd_remove(env, out, args),
        "changes" => cmd_changes(env, out),
        "revert" => cmd_revert(env, out, args),
        "discard" => cmd_discard(env, out),
        "commit" => cmd_commit(env, out, args),
        "board" => cmd_board(env, out, args),
        "maybeboard" => cmd_maybeboard(env, out, args),
        "edition" => cmd_edition(env, out, args),
        "blog" => cmd_blog(env, out, args),
        "sorts" => cmd_sorts(env, out, args),
        "tags" => cmd_tags(env, out, args),
        "bulk-replace" => cmd_bulk_replace(env, out, args),
        "suggest" => cmd_suggest(env, out, args),
        "search" => cmd_search(env, out, args),
        "config" => cmd_config(env, out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cube_keys(cfg: &Config) -> anyhow::Result<CubeKeys> {
    Ok(CubeKeys::new(&cfg.cube_id()?))
}

/// Fetches the committed cube for this run.
#[instrument(skip(env))]
fn open_session(env: &CommandEnv<'_>) -> anyhow::Result<(Session, CubeKeys)> {
    let cube_id = env.cfg.cube_id()?;
    let mut cube = env
        .api
        .fetch_cube(&cube_id)
        .with_context(|| format!("failed to load cube {cube_id}"))?;
    if cube.id.is_empty() {
        cube.id = cube_id.clone();
    }
    info!(
        cube_id = %cube.id,
        mainboard = cube.cards.mainboard.len(),
        maybeboard = cube.cards.maybeboard.len(),
        "loaded cube"
    );
    Ok((Session::new(cube, env.cfg.can_edit()), CubeKeys::new(&cube_id)))
}

/// Persists the editor and reports its alerts. A failed step turns the most
/// recent alert into the command error.
fn finish_editor<W: Write>(
    env: &mut CommandEnv<'_>,
    out: &mut W,
    keys: &CubeKeys,
    editor: &ChangeEditor,
    ok: bool,
) -> anyhow::Result<()> {
    env.store.store_editor(keys, editor)?;
    env.store.save()?;
    if ok {
        env.renderer.write_alerts(out, editor.alerts())?;
        Ok(())
    } else {
        Err(failure(editor.alerts(), "edit failed"))
    }
}

fn failure(alerts: &Alerts, fallback: &str) -> anyhow::Error {
    match alerts.last() {
        Some(alert) => anyhow!(alert.message.clone()),
        None => anyhow!(fallback.to_string()),
    }
}

fn parse_switch(value: Option<&String>, what: &str) -> anyhow::Result<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("on" | "yes" | "true" | "1") => Ok(true),
        Some("off" | "no" | "false" | "0") => Ok(false),
        Some(other) => Err(anyhow!("{what} expects on|off, got: {other}")),
        None => Err(anyhow!("usage: {what} on|off")),
    }
}

fn parse_board(value: &str) -> anyhow::Result<Board> {
    value.parse::<Board>().map_err(|e| anyhow!(e))
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// Splits `args` at `flag`: words before it and words after it.
fn split_flag<'a>(args: &'a [String], flag: &str) -> (&'a [String], Option<&'a [String]>) {
    match args.iter().position(|arg| arg == flag) {
        Some(pos) => (&args[..pos], Some(&args[pos + 1..])),
        None => (args, None),
    }
}

#[instrument(skip(env, out, args))]
fn cmd_show<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let (session, keys) = open_session(env)?;
    let editor = env.store.load_editor(&keys);
    let board = match args.first() {
        Some(value) => parse_board(value)?,
        None => editor.board_to_edit(),
    };

    let tag_panel = TagColorPanel::new(&session);
    let tag_colors = session
        .cube
        .show_tag_colors
        .then(|| tag_panel.committed());

    writeln!(out, "{} [{}]", session.cube.name, session.cube_id())?;
    env.renderer
        .write_board(out, session.base(), editor.changes(), board, tag_colors)?;
    if !editor.changes().is_empty() {
        writeln!(out, "{} pending change(s); run `cube changes` to review", editor.changes().len())?;
    }
    Ok(())
}

#[instrument(skip(env, out, args))]
fn cmd_add<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let name = args.join(" ");
    if name.trim().is_empty() {
        bail!("usage: add <card name>");
    }

    let (session, keys) = open_session(env)?;
    let mut editor = env.store.load_editor(&keys);
    editor.set_add_value(name.trim());
    let board = editor.board_to_edit();
    let outcome = editor.handle_add(&session, env.api);
    let ok = outcome == LookupOutcome::Applied;
    if ok {
        writeln!(out, "Added {} to {board}.", name.trim())?;
    }
    finish_editor(env, out, &keys, &editor, ok)
}

#[instrument(skip(env, out, args))]
fn cmd_remove<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let (name, replacement) = split_flag(args, "--replace");
    let name = name.join(" ");
    let replacement = replacement.map(|words| words.join(" "));
    if name.trim().is_empty() {
        bail!("usage: remove <card name> [--replace <card name>]");
    }
    if replacement.as_deref().is_some_and(|r| r.trim().is_empty()) {
        bail!("--replace needs a card name");
    }

    let (session, keys) = open_session(env)?;
    let mut editor = env.store.load_editor(&keys);
    editor.set_remove_value(name.trim());
    if let Some(replacement) = replacement.as_deref() {
        editor.set_add_value(replacement.trim());
    }

    let board = editor.board_to_edit();
    let ok = match editor.handle_remove_replace(&session, env.api) {
        RemoveStep::Removed { index } => {
            match replacement.as_deref() {
                Some(replacement) => writeln!(
                    out,
                    "Replaced {} (#{index}) with {} on {board}.",
                    name.trim(),
                    replacement.trim()
                )?,
                None => writeln!(out, "Removed {} (#{index}) from {board}.", name.trim())?,
            }
            true
        }
        RemoveStep::Failed => false,
        RemoveStep::Idle | RemoveStep::NeedsCard(_) => {
            warn!("remove finished without resolving");
            false
        }
    };
    finish_editor(env, out, &keys, &editor, ok)
}

fn cmd_changes<W: Write>(env: &mut CommandEnv<'_>, out: &mut W) -> anyhow::Result<()> {
    let (session, keys) = open_session(env)?;
    let editor = env.store.load_editor(&keys);
    env.renderer
        .write_changes(out, session.base(), editor.changes())
}

#[instrument(skip(env, out, args))]
fn cmd_revert<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let [board, position] = args else {
        bail!("usage: revert <board> <position>");
    };
    let board = parse_board(board)?;
    let position: usize = position
        .parse()
        .with_context(|| format!("invalid position: {position}"))?;

    let keys = cube_keys(env.cfg)?;
    let mut editor = env.store.load_editor(&keys);
    if editor.changes_mut().revert(board, position).is_none() {
        bail!("no pending change at position {position} on {board}");
    }
    writeln!(out, "Reverted change {position} on {board}.")?;
    finish_editor(env, out, &keys, &editor, true)
}

fn cmd_discard<W: Write>(env: &mut CommandEnv<'_>, out: &mut W) -> anyhow::Result<()> {
    let keys = cube_keys(env.cfg)?;
    let mut editor = env.store.load_editor(&keys);
    let dropped = editor.changes().len();
    editor.discard_all_changes();

    let mut pipeline = env.store.load_pipeline(&keys);
    pipeline.blog_mut().reset();
    env.store.store_pipeline(&keys, &pipeline)?;

    writeln!(out, "Discarded {dropped} pending change(s).")?;
    finish_editor(env, out, &keys, &editor, true)
}

#[instrument(skip(env, out, args))]
fn cmd_commit<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let mut title = None;
    let mut body = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--title" => title = Some(iter.next().ok_or_else(|| anyhow!("--title needs a value"))?),
            "--body" => body = Some(iter.next().ok_or_else(|| anyhow!("--body needs a value"))?),
            other => bail!("unexpected commit argument: {other}"),
        }
    }

    let (session, keys) = open_session(env)?;
    let mut editor = env.store.load_editor(&keys);
    let mut pipeline = env.store.load_pipeline(&keys);
    if let Some(title) = title {
        pipeline.blog_mut().title = title.clone();
    }
    if let Some(body) = body {
        pipeline.blog_mut().body = body.clone();
    }

    if !pipeline.can_submit(&editor) {
        bail!("no pending changes to commit");
    }

    let pending = editor.changes().len();
    let ok = pipeline.commit_draft(&session, &mut editor, env.api);
    env.store.store_pipeline(&keys, &pipeline)?;
    if ok {
        info!(pending, "committed changes");
        writeln!(out, "Committed {pending} change(s).")?;
    }
    finish_editor(env, out, &keys, &editor, ok)
}

fn cmd_board<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let Some(board) = args.first() else {
        bail!("usage: board <mainboard|maybeboard>");
    };
    let board = parse_board(board)?;

    let keys = cube_keys(env.cfg)?;
    let mut editor = env.store.load_editor(&keys);
    editor.set_active_board(board);
    writeln!(out, "Editing {}.", editor.board_to_edit())?;
    if board == Board::Maybeboard && !editor.prefs().show_maybeboard {
        writeln!(out, "The maybeboard is hidden; run `cube maybeboard on` to edit it.")?;
    }
    finish_editor(env, out, &keys, &editor, true)
}

fn cmd_maybeboard<W: Write>(
    env: &mut CommandEnv<'_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    let show = parse_switch(args.first(), "maybeboard")?;
    let keys = cube_keys(env.cfg)?;
    let mut editor = env.store.load_editor(&keys);
    editor.set_show_maybeboard(show);
    writeln!(out, "Maybeboard {}; editing {}.", on_off(show), editor.board_to_edit())?;
    finish_editor(env, out, &keys, &editor, true)
}

fn cmd_edition<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let specify = parse_switch(args.first(), "edition")?;
    let keys = cube_keys(env.cfg)?;
    let mut editor = env.store.load_editor(&keys);
    editor.set_specify_edition(specify);
    writeln!(out, "Specify edition {}.", on_off(specify))?;
    finish_editor(env, out, &keys, &editor, true)
}

fn cmd_blog<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let keys = cube_keys(env.cfg)?;
    let mut pipeline = env.store.load_pipeline(&keys);

    let (action, rest) = match args.split_first() {
        Some((action, rest)) => (action.as_str(), rest),
        None => ("show", &args[..0]),
    };
    match action {
        "show" => {}
        "on" | "off" => pipeline.blog_mut().use_blog = parse_bool(action),
        "title" => pipeline.blog_mut().title = rest.join(" "),
        "body" => pipeline.blog_mut().body = rest.join(" "),
        "reset" => pipeline.blog_mut().reset(),
        other => bail!("unknown blog action: {other} (expected on|off|title|body|reset)"),
    }

    let blog = pipeline.blog();
    writeln!(out, "post:  {}", on_off(blog.use_blog))?;
    writeln!(out, "title: {}", blog.title)?;
    writeln!(out, "body:  {}", blog.body)?;

    if action != "show" {
        env.store.store_pipeline(&keys, &pipeline)?;
        env.store.save()?;
    }
    Ok(())
}

#[instrument(skip(env, out, args))]
fn cmd_sorts<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let (session, keys) = open_session(env)?;
    let mut panel = SortPanel::new(&session);
    env.store.restore_sorts(&keys, &mut panel);

    let action = args.first().map(String::as_str).unwrap_or("show");
    match action {
        "show" => {}
        "set" => {
            let [_, slot, value @ ..] = args else {
                bail!("usage: sorts set <slot> <sort>");
            };
            let slot: SortSlot = slot.parse()?;
            panel.set_sort(slot, &value.join(" "))?;
        }
        "unsorted" => panel.set_show_unsorted(parse_switch(args.get(1), "sorts unsorted")?),
        "reset" => panel.reset_sorts(),
        "save" => {
            if let (_, Some(flag)) = split_flag(args, "--show-unsorted") {
                panel.set_show_unsorted(parse_switch(flag.first(), "--show-unsorted")?);
            }
            if panel.save_sorts(&session, env.api)? {
                writeln!(out, "Saved default sorts.")?;
            } else {
                writeln!(out, "Nothing to save.")?;
            }
        }
        other => bail!("unknown sorts action: {other}"),
    }

    env.renderer.write_sorts(out, &panel)?;
    if action != "show" {
        env.store.store_sorts(&keys, &panel)?;
        env.store.save()?;
    }
    Ok(())
}

#[instrument(skip(env, out, args))]
fn cmd_tags<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let (session, keys) = open_session(env)?;
    let mut panel = TagColorPanel::new(&session);
    env.store.restore_tag_colors(&keys, &mut panel);

    let action = args.first().map(String::as_str).unwrap_or("list");
    let mut result = Ok(());
    match action {
        "list" => {}
        "set" => {
            let [_, tag, color] = args else {
                bail!("usage: tags set <tag> <color|none>");
            };
            let color = match color.as_str() {
                "none" => None,
                other => Some(other.parse::<TagColor>().map_err(|e| anyhow!(e))?),
            };
            panel.on_change(tag, color)?;
        }
        "move" => {
            let [_, from, to] = args else {
                bail!("usage: tags move <from> <to>");
            };
            match (from.parse::<usize>(), to.parse::<usize>()) {
                (Ok(from), Ok(to)) => panel.move_entry(from, to)?,
                _ => panel.move_tag(from, to)?,
            }
        }
        "discard" => panel.discard(),
        "save" => {
            let mut alerts = Alerts::default();
            result = match panel.save(&session, env.api, &mut alerts) {
                Ok(()) => {
                    writeln!(out, "Saved tag colors.")?;
                    Ok(())
                }
                Err(_) => Err(failure(&alerts, "saving tag colors failed")),
            };
        }
        "show" => {
            let show = parse_switch(args.get(1), "tags show")?;
            panel.set_show_tag_colors(env.api, show)?;
            writeln!(out, "Tag colors {}.", on_off(show))?;
            return Ok(());
        }
        other => bail!("unknown tags action: {other}"),
    }

    if result.is_ok() {
        env.renderer.write_tags(out, &panel)?;
    }
    if action != "list" {
        env.store.store_tag_colors(&keys, &panel)?;
        env.store.save()?;
    }
    result
}

#[instrument(skip(env, out, args))]
fn cmd_bulk_replace<W: Write>(
    env: &mut CommandEnv<'_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    let [path] = args else {
        bail!("usage: bulk-replace <file>");
    };
    let path = Path::new(path);

    let (session, _) = open_session(env)?;
    let mut panel = BulkReplacePanel::default();
    panel
        .load_path(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    panel.submit(&session, env.api)?;
    writeln!(
        out,
        "Replaced {} from {}.",
        session.cube_id(),
        panel.file_name().unwrap_or_default()
    )?;
    Ok(())
}

#[instrument(skip(env, out, args))]
fn cmd_suggest<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let (prefix, source) = split_flag(args, "--source");
    let prefix = prefix.join(" ");
    if prefix.trim().is_empty() {
        bail!("usage: suggest <prefix> [--source cardnames|fullnames|cube]");
    }

    let editor = match env.cfg.cube_id() {
        Ok(cube_id) => env.store.load_editor(&CubeKeys::new(&cube_id)),
        Err(_) => ChangeEditor::default(),
    };
    let source = match source.and_then(|words| words.first()).map(String::as_str) {
        None => editor.add_source(),
        Some("cardnames") => NameSource::CardNames,
        Some("fullnames") => NameSource::FullNames,
        Some("cube") => NameSource::CubeCardNames {
            cube_id: env.cfg.cube_id()?,
            board: editor.board_to_edit(),
        },
        Some(other) => bail!("unknown name source: {other}"),
    };

    let names = env
        .api
        .card_names(&source)
        .with_context(|| format!("failed to fetch {}", source.path()))?;
    for name in suggest(&names, &prefix, SUGGESTION_LIMIT) {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

fn cmd_search<W: Write>(env: &mut CommandEnv<'_>, out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let query = args.join(" ");
    if query.trim().is_empty() {
        bail!("usage: search <query>");
    }
    writeln!(out, "{}", search_url(&env.cfg.server_url(), &query)?)?;
    Ok(())
}

fn cmd_config<W: Write>(env: &mut CommandEnv<'_>, out: &mut W) -> anyhow::Result<()> {
    let mut entries: Vec<_> = env.cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        writeln!(out, "{key}={value}")?;
    }
    for file in &env.cfg.loaded_files {
        writeln!(out, "# loaded {}", file.display())?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "usage: cube [-v|-q] [--cuberc PATH] [--data DIR] [--rc K=V] [--cube ID] <command>

commands:
  show [board]                        derived board with pending edits
  add <name>                          add a card to the board being edited
  remove <name> [--replace <name>]    remove or swap a card by name
  changes                             list pending changes
  revert <board> <position>           drop one pending change
  discard                             drop all pending changes
  commit [--title T] [--body B]       send pending changes
  board <mainboard|maybeboard>        choose the board to edit
  maybeboard on|off                   show or hide the maybeboard
  edition on|off                      suggest names with printings
  blog [on|off|title T|body B|reset]  blog post draft for the next commit
  sorts [show|set S V|unsorted on|off|reset|save]
  tags [list|set T C|move A B|discard|save|show on|off]
  bulk-replace <file>                 replace the whole list from a file
  suggest <prefix> [--source cardnames|fullnames|cube]
  search <query>                      card search page address
  config                              effective settings"
    )?;
    Ok(())
}
