// UI layer: interactive menus built with `dialoguer`.
// Each menu collects input, calls one of the resource clients behind a
// spinner and prints the outcome. API failures are printed and the menu
// carries on; only terminal I/O errors end the session.

use crate::api::ApiClient;
use crate::auth::now_ms;
use crate::config::Config;
use crate::error::Error;
use crate::journal::JournalClient;
use crate::models::{
    CreateSubscriptionRequest, JournalEntry, JournalPayload, SnapshotRequest, SubscriptionType,
};
use crate::render;
use crate::snapshots::SnapshotsClient;
use crate::stream::{start_streaming, CancelToken, StreamHandle, StreamMessage, StreamStatus};
use crate::subscriptions::SubscriptionsClient;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

const OBJECT_ACTIONS: &[&str] = &["CREATE", "UPDATE", "DELETE", "MERGE", "RESTORE"];
const ASSOCIATION_ACTIONS: &[&str] = &["ASSOCIATE", "DISASSOCIATE"];

/// Clients and per-session state used by the menus.
pub struct Session {
    api: ApiClient,
    subscriptions: SubscriptionsClient,
    snapshots: SnapshotsClient,
    journal: JournalClient,
    default_portal_id: Option<u64>,
    debug: bool,
    /// Last journal offset seen in this session, offered as the default
    /// for "next after offset".
    last_offset: Option<String>,
}

impl Session {
    pub fn new(api: ApiClient, config: &Config) -> crate::Result<Self> {
        Ok(Session {
            subscriptions: SubscriptionsClient::new(api.clone()),
            snapshots: SnapshotsClient::new(api.clone()),
            journal: JournalClient::new(api.clone())?,
            api,
            default_portal_id: config.default_portal_id,
            debug: config.debug,
            last_offset: None,
        })
    }
}

/// Main interactive menu. Runs until the user picks "Exit".
pub fn main_menu(session: &mut Session) -> Result<()> {
    loop {
        let items = vec![
            "Subscriptions",
            "Snapshots",
            "Journal",
            "Stream new journal entries",
            "Token status",
            "Exit",
        ];
        let selection = Select::new()
            .with_prompt("What do you want to do?")
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 => subscriptions_menu(session)?,
            1 => snapshots_menu(session)?,
            2 => journal_menu(session)?,
            3 => stream_entries(session)?,
            4 => token_menu(session)?,
            _ => break,
        }
    }
    Ok(())
}

fn subscriptions_menu(session: &Session) -> Result<()> {
    loop {
        let items = vec![
            "List subscriptions",
            "Create object subscription",
            "Create association subscription",
            "Delete a subscription",
            "Delete all subscriptions of a portal",
            "Back",
        ];
        let selection = Select::new()
            .with_prompt("Subscriptions")
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 => list_subscriptions(session),
            1 => create_subscription(session, SubscriptionType::Object)?,
            2 => create_subscription(session, SubscriptionType::Association)?,
            3 => delete_subscription(session)?,
            4 => delete_portal_subscriptions(session)?,
            _ => return Ok(()),
        }
    }
}

fn list_subscriptions(session: &Session) {
    match with_spinner("Loading subscriptions...", || session.subscriptions.list()) {
        Ok(subs) if subs.is_empty() => println!("No subscriptions."),
        Ok(subs) => {
            println!("{} subscription(s):", subs.len());
            for sub in &subs {
                println!("  {}", render::subscription_line(sub));
            }
        }
        Err(e) => print_error(&e),
    }
}

fn create_subscription(session: &Session, kind: SubscriptionType) -> Result<()> {
    let object_type_id: String = Input::new()
        .with_prompt("Object type id")
        .default("0-1".to_string())
        .interact_text()?;
    let portal_id = prompt_portal(session)?;

    let choices = match kind {
        SubscriptionType::Object => OBJECT_ACTIONS,
        SubscriptionType::Association => ASSOCIATION_ACTIONS,
    };
    let picked = MultiSelect::new()
        .with_prompt("Actions (space to toggle, enter to confirm)")
        .items(choices)
        .defaults(&vec![true; choices.len()])
        .interact()?;
    if picked.is_empty() {
        println!("At least one action is required.");
        return Ok(());
    }
    let actions = picked.into_iter().map(|i| choices[i].to_string()).collect();

    let mut req = CreateSubscriptionRequest {
        subscription_type: kind,
        object_type_id,
        portal_id,
        actions,
        properties: None,
        object_ids: None,
        associated_object_type_ids: None,
    };

    match kind {
        SubscriptionType::Object => {
            req.properties = non_empty(prompt_list("Properties to include (comma separated, optional)")?);
            req.object_ids = non_empty(prompt_ids("Only these object ids (comma separated, optional)")?);
        }
        SubscriptionType::Association => {
            let types = prompt_list("Associated object type ids (comma separated)")?;
            if types.is_empty() {
                println!("At least one associated object type id is required.");
                return Ok(());
            }
            req.associated_object_type_ids = Some(types);
        }
    }

    match with_spinner("Creating subscription...", || session.subscriptions.create(&req)) {
        Ok(sub) => {
            println!("Created subscription:");
            println!("  {}", render::subscription_line(&sub));
        }
        Err(e) => print_error(&e),
    }
    Ok(())
}

fn delete_subscription(session: &Session) -> Result<()> {
    let subs = match with_spinner("Loading subscriptions...", || session.subscriptions.list()) {
        Ok(subs) => subs,
        Err(e) => {
            print_error(&e);
            return Ok(());
        }
    };
    if subs.is_empty() {
        println!("No subscriptions to delete.");
        return Ok(());
    }

    let mut items: Vec<String> = subs.iter().map(render::subscription_line).collect();
    items.push("Cancel".to_string());
    let selection = Select::new()
        .with_prompt("Subscription to delete")
        .items(&items)
        .default(0)
        .interact()?;
    let Some(sub) = subs.get(selection) else {
        return Ok(());
    };

    if !confirm(&format!("Delete subscription {}?", sub.id))? {
        return Ok(());
    }
    match with_spinner("Deleting subscription...", || session.subscriptions.delete(&sub.id)) {
        Ok(()) => println!("Deleted subscription {}.", sub.id),
        Err(e) => print_error(&e),
    }
    Ok(())
}

fn delete_portal_subscriptions(session: &Session) -> Result<()> {
    let portal_id = prompt_portal(session)?;
    if !confirm(&format!("Delete ALL subscriptions of portal {}?", portal_id))? {
        return Ok(());
    }
    match with_spinner("Deleting subscriptions...", || {
        session.subscriptions.delete_for_portal(portal_id)
    }) {
        Ok(report) => print_lines(&render::deletion_lines(portal_id, &report)),
        Err(e) => print_error(&e),
    }
    Ok(())
}

fn snapshots_menu(session: &Session) -> Result<()> {
    let mut requests: Vec<SnapshotRequest> = Vec::new();
    loop {
        let portal_id = prompt_portal(session)?;
        let object_type_id: String = Input::new()
            .with_prompt("Object type id")
            .default("0-1".to_string())
            .interact_text()?;
        let object_id: u64 = Input::new().with_prompt("Object id").interact_text()?;
        let properties = prompt_list("Properties (comma separated, optional)")?;
        requests.push(SnapshotRequest {
            portal_id,
            object_id,
            object_type_id,
            properties,
        });
        if !Confirm::new()
            .with_prompt("Add another snapshot request?")
            .default(false)
            .interact()?
        {
            break;
        }
    }

    match with_spinner("Requesting snapshots...", || session.snapshots.create(&requests)) {
        Ok(response) => {
            println!("Snapshot request accepted for {} object(s).", requests.len());
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Err(e) => print_error(&e),
    }
    Ok(())
}

fn journal_menu(session: &mut Session) -> Result<()> {
    loop {
        let items = vec![
            "Earliest entry",
            "Latest entry",
            "Next entry after an offset",
            "Back",
        ];
        let selection = Select::new()
            .with_prompt("Journal")
            .items(&items)
            .default(1)
            .interact()?;
        let result = match selection {
            0 => with_spinner("Fetching earliest entry...", || session.journal.fetch_earliest()),
            1 => with_spinner("Fetching latest entry...", || session.journal.fetch_latest()),
            2 => {
                let mut input = Input::<String>::new();
                input.with_prompt("Offset");
                if let Some(offset) = &session.last_offset {
                    input.default(offset.clone());
                }
                let offset = input.interact_text()?;
                match with_spinner("Fetching next entry...", || session.journal.fetch_next(&offset)) {
                    Err(e) => {
                        println!("{}", render::describe_next_error(&e));
                        continue;
                    }
                    ok => ok,
                }
            }
            _ => return Ok(()),
        };
        match result {
            Ok((entry, payload)) => show_journal(session, &entry, &payload),
            Err(e) => print_error(&e),
        }
    }
}

fn show_journal(session: &mut Session, entry: &JournalEntry, payload: &JournalPayload) {
    print_lines(&render::journal_lines(entry, payload));
    if session.debug {
        println!("{:#?}", payload);
    }
    session.last_offset = Some(entry.current_offset.clone());
}

/// Follow the journal until the user presses q, Esc or Ctrl-C.
fn stream_entries(session: &mut Session) -> Result<()> {
    let (tx, rx) = mpsc::channel::<StreamMessage>();
    let handle = with_spinner("Fetching latest entry...", || {
        start_streaming(session.journal.clone(), tx, CancelToken::new())
    });

    if !handle.is_running() {
        handle.join();
        for msg in rx.try_iter() {
            print_stream_message(session, msg, "\n");
        }
        return Ok(());
    }

    println!("Streaming new journal entries. Press q, Esc or Ctrl-C to stop.");
    terminal::enable_raw_mode()?;
    let watched = watch_stream(session, &rx, &handle);
    terminal::disable_raw_mode()?;

    with_spinner("Stopping...", || handle.join());
    for msg in rx.try_iter() {
        print_stream_message(session, msg, "\n");
    }
    watched
}

fn watch_stream(
    session: &mut Session,
    rx: &Receiver<StreamMessage>,
    handle: &StreamHandle,
) -> Result<()> {
    loop {
        for msg in rx.try_iter() {
            print_stream_message(session, msg, "\r\n");
        }
        if !handle.is_running() {
            return Ok(());
        }
        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                let ctrl_c = key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL);
                if key.kind == KeyEventKind::Press
                    && (ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc))
                {
                    handle.stop();
                    return Ok(());
                }
            }
        }
    }
}

fn print_stream_message(session: &mut Session, msg: StreamMessage, eol: &str) {
    let lines = match msg {
        StreamMessage::Entry(entry, payload) => {
            session.last_offset = Some(entry.current_offset.clone());
            let mut lines = render::journal_lines(&entry, &payload);
            if session.debug {
                lines.extend(format!("{:#?}", payload).lines().map(str::to_string));
            }
            lines
        }
        StreamMessage::Error(msg) => vec![format!("Error: {}", msg)],
        StreamMessage::Status(status) => {
            if let StreamStatus::Started { offset } | StreamStatus::Stopped { offset: Some(offset) } =
                &status
            {
                session.last_offset = Some(offset.clone());
            }
            vec![status.to_string()]
        }
    };
    let mut out = io::stdout().lock();
    for line in lines {
        write!(out, "{}{}", line, eol).ok();
    }
    out.flush().ok();
}

fn token_menu(session: &Session) -> Result<()> {
    let tokens = session.api.tokens();
    loop {
        print_lines(&render::token_lines(tokens.cached().as_ref(), now_ms()));
        let items = vec!["Refresh token now", "Clear cached token", "Back"];
        let selection = Select::new()
            .with_prompt("Token")
            .items(&items)
            .default(2)
            .interact()?;
        match selection {
            0 => {
                if let Err(e) = with_spinner("Refreshing token...", || tokens.force_refresh()) {
                    print_error(&e);
                }
            }
            1 => {
                tokens.clear();
                println!("Cached token cleared.");
            }
            _ => return Ok(()),
        }
    }
}

fn prompt_portal(session: &Session) -> Result<u64> {
    let mut input = Input::<u64>::new();
    input.with_prompt("Portal id");
    if let Some(portal_id) = session.default_portal_id {
        input.default(portal_id);
    }
    Ok(input.interact_text()?)
}

fn prompt_list(prompt: &str) -> Result<Vec<String>> {
    let raw: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(split_list(&raw))
}

fn prompt_ids(prompt: &str) -> Result<Vec<u64>> {
    let raw: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            parse_ids(input).map(|_| ())
        })
        .interact_text()?;
    parse_ids(&raw).map_err(anyhow::Error::msg)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_ids(raw: &str) -> std::result::Result<Vec<u64>, String> {
    split_list(raw)
        .into_iter()
        .map(|s| s.parse::<u64>().map_err(|_| format!("{:?} is not a numeric id", s)))
        .collect()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

/// Run `f` while showing a spinner with `message`.
fn with_spinner<T>(message: &str, f: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = f();
    spinner.finish_and_clear();
    result
}

fn print_error(err: &Error) {
    println!("Error: {}", render::describe_error(err));
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
