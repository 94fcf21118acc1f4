//! Offline memory commands.
//!
//! None of these talk to the LLM; times are taken from `--at` or from a time
//! phrase at the end of the text.

use super::{open_store, open_store_with, parse_time, resolve_id};
use chrono::{NaiveDateTime, TimeDelta};
use murmur::assistant::render;
use murmur::intent::split_time_phrase;
use murmur::relevance::ScorerKind;
use murmur::models::time::{format_spoken, format_timestamp, local_now};
use murmur::storage::{JsonFileBackend, LongTermMemory};
use murmur::{
    ClearScope, Error as MurmurError, MemoryStore, MurmurConfig, NewRecord, RecordKind, RecordRef,
    RecordUpdate, ReminderStatus, StoreConfig,
};
use serde_json::{Value, json};
use std::error::Error;
use std::path::PathBuf;

/// Splits `text` into subject and time, using `at` when given.
fn scheduled_text(
    text: &str,
    at: Option<&str>,
    now: NaiveDateTime,
) -> Result<(String, NaiveDateTime), Box<dyn Error>> {
    let (subject, when) = match at {
        Some(at) => (text.trim().to_string(), parse_time(at, now)?),
        None => split_time_phrase(text, now)
            .ok_or_else(|| format!("no time found in '{}'; pass one with --at", text.trim()))?,
    };
    if subject.is_empty() {
        return Err("text cannot be empty".into());
    }
    if when <= now {
        return Err(format!("{} has already passed", format_spoken(when)).into());
    }
    Ok((subject, when))
}

/// Adds a reminder.
pub fn cmd_remind(
    config: &MurmurConfig,
    text: String,
    at: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let now = local_now();
    let (text, due_at) = scheduled_text(&text, at.as_deref(), now)?;
    add_scheduled(config, NewRecord::reminder(text, due_at, now))
}

/// Adds an event.
pub fn cmd_event(
    config: &MurmurConfig,
    title: String,
    at: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let now = local_now();
    let (title, scheduled_at) = scheduled_text(&title, at.as_deref(), now)?;
    add_scheduled(config, NewRecord::event(title, scheduled_at, now))
}

fn add_scheduled(config: &MurmurConfig, record: NewRecord) -> Result<(), Box<dyn Error>> {
    let mut store = open_store(config)?;
    if let Some(existing) = store.find_duplicate(&record) {
        println!("Already scheduled ({})", existing.short());
        store.close()?;
        return Ok(());
    }

    let kind = record.kind();
    let text = record.text().to_string();
    let id = store.add(record)?;
    if let Some(at) = store.get(&id).and_then(|r| r.scheduled_at()) {
        match kind {
            RecordKind::Event => println!("Added event: {text} for {}", format_spoken(at)),
            _ => println!("Set a reminder for {text} at {}", format_spoken(at)),
        }
    }
    println!("  id: {}", id.short());
    store.close()?;
    Ok(())
}

/// Remembers a fact.
pub fn cmd_fact(
    config: &MurmurConfig,
    content: String,
    category: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let mut store = open_store(config)?;
    let record = NewRecord::fact(content.trim(), category, local_now());
    if store.find_duplicate(&record).is_some() {
        println!("Already known: {}", content.trim());
    } else {
        let id = store.add(record)?;
        println!("Noted: {} ({})", content.trim(), id.short());
    }
    store.close()?;
    Ok(())
}

fn record_json(record: RecordRef<'_>) -> Value {
    let mut value = json!({
        "id": record.id().as_str(),
        "kind": record.kind().as_str(),
        "text": record.text(),
        "created_at": format_timestamp(record.created_at()),
    });
    if let Some(at) = record.scheduled_at() {
        value["scheduled_at"] = json!(format_timestamp(at));
    }
    if let RecordRef::Reminder(r) = record {
        value["status"] = json!(r.status.as_str());
    }
    value
}

fn record_line(record: RecordRef<'_>) -> String {
    let when = match record {
        RecordRef::Reminder(r) if r.status == ReminderStatus::Completed => {
            format!("due {}, completed", format_spoken(r.due_at))
        },
        RecordRef::Reminder(r) => format!("due {}", format_spoken(r.due_at)),
        RecordRef::Event(e) => format_spoken(e.scheduled_at),
        RecordRef::Fact(f) => f
            .category
            .clone()
            .unwrap_or_else(|| format!("noted {}", format_spoken(f.created_at))),
        RecordRef::Conversation(c) => format_spoken(c.created_at),
    };
    format!(
        "[{:<12}] {}  {}  ({when})",
        record.kind().as_str(),
        record.id().short(),
        record.text()
    )
}

/// Lists stored records.
pub fn cmd_list(
    config: &MurmurConfig,
    kind: Option<String>,
    all: bool,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let kind = match kind.as_deref() {
        Some(raw) => {
            Some(RecordKind::parse(raw).ok_or_else(|| format!("unknown record kind '{raw}'"))?)
        },
        None => None,
    };

    let store = open_store(config)?;
    let records: Vec<RecordRef<'_>> = store
        .memory()
        .records()
        .filter(|r| kind.is_none_or(|k| r.kind() == k))
        .filter(|r| all || !matches!(r, RecordRef::Reminder(rem) if !rem.is_pending()))
        .collect();

    if json {
        let values: Vec<Value> = records.iter().map(|r| record_json(*r)).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else if records.is_empty() {
        println!("No records.");
    } else {
        for record in &records {
            println!("{}", record_line(*record));
        }
        println!();
        println!("{} records", records.len());
    }
    Ok(())
}

/// Shows the coming week.
pub fn cmd_week(config: &MurmurConfig, json: bool) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let view = store.weekly_view(local_now());
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{}", render::weekly_calendar(&view));
    }
    Ok(())
}

/// Updates a record.
pub fn cmd_update(
    config: &MurmurConfig,
    id: String,
    text: Option<String>,
    at: Option<String>,
    category: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let now = local_now();
    let mut store = open_store(config)?;
    let id = resolve_id(&store, &id)?;

    let mut update = RecordUpdate::new();
    if let Some(text) = text {
        update = update.with_text(text);
    }
    if let Some(at) = at {
        update = update.with_scheduled_at(parse_time(&at, now)?);
    }
    if let Some(category) = category {
        update = update.with_category(category);
    }

    store.update_at(&id, &update, now)?;
    if let Some(record) = store.get(&id) {
        println!("Updated: {}", record_line(record));
    }
    store.close()?;
    Ok(())
}

/// Marks a reminder completed.
pub fn cmd_complete(config: &MurmurConfig, id: String) -> Result<(), Box<dyn Error>> {
    let mut store = open_store(config)?;
    let id = resolve_id(&store, &id)?;
    store.complete(&id, local_now())?;
    println!("Completed {}", id.short());
    store.close()?;
    Ok(())
}

/// Clears reminders or everything.
pub fn cmd_clear(config: &MurmurConfig, scope: String, yes: bool) -> Result<(), Box<dyn Error>> {
    let scope = ClearScope::parse(&scope)
        .ok_or_else(|| format!("unknown scope '{scope}' (expected reminders or all)"))?;
    let mut store = open_store(config)?;

    match store.clear(scope, yes) {
        Ok(outcome) => println!("{}", outcome.summary()),
        Err(e @ MurmurError::ConfirmationRequired { .. }) => {
            eprintln!("Nothing was deleted. Re-run with --yes to confirm.");
            return Err(e.into());
        },
        Err(e) => return Err(e.into()),
    }
    store.close()?;
    Ok(())
}

/// Applies the retention policy.
pub fn cmd_cleanup(config: &MurmurConfig, dry_run: bool) -> Result<(), Box<dyn Error>> {
    let now = local_now();
    let mut store = open_store(config)?;
    let result = if dry_run {
        store.preview_cleanup(now)
    } else {
        store.cleanup(now)?
    };
    println!("{}", result.summary());
    store.close()?;
    Ok(())
}

/// Finds records related to a topic.
pub fn cmd_query(
    config: &MurmurConfig,
    topic: String,
    days: Option<u32>,
    limit: Option<usize>,
    scorer: Option<String>,
    ranked: bool,
) -> Result<(), Box<dyn Error>> {
    let mut store_config = StoreConfig::from_config(config);
    if let Some(limit) = limit {
        store_config = store_config.with_relevance_limit(limit);
    }
    if let Some(name) = scorer {
        let kind = ScorerKind::parse(&name).ok_or_else(|| format!("unknown scorer: {name}"))?;
        store_config = store_config.with_scorer(kind);
    }
    let store = open_store_with(config, store_config)?;
    let window = days.map_or_else(
        || config.retention.context_window(),
        |d| TimeDelta::days(i64::from(d)),
    );

    let query = store.query_relevant(&topic, window, local_now());
    let matches = if ranked {
        query.ranked()
    } else {
        query.iter().collect()
    };

    if matches.is_empty() {
        println!("No related memories found.");
        return Ok(());
    }
    for m in &matches {
        println!("{:.2}  {}", m.score, record_line(m.record));
    }
    Ok(())
}

/// Shows the contextual view, intent display, and memory summary.
pub fn cmd_context(config: &MurmurConfig, json: bool) -> Result<(), Box<dyn Error>> {
    let now = local_now();
    let mut store = open_store(config)?;
    store.refresh_context(now);

    if json {
        println!("{}", serde_json::to_string_pretty(store.context())?);
        return Ok(());
    }
    println!("{}", render::relevant_memories(store.context()));
    println!();
    println!("{}", render::intent_display(store.memory(), now));
    println!();
    println!("{}", render::memory_summary(store.memory(), now));
    Ok(())
}

/// Counts from an import.
#[derive(Debug, Default)]
struct ImportCounts {
    imported: usize,
    skipped: usize,
}

/// Merges every record of `source` into `store`, skipping duplicates.
fn merge_records(
    store: &mut MemoryStore<JsonFileBackend>,
    source: LongTermMemory,
) -> Result<ImportCounts, Box<dyn Error>> {
    let mut counts = ImportCounts::default();
    let mut records: Vec<(NewRecord, Option<NaiveDateTime>)> = Vec::new();

    for r in source.reminders {
        let completed = (!r.is_pending()).then_some(r.completed_at.unwrap_or(r.due_at));
        records.push((
            NewRecord::reminder(r.text, r.due_at, r.created_at).with_id(r.id),
            completed,
        ));
    }
    for e in source.events {
        records.push((
            NewRecord::event(e.title, e.scheduled_at, e.created_at).with_id(e.id),
            None,
        ));
    }
    for f in source.facts {
        records.push((
            NewRecord::fact(f.content, f.category, f.created_at).with_id(f.id),
            None,
        ));
    }
    for c in source.conversations {
        records.push((
            NewRecord::conversation(c.utterance, c.response, c.action, c.created_at).with_id(c.id),
            None,
        ));
    }

    for (record, completed) in records {
        let known = record.id.as_ref().is_some_and(|id| store.get(id).is_some());
        if known || store.find_duplicate(&record).is_some() {
            counts.skipped += 1;
            continue;
        }
        let id = store.add(record)?;
        if let Some(at) = completed {
            store.complete(&id, at)?;
        }
        counts.imported += 1;
    }
    Ok(counts)
}

/// Imports a memory file in any known layout.
pub fn cmd_import(config: &MurmurConfig, path: PathBuf) -> Result<(), Box<dyn Error>> {
    let source = JsonFileBackend::new(&path);
    let Some((document, layout)) = source.load_with_layout()? else {
        return Err(format!("{} does not exist", path.display()).into());
    };

    let mut store = open_store_with(
        config,
        StoreConfig::from_config(config).with_write_through(false),
    )?;
    let counts = merge_records(&mut store, document.long_term)?;
    store.close()?;

    println!(
        "Imported {} records from {} ({:?} layout), skipped {} duplicates",
        counts.imported,
        path.display(),
        layout,
        counts.skipped
    );
    Ok(())
}
