mod browser;
mod catalog;
mod deeplink;
mod display;
mod playback;
mod player;
mod progress;
mod sequence;
mod settings;
mod tui;


use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, warn};

use crate::cli::{CheckArgs, Cli, CollectionArgs, Command, PlayArgs};
use crate::db::{BookmarkRecord, Database};
use crate::http::{ProbeConfig, ProbeOutcome, probe};
use crate::paths::database_file_path;

use self::browser::CatalogBrowser;
use self::catalog::{Catalog, Collection};
use self::deeplink::DeepLink;
use self::display::{format_saved_at, resume_label, truncate};
use self::playback::PlaybackEvent;
use self::player::{AudioOutput, CategoryBrowser, Player, ProcessAudio};
use self::progress::{BookmarkKey, ProgressStore};
use self::settings::Settings;

const HEADLESS_TICK: Duration = Duration::from_millis(50);

pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(cli.catalog)?;
    let mut store = open_store();

    match cli.command {
        Some(Command::Play(args)) => run_play(&settings, store, &args)?,
        Some(Command::Resume { index }) => run_resume(&settings, store, index)?,
        Some(Command::List) => run_list(&store),
        Some(Command::Forget { index }) => run_forget(&mut store, index)?,
        Some(Command::Link { index }) => run_link(&store, index)?,
        Some(Command::Categories(args)) => run_categories(&settings, &args)?,
        Some(Command::Check(args)) => run_check(&settings, &args)?,
        Some(Command::Tui(args)) => tui::run_tui(&settings, store, &args)?,
        None => tui::run_tui(&settings, store, &CollectionArgs::default())?,
    }

    Ok(())
}

fn open_store() -> ProgressStore {
    match open_db() {
        Ok(db) => ProgressStore::open(db),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "resume points will not be saved this session");
            ProgressStore::detached()
        }
    }
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}

fn load_catalog(settings: &Settings) -> Result<Catalog> {
    Catalog::load(&settings.catalog_path)
}

pub(crate) fn collection_from_args(args: &CollectionArgs) -> Result<Option<Collection>> {
    match (args.dialect.as_deref(), args.level.as_deref()) {
        (Some(dialect), Some(level)) => Ok(Some(Collection::from_codes(dialect, level)?)),
        (None, None) => Ok(None),
        _ => bail!("--dialect and --level must be given together"),
    }
}

fn resolve_play_target(catalog: &Catalog, args: &PlayArgs) -> Result<DeepLink> {
    let mut target = match args.link.as_deref() {
        Some(link) => DeepLink::parse(link)?,
        None => {
            let collection = collection_from_args(&args.collection)?
                .ok_or_else(|| anyhow!("pass --link, or --dialect and --level"))?;
            let category = match &args.category {
                Some(category) => category.clone(),
                None => catalog
                    .require(collection)?
                    .categories
                    .first()
                    .cloned()
                    .ok_or_else(|| anyhow!("collection {collection} has no categories"))?,
            };
            DeepLink {
                collection,
                category,
                row_id: None,
            }
        }
    };

    if let Some(row) = &args.row {
        target.row_id = Some(
            sequence::normalize_row_id(row).ok_or_else(|| anyhow!("not a row number: {row}"))?,
        );
    }
    Ok(target)
}

fn run_play(settings: &Settings, store: ProgressStore, args: &PlayArgs) -> Result<()> {
    let catalog = load_catalog(settings)?;
    let target = resolve_play_target(&catalog, args)?;
    play_target(settings, catalog, store, &target)
}

fn run_resume(settings: &Settings, store: ProgressStore, index: usize) -> Result<()> {
    let record = nth_resume_point(&store, index)?;
    let target = DeepLink::from_bookmark(&record)?;
    println!(
        "Resuming {} / {} {}",
        collection_name(&record.collection_id),
        record.sub_collection_id,
        resume_label(&record.row_id, &record.percentage)
    );
    let catalog = load_catalog(settings)?;
    play_target(settings, catalog, store, &target)
}

fn play_target(
    settings: &Settings,
    catalog: Catalog,
    store: ProgressStore,
    target: &DeepLink,
) -> Result<()> {
    let browser = CatalogBrowser::new(catalog, target.collection, settings.media_base.clone())?;
    let audio = ProcessAudio::new(
        settings.audio_command.clone(),
        settings.start_marker.clone(),
    )?;
    let mut player = Player::new(audio, browser, store, settings.notices.clone())
        .with_settle_delay(settings.settle_delay);

    player.select(&target.category)?;
    let start = match &target.row_id {
        Some(row) => player
            .machine()
            .context()
            .and_then(|context| context.sequence.index_of_row(row))
            .with_context(|| format!("row {row} is not in {}", target.category))?,
        None => 0,
    };
    let empty = player
        .machine()
        .context()
        .is_none_or(|context| context.is_empty());
    if !empty {
        let rows = player
            .machine()
            .context()
            .map_or(0, |context| context.sequence.row_count());
        info!(collection = %target.collection, category = %target.category, rows, start, "starting playback");
        player.submit(PlaybackEvent::PlayFrom { index: start });
    }
    play_headless(&mut player);
    Ok(())
}

/// Drives the player until playback has ended and the last cue has finished.
fn play_headless<A: AudioOutput, B: CategoryBrowser>(player: &mut Player<A, B>) {
    let mut last_line = None::<String>;
    loop {
        player.pump();
        for message in player.take_messages() {
            println!("{message}");
        }

        let machine = player.machine();
        if let (Some(context), Some(row)) = (machine.context(), machine.sounding_row()) {
            let line = format!(
                "{} / {} {}",
                collection_name(&context.collection_id),
                context.sub_collection_id,
                resume_label(row, &context.sequence.percentage_for_row(row))
            );
            if last_line.as_deref() != Some(line.as_str()) {
                println!("{line}");
                last_line = Some(line);
            }
        }

        if player.is_settled() {
            break;
        }
        thread::sleep(HEADLESS_TICK);
    }
    println!("Playback finished.");
}

fn nth_resume_point(store: &ProgressStore, index: usize) -> Result<BookmarkRecord> {
    let points = store.list();
    if points.is_empty() {
        bail!("no resume points saved yet");
    }
    index
        .checked_sub(1)
        .and_then(|i| points.get(i))
        .cloned()
        .ok_or_else(|| anyhow!("no resume point #{index} (there are {})", points.len()))
}

pub(crate) fn collection_name(collection_id: &str) -> String {
    Collection::from_id(collection_id)
        .map(|collection| collection.to_string())
        .unwrap_or_else(|| collection_id.to_string())
}

fn run_list(store: &ProgressStore) {
    let points = store.list();
    if points.is_empty() {
        println!("No resume points yet. Play a category with `vocab-player play` first.");
        return;
    }

    println!(
        "{:<3} {:<28} {:<24} {:<6} {:<9} {:<24}",
        "#", "COLLECTION", "CATEGORY", "ROW", "PROGRESS", "SAVED"
    );
    for (i, record) in points.iter().enumerate() {
        println!(
            "{:<3} {:<28} {:<24} {:<6} {:<9} {:<24}",
            i + 1,
            truncate(&collection_name(&record.collection_id), 28),
            truncate(&record.sub_collection_id, 24),
            record.row_id,
            format!("{}%", record.percentage),
            format_saved_at(record.timestamp)
        );
    }
}

fn run_forget(store: &mut ProgressStore, index: usize) -> Result<()> {
    let record = nth_resume_point(store, index)?;
    let key = BookmarkKey::of(&record);
    store.remove(&key.collection_id, &key.sub_collection_id);
    println!(
        "Forgot resume point: {} / {} {}",
        collection_name(&record.collection_id),
        record.sub_collection_id,
        resume_label(&record.row_id, &record.percentage)
    );
    Ok(())
}

fn run_link(store: &ProgressStore, index: usize) -> Result<()> {
    let record = nth_resume_point(store, index)?;
    println!("{}", DeepLink::from_bookmark(&record)?);
    Ok(())
}

fn run_categories(settings: &Settings, args: &CollectionArgs) -> Result<()> {
    let catalog = load_catalog(settings)?;
    match collection_from_args(args)? {
        Some(collection) => {
            let data = catalog.require(collection)?;
            println!("{collection} ({})", collection.id());
            println!("{:<32} {:>6}", "CATEGORY", "ROWS");
            for category in &data.categories {
                println!(
                    "{:<32} {:>6}",
                    truncate(category, 32),
                    data.rows_in(category).len()
                );
            }
        }
        None => {
            if catalog.collections().is_empty() {
                println!("The catalog has no collections.");
                return Ok(());
            }
            println!("{:<6} {:<28} {:>10} {:>6}", "ID", "COLLECTION", "CATEGORIES", "ROWS");
            for data in catalog.collections() {
                println!(
                    "{:<6} {:<28} {:>10} {:>6}",
                    data.collection.id(),
                    data.collection.to_string(),
                    data.categories.len(),
                    data.rows.len()
                );
            }
        }
    }
    Ok(())
}

fn run_check(settings: &Settings, args: &CheckArgs) -> Result<()> {
    let catalog = load_catalog(settings)?;
    let collection = collection_from_args(&args.collection)?
        .ok_or_else(|| anyhow!("--dialect and --level are required"))?;
    let mut browser = CatalogBrowser::new(catalog, collection, settings.media_base.clone())?;
    let context = browser.open(&args.category)?;

    let playable: Vec<_> = context
        .sequence
        .units()
        .iter()
        .filter(|unit| unit.is_playable())
        .filter_map(|unit| unit.source.as_deref().map(|source| (unit, source)))
        .collect();
    println!(
        "Checking {} audio files in {collection} / {}",
        playable.len(),
        args.category
    );

    let config = ProbeConfig {
        attempts: args.attempts.max(1),
        ..ProbeConfig::default()
    };
    let mut unreachable = 0usize;
    for (unit, source) in playable {
        let outcome = probe(source, &config);
        if outcome.is_reachable() {
            continue;
        }
        unreachable += 1;
        let detail = match outcome {
            ProbeOutcome::Rejected { status, attempts } => {
                format!("HTTP {status} after {attempts} attempt(s)")
            }
            ProbeOutcome::Unreachable { attempts, reason } => {
                format!("{reason} after {attempts} attempt(s)")
            }
            ProbeOutcome::Reachable(status) => format!("HTTP {status}"),
        };
        println!("#{} {:?}: {detail} {source}", unit.row_id, unit.kind);
    }

    if unreachable == 0 {
        println!("All audio files are reachable.");
    } else {
        println!("{unreachable} audio files are unreachable.");
    }
    Ok(())
}
