mod args;
mod background;
mod color;
mod composite;
mod config;
mod error;
mod fonts;
mod history;
mod layout;
mod metadata;
mod qr;
mod raster;
mod surface;
mod text_style;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use args::{Args, Command, HistoryAction, RenderArgs};
use clap::Parser;
use composite::{decode_artwork, Compositor, StyleOptions};
use config::Settings;
use fonts::FontBook;
use history::HistoryStore;
use layout::AspectRatio;
use metadata::{MetadataClient, MusicMetadata, ReleaseKind};
use raster::RasterBackend;
use rayon::prelude::*;
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "{log_level},reqwest=warn,hyper=warn"
        )))
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::load(args.config.as_deref())?;

    match args.command {
        Command::Render(render) => run_render(&settings, &render),
        Command::Lookup { identifier } => {
            let metadata = MetadataClient::new(&settings).fetch(&identifier)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
        Command::History { action } => run_history(&settings, action),
    }
}

fn run_render(settings: &Settings, args: &RenderArgs) -> Result<()> {
    let metadata = resolve_metadata(settings, args)?;

    println!("Loading image: {}", args.image.display());
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let artwork = decode_artwork(&bytes)?;

    let fonts = Arc::new(FontBook::load(&settings.fonts));
    let compositor = Compositor::new(RasterBackend::new(fonts), settings.device_screen_ratio);

    let base = StyleOptions {
        aspect_ratio: args.aspect.into(),
        background_style: args.background.into(),
        font_style: args.font.into(),
        qr_visible: args.qr.is_some(),
        qr_payload: args.qr.clone().unwrap_or_default(),
    };

    let jobs: Vec<(StyleOptions, PathBuf)> = if args.all_profiles {
        AspectRatio::ALL
            .iter()
            .map(|&aspect_ratio| {
                (
                    StyleOptions {
                        aspect_ratio,
                        ..base.clone()
                    },
                    profile_output(&args.output, aspect_ratio),
                )
            })
            .collect()
    } else {
        vec![(base, args.output.clone())]
    };

    // Renders share nothing mutable, so profiles go out in parallel.
    let cards = jobs
        .into_par_iter()
        .map(|(options, path)| -> Result<_, error::CompositionError> {
            let card = compositor.render(&artwork, &metadata, &options)?;
            Ok((options, path, card))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let history = (!args.no_history).then(|| HistoryStore::new(settings.history_dir()));
    for (options, path, card) in cards {
        card.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved to: {}", path.display());

        if let Some(history) = &history {
            history.save(&card, &metadata, &options);
        }
    }

    Ok(())
}

fn resolve_metadata(settings: &Settings, args: &RenderArgs) -> Result<MusicMetadata> {
    let mut metadata = match &args.lookup {
        Some(identifier) => MetadataClient::new(settings).fetch(identifier)?,
        None => {
            if args.title.is_none() || args.artist.is_none() {
                bail!("Either --lookup or both --title and --artist are required");
            }
            MusicMetadata {
                kind: ReleaseKind::Track,
                artist_name: String::new(),
                display_name: String::new(),
                genre: String::new(),
                release_year: String::new(),
            }
        }
    };

    if let Some(title) = &args.title {
        metadata.display_name = title.clone();
    }
    if let Some(artist) = &args.artist {
        metadata.artist_name = artist.clone();
    }
    if let Some(genre) = &args.genre {
        metadata.genre = genre.clone();
    }
    if let Some(year) = &args.year {
        metadata.release_year = year.clone();
    }

    info!(
        "Composing card for \"{}\" by {}",
        metadata.display_name, metadata.artist_name
    );
    Ok(metadata)
}

/// `card.png` becomes `card-9x16.png` and so on.
fn profile_output(output: &Path, aspect: AspectRatio) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "card".to_string());
    let ext = output
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    output.with_file_name(format!("{stem}-{}.{ext}", aspect.label()))
}

fn run_history(settings: &Settings, action: HistoryAction) -> Result<()> {
    let store = HistoryStore::new(settings.history_dir());
    match action {
        HistoryAction::List => {
            let entries = store.load()?;
            if entries.is_empty() {
                println!("No saved cards in {}", store.dir().display());
            }
            for entry in entries {
                println!(
                    "{}  {}  {} - {}  [{:?}, {:?}]  {}",
                    entry.id,
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.metadata.artist_name,
                    entry.metadata.display_name,
                    entry.options.aspect_ratio,
                    entry.options.background_style,
                    store.image_path(&entry).display(),
                );
            }
        }
        HistoryAction::Remove { id } => {
            if store.remove(id)? {
                println!("Removed {id}");
            } else {
                bail!("No saved card with id {id}");
            }
        }
        HistoryAction::Clear => {
            let removed = store.clear()?;
            println!("Removed {removed} saved card(s)");
        }
    }
    Ok(())
}
