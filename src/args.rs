use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

use crate::background::BackgroundStyle;
use crate::layout::AspectRatio;
use crate::text_style::FontStyle;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum AspectArg {
    #[value(name = "3x4")]
    Portrait,
    #[value(name = "9x16")]
    Story,
    Screen,
}

impl From<AspectArg> for AspectRatio {
    fn from(v: AspectArg) -> Self {
        match v {
            AspectArg::Portrait => AspectRatio::Portrait,
            AspectArg::Story => AspectRatio::Story,
            AspectArg::Screen => AspectRatio::DeviceScreen,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackgroundArg {
    Blur,
    Average,
    Gradient,
}

impl From<BackgroundArg> for BackgroundStyle {
    fn from(v: BackgroundArg) -> Self {
        match v {
            BackgroundArg::Blur => BackgroundStyle::Blur,
            BackgroundArg::Average => BackgroundStyle::AverageColor,
            BackgroundArg::Gradient => BackgroundStyle::Gradient,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FontArg {
    Standard,
    Mono,
}

impl From<FontArg> for FontStyle {
    fn from(v: FontArg) -> Self {
        match v {
            FontArg::Standard => FontStyle::Standard,
            FontArg::Mono => FontStyle::Monospaced,
        }
    }
}

#[derive(Parser)]
#[command(name = "release-card")]
#[command(about = "Compose shareable promo cards from music release artwork")]
pub struct Args {
    /// Settings file (defaults to settings.json in the config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Render a card from artwork and release metadata
    Render(RenderArgs),

    /// Look up release metadata by catalog id or link and print it as JSON
    Lookup {
        /// Catalog id or link
        identifier: String,
    },

    /// Inspect or prune previously rendered cards
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(clap::Args)]
pub struct RenderArgs {
    /// Artwork image path
    #[arg(short, long)]
    pub image: PathBuf,

    /// Output image path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Catalog id or link to fetch metadata from
    #[arg(short, long)]
    pub lookup: Option<String>,

    /// Title (overrides the looked-up one)
    #[arg(long)]
    pub title: Option<String>,

    /// Artist (overrides the looked-up one)
    #[arg(long)]
    pub artist: Option<String>,

    /// Genre (overrides the looked-up one)
    #[arg(long)]
    pub genre: Option<String>,

    /// Release year (overrides the looked-up one)
    #[arg(long)]
    pub year: Option<String>,

    /// Output aspect ratio
    #[arg(short, long, value_enum, default_value = "3x4")]
    pub aspect: AspectArg,

    /// Background treatment
    #[arg(short, long, value_enum, default_value = "blur")]
    pub background: BackgroundArg,

    /// Font style
    #[arg(short, long, value_enum, default_value = "standard")]
    pub font: FontArg,

    /// Text to encode in a QR badge (no badge when omitted)
    #[arg(short, long)]
    pub qr: Option<String>,

    /// Render every aspect ratio, suffixing the output file name
    #[arg(long)]
    pub all_profiles: bool,

    /// Do not record the card in history
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List saved cards, newest first
    List,

    /// Delete one saved card
    Remove { id: Uuid },

    /// Delete every saved card
    Clear,
}
