//!
//! src/report.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Joins the aggregated statistics with catalog metadata and renders
//! them as a text report with bar charts, or as json
//!

use std::fmt::{self, Write};

use serde::Serialize;

use crate::catalog::{ArtistSearch, CatalogLookup};
use crate::errors::StatsError;
use crate::stats::{ArtistRank, DailyBucket, GenreCount, Stats, Summary, TrackRank, genre_counts};
use crate::types::{ArtistMetadata, MS_PER_MINUTE};

const BAR_WIDTH: usize = 40;
const BAR: char = '█';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json
}

/// A ranked artist as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistEntry {
    pub rank: usize,
    pub artist: String,
    pub catalog_name: Option<String>,
    pub image_url: Option<String>,
    pub genres: Vec<String>,
    pub value: i64
}

impl ArtistEntry {
    fn new(rank: usize, ranked: &ArtistRank, meta: &ArtistMetadata) -> Self {
        Self {
            rank,
            artist: ranked.artist.clone(),
            catalog_name: meta.name.clone(),
            image_url: meta.image_url().map(str::to_string),
            genres: meta.genres.clone(),
            value: ranked.value
        }
    }

    /// Catalog spelling when the lookup matched, history spelling otherwise
    pub fn display_name(&self) -> &str {
        self.catalog_name.as_deref().unwrap_or(&self.artist)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub top_tracks: Vec<TrackRank>,
    pub artists_by_plays: Vec<ArtistEntry>,
    pub artists_by_time: Vec<ArtistEntry>,
    pub artists_by_tracks: Vec<ArtistEntry>,
    pub genres: Vec<GenreCount>,
    pub daily_plays: Vec<DailyBucket>,
    pub daily_minutes: Vec<DailyBucket>
}

impl Report {
    ///
    /// Looks up every ranked artist one after the other, the catalog
    /// cache keeps names shared between rankings to a single search.
    /// Genres come from the artists ranked by listening time.
    ///
    pub async fn assemble<S: ArtistSearch>(
        stats: Stats,
        catalog: &mut CatalogLookup<S>,
        genre_limit: usize
    ) -> Report {
        let artists_by_plays = entries(&stats.top_artists_by_plays, catalog).await;
        let artists_by_time = entries(&stats.top_artists_by_time, catalog).await;
        let artists_by_tracks = entries(&stats.top_artists_by_tracks, catalog).await;

        let mut by_time_meta = Vec::with_capacity(stats.top_artists_by_time.len());
        for ranked in &stats.top_artists_by_time {
            by_time_meta.push(catalog.lookup(&ranked.artist).await);
        }
        let genres = genre_counts(&by_time_meta, genre_limit);

        Report {
            summary: stats.summary,
            top_tracks: stats.top_tracks,
            artists_by_plays,
            artists_by_time,
            artists_by_tracks,
            genres,
            daily_plays: stats.daily_plays,
            daily_minutes: stats.daily_minutes
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, StatsError> {
        match format {
            OutputFormat::Text => render_text(self),
            OutputFormat::Json => render_json(self)
        }
    }
}

async fn entries<S: ArtistSearch>(
    ranking: &[ArtistRank],
    catalog: &mut CatalogLookup<S>
) -> Vec<ArtistEntry> {
    let mut out = Vec::with_capacity(ranking.len());
    for (idx, ranked) in ranking.iter().enumerate() {
        let meta = catalog.lookup(&ranked.artist).await;
        out.push(ArtistEntry::new(idx + 1, ranked, &meta));
    }
    out
}

pub fn render_json(report: &Report) -> Result<String, StatsError> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn bar(value: i64, max: i64) -> String {
    if max <= 0 || value <= 0 {
        return String::new();
    }
    let len = ((value as f64 / max as f64) * BAR_WIDTH as f64).round() as usize;
    std::iter::repeat(BAR).take(len.max(1)).collect()
}

/// Horizontal bar chart, labels left aligned to the longest one
fn bar_chart(out: &mut String, rows: &[(String, i64)]) -> fmt::Result {
    let width = rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    let max = rows.iter().map(|(_, value)| *value).max().unwrap_or(0);
    for (label, value) in rows {
        let pad = width - label.chars().count();
        writeln!(out, "  {label}{} | {} {value}", " ".repeat(pad), bar(*value, max))?;
    }
    Ok(())
}

fn artist_list(
    out: &mut String,
    entries: &[ArtistEntry],
    describe: impl Fn(i64) -> String
) -> fmt::Result {
    for entry in entries {
        writeln!(out, "  {}. {}", entry.rank, entry.display_name())?;
        writeln!(out, "     {}", describe(entry.value))?;
        if let Some(url) = &entry.image_url {
            writeln!(out, "     {url}")?;
        }
    }
    Ok(())
}

fn heading(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "\n{title}\n{}", "-".repeat(title.chars().count()))
}

fn histogram(out: &mut String, buckets: &[DailyBucket]) -> fmt::Result {
    let rows: Vec<(String, i64)> = buckets.iter()
        .map(|b| (b.day.format("%Y-%m-%d").to_string(), b.value))
        .collect();
    bar_chart(out, &rows)
}

fn summary(out: &mut String, s: &Summary) -> fmt::Result {
    match (s.first_play, s.last_play) {
        (Some(first), Some(last)) => writeln!(out, "Period: {first} > {last}")?,
        _ => writeln!(out, "Period: no plays")?
    }
    writeln!(
        out,
        "Tracks played: {}   Artists played: {}   Hours played: {:.1}h",
        s.distinct_tracks, s.distinct_artists, s.hours_played()
    )
}

fn genre_list(out: &mut String, genres: &[GenreCount]) -> fmt::Result {
    if genres.is_empty() {
        writeln!(out, "  no genre information for your top artists")?;
    }
    for g in genres {
        writeln!(out, "  - {} ({})", g.genre, g.count)?;
    }
    Ok(())
}

fn write_text(out: &mut String, report: &Report) -> fmt::Result {
    summary(out, &report.summary)?;

    heading(out, "Top tracks")?;
    let rows: Vec<(String, i64)> = report.top_tracks.iter()
        .map(|t| (t.label(), t.plays))
        .collect();
    bar_chart(out, &rows)?;

    heading(out, "Top artists (plays)")?;
    artist_list(out, &report.artists_by_plays, |v| format!("played {v} times"))?;

    heading(out, "Top artists (listening time)")?;
    artist_list(out, &report.artists_by_time, |ms| {
        format!("{:.0} minutes listened", ms as f64 / MS_PER_MINUTE as f64)
    })?;

    heading(out, "Top artists (distinct tracks)")?;
    artist_list(out, &report.artists_by_tracks, |v| format!("{v} different tracks"))?;

    heading(out, "Preferred genres")?;
    genre_list(out, &report.genres)?;

    heading(out, "Plays per day")?;
    histogram(out, &report.daily_plays)?;

    heading(out, "Minutes per day")?;
    histogram(out, &report.daily_minutes)
}

pub fn render_text(report: &Report) -> Result<String, StatsError> {
    let mut out = String::new();
    write_text(&mut out, report)?;
    Ok(out)
}
