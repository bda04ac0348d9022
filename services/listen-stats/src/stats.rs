//!
//! src/stats.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Aggregates a cleaned history into rankings, summary metrics and
//! daily histograms
//!

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use chrono::NaiveDate;
use serde::Serialize;

use crate::history::History;
use crate::types::{ArtistMetadata, Play};

///
/// Running totals that remember first-seen order, so a stable sort on
/// the total breaks ties by order of appearance.
///
struct Tally<K> {
    order: Vec<(K, i64)>,
    index: HashMap<K, usize>
}

impl<K: Eq + Hash + Clone> Tally<K> {
    fn new() -> Self {
        Self { order: Vec::new(), index: HashMap::new() }
    }

    fn add(&mut self, key: K, amount: i64) {
        match self.index.get(&key) {
            Some(&slot) => self.order[slot].1 += amount,
            None => {
                self.index.insert(key.clone(), self.order.len());
                self.order.push((key, amount));
            }
        }
    }

    fn top(self, n: usize) -> Vec<(K, i64)> {
        let mut ranked = self.order;
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRank {
    pub artist: String,
    pub track: String,
    pub plays: i64
}

impl TrackRank {
    pub fn label(&self) -> String {
        format!("{} - {}", self.track, self.artist)
    }
}

/// `value` is whatever the ranking sorts on (plays, ms or tracks)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistRank {
    pub artist: String,
    pub value: i64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyBucket {
    pub day: NaiveDate,
    pub value: i64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreCount {
    pub genre: String,
    pub count: i64
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub first_play: Option<NaiveDate>,
    pub last_play: Option<NaiveDate>,
    pub plays: usize,
    pub distinct_tracks: usize,
    pub distinct_artists: usize,
    pub minutes_played: i64
}

impl Summary {
    pub fn hours_played(&self) -> f64 {
        self.minutes_played as f64 / 60.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub summary: Summary,
    pub top_tracks: Vec<TrackRank>,
    pub top_artists_by_plays: Vec<ArtistRank>,
    pub top_artists_by_time: Vec<ArtistRank>,
    pub top_artists_by_tracks: Vec<ArtistRank>,
    pub daily_plays: Vec<DailyBucket>,
    pub daily_minutes: Vec<DailyBucket>
}

impl Stats {
    pub fn compute(history: &History, top_n: usize) -> Stats {
        let plays = history.plays();

        let mut tracks = Tally::new();
        let mut artist_plays = Tally::new();
        let mut artist_ms = Tally::new();
        let mut artist_tracks = Tally::new();
        let mut seen_tracks = HashSet::new();

        for play in plays {
            let artist = play.artist_name.as_str();
            tracks.add((artist, play.track_name.as_str()), 1);
            artist_plays.add(artist, 1);
            artist_ms.add(artist, play.ms_played);
            if seen_tracks.insert((artist, play.track_name.as_str())) {
                artist_tracks.add(artist, 1);
            }
        }

        let summary = Summary {
            first_play: plays.iter().map(|p| p.play_date.date()).min(),
            last_play: plays.iter().map(|p| p.play_date.date()).max(),
            plays: plays.len(),
            distinct_tracks: seen_tracks.len(),
            distinct_artists: artist_plays.order.len(),
            minutes_played: plays.iter().map(|p| p.min_played).sum()
        };

        let top_tracks = tracks.top(top_n)
            .into_iter()
            .map(|((artist, track), plays)| TrackRank {
                artist: artist.to_string(),
                track: track.to_string(),
                plays
            })
            .collect();

        Stats {
            summary,
            top_tracks,
            top_artists_by_plays: artist_ranks(artist_plays, top_n),
            top_artists_by_time: artist_ranks(artist_ms, top_n),
            top_artists_by_tracks: artist_ranks(artist_tracks, top_n),
            daily_plays: daily(plays, |_| 1),
            daily_minutes: daily(plays, |p| p.min_played)
        }
    }
}

fn artist_ranks(tally: Tally<&str>, n: usize) -> Vec<ArtistRank> {
    tally.top(n)
        .into_iter()
        .map(|(artist, value)| ArtistRank { artist: artist.to_string(), value })
        .collect()
}

/// One bucket per calendar day from the first play to the last
fn daily(plays: &[Play], value: impl Fn(&Play) -> i64) -> Vec<DailyBucket> {
    let mut buckets: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for play in plays {
        *buckets.entry(play.play_date.date()).or_default() += value(play);
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back())
    else {
        return Vec::new();
    };

    first.iter_days()
        .take_while(|day| *day <= last)
        .map(|day| DailyBucket { day, value: buckets.get(&day).copied().unwrap_or(0) })
        .collect()
}

///
/// Genre frequency over a set of artists, each artist counting each of
/// its genres once. Most common first, ties in first-seen order.
///
pub fn genre_counts<'a>(
    artists: impl IntoIterator<Item = &'a ArtistMetadata>,
    limit: usize
) -> Vec<GenreCount> {
    let mut tally = Tally::new();
    for artist in artists {
        let mut own = HashSet::new();
        for genre in &artist.genres {
            if own.insert(genre.as_str()) {
                tally.add(genre.as_str(), 1);
            }
        }
    }

    tally.top(limit)
        .into_iter()
        .map(|(genre, count)| GenreCount { genre: genre.to_string(), count })
        .collect()
}
