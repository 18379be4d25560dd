//! Catalog loading and filtered views
//!
//! The catalog is read once from the enrichment pipeline's CSV output and is
//! immutable afterwards. Presentation-side filters produce [`CatalogView`]s,
//! which borrow rows from the catalog instead of copying them, so every
//! scoring strategy sees the same records (and the same feature space).

use crate::error::{RecommendError, Result};
use crate::types::{dedup_tags, fractional_popularity, Game, ItemId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

const REQUIRED_COLUMNS: [&str; 6] = ["id", "name", "genre", "tags", "rating", "ratings_count"];
const ENRICHED_TEXT_COLUMN: &str = "enriched_sinopsis";
const SHORT_TEXT_COLUMN: &str = "sinopsis";
/// Placeholder the enrichment pipeline writes for games it could not tag
const NO_TAGS_PLACEHOLDER: &str = "No tags";
const MAX_RATING: f32 = 5.0;

/// The full, immutable game catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    games: Vec<Game>,
    index: HashMap<ItemId, usize>,
}

impl Catalog {
    /// Build a catalog from already-typed records.
    ///
    /// Fails with `MalformedCatalog` when two records share an id.
    pub fn from_games(games: Vec<Game>) -> Result<Self> {
        let mut index = HashMap::with_capacity(games.len());
        for (position, game) in games.iter().enumerate() {
            if index.insert(game.id, position).is_some() {
                return Err(RecommendError::malformed(format!(
                    "duplicate game id {}",
                    game.id
                )));
            }
        }
        Ok(Self { games, index })
    }

    /// Load the catalog from a CSV file
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Parse the catalog from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let start = std::time::Instant::now();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let columns = ColumnMap::resolve(&headers)?;

        let mut games = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            games.push(columns.parse_row(&record, row + 1)?);
        }

        let catalog = Self::from_games(games)?;
        info!(
            games = catalog.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Game> {
        self.index.get(&id).map(|&position| &self.games[position])
    }

    /// Row position of a game id, i.e. its row in the feature matrix
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// View over every game, in catalog order
    pub fn view(&self) -> CatalogView<'_> {
        CatalogView {
            catalog: self,
            rows: (0..self.games.len()).collect(),
        }
    }

    /// View over the games accepted by `filter`, in catalog order
    pub fn filter(&self, filter: &ViewFilter) -> CatalogView<'_> {
        let rows = self
            .games
            .iter()
            .enumerate()
            .filter(|(_, game)| filter.matches(game))
            .map(|(position, _)| position)
            .collect();
        CatalogView {
            catalog: self,
            rows,
        }
    }

    /// View over an explicit id list, in the given order
    pub fn select(&self, ids: &[ItemId]) -> Result<CatalogView<'_>> {
        let rows = ids
            .iter()
            .map(|id| {
                self.position(*id)
                    .ok_or_else(|| RecommendError::not_found(format!("game id {id}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CatalogView {
            catalog: self,
            rows,
        })
    }

    /// Sorted distinct genres of the full catalog
    pub fn genres(&self) -> Vec<String> {
        self.games
            .iter()
            .map(|game| game.genre.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Header positions of the columns the loader reads
struct ColumnMap {
    id: usize,
    name: usize,
    genre: usize,
    tags: usize,
    rating: usize,
    ratings_count: usize,
    text: usize,
    rawg_id: Option<usize>,
    released: Option<usize>,
    background_image: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| position(column).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(RecommendError::malformed(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }

        let text = position(ENRICHED_TEXT_COLUMN)
            .or_else(|| position(SHORT_TEXT_COLUMN))
            .ok_or_else(|| {
                RecommendError::malformed(format!(
                    "missing text column: expected '{ENRICHED_TEXT_COLUMN}' or '{SHORT_TEXT_COLUMN}'"
                ))
            })?;

        // Presence was checked above
        let required = |name: &str| position(name).unwrap_or_default();

        Ok(Self {
            id: required("id"),
            name: required("name"),
            genre: required("genre"),
            tags: required("tags"),
            rating: required("rating"),
            ratings_count: required("ratings_count"),
            text,
            rawg_id: position("rawg_id"),
            released: position("released"),
            background_image: position("background_image"),
        })
    }

    fn parse_row(&self, record: &csv::StringRecord, row: usize) -> Result<Game> {
        let field = |index: usize| record.get(index).unwrap_or("").trim();
        let optional = |index: Option<usize>| index.map(field).filter(|v| !v.is_empty());

        let id = parse_integer(field(self.id)).ok_or_else(|| {
            RecommendError::malformed(format!("row {row}: invalid id '{}'", field(self.id)))
        })?;

        let tags = parse_tag_literal(field(self.tags)).ok_or_else(|| {
            RecommendError::malformed(format!(
                "row {row}: tags are not a list literal: {}",
                field(self.tags)
            ))
        })?;
        let tags = dedup_tags(tags.into_iter().filter(|t| t != NO_TAGS_PLACEHOLDER));

        let rating = parse_rating(field(self.rating));
        let ratings_count = parse_count(field(self.ratings_count));
        if rating.is_none() && !field(self.rating).is_empty() {
            debug!(row, value = field(self.rating), "Unusable rating treated as absent");
        }

        let released = optional(self.released).and_then(|v| {
            let parsed = NaiveDate::parse_from_str(v, "%Y-%m-%d").ok();
            if parsed.is_none() {
                warn!(row, value = v, "Unparsable release date ignored");
            }
            parsed
        });

        Ok(Game {
            id,
            rawg_id: optional(self.rawg_id).and_then(parse_integer),
            name: field(self.name).to_string(),
            genre: field(self.genre).to_string(),
            tags,
            rating,
            ratings_count: ratings_count as u64,
            popularity: fractional_popularity(ratings_count),
            released,
            background_image: optional(self.background_image).map(str::to_string),
            text: field(self.text).to_string(),
        })
    }
}

/// Integers may arrive as floats ("3498.0") after a pandas round-trip
fn parse_integer(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

fn parse_rating(value: &str) -> Option<f32> {
    value
        .parse::<f32>()
        .ok()
        .filter(|r| r.is_finite() && (0.0..=MAX_RATING).contains(r))
}

/// Non-negative count, fraction kept; anything else counts as 0
fn parse_count(value: &str) -> f64 {
    value
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite() && *c >= 0.0)
        .unwrap_or(0.0)
}

/// Parse a literal list of strings such as `['RPG', "Don't Starve"]`.
///
/// An empty field is an empty list. Returns `None` for anything that is not
/// a bracketed, comma separated list of quoted strings.
pub fn parse_tag_literal(literal: &str) -> Option<Vec<String>> {
    let literal = literal.trim();
    if literal.is_empty() {
        return Some(Vec::new());
    }
    let inner = literal.strip_prefix('[')?.strip_suffix(']')?;

    let mut tags = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };

        let mut tag = String::new();
        loop {
            match chars.next()? {
                '\\' => match chars.next()? {
                    'n' => tag.push('\n'),
                    't' => tag.push('\t'),
                    other => tag.push(other),
                },
                c if c == quote => break,
                c => tag.push(c),
            }
        }
        let tag = tag.trim().to_string();
        if !tag.is_empty() {
            tags.push(tag);
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }
    Some(tags)
}

/// Presentation-side filter that narrows the catalog to a view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewFilter {
    /// Accepted genres; empty accepts every genre
    pub genres: Vec<String>,
    /// Minimum rating; games without a rating never satisfy it
    pub min_rating: Option<f32>,
    /// Minimum number of ratings
    pub min_votes: Option<u64>,
}

impl ViewFilter {
    pub fn matches(&self, game: &Game) -> bool {
        if !self.genres.is_empty() && !self.genres.iter().any(|g| g == &game.genre) {
            return false;
        }
        if let Some(min_rating) = self.min_rating {
            match game.rating {
                Some(rating) if rating >= min_rating => {}
                _ => return false,
            }
        }
        if let Some(min_votes) = self.min_votes {
            if game.ratings_count < min_votes {
                return false;
            }
        }
        true
    }
}

/// Ordered subset of catalog rows handed to the scoring strategies
#[derive(Debug, Clone)]
pub struct CatalogView<'a> {
    catalog: &'a Catalog,
    rows: Vec<usize>,
}

impl<'a> CatalogView<'a> {
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Game> + '_ {
        let catalog = self.catalog;
        self.rows.iter().map(move |&row| &catalog.games[row])
    }

    /// Catalog ids of the view, in view order
    pub fn ids(&self) -> Vec<ItemId> {
        self.iter().map(|game| game.id).collect()
    }

    /// Catalog row positions of the view, in view order
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Counters shown above the result lists
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total: self.len(),
            ..CatalogStats::default()
        };
        for game in self.iter() {
            if game.tags.is_empty() {
                stats.without_tags += 1;
            }
            if game.rating.is_none() {
                stats.without_rating += 1;
            }
        }
        stats
    }

    /// Sorted distinct tags of the view containing `query`, case-insensitive
    pub fn tag_pool(&self, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        self.iter()
            .flat_map(|game| game.tags.iter())
            .filter(|tag| tag.to_lowercase().contains(&query))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Summary counters over a view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total: usize,
    pub without_tags: usize,
    pub without_rating: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
id,name,genre,tags,rating,ratings_count,sinopsis,enriched_sinopsis,rawg_id,released
1,Zelda,Adventure,\"['Open World', 'Action', 'Open World']\",4.6,3200,short,A vast kingdom to explore,22511,2017-03-03
2,Tetris 99,Puzzle,['No tags'],,abc,Falling blocks,,3498.0,
3,Kirby,Platformer,\"[\"\"Co-op\"\", 'Cute']\",not-a-number,15,Pink hero,Pink hero inhales enemies,,2022-13-40
";

    #[test]
    fn test_load_sample_catalog() {
        let catalog = Catalog::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 3);

        let zelda = catalog.get(1).unwrap();
        assert_eq!(zelda.tags, vec!["Open World".to_string(), "Action".to_string()]);
        assert_eq!(zelda.rating, Some(4.6));
        assert_eq!(zelda.ratings_count, 3200);
        assert!((zelda.popularity - 3201f32.ln()).abs() < 1e-4);
        assert_eq!(zelda.text, "A vast kingdom to explore");
        assert_eq!(zelda.rawg_id, Some(22511));
        assert_eq!(zelda.released, NaiveDate::from_ymd_opt(2017, 3, 3));

        let tetris = catalog.get(2).unwrap();
        assert!(tetris.tags.is_empty());
        assert_eq!(tetris.rating, None);
        assert_eq!(tetris.ratings_count, 0);
        assert_eq!(tetris.popularity, 0.0);
        // enriched column present but empty for this row
        assert_eq!(tetris.text, "");
        assert_eq!(tetris.rawg_id, Some(3498));

        let kirby = catalog.get(3).unwrap();
        assert_eq!(kirby.tags, vec!["Co-op".to_string(), "Cute".to_string()]);
        assert_eq!(kirby.rating, None);
        assert_eq!(kirby.released, None);
    }

    #[test]
    fn test_text_falls_back_to_synopsis() {
        let csv = "id,name,genre,tags,rating,ratings_count,sinopsis\n1,A,RPG,[],4,1,short text\n";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.get(1).unwrap().text, "short text");
    }

    #[test]
    fn test_missing_columns_is_malformed() {
        let csv = "id,name,tags,rating\n1,A,[],4\n";
        let err = Catalog::from_reader(csv.as_bytes()).unwrap_err();
        match err {
            RecommendError::MalformedCatalog { reason } => {
                assert!(reason.contains("genre"));
                assert!(reason.contains("ratings_count"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let csv = "id,name,genre,tags,rating,ratings_count\n1,A,RPG,[],4,1\n";
        assert!(matches!(
            Catalog::from_reader(csv.as_bytes()),
            Err(RecommendError::MalformedCatalog { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let games = vec![Game::new(1, "A", "RPG"), Game::new(1, "B", "RPG")];
        assert!(matches!(
            Catalog::from_games(games),
            Err(RecommendError::MalformedCatalog { .. })
        ));
    }

    #[test]
    fn test_parse_tag_literal() {
        assert_eq!(parse_tag_literal("[]"), Some(vec![]));
        assert_eq!(parse_tag_literal(""), Some(vec![]));
        assert_eq!(
            parse_tag_literal(r#"['RPG', "Don't Starve", 'It\'s']"#),
            Some(vec![
                "RPG".to_string(),
                "Don't Starve".to_string(),
                "It's".to_string()
            ])
        );
        assert_eq!(
            parse_tag_literal("['a', 'b',]"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(parse_tag_literal("RPG, Action"), None);
        assert_eq!(parse_tag_literal("['unterminated]"), None);
        assert_eq!(parse_tag_literal("[1, 2]"), None);
    }

    #[test]
    fn test_view_filter() {
        let catalog = Catalog::from_games(vec![
            Game::new(1, "A", "RPG").with_rating(4.5).with_ratings_count(100),
            Game::new(2, "B", "RPG").with_ratings_count(5000),
            Game::new(3, "C", "Puzzle").with_rating(3.0).with_ratings_count(10),
        ])
        .unwrap();

        let by_genre = catalog.filter(&ViewFilter {
            genres: vec!["RPG".to_string()],
            ..ViewFilter::default()
        });
        assert_eq!(by_genre.ids(), vec![1, 2]);

        // unrated games never pass a rating floor, even a zero one
        let rated = catalog.filter(&ViewFilter {
            min_rating: Some(0.0),
            ..ViewFilter::default()
        });
        assert_eq!(rated.ids(), vec![1, 3]);

        let popular = catalog.filter(&ViewFilter {
            min_votes: Some(100),
            ..ViewFilter::default()
        });
        assert_eq!(popular.ids(), vec![1, 2]);

        assert_eq!(catalog.filter(&ViewFilter::default()).len(), 3);
    }

    #[test]
    fn test_stats_and_tag_pool() {
        let catalog = Catalog::from_games(vec![
            Game::new(1, "A", "RPG")
                .with_rating(4.0)
                .with_tags(["Open World", "RPG"]),
            Game::new(2, "B", "RPG").with_tags(["Co-op", "open-ended"]),
            Game::new(3, "C", "Puzzle"),
        ])
        .unwrap();

        let view = catalog.view();
        assert_eq!(
            view.stats(),
            CatalogStats {
                total: 3,
                without_tags: 1,
                without_rating: 2
            }
        );
        assert_eq!(
            view.tag_pool("OPEN"),
            vec!["Open World".to_string(), "open-ended".to_string()]
        );
        assert_eq!(view.tag_pool("").len(), 4);
        assert_eq!(catalog.genres(), vec!["Puzzle".to_string(), "RPG".to_string()]);
    }

    #[test]
    fn test_fractional_count_keeps_fraction_in_popularity() {
        let csv = "id,name,genre,tags,rating,ratings_count,sinopsis\n1,A,RPG,[],4,3.7,text\n2,B,RPG,[],4,-2,text\n";
        let catalog = Catalog::from_reader(csv.as_bytes()).unwrap();

        let a = catalog.get(1).unwrap();
        assert_eq!(a.ratings_count, 3);
        assert!((a.popularity - 3.7f64.ln_1p() as f32).abs() < 1e-6);

        let b = catalog.get(2).unwrap();
        assert_eq!(b.ratings_count, 0);
        assert_eq!(b.popularity, 0.0);
    }

    #[test]
    fn test_select_unknown_id() {
        let catalog = Catalog::from_games(vec![Game::new(1, "A", "RPG")]).unwrap();
        assert_eq!(catalog.select(&[1]).unwrap().ids(), vec![1]);
        assert!(matches!(
            catalog.select(&[9]),
            Err(RecommendError::ItemNotFound { .. })
        ));
    }
}
