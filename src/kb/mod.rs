//! In-memory knowledge base and load-time filters.
//!
//! The KB is built once, up front, from two tab-separated streams: a bulk
//! entity record stream and an alternate-names stream. It is read-only
//! afterward, so entities are handed out as `Arc<Entity>` and shared freely
//! across indexes and documents.
//!
//! Bulk KBs run to tens of millions of names; most of them are unrelated to
//! any given evaluation. [`EntityFilter`]s prune records at load time and
//! [`NameFilter`]s gate alternate names (always keeping ASCII/English).

use crate::entity::{Entity, EntityContext, EntityType};
use crate::error::{Error, Result};
use crate::index::cache;
use crate::strings;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Column layout of the bulk entity record stream.
pub mod columns {
    /// Provenance tag
    pub const ORIGIN: usize = 0;
    /// Entity type label
    pub const ENTITY_TYPE: usize = 1;
    /// Entity id
    pub const ENTITY_ID: usize = 2;
    /// Canonical name
    pub const NAME: usize = 3;
    /// Latitude
    pub const LATITUDE: usize = 5;
    /// Longitude
    pub const LONGITUDE: usize = 6;
    /// Two-letter country code
    pub const COUNTRY_CODE: usize = 12;
    /// Population
    pub const POPULATION: usize = 21;
    /// PER: titles or positions, `|` separated
    pub const PER_TITLE_OR_POSITION: usize = 27;
    /// PER: organization of association
    pub const PER_ORG_OF_ASSOCIATION: usize = 28;
    /// PER: year of birth
    pub const PER_YEAR_OF_BIRTH: usize = 30;
    /// ORG: website
    pub const ORG_WEBSITE: usize = 38;
    /// ORG: parent organization
    pub const ORG_PARENT_ORG: usize = 41;
    /// External links, `|` separated
    pub const EXTERNAL_LINK: usize = 46;
    /// Total column count
    pub const WIDTH: usize = 47;
}

/// Decides whether a bulk KB row is loaded.
pub trait EntityFilter {
    /// `Some(true)` = include, `Some(false)` = exclude,
    /// `None` = defer to the next filter in a cascade.
    fn filter(&self, row: &[&str]) -> Option<bool>;
}

/// Runs a series of filters; the first definite answer wins.
///
/// Rows no filter claims are excluded.
pub struct CascadeEntityFilter {
    filters: Vec<Box<dyn EntityFilter>>,
}

impl CascadeEntityFilter {
    /// Create a cascade from filters, consulted in order.
    #[must_use]
    pub fn new(filters: Vec<Box<dyn EntityFilter>>) -> Self {
        Self { filters }
    }
}

impl EntityFilter for CascadeEntityFilter {
    fn filter(&self, row: &[&str]) -> Option<bool> {
        for f in &self.filters {
            if let Some(decision) = f.filter(row) {
                return Some(decision);
            }
        }
        Some(false)
    }
}

/// Keep entities from particular origins (e.g. `WLL`, `APB`, `AUG`).
pub struct OriginFilter {
    origins: Vec<String>,
}

impl OriginFilter {
    /// Create a filter for 3-letter origin prefixes.
    #[must_use]
    pub fn new(origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            origins: origins.into_iter().map(Into::into).collect(),
        }
    }
}

impl EntityFilter for OriginFilter {
    fn filter(&self, row: &[&str]) -> Option<bool> {
        let prefix: String = row[columns::ORIGIN].chars().take(3).collect();
        if self.origins.iter().any(|o| *o == prefix) {
            Some(true)
        } else {
            None
        }
    }
}

/// Keep entities that carry external links.
pub struct ExternalLinkFilter;

impl EntityFilter for ExternalLinkFilter {
    fn filter(&self, row: &[&str]) -> Option<bool> {
        if row[columns::EXTERNAL_LINK].is_empty() {
            None
        } else {
            Some(true)
        }
    }
}

/// Keep entities from particular countries.
pub struct CountryFilter {
    codes: Vec<String>,
}

impl CountryFilter {
    /// Create a filter for 2-letter country codes.
    #[must_use]
    pub fn new(codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            codes: codes.into_iter().map(|c| c.into().to_uppercase()).collect(),
        }
    }
}

impl EntityFilter for CountryFilter {
    fn filter(&self, row: &[&str]) -> Option<bool> {
        if self.codes.iter().any(|c| c == row[columns::COUNTRY_CODE]) {
            Some(true)
        } else {
            None
        }
    }
}

/// Decides whether an alternate name is added to an entity.
pub trait NameFilter {
    /// True to keep the name.
    fn keep(&self, name: &str) -> bool;
}

/// Character scripts selectable by [`ScriptNameFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Ge'ez (Ethiopic block, no supplement/extended)
    Geez,
    /// Arabic (base block, no supplement/extended)
    Arabic,
    /// Sinhala
    Sinhala,
}

static GEEZ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\u{1200}-\u{137F}]+$").unwrap());
static ARABIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\u{0600}-\u{06FF}]+$").unwrap());
static SINHALA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\u{0D80}-\u{0DFF}]+$").unwrap());

impl Script {
    fn matches(&self, s: &str) -> bool {
        match self {
            Script::Geez => GEEZ_RE.is_match(s),
            Script::Arabic => ARABIC_RE.is_match(s),
            Script::Sinhala => SINHALA_RE.is_match(s),
        }
    }
}

/// Filter alternate names by character script.
///
/// ASCII names are always kept; other names must match one of the
/// selected scripts after punctuation is stripped.
pub struct ScriptNameFilter {
    scripts: Vec<Script>,
}

impl ScriptNameFilter {
    /// Create a filter for the given scripts.
    #[must_use]
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
        }
    }
}

impl NameFilter for ScriptNameFilter {
    fn keep(&self, name: &str) -> bool {
        let s = strings::remove_punct(&strings::single_space(name));
        let s = s.replace(' ', "");
        if strings::is_ascii(&s) {
            return true;
        }
        self.scripts.iter().any(|script| script.matches(&s))
    }
}

fn parse_f64(value: &str) -> Option<f64> {
    value.parse().ok()
}

fn parse_entity_row(row: &[&str], line: usize) -> Result<Entity> {
    if row.len() < columns::WIDTH {
        return Err(Error::kb_load(format!(
            "entity record on line {} has {} columns, expected {}",
            line,
            row.len(),
            columns::WIDTH
        )));
    }
    let entity_type = EntityType::from_label(row[columns::ENTITY_TYPE])
        .map_err(|e| Error::kb_load(format!("line {line}: {e}")))?;
    let urls = if row[columns::EXTERNAL_LINK].is_empty() {
        Vec::new()
    } else {
        row[columns::EXTERNAL_LINK]
            .split('|')
            .map(str::to_string)
            .collect()
    };
    let mut entity = Entity::new(
        row[columns::ENTITY_ID],
        entity_type,
        row[columns::NAME],
        row[columns::ORIGIN],
        urls,
    );
    let context = match entity_type {
        EntityType::Gpe | EntityType::Loc => Some(EntityContext::Geo {
            latitude: parse_f64(row[columns::LATITUDE]),
            longitude: parse_f64(row[columns::LONGITUDE]),
            country: non_empty(row[columns::COUNTRY_CODE]),
            population: row[columns::POPULATION].parse().ok(),
        }),
        EntityType::Per => Some(EntityContext::Per {
            titles: split_list(row[columns::PER_TITLE_OR_POSITION]),
            org: non_empty(row[columns::PER_ORG_OF_ASSOCIATION]),
            year_of_birth: row[columns::PER_YEAR_OF_BIRTH].parse().ok(),
        }),
        EntityType::Org => Some(EntityContext::Org {
            website: non_empty(row[columns::ORG_WEBSITE]),
            parent_org: non_empty(row[columns::ORG_PARENT_ORG]),
        }),
    };
    entity.context = context;
    Ok(entity)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        Vec::new()
    } else {
        value.split('|').map(str::to_string).collect()
    }
}

/// KB backed by a hash map, for KBs that fit in memory.
#[derive(Debug, Default)]
pub struct MemoryKb {
    entities: HashMap<String, Arc<Entity>>,
}

/// Fixed cache filename for loaded entities.
const ENTITY_CACHE_NAME: &str = "entities.cache.json";

impl MemoryKb {
    /// Load a KB from entity and alternate-name streams.
    ///
    /// Both streams are tab separated with a header row. Malformed entity
    /// records are fatal. Alternate names referencing unknown entity ids
    /// are silently skipped.
    pub fn load(
        entities: impl BufRead,
        alt_names: impl BufRead,
        entity_filter: Option<&dyn EntityFilter>,
        name_filter: Option<&dyn NameFilter>,
    ) -> Result<Self> {
        let mut map: HashMap<String, Entity> = HashMap::new();
        for (line_no, line) in entities.lines().enumerate().skip(1) {
            let line = line?;
            let row: Vec<&str> = line.split('\t').collect();
            // width check comes first so filters can index columns safely
            if row.len() < columns::WIDTH {
                return Err(Error::kb_load(format!(
                    "entity record on line {} has {} columns, expected {}",
                    line_no + 1,
                    row.len(),
                    columns::WIDTH
                )));
            }
            if let Some(filter) = entity_filter {
                if !filter.filter(&row).unwrap_or(false) {
                    continue;
                }
            }
            let entity = parse_entity_row(&row, line_no + 1)?;
            map.insert(entity.id.clone(), entity);
        }
        log::info!("Loaded {} entities", map.len());

        let mut name_count = 0usize;
        for line in alt_names.lines().skip(1) {
            let line = line?;
            let mut fields = line.split('\t');
            let (Some(entity_id), Some(alt_name)) = (fields.next(), fields.next()) else {
                return Err(Error::kb_load(format!(
                    "alternate name row has fewer than 2 columns: {line:?}"
                )));
            };
            let Some(entity) = map.get_mut(entity_id) else {
                continue;
            };
            if let Some(filter) = name_filter {
                if !filter.keep(alt_name) {
                    continue;
                }
            }
            entity.add_name(alt_name);
            name_count += 1;
        }
        log::info!("Loaded {name_count} alternate names");

        Ok(Self::from_entities(map.into_values()))
    }

    /// Load a KB from files, with an optional entity cache.
    ///
    /// When `cache_dir` is given and holds a cache whose fingerprint matches
    /// the source files, the cache is loaded instead; otherwise the KB is
    /// built from the files and the cache is written.
    pub fn load_files(
        entities_path: &Path,
        alt_names_path: &Path,
        entity_filter: Option<&dyn EntityFilter>,
        name_filter: Option<&dyn NameFilter>,
        cache_dir: Option<&Path>,
    ) -> Result<Self> {
        let fingerprint = cache::file_fingerprint(&[entities_path, alt_names_path])?;
        if let Some(dir) = cache_dir {
            let path = dir.join(ENTITY_CACHE_NAME);
            if let Some(entities) = cache::load::<Vec<Entity>>(&path, &fingerprint) {
                log::info!("Loaded {} entities from cache", entities.len());
                return Ok(Self::from_entities(entities));
            }
        }
        let kb = Self::load(
            BufReader::new(File::open(entities_path)?),
            BufReader::new(File::open(alt_names_path)?),
            entity_filter,
            name_filter,
        )?;
        if let Some(dir) = cache_dir {
            let entities: Vec<Entity> = kb.iter().map(|e| (**e).clone()).collect();
            cache::store(&dir.join(ENTITY_CACHE_NAME), &fingerprint, &entities)?;
        }
        Ok(kb)
    }

    /// Build a KB directly from entities (used by tests and cache loads).
    #[must_use]
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|e| (e.id.clone(), Arc::new(e)))
                .collect(),
        }
    }

    /// Number of entities in the KB.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when the KB holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Retrieve an entity by id. A miss is not an error.
    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<Arc<Entity>> {
        self.entities.get(entity_id).cloned()
    }

    /// Retrieve entities by id, skipping unknown ids.
    #[must_use]
    pub fn get_all(&self, entity_ids: &[String]) -> Vec<Arc<Entity>> {
        entity_ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Iterate over all entities.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.values()
    }

    /// Total number of names across all entities.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.entities.values().map(|e| e.names.len()).sum()
    }
}
