//! Documents, mentions, and mention chains.
//!
//! A `Document` is the unit of work for the pipeline. Each stage owns
//! exactly one field: coreference writes `mention_chains`, candidate
//! generation writes `MentionChain::candidates`, and resolution writes
//! `MentionChain::entity`. Stages only read fields owned by earlier stages.

use crate::entity::{Entity, EntityType};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Character span into the original document, 1-based inclusive.
pub type Offsets = (usize, usize);

/// One surface occurrence of a name in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// Unique mention id, assigned by an external identifier service
    pub id: String,
    /// Current mention string, possibly normalized by preprocessing
    pub string: String,
    /// Verbatim text from the document, preserved for output
    pub original_string: String,
    /// Transliteration of `string`, if preprocessing produced one
    pub translit_string: Option<String>,
    /// Translation of `string`, if preprocessing produced one
    pub translate_string: Option<String>,
    /// Document id
    pub doc_id: String,
    /// Character offsets into the original document
    pub offsets: Offsets,
    /// Token offsets (start, stop)
    pub token_offsets: (usize, usize),
    /// Entity type
    pub entity_type: EntityType,
}

impl Mention {
    /// Create a mention. The original string starts equal to `string`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        string: impl Into<String>,
        doc_id: impl Into<String>,
        offsets: Offsets,
        token_offsets: (usize, usize),
        entity_type: EntityType,
    ) -> Self {
        let string = string.into();
        Self {
            id: id.into(),
            original_string: string.clone(),
            string,
            translit_string: None,
            translate_string: None,
            doc_id: doc_id.into(),
            offsets,
            token_offsets,
            entity_type,
        }
    }

    /// All name variants carried by this mention.
    pub fn all_strings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.string.as_str())
            .chain(self.translit_string.as_deref())
            .chain(self.translate_string.as_deref())
    }
}

/// Mentions within one document asserted to refer to the same entity.
///
/// The unit of work for candidate generation and resolution.
#[derive(Debug, Clone)]
pub struct MentionChain {
    /// Member mentions; non-empty, all sharing one entity type
    pub mentions: Vec<Mention>,
    /// Candidate entities, set by the candidate generator
    pub candidates: Vec<Arc<Entity>>,
    /// Resolved entity, set by the resolver (`None` = NIL)
    pub entity: Option<Arc<Entity>>,
    name_override: Option<String>,
}

impl MentionChain {
    /// Create a chain from mentions.
    ///
    /// Returns an error for an empty mention list or mixed entity types.
    pub fn new(mentions: Vec<Mention>) -> Result<Self> {
        let first = mentions
            .first()
            .ok_or_else(|| Error::invalid_input("mention chain cannot be empty"))?;
        if mentions.iter().any(|m| m.entity_type != first.entity_type) {
            return Err(Error::invalid_input(format!(
                "mixed entity types in chain at {}:{}-{}",
                first.doc_id, first.offsets.0, first.offsets.1
            )));
        }
        Ok(Self {
            mentions,
            candidates: Vec::new(),
            entity: None,
            name_override: None,
        })
    }

    /// Chain of a single mention.
    #[must_use]
    pub fn singleton(mention: Mention) -> Self {
        Self {
            mentions: vec![mention],
            candidates: Vec::new(),
            entity: None,
            name_override: None,
        }
    }

    /// Entity type shared by every mention in the chain.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.mentions[0].entity_type
    }

    /// The best name for the chain, used as the default query key.
    ///
    /// Defaults to the longest mention string; callers may override.
    #[must_use]
    pub fn name(&self) -> &str {
        if let Some(name) = &self.name_override {
            return name;
        }
        self.mentions
            .iter()
            .map(|m| m.string.as_str())
            .max_by_key(|s| s.chars().count())
            .unwrap_or_default()
    }

    /// Override the best name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name_override = Some(name.into());
    }

    /// All name strings in the chain, including transliterated and
    /// translated variants.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mentions.iter().flat_map(Mention::all_strings)
    }

    /// First available transliterated name, if any.
    #[must_use]
    pub fn translit_name(&self) -> Option<&str> {
        self.mentions
            .iter()
            .find_map(|m| m.translit_string.as_deref())
    }
}

/// Genre of the source document, detected from the document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    /// Newswire
    Newswire,
    /// Social network posts
    SocialNetwork,
    /// Weblog
    Weblog,
    /// Discussion forum
    DiscussionForum,
    /// Reference material
    Reference,
    /// Unrecognized genre
    Unknown,
}

impl DocType {
    /// Detect the genre from a document id like `IL5_SN_000012_20170501`.
    #[must_use]
    pub fn detect(doc_id: &str) -> Self {
        for part in doc_id.split('_') {
            match part {
                "NW" => return DocType::Newswire,
                "SN" => return DocType::SocialNetwork,
                "WL" => return DocType::Weblog,
                "DF" => return DocType::DiscussionForum,
                "RF" => return DocType::Reference,
                _ => {}
            }
        }
        DocType::Unknown
    }
}

/// A document with its tokens and entity mentions.
#[derive(Debug, Clone)]
pub struct Document {
    /// Entity mentions in document order
    pub mentions: Vec<Mention>,
    /// Token sequence
    pub tokens: Vec<String>,
    /// Document id
    pub doc_id: String,
    /// Detected 3-letter language code
    pub lang: String,
    /// Document genre
    pub doc_type: DocType,
    /// Mention chains, populated by the coreference cascade
    pub mention_chains: Vec<MentionChain>,
}

impl Document {
    /// Create a document. The doc id and genre come from the first mention.
    pub fn new(mentions: Vec<Mention>, tokens: Vec<String>, lang: impl Into<String>) -> Result<Self> {
        let doc_id = mentions
            .first()
            .map(|m| m.doc_id.clone())
            .ok_or_else(|| Error::invalid_input("document must have at least one mention"))?;
        let doc_type = DocType::detect(&doc_id);
        Ok(Self {
            mentions,
            tokens,
            doc_id,
            lang: lang.into(),
            doc_type,
            mention_chains: Vec::new(),
        })
    }
}

/// Whether a ground-truth mention links to the KB or is NIL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Linked to one or more KB entities
    Link,
    /// No corresponding KB entity
    Nil,
}

/// Ground-truth annotation for one mention span.
#[derive(Debug, Clone)]
pub struct Link {
    /// Entity type of the annotated mention
    pub entity_type: EntityType,
    /// LINK or NIL
    pub link_type: LinkType,
    /// Correct entity ids (empty for NIL)
    pub links: Vec<String>,
    /// NIL cluster id grouping coreferent NIL mentions
    pub cluster_id: Option<String>,
    /// Mention text from the annotation
    pub name: String,
}

/// Ground truth: doc id -> mention offsets -> link.
pub type GroundTruth = HashMap<String, HashMap<Offsets, Link>>;
