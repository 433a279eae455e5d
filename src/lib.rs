//! Entity linking for low-resource languages.
//!
//! `kblink` links named-entity mentions in documents to records of a large
//! tab-separated knowledge base. Processing is a three-stage pipeline over
//! one document at a time:
//!
//! 1. **Coreference** ([`coref`]): a sieve of merge stages groups a
//!    document's mentions into [`document::MentionChain`]s.
//! 2. **Candidate generation** ([`candidates`]): name indexes over the KB
//!    ([`index`]) propose a bounded candidate list per chain.
//! 3. **Resolution** ([`resolve`]): a resolver cascade picks one entity
//!    per chain, or leaves it NIL.
//!
//! Results are written in the standard submission format ([`io`]), and
//! each stage can be scored incrementally against ground truth in the
//! same format.
//!
//! ```no_run
//! use kblink::coref::{CascadeCoref, ExactMatchStage};
//! use kblink::candidates::IndexBasedGenerator;
//! use kblink::index::ExactMatchIndex;
//! use kblink::io::OutputWriter;
//! use kblink::kb::MemoryKb;
//! use kblink::pipeline::Pipeline;
//! use kblink::resolve::ExactNameResolver;
//! use std::sync::Arc;
//!
//! # fn main() -> kblink::Result<()> {
//! let kb = Arc::new(MemoryKb::from_entities(vec![]));
//! let index = ExactMatchIndex::new(kb, None)?;
//! let mut pipeline = Pipeline::new(
//!     CascadeCoref::new(vec![Box::new(ExactMatchStage)]),
//!     Box::new(IndexBasedGenerator::new(Box::new(index))),
//!     Box::new(ExactNameResolver),
//!     OutputWriter::new(std::io::stdout(), "my-system"),
//! );
//! # Ok(())
//! # }
//! ```

pub mod candidates;
pub mod coref;
pub mod document;
pub mod entity;
pub mod error;
pub mod index;
pub mod io;
pub mod kb;
pub mod pipeline;
pub mod resolve;
pub mod strings;

pub use error::{Error, Result};
