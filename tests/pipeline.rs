//! End-to-end test: KB load, coreference, candidates, resolution, output.

use kblink::candidates::{CachingGenerator, CascadeGenerator, IndexBasedGenerator};
use kblink::coref::{
    AcronymStage, CascadeCoref, CorefMetric, ExactMatchStage, SingleTokenMatchStage, TokenPosition,
};
use kblink::document::{Document, LinkType, Mention};
use kblink::entity::EntityType;
use kblink::index::{ExactMatchIndex, NgramIndex};
use kblink::io::{OutputReader, OutputWriter};
use kblink::kb::{columns, MemoryKb};
use kblink::pipeline::Pipeline;
use kblink::resolve::{CascadeResolver, EditDistanceResolver, ExactNameResolver};
use std::fs;
use std::sync::Arc;

fn entity_row(origin: &str, etype: &str, id: &str, name: &str) -> String {
    let mut cols = vec![""; columns::WIDTH];
    cols[columns::ORIGIN] = origin;
    cols[columns::ENTITY_TYPE] = etype;
    cols[columns::ENTITY_ID] = id;
    cols[columns::NAME] = name;
    cols.join("\t")
}

fn write_kb_files(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let entities_path = dir.join("entities.tab");
    let alt_names_path = dir.join("alternate_names.tab");
    let entities = format!(
        "header\n{}\n{}\n{}\n{}\n{}\n",
        entity_row("APB", "PER", "122", "John Smith"),
        entity_row("APB", "PER", "125", "Jake Smith"),
        entity_row("APB", "ORG", "200", "World Health Organization"),
        entity_row("GEO", "GPE", "300", "Springfield"),
        entity_row("GEO", "GPE", "301", "Shelbyville"),
    );
    fs::write(&entities_path, entities).unwrap();
    fs::write(&alt_names_path, "entity_id\talternate_name\n200\tWHO\n").unwrap();
    (entities_path, alt_names_path)
}

const DOC: &str = "IL5_NW_000001";

fn document() -> Document {
    Document::new(
        vec![
            Mention::new("m1", "John Smith", DOC, (1, 10), (0, 1), EntityType::Per),
            Mention::new("m2", "Smith", DOC, (40, 44), (8, 8), EntityType::Per),
            Mention::new("m3", "WHO", DOC, (60, 62), (12, 12), EntityType::Org),
            Mention::new(
                "m4",
                "World Health Organization",
                DOC,
                (80, 104),
                (16, 18),
                EntityType::Org,
            ),
            Mention::new("m5", "Springfild", DOC, (120, 129), (22, 22), EntityType::Gpe),
        ],
        vec![],
        "eng",
    )
    .unwrap()
}

fn ground_truth() -> kblink::document::GroundTruth {
    let rows = format!(
        "system_run_id\tmention_id\tmention_string\tspan\tkb_id\tentity_type\tmention_type\tconfidence\n\
         gold\tm1\tJohn Smith\t{DOC}:1-10\t122\tPER\tNAM\t1.0\n\
         gold\tm2\tSmith\t{DOC}:40-44\t122\tPER\tNAM\t1.0\n\
         gold\tm3\tWHO\t{DOC}:60-62\t200\tORG\tNAM\t1.0\n\
         gold\tm4\tWorld Health Organization\t{DOC}:80-104\t200\tORG\tNAM\t1.0\n\
         gold\tm5\tSpringfild\t{DOC}:120-129\t300\tGPE\tNAM\t1.0\n"
    );
    OutputReader::read(rows.as_bytes()).unwrap()
}

#[test]
fn links_a_document_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (entities_path, alt_names_path) = write_kb_files(dir.path());
    let cache_dir = dir.path().join("cache");
    fs::create_dir(&cache_dir).unwrap();

    let kb = Arc::new(
        MemoryKb::load_files(&entities_path, &alt_names_path, None, None, Some(&cache_dir))
            .unwrap(),
    );
    assert_eq!(kb.len(), 5);
    assert!(cache_dir.join("entities.cache.json").exists());

    let exact = ExactMatchIndex::new(kb.clone(), Some(&cache_dir)).unwrap();
    let ngram = NgramIndex::new(kb.clone(), Some(&cache_dir)).unwrap();
    let generator = CachingGenerator::new(Box::new(CascadeGenerator::new(vec![
        Box::new(IndexBasedGenerator::new(Box::new(exact))),
        Box::new(IndexBasedGenerator::new(Box::new(ngram))),
    ])));

    let coref = CascadeCoref::new(vec![
        Box::new(ExactMatchStage),
        Box::new(AcronymStage::new(2)),
        Box::new(SingleTokenMatchStage::new(TokenPosition::Last)),
    ])
    .with_reporting();
    let resolver = CascadeResolver::new(vec![
        Box::new(ExactNameResolver),
        Box::new(EditDistanceResolver::new()),
    ]);

    let mut out = Vec::new();
    let mut pipeline = Pipeline::new(
        coref,
        Box::new(generator),
        Box::new(resolver),
        OutputWriter::new(&mut out, "kblink-test"),
    )
    .with_scoring(ground_truth(), CorefMetric::Muc);

    pipeline.process(&mut document()).unwrap();
    assert_eq!(pipeline.documents(), 1);
    let report = pipeline.finish().unwrap().unwrap();

    assert_eq!(report.coref.f1, 1.0);
    assert_eq!(report.candidates.recall(), 1.0);
    assert_eq!(report.resolver.precision(), 1.0);
    assert_eq!(report.resolver.recall(), 1.0);

    // the written rows read back with the links the gold data expects
    let written = OutputReader::read(out.as_slice()).unwrap();
    let links = &written[DOC];
    assert_eq!(links[&(1, 10)].links, vec!["122"]);
    assert_eq!(links[&(40, 44)].links, vec!["122"]);
    assert_eq!(links[&(60, 62)].links, vec!["200"]);
    assert_eq!(links[&(80, 104)].links, vec!["200"]);
    assert_eq!(links[&(120, 129)].links, vec!["300"]);
    assert!(links.values().all(|l| l.link_type == LinkType::Link));
}

#[test]
fn reloads_kb_and_indexes_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (entities_path, alt_names_path) = write_kb_files(dir.path());
    let cache_dir = dir.path().join("cache");
    fs::create_dir(&cache_dir).unwrap();

    {
        let kb = Arc::new(
            MemoryKb::load_files(&entities_path, &alt_names_path, None, None, Some(&cache_dir))
                .unwrap(),
        );
        let _ = ExactMatchIndex::new(kb.clone(), Some(&cache_dir)).unwrap();
        let _ = NgramIndex::new(kb, Some(&cache_dir)).unwrap();
    }

    let kb = Arc::new(
        MemoryKb::load_files(&entities_path, &alt_names_path, None, None, Some(&cache_dir))
            .unwrap(),
    );
    assert_eq!(kb.len(), 5);
    assert!(kb.get("200").unwrap().names.contains("WHO"));

    use kblink::index::{NameIndex, DEFAULT_LIMIT};
    let exact = ExactMatchIndex::new(kb.clone(), Some(&cache_dir)).unwrap();
    let found = exact.find("who", EntityType::Org, DEFAULT_LIMIT);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "200");
    let ngram = NgramIndex::new(kb, Some(&cache_dir)).unwrap();
    assert!(ngram
        .find("Springfild", EntityType::Gpe, DEFAULT_LIMIT)
        .iter()
        .any(|e| e.id == "300"));
}
