//! End-to-end tests for a full reconciliation run.
//!
//! These drive the public API from raw messages and catalog rows to the
//! canonical catalog, summary and flat rows.

use std::collections::HashMap;

use reconcile::{
    review_rows, CatalogEntity, ClusterId, Confidence, DamageStatus, FlatRecord, MediaRef,
    Message, Pattern, ReconcileConfig, Reconciler, Source, Summary, TopicId,
};
use tokio_util::sync::CancellationToken;

fn categories() -> HashMap<TopicId, String> {
    HashMap::from([(7, "Province X".to_string()), (8, "Province Y".to_string())])
}

/// Two clusters in one topic, split by an id gap of 38.
fn province_x_stream() -> Vec<Message> {
    vec![
        Message::new(100).in_topic(7).with_text("Site Alpha\nDistrict 1"),
        Message::new(101).in_topic(7).with_media(MediaRef::photo("p1")),
        Message::new(102).in_topic(7).with_media(MediaRef::photo("p2")),
        Message::new(140).in_topic(7).with_text("Site Beta\nDistrict 2"),
        Message::new(141).in_topic(7).with_media(MediaRef::photo("p3")),
    ]
}

fn site_alpha_row() -> CatalogEntity {
    CatalogEntity::new("Site Alpha", "Province X", "demolished.xlsx", 2)
        .unwrap()
        .with_area("District 1")
        .with_damage_status(DamageStatus::Demolished)
}

#[tokio::test]
async fn test_province_scenario_merges_site_alpha() {
    let reconciler = Reconciler::new(ReconcileConfig::default());

    let result = reconciler
        .reconcile(
            province_x_stream(),
            &categories(),
            &[site_alpha_row()],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // Two clusters split at the id gap
    assert_eq!(result.run.clusters.len(), 2);
    assert_eq!(result.run.clusters[0].message_ids, vec![100, 101, 102]);
    assert_eq!(result.run.clusters[1].message_ids, vec![140, 141]);

    // Each cluster has one caption, so its media all bind to it
    let beta = result
        .run
        .entities
        .iter()
        .find(|e| e.name == "Site Beta")
        .unwrap();
    assert_eq!(beta.media.photos, vec!["p3"]);

    // Site Alpha merged with its catalog row
    assert_eq!(result.merge.matches.len(), 1);
    assert!((result.merge.matches[0].name_similarity - 1.0).abs() < 1e-9);

    let alpha = result
        .merge
        .canonical
        .iter()
        .find(|e| e.name == "Site Alpha")
        .unwrap();
    assert_eq!(alpha.area.as_deref(), Some("District 1"));
    assert_eq!(alpha.damage_status, DamageStatus::Demolished);
    assert_eq!(alpha.media.photos, vec!["p1", "p2"]);
    assert_eq!(alpha.source, Source::CatalogAndStream);
    assert_eq!(alpha.confidence, Confidence::High);
    assert_eq!(alpha.provenance.clusters, vec![ClusterId(0)]);

    // Site Beta is passed through as a stream-only record
    let beta = result
        .merge
        .canonical
        .iter()
        .find(|e| e.name == "Site Beta")
        .unwrap();
    assert_eq!(beta.source, Source::StreamOnly);
    assert_eq!(result.merge.canonical.len(), 2);
}

#[tokio::test]
async fn test_every_catalog_row_appears_once() {
    let reconciler = Reconciler::new(ReconcileConfig::default());
    let catalog = vec![
        site_alpha_row(),
        CatalogEntity::new("Site Omega", "Province X", "damaged.xlsx", 3)
            .unwrap()
            .with_damage_status(DamageStatus::Damaged),
        CatalogEntity::new("Site Alpha", "Province Y", "damaged.xlsx", 4).unwrap(),
    ];

    let result = reconciler
        .reconcile(
            province_x_stream(),
            &categories(),
            &catalog,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    for row in &catalog {
        let appearances = result
            .merge
            .canonical
            .iter()
            .filter(|e| e.provenance.catalog_row.as_ref() == Some(&row.row_ref()))
            .count();
        assert_eq!(appearances, 1, "catalog row {}", row.row_ref());
    }

    // The Province Y row never matches a Province X stream entity
    let other = result
        .merge
        .canonical
        .iter()
        .find(|e| e.category == "Province Y")
        .unwrap();
    assert_eq!(other.source, Source::CatalogOnly);

    // No stream media lost across the merge
    for stream_entity in &result.run.entities {
        let kept = result
            .merge
            .canonical
            .iter()
            .any(|e| e.media.contains_all(&stream_entity.media));
        assert!(kept, "media of {} lost", stream_entity.name);
    }
}

#[tokio::test]
async fn test_caption_leading_cluster_partitions_media() {
    let reconciler = Reconciler::new(ReconcileConfig::default());
    let messages = vec![
        Message::new(1).in_topic(8).with_text("Site Gamma\nDistrict 3"),
        Message::new(2).in_topic(8).with_media(MediaRef::photo("g1")),
        Message::new(3).in_topic(8).with_media(MediaRef::video("g2.mp4")),
        Message::new(4).in_topic(8).with_text("Site Delta\nDistrict 4"),
        Message::new(5).in_topic(8).with_media(MediaRef::photo("d1")),
    ];

    let run = reconciler
        .extract(messages, &categories(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.clusters.len(), 1);
    let outcome = run.outcome(ClusterId(0)).unwrap();
    assert_eq!(outcome.pattern, Pattern::EntityThenMedia);
    assert!(!outcome.needs_review());

    let gamma = &run.entities[0];
    assert_eq!(gamma.name, "Site Gamma");
    assert_eq!(gamma.media.photos, vec!["g1"]);
    assert_eq!(gamma.media.videos, vec!["g2.mp4"]);
    assert_eq!(run.entities[1].media.photos, vec!["d1"]);
    assert!(run.entities.iter().all(|e| !e.needs_review));
}

#[tokio::test]
async fn test_media_leading_cluster_goes_to_review() {
    let reconciler = Reconciler::new(ReconcileConfig::default());
    let messages = vec![
        Message::new(1).in_topic(8).with_media(MediaRef::photo("m1")),
        Message::new(2).in_topic(8).with_text("Site Gamma\nDistrict 3"),
        Message::new(3).in_topic(8).with_media(MediaRef::photo("m2")),
        Message::new(4).in_topic(8).with_text("Site Delta\nDistrict 4"),
    ];

    let result = reconciler
        .reconcile(messages, &categories(), &[], CancellationToken::new())
        .await
        .unwrap();

    let outcome = result.run.outcome(ClusterId(0)).unwrap();
    assert_eq!(outcome.pattern, Pattern::MediaThenEntity);
    assert_eq!(outcome.shared_media.photos, vec!["m1", "m2"]);
    assert!(result.run.entities.iter().all(|e| e.needs_review));
    assert!(result.run.entities.iter().all(|e| e.media.is_empty()));

    let rows = review_rows(&result.run);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, "Province Y");
    assert_eq!(rows[0].pattern, "media-then-entity");
    assert_eq!(rows[0].photos, "m1; m2");

    let summary = Summary::from_reconciliation(&result);
    assert_eq!(summary.needs_review, 2);
    assert_eq!(summary.clusters_by_pattern["media-then-entity"], 1);
}

#[tokio::test]
async fn test_media_only_topic_is_counted_unassigned() {
    let reconciler = Reconciler::new(ReconcileConfig::default());
    let messages = vec![
        Message::new(10).in_topic(8).with_media(MediaRef::photo("x1")),
        Message::new(11).in_topic(8).with_media(MediaRef::photo("x2")),
    ];

    let result = reconciler
        .reconcile(messages, &categories(), &[], CancellationToken::new())
        .await
        .unwrap();

    assert!(result.merge.canonical.is_empty());
    let summary = Summary::from_reconciliation(&result);
    assert_eq!(summary.unassigned_media, 2);
    assert_eq!(summary.clusters, 1);
}

#[tokio::test]
async fn test_flat_rows_for_canonical_catalog() {
    let reconciler = Reconciler::new(ReconcileConfig::default());
    let result = reconciler
        .reconcile(
            province_x_stream(),
            &categories(),
            &[site_alpha_row()],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let rows: Vec<FlatRecord> = result.merge.canonical.iter().map(FlatRecord::from).collect();
    let alpha = rows.iter().find(|r| r.name == "Site Alpha").unwrap();

    assert_eq!(alpha.photos, "p1; p2");
    assert_eq!(alpha.damage_status, "demolished");
    assert_eq!(alpha.source, "catalog+stream");
    assert_eq!(alpha.catalog_row, "demolished.xlsx#2");
}
