mod helpers;

use std::sync::Arc;

use recollect::chunking::{ChunkMethod, ChunkingStrategy};
use recollect::knowledge::types::{CreateCollection, IngestRequest, RagRequest, SearchMode, SearchRequest};
use recollect::knowledge::KnowledgeBase;
use recollect::storage::{ChunkFilter, KnowledgeStore};
use recollect::Error;

use helpers::{FailingEmbedder, InMemoryBackend, KeywordEmbedder, UnreachableBackend};

const GREEK: &str = "Alpha is a value. Beta is a value.\n\nGamma differs.";

fn paragraphs(size: usize) -> ChunkingStrategy {
    ChunkingStrategy::new(ChunkMethod::Paragraph, size, 0).unwrap()
}

async fn collection(kb: &KnowledgeBase, name: &str) -> String {
    kb.create_collection(CreateCollection {
        name: name.into(),
        description: String::new(),
        embedding_model: None,
    })
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn ingest_then_search_ranks_matching_paragraph_first() {
    let kb = helpers::knowledge_base(helpers::test_store(), None, Arc::new(KeywordEmbedder::default()));
    let cid = collection(&kb, "greek").await;

    let report = kb
        .ingest(IngestRequest::new(&cid, "greek.txt", GREEK).with_strategy(paragraphs(50)))
        .await
        .unwrap();
    assert_eq!(report.chunks_created, 2);
    assert_eq!(report.chunks_embedded, 2);
    assert_eq!(report.index_mode, SearchMode::Fallback);

    let chunks = kb.list_chunks(&report.document.id).unwrap();
    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["Alpha is a value. Beta is a value.", "Gamma differs."]);

    let outcome = kb
        .search(&SearchRequest::new("Gamma").in_collection(&cid).threshold(0.0))
        .await
        .unwrap();
    assert_eq!(outcome.mode, SearchMode::Fallback);
    assert_eq!(outcome.hits[0].content, "Gamma differs.");
    assert_eq!(outcome.hits[0].filename, "greek.txt");
    assert_eq!(outcome.hits[0].document_id, report.document.id);
    assert!(outcome.hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn remote_backend_serves_search_when_reachable() {
    let backend = Arc::new(InMemoryBackend::default());
    let kb = helpers::knowledge_base(
        helpers::test_store(),
        Some(backend.clone()),
        Arc::new(KeywordEmbedder::default()),
    );
    let cid = collection(&kb, "greek").await;

    let report = kb
        .ingest(IngestRequest::new(&cid, "greek.txt", GREEK).with_strategy(paragraphs(50)))
        .await
        .unwrap();
    assert_eq!(report.index_mode, SearchMode::Remote);
    assert_eq!(backend.point_ids(&cid).len(), 2);
    assert_eq!(backend.dimension(&cid), Some(helpers::DIM));

    let outcome = kb
        .search(&SearchRequest::new("Gamma").in_collection(&cid))
        .await
        .unwrap();
    assert_eq!(outcome.mode, SearchMode::Remote);
    assert_eq!(outcome.hits[0].content, "Gamma differs.");
}

#[tokio::test]
async fn unreachable_backend_falls_back_to_stored_vectors() {
    let kb = helpers::knowledge_base(
        helpers::test_store(),
        Some(Arc::new(UnreachableBackend)),
        Arc::new(KeywordEmbedder::default()),
    );
    let cid = collection(&kb, "greek").await;

    let report = kb
        .ingest(IngestRequest::new(&cid, "greek.txt", GREEK).with_strategy(paragraphs(50)))
        .await
        .unwrap();
    assert_eq!(report.index_mode, SearchMode::Fallback);
    assert_eq!(report.chunks_embedded, 2);

    let outcome = kb
        .search(&SearchRequest::new("Gamma").in_collection(&cid))
        .await
        .unwrap();
    assert_eq!(outcome.mode, SearchMode::Fallback);
    assert_eq!(outcome.hits[0].content, "Gamma differs.");
}

#[tokio::test]
async fn reingest_keeps_chunk_ids_and_replaces_content() {
    let store = helpers::test_store();
    let backend = Arc::new(InMemoryBackend::default());
    let kb = helpers::knowledge_base(
        store.clone(),
        Some(backend.clone()),
        Arc::new(KeywordEmbedder::default()),
    );
    let cid = collection(&kb, "notes").await;

    let first = kb
        .ingest(
            IngestRequest::new(&cid, "notes.txt", GREEK)
                .with_strategy(paragraphs(50))
                .with_document_id("doc_fixed"),
        )
        .await
        .unwrap();
    let first_ids: Vec<String> = kb.list_chunks("doc_fixed").unwrap().into_iter().map(|c| c.id).collect();

    let second = kb
        .ingest(
            IngestRequest::new(&cid, "notes.txt", "Only one paragraph now.")
                .with_strategy(paragraphs(50))
                .with_document_id("doc_fixed"),
        )
        .await
        .unwrap();
    assert_eq!(first.document.id, second.document.id);

    let chunks = kb.list_chunks("doc_fixed").unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, first_ids[0]);
    assert_eq!(chunks[0].content, "Only one paragraph now.");

    // The stale second point is gone from the backend.
    assert_eq!(backend.point_ids(&cid), vec![first_ids[0].clone()]);

    let collection = kb.get_collection(&cid).unwrap();
    assert_eq!(collection.document_count, 1);
    assert_eq!(collection.chunk_count, 1);
    assert_eq!(store.count_chunks(Some(&cid)).unwrap(), 1);
}

#[tokio::test]
async fn reingest_into_another_collection_is_rejected() {
    let kb = helpers::knowledge_base(helpers::test_store(), None, Arc::new(KeywordEmbedder::default()));
    let a = collection(&kb, "a").await;
    let b = collection(&kb, "b").await;

    kb.ingest(IngestRequest::new(&a, "x.txt", GREEK).with_document_id("doc_x"))
        .await
        .unwrap();
    let err = kb
        .ingest(IngestRequest::new(&b, "x.txt", GREEK).with_document_id("doc_x"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "document_id", .. }));
    assert_eq!(kb.get_document("doc_x").unwrap().collection_id, a);
}

#[tokio::test]
async fn partial_embedding_is_recorded_not_fatal() {
    let store = helpers::test_store();
    let kb = helpers::knowledge_base(store.clone(), None, Arc::new(KeywordEmbedder::failing_on("BROKEN")));
    let cid = collection(&kb, "mixed").await;

    let text = "first paragraph here\n\nBROKEN paragraph\n\nthe third paragraph text";
    let report = kb
        .ingest(IngestRequest::new(&cid, "mixed.txt", text).with_strategy(paragraphs(30)))
        .await
        .unwrap();
    assert_eq!(report.chunks_created, 3);
    assert_eq!(report.chunks_embedded, 2);
    assert_eq!(report.chunks_skipped, 1);
    assert_eq!(report.document.chunk_count, 3);
    assert_eq!(report.document.embedded_chunk_count, 2);
    assert!(report.document.is_partially_embedded());

    let chunks = kb.list_chunks(&report.document.id).unwrap();
    assert!(chunks[1].embedding.is_none());
    assert_eq!(
        store.list_chunks(&ChunkFilter::embedded_in(&cid)).unwrap().len(),
        2
    );

    let outcome = kb
        .search(&SearchRequest::new("paragraph").in_collection(&cid).limit(10))
        .await
        .unwrap();
    assert!(outcome.hits.iter().all(|h| h.chunk_id != chunks[1].id));
}

#[tokio::test]
async fn search_without_embeddings_reports_unavailable() {
    let store = helpers::test_store();
    let kb = helpers::knowledge_base(store.clone(), None, Arc::new(FailingEmbedder));
    let cid = collection(&kb, "down").await;

    let report = kb.ingest(IngestRequest::new(&cid, "a.txt", GREEK)).await.unwrap();
    assert_eq!(report.chunks_embedded, 0);
    assert_eq!(report.document.embedded_chunk_count, 0);

    let outcome = kb
        .search(&SearchRequest::new("Gamma").in_collection(&cid))
        .await
        .unwrap();
    assert_eq!(outcome.mode, SearchMode::EmbeddingUnavailable);
    assert!(outcome.hits.is_empty());
}

#[tokio::test]
async fn global_search_spans_collections() {
    let kb = helpers::knowledge_base(helpers::test_store(), None, Arc::new(KeywordEmbedder::default()));
    let a = collection(&kb, "a").await;
    let b = collection(&kb, "b").await;
    kb.ingest(IngestRequest::new(&a, "a.txt", "apples and pears")).await.unwrap();
    kb.ingest(IngestRequest::new(&b, "b.txt", "rivers and pears")).await.unwrap();

    let outcome = kb.search(&SearchRequest::new("pears").limit(10)).await.unwrap();
    assert_eq!(outcome.mode, SearchMode::Global);
    let mut collections: Vec<&str> = outcome.hits.iter().map(|h| h.collection_id.as_str()).collect();
    collections.sort();
    let mut expected = vec![a.as_str(), b.as_str()];
    expected.sort();
    assert_eq!(collections, expected);
}

#[tokio::test]
async fn search_validates_parameters() {
    let kb = helpers::knowledge_base(helpers::test_store(), None, Arc::new(KeywordEmbedder::default()));
    let cid = collection(&kb, "v").await;

    let err = kb
        .search(&SearchRequest::new("x").in_collection(&cid).limit(0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "limit", .. }));

    let err = kb
        .search(&SearchRequest::new("x").in_collection(&cid).threshold(1.5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "score_threshold", .. }));

    let err = kb
        .search(&SearchRequest::new("x").in_collection("col_missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: "collection", .. }));
}

#[tokio::test]
async fn collection_model_is_used_for_ingest_and_search() {
    let embedder = Arc::new(KeywordEmbedder::default());
    let kb = helpers::knowledge_base(helpers::test_store(), None, embedder.clone());
    let cid = kb
        .create_collection(CreateCollection {
            name: "custom".into(),
            description: String::new(),
            embedding_model: Some("mxbai-embed-large".into()),
        })
        .await
        .unwrap()
        .id;

    kb.ingest(IngestRequest::new(&cid, "a.txt", "hello")).await.unwrap();
    kb.search(&SearchRequest::new("hello").in_collection(&cid)).await.unwrap();

    assert!(embedder.models_seen().iter().all(|m| m == "mxbai-embed-large"));
}

#[tokio::test]
async fn rag_context_respects_budget_and_labels_sources() {
    let kb = helpers::knowledge_base(helpers::test_store(), None, Arc::new(KeywordEmbedder::default()));
    let cid = collection(&kb, "rag").await;
    kb.ingest(IngestRequest::new(&cid, "greek.txt", "Gamma differs.")).await.unwrap();

    let rag = kb
        .rag_context(&RagRequest {
            query: "Gamma differs".into(),
            collection_id: Some(cid.clone()),
            limit: 5,
            max_tokens: 100,
            include_sources: true,
        })
        .await
        .unwrap();
    assert_eq!(rag.results_used, 1);
    assert_eq!(rag.context, "[Source: greek.txt]\nGamma differs.");
    assert_eq!(rag.sources.len(), 1);
    assert!(rag.total_tokens <= 100);

    let tiny = kb
        .rag_context(&RagRequest {
            query: "Gamma differs".into(),
            collection_id: Some(cid),
            limit: 5,
            max_tokens: 1,
            include_sources: true,
        })
        .await
        .unwrap();
    assert_eq!(tiny.results_used, 0);
    assert!(tiny.context.is_empty());
    assert!(tiny.sources.is_empty());
}

#[tokio::test]
async fn deleting_collection_cascades() {
    let store = helpers::test_store();
    let backend = Arc::new(InMemoryBackend::default());
    let kb = helpers::knowledge_base(store.clone(), Some(backend.clone()), Arc::new(KeywordEmbedder::default()));
    let cid = collection(&kb, "gone").await;
    let report = kb.ingest(IngestRequest::new(&cid, "a.txt", GREEK)).await.unwrap();

    kb.delete_collection(&cid).await.unwrap();

    assert!(matches!(kb.get_collection(&cid), Err(Error::NotFound { .. })));
    assert!(matches!(kb.get_document(&report.document.id), Err(Error::NotFound { .. })));
    assert_eq!(store.count_chunks(None).unwrap(), 0);
    assert!(backend.dimension(&cid).is_none());
    assert!(matches!(kb.delete_collection(&cid).await, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn delete_document_updates_counters() {
    let kb = helpers::knowledge_base(helpers::test_store(), None, Arc::new(KeywordEmbedder::default()));
    let cid = collection(&kb, "docs").await;
    let keep = kb
        .ingest(IngestRequest::new(&cid, "keep.txt", GREEK).with_strategy(paragraphs(50)))
        .await
        .unwrap();
    let drop = kb.ingest(IngestRequest::new(&cid, "drop.txt", "bye")).await.unwrap();

    kb.delete_document(&drop.document.id).await.unwrap();

    let collection = kb.get_collection(&cid).unwrap();
    assert_eq!(collection.document_count, 1);
    assert_eq!(collection.chunk_count, keep.document.chunk_count);

    let stats = kb.stats().unwrap();
    assert_eq!(stats.total_documents, 1);
    assert_eq!(stats.total_chunks, 2);
    assert_eq!(stats.collections[0].chunk_count, 2);
}

#[tokio::test]
async fn embed_reports_dimension_or_unavailable() {
    let kb = helpers::knowledge_base(helpers::test_store(), None, Arc::new(KeywordEmbedder::default()));
    let out = kb
        .embed(&["one".to_string(), "two".to_string()], None)
        .await
        .unwrap()
        .ok()
        .unwrap();
    assert_eq!(out.embeddings.len(), 2);
    assert_eq!(out.dimension, helpers::DIM);
    assert_eq!(out.model, "nomic-embed-text");

    let down = helpers::knowledge_base(helpers::test_store(), None, Arc::new(FailingEmbedder));
    assert!(!down.embed(&["one".to_string()], None).await.unwrap().is_available());
    assert!(down.embed(&[], None).await.is_err());
}
