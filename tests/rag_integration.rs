/// End-to-end tests: build indexes from real files and answer questions offline
use anyhow::Result;
use ragabond::config::Config;
use ragabond::embedding::HashEmbedder;
use ragabond::error::{IndexError, RagError};
use ragabond::generation::ScriptedModel;
use ragabond::types::{AskRequest, CreateIndexRequest};
use ragabond::{ConversationalRetriever, RagClient};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn offline_client(dir: &TempDir, model: Arc<ScriptedModel>) -> Result<RagClient> {
    let mut config = Config::default();
    config.index.root = dir.path().join("indexes");
    config.embedding.provider = "hash".to_string();

    Ok(RagClient::with_components(
        config,
        Arc::new(HashEmbedder::new()),
        model,
    )?)
}

fn write(dir: &TempDir, name: &str, content: &str) -> Result<String> {
    let path = dir.path().join(name);
    std::fs::write(&path, content)?;
    Ok(path.to_string_lossy().to_string())
}

#[tokio::test]
async fn test_capital_of_france() -> Result<()> {
    let dir = TempDir::new()?;
    let model = Arc::new(ScriptedModel::new("The capital of France is Paris."));
    let client = offline_client(&dir, model.clone())?;
    let file = write(&dir, "france.txt", "Paris is the capital of France.")?;

    client
        .create_index(
            CreateIndexRequest {
                name: "docs".to_string(),
                file_paths: vec![file],
            },
            None,
        )
        .await?;

    let response = client
        .ask(AskRequest {
            index: "docs".to_string(),
            query: "What is the capital of France?".to_string(),
            top_k: None,
        })
        .await?;

    assert!(response.answer.contains("Paris"));
    assert_eq!(response.sources.len(), 1);
    assert!(
        response.sources[0]
            .excerpt
            .contains("Paris is the capital of France.")
    );
    Ok(())
}

#[tokio::test]
async fn test_memory_empty_after_sequential_queries() -> Result<()> {
    let dir = TempDir::new()?;
    let model = Arc::new(ScriptedModel::new("Paris."));
    let client = offline_client(&dir, model)?;
    let file = write(&dir, "france.txt", "Paris is the capital of France.")?;

    client
        .create_index(
            CreateIndexRequest {
                name: "docs".to_string(),
                file_paths: vec![file],
            },
            None,
        )
        .await?;

    let index = client.open_index("docs").await?;
    let mut retriever: ConversationalRetriever = client.retriever();

    retriever.ask(&index, "What is the capital of France?").await;
    retriever.ask(&index, "Is Paris in Europe?").await;
    assert_eq!(retriever.session().len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_mixed_document_types_and_manifest_order() -> Result<()> {
    let dir = TempDir::new()?;
    let client = offline_client(&dir, Arc::new(ScriptedModel::new("ok")))?;

    let csv = write(&dir, "cities.csv", "Paris,France\nRome,Italy\n")?;
    let json = write(&dir, "facts.json", r#"{"river":"Seine","city":"Paris"}"#)?;
    let txt = write(&dir, "notes.txt", "Notes about European capitals.")?;
    let skipped = write(&dir, "image.png", "not really a png")?;

    let files = vec![csv, json, skipped, txt];
    let response = client
        .create_index(
            CreateIndexRequest {
                name: "mixed".to_string(),
                file_paths: files.clone(),
            },
            None,
        )
        .await?;

    assert_eq!(response.files_indexed, 3);
    assert!(response.chunks_created >= 1);

    let manifest = client.manifest("mixed")?;
    let expected: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
    assert_eq!(manifest, expected);

    let index = client.open_index("mixed").await?;
    let hits = index.search("Seine river", 4).await?;
    assert!(!hits.is_empty());
    assert!(hits.iter().any(|hit| hit.content.contains("\"river\": \"Seine\"")));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_name_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let client = offline_client(&dir, Arc::new(ScriptedModel::new("ok")))?;
    let file = write(&dir, "a.txt", "First version.")?;

    let request = CreateIndexRequest {
        name: "docs".to_string(),
        file_paths: vec![file],
    };
    client.create_index(request.clone(), None).await?;

    let err = client.create_index(request, None).await.unwrap_err();
    assert!(matches!(err, RagError::Index(IndexError::AlreadyExists(_))));
    assert_eq!(client.list_indexes()?.indexes, vec!["docs"]);
    Ok(())
}

#[tokio::test]
async fn test_delete_then_open_not_found() -> Result<()> {
    let dir = TempDir::new()?;
    let client = offline_client(&dir, Arc::new(ScriptedModel::new("ok")))?;
    let file = write(&dir, "a.txt", "Temporary content.")?;

    client
        .create_index(
            CreateIndexRequest {
                name: "temp".to_string(),
                file_paths: vec![file],
            },
            None,
        )
        .await?;
    client.delete_index("temp").await?;

    let err = client.open_index("temp").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!dir.path().join("indexes").join("temp").exists());
    Ok(())
}

#[tokio::test]
async fn test_background_build_progress_reaches_total() -> Result<()> {
    let dir = TempDir::new()?;
    let client = offline_client(&dir, Arc::new(ScriptedModel::new("ok")))?;
    let text = "Each sentence here adds a little more text to the document. ".repeat(60);
    let file = write(&dir, "long.txt", &text)?;

    let (handle, mut progress) = client.spawn_create(CreateIndexRequest {
        name: "long".to_string(),
        file_paths: vec![file],
    });

    let mut updates = Vec::new();
    while let Some(state) = progress.recv().await {
        updates.push(state);
    }
    let response = handle.await??;

    assert!(response.chunks_created > 1);
    assert_eq!(updates.len(), response.chunks_created);
    let last = updates.last().copied().unwrap_or_else(|| panic!("no progress"));
    assert_eq!(last.processed, last.total);
    assert!(last.estimated_remaining.as_secs_f64() >= 0.0);
    Ok(())
}

#[tokio::test]
async fn test_indexes_are_independent() -> Result<()> {
    let dir = TempDir::new()?;
    let model = Arc::new(ScriptedModel::new("answer"));
    let client = offline_client(&dir, model.clone())?;
    let geo = write(&dir, "geo.txt", "Paris is the capital of France.")?;
    let food = write(&dir, "food.txt", "Croissants are made with butter.")?;

    for (name, file) in [("geo", geo), ("food", food)] {
        client
            .create_index(
                CreateIndexRequest {
                    name: name.to_string(),
                    file_paths: vec![file],
                },
                None,
            )
            .await?;
    }

    let response = client
        .ask(AskRequest {
            index: "food".to_string(),
            query: "What are croissants made with?".to_string(),
            top_k: None,
        })
        .await?;

    assert_eq!(response.sources.len(), 1);
    assert!(response.sources[0].excerpt.contains("butter"));
    assert!(!model.prompts()[0].contains("Paris"));
    Ok(())
}
