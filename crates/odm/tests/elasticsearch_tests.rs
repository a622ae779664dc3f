//! Elasticsearch gateway integration tests.
//!
//! Gateway construction tests run everywhere. The round-trip tests start a
//! real Elasticsearch node with testcontainers and are ignored by default.
//!
//! Run with: `cargo test -p elastic-odm -- --ignored es_integration`

#![cfg(feature = "elasticsearch")]

mod common;

use elastic_odm::config::{ElasticsearchAuth, OdmConfig};
use elastic_odm::error::{GatewayError, OdmError};
use elastic_odm::gateway::{DocumentGateway, ElasticsearchGateway};
use elastic_odm::OdmContext;

// ============================================================================
// Gateway configuration tests (no Elasticsearch instance required)
// ============================================================================

#[test]
fn test_gateway_creation() {
    let gateway = ElasticsearchGateway::new(&OdmConfig::default()).unwrap();
    assert_eq!(gateway.name(), "elasticsearch");
}

#[test]
fn test_gateway_with_basic_auth() {
    let mut config = OdmConfig::default();
    config.connection.auth = Some(ElasticsearchAuth::Basic {
        username: "elastic".to_string(),
        password: "changeme".to_string(),
    });
    assert!(ElasticsearchGateway::new(&config).is_ok());
}

#[test]
fn test_invalid_cloud_id_is_rejected() {
    let mut config = OdmConfig::default();
    config.connection.cloud_id = Some("not-a-cloud-id".to_string());
    let err = OdmContext::connect(config).unwrap_err();
    assert!(matches!(
        err,
        OdmError::Gateway(GatewayError::ConnectionFailed { .. })
    ));
}

// ============================================================================
// Integration tests (requires Docker for testcontainers)
// ============================================================================

mod es_integration {
    use std::sync::Arc;

    use serde_json::json;
    use testcontainers::ImageExt;
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::elastic_search::ElasticSearch;
    use tokio::sync::OnceCell;

    use elastic_odm::config::OdmConfig;
    use elastic_odm::gateway::{DeleteOutcome, DocumentGateway, ElasticsearchGateway};
    use elastic_odm::query::Filterable;
    use elastic_odm::{Model, OdmContext, Repository};

    use super::common::{Post, attributes};

    /// Shared Elasticsearch container reused across all tests in this module.
    struct SharedEs {
        url: String,
        _container: testcontainers::ContainerAsync<ElasticSearch>,
    }

    static SHARED_ES: OnceCell<SharedEs> = OnceCell::const_new();

    async fn shared_es() -> &'static SharedEs {
        SHARED_ES
            .get_or_init(|| async {
                let container = ElasticSearch::default()
                    .with_env_var("ES_JAVA_OPTS", "-Xms256m -Xmx256m")
                    .with_startup_timeout(std::time::Duration::from_secs(120))
                    .start()
                    .await
                    .expect("Failed to start Elasticsearch container");

                let port = container
                    .get_host_port_ipv4(9200)
                    .await
                    .expect("Failed to get host port");
                let host = container.get_host().await.expect("Failed to get host");

                SharedEs {
                    url: format!("http://{}:{}", host, port),
                    _container: container,
                }
            })
            .await
    }

    /// Builds a context with a unique index prefix so tests stay isolated.
    async fn create_context() -> OdmContext {
        let es = shared_es().await;
        let mut config = OdmConfig::for_testing();
        config.connection.hosts = vec![es.url.clone()];
        config.index_prefix = format!("odm_{}_", uuid::Uuid::new_v4().simple());

        let gateway = ElasticsearchGateway::new(&config).expect("Failed to create gateway");
        OdmContext::new(Arc::new(gateway), config)
    }

    async fn create_posts() -> Repository<Post> {
        let posts = Repository::<Post>::new(&create_context().await);
        assert!(posts.create_index().await.unwrap());
        posts
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn es_integration_index_lifecycle() {
        let posts = create_posts().await;
        assert!(posts.index_exists().await.unwrap());
        assert!(!posts.create_index().await.unwrap());
        assert!(posts.update_mapping().await.unwrap());
        assert!(posts.drop_index().await.unwrap());
        assert!(!posts.drop_index().await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn es_integration_save_find_and_soft_delete() {
        let posts = create_posts().await;

        let post = posts
            .create(attributes(json!({ "title": "Hello", "views": 3 })))
            .await
            .unwrap();
        let id = post.id().unwrap().to_string();

        let found = posts.find_or_fail(&id).await.unwrap();
        assert_eq!(found.title, "Hello");

        assert!(posts.delete(&found).await.unwrap());
        assert!(posts.find(&id).await.unwrap().is_none());
        assert_eq!(posts.query().count().await.unwrap(), 0);

        let mut trashed = posts.query();
        trashed.only_trashed();
        assert_eq!(trashed.count().await.unwrap(), 1);

        assert!(posts.restore(&found).await.unwrap());
        assert_eq!(posts.query().count().await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn es_integration_query_and_paginate() {
        let posts = create_posts().await;
        let models: Vec<Post> = (0..25)
            .map(|i| {
                let mut post = Post::new(&format!("Post {}", i));
                post.id = Some(format!("p{:02}", i));
                post.views = i;
                post
            })
            .collect();
        let report = posts.bulk_index(&models).await.unwrap();
        assert_eq!(report.success, 25);

        let mut query = posts.query();
        query
            .where_("views", ">=", 10)
            .unwrap()
            .order_by("views", "asc")
            .unwrap();
        assert_eq!(query.count().await.unwrap(), 15);

        let page = query.paginate(10, Some(2)).await.unwrap();
        assert_eq!(page.total(), 15);
        assert_eq!(page.items().len(), 5);
        assert_eq!(page.items()[0].views, 20);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn es_integration_missing_documents() {
        let context = create_context().await;
        let posts = Repository::<Post>::new(&context);
        assert!(posts.create_index().await.unwrap());

        assert!(posts.find("missing").await.unwrap().is_none());
        let outcome = context
            .gateway()
            .delete(posts.index_name(), "missing")
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn es_integration_truncate() {
        let posts = create_posts().await;
        for title in ["a", "b", "c"] {
            posts.save(Post::new(title)).await.unwrap();
        }
        assert_eq!(posts.truncate().await.unwrap(), 3);
        assert_eq!(posts.query().count().await.unwrap(), 0);
        assert!(Post::schema().soft_deletes());
    }
}
