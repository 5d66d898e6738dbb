use axum::http::StatusCode;
use axum_test::TestServer;
use feedstore::api::create_router;
use feedstore::db::Database;
use feedstore::models::*;
use feedstore::store::{NodeId, NodeStore};

fn setup() -> (TestServer, Database) {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db.clone());
    let server = tokio_test::assert_ok!(TestServer::new(app));
    (server, db)
}

async fn create_test_feed(server: &TestServer, system_name: &str) -> FeedSummary {
    server
        .post("/api/v1/feeds")
        .json(&CreateFeedInput {
            category: "sales".to_string(),
            system_name: system_name.to_string(),
        })
        .await
        .json::<FeedSummary>()
}

async fn create_test_datasource(server: &TestServer, name: &str) -> DatasourceSummary {
    server
        .post("/api/v1/datasources")
        .json(&CreateDatasourceInput {
            name: name.to_string(),
        })
        .await
        .json::<DatasourceSummary>()
}

async fn create_test_sla(server: &TestServer, name: &str) -> ServiceLevelAgreement {
    server
        .post("/api/v1/slas")
        .json(&CreateSlaInput {
            name: name.to_string(),
            description: Some("by 6am".to_string()),
        })
        .await
        .json::<ServiceLevelAgreement>()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let (server, _) = setup();
        let response = server.get("/api/v1/health").await;
        response.assert_status_ok();
    }
}

mod feeds {
    use super::*;

    #[tokio::test]
    async fn creates_and_lists_feeds() {
        let (server, _) = setup();

        let response = server
            .post("/api/v1/feeds")
            .json(&CreateFeedInput {
                category: "sales".to_string(),
                system_name: "orders".to_string(),
            })
            .await;
        response.assert_status(StatusCode::CREATED);
        let feed: FeedSummary = response.json();
        assert_eq!(feed.system_name, "orders");

        let feeds: Vec<FeedSummary> = server.get("/api/v1/feeds").await.json();
        assert_eq!(feeds, vec![feed]);
    }

    #[tokio::test]
    async fn rejects_duplicate_feed() {
        let (server, _) = setup();
        create_test_feed(&server, "orders").await;

        let response = server
            .post("/api/v1/feeds")
            .json(&CreateFeedInput {
                category: "sales".to_string(),
                system_name: "orders".to_string(),
            })
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn returns_404_for_unknown_feed() {
        let (server, _) = setup();
        let response = server
            .get(&format!("/api/v1/feeds/{}", NodeId::new()))
            .await;
        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn updates_details() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;
        let template: FeedTemplate = server
            .post("/api/v1/templates")
            .json(&CreateTemplateInput {
                name: "ingest".to_string(),
            })
            .await
            .json();

        let response = server
            .put(&format!("/api/v1/feeds/{}/details", feed.id))
            .json(&UpdateFeedDetailsInput {
                json: Some("{}".to_string()),
                process_group_id: Some("pg-1".to_string()),
                template_id: Some(template.id),
            })
            .await;

        response.assert_status_ok();
        let view: FeedDetailsView = response.json();
        assert_eq!(view.feed.id, feed.id);
        assert_eq!(view.json.as_deref(), Some("{}"));
        assert_eq!(view.process_group_id.as_deref(), Some("pg-1"));
        assert_eq!(view.template, Some(template));
    }

    #[tokio::test]
    async fn rejects_unknown_template() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;

        let response = server
            .put(&format!("/api/v1/feeds/{}/details", feed.id))
            .json(&UpdateFeedDetailsInput {
                template_id: Some(NodeId::new()),
                ..Default::default()
            })
            .await;

        response.assert_status_not_found();
    }
}

mod dependents {
    use super::*;

    #[tokio::test]
    async fn adds_and_removes_both_directions() {
        let (server, _) = setup();
        let f1 = create_test_feed(&server, "f1").await;
        let f2 = create_test_feed(&server, "f2").await;
        let edge = format!("/api/v1/feeds/{}/dependents/{}", f1.id, f2.id);

        let added: ChangeResponse = server.post(&edge).await.json();
        assert!(added.changed);
        let again: ChangeResponse = server.post(&edge).await.json();
        assert!(!again.changed);

        let dependents: Vec<FeedSummary> = server
            .get(&format!("/api/v1/feeds/{}/dependents", f1.id))
            .await
            .json();
        assert_eq!(dependents, vec![f2.clone()]);
        let used_by: Vec<FeedSummary> = server
            .get(&format!("/api/v1/feeds/{}/used-by", f2.id))
            .await
            .json();
        assert_eq!(used_by, vec![f1.clone()]);

        let removed: ChangeResponse = server.delete(&edge).await.json();
        assert!(removed.changed);
        let used_by: Vec<FeedSummary> = server
            .get(&format!("/api/v1/feeds/{}/used-by", f2.id))
            .await
            .json();
        assert!(used_by.is_empty());
    }

    #[tokio::test]
    async fn rejects_self_dependency() {
        let (server, _) = setup();
        let f1 = create_test_feed(&server, "f1").await;

        let response = server
            .post(&format!("/api/v1/feeds/{}/dependents/{}", f1.id, f1.id))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

mod slas {
    use super::*;

    #[tokio::test]
    async fn sets_adds_and_removes_references() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;
        let x = create_test_sla(&server, "daily").await;
        let y = create_test_sla(&server, "daily").await;

        let response = server
            .put(&format!("/api/v1/feeds/{}/slas", feed.id))
            .json(&SetSlasInput {
                sla_ids: vec![x.id],
            })
            .await;
        response.assert_status_ok();

        let added: ChangeResponse = server
            .post(&format!("/api/v1/feeds/{}/slas/{}", feed.id, y.id))
            .await
            .json();
        assert!(added.changed);

        let removed: ChangeResponse = server
            .delete(&format!("/api/v1/feeds/{}/slas/{}", feed.id, x.id))
            .await
            .json();
        assert!(removed.changed);

        let slas: Vec<ServiceLevelAgreement> = server
            .get(&format!("/api/v1/feeds/{}/slas", feed.id))
            .await
            .json();
        assert_eq!(slas, vec![y]);
    }

    #[tokio::test]
    async fn rejects_unknown_sla() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;

        let response = server
            .put(&format!("/api/v1/feeds/{}/slas", feed.id))
            .json(&SetSlasInput {
                sla_ids: vec![NodeId::new()],
            })
            .await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn does_not_reference_a_precondition_agreement() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;
        let precondition: PreconditionSummary = server
            .post(&format!("/api/v1/feeds/{}/precondition", feed.id))
            .await
            .json();
        let nested = precondition.sla.expect("nested agreement exists");

        server
            .post(&format!("/api/v1/feeds/{}/slas/{}", feed.id, nested.id))
            .await
            .assert_status_not_found();

        let slas: Vec<ServiceLevelAgreement> = server
            .get(&format!("/api/v1/feeds/{}/slas", feed.id))
            .await
            .json();
        assert!(slas.is_empty());
    }
}

mod endpoints {
    use super::*;

    #[tokio::test]
    async fn attaches_and_detaches_a_source() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;
        let ds = create_test_datasource(&server, "warehouse").await;

        let response = server
            .post(&format!("/api/v1/feeds/{}/sources", feed.id))
            .json(&AttachEndpointInput {
                datasource_id: ds.id,
            })
            .await;
        response.assert_status(StatusCode::CREATED);
        let source: EndpointSummary = response.json();
        assert_eq!(source.kind, EndpointKind::Source);
        assert_eq!(source.datasource_id, Some(ds.id));

        let sources: Vec<EndpointSummary> = server
            .get(&format!("/api/v1/feeds/{}/sources", feed.id))
            .await
            .json();
        assert_eq!(sources, vec![source]);

        server
            .delete(&format!("/api/v1/feeds/{}/sources/{}", feed.id, ds.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/api/v1/feeds/{}/sources/{}", feed.id, ds.id))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn removes_all_destinations_with_a_report() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;
        let ds1 = create_test_datasource(&server, "warehouse").await;
        let ds2 = create_test_datasource(&server, "lake").await;
        for ds in [&ds1, &ds2] {
            server
                .post(&format!("/api/v1/feeds/{}/destinations", feed.id))
                .json(&AttachEndpointInput {
                    datasource_id: ds.id,
                })
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server
            .delete(&format!("/api/v1/feeds/{}/destinations", feed.id))
            .await;

        response.assert_status_ok();
        let report: RemovalReport = response.json();
        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());

        let datasources: Vec<DatasourceSummary> = server.get("/api/v1/datasources").await.json();
        assert!(datasources.iter().all(|d| d.feed_destinations.is_empty()));
    }

    #[tokio::test]
    async fn returns_409_when_the_feed_is_locked() {
        let (server, db) = setup();
        let feed = create_test_feed(&server, "orders").await;
        let ds = create_test_datasource(&server, "warehouse").await;
        db.lock(feed.id).expect("Failed to lock feed");

        let response = server
            .post(&format!("/api/v1/feeds/{}/sources", feed.id))
            .json(&AttachEndpointInput {
                datasource_id: ds.id,
            })
            .await;

        response.assert_status(StatusCode::CONFLICT);
        assert!(response.text().contains("orders"));
    }
}

mod precondition {
    use super::*;

    #[tokio::test]
    async fn is_absent_until_created() {
        let (server, _) = setup();
        let feed = create_test_feed(&server, "orders").await;
        let path = format!("/api/v1/feeds/{}/precondition", feed.id);

        server.get(&path).await.assert_status_not_found();

        let response = server.post(&path).await;
        response.assert_status(StatusCode::CREATED);
        let created: PreconditionSummary = response.json();
        assert!(created.sla.is_some());
        assert!(created.sla_ref.is_none());

        let fetched: PreconditionSummary = server.get(&path).await.json();
        assert_eq!(fetched.id, created.id);
    }
}
