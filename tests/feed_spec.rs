use feedstore::db::Database;
use feedstore::feed::{Feed, FeedError, FeedProvider};
use feedstore::store::{NodeStore, PropertyValue, StoreError};
use speculate2::speculate;

fn create_feed(provider: &FeedProvider<Database>, system_name: &str) -> Feed<Database> {
    provider
        .create_feed("sales", system_name)
        .expect("Failed to create feed")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let provider = FeedProvider::new(db.clone());
    }

    describe "feed provider" {
        it "creates a checked-in feed with its first version" {
            let feed = create_feed(&provider, "orders");

            assert_eq!(feed.system_name().unwrap(), "orders");
            assert_eq!(feed.category().unwrap(), "sales");
            assert!(!db.is_checked_out(feed.id()).unwrap());
            assert_eq!(feed.versions().unwrap().len(), 1);
        }

        it "rejects a duplicate system name within a category" {
            create_feed(&provider, "orders");
            let result = provider.create_feed("sales", "orders");
            assert!(matches!(result, Err(FeedError::DuplicateFeed { .. })));

            provider.create_feed("marketing", "orders").expect("other category is fine");
            assert_eq!(provider.list_feeds().unwrap().len(), 2);
        }

        it "finds feeds by id only" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();

            assert_eq!(provider.find_feed(feed.id()).unwrap(), Some(feed.clone()));
            assert!(provider.find_feed(details.id()).unwrap().is_none());
            assert_eq!(details.parent_feed().unwrap(), feed);
        }
    }

    describe "dependency edges" {
        it "keeps both directions in step" {
            let f1 = create_feed(&provider, "f1");
            let f2 = create_feed(&provider, "f2");
            let d1 = f1.details().unwrap();
            let d2 = f2.details().unwrap();

            assert!(d1.get_dependent_feeds().unwrap().is_empty());
            assert!(d1.add_dependent_feed(&f2).unwrap());

            assert_eq!(d1.get_dependent_feeds().unwrap(), vec![f2.clone()]);
            assert_eq!(d2.get_used_by_feeds().unwrap(), vec![f1.clone()]);

            assert!(d1.remove_dependent_feed(&f2).unwrap());
            assert!(d1.get_dependent_feeds().unwrap().is_empty());
            assert!(d2.get_used_by_feeds().unwrap().is_empty());
        }

        it "is idempotent" {
            let f1 = create_feed(&provider, "f1");
            let f2 = create_feed(&provider, "f2");
            let d1 = f1.details().unwrap();

            assert!(d1.add_dependent_feed(&f2).unwrap());
            assert!(!d1.add_dependent_feed(&f2).unwrap());
            assert_eq!(d1.get_dependent_feeds().unwrap(), vec![f2.clone()]);
            assert_eq!(f2.details().unwrap().get_used_by_feeds().unwrap(), vec![f1]);

            assert!(d1.remove_dependent_feed(&f2).unwrap());
            assert!(!d1.remove_dependent_feed(&f2).unwrap());
        }

        it "rejects a feed depending on itself" {
            let f1 = create_feed(&provider, "f1");
            let d1 = f1.details().unwrap();

            let result = d1.add_dependent_feed(&f1);
            assert!(matches!(result, Err(FeedError::SelfDependency(ref name)) if name == "f1"));
            assert!(d1.get_dependent_feeds().unwrap().is_empty());
            assert!(d1.get_used_by_feeds().unwrap().is_empty());
        }

        it "rolls back the peer side when the local side fails" {
            let f1 = create_feed(&provider, "f1");
            let f2 = create_feed(&provider, "f2");
            let d1 = f1.details().unwrap();
            db.set_property(d1.id(), "tba:dependentFeeds", PropertyValue::String("corrupt".into()))
                .unwrap();

            let result = d1.add_dependent_feed(&f2);

            assert!(matches!(
                result,
                Err(FeedError::Persistence { source: StoreError::TypeMismatch { .. }, .. })
            ));
            assert!(f2.details().unwrap().get_used_by_feeds().unwrap().is_empty());
        }

        it "drops edges to feeds that no longer exist" {
            let f1 = create_feed(&provider, "f1");
            let f2 = create_feed(&provider, "f2");
            let d1 = f1.details().unwrap();
            d1.add_dependent_feed(&f2).unwrap();

            db.remove_node(f2.id()).unwrap();

            assert!(d1.get_dependent_feeds().unwrap().is_empty());
        }

        it "can touch only the used-by side" {
            let f1 = create_feed(&provider, "f1");
            let f2 = create_feed(&provider, "f2");

            assert!(f2.add_used_by_feed(&f1).unwrap());

            assert_eq!(f2.details().unwrap().get_used_by_feeds().unwrap(), vec![f1.clone()]);
            assert!(f1.details().unwrap().get_dependent_feeds().unwrap().is_empty());

            assert!(f2.remove_used_by_feed(&f1).unwrap());
            assert!(f2.details().unwrap().get_used_by_feeds().unwrap().is_empty());
        }
    }

    describe "service level agreements" {
        it "adds references without copying" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let sla = provider.create_sla("daily", Some("by 6am")).unwrap();

            assert!(details.add_service_level_agreement(&sla).unwrap());
            assert!(!details.add_service_level_agreement(&sla).unwrap());
            assert_eq!(details.get_service_level_agreements().unwrap(), vec![sla.clone()]);
            assert_eq!(provider.list_slas().unwrap(), vec![sla]);
        }

        it "removes by identity, not content" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let x = provider.create_sla("daily", Some("by 6am")).unwrap();
            let y = provider.create_sla("daily", Some("by 6am")).unwrap();
            details.set_service_level_agreements(&[x.clone(), y.clone()]).unwrap();

            assert!(details.remove_service_level_agreement(&x.id.to_string()).unwrap());

            assert_eq!(details.get_service_level_agreements().unwrap(), vec![y]);
            assert!(provider.find_sla(x.id).unwrap().is_some());
        }

        it "matches the identity case-insensitively" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let sla = provider.create_sla("daily", None).unwrap();
            details.add_service_level_agreement(&sla).unwrap();

            let upper = sla.id.to_string().to_ascii_uppercase();
            assert!(details.remove_service_level_agreement(&upper).unwrap());
            assert!(!details.remove_service_level_agreement(&upper).unwrap());
        }

        it "replaces the set wholesale" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let a = provider.create_sla("a", None).unwrap();
            let b = provider.create_sla("b", None).unwrap();
            details.set_service_level_agreements(&[a]).unwrap();

            details.set_service_level_agreements(&[b.clone()]).unwrap();

            assert_eq!(details.get_service_level_agreements().unwrap(), vec![b]);
        }

        it "refuses a precondition's own agreement" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let shared = provider.create_sla("daily", None).unwrap();
            let nested = details
                .create_new_precondition()
                .unwrap()
                .agreement()
                .unwrap()
                .expect("nested agreement exists");

            assert!(provider.find_sla(nested.id).unwrap().is_none());

            let err = details.add_service_level_agreement(&nested).unwrap_err();
            assert!(matches!(err, FeedError::UnsharedSla { sla, .. } if sla == nested.id));
            assert!(err.to_string().contains("orders"));

            let err = details
                .set_service_level_agreements(&[shared.clone(), nested])
                .unwrap_err();
            assert!(matches!(err, FeedError::UnsharedSla { .. }));
            assert!(details.get_service_level_agreements().unwrap().is_empty());

            details.set_service_level_agreements(&[shared.clone()]).unwrap();
            assert_eq!(details.get_service_level_agreements().unwrap(), vec![shared]);
        }
    }

    describe "endpoints" {
        it "finds a source by datasource and forgets it after removal" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds1 = provider.create_datasource("warehouse").unwrap();

            let source = details.ensure_feed_source(&ds1).unwrap();
            let found = details.get_source(ds1.id()).unwrap().expect("source exists");
            assert_eq!(found.id(), source.id());

            details.remove_feed_source(&source).unwrap();
            assert!(details.get_source(ds1.id()).unwrap().is_none());
        }

        it "reports not found when nothing matches" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds1 = provider.create_datasource("warehouse").unwrap();
            let ds2 = provider.create_datasource("lake").unwrap();

            assert!(details.get_source(ds1.id()).unwrap().is_none());
            details.ensure_feed_destination(&ds2).unwrap();
            assert!(details.get_destination(ds1.id()).unwrap().is_none());
            assert!(details.get_source(ds2.id()).unwrap().is_none());
        }

        it "always creates a new endpoint" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds = provider.create_datasource("warehouse").unwrap();

            details.ensure_feed_source(&ds).unwrap();
            details.ensure_feed_source(&ds).unwrap();

            assert_eq!(details.get_sources().unwrap().len(), 2);
        }

        it "keeps the datasource back-references in step" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds = provider.create_datasource("warehouse").unwrap();

            let dest = details.ensure_feed_destination(&ds).unwrap();
            assert_eq!(ds.to_summary().unwrap().feed_destinations, vec![dest.id()]);

            details.remove_feed_destination(&dest).unwrap();
            assert!(ds.to_summary().unwrap().feed_destinations.is_empty());
        }

        it "checks the feed back in after a change" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds = provider.create_datasource("warehouse").unwrap();

            details.ensure_feed_source(&ds).unwrap();

            assert!(!db.is_checked_out(feed.id()).unwrap());
            assert_eq!(feed.versions().unwrap().len(), 2);
        }

        it "refuses to remove another feed's endpoint" {
            let f1 = create_feed(&provider, "f1");
            let f2 = create_feed(&provider, "f2");
            let ds = provider.create_datasource("warehouse").unwrap();
            let source = f2.details().unwrap().ensure_feed_source(&ds).unwrap();

            let result = f1.details().unwrap().remove_feed_source(&source);

            assert!(matches!(result, Err(FeedError::ForeignEndpoint { .. })));
            assert!(f2.details().unwrap().get_source(ds.id()).unwrap().is_some());
        }

        it "names the feed when the version root is locked" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds = provider.create_datasource("warehouse").unwrap();
            let source = details.ensure_feed_source(&ds).unwrap();
            db.lock(feed.id()).unwrap();

            let err = details.remove_feed_source(&source).unwrap_err();

            assert!(err.is_conflict());
            assert!(matches!(err, FeedError::Persistence { source: StoreError::Locked(_), .. }));
            assert!(err.to_string().contains("orders"));
            assert!(details.get_source(ds.id()).unwrap().is_some());
        }

        it "removes every source in bulk" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds1 = provider.create_datasource("warehouse").unwrap();
            let ds2 = provider.create_datasource("lake").unwrap();
            let s1 = details.ensure_feed_source(&ds1).unwrap();
            let s2 = details.ensure_feed_source(&ds2).unwrap();

            let report = details.remove_feed_sources().unwrap();

            assert!(report.is_complete());
            assert_eq!(report.removed, vec![s1.id(), s2.id()]);
            assert!(details.get_sources().unwrap().is_empty());
            assert!(ds1.to_summary().unwrap().feed_sources.is_empty());
            assert!(!db.is_checked_out(feed.id()).unwrap());
        }

        it "reports items that fail during bulk removal" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds1 = provider.create_datasource("warehouse").unwrap();
            let ds2 = provider.create_datasource("lake").unwrap();
            let d1 = details.ensure_feed_destination(&ds1).unwrap();
            let d2 = details.ensure_feed_destination(&ds2).unwrap();
            db.set_property(ds1.id(), "tba:feedDestinations", PropertyValue::String("corrupt".into()))
                .unwrap();

            let report = details.remove_feed_destinations().unwrap();

            assert!(!report.is_complete());
            assert_eq!(report.removed, vec![d2.id()]);
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.failed[0].endpoint_id, d1.id());
            assert!(details.get_destination(ds1.id()).unwrap().is_some());
        }

        it "names the feed when the endpoint is already gone" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let ds = provider.create_datasource("warehouse").unwrap();
            let source = details.ensure_feed_source(&ds).unwrap();
            details.remove_feed_source(&source).unwrap();

            let err = details.remove_feed_source(&source).unwrap_err();

            assert!(matches!(err, FeedError::Persistence { source: StoreError::NodeNotFound(_), .. }));
            assert!(err.to_string().contains("orders"));
        }

        it "returns an empty report when there is nothing to remove" {
            let feed = create_feed(&provider, "orders");
            let report = feed.details().unwrap().remove_feed_sources().unwrap();
            assert!(report.removed.is_empty());
            assert!(report.is_complete());
        }
    }

    describe "precondition" {
        it "is absent until created" {
            let feed = create_feed(&provider, "orders");
            assert!(feed.details().unwrap().get_precondition().unwrap().is_none());
        }

        it "creates an empty nested agreement" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();

            let precondition = details.create_new_precondition().unwrap();

            let summary = precondition.to_summary().unwrap();
            assert!(summary.sla_ref.is_none());
            let sla = summary.sla.expect("nested agreement exists");
            assert!(sla.name.is_none());
            assert!(sla.description.is_none());
            assert_eq!(details.get_precondition().unwrap().map(|p| p.id()), Some(precondition.id()));
        }

        it "discards the previous content when created again" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let shared = provider.create_sla("shared", None).unwrap();

            let first = details.create_new_precondition().unwrap();
            first.describe("hourly", Some("every hour")).unwrap();
            first.set_sla_ref(Some(&shared)).unwrap();
            let first_sla = first.sla_node().unwrap().expect("nested agreement exists");

            let second = details.create_new_precondition().unwrap();

            assert_eq!(second.id(), first.id());
            assert!(second.sla_ref().unwrap().is_none());
            let second_sla = second.sla_node().unwrap().expect("nested agreement exists");
            assert_ne!(second_sla, first_sla);
            assert!(db.node(first_sla).unwrap().is_none());
            assert_eq!(db.children(second.id(), "tba:sla").unwrap().len(), 1);
            let agreement = second.agreement().unwrap().expect("nested agreement exists");
            assert!(agreement.name.is_none());
            assert!(provider.find_sla(shared.id).unwrap().is_some());
        }

        it "identifies the feed by id when it fails" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            db.lock(feed.id()).unwrap();

            let err = details.create_new_precondition().unwrap_err();

            let expected = feed.id().to_string();
            assert!(matches!(err, FeedError::Persistence { feed: ref named, .. } if *named == expected));
            assert!(details.get_precondition().unwrap().is_none());
        }
    }

    describe "details view" {
        it "stores the scalar attributes" {
            let feed = create_feed(&provider, "orders");
            let details = feed.details().unwrap();
            let template = provider.create_template("ingest").unwrap();

            details.set_json(Some(r#"{"schedule":"daily"}"#)).unwrap();
            details.set_process_group_id(Some("pg-1")).unwrap();
            details.set_template(Some(&template)).unwrap();

            assert_eq!(details.summary().unwrap().category, "sales");
            let view = details.to_view().unwrap();
            assert_eq!(view.feed.system_name, "orders");
            assert_eq!(view.json.as_deref(), Some(r#"{"schedule":"daily"}"#));
            assert_eq!(view.process_group_id.as_deref(), Some("pg-1"));
            assert_eq!(view.template, Some(template));
            assert!(view.precondition.is_none());
        }
    }
}
