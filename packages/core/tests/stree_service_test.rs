//! StreeService Tests
//!
//! Request-level behavior over a libsql store: JSON request decoding,
//! degradation to zero values, and event delivery to the sink.

#[cfg(test)]
mod stree_service_tests {
    use anyhow::Result;
    use std::sync::{Arc, Mutex};
    use stree_core::db::{DatabaseService, TursoStore};
    use stree_core::hierarchy::{EventSeverity, HierarchyError, HierarchyEvent};
    use stree_core::models::NodeRequest;
    use stree_core::services::{EventSink, StreeService};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CollectingSink {
        events: Mutex<Vec<(String, HierarchyEvent)>>,
    }

    impl EventSink for CollectingSink {
        fn record(&self, operation: &str, event: &HierarchyEvent) {
            self.events
                .lock()
                .unwrap()
                .push((operation.to_string(), event.clone()));
        }
    }

    async fn create_service() -> Result<(StreeService, Arc<CollectingSink>, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db = DatabaseService::new(temp_dir.path().join("stree.db"), 5000).await?;
        let sink = Arc::new(CollectingSink::default());
        let service =
            StreeService::new(Arc::new(TursoStore::new(Arc::new(db)))).with_sink(sink.clone());
        Ok((service, sink, temp_dir))
    }

    #[test]
    fn test_request_json_shapes() {
        let camel: NodeRequest =
            serde_json::from_str(r#"{"node": "inf", "queryType": 2}"#).unwrap();
        assert_eq!(camel, NodeRequest::query("inf", 2));

        let snake: NodeRequest =
            serde_json::from_str(r#"{"node": "inf", "force_delete": true}"#).unwrap();
        assert_eq!(snake, NodeRequest::delete("inf", true));
    }

    #[tokio::test]
    async fn test_seed_scenario() -> Result<()> {
        let (service, _sink, _temp) = create_service().await?;

        for node in [
            "inf.monitor.thanos",
            "inf.monitor.kafka",
            "inf.monitor.prometheus",
            "inf.monitor.m3db",
        ] {
            service.try_ensure(&NodeRequest::new(node)).await?;
        }

        for node in ["a", "b", "waimai"] {
            assert!(service.query(&NodeRequest::query(node, 1)).await.is_empty());
        }
        assert_eq!(
            service.query(&NodeRequest::query("inf", 1)).await,
            vec!["monitor"]
        );
        assert_eq!(service.query(&NodeRequest::query("inf", 2)).await.len(), 4);
        assert_eq!(
            service.query(&NodeRequest::query("inf.monitor", 3)).await,
            vec![
                "inf.monitor.kafka",
                "inf.monitor.m3db",
                "inf.monitor.prometheus",
                "inf.monitor.thanos"
            ]
        );
        assert!(service
            .query(&NodeRequest::query("sz.monitor", 3))
            .await
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_validation_errors_reach_sink() -> Result<()> {
        let (service, sink, _temp) = create_service().await?;

        assert_eq!(service.ensure(&NodeRequest::new("inf..kafka")).await, 0);
        assert!(matches!(
            service.try_query(&NodeRequest::query("inf", 4)).await,
            Err(HierarchyError::Validation(_))
        ));

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "ensure");
        assert_eq!(events[0].1.name, "ensure.invalid_path");
        assert_eq!(events[1].1.name, "query.invalid_request");
        assert!(events.iter().all(|(_, e)| e.severity == EventSeverity::Warn));
        Ok(())
    }

    #[tokio::test]
    async fn test_force_delete_through_service() -> Result<()> {
        let (service, sink, _temp) = create_service().await?;
        service
            .try_ensure(&NodeRequest::new("inf.monitor.kafka"))
            .await?;
        service
            .try_ensure(&NodeRequest::new("inf.alert.pager"))
            .await?;

        assert_eq!(service.delete(&NodeRequest::delete("inf", false)).await, 0);
        assert_eq!(service.delete(&NodeRequest::delete("inf", true)).await, 5);
        assert!(service.query(&NodeRequest::query("inf", 2)).await.is_empty());

        let events = sink.events.lock().unwrap();
        assert!(events
            .iter()
            .any(|(op, e)| op == "delete" && e.name == "delete.group.rejected"));
        Ok(())
    }
}
