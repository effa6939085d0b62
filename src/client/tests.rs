//! Client Module Tests
//!
//! Exercises `IndexServiceClient` against the in-process fake index server.
//!
//! ## Test Scopes
//! - **Protocol**: XML bodies and escaping.
//! - **Requests**: update, bulk, server-local file and ping calls.
//! - **Failures**: refused bodies versus unreachable servers.

#[cfg(test)]
mod tests {
    use crate::client::IndexServiceClient;
    use crate::client::protocol::*;
    use crate::config::ClientConfig;
    use crate::error::DispatchError;
    use crate::testkit::{FakeIndexServer, RequestKind, closed_port};
    use std::io::Write;
    use std::time::Duration;

    fn client_for(server: &FakeIndexServer) -> IndexServiceClient {
        IndexServiceClient::new("127.0.0.1", server.port(), &ClientConfig::default()).unwrap()
    }

    // ============================================================
    // PROTOCOL TESTS
    // ============================================================

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("id:1"), "id:1");
        assert_eq!(
            escape_xml(r#"a&b<c>"d"'e'"#),
            "a&amp;b&lt;c&gt;&quot;d&quot;&apos;e&apos;"
        );
    }

    #[test]
    fn test_delete_by_query_body() {
        assert_eq!(
            delete_by_query("title:a<b"),
            "<delete><query>title:a&lt;b</query></delete>"
        );
        assert_eq!(delete_by_query("*:*"), DELETE_ALL_COMMAND);
    }

    // ============================================================
    // REQUEST TESTS
    // ============================================================

    #[tokio::test]
    async fn test_push_bulk_then_commit() {
        let server = FakeIndexServer::start().await;
        let client = client_for(&server);

        client
            .push_bulk("id\ttitle\n1\tfirst\n2\tsecond".to_string())
            .await
            .unwrap();
        assert_eq!(server.committed_count(), 0);
        assert_eq!(server.pending_count(), 2);

        client.push_update(COMMIT_COMMAND).await.unwrap();
        assert_eq!(server.committed_count(), 2);
        assert_eq!(
            server.committed_document("2").unwrap().get("title").unwrap(),
            "second"
        );

        let bulk = server.requests_of(RequestKind::Bulk);
        assert_eq!(bulk.len(), 1);
        assert!(bulk[0].body.starts_with("id\ttitle\n"));
    }

    #[tokio::test]
    async fn test_push_update_delete() {
        let server = FakeIndexServer::start().await;
        let client = client_for(&server);

        client
            .push_bulk("id\ttitle\n1\tfirst\n2\tsecond".to_string())
            .await
            .unwrap();
        client.push_update(SOFT_COMMIT_COMMAND).await.unwrap();

        client.push_update(&delete_by_query("id:1")).await.unwrap();
        client.push_update(COMMIT_COMMAND).await.unwrap();

        assert_eq!(server.committed_ids().into_iter().collect::<Vec<_>>(), vec!["2"]);
    }

    #[tokio::test]
    async fn test_push_bulk_via_server_local_file() {
        let server = FakeIndexServer::start().await;
        let client = client_for(&server);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs with space.tsv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id\ttitle").unwrap();
        writeln!(file, "7\tseven").unwrap();

        client.push_bulk_via_server_local_file(&path).await.unwrap();
        client.push_update(COMMIT_COMMAND).await.unwrap();

        assert_eq!(server.committed_count(), 1);
        let streamed = server.requests_of(RequestKind::StreamFile);
        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0].body, path.to_string_lossy());
    }

    #[tokio::test]
    async fn test_ping() {
        let server = FakeIndexServer::start().await;
        let client = client_for(&server);

        assert_eq!(client.ping().await.unwrap(), "OK");
        assert_eq!(server.requests_of(RequestKind::Ping).len(), 1);
    }

    #[tokio::test]
    async fn test_with_read_timeout() {
        let server = FakeIndexServer::start().await;
        let client = client_for(&server)
            .with_read_timeout(Duration::from_secs(7))
            .unwrap();

        assert_eq!(client.read_timeout(), Duration::from_secs(7));
        assert_eq!(client.address(), format!("127.0.0.1:{}", server.port()));
    }

    // ============================================================
    // FAILURE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_rejected_body_is_partial_data() {
        let server = FakeIndexServer::start().await;
        let client = client_for(&server);

        let err = client
            .push_bulk("id\ttitle\n1\tfirst\n2".to_string())
            .await
            .unwrap_err();

        assert!(err.is_partial_data());
        assert!(matches!(err, DispatchError::PartialData { status: 400, .. }));
        assert_eq!(server.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_server_error_is_partial_data() {
        let server = FakeIndexServer::start().await;
        server.refuse_all(true);
        let client = client_for(&server);

        let err = client.push_update(COMMIT_COMMAND).await.unwrap_err();
        assert!(matches!(err, DispatchError::PartialData { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport() {
        let port = closed_port().await;
        let client =
            IndexServiceClient::new("127.0.0.1", port, &ClientConfig::default()).unwrap();

        let err = client.ping().await.unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_partial_data());
    }

    #[tokio::test]
    async fn test_slow_server_times_out_as_transport() {
        let gauge = std::sync::Arc::new(crate::testkit::InFlightGauge::default());
        let server = FakeIndexServer::start_with(gauge, Duration::from_millis(500)).await;
        let client = client_for(&server)
            .with_read_timeout(Duration::from_millis(50))
            .unwrap();

        let err = client.push_update(COMMIT_COMMAND).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_slow_server_within_read_timeout() {
        let gauge = std::sync::Arc::new(crate::testkit::InFlightGauge::default());
        let server = FakeIndexServer::start_with(gauge, Duration::from_millis(200)).await;
        let client = client_for(&server)
            .with_read_timeout(Duration::from_secs(5))
            .unwrap();

        client.push_update(COMMIT_COMMAND).await.unwrap();
        assert_eq!(server.requests_of(RequestKind::Update).len(), 1);
    }
}
