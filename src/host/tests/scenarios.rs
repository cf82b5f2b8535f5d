use super::*;
use crate::auth::{AUTHENTICATION_REQUIRED, INVALID_CREDENTIALS, LOGGED_OUT};
use crate::config::ReservedPaths;
use crate::router::AUTHENTICATED_HEADER;
use crate::session_storage::shared::testing::FakeHashClient;

#[tokio::test]
async fn test_stats_without_credentials_denied() {
    let app = test_app(builder(authenticated_config(), &Recorder::default()).build().await.unwrap());

    let (status, headers, body) = make_request(&app, "/swagger-stats/stats", vec![]).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, AUTHENTICATION_REQUIRED);
    assert!(set_session_cookie(&headers).is_none());

    let (status, _, body) = make_request(&app, "/swagger-stats/metrics", vec![]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, AUTHENTICATION_REQUIRED);
}

#[tokio::test]
async fn test_wrong_credentials_denied() {
    let app = test_app(builder(authenticated_config(), &Recorder::default()).build().await.unwrap());

    let (status, _, body) =
        make_request(&app, "/swagger-stats/stats", vec![basic("admin:nope")]).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, INVALID_CREDENTIALS);
}

#[tokio::test]
async fn test_login_then_session_then_logout() {
    let app = test_app(builder(authenticated_config(), &Recorder::default()).build().await.unwrap());

    // credentials open a session
    let (status, headers, body) =
        make_request(&app, "/swagger-stats/stats", vec![basic("admin:admin")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(headers.get(AUTHENTICATED_HEADER).unwrap(), "true");
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["requests"], 3);

    let cookie = set_session_cookie(&headers).expect("session cookie");
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.path(), Some("/swagger-stats"));
    assert_eq!(cookie.max_age(), Some(time::Duration::seconds(900)));
    assert_eq!(cookie.http_only(), Some(true));
    let sid = cookie.value().to_string();

    // the session alone admits to metrics and is renewed
    let (status, headers, body) =
        make_request(&app, "/swagger-stats/metrics", vec![with_session(&sid)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, METRICS_TEXT);
    assert_eq!(headers.get(AUTHENTICATED_HEADER).unwrap(), "true");
    assert_eq!(set_session_cookie(&headers).unwrap().value(), sid);

    // logout clears it
    let (status, headers, body) =
        make_request(&app, "/swagger-stats/logout", vec![with_session(&sid)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, LOGGED_OUT);
    assert_eq!(set_session_cookie(&headers).unwrap().value(), "");

    let (status, _, body) =
        make_request(&app, "/swagger-stats/stats", vec![with_session(&sid)]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, AUTHENTICATION_REQUIRED);
}

#[tokio::test]
async fn test_metrics_with_credentials_opens_no_session() {
    let app = test_app(builder(authenticated_config(), &Recorder::default()).build().await.unwrap());

    let (status, headers, body) =
        make_request(&app, "/swagger-stats/metrics", vec![basic("admin:admin")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, METRICS_TEXT);
    assert_eq!(headers.get(AUTHENTICATED_HEADER).unwrap(), "true");
    assert!(set_session_cookie(&headers).is_none());
}

#[tokio::test]
async fn test_logout_without_session_still_succeeds() {
    let app = test_app(builder(authenticated_config(), &Recorder::default()).build().await.unwrap());

    let (status, headers, body) = make_request(&app, "/swagger-stats/logout", vec![]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, LOGGED_OUT);
    assert!(set_session_cookie(&headers).is_none());
}

#[tokio::test]
async fn test_authentication_disabled_serves_without_cookie() {
    let app = test_app(builder(Config::default(), &Recorder::default()).build().await.unwrap());

    let (status, headers, _) = make_request(&app, "/swagger-stats/stats", vec![]).await;

    assert_eq!(status, StatusCode::OK);
    assert!(set_session_cookie(&headers).is_none());
    assert!(headers.get(AUTHENTICATED_HEADER).is_none());
}

#[tokio::test]
async fn test_stats_query_reaches_provider() {
    let app = test_app(builder(Config::default(), &Recorder::default()).build().await.unwrap());

    let (status, _, body) = make_request(
        &app,
        "/swagger-stats/stats?fields=apidefs&fields=errors",
        vec![],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["fields"], serde_json::json!(["apidefs", "errors"]));
}

#[tokio::test]
async fn test_failing_collaborators_answer_empty() {
    struct BrokenStats;
    impl StatsProvider for BrokenStats {
        fn get_stats(&self, _: &QueryParams) -> Result<serde_json::Value, CollaboratorError> {
            Err(CollaboratorError::failed("stats", "core not started"))
        }
    }

    struct PanickingMetrics;
    #[async_trait::async_trait]
    impl MetricsExporter for PanickingMetrics {
        async fn export(&self) -> Result<String, CollaboratorError> {
            panic!("registry poisoned")
        }
    }

    let dispatcher = RequestDispatcher::builder(Config::default())
        .with_stats(BrokenStats)
        .with_metrics(PanickingMetrics)
        .build()
        .await
        .unwrap();
    let app = test_app(dispatcher);

    let (status, _, body) = make_request(&app, "/swagger-stats/stats", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "{}");

    let (status, _, body) = make_request(&app, "/swagger-stats/metrics", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");
}

#[tokio::test]
async fn test_ui_served_as_html() {
    let dispatcher = builder(authenticated_config(), &Recorder::default())
        .with_ui_markup("<html>stats ui</html>")
        .build()
        .await
        .unwrap();
    let app = test_app(dispatcher);

    let (status, headers, body) = make_request(&app, "/swagger-stats/ux", vec![]).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(body, "<html>stats ui</html>");
}

#[tokio::test]
async fn test_dist_assets_and_traversal() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("js")).unwrap();
    std::fs::write(root.path().join("js/sws.min.js"), "console.log('sws')").unwrap();
    std::fs::write(root.path().join(".env"), "SECRET=1").unwrap();

    let config = Config {
        asset_root: root.path().to_path_buf(),
        ..authenticated_config()
    };
    let app = test_app(builder(config, &Recorder::default()).build().await.unwrap());

    let (status, _, body) = make_request(&app, "/swagger-stats/dist/js/sws.min.js", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "console.log('sws')");

    let (status, _, _) = make_request(&app, "/swagger-stats/dist/js/missing.js", vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = make_request(&app, "/swagger-stats/dist/../../etc/passwd", vec![]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = make_request(&app, "/swagger-stats/dist/.env", vec![]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dist_decodes_request_path_once() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("js")).unwrap();
    std::fs::write(root.path().join(".env"), "SECRET=1").unwrap();
    std::fs::write(root.path().join("foo"), "outside dist").unwrap();
    std::fs::write(root.path().join("100%.txt"), "full").unwrap();

    let config = Config {
        asset_root: root.path().to_path_buf(),
        ..Config::default()
    };
    let app = test_app(builder(config, &Recorder::default()).build().await.unwrap());

    // a double-encoded dot stays a literal `%2eenv` file name
    let (status, _, body) = make_request(&app, "/swagger-stats/dist/%252eenv", vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_ne!(body, "SECRET=1");

    let (status, _, _) = make_request(&app, "/swagger-stats/dist/%2eenv", vec![]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = make_request(&app, "/swagger-stats/dist/100%25.txt", vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "full");

    // directories are not listed or redirected
    let (status, headers, _) = make_request(&app, "/swagger-stats/dist/js", vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers.get(http::header::LOCATION).is_none());

    // the prefix only matches as a whole path segment
    let (status, _, body) = make_request(&app, "/swagger-stats/distfoo", vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_ne!(body, "outside dist");
}

#[tokio::test]
async fn test_prom_path_needs_no_credentials() {
    let config = Config {
        paths: ReservedPaths {
            prom: Some("/metrics".to_string()),
            ..ReservedPaths::default()
        },
        ..authenticated_config()
    };
    let app = test_app(builder(config, &Recorder::default()).build().await.unwrap());

    let (status, headers, body) = make_request(&app, "/metrics", vec![]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, METRICS_TEXT);
    assert!(headers.get(AUTHENTICATED_HEADER).is_none());
}

#[tokio::test]
async fn test_prom_path_uses_aggregator_when_enabled() {
    struct Cluster;
    #[async_trait::async_trait]
    impl crate::collaborators::MetricsAggregator for Cluster {
        async fn aggregate(&self, local: &dyn MetricsExporter) -> Result<String, CollaboratorError> {
            Ok(format!("# cluster\n{}", local.export().await?))
        }
    }

    let config = Config {
        paths: ReservedPaths {
            prom: Some("/metrics".to_string()),
            ..ReservedPaths::default()
        },
        aggregate_metrics: true,
        ..Config::default()
    };
    let dispatcher = builder(config, &Recorder::default())
        .with_aggregator(Cluster)
        .build()
        .await
        .unwrap();
    let app = test_app(dispatcher.clone());

    let (status, _, body) = make_request(&app, "/metrics", vec![]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("# cluster\n{}", METRICS_TEXT));
    assert_eq!(dispatcher.prom_metrics().await.unwrap(), body);
}

#[tokio::test]
async fn test_shared_backend_sessions_and_outage() {
    let client = Arc::new(FakeHashClient::default());
    let dispatcher = builder(authenticated_config(), &Recorder::default())
        .with_shared_store(client.clone())
        .build()
        .await
        .unwrap();
    let app = test_app(dispatcher);

    let (_, headers, _) =
        make_request(&app, "/swagger-stats/stats", vec![basic("admin:admin")]).await;
    let sid = set_session_cookie(&headers).unwrap().value().to_string();

    let (status, _, _) =
        make_request(&app, "/swagger-stats/stats", vec![with_session(&sid)]).await;
    assert_eq!(status, StatusCode::OK);

    client.set_down(true);

    // the session can no longer be confirmed
    let (status, _, body) =
        make_request(&app, "/swagger-stats/stats", vec![with_session(&sid)]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, AUTHENTICATION_REQUIRED);

    // credentials still admit, without a session
    let (status, headers, _) = make_request(
        &app,
        "/swagger-stats/stats",
        vec![with_session(&sid), basic("admin:admin")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(set_session_cookie(&headers).is_none());
}

#[tokio::test]
async fn test_concurrent_logins_get_distinct_sessions() {
    let app = test_app(builder(authenticated_config(), &Recorder::default()).build().await.unwrap());

    let logins = (0..16).map(|_| {
        let app = app.clone();
        tokio::spawn(async move {
            let (_, headers, _) =
                make_request(&app, "/swagger-stats/stats", vec![basic("admin:admin")]).await;
            set_session_cookie(&headers).unwrap().value().to_string()
        })
    });
    let mut sids: Vec<String> = futures::future::try_join_all(logins).await.unwrap();
    sids.sort();
    sids.dedup();
    assert_eq!(sids.len(), 16);

    for sid in &sids {
        let (status, _, _) =
            make_request(&app, "/swagger-stats/metrics", vec![with_session(sid)]).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_custom_base_path() {
    let config = Config {
        authentication: true,
        ..Config::with_uri_path("/ops")
    };
    let app = test_app(builder(config, &Recorder::default()).build().await.unwrap());

    let (status, headers, _) = make_request(&app, "/ops/stats", vec![basic("admin:admin")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(set_session_cookie(&headers).unwrap().path(), Some("/ops"));

    let (status, _, body) = make_request(&app, "/swagger-stats/stats", vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "");
}

#[tokio::test]
async fn test_longest_session_lifetime_logs_in() {
    let config = Config {
        session_max_age: crate::config::MAX_SESSION_MAX_AGE,
        ..authenticated_config()
    };
    let app = test_app(builder(config, &Recorder::default()).build().await.unwrap());

    let (status, headers, _) =
        make_request(&app, "/swagger-stats/stats", vec![basic("admin:admin")]).await;
    assert_eq!(status, StatusCode::OK);
    let sid = set_session_cookie(&headers).unwrap().value().to_string();

    let (status, _, _) =
        make_request(&app, "/swagger-stats/metrics", vec![with_session(&sid)]).await;
    assert_eq!(status, StatusCode::OK);
}
