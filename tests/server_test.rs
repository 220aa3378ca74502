//! Integration tests for the vitals-agent HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::Duration;
    use synheart_vitals_agent::server::{run, ServerConfig};
    use synheart_vitals_agent::Config;

    fn test_state_dir() -> PathBuf {
        std::env::temp_dir().join(format!("synheart-vitals-server-{}", uuid::Uuid::new_v4()))
    }

    async fn start() -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        start_in(test_state_dir()).await
    }

    async fn start_in(state_dir: PathBuf) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let config = ServerConfig::new(0, Config::default(), state_dir);
        let started = run(config).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        started
    }

    fn reading(i: i64, hr: f64) -> serde_json::Value {
        serde_json::json!({
            "timestamp": 1_700_000_000_000i64 + i * 1000,
            "heart_rate": hr,
            "skin_temp": 36.5,
            "sweat_level": 0.0
        })
    }

    fn baseline_batch() -> serde_json::Value {
        serde_json::Value::Array((0..15).map(|i| reading(i, 70.0)).collect())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start().await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_single_reading_is_provisional() {
        let (addr, shutdown_tx) = start().await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/readings", addr))
            .json(&reading(0, 70.0))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["accepted"], 1);
        assert_eq!(body["rejected"], 0);
        assert_eq!(body["results"][0]["state"], "NORMAL");
        assert_eq!(body["results"][0]["provisional"], true);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_batch_alert_shows_in_events_and_status() {
        let (addr, shutdown_tx) = start().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{}/readings", addr))
            .json(&baseline_batch())
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["accepted"], 15);

        let response = client
            .post(format!("http://{}/readings", addr))
            .json(&reading(15, 100.0))
            .send()
            .await
            .expect("Failed to send request");
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["results"][0]["state"], "ALERT");
        assert_eq!(body["results"][0]["provisional"], false);

        let events: serde_json::Value = client
            .get(format!("http://{}/events?limit=2", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        let events = events.as_array().expect("events array");
        assert_eq!(events.len(), 2);
        // Newest first: the alert was detected after the heart rate onset.
        assert_eq!(events[0]["type"], "alert");
        assert_eq!(events[1]["type"], "hr_deviation");

        let status: serde_json::Value = client
            .get(format!("http://{}/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(status["state"], "ALERT");
        assert_eq!(status["accepted"], 16);
        assert_eq!(status["baseline_status"]["phase"], "ready");
        assert_eq!(status["baseline"]["hr"], 70.0);
        assert_eq!(status["stats"]["alerts_raised"], 1);
        assert!(status["disclaimer"]
            .as_str()
            .unwrap_or("")
            .contains("not a medical diagnosis"));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_rejected_readings() {
        let (addr, shutdown_tx) = start().await;
        let client = reqwest::Client::new();
        let url = format!("http://{}/readings", addr);

        client
            .post(&url)
            .json(&reading(5, 70.0))
            .send()
            .await
            .expect("Failed to send request");

        // Same timestamp again
        let response = client
            .post(&url)
            .json(&reading(5, 70.0))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "OUT_OF_ORDER");

        // Missing channel
        let response = client
            .post(&url)
            .json(&serde_json::json!({"timestamp": 1_700_000_010_000i64, "heart_rate": 70.0}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "INVALID_READING");

        // In a batch, bad items are reported and the rest still count.
        let batch = serde_json::json!([reading(1, 70.0), reading(6, 70.0)]);
        let response = client
            .post(&url)
            .json(&batch)
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["accepted"], 1);
        assert_eq!(body["rejected"], 1);
        assert_eq!(body["results"][0]["accepted"], false);
        assert_eq!(body["results"][0]["error"]["code"], "OUT_OF_ORDER");

        let _ = shutdown_tx.send(());
    }

    fn persisted_stats(state_dir: &std::path::Path) -> serde_json::Value {
        let json = std::fs::read_to_string(state_dir.join("stats.json")).expect("stats.json");
        serde_json::from_str(&json).expect("Failed to parse stats.json")
    }

    #[tokio::test]
    async fn test_stats_persisted_after_readings() {
        let state_dir = test_state_dir();
        let (addr, shutdown_tx) = start_in(state_dir.clone()).await;
        let client = reqwest::Client::new();
        let url = format!("http://{}/readings", addr);

        let response = client
            .post(&url)
            .json(&baseline_batch())
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        assert_eq!(persisted_stats(&state_dir)["readings_processed"], 15);

        // A lone rejected reading is persisted before the 422 goes out.
        let response = client
            .post(&url)
            .json(&reading(3, 70.0))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let stats = persisted_stats(&state_dir);
        assert_eq!(stats["readings_processed"], 15);
        assert_eq!(stats["out_of_order"], 1);

        let _ = shutdown_tx.send(());
        let _ = std::fs::remove_dir_all(&state_dir);
    }

    #[tokio::test]
    async fn test_reset_clears_session() {
        let (addr, shutdown_tx) = start().await;
        let client = reqwest::Client::new();

        client
            .post(format!("http://{}/readings", addr))
            .json(&baseline_batch())
            .send()
            .await
            .expect("Failed to send request");

        let response = client
            .post(format!("http://{}/reset", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());

        let status: serde_json::Value = client
            .get(format!("http://{}/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(status["accepted"], 0);
        assert_eq!(status["baseline_status"]["phase"], "waiting");

        let events: serde_json::Value = client
            .get(format!("http://{}/events", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(events.as_array().map(Vec::len), Some(0));

        let _ = shutdown_tx.send(());
    }
}
