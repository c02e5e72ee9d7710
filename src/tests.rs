#[cfg(test)]
mod tests {
    use crate::{
        AwsCredentials, ClassificationData, ClientConfig, DeviceFilter, Error, FetchParams,
        ImageEncoding, Location, NewClassification, NewDetection, NewEnvironmentReading, NewVideo,
        SensingGardenClient, ValidationKind, VideoUploadConfig,
    };
    use mockito::{Matcher, Server};
    use serde_json::{json, Value};
    use tracing_test::traced_test;

    const TIMESTAMP: &str = "2024-08-21T12:00:00Z";

    /// Builds a client against a mock server
    fn client(url: String) -> SensingGardenClient {
        SensingGardenClient::new(ClientConfig::new(url, "test_key")).unwrap()
    }

    fn full_environment() -> Value {
        json!({
            "pm1p0": 8.2, "pm2p5": 15.7, "pm4p0": 22.1, "pm10p0": 28.5,
            "ambient_temperature": 24.5, "ambient_humidity": 68.2,
            "voc_index": 120, "nox_index": 85
        })
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = SensingGardenClient::new(ClientConfig::new("", "test_key"));
        assert!(matches!(result, Err(Error::Configuration(_))));

        let result = SensingGardenClient::new(ClientConfig::new("https://api.example.com", ""));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    #[traced_test]
    fn test_detection_example_end_to_end() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/detections")
            .match_header("x-api-key", "test_key")
            .match_body(Matcher::Json(json!({
                "device_id": "test-device",
                "model_id": "test-model",
                "timestamp": TIMESTAMP,
                "bounding_box": [0.1, 0.2, 0.8, 0.9],
                "image": "ZmFrZV9pbWFnZV9kYXRhXzEyMzQ1"
            })))
            .with_status(200)
            .with_body(r#"{"message": "Detection added", "data": {"id": "det-1"}}"#)
            .expect(1)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let client = client(server.url());
            let response = client
                .detections()
                .add(
                    NewDetection::new(
                        "test-device",
                        "test-model",
                        b"fake_image_data_12345".to_vec(),
                        TIMESTAMP,
                    )
                    .bounding_box(vec![0.1, 0.2, 0.8, 0.9]),
                )
                .await
                .unwrap();
            assert_eq!(response.field("id"), Some(&json!("det-1")));

            // three coordinates never leave the client
            let err = client
                .detections()
                .add(
                    NewDetection::new("test-device", "test-model", vec![1u8], TIMESTAMP)
                        .bounding_box(vec![0.1, 0.2, 0.8]),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(ref v) if v.kind == ValidationKind::BoundingBox));
        });

        mock.assert();
    }

    #[test]
    fn test_detection_box_shapes_make_no_call() {
        let mut server = Server::new();
        let mock = server.mock("POST", "/detections").expect(0).create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let client = client(server.url());
            let rejected = [
                json!("0.1,0.2,0.8,0.9"),
                json!({"x1": 0.1, "y1": 0.2, "x2": 0.8, "y2": 0.9}),
                json!([0.1, 0.2, 0.8, 0.9, 0.5]),
                json!([]),
                json!(["0.1", "0.2", "0.8", "0.9"]),
                json!([0.1, null, 0.8, 0.9]),
            ];
            for bbox in rejected {
                let result = client
                    .detections()
                    .add(NewDetection::new("d", "m", vec![1u8], TIMESTAMP).bounding_box(bbox.clone()))
                    .await;
                assert!(
                    matches!(result, Err(Error::Validation(_))),
                    "{bbox} should be rejected"
                );
            }
        });

        mock.assert();
    }

    #[test]
    fn test_classification_forwards_loose_fields() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/classifications")
            .match_body(Matcher::PartialJson(json!({
                "bounding_box": {"format": "yolo", "coordinates": [0.5, 0.6, 0.7, 0.8]},
                "family_confidence": 0.95,
                "genus_confidence": "0.87",
                "location": {"lat": 40.7128, "long": -74.006, "alt": 10.5, "site": "roof"},
                "environment": full_environment(),
                "classification_data": {
                    "species": [
                        {"name": "Danaus plexippus", "confidence": 0.8},
                        {"name": "Danaus gilippus", "confidence": 0.15}
                    ]
                }
            })))
            .with_status(200)
            .with_body(r#"{"id": "cls-1"}"#)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let client = client(server.url());
            let data: ClassificationData = serde_json::from_value(json!({
                "species": [
                    {"name": "Danaus plexippus", "confidence": 0.8},
                    {"name": "Danaus gilippus", "confidence": 0.15}
                ]
            }))
            .unwrap();
            let mut location = Location::new(40.7128, -74.006).with_alt(10.5);
            location.extra.insert("site".to_string(), json!("roof"));

            let response = client
                .classifications()
                .add(
                    NewClassification::new(
                        "test-device",
                        "test-model",
                        b"img".to_vec(),
                        "Nymphalidae",
                        "Danaus",
                        "Danaus plexippus",
                        0.95,
                        "0.87",
                        0.82,
                        TIMESTAMP,
                    )
                    .bounding_box(json!({"format": "yolo", "coordinates": [0.5, 0.6, 0.7, 0.8]}))
                    .location(location)
                    .environment(full_environment())
                    .classification_data(data),
                )
                .await
                .unwrap();
            assert!(!response.is_wrapped());
            assert_eq!(response.field("id"), Some(&json!("cls-1")));
        });

        mock.assert();
    }

    #[test]
    fn test_environment_missing_keys_are_named() {
        let mut server = Server::new();
        let mock = server.mock("POST", "/environment").expect(0).create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut reading = full_environment();
            reading.as_object_mut().unwrap().remove("voc_index");
            reading.as_object_mut().unwrap().remove("pm2p5");

            let err = client(server.url())
                .environment()
                .add(NewEnvironmentReading::new("d1", reading, TIMESTAMP))
                .await
                .unwrap_err();
            let message = err.as_validation().unwrap().message.clone();
            assert!(message.ends_with("Missing: pm2p5, voc_index"), "{message}");
        });

        mock.assert();
    }

    #[test]
    fn test_pagination_carries_token_and_order() {
        let mut server = Server::new();
        let first = server
            .mock("GET", "/detections")
            .match_query(Matcher::Regex(
                "^device_id=d1&limit=2&sort_by=timestamp&sort_desc=true$".to_string(),
            ))
            .with_status(200)
            .with_body(
                json!({
                    "items": [
                        {"timestamp": "2024-08-21T12:00:04Z"},
                        {"timestamp": "2024-08-21T12:00:03Z"}
                    ],
                    "next_token": "page-2"
                })
                .to_string(),
            )
            .create();
        let second = server
            .mock("GET", "/detections")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("sort_desc".into(), "true".into()),
                Matcher::UrlEncoded("next_token".into(), "page-2".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "items": [
                        {"timestamp": "2024-08-21T12:00:02Z"},
                        {"timestamp": "2024-08-21T12:00:01Z"}
                    ],
                    "next_token": null
                })
                .to_string(),
            )
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let client = client(server.url());
            let params = FetchParams::new()
                .device_id("d1")
                .limit(2)
                .sort_by("timestamp")
                .sort_desc(true);
            let page1 = client.detections().fetch(&params).await.unwrap();
            let token = page1.next_token.clone().unwrap();
            let page2 = client
                .detections()
                .fetch(&params.clone().next_token(token))
                .await
                .unwrap();
            assert!(page2.next_token.is_none());

            let last_of_first = page1.items.last().unwrap()["timestamp"].as_str().unwrap();
            for item in &page2.items {
                assert!(item["timestamp"].as_str().unwrap() < last_of_first);
            }
        });

        first.assert();
        second.assert();
    }

    #[test]
    fn test_sort_desc_must_be_boolean() {
        let err = FetchParams::try_from(&json!({"sort_desc": "true"})).unwrap_err();
        assert_eq!(err.kind, ValidationKind::InvalidParameter);
        let params = FetchParams::try_from(&json!({"sort_desc": true, "limit": 5})).unwrap();
        assert_eq!(params.sort_desc, Some(true));
    }

    #[test]
    fn test_server_error_keeps_body() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/devices")
            .with_status(502)
            .with_body(r#"{"error": "upstream"}"#)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let err = client(server.url()).add_device("d1").await.unwrap_err();
            match err {
                Error::Transport { status, body } => {
                    assert_eq!(status, 502);
                    assert_eq!(body, r#"{"error": "upstream"}"#);
                }
                other => panic!("Expected transport error, got {other:?}"),
            }
        });

        mock.assert();
    }

    #[test]
    fn test_get_devices_returns_items_and_token() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/devices")
            .match_query(Matcher::UrlEncoded("limit".into(), "1".into()))
            .with_status(200)
            .with_body(r#"{"items": [{"device_id": "d1"}], "next_token": "t2"}"#)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (items, next) = client(server.url())
                .get_devices(&DeviceFilter::default().limit(1))
                .await
                .unwrap();
            assert_eq!(items, vec![json!({"device_id": "d1"})]);
            assert_eq!(next.as_deref(), Some("t2"));
        });

        mock.assert();
    }

    #[test]
    fn test_multipart_image_encoding() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/detections")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::Regex(r#"name="payload""#.to_string()))
            .with_status(200)
            .with_body("{}")
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = ClientConfig::new(server.url(), "test_key")
                .with_image_encoding(ImageEncoding::Multipart);
            SensingGardenClient::new(config)
                .unwrap()
                .detections()
                .add(NewDetection::new("d1", "m1", vec![1u8, 2, 3], TIMESTAMP))
                .await
                .unwrap();
        });

        mock.assert();
    }

    #[test]
    fn test_video_timestamp_is_sent_verbatim() {
        let past = "2024-08-20T12:00:00Z";
        let mut server = Server::new();
        let upload = server
            .mock("POST", "/videos/upload")
            .match_body(Matcher::PartialJson(json!({"timestamp": past})))
            .with_status(200)
            .with_body(r#"{"video_key": "videos/d1/clip.mp4"}"#)
            .create();
        let fetch = server
            .mock("GET", "/videos")
            .match_query(Matcher::UrlEncoded("device_id".into(), "d1".into()))
            .with_status(200)
            .with_body(
                json!({"items": [{"video_key": "videos/d1/clip.mp4", "timestamp": past}]})
                    .to_string(),
            )
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = ClientConfig::new(server.url(), "test_key")
                .with_aws(AwsCredentials::new("AKIDEXAMPLE", "secret", "us-east-1"))
                .with_video(VideoUploadConfig::default());
            let client = SensingGardenClient::new(config).unwrap();

            let done = client
                .videos()
                .upload_video(NewVideo::new("d1", past, vec![0u8; 1024]).content_type("video/mp4"))
                .await
                .unwrap();
            let page = client
                .videos()
                .fetch(&FetchParams::new().device_id("d1"))
                .await
                .unwrap();
            let stored = page
                .items
                .iter()
                .find(|v| v["video_key"] == json!(done.video_key))
                .unwrap();
            assert_eq!(stored["timestamp"], json!(done.timestamp));
            assert_eq!(done.timestamp, past);
        });

        upload.assert();
        fetch.assert();
    }
}
