mod support;

use std::time::Duration;

use medscan_client::error::TransportError;
use medscan_client::transport::{AnalysisTransport, HttpTransport};
use medscan_client::validator::{CandidateFile, UploadPolicy, UploadRequest};
use medscan_client::{Modality, Severity, Verdict};
use serde_json::json;

use support::{png_bytes, unreachable_endpoint, StubReply, StubService};

fn request(name: &str) -> UploadRequest {
    UploadPolicy::default()
        .validate(CandidateFile::new(name, png_bytes()))
        .unwrap()
}

#[tokio::test]
async fn posts_multipart_image_and_parses_result() {
    let service = StubService::default();
    service.reply(
        "chest.png",
        StubReply::ok(json!({
            "result": "Positive",
            "confidence": 0.982,
            "affectedAreas": [
                {"region": "Lower Right Lung", "severity": "Moderate"},
                {"region": "Upper Left Lung", "severity": "Mild"}
            ]
        })),
    );
    let base = service.spawn().await;
    let transport = HttpTransport::new(&base, None).unwrap();

    let payload = transport
        .submit(Modality::Pneumonia, request("chest.png"))
        .await
        .unwrap();

    assert_eq!(payload.verdict, Verdict::Positive);
    assert_eq!(payload.confidence, 0.982);
    assert_eq!(payload.affected_areas[0].severity, Severity::Moderate);

    let received = service.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].modality, "pneumonia");
    assert_eq!(received[0].field, "image");
    assert_eq!(received[0].file_name, "chest.png");
    assert_eq!(received[0].content_type, "image/png");
    assert_eq!(received[0].size_bytes, png_bytes().len());
}

#[tokio::test]
async fn brain_tumor_uses_its_own_path() {
    let service = StubService::default();
    service.reply(
        "brain.png",
        StubReply::ok(json!({
            "result": "Positive",
            "confidence": 0.93,
            "regions": [{"x": 30, "y": 40, "width": 20, "height": 15}]
        })),
    );
    let base = service.spawn().await;
    let transport = HttpTransport::new(&base, None).unwrap();

    let payload = transport
        .submit(Modality::BrainTumor, request("brain.png"))
        .await
        .unwrap();

    assert_eq!(payload.regions.len(), 1);
    assert!(payload.affected_areas.is_empty());
    assert_eq!(service.received()[0].modality, "brain-tumor");
}

#[tokio::test]
async fn non_success_status_is_server_error_with_detail() {
    let service = StubService::default();
    service.reply(
        "chest.png",
        StubReply::status(500, json!({"error": "Error in pneumonia prediction"})),
    );
    let base = service.spawn().await;
    let transport = HttpTransport::new(&base, None).unwrap();

    let err = transport
        .submit(Modality::Pneumonia, request("chest.png"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::ServerError {
            status: 500,
            status_text: "Internal Server Error".into(),
            detail: Some("Error in pneumonia prediction".into()),
        }
    );
    assert!(err.to_string().starts_with("Server error: 500 - Internal Server Error"));
}

#[tokio::test]
async fn malformed_success_body_is_invalid_payload() {
    let service = StubService::default();
    service.reply("chest.png", StubReply::ok(json!({"prediction": "NORMAL"})));
    let base = service.spawn().await;
    let transport = HttpTransport::new(&base, None).unwrap();

    let err = transport
        .submit(Modality::Pneumonia, request("chest.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::InvalidPayload(_)));
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let transport = HttpTransport::new(&unreachable_endpoint().await, None).unwrap();

    let err = transport
        .submit(Modality::Pneumonia, request("chest.png"))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::ConnectionUnreachable);
    assert!(err.to_string().contains("Cannot connect to the backend server"));
}

#[tokio::test]
async fn slow_service_times_out_when_timeout_is_set() {
    let service = StubService::default();
    service.reply(
        "chest.png",
        StubReply::ok(json!({"result": "Negative", "confidence": 0.8}))
            .delayed(Duration::from_secs(5)),
    );
    let base = service.spawn().await;
    let transport = HttpTransport::new(&base, Some(Duration::from_millis(200))).unwrap();

    let err = transport
        .submit(Modality::Pneumonia, request("chest.png"))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Timeout);
}
