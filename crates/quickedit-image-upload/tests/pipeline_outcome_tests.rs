//! Integration tests for completion interpretation and the in-flight guard.

use quickedit_image_core::{FieldId, UploadFile};
use quickedit_image_upload::{
    Completion, DEFAULT_ROUTE_PREFIX, Endpoints, FailureClass, HttpReply, PipelineOutcome,
    RequestKind, TransportError, UploadPipeline, UploadStart, classify_transport_error,
};

fn pipeline() -> UploadPipeline {
    UploadPipeline::new(
        Endpoints::new("https://example.test/", DEFAULT_ROUTE_PREFIX).expect("valid base"),
    )
}

fn field() -> FieldId {
    "node/1/field_image/en/full".parse().expect("field id should parse")
}

fn jpeg(name: &str) -> UploadFile {
    UploadFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]).expect("file should build")
}

fn started(start: UploadStart) -> quickedit_image_upload::Dispatch {
    match start {
        UploadStart::Started(dispatch) => dispatch,
        UploadStart::Ignored { .. } => panic!("upload should start"),
    }
}

#[test]
fn pipeline_outcome_tests_second_upload_is_ignored_while_first_is_in_flight() {
    let mut pipeline = pipeline();
    let first = started(pipeline.begin_upload(&field(), &jpeg("a.jpg")).expect("url"));
    assert_eq!(first.request.method(), "POST");
    assert_eq!(
        first.request.url().as_str(),
        "https://example.test/quickedit_image/node/1/field_image/en/full"
    );

    let second = pipeline.begin_upload(&field(), &jpeg("b.jpg")).expect("url");
    assert_eq!(
        second,
        UploadStart::Ignored {
            in_flight: first.ticket
        }
    );

    let outcome = pipeline.complete(Completion {
        ticket: first.ticket,
        result: Ok(HttpReply::ok(r#"{"fid":5,"html":"<div data-quickedit-field-id=\"x\"><img src=\"/f/5.jpg\"></div>"}"#)),
    });
    assert_eq!(
        outcome,
        PipelineOutcome::Uploaded {
            fid: 5,
            content: "<img src=\"/f/5.jpg\">".to_string(),
        }
    );
    assert!(!pipeline.is_uploading());
    assert!(matches!(
        pipeline.begin_upload(&field(), &jpeg("b.jpg")).expect("url"),
        UploadStart::Started(_)
    ));
}

#[test]
fn pipeline_outcome_tests_abandoned_requests_complete_as_stale() {
    let mut pipeline = pipeline();
    let upload = started(pipeline.begin_upload(&field(), &jpeg("a.jpg")).expect("url"));
    let fetch = pipeline
        .begin_metadata_fetch(&field())
        .expect("url")
        .expect("fetch should start");
    pipeline.abandon();

    for ticket in [upload.ticket, fetch.ticket] {
        let outcome = pipeline.complete(Completion {
            ticket,
            result: Ok(HttpReply::ok("{}")),
        });
        assert_eq!(outcome, PipelineOutcome::Stale);
    }
}

#[test]
fn pipeline_outcome_tests_server_errors_and_garbage_are_transport_failures() {
    let mut pipeline = pipeline();
    let upload = started(pipeline.begin_upload(&field(), &jpeg("a.jpg")).expect("url"));
    let outcome = pipeline.complete(Completion {
        ticket: upload.ticket,
        result: Ok(HttpReply {
            status: 500,
            body: r#"{"main_error":"ignored"}"#.to_string(),
        }),
    });
    assert_eq!(
        outcome,
        PipelineOutcome::Failed {
            kind: RequestKind::Upload,
            error: TransportError::Status(500),
        }
    );

    let upload = started(pipeline.begin_upload(&field(), &jpeg("a.jpg")).expect("url"));
    let outcome = pipeline.complete(Completion {
        ticket: upload.ticket,
        result: Ok(HttpReply::ok("<html>proxy error</html>")),
    });
    assert!(matches!(
        outcome,
        PipelineOutcome::Failed {
            kind: RequestKind::Upload,
            error: TransportError::Malformed(_),
        }
    ));
}

#[test]
fn pipeline_outcome_tests_rejection_keeps_main_error_and_errors() {
    let mut pipeline = pipeline();
    let upload = started(pipeline.begin_upload(&field(), &jpeg("big.jpg")).expect("url"));
    let outcome = pipeline.complete(Completion {
        ticket: upload.ticket,
        result: Ok(HttpReply::ok(
            r#"{"main_error":"File too large","errors":["Image exceeds 5MB limit"]}"#,
        )),
    });

    let PipelineOutcome::Rejected(rejection) = outcome else {
        panic!("expected rejection");
    };
    assert_eq!(rejection.main_error, "File too large");
    assert_eq!(rejection.errors, vec!["Image exceeds 5MB limit".to_string()]);
}

#[test]
fn pipeline_outcome_tests_metadata_fetch_is_not_duplicated() {
    let mut pipeline = pipeline();
    let fetch = pipeline
        .begin_metadata_fetch(&field())
        .expect("url")
        .expect("fetch should start");
    assert_eq!(fetch.request.method(), "GET");
    assert!(fetch.request.url().as_str().ends_with("/full/info"));
    assert!(pipeline.begin_metadata_fetch(&field()).expect("url").is_none());

    let outcome = pipeline.complete(Completion {
        ticket: fetch.ticket,
        result: Err(TransportError::Timeout),
    });
    assert_eq!(
        outcome,
        PipelineOutcome::Failed {
            kind: RequestKind::FetchMetadata,
            error: TransportError::Timeout,
        }
    );
    assert!(!pipeline.is_fetching_metadata());
}

#[test]
fn pipeline_outcome_tests_classifies_failures() {
    assert_eq!(
        classify_transport_error(&TransportError::Status(503)),
        FailureClass::Retriable
    );
    assert_eq!(
        classify_transport_error(&TransportError::Status(403)),
        FailureClass::Permanent
    );
    assert_eq!(
        classify_transport_error(&TransportError::Timeout),
        FailureClass::Retriable
    );
    assert_eq!(
        classify_transport_error(&TransportError::Malformed("x".to_string())),
        FailureClass::Permanent
    );
}
