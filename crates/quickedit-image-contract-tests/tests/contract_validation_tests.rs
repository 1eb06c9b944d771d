//! Validates contract fixtures against frozen JSON schemas and the parser.

use jsonschema::JSONSchema;
use quickedit_image_contract::{UploadResponse, parse_field_metadata, parse_upload_response};
use serde_json::Value;

fn contract_path(relative: &str) -> String {
    format!("{}/../../contracts/{relative}", env!("CARGO_MANIFEST_DIR"))
}

fn read(relative: &str) -> String {
    std::fs::read_to_string(contract_path(relative)).expect("contract file should be readable")
}

fn load_json(relative: &str) -> Value {
    serde_json::from_str(&read(relative)).expect("contract file should be valid json")
}

fn compile_validator(relative: &str) -> JSONSchema {
    let schema = load_json(relative);
    JSONSchema::compile(&schema).expect("schema should compile")
}

#[test]
fn contract_validation_tests_upload_fixtures_match_schema() {
    let validator = compile_validator("upload-response.schema.json");

    for fixture in [
        "fixtures/upload-response.accepted.json",
        "fixtures/upload-response.rejected.json",
    ] {
        assert!(
            validator.is_valid(&load_json(fixture)),
            "{fixture} should validate against schema"
        );
    }
    assert!(
        !validator.is_valid(&load_json("fixtures/upload-response.invalid.json")),
        "a body carrying both fid and main_error must not validate"
    );
}

#[test]
fn contract_validation_tests_field_info_fixture_matches_schema() {
    let validator = compile_validator("field-info-response.schema.json");
    assert!(
        validator.is_valid(&load_json("fixtures/field-info-response.valid.json")),
        "field info fixture should validate against schema"
    );
}

#[test]
fn contract_validation_tests_parser_agrees_with_fixtures() {
    let accepted = parse_upload_response(&read("fixtures/upload-response.accepted.json"))
        .expect("accepted fixture should parse");
    let UploadResponse::Accepted(success) = accepted else {
        panic!("accepted fixture should parse as success");
    };
    assert_eq!(success.fid, 42);

    let rejected = parse_upload_response(&read("fixtures/upload-response.rejected.json"))
        .expect("rejected fixture should parse");
    let UploadResponse::Rejected(rejection) = rejected else {
        panic!("rejected fixture should parse as rejection");
    };
    assert_eq!(rejection.main_error, "File too large");
    assert_eq!(rejection.errors.len(), 2);

    let metadata = parse_field_metadata(&read("fixtures/field-info-response.valid.json"))
        .expect("field info fixture should parse");
    assert!(metadata.alt_field && metadata.alt_field_required);
    assert!(metadata.title_field && !metadata.title_field_required);
    assert_eq!(metadata.title, "Sunset over the bay");
}
