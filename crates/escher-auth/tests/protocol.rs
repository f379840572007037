//! End-to-end sign/validate scenarios across the public API.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use escher_auth::{
    AcceptOnly, ErrorKind, EscherConfig, EscherError, EscherRequest, EscherSigner,
    EscherValidator, HashAlgorithm, KeyEntry, SignOptions, StaticKeyDatabase, ValidateOptions,
};

const API_KEY: &str = "test-key_v1";
const API_SECRET: &str = "T3St s3cR3T!";
const CREDENTIAL_SCOPE: &str = "test/credential_scope/ems_request";

fn signing_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

fn now_plus(seconds: i64) -> ValidateOptions {
    ValidateOptions::builder()
        .now(signing_date() + TimeDelta::seconds(seconds))
        .build()
}

fn config() -> EscherConfig {
    EscherConfig::builder()
        .credential_scope(CREDENTIAL_SCOPE)
        .build()
}

fn key_db() -> StaticKeyDatabase {
    StaticKeyDatabase::from_json(
        r#"[{"keyId":"test-key_v1","secret":"T3St s3cR3T!","acceptOnly":0}]"#,
    )
    .unwrap()
}

#[test]
fn test_should_validate_presigned_url_within_expiry_only() {
    let signer = EscherSigner::new(config(), API_KEY, API_SECRET);
    let validator = EscherValidator::new(config(), key_db());
    let options = SignOptions::builder()
        .date(signing_date())
        .expires(600)
        .build();

    let url = signer
        .sign_url("GET", "http://localhost:3000/check_signature", &options)
        .unwrap();

    for seconds in [0, 1, 300, 599, 600] {
        assert_eq!(
            validator.validate_url("GET", &url, &[], &now_plus(seconds)),
            Ok(API_KEY.to_owned()),
            "now = date + {seconds}s"
        );
    }
    let err = validator
        .validate_url("GET", &url, &[], &now_plus(601))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExpiredOrFutureRequest);
}

#[test]
fn test_should_validate_scheme_less_url_with_explicit_host_header() {
    let signer = EscherSigner::new(config(), API_KEY, API_SECRET);
    let validator = EscherValidator::new(config(), key_db());
    let options = SignOptions::builder().date(signing_date()).build();
    let url = signer
        .sign_url("GET", "https://api.example.com/v1/items?page=2", &options)
        .unwrap();

    let without_scheme = url.trim_start_matches("https://");
    assert_eq!(
        validator.validate_url("GET", without_scheme, &[], &now_plus(10)),
        Ok(API_KEY.to_owned())
    );

    let path_and_query = without_scheme.trim_start_matches("api.example.com");
    let headers = vec![("Host".to_owned(), "api.example.com".to_owned())];
    assert_eq!(
        validator.validate_url("GET", path_and_query, &headers, &now_plus(10)),
        Ok(API_KEY.to_owned())
    );
}

#[test]
fn test_should_round_trip_request_with_sha512_and_custom_names() {
    let config = EscherConfig::builder()
        .hash_algo(HashAlgorithm::Sha512)
        .algo_prefix("ACME")
        .vendor_key("ACME")
        .auth_header_name("X-Acme-Auth")
        .date_header_name("Date")
        .credential_scope("eu/orders/acme_request")
        .build();
    let signer = EscherSigner::new(config.clone(), "orders-key", "orders-secret");
    let validator = EscherValidator::new(
        config,
        StaticKeyDatabase::new(vec![KeyEntry::new("orders-key", "orders-secret")
            .with_accept_only(AcceptOnly {
                hash_algo: Some(HashAlgorithm::Sha512),
                credential_scope: Some("eu/orders/acme_request".to_owned()),
            })]),
    );

    let request = EscherRequest::new("PUT", "/orders/42?expand=items&expand=customer")
        .with_header("Host", "orders.example.com")
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"state":"shipped"}"#);
    let headers = signer
        .sign_request(
            &request,
            &SignOptions::builder().date(signing_date()).build(),
        )
        .unwrap();
    let auth = &headers.last().unwrap().1;
    assert!(auth.starts_with("ACME-HMAC-SHA512 Credential=orders-key/20210101/eu/orders/acme_request, "));

    let signed = EscherRequest { headers, ..request };
    assert_eq!(
        validator.validate_request(&signed, &now_plus(5)),
        Ok("orders-key".to_owned())
    );
}

#[test]
fn test_should_validate_http_request_parts() {
    let signer = EscherSigner::new(config(), API_KEY, API_SECRET);
    let validator = EscherValidator::new(config(), key_db());
    let body = br#"{"id":42}"#;

    let request = EscherRequest::new("POST", "/check-signed-request")
        .with_header("Host", "localhost:5000")
        .with_body(body.to_vec());
    let headers = signer
        .sign_request(
            &request,
            &SignOptions::builder().date(signing_date()).build(),
        )
        .unwrap();

    let mut builder = http::Request::builder()
        .method("POST")
        .uri("/check-signed-request");
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let (parts, ()) = builder.body(()).unwrap().into_parts();

    assert_eq!(
        validator.validate_http(&parts, body, &now_plus(0)),
        Ok(API_KEY.to_owned())
    );
    assert_eq!(
        validator.validate_http(&parts, b"{}", &now_plus(0)),
        Err(EscherError::SignatureMismatch)
    );
}

#[test]
fn test_should_never_accept_unknown_keys() {
    let signer = EscherSigner::new(config(), "unregistered", API_SECRET);
    let validator = EscherValidator::new(config(), key_db());
    let request = EscherRequest::new("GET", "/").with_header("Host", "example.com");
    let headers = signer
        .sign_request(
            &request,
            &SignOptions::builder().date(signing_date()).build(),
        )
        .unwrap();

    let err = validator
        .validate_request(&EscherRequest { headers, ..request }, &now_plus(0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownKeyId);
}

#[test]
fn test_should_share_validator_across_threads() {
    let signer = EscherSigner::new(config(), API_KEY, API_SECRET);
    let validator = EscherValidator::new(config(), key_db());

    std::thread::scope(|scope| {
        for i in 0..4 {
            let signer = &signer;
            let validator = &validator;
            scope.spawn(move || {
                let request = EscherRequest::new("GET", format!("/items/{i}"))
                    .with_header("Host", "example.com");
                let headers = signer
                    .sign_request(
                        &request,
                        &SignOptions::builder().date(signing_date()).build(),
                    )
                    .unwrap();
                let signed = EscherRequest { headers, ..request };
                assert_eq!(
                    validator.validate_request(&signed, &now_plus(i)),
                    Ok(API_KEY.to_owned())
                );
            });
        }
    });
}
