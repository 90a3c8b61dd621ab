//! Tests for the CSV downloader.

use super::*;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_temp(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file
}

// ==================== Parsing ====================

#[test]
fn test_parse_csv_header_semantics() {
    let text = "id,name,score\n1,Alice,10\n2,Bob\n3,Carol,30,extra\n";
    let docs = parse_csv(text, &CsvOptions::new("x")).unwrap();

    assert_eq!(docs.len(), 3);
    assert_eq!(Value::Object(docs[0].clone()), json!({"id": "1", "name": "Alice", "score": "10"}));
    assert_eq!(docs[1]["score"], Value::Null);
    assert_eq!(docs[2].len(), 3);
}

#[test]
fn test_parse_csv_quoted_fields() {
    let text = "a,b\n\"x, y\",\"multi\nline\"\n";
    let docs = parse_csv(text, &CsvOptions::new("x")).unwrap();
    assert_eq!(docs[0]["a"], json!("x, y"));
    assert_eq!(docs[0]["b"], json!("multi\nline"));
}

#[test]
fn test_parse_csv_start_end_slicing() {
    let text = "# exported report\nid,v\n1,a\n2,b\n3,c\n";
    let options = CsvOptions {
        start: Some(1),
        end: Some(-1),
        ..CsvOptions::new("x")
    };
    let docs = parse_csv(text, &options).unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn test_parse_csv_infer_types_and_delimiter() {
    let text = "n;flag;label\n42;true;x\n";
    let options = CsvOptions {
        delimiter: ';',
        infer_types: true,
        ..CsvOptions::new("x")
    };
    let docs = parse_csv(text, &options).unwrap();
    assert_eq!(Value::Object(docs[0].clone()), json!({"n": 42, "flag": true, "label": "x"}));
}

#[test]
fn test_slice_bounds() {
    assert_eq!(slice_bounds(5, None, None), (0, 5));
    assert_eq!(slice_bounds(5, Some(2), None), (2, 5));
    assert_eq!(slice_bounds(5, Some(-2), None), (3, 5));
    assert_eq!(slice_bounds(5, None, Some(100)), (0, 5));
    assert_eq!(slice_bounds(5, Some(4), Some(1)), (4, 4));
    assert_eq!(slice_bounds(5, Some(-100), None), (0, 5));
}

#[test]
fn test_decode_drops_invalid_bytes() {
    let bytes = b"ab\xffcd\xc3\xa7";
    assert_eq!(decode_utf8_lossy(bytes), "abcd\u{e7}");
}

#[test]
fn test_options_validate() {
    assert!(CsvOptions::new("").validate().is_err());
    let options = CsvOptions {
        delimiter: '\u{e7}',
        ..CsvOptions::new("a.csv")
    };
    assert!(options.validate().is_err());
    assert!(CsvOptions::new("a.csv").validate().is_ok());
}

// ==================== Downloading ====================

#[tokio::test]
async fn test_download_local_file() {
    let file = write_temp(b"id,title\n1,Doc 1\n2,Doc 2\n");
    let downloader =
        CsvDownloader::new(CsvOptions::new(file.path().to_string_lossy()), Client::new()).unwrap();

    let downloaded = downloader.download().await;

    assert_eq!(downloaded.len(), 2);
    assert_eq!(downloaded.documents[1]["title"], json!("Doc 2"));
    assert!(downloaded.statuses.is_empty());
    assert_eq!(downloader.source_type(), "csv");
}

#[tokio::test]
async fn test_download_file_uri() {
    let file = write_temp(b"k\nv\n");
    let uri = format!("file://{}", file.path().display());
    let downloader = CsvDownloader::new(CsvOptions::new(uri), Client::new()).unwrap();
    assert_eq!(downloader.download().await.len(), 1);
}

#[tokio::test]
async fn test_download_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/export.csv", server.uri());
    let downloader = CsvDownloader::new(CsvOptions::new(url), Client::new()).unwrap();
    let downloaded = downloader.download().await;

    assert_eq!(downloaded.len(), 1);
    assert_eq!(downloaded.statuses, vec![200]);
}

#[tokio::test]
async fn test_download_failure_is_empty_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/missing.csv", server.uri());
    let downloader = CsvDownloader::new(CsvOptions::new(url), Client::new()).unwrap();

    assert!(downloader.try_download().await.is_err());
    assert!(downloader.download().await.is_empty());
}
