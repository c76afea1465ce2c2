use alma_api::{Alma, BriefQuery, DataFormat, Error, PageOptions};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> Alma {
    Alma::builder("secret-key")
        .base_url(&server.uri())
        .build()
        .unwrap()
}

fn users_page(total: i64, start: usize, count: usize) -> Value {
    let users: Vec<Value> = (start..start + count)
        .map(|i| json!({"primary_id": format!("user{i:03}")}))
        .collect();
    json!({"total_record_count": total, "user": users})
}

#[tokio::test]
async fn all_records_walks_offsets_until_the_total_is_reached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(25, 0, 10)))
        .expect(1)
        .mount(&server)
        .await;
    // Follow-up calls force the maximum page size; one is enough here.
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(25, 10, 15)))
        .expect(1)
        .mount(&server)
        .await;

    let alma = client(&server);
    let content = alma
        .users
        .read(None, &BriefQuery::new(), &PageOptions::new().all_records())
        .await
        .unwrap();

    assert_eq!(content.total_record_count(), Some(25));
    let users = content.as_json().unwrap()["user"].as_array().unwrap().len();
    assert_eq!(users, 25);
}

#[tokio::test]
async fn all_records_stops_after_one_page_when_everything_fits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(5, 0, 5)))
        .expect(1)
        .mount(&server)
        .await;

    let alma = client(&server);
    let content = alma
        .users
        .read(None, &BriefQuery::new(), &PageOptions::new().all_records())
        .await
        .unwrap();
    let users = content.as_json().unwrap()["user"].as_array().unwrap().len();
    assert_eq!(users, 5);
}

#[tokio::test]
async fn xml_pages_merge_by_appending_record_children() {
    fn loans_page(total: i64, start: usize, count: usize) -> String {
        let mut body = format!(r#"<item_loans total_record_count="{total}">"#);
        for i in start..start + count {
            body.push_str(&format!("<item_loan><loan_id>l{i}</loan_id></item_loan>"));
        }
        body.push_str("</item_loans>");
        body
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users/doe001/loans"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(loans_page(12, 0, 10), "application/xml"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users/doe001/loans"))
        .and(query_param("offset", "10"))
        .and(query_param("limit", "100"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(loans_page(12, 10, 2), "application/xml"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let alma = Alma::builder("secret-key")
        .base_url(&server.uri())
        .format(DataFormat::Xml)
        .build()
        .unwrap();
    let content = alma
        .users
        .loans
        .read("doe001", None, &PageOptions::new().all_records())
        .await
        .unwrap();

    let root = content.as_xml().unwrap();
    assert_eq!(root.children.len(), 12);
    assert_eq!(root.attr("total_record_count"), Some("12"));
    assert_eq!(root.children[11].child("loan_id").unwrap().text, "l11");
}

#[tokio::test]
async fn raw_mode_collects_one_response_per_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(25, 0, 10)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .and(query_param("offset", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(25, 10, 15)))
        .expect(1)
        .mount(&server)
        .await;

    let alma = client(&server);
    let raws = alma
        .users
        .read_raw(None, &BriefQuery::new(), &PageOptions::new().all_records())
        .await
        .unwrap();
    assert_eq!(raws.len(), 2);
    assert!(raws.iter().all(|raw| raw.status == 200));
}

#[tokio::test]
async fn raw_mode_with_an_unreadable_total_stays_single_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let alma = client(&server);
    let raws = alma
        .users
        .read_raw(None, &BriefQuery::new(), &PageOptions::new().all_records())
        .await
        .unwrap();
    assert_eq!(raws.len(), 1);
}

#[tokio::test]
async fn a_failing_page_aborts_the_whole_retrieval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(25, 0, 10)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/almaws/v1/users"))
        .and(query_param("offset", "10"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errorList": {"error": [{
                "errorCode": "GENERAL_ERROR",
                "errorMessage": "A backend process failed.",
            }]},
        })))
        .mount(&server)
        .await;

    let alma = client(&server);
    let err = alma
        .users
        .read(None, &BriefQuery::new(), &PageOptions::new().all_records())
        .await
        .unwrap_err();
    match err {
        Error::Api { status, .. } => assert_eq!(status, 500),
        other => panic!("expected an API error, got {other:?}"),
    }
}
