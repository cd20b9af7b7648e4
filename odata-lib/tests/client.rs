//! Client integration tests against a scripted transport.
//!
//! The transport replays canned responses in order and records every request
//! it receives, so each test can check both what the client decoded and what
//! went over the wire.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;

use odata_lib::ODataClient;
use odata_lib::api::Batch;
use odata_lib::api::BatchRequest;
use odata_lib::api::BoundaryGenerator;
use odata_lib::api::query::Filterable;
use odata_lib::error::ApiError;
use odata_lib::error::Error;
use odata_lib::model::Record;
use odata_lib::transport::Method;
use odata_lib::transport::Transport;
use odata_lib::transport::TransportRequest;
use odata_lib::transport::TransportResponse;

const BASE: &str = "https://services.odata.org/V4/TripPinService";

#[derive(Clone, Default)]
struct Scripted {
    responses: Arc<Mutex<VecDeque<TransportResponse>>>,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl Scripted {
    fn reply(self, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(TransportResponse::new(status, body));
        self
    }

    fn reply_with(self, response: TransportResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn uris(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.uri).collect()
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Api(ApiError::http(599, "no scripted response left")))
    }
}

struct FixedBoundary;

impl BoundaryGenerator for FixedBoundary {
    fn generate(&self, prefix: &str) -> String {
        format!("{}_fixed", prefix)
    }
}

fn client(transport: &Scripted) -> ODataClient {
    ODataClient::builder()
        .url(BASE)
        .transport(transport.clone())
        .boundary_generator(FixedBoundary)
        .build()
        .unwrap()
}

fn people_page(names: &[&str], next: Option<&str>) -> String {
    let value: Vec<_> = names.iter().map(|n| json!({"UserName": n})).collect();
    let mut body = json!({"@odata.context": format!("{}/$metadata#People", BASE), "value": value});
    if let Some(next) = next {
        body["@odata.nextLink"] = json!(next);
    }
    body.to_string()
}

fn user_names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get_string("UserName").unwrap().unwrap().to_string())
        .collect()
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_get_sends_compiled_uri() {
    let transport = Scripted::default().reply(200, &people_page(&["scottketchum"], None));
    let client = client(&transport);

    let records = client
        .from("People")
        .select(["UserName", "FirstName"])
        .filter("FirstName", "Scott")
        .order_by("UserName")
        .top(2)
        .get()
        .await
        .unwrap();

    assert_eq!(user_names(&records), ["scottketchum"]);
    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Get);
    assert_eq!(
        request.uri,
        "People?$select=UserName,FirstName&$filter=FirstName eq 'Scott'&$orderby=UserName asc&$top=2"
    );
}

#[tokio::test]
async fn test_cursor_follows_next_links_until_exhausted() {
    let transport = Scripted::default()
        .reply(200, &people_page(&["a", "b"], Some(&format!("{}/People?$skiptoken=2", BASE))))
        .reply(200, &people_page(&[], Some(&format!("{}/People?$skiptoken=4", BASE))))
        .reply(200, &people_page(&["c"], None));
    let client = client(&transport);

    let records = client.from("People").cursor().collect_all().await.unwrap();

    assert_eq!(user_names(&records), ["a", "b", "c"]);
    assert_eq!(
        transport.uris(),
        ["People", "People?$skiptoken=2", "People?$skiptoken=4"]
    );
}

#[tokio::test]
async fn test_cursor_is_lazy() {
    let transport = Scripted::default()
        .reply(200, &people_page(&["a", "b"], Some("People?$skiptoken=2")))
        .reply(200, &people_page(&["c"], None));
    let client = client(&transport);

    let mut cursor = client.from("People").cursor();
    assert!(cursor.next().await.unwrap().is_ok());
    assert!(cursor.next().await.unwrap().is_ok());
    assert_eq!(transport.requests().len(), 1);

    assert!(cursor.next().await.unwrap().is_ok());
    assert!(cursor.next().await.is_none());
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_cursor_stream() {
    let transport = Scripted::default()
        .reply(200, &people_page(&["a"], Some("People?$skiptoken=1")))
        .reply(200, &people_page(&["b"], None));
    let client = client(&transport);

    let names: Vec<String> = client
        .from("People")
        .cursor()
        .into_stream()
        .map(|record| record.unwrap().get_string("UserName").unwrap().unwrap().to_string())
        .collect()
        .await;

    assert_eq!(names, ["a", "b"]);
}

#[tokio::test]
async fn test_pages_stop_after_error() {
    let transport = Scripted::default()
        .reply(200, &people_page(&["a"], Some("People?$skiptoken=1")))
        .reply(500, r#"{"error": {"code": "Boom", "message": "server fell over"}}"#)
        .reply(200, &people_page(&["never"], None));
    let client = client(&transport);

    let mut pages = client.from("People").pages();
    assert_eq!(pages.next().await.unwrap().unwrap().len(), 1);

    let err = pages.next().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::Http { status: 500, .. })));
    assert!(pages.next().await.is_none());
    assert!(pages.is_done());
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_page_size_and_count() {
    let transport = Scripted::default()
        .reply(200, r#"{"@odata.count": 20, "value": [{"UserName": "a"}]}"#);
    let client = client(&transport);

    let mut pages = client.from("People").include_count().page_size(1).pages();
    let page = pages.next().await.unwrap().unwrap();

    assert_eq!(page.total_count(), Some(20));
    let request = &transport.requests()[0];
    assert_eq!(request.uri, "People?$count=true");
    assert_eq!(request.header("Prefer"), Some("odata.maxpagesize=1"));
}

#[tokio::test]
async fn test_client_default_page_size_and_headers() {
    let transport = Scripted::default().reply(200, &people_page(&[], None));
    let client = ODataClient::builder()
        .url(BASE)
        .transport(transport.clone())
        .default_page_size(50)
        .header("X-Tenant", "contoso")
        .build()
        .unwrap();

    client.from("People").get().await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.header("Prefer"), Some("odata.maxpagesize=50"));
    assert_eq!(request.header("X-Tenant"), Some("contoso"));
}

#[tokio::test]
async fn test_find_by_key() {
    let transport = Scripted::default()
        .reply(200, r#"{"@odata.etag": "W/\"1\"", "UserName": "russellwhyte"}"#)
        .reply(404, r#"{"error": {"code": "NotFound", "message": "missing"}}"#);
    let client = client(&transport);

    let person = client
        .from("People")
        .top(5)
        .find("russellwhyte")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(person.etag(), Some("W/\"1\""));

    let missing = client.from("People").find("nobody").await.unwrap();
    assert!(missing.is_none());

    assert_eq!(transport.uris(), ["People('russellwhyte')", "People('nobody')"]);
}

#[tokio::test]
async fn test_count_segment() {
    let transport = Scripted::default().reply(200, "42");
    let client = client(&transport);

    let count = client
        .from("People")
        .filter_op("Age", ">", 30)
        .select(["UserName"])
        .top(3)
        .count()
        .await
        .unwrap();

    assert_eq!(count, 42);
    let request = &transport.requests()[0];
    assert_eq!(request.uri, "People/$count?$filter=Age gt 30");
    assert_eq!(request.header("Accept"), Some("text/plain"));
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_insert_posts_record() {
    let transport = Scripted::default().reply(201, r#"{"UserName": "lewisblack", "Age": 52}"#);
    let client = client(&transport);

    let record = Record::new().set("UserName", "lewisblack").set("Age", 52);
    let created = client.from("People").insert(&record).await.unwrap().unwrap();

    assert_eq!(created.get_int("Age").unwrap(), Some(52));
    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.uri, "People");
    assert_eq!(request.header("Prefer"), Some("return=representation"));
    assert_eq!(request.header("Content-Type"), Some("application/json"));
    assert_eq!(
        request.body.as_deref(),
        Some(br#"{"UserName":"lewisblack","Age":52}"#.as_slice())
    );
}

#[tokio::test]
async fn test_patch_and_delete_address_the_key() {
    let transport = Scripted::default().reply(204, "").reply(204, "");
    let client = client(&transport);

    let updated = client
        .from("People")
        .key("russellwhyte")
        .select(["UserName"])
        .patch(json!({"FirstName": "Russ"}))
        .await
        .unwrap();
    assert!(updated.is_none());

    client.from("People").key("russellwhyte").delete().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Patch);
    assert_eq!(requests[0].uri, "People('russellwhyte')");
    assert_eq!(requests[1].method, Method::Delete);
    assert_eq!(requests[1].uri, "People('russellwhyte')");
    assert!(requests[1].body.is_none());
}

// =============================================================================
// Usage errors
// =============================================================================

#[tokio::test]
async fn test_usage_errors_never_reach_the_transport() {
    let transport = Scripted::default();
    let client = client(&transport);

    let err = client.query().get().await.unwrap_err();
    assert!(matches!(err, Error::MissingEntitySet));

    let err = client.from("People").delete().await.unwrap_err();
    assert!(matches!(err, Error::MissingKey { operation: "delete" }));

    let err = client.from("People").put(json!({})).await.unwrap_err();
    assert!(matches!(err, Error::MissingKey { operation: "put" }));

    let err = client
        .from("People")
        .filter_op("Age", "approx", 3)
        .filter_op("Age", "<", Option::<i32>::None)
        .get()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOperator { .. }));

    let err = client
        .from("People")
        .custom_option("$top", "1")
        .count()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCustomOption { .. }));

    let err = client
        .from("People")
        .expand_with("Trips", |e| e.filter_op("Budget", "<", Option::<i32>::None))
        .cursor()
        .collect_all()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IllegalOperatorAndValue { .. }));
    assert!(err.is_usage());

    assert!(transport.requests().is_empty());
}

// =============================================================================
// Batch
// =============================================================================

#[tokio::test]
async fn test_execute_batch() {
    let response_body = "--batchresponse_1\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        \r\n\
        HTTP/1.1 200 OK\r\n\
        Content-Type: application/json\r\n\
        \r\n\
        {\"UserName\":\"russellwhyte\"}\r\n\
        --batchresponse_1\r\n\
        Content-Type: multipart/mixed; boundary=changesetresponse_2\r\n\
        \r\n\
        --changesetresponse_2\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        Content-ID: 1\r\n\
        \r\n\
        HTTP/1.1 201 Created\r\n\
        \r\n\
        {\"UserName\":\"new\"}\r\n\
        --changesetresponse_2--\r\n\
        --batchresponse_1--\r\n";
    let transport = Scripted::default().reply_with(
        TransportResponse::new(200, response_body)
            .with_header("Content-Type", "multipart/mixed; boundary=batchresponse_1"),
    );
    let client = client(&transport);

    let batch = Batch::new()
        .get("People('russellwhyte')")
        .changeset(|cs| {
            cs.add(BatchRequest::post("People", Record::new().set("UserName", "new")));
        });
    let results = client.execute_batch(&batch).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.all_succeeded());
    let created = results.changeset(1).unwrap().as_ref().unwrap();
    assert_eq!(created[0].status, 201);

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.uri, "$batch");
    assert_eq!(
        request.header("Content-Type"),
        Some("multipart/mixed; boundary=batch_fixed")
    );
    let body = String::from_utf8(request.body.clone().unwrap()).unwrap();
    assert!(body.starts_with("--batch_fixed\r\n"));
    assert!(body.contains(&format!("POST {}/People HTTP/1.1\r\n", BASE)));
    assert!(body.ends_with("--batch_fixed--\r\n"));
}

#[tokio::test]
async fn test_batch_response_without_boundary() {
    let transport = Scripted::default().reply(200, "--x--\r\n");
    let client = client(&transport);

    let err = client
        .execute_batch(&Batch::new().get("People"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::Parse { .. })));
}
