use lexharvest_config::TransportSettings;
use lexharvest_http::{HttpClient, HttpError, PageSource};
use reqwest::Url;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client(attempts: u32) -> HttpClient {
    let settings = TransportSettings {
        attempts,
        retry_delay_secs: 0,
        timeout_secs: 5,
        user_agent: "lexharvest-test/1.0".into(),
        ..TransportSettings::default()
    };
    HttpClient::new(&settings)
        .expect("client builds")
        .with_retry_delay(Duration::from_millis(5))
}

fn listing_url(server: &MockServer) -> Url {
    format!("{}/search/all?act_type=22&lang=3", server.uri())
        .parse()
        .unwrap()
}

#[tokio::test]
async fn get_recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/all"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/all"))
        .and(query_param("act_type", "22"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fast_client(3)
        .get_text(&listing_url(&server))
        .await
        .expect("third attempt succeeds");
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn exhausted_budget_resolves_to_error_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let err = fast_client(3)
        .get_page(&listing_url(&server))
        .await
        .expect_err("all attempts fail");
    match err {
        HttpError::Status {
            status, attempts, ..
        } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn network_failure_is_reported_not_raised() {
    // Nothing listens on port 9 of the loopback interface.
    let url: Url = "http://127.0.0.1:9/search/all".parse().unwrap();
    let err = fast_client(2).get_text(&url).await.expect_err("refused");
    assert!(matches!(err, HttpError::Network { attempts: 2, .. }));
}

#[tokio::test]
async fn sends_configured_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "lexharvest-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fast_client(1).get_text(&listing_url(&server)).await.unwrap();
    assert_eq!(body, "hi");
}

#[tokio::test]
async fn postback_is_form_encoded_to_the_same_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search/all"))
        .and(query_param("lang", "3"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "__EVENTTARGET=ctl00%24cphMain%24ucPager%24lbNext",
        ))
        .and(body_string_contains("__EVENTARGUMENT=&"))
        .and(body_string_contains("__VIEWSTATE=abc%2B%2F%3D"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page 2"))
        .expect(1)
        .mount(&server)
        .await;

    let form = vec![
        (
            "__EVENTTARGET".to_string(),
            "ctl00$cphMain$ucPager$lbNext".to_string(),
        ),
        ("__EVENTARGUMENT".to_string(), String::new()),
        ("__VIEWSTATE".to_string(), "abc+/=".to_string()),
    ];
    let body = fast_client(1)
        .post_page(&listing_url(&server), &form)
        .await
        .unwrap();
    assert_eq!(body, "page 2");
}

#[tokio::test]
async fn session_cookie_is_carried_into_postback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "ASP.NET_SessionId=s3ss10n; path=/")
                .set_body_string("page 1"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("cookie", "ASP.NET_SessionId=s3ss10n"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page 2"))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(1);
    let url = listing_url(&server);
    assert_eq!(client.get_page(&url).await.unwrap(), "page 1");
    assert_eq!(client.post_page(&url, &[]).await.unwrap(), "page 2");
}
