//! End-to-end tests of the gateway over real sockets.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use service_gateway::http::Response;
use service_gateway::routing::Service;
use service_gateway::services::HealthService;

mod common;
use common::{start_gateway, test_config, RawConnection, RecordingService};

#[test]
fn unclaimed_path_is_bad_request_with_security_headers() {
    let gateway = start_gateway(
        test_config(38_101),
        vec![("echo", RecordingService::echo("echo") as Arc<dyn Service>)],
    );
    let addr = gateway.http_addr().unwrap();

    let mut conn = RawConnection::connect(addr);
    let response = conn.round_trip(b"GET /nobody/home HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(response.status, 400);
    assert_eq!(response.header("content-length"), Some("0"));
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(response.header("content-disposition"), Some("attachment"));
    assert_eq!(response.header("connection"), Some("keep-alive"));

    gateway.shutdown();
}

#[test]
fn first_registered_claim_wins() {
    let first = RecordingService::new("api", |_| {
        Ok(Response::new(StatusCode::OK).with_body("first"))
    });
    let second = RecordingService::new("api/v2", |_| {
        Ok(Response::new(StatusCode::OK).with_body("second"))
    });
    let gateway = start_gateway(
        test_config(38_102),
        vec![
            ("first", first.clone() as Arc<dyn Service>),
            ("second", second.clone() as Arc<dyn Service>),
        ],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let response = conn.round_trip(b"GET /api/v2/items HTTP/1.1\r\n\r\n");
    assert_eq!(response.body, b"first");
    assert_eq!(first.seen().len(), 1);
    assert!(second.seen().is_empty());

    gateway.shutdown();
}

#[test]
fn service_error_is_bad_request_and_connection_survives() {
    let flaky = RecordingService::new("flaky", |request| {
        if request.path().ends_with("fail") {
            Err("backend exploded".into())
        } else {
            Ok(Response::new(StatusCode::OK).with_body("fine"))
        }
    });
    let gateway = start_gateway(
        test_config(38_103),
        vec![("flaky", flaky as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let failed = conn.round_trip(b"GET /flaky/fail HTTP/1.1\r\n\r\n");
    assert_eq!(failed.status, 400);
    assert_eq!(failed.header("x-content-type-options"), Some("nosniff"));

    let ok = conn.round_trip(b"GET /flaky/ok HTTP/1.1\r\n\r\n");
    assert_eq!(ok.status, 200);
    assert_eq!(ok.body, b"fine");

    gateway.shutdown();
}

#[test]
fn keep_alive_reuses_one_connection() {
    let echo = RecordingService::echo("echo");
    let gateway = start_gateway(
        test_config(38_104),
        vec![("echo", echo.clone() as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    for body in ["one", "two", "three"] {
        let request = format!(
            "POST /echo HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let response = conn.round_trip(request.as_bytes());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, body.as_bytes());
        assert_eq!(response.header("connection"), Some("keep-alive"));
    }
    assert_eq!(echo.seen().len(), 3);

    gateway.shutdown();
}

#[test]
fn connection_close_is_honored() {
    let gateway = start_gateway(
        test_config(38_105),
        vec![("echo", RecordingService::echo("echo") as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let response = conn.round_trip(b"GET /echo HTTP/1.1\r\nConnection: close\r\n\r\n");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("connection"), Some("close"));
    assert!(conn.is_closed_by_server());

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let response = conn.round_trip(b"GET /echo HTTP/1.0\r\n\r\n");
    assert_eq!(response.header("connection"), Some("close"));
    assert!(conn.is_closed_by_server());

    gateway.shutdown();
}

#[test]
fn chunked_request_is_aggregated() {
    let echo = RecordingService::echo("echo");
    let gateway = start_gateway(
        test_config(38_106),
        vec![("echo", echo.clone() as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let response = conn.round_trip(
        b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    );
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"hello world");
    assert_eq!(echo.seen()[0].body, b"hello world");

    gateway.shutdown();
}

#[test]
fn body_size_limit_boundary() {
    let mut config = test_config(38_107);
    config.limits.max_request_size = 16;
    config.limits.max_chunk_size = 16;
    let echo = RecordingService::echo("echo");
    let gateway = start_gateway(config, vec![("echo", echo.clone() as Arc<dyn Service>)]);
    let addr = gateway.http_addr().unwrap();

    let mut conn = RawConnection::connect(addr);
    let at_limit = conn.round_trip(b"POST /echo HTTP/1.1\r\nContent-Length: 16\r\n\r\n0123456789abcdef");
    assert_eq!(at_limit.status, 200);
    assert_eq!(at_limit.body.len(), 16);

    let mut conn = RawConnection::connect(addr);
    let over = conn.round_trip(b"POST /echo HTTP/1.1\r\nContent-Length: 17\r\n\r\n0123456789abcdefg");
    assert_eq!(over.status, 413);
    assert_eq!(over.header("connection"), Some("close"));
    assert!(conn.is_closed_by_server());
    assert_eq!(echo.seen().len(), 1);

    gateway.shutdown();
}

#[test]
fn request_limit_configurable_without_chunk_limit() {
    let mut config = test_config(38_113);
    config.limits.max_request_size = 1024;
    let gateway = start_gateway(
        config,
        vec![("echo", RecordingService::echo("echo") as Arc<dyn Service>)],
    );
    let addr = gateway.http_addr().unwrap();

    let body = "x".repeat(1024);
    let mut conn = RawConnection::connect(addr);
    let request = format!("POST /echo HTTP/1.1\r\nContent-Length: 1024\r\n\r\n{body}");
    let at_limit = conn.round_trip(request.as_bytes());
    assert_eq!(at_limit.status, 200);
    assert_eq!(at_limit.body.len(), 1024);

    let mut conn = RawConnection::connect(addr);
    let over = conn.round_trip(b"POST /echo HTTP/1.1\r\nContent-Length: 1025\r\n\r\n");
    assert_eq!(over.status, 413);

    gateway.shutdown();
}

#[test]
fn malformed_request_is_rejected_and_closed() {
    let gateway = start_gateway(
        test_config(38_108),
        vec![("echo", RecordingService::echo("echo") as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let response = conn.round_trip(b"GARBAGE\r\n\r\n");
    assert_eq!(response.status, 400);
    assert_eq!(response.header("connection"), Some("close"));
    assert!(conn.is_closed_by_server());

    gateway.shutdown();
}

#[test]
fn oversized_request_line_is_rejected() {
    let mut config = test_config(38_109);
    config.limits.max_initial_line_length = 64;
    let gateway = start_gateway(
        config,
        vec![("echo", RecordingService::echo("echo") as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let request = format!("GET /echo/{} HTTP/1.1\r\n\r\n", "a".repeat(200));
    let response = conn.round_trip(request.as_bytes());
    assert_eq!(response.status, 400);
    assert!(conn.is_closed_by_server());

    gateway.shutdown();
}

#[test]
fn health_service_answers() {
    let gateway = start_gateway(
        test_config(38_110),
        vec![("health", Arc::new(HealthService::new()) as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let response = conn.round_trip(b"GET /health HTTP/1.1\r\n\r\n");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["status"], "ok");

    gateway.shutdown();
}

#[test]
fn head_then_get_on_one_connection() {
    let gateway = start_gateway(
        test_config(38_114),
        vec![("health", Arc::new(HealthService::new()) as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    conn.send(b"HEAD /health HTTP/1.1\r\n\r\nGET /health HTTP/1.1\r\n\r\n");

    let head = conn.read_head();
    assert_eq!(head.status, 200);
    let advertised: usize = head.header("content-length").unwrap().parse().unwrap();
    assert!(advertised > 0);

    // The GET answer follows the HEAD headers directly.
    let get = conn.read_response();
    assert_eq!(get.status, 200);
    assert_eq!(get.body.len(), advertised);
    let body: serde_json::Value = serde_json::from_slice(&get.body).unwrap();
    assert_eq!(body["status"], "ok");

    gateway.shutdown();
}

#[test]
fn percent_encoded_path_is_decoded_for_routing() {
    let gateway = start_gateway(
        test_config(38_115),
        vec![("health", Arc::new(HealthService::new()) as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let decoded = conn.round_trip(b"GET /he%61lth HTTP/1.1\r\n\r\n");
    assert_eq!(decoded.status, 200);
    assert_eq!(decoded.header("content-type"), Some("application/json"));

    let malformed = conn.round_trip(b"GET /he%zzlth HTTP/1.1\r\n\r\n");
    assert_eq!(malformed.status, 400);
    assert!(malformed.body.is_empty());

    gateway.shutdown();
}

#[test]
fn expect_continue_gets_interim_response() {
    let echo = RecordingService::echo("echo");
    let gateway = start_gateway(
        test_config(38_116),
        vec![("echo", echo.clone() as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    conn.send(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\nExpect: 100-continue\r\n\r\n");
    assert_eq!(conn.read_head().status, 100);

    let response = conn.round_trip(b"hello");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"hello");
    assert_eq!(echo.seen().len(), 1);

    gateway.shutdown();
}

#[test]
fn idle_connections_time_out() {
    let mut config = test_config(38_111);
    config.timeouts.idle_read_secs = 1;
    let gateway = start_gateway(
        config,
        vec![("echo", RecordingService::echo("echo") as Arc<dyn Service>)],
    );

    let mut conn = RawConnection::connect(gateway.http_addr().unwrap());
    let response = conn.round_trip(b"GET /echo HTTP/1.1\r\n\r\n");
    assert_eq!(response.status, 200);
    // Nothing more is sent; the gateway drops the connection after ~1s.
    assert!(conn.is_closed_by_server());

    gateway.shutdown();
}

#[test]
fn shutdown_closes_idle_keep_alive_connections() {
    let gateway = start_gateway(
        test_config(38_112),
        vec![("echo", RecordingService::echo("echo") as Arc<dyn Service>)],
    );
    let addr = gateway.http_addr().unwrap();

    let mut conn = RawConnection::connect(addr);
    conn.round_trip(b"GET /echo HTTP/1.1\r\n\r\n");
    assert_eq!(gateway.active_connections(), 1);

    let handle = gateway.shutdown_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        handle.trigger();
    });
    gateway.wait_for_shutdown();
    stopper.join().unwrap();
    gateway.shutdown();

    assert!(conn.is_closed_by_server());
    assert!(std::net::TcpStream::connect(addr).is_err());
}
