//! End-to-end requests against the live mirror server.
//!
//! # Design
//! Starts the mirror server on a random port in a background thread with its
//! own tokio runtime, then sends real requests with `Request::send` and
//! checks the server's JSON description of what it received. This validates
//! request serialization against a production HTTP stack (hyper via axum),
//! and response parsing against what it sends back.

use std::fs;
use std::path::PathBuf;

use mirror_server::Echo;
use uuid::Uuid;
use wirehttp::mime::StaticRegistry;
use wirehttp::{Attachment, MimeTable, Params, Request};

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mirror_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn send(request: &mut Request) -> Echo {
    let response = request.send().expect("transport error");
    assert_eq!(response.status_code(), 200, "{}", response.text());
    assert_eq!(response.header("connection"), Some("close"));
    serde_json::from_slice(response.body()).expect("mirror reply is JSON")
}

fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wirehttp-it-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn request_lifecycle() {
    // Step 1: start mirror server on a random port.
    let base = start_server();

    // Step 2: plain GET; query params travel in the body.
    let mut req = Request::new(&format!("{base}/search?term=rust&page=2")).unwrap();
    let echo = send(&mut req);
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/search");
    assert_eq!(echo.query, None);
    assert_eq!(echo.body, "term=rust&page=2");
    assert_eq!(echo.header("accept"), Some("*/*"));
    assert_eq!(echo.header("user-agent"), Some(wirehttp::USER_AGENT));
    assert_eq!(echo.header("host"), Some("127.0.0.1"));

    // Step 3: urlencoded POST with nested params.
    let mut req = Request::new(&format!("{base}/form")).unwrap();
    req.set_method("POST").unwrap();
    req.set_params(
        Params::new()
            .with("name", "Ann Lee")
            .with("user", Params::new().with("id", 7).with("role", "admin & owner")),
    );
    let echo = send(&mut req);
    assert_eq!(echo.method, "POST");
    assert_eq!(
        echo.form,
        vec![
            ("name".to_string(), "Ann Lee".to_string()),
            ("user[id]".to_string(), "7".to_string()),
            ("user[role]".to_string(), "admin & owner".to_string()),
        ]
    );

    // Step 4: multipart upload forces POST.
    let table = MimeTable::new(StaticRegistry::new("text/csv\tcsv\n"));
    let csv = temp_file("report.csv", b"a,b\r\n1,2\r\n");
    let binary = temp_file("blob.bin", &[0x00, 0xff, 0x0d, 0x0a, 0x0d, 0x0a, 0x42]);
    let mut renamed = Attachment::with_table(&binary, &table).unwrap();
    renamed.set_filename("renamed.dat").set_type("application/x-test");

    let mut req = Request::new(&format!("{base}/upload")).unwrap();
    req.set_params(
        Params::new()
            .with("title", "quarterly")
            .with("files", Params::new()
                .with("csv", Attachment::with_table(&csv, &table).unwrap())
                .with("raw", renamed)),
    );
    let echo = send(&mut req);
    assert_eq!(echo.method, "POST");
    assert!(echo
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data; boundary=-----------------------------"));
    assert_eq!(echo.field("title"), Some("quarterly"));
    assert_eq!(echo.files.len(), 2);
    assert_eq!(echo.files[0].name, "files[csv]");
    assert_eq!(echo.files[0].filename, "report.csv");
    assert_eq!(echo.files[0].content_type.as_deref(), Some("text/csv"));
    assert_eq!(echo.files[0].contents, b"a,b\r\n1,2\r\n");
    assert_eq!(echo.files[1].name, "files[raw]");
    assert_eq!(echo.files[1].filename, "renamed.dat");
    assert_eq!(echo.files[1].content_type.as_deref(), Some("application/x-test"));
    assert_eq!(echo.files[1].contents, [0x00, 0xff, 0x0d, 0x0a, 0x0d, 0x0a, 0x42]);

    // Step 5: header handling.
    let mut req = Request::new(&format!("{base}/headers")).unwrap();
    req.set_method("DELETE").unwrap();
    req.set_header("X-Multi", "one", false)
        .set_header("X-Multi", "two", false)
        .set_header("X-Replaced", "old", false)
        .set_header("X-Replaced", "new", true)
        .set_header("Host", "virtual.test", true)
        .rm_header("User-Agent");
    let echo = send(&mut req);
    assert_eq!(echo.method, "DELETE");
    assert_eq!(echo.header_values("x-multi"), ["one", "two"]);
    assert_eq!(echo.header_values("x-replaced"), ["new"]);
    assert_eq!(echo.header_values("host"), ["virtual.test"]);
    assert!(echo.header("user-agent").is_none());

    // Step 6: credentials from the URI.
    let authority = base.trim_start_matches("http://");
    let mut req = Request::new(&format!("http://ann:pw@{authority}/private")).unwrap();
    let echo = send(&mut req);
    assert_eq!(echo.header("authorization"), Some("Basic YW5uOnB3"));

    // Step 7: a cookie jar is opened but plays no part in sending.
    let jar = temp_file("jar.json", b"{not json");
    let mut req = Request::new(&format!("{base}/jar")).unwrap();
    req.set_cookiejar(&jar).unwrap();
    let echo = send(&mut req);
    assert!(echo.header("cookie").is_none());
    assert!(req.cookiejar().unwrap().cookies().is_empty());
}
