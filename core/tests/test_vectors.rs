//! Verify request building and response parsing against the JSON vectors in
//! `test-vectors/`.
//!
//! Request vectors describe a URI plus edits and the exact wire text that
//! must come out of `build()`. Response vectors pair raw bytes with the
//! parsed status line, header sequence and body, or with an expected error.

use wirehttp::{Error, Request, Response, USER_AGENT};

fn split_wire(wire: &[u8]) -> (String, &[u8]) {
    let end = wire
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("request head terminator");
    let head = String::from_utf8(wire[..end].to_vec()).unwrap();
    (head, &wire[end + 4..])
}

fn string_pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            let v = arr[1].as_str().unwrap().replace("{user_agent}", USER_AGENT);
            (arr[0].as_str().unwrap().to_string(), v)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let mut req = Request::new(case["uri"].as_str().unwrap()).unwrap();

        if let Some(method) = case["method"].as_str() {
            req.set_method(method).unwrap();
        }
        if !case["params"].is_null() {
            req.set_params_json(case["params"].clone()).unwrap();
        }
        for edit in case["set_headers"].as_array().into_iter().flatten() {
            let edit = edit.as_array().unwrap();
            req.set_header(
                edit[0].as_str().unwrap(),
                edit[1].as_str().unwrap(),
                edit[2].as_bool().unwrap(),
            );
        }
        for omitted in case["omit"].as_array().into_iter().flatten() {
            req.rm_header(omitted.as_str().unwrap());
        }

        let wire = req.build().unwrap();
        let (head, rest) = split_wire(&wire);
        let expected = &case["expected_request"];
        let expected_body = expected["body"].as_str().unwrap();

        let mut lines = head.split("\r\n");
        assert_eq!(lines.next(), expected["start_line"].as_str(), "{name}: start line");

        let headers: Vec<(String, String)> = lines
            .map(|l| {
                let (k, v) = l.split_once(": ").expect("header line");
                (k.to_string(), v.to_string())
            })
            .collect();

        // Content-Length sits right before any credentials line.
        let mut expected_headers = string_pairs(&expected["headers"]);
        let at = expected_headers
            .iter()
            .position(|(k, _)| k == "Authorization")
            .unwrap_or(expected_headers.len());
        expected_headers.insert(
            at,
            ("Content-Length".to_string(), expected_body.len().to_string()),
        );
        assert_eq!(headers, expected_headers, "{name}: headers");

        let body = rest.strip_suffix(b"\r\n\r\n").expect("trailing blank line");
        assert_eq!(String::from_utf8_lossy(body), expected_body, "{name}: body");
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let result = Response::parse(case["raw"].as_str().unwrap().as_bytes());

        if let Some(kind) = case["expected_error"].as_str() {
            assert_eq!(kind, "malformed", "{name}: unknown error kind");
            assert!(
                matches!(result, Err(Error::MalformedResponse(_))),
                "{name}: expected malformed, got {result:?}"
            );
            continue;
        }

        let resp = result.unwrap_or_else(|e| panic!("{name}: {e}"));
        let expected = &case["expected_result"];
        assert_eq!(resp.version(), expected["version"].as_str().unwrap(), "{name}: version");
        assert_eq!(
            u64::from(resp.status_code()),
            expected["status"].as_u64().unwrap(),
            "{name}: status"
        );
        assert_eq!(resp.reason(), expected["reason"].as_str().unwrap(), "{name}: reason");

        let headers: Vec<(String, Vec<String>)> = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(str::to_string).collect()))
            .collect();
        let expected_headers: Vec<(String, Vec<String>)> =
            serde_json::from_value(expected["headers"].clone()).unwrap();
        assert_eq!(headers, expected_headers, "{name}: headers");

        assert_eq!(resp.text(), expected["body"].as_str().unwrap(), "{name}: body");
    }
}
