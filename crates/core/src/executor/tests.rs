use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pagewatch_protocol::Request;
use pagewatch_runtime::testing::{FakeTarget, memory_transport};
use pagewatch_runtime::{IdAllocator, Inbound, TransportEvent};
use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::command::Invocation;

const PAGE_URL: &str = "https://example.com/";

async fn open() -> (Connection, Inbound, FakeTarget) {
	let (parts, target) = memory_transport().await;
	let (connection, inbound) = Connection::open(parts, Arc::new(IdAllocator::new()));
	(connection, inbound, target)
}

/// Polls `fut` while routing inbound frames, the way the session loop does.
async fn drive<F: Future>(connection: &Connection, inbound: &mut Inbound, fut: F) -> F::Output {
	tokio::pin!(fut);
	let mut open = true;
	loop {
		tokio::select! {
			out = &mut fut => return out,
			event = inbound.recv(), if open => match event {
				TransportEvent::Frame(frame) => {
					connection.dispatch(&frame);
				}
				TransportEvent::Closed | TransportEvent::Failed(_) => open = false,
			},
		}
	}
}

fn command(name: &str, args: &[&str]) -> Command {
	Command::parse(&Invocation::new(name, args.iter().map(|s| s.to_string()).collect())).unwrap()
}

fn evaluate_result(value: Value) -> Value {
	json!({ "result": { "type": "object", "value": value } })
}

/// Target that answers every request with the result `respond` builds for it.
fn answering(mut target: FakeTarget, respond: impl Fn(&Request) -> Option<Value> + Send + 'static) -> tokio::task::JoinHandle<Vec<Request>> {
	tokio::spawn(async move {
		let mut seen = Vec::new();
		while let Some(request) = target.next_request().await {
			if let Some(result) = respond(&request) {
				target.reply(request.id, result).await;
			}
			seen.push(request);
		}
		seen
	})
}

#[tokio::test]
async fn barrier_counts_acks_in_any_order() {
	let (connection, mut inbound, mut target) = open().await;

	let script = tokio::spawn(async move {
		let mut enables = Vec::new();
		for _ in 0..4 {
			enables.push(target.next_request().await.unwrap());
		}
		for request in enables.iter().rev() {
			target.reply(request.id, json!({})).await;
		}
		(target, enables)
	});

	let enabled = drive(&connection, &mut inbound, enable_capabilities(&connection)).await.unwrap();
	let (_target, enables) = script.await.unwrap();

	let ids: Vec<u64> = enables.iter().map(|r| r.id).collect();
	assert_eq!(ids, vec![1, 2, 3, 4]);
	let methods: Vec<&str> = enables.iter().map(|r| r.method.as_str()).collect();
	assert_eq!(methods, vec!["Console.enable", "Runtime.enable", "Network.enable", "Page.enable"]);

	let mut enabled = enabled;
	enabled.sort();
	assert_eq!(enabled, Capability::REQUIRED.to_vec());
	assert!(connection.pending().is_empty());
}

#[tokio::test]
async fn rejected_enable_still_releases_barrier() {
	let (connection, mut inbound, mut target) = open().await;

	let script = tokio::spawn(async move {
		for _ in 0..4 {
			let request = target.next_request().await.unwrap();
			if request.method == "Console.enable" {
				target.reply_error(request.id, -32601, "'Console.enable' wasn't found").await;
			} else {
				target.reply(request.id, json!({})).await;
			}
		}
		target
	});

	let enabled = drive(&connection, &mut inbound, enable_capabilities(&connection)).await.unwrap();
	let _target = script.await.unwrap();
	assert!(!enabled.contains(&Capability::Console));
	assert_eq!(enabled.len(), 3);
}

#[tokio::test]
async fn navigate_resolves_on_correlated_response() {
	let (connection, mut inbound, target) = open().await;
	let script = answering(target, |_| Some(json!({ "frameId": "F1", "loaderId": "L1" })));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let output = drive(&connection, &mut inbound, executor.run(&command("navigate", &["https://example.com"])))
		.await
		.unwrap();
	assert_eq!(output, CommandOutput::Done("navigated to https://example.com".to_string()));

	drop(connection);
	let requests = script.await.unwrap();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].method, "Page.navigate");
	assert_eq!(requests[0].params.as_ref().unwrap()["url"], "https://example.com");
}

#[tokio::test]
async fn navigate_error_text_fails_the_command() {
	let (connection, mut inbound, target) = open().await;
	let _script = answering(target, |_| Some(json!({ "frameId": "F1", "errorText": "net::ERR_NAME_NOT_RESOLVED" })));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let err = drive(&connection, &mut inbound, executor.run(&command("navigate", &["https://nope.invalid"])))
		.await
		.unwrap_err();
	assert!(matches!(err, CommandError::Protocol(message) if message.contains("ERR_NAME_NOT_RESOLVED")));
}

#[tokio::test]
async fn remote_error_surfaces_as_failure() {
	let (connection, mut inbound, mut target) = open().await;
	let _script = tokio::spawn(async move {
		let request = target.next_request().await.unwrap();
		target.reply_error(request.id, -32000, "Not allowed").await;
		target
	});

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let err = drive(&connection, &mut inbound, executor.run(&Command::Reload)).await.unwrap_err();
	assert!(matches!(
		err,
		CommandError::Runtime(pagewatch_runtime::Error::Remote { ref message, .. }) if message == "Not allowed"
	));
	assert!(!err.is_transport());
}

#[tokio::test(start_paused = true)]
async fn one_shot_times_out_after_exactly_its_budget() {
	let (connection, mut inbound, target) = open().await;
	let _script = answering(target, |_| None);

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let started = Instant::now();
	let err = drive(&connection, &mut inbound, executor.run(&Command::Reload)).await.unwrap_err();

	assert!(matches!(err, CommandError::Timeout { after, .. } if after == Duration::from_secs(30)));
	assert_eq!(started.elapsed(), Duration::from_secs(30));
	assert!(connection.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn screenshot_uses_its_own_budget() {
	let (connection, mut inbound, target) = open().await;
	let _script = answering(target, |_| None);

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let started = Instant::now();
	let err = drive(&connection, &mut inbound, executor.run(&command("screenshot", &["out", "a.png"])))
		.await
		.unwrap_err();

	assert!(err.is_timeout());
	assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test]
async fn screenshot_decodes_capture() {
	let (connection, mut inbound, target) = open().await;
	let _script = answering(target, |_| Some(json!({ "data": "iVBORw0KGgo=" })));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let output = drive(&connection, &mut inbound, executor.run(&command("screenshot", &["out", "a.png"])))
		.await
		.unwrap();

	let CommandOutput::Screenshot { dir, filename, data } = output else {
		panic!("expected screenshot output");
	};
	assert_eq!(dir, std::path::PathBuf::from("out"));
	assert_eq!(filename, "a.png");
	assert_eq!(data, b"\x89PNG\r\n\x1a\n");
}

#[tokio::test(start_paused = true)]
async fn fixed_wait_sends_nothing() {
	let (connection, mut inbound, target) = open().await;
	let script = answering(target, |_| Some(json!({})));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let started = Instant::now();
	let output = drive(&connection, &mut inbound, executor.run(&command("wait", &["1500"]))).await.unwrap();

	assert_eq!(output, CommandOutput::Done("waited 1500ms".to_string()));
	assert_eq!(started.elapsed(), Duration::from_millis(1500));
	drop(connection);
	assert!(script.await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn wait_for_element_times_out_and_stops_polling() {
	let (connection, mut inbound, target) = open().await;
	let polls = Arc::new(AtomicUsize::new(0));
	let counter = polls.clone();
	let _script = answering(target, move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
		Some(evaluate_result(json!(false)))
	});

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let started = Instant::now();
	let err = drive(&connection, &mut inbound, executor.run(&command("wait-for-element", &["#login", "2000"])))
		.await
		.unwrap_err();

	assert!(matches!(err, CommandError::Timeout { after, .. } if after == Duration::from_millis(2000)));
	assert_eq!(started.elapsed(), Duration::from_millis(2000));
	assert!(connection.pending().is_empty());

	let seen = polls.load(Ordering::SeqCst);
	assert!(seen >= 15, "expected steady polling, saw {seen}");
	tokio::time::sleep(Duration::from_secs(1)).await;
	assert_eq!(polls.load(Ordering::SeqCst), seen, "polling continued after the deadline");
}

#[tokio::test(start_paused = true)]
async fn wait_for_element_succeeds_when_condition_holds() {
	let (connection, mut inbound, target) = open().await;
	let polls = Arc::new(AtomicUsize::new(0));
	let counter = polls.clone();
	let script = answering(target, move |request| {
		assert_eq!(request.method, "Runtime.evaluate");
		let n = counter.fetch_add(1, Ordering::SeqCst);
		Some(evaluate_result(json!(n >= 2)))
	});

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let started = Instant::now();
	let output = drive(&connection, &mut inbound, executor.run(&command("wait-for-element", &["#app"])))
		.await
		.unwrap();

	assert_eq!(output, CommandOutput::Done("element #app appeared".to_string()));
	assert_eq!(started.elapsed(), Duration::from_millis(300));
	assert!(connection.pending().is_empty());

	drop(connection);
	let requests = script.await.unwrap();
	let expression = requests[0].params.as_ref().unwrap()["expression"].as_str().unwrap();
	assert_eq!(expression, r##"document.querySelector("#app") !== null"##);
}

#[tokio::test(start_paused = true)]
async fn click_at_completes_on_release_only() {
	let (connection, mut inbound, mut target) = open().await;
	let script = tokio::spawn(async move {
		let press = target.next_request().await.unwrap();
		let release = target.next_request().await.unwrap();
		// answer out of order; the press reply is stale by now
		target.reply(release.id, json!({})).await;
		target.reply(press.id, json!({})).await;
		(target, press, release)
	});

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let started = Instant::now();
	let output = drive(&connection, &mut inbound, executor.run(&command("click-at", &["120", "48"])))
		.await
		.unwrap();

	assert_eq!(output, CommandOutput::Done("clicked at 120,48".to_string()));
	assert!(started.elapsed() >= Duration::from_millis(100));

	let (_target, press, release) = script.await.unwrap();
	assert_eq!(press.params.as_ref().unwrap()["type"], "mousePressed");
	assert_eq!(release.params.as_ref().unwrap()["type"], "mouseReleased");
	assert_eq!(release.params.as_ref().unwrap()["x"], 120.0);
	assert!(press.id < release.id);
	assert!(!connection.pending().contains(press.id));
}

#[tokio::test]
async fn click_element_reports_missing_element() {
	let (connection, mut inbound, target) = open().await;
	let _script = answering(target, |_| Some(evaluate_result(json!(false))));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let err = drive(&connection, &mut inbound, executor.run(&command("click-element", &["#missing"])))
		.await
		.unwrap_err();
	assert!(matches!(err, CommandError::ElementNotFound { selector } if selector == "#missing"));
}

#[tokio::test]
async fn read_text_returns_element_text() {
	let (connection, mut inbound, target) = open().await;
	let script = answering(target, |_| Some(evaluate_result(json!("Welcome back"))));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let output = drive(&connection, &mut inbound, executor.run(&command("read-text", &["h1.title"])))
		.await
		.unwrap();
	assert_eq!(output, CommandOutput::Text("Welcome back".to_string()));

	drop(connection);
	let requests = script.await.unwrap();
	let expression = requests[0].params.as_ref().unwrap()["expression"].as_str().unwrap();
	assert!(expression.contains(r#"document.querySelector("h1.title")"#));
}

#[tokio::test]
async fn selectors_are_quoted_as_string_literals() {
	let (connection, mut inbound, target) = open().await;
	let script = answering(target, |_| Some(evaluate_result(json!(true))));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	drive(&connection, &mut inbound, executor.run(&command("click-element", &["a[title='it\"s']"])))
		.await
		.unwrap();

	drop(connection);
	let requests = script.await.unwrap();
	let expression = requests[0].params.as_ref().unwrap()["expression"].as_str().unwrap();
	assert!(expression.contains(r#"document.querySelector("a[title='it\"s']")"#));
}

#[tokio::test]
async fn evaluation_exception_is_reported() {
	let (connection, mut inbound, target) = open().await;
	let _script = answering(target, |_| {
		Some(json!({
			"result": { "type": "object", "subtype": "error" },
			"exceptionDetails": { "text": "Uncaught", "exception": { "description": "SyntaxError: bad selector" } }
		}))
	});

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let err = drive(&connection, &mut inbound, executor.run(&command("storage", &["get", "theme"])))
		.await
		.unwrap_err();
	assert!(matches!(err, CommandError::Evaluation(message) if message == "SyntaxError: bad selector"));
}

#[tokio::test]
async fn cookie_get_filters_by_name_and_scopes_to_page() {
	let (connection, mut inbound, target) = open().await;
	let script = answering(target, |_| {
		Some(json!({ "cookies": [
			{ "name": "sid", "value": "abc", "domain": "example.com", "path": "/" },
			{ "name": "theme", "value": "dark", "domain": "example.com", "path": "/" }
		]}))
	});

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let output = drive(&connection, &mut inbound, executor.run(&command("cookie", &["get", "sid"])))
		.await
		.unwrap();

	let CommandOutput::Cookies(cookies) = output else {
		panic!("expected cookies");
	};
	assert_eq!(cookies.len(), 1);
	assert_eq!(cookies[0].value, "abc");

	drop(connection);
	let requests = script.await.unwrap();
	assert_eq!(requests[0].method, "Network.getCookies");
	assert_eq!(requests[0].params.as_ref().unwrap()["urls"], json!([PAGE_URL]));
}

#[tokio::test]
async fn storage_list_parses_entries() {
	let (connection, mut inbound, target) = open().await;
	let _script = answering(target, |_| Some(evaluate_result(json!(r#"[["theme","dark"]]"#))));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	let output = drive(&connection, &mut inbound, executor.run(&command("storage", &["list"])))
		.await
		.unwrap();
	assert_eq!(output, CommandOutput::Storage(json!([["theme", "dark"]])));
}

#[tokio::test]
async fn throttle_converts_kbps_to_bytes_per_second() {
	let (connection, mut inbound, target) = open().await;
	let script = answering(target, |_| Some(json!({})));

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	drive(&connection, &mut inbound, executor.run(&command("throttle-network", &["512"])))
		.await
		.unwrap();

	drop(connection);
	let requests = script.await.unwrap();
	let params = requests[0].params.as_ref().unwrap();
	assert_eq!(params["downloadThroughput"], 65536.0);
	assert_eq!(params["uploadThroughput"], 65536.0);
	assert_eq!(params["latency"], 100);
}

#[tokio::test]
async fn type_focuses_then_inserts_text() {
	let (connection, mut inbound, target) = open().await;
	let script = answering(target, |request| match request.method.as_str() {
		"Runtime.evaluate" => Some(evaluate_result(json!(true))),
		_ => Some(json!({})),
	});

	let config = ExecutorConfig::default();
	let executor = Executor::new(&connection, PAGE_URL, &config);
	drive(&connection, &mut inbound, executor.run(&command("type", &["#q", "hello"])))
		.await
		.unwrap();

	drop(connection);
	let requests = script.await.unwrap();
	let methods: Vec<&str> = requests.iter().map(|r| r.method.as_str()).collect();
	assert_eq!(methods, vec!["Runtime.evaluate", "Input.insertText"]);
	assert_eq!(requests[1].params.as_ref().unwrap()["text"], "hello");
}
