use futures_util::{SinkExt, StreamExt};
use tokio::io::{DuplexStream, duplex};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

use super::*;

async fn socket_pair() -> (TransportParts, WebSocketStream<DuplexStream>) {
	let (client_io, server_io) = duplex(64 * 1024);
	let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
	let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
	(WebSocketTransport::from_stream(client), server)
}

#[tokio::test]
async fn test_send_writes_text_frame() {
	let (parts, mut peer) = socket_pair().await;
	let TransportParts { mut sender, .. } = parts;

	sender
		.send(r#"{"id":1,"method":"Page.reload"}"#.to_string())
		.await
		.unwrap();

	let received = peer.next().await.unwrap().unwrap();
	assert_eq!(
		received,
		Message::Text(r#"{"id":1,"method":"Page.reload"}"#.to_string())
	);
}

#[tokio::test]
async fn test_frames_arrive_in_order() {
	let (parts, mut peer) = socket_pair().await;
	let TransportParts {
		receiver,
		mut events,
		..
	} = parts;
	let reader = tokio::spawn(receiver.run());

	for n in 1..=3 {
		peer.send(Message::Text(format!(r#"{{"id":{n},"result":{{}}}}"#)))
			.await
			.unwrap();
	}

	for n in 1..=3 {
		let event = events.recv().await.unwrap();
		assert_eq!(event, TransportEvent::Frame(format!(r#"{{"id":{n},"result":{{}}}}"#)));
	}

	drop(peer);
	let _ = reader.await;
}

#[tokio::test]
async fn test_close_frame_yields_closed() {
	let (parts, mut peer) = socket_pair().await;
	let TransportParts {
		receiver,
		mut events,
		..
	} = parts;
	let reader = tokio::spawn(receiver.run());

	peer.close(None).await.unwrap();

	assert_eq!(events.recv().await, Some(TransportEvent::Closed));
	reader.await.unwrap();
}

#[tokio::test]
async fn test_dropped_peer_ends_with_terminal_event() {
	let (parts, peer) = socket_pair().await;
	let TransportParts {
		receiver,
		mut events,
		..
	} = parts;
	let reader = tokio::spawn(receiver.run());

	drop(peer);

	let terminal = events.recv().await.unwrap();
	assert!(
		matches!(terminal, TransportEvent::Closed | TransportEvent::Failed(_)),
		"unexpected terminal event: {terminal:?}"
	);
	reader.await.unwrap();
}

#[tokio::test]
async fn test_binary_utf8_frame_is_delivered() {
	let (parts, mut peer) = socket_pair().await;
	let TransportParts {
		receiver,
		mut events,
		..
	} = parts;
	let reader = tokio::spawn(receiver.run());

	peer.send(Message::Binary(br#"{"method":"Page.loadEventFired"}"#.to_vec()))
		.await
		.unwrap();

	assert_eq!(
		events.recv().await,
		Some(TransportEvent::Frame(r#"{"method":"Page.loadEventFired"}"#.to_string()))
	);

	drop(peer);
	let _ = reader.await;
}
