//! Wire-level tests: JSON lines in, JSON lines out

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

use common::{wait_for, MockProvider};
use webtty::pty::UnixPtyProvider;
use webtty::server::listener::handle_connection;
use webtty::server::{NoPaste, ServerOptions, ServerRegistry};

struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Client {
    fn connect(registry: &ServerRegistry) -> Self {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        tokio::spawn(handle_connection(
            server_read,
            server_write,
            registry.clone(),
            None,
        ));
        let (read, writer) = tokio::io::split(client);
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send(&mut self, json: &str) {
        self.writer.write_all(json.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> serde_json::Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a message")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }

    /// Skip messages until one of type `kind` arrives
    async fn recv_type(&mut self, kind: &str) -> serde_json::Value {
        loop {
            let message = self.recv().await;
            if message["type"] == kind {
                return message;
            }
        }
    }
}

fn mock_registry(options: ServerOptions) -> (Arc<MockProvider>, ServerRegistry) {
    let provider = MockProvider::new();
    let registry = ServerRegistry::new(options, provider.clone(), Arc::new(NoPaste));
    (provider, registry)
}

#[tokio::test]
async fn test_create_data_and_disconnect() {
    let (provider, registry) = mock_registry(ServerOptions {
        shell: "/bin/zsh".to_string(),
        ..ServerOptions::default()
    });
    let mut client = Client::connect(&registry);

    // No hello: the first line is an ordinary request
    client
        .send(r#"{"type":"create","seq":1,"cols":80,"rows":24}"#)
        .await;
    let ack = client.recv().await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["seq"], 1);
    assert_eq!(ack["result"]["id"], "/dev/pts/0");
    assert_eq!(ack["result"]["process"], "zsh");

    client
        .send(r#"{"type":"data","id":"/dev/pts/0","data":"ls\r"}"#)
        .await;
    assert!(wait_for(|| provider.pty(0).written() == "ls\r").await);

    provider.pty(0).emit("file.txt\r\n");
    let data = client.recv().await;
    assert_eq!(data["type"], "data");
    assert_eq!(data["id"], "/dev/pts/0");
    assert_eq!(data["data"], "file.txt\r\n");

    client.send(r#"{"type":"process","seq":2,"id":"/dev/pts/0"}"#).await;
    let ack = client.recv().await;
    assert_eq!(ack["seq"], 2);
    assert_eq!(ack["result"], "zsh");

    client.writer.shutdown().await.unwrap();
    assert!(wait_for(|| provider.pty(0).shutdowns() == 1).await);
    assert_eq!(registry.live_sessions(), 0);
}

#[tokio::test]
async fn test_limit_error_is_acknowledged() {
    let (_provider, registry) = mock_registry(ServerOptions {
        limit_per_user: Some(1),
        ..ServerOptions::default()
    });
    let mut client = Client::connect(&registry);
    client.send(r#"{"type":"hello"}"#).await;

    client
        .send(r#"{"type":"create","seq":1,"cols":80,"rows":24}"#)
        .await;
    assert!(client.recv().await.get("error").is_none());

    client
        .send(r#"{"type":"create","seq":2,"cols":80,"rows":24}"#)
        .await;
    let ack = client.recv().await;
    assert_eq!(ack["seq"], 2);
    assert_eq!(ack["error"], "Terminal limit reached");
    assert!(ack.get("result").is_none());
}

#[tokio::test]
async fn test_unacknowledged_requests_and_bad_lines() {
    let (provider, registry) = mock_registry(ServerOptions::default());
    let mut client = Client::connect(&registry);
    client.send(r#"{"type":"hello","identity":null}"#).await;

    client.send("this is not json").await;
    client
        .send(r#"{"type":"data","id":"/dev/pts/9","data":"x"}"#)
        .await;
    client.send(r#"{"type":"kill","id":"/dev/pts/9"}"#).await;
    client
        .send(r#"{"type":"resize","id":"/dev/pts/9","cols":1,"rows":1}"#)
        .await;
    client.send(r#"{"type":"request_paste","seq":5}"#).await;

    // Only the paste request is answered
    let ack = client.recv().await;
    assert_eq!(ack["seq"], 5);
    assert_eq!(ack["error"], "Clipboard is not available");
    assert_eq!(provider.count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_over_the_wire() {
    let (provider, registry) = mock_registry(ServerOptions {
        resume: true,
        grace: Duration::from_secs(30),
        ..ServerOptions::default()
    });

    let mut first = Client::connect(&registry);
    first.send(r#"{"type":"hello","identity":"alice"}"#).await;
    first
        .send(r#"{"type":"create","seq":1,"cols":80,"rows":24}"#)
        .await;
    let id = first.recv().await["result"]["id"].as_str().unwrap().to_string();
    first.writer.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.pty(0).shutdowns(), 0);

    let mut second = Client::connect(&registry);
    second.send(r#"{"type":"hello","identity":"alice"}"#).await;
    let sync = second.recv_type("sync").await;
    assert_eq!(sync["terms"][id.as_str()]["cols"], 80);
    assert_eq!(sync["terms"][id.as_str()]["rows"], 24);
    assert_eq!(provider.pty(0).shutdowns(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_real_shell_round_trip() {
    let registry = ServerRegistry::new(
        ServerOptions {
            shell: "/bin/sh".to_string(),
            ..ServerOptions::default()
        },
        Arc::new(UnixPtyProvider),
        Arc::new(NoPaste),
    );
    let mut client = Client::connect(&registry);
    client
        .send(r#"{"type":"create","seq":1,"cols":80,"rows":24}"#)
        .await;
    let ack = client.recv().await;
    let id = ack["result"]["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("/dev/"));
    assert_eq!(ack["result"]["process"], "sh");

    let input = serde_json::json!({"type": "data", "id": id, "data": "echo web$((6*7))tty\n"});
    client.send(&input.to_string()).await;

    let mut output = String::new();
    while !output.contains("web42tty") {
        let message = client.recv().await;
        if message["type"] == "data" {
            output.push_str(message["data"].as_str().unwrap());
        }
    }

    let exit = serde_json::json!({"type": "data", "id": id, "data": "exit\n"});
    client.send(&exit.to_string()).await;
    let kill = client.recv_type("kill").await;
    assert_eq!(kill["id"], id.as_str());
    assert!(wait_for(|| registry.live_sessions() == 0).await);
}
