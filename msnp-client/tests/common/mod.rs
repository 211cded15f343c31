//! Scripted-server harness: an in-memory transport, a byte-level server
//! puppet, and a replay authenticator.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use msnp_client::{
    auth::Authenticator,
    transport::{Connector, Transport},
    Client, ClientConfig,
};
use msnp_types::core::{Email, Endpoint};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    sync::mpsc,
    time::Duration,
};

pub fn email(value: &str) -> Email {
    Email::try_from(value).unwrap()
}

/// The far end of one dialed connection, with line/payload helpers.
pub struct Server {
    stream: DuplexStream,
    buf: Vec<u8>,
}

impl Server {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// Read one CRLF-terminated header line (terminator stripped).
    pub async fn read_line(&mut self) -> String {
        loop {
            if let Some(position) = self.buf.windows(2).position(|window| window == b"\r\n") {
                let line: Vec<u8> = self.buf.drain(..position + 2).collect();

                return String::from_utf8(line[..position].to_vec()).unwrap();
            }

            let mut chunk = [0u8; 1024];
            let n = self.stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed while the script expected a line");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Read exactly `len` payload bytes following a header line.
    pub async fn read_payload(&mut self, len: usize) -> Vec<u8> {
        while self.buf.len() < len {
            let mut chunk = [0u8; 1024];
            let n = self.stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed while the script expected payload");
            self.buf.extend_from_slice(&chunk[..n]);
        }

        self.buf.drain(..len).collect()
    }

    /// Assert the next header line is exactly `expected`.
    pub async fn expect(&mut self, expected: &str) {
        let got = self.read_line().await;
        assert_eq!(got, expected);
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }
}

/// Hands each `connect` a fresh in-memory duplex and surfaces the far end
/// (plus the dialed endpoint) to the test.
pub struct TestConnector {
    tx: mpsc::UnboundedSender<(Endpoint, Server)>,
}

pub fn test_connector() -> (Arc<TestConnector>, mpsc::UnboundedReceiver<(Endpoint, Server)>) {
    let (tx, rx) = mpsc::unbounded_channel();

    (Arc::new(TestConnector { tx }), rx)
}

#[async_trait]
impl Connector for TestConnector {
    async fn connect(&self, endpoint: &Endpoint) -> std::io::Result<Box<dyn Transport>> {
        let (near, far) = tokio::io::duplex(65536);

        self.tx
            .send((endpoint.clone(), Server::new(far)))
            .expect("test dropped the connector receiver");

        Ok(Box::new(near))
    }
}

/// Replays a fixed ticket instead of talking to the SSO service.
pub struct StaticAuthenticator(pub String);

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(
        &self,
        _login: &Email,
        _password: &str,
        policy: &str,
    ) -> msnp_client::Result<String> {
        assert!(!policy.is_empty(), "policy string must be forwarded");

        Ok(self.0.clone())
    }
}

/// A client wired to the scripted transport, logging in as `a@b.c` with
/// ticket `T`.
pub fn scripted_client() -> (Client, mpsc::UnboundedReceiver<(Endpoint, Server)>) {
    let (connector, rx) = test_connector();

    let config = ClientConfig {
        server: Endpoint::new("ns.test", 1863),
        reply_timeout: Duration::from_secs(5),
        login_timeout: Duration::from_secs(10),
        ..ClientConfig::default()
    };

    let client = Client::with_parts(
        email("a@b.c"),
        config,
        connector,
        Arc::new(StaticAuthenticator("T".into())),
    );

    (client, rx)
}

pub const GROUP_GUID: &str = "f3e85f90-58c3-47e7-8e4d-d5d5d20c5e49";
pub const CONTACT_GUID: &str = "d57283f5-b92a-4e7e-88cb-d0327f534a50";

/// Drive the standard login exchange: version negotiation, SSO ticket,
/// a two-contact/one-group synchronization, initial presence.
pub async fn login_script(server: &mut Server) {
    server.expect("VER 1 MSNP12 CVR0").await;
    server.send(b"VER 1 MSNP12\r\n").await;

    server
        .expect("CVR 2 0x0409 winnt 5.1 i386 MSNMSGR 8.0.0792 msmsgs a@b.c")
        .await;
    server
        .send(b"CVR 2 8.0.0792 8.0.0792 8.0.0792 http://download.test http://info.test\r\n")
        .await;

    server.expect("USR 3 TWN I a@b.c").await;
    server.send(b"USR 3 TWN S lc=1033,id=507\r\n").await;

    server.expect("USR 4 TWN S T").await;
    server.send(b"USR 4 OK a@b.c 1 0\r\n").await;

    server.expect("SYN 5 0 0").await;
    server.send(b"SYN 5 0 0 2 1\r\n").await;
    server.send(b"GTC A\r\n").await;
    server.send(b"BLP AL\r\n").await;
    server.send(b"PRP MFN My%20Name\r\n").await;
    server
        .send(format!("LSG Friends {GROUP_GUID}\r\n").as_bytes())
        .await;
    server
        .send(format!("LST N=c1@x.y F=C1 C={CONTACT_GUID} 13 {GROUP_GUID}\r\n").as_bytes())
        .await;
    server.send(b"LST N=r@x.y 10\r\n").await;

    server.expect("CHG 6 NLN 0").await;
    server.send(b"CHG 6 NLN 0\r\n").await;
}

/// `scripted_client` + `login_script`, returning the live NS puppet.
pub async fn logged_in_client() -> (
    Client,
    mpsc::UnboundedReceiver<(Endpoint, Server)>,
    Server,
) {
    let (client, mut connections) = scripted_client();

    let login = async {
        let (endpoint, mut server) = connections.recv().await.unwrap();
        assert_eq!(endpoint, Endpoint::new("ns.test", 1863));
        login_script(&mut server).await;
        server
    };

    let (result, server) = tokio::join!(client.login("password"), login);
    result.unwrap();

    (client, connections, server)
}
