//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use fulfillment_router::auth::{AuthSettings, KeyCache, KeySet};

pub const SIGNING_KEY: &str = include_str!("../fixtures/signing_key.pem");
pub const SIGNING_PUB: &str = include_str!("../fixtures/signing_pub.pem");
pub const SIGNING_CERT: &str = include_str!("../fixtures/signing_cert.pem");
pub const ROGUE_KEY: &str = include_str!("../fixtures/rogue_key.pem");

pub const KID: &str = "test-key-1";
pub const AUDIENCE: &str = "test-project";

/// What the mock key endpoint answers with.
#[derive(Debug, Clone)]
pub struct KeyReply {
    pub status: u16,
    pub cache_control: Option<String>,
    pub body: String,
}

impl KeyReply {
    pub fn keys(keys: &[(&str, &str)], cache_control: Option<&str>) -> Self {
        let map: HashMap<&str, &str> = keys.iter().copied().collect();
        Self {
            status: 200,
            cache_control: cache_control.map(str::to_owned),
            body: json!(map).to_string(),
        }
    }

    pub fn signing_key(cache_control: Option<&str>) -> Self {
        Self::keys(&[(KID, SIGNING_PUB)], cache_control)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            cache_control: None,
            body: String::new(),
        }
    }
}

/// A key distribution endpoint that counts hits.
pub struct MockKeyServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    reply: Arc<Mutex<KeyReply>>,
}

impl MockKeyServer {
    pub async fn start(reply: KeyReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let reply = Arc::new(Mutex::new(reply));

        let (task_hits, task_reply) = (hits.clone(), reply.clone());
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let hits = task_hits.clone();
                let reply = task_reply.lock().unwrap().clone();
                tokio::spawn(async move {
                    read_request_head(&mut socket).await;
                    hits.fetch_add(1, Ordering::SeqCst);

                    let reason = match reply.status {
                        200 => "OK",
                        404 => "Not Found",
                        500 => "Internal Server Error",
                        503 => "Service Unavailable",
                        _ => "Unknown",
                    };
                    let mut response = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                        reply.status,
                        reason,
                        reply.body.len()
                    );
                    if let Some(cache_control) = &reply.cache_control {
                        response.push_str(&format!("Cache-Control: {}\r\n", cache_control));
                    }
                    response.push_str("\r\n");
                    response.push_str(&reply.body);

                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, hits, reply }
    }

    pub fn url(&self) -> String {
        format!("http://{}/certs", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn set_reply(&self, reply: KeyReply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Settings pointing at this endpoint, bypassing any environment proxy.
    pub fn settings(&self, audience: &str) -> AuthSettings {
        AuthSettings {
            keys_url: self.url(),
            system_proxy: false,
            retry_attempts: 0,
            ..AuthSettings::new(audience)
        }
    }
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// A cache already holding the signing key under `kid`.
pub fn cache_with(kid: &str, pem: &str) -> Arc<KeyCache> {
    let cache = Arc::new(KeyCache::new());
    cache.replace(KeySet::new(
        HashMap::from([(kid.to_string(), pem.to_string())]),
        Duration::from_secs(3600),
    ));
    cache
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Sign `claims` with `key_pem` (RS256), naming `kid` in the header.
pub fn sign(claims: &Value, kid: Option<&str>, key_pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_owned);
    let key = EncodingKey::from_rsa_pem(key_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// A valid platform token for `audience`.
pub fn token(audience: &str) -> String {
    sign(&claims(audience), Some(KID), SIGNING_KEY)
}

pub fn claims(audience: &str) -> Value {
    let now = now();
    json!({
        "iss": "https://accounts.google.com",
        "aud": audience,
        "iat": now,
        "exp": now + 3600,
    })
}

pub fn expired_claims(audience: &str) -> Value {
    let now = now();
    json!({
        "iss": "https://accounts.google.com",
        "aud": audience,
        "iat": now - 7200,
        "exp": now - 3600,
    })
}
