//! Redis-backed counter store.
//!
//! A bounded pool of plain TCP connections speaking RESP. Connections are
//! opened lazily up to `pool_size` and reused LIFO. A connection goes back to
//! the pool only after a complete reply was read from it; on any I/O,
//! timeout, or framing error (or when the caller's future is dropped
//! mid-command) it is discarded, so no pooled connection ever holds a
//! half-read reply.

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;

use tikky_core::protocol::resp::{self, RespValue};

use crate::config::RedisSection;

use super::{CounterRead, CounterStore, StoreError, StoreResult};

pub struct RedisStore {
    cfg: RedisSection,
    idle: Mutex<Vec<Connection>>,
    permits: Semaphore,
}

impl RedisStore {
    /// Build the pool without touching the network.
    pub fn new(cfg: RedisSection) -> Self {
        Self {
            permits: Semaphore::new(cfg.pool_size.max(1)),
            idle: Mutex::new(Vec::with_capacity(cfg.pool_size)),
            cfg,
        }
    }

    /// Build the pool and verify the server answers `PING`.
    pub async fn connect(cfg: RedisSection) -> StoreResult<Self> {
        let store = Self::new(cfg);
        store.ping().await?;
        Ok(store)
    }

    pub fn addr(&self) -> &str {
        &self.cfg.addr
    }

    /// Number of open connections currently parked in the pool.
    pub async fn idle_connections(&self) -> usize {
        self.idle.lock().await.len()
    }

    async fn call(&self, args: &[&[u8]]) -> StoreResult<RespValue> {
        let _permit = self.permits.acquire().await.map_err(|_| StoreError::Closed)?;

        let mut conn = loop {
            let pooled = self.idle.lock().await.pop();
            match pooled {
                Some(conn) if conn.is_reusable() => break conn,
                Some(_) => {
                    tracing::debug!(addr = %self.cfg.addr, "dropping stale pooled redis connection");
                }
                None => break Connection::open(&self.cfg).await?,
            }
        };

        match conn.request(args, &self.cfg).await {
            Ok(reply) => {
                let mut idle = self.idle.lock().await;
                // close() clears the pool under this same lock.
                if !self.permits.is_closed() {
                    idle.push(conn);
                }
                Ok(reply)
            }
            Err(e) => {
                tracing::debug!(error = %e, addr = %self.cfg.addr, "discarding redis connection");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        match self.call(&[b"INCR", key.as_bytes()]).await? {
            RespValue::Integer(n) => Ok(n),
            other => Err(unexpected("INCR", other)),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<CounterRead> {
        match self.call(&[b"GET", key.as_bytes()]).await? {
            RespValue::Null => Ok(CounterRead::Absent),
            RespValue::BulkString(raw) => {
                let text = String::from_utf8_lossy(&raw);
                text.parse::<i64>()
                    .map(CounterRead::Found)
                    .map_err(|_| StoreError::InvalidValue(text.into_owned()))
            }
            other => Err(unexpected("GET", other)),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        match self.call(&[b"PING"]).await? {
            RespValue::SimpleString(s) if s == "PONG" => Ok(()),
            other => Err(unexpected("PING", other)),
        }
    }

    async fn close(&self) {
        self.permits.close();
        let dropped = {
            let mut idle = self.idle.lock().await;
            let n = idle.len();
            idle.clear();
            n
        };
        tracing::info!(addr = %self.cfg.addr, connections = dropped, "redis pool closed");
    }
}

fn unexpected(cmd: &'static str, reply: RespValue) -> StoreError {
    match reply {
        RespValue::Error(msg) => StoreError::Server(msg),
        other => StoreError::UnexpectedReply { cmd, kind: other.kind() },
    }
}

struct Connection {
    stream: TcpStream,
    buf: BytesMut,
}

impl Connection {
    async fn open(cfg: &RedisSection) -> StoreResult<Self> {
        let stream = timeout(cfg.connect_timeout(), TcpStream::connect(cfg.addr.as_str()))
            .await
            .map_err(|_| StoreError::Timeout { op: "connect" })??;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        };

        if let Some(password) = cfg.password.as_deref() {
            let reply = conn.request(&[b"AUTH", password.as_bytes()], cfg).await?;
            expect_ok("AUTH", reply)?;
        }
        if cfg.db != 0 {
            let db = cfg.db.to_string();
            let reply = conn.request(&[b"SELECT", db.as_bytes()], cfg).await?;
            expect_ok("SELECT", reply)?;
        }

        tracing::debug!(addr = %cfg.addr, db = cfg.db, "redis connection opened");
        Ok(conn)
    }

    /// Non-blocking check that the server has not closed the socket while the
    /// connection sat idle. An idle connection owes us nothing, so any
    /// readable byte or EOF means it cannot be reused.
    fn is_reusable(&self) -> bool {
        if !self.buf.is_empty() {
            return false;
        }
        let mut peek = [0u8; 1];
        match self.stream.try_read(&mut peek) {
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Ok(_) | Err(_) => false,
        }
    }

    /// Send one command and read exactly one reply. `-ERR` replies are
    /// returned as values; the connection stays usable after them.
    async fn request(&mut self, args: &[&[u8]], cfg: &RedisSection) -> StoreResult<RespValue> {
        let cmd = resp::encode_command(args);
        timeout(cfg.write_timeout(), self.stream.write_all(&cmd))
            .await
            .map_err(|_| StoreError::Timeout { op: "write" })??;

        loop {
            if let Some((reply, used)) = resp::parse(&self.buf)? {
                self.buf.advance(used);
                return Ok(reply);
            }
            let n = timeout(cfg.read_timeout(), self.stream.read_buf(&mut self.buf))
                .await
                .map_err(|_| StoreError::Timeout { op: "read" })??;
            if n == 0 {
                return Err(StoreError::ConnectionClosed);
            }
        }
    }
}

fn expect_ok(cmd: &'static str, reply: RespValue) -> StoreResult<()> {
    match reply {
        RespValue::SimpleString(s) if s == "OK" => Ok(()),
        other => Err(unexpected(cmd, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;
    use tokio::net::TcpListener;

    /// Minimal in-process Redis speaking just enough RESP for the client.
    struct FakeRedis {
        addr: String,
        accepted: Arc<AtomicUsize>,
        commands: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl FakeRedis {
        async fn start(password: Option<&'static str>, seed: &[(&str, &str)]) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap().to_string();
            let accepted = Arc::new(AtomicUsize::new(0));
            let commands = Arc::new(std::sync::Mutex::new(Vec::new()));
            let data: Arc<std::sync::Mutex<HashMap<String, String>>> = Arc::new(
                std::sync::Mutex::new(
                    seed.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                ),
            );

            let (acc, log) = (accepted.clone(), commands.clone());
            tokio::spawn(async move {
                loop {
                    let Ok((sock, _)) = listener.accept().await else { return };
                    acc.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(sock, password, data.clone(), log.clone()));
                }
            });

            Self { addr, accepted, commands }
        }

        fn section(&self) -> RedisSection {
            RedisSection {
                addr: self.addr.clone(),
                read_timeout_ms: 1000,
                write_timeout_ms: 1000,
                connect_timeout_ms: 1000,
                ..RedisSection::default()
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    async fn serve(
        mut sock: TcpStream,
        password: Option<&'static str>,
        data: Arc<std::sync::Mutex<HashMap<String, String>>>,
        log: Arc<std::sync::Mutex<Vec<String>>>,
    ) {
        let mut buf = BytesMut::new();
        let mut authed = password.is_none();
        loop {
            while let Some((cmd, used)) = resp::parse(&buf).unwrap() {
                buf.advance(used);
                let RespValue::Array(parts) = cmd else { panic!("commands are arrays") };
                let args: Vec<String> = parts
                    .into_iter()
                    .map(|p| match p {
                        RespValue::BulkString(b) => String::from_utf8(b.to_vec()).unwrap(),
                        other => panic!("unexpected arg {other:?}"),
                    })
                    .collect();
                log.lock().unwrap().push(args.join(" "));

                let reply = reply_for(&args, password, &mut authed, &data);
                if sock.write_all(&reply).await.is_err() {
                    return;
                }
            }
            match sock.read_buf(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }

    fn reply_for(
        args: &[String],
        password: Option<&str>,
        authed: &mut bool,
        data: &std::sync::Mutex<HashMap<String, String>>,
    ) -> Vec<u8> {
        match (args[0].as_str(), *authed) {
            ("AUTH", _) if Some(args[1].as_str()) == password => {
                *authed = true;
                b"+OK\r\n".to_vec()
            }
            ("AUTH", _) => b"-WRONGPASS invalid username-password pair\r\n".to_vec(),
            (_, false) => b"-NOAUTH Authentication required.\r\n".to_vec(),
            ("PING", _) => b"+PONG\r\n".to_vec(),
            ("SELECT", _) => b"+OK\r\n".to_vec(),
            ("GET", _) => match data.lock().unwrap().get(&args[1]) {
                Some(v) => format!("${}\r\n{}\r\n", v.len(), v).into_bytes(),
                None => b"$-1\r\n".to_vec(),
            },
            ("INCR", _) => {
                let mut map = data.lock().unwrap();
                let cur = map.get(&args[1]).cloned().unwrap_or_else(|| "0".into());
                match cur.parse::<i64>() {
                    Ok(n) => {
                        map.insert(args[1].clone(), (n + 1).to_string());
                        format!(":{}\r\n", n + 1).into_bytes()
                    }
                    Err(_) => b"-ERR value is not an integer or out of range\r\n".to_vec(),
                }
            }
            _ => b"-ERR unknown command\r\n".to_vec(),
        }
    }

    #[tokio::test]
    async fn incr_returns_post_increment_values() {
        let redis = FakeRedis::start(None, &[]).await;
        let store = RedisStore::new(redis.section());

        for expected in 1..=5 {
            assert_eq!(store.incr("counter").await.unwrap(), expected);
        }
        assert_eq!(store.get("counter").await.unwrap(), CounterRead::Found(5));
    }

    #[tokio::test]
    async fn get_distinguishes_absent_from_invalid() {
        let redis = FakeRedis::start(None, &[("garbage", "abc")]).await;
        let store = RedisStore::new(redis.section());

        assert_eq!(store.get("counter").await.unwrap(), CounterRead::Absent);
        assert!(matches!(
            store.get("garbage").await,
            Err(StoreError::InvalidValue(v)) if v == "abc"
        ));
    }

    #[tokio::test]
    async fn server_errors_keep_the_connection() {
        let redis = FakeRedis::start(None, &[("garbage", "abc")]).await;
        let store = RedisStore::new(redis.section());

        assert!(matches!(store.incr("garbage").await, Err(StoreError::Server(_))));
        store.ping().await.unwrap();
        assert_eq!(redis.accepted.load(Ordering::SeqCst), 1);
        assert_eq!(store.idle_connections().await, 1);
    }

    #[tokio::test]
    async fn sequential_calls_reuse_one_connection() {
        let redis = FakeRedis::start(None, &[]).await;
        let store = RedisStore::connect(redis.section()).await.unwrap();

        for _ in 0..10 {
            store.incr("counter").await.unwrap();
            store.ping().await.unwrap();
        }
        assert_eq!(redis.accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_stay_within_pool_size() {
        let redis = FakeRedis::start(None, &[]).await;
        let store = Arc::new(RedisStore::new(RedisSection {
            pool_size: 3,
            ..redis.section()
        }));

        let tasks: Vec<_> = (0..30)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.incr("counter").await.unwrap() })
            })
            .collect();
        let mut seen = Vec::new();
        for t in tasks {
            seen.push(t.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=30).collect::<Vec<i64>>());
        assert!(redis.accepted.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn auth_and_select_run_on_connect() {
        let redis = FakeRedis::start(Some("s3cret"), &[]).await;
        let store = RedisStore::connect(RedisSection {
            password: Some("s3cret".into()),
            db: 2,
            ..redis.section()
        })
        .await
        .unwrap();

        store.incr("counter").await.unwrap();
        assert_eq!(
            redis.commands(),
            vec!["AUTH s3cret", "SELECT 2", "PING", "INCR counter"]
        );
    }

    #[tokio::test]
    async fn wrong_password_fails_connect() {
        let redis = FakeRedis::start(Some("s3cret"), &[]).await;
        let res = RedisStore::connect(RedisSection {
            password: Some("nope".into()),
            ..redis.section()
        })
        .await;
        assert!(matches!(res, Err(StoreError::Server(msg)) if msg.starts_with("WRONGPASS")));
    }

    #[tokio::test]
    async fn unreachable_server_fails_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let res = RedisStore::connect(RedisSection {
            addr,
            connect_timeout_ms: 500,
            ..RedisSection::default()
        })
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn silent_server_times_out_and_connection_is_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let store = RedisStore::new(RedisSection {
            addr,
            read_timeout_ms: 100,
            ..RedisSection::default()
        });
        assert!(matches!(store.ping().await, Err(StoreError::Timeout { op: "read" })));
        assert_eq!(store.idle_connections().await, 0);
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let redis = FakeRedis::start(None, &[]).await;
        let store = RedisStore::connect(redis.section()).await.unwrap();
        store.close().await;

        assert_eq!(store.idle_connections().await, 0);
        assert!(matches!(store.incr("counter").await, Err(StoreError::Closed)));
    }

    /// Answers a single `PING` per connection, then hangs up.
    async fn hang_up_after_one_reply() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let acc = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                acc.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = BytesMut::new();
                    while resp::parse(&buf).unwrap().is_none() {
                        if sock.read_buf(&mut buf).await.unwrap() == 0 {
                            return;
                        }
                    }
                    sock.write_all(b"+PONG\r\n").await.unwrap();
                });
            }
        });
        (addr, accepted)
    }

    #[tokio::test]
    async fn connection_closed_by_server_is_not_reused() {
        let (addr, accepted) = hang_up_after_one_reply().await;
        let store = RedisStore::new(RedisSection {
            addr,
            ..RedisSection::default()
        });

        store.ping().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        store.ping().await.unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_during_call_does_not_park_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            while resp::parse(&buf).unwrap().is_none() {
                sock.read_buf(&mut buf).await.unwrap();
            }
            seen_tx.send(()).unwrap();
            release_rx.await.unwrap();
            sock.write_all(b"+PONG\r\n").await.unwrap();
            // Keep the socket open so the client sees a healthy connection.
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let store = Arc::new(RedisStore::new(RedisSection {
            addr,
            ..RedisSection::default()
        }));
        let in_flight = tokio::spawn({
            let store = store.clone();
            async move { store.ping().await }
        });

        seen_rx.await.unwrap();
        store.close().await;
        release_tx.send(()).unwrap();

        in_flight.await.unwrap().unwrap();
        assert_eq!(store.idle_connections().await, 0);
    }

    #[test]
    fn error_replies_map_to_server_errors() {
        let err = unexpected("INCR", RespValue::Error("ERR boom".into()));
        assert!(matches!(err, StoreError::Server(m) if m == "ERR boom"));

        let err = unexpected("PING", RespValue::BulkString(Bytes::from_static(b"x")));
        assert!(matches!(
            err,
            StoreError::UnexpectedReply { cmd: "PING", kind: "bulk-string" }
        ));
    }
}
