//! Engine session handling
//!
//! The engine session is acquired lazily before each operation and renewed
//! once it is older than the configured lifetime.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::engine::{EngineError, VerifiedEngine};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}

pub struct Session {
    username: String,
    password: String,
    ttl: Duration,
    last_login: Mutex<Option<DateTime<Utc>>>,
}

impl Session {
    pub fn new(username: &str, password: &str, ttl: Duration) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            ttl,
            last_login: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn last_login(&self) -> Option<DateTime<Utc>> {
        *self.last_login.lock().await
    }

    /// Log in unless a login younger than the session lifetime exists.
    pub async fn acquire<E>(&self, engine: &E, clock: &dyn Clock) -> Result<(), EngineError>
    where
        E: VerifiedEngine + ?Sized,
    {
        let mut last_login = self.last_login.lock().await;
        let now = clock.now();
        let stale = match *last_login {
            Some(at) => at
                .checked_add_signed(self.ttl)
                .is_some_and(|expires| now > expires),
            None => true,
        };
        if stale {
            engine.login(&self.username, &self.password).await?;
            info!("Logged in to engine as {}", self.username);
            *last_login = Some(now);
        }
        Ok(())
    }

    /// Log out and forget the login so the next `acquire` starts fresh.
    pub async fn release<E>(&self, engine: &E) -> Result<(), EngineError>
    where
        E: VerifiedEngine + ?Sized,
    {
        let mut last_login = self.last_login.lock().await;
        if last_login.take().is_some() {
            engine.logout().await?;
            debug!("Logged out of engine");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_reuses_fresh_session() {
        let engine = MemoryEngine::new("immudb", "immudb");
        let clock = ManualClock::new(start());
        let session = Session::new("immudb", "immudb", Duration::minutes(30));

        session.acquire(&engine, &clock).await.unwrap();
        clock.advance(Duration::minutes(30));
        session.acquire(&engine, &clock).await.unwrap();
        assert_eq!(engine.login_count().await, 1);
    }

    #[tokio::test]
    async fn test_relogin_after_ttl() {
        let engine = MemoryEngine::new("immudb", "immudb");
        let clock = ManualClock::new(start());
        let session = Session::new("immudb", "immudb", Duration::minutes(30));

        session.acquire(&engine, &clock).await.unwrap();
        clock.advance(Duration::minutes(31));
        session.acquire(&engine, &clock).await.unwrap();
        assert_eq!(engine.login_count().await, 2);
        assert_eq!(
            session.last_login().await,
            Some(start() + Duration::minutes(31))
        );
    }

    #[tokio::test]
    async fn test_release_forces_new_login() {
        let engine = MemoryEngine::new("immudb", "immudb");
        let clock = ManualClock::new(start());
        let session = Session::new("immudb", "immudb", Duration::minutes(30));

        session.acquire(&engine, &clock).await.unwrap();
        session.release(&engine).await.unwrap();
        assert!(session.last_login().await.is_none());
        // releasing twice is a no-op
        session.release(&engine).await.unwrap();

        session.acquire(&engine, &clock).await.unwrap();
        assert_eq!(engine.login_count().await, 2);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_session_stale() {
        let engine = MemoryEngine::new("immudb", "immudb");
        let clock = ManualClock::new(start());
        let session = Session::new("immudb", "wrong", Duration::minutes(30));

        assert!(session.acquire(&engine, &clock).await.is_err());
        assert!(session.last_login().await.is_none());
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::new(start());
        let later = start() + Duration::days(2);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
