//! In-memory directory for tests.
//! Used by: directory::verifier tests, server tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ldap3::ldap_escape;

use crate::directory::{DirectoryConnector, DirectoryEntry, DirectorySession, SessionError};

const INVALID_CREDENTIALS: &str = "rc=49 invalidCredentials";

#[derive(Clone)]
struct User {
    entry: DirectoryEntry,
    password: String,
}

/// Understands only `(attr=value)` equality filters, which is all the verifier sends.
#[derive(Clone)]
pub struct MemoryDirectory {
    service_dn: String,
    service_password: String,
    users: Vec<User>,
    reachable: bool,
    latency: Option<Duration>,
    operations: Arc<Mutex<Vec<String>>>,
}

impl MemoryDirectory {
    pub fn new(service_dn: &str, service_password: &str) -> Self {
        Self {
            service_dn: service_dn.into(),
            service_password: service_password.into(),
            users: Vec::new(),
            reachable: true,
            latency: None,
            operations: Arc::default(),
        }
    }

    pub fn with_user(mut self, dn: &str, password: &str, attrs: &[(&str, &[&str])]) -> Self {
        let attrs: HashMap<String, Vec<String>> = attrs
            .iter()
            .map(|(name, values)| {
                (name.to_string(), values.iter().map(|v| v.to_string()).collect())
            })
            .collect();
        self.users.push(User {
            entry: DirectoryEntry {
                dn: dn.into(),
                attrs,
            },
            password: password.into(),
        });
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Delay applied before every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Log of every operation performed through any session.
    pub fn operations(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.operations)
    }
}

struct MemorySession {
    directory: MemoryDirectory,
    bound: bool,
}

impl MemoryDirectory {
    async fn record(&self, op: String) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.operations.lock().unwrap().push(op);
    }
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, SessionError> {
        if !self.reachable {
            return Err(SessionError::Transport("connection refused".into()));
        }
        self.record("connect".into()).await;
        Ok(Box::new(MemorySession {
            directory: self.clone(),
            bound: false,
        }))
    }
}

#[async_trait]
impl DirectorySession for MemorySession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), SessionError> {
        let dir = &self.directory;
        dir.record(format!("bind {dn}")).await;
        let accepted = (dn == dir.service_dn && password == dir.service_password)
            || dir
                .users
                .iter()
                .any(|u| u.entry.dn == dn && u.password == password);
        self.bound = accepted;
        if accepted {
            Ok(())
        } else {
            Err(SessionError::Rejected(INVALID_CREDENTIALS.into()))
        }
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        _attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, SessionError> {
        self.directory.record(format!("search {filter}")).await;
        if !self.bound {
            return Err(SessionError::Rejected("rc=50 insufficientAccessRights".into()));
        }
        let (attr, value) = filter
            .strip_prefix('(')
            .and_then(|f| f.strip_suffix(')'))
            .and_then(|f| f.split_once('='))
            .ok_or_else(|| SessionError::Rejected(format!("unsupported filter {filter}")))?;

        Ok(self
            .directory
            .users
            .iter()
            .filter(|u| u.entry.dn.ends_with(base_dn))
            .filter(|u| u.entry.values(attr).iter().any(|v| ldap_escape(v.as_str()) == value))
            .map(|u| u.entry.clone())
            .collect())
    }

    async fn unbind(&mut self) -> Result<(), SessionError> {
        self.directory.record("unbind".into()).await;
        self.bound = false;
        Ok(())
    }
}
