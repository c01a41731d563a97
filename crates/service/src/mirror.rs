//! Mirror Store: the in-memory [`Record`] kept in step with a flat keyspace.
//!
//! Writers update the record first and then persist to the field's key; a failed
//! write leaves the record updated and returns the error. Readers overwrite the
//! record field with what the store holds, or with the field's zero value when the
//! key is absent or the read fails, and return the explicit outcome.
//!
//! Every operation holds the record's write lock for its whole duration, remote
//! call included, so same-field writes and reads never interleave and `purge` is
//! atomic with respect to all of them.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use configs::StoreConfig;
use models::{decode_flag, encode_flag, Field, Record};

use crate::errors::ServiceError;
use crate::kv::{KvStore, RedisKv};

/// Handle to the live record. Readers observe every later write, including a purge.
pub type SharedRecord = Arc<RwLock<Record>>;

type Slot<T> = fn(&mut Record) -> &mut T;

pub struct MirrorStore {
    kv: Arc<dyn KvStore>,
    data: SharedRecord,
}

impl MirrorStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, data: Arc::new(RwLock::new(Record::default())) }
    }

    /// Redis-backed store. Does not connect; the first operation does.
    pub fn from_config(cfg: &StoreConfig) -> Self {
        Self::new(Arc::new(RedisKv::new(cfg.clone())))
    }

    pub fn backend(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// The live record behind every operation.
    ///
    /// Every mirror operation takes the write lock, so a task holding a guard from this
    /// handle must drop it before calling any `set_*`, `append_*`, `get_*` or `purge`, or
    /// it waits on itself. Use [`MirrorStore::snapshot`] to inspect without holding a lock.
    pub fn stored_data(&self) -> SharedRecord {
        self.data.clone()
    }

    /// Owned copy of the current record.
    pub async fn snapshot(&self) -> Record {
        self.data.read().await.clone()
    }

    /// Flush the whole keyspace, then zero the record.
    ///
    /// The record is zeroed even when the flush fails; the error is returned so the
    /// caller knows stale keys may remain.
    pub async fn purge(&self) -> Result<(), ServiceError> {
        let mut data = self.data.write().await;
        let flushed = self.kv.flush_all().await;
        *data = Record::default();
        match &flushed {
            Ok(()) => info!("mirror purged"),
            Err(e) => warn!(error = %e, "flush failed; record reset anyway"),
        }
        flushed
    }

    /// Re-read one field from the store, discarding the value.
    pub async fn refresh(&self, field: Field) -> Result<(), ServiceError> {
        match field {
            Field::DomainValue => self.get_domain().await.map(drop),
            Field::DomainIpv4 => self.get_domain_ipv4().await.map(drop),
            Field::DomainIpv6 => self.get_domain_ipv6().await.map(drop),
            Field::DomainSubdomains => self.get_domain_subdomains().await.map(drop),
            Field::WhoisTld => self.get_whois_tld().await.map(drop),
            Field::WhoisStatus => self.get_whois_status().await.map(drop),
            Field::WhoisCreated => self.get_whois_created().await.map(drop),
            Field::WhoisChanged => self.get_whois_changed().await.map(drop),
            Field::WhoisPhones => self.get_whois_phones().await.map(drop),
            Field::WhoisEmails => self.get_whois_emails().await.map(drop),
            Field::WebUrl => self.get_web_url().await.map(drop),
            Field::WebServer => self.get_web_server().await.map(drop),
            Field::WebRating => self.get_web_rating().await.map(drop),
            Field::WebRedirects => self.get_web_redirects().await.map(drop),
            Field::WebLinks => self.get_web_links().await.map(drop),
            Field::WebJs => self.get_web_js().await.map(drop),
        }
    }

    /// Re-read every field. Returns the fields whose read failed.
    pub async fn refresh_all(&self) -> Vec<(Field, ServiceError)> {
        let mut failed = Vec::new();
        for field in Field::ALL {
            if let Err(e) = self.refresh(field).await {
                failed.push((field, e));
            }
        }
        failed
    }

    // domain

    pub async fn set_domain(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::DomainValue, |r| &mut r.domain.value, value.into()).await
    }

    pub async fn set_domain_ipv4(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::DomainIpv4, |r| &mut r.domain.ipv4, value.into()).await
    }

    pub async fn set_domain_ipv6(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::DomainIpv6, |r| &mut r.domain.ipv6, value.into()).await
    }

    pub async fn append_domain_subdomains(&self, items: Vec<String>) -> Result<(), ServiceError> {
        self.append(Field::DomainSubdomains, |r| &mut r.domain.subdomains, items).await
    }

    pub async fn get_domain(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::DomainValue, |r| &mut r.domain.value).await
    }

    pub async fn get_domain_ipv4(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::DomainIpv4, |r| &mut r.domain.ipv4).await
    }

    pub async fn get_domain_ipv6(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::DomainIpv6, |r| &mut r.domain.ipv6).await
    }

    pub async fn get_domain_subdomains(&self) -> Result<Option<Vec<String>>, ServiceError> {
        self.read_list(Field::DomainSubdomains, |r| &mut r.domain.subdomains).await
    }

    // whois

    pub async fn set_whois_tld(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::WhoisTld, |r| &mut r.domain.whois.tld, value.into()).await
    }

    pub async fn set_whois_status(&self, value: bool) -> Result<(), ServiceError> {
        self.write_flag(Field::WhoisStatus, |r| &mut r.domain.whois.status, value).await
    }

    pub async fn set_whois_created(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::WhoisCreated, |r| &mut r.domain.whois.created, value.into()).await
    }

    pub async fn set_whois_changed(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::WhoisChanged, |r| &mut r.domain.whois.changed, value.into()).await
    }

    pub async fn append_whois_phones(&self, items: Vec<String>) -> Result<(), ServiceError> {
        self.append(Field::WhoisPhones, |r| &mut r.domain.whois.phones, items).await
    }

    pub async fn append_whois_emails(&self, items: Vec<String>) -> Result<(), ServiceError> {
        self.append(Field::WhoisEmails, |r| &mut r.domain.whois.emails, items).await
    }

    pub async fn get_whois_tld(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::WhoisTld, |r| &mut r.domain.whois.tld).await
    }

    pub async fn get_whois_status(&self) -> Result<Option<bool>, ServiceError> {
        self.read_flag(Field::WhoisStatus, |r| &mut r.domain.whois.status).await
    }

    pub async fn get_whois_created(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::WhoisCreated, |r| &mut r.domain.whois.created).await
    }

    pub async fn get_whois_changed(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::WhoisChanged, |r| &mut r.domain.whois.changed).await
    }

    pub async fn get_whois_phones(&self) -> Result<Option<Vec<String>>, ServiceError> {
        self.read_list(Field::WhoisPhones, |r| &mut r.domain.whois.phones).await
    }

    pub async fn get_whois_emails(&self) -> Result<Option<Vec<String>>, ServiceError> {
        self.read_list(Field::WhoisEmails, |r| &mut r.domain.whois.emails).await
    }

    // web

    pub async fn set_web_url(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::WebUrl, |r| &mut r.domain.web.url, value.into()).await
    }

    pub async fn set_web_server(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::WebServer, |r| &mut r.domain.web.server, value.into()).await
    }

    pub async fn set_web_rating(&self, value: impl Into<String>) -> Result<(), ServiceError> {
        self.write_scalar(Field::WebRating, |r| &mut r.domain.web.rating, value.into()).await
    }

    pub async fn append_web_redirects(&self, items: Vec<String>) -> Result<(), ServiceError> {
        self.append(Field::WebRedirects, |r| &mut r.domain.web.redirects, items).await
    }

    pub async fn append_web_links(&self, items: Vec<String>) -> Result<(), ServiceError> {
        self.append(Field::WebLinks, |r| &mut r.domain.web.links, items).await
    }

    pub async fn append_web_js(&self, items: Vec<String>) -> Result<(), ServiceError> {
        self.append(Field::WebJs, |r| &mut r.domain.web.js, items).await
    }

    pub async fn get_web_url(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::WebUrl, |r| &mut r.domain.web.url).await
    }

    pub async fn get_web_server(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::WebServer, |r| &mut r.domain.web.server).await
    }

    pub async fn get_web_rating(&self) -> Result<Option<String>, ServiceError> {
        self.read_scalar(Field::WebRating, |r| &mut r.domain.web.rating).await
    }

    pub async fn get_web_redirects(&self) -> Result<Option<Vec<String>>, ServiceError> {
        self.read_list(Field::WebRedirects, |r| &mut r.domain.web.redirects).await
    }

    pub async fn get_web_links(&self) -> Result<Option<Vec<String>>, ServiceError> {
        self.read_list(Field::WebLinks, |r| &mut r.domain.web.links).await
    }

    pub async fn get_web_js(&self) -> Result<Option<Vec<String>>, ServiceError> {
        self.read_list(Field::WebJs, |r| &mut r.domain.web.js).await
    }

    async fn write_scalar(&self, field: Field, slot: Slot<String>, value: String) -> Result<(), ServiceError> {
        let mut data = self.data.write().await;
        let target = slot(&mut *data);
        *target = value;
        let persisted = self.kv.set_string(field.key(), target.as_str()).await;
        log_write(field, &persisted);
        persisted
    }

    async fn write_flag(&self, field: Field, slot: Slot<bool>, value: bool) -> Result<(), ServiceError> {
        let mut data = self.data.write().await;
        *slot(&mut *data) = value;
        let persisted = self.kv.set_string(field.key(), encode_flag(value)).await;
        log_write(field, &persisted);
        persisted
    }

    async fn append(&self, field: Field, slot: Slot<Vec<String>>, items: Vec<String>) -> Result<(), ServiceError> {
        let mut data = self.data.write().await;
        let target = slot(&mut *data);
        *target = items;
        if target.is_empty() {
            debug!(field = field.path(), "empty batch, nothing to append");
            return Ok(());
        }
        let persisted = self.kv.append_list(field.key(), target.as_slice()).await;
        log_write(field, &persisted);
        persisted
    }

    async fn read_scalar(&self, field: Field, slot: Slot<String>) -> Result<Option<String>, ServiceError> {
        let mut data = self.data.write().await;
        let outcome = self.kv.get_string(field.key()).await;
        *slot(&mut *data) = match &outcome {
            Ok(Some(value)) => value.clone(),
            _ => String::new(),
        };
        log_read(field, &outcome);
        outcome
    }

    async fn read_flag(&self, field: Field, slot: Slot<bool>) -> Result<Option<bool>, ServiceError> {
        let mut data = self.data.write().await;
        let outcome = self
            .kv
            .get_string(field.key())
            .await
            .map(|raw| raw.map(|s| decode_flag(&s)));
        *slot(&mut *data) = matches!(outcome, Ok(Some(true)));
        log_read(field, &outcome);
        outcome
    }

    async fn read_list(&self, field: Field, slot: Slot<Vec<String>>) -> Result<Option<Vec<String>>, ServiceError> {
        let mut data = self.data.write().await;
        let outcome = self.kv.get_list_range(field.key(), 0, -1).await;
        *slot(&mut *data) = match &outcome {
            Ok(Some(items)) => items.clone(),
            _ => Vec::new(),
        };
        log_read(field, &outcome);
        outcome
    }
}

fn log_write(field: Field, result: &Result<(), ServiceError>) {
    match result {
        Ok(()) => debug!(field = field.path(), key = field.key(), "persisted"),
        Err(e) => warn!(field = field.path(), key = field.key(), error = %e, "write not persisted"),
    }
}

fn log_read<T>(field: Field, outcome: &Result<Option<T>, ServiceError>) {
    match outcome {
        Ok(Some(_)) => debug!(field = field.path(), key = field.key(), "loaded"),
        Ok(None) => debug!(field = field.path(), key = field.key(), "absent, reset to default"),
        Err(e) => warn!(field = field.path(), key = field.key(), error = %e, "read failed, reset to default"),
    }
}
