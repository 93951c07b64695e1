//! In-memory collaborators for unit tests

use crate::error::{NotifyError, ReconcileError, RepositoryError};
use crate::model::{Domain, VpnAccount};
use crate::notifier::Notifier;
use crate::reconciler::ProxyReconciler;
use crate::repository::{DomainRepository, VpnRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryDomainRepository {
    records: Mutex<HashMap<String, Domain>>,
    fail_writes: AtomicBool,
    vanish_on_update: AtomicBool,
}

impl MemoryDomainRepository {
    pub fn insert(&self, domain: Domain) {
        self.records
            .lock()
            .unwrap()
            .insert(domain.fqdn.clone(), domain);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn vanish_on_update(&self, vanish: bool) {
        self.vanish_on_update.store(vanish, Ordering::SeqCst);
    }
}

#[async_trait]
impl DomainRepository for MemoryDomainRepository {
    async fn create_domain(&self, domain: &Domain) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("write refused".into()));
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&domain.fqdn)
            || records.values().any(|d| d.owner_id == domain.owner_id)
        {
            return Err(RepositoryError::Duplicate(domain.fqdn.clone()));
        }
        records.insert(domain.fqdn.clone(), domain.clone());
        Ok(())
    }

    async fn get_domain_by_owner(&self, owner_id: &str) -> Result<Domain, RepositoryError> {
        self.records
            .lock()
            .unwrap()
            .values()
            .find(|d| d.owner_id == owner_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_domain(&self, domain: &Domain) -> Result<(), RepositoryError> {
        if self.vanish_on_update.load(Ordering::SeqCst) {
            return Err(RepositoryError::NoRowsAffected);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("write refused".into()));
        }
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&domain.fqdn) {
            Some(existing) => {
                *existing = domain.clone();
                Ok(())
            }
            None => Err(RepositoryError::NoRowsAffected),
        }
    }

    async fn delete_domain_by_fqdn(&self, fqdn: &str) -> Result<(), RepositoryError> {
        match self.records.lock().unwrap().remove(fqdn) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NoRowsAffected),
        }
    }

    async fn list_domains_due_by(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<Domain>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.delete_at <= deadline)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryVpnRepository {
    records: Mutex<Vec<VpnAccount>>,
}

impl MemoryVpnRepository {
    pub fn all(&self) -> Vec<VpnAccount> {
        self.records.lock().unwrap().clone()
    }

    pub fn insert(&self, account: VpnAccount) {
        self.records.lock().unwrap().push(account);
    }

    pub fn active_for(&self, email: &str) -> Vec<VpnAccount> {
        self.all()
            .into_iter()
            .filter(|a| a.active && a.user_email == email)
            .collect()
    }
}

#[async_trait]
impl VpnRepository for MemoryVpnRepository {
    async fn create_account(&self, account: &VpnAccount) -> Result<(), RepositoryError> {
        self.records.lock().unwrap().push(account.clone());
        Ok(())
    }

    async fn get_active_by_email(&self, email: &str) -> Result<VpnAccount, RepositoryError> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.active && a.user_email == email)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_inactive(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|a| a.id == id) {
            Some(account) => {
                account.active = false;
                Ok(())
            }
            None => Err(RepositoryError::NoRowsAffected),
        }
    }

    async fn list_active_due_by(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<VpnAccount>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.active && a.deactivate_at <= deadline)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryReconciler {
    configs: Mutex<HashMap<String, Domain>>,
    failing_deletes: Mutex<HashSet<String>>,
    fail_replace: AtomicBool,
    replace_delay: Mutex<Option<Duration>>,
    replaces: AtomicUsize,
    replacing: AtomicUsize,
    max_replacing: AtomicUsize,
}

impl MemoryReconciler {
    pub fn exists_now(&self, fqdn: &str) -> bool {
        self.configs.lock().unwrap().contains_key(fqdn)
    }

    pub fn rendered(&self, fqdn: &str) -> Option<Domain> {
        self.configs.lock().unwrap().get(fqdn).cloned()
    }

    pub fn forget(&self, fqdn: &str) {
        self.configs.lock().unwrap().remove(fqdn);
    }

    pub fn fail_delete_for(&self, fqdn: &str) {
        self.failing_deletes.lock().unwrap().insert(fqdn.to_string());
    }

    pub fn fail_replace(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::SeqCst);
    }

    pub fn slow_replace(&self, delay: Duration) {
        *self.replace_delay.lock().unwrap() = Some(delay);
    }

    pub fn replace_count(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_replaces(&self) -> usize {
        self.max_replacing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyReconciler for MemoryReconciler {
    async fn create(&self, domain: &Domain) -> Result<(), ReconcileError> {
        let mut configs = self.configs.lock().unwrap();
        if configs.contains_key(&domain.fqdn) {
            return Err(ReconcileError::ConfigAlreadyExists(domain.fqdn.clone()));
        }
        configs.insert(domain.fqdn.clone(), domain.clone());
        Ok(())
    }

    async fn delete(&self, fqdn: &str) -> Result<(), ReconcileError> {
        if self.failing_deletes.lock().unwrap().contains(fqdn) {
            return Err(ReconcileError::Io(std::io::Error::other("permission denied")));
        }
        match self.configs.lock().unwrap().remove(fqdn) {
            Some(_) => Ok(()),
            None => Err(ReconcileError::ConfigMissing(fqdn.to_string())),
        }
    }

    async fn replace(&self, previous: &Domain, next: &Domain) -> Result<(), ReconcileError> {
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(ReconcileError::Reload {
                command: "nginx -t".into(),
                stderr: "test failed".into(),
            });
        }

        let now = self.replacing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_replacing.fetch_max(now, Ordering::SeqCst);
        let delay = *self.replace_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut configs = self.configs.lock().unwrap();
            configs.remove(&previous.fqdn);
            configs.insert(next.fqdn.clone(), next.clone());
        }
        self.replacing.fetch_sub(1, Ordering::SeqCst);
        self.replaces.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, fqdn: &str) -> Result<bool, ReconcileError> {
        Ok(self.exists_now(fqdn))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing_targets: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, target: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(t, _)| t == target)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn fail_for(&self, target: &str, fail: bool) {
        let mut failing = self.failing_targets.lock().unwrap();
        if fail {
            failing.insert(target.to_string());
        } else {
            failing.remove(target);
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(&self, target: &str, text: &str) -> Result<(), NotifyError> {
        if self.failing_targets.lock().unwrap().contains(target) {
            return Err(NotifyError::Transport("channel_not_found".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((target.to_string(), text.to_string()));
        Ok(())
    }
}
