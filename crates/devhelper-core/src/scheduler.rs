//! Periodic reminder and reclaim sweeps
//!
//! Four independent jobs run on their own intervals: domain reminders, domain
//! reclaim, VPN reminders and VPN reclaim. A sweep always runs to completion
//! against the batch it fetched; shutdown is only observed between sweeps.

use crate::dedup::{notice_key, FlagCache, Namespace};
use crate::domain::DomainManager;
use crate::error::{BatchFailure, LifecycleError, Result};
use crate::expiry::{Clock, SystemClock};
use crate::notifier::{mention, Notifier};
use crate::vpn::VpnManager;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Channel that receives public notices and admin alerts
    pub channel: String,
    /// User ids mentioned when a reclaim sweep partially fails
    pub admin_ids: Vec<String>,
    pub domain_interval: Duration,
    pub vpn_interval: Duration,
    /// Hour (in `utc_offset`) the first daily domain sweep is aligned to
    pub notify_hour: u32,
    pub utc_offset: FixedOffset,
    /// Run domain jobs every minute, starting immediately
    pub debug: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            channel: "general".to_string(),
            admin_ids: Vec::new(),
            domain_interval: Duration::from_secs(24 * 60 * 60),
            vpn_interval: Duration::from_secs(60),
            notify_hour: crate::domain::DEFAULT_NOTIFY_HOUR,
            utc_offset: Utc.fix(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    DomainReminder,
    DomainReclaim,
    VpnReminder,
    VpnReclaim,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::DomainReminder => "domain-reminder",
            Job::DomainReclaim => "domain-reclaim",
            Job::VpnReminder => "vpn-reminder",
            Job::VpnReclaim => "vpn-reclaim",
        }
    }
}

pub struct Scheduler {
    domains: Arc<DomainManager>,
    vpn: Option<Arc<VpnManager>>,
    notifier: Arc<dyn Notifier>,
    flags: Arc<dyn FlagCache>,
    settings: SchedulerSettings,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        domains: Arc<DomainManager>,
        vpn: Option<Arc<VpnManager>>,
        notifier: Arc<dyn Notifier>,
        flags: Arc<dyn FlagCache>,
    ) -> Self {
        Self {
            domains,
            vpn,
            notifier,
            flags,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Spawn one task per job; each stops at the next tick after `shutdown` fires
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let (domain_period, domain_delay) = if self.settings.debug {
            (Duration::from_secs(60), Duration::ZERO)
        } else {
            (
                self.settings.domain_interval,
                delay_until_hour(
                    self.clock.now(),
                    self.settings.notify_hour,
                    self.settings.utc_offset,
                ),
            )
        };

        let mut jobs = vec![
            (Job::DomainReminder, domain_period, domain_delay),
            (Job::DomainReclaim, domain_period, domain_delay),
        ];
        if self.vpn.is_some() {
            jobs.push((Job::VpnReminder, self.settings.vpn_interval, Duration::ZERO));
            jobs.push((Job::VpnReclaim, self.settings.vpn_interval, Duration::ZERO));
        }

        jobs.into_iter()
            .map(|(job, period, delay)| {
                info!(job = job.name(), ?period, ?delay, "Scheduling job");
                self.clone().spawn_job(job, period, delay, shutdown.clone())
            })
            .collect()
    }

    fn spawn_job(
        self: Arc<Self>,
        job: Job,
        period: Duration,
        delay: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!(job = job.name(), "Job stopped");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                match self.run(job).await {
                    Ok(handled) if handled > 0 => {
                        info!(job = job.name(), handled, "Sweep finished")
                    }
                    Ok(_) => debug!(job = job.name(), "Sweep finished, nothing to do"),
                    Err(err) => error!(job = job.name(), error = %err, "Sweep failed"),
                }
            }
        })
    }

    pub async fn run(&self, job: Job) -> Result<usize> {
        match job {
            Job::DomainReminder => self.run_domain_reminders_once().await,
            Job::DomainReclaim => self.run_domain_reclaim_once().await,
            Job::VpnReminder => self.run_vpn_reminders_once().await,
            Job::VpnReclaim => self.run_vpn_reclaim_once().await,
        }
    }

    /// Notify owners of domains expiring soon, at most once per deadline
    ///
    /// The notice counts as delivered when either the channel post or the
    /// direct message went out; otherwise the next sweep retries both.
    pub async fn run_domain_reminders_once(&self) -> Result<usize> {
        let mut sent = 0;
        for domain in self.domains.expiring_soon().await? {
            let key = notice_key(&domain.owner_id, domain.delete_at);
            if !self.needs_notice(Namespace::DomainExpiry, &key).await {
                continue;
            }

            let text = format!(
                "Your domain {} scheduled to delete at {}.",
                domain.fqdn,
                self.local_time(domain.delete_at)
            );
            let public = self
                .post_channel(&format!("{}{}", mention(&domain.owner_id), text))
                .await;
            let direct = self.post_direct(&domain.owner_id, &text).await;
            if public || direct {
                self.mark(Namespace::DomainExpiry, &key).await;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Reclaim expired domains and tell their owners
    pub async fn run_domain_reclaim_once(&self) -> Result<usize> {
        match self.domains.delete_expired().await {
            Ok(reclaimed) => {
                for domain in &reclaimed {
                    let text = format!("Your domain {} deleted.", domain.fqdn);
                    self.post_channel(&format!("{}{}", mention(&domain.owner_id), text))
                        .await;
                    self.post_direct(&domain.owner_id, &text).await;
                    self.unmark(Namespace::DomainExpiry, &domain.owner_id).await;
                }
                Ok(reclaimed.len())
            }
            Err(LifecycleError::Batch(batch)) => {
                self.handle_batch_failure(Namespace::DomainExpiry, &batch).await;
                Err(LifecycleError::Batch(batch))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn run_vpn_reminders_once(&self) -> Result<usize> {
        let Some(vpn) = &self.vpn else {
            return Ok(0);
        };

        let mut sent = 0;
        for account in vpn.expiring_soon().await? {
            let key = notice_key(&account.user_email, account.deactivate_at);
            if !self.needs_notice(Namespace::VpnExpiry, &key).await {
                continue;
            }
            let text = format!(
                "Your VPN account scheduled for deactivation at {}.",
                self.local_time(account.deactivate_at)
            );
            if self.post_direct(&account.owner_id, &text).await {
                self.mark(Namespace::VpnExpiry, &key).await;
                sent += 1;
            }
        }
        Ok(sent)
    }

    pub async fn run_vpn_reclaim_once(&self) -> Result<usize> {
        let Some(vpn) = &self.vpn else {
            return Ok(0);
        };

        match vpn.deactivate_expired().await {
            Ok(deactivated) => {
                for account in &deactivated {
                    self.post_direct(&account.owner_id, "Your VPN account deactivated.")
                        .await;
                    self.unmark(Namespace::VpnExpiry, &account.user_email).await;
                }
                Ok(deactivated.len())
            }
            Err(LifecycleError::Batch(batch)) => {
                self.handle_batch_failure(Namespace::VpnExpiry, &batch).await;
                Err(LifecycleError::Batch(batch))
            }
            Err(err) => Err(err),
        }
    }

    // Admins hear about the failure; owners of reclaimed resources are not told
    async fn handle_batch_failure(&self, namespace: Namespace, batch: &BatchFailure) {
        let mentions: String = self
            .settings
            .admin_ids
            .iter()
            .map(|id| format!("{} ", mention(id)))
            .collect();
        self.post_channel(&format!("{}{}.", mentions, batch)).await;

        for key in &batch.reclaimed {
            self.unmark(namespace, key).await;
        }
    }

    async fn needs_notice(&self, namespace: Namespace, key: &str) -> bool {
        match self.flags.has_flag(namespace, key).await {
            Ok(flagged) => !flagged,
            Err(err) => {
                warn!(%namespace, key, error = %err, "Cannot read notice flag, skipping");
                false
            }
        }
    }

    async fn mark(&self, namespace: Namespace, key: &str) {
        if let Err(err) = self.flags.set_flag(namespace, key).await {
            error!(%namespace, key, error = %err, "Failed to set notice flag");
        }
    }

    // Drops the flags of every deadline the resource ever had
    async fn unmark(&self, namespace: Namespace, resource: &str) {
        if let Err(err) = self.flags.clear_resource(namespace, resource).await {
            error!(%namespace, resource, error = %err, "Failed to clear notice flags");
        }
    }

    async fn post_channel(&self, text: &str) -> bool {
        self.post(&self.settings.channel, text).await
    }

    async fn post_direct(&self, user_id: &str, text: &str) -> bool {
        self.post(user_id, text).await
    }

    async fn post(&self, target: &str, text: &str) -> bool {
        match self.notifier.post(target, text).await {
            Ok(()) => true,
            Err(err) => {
                error!(recipient = target, error = %err, "Failed to post notice");
                false
            }
        }
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.settings.utc_offset)
            .format(TIME_FORMAT)
            .to_string()
    }
}

/// Time from `now` until the next `hour` o'clock in `offset`
pub fn delay_until_hour(now: DateTime<Utc>, hour: u32, offset: FixedOffset) -> Duration {
    let local = now.with_timezone(&offset);
    let Some(today) = local
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
    else {
        return Duration::ZERO;
    };

    let next = if today > local {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - local).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::MockAccountApi;
    use crate::dedup::MemoryFlagCache;
    use crate::domain::DomainSettings;
    use crate::error::AccountError;
    use crate::expiry::FixedClock;
    use crate::model::VpnAccount;
    use crate::repository::VpnRepository;
    use crate::testing::{
        MemoryDomainRepository, MemoryReconciler, MemoryVpnRepository, RecordingNotifier,
    };
    use crate::vpn::VpnSettings;
    use devhelper_policy::NetworkPolicy;
    use mockall::predicate::eq;
    use uuid::Uuid;

    const EMAIL: &str = "ann@example.com";

    struct Harness {
        scheduler: Arc<Scheduler>,
        domains: Arc<DomainManager>,
        reconciler: Arc<MemoryReconciler>,
        sessions: Arc<MemoryVpnRepository>,
        notifier: Arc<RecordingNotifier>,
        flags: Arc<MemoryFlagCache>,
        clock: Arc<FixedClock>,
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn harness() -> Harness {
        build(None)
    }

    fn vpn_harness(api: MockAccountApi) -> Harness {
        build(Some(api))
    }

    fn build(api: Option<MockAccountApi>) -> Harness {
        let clock = Arc::new(FixedClock::new(start()));
        let sessions = Arc::new(MemoryVpnRepository::default());
        let vpn = api.map(|api| {
            Arc::new(
                VpnManager::new(VpnSettings::default(), Arc::new(api), sessions.clone())
                    .with_clock(clock.clone()),
            )
        });
        let policy = NetworkPolicy::from_config(&["10.1.0.0/16".to_string()], &[]).unwrap();
        let reconciler = Arc::new(MemoryReconciler::default());
        let domains = Arc::new(
            DomainManager::new(
                DomainSettings::new("dev.example", policy),
                Arc::new(MemoryDomainRepository::default()),
                reconciler.clone(),
            )
            .with_clock(clock.clone()),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let flags = Arc::new(MemoryFlagCache::new());
        let settings = SchedulerSettings {
            channel: "devops".into(),
            admin_ids: vec!["ADMIN".into()],
            ..SchedulerSettings::default()
        };
        let scheduler = Arc::new(
            Scheduler::new(settings, domains.clone(), vpn, notifier.clone(), flags.clone())
                .with_clock(clock.clone()),
        );
        Harness {
            scheduler,
            domains,
            reconciler,
            sessions,
            notifier,
            flags,
            clock,
        }
    }

    #[tokio::test]
    async fn test_reminder_sent_once() {
        let h = harness();
        h.domains.create("U1", "Ann Lee", "10.1.2.5").await.unwrap();
        h.clock.advance(chrono::Duration::days(13) + chrono::Duration::hours(12));

        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 1);
        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 0);

        assert_eq!(
            h.notifier.sent_to("U1"),
            vec!["Your domain a-lee.dev.example scheduled to delete at 2024-03-15 09:00."]
        );
        assert_eq!(
            h.notifier.sent_to("devops"),
            vec!["<@U1>Your domain a-lee.dev.example scheduled to delete at 2024-03-15 09:00."]
        );
        let domain = h.domains.get("U1").await.unwrap();
        assert!(h
            .flags
            .has_flag(Namespace::DomainExpiry, &notice_key("U1", domain.delete_at))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_renewed_domain_is_reminded_again() {
        let h = harness();
        h.domains.create("U1", "Ann Lee", "10.1.2.5").await.unwrap();
        h.clock.advance(chrono::Duration::days(13) + chrono::Duration::hours(12));
        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 1);

        h.domains.update("U1", "expire", "").await.unwrap();
        h.clock.advance(chrono::Duration::days(13) + chrono::Duration::hours(12));
        assert_eq!(h.domains.expiring_soon().await.unwrap().len(), 1);
        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 1);
        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 0);

        assert_eq!(h.notifier.sent_to("U1").len(), 2);
    }

    #[tokio::test]
    async fn test_failed_notice_is_retried() {
        let h = harness();
        h.domains.create("U1", "Ann Lee", "10.1.2.5").await.unwrap();
        h.clock.advance(chrono::Duration::days(13) + chrono::Duration::hours(12));

        h.notifier.fail_for("U1", true);
        h.notifier.fail_for("devops", true);
        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 0);
        assert!(h.flags.is_empty());

        h.notifier.fail_for("U1", false);
        h.notifier.fail_for("devops", false);
        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_channel_reminder_not_repeated_when_dm_fails() {
        let h = harness();
        h.domains.create("U1", "Ann Lee", "10.1.2.5").await.unwrap();
        h.clock.advance(chrono::Duration::days(13) + chrono::Duration::hours(12));
        h.notifier.fail_for("U1", true);

        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 1);
        assert_eq!(h.scheduler.run_domain_reminders_once().await.unwrap(), 0);
        assert_eq!(h.notifier.sent_to("devops").len(), 1);
        assert!(h.notifier.sent_to("U1").is_empty());
    }

    #[tokio::test]
    async fn test_reclaim_notifies_and_clears_flag() {
        let h = harness();
        let domain = h.domains.create("U1", "Ann Lee", "10.1.2.5").await.unwrap();
        h.flags
            .set_flag(Namespace::DomainExpiry, &notice_key("U1", domain.delete_at))
            .await
            .unwrap();
        h.clock.advance(chrono::Duration::days(15));

        assert_eq!(h.scheduler.run_domain_reclaim_once().await.unwrap(), 1);
        assert_eq!(
            h.notifier.sent_to("U1"),
            vec!["Your domain a-lee.dev.example deleted."]
        );
        assert!(h.flags.is_empty());
        assert!(!h.reconciler.exists_now("a-lee.dev.example"));
    }

    #[tokio::test]
    async fn test_partial_reclaim_alerts_admins_only() {
        let h = harness();
        let ann = h.domains.create("U1", "Ann Lee", "10.1.2.5").await.unwrap();
        let bob = h.domains.create("U2", "Bob Ray", "10.1.2.6").await.unwrap();
        let ann_key = notice_key("U1", ann.delete_at);
        let bob_key = notice_key("U2", bob.delete_at);
        h.flags.set_flag(Namespace::DomainExpiry, &ann_key).await.unwrap();
        h.flags.set_flag(Namespace::DomainExpiry, &bob_key).await.unwrap();
        h.reconciler.fail_delete_for("b-ray.dev.example");
        h.clock.advance(chrono::Duration::days(15));

        let err = h.scheduler.run_domain_reclaim_once().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Batch(_)));

        let channel = h.notifier.sent_to("devops");
        assert_eq!(channel.len(), 1);
        assert!(channel[0].starts_with("<@ADMIN> "));
        assert!(channel[0].contains("b-ray.dev.example"));
        assert!(h.notifier.sent_to("U1").is_empty());
        assert!(h.notifier.sent_to("U2").is_empty());

        assert!(!h
            .flags
            .has_flag(Namespace::DomainExpiry, &ann_key)
            .await
            .unwrap());
        assert!(h
            .flags
            .has_flag(Namespace::DomainExpiry, &bob_key)
            .await
            .unwrap());
    }

    fn session(email: &str, owner_id: &str, deactivate_at: DateTime<Utc>) -> VpnAccount {
        VpnAccount {
            id: Uuid::new_v4(),
            user_name: "ann".into(),
            user_email: email.into(),
            owner_id: owner_id.into(),
            created_at: start(),
            deactivate_at,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_vpn_reminder_once_per_session() {
        let h = vpn_harness(MockAccountApi::new());
        let first = session(EMAIL, "U1", start() + chrono::Duration::minutes(5));
        h.sessions.insert(first.clone());

        assert_eq!(h.scheduler.run(Job::VpnReminder).await.unwrap(), 1);
        assert_eq!(h.scheduler.run(Job::VpnReminder).await.unwrap(), 0);
        assert_eq!(
            h.notifier.sent_to("U1"),
            vec!["Your VPN account scheduled for deactivation at 2024-03-01 10:05."]
        );
        assert!(h.notifier.sent_to("devops").is_empty());
        assert!(h
            .flags
            .has_flag(Namespace::VpnExpiry, &notice_key(EMAIL, first.deactivate_at))
            .await
            .unwrap());

        // a new session for the same email gets its own reminder
        h.sessions.set_inactive(first.id).await.unwrap();
        h.sessions
            .insert(session(EMAIL, "U1", start() + chrono::Duration::minutes(8)));
        assert_eq!(h.scheduler.run(Job::VpnReminder).await.unwrap(), 1);
        assert_eq!(h.notifier.sent_to("U1").len(), 2);
    }

    #[tokio::test]
    async fn test_vpn_reminder_retried_after_failed_dm() {
        let h = vpn_harness(MockAccountApi::new());
        h.sessions
            .insert(session(EMAIL, "U1", start() + chrono::Duration::minutes(5)));

        h.notifier.fail_for("U1", true);
        assert_eq!(h.scheduler.run(Job::VpnReminder).await.unwrap(), 0);
        assert!(h.flags.is_empty());

        h.notifier.fail_for("U1", false);
        assert_eq!(h.scheduler.run(Job::VpnReminder).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vpn_reclaim_notifies_owner_and_clears_flag() {
        let mut api = MockAccountApi::new();
        api.expect_set_user_disabled()
            .with(eq(EMAIL), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        let h = vpn_harness(api);

        let expiring = session(EMAIL, "U1", start() + chrono::Duration::minutes(5));
        h.sessions.insert(expiring.clone());
        assert_eq!(h.scheduler.run(Job::VpnReminder).await.unwrap(), 1);

        h.clock.advance(chrono::Duration::minutes(6));
        assert_eq!(h.scheduler.run(Job::VpnReclaim).await.unwrap(), 1);
        assert_eq!(
            h.notifier.sent_to("U1").last().map(String::as_str),
            Some("Your VPN account deactivated.")
        );
        assert!(h.flags.is_empty());
        assert!(h.sessions.active_for(EMAIL).is_empty());
        assert!(h.notifier.sent_to("devops").is_empty());
    }

    #[tokio::test]
    async fn test_vpn_partial_reclaim_alerts_admins_only() {
        let mut api = MockAccountApi::new();
        api.expect_set_user_disabled()
            .with(eq("bob@example.com"), eq(true))
            .returning(|_, _| {
                Err(AccountError::Status {
                    status: 500,
                    body: "internal".into(),
                })
            });
        api.expect_set_user_disabled()
            .with(eq(EMAIL), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        let h = vpn_harness(api);

        let ann = session(EMAIL, "U1", start() - chrono::Duration::minutes(1));
        let bob = session("bob@example.com", "U2", start() - chrono::Duration::minutes(1));
        let ann_key = notice_key(EMAIL, ann.deactivate_at);
        let bob_key = notice_key("bob@example.com", bob.deactivate_at);
        h.sessions.insert(ann);
        h.sessions.insert(bob);
        h.flags.set_flag(Namespace::VpnExpiry, &ann_key).await.unwrap();
        h.flags.set_flag(Namespace::VpnExpiry, &bob_key).await.unwrap();

        let err = h.scheduler.run(Job::VpnReclaim).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Batch(_)));

        let channel = h.notifier.sent_to("devops");
        assert_eq!(channel.len(), 1);
        assert!(channel[0].starts_with("<@ADMIN> "));
        assert!(channel[0].contains("bob@example.com"));
        assert!(h.notifier.sent_to("U1").is_empty());
        assert!(h.notifier.sent_to("U2").is_empty());

        assert!(!h.flags.has_flag(Namespace::VpnExpiry, &ann_key).await.unwrap());
        assert!(h.flags.has_flag(Namespace::VpnExpiry, &bob_key).await.unwrap());
        assert_eq!(h.sessions.active_for("bob@example.com").len(), 1);
    }

    #[tokio::test]
    async fn test_vpn_jobs_without_vpn_manager() {
        let h = harness();
        assert_eq!(h.scheduler.run(Job::VpnReminder).await.unwrap(), 0);
        assert_eq!(h.scheduler.run(Job::VpnReclaim).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_stop_on_shutdown() {
        let h = harness();
        let shutdown = CancellationToken::new();
        let handles = h.scheduler.clone().start(shutdown.clone());
        assert_eq!(handles.len(), 2);

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[test]
    fn test_delay_until_hour() {
        let utc = Utc.fix();
        let before = DateTime::parse_from_rfc3339("2024-03-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(delay_until_hour(before, 9, utc), Duration::from_secs(30 * 60));

        let after = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(delay_until_hour(after, 9, utc), Duration::from_secs(24 * 3600));

        let kyiv = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(delay_until_hour(before, 11, kyiv), Duration::from_secs(30 * 60));
    }
}
