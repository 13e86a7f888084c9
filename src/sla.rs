//! Deadline scan. Runs once per navigation for the current user, writes
//! notification records through the ledger and returns nothing: a tick
//! that never runs only delays alerts, a tick that runs twice changes
//! nothing.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::calendar;
use crate::ledger::{self, NoticeDraft};
use crate::models::{
    Employee, Estimate, Tender, User, APPROVAL_QUESTION, APPROVAL_REWORK, APPROVAL_SENT,
};
use crate::rules::{
    self, evaluate, DeadlineRule, DeadlineRuleSet, Firing, RuleKind, SlaSettings, TickContext,
    ROLE_HR, ROLE_PM,
};
use crate::store::CrmStore;

pub const SETTINGS_KEY_SLA: &str = "sla";

/// Entry point for the navigation hook: captures the clock once and
/// never surfaces an error to the caller.
pub async fn run_tick(store: &dyn CrmStore, actor: &User) {
    run_tick_at(store, actor, TickContext::current()).await;
}

pub async fn run_tick_at(store: &dyn CrmStore, actor: &User, ctx: TickContext) {
    if !actor.is_active {
        return;
    }

    let settings = match store.load_setting(SETTINGS_KEY_SLA).await {
        Ok(value) => SlaSettings::from_value(value.as_ref()),
        Err(err) => {
            warn!(error = %err, "SLA settings unavailable, using defaults");
            SlaSettings::default()
        }
    };

    let Some(scan) = TickScan::load(store).await else {
        return;
    };

    let rule_set = DeadlineRuleSet::from_settings(&settings);
    for rule in &rule_set.rules {
        let items = collect_items(rule.kind, &scan);
        run_rule(store, rule, &items, &scan.users, &ctx).await;
    }

    office_birthdays(store, &settings, &scan, &ctx).await;
    crew_birthdays(store, &settings, &scan, &ctx).await;
}

/// Collections read once at the start of the tick. Each later
/// evaluation is independent; an unreadable collection only silences
/// its own rules.
struct TickScan {
    users: Vec<User>,
    tenders: Vec<Tender>,
    estimates: Vec<Estimate>,
    employees: Vec<Employee>,
}

impl TickScan {
    async fn load(store: &dyn CrmStore) -> Option<Self> {
        let users = match store.list_active_users().await {
            Ok(users) => users,
            Err(err) => {
                warn!(error = %err, "user roster unavailable, skipping tick");
                return None;
            }
        };
        let tenders = store.list_tenders().await.unwrap_or_else(|err| {
            warn!(error = %err, "tender scan unavailable this tick");
            Vec::new()
        });
        let estimates = store.list_estimates().await.unwrap_or_else(|err| {
            warn!(error = %err, "estimate scan unavailable this tick");
            Vec::new()
        });
        let employees = store.list_active_employees().await.unwrap_or_else(|err| {
            warn!(error = %err, "employee scan unavailable this tick");
            Vec::new()
        });
        Some(Self {
            users,
            tenders,
            estimates,
            employees,
        })
    }

    fn tender_label(&self, tender_id: Uuid) -> String {
        self.tenders
            .iter()
            .find(|t| t.id == tender_id)
            .map(|t| t.customer.clone())
            .unwrap_or_else(|| tender_id.to_string())
    }
}

/// An entity projected into the fields the generic rule machinery
/// needs. The raw base date stays unparsed until evaluation so a broken
/// value skips exactly one entity.
struct TrackedItem {
    entity_id: Uuid,
    label: String,
    base: Option<String>,
    satisfied: bool,
    responsible: Option<Uuid>,
    link: &'static str,
}

fn collect_items(kind: RuleKind, scan: &TickScan) -> Vec<TrackedItem> {
    match kind {
        RuleKind::DocsDeadline => scan
            .tenders
            .iter()
            .filter(|tender| tender.docs_deadline.is_some())
            .map(|tender| TrackedItem {
                entity_id: tender.id,
                label: tender.customer.clone(),
                base: tender.docs_deadline.clone(),
                satisfied: false,
                responsible: tender.responsible_pm_id,
                link: "/tenders",
            })
            .collect(),
        RuleKind::EstimateDue => {
            let mut by_tender: HashMap<Uuid, Vec<&Estimate>> = HashMap::new();
            for estimate in &scan.estimates {
                by_tender.entry(estimate.tender_id).or_default().push(estimate);
            }
            scan.tenders
                .iter()
                .filter_map(|tender| {
                    tender.handoff_at.as_ref()?;
                    let pm_id = tender.responsible_pm_id?;
                    let pm = scan
                        .users
                        .iter()
                        .find(|u| u.id == pm_id && u.role == ROLE_PM)?;
                    let satisfied = by_tender
                        .get(&tender.id)
                        .is_some_and(|list| list.iter().any(|e| e.pm_id == Some(pm.id)));
                    Some(TrackedItem {
                        entity_id: tender.id,
                        label: tender.customer.clone(),
                        base: tender.handoff_at.clone(),
                        satisfied,
                        responsible: Some(pm_id),
                        link: "/estimates",
                    })
                })
                .collect()
        }
        RuleKind::ApprovalOverdue => scan
            .estimates
            .iter()
            .filter(|estimate| estimate.approval_status == APPROVAL_SENT)
            .map(|estimate| TrackedItem {
                entity_id: estimate.id,
                label: scan.tender_label(estimate.tender_id),
                base: estimate
                    .sent_for_approval_at
                    .clone()
                    .or_else(|| Some(estimate.created_at.format("%Y-%m-%d").to_string())),
                satisfied: false,
                responsible: estimate.pm_id,
                link: "/approvals",
            })
            .collect(),
        RuleKind::ReworkOverdue => scan
            .estimates
            .iter()
            .filter(|estimate| {
                estimate.approval_status == APPROVAL_REWORK
                    || estimate.approval_status == APPROVAL_QUESTION
            })
            .map(|estimate| TrackedItem {
                entity_id: estimate.id,
                label: scan.tender_label(estimate.tender_id),
                base: estimate
                    .rework_requested_at
                    .clone()
                    .or_else(|| estimate.decided_at.clone())
                    .or_else(|| Some(estimate.created_at.format("%Y-%m-%d").to_string())),
                satisfied: false,
                responsible: estimate.pm_id,
                link: "/estimates",
            })
            .collect(),
        // Birthday kinds go through their own composite scan.
        _ => Vec::new(),
    }
}

async fn run_rule(
    store: &dyn CrmStore,
    rule: &DeadlineRule,
    items: &[TrackedItem],
    users: &[User],
    ctx: &TickContext,
) {
    for item in items {
        let Some(base_raw) = item.base.as_deref() else {
            continue;
        };
        let Some(base) = calendar::parse_day(base_raw) else {
            // Unparsable lifecycle date: skip this entity, not the scan.
            continue;
        };
        let Some(firing) = evaluate(rule, base, item.satisfied, ctx) else {
            continue;
        };

        if firing.primary {
            let recipients = rules::resolve_recipients(&rule.recipients, users, item.responsible);
            let (title, message) = primary_text(rule.kind, item, &firing);
            deliver(store, rule.kind, rule.entity_type, item, &recipients, title, message, ctx)
                .await;
        }
        if firing.escalate {
            if let Some(kind) = rule.escalation_kind {
                let recipients =
                    rules::resolve_recipients(&rule.escalate_to, users, item.responsible);
                let (title, message) = escalation_text(kind, item, &firing);
                deliver(store, kind, rule.entity_type, item, &recipients, title, message, ctx)
                    .await;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn deliver(
    store: &dyn CrmStore,
    kind: RuleKind,
    entity_type: &'static str,
    item: &TrackedItem,
    recipients: &[Uuid],
    title: String,
    message: String,
    ctx: &TickContext,
) {
    for user_id in recipients {
        let draft = NoticeDraft {
            user_id: *user_id,
            title: title.clone(),
            message: message.clone(),
            link: item.link.to_string(),
            kind,
            entity_type,
            entity_id: item.entity_id,
            day: ctx.today,
        };
        if let Err(err) = ledger::notify_once(store, draft).await {
            warn!(
                error = %err,
                rule = kind.as_str(),
                entity = %item.entity_id,
                "notification write failed"
            );
        }
    }
}

fn primary_text(kind: RuleKind, item: &TrackedItem, firing: &Firing) -> (String, String) {
    let due = calendar::day_key(firing.due);
    match kind {
        RuleKind::DocsDeadline => (
            "Submission deadline approaching".to_string(),
            format!(
                "Tender \"{}\": {} day(s) left, documents due {}",
                item.label, firing.days_left, due
            ),
        ),
        RuleKind::EstimateDue => (
            "Estimate required".to_string(),
            format!("Tender \"{}\": no estimate yet, due {}", item.label, due),
        ),
        RuleKind::ApprovalOverdue => (
            "Approval overdue".to_string(),
            format!(
                "Estimate for \"{}\": approval was due {}",
                item.label, due
            ),
        ),
        RuleKind::ReworkOverdue => (
            "Rework overdue".to_string(),
            format!(
                "Estimate for \"{}\": rework reply was due {}",
                item.label, due
            ),
        ),
        _ => (
            "Deadline notice".to_string(),
            format!("\"{}\": due {}", item.label, due),
        ),
    }
}

fn escalation_text(kind: RuleKind, item: &TrackedItem, firing: &Firing) -> (String, String) {
    let due = calendar::day_key(firing.due);
    match kind {
        RuleKind::EstimateOverdue => (
            "Estimate overdue".to_string(),
            format!(
                "Tender \"{}\": the estimate is overdue, was due {}",
                item.label, due
            ),
        ),
        _ => (
            "Deadline escalation".to_string(),
            format!("\"{}\": overdue since {}", item.label, due),
        ),
    }
}

/// Office birthdays: everyone on the active roster hears about everyone
/// else's birthday, same-day and ahead of time.
async fn office_birthdays(
    store: &dyn CrmStore,
    settings: &SlaSettings,
    scan: &TickScan,
    ctx: &TickContext,
) {
    for person in &scan.users {
        let Some(birth) = person.birth_date.as_deref() else {
            continue;
        };
        let recipients: Vec<Uuid> = scan
            .users
            .iter()
            .filter(|u| u.id != person.id)
            .map(|u| u.id)
            .collect();
        birthday_notices(
            store,
            settings,
            ctx,
            birth,
            &person.full_name,
            person.id,
            "user",
            "/birthdays",
            RuleKind::BirthdayToday,
            RuleKind::BirthdaySoon,
            &recipients,
        )
        .await;
    }
}

/// Field-crew birthdays are only surfaced to HR and the directors.
async fn crew_birthdays(
    store: &dyn CrmStore,
    settings: &SlaSettings,
    scan: &TickScan,
    ctx: &TickContext,
) {
    let recipients: Vec<Uuid> = scan
        .users
        .iter()
        .filter(|u| u.role == ROLE_HR || rules::is_director(&u.role))
        .map(|u| u.id)
        .collect();
    if recipients.is_empty() {
        return;
    }

    for person in &scan.employees {
        let Some(birth) = person.birth_date.as_deref() else {
            continue;
        };
        birthday_notices(
            store,
            settings,
            ctx,
            birth,
            &person.full_name,
            person.id,
            "employee",
            "/birthdays?tab=crew",
            RuleKind::CrewBirthdayToday,
            RuleKind::CrewBirthdaySoon,
            &recipients,
        )
        .await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn birthday_notices(
    store: &dyn CrmStore,
    settings: &SlaSettings,
    ctx: &TickContext,
    birth: &str,
    name: &str,
    entity_id: Uuid,
    entity_type: &'static str,
    link: &str,
    today_kind: RuleKind,
    soon_kind: RuleKind,
    recipients: &[Uuid],
) {
    if recipients.is_empty() {
        return;
    }
    let Some(next) = calendar::next_birthday(birth, ctx.today) else {
        return;
    };
    let days = (next - ctx.today).num_days();

    let (kind, title, message) = if days == 0 {
        (
            today_kind,
            "Birthday today".to_string(),
            format!("{name} celebrates a birthday today"),
        )
    } else if days > 0 && days <= settings.birthday_notice_days {
        (
            soon_kind,
            "Birthday coming up".to_string(),
            format!(
                "{name}: {days} day(s) to go ({})",
                calendar::day_key(next)
            ),
        )
    } else {
        return;
    };

    for user_id in recipients {
        let draft = NoticeDraft {
            user_id: *user_id,
            title: title.clone(),
            message: message.clone(),
            link: link.to_string(),
            kind,
            entity_type,
            entity_id,
            day: ctx.today,
        };
        if let Err(err) = ledger::notify_once(store, draft).await {
            warn!(
                error = %err,
                rule = kind.as_str(),
                entity = %entity_id,
                "notification write failed"
            );
        }
    }
}
