use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use uuid::Uuid;

use crate::calendar;
use crate::models::User;

pub const ROLE_PM: &str = "PM";
pub const ROLE_TENDER_OFFICE: &str = "TO";
pub const ROLE_HR: &str = "HR";

/// Director roles carry a department suffix ("DIRECTOR_GEN",
/// "DIRECTOR_COMM", ...); the bare form also occurs in older records.
pub fn is_director(role: &str) -> bool {
    role == "DIRECTOR" || role.starts_with("DIRECTOR_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    DocsDeadline,
    EstimateDue,
    EstimateOverdue,
    ApprovalOverdue,
    ReworkOverdue,
    BirthdayToday,
    BirthdaySoon,
    CrewBirthdayToday,
    CrewBirthdaySoon,
}

impl RuleKind {
    /// Stable name used inside dedup keys and stored records. Renaming
    /// one of these re-fires every notification for a day.
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::DocsDeadline => "docs_deadline",
            RuleKind::EstimateDue => "estimate_due",
            RuleKind::EstimateOverdue => "estimate_overdue",
            RuleKind::ApprovalOverdue => "approval_overdue",
            RuleKind::ReworkOverdue => "rework_overdue",
            RuleKind::BirthdayToday => "birthday_today",
            RuleKind::BirthdaySoon => "birthday_soon",
            RuleKind::CrewBirthdayToday => "crew_birthday_today",
            RuleKind::CrewBirthdaySoon => "crew_birthday_soon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    Workdays,
    CalendarDays,
}

/// When the primary recipients hear about a rule, relative to its due
/// date. Escalation is always overdue-gated and keyed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticePhase {
    /// Every tick from the base date until the awaited action happens.
    UntilSatisfied,
    /// Countdown reminder: 0 <= days-left <= window.
    WithinWindow(i64),
    /// Nothing before the due date, daily once past it.
    OverdueOnly,
}

/// Closed set of recipient-resolution strategies. Resolution happens
/// per entity at tick time against the active user roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientPolicy {
    ResponsibleParty,
    ActiveRole(&'static str),
    Directors,
}

#[derive(Debug, Clone)]
pub struct DeadlineRule {
    pub kind: RuleKind,
    /// Independent dedup scope for the overdue escalation, so an
    /// escalation never suppresses the primary reminder or vice versa.
    pub escalation_kind: Option<RuleKind>,
    pub entity_type: &'static str,
    pub offset: u32,
    pub unit: OffsetUnit,
    pub phase: NoticePhase,
    pub recipients: Vec<RecipientPolicy>,
    pub escalate_to: Vec<RecipientPolicy>,
}

/// SLA parameters, stored as JSON under the `sla` settings key and
/// deserialized field-by-field: a malformed or missing value falls back
/// to the default instead of failing the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaSettings {
    pub docs_deadline_notice_days: i64,
    pub pm_estimate_due_workdays: u32,
    pub director_approval_due_workdays: u32,
    pub pm_rework_due_workdays: u32,
    pub birthday_notice_days: i64,
}

impl Default for SlaSettings {
    fn default() -> Self {
        Self {
            docs_deadline_notice_days: 5,
            pm_estimate_due_workdays: 3,
            director_approval_due_workdays: 2,
            pm_rework_due_workdays: 1,
            birthday_notice_days: 5,
        }
    }
}

impl SlaSettings {
    pub fn from_value(value: Option<&Value>) -> Self {
        let defaults = Self::default();
        let Some(value) = value else {
            return defaults;
        };
        Self {
            docs_deadline_notice_days: int_field(
                value,
                "docs_deadline_notice_days",
                defaults.docs_deadline_notice_days,
            ),
            pm_estimate_due_workdays: uint_field(
                value,
                "pm_estimate_due_workdays",
                defaults.pm_estimate_due_workdays,
            ),
            director_approval_due_workdays: uint_field(
                value,
                "director_approval_due_workdays",
                defaults.director_approval_due_workdays,
            ),
            pm_rework_due_workdays: uint_field(
                value,
                "pm_rework_due_workdays",
                defaults.pm_rework_due_workdays,
            ),
            birthday_notice_days: int_field(
                value,
                "birthday_notice_days",
                defaults.birthday_notice_days,
            ),
        }
    }
}

fn int_field(value: &Value, key: &str, default: i64) -> i64 {
    value
        .get(key)
        .and_then(Value::as_i64)
        .filter(|v| *v >= 0)
        .unwrap_or(default)
}

fn uint_field(value: &Value, key: &str, default: u32) -> u32 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

/// The deadline rules are data: the engine walks this set and knows
/// nothing about which business stage each entry encodes.
#[derive(Debug, Clone)]
pub struct DeadlineRuleSet {
    pub rules: Vec<DeadlineRule>,
}

impl DeadlineRuleSet {
    pub fn from_settings(settings: &SlaSettings) -> Self {
        let rules = vec![
            // Tender document-submission deadline countdown.
            DeadlineRule {
                kind: RuleKind::DocsDeadline,
                escalation_kind: None,
                entity_type: "tender",
                offset: 0,
                unit: OffsetUnit::CalendarDays,
                phase: NoticePhase::WithinWindow(settings.docs_deadline_notice_days),
                recipients: vec![
                    RecipientPolicy::ActiveRole(ROLE_TENDER_OFFICE),
                    RecipientPolicy::Directors,
                    RecipientPolicy::ResponsibleParty,
                ],
                escalate_to: Vec::new(),
            },
            // Handed-off tender still waiting for its first estimate.
            DeadlineRule {
                kind: RuleKind::EstimateDue,
                escalation_kind: Some(RuleKind::EstimateOverdue),
                entity_type: "tender",
                offset: settings.pm_estimate_due_workdays,
                unit: OffsetUnit::Workdays,
                phase: NoticePhase::UntilSatisfied,
                recipients: vec![RecipientPolicy::ResponsibleParty],
                escalate_to: vec![RecipientPolicy::Directors],
            },
            // Estimate sent for approval and still undecided.
            DeadlineRule {
                kind: RuleKind::ApprovalOverdue,
                escalation_kind: None,
                entity_type: "estimate",
                offset: settings.director_approval_due_workdays,
                unit: OffsetUnit::Workdays,
                phase: NoticePhase::OverdueOnly,
                recipients: vec![RecipientPolicy::Directors],
                escalate_to: Vec::new(),
            },
            // Estimate bounced back for rework or with a question.
            DeadlineRule {
                kind: RuleKind::ReworkOverdue,
                escalation_kind: None,
                entity_type: "estimate",
                offset: settings.pm_rework_due_workdays,
                unit: OffsetUnit::Workdays,
                phase: NoticePhase::OverdueOnly,
                recipients: vec![RecipientPolicy::ResponsibleParty],
                escalate_to: Vec::new(),
            },
        ];
        Self { rules }
    }
}

/// Wall clock captured once at the start of a tick and threaded through
/// every evaluation, so a slow scan stays internally consistent.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub today: NaiveDate,
    pub now: NaiveDateTime,
}

impl TickContext {
    pub fn current() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            today: now.date(),
            now,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Firing {
    pub primary: bool,
    pub escalate: bool,
    pub days_left: i64,
    pub due: NaiveDate,
}

/// Core state machine for one (rule, entity) pair. Satisfaction wins
/// over any date math; an unparsable base date never reaches this point.
pub fn evaluate(
    rule: &DeadlineRule,
    base: NaiveDate,
    satisfied: bool,
    ctx: &TickContext,
) -> Option<Firing> {
    if satisfied {
        return None;
    }

    let due = match rule.unit {
        OffsetUnit::Workdays => calendar::add_workdays(base, rule.offset),
        OffsetUnit::CalendarDays => base + Duration::days(i64::from(rule.offset)),
    };
    let days_left = (due - ctx.today).num_days();
    let overdue = ctx.now > due.and_time(NaiveTime::MIN);

    let primary = match rule.phase {
        NoticePhase::UntilSatisfied => true,
        NoticePhase::WithinWindow(window) => days_left >= 0 && days_left <= window,
        NoticePhase::OverdueOnly => overdue,
    };
    let escalate = overdue && !rule.escalate_to.is_empty();

    if !primary && !escalate {
        return None;
    }
    Some(Firing {
        primary,
        escalate,
        days_left,
        due,
    })
}

/// Union of all recipient policies against the active roster, deduped
/// and in a stable order. An empty result is a no-op, not an error.
pub fn resolve_recipients(
    policies: &[RecipientPolicy],
    users: &[User],
    responsible: Option<Uuid>,
) -> Vec<Uuid> {
    let mut out = std::collections::BTreeSet::new();
    for policy in policies {
        match policy {
            RecipientPolicy::ResponsibleParty => {
                if let Some(id) = responsible {
                    if users.iter().any(|u| u.id == id) {
                        out.insert(id);
                    }
                }
            }
            RecipientPolicy::ActiveRole(role) => {
                for user in users.iter().filter(|u| u.role == *role) {
                    out.insert(user.id);
                }
            }
            RecipientPolicy::Directors => {
                for user in users.iter().filter(|u| is_director(&u.role)) {
                    out.insert(user.id);
                }
            }
        }
    }
    out.into_iter().collect()
}
