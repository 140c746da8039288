//! Objectives, key results and check-ins.
//!
//! Progress on key results and objectives is never set directly. It is
//! derived from check-in values (see [`crate::progress`]) and rewritten in
//! the same transaction as whatever change invalidated it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{format_two_places, parse_amount, required_amount, to_two_places, two_places, DecimalInput};
use crate::error::{Result, ReuneError};
use crate::people::{members_led_by, user_view, User, UserView};
use crate::progress::{compute_progress, mean_progress};
use crate::review::Cycle;
use crate::store::{impl_record, Reader, Record, Store, Tx, CHECK_INS, KEY_RESULTS, OBJECTIVES};
use crate::validate::{optional_text, required, required_text, score};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: u64,
    pub cycle_id: u64,
    pub created_at: DateTime<Utc>,
    #[serde(with = "two_places")]
    pub progress: BigDecimal,
}

impl_record!(Objective, OBJECTIVES, "objective", id);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Percentage,
    Monetary,
    Numeric,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::Percentage => "percentage",
            MetricKind::Monetary => "monetary",
            MetricKind::Numeric => "numeric",
        };
        f.write_str(s)
    }
}

impl FromStr for MetricKind {
    type Err = ReuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "percentage" => Ok(MetricKind::Percentage),
            "monetary" => Ok(MetricKind::Monetary),
            "numeric" => Ok(MetricKind::Numeric),
            other => Err(ReuneError::validation(
                "kind",
                format!("'{other}' is not one of percentage, monetary, numeric"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyResult {
    pub id: u64,
    pub objective_id: u64,
    pub description: String,
    pub kind: MetricKind,
    #[serde(with = "two_places")]
    pub initial_value: BigDecimal,
    #[serde(with = "two_places")]
    pub target_value: BigDecimal,
    #[serde(with = "two_places")]
    pub progress: BigDecimal,
}

impl_record!(KeyResult, KEY_RESULTS, "key_result", id);

/// An observation of a key result's value. Never modified after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: u64,
    pub key_result_id: u64,
    #[serde(with = "two_places")]
    pub current_value: BigDecimal,
    pub confidence: u8,
    pub comment: String,
    pub submitted_by: u64,
    pub created_at: DateTime<Utc>,
}

impl_record!(CheckIn, CHECK_INS, "check_in", id);

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CheckInView {
    pub id: u64,
    pub key_result: u64,
    #[serde(with = "two_places")]
    pub current_value: BigDecimal,
    pub confidence: u8,
    pub comment: String,
    pub submitted_by: UserView,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyResultView {
    pub id: u64,
    pub objective: u64,
    pub description: String,
    pub kind: MetricKind,
    #[serde(with = "two_places")]
    pub initial_value: BigDecimal,
    #[serde(with = "two_places")]
    pub target_value: BigDecimal,
    #[serde(with = "two_places")]
    pub progress: BigDecimal,
    pub check_ins: Vec<CheckInView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectiveView {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub owner: UserView,
    pub cycle: u64,
    pub created_at: DateTime<Utc>,
    #[serde(with = "two_places")]
    pub progress: BigDecimal,
    pub key_results: Vec<KeyResultView>,
}

/// Response to a check-in submission: the stored check-in plus the progress
/// values it produced.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInReceipt {
    #[serde(flatten)]
    pub check_in: CheckInView,
    #[serde(with = "two_places")]
    pub key_result_progress: BigDecimal,
    #[serde(with = "two_places")]
    pub objective_progress: BigDecimal,
}

fn check_in_view<R: Reader>(reader: &R, c: &CheckIn) -> Result<CheckInView> {
    Ok(CheckInView {
        id: c.id,
        key_result: c.key_result_id,
        current_value: c.current_value.clone(),
        confidence: c.confidence,
        comment: c.comment.clone(),
        submitted_by: user_view(reader, c.submitted_by)?,
        created_at: c.created_at,
    })
}

fn key_result_view<R: Reader>(
    reader: &R,
    kr: &KeyResult,
    check_ins: &[&CheckIn],
) -> Result<KeyResultView> {
    Ok(KeyResultView {
        id: kr.id,
        objective: kr.objective_id,
        description: kr.description.clone(),
        kind: kr.kind,
        initial_value: kr.initial_value.clone(),
        target_value: kr.target_value.clone(),
        progress: kr.progress.clone(),
        check_ins: check_ins
            .iter()
            .map(|c| check_in_view(reader, c))
            .collect::<Result<_>>()?,
    })
}

/// Nest key results and check-ins under each objective. Check-ins are
/// ordered oldest first, key results by id.
fn objective_views<R: Reader>(reader: &R, objectives: &[Objective]) -> Result<Vec<ObjectiveView>> {
    let key_results: Vec<KeyResult> = reader.all()?;
    let check_ins: Vec<CheckIn> = reader.all()?;

    let mut by_kr: HashMap<u64, Vec<&CheckIn>> = HashMap::new();
    for c in &check_ins {
        by_kr.entry(c.key_result_id).or_default().push(c);
    }
    for list in by_kr.values_mut() {
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }

    objectives
        .iter()
        .map(|o| {
            let krs = key_results
                .iter()
                .filter(|kr| kr.objective_id == o.id)
                .map(|kr| {
                    let cs = by_kr.get(&kr.id).map(Vec::as_slice).unwrap_or(&[]);
                    key_result_view(reader, kr, cs)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ObjectiveView {
                id: o.id,
                title: o.title.clone(),
                description: o.description.clone(),
                owner: user_view(reader, o.owner_id)?,
                cycle: o.cycle_id,
                created_at: o.created_at,
                progress: o.progress.clone(),
                key_results: krs,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Who may see an objective: its owner, staff, and leaders of a team the
/// owner belongs to.
struct Visibility {
    viewer: u64,
    staff: bool,
    led: HashSet<u64>,
}

impl Visibility {
    fn for_user<R: Reader>(reader: &R, viewer: &User) -> Result<Self> {
        Ok(Self {
            viewer: viewer.id,
            staff: viewer.is_staff,
            led: members_led_by(reader, viewer.id)?,
        })
    }

    fn allows(&self, objective: &Objective) -> bool {
        self.staff || objective.owner_id == self.viewer || self.led.contains(&objective.owner_id)
    }
}

/// Fetch an objective the viewer may see; hidden objectives are not-found.
fn visible_objective<R: Reader>(reader: &R, viewer: &User, id: u64) -> Result<Objective> {
    let objective: Objective = reader.require(id)?;
    if Visibility::for_user(reader, viewer)?.allows(&objective) {
        Ok(objective)
    } else {
        Err(ReuneError::NotFound {
            entity: Objective::ENTITY,
            id,
        })
    }
}

/// Fetch an objective the actor may modify.
fn owned_objective<R: Reader>(reader: &R, actor: &User, id: u64) -> Result<Objective> {
    let objective = visible_objective(reader, actor, id)?;
    if objective.owner_id != actor.id {
        return Err(ReuneError::Forbidden(
            "only the objective's owner may change it".to_string(),
        ));
    }
    Ok(objective)
}

/// Key result plus its objective, hiding key results of invisible objectives.
fn visible_key_result<R: Reader>(reader: &R, viewer: &User, id: u64) -> Result<(KeyResult, Objective)> {
    let kr: KeyResult = reader.require(id)?;
    match visible_objective(reader, viewer, kr.objective_id) {
        Ok(objective) => Ok((kr, objective)),
        Err(ReuneError::NotFound { .. }) => Err(ReuneError::NotFound {
            entity: KeyResult::ENTITY,
            id,
        }),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Progress maintenance
// ---------------------------------------------------------------------------

fn latest_check_in<R: Reader>(reader: &R, key_result: u64) -> Result<Option<CheckIn>> {
    Ok(reader
        .all::<CheckIn>()?
        .into_iter()
        .filter(|c| c.key_result_id == key_result)
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))))
}

/// Progress of `kr` as of its latest check-in; zero before the first one.
fn derived_progress<R: Reader>(reader: &R, kr: &KeyResult) -> Result<BigDecimal> {
    Ok(match latest_check_in(reader, kr.id)? {
        Some(c) => compute_progress(&kr.initial_value, &kr.target_value, &c.current_value),
        None => to_two_places(&BigDecimal::from(0)),
    })
}

/// Rewrite an objective's progress as the mean of its key results.
fn refresh_objective(tx: &Tx, objective_id: u64) -> Result<BigDecimal> {
    let mut objective: Objective = tx.require(objective_id)?;
    let key_results: Vec<KeyResult> = tx
        .all::<KeyResult>()?
        .into_iter()
        .filter(|kr| kr.objective_id == objective_id)
        .collect();
    objective.progress = mean_progress(key_results.iter().map(|kr| &kr.progress));
    tx.put(&objective)?;
    Ok(objective.progress)
}

/// Remove an objective with its key results and their check-ins.
pub(crate) fn purge_objective(tx: &Tx, id: u64) -> Result<()> {
    for kr in tx.all::<KeyResult>()? {
        if kr.objective_id == id {
            purge_key_result(tx, kr.id)?;
        }
    }
    tx.remove::<Objective>(id)?;
    Ok(())
}

fn purge_key_result(tx: &Tx, id: u64) -> Result<()> {
    for c in tx.all::<CheckIn>()? {
        if c.key_result_id == id {
            tx.remove::<CheckIn>(c.id)?;
        }
    }
    tx.remove::<KeyResult>(id)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Objectives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectiveInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cycle: Option<u64>,
}

/// Cap on objective titles and key-result descriptions.
const TEXT_MAX: usize = 500;

struct ObjectiveFields {
    title: String,
    description: Option<String>,
    cycle_id: u64,
}

impl ObjectiveInput {
    fn validate(self) -> Result<ObjectiveFields> {
        Ok(ObjectiveFields {
            title: required_text("title", self.title, Some(TEXT_MAX))?,
            description: optional_text(self.description),
            cycle_id: required("cycle", self.cycle)?,
        })
    }
}

/// Objectives visible to `viewer`, newest first.
pub fn list_objectives(store: &Store, viewer: &User, cycle: Option<u64>) -> Result<Vec<ObjectiveView>> {
    let snap = store.read()?;
    let visibility = Visibility::for_user(&snap, viewer)?;
    let mut objectives: Vec<Objective> = snap
        .all::<Objective>()?
        .into_iter()
        .filter(|o| visibility.allows(o))
        .filter(|o| cycle.map_or(true, |c| o.cycle_id == c))
        .collect();
    objectives.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    objective_views(&snap, &objectives)
}

pub fn get_objective(store: &Store, viewer: &User, id: u64) -> Result<ObjectiveView> {
    let snap = store.read()?;
    let objective = visible_objective(&snap, viewer, id)?;
    let mut views = objective_views(&snap, std::slice::from_ref(&objective))?;
    views.pop().ok_or(ReuneError::NotFound {
        entity: Objective::ENTITY,
        id,
    })
}

/// Create an objective owned by `owner` with zero progress.
pub fn create_objective(store: &Store, owner: &User, input: ObjectiveInput) -> Result<ObjectiveView> {
    let fields = input.validate()?;
    let view = store.write(|tx| {
        tx.require::<Cycle>(fields.cycle_id)?;
        let mut objective = Objective {
            id: 0,
            title: fields.title,
            description: fields.description,
            owner_id: owner.id,
            cycle_id: fields.cycle_id,
            created_at: Utc::now(),
            progress: to_two_places(&BigDecimal::from(0)),
        };
        tx.insert(&mut objective)?;
        let mut views = objective_views(tx, std::slice::from_ref(&objective))?;
        views.pop().ok_or_else(|| ReuneError::Storage("objective view missing".into()))
    })?;
    tracing::info!(objective = view.id, owner = owner.id, "objective created");
    Ok(view)
}

pub fn update_objective(
    store: &Store,
    actor: &User,
    id: u64,
    input: ObjectiveInput,
) -> Result<ObjectiveView> {
    let fields = input.validate()?;
    store.write(|tx| {
        let mut objective = owned_objective(tx, actor, id)?;
        tx.require::<Cycle>(fields.cycle_id)?;
        objective.title = fields.title;
        objective.description = fields.description;
        objective.cycle_id = fields.cycle_id;
        tx.put(&objective)?;
        let mut views = objective_views(tx, std::slice::from_ref(&objective))?;
        views.pop().ok_or_else(|| ReuneError::Storage("objective view missing".into()))
    })
}

pub fn delete_objective(store: &Store, actor: &User, id: u64) -> Result<()> {
    store.write(|tx| {
        owned_objective(tx, actor, id)?;
        purge_objective(tx, id)
    })?;
    tracing::info!(objective = id, "objective deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Key results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyResultInput {
    pub objective: Option<u64>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub initial_value: Option<DecimalInput>,
    pub target_value: Option<DecimalInput>,
}

struct KeyResultFields {
    objective_id: u64,
    description: String,
    kind: MetricKind,
    initial_value: BigDecimal,
    target_value: BigDecimal,
}

impl KeyResultInput {
    fn validate(self) -> Result<KeyResultFields> {
        let objective_id = required("objective", self.objective)?;
        let description = required_text("description", self.description, Some(TEXT_MAX))?;
        let kind = required("kind", self.kind)?.parse()?;
        let initial_value = match self.initial_value.as_ref() {
            Some(raw) => parse_amount("initial_value", raw)?,
            None => to_two_places(&BigDecimal::from(0)),
        };
        let target_value = required_amount("target_value", self.target_value.as_ref())?;
        Ok(KeyResultFields {
            objective_id,
            description,
            kind,
            initial_value,
            target_value,
        })
    }
}

fn key_result_view_with_check_ins<R: Reader>(reader: &R, kr: &KeyResult) -> Result<KeyResultView> {
    let mut check_ins: Vec<CheckIn> = reader
        .all::<CheckIn>()?
        .into_iter()
        .filter(|c| c.key_result_id == kr.id)
        .collect();
    check_ins.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let refs: Vec<&CheckIn> = check_ins.iter().collect();
    key_result_view(reader, kr, &refs)
}

/// Key results of objectives visible to `viewer`, by id.
pub fn list_key_results(
    store: &Store,
    viewer: &User,
    objective: Option<u64>,
) -> Result<Vec<KeyResultView>> {
    let snap = store.read()?;
    let visibility = Visibility::for_user(&snap, viewer)?;
    let visible: HashMap<u64, Objective> = snap
        .all::<Objective>()?
        .into_iter()
        .filter(|o| visibility.allows(o))
        .map(|o| (o.id, o))
        .collect();
    snap.all::<KeyResult>()?
        .iter()
        .filter(|kr| visible.contains_key(&kr.objective_id))
        .filter(|kr| objective.map_or(true, |o| kr.objective_id == o))
        .map(|kr| key_result_view_with_check_ins(&snap, kr))
        .collect()
}

pub fn get_key_result(store: &Store, viewer: &User, id: u64) -> Result<KeyResultView> {
    let snap = store.read()?;
    let (kr, _) = visible_key_result(&snap, viewer, id)?;
    key_result_view_with_check_ins(&snap, &kr)
}

pub fn create_key_result(store: &Store, actor: &User, input: KeyResultInput) -> Result<KeyResultView> {
    let fields = input.validate()?;
    store.write(|tx| {
        owned_objective(tx, actor, fields.objective_id)?;
        let mut kr = KeyResult {
            id: 0,
            objective_id: fields.objective_id,
            description: fields.description,
            kind: fields.kind,
            initial_value: fields.initial_value,
            target_value: fields.target_value,
            progress: to_two_places(&BigDecimal::from(0)),
        };
        tx.insert(&mut kr)?;
        refresh_objective(tx, kr.objective_id)?;
        key_result_view(tx, &kr, &[])
    })
}

/// Replace a key result's fields and re-derive its progress against the new
/// bounds. Moving it to another objective is rejected.
pub fn update_key_result(
    store: &Store,
    actor: &User,
    id: u64,
    input: KeyResultInput,
) -> Result<KeyResultView> {
    let fields = input.validate()?;
    store.write(|tx| {
        let (mut kr, _) = visible_key_result(tx, actor, id)?;
        owned_objective(tx, actor, kr.objective_id)?;
        if fields.objective_id != kr.objective_id {
            return Err(ReuneError::validation("objective", "cannot be changed"));
        }
        kr.description = fields.description;
        kr.kind = fields.kind;
        kr.initial_value = fields.initial_value;
        kr.target_value = fields.target_value;
        kr.progress = derived_progress(tx, &kr)?;
        tx.put(&kr)?;
        refresh_objective(tx, kr.objective_id)?;
        key_result_view_with_check_ins(tx, &kr)
    })
}

pub fn delete_key_result(store: &Store, actor: &User, id: u64) -> Result<()> {
    store.write(|tx| {
        let (kr, _) = visible_key_result(tx, actor, id)?;
        owned_objective(tx, actor, kr.objective_id)?;
        purge_key_result(tx, id)?;
        refresh_objective(tx, kr.objective_id)?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Check-ins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCheckIn {
    pub key_result: Option<u64>,
    pub current_value: Option<DecimalInput>,
    pub confidence: Option<i64>,
    pub comment: Option<String>,
}

/// Record a check-in and roll its value up into the key result and the
/// objective.
///
/// The input is fully validated before the transaction opens. Inside it,
/// the key result's progress, the objective's mean and the check-in itself
/// are written together; any failure leaves all three untouched.
pub fn record_check_in(store: &Store, submitter: &User, input: NewCheckIn) -> Result<CheckInReceipt> {
    let key_result_id = required("key_result", input.key_result)?;
    let current_value = required_amount("current_value", input.current_value.as_ref())?;
    let confidence = score("confidence", input.confidence)?;
    let comment = input.comment.map(|c| c.trim().to_string()).unwrap_or_default();

    let receipt = store.write(|tx| {
        let (mut kr, _) = visible_key_result(tx, submitter, key_result_id)?;

        kr.progress = compute_progress(&kr.initial_value, &kr.target_value, &current_value);
        tx.put(&kr)?;
        let objective_progress = refresh_objective(tx, kr.objective_id)?;

        let mut check_in = CheckIn {
            id: 0,
            key_result_id,
            current_value,
            confidence,
            comment,
            submitted_by: submitter.id,
            created_at: Utc::now(),
        };
        tx.insert(&mut check_in)?;

        Ok(CheckInReceipt {
            check_in: check_in_view(tx, &check_in)?,
            key_result_progress: kr.progress,
            objective_progress,
        })
    })?;

    tracing::info!(
        check_in = receipt.check_in.id,
        key_result = key_result_id,
        key_result_progress = %format_two_places(&receipt.key_result_progress),
        objective_progress = %format_two_places(&receipt.objective_progress),
        "check-in recorded"
    );
    Ok(receipt)
}

/// Check-ins on key results visible to `viewer`, newest first.
pub fn list_check_ins(store: &Store, viewer: &User, key_result: Option<u64>) -> Result<Vec<CheckInView>> {
    let snap = store.read()?;
    let visibility = Visibility::for_user(&snap, viewer)?;
    let visible_objectives: HashSet<u64> = snap
        .all::<Objective>()?
        .into_iter()
        .filter(|o| visibility.allows(o))
        .map(|o| o.id)
        .collect();
    let visible_krs: HashSet<u64> = snap
        .all::<KeyResult>()?
        .into_iter()
        .filter(|kr| visible_objectives.contains(&kr.objective_id))
        .map(|kr| kr.id)
        .collect();

    let mut check_ins: Vec<CheckIn> = snap
        .all::<CheckIn>()?
        .into_iter()
        .filter(|c| visible_krs.contains(&c.key_result_id))
        .filter(|c| key_result.map_or(true, |k| c.key_result_id == k))
        .collect();
    check_ins.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    check_ins.iter().map(|c| check_in_view(&snap, c)).collect()
}

pub fn get_check_in(store: &Store, viewer: &User, id: u64) -> Result<CheckInView> {
    let snap = store.read()?;
    let check_in: CheckIn = snap.require(id)?;
    match visible_key_result(&snap, viewer, check_in.key_result_id) {
        Ok(_) => check_in_view(&snap, &check_in),
        Err(ReuneError::NotFound { .. }) => Err(ReuneError::NotFound {
            entity: "check_in",
            id,
        }),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
