//! Evaluation cycles, competencies and competency assessments.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{to_two_places, two_places};
use crate::error::{Result, ReuneError};
use crate::okr::{purge_objective, Objective};
use crate::people::{require_staff, user_view, Collaborator, User, UserView};
use crate::store::{impl_record, Reader, Store, ASSESSMENTS, COMPETENCIES, CYCLES};
use crate::validate::{optional_text, required, required_text, score};

/// Cap on cycle titles and competency names.
const NAME_MAX: usize = 255;

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    #[default]
    Planning,
    Active,
    Closed,
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStatus::Planning => "planning",
            CycleStatus::Active => "active",
            CycleStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

impl FromStr for CycleStatus {
    type Err = ReuneError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "planning" => Ok(CycleStatus::Planning),
            "active" => Ok(CycleStatus::Active),
            "closed" => Ok(CycleStatus::Closed),
            other => Err(ReuneError::validation(
                "status",
                format!("'{other}' is not one of planning, active, closed"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cycle {
    pub id: u64,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CycleStatus,
}

impl_record!(Cycle, CYCLES, "cycle", id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CycleInput {
    pub title: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl CycleInput {
    fn into_cycle(self, id: u64) -> Result<Cycle> {
        let title = required_text("title", self.title, Some(NAME_MAX))?;
        let start_date = required("start_date", self.start_date)?;
        let end_date = required("end_date", self.end_date)?;
        if end_date < start_date {
            return Err(ReuneError::validation(
                "end_date",
                "must not be before start_date",
            ));
        }
        let status = match self.status {
            Some(s) => s.parse()?,
            None => CycleStatus::default(),
        };
        Ok(Cycle {
            id,
            title,
            start_date,
            end_date,
            status,
        })
    }
}

/// Cycles, most recent start first.
pub fn list_cycles(store: &Store) -> Result<Vec<Cycle>> {
    let mut cycles: Vec<Cycle> = store.read()?.all()?;
    cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
    Ok(cycles)
}

pub fn get_cycle(store: &Store, id: u64) -> Result<Cycle> {
    store.read()?.require(id)
}

pub fn create_cycle(store: &Store, actor: &User, input: CycleInput) -> Result<Cycle> {
    require_staff(actor, "manage cycles")?;
    let mut cycle = input.into_cycle(0)?;
    store.write(|tx| tx.insert(&mut cycle))?;
    tracing::info!(cycle = cycle.id, status = %cycle.status, "cycle created");
    Ok(cycle)
}

pub fn update_cycle(store: &Store, actor: &User, id: u64, input: CycleInput) -> Result<Cycle> {
    require_staff(actor, "manage cycles")?;
    let cycle = input.into_cycle(id)?;
    store.write(|tx| {
        tx.require::<Cycle>(id)?;
        tx.put(&cycle)
    })?;
    Ok(cycle)
}

/// Delete a cycle together with its objectives and assessments.
pub fn delete_cycle(store: &Store, actor: &User, id: u64) -> Result<()> {
    require_staff(actor, "manage cycles")?;
    let (objectives, assessments) = store.write(|tx| {
        tx.require::<Cycle>(id)?;
        let mut objectives = 0;
        for o in tx.all::<Objective>()? {
            if o.cycle_id == id {
                purge_objective(tx, o.id)?;
                objectives += 1;
            }
        }
        let mut assessments = 0;
        for a in tx.all::<Assessment>()? {
            if a.cycle_id == id {
                tx.remove::<Assessment>(a.id)?;
                assessments += 1;
            }
        }
        tx.remove::<Cycle>(id)?;
        Ok((objectives, assessments))
    })?;
    tracing::info!(cycle = id, objectives, assessments, "cycle deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Competency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Competency {
    pub id: u64,
    pub name: String,
    pub description: String,
}

impl_record!(Competency, COMPETENCIES, "competency", id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompetencyInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn build_competency<R: Reader>(reader: &R, id: u64, input: CompetencyInput) -> Result<Competency> {
    let name = required_text("name", input.name, Some(NAME_MAX))?;
    let description = required_text("description", input.description, None)?;
    let taken = reader
        .all::<Competency>()?
        .iter()
        .any(|c| c.id != id && c.name == name);
    if taken {
        return Err(ReuneError::Conflict(format!(
            "competency '{name}' already exists"
        )));
    }
    Ok(Competency {
        id,
        name,
        description,
    })
}

pub fn list_competencies(store: &Store) -> Result<Vec<Competency>> {
    let mut all: Vec<Competency> = store.read()?.all()?;
    all.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(all)
}

pub fn get_competency(store: &Store, id: u64) -> Result<Competency> {
    store.read()?.require(id)
}

pub fn create_competency(store: &Store, actor: &User, input: CompetencyInput) -> Result<Competency> {
    require_staff(actor, "manage competencies")?;
    store.write(|tx| {
        let mut c = build_competency(tx, 0, input)?;
        tx.insert(&mut c)?;
        Ok(c)
    })
}

pub fn update_competency(
    store: &Store,
    actor: &User,
    id: u64,
    input: CompetencyInput,
) -> Result<Competency> {
    require_staff(actor, "manage competencies")?;
    store.write(|tx| {
        tx.require::<Competency>(id)?;
        let c = build_competency(tx, id, input)?;
        tx.put(&c)?;
        Ok(c)
    })
}

/// Delete a competency and every assessment made against it.
pub fn delete_competency(store: &Store, actor: &User, id: u64) -> Result<()> {
    require_staff(actor, "manage competencies")?;
    store.write(|tx| {
        tx.require::<Competency>(id)?;
        for a in tx.all::<Assessment>()? {
            if a.competency_id == id {
                tx.remove::<Assessment>(a.id)?;
            }
        }
        tx.remove::<Competency>(id)?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: u64,
    pub cycle_id: u64,
    pub assessee_id: u64,
    pub assessor_id: u64,
    pub competency_id: u64,
    pub score: u8,
    pub justification: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl_record!(Assessment, ASSESSMENTS, "assessment", id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssessmentInput {
    pub cycle: Option<u64>,
    pub assessee: Option<u64>,
    pub competency: Option<u64>,
    pub score: Option<i64>,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentView {
    pub id: u64,
    pub cycle: u64,
    pub assessee: UserView,
    pub assessor: UserView,
    pub competency: Competency,
    pub score: u8,
    pub justification: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn assessment_view<R: Reader>(reader: &R, a: &Assessment) -> Result<AssessmentView> {
    Ok(AssessmentView {
        id: a.id,
        cycle: a.cycle_id,
        assessee: user_view(reader, a.assessee_id)?,
        assessor: user_view(reader, a.assessor_id)?,
        competency: reader.require(a.competency_id)?,
        score: a.score,
        justification: a.justification.clone(),
        created_at: a.created_at,
    })
}

/// Validated fields of an assessment request, before references are checked.
struct AssessmentFields {
    cycle_id: u64,
    assessee_id: u64,
    competency_id: u64,
    score: u8,
    justification: Option<String>,
}

impl AssessmentInput {
    fn validate(self) -> Result<AssessmentFields> {
        Ok(AssessmentFields {
            cycle_id: required("cycle", self.cycle)?,
            assessee_id: required("assessee", self.assessee)?,
            competency_id: required("competency", self.competency)?,
            score: score("score", self.score)?,
            justification: optional_text(self.justification),
        })
    }
}

fn check_references<R: Reader>(reader: &R, f: &AssessmentFields) -> Result<()> {
    reader.require::<Cycle>(f.cycle_id)?;
    reader.require::<User>(f.assessee_id)?;
    reader.require::<Competency>(f.competency_id)?;
    Ok(())
}

fn ensure_unique<R: Reader>(reader: &R, assessor: u64, f: &AssessmentFields, except: u64) -> Result<()> {
    let duplicate = reader.all::<Assessment>()?.iter().any(|a| {
        a.id != except
            && a.cycle_id == f.cycle_id
            && a.assessee_id == f.assessee_id
            && a.assessor_id == assessor
            && a.competency_id == f.competency_id
    });
    if duplicate {
        return Err(ReuneError::Conflict(
            "this competency was already assessed for this person in this cycle".to_string(),
        ));
    }
    Ok(())
}

/// Assessments, newest first, optionally narrowed to one cycle or assessee.
pub fn list_assessments(
    store: &Store,
    cycle: Option<u64>,
    assessee: Option<u64>,
) -> Result<Vec<AssessmentView>> {
    let snap = store.read()?;
    let mut rows: Vec<Assessment> = snap
        .all::<Assessment>()?
        .into_iter()
        .filter(|a| cycle.map_or(true, |c| a.cycle_id == c))
        .filter(|a| assessee.map_or(true, |u| a.assessee_id == u))
        .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    rows.iter().map(|a| assessment_view(&snap, a)).collect()
}

pub fn get_assessment(store: &Store, id: u64) -> Result<AssessmentView> {
    let snap = store.read()?;
    let a: Assessment = snap.require(id)?;
    assessment_view(&snap, &a)
}

pub fn create_assessment(
    store: &Store,
    assessor: &User,
    input: AssessmentInput,
) -> Result<AssessmentView> {
    let fields = input.validate()?;
    let view = store.write(|tx| {
        check_references(tx, &fields)?;
        ensure_unique(tx, assessor.id, &fields, 0)?;
        let mut a = Assessment {
            id: 0,
            cycle_id: fields.cycle_id,
            assessee_id: fields.assessee_id,
            assessor_id: assessor.id,
            competency_id: fields.competency_id,
            score: fields.score,
            justification: fields.justification,
            created_at: Utc::now(),
        };
        tx.insert(&mut a)?;
        assessment_view(tx, &a)
    })?;
    tracing::info!(
        assessment = view.id,
        assessor = assessor.id,
        assessee = view.assessee.id,
        "assessment recorded"
    );
    Ok(view)
}

fn require_assessor(a: &Assessment, actor: &User) -> Result<()> {
    if a.assessor_id != actor.id {
        return Err(ReuneError::Forbidden(
            "only the assessor may change this assessment".to_string(),
        ));
    }
    Ok(())
}

pub fn update_assessment(
    store: &Store,
    actor: &User,
    id: u64,
    input: AssessmentInput,
) -> Result<AssessmentView> {
    let fields = input.validate()?;
    store.write(|tx| {
        let mut a: Assessment = tx.require(id)?;
        require_assessor(&a, actor)?;
        check_references(tx, &fields)?;
        ensure_unique(tx, actor.id, &fields, id)?;
        a.cycle_id = fields.cycle_id;
        a.assessee_id = fields.assessee_id;
        a.competency_id = fields.competency_id;
        a.score = fields.score;
        a.justification = fields.justification;
        tx.put(&a)?;
        assessment_view(tx, &a)
    })
}

pub fn delete_assessment(store: &Store, actor: &User, id: u64) -> Result<()> {
    store.write(|tx| {
        let a: Assessment = tx.require(id)?;
        require_assessor(&a, actor)?;
        tx.remove::<Assessment>(id)?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CompetencyAverage {
    pub competency: String,
    #[serde(with = "two_places")]
    pub average_score: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub collaborator: String,
    pub cycle: String,
    pub summary: Vec<CompetencyAverage>,
    pub comments: Vec<String>,
}

/// Mean score per competency for one collaborator in one cycle.
pub fn assessment_report(
    store: &Store,
    collaborator_id: u64,
    cycle_id: Option<u64>,
) -> Result<AssessmentReport> {
    let cycle_id = cycle_id
        .ok_or_else(|| ReuneError::validation("cycle_id", "query parameter is required"))?;
    let snap = store.read()?;
    snap.require::<Collaborator>(collaborator_id)?;
    let user: User = snap.require(collaborator_id)?;
    let cycle: Cycle = snap.require(cycle_id)?;

    let assessments: Vec<Assessment> = snap
        .all::<Assessment>()?
        .into_iter()
        .filter(|a| a.assessee_id == collaborator_id && a.cycle_id == cycle_id)
        .collect();
    if assessments.is_empty() {
        return Err(ReuneError::NoData(format!(
            "no assessments for {} in cycle '{}'",
            user.display_name(),
            cycle.title
        )));
    }

    // name -> (sum, count); BTreeMap keeps the summary sorted by name
    let mut totals: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut comments = Vec::new();
    for a in &assessments {
        let competency: Competency = snap.require(a.competency_id)?;
        let entry = totals.entry(competency.name).or_insert((0, 0));
        entry.0 += u64::from(a.score);
        entry.1 += 1;
        if let Some(text) = &a.justification {
            comments.push(text.clone());
        }
    }

    let summary = totals
        .into_iter()
        .map(|(competency, (sum, count))| CompetencyAverage {
            competency,
            average_score: to_two_places(&(BigDecimal::from(sum) / BigDecimal::from(count))),
        })
        .collect();

    Ok(AssessmentReport {
        collaborator: user.display_name(),
        cycle: cycle.title,
        summary,
        comments,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
