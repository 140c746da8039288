//! Daily mood log.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ReuneError};
use crate::people::{user_view, User, UserView};
use crate::store::{impl_record, Reader, Store, MOODS};
use crate::validate::{optional_text, score};

const LABELS: [&str; 5] = ["very sad", "sad", "neutral", "happy", "very happy"];

/// Label for a 1-5 mood score.
pub fn mood_label(mood: u8) -> &'static str {
    usize::from(mood)
        .checked_sub(1)
        .and_then(|i| LABELS.get(i))
        .copied()
        .unwrap_or("unknown")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: u64,
    pub collaborator_id: u64,
    pub date: NaiveDate,
    pub mood: u8,
    pub comment: Option<String>,
}

impl_record!(MoodEntry, MOODS, "mood_entry", id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoodInput {
    pub mood: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodView {
    pub id: u64,
    pub collaborator: UserView,
    pub date: NaiveDate,
    pub mood: u8,
    pub mood_label: &'static str,
    pub comment: Option<String>,
}

fn mood_view<R: Reader>(reader: &R, m: &MoodEntry) -> Result<MoodView> {
    Ok(MoodView {
        id: m.id,
        collaborator: user_view(reader, m.collaborator_id)?,
        date: m.date,
        mood: m.mood,
        mood_label: mood_label(m.mood),
        comment: m.comment.clone(),
    })
}

fn visible(viewer: &User, m: &MoodEntry) -> bool {
    viewer.is_staff || m.collaborator_id == viewer.id
}

/// Log today's mood for `author`.
pub fn record_mood(store: &Store, author: &User, input: MoodInput) -> Result<MoodView> {
    record_mood_on(store, author, Utc::now().date_naive(), input)
}

/// Log a mood for an explicit date; one entry per collaborator per day.
pub fn record_mood_on(
    store: &Store,
    author: &User,
    date: NaiveDate,
    input: MoodInput,
) -> Result<MoodView> {
    let mood = score("mood", input.mood)?;
    let comment = optional_text(input.comment);
    store.write(|tx| {
        let taken = tx
            .all::<MoodEntry>()?
            .iter()
            .any(|m| m.collaborator_id == author.id && m.date == date);
        if taken {
            return Err(ReuneError::Conflict(format!(
                "mood already recorded for {date}"
            )));
        }
        let mut entry = MoodEntry {
            id: 0,
            collaborator_id: author.id,
            date,
            mood,
            comment,
        };
        tx.insert(&mut entry)?;
        mood_view(tx, &entry)
    })
}

/// Entries visible to `viewer`, most recent day first.
pub fn list_moods(store: &Store, viewer: &User) -> Result<Vec<MoodView>> {
    let snap = store.read()?;
    let mut entries: Vec<MoodEntry> = snap
        .all::<MoodEntry>()?
        .into_iter()
        .filter(|m| visible(viewer, m))
        .collect();
    entries.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    entries.iter().map(|m| mood_view(&snap, m)).collect()
}

pub fn get_mood(store: &Store, viewer: &User, id: u64) -> Result<MoodView> {
    let snap = store.read()?;
    let entry: MoodEntry = snap.require(id)?;
    if !visible(viewer, &entry) {
        return Err(ReuneError::NotFound {
            entity: "mood_entry",
            id,
        });
    }
    mood_view(&snap, &entry)
}

pub fn delete_mood(store: &Store, actor: &User, id: u64) -> Result<()> {
    store.write(|tx| {
        let entry: MoodEntry = tx.require(id)?;
        if entry.collaborator_id != actor.id {
            return Err(ReuneError::Forbidden(
                "only the author may delete a mood entry".to_string(),
            ));
        }
        tx.remove::<MoodEntry>(id)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::people::tests::{add_user, open_tmp};

    fn input(mood: i64) -> MoodInput {
        MoodInput {
            mood: Some(mood),
            comment: Some("  ".into()),
        }
    }

    #[test]
    fn labels() {
        assert_eq!(mood_label(1), "very sad");
        assert_eq!(mood_label(3), "neutral");
        assert_eq!(mood_label(5), "very happy");
        assert_eq!(mood_label(0), "unknown");
        assert_eq!(mood_label(6), "unknown");
    }

    #[test]
    fn one_entry_per_day() {
        let (_dir, store) = open_tmp();
        let ana = add_user(&store, "ana", false);
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let view = record_mood_on(&store, &ana, day, input(4)).unwrap();
        assert_eq!(view.mood_label, "happy");
        assert_eq!(view.comment, None);

        let err = record_mood_on(&store, &ana, day, input(2)).unwrap_err();
        assert!(matches!(err, ReuneError::Conflict(_)));

        let next = day.succ_opt().unwrap();
        record_mood_on(&store, &ana, next, input(2)).unwrap();
        let listed = list_moods(&store, &ana).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].date, next);
    }

    #[test]
    fn mood_out_of_range() {
        let (_dir, store) = open_tmp();
        let ana = add_user(&store, "ana", false);
        assert!(matches!(
            record_mood(&store, &ana, input(9)),
            Err(ReuneError::Validation { .. })
        ));
    }

    #[test]
    fn entries_are_private_except_to_staff() {
        let (_dir, store) = open_tmp();
        let ana = add_user(&store, "ana", false);
        let bruno = add_user(&store, "bruno", false);
        let admin = add_user(&store, "admin", true);
        let entry = record_mood(&store, &ana, input(3)).unwrap();

        assert!(list_moods(&store, &bruno).unwrap().is_empty());
        assert!(matches!(get_mood(&store, &bruno, entry.id), Err(ReuneError::NotFound { .. })));
        assert_eq!(list_moods(&store, &admin).unwrap().len(), 1);
        assert!(matches!(delete_mood(&store, &bruno, entry.id), Err(ReuneError::Forbidden(_))));
        delete_mood(&store, &ana, entry.id).unwrap();
    }
}
