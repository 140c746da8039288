//! Peer feedback between users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ReuneError};
use crate::people::{user_view, User, UserView};
use crate::store::{impl_record, Reader, Store, FEEDBACK};
use crate::validate::{required, required_text};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: u64,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl_record!(Feedback, FEEDBACK, "feedback", id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackInput {
    pub receiver: Option<u64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackView {
    pub id: u64,
    pub sender: UserView,
    pub receiver: UserView,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

fn feedback_view<R: Reader>(reader: &R, f: &Feedback) -> Result<FeedbackView> {
    Ok(FeedbackView {
        id: f.id,
        sender: user_view(reader, f.sender_id)?,
        receiver: user_view(reader, f.receiver_id)?,
        text: f.text.clone(),
        created_at: f.created_at,
    })
}

fn involves(viewer: &User, f: &Feedback) -> bool {
    viewer.is_staff || f.sender_id == viewer.id || f.receiver_id == viewer.id
}

/// Send feedback from `sender`, who is always the authenticated user.
pub fn send_feedback(store: &Store, sender: &User, input: FeedbackInput) -> Result<FeedbackView> {
    let receiver = required("receiver", input.receiver)?;
    let text = required_text("text", input.text, None)?;
    let view = store.write(|tx| {
        tx.require::<User>(receiver)?;
        let mut feedback = Feedback {
            id: 0,
            sender_id: sender.id,
            receiver_id: receiver,
            text,
            created_at: Utc::now(),
        };
        tx.insert(&mut feedback)?;
        feedback_view(tx, &feedback)
    })?;
    tracing::debug!(feedback = view.id, sender = sender.id, receiver, "feedback sent");
    Ok(view)
}

/// Feedback sent or received by `viewer` (everything for staff), newest first.
pub fn list_feedback(store: &Store, viewer: &User) -> Result<Vec<FeedbackView>> {
    let snap = store.read()?;
    let mut rows: Vec<Feedback> = snap
        .all::<Feedback>()?
        .into_iter()
        .filter(|f| involves(viewer, f))
        .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    rows.iter().map(|f| feedback_view(&snap, f)).collect()
}

pub fn get_feedback(store: &Store, viewer: &User, id: u64) -> Result<FeedbackView> {
    let snap = store.read()?;
    let f: Feedback = snap.require(id)?;
    if !involves(viewer, &f) {
        return Err(ReuneError::NotFound {
            entity: "feedback",
            id,
        });
    }
    feedback_view(&snap, &f)
}

pub fn delete_feedback(store: &Store, actor: &User, id: u64) -> Result<()> {
    store.write(|tx| {
        let f: Feedback = tx.require(id)?;
        if f.sender_id != actor.id {
            return Err(ReuneError::Forbidden(
                "only the sender may delete feedback".to_string(),
            ));
        }
        tx.remove::<Feedback>(id)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::people::tests::{add_user, open_tmp};

    fn note(receiver: u64, text: &str) -> FeedbackInput {
        FeedbackInput {
            receiver: Some(receiver),
            text: Some(text.into()),
        }
    }

    #[test]
    fn sender_is_the_caller() {
        let (_dir, store) = open_tmp();
        // an earlier user must not be picked up as the sender
        add_user(&store, "first", false);
        let ana = add_user(&store, "ana", false);
        let bruno = add_user(&store, "bruno", false);
        let view = send_feedback(&store, &ana, note(bruno.id, "great demo")).unwrap();
        assert_eq!(view.sender.username, "ana");
        assert_eq!(view.receiver.username, "bruno");
    }

    #[test]
    fn unknown_receiver_and_blank_text() {
        let (_dir, store) = open_tmp();
        let ana = add_user(&store, "ana", false);
        assert!(matches!(
            send_feedback(&store, &ana, note(42, "hi")),
            Err(ReuneError::NotFound { entity: "user", id: 42 })
        ));
        assert!(matches!(
            send_feedback(&store, &ana, note(ana.id, " ")),
            Err(ReuneError::Validation { .. })
        ));
    }

    #[test]
    fn listing_is_scoped_to_participants() {
        let (_dir, store) = open_tmp();
        let ana = add_user(&store, "ana", false);
        let bruno = add_user(&store, "bruno", false);
        let carla = add_user(&store, "carla", false);
        let admin = add_user(&store, "admin", true);
        let sent = send_feedback(&store, &ana, note(bruno.id, "thanks")).unwrap();

        assert_eq!(list_feedback(&store, &ana).unwrap().len(), 1);
        assert_eq!(list_feedback(&store, &bruno).unwrap().len(), 1);
        assert!(list_feedback(&store, &carla).unwrap().is_empty());
        assert_eq!(list_feedback(&store, &admin).unwrap().len(), 1);
        assert!(get_feedback(&store, &carla, sent.id).is_err());

        assert!(matches!(
            delete_feedback(&store, &bruno, sent.id),
            Err(ReuneError::Forbidden(_))
        ));
        delete_feedback(&store, &ana, sent.id).unwrap();
    }
}
