//! People directory: users, positions, teams and collaborator profiles.
//!
//! Users authenticate with opaque API tokens. Only the SHA-256 digest of a
//! token is stored; the plain token is returned once, at creation or rotation.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, ReuneError};
use crate::store::{impl_record, Reader, Store, COLLABORATORS, POSITIONS, TEAMS, USERS};
use crate::validate::{optional_text, required, required_text};

const TOKEN_LEN: usize = 40;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub token_digest: Option<String>,
    pub date_joined: DateTime<Utc>,
}

impl_record!(User, USERS, "user", id);

impl User {
    /// "First Last", trimmed; empty when neither name is set.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn display_name(&self) -> String {
        let full = self.full_name();
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

/// Public shape of a user; never carries the token digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub id: u64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            email: u.email.clone(),
        }
    }
}

/// Look up a user for embedding in a view. Users are never deleted, so a
/// dangling reference means the database is inconsistent.
pub fn user_view<R: Reader>(reader: &R, id: u64) -> Result<UserView> {
    let user: User = reader.require(id)?;
    Ok(UserView::from(&user))
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
}

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.@+-]{1,150}$").unwrap())
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

pub fn validate_username(username: &str) -> Result<()> {
    if username_re().is_match(username) {
        Ok(())
    } else {
        Err(ReuneError::validation(
            "username",
            "1-150 characters: letters, digits and @/./+/-/_ only",
        ))
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Create a user and issue their first API token. Returns the plain token.
pub fn create_user(store: &Store, new: NewUser) -> Result<(User, String)> {
    let username = new.username.trim().to_string();
    validate_username(&username)?;
    let email = new.email.trim().to_string();
    if !email.is_empty() && !email_re().is_match(&email) {
        return Err(ReuneError::validation("email", "enter a valid email address"));
    }

    let token = generate_token();
    let digest = token_digest(&token);

    let user = store.write(|tx| {
        if tx.all::<User>()?.iter().any(|u| u.username == username) {
            return Err(ReuneError::Conflict(format!(
                "username '{username}' is already taken"
            )));
        }
        let mut user = User {
            id: 0,
            username: username.clone(),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            email: email.clone(),
            is_staff: new.is_staff,
            token_digest: Some(digest.clone()),
            date_joined: Utc::now(),
        };
        tx.insert(&mut user)?;
        tx.set_token(&digest, user.id)?;
        Ok(user)
    })?;

    tracing::info!(user = user.id, username = %user.username, "user created");
    Ok((user, token))
}

/// Replace a user's token. The previous token stops authenticating.
pub fn rotate_token(store: &Store, username: &str) -> Result<String> {
    let token = generate_token();
    let digest = token_digest(&token);
    store.write(|tx| {
        let mut user = find_user(tx, username)?;
        if let Some(old) = user.token_digest.take() {
            tx.remove_token(&old)?;
        }
        user.token_digest = Some(digest.clone());
        tx.put(&user)?;
        tx.set_token(&digest, user.id)?;
        Ok(())
    })?;
    tracing::info!(username, "token rotated");
    Ok(token)
}

/// Resolve a bearer token to its user.
pub fn authenticate(store: &Store, token: &str) -> Result<Option<User>> {
    let digest = token_digest(token);
    let snap = store.read()?;
    let Some(id) = snap.token_owner(&digest)? else {
        return Ok(None);
    };
    let user: Option<User> = snap.get(id)?;
    Ok(user.filter(|u| u.token_digest.as_deref() == Some(digest.as_str())))
}

pub fn find_user<R: Reader>(reader: &R, username: &str) -> Result<User> {
    reader
        .all::<User>()?
        .into_iter()
        .find(|u| u.username == username)
        .ok_or_else(|| ReuneError::UserNotFound(username.to_string()))
}

/// All users, ordered by username.
pub fn list_users(store: &Store) -> Result<Vec<User>> {
    let mut users: Vec<User> = store.read()?.all()?;
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(users)
}

pub fn require_staff(user: &User, action: &str) -> Result<()> {
    if user.is_staff {
        Ok(())
    } else {
        Err(ReuneError::Forbidden(format!("only staff users may {action}")))
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
}

impl_record!(Position, POSITIONS, "position", id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionInput {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl PositionInput {
    fn into_position(self, id: u64) -> Result<Position> {
        Ok(Position {
            id,
            title: required_text("title", self.title, Some(255))?,
            description: optional_text(self.description),
        })
    }
}

fn ensure_unique_title<R: Reader>(reader: &R, title: &str, except: u64) -> Result<()> {
    let taken = reader
        .all::<Position>()?
        .iter()
        .any(|p| p.id != except && p.title == title);
    if taken {
        return Err(ReuneError::Conflict(format!(
            "position with title '{title}' already exists"
        )));
    }
    Ok(())
}

pub fn list_positions(store: &Store) -> Result<Vec<Position>> {
    let mut positions: Vec<Position> = store.read()?.all()?;
    positions.sort_by(|a, b| a.title.cmp(&b.title));
    Ok(positions)
}

pub fn get_position(store: &Store, id: u64) -> Result<Position> {
    store.read()?.require(id)
}

pub fn create_position(store: &Store, actor: &User, input: PositionInput) -> Result<Position> {
    require_staff(actor, "manage positions")?;
    let mut position = input.into_position(0)?;
    store.write(|tx| {
        ensure_unique_title(tx, &position.title, 0)?;
        tx.insert(&mut position)?;
        Ok(())
    })?;
    Ok(position)
}

pub fn update_position(
    store: &Store,
    actor: &User,
    id: u64,
    input: PositionInput,
) -> Result<Position> {
    require_staff(actor, "manage positions")?;
    let position = input.into_position(id)?;
    store.write(|tx| {
        tx.require::<Position>(id)?;
        ensure_unique_title(tx, &position.title, id)?;
        tx.put(&position)
    })?;
    Ok(position)
}

/// Delete a position; collaborators holding it keep their profile with no
/// position.
pub fn delete_position(store: &Store, actor: &User, id: u64) -> Result<()> {
    require_staff(actor, "manage positions")?;
    store.write(|tx| {
        tx.require::<Position>(id)?;
        for mut c in tx.all::<Collaborator>()? {
            if c.position_id == Some(id) {
                c.position_id = None;
                tx.put(&c)?;
            }
        }
        tx.remove::<Position>(id)?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub leader: Option<u64>,
    pub description: Option<String>,
}

impl_record!(Team, TEAMS, "team", id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamInput {
    pub name: Option<String>,
    pub leader: Option<u64>,
    pub description: Option<String>,
}

fn build_team<R: Reader>(reader: &R, id: u64, input: TeamInput) -> Result<Team> {
    let name = required_text("name", input.name, Some(255))?;
    if let Some(leader) = input.leader {
        reader.require::<User>(leader)?;
    }
    let taken = reader
        .all::<Team>()?
        .iter()
        .any(|t| t.id != id && t.name == name);
    if taken {
        return Err(ReuneError::Conflict(format!(
            "team with name '{name}' already exists"
        )));
    }
    Ok(Team {
        id,
        name,
        leader: input.leader,
        description: optional_text(input.description),
    })
}

pub fn list_teams(store: &Store) -> Result<Vec<Team>> {
    let mut teams: Vec<Team> = store.read()?.all()?;
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(teams)
}

pub fn get_team(store: &Store, id: u64) -> Result<Team> {
    store.read()?.require(id)
}

pub fn create_team(store: &Store, actor: &User, input: TeamInput) -> Result<Team> {
    require_staff(actor, "manage teams")?;
    store.write(|tx| {
        let mut team = build_team(tx, 0, input)?;
        tx.insert(&mut team)?;
        Ok(team)
    })
}

pub fn update_team(store: &Store, actor: &User, id: u64, input: TeamInput) -> Result<Team> {
    require_staff(actor, "manage teams")?;
    store.write(|tx| {
        tx.require::<Team>(id)?;
        let team = build_team(tx, id, input)?;
        tx.put(&team)?;
        Ok(team)
    })
}

/// Delete a team; its members keep their profile with no team.
pub fn delete_team(store: &Store, actor: &User, id: u64) -> Result<()> {
    require_staff(actor, "manage teams")?;
    store.write(|tx| {
        tx.require::<Team>(id)?;
        for mut c in tx.all::<Collaborator>()? {
            if c.team_id == Some(id) {
                c.team_id = None;
                tx.put(&c)?;
            }
        }
        tx.remove::<Team>(id)?;
        Ok(())
    })
}

/// User ids of every collaborator in a team led by `leader`.
pub fn members_led_by<R: Reader>(reader: &R, leader: u64) -> Result<HashSet<u64>> {
    let led: HashSet<u64> = reader
        .all::<Team>()?
        .into_iter()
        .filter(|t| t.leader == Some(leader))
        .map(|t| t.id)
        .collect();
    if led.is_empty() {
        return Ok(HashSet::new());
    }
    Ok(reader
        .all::<Collaborator>()?
        .into_iter()
        .filter(|c| c.team_id.is_some_and(|t| led.contains(&t)))
        .map(|c| c.user_id)
        .collect())
}

// ---------------------------------------------------------------------------
// Collaborator
// ---------------------------------------------------------------------------

/// HR profile attached one-to-one to a user; keyed by the user's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub user_id: u64,
    pub position_id: Option<u64>,
    pub team_id: Option<u64>,
    pub hired_on: NaiveDate,
    pub birth_date: Option<NaiveDate>,
    pub photo_url: Option<String>,
}

impl_record!(Collaborator, COLLABORATORS, "collaborator", user_id);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollaboratorInput {
    pub user: Option<u64>,
    pub position: Option<u64>,
    pub team: Option<u64>,
    pub hired_on: Option<NaiveDate>,
    pub birth_date: Option<NaiveDate>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollaboratorView {
    pub user: UserView,
    pub position: Option<Position>,
    pub team: Option<Team>,
    pub hired_on: NaiveDate,
    pub photo_url: Option<String>,
}

fn build_collaborator<R: Reader>(
    reader: &R,
    user_id: u64,
    input: CollaboratorInput,
) -> Result<Collaborator> {
    let hired_on = required("hired_on", input.hired_on)?;
    if let Some(position) = input.position {
        reader.require::<Position>(position)?;
    }
    if let Some(team) = input.team {
        reader.require::<Team>(team)?;
    }
    Ok(Collaborator {
        user_id,
        position_id: input.position,
        team_id: input.team,
        hired_on,
        birth_date: input.birth_date,
        photo_url: optional_text(input.photo_url),
    })
}

fn collaborator_view<R: Reader>(reader: &R, c: &Collaborator) -> Result<CollaboratorView> {
    let position = match c.position_id {
        Some(id) => reader.get::<Position>(id)?,
        None => None,
    };
    let team = match c.team_id {
        Some(id) => reader.get::<Team>(id)?,
        None => None,
    };
    Ok(CollaboratorView {
        user: user_view(reader, c.user_id)?,
        position,
        team,
        hired_on: c.hired_on,
        photo_url: c.photo_url.clone(),
    })
}

/// Collaborators ordered by first then last name.
pub fn list_collaborators(store: &Store) -> Result<Vec<CollaboratorView>> {
    let snap = store.read()?;
    let mut views = snap
        .all::<Collaborator>()?
        .iter()
        .map(|c| collaborator_view(&snap, c))
        .collect::<Result<Vec<_>>>()?;
    views.sort_by(|a, b| {
        (&a.user.first_name, &a.user.last_name).cmp(&(&b.user.first_name, &b.user.last_name))
    });
    Ok(views)
}

pub fn get_collaborator(store: &Store, user_id: u64) -> Result<CollaboratorView> {
    let snap = store.read()?;
    let c: Collaborator = snap.require(user_id)?;
    collaborator_view(&snap, &c)
}

pub fn create_collaborator(
    store: &Store,
    actor: &User,
    mut input: CollaboratorInput,
) -> Result<CollaboratorView> {
    require_staff(actor, "manage collaborators")?;
    let user_id = required("user", input.user.take())?;
    store.write(|tx| {
        tx.require::<User>(user_id)?;
        if tx.exists::<Collaborator>(user_id)? {
            return Err(ReuneError::Conflict(format!(
                "user {user_id} already has a collaborator profile"
            )));
        }
        let c = build_collaborator(tx, user_id, input)?;
        tx.put(&c)?;
        collaborator_view(tx, &c)
    })
}

/// Replace a profile. The `user` field, if sent, must match the path id.
pub fn update_collaborator(
    store: &Store,
    actor: &User,
    user_id: u64,
    input: CollaboratorInput,
) -> Result<CollaboratorView> {
    require_staff(actor, "manage collaborators")?;
    if input.user.is_some_and(|u| u != user_id) {
        return Err(ReuneError::validation("user", "cannot be changed"));
    }
    store.write(|tx| {
        tx.require::<Collaborator>(user_id)?;
        let c = build_collaborator(tx, user_id, input)?;
        tx.put(&c)?;
        collaborator_view(tx, &c)
    })
}

pub fn delete_collaborator(store: &Store, actor: &User, user_id: u64) -> Result<()> {
    require_staff(actor, "manage collaborators")?;
    store.write(|tx| {
        tx.require::<Collaborator>(user_id)?;
        tx.remove::<Collaborator>(user_id)?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.redb")).unwrap();
        (dir, store)
    }

    pub(crate) fn add_user(store: &Store, username: &str, staff: bool) -> User {
        create_user(
            store,
            NewUser {
                username: username.to_string(),
                first_name: username.to_string(),
                last_name: "Tester".to_string(),
                email: format!("{username}@example.com"),
                is_staff: staff,
            },
        )
        .unwrap()
        .0
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn create_user_issues_working_token() {
        let (_dir, store) = open_tmp();
        let (user, token) = create_user(
            &store,
            NewUser {
                username: "ana".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(token.len(), TOKEN_LEN);
        let found = authenticate(&store, &token).unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(authenticate(&store, "not-a-token").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_conflicts() {
        let (_dir, store) = open_tmp();
        add_user(&store, "ana", false);
        let err = create_user(
            &store,
            NewUser {
                username: "ana".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ReuneError::Conflict(_)));
    }

    #[test]
    fn invalid_username_and_email_rejected() {
        let (_dir, store) = open_tmp();
        let bad_name = NewUser {
            username: "has space".into(),
            ..Default::default()
        };
        assert!(matches!(
            create_user(&store, bad_name),
            Err(ReuneError::Validation { .. })
        ));
        let bad_email = NewUser {
            username: "bruno".into(),
            email: "nope".into(),
            ..Default::default()
        };
        assert!(matches!(
            create_user(&store, bad_email),
            Err(ReuneError::Validation { ref field, .. }) if field == "email"
        ));
    }

    #[test]
    fn rotate_token_invalidates_old_token() {
        let (_dir, store) = open_tmp();
        let (_, old) = create_user(
            &store,
            NewUser {
                username: "ana".into(),
                ..Default::default()
            },
        )
        .unwrap();
        let new = rotate_token(&store, "ana").unwrap();
        assert_ne!(old, new);
        assert!(authenticate(&store, &old).unwrap().is_none());
        assert!(authenticate(&store, &new).unwrap().is_some());
    }

    #[test]
    fn rotate_unknown_user_is_not_found() {
        let (_dir, store) = open_tmp();
        assert!(matches!(
            rotate_token(&store, "ghost"),
            Err(ReuneError::UserNotFound(_))
        ));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let (_dir, store) = open_tmp();
        let (user, _) = create_user(
            &store,
            NewUser {
                username: "ana".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(user.full_name(), "");
        assert_eq!(user.display_name(), "ana");
    }

    #[test]
    fn positions_require_staff_and_unique_titles() {
        let (_dir, store) = open_tmp();
        let admin = add_user(&store, "admin", true);
        let ana = add_user(&store, "ana", false);

        let input = || PositionInput {
            title: Some("Engineer".into()),
            description: None,
        };
        assert!(matches!(
            create_position(&store, &ana, input()),
            Err(ReuneError::Forbidden(_))
        ));
        create_position(&store, &admin, input()).unwrap();
        assert!(matches!(
            create_position(&store, &admin, input()),
            Err(ReuneError::Conflict(_))
        ));
    }

    #[test]
    fn positions_are_listed_by_title() {
        let (_dir, store) = open_tmp();
        let admin = add_user(&store, "admin", true);
        for title in ["Manager", "Analyst", "Designer"] {
            create_position(
                &store,
                &admin,
                PositionInput {
                    title: Some(title.into()),
                    description: None,
                },
            )
            .unwrap();
        }
        let titles: Vec<String> = list_positions(&store)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["Analyst", "Designer", "Manager"]);
    }

    #[test]
    fn team_leader_must_exist() {
        let (_dir, store) = open_tmp();
        let admin = add_user(&store, "admin", true);
        let err = create_team(
            &store,
            &admin,
            TeamInput {
                name: Some("Platform".into()),
                leader: Some(99),
                description: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ReuneError::NotFound { entity: "user", id: 99 }));
    }

    #[test]
    fn collaborator_view_nests_relations() {
        let (_dir, store) = open_tmp();
        let admin = add_user(&store, "admin", true);
        let ana = add_user(&store, "ana", false);
        let position = create_position(
            &store,
            &admin,
            PositionInput {
                title: Some("Engineer".into()),
                description: None,
            },
        )
        .unwrap();
        let team = create_team(
            &store,
            &admin,
            TeamInput {
                name: Some("Platform".into()),
                leader: Some(admin.id),
                description: None,
            },
        )
        .unwrap();

        let view = create_collaborator(
            &store,
            &admin,
            CollaboratorInput {
                user: Some(ana.id),
                position: Some(position.id),
                team: Some(team.id),
                hired_on: Some(date("2024-03-01")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(view.user.username, "ana");
        assert_eq!(view.position.unwrap().title, "Engineer");
        assert_eq!(view.team.unwrap().name, "Platform");
    }

    #[test]
    fn collaborator_requires_hire_date_and_is_unique() {
        let (_dir, store) = open_tmp();
        let admin = add_user(&store, "admin", true);
        let ana = add_user(&store, "ana", false);
        let missing_date = create_collaborator(
            &store,
            &admin,
            CollaboratorInput {
                user: Some(ana.id),
                ..Default::default()
            },
        );
        assert!(matches!(
            missing_date,
            Err(ReuneError::Validation { ref field, .. }) if field == "hired_on"
        ));

        let input = || CollaboratorInput {
            user: Some(ana.id),
            hired_on: Some(date("2024-03-01")),
            ..Default::default()
        };
        create_collaborator(&store, &admin, input()).unwrap();
        assert!(matches!(
            create_collaborator(&store, &admin, input()),
            Err(ReuneError::Conflict(_))
        ));
    }

    #[test]
    fn deleting_team_clears_membership() {
        let (_dir, store) = open_tmp();
        let admin = add_user(&store, "admin", true);
        let ana = add_user(&store, "ana", false);
        let team = create_team(
            &store,
            &admin,
            TeamInput {
                name: Some("Platform".into()),
                leader: Some(admin.id),
                description: None,
            },
        )
        .unwrap();
        create_collaborator(
            &store,
            &admin,
            CollaboratorInput {
                user: Some(ana.id),
                team: Some(team.id),
                hired_on: Some(date("2024-03-01")),
                ..Default::default()
            },
        )
        .unwrap();

        let snap = store.read().unwrap();
        assert!(members_led_by(&snap, admin.id).unwrap().contains(&ana.id));
        drop(snap);

        delete_team(&store, &admin, team.id).unwrap();
        let view = get_collaborator(&store, ana.id).unwrap();
        assert!(view.team.is_none());
        let snap = store.read().unwrap();
        assert!(members_led_by(&snap, admin.id).unwrap().is_empty());
    }
}
