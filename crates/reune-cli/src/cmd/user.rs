use crate::cmd::open_store;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use reune_core::people::{self, NewUser, UserView};
use std::path::Path;

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Create a user and print their API token
    Add {
        username: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Grant staff rights (directory and review-cycle management)
        #[arg(long)]
        staff: bool,
    },

    /// List users
    List,

    /// Issue a new token for a user; the old one stops working
    Token { username: String },
}

pub fn run(root: &Path, subcmd: UserSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        UserSubcommand::Add {
            username,
            first_name,
            last_name,
            email,
            staff,
        } => add(
            root,
            NewUser {
                username,
                first_name,
                last_name,
                email,
                is_staff: staff,
            },
            json,
        ),
        UserSubcommand::List => list(root, json),
        UserSubcommand::Token { username } => token(root, &username, json),
    }
}

fn add(root: &Path, new: NewUser, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let (user, token) = people::create_user(&store, new).context("failed to create user")?;

    if json {
        return print_json(&serde_json::json!({
            "id": user.id,
            "username": user.username,
            "is_staff": user.is_staff,
            "token": token,
        }));
    }
    println!("Created user '{}' (id {})", user.username, user.id);
    println!("Token: {token}");
    println!("Store it now; it cannot be shown again.");
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let users = people::list_users(&store)?;

    if json {
        let views: Vec<serde_json::Value> = users
            .iter()
            .map(|u| {
                serde_json::json!({
                    "user": UserView::from(u),
                    "is_staff": u.is_staff,
                    "date_joined": u.date_joined,
                })
            })
            .collect();
        return print_json(&views);
    }
    if users.is_empty() {
        println!("No users. Add one with: reune user add <username>");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| {
            vec![
                u.id.to_string(),
                u.username.clone(),
                u.full_name(),
                u.email.clone(),
                if u.is_staff { "yes" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "USERNAME", "NAME", "EMAIL", "STAFF"], &rows);
    Ok(())
}

fn token(root: &Path, username: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let token = people::rotate_token(&store, username)?;
    if json {
        return print_json(&serde_json::json!({ "username": username, "token": token }));
    }
    println!("New token for '{username}': {token}");
    Ok(())
}
