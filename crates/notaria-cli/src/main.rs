mod config;
mod seed;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use notaria_core::{NewUser, Role};
use notaria_store::{Media, Store};
use notaria_web::AppState;

use crate::config::{DbArgs, ServeArgs};

#[derive(Parser, Debug)]
#[command(name = "notaria", version, about = "Practice management for notaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web application.
    Serve(ServeArgs),
    /// Create the database schema and print row counts.
    Migrate(DbArgs),
    /// Create a user account.
    CreateUser {
        #[command(flatten)]
        db: DbArgs,
        username: String,
        email: String,
        password: String,
        /// admin, paid_user, notary or solicitor
        #[arg(long, default_value = "paid_user")]
        role: String,
        /// Grant full access regardless of role
        #[arg(long)]
        superuser: bool,
    },
    /// Delete a user together with the documents they uploaded.
    DeleteUser {
        #[command(flatten)]
        db: DbArgs,
        #[arg(long, env = "NOTARIA_MEDIA_ROOT", default_value = "media")]
        media_root: PathBuf,
        username: String,
    },
    /// Load workflow and compliance templates from a JSON file.
    Seed {
        #[command(flatten)]
        db: DbArgs,
        file: PathBuf,
    },
}

fn open_store(db: &DbArgs) -> anyhow::Result<Store> {
    Store::open_persistent(&db.db).with_context(|| format!("opening database {}", db.db.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let settings = args.settings();
            let store = open_store(&args.db)?;
            std::fs::create_dir_all(&settings.media_root)
                .with_context(|| format!("creating media root {}", settings.media_root.display()))?;
            tracing::info!("notaria v{}", env!("CARGO_PKG_VERSION"));
            let bind = settings.bind.clone();
            let media = Media::new(&settings.media_root);
            notaria_web::serve(AppState::new(store, media, settings), &bind)
                .await
                .with_context(|| format!("serving on {bind}"))?;
        }
        Command::Migrate(db) => {
            let store = open_store(&db)?;
            for (table, rows) in store.table_counts()? {
                println!("{table:<28} {rows:>8}");
            }
        }
        Command::CreateUser {
            db,
            username,
            email,
            password,
            role,
            superuser,
        } => {
            let role: Role = role.parse()?;
            let store = open_store(&db)?;
            let mut user = NewUser::new(&username, &email, &password, role);
            user.is_superuser = superuser;
            let created = store.create_user(&user).context("creating user")?;
            println!("Created user {} (id {}, role {})", created.username, created.id, created.role);
        }
        Command::DeleteUser {
            db,
            media_root,
            username,
        } => {
            let mut store = open_store(&db)?;
            let user = store
                .find_user_by_username(&username)?
                .with_context(|| format!("no user named {username}"))?;
            store.delete_user(user.id, &Media::new(media_root))?;
            println!("Deleted user {} (id {})", user.username, user.id);
        }
        Command::Seed { db, file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let seed: seed::SeedFile = serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
            let store = open_store(&db)?;
            let report = seed::apply(&store, &seed)?;
            println!(
                "Seeded {} workflow template(s) and {} compliance template(s); skipped {} existing",
                report.workflow_templates, report.compliance_templates, report.skipped
            );
        }
    }
    Ok(())
}
